use tender_protocol::OutboundMessage;
use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// Nobody is listening; the usual state when no popup is open.
    #[error("no listener is attached")]
    NoListener,

    #[error("notification failed: {0}")]
    Failed(String),
}

/// Receives a message after each committed merge. Delivery is best-effort:
/// the coordinator logs and drops any error.
pub trait RecordObserver: Send + Sync {
    fn record_updated(&self, message: &OutboundMessage) -> Result<(), NotifyError>;
}

/// Fans notifications out over a tokio broadcast channel.
#[derive(Clone, Debug)]
pub struct BroadcastObserver {
    sender: broadcast::Sender<OutboundMessage>,
}

impl BroadcastObserver {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboundMessage> {
        self.sender.subscribe()
    }
}

impl RecordObserver for BroadcastObserver {
    fn record_updated(&self, message: &OutboundMessage) -> Result<(), NotifyError> {
        self.sender
            .send(message.clone())
            .map(|_| ())
            .map_err(|_| NotifyError::NoListener)
    }
}

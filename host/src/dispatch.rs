use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tender_aggregator::AggregatorError;
use tender_aggregator::BroadcastObserver;
use tender_aggregator::Coordinator;
use tender_aggregator::StoreError;
use tender_aggregator::StoreOperation;
use tender_protocol::Acknowledgement;
use tender_protocol::ContractId;
use tender_protocol::FailureReason;
use tender_protocol::InboundMessage;
use tender_protocol::Request;
use tender_protocol::Response;
use tender_protocol::ResponseBody;
use tender_protocol::SubmitOutcome;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::debug;
use tracing::info;
use tracing::warn;

/// Serve requests from `input` until EOF, writing every response and
/// broadcast line to `output`. Returns `output` once all pending
/// submissions have finished and their broadcasts have been written.
pub async fn serve<R, W>(
    coordinator: Coordinator,
    observer: BroadcastObserver,
    input: R,
    mut output: W,
) -> anyhow::Result<W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let writer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            output.write_all(&line).await?;
            output.flush().await?;
        }
        Ok::<W, std::io::Error>(output)
    });

    let forwarder = tokio::spawn({
        let mut updates = observer.subscribe();
        let tx = tx.clone();
        async move {
            loop {
                match updates.recv().await {
                    Ok(message) => send_line(&tx, &message),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "update broadcasts dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    });
    drop(observer);

    let maintenance = coordinator.spawn_maintenance();
    let mut submissions = JoinSet::new();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                warn!("unparseable request: {err}");
                let ack = Acknowledgement::rejected(
                    FailureReason::MalformedRecord,
                    format!("invalid request: {err}"),
                );
                send_line(&tx, &Response { id: None, body: ResponseBody::Ack(ack) });
                continue;
            }
        };
        match handle(&coordinator, request.message).await {
            Handled::Reply(body) => send_line(&tx, &Response { id: request.id, body }),
            Handled::Accepted { ack, data } => {
                send_line(&tx, &Response { id: request.id, body: ResponseBody::Ack(ack) });
                let task_coordinator = coordinator.clone();
                submissions.spawn(async move {
                    log_outcome(&task_coordinator.submit(data).await);
                });
            }
        }
    }

    debug!(pending = submissions.len(), "input closed; draining submissions");
    while let Some(joined) = submissions.join_next().await {
        if let Err(err) = joined {
            warn!("submission task failed: {err}");
        }
    }
    maintenance.abort();
    let _ = maintenance.await;
    drop(coordinator);

    if let Err(err) = forwarder.await {
        warn!("update forwarder failed: {err}");
    }
    drop(tx);
    let output = writer.await??;
    Ok(output)
}

enum Handled {
    Reply(ResponseBody),
    /// Acknowledge first, then run the submission in the background.
    Accepted { ack: Acknowledgement, data: Value },
}

async fn handle(coordinator: &Coordinator, message: InboundMessage) -> Handled {
    let body = match message {
        InboundMessage::StoreTenderData { data } => {
            let key = match ContractId::extract(&data) {
                Ok(key) => key,
                Err(err) => {
                    let ack = Acknowledgement::rejected(err.reason(), err.to_string());
                    return Handled::Reply(ResponseBody::Ack(ack));
                }
            };
            if coordinator.is_in_flight(key.as_str()) {
                let ack = Acknowledgement {
                    contract_id: Some(key.to_string()),
                    ..Acknowledgement::rejected(
                        FailureReason::OperationPending,
                        "Operation already pending",
                    )
                };
                return Handled::Reply(ResponseBody::Ack(ack));
            }
            return Handled::Accepted {
                ack: Acknowledgement::accepted(Some(key.to_string())),
                data,
            };
        }
        InboundMessage::GetAllData => match coordinator.read_all().await {
            Ok(snapshot) => ResponseBody::Snapshot {
                data: Arc::unwrap_or_clone(snapshot),
            },
            Err(err) => store_failure(&err),
        },
        InboundMessage::VerifyStorage { contract_id } => {
            match coordinator.verify(&contract_id).await {
                Ok(report) => ResponseBody::Verify(report),
                Err(err) => store_failure(&err),
            }
        }
        InboundMessage::ClearAllData => match coordinator.clear_all().await {
            Ok(()) => ResponseBody::Ack(Acknowledgement::accepted(None)),
            Err(err) => store_failure(&err),
        },
        InboundMessage::ExportBackup { directory } => {
            match coordinator.export_backup(&directory).await {
                Ok(path) => ResponseBody::Backup {
                    success: true,
                    path,
                },
                Err(AggregatorError::Store(err)) => store_failure(&err),
                Err(err) => ResponseBody::Ack(Acknowledgement::rejected(
                    FailureReason::StorageWriteFailed,
                    err.to_string(),
                )),
            }
        }
    };
    Handled::Reply(body)
}

fn store_failure(err: &StoreError) -> ResponseBody {
    let reason = match err.operation() {
        StoreOperation::Read | StoreOperation::Usage => FailureReason::StorageReadFailed,
        StoreOperation::Write | StoreOperation::Clear => FailureReason::StorageWriteFailed,
    };
    ResponseBody::Ack(Acknowledgement::rejected(reason, err.to_string()))
}

fn log_outcome(outcome: &SubmitOutcome) {
    match outcome {
        SubmitOutcome::Committed { contract_id, .. } => {
            info!(contract_id = %contract_id, "submission committed");
        }
        SubmitOutcome::Pending { contract_id } => {
            info!(contract_id = %contract_id, "submission skipped, already pending");
        }
        SubmitOutcome::Rejected { reason, detail } => {
            warn!(%reason, "submission rejected: {detail}");
        }
        SubmitOutcome::Failed {
            contract_id,
            reason,
            detail,
            ..
        } => {
            warn!(contract_id = %contract_id, %reason, "submission failed: {detail}");
        }
    }
}

fn send_line<T: Serialize>(sender: &mpsc::UnboundedSender<Vec<u8>>, value: &T) {
    match serde_json::to_vec(value) {
        Ok(mut payload) => {
            payload.push(b'\n');
            if sender.send(payload).is_err() {
                debug!("output closed; line dropped");
            }
        }
        Err(err) => warn!("failed to encode outbound line: {err}"),
    }
}

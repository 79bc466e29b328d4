//! Wire-level and storage-level types shared by the tender aggregator and its
//! message host.
//!
//! Producers send loosely shaped JSON. [`TenderRecord::from_value`] turns it
//! into the typed record the merge engine works with; the outcome and message
//! types describe what travels back over the channel.

mod message;
mod outcome;
mod record;

pub use message::Acknowledgement;
pub use message::InboundMessage;
pub use message::OutboundMessage;
pub use message::Request;
pub use message::Response;
pub use message::ResponseBody;
pub use outcome::FailureReason;
pub use outcome::SubmitOutcome;
pub use outcome::VerifyReport;
pub use record::ContractId;
pub use record::ContractIdError;
pub use record::Provenance;
pub use record::Supplier;
pub use record::TenderRecord;
pub use record::TenderStore;

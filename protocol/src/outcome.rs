use serde::Deserialize;
use serde::Serialize;

use crate::record::TenderRecord;

/// Reason code attached to every rejected or failed operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureReason {
    MissingContractId,
    EmptyContractId,
    MalformedRecord,
    OperationPending,
    StorageReadFailed,
    StorageWriteFailed,
    VerificationFailed,
}

/// Result of re-reading storage for one key.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub found: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<TenderRecord>,

    pub total_count: usize,

    /// A few other keys present, filled only when `found` is false.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub available_contracts: Vec<String>,
}

/// What happened to one submitted candidate record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Committed {
        contract_id: String,
        record: TenderRecord,
    },
    /// Another operation for the same key is still running; nothing was done.
    Pending { contract_id: String },
    Rejected {
        reason: FailureReason,
        detail: String,
    },
    Failed {
        contract_id: String,
        reason: FailureReason,
        detail: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        verification: Option<VerifyReport>,
    },
}

impl SubmitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, SubmitOutcome::Committed { .. })
    }

    pub fn reason(&self) -> Option<FailureReason> {
        match self {
            SubmitOutcome::Committed { .. } => None,
            SubmitOutcome::Pending { .. } => Some(FailureReason::OperationPending),
            SubmitOutcome::Rejected { reason, .. } | SubmitOutcome::Failed { reason, .. } => {
                Some(*reason)
            }
        }
    }

    pub fn contract_id(&self) -> Option<&str> {
        match self {
            SubmitOutcome::Committed { contract_id, .. }
            | SubmitOutcome::Pending { contract_id }
            | SubmitOutcome::Failed { contract_id, .. } => Some(contract_id),
            SubmitOutcome::Rejected { .. } => None,
        }
    }

    pub fn record(&self) -> Option<&TenderRecord> {
        match self {
            SubmitOutcome::Committed { record, .. } => Some(record),
            _ => None,
        }
    }
}

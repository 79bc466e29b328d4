use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::outcome::FailureReason;
use crate::outcome::VerifyReport;
use crate::record::TenderRecord;
use crate::record::TenderStore;

/// Messages producers and the popup send to the aggregator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundMessage {
    /// Raw candidate record; must carry a non-empty `contract_id`.
    StoreTenderData { data: Value },
    GetAllData,
    VerifyStorage { contract_id: String },
    ClearAllData,
    ExportBackup { directory: PathBuf },
}

/// Broadcasts from the aggregator to whoever is listening.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    DataUpdated {
        contract_id: String,
        data: TenderRecord,
    },
}

/// One framed request line. `id` is echoed back unchanged.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Request {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(flatten)]
    pub message: InboundMessage,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,

    #[serde(flatten)]
    pub body: ResponseBody,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Ack(Acknowledgement),
    Snapshot { data: TenderStore },
    Verify(VerifyReport),
    Backup { success: bool, path: PathBuf },
}

/// Acceptance (not completion) of a request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Acknowledgement {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<FailureReason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Acknowledgement {
    pub fn accepted(contract_id: Option<String>) -> Self {
        Self {
            success: true,
            contract_id,
            ..Default::default()
        }
    }

    pub fn rejected(reason: FailureReason, error: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason),
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

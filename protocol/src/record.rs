use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde_json::Map;
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::outcome::FailureReason;

/// The whole aggregate: contract id -> canonical record.
pub type TenderStore = BTreeMap<String, TenderRecord>;

/// Trimmed, non-empty contract identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractIdError {
    #[error("No contract_id provided")]
    Missing,

    #[error("Empty contract_id after trimming")]
    Empty,

    #[error("contract_id must be a string, got {0}")]
    NotAString(&'static str),

    #[error("record must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

impl ContractIdError {
    pub fn reason(&self) -> FailureReason {
        match self {
            ContractIdError::Missing => FailureReason::MissingContractId,
            ContractIdError::Empty => FailureReason::EmptyContractId,
            ContractIdError::NotAString(_) | ContractIdError::NotAnObject(_) => {
                FailureReason::MalformedRecord
            }
        }
    }
}

impl ContractId {
    pub fn parse(raw: &str) -> Result<Self, ContractIdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ContractIdError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Pull the key out of a raw producer record.
    pub fn extract(raw: &Value) -> Result<Self, ContractIdError> {
        let Value::Object(fields) = raw else {
            return Err(ContractIdError::NotAnObject(json_kind(raw)));
        };
        match fields.get("contract_id") {
            None | Some(Value::Null) => Err(ContractIdError::Missing),
            Some(Value::String(id)) => Self::parse(id),
            Some(other) => Err(ContractIdError::NotAString(json_kind(other))),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which page type contributed to a record.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Provenance {
    SearchPage,
    TenderPage,
    ContractPage,
}

impl Provenance {
    /// Map a producer's `source_page` marker.
    pub fn from_source_page(page: &str) -> Option<Self> {
        match page.trim() {
            "search" => Some(Self::SearchPage),
            "tender" => Some(Self::TenderPage),
            "contract" => Some(Self::ContractPage),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Supplier {
    #[serde(default, deserialize_with = "lenient_name")]
    pub supplier_name: String,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub abn: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_text"
    )]
    pub acn: Option<String>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Supplier {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            supplier_name: name.into(),
            ..Default::default()
        }
    }
}

/// Canonical record for one contract.
///
/// Every scalar is optional: a producer only fills the fields its page type
/// shows. Fields no producer is known to send land in `extra`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TenderRecord {
    #[serde(default, deserialize_with = "lenient_name")]
    pub contract_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub body_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub opened_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub closed_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text_list")]
    pub contact_name: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub contact_email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub started_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub expired_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub contract_value: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub number_of_submissions: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub source_page: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text")]
    pub last_updated: Option<String>,

    /// Present but malformed input decodes as an empty list.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_suppliers")]
    pub suppliers: Option<Vec<Supplier>>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_text_list")]
    pub categories: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "BTreeSet::is_empty", deserialize_with = "lenient_provenance")]
    pub provenance: BTreeSet<Provenance>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_timestamp",
        deserialize_with = "lenient_timestamp"
    )]
    pub last_processed: Option<OffsetDateTime>,

    /// Milliseconds between submission and merge.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient_millis")]
    pub processing_time: Option<u64>,

    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl TenderRecord {
    pub fn new(contract_id: &ContractId) -> Self {
        Self {
            contract_id: contract_id.as_str().to_string(),
            ..Default::default()
        }
    }

    /// Decode a (sanitized) producer record.
    ///
    /// Legacy page markers (`tender: true`, `contract: true`, `source_page`)
    /// are folded into [`TenderRecord::provenance`] before decoding.
    pub fn from_value(mut value: Value) -> serde_json::Result<Self> {
        if let Value::Object(fields) = &mut value {
            absorb_page_markers(fields);
        }
        serde_json::from_value(value)
    }

    pub fn supplier_count(&self) -> usize {
        self.suppliers.as_ref().map_or(0, Vec::len)
    }

    pub fn category_count(&self) -> usize {
        self.categories.as_ref().map_or(0, Vec::len)
    }
}

fn absorb_page_markers(fields: &mut Map<String, Value>) {
    let mut seen = Vec::new();
    if matches!(fields.remove("tender"), Some(Value::Bool(true))) {
        seen.push(Provenance::TenderPage);
    }
    if matches!(fields.remove("contract"), Some(Value::Bool(true))) {
        seen.push(Provenance::ContractPage);
    }
    if let Some(page) = fields
        .get("source_page")
        .and_then(Value::as_str)
        .and_then(Provenance::from_source_page)
    {
        seen.push(page);
    }
    if seen.is_empty() {
        return;
    }

    let markers = seen.into_iter().map(|p| Value::String(p.to_string()));
    match fields.get_mut("provenance") {
        Some(Value::Array(existing)) => existing.extend(markers),
        _ => {
            fields.insert("provenance".to_string(), Value::Array(markers.collect()));
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn text_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(text_from_value))
}

fn lenient_name<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_text(deserializer)?.unwrap_or_default())
}

fn lenient_text_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.map(|value| match value {
        Value::Array(items) => items.into_iter().filter_map(text_from_value).collect(),
        Value::String(single) => vec![single],
        _ => Vec::new(),
    }))
}

fn lenient_suppliers<'de, D>(deserializer: D) -> Result<Option<Vec<Supplier>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.map(|value| match value {
        Value::Array(items) => items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => Vec::new(),
    }))
}

fn lenient_provenance<'de, D>(deserializer: D) -> Result<BTreeSet<Provenance>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| serde_json::from_value(item).ok())
            .collect(),
        _ => BTreeSet::new(),
    })
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .and_then(|value| value.as_str().map(str::to_owned))
        .and_then(|text| OffsetDateTime::parse(&text, &Rfc3339).ok()))
}

fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?.and_then(|value| value.as_u64()))
}

fn serialize_timestamp<S>(value: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(timestamp) => {
            let text = timestamp
                .format(&Rfc3339)
                .map_err(serde::ser::Error::custom)?;
            serializer.serialize_some(&text)
        }
        None => serializer.serialize_none(),
    }
}

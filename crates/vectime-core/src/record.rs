//! Record types and upsert-batch normalization.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::VectimeError;

/// Primary key of a record: a time-ordered UUID or an opaque text key,
/// matching the table's configured id kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Uuid(Uuid),
    Text(String),
}

impl From<Uuid> for RecordId {
    fn from(id: Uuid) -> Self {
        RecordId::Uuid(id)
    }
}

impl From<String> for RecordId {
    fn from(id: String) -> Self {
        RecordId::Text(id)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        RecordId::Text(id.to_string())
    }
}

/// Record metadata, either as a structured JSON object or as pre-serialized
/// JSON text.
///
/// One upsert batch must use a single representation throughout; mixing the
/// two fails before any row is sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metadata {
    Object(Map<String, Value>),
    Json(String),
}

impl Metadata {
    /// An empty metadata object.
    pub fn empty() -> Self {
        Metadata::Object(Map::new())
    }

    /// Build from any JSON value; non-objects are rejected.
    pub fn from_value(value: Value) -> Result<Self, VectimeError> {
        match value {
            Value::Object(map) => Ok(Metadata::Object(map)),
            other => Err(VectimeError::MalformedInput(format!(
                "metadata must be a JSON object, got {other}"
            ))),
        }
    }

    fn is_object(&self) -> bool {
        matches!(self, Metadata::Object(_))
    }

    /// The metadata as a JSON document. Pre-serialized text is validated
    /// here so malformed documents fail before any row is sent.
    pub fn to_document(&self) -> Result<Value, VectimeError> {
        match self {
            Metadata::Object(map) => Ok(Value::Object(map.clone())),
            Metadata::Json(text) => serde_json::from_str(text).map_err(|e| {
                VectimeError::MalformedInput(format!("metadata is not valid JSON: {e}"))
            }),
        }
    }
}

/// One row of the vector table: key, metadata document, free-text contents,
/// and the embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub metadata: Metadata,
    pub contents: String,
    pub embedding: Vec<f32>,
}

impl Record {
    pub fn new(
        id: impl Into<RecordId>,
        metadata: Metadata,
        contents: impl Into<String>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            metadata,
            contents: contents.into(),
            embedding,
        }
    }
}

/// Normalize an upsert batch, returning each record's metadata as a JSON
/// document in input order.
///
/// Fails if the batch mixes structured-object and pre-serialized-JSON
/// metadata, or if any pre-serialized text is not valid JSON.
pub fn munge_records(records: &[Record]) -> Result<Vec<Value>, VectimeError> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };
    let object_form = first.metadata.is_object();
    records
        .iter()
        .map(|record| {
            if record.metadata.is_object() != object_form {
                return Err(VectimeError::MalformedInput(
                    "cannot mix object and pre-serialized JSON metadata in the same upsert"
                        .to_string(),
                ));
            }
            record.metadata.to_document()
        })
        .collect()
}

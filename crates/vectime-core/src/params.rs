use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

/// A positional query parameter, referenced as `$n` (1-based) in compiled
/// query text.
///
/// Every compiled fragment appends its parameters strictly at the end of the
/// shared list and references them by the resulting position; nothing ever
/// renumbers or reorders. This is what allows independently compiled
/// fragments (filter, predicates, time range) to be concatenated into one
/// statement.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Text(String),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    /// A JSON document bound against a `jsonb` expression.
    Jsonb(Value),
    /// JSON documents for a `= ANY($n::jsonb[])` match.
    JsonbArray(Vec<Value>),
    /// The query embedding vector.
    Embedding(Vec<f32>),
    /// UUID keys for delete-by-ids on a UUID-keyed table.
    UuidArray(Vec<Uuid>),
    /// Text keys for delete-by-ids on a text-keyed table.
    TextArray(Vec<String>),
}

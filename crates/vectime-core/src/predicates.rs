//! Composable boolean predicates over record metadata.
//!
//! A [`Predicates`] value is a tree: leaves compare a metadata field (or the
//! key's embedded timestamp) against a value, and composite nodes combine
//! children with AND/OR/NOT. Trees compile to parameterized WHERE fragments
//! that share one positional parameter list with the rest of the statement.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::VectimeError;
use crate::params::QueryParam;
use crate::quoting::quote_literal;

/// Predicate field name that routes comparisons to the timestamp embedded in
/// the version-1 UUID key instead of a metadata field.
pub const UUID_TIMESTAMP_FIELD: &str = "__uuid_timestamp";

// ---------------------------------------------------------------------------
// PredicateValue
// ---------------------------------------------------------------------------

/// A value on the right-hand side of a predicate clause.
///
/// The variant drives the cast applied to the metadata field text: integers
/// compare as `::int`, floats as `::numeric`, timestamps as `::timestamptz`,
/// and text compares uncast. Lists are only valid with the containment
/// operator.
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateValue {
    Text(String),
    Int(i64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    List(Vec<PredicateValue>),
}

impl PredicateValue {
    fn to_json(&self) -> Value {
        match self {
            PredicateValue::Text(s) => Value::String(s.clone()),
            PredicateValue::Int(i) => Value::from(*i),
            PredicateValue::Float(f) => Value::from(*f),
            PredicateValue::Timestamp(t) => Value::String(t.to_rfc3339()),
            PredicateValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
        }
    }

    fn cast_suffix(&self) -> &'static str {
        match self {
            PredicateValue::Int(_) => "::int",
            PredicateValue::Float(_) => "::numeric",
            PredicateValue::Timestamp(_) => "::timestamptz",
            _ => "",
        }
    }
}

impl From<&str> for PredicateValue {
    fn from(value: &str) -> Self {
        PredicateValue::Text(value.to_string())
    }
}

impl From<String> for PredicateValue {
    fn from(value: String) -> Self {
        PredicateValue::Text(value)
    }
}

impl From<i64> for PredicateValue {
    fn from(value: i64) -> Self {
        PredicateValue::Int(value)
    }
}

impl From<i32> for PredicateValue {
    fn from(value: i32) -> Self {
        PredicateValue::Int(value as i64)
    }
}

impl From<f64> for PredicateValue {
    fn from(value: f64) -> Self {
        PredicateValue::Float(value)
    }
}

impl From<DateTime<Utc>> for PredicateValue {
    fn from(value: DateTime<Utc>) -> Self {
        PredicateValue::Timestamp(value)
    }
}

impl<V: Into<PredicateValue>> From<Vec<V>> for PredicateValue {
    fn from(values: Vec<V>) -> Self {
        PredicateValue::List(values.into_iter().map(Into::into).collect())
    }
}

// ---------------------------------------------------------------------------
// PredicateOp
// ---------------------------------------------------------------------------

/// Comparison operator of a leaf clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    Eq,
    Gte,
    Gt,
    Lte,
    Lt,
    Ne,
    /// JSON containment (`@>`), for list-valued metadata fields.
    Contains,
}

impl PredicateOp {
    /// Resolve an operator token. `==` aliases `=`; `!=` maps to SQL `<>`.
    pub fn parse_token(token: &str) -> Result<Self, VectimeError> {
        match token {
            "=" | "==" => Ok(PredicateOp::Eq),
            ">=" => Ok(PredicateOp::Gte),
            ">" => Ok(PredicateOp::Gt),
            "<=" => Ok(PredicateOp::Lte),
            "<" => Ok(PredicateOp::Lt),
            "!=" => Ok(PredicateOp::Ne),
            "@>" => Ok(PredicateOp::Contains),
            other => Err(VectimeError::MalformedInput(format!(
                "invalid operator: {other}"
            ))),
        }
    }

    fn sql(self) -> &'static str {
        match self {
            PredicateOp::Eq => "=",
            PredicateOp::Gte => ">=",
            PredicateOp::Gt => ">",
            PredicateOp::Lte => "<=",
            PredicateOp::Lt => "<",
            PredicateOp::Ne => "<>",
            PredicateOp::Contains => "@>",
        }
    }
}

// ---------------------------------------------------------------------------
// Clause
// ---------------------------------------------------------------------------

/// One clause of a predicate tree: either a nested tree or a field
/// comparison. The shape is resolved once at construction and never
/// re-inspected.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    Nested(Predicates),
    Condition {
        field: String,
        op: PredicateOp,
        value: PredicateValue,
    },
}

impl Clause {
    /// An equality clause (the default operator).
    pub fn new(field: impl Into<String>, value: impl Into<PredicateValue>) -> Self {
        Clause::Condition {
            field: field.into(),
            op: PredicateOp::Eq,
            value: value.into(),
        }
    }

    /// A clause with an explicit operator token, validated immediately.
    pub fn with_op(
        field: impl Into<String>,
        op_token: &str,
        value: impl Into<PredicateValue>,
    ) -> Result<Self, VectimeError> {
        Ok(Clause::Condition {
            field: field.into(),
            op: PredicateOp::parse_token(op_token)?,
            value: value.into(),
        })
    }

    /// A clause with an already-typed operator.
    pub fn compare(
        field: impl Into<String>,
        op: PredicateOp,
        value: impl Into<PredicateValue>,
    ) -> Self {
        Clause::Condition {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

impl From<Predicates> for Clause {
    fn from(predicates: Predicates) -> Self {
        Clause::Nested(predicates)
    }
}

// ---------------------------------------------------------------------------
// Predicates
// ---------------------------------------------------------------------------

/// Logical operator of a composite node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
    Not,
}

/// A composable tree of predicate clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicates {
    op: LogicalOp,
    clauses: Vec<Clause>,
}

impl Predicates {
    /// A conjunction of the given clauses.
    pub fn all(clauses: impl IntoIterator<Item = Clause>) -> Self {
        Self::with_operator(LogicalOp::And, clauses)
    }

    /// A disjunction of the given clauses.
    pub fn any(clauses: impl IntoIterator<Item = Clause>) -> Self {
        Self::with_operator(LogicalOp::Or, clauses)
    }

    /// A composite with an explicit logical operator.
    pub fn with_operator(op: LogicalOp, clauses: impl IntoIterator<Item = Clause>) -> Self {
        Self {
            op,
            clauses: clauses.into_iter().collect(),
        }
    }

    /// Append a clause to this node.
    pub fn add_clause(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    /// Combine with another tree under AND. Neither operand is mutated;
    /// both become children of a new node.
    pub fn and_with(self, other: Predicates) -> Predicates {
        Predicates::with_operator(LogicalOp::And, [Clause::Nested(self), Clause::Nested(other)])
    }

    /// Combine with another tree under OR.
    pub fn or_with(self, other: Predicates) -> Predicates {
        Predicates::with_operator(LogicalOp::Or, [Clause::Nested(self), Clause::Nested(other)])
    }

    /// Negate this tree.
    ///
    /// Negation compiles the node's direct children's OR-joined conditions
    /// and wraps them as `TRUE IS DISTINCT FROM (...)`: with three-valued
    /// logic a NULL (absent) field makes the inner conditions NULL, which is
    /// distinct from TRUE, so rows missing the field match the negation
    /// instead of disappearing. Nested composites contribute their whole
    /// fragment as a single disjunct; the negation is not distributed
    /// through them.
    pub fn negate(self) -> Predicates {
        Predicates::with_operator(LogicalOp::Not, [Clause::Nested(self)])
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Compile to a WHERE fragment, appending parameters to `params`.
    ///
    /// An empty clause list compiles to an empty fragment with `params`
    /// untouched; callers omit empty fragments from the surrounding
    /// conjunction. Parameter numbering is 1-based and continues from
    /// `params.len()`.
    pub fn compile(&self, params: &mut Vec<QueryParam>) -> Result<String, VectimeError> {
        if self.clauses.is_empty() {
            return Ok(String::new());
        }

        let mut conditions = Vec::with_capacity(self.clauses.len());
        for clause in &self.clauses {
            match clause {
                Clause::Nested(child) => {
                    let fragment = child.compile(params)?;
                    if !fragment.is_empty() {
                        conditions.push(format!("({fragment})"));
                    }
                }
                Clause::Condition { field, op, value } => {
                    conditions.push(Self::compile_condition(field, *op, value, params)?);
                }
            }
        }

        if conditions.is_empty() {
            return Ok(String::new());
        }

        Ok(match self.op {
            // IS DISTINCT FROM treats all-NULL conditions as false, so rows
            // lacking the field pass the negated filter.
            LogicalOp::Not => format!("TRUE IS DISTINCT FROM ({})", conditions.join(" OR ")),
            LogicalOp::And => conditions.join(" AND "),
            LogicalOp::Or => conditions.join(" OR "),
        })
    }

    fn compile_condition(
        field: &str,
        op: PredicateOp,
        value: &PredicateValue,
        params: &mut Vec<QueryParam>,
    ) -> Result<String, VectimeError> {
        if field == UUID_TIMESTAMP_FIELD {
            return Ok(match value {
                // Let the database parse the string; its timestamp parser is
                // authoritative.
                PredicateValue::Text(s) => {
                    params.push(QueryParam::Text(s.clone()));
                    format!(
                        "uuid_timestamp(id) {} (${}::text)::timestamptz",
                        op.sql(),
                        params.len()
                    )
                }
                PredicateValue::Timestamp(t) => {
                    params.push(QueryParam::Timestamp(*t));
                    format!("uuid_timestamp(id) {} ${}", op.sql(), params.len())
                }
                other => {
                    return Err(VectimeError::MalformedInput(format!(
                        "{UUID_TIMESTAMP_FIELD} requires a timestamp or string value, got {other:?}"
                    )));
                }
            });
        }

        if op == PredicateOp::Contains {
            if let PredicateValue::List(items) = value {
                if items.is_empty() {
                    return Err(VectimeError::MalformedInput(
                        "containment against an empty list is not supported".to_string(),
                    ));
                }
                params.push(QueryParam::Jsonb(value.to_json()));
                return Ok(format!(
                    "metadata @> jsonb_build_object({}, ${}::jsonb)",
                    quote_literal(field),
                    params.len()
                ));
            }
        }

        let cast = value.cast_suffix();
        let param = match value {
            PredicateValue::Text(s) => QueryParam::Text(s.clone()),
            PredicateValue::Int(i) => QueryParam::Int(*i),
            PredicateValue::Float(f) => QueryParam::Float(*f),
            PredicateValue::Timestamp(t) => QueryParam::Timestamp(*t),
            PredicateValue::List(_) => {
                return Err(VectimeError::MalformedInput(format!(
                    "list values require the @> operator (field {field})"
                )));
            }
        };
        params.push(param);
        Ok(format!(
            "(metadata->>{}){cast} {} ${}",
            quote_literal(field),
            op.sql(),
            params.len()
        ))
    }
}

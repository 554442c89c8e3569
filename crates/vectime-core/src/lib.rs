//! Query compilation core for the vectime PostgreSQL vector client.
//!
//! This crate is the pure half of vectime: it turns structured search,
//! upsert, delete, and setup requests into parameterized SQL for a
//! PostgreSQL database running pgvector (and optionally pgvectorscale and
//! TimescaleDB). It never touches a connection; the `vectime` crate
//! supplies the execution backends.
//!
//! The pieces compose around one rule: compiled fragments share a single
//! positional parameter list, and every fragment appends its parameters
//! strictly at the end, referencing them as `$n` by resulting position.
//! That lets a metadata [`Filter`], a [`Predicates`] tree, and a
//! [`UuidTimeRange`] — each compiled independently — concatenate into one
//! statement.
//!
//! # Quick start
//!
//! ```rust
//! use vectime_core::{Clause, Predicates, QueryBuilder, TableConfig};
//!
//! # fn example() -> Result<(), vectime_core::VectimeError> {
//! let builder = QueryBuilder::new(TableConfig::new("documents", 1536))?;
//! let predicates = Predicates::all([
//!     Clause::new("category", "blog"),
//!     Clause::with_op("views", ">=", 100)?,
//! ]);
//! let (sql, params) =
//!     builder.search_query(Some(&[0.0; 1536]), 10, None, Some(&predicates), None)?;
//! assert!(sql.contains("ORDER BY embedding <=> $1 ASC"));
//! assert_eq!(params.len(), 3);
//! # Ok(())
//! # }
//! ```

mod builder;
mod error;
mod index;
mod params;
mod predicates;
mod quoting;
mod record;
mod time_range;
mod uuid_time;

pub use builder::{
    DistanceType, Filter, IdKind, QueryBuilder, TableConfig, END_DATE_FILTER_KEY,
    START_DATE_FILTER_KEY,
};
pub use error::VectimeError;
pub use index::{DiskAnnIndex, HnswIndex, Index, IvfflatIndex, QueryParams};
pub use params::QueryParam;
pub use predicates::{
    Clause, LogicalOp, PredicateOp, PredicateValue, Predicates, UUID_TIMESTAMP_FIELD,
};
pub use quoting::{quote_ident, quote_literal};
pub use record::{munge_records, Metadata, Record, RecordId};
pub use time_range::{parse_datetime, UuidTimeRange};
pub use uuid_time::{uuid_from_local_naive_time, uuid_from_time, uuid_now};

//! Time-range predicate over the timestamp embedded in version-1 UUID keys.

use std::fmt;

use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

use crate::error::VectimeError;
use crate::params::QueryParam;

/// Parse an ISO-8601 datetime string.
///
/// Strings carrying a zone offset are converted to UTC; zone-less strings
/// are interpreted in the caller's local zone first, matching the treatment
/// of naive instants everywhere else in this crate.
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>, VectimeError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S%.f"))
        .or_else(|_| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|_| {
            VectimeError::MalformedInput(format!("invalid datetime string format: {input}"))
        })?;
    match chrono::Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(VectimeError::MalformedInput(format!(
            "datetime {input} does not exist in the local time zone"
        ))),
    }
}

/// An inclusive/exclusive bound pair over the timestamp embedded in a
/// version-1 UUID key.
///
/// At least one bound must be present. The start bound is inclusive and the
/// end bound exclusive by default, so adjacent ranges tile without overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UuidTimeRange {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    start_inclusive: bool,
    end_inclusive: bool,
}

impl UuidTimeRange {
    /// A range from explicit bounds.
    pub fn new(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Self, VectimeError> {
        Self::build(start, end, None)
    }

    /// A range where the missing bound is derived from the present one plus
    /// (or minus) `delta`. Supplying both bounds together with a delta is an
    /// error.
    pub fn with_duration(
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        delta: Duration,
    ) -> Result<Self, VectimeError> {
        Self::build(start, end, Some(delta))
    }

    /// A range from ISO-8601 strings, parsed with [`parse_datetime`].
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, VectimeError> {
        Self::build(
            start.map(parse_datetime).transpose()?,
            end.map(parse_datetime).transpose()?,
            None,
        )
    }

    fn build(
        start: Option<DateTime<Utc>>,
        mut end: Option<DateTime<Utc>>,
        delta: Option<Duration>,
    ) -> Result<Self, VectimeError> {
        let mut start = start;
        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(VectimeError::MalformedInput(
                    "start_date must be before end_date".to_string(),
                ));
            }
        }
        if start.is_none() && end.is_none() {
            return Err(VectimeError::MalformedInput(
                "start_date and end_date cannot both be None".to_string(),
            ));
        }
        if let Some(delta) = delta {
            match (start, end) {
                (Some(s), None) => end = Some(s + delta),
                (None, Some(e)) => start = Some(e - delta),
                _ => {
                    return Err(VectimeError::MalformedInput(
                        "time_delta, start_date and end_date cannot all be specified at the same time"
                            .to_string(),
                    ));
                }
            }
        }
        Ok(Self {
            start,
            end,
            start_inclusive: true,
            end_inclusive: false,
        })
    }

    /// Make the start bound inclusive or exclusive (inclusive by default).
    pub fn start_inclusive(mut self, inclusive: bool) -> Self {
        self.start_inclusive = inclusive;
        self
    }

    /// Make the end bound inclusive or exclusive (exclusive by default).
    pub fn end_inclusive(mut self, inclusive: bool) -> Self {
        self.end_inclusive = inclusive;
        self
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Compile to a WHERE fragment against the decoded key timestamp,
    /// appending one parameter per present bound.
    ///
    /// Numbering continues from `params.len()`, so the fragment composes
    /// with other fragments sharing the same parameter list.
    pub fn compile(&self, params: &mut Vec<QueryParam>) -> String {
        let column = "uuid_timestamp(id)";
        let mut conditions = Vec::new();
        if let Some(start) = self.start {
            let op = if self.start_inclusive { ">=" } else { ">" };
            params.push(QueryParam::Timestamp(start));
            conditions.push(format!("{column} {op} ${}", params.len()));
        }
        if let Some(end) = self.end {
            let op = if self.end_inclusive { "<=" } else { "<" };
            params.push(QueryParam::Timestamp(end));
            conditions.push(format!("{column} {op} ${}", params.len()));
        }
        conditions.join(" AND ")
    }
}

impl fmt::Display for UuidTimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.start_inclusive { '[' } else { '(' };
        let close = if self.end_inclusive { ']' } else { ')' };
        let fmt_bound = |b: Option<DateTime<Utc>>| match b {
            Some(dt) => dt.to_rfc3339(),
            None => "None".to_string(),
        };
        write!(
            f,
            "{open}{}, {}{close}",
            fmt_bound(self.start),
            fmt_bound(self.end)
        )
    }
}

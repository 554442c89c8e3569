//! Version-1 UUID codec for time-ordered record keys.
//!
//! Record ids encode their creation instant in the RFC 4122 version-1
//! layout, which lets time-range queries run against the primary key alone.
//! The inverse (timestamp extraction) happens inside the database via the
//! `uuid_timestamp` SQL function installed by table setup; this module only
//! encodes.

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::error::VectimeError;

/// Number of 100 ns intervals between the UUID epoch (1582-10-15) and the
/// Unix epoch (1970-01-01).
const GREGORIAN_OFFSET: i64 = 0x01B2_1DD2_1381_4000;

/// Build a version-1 UUID whose timestamp field encodes `time`.
///
/// `node` supplies the 48-bit node field (wider values are masked) and
/// `clock_seq` the 14-bit clock sequence; both are randomized when absent.
/// An explicit `clock_seq` of 2^14 or more fails with
/// [`VectimeError::MalformedInput`].
pub fn uuid_from_time(
    time: DateTime<Utc>,
    node: Option<u64>,
    clock_seq: Option<u16>,
) -> Result<Uuid, VectimeError> {
    let clock_seq = match clock_seq {
        Some(cs) if cs > 0x3FFF => {
            return Err(VectimeError::MalformedInput(format!(
                "clock_seq {cs} is out of range (need a 14-bit value)"
            )));
        }
        Some(cs) => cs,
        None => rand::thread_rng().gen::<u16>() & 0x3FFF,
    };
    let node = node.unwrap_or_else(|| rand::thread_rng().gen::<u64>()) & 0xFFFF_FFFF_FFFF;
    Ok(encode(time, node, clock_seq))
}

/// A version-1 UUID for the current instant with random node and clock
/// sequence.
pub fn uuid_now() -> Uuid {
    let mut rng = rand::thread_rng();
    encode(
        Utc::now(),
        rng.gen::<u64>() & 0xFFFF_FFFF_FFFF,
        rng.gen::<u16>() & 0x3FFF,
    )
}

/// Like [`uuid_from_time`], for a zone-less instant.
///
/// The naive value is interpreted in the caller's local zone and converted
/// to UTC before encoding, because the database stores and compares
/// timestamps in UTC.
pub fn uuid_from_local_naive_time(
    naive: NaiveDateTime,
    node: Option<u64>,
    clock_seq: Option<u16>,
) -> Result<Uuid, VectimeError> {
    let local = match chrono::Local.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            return Err(VectimeError::MalformedInput(format!(
                "datetime {naive} does not exist in the local time zone"
            )));
        }
    };
    uuid_from_time(local.with_timezone(&Utc), node, clock_seq)
}

fn encode(time: DateTime<Utc>, node: u64, clock_seq: u16) -> Uuid {
    let intervals = (time.timestamp_micros() * 10 + GREGORIAN_OFFSET) as u64;

    let time_low = (intervals & 0xFFFF_FFFF) as u32;
    let time_mid = ((intervals >> 32) & 0xFFFF) as u16;
    let time_hi_version = (((intervals >> 48) & 0x0FFF) as u16) | (1 << 12);

    let clock_seq_hi_variant = 0x80 | ((clock_seq >> 8) as u8 & 0x3F);
    let clock_seq_low = (clock_seq & 0xFF) as u8;
    let node_bytes = node.to_be_bytes();

    Uuid::from_fields(
        time_low,
        time_mid,
        time_hi_version,
        &[
            clock_seq_hi_variant,
            clock_seq_low,
            node_bytes[2],
            node_bytes[3],
            node_bytes[4],
            node_bytes[5],
            node_bytes[6],
            node_bytes[7],
        ],
    )
}

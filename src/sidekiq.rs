//! Helpers for the identifiers and timestamps Sidekiq expects.

use std::fmt::Write;

use chrono::{DateTime, TimeZone, Utc};
use rand::{rngs::OsRng, RngCore};

/// Generates a job ID: 12 bytes from the OS random number generator,
/// rendered as 24 lowercase hex digits.
pub(crate) fn job_id() -> String {
    let mut bytes = [0u8; 12];
    OsRng.fill_bytes(&mut bytes);

    let mut id = String::with_capacity(bytes.len() * 2);
    for b in &bytes {
        write!(id, "{:02x}", b).unwrap();
    }
    id
}

/// Converts a time to the floating point value used in job payloads
/// (Time#to_f in Ruby).
pub(crate) fn to_float(t: DateTime<Utc>) -> f64 {
    t.timestamp_nanos() as f64 / 1e9
}

/// Converts a floating point time value from a job payload back to a time.
pub(crate) fn to_time(f: f64) -> DateTime<Utc> {
    Utc.timestamp_nanos((f * 1e9) as i64)
}

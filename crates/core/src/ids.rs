//! Identifier generation for stored entities.
//!
//! All random material comes from `rand::thread_rng`, which is a CSPRNG
//! reseeded from the operating system.

use chrono::{DateTime, Utc};
use rand::RngCore;
use uuid::Uuid;

const RANDOM_SUFFIX_BYTES: usize = 8;
const SORTABLE_RANDOM_BYTES: usize = 4;
const SESSION_TOKEN_BYTES: usize = 32;

/// `<prefix>_<16 hex chars>`.
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}_{}", random_hex(RANDOM_SUFFIX_BYTES))
}

/// `<prefix>_<12 hex ms timestamp><8 hex random>`; lexical order follows creation time.
pub fn generate_sortable_id(prefix: &str, now: DateTime<Utc>) -> String {
    let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
    format!("{prefix}_{millis:012x}{}", random_hex(SORTABLE_RANDOM_BYTES))
}

/// Bucket key for daily aggregation, e.g. `LOG#2026-03-01`.
pub fn daily_bucket(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}#{}", at.format("%Y-%m-%d"))
}

pub fn generate_uuid() -> String {
    Uuid::new_v4().to_string()
}

pub fn generate_session_token() -> String {
    random_hex(SESSION_TOKEN_BYTES)
}

fn random_hex(len: usize) -> String {
    let mut bytes = vec![0_u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

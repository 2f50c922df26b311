//! Database row types — these map directly to SQLite rows.
//! Distinct from the banter-types wire shapes to keep the DB layer
//! independent.

use chrono::{DateTime, Utc};
use tracing::warn;

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub author_id: String,
    pub author_username: String,
    pub text: String,
    pub created_at: String,
}

impl MessageRow {
    /// The stored timestamp is authoritative for ordering; parse it once
    /// here so the REST and streaming paths agree on the value.
    pub fn timestamp(&self) -> DateTime<Utc> {
        parse_timestamp(&self.created_at, self.id)
    }
}

/// Canonical record returned by an insert: the store-assigned id and
/// timestamp, plus the text exactly as persisted.
#[derive(Debug)]
pub struct StoredMessage {
    pub id: i64,
    pub text: String,
    pub created_at: String,
}

impl StoredMessage {
    pub fn timestamp(&self) -> DateTime<Utc> {
        parse_timestamp(&self.created_at, self.id)
    }
}

pub(crate) fn parse_timestamp(raw: &str, message_id: i64) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            // Rows written by SQLite's datetime('now') lack a timezone.
            // Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on message {}: {}", raw, message_id, e);
            DateTime::default()
        })
}

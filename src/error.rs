use thiserror::Error;

use crate::storage::entities::SessionRecord;

/// Errors surfaced by the session core. None of them are fatal to the process.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("a session is already active")]
    AlreadyActive,
    #[error("intervals must be positive, got short={short}s long={long}s")]
    InvalidInterval { short: u64, long: u64 },
    #[error("failed to persist session history: {0:#}")]
    Persistence(#[source] anyhow::Error),
    /// The record made it into history, only trimming old entries failed.
    #[error("session {record} was saved but compacting history failed: {source:#}")]
    Compaction {
        record: SessionRecord,
        #[source]
        source: anyhow::Error,
    },
}

/// A single history line that couldn't be understood. Only ever logged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordParseError {
    #[error("missing '|' separator")]
    MissingSeparator,
    #[error("invalid date {0:?}")]
    InvalidDate(String),
    #[error("invalid minutes {0:?}")]
    InvalidMinutes(String),
}

//! Error taxonomy for the ingestion pipeline.
//!
//! Record-level errors (`MalformedSource`, `NormalizeError`, `ResolveError`)
//! skip a single record and land in the run report. `GatewayError` is the only
//! error that aborts a batch.

use thiserror::Error;

/// A raw payload or record is missing fields the adapter requires.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed {source_name} record ({key}): {reason}")]
pub struct MalformedSource {
    pub source_name: &'static str,
    pub key: String,
    pub reason: String,
}

impl MalformedSource {
    pub fn new(source_name: &'static str, key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            source_name,
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("unrecognized date format: {0:?}")]
    DateFormat(String),
    #[error("untranslated nationality: {0:?}")]
    UnknownNationality(String),
    #[error("unknown position: {0:?}")]
    UnknownPosition(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("no persisted entity matches {0:?}")]
    NoMatchFound(String),
    #[error("{candidate:?} matches several persisted entities: {matches:?}")]
    AmbiguousMatch {
        candidate: String,
        matches: Vec<String>,
    },
}

/// Store-level failure (connectivity, constraint, serialization).
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("relational store error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("document store error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("document encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// Any failure that removes a single record from a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error(transparent)]
    Malformed(#[from] MalformedSource),
    #[error(transparent)]
    Normalize(#[from] NormalizeError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

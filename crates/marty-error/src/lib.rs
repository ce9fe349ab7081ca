//! Error types for the source inspector, history store and capture engine.
//!
//! Mirrors the enum-per-subsystem style used throughout `spacetimedb-core`'s
//! `error.rs`: one `thiserror` enum per component, variants named after the
//! failure rather than wrapping a single catch-all string.

use thiserror::Error;

/// Errors raised while querying the source replica.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("database error querying source: {0}")]
    Database(#[from] tokio_postgres::Error),
    #[error("source row for ctid {0} has an unexpected column shape")]
    MalformedRow(String),
}

/// Errors raised while writing to or reading from the history store.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("database error on history store: {0}")]
    Database(#[from] tokio_postgres::Error),
    #[error("identifier `{0}` is not safe to interpolate into SQL")]
    UnsafeIdentifier(String),
    #[error("invariant violation: duplicate live catalog row for ctid {0}")]
    DuplicateLiveRow(String),
}

/// Errors raised by the capture engine while draining a transaction.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    History(#[from] HistoryError),
    #[error("history store drain failed after {attempts} attempt(s): {source}")]
    DrainFailed {
        attempts: u32,
        #[source]
        source: HistoryError,
    },
}

/// Errors raised while populating the clone database.
#[derive(Error, Debug)]
pub enum CloneError {
    #[error("database error on clone database: {0}")]
    Database(tokio_postgres::Error),
    #[error("database error on history store: {0}")]
    History(tokio_postgres::Error),
    #[error("identifier `{0}` is not safe to interpolate into SQL")]
    UnsafeIdentifier(String),
}

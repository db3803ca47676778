//! # Collaborator Error Types
//!
//! Errors raised by the parties around the pool rather than by the pool
//! itself. The pool never retries on any of these: a failed item is logged
//! and dropped, a failed source ends the run loop.

use thiserror::Error;

/// Failure while processing a single update.
#[derive(Error, Debug)]
pub enum HandlerError {
    /// The handler ran but could not complete the item.
    #[error("Update handling failed: {0}")]
    Failed(String),

    /// The handler refused the item without processing it.
    #[error("Update rejected: {0}")]
    Rejected(String),

    /// The handler panicked; the payload message is preserved.
    #[error("Handler panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of an update source.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Every producer is gone; the source will never yield again.
    #[error("Update source is closed")]
    Closed,

    /// Transport-level failure inside the source.
    #[error("Update source I/O error: {0}")]
    Io(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

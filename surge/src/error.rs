use thiserror::Error;

use surge_api::{SlotIndex, SourceError};

/// Errors raised by the pool and its slots.
#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Worker pool exhausted: all {capacity} slots are online")]
    CapacityExhausted { capacity: usize },
    #[error("Slot index {0} is outside the pool")]
    InvalidSlot(SlotIndex),
    #[error("Worker pool is shutting down")]
    ShuttingDown,
    #[error("Failed to spawn worker thread for slot {index}: {source}")]
    Spawn {
        index: SlotIndex,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed during shutdown: {0}")]
    Shutdown(String),
    #[error("Update source failed: {0}")]
    Source(#[from] SourceError),
    #[error("Internal pool error: {0}")]
    Other(#[from] anyhow::Error),
}

pub type PoolResult<T> = Result<T, PoolError>;

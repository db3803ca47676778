//! # Update Handlers
//!
//! The handler is the per-item processing step. The pool guarantees each
//! dequeued update is handed to the handler exactly once and that a slot
//! never runs two items at the same time. Retry, drop and dead-letter
//! policies belong to the handler.

use crate::types::{HandlerResult, SlotIndex};

/// Processes one update at a time on behalf of a slot.
pub trait UpdateHandler<E>: Send + Sync + 'static {
    /// Handle a single update dequeued by slot `slot`.
    fn handle(&self, slot: SlotIndex, update: E) -> HandlerResult<()>;
}

impl<E, F> UpdateHandler<E> for F
where
    F: Fn(SlotIndex, E) -> HandlerResult<()> + Send + Sync + 'static,
{
    fn handle(&self, slot: SlotIndex, update: E) -> HandlerResult<()> {
        self(slot, update)
    }
}

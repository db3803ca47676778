use crate::errors::HandlerError;

/// Stable identity of a pool slot, assigned once at pool construction.
pub type SlotIndex = usize;

pub type HandlerResult<T> = Result<T, HandlerError>;

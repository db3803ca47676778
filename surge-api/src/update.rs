//! # Updates and Sources
//!
//! An update is one unit of work delivered to exactly one pool slot. The
//! source that produces updates is a black box: the pool only pulls from it.

use std::time::Duration;

use crate::errors::SourceError;

/// Which part of the pool should serve an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lane {
    /// Guaranteed-channel traffic, served by the resident primary slots.
    Primary,
    /// Load that may be spread over elastic extra slots.
    #[default]
    Elastic,
}

/// A unit of work routable by the pool.
pub trait Update: Send + 'static {
    /// Routing hint for this update.
    fn lane(&self) -> Lane {
        Lane::Elastic
    }
}

/// Outcome of one bounded pull from an [`UpdateSource`].
#[derive(Debug, PartialEq, Eq)]
pub enum SourcePoll<E> {
    /// An update arrived.
    Ready(E),
    /// Nothing arrived before the timeout elapsed.
    Empty,
    /// The source is exhausted and will never yield again.
    Closed,
}

impl<E> SourcePoll<E> {
    pub fn is_ready(&self) -> bool {
        matches!(self, SourcePoll::Ready(_))
    }

    pub fn into_update(self) -> Option<E> {
        match self {
            SourcePoll::Ready(update) => Some(update),
            _ => None,
        }
    }
}

/// Sequential producer of updates.
///
/// `poll_update` may block for at most `timeout`, so the caller can check
/// its own stop conditions between pulls.
pub trait UpdateSource<E>: Send {
    fn poll_update(&mut self, timeout: Duration) -> Result<SourcePoll<E>, SourceError>;
}

impl<E, S> UpdateSource<E> for Box<S>
where
    S: UpdateSource<E> + ?Sized,
{
    fn poll_update(&mut self, timeout: Duration) -> Result<SourcePoll<E>, SourceError> {
        (**self).poll_update(timeout)
    }
}

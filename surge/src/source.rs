//! # Channel Source
//!
//! In-process update source backed by a flume channel. Producers hold an
//! [`UpdateFeed`] and push; the pool's run loop pulls from the paired
//! [`ChannelSource`].

use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};

use surge_api::{SourceError, SourcePoll, UpdateSource};

/// Creates a connected feed/source pair.
pub fn channel<E>() -> (UpdateFeed<E>, ChannelSource<E>) {
    let (sender, receiver) = flume::unbounded();
    (UpdateFeed { sender }, ChannelSource { receiver })
}

/// Producer half. Cloneable; the source closes when every feed is dropped.
#[derive(Debug)]
pub struct UpdateFeed<E> {
    sender: Sender<E>,
}

impl<E> Clone for UpdateFeed<E> {
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone() }
    }
}

impl<E> UpdateFeed<E> {
    pub fn push(&self, update: E) -> Result<(), SourceError> {
        self.sender.send(update).map_err(|_| SourceError::Closed)
    }

    /// Updates pushed but not yet pulled.
    pub fn pending(&self) -> usize {
        self.sender.len()
    }
}

/// Consumer half, handed to `PoolRegistry::run`.
#[derive(Debug)]
pub struct ChannelSource<E> {
    receiver: Receiver<E>,
}

impl<E: Send> UpdateSource<E> for ChannelSource<E> {
    fn poll_update(&mut self, timeout: Duration) -> Result<SourcePoll<E>, SourceError> {
        match self.receiver.recv_timeout(timeout) {
            Ok(update) => Ok(SourcePoll::Ready(update)),
            Err(RecvTimeoutError::Timeout) => Ok(SourcePoll::Empty),
            Err(RecvTimeoutError::Disconnected) => Ok(SourcePoll::Closed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_then_ready_then_closed() {
        let (feed, mut source) = channel::<u32>();
        let timeout = Duration::from_millis(10);

        assert_eq!(source.poll_update(timeout).unwrap(), SourcePoll::Empty);

        feed.push(4).unwrap();
        assert_eq!(feed.pending(), 1);
        assert_eq!(source.poll_update(timeout).unwrap(), SourcePoll::Ready(4));

        drop(feed);
        assert_eq!(source.poll_update(timeout).unwrap(), SourcePoll::Closed);
    }

    #[test]
    fn push_fails_once_source_is_gone() {
        let (feed, source) = channel::<u32>();
        drop(source);
        assert!(matches!(feed.push(1), Err(SourceError::Closed)));
    }
}

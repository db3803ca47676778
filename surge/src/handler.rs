//! # Stock Handlers
//!
//! - [`LogHandler`]: logs each update and returns; the default stand-in
//!   until a real handler is plugged in
//! - [`ResponseHandler`]: builds a [`Response`] per update and runs it

use std::fmt;
use std::marker::PhantomData;
use std::thread;
use std::time::Duration;

use tracing::info;

use surge_api::{HandlerResult, Response, SlotIndex, UpdateHandler};

/// Logs every update at INFO and returns.
#[derive(Debug, Clone, Default)]
pub struct LogHandler {
    work_delay: Option<Duration>,
}

impl LogHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long per update, to simulate real work.
    pub fn with_work_delay(mut self, delay: Duration) -> Self {
        self.work_delay = Some(delay);
        self
    }
}

impl<E> UpdateHandler<E> for LogHandler
where
    E: fmt::Debug + Send + 'static,
{
    fn handle(&self, slot: SlotIndex, update: E) -> HandlerResult<()> {
        info!(slot, update = ?update, "slot has an update");
        if let Some(delay) = self.work_delay {
            thread::sleep(delay);
        }
        info!(slot, "slot finished its job");
        Ok(())
    }
}

/// What a response is built from.
#[derive(Debug)]
pub struct ResponseContext<E> {
    pub slot: SlotIndex,
    pub update: E,
}

/// Turns each update into a [`Response`] via `factory` and runs it.
pub struct ResponseHandler<E, F> {
    factory: F,
    _update: PhantomData<fn(E)>,
}

impl<E, F, R> ResponseHandler<E, F>
where
    F: Fn(ResponseContext<E>) -> R,
    R: Response,
{
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            _update: PhantomData,
        }
    }
}

impl<E, F, R> UpdateHandler<E> for ResponseHandler<E, F>
where
    E: Send + 'static,
    F: Fn(ResponseContext<E>) -> R + Send + Sync + 'static,
    R: Response,
{
    fn handle(&self, slot: SlotIndex, update: E) -> HandlerResult<()> {
        let mut response = (self.factory)(ResponseContext { slot, update });
        response.run()
    }
}

impl<E, F> fmt::Debug for ResponseHandler<E, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseHandler").finish_non_exhaustive()
    }
}

/// Response that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopResponse;

impl Response for NoopResponse {
    fn run(&mut self) -> HandlerResult<()> {
        Ok(())
    }
}

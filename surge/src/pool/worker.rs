//! # Slot Event Loop
//!
//! The code that runs on a slot's backing thread.
//!
//! ## Core Algorithm
//! 1. Wait up to one wait slice for either an update or a stop request
//! 2. On an update, drain the queue one item at a time, then go idle and
//!    (extra slots only) re-register in the free list
//! 3. On a stop request, exit; by default what is still queued is
//!    processed first
//! 4. On a timeout, primary slots simply wait again; extra slots count
//!    consecutive timeouts and try to retire once the budget is spent
//!
//! Any real wake resets the timeout count, so an extra slot retires only
//! after `max_timeout_count` uninterrupted empty waits.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use flume::{Receiver, Selector};
use tracing::{debug, error, warn};

use surge_api::{HandlerError, UpdateHandler};

use super::free_list::FreeList;
use super::slot::{Role, SlotContext, SlotState, WorkerSettings, WorkerSlot};
use crate::{log_slot, slot_span};

enum Wake<E> {
    Update(E),
    Stop,
}

pub(crate) struct Worker<E> {
    slot: Arc<WorkerSlot<E>>,
    stop_rx: Receiver<()>,
    free_list: Arc<FreeList>,
    handler: Arc<dyn UpdateHandler<E>>,
    settings: WorkerSettings,
}

impl<E: Send + 'static> Worker<E> {
    pub(crate) fn new(slot: Arc<WorkerSlot<E>>, stop_rx: Receiver<()>, context: &SlotContext<E>) -> Self {
        Self {
            slot,
            stop_rx,
            free_list: Arc::clone(&context.free_list),
            handler: Arc::clone(&context.handler),
            settings: context.settings.clone(),
        }
    }

    pub(crate) fn run(self) {
        let index = self.slot.index();
        let span = slot_span!(index, self.slot.role().as_str());
        let _guard = span.enter();

        log_slot!(index, "ready");

        let stopped = match self.slot.role() {
            Role::Primary => self.run_primary(),
            Role::Extra => self.run_extra(),
        };

        if stopped {
            if self.settings.drain_on_shutdown {
                self.drain_remaining();
            } else {
                let dropped = self.slot.queued();
                if dropped > 0 {
                    warn!(slot = index, dropped, "discarding queued updates on stop");
                }
            }
        }

        log_slot!(index, "exited");
    }

    /// Loop for resident slots. Timeouts are ignored.
    fn run_primary(&self) -> bool {
        loop {
            match self.wait_for_event() {
                None => continue,
                Some(Wake::Stop) => return true,
                Some(Wake::Update(update)) => {
                    if !self.handle_queue(update) {
                        return true;
                    }
                }
            }
        }
    }

    /// Loop for elastic slots. Returns `false` when the slot retired itself.
    fn run_extra(&self) -> bool {
        let mut idle_timeouts: u32 = 0;

        loop {
            match self.wait_for_event() {
                None => {
                    idle_timeouts += 1;
                    if idle_timeouts < self.settings.max_timeout_count {
                        continue;
                    }

                    self.free_list.withdraw(self.slot.index());
                    if self.slot.try_retire() {
                        // A concurrent `release_slot` may have listed it
                        // before it turned Closing.
                        self.free_list.withdraw(self.slot.index());
                        log_slot!(
                            self.slot.index(),
                            "retiring",
                            idle_timeouts,
                            "closing slot due to inactivity"
                        );
                        return false;
                    }

                    // Work slipped in during the handshake. Serve it.
                    idle_timeouts = 0;
                }
                Some(Wake::Stop) => return true,
                Some(Wake::Update(update)) => {
                    idle_timeouts = 0;
                    if !self.handle_queue(update) {
                        return true;
                    }
                }
            }
        }
    }

    /// Bounded wait on "update queued OR stop requested". `None` on timeout.
    fn wait_for_event(&self) -> Option<Wake<E>> {
        Selector::new()
            .recv(&self.stop_rx, |_| Wake::Stop)
            .recv(self.slot.receiver(), |received| match received {
                Ok(update) => Wake::Update(update),
                // Unreachable while the slot owns the sender half.
                Err(_) => Wake::Stop,
            })
            .wait_timeout(self.settings.wait_slice)
            .ok()
    }

    fn stop_requested(&self) -> bool {
        !self.stop_rx.is_empty() || self.stop_rx.is_disconnected()
    }

    /// Processes `first` and everything queued behind it.
    ///
    /// Returns `false` if a stop request arrived while draining.
    fn handle_queue(&self, first: E) -> bool {
        // Leave the free list and turn busy in one step under the list's
        // lock, so no release can slip in between.
        if self.slot.role() == Role::Extra {
            self.free_list
                .withdraw_and(self.slot.index(), || self.slot.transition(SlotState::Idle, SlotState::Busy));
        } else {
            self.slot.transition(SlotState::Idle, SlotState::Busy);
        }

        let mut next = Some(first);
        while let Some(update) = next {
            self.process(update);
            if self.stop_requested() {
                return false;
            }
            next = self.slot.receiver().try_recv().ok();
        }

        if self.slot.transition(SlotState::Busy, SlotState::Idle) {
            self.register_free();
        }
        true
    }

    fn register_free(&self) {
        if self.slot.role() != Role::Extra {
            return;
        }
        let slot = &self.slot;
        if self.free_list.release_if(slot.index(), || slot.state() == SlotState::Idle) {
            debug!(slot = self.slot.index(), "registered as free");
        }
    }

    fn drain_remaining(&self) {
        while let Ok(update) = self.slot.receiver().try_recv() {
            self.process(update);
        }
    }

    fn process(&self, update: E) {
        let index = self.slot.index();
        debug!(slot = index, "update received");

        let handler = &self.handler;
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(index, update)))
            .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload.as_ref()))));

        self.slot.record_processed();

        match outcome {
            Ok(()) => debug!(slot = index, "update finished"),
            Err(e) => error!(slot = index, error = %e, "update handling failed"),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}

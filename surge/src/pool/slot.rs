//! # Worker Slots
//!
//! A slot is one fixed position in the pool. It owns the update queue for
//! that position and, while online, the backing thread that drains it.
//!
//! ## Lifecycle
//! - `Offline`: no thread. The queue may still hold updates.
//! - `Idle` / `Busy`: a thread runs the slot's event loop.
//! - `Closing`: the loop has been told to stop, or an extra slot retired
//!   itself. The thread is finished or about to finish but not yet joined.
//!
//! `Closing -> Offline` happens when the thread is joined, either by
//! `close` during shutdown or by the next `send`, which joins the stale
//! thread and respawns the slot under the same index.
//!
//! ## Locking
//! Each slot has one lock, guarding its runner (join handle and stop
//! sender). Spawning, pushing an update and the retirement check all run
//! under it, so a retiring thread can never strand an update. No code path
//! holds a slot lock while calling into the free list.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::anyhow;
use flume::{Receiver, Sender};
use tracing::error;

use surge_api::{SlotIndex, UpdateHandler};

use super::free_list::FreeList;
use super::worker::Worker;
use crate::error::{PoolError, PoolResult};
use crate::logging;

/// Fixed role of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Resident slot, exempt from idle retirement.
    Primary,
    /// Elastic slot that retires after a run of idle waits.
    Extra,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Extra => "extra",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable state of a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Offline = 0,
    Idle = 1,
    Busy = 2,
    Closing = 3,
}

impl SlotState {
    fn from_usize(value: usize) -> Self {
        match value {
            1 => SlotState::Idle,
            2 => SlotState::Busy,
            3 => SlotState::Closing,
            _ => SlotState::Offline,
        }
    }

    /// Whether a live event loop is serving the slot.
    pub fn is_online(&self) -> bool {
        matches!(self, SlotState::Idle | SlotState::Busy)
    }
}

/// Point-in-time view of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSnapshot {
    pub index: SlotIndex,
    pub role: Role,
    pub state: SlotState,
    pub queued: usize,
    pub processed: u64,
    pub spawns: u64,
}

/// Event loop timing shared by every slot of a pool.
#[derive(Debug, Clone)]
pub(crate) struct WorkerSettings {
    pub wait_slice: Duration,
    pub max_timeout_count: u32,
    pub drain_on_shutdown: bool,
}

/// Everything a backing thread needs besides its own slot.
pub(crate) struct SlotContext<E> {
    pub free_list: Arc<FreeList>,
    pub handler: Arc<dyn UpdateHandler<E>>,
    pub settings: WorkerSettings,
    pub thread_name_prefix: String,
}

#[derive(Default)]
struct Runner {
    handle: Option<JoinHandle<()>>,
    stop_tx: Option<Sender<()>>,
}

/// One position in the pool: a queue plus an optional backing thread.
pub struct WorkerSlot<E> {
    index: SlotIndex,
    role: Role,
    state: AtomicUsize,
    /// Set while an acquirer holds this offline slot for its first update.
    claimed: AtomicBool,
    processed: AtomicU64,
    spawns: AtomicU64,
    updates_tx: Sender<E>,
    updates_rx: Receiver<E>,
    runner: Mutex<Runner>,
}

impl<E> WorkerSlot<E> {
    pub(crate) fn new(index: SlotIndex, role: Role) -> Self {
        let (updates_tx, updates_rx) = flume::unbounded();
        Self {
            index,
            role,
            state: AtomicUsize::new(SlotState::Offline as usize),
            claimed: AtomicBool::new(false),
            processed: AtomicU64::new(0),
            spawns: AtomicU64::new(0),
            updates_tx,
            updates_rx,
            runner: Mutex::new(Runner::default()),
        }
    }

    pub fn index(&self) -> SlotIndex {
        self.index
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> SlotState {
        SlotState::from_usize(self.state.load(Ordering::SeqCst))
    }

    /// Updates waiting in the queue.
    pub fn queued(&self) -> usize {
        self.updates_rx.len()
    }

    /// Updates handed to the handler so far, failures included.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    /// How many times a backing thread has been started for this slot.
    pub fn spawns(&self) -> u64 {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> SlotSnapshot {
        SlotSnapshot {
            index: self.index,
            role: self.role,
            state: self.state(),
            queued: self.queued(),
            processed: self.processed(),
            spawns: self.spawns(),
        }
    }

    pub(crate) fn receiver(&self) -> &Receiver<E> {
        &self.updates_rx
    }

    pub(crate) fn set_state(&self, state: SlotState) {
        self.state.store(state as usize, Ordering::SeqCst);
    }

    /// Moves `from -> to` only if the slot is still in `from`.
    pub(crate) fn transition(&self, from: SlotState, to: SlotState) -> bool {
        self.state
            .compare_exchange(from as usize, to as usize, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::SeqCst);
    }

    /// Reserves an offline or retired extra slot for a fresh assignment.
    pub(crate) fn try_claim(&self) -> bool {
        if self.role != Role::Extra || self.state().is_online() {
            return false;
        }
        self.claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn lock_runner(&self) -> MutexGuard<'_, Runner> {
        self.runner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Final check before an idle extra slot gives up its thread.
    ///
    /// The caller must already have withdrawn the slot from the free list.
    /// Returns `true` if the slot is now `Closing` and the loop must exit.
    pub(crate) fn try_retire(&self) -> bool {
        let _runner = self.lock_runner();
        if !self.updates_rx.is_empty() {
            return false;
        }
        self.transition(SlotState::Idle, SlotState::Closing)
    }

    /// Stops the backing thread and waits for it.
    ///
    /// Safe on an offline slot. The join happens outside the slot lock.
    pub(crate) fn close(&self) -> PoolResult<()> {
        let (handle, stop_tx) = {
            let mut runner = self.lock_runner();
            if self.state() == SlotState::Offline && runner.handle.is_none() {
                return Ok(());
            }
            self.set_state(SlotState::Closing);
            (runner.handle.take(), runner.stop_tx.take())
        };

        if let Some(stop_tx) = stop_tx {
            // A retired loop has already dropped its receiver.
            let _ = stop_tx.try_send(());
        }

        let joined = match handle {
            Some(handle) => handle.join().map_err(|payload| {
                PoolError::Shutdown(format!(
                    "worker thread for slot {} panicked: {}",
                    self.index,
                    super::worker::panic_message(payload.as_ref())
                ))
            }),
            None => Ok(()),
        };

        let _runner = self.lock_runner();
        self.set_state(SlotState::Offline);
        joined
    }
}

impl<E: Send + 'static> WorkerSlot<E> {
    /// Starts the backing thread unless the slot is already online.
    ///
    /// Returns `Ok(true)` when a thread was started.
    pub(crate) fn spawn(self: &Arc<Self>, context: &SlotContext<E>) -> PoolResult<bool> {
        let mut runner = self.lock_runner();
        self.spawn_locked(&mut runner, context)
    }

    fn spawn_locked(self: &Arc<Self>, runner: &mut Runner, context: &SlotContext<E>) -> PoolResult<bool> {
        match self.state() {
            SlotState::Idle | SlotState::Busy => return Ok(false),
            SlotState::Closing => {
                // Retired thread: it has left its loop and takes no locks
                // on the way out, so joining here cannot block for long.
                if let Some(handle) = runner.handle.take() {
                    if handle.join().is_err() {
                        error!(slot = self.index, "retired worker thread had panicked");
                    }
                }
                runner.stop_tx = None;
                self.set_state(SlotState::Offline);
            }
            SlotState::Offline => {}
        }

        let (stop_tx, stop_rx) = flume::bounded(1);
        let worker = Worker::new(Arc::clone(self), stop_rx, context);
        let dispatch = logging::current_subscriber();

        crate::log_slot!(self.index, "spawning", role = self.role.as_str());
        self.set_state(SlotState::Idle);

        let spawned = thread::Builder::new()
            .name(format!("{}-{}", context.thread_name_prefix, self.index))
            .spawn(move || tracing::dispatcher::with_default(&dispatch, || worker.run()));

        match spawned {
            Ok(handle) => {
                runner.handle = Some(handle);
                runner.stop_tx = Some(stop_tx);
                self.spawns.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
            Err(source) => {
                self.set_state(SlotState::Offline);
                Err(PoolError::Spawn { index: self.index, source })
            }
        }
    }

    /// Pushes an update, bringing the slot online first if needed.
    ///
    /// Returns `Ok(true)` when a thread had to be started.
    pub(crate) fn send(self: &Arc<Self>, update: E, context: &SlotContext<E>) -> PoolResult<bool> {
        let mut runner = self.lock_runner();
        let spawned = self.spawn_locked(&mut runner, context);
        self.claimed.store(false, Ordering::SeqCst);
        let spawned = spawned?;

        self.updates_tx
            .send(update)
            .map_err(|_| PoolError::Other(anyhow!("queue of slot {} is disconnected", self.index)))?;
        Ok(spawned)
    }
}

impl<E> fmt::Debug for WorkerSlot<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSlot")
            .field("index", &self.index)
            .field("role", &self.role)
            .field("state", &SlotState::from_usize(self.state.load(Ordering::Relaxed)))
            .field("queued", &self.updates_rx.len())
            .finish()
    }
}

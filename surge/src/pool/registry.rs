use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use futures::{Stream, StreamExt};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use surge_api::{Lane, SlotIndex, SourcePoll, Update, UpdateHandler, UpdateSource};

use super::free_list::FreeList;
use super::slot::{Role, SlotContext, SlotSnapshot, SlotState, WorkerSettings, WorkerSlot};
use crate::config::{OverflowPolicy, PoolConfig};
use crate::error::{PoolError, PoolResult};
use crate::log_dispatch;

/// Aggregate view of the pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolMetrics {
    pub capacity: usize,
    pub primary_workers: usize,
    /// Slots with a live event loop.
    pub online: usize,
    pub busy: usize,
    /// Length of the free list.
    pub free: usize,
    /// Updates waiting across all slot queues.
    pub queued: usize,
    pub processed: u64,
}

/// Owner of every slot and of the free list; routes updates to slots.
///
/// # Routing
/// - `Lane::Primary` updates go round-robin to the primary slots.
/// - `Lane::Elastic` updates go to the most recently idled extra slot, or
///   to a fresh offline extra slot when none is idle.
///
/// # Shutdown
/// `shutdown` blocks until every backing thread has been joined. It is
/// also run on drop.
pub struct PoolRegistry<E> {
    config: PoolConfig,
    slots: Vec<Arc<WorkerSlot<E>>>,
    free_list: Arc<FreeList>,
    context: SlotContext<E>,
    primary_cursor: AtomicUsize,
    started: AtomicBool,
    /// Write-locked once by `shutdown`; deliveries hold a read guard so no
    /// thread can be spawned behind shutdown's back.
    stopping: RwLock<bool>,
    stop_update: AtomicBool,
    stop_notify: Notify,
}

impl<E: Update> PoolRegistry<E> {
    /// Builds the slot array. No thread is started until `start` or the
    /// first delivery.
    pub fn new<H>(config: PoolConfig, handler: H) -> PoolResult<Self>
    where
        H: UpdateHandler<E>,
    {
        Self::with_handler(config, Arc::new(handler))
    }

    pub fn with_handler(config: PoolConfig, handler: Arc<dyn UpdateHandler<E>>) -> PoolResult<Self> {
        config.validate()?;

        let slots = (0..config.capacity)
            .map(|index| {
                let role = if index < config.primary_workers { Role::Primary } else { Role::Extra };
                Arc::new(WorkerSlot::new(index, role))
            })
            .collect();

        let free_list = Arc::new(FreeList::new(config.capacity));
        let context = SlotContext {
            free_list: Arc::clone(&free_list),
            handler,
            settings: WorkerSettings {
                wait_slice: config.wait_slice,
                max_timeout_count: config.max_timeout_count,
                drain_on_shutdown: config.drain_on_shutdown,
            },
            thread_name_prefix: config.thread_name_prefix.clone(),
        };

        Ok(Self {
            config,
            slots,
            free_list,
            context,
            primary_cursor: AtomicUsize::new(0),
            started: AtomicBool::new(false),
            stopping: RwLock::new(false),
            stop_update: AtomicBool::new(false),
            stop_notify: Notify::new(),
        })
    }

    fn read_stopping(&self) -> PoolResult<RwLockReadGuard<'_, bool>> {
        let guard = self.stopping.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *guard {
            return Err(PoolError::ShuttingDown);
        }
        Ok(guard)
    }

    /// Brings every primary slot online. Calling it again is a no-op.
    pub fn start(&self) -> PoolResult<()> {
        let _stopping = self.read_stopping()?;
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        for slot in self.slots.iter().filter(|slot| slot.role() == Role::Primary) {
            if let Err(e) = slot.spawn(&self.context) {
                self.started.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }

        info!(
            capacity = self.config.capacity,
            primary_workers = self.config.primary_workers,
            "worker pool started"
        );
        Ok(())
    }

    /// Brings slot `index` online without giving it work.
    ///
    /// Returns `Ok(false)` if the slot was already online.
    pub fn spawn_slot(&self, index: SlotIndex) -> PoolResult<bool> {
        let _stopping = self.read_stopping()?;
        self.slot(index)?.spawn(&self.context)
    }

    /// Routes one update to a slot and returns the slot's index.
    pub fn dispatch(&self, update: E) -> PoolResult<SlotIndex> {
        let _stopping = self.read_stopping()?;
        let lane = update.lane();

        let index = match lane {
            Lane::Primary if self.config.primary_workers > 0 => self.next_primary(),
            _ => match self.acquire_locked() {
                Ok(index) => index,
                Err(PoolError::CapacityExhausted { capacity })
                    if self.config.overflow == OverflowPolicy::Primary && self.config.primary_workers > 0 =>
                {
                    let index = self.next_primary();
                    warn!(capacity, slot = index, "no extra slot available, rerouting update to a primary slot");
                    index
                }
                Err(e) => return Err(e),
            },
        };

        self.deliver(index, update)?;
        log_dispatch!(lane, index);
        Ok(index)
    }

    /// Delivers `update` straight to slot `index`, spawning it if offline.
    pub fn enqueue(&self, index: SlotIndex, update: E) -> PoolResult<()> {
        let _stopping = self.read_stopping()?;
        self.deliver(index, update)
    }

    fn deliver(&self, index: SlotIndex, update: E) -> PoolResult<()> {
        let slot = self.slot(index)?;
        if slot.role() == Role::Extra {
            self.free_list.withdraw(index);
        }
        if slot.send(update, &self.context)? {
            debug!(slot = index, role = slot.role().as_str(), "slot brought online");
        }
        Ok(())
    }

    fn next_primary(&self) -> SlotIndex {
        self.primary_cursor.fetch_add(1, Ordering::Relaxed) % self.config.primary_workers
    }

    /// Hands out an extra slot for new work.
    ///
    /// Pops the most recently idled slot; when the free list is empty,
    /// reserves an offline (or retired) extra slot instead.
    ///
    /// The caller owns the index and must deliver to it with `enqueue`. A
    /// reserved slot that never receives an update stays reserved, and
    /// later acquirers skip it.
    pub fn acquire_free_slot(&self) -> PoolResult<SlotIndex> {
        let _stopping = self.read_stopping()?;
        self.acquire_locked()
    }

    fn acquire_locked(&self) -> PoolResult<SlotIndex> {
        if let Some(index) = self.free_list.pop() {
            return Ok(index);
        }

        self.slots[self.config.primary_workers..]
            .iter()
            .find(|slot| slot.try_claim())
            .map(|slot| slot.index())
            .ok_or(PoolError::CapacityExhausted { capacity: self.config.capacity })
    }

    /// Puts an idle extra slot back on the free list.
    ///
    /// Returns `Ok(false)` without touching the list for primary slots,
    /// slots that are not idle, or slots already listed. The idle check is
    /// made under the free list's lock, where the slot's own thread also
    /// turns busy.
    pub fn release_slot(&self, index: SlotIndex) -> PoolResult<bool> {
        let slot = self.slot(index)?;
        if slot.role() == Role::Primary {
            return Ok(false);
        }
        Ok(self.free_list.release_if(index, || slot.state() == SlotState::Idle))
    }

    /// Pulls from `source` and dispatches until the source closes,
    /// `request_stop` is called, or the pool shuts down.
    pub fn run<S>(&self, mut source: S) -> PoolResult<()>
    where
        S: UpdateSource<E>,
    {
        self.start()?;
        info!("update loop running");

        while !self.stop_requested() {
            match source.poll_update(self.config.poll_interval)? {
                SourcePoll::Ready(update) => {
                    if !self.route(update)? {
                        break;
                    }
                }
                SourcePoll::Empty => continue,
                SourcePoll::Closed => {
                    info!("update source closed");
                    break;
                }
            }
        }

        info!("update loop finished");
        Ok(())
    }

    /// Same loop as `run`, fed from an async stream.
    pub async fn run_stream<S>(&self, stream: S) -> PoolResult<()>
    where
        S: Stream<Item = E> + Unpin,
    {
        self.start()?;
        let mut stream = stream;

        while !self.stop_requested() {
            tokio::select! {
                biased;
                _ = self.stop_notify.notified() => break,
                next = stream.next() => match next {
                    Some(update) => {
                        if !self.route(update)? {
                            break;
                        }
                    }
                    None => {
                        info!("update stream ended");
                        break;
                    }
                },
            }
        }

        Ok(())
    }

    /// Dispatch for the run loops: `Ok(false)` once the pool is shutting down.
    fn route(&self, update: E) -> PoolResult<bool> {
        match self.dispatch(update) {
            Ok(_) => Ok(true),
            Err(PoolError::ShuttingDown) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<E> PoolRegistry<E> {
    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    fn slot(&self, index: SlotIndex) -> PoolResult<&Arc<WorkerSlot<E>>> {
        self.slots.get(index).ok_or(PoolError::InvalidSlot(index))
    }

    /// Asks the run loop to return after the update in hand.
    pub fn request_stop(&self) {
        self.stop_update.store(true, Ordering::SeqCst);
        self.stop_notify.notify_one();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_update.load(Ordering::SeqCst)
    }

    /// Stops every slot and joins every backing thread.
    ///
    /// Deliveries fail with `PoolError::ShuttingDown` from the moment this
    /// is called. Safe to call more than once.
    pub fn shutdown(&self) -> PoolResult<()> {
        let first = {
            let mut stopping = self.stopping.write().unwrap_or_else(|poisoned| poisoned.into_inner());
            !std::mem::replace(&mut *stopping, true)
        };
        self.request_stop();

        let online = self.slots.iter().filter(|slot| slot.state() != SlotState::Offline).count();
        if first || online > 0 {
            info!(online, "shutting down worker pool");
        }

        let mut failures = Vec::new();
        for slot in &self.slots {
            self.free_list.withdraw(slot.index());
            if let Err(e) = slot.close() {
                error!(slot = slot.index(), error = %e, "slot did not close cleanly");
                failures.push(e.to_string());
            }
        }
        self.free_list.clear();

        if failures.is_empty() {
            if first {
                info!("worker pool shut down");
            }
            Ok(())
        } else {
            Err(PoolError::Shutdown(failures.join("; ")))
        }
    }

    pub fn slot_state(&self, index: SlotIndex) -> PoolResult<SlotState> {
        Ok(self.slot(index)?.state())
    }

    pub fn slot_role(&self, index: SlotIndex) -> PoolResult<Role> {
        Ok(self.slot(index)?.role())
    }

    /// Whether slot `index` is currently on the free list.
    pub fn is_accepting(&self, index: SlotIndex) -> bool {
        self.free_list.contains(index)
    }

    /// Free list contents from bottom to top.
    pub fn free_indices(&self) -> Vec<SlotIndex> {
        self.free_list.snapshot()
    }

    pub fn slots(&self) -> Vec<SlotSnapshot> {
        self.slots.iter().map(|slot| slot.snapshot()).collect()
    }

    pub fn metrics(&self) -> PoolMetrics {
        let mut metrics = PoolMetrics {
            capacity: self.config.capacity,
            primary_workers: self.config.primary_workers,
            online: 0,
            busy: 0,
            free: self.free_list.len(),
            queued: 0,
            processed: 0,
        };

        for slot in &self.slots {
            let state = slot.state();
            if state.is_online() {
                metrics.online += 1;
            }
            if state == SlotState::Busy {
                metrics.busy += 1;
            }
            metrics.queued += slot.queued();
            metrics.processed += slot.processed();
        }

        metrics
    }
}

impl<E> Drop for PoolRegistry<E> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            error!(error = %e, "worker pool shutdown on drop failed");
        }
    }
}

impl<E> fmt::Debug for PoolRegistry<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("capacity", &self.config.capacity)
            .field("primary_workers", &self.config.primary_workers)
            .field("free", &self.free_list)
            .field("stop_requested", &self.stop_update.load(Ordering::Relaxed))
            .finish()
    }
}

// Shared helpers for the surge integration tests.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use surge::{HandlerResult, Lane, PoolConfig, SlotIndex, Update, UpdateHandler};

/// Test update carrying an id and a lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Job {
    pub id: u64,
    pub lane: Lane,
}

impl Job {
    pub fn elastic(id: u64) -> Self {
        Self { id, lane: Lane::Elastic }
    }

    pub fn primary(id: u64) -> Self {
        Self { id, lane: Lane::Primary }
    }
}

impl Update for Job {
    fn lane(&self) -> Lane {
        self.lane
    }
}

/// Records which slot processed which job, and whether a slot ever ran
/// two jobs at once.
#[derive(Debug, Default)]
pub struct Recording {
    entries: Mutex<Vec<(SlotIndex, u64)>>,
    in_flight: Mutex<HashSet<SlotIndex>>,
    overlaps: AtomicUsize,
    delay: Duration,
}

impl Recording {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn handler(self: &Arc<Self>) -> impl UpdateHandler<Job> {
        let recording = Arc::clone(self);
        move |slot: SlotIndex, job: Job| -> HandlerResult<()> {
            recording.record(slot, job);
            Ok(())
        }
    }

    fn record(&self, slot: SlotIndex, job: Job) {
        if !self.in_flight.lock().unwrap().insert(slot) {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.entries.lock().unwrap().push((slot, job.id));
        self.in_flight.lock().unwrap().remove(&slot);
    }

    pub fn count(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn ids(&self) -> Vec<u64> {
        self.entries.lock().unwrap().iter().map(|(_, id)| *id).collect()
    }

    pub fn ids_for(&self, slot: SlotIndex) -> Vec<u64> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == slot)
            .map(|(_, id)| *id)
            .collect()
    }

    pub fn slots_used(&self) -> HashSet<SlotIndex> {
        self.entries.lock().unwrap().iter().map(|(slot, _)| *slot).collect()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

/// Polls `condition` every few milliseconds until it holds or `timeout` passes.
pub fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

/// Small pool with short waits. Extra slots retire after 3 × 50ms.
pub fn fast_config(capacity: usize, primary_workers: usize) -> PoolConfig {
    PoolConfig {
        capacity,
        primary_workers,
        wait_slice: Duration::from_millis(50),
        max_timeout_count: 3,
        poll_interval: Duration::from_millis(10),
        ..PoolConfig::default()
    }
}

/// Same as `fast_config` but extra slots effectively never retire.
pub fn steady_config(capacity: usize, primary_workers: usize) -> PoolConfig {
    PoolConfig {
        max_timeout_count: 10_000,
        ..fast_config(capacity, primary_workers)
    }
}

pub const SETTLE: Duration = Duration::from_secs(5);

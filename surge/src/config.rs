use std::time::Duration;

use crate::error::{PoolError, PoolResult};

pub const DEFAULT_POOL_CAPACITY: usize = 128;
pub const DEFAULT_MAX_TIMEOUT_COUNT: u32 = 20;

/// What the run loop does with an elastic update when no extra slot is free.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Hand the update to a primary slot instead.
    Primary,
    /// Stop the run loop with `PoolError::CapacityExhausted`.
    Fail,
}

/// Configuration for a `PoolRegistry`.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Total number of slots in the pool.
    pub capacity: usize,

    /// Number of resident slots. Slots `0..primary_workers` are primary,
    /// the remaining ones are extra.
    pub primary_workers: usize,

    /// Length of one bounded wait inside a slot's event loop.
    pub wait_slice: Duration,

    /// Consecutive empty waits after which an extra slot retires.
    pub max_timeout_count: u32,

    /// Upper bound for a single pull from the update source.
    pub poll_interval: Duration,

    /// Whether a stopping slot still processes its queued updates. When
    /// off, a stopping slot logs how many it discarded.
    pub drain_on_shutdown: bool,

    /// Behavior when elastic load exceeds the pool.
    pub overflow: OverflowPolicy,

    /// Backing threads are named `{thread_name_prefix}-{index}`.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_POOL_CAPACITY,
            primary_workers: num_cpus::get().clamp(1, DEFAULT_POOL_CAPACITY),
            wait_slice: Duration::from_millis(1000),
            max_timeout_count: DEFAULT_MAX_TIMEOUT_COUNT,
            poll_interval: Duration::from_millis(100),
            drain_on_shutdown: true,
            overflow: OverflowPolicy::Primary,
            thread_name_prefix: "surge-worker".to_string(),
        }
    }
}

impl PoolConfig {
    /// Number of elastic slots.
    pub fn extra_workers(&self) -> usize {
        self.capacity.saturating_sub(self.primary_workers)
    }

    /// Longest time an idle extra slot stays online.
    pub fn idle_budget(&self) -> Duration {
        self.wait_slice * self.max_timeout_count
    }

    pub fn validate(&self) -> PoolResult<()> {
        if self.capacity == 0 {
            return Err(PoolError::Config("pool capacity must be at least 1".to_string()));
        }
        if self.primary_workers > self.capacity {
            return Err(PoolError::Config(format!(
                "primary_workers ({}) exceeds pool capacity ({})",
                self.primary_workers, self.capacity
            )));
        }
        if self.wait_slice.is_zero() {
            return Err(PoolError::Config("wait_slice must be non-zero".to_string()));
        }
        if self.max_timeout_count == 0 {
            return Err(PoolError::Config("max_timeout_count must be at least 1".to_string()));
        }
        Ok(())
    }
}

use std::time::Duration;

use surge::config::{DEFAULT_MAX_TIMEOUT_COUNT, DEFAULT_POOL_CAPACITY};
use surge::{OverflowPolicy, PoolConfig, PoolError};

#[test]
fn defaults() {
    let config = PoolConfig::default();
    assert_eq!(config.capacity, DEFAULT_POOL_CAPACITY);
    assert!(config.primary_workers >= 1);
    assert!(config.primary_workers <= config.capacity);
    assert_eq!(config.wait_slice, Duration::from_secs(1));
    assert_eq!(config.max_timeout_count, DEFAULT_MAX_TIMEOUT_COUNT);
    assert_eq!(config.poll_interval, Duration::from_millis(100));
    assert!(config.drain_on_shutdown);
    assert_eq!(config.overflow, OverflowPolicy::Primary);
    assert_eq!(config.thread_name_prefix, "surge-worker");
    assert!(config.validate().is_ok());
}

#[test]
fn derived_values() {
    let config = PoolConfig {
        capacity: 10,
        primary_workers: 4,
        wait_slice: Duration::from_millis(250),
        max_timeout_count: 8,
        ..PoolConfig::default()
    };
    assert_eq!(config.extra_workers(), 6);
    assert_eq!(config.idle_budget(), Duration::from_secs(2));
}

#[test]
fn validation_messages() {
    let cases = [
        (PoolConfig { capacity: 0, primary_workers: 0, ..PoolConfig::default() }, "pool capacity must be at least 1"),
        (
            PoolConfig { capacity: 2, primary_workers: 5, ..PoolConfig::default() },
            "primary_workers (5) exceeds pool capacity (2)",
        ),
        (PoolConfig { wait_slice: Duration::ZERO, ..PoolConfig::default() }, "wait_slice must be non-zero"),
        (PoolConfig { max_timeout_count: 0, ..PoolConfig::default() }, "max_timeout_count must be at least 1"),
    ];

    for (config, expected) in cases {
        match config.validate() {
            Err(PoolError::Config(message)) => assert_eq!(message, expected),
            other => panic!("expected config error for {expected:?}, got {other:?}"),
        }
    }
}

#[test]
fn all_primary_pool_is_valid() {
    let config = PoolConfig { capacity: 3, primary_workers: 3, ..PoolConfig::default() };
    assert!(config.validate().is_ok());
    assert_eq!(config.extra_workers(), 0);
}

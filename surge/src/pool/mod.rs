//! # Worker Pool
//!
//! Elastic pool of per-slot worker threads fed from a single update source.
//!
//! ## Key Concepts
//! - Primary slots: resident threads that guarantee the main lane is served
//! - Extra slots: elastic threads that spin up on demand and retire after
//!   a run of idle waits, to be respawned under load
//! - Free list: LIFO of idle extra slots, consulted before waking a fresh one
//!
//! ## Thread Safety
//! - Two lock domains: each slot's runner lock and the free list's lock.
//!   They are never held together.
//! - Each slot's queue is a flume channel; its thread is the only consumer.
//! - Slots refer back to the pool by index and a shared free-list handle,
//!   never by address.

mod free_list;
mod registry;
mod slot;
mod worker;

pub use free_list::FreeList;
pub use registry::{PoolMetrics, PoolRegistry};
pub use slot::{Role, SlotSnapshot, SlotState, WorkerSlot};

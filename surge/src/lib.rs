// Surge worker pool
//
// Routes a stream of update events to a bounded pool of worker threads.
// A few primary slots stay resident so the main lane is always served;
// extra slots come online under load and retire after sitting idle.

pub mod config;
pub mod error;
pub mod handler;
pub mod logging;
pub mod pool;
pub mod source;

pub use config::{OverflowPolicy, PoolConfig};
pub use error::{PoolError, PoolResult};
pub use handler::{LogHandler, NoopResponse, ResponseContext, ResponseHandler};
pub use pool::{PoolMetrics, PoolRegistry, Role, SlotSnapshot, SlotState};
pub use source::{channel, ChannelSource, UpdateFeed};

pub use surge_api::{
    HandlerError, HandlerResult, Lane, Response, SlotIndex, SourceError, SourcePoll, Update, UpdateHandler,
    UpdateSource,
};

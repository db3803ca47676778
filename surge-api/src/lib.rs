//! # Surge API
//!
//! Contracts between the surge worker pool and the collaborators that feed
//! it and consume its work.
//!
//! ## Core Components
//!
//! - **Updates**: units of work, each carrying a [`Lane`] routing hint
//! - **Sources**: blocking producers the pool pulls updates from
//! - **Handlers**: per-item processing, invoked one item at a time per slot
//! - **Responses**: the extension point handlers hand their results to
//!
//! ## Module Organization
//!
//! - [`update`]: the `Update` trait, lanes and the `UpdateSource` contract
//! - [`handler`]: the `UpdateHandler` contract
//! - [`response`]: the `Response` extension point
//! - [`errors`]: collaborator error types
//! - [`types`]: common type definitions

pub mod errors;
pub mod handler;
pub mod response;
pub mod types;
pub mod update;

pub use errors::{HandlerError, SourceError};
pub use handler::UpdateHandler;
pub use response::Response;
pub use types::{HandlerResult, SlotIndex};
pub use update::{Lane, SourcePoll, Update, UpdateSource};

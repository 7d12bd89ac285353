mod backoff;
mod cache;
pub mod claim;
mod config;
mod context;
pub mod controller;
pub mod dispatch;
mod error;
pub mod event;
pub mod job;
mod key;
pub mod launcher;
mod queue;
pub mod reconciler;
pub mod source;
pub mod tracing;
pub mod worker;

pub use backoff::{ItemExponentialRateLimiter, RateLimiter};
pub use cache::{CacheError, ClaimCache, ClaimStore};
pub use config::{Config, MissingSourcePolicy};
pub use context::Context;
pub use error::{ControllerError, ControllerResult};
pub use key::{KeyError, QueueKey};
pub use queue::WorkQueue;

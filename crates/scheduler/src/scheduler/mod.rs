//! Public facade composing queue, registry, dispatcher, and worker pool.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, builder, startup, and accessors
//! - `scheduling`: schedule / cancel / status operations
//! - `lifecycle`: shutdown and drop
//! - `request`: the [`TaskRequest`] builder

mod core;
mod lifecycle;
mod request;
mod scheduling;

pub use self::core::{Scheduler, SchedulerBuilder};
pub use self::request::TaskRequest;

//! The deploy state machine and its concurrency fabric.
//!
//! Three layers, leaves first:
//!
//! - [`InstanceController`] owns one container and drives it through
//!   create → smoke → warm-up, reporting every transition on a channel.
//! - [`StackSupervisor`] owns one cluster: it reconciles current vs
//!   desired replica count, consumes instance events on a single serial
//!   loop, enforces the failure tolerance, and emits one verdict.
//! - [`FleetCoordinator`] fans a deploy out to every stack and collapses
//!   their verdicts into one success-or-rollback decision.

mod error;
mod fleet;
mod instance;
mod stack;

#[cfg(test)]
mod testutil;

pub use error::ClusterError;
pub use fleet::FleetCoordinator;
pub use instance::{InstanceController, State, Step, SERVICE_PORT, STOP_TIMEOUT};
pub use stack::{StackSupervisor, StackVerdict, EVENT_CHANNEL_CAPACITY};

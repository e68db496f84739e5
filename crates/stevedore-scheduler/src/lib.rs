//! Abstract container-runtime driver contract.
//!
//! The deploy core never talks to a container runtime directly; it goes
//! through the [`Scheduler`] trait. Concrete drivers (Docker, Swarm,
//! Marathon) implement the trait, register a [`SchedulerFactory`] under a
//! string ID, and are created by name from the cluster configuration.

mod error;
mod registry;
mod scheduler;
mod types;

pub use error::{SchedulerError, SchedulerResult};
pub use registry::{SchedulerFactory, SchedulerRegistry};
pub use scheduler::Scheduler;
pub use types::{
    ContainerFilter, PortError, PortProtocol, ServiceInformation, ServicePort, ServiceStatus,
};

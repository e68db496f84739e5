//! Shared data carriers and configuration for the stevedore orchestrator.
//!
//! This crate holds the types every other crate agrees on: the service
//! specification handed to a deploy, the probe specification, the YAML
//! cluster configuration, and the validation errors raised before any
//! scheduler is touched.

pub mod config;
pub mod envs;
mod error;
mod types;

pub use config::{ClusterConfig, DriverParameters, StackConfig};
pub use error::{ConfigError, ValidationError};
pub use types::{parse_memory, MonitorKind, MonitorSpec, ServiceSpec};

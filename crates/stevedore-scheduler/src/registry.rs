//! Name → driver-factory registry.
//!
//! Drivers are created by name from the cluster configuration. The
//! registry is an explicit value populated in `main`, not a global
//! mutated by module-load side effects.

use std::collections::HashMap;
use std::sync::Arc;

use stevedore_core::DriverParameters;
use tracing::debug;

use crate::error::{SchedulerError, SchedulerResult};
use crate::scheduler::Scheduler;

/// Builds a [`Scheduler`] from the opaque parameter map of one stack.
pub trait SchedulerFactory: Send + Sync {
    fn create(&self, parameters: &DriverParameters) -> SchedulerResult<Arc<dyn Scheduler>>;
}

/// The set of known drivers.
#[derive(Default)]
pub struct SchedulerRegistry {
    factories: HashMap<String, Box<dyn SchedulerFactory>>,
}

impl SchedulerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver factory under its ID.
    ///
    /// Double registration is a programming error in the binary's setup
    /// and is rejected rather than silently replaced.
    pub fn register(
        &mut self,
        name: &str,
        factory: Box<dyn SchedulerFactory>,
    ) -> SchedulerResult<()> {
        if self.factories.contains_key(name) {
            return Err(SchedulerError::AlreadyRegistered(name.to_string()));
        }
        debug!(driver = name, "scheduler driver registered");
        self.factories.insert(name.to_string(), factory);
        Ok(())
    }

    /// Instantiate the named driver with a stack's parameters.
    pub fn create(
        &self,
        name: &str,
        parameters: &DriverParameters,
    ) -> SchedulerResult<Arc<dyn Scheduler>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| SchedulerError::UnknownDriver(name.to_string()))?;
        factory.create(parameters)
    }

    pub fn known_drivers(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

//! Cluster configuration file.
//!
//! The orchestrator reads one YAML file describing every cluster it
//! manages. Each stack names exactly one scheduler driver and passes it
//! an opaque parameter map:
//!
//! ```yaml
//! cluster:
//!   dc-east:
//!     scheduler:
//!       swarm:
//!         address: tcp://10.0.1.1:2375
//!   dc-west:
//!     disabled: true
//!     scheduler:
//!       swarm:
//!         address: tcp://10.0.2.1:2375
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Opaque driver parameters, forwarded untouched to the scheduler factory.
pub type DriverParameters = BTreeMap<String, serde_json::Value>;

/// One configured cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StackConfig {
    /// Disabled stacks are skipped with a warning; they are not an error.
    #[serde(default)]
    pub disabled: bool,
    /// Driver name → parameters. Exactly one entry is allowed.
    #[serde(default)]
    pub scheduler: BTreeMap<String, DriverParameters>,
}

impl StackConfig {
    /// The single configured driver for this stack.
    pub fn driver(&self, stack: &str) -> Result<(&str, &DriverParameters), ConfigError> {
        let mut drivers = self.scheduler.iter();
        let Some((name, params)) = drivers.next() else {
            return Err(ConfigError::MissingDriver {
                stack: stack.to_string(),
            });
        };
        if drivers.next().is_some() {
            return Err(ConfigError::MultipleDrivers {
                stack: stack.to_string(),
                drivers: self.scheduler.keys().cloned().collect(),
            });
        }
        Ok((name.as_str(), params))
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub cluster: BTreeMap<String, StackConfig>,
}

impl ClusterConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ClusterConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configs that could never deploy anywhere.
    ///
    /// Every stack (disabled ones included) must name exactly one driver,
    /// and at least one stack must be enabled.
    fn validate(&self) -> Result<(), ConfigError> {
        for (stack, config) in &self.cluster {
            config.driver(stack)?;
        }
        if self.enabled_stacks().next().is_none() {
            return Err(ConfigError::NoEnabledStacks);
        }
        Ok(())
    }

    /// Stacks that take part in deploys, in stable (sorted) order.
    pub fn enabled_stacks(&self) -> impl Iterator<Item = (&String, &StackConfig)> {
        self.cluster.iter().filter(|(_, c)| !c.disabled)
    }

    /// Stacks skipped because they are disabled.
    pub fn disabled_stacks(&self) -> impl Iterator<Item = &String> {
        self.cluster
            .iter()
            .filter(|(_, c)| c.disabled)
            .map(|(id, _)| id)
    }
}

//! Deploy core error types.

use stevedore_core::{ConfigError, ValidationError};
use stevedore_scheduler::SchedulerError;
use thiserror::Error;

/// What can go wrong across a whole deploy.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("stack {stack}: {source}")]
    Scheduler {
        stack: String,
        #[source]
        source: SchedulerError,
    },

    #[error("deploy failed, partial changes rolled back")]
    DeployFailed,

    #[error("deploy interrupted, partial changes rolled back")]
    Interrupted,
}

//! Scheduler contract error types.

use thiserror::Error;

/// Errors a scheduler driver can surface to the deploy core.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no scheduler driver registered under {0:?}")]
    UnknownDriver(String),

    #[error("scheduler driver {0:?} is already registered")]
    AlreadyRegistered(String),

    #[error("driver {driver:?} is missing required parameter {key:?}")]
    MissingParameter { driver: String, key: String },

    #[error("pulling image {image}: {message}")]
    Pull { image: String, message: String },

    #[error("creating container from {image}: {message}")]
    Create { image: String, message: String },

    #[error("starting container {id}: {message}")]
    Start { id: String, message: String },

    #[error("inspecting container {id}: {message}")]
    Inspect { id: String, message: String },

    #[error("stopping container {id}: {message}")]
    Stop { id: String, message: String },

    #[error("removing container {id}: {message}")]
    Remove { id: String, message: String },

    #[error("listing containers: {0}")]
    List(String),
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;

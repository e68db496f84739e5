//! Error types raised before the deploy core runs.

use std::path::PathBuf;

use thiserror::Error;

/// Input validation failure.
///
/// Always raised before any scheduler call, so it never triggers a
/// rollback — nothing was deployed yet.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("image name must not be empty")]
    MissingImage,

    #[error("image tag must not be empty")]
    MissingTag,

    #[error("smoke test target must be configured")]
    MissingSmokeTarget,

    #[error("tag {0:?} does not start with a version")]
    MalformedTag(String),

    #[error("invalid memory value {0:?} (expected an M/MB/G/GB suffix)")]
    MalformedMemory(String),

    #[error("invalid expected-body pattern {pattern:?}: {source}")]
    MalformedExpected {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("unsupported probe type {0:?} (expected http or tcp)")]
    UnknownMonitorKind(String),

    #[error("tolerance {0} out of range [0, 1]")]
    ToleranceOutOfRange(f64),

    #[error("environment file {0} does not exist")]
    EnvFileMissing(PathBuf),

    #[error("reading environment file {path}")]
    EnvFileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Cluster configuration file failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("stack {stack:?} must configure exactly one scheduler, found: {drivers:?}")]
    MultipleDrivers { stack: String, drivers: Vec<String> },

    #[error("stack {stack:?} has no scheduler configured")]
    MissingDriver { stack: String },

    #[error("configuration has no enabled stacks")]
    NoEnabledStacks,
}

//! Two-phase health probes.
//!
//! The instance controller validates every new container with a smoke
//! test and an optional warm-up, both expressed through the [`Monitor`]
//! trait. Two probes exist: [`HttpMonitor`] (GET a path, require a 200
//! and a body matching a regex) and [`TcpMonitor`] (a successful dial is
//! enough). Both retry with a fixed pause; `retries == -1` retries
//! forever and `retries == 0` marks the probe unconfigured, which makes
//! the controller skip the phase.

mod http_monitor;
mod tcp_monitor;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stevedore_core::{MonitorKind, MonitorSpec, ValidationError};

pub use http_monitor::HttpMonitor;
pub use tcp_monitor::TcpMonitor;

/// Pause between probe attempts.
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

/// A readiness probe for one instance.
#[async_trait]
pub trait Monitor: Send + Sync {
    /// Probe `addr` until it passes or the retry budget runs out.
    ///
    /// `instance_id` is only used to attribute log lines.
    async fn check(&self, instance_id: &str, addr: &str) -> bool;

    /// Whether this probe will run at all. Unconfigured probes make the
    /// phase succeed without any network traffic.
    fn configured(&self) -> bool;
}

/// Build the probe a [`MonitorSpec`] describes.
///
/// A malformed `expected` pattern is a validation failure, surfaced
/// before anything is deployed.
pub fn from_spec(spec: &MonitorSpec) -> Result<Arc<dyn Monitor>, ValidationError> {
    match spec.kind {
        MonitorKind::Http => Ok(Arc::new(HttpMonitor::from_spec(spec)?)),
        MonitorKind::Tcp => Ok(Arc::new(TcpMonitor::new(spec.retries))),
    }
}

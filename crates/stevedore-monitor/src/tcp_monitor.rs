//! TCP readiness probe.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::{Monitor, RETRY_DELAY};

/// Dials the instance address; a successful connect is a pass.
pub struct TcpMonitor {
    retries: i32,
    retry_delay: Duration,
}

impl TcpMonitor {
    pub fn new(retries: i32) -> Self {
        Self {
            retries,
            retry_delay: RETRY_DELAY,
        }
    }

    pub fn set_retries(&mut self, retries: i32) {
        self.retries = retries;
    }

    /// Shorten the pause between attempts (tests).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

#[async_trait]
impl Monitor for TcpMonitor {
    async fn check(&self, instance_id: &str, addr: &str) -> bool {
        let mut attempt = 1;
        while self.retries == -1 || attempt <= self.retries {
            info!(
                instance = instance_id,
                attempt,
                retries = self.retries,
                "TCP check"
            );
            match tokio::net::TcpStream::connect(addr).await {
                Ok(_) => {
                    info!(instance = instance_id, %addr, "TCP check OK");
                    return true;
                }
                Err(e) => {
                    debug!(instance = instance_id, error = %e, %addr, "TCP check failed");
                }
            }
            attempt += 1;
            if self.retries == -1 || attempt <= self.retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        false
    }

    fn configured(&self) -> bool {
        self.retries != 0
    }
}

//! HTTP readiness probe.

use std::time::Duration;

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use regex::Regex;
use stevedore_core::{MonitorSpec, ValidationError};
use tracing::{debug, info, warn};

use crate::{Monitor, RETRY_DELAY};

/// GETs `http://<addr><request>` until the response is a 200 whose body
/// matches the expected pattern.
pub struct HttpMonitor {
    request: String,
    expected: Regex,
    retries: i32,
    retry_delay: Duration,
}

impl HttpMonitor {
    pub fn from_spec(spec: &MonitorSpec) -> Result<Self, ValidationError> {
        Ok(Self {
            request: spec.request.clone(),
            expected: spec.compiled_expected()?,
            retries: spec.retries,
            retry_delay: RETRY_DELAY,
        })
    }

    pub fn set_request(&mut self, request: &str) {
        self.request = request.to_string();
    }

    pub fn set_expected(&mut self, pattern: &str) -> Result<(), ValidationError> {
        self.expected =
            Regex::new(pattern).map_err(|source| ValidationError::MalformedExpected {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(())
    }

    pub fn set_retries(&mut self, retries: i32) {
        self.retries = retries;
    }

    /// Shorten the pause between attempts (tests).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// One GET against the instance. Any transport failure is a miss.
    async fn attempt(&self, instance_id: &str, addr: &str) -> bool {
        let uri = format!("http://{addr}{}", self.request);

        let stream = match tokio::net::TcpStream::connect(addr).await {
            Ok(s) => s,
            Err(e) => {
                debug!(instance = instance_id, error = %e, %uri, "probe connection failed");
                return false;
            }
        };

        let io = TokioIo::new(stream);
        let (mut sender, conn) = match hyper::client::conn::http1::handshake(io).await {
            Ok(pair) => pair,
            Err(e) => {
                debug!(instance = instance_id, error = %e, %uri, "probe handshake failed");
                return false;
            }
        };

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = match http::Request::builder()
            .method("GET")
            .uri(&uri)
            .header("host", addr)
            .body(Empty::<bytes::Bytes>::new())
        {
            Ok(req) => req,
            Err(e) => {
                debug!(instance = instance_id, error = %e, %uri, "probe request invalid");
                return false;
            }
        };

        let resp = match sender.send_request(req).await {
            Ok(resp) => resp,
            Err(e) => {
                debug!(instance = instance_id, error = %e, %uri, "probe request failed");
                return false;
            }
        };

        if resp.status() != http::StatusCode::OK {
            debug!(instance = instance_id, status = %resp.status(), %uri, "probe non-200");
            return false;
        }

        let body = match resp.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                debug!(instance = instance_id, error = %e, %uri, "probe body read failed");
                return false;
            }
        };

        let body = String::from_utf8_lossy(&body);
        if self.expected.is_match(&body) {
            true
        } else {
            warn!(instance = instance_id, %uri, %body, "probe body did not match");
            false
        }
    }
}

#[async_trait]
impl Monitor for HttpMonitor {
    async fn check(&self, instance_id: &str, addr: &str) -> bool {
        let mut attempt = 1;
        while self.retries == -1 || attempt <= self.retries {
            info!(
                instance = instance_id,
                attempt,
                retries = self.retries,
                "HTTP check"
            );
            if self.attempt(instance_id, addr).await {
                return true;
            }
            attempt += 1;
            if self.retries == -1 || attempt <= self.retries {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        false
    }

    fn configured(&self) -> bool {
        self.retries != 0 && !self.request.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn monitor(request: &str, expected: &str, retries: i32) -> HttpMonitor {
        let spec = MonitorSpec {
            kind: stevedore_core::MonitorKind::Http,
            retries,
            request: request.to_string(),
            expected: expected.to_string(),
        };
        HttpMonitor::from_spec(&spec)
            .unwrap()
            .with_retry_delay(Duration::from_millis(1))
    }

    /// Serve a fixed response to every connection on an ephemeral port.
    async fn serve(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    break;
                };
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                    let response = format!(
                        "{status_line}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                });
            }
        });
        addr
    }

    #[tokio::test]
    async fn passes_on_matching_body() {
        let addr = serve("HTTP/1.1 200 OK", "status: healthy").await;
        let m = monitor("/health", "healthy", 1);
        assert!(m.check("inst-1", &addr).await);
    }

    #[tokio::test]
    async fn fails_on_non_200() {
        let addr = serve("HTTP/1.1 503 Service Unavailable", "booting").await;
        let m = monitor("/health", ".*", 2);
        assert!(!m.check("inst-1", &addr).await);
    }

    #[tokio::test]
    async fn fails_on_body_mismatch() {
        let addr = serve("HTTP/1.1 200 OK", "status: degraded").await;
        let m = monitor("/health", "healthy", 2);
        assert!(!m.check("inst-1", &addr).await);
    }

    #[tokio::test]
    async fn fails_when_nothing_listens() {
        // Port 1 is never listening on loopback.
        let m = monitor("/health", ".*", 2);
        assert!(!m.check("inst-1", "127.0.0.1:1").await);
    }

    #[tokio::test]
    async fn zero_retries_is_unconfigured_and_never_probes() {
        let m = monitor("/health", ".*", 0);
        assert!(!m.configured());
        // With zero retries the loop body never runs.
        assert!(!m.check("inst-1", "127.0.0.1:1").await);
    }

    #[test]
    fn empty_request_is_unconfigured() {
        let m = monitor("", ".*", 10);
        assert!(!m.configured());
    }

    #[test]
    fn setters_reconfigure() {
        let mut m = monitor("/health", ".*", 1);
        m.set_request("/ready");
        m.set_retries(5);
        m.set_expected("ready").unwrap();
        assert!(m.configured());
        assert!(m.set_expected("[").is_err());
    }
}

//! Service and probe specifications.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::envs::mask_envs;
use crate::error::ValidationError;

/// Everything a deploy needs to know about the desired service.
///
/// `publish` entries are `"<port>/<proto>"` strings; `memory_bytes == 0`
/// means unlimited. `service_id` is an opaque label the driver may use
/// for log-routing templating.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub image_name: String,
    pub tag: String,
    /// Ordered `KEY=VALUE` pairs.
    pub envs: Vec<String>,
    /// Ordered `"<port>/<proto>"` publications.
    pub publish: Vec<String>,
    pub cpu_shares: u32,
    pub memory_bytes: u64,
    pub service_id: Option<String>,
}

impl ServiceSpec {
    /// Full image reference, `name:tag`.
    pub fn image(&self) -> String {
        format!("{}:{}", self.image_name, self.tag)
    }

    /// Leading version component of the tag, e.g. `"1.2.3-abcdef"` → `"1.2.3"`.
    pub fn version(&self) -> Result<String, ValidationError> {
        let pattern = Regex::new(r"^([\d.]+)-").expect("static pattern");
        pattern
            .captures(&self.tag)
            .map(|c| c[1].to_string())
            .ok_or_else(|| ValidationError::MalformedTag(self.tag.clone()))
    }

    /// Reject a spec before any scheduler is contacted.
    ///
    /// A deploy needs an image, a tag, and a configured smoke probe.
    pub fn validate(&self, smoke: &MonitorSpec) -> Result<(), ValidationError> {
        if self.image_name.is_empty() {
            return Err(ValidationError::MissingImage);
        }
        if self.tag.is_empty() {
            return Err(ValidationError::MissingTag);
        }
        if !smoke.configured() {
            return Err(ValidationError::MissingSmokeTarget);
        }
        Ok(())
    }
}

impl fmt::Display for ServiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "image={} cpu_shares={} memory_bytes={} publish={:?} envs={:?}",
            self.image(),
            self.cpu_shares,
            self.memory_bytes,
            self.publish,
            mask_envs(&self.envs),
        )
    }
}

/// Probe flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorKind {
    Http,
    Tcp,
}

impl FromStr for MonitorKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Ok(MonitorKind::Http),
            "tcp" => Ok(MonitorKind::Tcp),
            other => Err(ValidationError::UnknownMonitorKind(other.to_string())),
        }
    }
}

impl fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorKind::Http => write!(f, "http"),
            MonitorKind::Tcp => write!(f, "tcp"),
        }
    }
}

/// Inputs for one probe phase.
///
/// `retries >= 1` bounds the attempts, `-1` retries forever, and `0`
/// marks the probe as not configured — the phase is skipped entirely.
/// `request` is the URL path for HTTP probes and ignored for TCP.
/// `expected` is a regex matched against the HTTP response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSpec {
    pub kind: MonitorKind,
    pub retries: i32,
    pub request: String,
    pub expected: String,
}

impl MonitorSpec {
    /// A spec whose phase is skipped.
    pub fn disabled() -> Self {
        Self {
            kind: MonitorKind::Http,
            retries: 0,
            request: String::new(),
            expected: String::new(),
        }
    }

    /// Whether this probe will run at all.
    pub fn configured(&self) -> bool {
        match self.kind {
            MonitorKind::Http => self.retries != 0 && !self.request.is_empty(),
            MonitorKind::Tcp => self.retries != 0,
        }
    }

    /// Compile the expected-body pattern, surfacing bad regexes as a
    /// validation failure.
    pub fn compiled_expected(&self) -> Result<Regex, ValidationError> {
        Regex::new(&self.expected).map_err(|source| ValidationError::MalformedExpected {
            pattern: self.expected.clone(),
            source,
        })
    }
}

/// Parse a human memory amount into bytes.
///
/// Accepts `M`/`MB` and `G`/`GB` suffixes, case-insensitive.
pub fn parse_memory(input: &str) -> Result<u64, ValidationError> {
    let trimmed = input.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (digits, multiplier) = if let Some(d) = upper.strip_suffix("MB") {
        (d, 1024 * 1024)
    } else if let Some(d) = upper.strip_suffix("GB") {
        (d, 1024 * 1024 * 1024)
    } else if let Some(d) = upper.strip_suffix('M') {
        (d, 1024 * 1024)
    } else if let Some(d) = upper.strip_suffix('G') {
        (d, 1024 * 1024 * 1024)
    } else {
        return Err(ValidationError::MalformedMemory(input.to_string()));
    };

    digits
        .trim()
        .parse::<u64>()
        .map(|n| n * multiplier)
        .map_err(|_| ValidationError::MalformedMemory(input.to_string()))
}

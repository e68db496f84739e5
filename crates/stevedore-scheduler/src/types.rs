//! What a scheduler reports back about containers.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Container state as the scheduler sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServiceStatus {
    Up,
    Down,
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceStatus::Up => write!(f, "Up"),
            ServiceStatus::Down => write!(f, "Down"),
        }
    }
}

/// Transport protocol of a published port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortProtocol {
    Tcp,
    Udp,
}

impl PortProtocol {
    /// Anything that is not explicitly UDP is treated as TCP.
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("udp") {
            PortProtocol::Udp
        } else {
            PortProtocol::Tcp
        }
    }
}

impl fmt::Display for PortProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortProtocol::Tcp => write!(f, "tcp"),
            PortProtocol::Udp => write!(f, "udp"),
        }
    }
}

/// One internal port of a container and its host-side publications.
///
/// `publics` keeps the scheduler's reported order; a `0` entry means the
/// mapping exists but was not published on the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePort {
    pub advertise: String,
    pub internal: u16,
    pub publics: Vec<u16>,
    pub protocol: PortProtocol,
}

/// Failure to resolve a public address for an internal port.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PortError {
    #[error("internal port {0} is not published on the host")]
    NotPublished(u16),

    #[error("unknown internal port {0}")]
    UnknownPort(u16),
}

/// Basic facts about one container, as reported by a scheduler.
///
/// `ports` is keyed `"<internal>/<proto>"`, matching the runtime's own
/// port identifiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceInformation {
    pub id: String,
    pub image_name: String,
    pub image_tag: String,
    pub host: String,
    pub container_name: String,
    pub status: ServiceStatus,
    pub ports: HashMap<String, ServicePort>,
}

impl ServiceInformation {
    pub fn healthy(&self) -> bool {
        self.status == ServiceStatus::Up
    }

    /// The port record for an internal port, regardless of protocol.
    pub fn port(&self, internal: u16) -> Option<&ServicePort> {
        self.ports.values().find(|p| p.internal == internal)
    }

    /// `"<advertise>:<public>"` for the first non-zero publication of an
    /// internal port.
    pub fn public_address(&self, internal: u16) -> Result<String, PortError> {
        let port = self
            .port(internal)
            .ok_or(PortError::UnknownPort(internal))?;
        let public = port
            .publics
            .iter()
            .find(|p| **p != 0)
            .ok_or(PortError::NotPublished(internal))?;
        Ok(format!("{}:{}", port.advertise, public))
    }
}

/// Predicate handed to [`Scheduler::list_containers`].
///
/// Regex fields match against container name, image name, and tag; the
/// status whitelist uses the runtime's own state names.
///
/// [`Scheduler::list_containers`]: crate::Scheduler::list_containers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerFilter {
    pub name_regex: String,
    pub image_regex: String,
    pub tag_regex: String,
    pub status: Vec<String>,
}

impl Default for ContainerFilter {
    fn default() -> Self {
        Self {
            name_regex: ".*".to_string(),
            image_regex: ".*".to_string(),
            tag_regex: ".*".to_string(),
            status: vec![
                "restarting".to_string(),
                "running".to_string(),
                "paused".to_string(),
                "exited".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with_ports(ports: Vec<(&str, ServicePort)>) -> ServiceInformation {
        ServiceInformation {
            id: "c0ffee".to_string(),
            image_name: "api".to_string(),
            image_tag: "1.0.0-ab12".to_string(),
            host: "node-1".to_string(),
            container_name: "api_1".to_string(),
            status: ServiceStatus::Up,
            ports: ports.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
        }
    }

    #[test]
    fn public_address_uses_first_non_zero_public() {
        let info = info_with_ports(vec![(
            "8080/tcp",
            ServicePort {
                advertise: "10.0.0.5".to_string(),
                internal: 8080,
                publics: vec![0, 32768],
                protocol: PortProtocol::Tcp,
            },
        )]);
        assert_eq!(info.public_address(8080).unwrap(), "10.0.0.5:32768");
    }

    #[test]
    fn public_address_unknown_port() {
        let info = info_with_ports(vec![]);
        assert_eq!(info.public_address(8080), Err(PortError::UnknownPort(8080)));
    }

    #[test]
    fn public_address_not_published() {
        let info = info_with_ports(vec![(
            "8080/tcp",
            ServicePort {
                advertise: "10.0.0.5".to_string(),
                internal: 8080,
                publics: vec![0],
                protocol: PortProtocol::Tcp,
            },
        )]);
        assert_eq!(
            info.public_address(8080),
            Err(PortError::NotPublished(8080))
        );
    }

    #[test]
    fn healthy_follows_status() {
        let mut info = info_with_ports(vec![]);
        assert!(info.healthy());
        info.status = ServiceStatus::Down;
        assert!(!info.healthy());
    }

    #[test]
    fn default_filter_matches_everything() {
        let filter = ContainerFilter::default();
        assert_eq!(filter.name_regex, ".*");
        assert_eq!(filter.image_regex, ".*");
        assert_eq!(filter.tag_regex, ".*");
        assert_eq!(
            filter.status,
            vec!["restarting", "running", "paused", "exited"]
        );
    }

    #[test]
    fn protocol_parse_defaults_to_tcp() {
        assert_eq!(PortProtocol::parse("udp"), PortProtocol::Udp);
        assert_eq!(PortProtocol::parse("UDP"), PortProtocol::Udp);
        assert_eq!(PortProtocol::parse("tcp"), PortProtocol::Tcp);
        assert_eq!(PortProtocol::parse("anything"), PortProtocol::Tcp);
    }
}

//! The `deploy` subcommand.

use std::path::PathBuf;

use clap::Args;
use stevedore_cluster::{FleetCoordinator, SERVICE_PORT};
use stevedore_core::{envs, parse_memory, MonitorKind, MonitorSpec, ServiceSpec};
use tracing::{error, info, warn};

use crate::callback::{self, DeployedService};

#[derive(Args)]
pub struct DeployArgs {
    /// Image name to deploy
    #[arg(long)]
    pub image: String,

    /// Image tag to deploy
    #[arg(long)]
    pub tag: String,

    /// Desired instances per stack
    #[arg(long, default_value_t = 1)]
    pub instances: usize,

    /// Fraction of the requested instances allowed to fail, in [0, 1]
    #[arg(long, default_value_t = 0.5)]
    pub tolerance: f64,

    /// CPU shares reserved for the service
    #[arg(long, default_value_t = 0)]
    pub cpu: u32,

    /// Memory limit with an M/MB/G/GB suffix
    #[arg(long)]
    pub memory: Option<String>,

    /// KEY=VALUE environment variable (repeatable)
    #[arg(long = "env")]
    pub envs: Vec<String>,

    /// File with one KEY=VALUE per line (repeatable)
    #[arg(long = "env-file")]
    pub env_files: Vec<PathBuf>,

    /// Internal port to publish on the host (repeatable)
    #[arg(long = "port", default_value = "8080")]
    pub ports: Vec<String>,

    /// Opaque service label used for log routing
    #[arg(long)]
    pub service_id: Option<String>,

    /// Smoke test attempts before an instance is declared failed
    #[arg(long, default_value_t = 10)]
    pub smoke_retries: i32,

    /// Smoke probe type: http or tcp
    #[arg(long, default_value = "http")]
    pub smoke_type: String,

    /// Smoke probe request path
    #[arg(long)]
    pub smoke_request: String,

    /// Regex the smoke response body must match
    #[arg(long, default_value = ".*")]
    pub smoke_expected: String,

    /// Warm-up request path; the warm-up phase is skipped when absent
    #[arg(long)]
    pub warmup_request: Option<String>,

    /// Regex the warm-up response body must match
    #[arg(long, default_value = ".*")]
    pub warmup_expected: String,

    /// CI endpoint notified after a successful deploy
    #[arg(long, env = "STEVEDORE_CALLBACK_URL")]
    pub callback_url: Option<String>,

    /// CI job name for the callback
    #[arg(long)]
    pub callback_job: Option<String>,

    /// CI token for the callback
    #[arg(long)]
    pub callback_token: Option<String>,
}

pub async fn run(fleet: &FleetCoordinator, args: DeployArgs) -> anyhow::Result<()> {
    let spec = build_spec(&args)?;
    let (smoke, warm) = monitor_specs(&args)?;

    fleet
        .deploy(&spec, &smoke, &warm, args.instances, args.tolerance)
        .await?;

    println!("Deploy OK");
    let mut resume = Vec::new();
    for controller in fleet.deployed_containers().await {
        let Some(register_id) = controller.registrator_id().await else {
            continue;
        };
        match controller.address_and_port(SERVICE_PORT).await {
            Ok(address) => {
                info!(instance = %controller.id(), %register_id, %address, "instance deployed");
                println!("{register_id} -> {address}");
                resume.push(DeployedService {
                    register_id,
                    address,
                });
            }
            Err(e) => {
                error!(instance = %controller.id(), error = %e, "deployed instance has no address");
            }
        }
    }

    match (&args.callback_url, &args.callback_job, &args.callback_token) {
        (Some(url), Some(job), Some(token)) => {
            callback::notify(url, job, token, &resume).await;
        }
        _ => warn!("callback parameters missing, skipping CI notification"),
    }

    Ok(())
}

fn build_spec(args: &DeployArgs) -> anyhow::Result<ServiceSpec> {
    let mut spec_envs = envs::load_env_files(&args.env_files)?;
    spec_envs.extend(args.envs.iter().cloned());

    let memory_bytes = match &args.memory {
        Some(memory) => parse_memory(memory)?,
        None => 0,
    };

    Ok(ServiceSpec {
        image_name: args.image.clone(),
        tag: args.tag.clone(),
        envs: spec_envs,
        publish: args.ports.iter().map(|p| normalize_port(p)).collect(),
        cpu_shares: args.cpu,
        memory_bytes,
        service_id: args.service_id.clone(),
    })
}

fn monitor_specs(args: &DeployArgs) -> anyhow::Result<(MonitorSpec, MonitorSpec)> {
    let smoke = MonitorSpec {
        kind: args.smoke_type.parse()?,
        retries: args.smoke_retries,
        request: args.smoke_request.clone(),
        expected: args.smoke_expected.clone(),
    };

    let warm = match &args.warmup_request {
        Some(request) => MonitorSpec {
            kind: MonitorKind::Http,
            retries: 1,
            request: request.clone(),
            expected: args.warmup_expected.clone(),
        },
        None => MonitorSpec::disabled(),
    };

    Ok((smoke, warm))
}

/// Bare port numbers publish as TCP.
fn normalize_port(port: &str) -> String {
    if port.contains('/') {
        port.to_string()
    } else {
        format!("{port}/tcp")
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn args() -> DeployArgs {
        DeployArgs {
            image: "registry.example.com/api".to_string(),
            tag: "1.2.3-abc".to_string(),
            instances: 1,
            tolerance: 0.5,
            cpu: 0,
            memory: None,
            envs: Vec::new(),
            env_files: Vec::new(),
            ports: vec!["8080".to_string()],
            service_id: None,
            smoke_retries: 10,
            smoke_type: "http".to_string(),
            smoke_request: "/health".to_string(),
            smoke_expected: ".*".to_string(),
            warmup_request: None,
            warmup_expected: ".*".to_string(),
            callback_url: None,
            callback_job: None,
            callback_token: None,
        }
    }

    #[test]
    fn bare_ports_become_tcp() {
        assert_eq!(normalize_port("8080"), "8080/tcp");
        assert_eq!(normalize_port("53/udp"), "53/udp");
    }

    #[test]
    fn build_spec_parses_memory() {
        let mut a = args();
        a.memory = Some("512M".to_string());
        let spec = build_spec(&a).unwrap();
        assert_eq!(spec.memory_bytes, 512 * 1024 * 1024);
        assert_eq!(spec.publish, vec!["8080/tcp"]);
    }

    #[test]
    fn build_spec_rejects_bad_memory() {
        let mut a = args();
        a.memory = Some("lots".to_string());
        assert!(build_spec(&a).is_err());
    }

    #[test]
    fn env_files_come_before_env_flags() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "FROM_FILE=1").unwrap();

        let mut a = args();
        a.env_files = vec![file.path().to_path_buf()];
        a.envs = vec!["FROM_FLAG=2".to_string()];

        let spec = build_spec(&a).unwrap();
        assert_eq!(spec.envs, vec!["FROM_FILE=1", "FROM_FLAG=2"]);
    }

    #[test]
    fn missing_env_file_fails() {
        let mut a = args();
        a.env_files = vec![PathBuf::from("/no/such/envfile")];
        assert!(build_spec(&a).is_err());
    }

    #[test]
    fn warm_up_defaults_to_disabled() {
        let (smoke, warm) = monitor_specs(&args()).unwrap();
        assert!(smoke.configured());
        assert!(!warm.configured());
    }

    #[test]
    fn warm_up_enabled_with_one_retry() {
        let mut a = args();
        a.warmup_request = Some("/warm".to_string());
        let (_, warm) = monitor_specs(&a).unwrap();
        assert!(warm.configured());
        assert_eq!(warm.retries, 1);
        assert_eq!(warm.kind, MonitorKind::Http);
    }

    #[test]
    fn smoke_type_tcp_parses() {
        let mut a = args();
        a.smoke_type = "tcp".to_string();
        let (smoke, _) = monitor_specs(&a).unwrap();
        assert_eq!(smoke.kind, MonitorKind::Tcp);
    }

    #[test]
    fn unknown_smoke_type_fails() {
        let mut a = args();
        a.smoke_type = "icmp".to_string();
        assert!(monitor_specs(&a).is_err());
    }
}

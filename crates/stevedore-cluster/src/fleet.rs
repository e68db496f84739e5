//! Fleet coordinator — fans a deploy out across every configured stack
//! and collapses their verdicts into one decision.

use std::collections::BTreeMap;
use std::sync::Arc;

use stevedore_core::{ClusterConfig, MonitorSpec, ServiceSpec, ValidationError};
use stevedore_scheduler::{
    ContainerFilter, SchedulerRegistry, SchedulerResult, ServiceInformation,
};
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, warn};

use crate::error::ClusterError;
use crate::instance::InstanceController;
use crate::stack::{StackSupervisor, StackVerdict};

/// Owns the stack supervisors and the verdict channel they report on.
pub struct FleetCoordinator {
    stacks: BTreeMap<String, Arc<StackSupervisor>>,
    verdicts_rx: Mutex<mpsc::Receiver<StackVerdict>>,
}

impl FleetCoordinator {
    /// Assemble a coordinator from already-built supervisors.
    ///
    /// `verdicts_rx` must be the receiving half of the channel every
    /// supervisor was given; its buffer must hold at least one verdict
    /// per stack so no supervisor ever blocks on reporting.
    pub fn new(
        stacks: BTreeMap<String, Arc<StackSupervisor>>,
        verdicts_rx: mpsc::Receiver<StackVerdict>,
    ) -> Self {
        Self {
            stacks,
            verdicts_rx: Mutex::new(verdicts_rx),
        }
    }

    /// Build one supervisor per enabled stack in the configuration.
    ///
    /// Disabled stacks are skipped with a warning; a configuration with
    /// nothing left enabled is fatal.
    pub fn from_config(
        config: &ClusterConfig,
        registry: &SchedulerRegistry,
    ) -> Result<Self, ClusterError> {
        for stack_id in config.disabled_stacks() {
            warn!(stack = %stack_id, "stack disabled, skipping");
        }

        let enabled: Vec<_> = config.enabled_stacks().collect();
        if enabled.is_empty() {
            return Err(stevedore_core::ConfigError::NoEnabledStacks.into());
        }

        let (verdicts_tx, verdicts_rx) = mpsc::channel(enabled.len());
        let mut stacks = BTreeMap::new();
        for (stack_id, stack_config) in enabled {
            let (driver, parameters) = stack_config.driver(stack_id)?;
            let scheduler =
                registry
                    .create(driver, parameters)
                    .map_err(|source| ClusterError::Scheduler {
                        stack: stack_id.clone(),
                        source,
                    })?;
            info!(stack = %stack_id, driver, "stack configured");
            stacks.insert(
                stack_id.clone(),
                Arc::new(StackSupervisor::new(
                    stack_id.clone(),
                    scheduler,
                    verdicts_tx.clone(),
                )),
            );
        }

        Ok(Self::new(stacks, verdicts_rx))
    }

    pub fn stack_count(&self) -> usize {
        self.stacks.len()
    }

    /// Drive every stack toward `desired` replicas of `spec`.
    ///
    /// Succeeds only when every stack reports ready. The first failed
    /// verdict — or an interrupt/terminate signal — rolls the whole
    /// fleet back.
    pub async fn deploy(
        &self,
        spec: &ServiceSpec,
        smoke_spec: &MonitorSpec,
        warm_spec: &MonitorSpec,
        desired: usize,
        tolerance: f64,
    ) -> Result<(), ClusterError> {
        spec.validate(smoke_spec)?;
        if !(0.0..=1.0).contains(&tolerance) {
            return Err(ValidationError::ToleranceOutOfRange(tolerance).into());
        }

        // Build every stack's probes up front so a malformed pattern can
        // never strand a half-deployed fleet.
        let mut monitors = Vec::with_capacity(self.stacks.len());
        for _ in 0..self.stacks.len() {
            monitors.push((
                stevedore_monitor::from_spec(smoke_spec)?,
                stevedore_monitor::from_spec(warm_spec)?,
            ));
        }

        // Adopt whatever is already running before counting replicas.
        for (stack_id, supervisor) in &self.stacks {
            supervisor
                .load_filtered_containers(&spec.image_name, &spec.tag, ".*")
                .await
                .map_err(|source| ClusterError::Scheduler {
                    stack: stack_id.clone(),
                    source,
                })?;
        }

        info!(
            image = %spec.image(),
            desired,
            tolerance,
            stacks = self.stacks.len(),
            "starting fleet deploy"
        );

        for ((stack_id, supervisor), (smoke, warm)) in self.stacks.iter().zip(monitors) {
            let supervisor = supervisor.clone();
            let spec = spec.clone();
            info!(stack = %stack_id, "starting stack supervisor");
            tokio::spawn(async move {
                supervisor
                    .deploy_check_and_notify(&spec, smoke, warm, desired, tolerance)
                    .await;
            });
        }

        let mut verdicts = self.verdicts_rx.lock().await;
        let interrupt = shutdown_signal();
        tokio::pin!(interrupt);

        for _ in 0..self.stacks.len() {
            tokio::select! {
                verdict = verdicts.recv() => match verdict {
                    Some(StackVerdict::Ready) => {
                        info!("stack verdict received: ready");
                    }
                    Some(StackVerdict::Failed) | None => {
                        error!("stack failed, rolling the fleet back");
                        self.rollback().await;
                        return Err(ClusterError::DeployFailed);
                    }
                },
                _ = &mut interrupt => {
                    warn!("interrupt received, rolling the fleet back");
                    self.rollback().await;
                    return Err(ClusterError::Interrupted);
                }
            }
        }

        info!("fleet deploy succeeded");
        Ok(())
    }

    /// Undeploy everything this run created, on every stack.
    pub async fn rollback(&self) {
        for supervisor in self.stacks.values() {
            supervisor.rollback().await;
        }
    }

    /// Instances deployed by this run that are warm and still running.
    pub async fn deployed_containers(&self) -> Vec<Arc<InstanceController>> {
        let mut deployed = Vec::new();
        for supervisor in self.stacks.values() {
            deployed.extend(supervisor.deployed().await);
        }
        deployed
    }

    /// Read-only: containers matching the filter, per stack.
    pub async fn search_containers(
        &self,
        filter: &ContainerFilter,
    ) -> SchedulerResult<BTreeMap<String, Vec<ServiceInformation>>> {
        let mut result = BTreeMap::new();
        for (stack_id, supervisor) in &self.stacks {
            result.insert(stack_id.clone(), supervisor.load_containers(filter).await?);
        }
        Ok(result)
    }

    /// Read-only: containers labeled with this image:tag, per stack.
    pub async fn tagged_containers(
        &self,
        image: &str,
        tag: &str,
    ) -> SchedulerResult<BTreeMap<String, Vec<ServiceInformation>>> {
        let mut result = BTreeMap::new();
        for (stack_id, supervisor) in &self.stacks {
            result.insert(
                stack_id.clone(),
                supervisor.load_tagged_containers(image, tag).await?,
            );
        }
        Ok(result)
    }
}

/// Resolves on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

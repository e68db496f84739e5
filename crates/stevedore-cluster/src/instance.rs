//! Instance controller — drives exactly one container through the
//! deploy lifecycle and reports every transition exactly once.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use stevedore_core::ServiceSpec;
use stevedore_monitor::Monitor;
use stevedore_scheduler::{PortError, Scheduler, ServiceInformation};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

/// Internal port probes and Registrator IDs resolve against.
pub const SERVICE_PORT: u16 = 8080;

/// Grace period handed to the scheduler when stopping a container.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Position in the deploy protocol.
///
/// `WarmReady` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Created,
    SmokeReady,
    WarmReady,
    Failed,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Created => write!(f, "CREATED"),
            Step::SmokeReady => write!(f, "SMOKE_READY"),
            Step::WarmReady => write!(f, "WARM_READY"),
            Step::Failed => write!(f, "FAILED"),
        }
    }
}

/// Container lifecycle state, orthogonal to [`Step`].
///
/// `Undeployed` is set only by [`InstanceController::undeploy`] and is
/// monotonic — a WARM_READY instance may be undeployed during rollback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Running,
    Undeployed,
}

/// Owns one service instance.
///
/// A controller is either created by this run (`loaded == false`) and
/// driven through the full protocol, or materialized from a container
/// that already existed (`loaded == true`), in which case it is never
/// created, probed, or counted as newly deployed — but it can still be
/// undeployed.
pub struct InstanceController {
    id: String,
    loaded: bool,
    scheduler: Arc<dyn Scheduler>,
    events: mpsc::Sender<String>,
    step: RwLock<Option<Step>>,
    state: RwLock<State>,
    info: RwLock<Option<ServiceInformation>>,
}

impl InstanceController {
    /// A controller for a container this run will create.
    pub fn new(id: String, scheduler: Arc<dyn Scheduler>, events: mpsc::Sender<String>) -> Self {
        info!(instance = %id, "setting up instance");
        Self {
            id,
            loaded: false,
            scheduler,
            events,
            step: RwLock::new(None),
            state: RwLock::new(State::Running),
            info: RwLock::new(None),
        }
    }

    /// A controller wrapped around an existing container.
    pub fn from_container(
        id: String,
        scheduler: Arc<dyn Scheduler>,
        info: ServiceInformation,
        events: mpsc::Sender<String>,
    ) -> Self {
        Self {
            id,
            loaded: true,
            scheduler,
            events,
            step: RwLock::new(None),
            state: RwLock::new(State::Running),
            info: RwLock::new(Some(info)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub async fn step(&self) -> Option<Step> {
        *self.step.read().await
    }

    pub async fn state(&self) -> State {
        *self.state.read().await
    }

    pub async fn service_info(&self) -> Option<ServiceInformation> {
        self.info.read().await.clone()
    }

    /// External identifier reported to downstream systems,
    /// `"<host>:<container_name>:8080"`.
    pub async fn registrator_id(&self) -> Option<String> {
        self.info
            .read()
            .await
            .as_ref()
            .map(|i| format!("{}:{}:{}", i.host, i.container_name, SERVICE_PORT))
    }

    /// `"<advertise>:<public>"` for an internal port of this instance.
    pub async fn address_and_port(&self, internal: u16) -> Result<String, PortError> {
        let info = self.info.read().await;
        let Some(info) = info.as_ref() else {
            return Err(PortError::UnknownPort(internal));
        };
        info.public_address(internal)
    }

    /// Record a transition and notify the supervisor, exactly once.
    async fn set_step(&self, step: Step) {
        *self.step.write().await = Some(step);
        info!(instance = %self.id, %step, "instance transition");
        // The supervisor may already be gone if the stack resolved while
        // this probe was in flight; the late event is simply dropped.
        if let Err(e) = self.events.send(self.id.clone()).await {
            debug!(instance = %self.id, error = %e, "supervisor no longer listening");
        }
    }

    /// Pull, create, and start the container for `spec`.
    ///
    /// Transitions to `CREATED` once the scheduler confirms the container
    /// is running, or to `FAILED` on any scheduler error.
    pub async fn run(&self, spec: &ServiceSpec) {
        info!(instance = %self.id, %spec, "deploying instance");

        match self.scheduler.create_and_run(spec).await {
            Ok(info) => {
                *self.info.write().await = Some(info);
                if let Some(registrator) = self.registrator_id().await {
                    info!(instance = %self.id, %registrator, "container running");
                }
                self.set_step(Step::Created).await;
            }
            Err(e) => {
                warn!(instance = %self.id, error = %e, "container run failed");
                self.set_step(Step::Failed).await;
            }
        }
    }

    /// First-phase probe against the instance's published service port.
    pub async fn run_smoke_test(&self, monitor: Arc<dyn Monitor>) {
        let addr = match self.address_and_port(SERVICE_PORT).await {
            Ok(addr) => addr,
            Err(e) => {
                warn!(instance = %self.id, error = %e, "cannot resolve probe address");
                self.set_step(Step::Failed).await;
                return;
            }
        };

        let passed = monitor.check(&self.id, &addr).await;
        info!(instance = %self.id, passed, "smoke test finished");
        self.set_step(if passed { Step::SmokeReady } else { Step::Failed })
            .await;
    }

    /// Optional second-phase probe; skipped when the monitor is not
    /// configured.
    pub async fn run_warm_up(&self, monitor: Arc<dyn Monitor>) {
        if !monitor.configured() {
            debug!(instance = %self.id, "warm-up not configured, skipping");
            self.set_step(Step::WarmReady).await;
            return;
        }

        let addr = match self.address_and_port(SERVICE_PORT).await {
            Ok(addr) => addr,
            Err(e) => {
                warn!(instance = %self.id, error = %e, "cannot resolve probe address");
                self.set_step(Step::Failed).await;
                return;
            }
        };

        let passed = monitor.check(&self.id, &addr).await;
        info!(instance = %self.id, passed, "warm-up finished");
        self.set_step(if passed { Step::WarmReady } else { Step::Failed })
            .await;
    }

    /// Loaded, matching the given image:tag, healthy, and not yet
    /// undeployed — i.e. counts toward a stack's current replica total.
    pub(crate) async fn is_running_match(&self, image: &str, tag: &str) -> bool {
        if !self.loaded() || self.state().await == State::Undeployed {
            return false;
        }
        match self.service_info().await {
            Some(info) => info.image_name == image && info.image_tag == tag && info.healthy(),
            None => false,
        }
    }

    /// Stop and remove the container. Idempotent and silent on the event
    /// channel.
    ///
    /// Scheduler errors are logged but the instance is still marked
    /// undeployed, so a retry cannot issue a second stop.
    pub async fn undeploy(&self) {
        if *self.state.read().await == State::Undeployed {
            debug!(instance = %self.id, "already undeployed");
            return;
        }

        let info = self.info.read().await.clone();
        let Some(info) = info else {
            warn!(instance = %self.id, "no container attached, nothing to undeploy");
            return;
        };

        info!(instance = %self.id, container = %info.id, "undeploying instance");
        if let Err(e) = self
            .scheduler
            .undeploy_container(&info.id, true, STOP_TIMEOUT)
            .await
        {
            error!(instance = %self.id, error = %e, "undeploy failed");
        }

        *self.state.write().await = State::Undeployed;
    }
}

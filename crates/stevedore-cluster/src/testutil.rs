//! In-memory scheduler and monitor fakes shared by the crate's tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use stevedore_core::ServiceSpec;
use stevedore_monitor::Monitor;
use stevedore_scheduler::{
    ContainerFilter, PortProtocol, Scheduler, SchedulerError, SchedulerResult,
    ServiceInformation, ServicePort, ServiceStatus,
};

pub fn spec() -> ServiceSpec {
    ServiceSpec {
        image_name: "registry.example.com/api".to_string(),
        tag: "1.2.3-abc".to_string(),
        publish: vec!["8080/tcp".to_string()],
        ..Default::default()
    }
}

/// A scheduler whose behavior is scripted per call.
pub struct MockScheduler {
    id: String,
    listed: Mutex<Vec<ServiceInformation>>,
    /// Public ports handed to upcoming creates, front first.
    next_publics: Mutex<VecDeque<u16>>,
    default_public: Mutex<u16>,
    fail_creates: AtomicUsize,
    fail_undeploys: AtomicBool,
    creates: AtomicUsize,
    undeployed: Mutex<Vec<String>>,
}

impl MockScheduler {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            listed: Mutex::new(Vec::new()),
            next_publics: Mutex::new(VecDeque::new()),
            default_public: Mutex::new(32768),
            fail_creates: AtomicUsize::new(0),
            fail_undeploys: AtomicBool::new(false),
            creates: AtomicUsize::new(0),
            undeployed: Mutex::new(Vec::new()),
        }
    }

    /// Containers reported by the list calls.
    pub fn set_listed(&self, containers: Vec<ServiceInformation>) {
        *self.listed.lock().unwrap() = containers;
    }

    /// Make the next `n` creates fail with a scheduler error.
    pub fn fail_next_creates(&self, n: usize) {
        self.fail_creates.store(n, Ordering::SeqCst);
    }

    /// Publish the next created container on the given public port
    /// instead of the default. `0` publishes nothing.
    pub fn publish_next_create_on(&self, public: u16) {
        self.next_publics.lock().unwrap().push_back(public);
    }

    /// Public port handed to creates with no scripted override.
    pub fn set_default_public(&self, public: u16) {
        *self.default_public.lock().unwrap() = public;
    }

    pub fn fail_undeploys(&self, fail: bool) {
        self.fail_undeploys.store(fail, Ordering::SeqCst);
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Container IDs that were undeployed, in call order.
    pub fn undeployed(&self) -> Vec<String> {
        self.undeployed.lock().unwrap().clone()
    }

    pub fn make_info(
        &self,
        container_id: &str,
        image: &str,
        tag: &str,
        public: u16,
    ) -> ServiceInformation {
        let short_image = image.rsplit('/').next().unwrap_or(image);
        ServiceInformation {
            id: container_id.to_string(),
            image_name: image.to_string(),
            image_tag: tag.to_string(),
            host: "node-1".to_string(),
            container_name: format!("{short_image}_{container_id}"),
            status: ServiceStatus::Up,
            ports: [(
                "8080/tcp".to_string(),
                ServicePort {
                    advertise: "127.0.0.1".to_string(),
                    internal: 8080,
                    publics: vec![public],
                    protocol: PortProtocol::Tcp,
                },
            )]
            .into_iter()
            .collect(),
        }
    }
}

#[async_trait]
impl Scheduler for MockScheduler {
    fn id(&self) -> &str {
        &self.id
    }

    async fn list_containers(
        &self,
        _filter: &ContainerFilter,
    ) -> SchedulerResult<Vec<ServiceInformation>> {
        Ok(self.listed.lock().unwrap().clone())
    }

    async fn list_tagged_containers(
        &self,
        _image: &str,
        _tag: &str,
    ) -> SchedulerResult<Vec<ServiceInformation>> {
        Ok(self.listed.lock().unwrap().clone())
    }

    async fn pull_image(&self, _image: &str) -> SchedulerResult<()> {
        Ok(())
    }

    async fn create_and_run(&self, spec: &ServiceSpec) -> SchedulerResult<ServiceInformation> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;

        if self.fail_creates.load(Ordering::SeqCst) > 0 {
            self.fail_creates.fetch_sub(1, Ordering::SeqCst);
            return Err(SchedulerError::Create {
                image: spec.image(),
                message: "scripted failure".to_string(),
            });
        }

        let default = *self.default_public.lock().unwrap();
        let public = self
            .next_publics
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(default);
        Ok(self.make_info(&format!("c{n}"), &spec.image_name, &spec.tag, public))
    }

    async fn container_inspect(&self, id: &str) -> SchedulerResult<ServiceInformation> {
        self.listed
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| SchedulerError::Inspect {
                id: id.to_string(),
                message: "not found".to_string(),
            })
    }

    async fn undeploy_container(
        &self,
        id: &str,
        _remove: bool,
        _stop_timeout: Duration,
    ) -> SchedulerResult<()> {
        self.undeployed.lock().unwrap().push(id.to_string());
        if self.fail_undeploys.load(Ordering::SeqCst) {
            return Err(SchedulerError::Stop {
                id: id.to_string(),
                message: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}

/// A monitor with a scripted outcome and a call counter.
pub struct MockMonitor {
    configured: bool,
    result: bool,
    fail_first: AtomicUsize,
    checks: AtomicUsize,
}

impl MockMonitor {
    pub fn passing() -> Self {
        Self {
            configured: true,
            result: true,
            fail_first: AtomicUsize::new(0),
            checks: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: false,
            ..Self::passing()
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::passing()
        }
    }

    /// Fail the first `n` checks, pass afterwards.
    pub fn flaky(n: usize) -> Self {
        Self {
            fail_first: AtomicUsize::new(n),
            ..Self::passing()
        }
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Monitor for MockMonitor {
    async fn check(&self, _instance_id: &str, _addr: &str) -> bool {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return false;
        }
        self.result
    }

    fn configured(&self) -> bool {
        self.configured
    }
}

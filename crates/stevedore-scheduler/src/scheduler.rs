//! The driver trait the deploy core consumes.

use std::time::Duration;

use async_trait::async_trait;
use stevedore_core::ServiceSpec;

use crate::error::SchedulerResult;
use crate::types::{ContainerFilter, ServiceInformation};

/// One cluster endpoint's container runtime.
///
/// Implementations must be safe for concurrent calls: during a deploy
/// every in-flight instance of a stack talks to the same scheduler.
///
/// Contract notes for implementors:
///
/// - [`create_and_run`] builds the runtime request from the spec: image
///   `name:tag`, the env vector, a port-binding map from `publish`, CPU
///   shares, the memory limit when non-zero, labels `image_name` /
///   `image_tag`, a `/var/log/service/` host mount, and a syslog log
///   driver tagging records `"{image_name}|<service_id-or-{{.Name}}>|{id}"`
///   with facility `local1`. It must pull before creating and start after
///   creating, treat "already running" on start as success, and "no such
///   container" on start as failure.
/// - [`undeploy_container`] must treat a missing container as success so
///   retried undeploys stay idempotent.
///
/// [`create_and_run`]: Scheduler::create_and_run
/// [`undeploy_container`]: Scheduler::undeploy_container
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Registered driver ID, e.g. `"swarm"`.
    fn id(&self) -> &str;

    /// Containers matching the filter's regexes and status whitelist.
    async fn list_containers(
        &self,
        filter: &ContainerFilter,
    ) -> SchedulerResult<Vec<ServiceInformation>>;

    /// Containers carrying the `image_name`/`image_tag` labels this
    /// orchestrator stamps on everything it creates.
    async fn list_tagged_containers(
        &self,
        image: &str,
        tag: &str,
    ) -> SchedulerResult<Vec<ServiceInformation>>;

    async fn pull_image(&self, image: &str) -> SchedulerResult<()>;

    /// Pull, create, and start one container for the spec.
    async fn create_and_run(&self, spec: &ServiceSpec) -> SchedulerResult<ServiceInformation>;

    async fn container_inspect(&self, id: &str) -> SchedulerResult<ServiceInformation>;

    /// Stop (with the given grace period) and optionally remove.
    async fn undeploy_container(
        &self,
        id: &str,
        remove: bool,
        stop_timeout: Duration,
    ) -> SchedulerResult<()>;
}

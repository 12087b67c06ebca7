//! Readiness waiters
//!
//! Polling loops that block until the cluster reaches a condition. The
//! staging and readiness waits observe the operation [`Deadline`] on every
//! iteration and while sleeping. The deletion wait has no bound of its own;
//! teardown bounds it by joining under the deadline.

use std::time::Duration;

use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use kube::Resource;
use kube::ResourceExt;
use kubedrop_core::{Deadline, RELEASE_LABEL, ReleaseId, is_owned_by_us, release_selector};
use tracing::{debug, info, warn};

use crate::error::{KubeError, Result};
use crate::reconcile::Reconciler;

/// Interval between pod listings while waiting for the staging container
pub const STAGING_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Interval between workload reads while waiting for readiness
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Interval between reads while waiting for a resource to disappear
pub const DELETION_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Poll intervals used by the waiters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollIntervals {
    pub staging: Duration,
    pub readiness: Duration,
    pub deletion: Duration,
}

impl Default for PollIntervals {
    fn default() -> Self {
        Self {
            staging: STAGING_POLL_INTERVAL,
            readiness: READY_POLL_INTERVAL,
            deletion: DELETION_POLL_INTERVAL,
        }
    }
}

/// The staging container of one release
#[derive(Debug, Clone)]
pub struct StagingTarget<'a> {
    pub namespace: &'a str,
    pub release: &'a ReleaseId,
    /// Name of the init container that blocks until files arrive
    pub container: &'a str,
}

/// Wait until a pod of `target.release` has its staging container running
///
/// An empty listing is not an error; polling continues until the deadline.
pub async fn wait_for_staging(
    pods: &Reconciler<Pod>,
    target: &StagingTarget<'_>,
    deadline: &Deadline,
    interval: Duration,
) -> Result<Pod> {
    const WAITING_FOR: &str = "staging container to be running";

    let selector = release_selector(target.release);
    info!(
        namespace = target.namespace,
        release = %target.release,
        container = target.container,
        "Waiting for staging container"
    );

    loop {
        if deadline.is_expired() {
            return Err(KubeError::timeout(WAITING_FOR));
        }

        let candidates = pods
            .list(target.namespace, &selector)
            .await
            .map_err(|e| timeout_as(e, WAITING_FOR))?;
        debug!(candidates = candidates.len(), "Listed release pods");

        if let Some(pod) = candidates
            .into_iter()
            .find(|pod| staging_running(pod, target))
        {
            info!(pod = %pod.name_any(), "Staging container is running");
            return Ok(pod);
        }

        deadline.sleep(interval).await;
    }
}

/// Whether `pod` belongs to the release and its staging container runs
fn staging_running(pod: &Pod, target: &StagingTarget<'_>) -> bool {
    let release_matches = pod
        .labels()
        .get(RELEASE_LABEL)
        .is_some_and(|value| value == target.release.as_str());
    if !release_matches {
        return false;
    }

    pod.status
        .as_ref()
        .and_then(|status| status.init_container_statuses.as_ref())
        .into_iter()
        .flatten()
        .filter(|status| status.name == target.container)
        .any(|status| {
            status
                .state
                .as_ref()
                .is_some_and(|state| state.running.is_some())
        })
}

/// Whether the workload carries `release` and all desired replicas are ready
///
/// Missing ready count reads as 0, missing desired count as 1.
pub fn workload_ready(workload: &Deployment, release: &ReleaseId) -> bool {
    let release_matches = workload
        .labels()
        .get(RELEASE_LABEL)
        .is_some_and(|value| value == release.as_str());

    let desired = workload
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1);
    let ready = workload
        .status
        .as_ref()
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0);

    release_matches && ready == desired
}

/// Wait until the named workload of `release` is fully available
pub async fn wait_for_workload_ready(
    workloads: &Reconciler<Deployment>,
    namespace: &str,
    name: &str,
    release: &ReleaseId,
    deadline: &Deadline,
    interval: Duration,
) -> Result<Deployment> {
    const WAITING_FOR: &str = "workload readiness";

    info!(%name, %namespace, %release, "Waiting for workload readiness");

    loop {
        if deadline.is_expired() {
            return Err(KubeError::timeout(WAITING_FOR));
        }

        match workloads.get(namespace, name).await {
            Ok(workload) if !is_owned_by_us(workload.meta().labels.as_ref()) => {
                return Err(KubeError::OwnershipConflict {
                    kind: workloads.kind(),
                    name: name.to_string(),
                    namespace: namespace.to_string(),
                });
            }
            Ok(workload) if workload_ready(&workload, release) => {
                info!(%name, "Workload is ready");
                return Ok(workload);
            }
            Ok(workload) => {
                let status = workload.status.as_ref();
                debug!(
                    %name,
                    ready = status.and_then(|s| s.ready_replicas).unwrap_or(0),
                    "Workload not ready yet"
                );
            }
            Err(e) if e.is_not_found() => debug!(%name, "Workload not visible yet"),
            Err(e) => return Err(timeout_as(e, WAITING_FOR)),
        }

        deadline.sleep(interval).await;
    }
}

/// Wait until the resource is gone
///
/// Takes owned arguments so it can run as a spawned task. Read failures other
/// than Not-Found are logged and polling continues.
pub async fn wait_for_deletion<K>(
    resources: Reconciler<K>,
    namespace: String,
    name: String,
    interval: Duration,
) -> Result<()>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    loop {
        match resources.get(&namespace, &name).await {
            Err(e) if e.is_not_found() => {
                info!(kind = %resources.kind(), %name, "{} is gone", resources.kind());
                return Ok(());
            }
            Err(e) if e.is_timeout() => {
                return Err(KubeError::timeout("resource deletion"));
            }
            Err(e) => warn!(kind = %resources.kind(), %name, error = %e, "Deletion check failed"),
            Ok(_) => debug!(kind = %resources.kind(), %name, "Still terminating"),
        }

        tokio::time::sleep(interval).await;
    }
}

/// Reword a reconciler timeout as a timeout of the enclosing wait
fn timeout_as(error: KubeError, waiting_for: &str) -> KubeError {
    if error.is_timeout() {
        KubeError::timeout(waiting_for)
    } else {
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockApi, ResourceApi};
    use k8s_openapi::api::apps::v1::{DeploymentSpec, DeploymentStatus};
    use k8s_openapi::api::core::v1::{
        ContainerState, ContainerStateRunning, ContainerStateWaiting, ContainerStatus, PodStatus,
    };
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use kubedrop_core::{owner_labels, release_labels};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use tokio::time::Instant;

    const STAGING: &str = "wait-to-copy-app";

    fn pod(name: &str, release: &ReleaseId, running: bool) -> Pod {
        let state = if running {
            ContainerState {
                running: Some(ContainerStateRunning::default()),
                ..Default::default()
            }
        } else {
            ContainerState {
                waiting: Some(ContainerStateWaiting::default()),
                ..Default::default()
            }
        };

        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("default".to_string()),
                labels: Some(release_labels(release)),
                ..Default::default()
            },
            status: Some(PodStatus {
                init_container_statuses: Some(vec![ContainerStatus {
                    name: STAGING.to_string(),
                    state: Some(state),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn workload(labels: BTreeMap<String, String>, desired: i32, ready: Option<i32>) -> Deployment {
        Deployment {
            metadata: ObjectMeta {
                name: Some("demo".to_string()),
                namespace: Some("default".to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                replicas: Some(desired),
                ..Default::default()
            }),
            status: Some(DeploymentStatus {
                ready_replicas: ready,
                ..Default::default()
            }),
        }
    }

    fn reconciler<K>(api: &MockApi<K>) -> Reconciler<K>
    where
        K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
    {
        Reconciler::new(Arc::new(api.clone()))
    }

    #[test]
    fn test_workload_ready_requires_matching_release() {
        let run_one = ReleaseId::from("aaaaaaaaaa");
        let run_two = ReleaseId::from("bbbbbbbbbb");
        let first_generation = workload(release_labels(&run_one), 2, Some(2));

        assert!(workload_ready(&first_generation, &run_one));
        assert!(!workload_ready(&first_generation, &run_two));
    }

    #[test]
    fn test_workload_ready_defaults() {
        let release = ReleaseId::from("aaaaaaaaaa");
        let mut w = workload(release_labels(&release), 1, None);
        assert!(!workload_ready(&w, &release));

        // Unset desired replicas means one
        w.spec = None;
        w.status = Some(DeploymentStatus {
            ready_replicas: Some(1),
            ..Default::default()
        });
        assert!(workload_ready(&w, &release));
    }

    #[tokio::test(start_paused = true)]
    async fn test_staging_wait_finds_running_pod() {
        let pods = MockApi::<Pod>::new();
        let release = ReleaseId::from("abcde12345");
        let other = ReleaseId::from("zzzzz00000");
        pods.insert(pod("old", &other, true));
        pods.insert(pod("pending", &release, false));

        let background = pods.clone();
        let late_release = release.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            background.insert(pod("ready", &late_release, true));
        });

        let target = StagingTarget {
            namespace: "default",
            release: &release,
            container: STAGING,
        };
        let deadline = Deadline::after(Duration::from_secs(60));
        let found = wait_for_staging(&reconciler(&pods), &target, &deadline, STAGING_POLL_INTERVAL)
            .await
            .unwrap();

        assert_eq!(found.name_any(), "ready");
    }

    #[tokio::test(start_paused = true)]
    async fn test_staging_wait_times_out_on_empty_listing() {
        let pods = MockApi::<Pod>::new();
        let release = ReleaseId::from("abcde12345");
        let target = StagingTarget {
            namespace: "default",
            release: &release,
            container: STAGING,
        };
        let deadline = Deadline::after(Duration::from_secs(12));

        let err = wait_for_staging(&reconciler(&pods), &target, &deadline, STAGING_POLL_INTERVAL)
            .await
            .unwrap_err();

        insta::assert_snapshot!(err.to_string(), @"timeout while waiting for staging container to be running");
        assert!(pods.operation_counts().lists >= 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_wait_is_bounded_by_deadline() {
        let workloads = MockApi::<Deployment>::new();
        let release = ReleaseId::from("abcde12345");
        workloads.insert(workload(release_labels(&release), 2, Some(1)));

        let start = Instant::now();
        let deadline = Deadline::after(Duration::from_secs(10));
        let err = wait_for_workload_ready(
            &reconciler(&workloads),
            "default",
            "demo",
            &release,
            &deadline,
            READY_POLL_INTERVAL,
        )
        .await
        .unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() <= Duration::from_secs(10) + READY_POLL_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_wait_ignores_previous_release() {
        let workloads = MockApi::<Deployment>::new();
        let previous = ReleaseId::from("aaaaaaaaaa");
        let current = ReleaseId::from("bbbbbbbbbb");
        workloads.insert(workload(release_labels(&previous), 1, Some(1)));

        let deadline = Deadline::after(Duration::from_secs(10));
        let err = wait_for_workload_ready(
            &reconciler(&workloads),
            "default",
            "demo",
            &current,
            &deadline,
            READY_POLL_INTERVAL,
        )
        .await
        .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_wait_keeps_polling_when_absent() {
        let workloads = MockApi::<Deployment>::new();
        let release = ReleaseId::from("abcde12345");

        let background = workloads.clone();
        let labels = release_labels(&release);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            background.insert(workload(labels, 1, Some(1)));
        });

        let deadline = Deadline::after(Duration::from_secs(30));
        let ready = wait_for_workload_ready(
            &reconciler(&workloads),
            "default",
            "demo",
            &release,
            &deadline,
            READY_POLL_INTERVAL,
        )
        .await
        .unwrap();
        assert_eq!(ready.name_any(), "demo");
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_wait_rejects_foreign_workload() {
        let workloads = MockApi::<Deployment>::new();
        let release = ReleaseId::from("abcde12345");
        let mut labels = release_labels(&release);
        labels.remove(kubedrop_core::OWNER_LABEL);
        workloads.insert(workload(labels, 1, Some(1)));

        let deadline = Deadline::after(Duration::from_secs(30));
        let err = wait_for_workload_ready(
            &reconciler(&workloads),
            "default",
            "demo",
            &release,
            &deadline,
            READY_POLL_INTERVAL,
        )
        .await
        .unwrap_err();
        assert!(err.is_ownership_conflict());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletion_wait_until_gone() {
        let workloads = MockApi::<Deployment>::new();
        workloads.insert(workload(owner_labels(), 1, None));
        workloads.set_deletion_delay(3);
        workloads.delete("default", "demo").await.unwrap();

        wait_for_deletion(
            reconciler(&workloads),
            "default".to_string(),
            "demo".to_string(),
            DELETION_POLL_INTERVAL,
        )
        .await
        .unwrap();

        assert_eq!(workloads.operation_counts().gets, 4);
        assert!(workloads.is_empty());
    }
}

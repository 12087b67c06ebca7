//! Teardown orchestrator
//!
//! Deletes the workload, storage claim, service and ingress of one name, then
//! waits for every deleted resource to disappear. The waits run concurrently,
//! one task per kind, and are joined under the operation deadline.

use std::sync::Arc;

use kube::Resource;
use kubedrop_core::{Deadline, DestroyOptions};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::api::{Cluster, ResourceApi};
use crate::error::{KubeError, Result};
use crate::reconcile::{Reconciler, ResourceRef};
use crate::wait::{PollIntervals, wait_for_deletion};

/// Outcome of a successful teardown
#[derive(Debug, Clone, Default, Serialize)]
pub struct TeardownReport {
    /// Resources that were deleted and have disappeared
    pub deleted: Vec<ResourceRef>,
    /// Resources that did not exist
    pub absent: Vec<ResourceRef>,
}

/// Runs one teardown pass against a cluster
pub struct Teardown {
    cluster: Cluster,
    intervals: PollIntervals,
}

impl Teardown {
    pub fn new(cluster: Cluster) -> Self {
        Self {
            cluster,
            intervals: PollIntervals::default(),
        }
    }

    pub fn with_intervals(mut self, intervals: PollIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    /// Delete everything deployed under `options.name`
    ///
    /// Absent resources are skipped. An ownership conflict or API failure
    /// aborts before any later kind is attempted. Returns a timeout if the
    /// deletions have not all been observed when the deadline passes; they
    /// may still complete on the server afterwards.
    pub async fn run(&self, options: &DestroyOptions) -> Result<TeardownReport> {
        options.validate()?;

        let deadline = Deadline::after(options.timeout);
        let namespace = options.namespace.as_str();
        let claim_name = options.claim_name();
        info!(name = %options.name, %namespace, "Starting teardown");

        let mut report = TeardownReport::default();
        let mut pending = JoinSet::new();

        self.remove(
            &self.cluster.workloads,
            namespace,
            &options.name,
            deadline,
            &mut report,
            &mut pending,
        )
        .await?;
        self.remove(
            &self.cluster.claims,
            namespace,
            &claim_name,
            deadline,
            &mut report,
            &mut pending,
        )
        .await?;
        self.remove(
            &self.cluster.services,
            namespace,
            &options.name,
            deadline,
            &mut report,
            &mut pending,
        )
        .await?;
        self.remove(
            &self.cluster.ingresses,
            namespace,
            &options.name,
            deadline,
            &mut report,
            &mut pending,
        )
        .await?;

        let joined = tokio::time::timeout_at(deadline.instant(), async {
            while let Some(joined) = pending.join_next().await {
                let gone = joined.map_err(|e| KubeError::Task(e.to_string()))??;
                report.deleted.push(gone);
            }
            Ok::<_, KubeError>(())
        })
        .await;

        match joined {
            Ok(result) => result?,
            Err(_) => {
                warn!(name = %options.name, "Deletions still in progress at deadline");
                // Dropping the set aborts the remaining polls
                return Err(KubeError::timeout("resource deletion"));
            }
        }

        info!(name = %options.name, %namespace, "Teardown complete");
        Ok(report)
    }

    /// Delete one resource and queue the wait for its disappearance
    async fn remove<K>(
        &self,
        api: &Arc<dyn ResourceApi<K>>,
        namespace: &str,
        name: &str,
        deadline: Deadline,
        report: &mut TeardownReport,
        pending: &mut JoinSet<Result<ResourceRef>>,
    ) -> Result<()>
    where
        K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
    {
        let reconciler = Reconciler::new(Arc::clone(api)).with_deadline(deadline);
        let reference = ResourceRef::new(reconciler.kind(), name, namespace);

        match reconciler.delete(namespace, name).await {
            Ok(()) => {
                let (namespace, name) = (namespace.to_string(), name.to_string());
                let interval = self.intervals.deletion;
                pending.spawn(async move {
                    wait_for_deletion(reconciler, namespace, name, interval).await?;
                    Ok(reference)
                });
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                info!(resource = %reference, "Not found, skipping");
                report.absent.push(reference);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

//! Provisioning orchestrator
//!
//! Applies storage, workload, files, service and ingress in a fixed order
//! under one deadline. A failing step aborts the run and leaves earlier
//! resources in place for inspection or a later teardown.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use kube::ResourceExt;
use kubedrop_core::{Deadline, DeployOptions, ReleaseId};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::Cluster;
use crate::error::{KubeError, Result};
use crate::manifest::{Plan, StagingContainer};
use crate::reconcile::{AppliedResource, Reconciler};
use crate::transfer::{CopyRequest, FileTransfer};
use crate::wait::{PollIntervals, StagingTarget, wait_for_staging, wait_for_workload_ready};

/// Steps of a provisioning run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    StorageClaim,
    Workload,
    StagingContainer,
    FileTransfer,
    Service,
    Ingress,
    Readiness,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisionStep::StorageClaim => "storage claim",
            ProvisionStep::Workload => "workload",
            ProvisionStep::StagingContainer => "staging container",
            ProvisionStep::FileTransfer => "file transfer",
            ProvisionStep::Service => "service",
            ProvisionStep::Ingress => "ingress",
            ProvisionStep::Readiness => "readiness",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of a successful provisioning run
#[derive(Debug, Clone, Serialize)]
pub struct ProvisionReport {
    pub name: String,
    pub namespace: String,
    pub release: ReleaseId,
    /// Pod the local files were copied into
    pub pod: String,
    pub resources: Vec<AppliedResource>,
}

/// Runs one provisioning pass against a cluster
pub struct Provisioner {
    cluster: Cluster,
    transfer: Arc<dyn FileTransfer>,
    intervals: PollIntervals,
    staging: StagingContainer,
}

impl Provisioner {
    pub fn new(cluster: Cluster, transfer: Arc<dyn FileTransfer>) -> Self {
        Self {
            cluster,
            transfer,
            intervals: PollIntervals::default(),
            staging: StagingContainer::default(),
        }
    }

    pub fn with_intervals(mut self, intervals: PollIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn with_staging(mut self, staging: StagingContainer) -> Self {
        self.staging = staging;
        self
    }

    /// Provision everything `options` asks for
    pub async fn run(&self, options: &DeployOptions) -> Result<ProvisionReport> {
        options.validate()?;

        let deadline = Deadline::after(options.timeout);
        let namespace = options.namespace.as_str();
        info!(name = %options.name, %namespace, "Starting deployment");

        let claims = Reconciler::new(Arc::clone(&self.cluster.claims)).with_deadline(deadline);
        let workloads =
            Reconciler::new(Arc::clone(&self.cluster.workloads)).with_deadline(deadline);
        let pods = Reconciler::new(Arc::clone(&self.cluster.pods)).with_deadline(deadline);

        let mut resources = Vec::new();

        let claim = crate::manifest::storage_claim(options);
        resources.push(step(ProvisionStep::StorageClaim, claims.ensure(claim)).await?);

        let release = ReleaseId::generate();
        let plan = Plan::new(options, &self.staging, release.clone());
        debug!(%release, "Generated release identifier");

        resources.push(
            step(
                ProvisionStep::Workload,
                workloads.create_or_update(plan.workload),
            )
            .await?,
        );

        let target = StagingTarget {
            namespace,
            release: &release,
            container: &self.staging.name,
        };
        let pod = step(
            ProvisionStep::StagingContainer,
            wait_for_staging(&pods, &target, &deadline, self.intervals.staging),
        )
        .await?;

        let request = CopyRequest {
            local_path: options.copy_from.clone(),
            pod: pod.name_any(),
            container_path: options.mount_path.clone(),
            container: self.staging.name.clone(),
            namespace: namespace.to_string(),
        };
        step(ProvisionStep::FileTransfer, async {
            tokio::time::timeout_at(deadline.instant(), self.transfer.copy(&request))
                .await
                .map_err(|_| KubeError::timeout("file transfer"))?
        })
        .await?;

        if let Some(service) = plan.exposure {
            let services =
                Reconciler::new(Arc::clone(&self.cluster.services)).with_deadline(deadline);
            resources.push(step(ProvisionStep::Service, services.create_or_update(service)).await?);
        }

        if let Some(ingress) = plan.route {
            let ingresses =
                Reconciler::new(Arc::clone(&self.cluster.ingresses)).with_deadline(deadline);
            resources
                .push(step(ProvisionStep::Ingress, ingresses.create_or_update(ingress)).await?);
        }

        step(
            ProvisionStep::Readiness,
            wait_for_workload_ready(
                &workloads,
                namespace,
                &options.name,
                &release,
                &deadline,
                self.intervals.readiness,
            ),
        )
        .await?;

        info!(name = %options.name, %namespace, %release, "Deployment complete");
        Ok(ProvisionReport {
            name: options.name.clone(),
            namespace: namespace.to_string(),
            release,
            pod: request.pod,
            resources,
        })
    }
}

async fn step<T>(step: ProvisionStep, action: impl Future<Output = Result<T>>) -> Result<T> {
    debug!(%step, "Running step");
    action
        .await
        .inspect_err(|e| warn!(%step, error = %e, "Step failed, aborting"))
}

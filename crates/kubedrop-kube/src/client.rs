//! High-level client for kubedrop operations
//!
//! Bundles the cluster seam, the file transfer and the poll intervals so the
//! CLI can deploy and destroy with a single handle.

use std::path::PathBuf;
use std::sync::Arc;

use kube::config::{KubeConfigOptions, Kubeconfig};
use kubedrop_core::{DeployOptions, DestroyOptions};
use tracing::debug;

use crate::api::Cluster;
use crate::error::{KubeError, Result};
use crate::manifest::StagingContainer;
use crate::provision::{ProvisionReport, Provisioner};
use crate::teardown::{Teardown, TeardownReport};
use crate::transfer::{FileTransfer, KubectlCopy};
use crate::wait::PollIntervals;

/// Where to find the cluster
#[derive(Debug, Clone, Default)]
pub struct ClusterConfig {
    /// Explicit kubeconfig file; `KUBECONFIG` and in-cluster config otherwise
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use instead of the current one
    pub context: Option<String>,
}

/// High-level Kubernetes client for kubedrop
pub struct KubeClient {
    cluster: Cluster,
    transfer: Arc<dyn FileTransfer>,
    intervals: PollIntervals,
    staging: StagingContainer,
}

impl KubeClient {
    /// Connect to the cluster described by `config`
    pub async fn connect(config: &ClusterConfig) -> Result<Self> {
        let client = build_client(config).await?;
        let transfer = KubectlCopy::new()
            .with_kubeconfig(config.kubeconfig.clone())
            .with_context(config.context.clone());

        Ok(Self::with_cluster(
            Cluster::from_client(client),
            Arc::new(transfer),
        ))
    }

    /// Create with an existing cluster seam and transfer
    pub fn with_cluster(cluster: Cluster, transfer: Arc<dyn FileTransfer>) -> Self {
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

    /// Get the cluster seam
    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    // ========== Deploy ==========

    /// Provision the storage, workload, files, service and ingress
    pub async fn deploy(&self, options: &DeployOptions) -> Result<ProvisionReport> {
        Provisioner::new(self.cluster.clone(), Arc::clone(&self.transfer))
            .with_intervals(self.intervals)
            .with_staging(self.staging.clone())
            .run(options)
            .await
    }

    // ========== Destroy ==========

    /// Delete everything deployed under a name and wait for it to go away
    pub async fn destroy(&self, options: &DestroyOptions) -> Result<TeardownReport> {
        Teardown::new(self.cluster.clone())
            .with_intervals(self.intervals)
            .run(options)
            .await
    }
}

async fn build_client(config: &ClusterConfig) -> Result<kube::Client> {
    let options = KubeConfigOptions {
        context: config.context.clone(),
        ..Default::default()
    };

    let kube_config = match &config.kubeconfig {
        Some(path) => {
            debug!(path = %path.display(), "Loading kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path).map_err(|e| {
                KubeError::Config(format!("cannot read {}: {}", path.display(), e))
            })?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &options)
                .await
                .map_err(|e| KubeError::Config(e.to_string()))?
        }
        None if config.context.is_some() => kube::Config::from_kubeconfig(&options)
            .await
            .map_err(|e| KubeError::Config(e.to_string()))?,
        None => kube::Config::infer()
            .await
            .map_err(|e| KubeError::Config(e.to_string()))?,
    };

    kube::Client::try_from(kube_config).map_err(|e| KubeError::Config(e.to_string()))
}

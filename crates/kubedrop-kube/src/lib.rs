//! kubedrop Kube - Kubernetes integration for kubedrop
//!
//! This crate provides:
//! - **Cluster seam**: `ResourceApi` per kind, backed by `kube::Api` or an in-memory mock
//! - **Reconciler**: create-or-update, ensure and delete with ownership checks
//! - **Waiters**: staging container, workload readiness and deletion polling under one deadline
//! - **Manifests**: typed desired state for the workload, service, ingress and storage claim
//! - **File transfer**: `kubectl cp` into the staging container
//! - **Provisioning & Teardown**: the deploy and destroy orchestrators

pub mod api;
pub mod client;
pub mod error;
pub mod manifest;
pub mod provision;
pub mod reconcile;
pub mod teardown;
pub mod transfer;
pub mod wait;

pub use api::{Cluster, KubeApi, MockApi, MockCluster, Operation, OperationCounts, ResourceApi};
pub use client::{ClusterConfig, KubeClient};
pub use error::{KubeError, Result};
pub use manifest::{Plan, StagingContainer};
pub use provision::{ProvisionReport, ProvisionStep, Provisioner};
pub use reconcile::{Applied, AppliedResource, Reconciler, ResourceRef};
pub use teardown::{Teardown, TeardownReport};
pub use transfer::{CopyRequest, FileTransfer, KubectlCopy, RecordingTransfer};
pub use wait::{
    PollIntervals, StagingTarget, wait_for_deletion, wait_for_staging, wait_for_workload_ready,
    workload_ready,
};

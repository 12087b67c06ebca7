//! Cluster API seam
//!
//! The reconcilers only need five namespaced primitives per resource kind.
//! [`ResourceApi`] captures exactly those, returning raw [`kube::Error`]s so
//! that Not-Found translation and ownership checks live in one place
//! ([`crate::reconcile::Reconciler`]).
//!
//! Two implementations are provided:
//! - [`KubeApi`]: backed by `kube::Api<K>` against a real cluster
//! - [`MockApi`]: in-memory store for tests, no cluster required

mod live;
mod mock;

pub use live::KubeApi;
pub use mock::{MockApi, MockCluster, Operation, OperationCounts};

use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, Service};
use k8s_openapi::api::networking::v1::Ingress;

/// Namespaced get/create/update/delete/list for one resource kind
///
/// Implementations must be Send + Sync for use across async tasks.
#[async_trait]
pub trait ResourceApi<K>: Send + Sync {
    /// Read a resource by name
    async fn get(&self, namespace: &str, name: &str) -> Result<K, kube::Error>;

    /// Create a new resource
    async fn create(&self, namespace: &str, object: &K) -> Result<K, kube::Error>;

    /// Replace an existing resource (requires the current resourceVersion)
    async fn update(&self, namespace: &str, object: &K) -> Result<K, kube::Error>;

    /// Mark a resource for asynchronous deletion
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), kube::Error>;

    /// List resources matching a label selector
    async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>, kube::Error>;
}

/// One [`ResourceApi`] per kind kubedrop touches
#[derive(Clone)]
pub struct Cluster {
    pub workloads: Arc<dyn ResourceApi<Deployment>>,
    pub services: Arc<dyn ResourceApi<Service>>,
    pub ingresses: Arc<dyn ResourceApi<Ingress>>,
    pub claims: Arc<dyn ResourceApi<PersistentVolumeClaim>>,
    pub pods: Arc<dyn ResourceApi<Pod>>,
}

impl Cluster {
    /// Build a cluster backed by a live Kubernetes client
    pub fn from_client(client: kube::Client) -> Self {
        Self {
            workloads: Arc::new(KubeApi::new(client.clone())),
            services: Arc::new(KubeApi::new(client.clone())),
            ingresses: Arc::new(KubeApi::new(client.clone())),
            claims: Arc::new(KubeApi::new(client.clone())),
            pods: Arc::new(KubeApi::new(client)),
        }
    }
}

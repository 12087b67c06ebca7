//! Ownership-checked reconciliation
//!
//! [`Reconciler`] is the only place that mutates cluster objects. Every
//! mutating call reads the current object first and refuses to touch anything
//! that does not carry the kubedrop owner marker.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use kube::{Resource, ResourceExt};
use kubedrop_core::{Deadline, is_owned_by_us};
use serde::Serialize;
use tracing::{debug, info};

use crate::api::ResourceApi;
use crate::error::{KubeError, Result, is_api_not_found};

/// Outcome of a create-or-update or ensure call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Applied {
    Created,
    Updated,
    Unchanged,
}

impl fmt::Display for Applied {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Applied::Created => write!(f, "created"),
            Applied::Updated => write!(f, "updated"),
            Applied::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Reference to a Kubernetes resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResourceRef {
    pub kind: String,
    pub name: String,
    pub namespace: String,
}

impl ResourceRef {
    pub fn new(
        kind: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            namespace: namespace.into(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.name)
    }
}

/// A resource together with what was done to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedResource {
    #[serde(flatten)]
    pub resource: ResourceRef,
    pub action: Applied,
}

/// Ownership-checked operations on one resource kind
pub struct Reconciler<K> {
    api: Arc<dyn ResourceApi<K>>,
    deadline: Option<Deadline>,
}

impl<K> Clone for Reconciler<K> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            deadline: self.deadline,
        }
    }
}

impl<K> Reconciler<K>
where
    K: Resource<DynamicType = ()> + Clone + Send + Sync + 'static,
{
    pub fn new(api: Arc<dyn ResourceApi<K>>) -> Self {
        Self {
            api,
            deadline: None,
        }
    }

    /// Bound every cluster call by `deadline`
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Kind name, e.g. `Deployment`
    pub fn kind(&self) -> String {
        K::kind(&()).to_string()
    }

    fn reference(&self, namespace: &str, name: &str) -> ResourceRef {
        ResourceRef::new(self.kind(), name, namespace)
    }

    /// Run one cluster call, abandoning it if the deadline passes first
    async fn call<T>(
        &self,
        operation: &str,
        name: &str,
        request: impl Future<Output = std::result::Result<T, kube::Error>>,
    ) -> Result<std::result::Result<T, kube::Error>> {
        let Some(deadline) = self.deadline else {
            return Ok(request.await);
        };

        let timed_out = || {
            KubeError::timeout(format!(
                "the API server to {} {} '{}'",
                operation,
                self.kind(),
                name
            ))
        };
        if deadline.is_expired() {
            return Err(timed_out());
        }
        tokio::time::timeout_at(deadline.instant(), request)
            .await
            .map_err(|_| timed_out())
    }

    fn api_error(
        &self,
        operation: &'static str,
        namespace: &str,
        name: &str,
        source: kube::Error,
    ) -> KubeError {
        KubeError::Api {
            operation,
            kind: self.kind(),
            name: name.to_string(),
            namespace: namespace.to_string(),
            source,
        }
    }

    fn not_found(&self, namespace: &str, name: &str) -> KubeError {
        KubeError::NotFound {
            kind: self.kind(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    fn conflict(&self, namespace: &str, name: &str) -> KubeError {
        KubeError::OwnershipConflict {
            kind: self.kind(),
            name: name.to_string(),
            namespace: namespace.to_string(),
        }
    }

    /// Read a resource, translating 404 into [`KubeError::NotFound`]
    pub async fn get(&self, namespace: &str, name: &str) -> Result<K> {
        match self.call("get", name, self.api.get(namespace, name)).await? {
            Ok(object) => Ok(object),
            Err(e) if is_api_not_found(&e) => Err(self.not_found(namespace, name)),
            Err(e) => Err(self.api_error("get", namespace, name, e)),
        }
    }

    /// List resources in `namespace` matching `label_selector`
    pub async fn list(&self, namespace: &str, label_selector: &str) -> Result<Vec<K>> {
        self.call("list", "*", self.api.list(namespace, label_selector))
            .await?
            .map_err(|e| self.api_error("list", namespace, "*", e))
    }

    /// Create the resource, or update it if it already exists and is ours
    pub async fn create_or_update(&self, desired: K) -> Result<AppliedResource> {
        let (namespace, name) = target(&desired)?;

        match self.get(&namespace, &name).await {
            Err(e) if e.is_not_found() => {
                self.create(&namespace, &name, &desired).await?;
                Ok(self.applied(&namespace, &name, Applied::Created))
            }
            Err(e) => Err(e),
            Ok(existing) if !is_owned_by_us(existing.meta().labels.as_ref()) => {
                Err(self.conflict(&namespace, &name))
            }
            Ok(existing) => {
                let mut desired = desired;
                desired.meta_mut().resource_version = existing.meta().resource_version.clone();

                self.call("update", &name, self.api.update(&namespace, &desired))
                    .await?
                    .map_err(|e| self.api_error("update", &namespace, &name, e))?;

                info!(kind = %self.kind(), %name, %namespace, "{} updated", self.kind());
                Ok(self.applied(&namespace, &name, Applied::Updated))
            }
        }
    }

    /// Create the resource if absent; leave an existing owned one untouched
    pub async fn ensure(&self, desired: K) -> Result<AppliedResource> {
        let (namespace, name) = target(&desired)?;

        match self.get(&namespace, &name).await {
            Err(e) if e.is_not_found() => {
                self.create(&namespace, &name, &desired).await?;
                Ok(self.applied(&namespace, &name, Applied::Created))
            }
            Err(e) => Err(e),
            Ok(existing) if !is_owned_by_us(existing.meta().labels.as_ref()) => {
                Err(self.conflict(&namespace, &name))
            }
            Ok(_) => {
                debug!(kind = %self.kind(), %name, %namespace, "already present");
                Ok(self.applied(&namespace, &name, Applied::Unchanged))
            }
        }
    }

    /// Mark an owned resource for deletion
    ///
    /// Returns as soon as the API server accepts the request; the object may
    /// still be visible for a while afterwards.
    pub async fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let existing = self.get(namespace, name).await?;
        if !is_owned_by_us(existing.meta().labels.as_ref()) {
            return Err(self.conflict(namespace, name));
        }

        match self.call("delete", name, self.api.delete(namespace, name)).await? {
            Ok(()) => {
                info!(kind = %self.kind(), %name, %namespace, "{} deleted", self.kind());
                Ok(())
            }
            // Vanished between the read and the delete
            Err(e) if is_api_not_found(&e) => Err(self.not_found(namespace, name)),
            Err(e) => Err(self.api_error("delete", namespace, name, e)),
        }
    }

    async fn create(&self, namespace: &str, name: &str, desired: &K) -> Result<()> {
        self.call("create", name, self.api.create(namespace, desired))
            .await?
            .map_err(|e| self.api_error("create", namespace, name, e))?;
        info!(kind = %self.kind(), %name, %namespace, "{} created", self.kind());
        Ok(())
    }

    fn applied(&self, namespace: &str, name: &str, action: Applied) -> AppliedResource {
        AppliedResource {
            resource: self.reference(namespace, name),
            action,
        }
    }
}

fn target<K: Resource<DynamicType = ()>>(object: &K) -> Result<(String, String)> {
    let meta = object.meta();
    let name = meta
        .name
        .clone()
        .ok_or_else(|| KubeError::InvalidManifest(format!("{} has no name", K::kind(&()))))?;
    let namespace = meta.namespace.clone().ok_or_else(|| {
        KubeError::InvalidManifest(format!("{} '{}' has no namespace", K::kind(&()), name))
    })?;
    Ok((namespace, name))
}

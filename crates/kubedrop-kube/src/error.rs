//! Error types for kubedrop-kube

use kubedrop_core::CoreError;
use thiserror::Error;

/// Result type for kubedrop-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur during cluster operations
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Target resource is absent
    #[error("{kind} '{name}' not found in namespace '{namespace}'")]
    NotFound {
        kind: String,
        name: String,
        namespace: String,
    },

    /// Resource exists but carries no kubedrop owner marker
    #[error(
        "{kind} '{name}' already exists in namespace '{namespace}' but was not created by kubedrop"
    )]
    OwnershipConflict {
        kind: String,
        name: String,
        namespace: String,
    },

    /// Any other Kubernetes API failure
    #[error("failed to {operation} {kind} '{name}' in namespace '{namespace}': {source}")]
    Api {
        operation: &'static str,
        kind: String,
        name: String,
        namespace: String,
        #[source]
        source: kube::Error,
    },

    /// The operation deadline elapsed
    #[error("timeout while waiting for {waiting_for}")]
    Timeout { waiting_for: String },

    /// Copying local files into the staging container failed
    #[error("file transfer failed: {0}")]
    Transfer(String),

    /// Kubeconfig could not be loaded or the client could not be built
    #[error("invalid cluster configuration: {0}")]
    Config(String),

    /// Desired object is missing required metadata
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A background polling task panicked or was cancelled
    #[error("background task failed: {0}")]
    Task(String),

    /// Invalid caller input
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, KubeError::NotFound { .. })
    }

    pub fn is_ownership_conflict(&self) -> bool {
        matches!(self, KubeError::OwnershipConflict { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, KubeError::Timeout { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, KubeError::Core(CoreError::Validation { .. }))
    }

    pub(crate) fn timeout(waiting_for: impl Into<String>) -> Self {
        KubeError::Timeout {
            waiting_for: waiting_for.into(),
        }
    }
}

/// Check if a raw API error is a 404 Not Found
pub(crate) fn is_api_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(resp) if resp.code == 404)
}

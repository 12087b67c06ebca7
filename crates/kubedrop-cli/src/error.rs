//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use kubedrop_core::CoreError;
use kubedrop_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Options rejected before touching the cluster
    #[error("{message}")]
    #[diagnostic(code(kubedrop::cli::validation))]
    Validation {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// A same-named resource was not created by kubedrop
    #[error("{message}")]
    #[diagnostic(
        code(kubedrop::cli::ownership),
        help("kubedrop never modifies resources it did not create; pick another name or remove the existing resource")
    )]
    OwnershipConflict { message: String },

    /// The operation deadline elapsed
    #[error("{message}")]
    #[diagnostic(
        code(kubedrop::cli::timeout),
        help("resources created so far are left in place; retry with a longer --timeout or run `kubedrop destroy`")
    )]
    Timeout { message: String },

    /// Kubeconfig, connection or API failure
    #[error("Cluster error: {message}")]
    #[diagnostic(code(kubedrop::cli::cluster))]
    Cluster {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Copying files into the staging container failed
    #[error("{message}")]
    #[diagnostic(
        code(kubedrop::cli::transfer),
        help("make sure kubectl is installed and can reach the cluster")
    )]
    Transfer { message: String },

    /// IO error (terminal, output)
    #[error("IO error: {message}")]
    #[diagnostic(code(kubedrop::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(kubedrop::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Validation { .. } => exit_codes::VALIDATION_ERROR,
            CliError::OwnershipConflict { .. } => exit_codes::OWNERSHIP_CONFLICT,
            CliError::Timeout { .. } => exit_codes::TIMEOUT,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Transfer { .. } => exit_codes::TRANSFER_ERROR,
            CliError::Io { .. } => exit_codes::ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        let message = err.to_string();
        match err {
            KubeError::Core(_) => CliError::Validation {
                message,
                help: Some("see `kubedrop <command> --help` for the accepted values".to_string()),
            },
            KubeError::OwnershipConflict { .. } => CliError::OwnershipConflict { message },
            KubeError::Timeout { .. } => CliError::Timeout { message },
            KubeError::Transfer(_) => CliError::Transfer { message },
            KubeError::Config(_) => CliError::Cluster {
                message,
                help: Some("check --kubeconfig, --context or the KUBECONFIG variable".to_string()),
            },
            KubeError::Task(_) | KubeError::Serialization(_) | KubeError::InvalidManifest(_) => {
                CliError::Internal { message }
            }
            _ => CliError::Cluster {
                message,
                help: None,
            },
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        KubeError::from(err).into()
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::internal(format!("cannot render JSON output: {}", err))
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let validation = CliError::from(CoreError::validation(
            "replicas",
            "replicas must be greater than 0",
        ));
        assert_eq!(validation.exit_code(), exit_codes::VALIDATION_ERROR);

        let conflict = CliError::from(KubeError::OwnershipConflict {
            kind: "Deployment".to_string(),
            name: "demo".to_string(),
            namespace: "default".to_string(),
        });
        assert_eq!(conflict.exit_code(), exit_codes::OWNERSHIP_CONFLICT);

        let not_found = CliError::from(KubeError::NotFound {
            kind: "Service".to_string(),
            name: "demo".to_string(),
            namespace: "default".to_string(),
        });
        assert_eq!(not_found.exit_code(), exit_codes::CLUSTER_ERROR);

        let transfer = CliError::from(KubeError::Transfer("boom".to_string()));
        assert_eq!(transfer.exit_code(), exit_codes::TRANSFER_ERROR);
    }

    #[test]
    fn test_messages_stay_single_line() {
        let err = CliError::from(KubeError::Timeout {
            waiting_for: "resource deletion".to_string(),
        });
        insta::assert_snapshot!(err.to_string(), @"timeout while waiting for resource deletion");
        assert_eq!(err.exit_code(), exit_codes::TIMEOUT);
    }
}

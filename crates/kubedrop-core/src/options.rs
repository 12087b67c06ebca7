//! Options for deploy and destroy operations
//!
//! Both option sets are validated once, before any cluster call, so that a
//! malformed invocation has no side effects.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::error::{CoreError, Result};

/// Namespace used when none is given
pub const DEFAULT_NAMESPACE: &str = "default";

/// Timeout used when none is given
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Shortest timeout accepted for a whole operation
pub const MIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest timeout accepted for a whole operation
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Mount path the local files are copied into
pub const DEFAULT_MOUNT_PATH: &str = "/app";

/// Suffix of the storage claim derived from the release name
const CLAIM_SUFFIX: &str = "-pvc";

/// Maximum length of a DNS-1035 label
const MAX_NAME_LEN: usize = 63;

static DNS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").expect("valid regex"));

/// Name of the storage claim belonging to `name`
#[must_use]
pub fn storage_claim_name(name: &str) -> String {
    format!("{}{}", name, CLAIM_SUFFIX)
}

/// Network exposure settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExposureOptions {
    /// Port the service listens on
    pub port: i32,
}

/// External route settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteOptions {
    /// Hostname routed to the service
    pub host: String,

    /// Ingress class handling the route
    pub class: String,
}

/// Options for the deploy operation
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Name shared by the workload, service and route
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Container image
    pub image: String,

    /// Arguments passed to the main container
    pub entrypoint: Vec<String>,

    /// Local file or directory copied into the staging mount
    pub copy_from: PathBuf,

    /// Mount path of the shared volume
    pub mount_path: String,

    /// Desired replica count
    pub replicas: i32,

    /// Port the application listens on
    pub container_port: Option<i32>,

    /// Bound for the whole operation
    pub timeout: Duration,

    /// Create a service when set
    pub exposure: Option<ExposureOptions>,

    /// Create an ingress when set
    pub route: Option<RouteOptions>,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            image: String::new(),
            entrypoint: Vec::new(),
            copy_from: PathBuf::new(),
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
            replicas: 1,
            container_port: None,
            timeout: DEFAULT_TIMEOUT,
            exposure: None,
            route: None,
        }
    }
}

impl DeployOptions {
    /// Create deploy options with the required fields
    pub fn new(
        name: impl Into<String>,
        image: impl Into<String>,
        copy_from: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            image: image.into(),
            copy_from: copy_from.into(),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Split a command line on whitespace into container arguments
    pub fn with_entrypoint(mut self, entrypoint: &str) -> Self {
        self.entrypoint = entrypoint.split_whitespace().map(String::from).collect();
        self
    }

    pub fn with_replicas(mut self, replicas: i32) -> Self {
        self.replicas = replicas;
        self
    }

    pub fn with_container_port(mut self, port: i32) -> Self {
        self.container_port = Some(port);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Expose the workload through a service on `port`
    pub fn with_service(mut self, port: i32) -> Self {
        self.exposure = Some(ExposureOptions { port });
        self
    }

    /// Route `host` to the service through an ingress of `class`
    pub fn with_ingress(mut self, host: impl Into<String>, class: impl Into<String>) -> Self {
        self.route = Some(RouteOptions {
            host: host.into(),
            class: class.into(),
        });
        self
    }

    /// Name of the storage claim for this deployment
    pub fn claim_name(&self) -> String {
        storage_claim_name(&self.name)
    }

    /// Replica count with non-positive values replaced by one
    pub fn effective_replicas(&self) -> i32 {
        if self.replicas > 0 { self.replicas } else { 1 }
    }

    /// Check the options before touching the cluster
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_namespace(&self.namespace)?;

        if self.image.trim().is_empty() {
            return Err(CoreError::validation("image", "image is required"));
        }
        if self.entrypoint.is_empty() {
            return Err(CoreError::validation("entrypoint", "entrypoint is required"));
        }
        if self.copy_from.as_os_str().is_empty() {
            return Err(CoreError::validation("copy", "path to copy is required"));
        }
        if !self.mount_path.starts_with('/') || self.mount_path == "/" {
            return Err(CoreError::validation(
                "mount path",
                "mount path must be an absolute path other than /",
            ));
        }
        if self.replicas < 1 {
            return Err(CoreError::validation("replicas", "replicas must be greater than 0"));
        }
        validate_timeout(self.timeout)?;

        if let Some(port) = self.container_port {
            validate_port("container port", port)?;
        }

        if let Some(exposure) = &self.exposure {
            validate_port("port", exposure.port)?;
            if self.container_port.is_none() {
                return Err(CoreError::validation(
                    "container port",
                    "container port is required when a service is requested",
                ));
            }
        }

        if let Some(route) = &self.route {
            if self.exposure.is_none() {
                return Err(CoreError::validation(
                    "ingress",
                    "an ingress requires a service to route to",
                ));
            }
            if route.host.trim().is_empty() {
                return Err(CoreError::validation("ingress host", "ingress host is required"));
            }
            if route.class.trim().is_empty() {
                return Err(CoreError::validation(
                    "ingress class",
                    "ingress class is required",
                ));
            }
        }

        Ok(())
    }
}

/// Options for the destroy operation
#[derive(Debug, Clone)]
pub struct DestroyOptions {
    /// Name the resources were deployed under
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Bound for the whole operation, including waiting for disappearance
    pub timeout: Duration,
}

impl Default for DestroyOptions {
    fn default() -> Self {
        Self {
            name: String::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl DestroyOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn claim_name(&self) -> String {
        storage_claim_name(&self.name)
    }

    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        validate_namespace(&self.namespace)?;
        validate_timeout(self.timeout)
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CoreError::validation("name", "name is required"));
    }
    if name.len() + CLAIM_SUFFIX.len() > MAX_NAME_LEN {
        return Err(CoreError::validation(
            "name",
            format!(
                "name must be at most {} characters",
                MAX_NAME_LEN - CLAIM_SUFFIX.len()
            ),
        ));
    }
    if !DNS_LABEL.is_match(name) {
        return Err(CoreError::validation(
            "name",
            format!(
                "'{}' must start with a lowercase letter and contain only lowercase alphanumerics or '-'",
                name
            ),
        ));
    }
    Ok(())
}

fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Err(CoreError::validation("namespace", "namespace is required"));
    }
    Ok(())
}

fn validate_timeout(timeout: Duration) -> Result<()> {
    if timeout < MIN_TIMEOUT {
        return Err(CoreError::validation(
            "timeout",
            format!(
                "timeout must be at least {}s",
                MIN_TIMEOUT.as_secs()
            ),
        ));
    }
    if timeout > MAX_TIMEOUT {
        return Err(CoreError::validation(
            "timeout",
            format!("timeout must be at most {}h", MAX_TIMEOUT.as_secs() / 3600),
        ));
    }
    Ok(())
}

fn validate_port(field: &str, port: i32) -> Result<()> {
    if !(1..=65535).contains(&port) {
        return Err(CoreError::validation(
            field,
            format!("{} must be between 1 and 65535", field),
        ));
    }
    Ok(())
}

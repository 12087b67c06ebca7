//! Copying local files into a running container

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{KubeError, Result};

/// One copy of a local path into a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    pub local_path: PathBuf,
    pub pod: String,
    pub container_path: String,
    pub container: String,
    pub namespace: String,
}

/// Opaque local-to-container copy
#[async_trait]
pub trait FileTransfer: Send + Sync {
    async fn copy(&self, request: &CopyRequest) -> Result<()>;
}

/// [`FileTransfer`] shelling out to `kubectl cp`
#[derive(Debug, Clone)]
pub struct KubectlCopy {
    program: PathBuf,
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
}

impl Default for KubectlCopy {
    fn default() -> Self {
        Self {
            program: PathBuf::from("kubectl"),
            kubeconfig: None,
            context: None,
        }
    }
}

impl KubectlCopy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different executable instead of `kubectl` from `PATH`
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn with_kubeconfig(mut self, kubeconfig: Option<PathBuf>) -> Self {
        self.kubeconfig = kubeconfig;
        self
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    /// Arguments passed to the program for `request`
    pub fn args(&self, request: &CopyRequest) -> Vec<String> {
        let mut args = vec![
            "cp".to_string(),
            request.local_path.display().to_string(),
            format!("{}:{}", request.pod, request.container_path),
            "-c".to_string(),
            request.container.clone(),
            "-n".to_string(),
            request.namespace.clone(),
        ];
        if let Some(kubeconfig) = &self.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        if let Some(context) = &self.context {
            args.push("--context".to_string());
            args.push(context.clone());
        }
        args
    }
}

#[async_trait]
impl FileTransfer for KubectlCopy {
    async fn copy(&self, request: &CopyRequest) -> Result<()> {
        ensure_exists(&request.local_path).await?;

        let args = self.args(request);
        debug!(program = %self.program.display(), ?args, "Running copy");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                KubeError::Transfer(format!(
                    "failed to run {}: {}",
                    self.program.display(),
                    e
                ))
            })?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(KubeError::Transfer(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                combined.trim()
            )));
        }

        info!(
            pod = %request.pod,
            path = %request.container_path,
            "Copied {}",
            request.local_path.display()
        );
        Ok(())
    }
}

async fn ensure_exists(path: &Path) -> Result<()> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(KubeError::Transfer(format!(
            "local path '{}' does not exist",
            path.display()
        ))),
        Err(e) => Err(KubeError::Transfer(format!(
            "cannot access local path '{}': {}",
            path.display(),
            e
        ))),
    }
}

/// [`FileTransfer`] that records requests instead of copying (for testing)
#[derive(Debug, Default)]
pub struct RecordingTransfer {
    requests: Mutex<Vec<CopyRequest>>,
    failure: Option<String>,
}

impl RecordingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transfer that records the request and then fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            failure: Some(message.into()),
        }
    }

    pub fn requests(&self) -> Vec<CopyRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FileTransfer for RecordingTransfer {
    async fn copy(&self, request: &CopyRequest) -> Result<()> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.failure {
            Some(message) => Err(KubeError::Transfer(message.clone())),
            None => Ok(()),
        }
    }
}

//! Container runtime capability
//!
//! The judge needs only a handful of operations from the runtime: look up a named
//! container, build an image, create/start a container with a fixed set of restrictions,
//! adjust its memory ceiling and execute a shell command inside it.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::config::SandboxConfig;
use super::SandboxError;

/// Lifecycle state of a named container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Running,
    Stopped,
    Missing,
}

/// Everything needed to instantiate a sandbox container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: String,
    pub memory_mb: u32,
    pub volume_path: PathBuf,
    pub mount_path: String,
    pub user: String,
    pub pids_limit: u32,
    pub tmpfs_size_mb: u32,
}

impl ContainerSpec {
    pub fn from_config(config: &SandboxConfig, name: &str, memory_mb: u32) -> Self {
        Self {
            name: name.to_string(),
            image: config.image.clone(),
            memory_mb,
            volume_path: config.volume_path.clone(),
            mount_path: config.mount_path.clone(),
            user: config.user.clone(),
            pids_limit: config.pids_limit,
            tmpfs_size_mb: config.tmpfs_size_mb,
        }
    }
}

/// A shell command to execute inside a container
#[derive(Debug, Clone, Copy)]
pub struct ExecRequest<'a> {
    pub container: &'a str,
    pub user: &'a str,
    pub work_dir: &'a str,
    pub script: &'a str,
}

/// Exit status and combined stdout/stderr of an executed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit status of the command, -1 when it was not reported
    pub exit_code: i32,
    pub output: String,
}

impl ExecOutput {
    pub fn success() -> Self {
        Self {
            exit_code: 0,
            output: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn container_state(&self, name: &str) -> Result<ContainerState, SandboxError>;

    async fn image_exists(&self, image: &str) -> Result<bool, SandboxError>;

    async fn build_image(&self, image: &str, context: &Path) -> Result<(), SandboxError>;

    /// Create the container described by `spec` and leave it running
    async fn create_container(&self, spec: &ContainerSpec) -> Result<(), SandboxError>;

    async fn start_container(&self, name: &str) -> Result<(), SandboxError>;

    async fn set_memory_limit(&self, name: &str, memory_mb: u32) -> Result<(), SandboxError>;

    async fn exec(&self, request: ExecRequest<'_>) -> Result<ExecOutput, SandboxError>;
}

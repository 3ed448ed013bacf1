//! Sandbox configuration
//!
//! Configuration for the docker sandboxes, loaded from the environment.

use std::path::PathBuf;

use anyhow::Result;

use crate::config::{env_or, env_parse};

/// Sandbox configuration
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Image the sandboxes are created from
    pub image: String,
    /// Prefix of the deterministic container names
    pub container_prefix: String,
    /// Build context used when the image is missing
    pub build_context: PathBuf,
    /// Host directory bind-mounted into every sandbox
    pub volume_path: PathBuf,
    /// Mount point of the volume inside the sandbox, also the exec working directory
    pub mount_path: String,
    /// Non-root identity commands run as
    pub user: String,
    /// Maximum number of processes per sandbox
    pub pids_limit: u32,
    /// Size of the scratch tmpfs on /tmp in MB
    pub tmpfs_size_mb: u32,
    /// Memory ceiling while compiling; the submission's own limit applies to the run
    pub compile_memory_limit_mb: u32,
    /// Number of sandboxes a worker checks submissions out of
    pub pool_size: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            image: "judger-runtime-img".to_string(),
            container_prefix: "judger-runtime-cnt".to_string(),
            build_context: PathBuf::from("./files/judger_dockerfile"),
            volume_path: PathBuf::from("/var/lib/judger/workspace"),
            mount_path: "/workspace".to_string(),
            user: "nobody".to_string(),
            pids_limit: 64,
            tmpfs_size_mb: 64,
            compile_memory_limit_mb: 2048,
            pool_size: 1,
        }
    }
}

impl SandboxConfig {
    /// Load the configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            image: env_or("SANDBOX_IMAGE", &defaults.image),
            container_prefix: env_or("SANDBOX_CONTAINER", &defaults.container_prefix),
            build_context: env_or(
                "SANDBOX_BUILD_CONTEXT",
                &defaults.build_context.to_string_lossy(),
            )
            .into(),
            volume_path: env_or("JUDGER_VOL_PATH", &defaults.volume_path.to_string_lossy())
                .into(),
            mount_path: env_or("SANDBOX_MOUNT_PATH", &defaults.mount_path),
            user: env_or("SANDBOX_USER", &defaults.user),
            pids_limit: env_parse("SANDBOX_PIDS_LIMIT", defaults.pids_limit)?,
            tmpfs_size_mb: env_parse("SANDBOX_TMPFS_MB", defaults.tmpfs_size_mb)?,
            compile_memory_limit_mb: env_parse(
                "SANDBOX_COMPILE_MEMORY_MB",
                defaults.compile_memory_limit_mb,
            )?,
            pool_size: env_parse("SANDBOX_POOL_SIZE", defaults.pool_size)?,
        };

        if config.pool_size == 0 {
            anyhow::bail!("SANDBOX_POOL_SIZE must be at least 1");
        }

        Ok(config)
    }

    /// Container names for a worker's pool.
    /// Names are namespaced by worker id so workers sharing a docker host never collide.
    pub fn slot_names(&self, worker_id: u32) -> Vec<String> {
        (0..self.pool_size)
            .map(|slot| format!("{}-w{}-{}", self.container_prefix, worker_id, slot))
            .collect()
    }
}

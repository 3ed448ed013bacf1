//! Sandbox module - container lifecycle and command execution
//!
//! This module provides a minimal abstraction over the container runtime.
//! It handles:
//! - Sandbox lookup, creation and image builds (`SandboxProvider`)
//! - Exclusive per-submission checkout of sandboxes (`SandboxPool`)
//! - Raw command execution returning `ExecOutput`
//!
//! The sandbox module does NOT:
//! - Interpret exit statuses (that's the classifier's job)
//! - Know about languages or compilation
//! - Compare outputs

pub mod config;
pub mod docker;
pub mod pool;
pub mod provider;
pub mod runtime;

use thiserror::Error;

// Re-exports for convenience
pub use config::SandboxConfig;
pub use docker::DockerCli;
pub use pool::{SandboxLease, SandboxPool};
pub use provider::{SandboxHandle, SandboxProvider};
pub use runtime::{ContainerRuntime, ContainerSpec, ContainerState, ExecOutput, ExecRequest};

/// Sandbox could not be provided or driven
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to launch {program}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build sandbox image {image}: {message}")]
    ImageBuild { image: String, message: String },

    #[error("failed to {action} {target}: {message}")]
    Runtime {
        action: &'static str,
        target: String,
        message: String,
    },

    #[error("sandbox pool is closed")]
    PoolClosed,
}

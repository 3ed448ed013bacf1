//! Docker CLI runtime
//!
//! Low-level wrapper around the `docker` command line for sandbox management.
//! Every operation is one CLI invocation; stderr of a failed invocation becomes the
//! error message.

use std::path::Path;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use super::runtime::{ContainerRuntime, ContainerSpec, ContainerState, ExecOutput, ExecRequest};
use super::SandboxError;

/// Container runtime backed by the docker CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    bin: String,
}

impl DockerCli {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    /// Use the binary named by DOCKER_BIN, or `docker` from PATH
    pub fn from_env() -> Self {
        Self::new(std::env::var("DOCKER_BIN").unwrap_or_else(|_| "docker".into()))
    }

    async fn docker(&self, args: &[String]) -> Result<Output, SandboxError> {
        debug!("Running {} with args: {:?}", self.bin, args);

        Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| SandboxError::Spawn {
                program: self.bin.clone(),
                source,
            })
    }

    async fn docker_checked(
        &self,
        action: &'static str,
        target: &str,
        args: &[String],
    ) -> Result<Output, SandboxError> {
        let output = self.docker(args).await?;
        if !output.status.success() {
            return Err(SandboxError::Runtime {
                action,
                target: target.to_string(),
                message: stderr_of(&output),
            });
        }
        Ok(output)
    }
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn container_state(&self, name: &str) -> Result<ContainerState, SandboxError> {
        let output = self
            .docker(&args([
                "container",
                "inspect",
                "--format",
                "{{.State.Running}}",
                name,
            ]))
            .await?;

        if !output.status.success() {
            let stderr = stderr_of(&output);
            if is_not_found(&stderr) {
                return Ok(ContainerState::Missing);
            }
            return Err(SandboxError::Runtime {
                action: "inspect container",
                target: name.to_string(),
                message: stderr,
            });
        }

        Ok(parse_running_state(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn image_exists(&self, image: &str) -> Result<bool, SandboxError> {
        let output = self
            .docker(&args(["image", "inspect", "--format", "{{.Id}}", image]))
            .await?;

        if output.status.success() {
            return Ok(true);
        }

        let stderr = stderr_of(&output);
        if is_not_found(&stderr) {
            Ok(false)
        } else {
            Err(SandboxError::Runtime {
                action: "inspect image",
                target: image.to_string(),
                message: stderr,
            })
        }
    }

    async fn build_image(&self, image: &str, context: &Path) -> Result<(), SandboxError> {
        info!("Building sandbox image {} from {:?}", image, context);

        let context = context.to_string_lossy();
        let output = self
            .docker(&args(["build", "--force-rm", "-t", image, &context]))
            .await?;

        if !output.status.success() {
            return Err(SandboxError::ImageBuild {
                image: image.to_string(),
                message: stderr_of(&output),
            });
        }

        info!("Built sandbox image {}", image);
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<(), SandboxError> {
        self.docker_checked("create container", &spec.name, &run_args(spec))
            .await?;
        info!(
            "Created sandbox {} from {} (memory {}MB)",
            spec.name, spec.image, spec.memory_mb
        );
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<(), SandboxError> {
        self.docker_checked("start container", name, &args(["start", name]))
            .await?;
        Ok(())
    }

    async fn set_memory_limit(&self, name: &str, memory_mb: u32) -> Result<(), SandboxError> {
        let memory = format!("{}m", memory_mb);
        self.docker_checked(
            "update memory of",
            name,
            &args(["update", "--memory", &memory, "--memory-swap", &memory, name]),
        )
        .await?;
        Ok(())
    }

    async fn exec(&self, request: ExecRequest<'_>) -> Result<ExecOutput, SandboxError> {
        let output = self.docker(&exec_args(&request)).await?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(ExecOutput {
            exit_code: output.status.code().unwrap_or(-1),
            output: combined,
        })
    }
}

/// Arguments for `docker run` creating a restricted, long-lived sandbox
pub fn run_args(spec: &ContainerSpec) -> Vec<String> {
    let memory = format!("{}m", spec.memory_mb);
    let volume = format!("{}:{}:rw", spec.volume_path.to_string_lossy(), spec.mount_path);
    let tmpfs = format!("/tmp:rw,exec,nosuid,size={}m", spec.tmpfs_size_mb);
    let pids = spec.pids_limit.to_string();

    args([
        "run",
        "--detach",
        "--tty",
        "--name",
        &spec.name,
        "--memory",
        &memory,
        "--memory-swap",
        &memory,
        "--network",
        "none",
        "--read-only",
        "--tmpfs",
        &tmpfs,
        "--pids-limit",
        &pids,
        "--user",
        &spec.user,
        "--volume",
        &volume,
        &spec.image,
    ])
}

/// Arguments for `docker exec` running a shell script inside the sandbox
pub fn exec_args(request: &ExecRequest<'_>) -> Vec<String> {
    args([
        "exec",
        "--user",
        request.user,
        "--workdir",
        request.work_dir,
        request.container,
        "/bin/sh",
        "-c",
        request.script,
    ])
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

fn is_not_found(stderr: &str) -> bool {
    stderr.contains("No such")
}

fn parse_running_state(stdout: &str) -> ContainerState {
    if stdout.trim() == "true" {
        ContainerState::Running
    } else {
        ContainerState::Stopped
    }
}

//! Sandbox provider
//!
//! Owns the lifecycle of named sandboxes: reuse if running, start if stopped,
//! create if missing (building the image first when it is missing too).

use std::sync::Arc;

use tracing::{debug, info};

use super::config::SandboxConfig;
use super::runtime::{ContainerRuntime, ContainerSpec, ContainerState, ExecOutput, ExecRequest};
use super::SandboxError;

/// Handle used to execute commands inside an acquired sandbox
#[derive(Clone)]
pub struct SandboxHandle {
    name: String,
    user: String,
    work_dir: String,
    runtime: Arc<dyn ContainerRuntime>,
}

impl SandboxHandle {
    /// Container name of the sandbox
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run a shell script inside the sandbox, from the mounted workspace root.
    ///
    /// A non-zero exit is the script's own status only while the sandbox is still
    /// running; otherwise the runtime failed and an error is returned.
    pub async fn exec(&self, script: &str) -> Result<ExecOutput, SandboxError> {
        debug!("Executing in sandbox {}: {}", self.name, script);
        let output = self
            .runtime
            .exec(ExecRequest {
                container: &self.name,
                user: &self.user,
                work_dir: &self.work_dir,
                script,
            })
            .await?;

        if !output.is_success() {
            self.ensure_running().await?;
        }
        Ok(output)
    }

    /// Replace the memory ceiling of the sandbox
    pub async fn set_memory_limit(&self, memory_limit_mb: u32) -> Result<(), SandboxError> {
        debug!("Setting memory of {} to {}MB", self.name, memory_limit_mb);
        self.runtime
            .set_memory_limit(&self.name, memory_limit_mb)
            .await
    }

    async fn ensure_running(&self) -> Result<(), SandboxError> {
        let message = match self.runtime.container_state(&self.name).await? {
            ContainerState::Running => return Ok(()),
            ContainerState::Stopped => "sandbox stopped",
            ContainerState::Missing => "sandbox no longer exists",
        };
        Err(SandboxError::Runtime {
            action: "exec in",
            target: self.name.clone(),
            message: message.to_string(),
        })
    }
}

impl std::fmt::Debug for SandboxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxHandle")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("work_dir", &self.work_dir)
            .finish()
    }
}

#[derive(Clone)]
pub struct SandboxProvider {
    runtime: Arc<dyn ContainerRuntime>,
    config: Arc<SandboxConfig>,
}

impl SandboxProvider {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: SandboxConfig) -> Self {
        Self {
            runtime,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Make sure the sandbox called `name` is running with the given memory ceiling.
    ///
    /// Image build and runtime failures are returned as-is; nothing is retried.
    pub async fn acquire(
        &self,
        name: &str,
        memory_limit_mb: u32,
    ) -> Result<SandboxHandle, SandboxError> {
        match self.runtime.container_state(name).await? {
            ContainerState::Running => {
                debug!("Reusing running sandbox {}", name);
                self.runtime.set_memory_limit(name, memory_limit_mb).await?;
            }
            ContainerState::Stopped => {
                info!("Starting stopped sandbox {}", name);
                self.runtime.start_container(name).await?;
                self.runtime.set_memory_limit(name, memory_limit_mb).await?;
            }
            ContainerState::Missing => {
                self.ensure_image().await?;
                let spec = ContainerSpec::from_config(&self.config, name, memory_limit_mb);
                self.runtime.create_container(&spec).await?;
            }
        }

        Ok(SandboxHandle {
            name: name.to_string(),
            user: self.config.user.clone(),
            work_dir: self.config.mount_path.clone(),
            runtime: Arc::clone(&self.runtime),
        })
    }

    async fn ensure_image(&self) -> Result<(), SandboxError> {
        if self.runtime.image_exists(&self.config.image).await? {
            return Ok(());
        }

        info!(
            "Sandbox image {} not found, building from {:?}",
            self.config.image, self.config.build_context
        );
        self.runtime
            .build_image(&self.config.image, &self.config.build_context)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeExec, FakeRuntime};

    fn provider(runtime: &Arc<FakeRuntime>) -> SandboxProvider {
        SandboxProvider::new(runtime.clone(), SandboxConfig::default())
    }

    #[tokio::test]
    async fn test_running_sandbox_is_reused() {
        let runtime = Arc::new(FakeRuntime::new("/tmp"));
        runtime.add_image("judger-runtime-img");
        runtime.add_container("cnt", true);

        let handle = provider(&runtime).acquire("cnt", 128).await.unwrap();

        assert_eq!(handle.name(), "cnt");
        let calls = runtime.calls();
        assert!(!calls.iter().any(|c| c.starts_with("start")));
        assert!(!calls.iter().any(|c| c.starts_with("create")));
        assert!(calls.contains(&"memory cnt 128".to_string()));
    }

    #[tokio::test]
    async fn test_stopped_sandbox_is_started() {
        let runtime = Arc::new(FakeRuntime::new("/tmp"));
        runtime.add_container("cnt", false);

        provider(&runtime).acquire("cnt", 64).await.unwrap();

        assert!(runtime.calls().contains(&"start cnt".to_string()));
        assert!(runtime.is_running("cnt"));
    }

    #[tokio::test]
    async fn test_missing_sandbox_is_created_from_existing_image() {
        let runtime = Arc::new(FakeRuntime::new("/tmp"));
        runtime.add_image("judger-runtime-img");

        provider(&runtime).acquire("cnt", 64).await.unwrap();

        let calls = runtime.calls();
        assert!(!calls.iter().any(|c| c.starts_with("build")));
        assert!(calls.contains(&"create cnt 64".to_string()));
        assert!(runtime.is_running("cnt"));
    }

    #[tokio::test]
    async fn test_missing_image_is_built_before_create() {
        let runtime = Arc::new(FakeRuntime::new("/tmp"));

        provider(&runtime).acquire("cnt", 64).await.unwrap();

        let calls = runtime.calls();
        let build = calls.iter().position(|c| c.starts_with("build"));
        let create = calls.iter().position(|c| c.starts_with("create"));
        assert!(build.is_some());
        assert!(build < create);
    }

    #[tokio::test]
    async fn test_failed_exec_in_running_sandbox_is_the_script_status() {
        let runtime = Arc::new(FakeRuntime::new("/tmp"));
        runtime.respond(|_: &str| FakeExec::exit(1).with_output("Traceback"));
        let handle = provider(&runtime).acquire("cnt", 64).await.unwrap();

        let output = handle.exec("python3 main.py").await.unwrap();

        assert_eq!(output.exit_code, 1);
        assert_eq!(output.output, "Traceback");
    }

    #[tokio::test]
    async fn test_failed_exec_in_dead_sandbox_is_an_error() {
        let runtime = Arc::new(FakeRuntime::new("/tmp"));
        runtime.respond(|_: &str| {
            FakeExec::exit(1)
                .with_output("Error response from daemon: container is not running")
                .stopping_sandbox()
        });
        let handle = provider(&runtime).acquire("cnt", 64).await.unwrap();

        let err = handle.exec("true").await.unwrap_err();

        assert!(matches!(err, SandboxError::Runtime { action: "exec in", .. }));
    }

    #[tokio::test]
    async fn test_build_failure_is_reported() {
        let runtime = Arc::new(FakeRuntime::new("/tmp"));
        runtime.fail_builds();

        let err = provider(&runtime).acquire("cnt", 64).await.unwrap_err();

        assert!(matches!(err, SandboxError::ImageBuild { .. }));
        assert!(!runtime.calls().iter().any(|c| c.starts_with("create")));
    }
}

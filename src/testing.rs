//! In-memory container runtime for tests
//!
//! Tracks images and containers, records every call, and scripts exec results.
//! Cleanup commands really remove the directory from the volume, and a scripted
//! stdout is written to the file the run script redirects into, so workspace
//! effects can be asserted on disk.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::sandbox::{
    ContainerRuntime, ContainerSpec, ContainerState, ExecOutput, ExecRequest, SandboxError,
};

/// Scripted result of an exec call
#[derive(Debug, Clone, Default)]
pub struct FakeExec {
    pub exit_code: i32,
    pub output: String,
    /// Written to the redirect target of the script, if any
    pub stdout: Option<String>,
    /// The container is stopped once the exec returns
    pub stops_sandbox: bool,
}

impl FakeExec {
    pub fn exit(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Default::default()
        }
    }

    pub fn with_output(mut self, output: &str) -> Self {
        self.output = output.to_string();
        self
    }

    pub fn with_stdout(mut self, stdout: &str) -> Self {
        self.stdout = Some(stdout.to_string());
        self
    }

    pub fn stopping_sandbox(mut self) -> Self {
        self.stops_sandbox = true;
        self
    }
}

type Responder = Arc<dyn Fn(&str) -> FakeExec + Send + Sync>;

#[derive(Default)]
struct FakeState {
    images: HashSet<String>,
    containers: HashMap<String, bool>,
    calls: Vec<String>,
    scripts: Vec<String>,
    fail_builds: bool,
    cleanup_exit: i32,
}

pub struct FakeRuntime {
    volume: PathBuf,
    state: Mutex<FakeState>,
    responder: Mutex<Responder>,
}

impl FakeRuntime {
    pub fn new(volume: impl AsRef<Path>) -> Self {
        Self {
            volume: volume.as_ref().to_path_buf(),
            state: Mutex::new(FakeState::default()),
            responder: Mutex::new(Arc::new(|_: &str| FakeExec::exit(0))),
        }
    }

    pub fn add_image(&self, image: &str) {
        self.state.lock().unwrap().images.insert(image.to_string());
    }

    pub fn add_container(&self, name: &str, running: bool) {
        self.state
            .lock()
            .unwrap()
            .containers
            .insert(name.to_string(), running);
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .containers
            .get(name)
            .copied()
            .unwrap_or(false)
    }

    pub fn fail_builds(&self) {
        self.state.lock().unwrap().fail_builds = true;
    }

    /// Make cleanup commands exit with `exit_code` without removing anything
    pub fn fail_cleanup(&self, exit_code: i32) {
        self.state.lock().unwrap().cleanup_exit = exit_code;
    }

    /// Script the result of every non-cleanup exec
    pub fn respond(&self, responder: impl Fn(&str) -> FakeExec + Send + Sync + 'static) {
        *self.responder.lock().unwrap() = Arc::new(responder);
    }

    /// Every runtime call, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Scripts passed to exec, cleanup excluded
    pub fn scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().scripts.clone()
    }

    /// Submission ids passed to cleanup
    pub fn cleanups(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.strip_prefix("exec rm -rf -- ").map(str::to_string))
            .collect()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn container_state(&self, name: &str) -> Result<ContainerState, SandboxError> {
        self.record(format!("inspect {}", name));
        Ok(match self.state.lock().unwrap().containers.get(name) {
            Some(true) => ContainerState::Running,
            Some(false) => ContainerState::Stopped,
            None => ContainerState::Missing,
        })
    }

    async fn image_exists(&self, image: &str) -> Result<bool, SandboxError> {
        self.record(format!("image {}", image));
        Ok(self.state.lock().unwrap().images.contains(image))
    }

    async fn build_image(&self, image: &str, _context: &Path) -> Result<(), SandboxError> {
        self.record(format!("build {}", image));
        let mut state = self.state.lock().unwrap();
        if state.fail_builds {
            return Err(SandboxError::ImageBuild {
                image: image.to_string(),
                message: "build context missing".to_string(),
            });
        }
        state.images.insert(image.to_string());
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<(), SandboxError> {
        self.record(format!("create {} {}", spec.name, spec.memory_mb));
        self.state
            .lock()
            .unwrap()
            .containers
            .insert(spec.name.clone(), true);
        Ok(())
    }

    async fn start_container(&self, name: &str) -> Result<(), SandboxError> {
        self.record(format!("start {}", name));
        self.state
            .lock()
            .unwrap()
            .containers
            .insert(name.to_string(), true);
        Ok(())
    }

    async fn set_memory_limit(&self, name: &str, memory_mb: u32) -> Result<(), SandboxError> {
        self.record(format!("memory {} {}", name, memory_mb));
        Ok(())
    }

    async fn exec(&self, request: ExecRequest<'_>) -> Result<ExecOutput, SandboxError> {
        self.record(format!("exec {}", request.script));

        if let Some(target) = request.script.strip_prefix("rm -rf -- ") {
            let exit_code = self.state.lock().unwrap().cleanup_exit;
            if exit_code == 0 {
                let dir = self.volume.join(target.trim());
                if dir.exists() {
                    std::fs::remove_dir_all(&dir).map_err(|source| SandboxError::Spawn {
                        program: "rm".to_string(),
                        source,
                    })?;
                }
            }
            return Ok(ExecOutput {
                exit_code,
                output: String::new(),
            });
        }

        self.state
            .lock()
            .unwrap()
            .scripts
            .push(request.script.to_string());

        let responder = Arc::clone(&self.responder.lock().unwrap());
        let result = responder(request.script);

        if let (Some(stdout), Some((_, target))) = (&result.stdout, request.script.rsplit_once(" > ")) {
            let path = self.volume.join(target.split_whitespace().next().unwrap_or_default());
            std::fs::write(&path, stdout).map_err(|source| SandboxError::Spawn {
                program: "sh".to_string(),
                source,
            })?;
        }

        if result.stops_sandbox {
            self.state
                .lock()
                .unwrap()
                .containers
                .insert(request.container.to_string(), false);
        }

        Ok(ExecOutput {
            exit_code: result.exit_code,
            output: result.output,
        })
    }
}

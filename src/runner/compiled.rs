//! Runner for natively compiled languages

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{run_program, LanguageRunner};
use crate::languages::LanguageConfig;
use crate::sandbox::{ExecOutput, SandboxError, SandboxHandle};

pub struct CompiledRunner {
    language: Arc<LanguageConfig>,
    compile_command: String,
}

impl CompiledRunner {
    pub fn new(language: Arc<LanguageConfig>, compile_command: impl Into<String>) -> Self {
        Self {
            language,
            compile_command: compile_command.into(),
        }
    }
}

#[async_trait]
impl LanguageRunner for CompiledRunner {
    fn language(&self) -> &LanguageConfig {
        &self.language
    }

    fn has_compile_phase(&self) -> bool {
        true
    }

    async fn compile(
        &self,
        sandbox: &SandboxHandle,
        submission_id: &str,
    ) -> Result<ExecOutput, SandboxError> {
        let command = self.language.render(&self.compile_command, submission_id);
        debug!("Compiling {} with: {}", submission_id, command);
        sandbox.exec(&command).await
    }

    async fn run(
        &self,
        sandbox: &SandboxHandle,
        submission_id: &str,
        time_limit_secs: u32,
    ) -> Result<ExecOutput, SandboxError> {
        run_program(&self.language, sandbox, submission_id, time_limit_secs).await
    }
}

//! Runner module - per-language compile/run abstraction
//!
//! This module provides a unified interface over the supported languages:
//! - `CompiledRunner`: languages with a toolchain step producing a program
//! - `InterpretedRunner`: languages executed straight from source
//!
//! Every runner executes inside a checked-out sandbox, relative to the workspace root.
//! The runner module does NOT:
//! - Compare outputs or determine verdicts
//! - Stage or read workspace files
//! - Know about queues or delivery

pub mod compiled;
pub mod interpreted;

use std::sync::Arc;

use async_trait::async_trait;

use crate::languages::LanguageConfig;
use crate::sandbox::{ExecOutput, SandboxError, SandboxHandle};
use crate::workspace::{self, INPUT_FILE, OUTPUT_FILE};

/// Compile/run capability of one language
#[async_trait]
pub trait LanguageRunner: Send + Sync {
    fn language(&self) -> &LanguageConfig;

    fn has_compile_phase(&self) -> bool;

    /// Compile the staged source. A non-zero exit status is returned as-is.
    async fn compile(
        &self,
        sandbox: &SandboxHandle,
        submission_id: &str,
    ) -> Result<ExecOutput, SandboxError>;

    /// Run the program with stdin from the input file and stdout to the output file,
    /// stopped by the timeout wrapper after `time_limit_secs`
    async fn run(
        &self,
        sandbox: &SandboxHandle,
        submission_id: &str,
        time_limit_secs: u32,
    ) -> Result<ExecOutput, SandboxError>;

    /// Remove the submission's workspace directory
    async fn cleanup(
        &self,
        sandbox: &SandboxHandle,
        submission_id: &str,
    ) -> Result<ExecOutput, SandboxError> {
        workspace::cleanup(sandbox, submission_id).await
    }
}

/// Pick the runner variant for a language
pub fn runner_for(language: Arc<LanguageConfig>) -> Box<dyn LanguageRunner> {
    match language.compile_command.clone() {
        Some(compile_command) => Box::new(compiled::CompiledRunner::new(language, compile_command)),
        None => Box::new(interpreted::InterpretedRunner::new(language)),
    }
}

/// Shell script for the run phase.
/// `--preserve-status` makes an expired timeout exit with 128 + SIGTERM.
pub fn run_script(program: &str, submission_id: &str, time_limit_secs: u32) -> String {
    format!(
        "timeout --preserve-status {} {} < {}/{} > {}/{}",
        time_limit_secs, program, submission_id, INPUT_FILE, submission_id, OUTPUT_FILE
    )
}

async fn run_program(
    language: &LanguageConfig,
    sandbox: &SandboxHandle,
    submission_id: &str,
    time_limit_secs: u32,
) -> Result<ExecOutput, SandboxError> {
    let program = language.render(&language.run_command, submission_id);
    sandbox
        .exec(&run_script(&program, submission_id, time_limit_secs))
        .await
}

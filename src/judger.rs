//! Judger module - orchestration of a single submission
//!
//! Both judging modes share one workflow:
//! validate → resolve language → check out sandbox → stage workspace → compile
//! (if the language has a compile phase) → run → classify → cleanup.
//! Cleanup runs on every path out of the workflow and never replaces its result.

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::classifier::{classify_compile, classify_custom, classify_graded};
use crate::core::{JudgeError, Verdict};
use crate::languages::LanguageRegistry;
use crate::runner::{runner_for, LanguageRunner};
use crate::sandbox::{SandboxError, SandboxHandle, SandboxPool};
use crate::submission::{RunMode, Submission};
use crate::workspace::{self, StageInputs, Workspace};

/// Result of a custom run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomRunOutcome {
    pub verdict: Verdict,
    /// Everything the program wrote to standard output (empty after a compile error)
    pub output: String,
}

struct Judgement {
    verdict: Verdict,
    output: String,
}

pub struct Judge {
    pool: SandboxPool,
    languages: LanguageRegistry,
    workspace: Workspace,
}

impl Judge {
    /// `workspace` must be rooted at the host side of the volume the sandboxes mount
    pub fn new(pool: SandboxPool, languages: LanguageRegistry, workspace: Workspace) -> Self {
        Self {
            pool,
            languages,
            workspace,
        }
    }

    pub fn languages(&self) -> &LanguageRegistry {
        &self.languages
    }

    pub fn pool(&self) -> &SandboxPool {
        &self.pool
    }

    /// Judge a submission against its expected output
    pub async fn graded_run(&self, submission: &Submission) -> Result<Verdict, JudgeError> {
        let judgement = self.judge(submission, RunMode::Graded).await?;
        Ok(judgement.verdict)
    }

    /// Run a submission and return what it printed
    pub async fn custom_run(&self, submission: &Submission) -> Result<CustomRunOutcome, JudgeError> {
        let judgement = self.judge(submission, RunMode::Custom).await?;
        Ok(CustomRunOutcome {
            verdict: judgement.verdict,
            output: judgement.output,
        })
    }

    async fn judge(&self, submission: &Submission, mode: RunMode) -> Result<Judgement, JudgeError> {
        submission.validate(mode)?;

        let language = self
            .languages
            .get(&submission.language)
            .ok_or_else(|| JudgeError::UnsupportedLanguage(submission.language.clone()))?;
        let runner = runner_for(language);

        let sandbox = self
            .pool
            .checkout(submission.memory_limit_mb)
            .await
            .map_err(JudgeError::SandboxUnavailable)?;

        let submission_id = Uuid::new_v4();
        let id = submission_id.to_string();
        info!(
            "Judging submission {} (language={}, mode={:?}, time_limit={}s, memory_limit={}MB) in {}",
            id,
            runner.language().name,
            mode,
            submission.time_limit_secs,
            submission.memory_limit_mb,
            sandbox.name()
        );

        let result = self
            .execute(&sandbox, runner.as_ref(), submission, &id, mode)
            .await;

        self.cleanup(&sandbox, runner.as_ref(), &id).await;

        match result {
            Ok(judgement) => {
                info!("Submission {} judged: {}", id, judgement.verdict);
                Ok(judgement)
            }
            Err(e) => {
                error!("Failed to judge submission {}: {:#}", id, e);
                Err(into_judge_error(submission_id, e))
            }
        }
    }

    async fn execute(
        &self,
        sandbox: &SandboxHandle,
        runner: &dyn LanguageRunner,
        submission: &Submission,
        id: &str,
        mode: RunMode,
    ) -> Result<Judgement> {
        let source_file = runner.language().source_file();
        let expected = match mode {
            RunMode::Graded => submission.expected_output.as_ref(),
            RunMode::Custom => None,
        };

        let paths = self
            .workspace
            .stage(
                id,
                StageInputs {
                    source_file: &source_file,
                    source: &submission.source,
                    stdin: submission.stdin.as_ref(),
                    expected,
                },
            )
            .await
            .context("Failed to stage workspace")?;

        if runner.has_compile_phase() {
            // Toolchains get their own ceiling; the submission's applies to the run only
            let compile_limit = self
                .pool
                .config()
                .compile_memory_limit_mb
                .max(submission.memory_limit_mb);
            let lifted = compile_limit != submission.memory_limit_mb;
            if lifted {
                sandbox
                    .set_memory_limit(compile_limit)
                    .await
                    .context("Failed to lift memory limit for compilation")?;
            }

            let compiled = runner
                .compile(sandbox, id)
                .await
                .context("Failed to run compile step")?;

            if lifted {
                sandbox
                    .set_memory_limit(submission.memory_limit_mb)
                    .await
                    .context("Failed to restore memory limit")?;
            }

            if let Some(verdict) = classify_compile(compiled.exit_code) {
                debug!(
                    "Compilation of {} exited with {}: {}",
                    id, compiled.exit_code, compiled.output
                );
                return Ok(Judgement {
                    verdict,
                    output: String::new(),
                });
            }
        }

        let run = runner
            .run(sandbox, id, submission.time_limit_secs)
            .await
            .context("Failed to run program")?;
        debug!("Run of {} exited with {}", id, run.exit_code);

        let produced = workspace::read_output(&paths).await?;
        let verdict = match mode {
            RunMode::Graded => {
                let expected = workspace::read_expected(&paths).await?;
                classify_graded(run.exit_code, &produced, &expected)
            }
            RunMode::Custom => classify_custom(run.exit_code),
        };

        Ok(Judgement {
            verdict,
            output: produced,
        })
    }

    /// Remove the workspace; failures are logged and swallowed
    async fn cleanup(&self, sandbox: &SandboxHandle, runner: &dyn LanguageRunner, id: &str) {
        match runner.cleanup(sandbox, id).await {
            Ok(output) if output.is_success() => {
                debug!("Cleaned up workspace of {}", id);
                return;
            }
            Ok(output) => warn!(
                "Sandbox cleanup of {} exited with {}: {}",
                id,
                output.exit_code,
                output.output.trim()
            ),
            Err(e) => warn!("Sandbox cleanup of {} failed: {}", id, e),
        }

        // Fall back to removing it from the host side of the volume
        let dir = self.workspace.dir(id);
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove workspace {:?}: {}", dir, e);
            }
        }
    }
}

fn into_judge_error(submission_id: Uuid, error: anyhow::Error) -> JudgeError {
    match error.downcast::<SandboxError>() {
        Ok(sandbox_error) => JudgeError::SandboxUnavailable(sandbox_error),
        Err(source) => JudgeError::Internal {
            submission_id,
            source,
        },
    }
}

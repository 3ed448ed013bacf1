//! Runner for interpreted languages, which have no compile phase

use std::sync::Arc;

use async_trait::async_trait;

use super::{run_program, LanguageRunner};
use crate::languages::LanguageConfig;
use crate::sandbox::{ExecOutput, SandboxError, SandboxHandle};

pub struct InterpretedRunner {
    language: Arc<LanguageConfig>,
}

impl InterpretedRunner {
    pub fn new(language: Arc<LanguageConfig>) -> Self {
        Self { language }
    }
}

#[async_trait]
impl LanguageRunner for InterpretedRunner {
    fn language(&self) -> &LanguageConfig {
        &self.language
    }

    fn has_compile_phase(&self) -> bool {
        false
    }

    async fn compile(
        &self,
        _sandbox: &SandboxHandle,
        _submission_id: &str,
    ) -> Result<ExecOutput, SandboxError> {
        Ok(ExecOutput::success())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::LanguageRegistry;
    use crate::sandbox::{SandboxConfig, SandboxProvider};
    use crate::testing::FakeRuntime;

    #[tokio::test]
    async fn test_compile_is_a_no_op() {
        let runtime = Arc::new(FakeRuntime::new("/tmp"));
        let provider = SandboxProvider::new(runtime.clone(), SandboxConfig::default());
        let sandbox = provider.acquire("cnt", 64).await.unwrap();
        let runner = InterpretedRunner::new(LanguageRegistry::builtin().unwrap().get("py").unwrap());

        let compiled = runner.compile(&sandbox, "s1").await.unwrap();
        assert!(compiled.is_success());
        assert!(runtime.scripts().is_empty());

        runner.run(&sandbox, "s1", 1).await.unwrap();
        assert_eq!(
            runtime.scripts(),
            vec!["timeout --preserve-status 1 python3 s1/UserProgram.py < s1/ip.txt > s1/actual_op.txt"]
        );
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let volume = tempfile::tempdir().unwrap();
        std::fs::create_dir(volume.path().join("s1")).unwrap();
        let runtime = Arc::new(FakeRuntime::new(volume.path()));
        let provider = SandboxProvider::new(runtime.clone(), SandboxConfig::default());
        let sandbox = provider.acquire("cnt", 64).await.unwrap();
        let runner = InterpretedRunner::new(LanguageRegistry::builtin().unwrap().get("py").unwrap());

        assert!(runner.cleanup(&sandbox, "s1").await.unwrap().is_success());
        assert!(!volume.path().join("s1").exists());
        assert!(runner.cleanup(&sandbox, "s1").await.unwrap().is_success());
    }
}

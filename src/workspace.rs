//! Submission workspace
//!
//! Per-submission staging directory under the volume shared with the sandboxes:
//! `<volume-root>/<submission-id>/{UserProgram.<ext>, ip.txt, expected_op.txt, actual_op.txt}`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::debug;

use crate::core::JudgeError;
use crate::sandbox::{ExecOutput, SandboxError, SandboxHandle};

/// Stem of the staged source file
pub const SOURCE_STEM: &str = "UserProgram";
/// Name of the compiled program
pub const BINARY_NAME: &str = "UserProgram";
pub const INPUT_FILE: &str = "ip.txt";
pub const EXPECTED_FILE: &str = "expected_op.txt";
pub const OUTPUT_FILE: &str = "actual_op.txt";

/// Content of a staged file, either inline or copied from a host path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Content(String),
    Path(PathBuf),
}

impl InputSource {
    /// Build from the inline/path pair of a job field.
    /// Returns `None` when neither is given; giving both is an error.
    pub fn from_fields(
        field: &'static str,
        content: Option<String>,
        path: Option<String>,
    ) -> Result<Option<Self>, JudgeError> {
        match (content, path) {
            (Some(_), Some(_)) => Err(JudgeError::ConflictingInput { field }),
            (Some(content), None) => Ok(Some(InputSource::Content(content))),
            (None, Some(path)) => Ok(Some(InputSource::Path(path.into()))),
            (None, None) => Ok(None),
        }
    }

    /// Like `from_fields`, for fields that must be present
    pub fn required(
        field: &'static str,
        content: Option<String>,
        path: Option<String>,
    ) -> Result<Self, JudgeError> {
        Self::from_fields(field, content, path)?.ok_or(JudgeError::MissingInput { field })
    }

    async fn write_to(&self, dest: &Path) -> Result<()> {
        match self {
            InputSource::Content(content) => fs::write(dest, content)
                .await
                .with_context(|| format!("Failed to write {:?}", dest)),
            InputSource::Path(source) => fs::copy(source, dest)
                .await
                .map(|_| ())
                .with_context(|| format!("Failed to copy {:?} to {:?}", source, dest)),
        }
    }
}

/// Files to stage for one submission
#[derive(Debug, Clone, Copy)]
pub struct StageInputs<'a> {
    /// File name of the source, e.g. `UserProgram.cpp`
    pub source_file: &'a str,
    pub source: &'a InputSource,
    /// Standard input; an empty input file is written when absent
    pub stdin: Option<&'a InputSource>,
    /// Expected output, graded runs only
    pub expected: Option<&'a InputSource>,
}

/// Host paths of a staged workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspacePaths {
    pub dir: PathBuf,
    pub source: PathBuf,
    pub input: PathBuf,
    pub expected: Option<PathBuf>,
    pub output: PathBuf,
}

/// Staging area rooted at the host side of the shared volume
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of a submission
    pub fn dir(&self, submission_id: &str) -> PathBuf {
        self.root.join(submission_id)
    }

    /// Create a fresh submission directory and write the staged files into it
    pub async fn stage(&self, submission_id: &str, inputs: StageInputs<'_>) -> Result<WorkspacePaths> {
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create workspace root {:?}", self.root))?;
        // The sandbox user removes submission directories from the root
        open_to_sandbox(&self.root).await?;

        let dir = self.dir(submission_id);
        fs::create_dir(&dir)
            .await
            .with_context(|| format!("Failed to create submission directory {:?}", dir))?;
        open_to_sandbox(&dir).await?;

        let paths = WorkspacePaths {
            source: dir.join(inputs.source_file),
            input: dir.join(INPUT_FILE),
            expected: inputs.expected.map(|_| dir.join(EXPECTED_FILE)),
            output: dir.join(OUTPUT_FILE),
            dir,
        };

        inputs.source.write_to(&paths.source).await?;

        match inputs.stdin {
            Some(stdin) => stdin.write_to(&paths.input).await?,
            None => fs::write(&paths.input, "")
                .await
                .with_context(|| format!("Failed to write {:?}", paths.input))?,
        }

        if let (Some(expected), Some(path)) = (inputs.expected, &paths.expected) {
            expected.write_to(path).await?;
        }

        debug!("Staged submission {} in {:?}", submission_id, paths.dir);
        Ok(paths)
    }
}

/// Read the output produced by the run step; a missing file reads as empty
pub async fn read_output(paths: &WorkspacePaths) -> Result<String> {
    read_lossy(&paths.output).await
}

/// Read the staged expected output
pub async fn read_expected(paths: &WorkspacePaths) -> Result<String> {
    let path = paths
        .expected
        .as_ref()
        .context("Workspace has no expected output")?;
    read_lossy(path).await
}

async fn read_lossy(path: &Path) -> Result<String> {
    match fs::read(path).await {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", path)),
    }
}

/// Shell command removing a submission directory; succeeds when it is already gone
pub fn cleanup_command(submission_id: &str) -> String {
    format!("rm -rf -- {}", submission_id)
}

/// Remove a submission directory from inside the sandbox, so the files the sandbox user
/// created there are removable under its own permissions
pub async fn cleanup(sandbox: &SandboxHandle, submission_id: &str) -> Result<ExecOutput, SandboxError> {
    sandbox.exec(&cleanup_command(submission_id)).await
}

/// The sandbox user writes and deletes entries here
#[cfg(unix)]
async fn open_to_sandbox(dir: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(dir, std::fs::Permissions::from_mode(0o777))
        .await
        .with_context(|| format!("Failed to set permissions on {:?}", dir))
}

#[cfg(not(unix))]
async fn open_to_sandbox(_dir: &Path) -> Result<()> {
    Ok(())
}

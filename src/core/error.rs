use thiserror::Error;
use uuid::Uuid;

use crate::sandbox::SandboxError;

/// Failure of a judge run that produced no verdict
///
/// Expected execution outcomes (compile failure, crash, timeout, memory kill) are
/// verdicts, not errors.
#[derive(Debug, Error)]
pub enum JudgeError {
    /// Neither inline content nor a path was supplied for a field
    #[error("{field} not provided")]
    MissingInput { field: &'static str },

    /// Both inline content and a path were supplied for a field
    #[error("{field} provided both inline and as a path")]
    ConflictingInput { field: &'static str },

    #[error("invalid {field}: {value}")]
    InvalidLimit { field: &'static str, value: u32 },

    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("sandbox unavailable")]
    SandboxUnavailable(#[source] SandboxError),

    /// Unexpected failure after the submission got an identifier
    #[error("internal error while judging submission {submission_id}")]
    Internal {
        submission_id: Uuid,
        #[source]
        source: anyhow::Error,
    },
}

impl JudgeError {
    /// Stable error kind reported to callers
    pub fn kind(&self) -> &'static str {
        match self {
            JudgeError::MissingInput { .. }
            | JudgeError::ConflictingInput { .. }
            | JudgeError::InvalidLimit { .. } => "invalid_input",
            JudgeError::UnsupportedLanguage(_) => "unsupported_language",
            JudgeError::SandboxUnavailable(_) => "sandbox_unavailable",
            JudgeError::Internal { .. } => "internal_error",
        }
    }

    /// Whether the error was raised before any sandbox work began
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            JudgeError::MissingInput { .. }
                | JudgeError::ConflictingInput { .. }
                | JudgeError::InvalidLimit { .. }
                | JudgeError::UnsupportedLanguage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            JudgeError::MissingInput { field: "src_code" }.kind(),
            "invalid_input"
        );
        assert_eq!(
            JudgeError::UnsupportedLanguage("cobol".into()).kind(),
            "unsupported_language"
        );
        let internal = JudgeError::Internal {
            submission_id: Uuid::new_v4(),
            source: anyhow::anyhow!("disk full"),
        };
        assert_eq!(internal.kind(), "internal_error");
        assert!(!internal.is_input_error());
    }

    #[test]
    fn test_internal_error_keeps_cause() {
        let err = JudgeError::Internal {
            submission_id: Uuid::nil(),
            source: anyhow::anyhow!("disk full"),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("disk full"));
    }
}

//! Submission model

use serde::{Deserialize, Serialize};

use crate::core::JudgeError;
use crate::workspace::InputSource;

/// Smallest memory ceiling docker accepts for a container
pub const MIN_MEMORY_LIMIT_MB: u32 = 6;

/// Judging mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Compare produced output against the expected output
    Graded,
    /// Return the produced output as-is
    Custom,
}

/// Source, inputs and limits of one judge request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Language tag, resolved through the language table
    pub language: String,
    pub time_limit_secs: u32,
    pub memory_limit_mb: u32,
    pub source: InputSource,
    pub stdin: Option<InputSource>,
    pub expected_output: Option<InputSource>,
}

impl Submission {
    pub fn new(
        language: impl Into<String>,
        time_limit_secs: u32,
        memory_limit_mb: u32,
        source: InputSource,
    ) -> Self {
        Self {
            language: language.into(),
            time_limit_secs,
            memory_limit_mb,
            source,
            stdin: None,
            expected_output: None,
        }
    }

    pub fn with_stdin(mut self, stdin: InputSource) -> Self {
        self.stdin = Some(stdin);
        self
    }

    pub fn with_expected_output(mut self, expected: InputSource) -> Self {
        self.expected_output = Some(expected);
        self
    }

    /// Check limits and the inputs `mode` requires
    pub fn validate(&self, mode: RunMode) -> Result<(), JudgeError> {
        if self.time_limit_secs == 0 {
            return Err(JudgeError::InvalidLimit {
                field: "time_limit",
                value: self.time_limit_secs,
            });
        }
        if self.memory_limit_mb < MIN_MEMORY_LIMIT_MB {
            return Err(JudgeError::InvalidLimit {
                field: "memory_limit",
                value: self.memory_limit_mb,
            });
        }

        if mode == RunMode::Graded {
            if self.stdin.is_none() {
                return Err(JudgeError::MissingInput { field: "std_in" });
            }
            if self.expected_output.is_none() {
                return Err(JudgeError::MissingInput {
                    field: "expected_out",
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> Submission {
        Submission::new("cpp", 2, 64, InputSource::Content("int main(){}".into()))
    }

    #[test]
    fn test_custom_mode_needs_no_io() {
        assert!(submission().validate(RunMode::Custom).is_ok());
    }

    #[test]
    fn test_graded_mode_needs_stdin_and_expected() {
        let err = submission().validate(RunMode::Graded).unwrap_err();
        assert!(matches!(err, JudgeError::MissingInput { field: "std_in" }));

        let err = submission()
            .with_stdin(InputSource::Content(String::new()))
            .validate(RunMode::Graded)
            .unwrap_err();
        assert!(matches!(err, JudgeError::MissingInput { field: "expected_out" }));

        assert!(submission()
            .with_stdin(InputSource::Content(String::new()))
            .with_expected_output(InputSource::Content("OK".into()))
            .validate(RunMode::Graded)
            .is_ok());
    }

    #[test]
    fn test_limits_must_be_positive() {
        let mut s = submission();
        s.time_limit_secs = 0;
        assert!(matches!(
            s.validate(RunMode::Custom),
            Err(JudgeError::InvalidLimit { field: "time_limit", .. })
        ));

        let mut s = submission();
        s.memory_limit_mb = 0;
        assert!(matches!(
            s.validate(RunMode::Custom),
            Err(JudgeError::InvalidLimit { field: "memory_limit", .. })
        ));
    }
}

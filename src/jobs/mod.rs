//! Queue jobs and the reports produced for them

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::core::{JudgeError, Verdict};
use crate::judger::Judge;
use crate::submission::{RunMode, Submission};
use crate::workspace::InputSource;

/// Worker job enum - represents the judging modes the worker can process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "job_type")]
pub enum WorkerJob {
    /// Graded run against an expected output
    #[serde(rename = "submit")]
    Submit(JobRequest),
    /// Custom run returning the program output
    #[serde(rename = "run")]
    Run(JobRequest),
}

impl WorkerJob {
    pub fn request(&self) -> &JobRequest {
        match self {
            WorkerJob::Submit(request) | WorkerJob::Run(request) => request,
        }
    }

    pub fn mode(&self) -> RunMode {
        match self {
            WorkerJob::Submit(_) => RunMode::Graded,
            WorkerJob::Run(_) => RunMode::Custom,
        }
    }
}

/// Job fields as received from clients.
/// Each input is given either inline or as a path on the worker host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    #[serde(default = "Uuid::new_v4")]
    pub request_id: Uuid,
    pub language: String,
    /// Seconds
    pub time_limit: u32,
    /// MB
    pub memory_limit: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_code_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub std_in_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_out: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_out_path: Option<String>,
    /// Receives the report as a JSON POST
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl JobRequest {
    pub fn to_submission(&self) -> Result<Submission, JudgeError> {
        let source =
            InputSource::required("src_code", self.src_code.clone(), self.src_code_path.clone())?;

        let mut submission =
            Submission::new(&self.language, self.time_limit, self.memory_limit, source);
        submission.stdin =
            InputSource::from_fields("std_in", self.std_in.clone(), self.std_in_path.clone())?;
        submission.expected_output = InputSource::from_fields(
            "expected_out",
            self.expected_out.clone(),
            self.expected_out_path.clone(),
        )?;

        Ok(submission)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportError {
    pub kind: String,
    pub message: String,
}

/// Result of a job, stored in Redis and sent to the callback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeReport {
    pub request_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Verdict>,
    /// Program output, custom runs only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReportError>,
}

impl JudgeReport {
    pub fn verdict(request_id: Uuid, status: Verdict, output: Option<String>) -> Self {
        Self {
            request_id,
            status: Some(status),
            output,
            error: None,
        }
    }

    pub fn failure(request_id: Uuid, error: &JudgeError) -> Self {
        Self {
            request_id,
            status: None,
            output: None,
            error: Some(ReportError {
                kind: error.kind().to_string(),
                message: error_chain(error),
            }),
        }
    }
}

/// `error: cause: cause...`
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Judge one job and build its report; never fails
pub async fn process_job(judge: &Judge, job: &WorkerJob) -> JudgeReport {
    let request = job.request();
    info!(
        "Received {:?} job: request_id={}, language={}",
        job.mode(),
        request.request_id,
        request.language
    );

    let result = match request.to_submission() {
        Ok(submission) => match job.mode() {
            RunMode::Graded => judge
                .graded_run(&submission)
                .await
                .map(|verdict| JudgeReport::verdict(request.request_id, verdict, None)),
            RunMode::Custom => judge.custom_run(&submission).await.map(|outcome| {
                JudgeReport::verdict(request.request_id, outcome.verdict, Some(outcome.output))
            }),
        },
        Err(e) => Err(e),
    };

    result.unwrap_or_else(|e| JudgeReport::failure(request.request_id, &e))
}

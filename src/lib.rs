//! Judger - sandboxed code judging
//!
//! Compiles and runs untrusted submissions inside pooled docker sandboxes and
//! classifies each run into a verdict.

pub mod callback;
pub mod config;
pub mod core;
pub mod jobs;
pub mod judger;
pub mod languages;
pub mod redis_manager;
pub mod runner;
pub mod sandbox;
pub mod submission;
pub mod workspace;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::core::{JudgeError, Verdict};
pub use crate::judger::{CustomRunOutcome, Judge};
pub use crate::submission::{RunMode, Submission};

//! Core types shared by the judge, the worker and the delivery boundary

pub mod classifier;
pub mod error;
pub mod verdict;

pub use error::JudgeError;
pub use verdict::Verdict;

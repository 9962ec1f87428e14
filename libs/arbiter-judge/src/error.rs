//! Error taxonomy for the judging pipeline
//!
//! Caller-input errors (`UnsupportedLanguage`, `ArityMismatch`, `NoTestCases`) are
//! raised before anything reaches the engine. `SubmissionFailed` and `PollTimeout`
//! are infrastructure failures; retry the whole batch, never a subset.
//! `ReferenceSolutionFailed` is a domain verdict reported to the problem author.

use arbiter_common::types::{ExecutionResult, TestVerdict, TrackingToken};
use thiserror::Error;

/// Failures talking to the execution engine
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("engine unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("engine returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed engine response: {0}")]
    Malformed(String),
    #[error("engine rejected request {index}: {reason}")]
    Rejected { index: usize, reason: String },
}

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Language {0} is not supported")]
    UnsupportedLanguage(String),

    /// `what` names the side being counted: "inputs" before a run, "results" after
    #[error("got {got} {what} but {expected} expected outputs")]
    ArityMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("no test cases supplied")]
    NoTestCases,

    #[error("batch submission failed: {0}")]
    SubmissionFailed(#[source] EngineError),

    #[error(
        "timed out waiting for results: {} finished, {} still pending",
        .completed.len(),
        .pending.len()
    )]
    PollTimeout {
        completed: Vec<ExecutionResult>,
        pending: Vec<TrackingToken>,
    },

    #[error("{}", describe_reference_failure(.language, .first_failure_index))]
    ReferenceSolutionFailed {
        language: String,
        first_failure_index: Option<usize>,
        failure: Option<Box<TestVerdict>>,
    },
}

fn describe_reference_failure(language: &str, index: &Option<usize>) -> String {
    match index {
        Some(idx) => format!("Testcase {} failed for language {}", idx + 1, language),
        None => format!("Reference solution for language {} produced no passing tests", language),
    }
}

impl JudgeError {
    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            JudgeError::UnsupportedLanguage(_) => "unsupported_language",
            JudgeError::ArityMismatch { .. } => "arity_mismatch",
            JudgeError::NoTestCases => "no_test_cases",
            JudgeError::SubmissionFailed(_) => "submission_failed",
            JudgeError::PollTimeout { .. } => "poll_timeout",
            JudgeError::ReferenceSolutionFailed { .. } => "reference_solution_failed",
        }
    }

    /// Rejected before any network call; fix the request instead of retrying
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            JudgeError::UnsupportedLanguage(_)
                | JudgeError::ArityMismatch { .. }
                | JudgeError::NoTestCases
        )
    }

    /// Safe to resubmit the entire batch
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JudgeError::SubmissionFailed(_) | JudgeError::PollTimeout { .. }
        )
    }
}

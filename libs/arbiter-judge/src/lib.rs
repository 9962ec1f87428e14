//! Judging pipeline on top of a remote execution engine.
//!
//! `language` resolves names to engine ids, `batcher` submits, `poller`
//! collects, `evaluator` judges and `validator` gates problem definitions.
//! `Judge` in `executor` ties them together for callers.

pub mod batcher;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod language;
pub mod poller;
pub mod validator;

#[cfg(test)]
mod testing;

pub use engine::{ExecutionEngine, Judge0Engine};
pub use error::{EngineError, JudgeError};
pub use executor::{Judge, RunRequest};
pub use poller::PollConfig;
pub use validator::{LanguageReport, ValidationReport, ValidationState};

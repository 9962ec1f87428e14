/// Job Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Wire language registry, batcher, poller and evaluator into one pipeline.
///
/// **Architecture:**
/// 1. Resolve the language id (language.rs)
/// 2. Submit one request per input (batcher.rs)
/// 3. Poll until terminal (poller.rs)
/// 4. Judge against expected outputs (evaluator.rs)
///
/// This module is the glue layer - it knows nothing about:
/// - How requests reach the engine (engine's job)
/// - How outputs are compared (evaluator's job)

use crate::engine::{ExecutionEngine, Judge0Engine};
use crate::error::{EngineError, JudgeError};
use crate::poller::PollConfig;
use crate::validator::{self, ValidationReport};
use crate::{batcher, evaluator, language, poller};
use arbiter_common::config::Config;
use arbiter_common::types::{BatchVerdict, LanguageId, ProblemDefinition};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};

/// Inbound request to run user code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    #[serde(alias = "sourceCode")]
    pub source_code: String,
    #[serde(alias = "languageName")]
    pub language: String,
    pub stdin: Vec<String>,
    #[serde(alias = "expectedOutputs")]
    pub expected_outputs: Vec<String>,
}

/// Run one program over all inputs and judge the outputs
///
/// Input shape is checked before anything is sent to the engine.
#[instrument(skip(engine, poll, source_code, inputs, expected_outputs), fields(language_id = %language_id, tests = inputs.len()))]
pub async fn execute<E>(
    engine: &E,
    poll: &PollConfig,
    source_code: &str,
    language_id: LanguageId,
    inputs: &[String],
    expected_outputs: &[String],
) -> Result<BatchVerdict, JudgeError>
where
    E: ExecutionEngine + ?Sized,
{
    if inputs.len() != expected_outputs.len() {
        return Err(JudgeError::ArityMismatch {
            what: "inputs",
            got: inputs.len(),
            expected: expected_outputs.len(),
        });
    }
    if inputs.is_empty() {
        return Err(JudgeError::NoTestCases);
    }

    let tokens = batcher::submit(engine, source_code, language_id, inputs).await?;
    let results = poller::collect(engine, &tokens, poll).await?;
    let verdict = evaluator::judge(&results, expected_outputs)?;

    info!(
        status = verdict.status_label(),
        passed = verdict.passed_count,
        total = verdict.total,
        avg_time = verdict.avg_time,
        avg_memory = verdict.avg_memory,
        "Batch judged"
    );

    Ok(verdict)
}

/// Entry point used by the API and CLI
///
/// Holds no per-call state; clones share the engine's connection pool.
#[derive(Clone)]
pub struct Judge {
    engine: Arc<dyn ExecutionEngine>,
    poll: PollConfig,
}

impl Judge {
    pub fn new(engine: Arc<dyn ExecutionEngine>, poll: PollConfig) -> Self {
        Self { engine, poll }
    }

    /// Judge0 engine and polling settings taken from config
    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        let engine = Judge0Engine::from_config(config)?;
        Ok(Self::new(Arc::new(engine), PollConfig::from(&config.poll)))
    }

    pub fn poll_config(&self) -> &PollConfig {
        &self.poll
    }

    /// Run user code against input/expected-output pairs
    pub async fn run(&self, request: &RunRequest) -> Result<BatchVerdict, JudgeError> {
        let language_id = language::resolve(&request.language)?;
        execute(
            self.engine.as_ref(),
            &self.poll,
            &request.source_code,
            language_id,
            &request.stdin,
            &request.expected_outputs,
        )
        .await
    }

    /// Check every reference solution of a problem
    pub async fn validate(
        &self,
        problem: &ProblemDefinition,
    ) -> Result<ValidationReport, JudgeError> {
        validator::validate(self.engine.as_ref(), &self.poll, problem).await
    }
}

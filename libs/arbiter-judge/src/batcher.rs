/// Submission Batcher
///
/// Turns (program, language, inputs) into one execution request per input and
/// submits them in a single engine call. Token order matches input order; the
/// evaluator relies on that positional correspondence.

use crate::engine::ExecutionEngine;
use crate::error::{EngineError, JudgeError};
use arbiter_common::types::{ExecutionRequest, LanguageId, TrackingToken};
use std::collections::HashSet;
use tracing::{error, info, instrument};

/// Build one request per input, preserving input order
pub fn build_requests(
    source_code: &str,
    language_id: LanguageId,
    inputs: &[String],
) -> Vec<ExecutionRequest> {
    inputs
        .iter()
        .map(|input| ExecutionRequest {
            source_code: source_code.to_string(),
            language_id,
            stdin: input.clone(),
            expected_output: None,
        })
        .collect()
}

/// Submit the whole batch; all tokens or an error, never a partial list
#[instrument(skip(engine, source_code, inputs), fields(language_id = %language_id, batch_size = inputs.len()))]
pub async fn submit<E>(
    engine: &E,
    source_code: &str,
    language_id: LanguageId,
    inputs: &[String],
) -> Result<Vec<TrackingToken>, JudgeError>
where
    E: ExecutionEngine + ?Sized,
{
    if inputs.is_empty() {
        return Err(JudgeError::NoTestCases);
    }

    let requests = build_requests(source_code, language_id, inputs);

    let tokens = engine.submit_batch(&requests).await.map_err(|e| {
        error!(error = %e, "Batch submission failed");
        JudgeError::SubmissionFailed(e)
    })?;

    if tokens.len() != requests.len() {
        error!(
            requested = requests.len(),
            returned = tokens.len(),
            "Engine returned wrong number of tokens"
        );
        return Err(JudgeError::SubmissionFailed(EngineError::Malformed(format!(
            "expected {} tokens, got {}",
            requests.len(),
            tokens.len()
        ))));
    }

    let unique: HashSet<&TrackingToken> = tokens.iter().collect();
    if unique.len() != tokens.len() {
        return Err(JudgeError::SubmissionFailed(EngineError::Malformed(
            "engine returned duplicate tokens within one batch".to_string(),
        )));
    }

    info!(tokens = tokens.len(), "Batch accepted by engine");
    Ok(tokens)
}

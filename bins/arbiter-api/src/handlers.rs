// HTTP route handlers for the Arbiter API

use arbiter_common::types::{ProblemDefinition, RunRecord, RunStatus};
use arbiter_judge::{language, JudgeError, RunRequest};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::metrics;
use crate::AppState;

/// HTTP status for each failure kind
pub fn status_for(err: &JudgeError) -> StatusCode {
    match err {
        JudgeError::UnsupportedLanguage(_)
        | JudgeError::ArityMismatch { .. }
        | JudgeError::NoTestCases
        | JudgeError::ReferenceSolutionFailed { .. } => StatusCode::BAD_REQUEST,
        JudgeError::SubmissionFailed(_) => StatusCode::BAD_GATEWAY,
        JudgeError::PollTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
    }
}

/// JSON error body; diagnostics ride along for reference failures and timeouts
pub fn error_body(err: &JudgeError) -> Value {
    let mut body = json!({
        "error": err.to_string(),
        "kind": err.kind(),
        "retryable": err.is_retryable(),
    });

    match err {
        JudgeError::ReferenceSolutionFailed {
            language,
            first_failure_index,
            failure,
        } => {
            body["details"] = json!({
                "language": language,
                "testcase": first_failure_index.map(|i| i + 1),
                "failure": failure,
            });
        }
        JudgeError::PollTimeout { completed, pending } => {
            body["details"] = json!({
                "completed": completed,
                "pending": pending,
            });
        }
        _ => {}
    }

    body
}

fn error_response(err: &JudgeError, run_id: Option<Uuid>) -> Response {
    let mut body = error_body(err);
    if let Some(id) = run_id {
        body["run_id"] = json!(id);
    }
    (status_for(err), Json(body)).into_response()
}

/// Metric label for a judged run; errors are labelled with their kind
fn run_outcome(status: RunStatus) -> &'static str {
    match status {
        RunStatus::Accepted => "accepted",
        RunStatus::WrongAnswer => "wrong_answer",
        RunStatus::Unknown => "unknown",
        RunStatus::Failed => "failed",
    }
}

/// Infrastructure failures are recorded so `/runs/{id}` can report them.
/// Caller errors never got a run: no record and no run id.
fn record_for_error(run_id: Uuid, language: &str, err: &JudgeError) -> Option<RunRecord> {
    let status = match err {
        JudgeError::PollTimeout { .. } => RunStatus::Unknown,
        JudgeError::SubmissionFailed(_) => RunStatus::Failed,
        _ => return None,
    };
    Some(RunRecord::from_error(run_id, language, status, err.to_string()))
}

async fn persist(state: &AppState, record: &RunRecord) {
    if let Err(e) = state.store.save(record).await {
        // The caller still gets the verdict inline
        error!(run_id = %record.run_id, error = %e, "Failed to store run record");
    }
}

/// POST /execute-code - Run user code against input/expected-output pairs
pub async fn execute_code(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RunRequest>,
) -> Response {
    let run_id = Uuid::new_v4();

    let timer = metrics::RUN_DURATION.start_timer();
    let result = state.judge.run(&payload).await;
    timer.observe_duration();

    match result {
        Ok(verdict) => {
            let record = RunRecord::from_verdict(run_id, &payload.language, verdict);
            metrics::RUNS_TOTAL
                .with_label_values(&[run_outcome(record.status)])
                .inc();
            persist(&state, &record).await;

            info!(
                run_id = %run_id,
                language = %payload.language,
                status = ?record.status,
                "Run judged"
            );

            (
                StatusCode::OK,
                Json(json!({
                    "run_id": run_id,
                    "status": record.status,
                    "verdict": record.verdict,
                })),
            )
                .into_response()
        }
        Err(e) => {
            metrics::RUNS_TOTAL.with_label_values(&[e.kind()]).inc();

            match record_for_error(run_id, &payload.language, &e) {
                Some(record) => {
                    persist(&state, &record).await;
                    error!(run_id = %run_id, error = %e, "Run failed");
                    error_response(&e, Some(run_id))
                }
                None => {
                    warn!(language = %payload.language, error = %e, "Run rejected");
                    error_response(&e, None)
                }
            }
        }
    }
}

/// POST /problems/validate - Check every reference solution of a problem
pub async fn validate_problem(
    State(state): State<Arc<AppState>>,
    Json(problem): Json<ProblemDefinition>,
) -> Response {
    match state.judge.validate(&problem).await {
        Ok(report) => {
            metrics::VALIDATIONS_TOTAL
                .with_label_values(&["accepted"])
                .inc();
            info!(languages = report.languages.len(), "Problem validated");

            (
                StatusCode::OK,
                Json(json!({
                    "accepted": true,
                    "state": report.state,
                    "languages": report.languages,
                })),
            )
                .into_response()
        }
        Err(e) => {
            let outcome = match &e {
                JudgeError::ReferenceSolutionFailed { .. } => "rejected",
                other => other.kind(),
            };
            metrics::VALIDATIONS_TOTAL.with_label_values(&[outcome]).inc();
            warn!(error = %e, "Problem validation failed");

            let mut body = error_body(&e);
            body["accepted"] = json!(false);
            (status_for(&e), Json(body)).into_response()
        }
    }
}

/// GET /runs/{run_id} - Fetch a stored run record
pub async fn get_run(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Response {
    let run_uuid = match Uuid::parse_str(&run_id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid run ID format" })),
            )
                .into_response();
        }
    };

    match state.store.load(&run_uuid).await {
        Ok(Some(record)) => {
            info!(run_id = %run_id, status = ?record.status, "Run record retrieved");
            (StatusCode::OK, Json(record)).into_response()
        }
        Ok(None) => {
            // Runs are judged inline, so a missing record is unknown or expired
            (
                StatusCode::NOT_FOUND,
                Json(json!({
                    "run_id": run_id,
                    "error": "Run not found",
                })),
            )
                .into_response()
        }
        Err(e) => {
            error!(run_id = %run_id, error = %e, "Failed to fetch run record");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("Failed to query run: {}", e) })),
            )
                .into_response()
        }
    }
}

/// GET /languages - Supported language names and engine ids
pub async fn list_languages() -> impl IntoResponse {
    Json(json!({ "languages": language::supported() }))
}

/// GET /health - Liveness check
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus exposition
pub async fn export_metrics() -> Response {
    match metrics::render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

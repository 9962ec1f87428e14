/// Verdict Aggregator - Language-Agnostic Judging
///
/// **Core Responsibility:**
/// Compare terminal engine results against expected outputs and reduce them
/// into one batch verdict.
///
/// **Critical Properties:**
/// - Knows nothing about HTTP or the engine's wire format
/// - Knows nothing about polling
/// - Pure function: (results, expected outputs) → verdict
///
/// **Per-test rule, in priority order:**
/// 1. Non-success terminal status → failed; compile output and stderr are kept verbatim
/// 2. Otherwise trimmed stdout must equal trimmed expected output
///
/// **Normalization Rules:**
/// - Trim leading and trailing whitespace: YES
/// - Line endings at either end (\n vs \r\n): YES (via trim)
/// - Internal whitespace: NO
/// - Case sensitivity: YES (exact match required)
/// - Numeric equivalence ("5" vs "05"): NO

use crate::error::JudgeError;
use arbiter_common::types::{BatchVerdict, ExecutionResult, TestVerdict};
use tracing::debug;

fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Judge a single test
pub fn evaluate_test(index: usize, result: &ExecutionResult, expected: &str) -> TestVerdict {
    let status = result.status.kind();

    let passed = status.is_success()
        && normalize_output(result.stdout.as_deref().unwrap_or_default())
            == normalize_output(expected);

    TestVerdict {
        index,
        passed,
        status,
        status_description: result.status.description.clone(),
        stdout: result.stdout.clone(),
        expected: expected.to_string(),
        stderr: result.stderr.clone(),
        compile_output: result.compile_output.clone(),
        time: result.time,
        memory: result.memory,
    }
}

/// Fold per-test verdicts into a batch verdict
///
/// An empty list is never "all passed".
pub fn aggregate(test_verdicts: Vec<TestVerdict>) -> BatchVerdict {
    let total = test_verdicts.len();
    let passed_count = test_verdicts.iter().filter(|v| v.passed).count();
    let first_failure_index = test_verdicts.iter().position(|v| !v.passed);

    let avg_time = mean(test_verdicts.iter().filter_map(|v| v.time));
    let avg_memory = mean(test_verdicts.iter().filter_map(|v| v.memory.map(|m| m as f64)));

    BatchVerdict {
        all_passed: total > 0 && first_failure_index.is_none(),
        passed_count,
        total,
        first_failure_index,
        avg_time,
        avg_memory,
        test_verdicts,
    }
}

/// Judge a batch of terminal results against expected outputs
///
/// `results[i]` is judged against `expected_outputs[i]`.
pub fn judge(
    results: &[ExecutionResult],
    expected_outputs: &[String],
) -> Result<BatchVerdict, JudgeError> {
    if results.len() != expected_outputs.len() {
        return Err(JudgeError::ArityMismatch {
            what: "results",
            got: results.len(),
            expected: expected_outputs.len(),
        });
    }

    let verdicts: Vec<TestVerdict> = results
        .iter()
        .zip(expected_outputs)
        .enumerate()
        .map(|(idx, (result, expected))| {
            let verdict = evaluate_test(idx, result, expected);
            debug!(
                test = idx + 1,
                status = %verdict.status_description,
                passed = verdict.passed,
                "Test judged"
            );
            verdict
        })
        .collect();

    Ok(aggregate(verdicts))
}

/// Arithmetic mean rounded to 3 decimals; 0 when there is nothing to average
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        return 0.0;
    }
    round3(sum / count as f64)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

// CLI commands for running code and validating problems
use anyhow::{bail, Context, Result};
use arbiter_common::config::Config;
use arbiter_common::types::{BatchVerdict, ProblemDefinition, TestCase, TestVerdict};
use arbiter_judge::{language, Judge, JudgeError, RunRequest};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::EngineArgs;

/// Environment config with command-line overrides applied
fn build_config(args: &EngineArgs) -> Result<Config> {
    let config = Config::from_env().context("Invalid configuration in environment")?;
    apply_overrides(config, args)
}

fn apply_overrides(mut config: Config, args: &EngineArgs) -> Result<Config> {
    if let Some(url) = &args.engine_url {
        config.engine_url = url.trim_end_matches('/').to_string();
    }
    if let Some(token) = &args.auth_token {
        config.engine_auth_token = Some(token.clone());
    }
    if let Some(ms) = args.deadline_ms {
        config.poll.deadline = Duration::from_millis(ms);
    }
    if let Some(ms) = args.poll_interval_ms {
        if ms == 0 {
            bail!("--poll-interval-ms must be greater than zero");
        }
        config.poll.interval = Duration::from_millis(ms);
        config.poll.max_interval = config.poll.max_interval.max(config.poll.interval);
    }
    config.poll.validate().context("Invalid poll settings")?;
    Ok(config)
}

fn parse_test_cases(content: &str) -> Result<Vec<TestCase>> {
    let cases: Vec<TestCase> =
        serde_json::from_str(content).context("Failed to parse test cases")?;
    if cases.is_empty() {
        bail!("Test case file contains no test cases");
    }
    Ok(cases)
}

fn load_test_cases(path: &Path) -> Result<Vec<TestCase>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_test_cases(&content)
}

fn load_problem(path: &Path) -> Result<ProblemDefinition> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse problem definition {}", path.display()))
}

fn describe_test(verdict: &TestVerdict) -> Vec<String> {
    let number = verdict.index + 1;
    let stats = match (verdict.time, verdict.memory) {
        (Some(t), Some(m)) => format!(" ({:.3}s, {} KB)", t, m),
        (Some(t), None) => format!(" ({:.3}s)", t),
        _ => String::new(),
    };

    if verdict.passed {
        return vec![format!("  ✓ Test {} passed{}", number, stats)];
    }

    let mut lines = vec![format!(
        "  ✗ Test {} failed: {}{}",
        number, verdict.status_description, stats
    )];
    if let Some(compile) = verdict.compile_output.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("      compile output: {}", compile.trim_end()));
    } else {
        lines.push(format!("      expected: {:?}", verdict.expected.trim()));
        lines.push(format!(
            "      got:      {:?}",
            verdict.stdout.as_deref().unwrap_or_default().trim()
        ));
    }
    if let Some(stderr) = verdict.stderr.as_deref().filter(|s| !s.is_empty()) {
        lines.push(format!("      stderr: {}", stderr.trim_end()));
    }
    lines
}

/// Human-readable report of a batch verdict
fn format_verdict(verdict: &BatchVerdict) -> Vec<String> {
    let mut lines: Vec<String> = verdict.test_verdicts.iter().flat_map(describe_test).collect();
    lines.push(String::new());
    lines.push(format!(
        "{}: {}/{} passed (avg {:.3}s, {:.1} KB)",
        verdict.status_label(),
        verdict.passed_count,
        verdict.total,
        verdict.avg_time,
        verdict.avg_memory
    ));
    lines
}

/// Run a source file against test cases; returns whether every test passed
pub async fn run_code(
    args: &EngineArgs,
    language: &str,
    source_path: &str,
    tests_path: &str,
) -> Result<bool> {
    let source_code = fs::read_to_string(source_path)
        .with_context(|| format!("Failed to read {}", source_path))?;
    let cases = load_test_cases(Path::new(tests_path))?;

    let config = build_config(args)?;
    debug!(engine_url = %config.engine_url, "Using execution engine");
    let judge = Judge::from_config(&config).context("Failed to build engine client")?;

    println!("🚀 Running {} against {} test case(s)...\n", language, cases.len());

    let request = RunRequest {
        source_code,
        language: language.to_string(),
        stdin: cases.iter().map(|c| c.input.clone()).collect(),
        expected_outputs: cases.iter().map(|c| c.output.clone()).collect(),
    };

    let verdict = judge.run(&request).await?;
    for line in format_verdict(&verdict) {
        println!("{}", line);
    }

    Ok(verdict.all_passed)
}

/// Validate a problem definition file; returns whether it was accepted
pub async fn validate_problem(args: &EngineArgs, problem_path: &str) -> Result<bool> {
    let problem = load_problem(Path::new(problem_path))?;

    let config = build_config(args)?;
    let judge = Judge::from_config(&config).context("Failed to build engine client")?;

    println!(
        "🔍 Validating {} reference solution(s) against {} test case(s)...\n",
        problem.reference_solutions.len(),
        problem.testcases.len()
    );

    match judge.validate(&problem).await {
        Ok(report) => {
            for entry in &report.languages {
                println!(
                    "  ✅ {} ({} tests, avg {:.3}s)",
                    entry.language, entry.verdict.total, entry.verdict.avg_time
                );
            }
            println!("\n✅ Problem accepted");
            Ok(true)
        }
        Err(err @ JudgeError::ReferenceSolutionFailed { .. }) => {
            println!("❌ {}", err);
            if let JudgeError::ReferenceSolutionFailed {
                failure: Some(failure),
                ..
            } = &err
            {
                for line in describe_test(failure) {
                    println!("{}", line);
                }
            }
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

/// Print the language table
pub fn list_languages() {
    println!("📋 Supported Languages:\n");
    println!("{:<12} {:<10}", "NAME", "ENGINE ID");
    println!("{}", "─".repeat(24));
    for lang in language::supported() {
        println!("{:<12} {:<10}", lang.name, lang.id.0);
    }
    println!("\n✅ Total: {} language(s)", language::supported().len());
}

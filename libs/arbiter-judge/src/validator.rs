/// Reference Solution Validator
///
/// A problem is accepted only if every reference solution passes every test
/// case. Languages are checked one after another in the order the author
/// listed them; the first failing language stops the run.
///
/// ```text
/// Pending ──start(lang)──▶ Validating(lang) ──passed──▶ Validating(next) ... ──finish──▶ Accepted
///                                │
///                                └──failed(idx)──▶ RejectedAt(lang, idx)
/// ```
///
/// There is no retry here. A rejected problem is resubmitted as a new definition.

use crate::engine::ExecutionEngine;
use crate::error::JudgeError;
use crate::executor;
use crate::language;
use crate::poller::PollConfig;
use arbiter_common::types::{BatchVerdict, LanguageId, ProblemDefinition};
use serde::Serialize;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ValidationState {
    Pending,
    Validating {
        language: String,
    },
    Accepted,
    RejectedAt {
        language: String,
        first_failure_index: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationEvent {
    Start { language: String },
    Failed { first_failure_index: Option<usize> },
    Finish,
}

impl ValidationState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ValidationState::Accepted | ValidationState::RejectedAt { .. }
        )
    }

    /// Apply an event. Terminal states absorb everything; events that make no
    /// sense in the current state leave it unchanged.
    pub fn on(self, event: ValidationEvent) -> ValidationState {
        match (self, event) {
            (state, _) if state.is_terminal() => state,
            (ValidationState::Pending | ValidationState::Validating { .. }, ValidationEvent::Start { language }) => {
                ValidationState::Validating { language }
            }
            (ValidationState::Validating { language }, ValidationEvent::Failed { first_failure_index }) => {
                ValidationState::RejectedAt {
                    language,
                    first_failure_index,
                }
            }
            (ValidationState::Pending | ValidationState::Validating { .. }, ValidationEvent::Finish) => {
                ValidationState::Accepted
            }
            (state, _) => state,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageReport {
    pub language: String,
    pub language_id: LanguageId,
    pub verdict: BatchVerdict,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub state: ValidationState,
    pub languages: Vec<LanguageReport>,
}

/// Validate every reference solution of a problem
///
/// Language names and test-case presence are checked before the first engine
/// call, so a bad definition never costs a batch.
#[instrument(skip(engine, poll, problem), fields(languages = problem.reference_solutions.len(), tests = problem.testcases.len()))]
pub async fn validate<E>(
    engine: &E,
    poll: &PollConfig,
    problem: &ProblemDefinition,
) -> Result<ValidationReport, JudgeError>
where
    E: ExecutionEngine + ?Sized,
{
    let resolved = problem
        .reference_solutions
        .iter()
        .map(|solution| language::resolve(&solution.language).map(|id| (solution, id)))
        .collect::<Result<Vec<_>, _>>()?;

    if problem.testcases.is_empty() {
        return Err(JudgeError::NoTestCases);
    }
    if resolved.is_empty() {
        warn!("Problem declares no reference solutions; nothing to validate");
    }

    let inputs = problem.inputs();
    let expected = problem.expected_outputs();

    let mut state = ValidationState::Pending;
    let mut languages = Vec::with_capacity(resolved.len());

    for (solution, language_id) in resolved {
        state = state.on(ValidationEvent::Start {
            language: solution.language.clone(),
        });
        info!(language = %solution.language, "Validating reference solution");

        let verdict = executor::execute(
            engine,
            poll,
            &solution.source_code,
            language_id,
            &inputs,
            &expected,
        )
        .await?;

        if !verdict.all_passed {
            state = state.on(ValidationEvent::Failed {
                first_failure_index: verdict.first_failure_index,
            });
            warn!(
                language = %solution.language,
                first_failure = ?verdict.first_failure_index.map(|i| i + 1),
                ?state,
                "Reference solution rejected"
            );
            return Err(JudgeError::ReferenceSolutionFailed {
                language: solution.language.clone(),
                first_failure_index: verdict.first_failure_index,
                failure: verdict.first_failure().cloned().map(Box::new),
            });
        }

        languages.push(LanguageReport {
            language: solution.language.clone(),
            language_id,
            verdict,
        });
    }

    state = state.on(ValidationEvent::Finish);
    info!(languages = languages.len(), "Problem accepted");

    Ok(ValidationReport { state, languages })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{accepted, compile_error, runtime_error, ScriptedEngine};
    use arbiter_common::types::{ReferenceSolution, TestCase};

    fn problem(solutions: &[(&str, &str)], cases: &[(&str, &str)]) -> ProblemDefinition {
        ProblemDefinition {
            reference_solutions: solutions
                .iter()
                .map(|(language, code)| ReferenceSolution {
                    language: language.to_string(),
                    source_code: code.to_string(),
                })
                .collect(),
            testcases: cases
                .iter()
                .map(|(input, output)| TestCase {
                    input: input.to_string(),
                    output: output.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_state_machine_happy_path() {
        let state = ValidationState::Pending
            .on(ValidationEvent::Start { language: "PYTHON".into() })
            .on(ValidationEvent::Start { language: "JAVA".into() })
            .on(ValidationEvent::Finish);
        assert_eq!(state, ValidationState::Accepted);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_state_machine_rejection_is_absorbing() {
        let state = ValidationState::Pending
            .on(ValidationEvent::Start { language: "PYTHON".into() })
            .on(ValidationEvent::Failed { first_failure_index: Some(2) })
            .on(ValidationEvent::Start { language: "JAVA".into() })
            .on(ValidationEvent::Finish);
        assert_eq!(
            state,
            ValidationState::RejectedAt {
                language: "PYTHON".into(),
                first_failure_index: Some(2)
            }
        );
    }

    #[test]
    fn test_failure_before_start_is_ignored() {
        let state = ValidationState::Pending.on(ValidationEvent::Failed { first_failure_index: None });
        assert_eq!(state, ValidationState::Pending);
    }

    #[tokio::test]
    async fn test_all_languages_pass() {
        let engine = ScriptedEngine::echo();
        let def = problem(
            &[("PYTHON", "py"), ("JAVASCRIPT", "js"), ("JAVA", "java")],
            &[("1", "1"), ("2", "2\n")],
        );

        let report = validate(&engine, &PollConfig::default(), &def).await.unwrap();

        assert_eq!(report.state, ValidationState::Accepted);
        let order: Vec<&str> = report.languages.iter().map(|l| l.language.as_str()).collect();
        assert_eq!(order, vec!["PYTHON", "JAVASCRIPT", "JAVA"]);
        assert!(report.languages.iter().all(|l| l.verdict.all_passed));
        assert_eq!(engine.submissions().len(), 3);
    }

    #[tokio::test]
    async fn test_fails_fast_on_first_bad_language() {
        // JAVASCRIPT solution crashes on the second test
        let engine = ScriptedEngine::new(|request, _| {
            if request.source_code == "js" && request.stdin == "2" {
                runtime_error("TypeError: x is undefined")
            } else {
                accepted(&request.stdin, 0.01, 100)
            }
        });
        let def = problem(
            &[("PYTHON", "py"), ("JAVASCRIPT", "js"), ("JAVA", "java")],
            &[("1", "1"), ("2", "2"), ("3", "3")],
        );

        let err = validate(&engine, &PollConfig::default(), &def).await.unwrap_err();

        match &err {
            JudgeError::ReferenceSolutionFailed {
                language,
                first_failure_index,
                failure,
            } => {
                assert_eq!(language, "JAVASCRIPT");
                assert_eq!(*first_failure_index, Some(1));
                let failure = failure.as_ref().unwrap();
                assert_eq!(failure.stderr.as_deref(), Some("TypeError: x is undefined"));
            }
            other => panic!("expected ReferenceSolutionFailed, got {:?}", other),
        }
        assert_eq!(err.to_string(), "Testcase 2 failed for language JAVASCRIPT");
        // JAVA never submitted
        assert_eq!(engine.submissions().len(), 2);
    }

    #[tokio::test]
    async fn test_first_language_in_author_order_is_reported() {
        let engine = ScriptedEngine::new(|_, _| compile_error("nope"));
        let def = problem(&[("JAVA", "a"), ("PYTHON", "b")], &[("1", "1")]);

        let err = validate(&engine, &PollConfig::default(), &def).await.unwrap_err();
        assert!(matches!(err, JudgeError::ReferenceSolutionFailed { ref language, .. } if language == "JAVA"));
    }

    #[tokio::test]
    async fn test_unsupported_language_rejected_before_any_submission() {
        let engine = ScriptedEngine::echo();
        let def = problem(&[("PYTHON", "py"), ("COBOL", "cob")], &[("1", "1")]);

        let err = validate(&engine, &PollConfig::default(), &def).await.unwrap_err();

        assert!(matches!(err, JudgeError::UnsupportedLanguage(ref l) if l == "COBOL"));
        assert!(engine.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_no_testcases_rejected() {
        let engine = ScriptedEngine::echo();
        let def = problem(&[("PYTHON", "py")], &[]);

        let err = validate(&engine, &PollConfig::default(), &def).await.unwrap_err();
        assert!(matches!(err, JudgeError::NoTestCases));
        assert!(engine.submissions().is_empty());
    }

    #[tokio::test]
    async fn test_no_reference_solutions_is_vacuously_accepted() {
        let engine = ScriptedEngine::echo();
        let def = problem(&[], &[("1", "1")]);

        let report = validate(&engine, &PollConfig::default(), &def).await.unwrap();
        assert_eq!(report.state, ValidationState::Accepted);
        assert!(report.languages.is_empty());
    }

    #[tokio::test]
    async fn test_infrastructure_failure_propagates() {
        let engine = ScriptedEngine::echo().failing_submit("engine down");
        let def = problem(&[("PYTHON", "py")], &[("1", "1")]);

        let err = validate(&engine, &PollConfig::default(), &def).await.unwrap_err();
        assert!(matches!(err, JudgeError::SubmissionFailed(_)));
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Numeric language identifier understood by the execution engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LanguageId(pub u32);

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle the engine hands back for one submitted request.
/// Only meaningful within the batch that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingToken(String);

impl TrackingToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One unit of work for the execution engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub source_code: String,
    pub language_id: LanguageId,
    pub stdin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

/// Status block as reported by the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub id: u32,
    pub description: String,
}

impl EngineStatus {
    pub fn new(id: u32, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
        }
    }

    pub fn kind(&self) -> StatusKind {
        StatusKind::classify(self.id, &self.description)
    }
}

/// Engine status classification
///
/// Ids follow the Judge0 status table:
/// 1 In Queue, 2 Processing, 3 Accepted, 4 Wrong Answer, 5 Time Limit Exceeded,
/// 6 Compilation Error, 7-12 Runtime Error (by signal), 13 Internal Error,
/// 14 Exec Format Error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    InQueue,
    Processing,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    CompilationError,
    RuntimeError,
    InternalError,
    ExecFormatError,
}

impl StatusKind {
    pub fn classify(id: u32, description: &str) -> Self {
        match id {
            1 => StatusKind::InQueue,
            2 => StatusKind::Processing,
            3 => StatusKind::Accepted,
            4 => StatusKind::WrongAnswer,
            5 => StatusKind::TimeLimitExceeded,
            6 => StatusKind::CompilationError,
            7..=12 => StatusKind::RuntimeError,
            13 => StatusKind::InternalError,
            14 => StatusKind::ExecFormatError,
            // Engines that extend the table report MLE under their own id
            _ if description.eq_ignore_ascii_case("memory limit exceeded") => {
                StatusKind::MemoryLimitExceeded
            }
            _ => StatusKind::InternalError,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, StatusKind::InQueue | StatusKind::Processing)
    }

    pub fn is_terminal(self) -> bool {
        !self.is_pending()
    }

    pub fn is_success(self) -> bool {
        self == StatusKind::Accepted
    }
}

/// Per-request outcome as reported by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub token: TrackingToken,
    pub status: EngineStatus,
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    /// Wall time in seconds
    #[serde(default)]
    pub time: Option<f64>,
    /// Peak memory in KB
    #[serde(default)]
    pub memory: Option<u64>,
}

impl ExecutionResult {
    pub fn is_terminal(&self) -> bool {
        self.status.kind().is_terminal()
    }
}

/// Judgment for a single test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestVerdict {
    pub index: usize,
    pub passed: bool,
    pub status: StatusKind,
    pub status_description: String,
    pub stdout: Option<String>,
    pub expected: String,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub time: Option<f64>,
    pub memory: Option<u64>,
}

/// Judgment for a whole batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchVerdict {
    pub all_passed: bool,
    pub passed_count: usize,
    pub total: usize,
    pub first_failure_index: Option<usize>,
    pub avg_time: f64,
    pub avg_memory: f64,
    pub test_verdicts: Vec<TestVerdict>,
}

impl BatchVerdict {
    pub fn status_label(&self) -> &'static str {
        if self.all_passed {
            "Accepted"
        } else {
            "Wrong Answer"
        }
    }

    pub fn first_failure(&self) -> Option<&TestVerdict> {
        self.first_failure_index
            .and_then(|idx| self.test_verdicts.get(idx))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub output: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSolution {
    pub language: String,
    pub source_code: String,
}

/// The parts of a problem the validator cares about.
///
/// `reference_solutions` keeps the key order of the incoming JSON object, which
/// decides which language gets reported when several would fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemDefinition {
    #[serde(alias = "referenceSolutions", with = "ordered_solutions")]
    pub reference_solutions: Vec<ReferenceSolution>,
    pub testcases: Vec<TestCase>,
}

impl ProblemDefinition {
    pub fn inputs(&self) -> Vec<String> {
        self.testcases.iter().map(|tc| tc.input.clone()).collect()
    }

    pub fn expected_outputs(&self) -> Vec<String> {
        self.testcases.iter().map(|tc| tc.output.clone()).collect()
    }
}

mod ordered_solutions {
    use super::ReferenceSolution;
    use serde::de::{self, MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(
        solutions: &[ReferenceSolution],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(solutions.len()))?;
        for solution in solutions {
            map.serialize_entry(&solution.language, &solution.source_code)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<ReferenceSolution>, D::Error> {
        struct SolutionsVisitor;

        impl<'de> Visitor<'de> for SolutionsVisitor {
            type Value = Vec<ReferenceSolution>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of language name to reference solution source")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut solutions: Vec<ReferenceSolution> =
                    Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((language, source_code)) = access.next_entry::<String, String>()? {
                    if solutions.iter().any(|s| s.language == language) {
                        return Err(de::Error::custom(format!(
                            "duplicate reference solution for language {}",
                            language
                        )));
                    }
                    solutions.push(ReferenceSolution {
                        language,
                        source_code,
                    });
                }
                Ok(solutions)
            }
        }

        deserializer.deserialize_map(SolutionsVisitor)
    }
}

/// Outcome of a stored code run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Accepted,
    WrongAnswer,
    /// Polling gave up; the engine may still finish the jobs
    Unknown,
    Failed,
}

/// What the API persists for every code run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub language: String,
    pub status: RunStatus,
    pub verdict: Option<BatchVerdict>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn from_verdict(run_id: Uuid, language: impl Into<String>, verdict: BatchVerdict) -> Self {
        let status = if verdict.all_passed {
            RunStatus::Accepted
        } else {
            RunStatus::WrongAnswer
        };
        Self {
            run_id,
            language: language.into(),
            status,
            verdict: Some(verdict),
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn from_error(
        run_id: Uuid,
        language: impl Into<String>,
        status: RunStatus,
        error: impl Into<String>,
    ) -> Self {
        Self {
            run_id,
            language: language.into(),
            status,
            verdict: None,
            error: Some(error.into()),
            created_at: Utc::now(),
        }
    }
}

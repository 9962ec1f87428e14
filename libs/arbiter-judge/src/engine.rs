/// Execution Engine - Abstraction over the remote code runner
///
/// **Core Responsibility:**
/// Hand batches of execution requests to the engine and read back their status.
///
/// **Architectural Boundary:**
/// - Engine knows HOW to talk to the runner (HTTP, auth, wire encoding)
/// - Engine does NOT know scoring rules
/// - Engine does NOT decide when to stop polling
/// - Engine returns raw results for the poller and evaluator
///
/// Production uses `Judge0Engine`; tests swap in a scripted engine.

use crate::error::EngineError;
use arbiter_common::config::Config;
use arbiter_common::types::{EngineStatus, ExecutionRequest, ExecutionResult, TrackingToken};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::Client;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Fields requested on every status query
const STATUS_FIELDS: &str = "token,stdout,stderr,compile_output,status,time,memory";

#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    /// Submit all requests in one call. Tokens come back in request order.
    async fn submit_batch(
        &self,
        requests: &[ExecutionRequest],
    ) -> Result<Vec<TrackingToken>, EngineError>;

    /// Current status of the given tokens, in whatever order the engine likes
    async fn batch_status(
        &self,
        tokens: &[TrackingToken],
    ) -> Result<Vec<ExecutionResult>, EngineError>;
}

/// HTTP client for a Judge0-compatible engine
///
/// Text fields travel base64-encoded so arbitrary bytes in source, stdin and
/// program output survive the JSON round trip. Output that is not valid UTF-8
/// is decoded lossily and logged.
///
/// A batch goes out as one request. Judge0 caps batch size with
/// `MAX_SUBMISSION_BATCH_SIZE` (20 by default) and answers larger batches with
/// an HTTP error, surfaced as `EngineError::Status`. Deployments judging
/// problems with more test cases must raise that limit on the engine.
#[derive(Clone)]
pub struct Judge0Engine {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl Judge0Engine {
    pub fn new(
        base_url: impl Into<String>,
        auth_token: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, EngineError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, EngineError> {
        Self::new(
            config.engine_url.clone(),
            config.engine_auth_token.clone(),
            config.engine_request_timeout,
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn batch_url(&self) -> String {
        format!("{}/submissions/batch", self.base_url)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth_token {
            Some(token) => builder.header("X-Auth-Token", token),
            None => builder,
        }
    }

    async fn read_body(response: reqwest::Response) -> Result<String, EngineError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EngineError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl ExecutionEngine for Judge0Engine {
    async fn submit_batch(
        &self,
        requests: &[ExecutionRequest],
    ) -> Result<Vec<TrackingToken>, EngineError> {
        let body = SubmitBody {
            submissions: requests.iter().map(WireSubmission::from).collect(),
        };

        let response = self
            .authorize(self.client.post(self.batch_url()))
            .query(&[("base64_encoded", "true")])
            .json(&body)
            .send()
            .await?;
        let text = Self::read_body(response).await?;

        let entries: Vec<WireToken> = serde_json::from_str(&text)
            .map_err(|e| EngineError::Malformed(format!("batch submit response: {}", e)))?;

        debug!(requested = requests.len(), returned = entries.len(), "Batch submitted");

        entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| match entry.token {
                Some(token) => Ok(TrackingToken::new(token)),
                None => Err(EngineError::Rejected {
                    index,
                    reason: serde_json::Value::Object(entry.errors).to_string(),
                }),
            })
            .collect()
    }

    async fn batch_status(
        &self,
        tokens: &[TrackingToken],
    ) -> Result<Vec<ExecutionResult>, EngineError> {
        let joined = tokens
            .iter()
            .map(TrackingToken::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .authorize(self.client.get(self.batch_url()))
            .query(&[
                ("tokens", joined.as_str()),
                ("base64_encoded", "true"),
                ("fields", STATUS_FIELDS),
            ])
            .send()
            .await?;
        let text = Self::read_body(response).await?;

        let body: StatusBody = serde_json::from_str(&text)
            .map_err(|e| EngineError::Malformed(format!("batch status response: {}", e)))?;

        // Unknown tokens come back as null entries; the poller keeps them pending
        body.submissions
            .into_iter()
            .flatten()
            .map(WireResult::into_result)
            .collect()
    }
}

#[derive(Serialize)]
struct SubmitBody {
    submissions: Vec<WireSubmission>,
}

#[derive(Serialize)]
struct WireSubmission {
    source_code: String,
    language_id: u32,
    stdin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_output: Option<String>,
}

impl From<&ExecutionRequest> for WireSubmission {
    fn from(request: &ExecutionRequest) -> Self {
        Self {
            source_code: encode(&request.source_code),
            language_id: request.language_id.0,
            stdin: encode(&request.stdin),
            expected_output: request.expected_output.as_deref().map(encode),
        }
    }
}

#[derive(Deserialize)]
struct WireToken {
    token: Option<String>,
    #[serde(flatten)]
    errors: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct StatusBody {
    submissions: Vec<Option<WireResult>>,
}

#[derive(Deserialize)]
struct WireResult {
    token: String,
    status: EngineStatus,
    #[serde(default)]
    stdout: Option<String>,
    #[serde(default)]
    stderr: Option<String>,
    #[serde(default)]
    compile_output: Option<String>,
    #[serde(default, deserialize_with = "number_or_string")]
    time: Option<f64>,
    #[serde(default, deserialize_with = "number_or_string")]
    memory: Option<f64>,
}

impl WireResult {
    fn into_result(self) -> Result<ExecutionResult, EngineError> {
        Ok(ExecutionResult {
            token: TrackingToken::new(self.token),
            status: self.status,
            stdout: self.stdout.as_deref().map(decode).transpose()?,
            stderr: self.stderr.as_deref().map(decode).transpose()?,
            compile_output: self.compile_output.as_deref().map(decode).transpose()?,
            time: self.time,
            memory: self.memory.map(|kb| kb.round() as u64),
        })
    }
}

/// Judge0 reports `time` as a decimal string; accept either form
fn number_or_string<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s.trim().parse::<f64>().map(Some).map_err(de::Error::custom),
    }
}

fn encode(text: &str) -> String {
    general_purpose::STANDARD.encode(text)
}

fn decode(encoded: &str) -> Result<String, EngineError> {
    // Judge0 wraps base64 output at 60 columns
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| EngineError::Malformed(format!("invalid base64 field: {}", e)))?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(e) => {
            warn!(
                valid_up_to = e.utf8_error().valid_up_to(),
                "Engine output is not valid UTF-8; invalid bytes replaced with U+FFFD"
            );
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}

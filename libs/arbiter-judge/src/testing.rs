// In-memory engine for tests
// Responses are produced by a closure from (request, times this token was polled)

use crate::engine::ExecutionEngine;
use crate::error::EngineError;
use arbiter_common::types::{EngineStatus, ExecutionRequest, ExecutionResult, TrackingToken};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Engine-side state of one request at one poll
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub status: EngineStatus,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub compile_output: Option<String>,
    pub time: Option<f64>,
    pub memory: Option<u64>,
}

pub fn pending() -> Snapshot {
    with_status(2, "Processing")
}

pub fn accepted(stdout: &str, time: f64, memory: u64) -> Snapshot {
    Snapshot {
        stdout: Some(stdout.to_string()),
        time: Some(time),
        memory: Some(memory),
        ..with_status(3, "Accepted")
    }
}

pub fn compile_error(output: &str) -> Snapshot {
    Snapshot {
        compile_output: Some(output.to_string()),
        ..with_status(6, "Compilation Error")
    }
}

pub fn runtime_error(stderr: &str) -> Snapshot {
    Snapshot {
        stderr: Some(stderr.to_string()),
        time: Some(0.01),
        memory: Some(2048),
        ..with_status(11, "Runtime Error (NZEC)")
    }
}

pub fn with_status(id: u32, description: &str) -> Snapshot {
    Snapshot {
        status: EngineStatus::new(id, description),
        stdout: None,
        stderr: None,
        compile_output: None,
        time: None,
        memory: None,
    }
}

type Responder = dyn Fn(&ExecutionRequest, usize) -> Snapshot + Send + Sync;

pub struct ScriptedEngine {
    responder: Box<Responder>,
    requests: Mutex<HashMap<TrackingToken, ExecutionRequest>>,
    poll_counts: Mutex<HashMap<TrackingToken, usize>>,
    submissions: Mutex<Vec<Vec<ExecutionRequest>>>,
    status_calls: Mutex<Vec<Vec<TrackingToken>>>,
    next_token: AtomicUsize,
    submit_error: Option<String>,
    drop_last_token: bool,
    reversed: bool,
    failing_rounds: HashSet<usize>,
}

impl ScriptedEngine {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&ExecutionRequest, usize) -> Snapshot + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(HashMap::new()),
            poll_counts: Mutex::new(HashMap::new()),
            submissions: Mutex::new(Vec::new()),
            status_calls: Mutex::new(Vec::new()),
            next_token: AtomicUsize::new(0),
            submit_error: None,
            drop_last_token: false,
            reversed: false,
            failing_rounds: HashSet::new(),
        }
    }

    /// Every program behaves like `cat`
    pub fn echo() -> Self {
        Self::new(|request, _| accepted(&request.stdin, 0.002, 1024))
    }

    pub fn failing_submit(mut self, message: &str) -> Self {
        self.submit_error = Some(message.to_string());
        self
    }

    pub fn dropping_last_token(mut self) -> Self {
        self.drop_last_token = true;
        self
    }

    /// Answer status queries in reverse order
    pub fn reversed(mut self) -> Self {
        self.reversed = true;
        self
    }

    /// Fail the status calls with these zero-based call numbers
    pub fn failing_status_rounds(mut self, rounds: &[usize]) -> Self {
        self.failing_rounds = rounds.iter().copied().collect();
        self
    }

    pub fn submissions(&self) -> Vec<Vec<ExecutionRequest>> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn status_calls(&self) -> Vec<Vec<TrackingToken>> {
        self.status_calls.lock().unwrap().clone()
    }

    pub fn request_for(&self, token: &TrackingToken) -> Option<ExecutionRequest> {
        self.requests.lock().unwrap().get(token).cloned()
    }
}

#[async_trait]
impl ExecutionEngine for ScriptedEngine {
    async fn submit_batch(
        &self,
        requests: &[ExecutionRequest],
    ) -> Result<Vec<TrackingToken>, EngineError> {
        self.submissions.lock().unwrap().push(requests.to_vec());

        if let Some(message) = &self.submit_error {
            return Err(EngineError::Status {
                status: 503,
                body: message.clone(),
            });
        }

        let mut stored = self.requests.lock().unwrap();
        let mut tokens: Vec<TrackingToken> = requests
            .iter()
            .map(|request| {
                let n = self.next_token.fetch_add(1, Ordering::SeqCst);
                let token = TrackingToken::new(format!("tok-{}", n));
                stored.insert(token.clone(), request.clone());
                token
            })
            .collect();

        if self.drop_last_token {
            tokens.pop();
        }
        Ok(tokens)
    }

    async fn batch_status(
        &self,
        tokens: &[TrackingToken],
    ) -> Result<Vec<ExecutionResult>, EngineError> {
        let call = {
            let mut calls = self.status_calls.lock().unwrap();
            calls.push(tokens.to_vec());
            calls.len() - 1
        };
        if self.failing_rounds.contains(&call) {
            return Err(EngineError::Status {
                status: 500,
                body: "status backend unavailable".to_string(),
            });
        }

        let requests = self.requests.lock().unwrap();
        let mut counts = self.poll_counts.lock().unwrap();
        let mut results: Vec<ExecutionResult> = tokens
            .iter()
            .filter_map(|token| {
                let request = requests.get(token)?;
                let round = counts.entry(token.clone()).or_insert(0);
                let snapshot = (self.responder)(request, *round);
                *round += 1;
                Some(ExecutionResult {
                    token: token.clone(),
                    status: snapshot.status,
                    stdout: snapshot.stdout,
                    stderr: snapshot.stderr,
                    compile_output: snapshot.compile_output,
                    time: snapshot.time,
                    memory: snapshot.memory,
                })
            })
            .collect();

        if self.reversed {
            results.reverse();
        }
        Ok(results)
    }
}

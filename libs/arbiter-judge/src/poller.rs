/// Result Poller
///
/// Queries the engine for all outstanding tokens in one call per round, keeps
/// terminal results, and re-polls the rest with capped exponential backoff.
/// Rounds are sequential. The deadline (and optional attempt budget) is the
/// only way out besides every token finishing.
///
/// Results are slotted back by token, so the output follows the input token
/// order no matter how the engine orders its response.

use crate::engine::ExecutionEngine;
use crate::error::JudgeError;
use arbiter_common::config::PollSettings;
use arbiter_common::types::{ExecutionResult, TrackingToken};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    /// Wait after the first round
    pub poll_interval: Duration,
    /// Backoff ceiling
    pub max_interval: Duration,
    pub backoff_factor: f64,
    /// Hard stop, measured from the start of `collect`
    pub deadline: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig::from(&PollSettings::default())
    }
}

impl From<&PollSettings> for PollConfig {
    fn from(settings: &PollSettings) -> Self {
        Self {
            poll_interval: settings.interval,
            max_interval: settings.max_interval,
            backoff_factor: settings.backoff_factor,
            deadline: settings.deadline,
            max_attempts: settings.max_attempts,
        }
    }
}

/// Floor for every wait between rounds
const MIN_INTERVAL: Duration = Duration::from_millis(1);

impl PollConfig {
    /// Wait before the second round
    pub fn first_interval(&self) -> Duration {
        self.poll_interval.max(MIN_INTERVAL)
    }

    /// Backed-off wait, kept within `[poll_interval, max_interval]` when those
    /// are ordered and never below `poll_interval` when they are not
    pub fn next_interval(&self, current: Duration) -> Duration {
        let grown = Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor.max(1.0))
            .unwrap_or(self.max_interval);
        grown.min(self.max_interval).max(self.first_interval())
    }
}

/// Poll until every token is terminal or the deadline passes
#[instrument(skip(engine, tokens, config), fields(tokens = tokens.len()))]
pub async fn collect<E>(
    engine: &E,
    tokens: &[TrackingToken],
    config: &PollConfig,
) -> Result<Vec<ExecutionResult>, JudgeError>
where
    E: ExecutionEngine + ?Sized,
{
    let mut positions: HashMap<&TrackingToken, Vec<usize>> = HashMap::new();
    let mut outstanding: Vec<TrackingToken> = Vec::new();
    for (idx, token) in tokens.iter().enumerate() {
        let slots = positions.entry(token).or_default();
        if slots.is_empty() {
            outstanding.push(token.clone());
        }
        slots.push(idx);
    }

    let mut slots: Vec<Option<ExecutionResult>> = vec![None; tokens.len()];
    let deadline = Instant::now() + config.deadline;
    let mut interval = config.first_interval();
    let mut attempt: u32 = 0;

    while !outstanding.is_empty() {
        attempt += 1;

        match engine.batch_status(&outstanding).await {
            Ok(results) => {
                for result in results {
                    if !result.is_terminal() {
                        continue;
                    }
                    match positions.get(&result.token) {
                        Some(indices) => {
                            for &idx in indices {
                                if slots[idx].is_none() {
                                    slots[idx] = Some(result.clone());
                                }
                            }
                        }
                        None => warn!(token = %result.token, "Engine reported a token we never asked about"),
                    }
                }
                outstanding.retain(|token| slots[positions[token][0]].is_none());
                debug!(attempt, pending = outstanding.len(), "Poll round complete");
            }
            Err(e) => {
                // A failed round leaves everything pending; the next round retries
                warn!(attempt, error = %e, "Status query failed");
            }
        }

        if outstanding.is_empty() {
            break;
        }

        let now = Instant::now();
        let attempts_exhausted = config.max_attempts.is_some_and(|max| attempt >= max);
        if now >= deadline || attempts_exhausted {
            let completed: Vec<ExecutionResult> = slots.into_iter().flatten().collect();
            warn!(
                attempt,
                completed = completed.len(),
                pending = outstanding.len(),
                "Polling gave up with results still pending"
            );
            return Err(JudgeError::PollTimeout {
                completed,
                pending: outstanding,
            });
        }

        tokio::time::sleep(interval.min(deadline - now)).await;
        interval = config.next_interval(interval);
    }

    info!(rounds = attempt, "All results terminal");
    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{accepted, pending, ScriptedEngine};
    use arbiter_common::types::LanguageId;
    use crate::batcher;

    fn config(interval_ms: u64, deadline_ms: u64) -> PollConfig {
        PollConfig {
            poll_interval: Duration::from_millis(interval_ms),
            max_interval: Duration::from_millis(interval_ms * 4),
            backoff_factor: 2.0,
            deadline: Duration::from_millis(deadline_ms),
            max_attempts: None,
        }
    }

    async fn submitted(engine: &ScriptedEngine, inputs: &[&str]) -> Vec<TrackingToken> {
        let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
        batcher::submit(engine, "prog", LanguageId(71), &inputs).await.unwrap()
    }

    #[test]
    fn test_backoff_is_capped() {
        let cfg = config(100, 10_000);
        let mut interval = cfg.poll_interval;
        let mut seen = vec![];
        for _ in 0..5 {
            seen.push(interval.as_millis());
            interval = cfg.next_interval(interval);
        }
        assert_eq!(seen, vec![100, 200, 400, 400, 400]);
    }

    #[test]
    fn test_backoff_factor_below_one_never_shrinks() {
        let cfg = PollConfig {
            backoff_factor: 0.5,
            ..config(100, 1000)
        };
        assert_eq!(cfg.next_interval(Duration::from_millis(100)), Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_with_extreme_factor_saturates_at_max() {
        for factor in [f64::INFINITY, 1e300, f64::MAX] {
            let cfg = PollConfig {
                backoff_factor: factor,
                ..config(100, 1000)
            };
            assert_eq!(cfg.next_interval(Duration::from_millis(100)), Duration::from_millis(400));
        }
    }

    #[test]
    fn test_backoff_with_nan_factor_keeps_interval() {
        let cfg = PollConfig {
            backoff_factor: f64::NAN,
            ..config(100, 1000)
        };
        assert_eq!(cfg.next_interval(Duration::from_millis(100)), Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_never_drops_below_poll_interval() {
        let cfg = PollConfig {
            max_interval: Duration::ZERO,
            ..config(100, 1000)
        };
        assert_eq!(cfg.next_interval(Duration::from_millis(100)), Duration::from_millis(100));

        let zero = PollConfig {
            poll_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            ..config(100, 1000)
        };
        assert_eq!(zero.first_interval(), Duration::from_millis(1));
        assert_eq!(zero.next_interval(Duration::ZERO), Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_with_zero_max_interval_keeps_pausing() {
        let engine = ScriptedEngine::new(|_, _| pending());
        let tokens = submitted(&engine, &["x"]).await;
        let cfg = PollConfig {
            poll_interval: Duration::from_millis(1000),
            max_interval: Duration::ZERO,
            backoff_factor: 2.0,
            deadline: Duration::from_millis(1500),
            max_attempts: None,
        };

        let err = collect(&engine, &tokens, &cfg).await.unwrap_err();
        assert!(matches!(err, JudgeError::PollTimeout { .. }));
        // rounds at 0ms, 1000ms and 1500ms
        assert_eq!(engine.status_calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_with_infinite_backoff_does_not_panic() {
        let engine = ScriptedEngine::new(|request, round| {
            if round >= 2 {
                accepted(&request.stdin, 0.01, 100)
            } else {
                pending()
            }
        });
        let tokens = submitted(&engine, &["x"]).await;
        let cfg = PollConfig {
            backoff_factor: f64::INFINITY,
            ..config(10, 5_000)
        };

        let results = collect(&engine, &tokens, &cfg).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(engine.status_calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_restores_token_order_when_engine_reorders() {
        // Later inputs finish first and the engine answers in reverse
        let engine = ScriptedEngine::new(|request, round| {
            let ready_after: usize = request.stdin.parse().unwrap();
            if round >= ready_after {
                accepted(&request.stdin, 0.01, 100)
            } else {
                pending()
            }
        })
        .reversed();

        let tokens = submitted(&engine, &["3", "1", "2", "0"]).await;
        let results = collect(&engine, &tokens, &config(10, 5_000)).await.unwrap();

        assert_eq!(results.len(), tokens.len());
        for (token, result) in tokens.iter().zip(&results) {
            assert_eq!(&result.token, token);
        }
        let stdouts: Vec<&str> = results.iter().map(|r| r.stdout.as_deref().unwrap()).collect();
        assert_eq!(stdouts, vec!["3", "1", "2", "0"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_only_repolls_pending_tokens() {
        let engine = ScriptedEngine::new(|request, round| {
            if request.stdin == "slow" && round < 2 {
                pending()
            } else {
                accepted(&request.stdin, 0.01, 100)
            }
        });

        let tokens = submitted(&engine, &["fast", "slow", "fast2"]).await;
        collect(&engine, &tokens, &config(10, 5_000)).await.unwrap();

        let calls = engine.status_calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].len(), 3);
        assert_eq!(calls[1], vec![tokens[1].clone()]);
        assert_eq!(calls[2], vec![tokens[1].clone()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_times_out_with_partial_results() {
        // 2 of 5 never finish
        let engine = ScriptedEngine::new(|request, _round| {
            if request.stdin.starts_with("stuck") {
                pending()
            } else {
                accepted(&request.stdin, 0.01, 100)
            }
        });

        let tokens = submitted(&engine, &["a", "stuck1", "b", "stuck2", "c"]).await;
        let err = collect(&engine, &tokens, &config(100, 1_000)).await.unwrap_err();

        match err {
            JudgeError::PollTimeout { completed, pending } => {
                assert_eq!(completed.len(), 3);
                assert_eq!(pending, vec![tokens[1].clone(), tokens[3].clone()]);
                let done: Vec<&TrackingToken> = completed.iter().map(|r| &r.token).collect();
                assert_eq!(done, vec![&tokens[0], &tokens[2], &tokens[4]]);
            }
            other => panic!("expected PollTimeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_respects_deadline_duration() {
        let engine = ScriptedEngine::new(|_, _| pending());
        let tokens = submitted(&engine, &["x"]).await;

        let started = Instant::now();
        let result = collect(&engine, &tokens, &config(100, 1_000)).await;
        let waited = started.elapsed();

        assert!(matches!(result, Err(JudgeError::PollTimeout { .. })));
        assert!(waited >= Duration::from_millis(1_000));
        assert!(waited < Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_max_attempts() {
        let engine = ScriptedEngine::new(|_, _| pending());
        let tokens = submitted(&engine, &["x", "y"]).await;
        let cfg = PollConfig {
            max_attempts: Some(3),
            ..config(10, 60_000)
        };

        let err = collect(&engine, &tokens, &cfg).await.unwrap_err();
        assert!(matches!(err, JudgeError::PollTimeout { ref completed, .. } if completed.is_empty()));
        assert_eq!(engine.status_calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_collect_tolerates_failed_rounds() {
        let engine = ScriptedEngine::new(|request, _| accepted(&request.stdin, 0.01, 100))
            .failing_status_rounds(&[0, 1]);
        let tokens = submitted(&engine, &["a", "b"]).await;

        let results = collect(&engine, &tokens, &config(10, 5_000)).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(engine.status_calls().len(), 3);
    }

    #[tokio::test]
    async fn test_collect_empty_token_list() {
        let engine = ScriptedEngine::echo();
        let results = collect(&engine, &[], &PollConfig::default()).await.unwrap();
        assert!(results.is_empty());
        assert!(engine.status_calls().is_empty());
    }
}

// Application configuration, read from the environment

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_ENGINE_URL: &str = "http://localhost:2358";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}' ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Polling knobs, kept as plain numbers so they can be logged and overridden
#[derive(Debug, Clone, PartialEq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_interval: Duration,
    pub backoff_factor: f64,
    pub deadline: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_interval: Duration::from_millis(8000),
            backoff_factor: 2.0,
            deadline: Duration::from_millis(60_000),
            max_attempts: None,
        }
    }
}

impl PollSettings {
    /// Reject settings that would poll without pause or overflow the backoff
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(ConfigError::Invalid {
                key: "POLL_BACKOFF_FACTOR",
                value: self.backoff_factor.to_string(),
                reason: "must be a finite number >= 1.0".to_string(),
            });
        }
        if self.interval.is_zero() {
            return Err(ConfigError::Invalid {
                key: "POLL_INTERVAL_MS",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.max_interval < self.interval {
            return Err(ConfigError::Invalid {
                key: "POLL_MAX_INTERVAL_MS",
                value: self.max_interval.as_millis().to_string(),
                reason: format!(
                    "must be >= POLL_INTERVAL_MS ({})",
                    self.interval.as_millis()
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub engine_url: String,
    pub engine_auth_token: Option<String>,
    pub engine_request_timeout: Duration,
    pub redis_url: String,
    pub bind_addr: String,
    pub result_ttl_seconds: u64,
    pub poll: PollSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_url: DEFAULT_ENGINE_URL.to_string(),
            engine_auth_token: None,
            engine_request_timeout: Duration::from_millis(10_000),
            redis_url: DEFAULT_REDIS_URL.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            result_ttl_seconds: 86400,
            poll: PollSettings::default(),
        }
    }
}

impl Config {
    /// Load from process environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let poll = PollSettings {
            interval: parse_millis(&get, "POLL_INTERVAL_MS")?.unwrap_or(defaults.poll.interval),
            max_interval: parse_millis(&get, "POLL_MAX_INTERVAL_MS")?
                .unwrap_or(defaults.poll.max_interval),
            backoff_factor: parse_num::<f64, _>(&get, "POLL_BACKOFF_FACTOR")?
                .unwrap_or(defaults.poll.backoff_factor),
            deadline: parse_millis(&get, "POLL_DEADLINE_MS")?.unwrap_or(defaults.poll.deadline),
            max_attempts: parse_num::<u32, _>(&get, "POLL_MAX_ATTEMPTS")?,
        };

        poll.validate()?;

        Ok(Self {
            engine_url: get("JUDGE0_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.engine_url),
            engine_auth_token: get("JUDGE0_AUTH_TOKEN"),
            engine_request_timeout: parse_millis(&get, "ENGINE_REQUEST_TIMEOUT_MS")?
                .unwrap_or(defaults.engine_request_timeout),
            redis_url: get("REDIS_URL").unwrap_or(defaults.redis_url),
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            result_ttl_seconds: parse_num::<u64, _>(&get, "RESULT_TTL_SECONDS")?
                .unwrap_or(defaults.result_ttl_seconds),
            poll,
        })
    }
}

fn parse_num<T, F>(get: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn parse_millis<F>(get: &F, key: &'static str) -> Result<Option<Duration>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_num::<u64, F>(get, key)?.map(Duration::from_millis))
}

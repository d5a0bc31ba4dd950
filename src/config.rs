//! Router configuration
//!
//! Loaded from the environment (after `.env` via dotenv). Every field has a
//! default; a variable that is set but unparsable is a configuration error.

use crate::error::RouterError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Hard cap on capability invocations per query.
    pub max_steps: usize,
    pub invocation_timeout_ms: u64,
    /// Time allowed for one decision (language-model call).
    pub decision_timeout_ms: u64,
    /// Total attempts when the provider rate limits, first try included.
    pub rate_limit_attempts: u32,
    /// First backoff delay; doubles on every further attempt.
    pub backoff_base_ms: u64,
    pub retrieval_k: usize,
    /// Prior turns shown to the decision step.
    pub history_turns: usize,
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,
    pub market_data_base_url: Option<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_steps: 6,
            invocation_timeout_ms: 10_000,
            decision_timeout_ms: 30_000,
            rate_limit_attempts: 3,
            backoff_base_ms: 500,
            retrieval_k: 4,
            history_turns: 10,
            gemini_api_key: None,
            market_data_base_url: None,
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| RouterError::Config(format!("{} has an invalid value '{}'", name, raw))),
        _ => Ok(default),
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RouterConfig {
    /// Read `ROUTER_*`, `GEMINI_API_KEY` and `MARKET_DATA_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let config = Self {
            max_steps: parse_var("ROUTER_MAX_STEPS", defaults.max_steps)?,
            invocation_timeout_ms: parse_var(
                "ROUTER_INVOCATION_TIMEOUT_MS",
                defaults.invocation_timeout_ms,
            )?,
            decision_timeout_ms: parse_var(
                "ROUTER_DECISION_TIMEOUT_MS",
                defaults.decision_timeout_ms,
            )?,
            rate_limit_attempts: parse_var(
                "ROUTER_RATE_LIMIT_ATTEMPTS",
                defaults.rate_limit_attempts,
            )?,
            backoff_base_ms: parse_var("ROUTER_BACKOFF_BASE_MS", defaults.backoff_base_ms)?,
            retrieval_k: parse_var("ROUTER_RETRIEVAL_K", defaults.retrieval_k)?,
            history_turns: parse_var("ROUTER_HISTORY_TURNS", defaults.history_turns)?,
            gemini_api_key: optional_var("GEMINI_API_KEY"),
            market_data_base_url: optional_var("MARKET_DATA_BASE_URL"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(RouterError::Config("ROUTER_MAX_STEPS must be at least 1".into()));
        }
        if self.rate_limit_attempts == 0 {
            return Err(RouterError::Config(
                "ROUTER_RATE_LIMIT_ATTEMPTS must be at least 1".into(),
            ));
        }
        if self.invocation_timeout_ms == 0 || self.decision_timeout_ms == 0 {
            return Err(RouterError::Config("timeouts must be greater than zero".into()));
        }
        Ok(())
    }

    pub fn invocation_timeout(&self) -> Duration {
        Duration::from_millis(self.invocation_timeout_ms)
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }

    pub fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}

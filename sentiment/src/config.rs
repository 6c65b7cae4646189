use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("backoff_base_ms must be greater than 0")]
    ZeroBackoff,

    #[error("{0} must be greater than 0")]
    ZeroTimeout(&'static str),

    #[error("timeout_secs ({timeout_secs}s) does not cover the retry backoff budget ({budget_ms}ms)")]
    TimeoutBelowBackoffBudget { timeout_secs: u64, budget_ms: u64 },
}

/// Classification service client configuration.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    /// Base URL of the classification service, e.g. `http://nlp-service:5000`
    pub url: Url,
    /// How many times a "not ready" answer is retried after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every subsequent retry
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Deadline for a whole classification, retries included
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_health_timeout_secs")]
    pub health_timeout_secs: u64,
    /// How often the binary refreshes its cached readiness state
    #[serde(default = "default_readiness_poll_secs")]
    pub readiness_poll_secs: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_base_ms() -> u64 {
    5_000
}

fn default_timeout_secs() -> u64 {
    6_000
}

fn default_ready_timeout_secs() -> u64 {
    10
}

fn default_health_timeout_secs() -> u64 {
    5
}

fn default_readiness_poll_secs() -> u64 {
    15
}

impl ClassifierConfig {
    pub fn new(url: Url) -> Self {
        ClassifierConfig {
            url,
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            timeout_secs: default_timeout_secs(),
            ready_timeout_secs: default_ready_timeout_secs(),
            health_timeout_secs: default_health_timeout_secs(),
            readiness_poll_secs: default_readiness_poll_secs(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.backoff_base_ms == 0 {
            return Err(ValidationError::ZeroBackoff);
        }

        for (name, value) in [
            ("timeout_secs", self.timeout_secs),
            ("ready_timeout_secs", self.ready_timeout_secs),
            ("health_timeout_secs", self.health_timeout_secs),
            ("readiness_poll_secs", self.readiness_poll_secs),
        ] {
            if value == 0 {
                return Err(ValidationError::ZeroTimeout(name));
            }
        }

        let budget_ms = u64::try_from(self.backoff_budget().as_millis()).unwrap_or(u64::MAX);
        if self.timeout_secs.saturating_mul(1000) <= budget_ms {
            return Err(ValidationError::TimeoutBelowBackoffBudget {
                timeout_secs: self.timeout_secs,
                budget_ms,
            });
        }

        Ok(())
    }

    /// Delay slept before retry number `retry` (zero-based).
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 2_u64.saturating_pow(retry);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }

    /// Total time spent sleeping if every retry is used. Saturates rather
    /// than overflowing for absurd retry counts.
    pub fn backoff_budget(&self) -> Duration {
        (0..self.max_retries)
            .map(|retry| self.backoff_delay(retry))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_secs)
    }

    pub fn readiness_poll_interval(&self) -> Duration {
        Duration::from_secs(self.readiness_poll_secs)
    }
}

use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeoutError {
    #[error("Timeout must be a number of seconds, got {0:?}")]
    NotANumber(String),
    #[error("Timeout must be a finite, non-negative number of seconds, got {0}")]
    OutOfRange(String),
}

/// Parse a timeout given in seconds (`"5"`, `"0.25"`)
pub fn parse_timeout(raw: &str) -> Result<Duration, TimeoutError> {
    let raw = raw.trim();
    let seconds: f64 = raw
        .parse()
        .map_err(|_| TimeoutError::NotANumber(raw.to_string()))?;
    Duration::try_from_secs_f64(seconds).map_err(|_| TimeoutError::OutOfRange(raw.to_string()))
}

/// Optional wall-clock limit measured from the start of a wait
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub fn start(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// True once at least `limit` has elapsed. Never true without a limit.
    pub fn expired(&self) -> bool {
        self.limit.is_some_and(|limit| self.elapsed() >= limit)
    }
}

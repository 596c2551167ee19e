use std::time::Duration;

use crate::capture::{capture_scope, CaptureError, ReplayReport};
use crate::kernel::{Engine, StepOutcome};

use super::{BreakCondition, Deadline};

/// How a blocking wait behaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// Give up after this long even if the condition never holds
    pub timeout: Option<Duration>,
    /// Replay captured requests when the wait ends normally
    pub replay: bool,
    /// Pause after an idle iteration; zero spins
    pub idle_backoff: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            replay: true,
            idle_backoff: Duration::from_millis(1),
        }
    }
}

impl WaitOptions {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_replay(mut self, replay: bool) -> Self {
        self.replay = replay;
        self
    }

    pub fn with_idle_backoff(mut self, idle_backoff: Duration) -> Self {
        self.idle_backoff = idle_backoff;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakReason {
    Condition,
    TimedOut,
}

/// Result of a completed wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOutcome {
    pub reason: BreakReason,
    /// Event-loop iterations run while waiting
    pub steps: u64,
    pub elapsed: Duration,
    pub replay: ReplayReport,
}

/// Capture run-requests and pump `engine` until `condition` holds or the
/// timeout elapses.
///
/// Each round checks the condition first and the timeout second, then runs
/// one iteration. Errors from the engine (interrupts included) abort the
/// capture without replay and are returned as-is.
pub fn block_until<E: Engine>(
    engine: &mut E,
    condition: &BreakCondition,
    options: &WaitOptions,
) -> Result<WaitOutcome, CaptureError> {
    let deadline = Deadline::start(options.timeout);
    tracing::debug!(
        condition = condition.kind(),
        timeout = ?options.timeout,
        replay = options.replay,
        "Blocking until break condition"
    );

    let ((reason, steps), replay) = capture_scope(engine, options.replay, |session| {
        let mut steps = 0u64;
        let reason = loop {
            if condition.is_met() {
                break BreakReason::Condition;
            }
            if deadline.expired() {
                break BreakReason::TimedOut;
            }
            let outcome = session.step()?;
            steps += 1;
            if outcome == StepOutcome::Idle && !options.idle_backoff.is_zero() {
                std::thread::sleep(options.idle_backoff);
            }
        };
        Ok((reason, steps))
    })?;

    let outcome = WaitOutcome {
        reason,
        steps,
        elapsed: deadline.elapsed(),
        replay,
    };
    tracing::info!(
        reason = ?outcome.reason,
        steps = outcome.steps,
        elapsed_ms = outcome.elapsed.as_millis() as u64,
        replayed = outcome.replay.replayed,
        discarded = outcome.replay.discarded,
        "Blocking wait finished"
    );
    Ok(outcome)
}

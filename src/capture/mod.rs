//! Execution capture: hold run-requests while a cell blocks, then replay
//! or discard them.
//!
//! ```no_run
//! use cellblock::capture::CaptureExecution;
//! use cellblock::kernel::{Kernel, ScriptExecutor};
//!
//! # fn ready() -> bool { true }
//! let mut kernel = Kernel::new("session", ScriptExecutor);
//! let mut session = CaptureExecution::new(&mut kernel, true);
//! session.enter()?;
//! while !ready() {
//!     session.step()?;
//! }
//! session.exit()?;
//! # Ok::<(), cellblock::capture::CaptureError>(())
//! ```

use thiserror::Error;

use crate::kernel::{CaptureSink, DispatchEntry, Engine, EngineError, StepOutcome};

/// Errors from a capture session
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Another capture session is already active on this engine")]
    AlreadyCapturing,
    #[error("Capture session was already entered")]
    AlreadyEntered,
    #[error("Capture session is not active")]
    NotActive,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl CaptureError {
    /// True if this is an interrupt that unwound out of the session
    pub fn is_interrupt(&self) -> bool {
        matches!(self, CaptureError::Engine(EngineError::Interrupted))
    }
}

/// What happened to the captured requests when a session ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    pub captured: usize,
    pub replayed: usize,
    pub discarded: usize,
}

/// Scoped capture of an engine's run-requests.
///
/// While active, the engine's run-request entry is replaced by a
/// [`CaptureSink`] and every new request is buffered in arrival order.
/// [`exit`](Self::exit) restores the entry and replays the buffer under each
/// request's original identity (or discards it when replay is disabled).
/// [`abort`](Self::abort) and `Drop` restore the entry without replaying.
///
/// The session borrows the engine mutably, so only one session can exist
/// per engine at a time. A session is single-use.
pub struct CaptureExecution<'e, E: Engine> {
    engine: &'e mut E,
    sink: CaptureSink,
    previous: Option<DispatchEntry>,
    replay: bool,
    used: bool,
}

impl<'e, E: Engine> CaptureExecution<'e, E> {
    pub fn new(engine: &'e mut E, replay: bool) -> Self {
        Self {
            engine,
            sink: CaptureSink::new(),
            previous: None,
            replay,
            used: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.previous.is_some()
    }

    /// Number of requests buffered so far
    pub fn captured(&self) -> usize {
        self.sink.len()
    }

    /// Install the capturing entry and bump the execution counter once
    pub fn enter(&mut self) -> Result<(), CaptureError> {
        if self.used {
            return Err(CaptureError::AlreadyEntered);
        }
        let previous = self
            .engine
            .replace_run_entry(DispatchEntry::Capture(self.sink.clone()));
        if previous.is_capturing() {
            self.engine.replace_run_entry(previous);
            return Err(CaptureError::AlreadyCapturing);
        }
        self.used = true;
        self.previous = Some(previous);

        // The blocking cell consumes a count so replayed cells don't collide with it.
        let execution_count = self.engine.bump_execution_count();
        tracing::debug!(
            execution_count,
            replay = self.replay,
            "Capturing run requests"
        );
        Ok(())
    }

    /// Advance the engine by one iteration
    pub fn step(&mut self) -> Result<StepOutcome, CaptureError> {
        Ok(self.engine.do_one_iteration()?)
    }

    /// Normal exit: restore the entry, then replay or discard the buffer
    pub fn exit(&mut self) -> Result<ReplayReport, CaptureError> {
        if !self.restore() {
            return Err(CaptureError::NotActive);
        }
        let requests = self.sink.drain();
        let captured = requests.len();

        if !self.replay {
            if captured > 0 {
                tracing::info!(discarded = captured, "Discarded captured run requests");
            }
            return Ok(ReplayReport {
                captured,
                replayed: 0,
                discarded: captured,
            });
        }

        // Output of the blocking cell must be published before the parent moves.
        if let Err(err) = self.engine.flush_output() {
            tracing::warn!(error = %err, dropped = captured, "Flush before replay failed");
            return Err(err.into());
        }

        let mut replayed = 0;
        let mut pending = requests.into_iter();
        while let Some(request) = pending.next() {
            self.engine.set_parent(&request.identity, &request.parent);
            if let Err(err) = self.engine.execute_request(request) {
                tracing::warn!(
                    error = %err,
                    replayed,
                    dropped = pending.len(),
                    "Replay stopped by a failed request"
                );
                return Err(err.into());
            }
            replayed += 1;
        }

        if captured > 0 {
            tracing::info!(replayed, "Replayed captured run requests");
        }
        Ok(ReplayReport {
            captured,
            replayed,
            discarded: 0,
        })
    }

    /// Error exit: restore the entry and discard the buffer, whatever the
    /// replay flag says. Returns the number of discarded requests.
    pub fn abort(&mut self) -> usize {
        if !self.restore() {
            return 0;
        }
        let discarded = self.sink.drain().len();
        if discarded > 0 {
            tracing::warn!(discarded, "Capture aborted, run requests discarded");
        }
        discarded
    }

    fn restore(&mut self) -> bool {
        let Some(previous) = self.previous.take() else {
            return false;
        };
        let replaced = self.engine.replace_run_entry(previous);
        match replaced {
            DispatchEntry::Capture(sink) if sink.same_buffer(&self.sink) => {}
            other => {
                tracing::warn!(entry = ?other, "Run entry changed while capturing");
            }
        }
        tracing::debug!(captured = self.sink.len(), "Restored run request entry");
        true
    }
}

impl<E: Engine> Drop for CaptureExecution<'_, E> {
    fn drop(&mut self) {
        if self.is_active() {
            self.abort();
        }
    }
}

/// Run `body` inside a capture session.
///
/// On `Ok` the session exits normally and replays (if enabled). On `Err`
/// the session is aborted and the error is returned unchanged.
pub fn capture_scope<E, T, F>(
    engine: &mut E,
    replay: bool,
    body: F,
) -> Result<(T, ReplayReport), CaptureError>
where
    E: Engine,
    F: FnOnce(&mut CaptureExecution<'_, E>) -> Result<T, CaptureError>,
{
    let mut session = CaptureExecution::new(engine, replay);
    session.enter()?;
    match body(&mut session) {
        Ok(value) => {
            let report = session.exit()?;
            Ok((value, report))
        }
        Err(err) => {
            session.abort();
            Err(err)
        }
    }
}

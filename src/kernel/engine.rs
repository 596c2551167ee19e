use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use crate::kernel::message::{Identity, PendingRequest, RequestMessage};
use crate::kernel::output::FrontEnd;

/// Errors surfaced by an engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Cooperative interrupt delivered while the loop was running
    #[error("Kernel interrupted")]
    Interrupted,
    #[error("Event loop runtime error: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("Execution failed: {0}")]
    Execution(String),
}

/// Result of a single event-loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// One message was dequeued and dispatched
    Processed,
    /// Nothing was available
    Idle,
}

/// Buffer that run-requests are diverted into while capturing
#[derive(Clone, Default)]
pub struct CaptureSink {
    requests: Arc<Mutex<Vec<PendingRequest>>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a run-request instead of executing it
    pub fn capture(&self, request: PendingRequest) {
        let mut requests = self.requests.lock();
        requests.push(request);
        tracing::debug!(buffered = requests.len(), "Captured run request");
    }

    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }

    /// Take every buffered request, in arrival order
    pub fn drain(&self) -> Vec<PendingRequest> {
        std::mem::take(&mut *self.requests.lock())
    }

    pub fn same_buffer(&self, other: &CaptureSink) -> bool {
        Arc::ptr_eq(&self.requests, &other.requests)
    }
}

impl fmt::Debug for CaptureSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSink")
            .field("len", &self.len())
            .finish()
    }
}

/// What the engine does with a new run-request
#[derive(Debug, Clone, Default)]
pub enum DispatchEntry {
    /// Execute it (the engine's own handler)
    #[default]
    Execute,
    /// Append it to a capture buffer
    Capture(CaptureSink),
}

impl DispatchEntry {
    pub fn is_capturing(&self) -> bool {
        matches!(self, DispatchEntry::Capture(_))
    }
}

/// The interactive execution substrate the capture core drives.
///
/// Implementations are single-threaded and cooperative: nothing runs unless
/// the caller pumps `do_one_iteration`.
pub trait Engine {
    /// Swap the run-request dispatch slot, returning the entry it replaced
    fn replace_run_entry(&mut self, entry: DispatchEntry) -> DispatchEntry;

    /// Process at most one pending message. Must not block indefinitely;
    /// an empty queue yields `StepOutcome::Idle`.
    fn do_one_iteration(&mut self) -> Result<StepOutcome, EngineError>;

    /// Attribute subsequent output to `parent`
    fn set_parent(&mut self, identity: &Identity, parent: &RequestMessage);

    /// Increment the visible execution counter, returning the new value
    fn bump_execution_count(&mut self) -> u64;

    /// The engine's normal run-request handler
    fn execute_request(&mut self, request: PendingRequest) -> Result<(), EngineError>;

    /// Publish any buffered stdout/stderr text under the current parent
    fn flush_output(&mut self) -> Result<(), EngineError>;

    /// Channel for fire-and-forget front-end notifications
    fn front_end(&self) -> FrontEnd;
}

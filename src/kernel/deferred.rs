//! Adapter for kernels whose message source is asynchronous
//!
//! The capture core only knows the synchronous `Engine::do_one_iteration`.
//! `DeferredEngine` turns one asynchronous receive into one synchronous
//! iteration by driving it to completion on a private current-thread
//! runtime, bounded by a poll interval.

use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;

use crate::kernel::engine::{DispatchEntry, Engine, EngineError, StepOutcome};
use crate::kernel::local::Kernel;
use crate::kernel::message::{Identity, KernelMessage, PendingRequest, RequestMessage};
use crate::kernel::output::FrontEnd;

/// Default upper bound for a single receive
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Asynchronous source of kernel messages
#[async_trait]
pub trait AsyncInbox: Send {
    /// Next message, or `None` once the source is closed
    async fn recv(&mut self) -> Option<KernelMessage>;
}

#[async_trait]
impl AsyncInbox for mpsc::UnboundedReceiver<KernelMessage> {
    async fn recv(&mut self) -> Option<KernelMessage> {
        mpsc::UnboundedReceiver::recv(self).await
    }
}

#[async_trait]
impl AsyncInbox for mpsc::Receiver<KernelMessage> {
    async fn recv(&mut self) -> Option<KernelMessage> {
        mpsc::Receiver::recv(self).await
    }
}

/// A [`Kernel`] fed from an [`AsyncInbox`]
pub struct DeferredEngine<I: AsyncInbox> {
    kernel: Kernel,
    inbox: I,
    runtime: Runtime,
    poll_interval: Duration,
    closed: bool,
}

impl<I: AsyncInbox> DeferredEngine<I> {
    pub fn new(kernel: Kernel, inbox: I) -> Result<Self, EngineError> {
        Self::with_poll_interval(kernel, inbox, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        kernel: Kernel,
        inbox: I,
        poll_interval: Duration,
    ) -> Result<Self, EngineError> {
        let runtime = Builder::new_current_thread().enable_time().build()?;
        Ok(Self {
            kernel,
            inbox,
            runtime,
            poll_interval,
            closed: false,
        })
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// True once the async source reported it is closed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    async fn next_message(inbox: &mut I, poll_interval: Duration) -> Option<Option<KernelMessage>> {
        tokio::time::timeout(poll_interval, inbox.recv()).await.ok()
    }
}

/// Create an unbounded channel and a deferred engine reading from it
pub fn channel_engine(
    kernel: Kernel,
    poll_interval: Duration,
) -> Result<
    (
        mpsc::UnboundedSender<KernelMessage>,
        DeferredEngine<mpsc::UnboundedReceiver<KernelMessage>>,
    ),
    EngineError,
> {
    let (tx, rx) = mpsc::unbounded_channel();
    let engine = DeferredEngine::with_poll_interval(kernel, rx, poll_interval)?;
    Ok((tx, engine))
}

impl<I: AsyncInbox> Engine for DeferredEngine<I> {
    fn replace_run_entry(&mut self, entry: DispatchEntry) -> DispatchEntry {
        self.kernel.replace_run_entry(entry)
    }

    fn do_one_iteration(&mut self) -> Result<StepOutcome, EngineError> {
        // Timers re-queue locally; drain those before waiting on the source.
        if self.kernel.has_pending() {
            return self.kernel.do_one_iteration();
        }
        self.kernel.check_interrupt()?;
        if self.closed {
            return Ok(StepOutcome::Idle);
        }

        let poll_interval = self.poll_interval;
        let inbox = &mut self.inbox;
        let runtime = &self.runtime;
        match runtime.block_on(Self::next_message(inbox, poll_interval)) {
            Some(Some(message)) => self.kernel.dispatch(message),
            Some(None) => {
                tracing::debug!("Kernel message source closed");
                self.closed = true;
                Ok(StepOutcome::Idle)
            }
            None => Ok(StepOutcome::Idle),
        }
    }

    fn set_parent(&mut self, identity: &Identity, parent: &RequestMessage) {
        self.kernel.set_parent(identity, parent);
    }

    fn bump_execution_count(&mut self) -> u64 {
        self.kernel.bump_execution_count()
    }

    fn execute_request(&mut self, request: PendingRequest) -> Result<(), EngineError> {
        self.kernel.execute_request(request)
    }

    fn flush_output(&mut self) -> Result<(), EngineError> {
        self.kernel.flush_output()
    }

    fn front_end(&self) -> FrontEnd {
        self.kernel.front_end()
    }
}

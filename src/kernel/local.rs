use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::kernel::engine::{DispatchEntry, Engine, EngineError, StepOutcome};
use crate::kernel::message::{
    ControlUpdate, Identity, KernelMessage, PendingRequest, RequestMessage, StreamHandle,
};
use crate::kernel::output::{FrontEnd, OutputBuffer, OutputRecord, StreamName};
use crate::widgets::{Control, ControlId, ControlRegistry};

/// Runs the code of an execute request
pub trait CellExecutor {
    /// Execute `code`, writing any output to `out`. An `Err` is reported to
    /// the front end as a cell error; it does not stop the kernel.
    fn execute(&mut self, code: &str, out: &mut OutputBuffer) -> Result<(), String>;
}

/// Minimal line-oriented cell language.
///
/// - `print <text>` writes a line to stdout
/// - `eprint <text>` writes a line to stderr
/// - `fail <message>` raises an error
/// - blank lines and `#` comments are skipped
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptExecutor;

impl CellExecutor for ScriptExecutor {
    fn execute(&mut self, code: &str, out: &mut OutputBuffer) -> Result<(), String> {
        for line in code.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (statement, rest) = line.split_once(' ').unwrap_or((line, ""));
            match statement {
                "print" => out.write(StreamName::Stdout, &format!("{rest}\n")),
                "eprint" => out.write(StreamName::Stderr, &format!("{rest}\n")),
                "fail" => return Err(rest.to_string()),
                other => return Err(format!("unknown statement: {other}")),
            }
        }
        Ok(())
    }
}

type Inbox = Arc<Mutex<VecDeque<KernelMessage>>>;

/// Front-end side of a [`Kernel`]: queues messages and raises interrupts
#[derive(Debug, Clone)]
pub struct KernelHandle {
    session: String,
    inbox: Inbox,
    interrupt: Arc<AtomicBool>,
}

impl KernelHandle {
    pub fn send(&self, message: KernelMessage) {
        self.inbox.lock().push_back(message);
    }

    /// Queue an execute request from `identity`, returning its `msg_id`
    pub fn execute(&self, identity: Identity, code: impl Into<String>) -> String {
        let parent = RequestMessage::execute(self.session.clone(), code);
        let msg_id = parent.msg_id().to_string();
        self.send(KernelMessage::Execute(PendingRequest::new(
            StreamHandle::SHELL,
            identity,
            parent,
        )));
        msg_id
    }

    pub fn update_control(&self, target: ControlId, update: ControlUpdate) {
        self.send(KernelMessage::Comm { target, update });
    }

    /// Interrupt whatever iteration runs next
    pub fn interrupt(&self) {
        self.interrupt.store(true, Ordering::SeqCst);
    }
}

/// Synchronous in-process engine
pub struct Kernel {
    session: String,
    inbox: Inbox,
    interrupt: Arc<AtomicBool>,
    run_entry: DispatchEntry,
    controls: ControlRegistry,
    executor: Box<dyn CellExecutor>,
    output: OutputBuffer,
    front_end: FrontEnd,
    parent: Option<(Identity, RequestMessage)>,
    execution_count: u64,
}

impl Kernel {
    pub fn new(session: impl Into<String>, executor: impl CellExecutor + 'static) -> Self {
        Self {
            session: session.into(),
            inbox: Arc::new(Mutex::new(VecDeque::new())),
            interrupt: Arc::new(AtomicBool::new(false)),
            run_entry: DispatchEntry::Execute,
            controls: ControlRegistry::new(),
            executor: Box::new(executor),
            output: OutputBuffer::default(),
            front_end: FrontEnd::new(),
            parent: None,
            execution_count: 0,
        }
    }

    pub fn handle(&self) -> KernelHandle {
        KernelHandle {
            session: self.session.clone(),
            inbox: self.inbox.clone(),
            interrupt: self.interrupt.clone(),
        }
    }

    pub fn register_control(&mut self, control: impl Into<Control>) {
        self.controls.register(control);
    }

    pub fn execution_count(&self) -> u64 {
        self.execution_count
    }

    pub fn is_capturing(&self) -> bool {
        self.run_entry.is_capturing()
    }

    pub fn parent(&self) -> Option<&RequestMessage> {
        self.parent.as_ref().map(|(_, parent)| parent)
    }

    pub fn parent_identity(&self) -> Option<&Identity> {
        self.parent.as_ref().map(|(identity, _)| identity)
    }

    pub fn has_pending(&self) -> bool {
        !self.inbox.lock().is_empty()
    }

    /// Output written by code running outside an execute request (the
    /// blocking cell itself, for instance)
    pub fn write(&mut self, name: StreamName, text: &str) {
        self.output.write(name, text);
    }

    /// Run `code` under the current parent without publishing an execute
    /// request. Output stays buffered until the next flush.
    pub fn run_code(&mut self, code: &str) -> Result<(), String> {
        self.executor.execute(code, &mut self.output)
    }

    /// Fail with `Interrupted` if an interrupt is pending, clearing it
    pub fn check_interrupt(&self) -> Result<(), EngineError> {
        if self.interrupt.swap(false, Ordering::SeqCst) {
            return Err(EngineError::Interrupted);
        }
        Ok(())
    }

    /// Dispatch a single message
    pub fn dispatch(&mut self, message: KernelMessage) -> Result<StepOutcome, EngineError> {
        match message {
            KernelMessage::Execute(request) => match &self.run_entry {
                DispatchEntry::Execute => {
                    self.set_parent(&request.identity, &request.parent);
                    self.execute_request(request)?;
                }
                DispatchEntry::Capture(sink) => sink.capture(request),
            },
            KernelMessage::Comm { target, update } => {
                self.controls.apply(&target, update);
            }
            KernelMessage::Timer { ticks: 0, message } => return self.dispatch(*message),
            KernelMessage::Timer { ticks, message } => {
                self.inbox.lock().push_back(KernelMessage::Timer {
                    ticks: ticks - 1,
                    message,
                });
            }
            KernelMessage::Interrupt => return Err(EngineError::Interrupted),
        }
        Ok(StepOutcome::Processed)
    }

    /// Process messages until the inbox is empty, returning how many ran
    pub fn run_until_idle(&mut self) -> Result<usize, EngineError> {
        let mut processed = 0;
        while self.do_one_iteration()? == StepOutcome::Processed {
            processed += 1;
        }
        Ok(processed)
    }
}

impl Engine for Kernel {
    fn replace_run_entry(&mut self, entry: DispatchEntry) -> DispatchEntry {
        std::mem::replace(&mut self.run_entry, entry)
    }

    fn do_one_iteration(&mut self) -> Result<StepOutcome, EngineError> {
        self.check_interrupt()?;
        let next = self.inbox.lock().pop_front();
        match next {
            Some(message) => self.dispatch(message),
            None => Ok(StepOutcome::Idle),
        }
    }

    fn set_parent(&mut self, identity: &Identity, parent: &RequestMessage) {
        self.front_end.set_parent(Some(parent.msg_id().to_string()));
        self.parent = Some((identity.clone(), parent.clone()));
    }

    fn bump_execution_count(&mut self) -> u64 {
        self.execution_count += 1;
        self.execution_count
    }

    fn execute_request(&mut self, request: PendingRequest) -> Result<(), EngineError> {
        let count = self.bump_execution_count();
        let msg_id = Some(request.parent.msg_id().to_string());
        let code = request.parent.code().unwrap_or_default().to_string();

        self.front_end.publish(OutputRecord::ExecuteInput {
            parent: msg_id.clone(),
            execution_count: count,
            code: code.clone(),
        });

        let result = self.executor.execute(&code, &mut self.output);
        self.output.flush(&self.front_end);

        let status = match result {
            Ok(()) => "ok",
            Err(message) => {
                tracing::debug!(msg_id = ?msg_id, error = %message, "Cell raised an error");
                self.front_end.publish(OutputRecord::Error {
                    parent: msg_id.clone(),
                    message,
                });
                "error"
            }
        };
        self.front_end.publish(OutputRecord::ExecuteReply {
            parent: msg_id,
            status: status.to_string(),
            execution_count: count,
        });
        Ok(())
    }

    fn flush_output(&mut self) -> Result<(), EngineError> {
        self.output.flush(&self.front_end);
        Ok(())
    }

    fn front_end(&self) -> FrontEnd {
        self.front_end.clone()
    }
}

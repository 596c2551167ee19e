//! The interactive engine: run-request dispatch, the single-threaded event
//! loop, and output attribution.

pub mod deferred;
pub mod engine;
pub mod local;
pub mod message;
pub mod output;

pub use deferred::{channel_engine, AsyncInbox, DeferredEngine};
pub use engine::{CaptureSink, DispatchEntry, Engine, EngineError, StepOutcome};
pub use local::{CellExecutor, Kernel, KernelHandle, ScriptExecutor};
pub use message::{
    ControlUpdate, Identity, KernelMessage, MessageHeader, PendingRequest, RequestMessage,
    StreamHandle,
};
pub use output::{FrontEnd, OutputBuffer, OutputRecord, StreamName};

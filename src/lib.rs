pub mod capture;
pub mod condition;
pub mod config;
pub mod kernel;
pub mod magic;
pub mod namespace;
pub mod scenario;
pub mod util;
pub mod widgets;

pub use capture::{capture_scope, CaptureError, CaptureExecution, ReplayReport};
pub use condition::{
    block_until, BreakCondition, BreakReason, ClassificationError, WaitOptions, WaitOutcome,
};
pub use config::Config;
pub use kernel::{Engine, EngineError, Kernel, KernelHandle};
pub use magic::{CaptureMagic, MagicError};
pub use namespace::{Namespace, UserObject};
pub use scenario::{Scenario, ScenarioError, ScenarioReport};
pub use widgets::{Button, ControlId, ControlValue, ValueControl};

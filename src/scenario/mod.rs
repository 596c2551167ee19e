//! Scripted notebook sessions
//!
//! A scenario describes the controls in the user namespace, the cells a
//! front end queues while a blocking cell runs, and the UI events that arrive
//! meanwhile. Running it executes the blocking cell's magic against a real
//! kernel and collects everything the kernel published.
//!
//! ```toml
//! magic = "%block slider --timeout 5"
//! blocking_code = "print move the slider"
//!
//! [[controls]]
//! kind = "value"
//! name = "slider"
//! value = 0
//!
//! [[cells]]
//! code = "print replayed"
//!
//! [[events]]
//! after_ticks = 3
//! control = "slider"
//! set = 10
//! ```

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::condition::WaitOutcome;
use crate::config::Config;
use crate::kernel::{
    channel_engine, ControlUpdate, Engine, EngineError, Identity, Kernel, KernelMessage,
    OutputRecord, PendingRequest, RequestMessage, ScriptExecutor, StepOutcome, StreamHandle,
};
use crate::magic::{CaptureMagic, MagicError};
use crate::namespace::{Namespace, UserObject};
use crate::widgets::{Button, Control, ControlValue, ValueControl};

const DEFAULT_CLIENT: &str = "notebook";

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid scenario: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Name '{0}' is defined more than once")]
    DuplicateName(String),
    #[error("Namespace value '{0}' must be a bool, number or string")]
    InvalidValue(String),
    #[error("Event {index}: {reason}")]
    InvalidEvent { index: usize, reason: String },
    #[error("Blocking cell failed: {0}")]
    BlockingCell(String),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Which engine the scenario runs on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// In-process kernel with a synchronous inbox
    #[default]
    Local,
    /// Kernel fed through an async channel
    Deferred,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlSpec {
    Value {
        name: String,
        value: ControlValue,
    },
    Button {
        name: String,
        #[serde(default)]
        description: Option<String>,
    },
}

impl ControlSpec {
    fn name(&self) -> &str {
        match self {
            ControlSpec::Value { name, .. } | ControlSpec::Button { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CellSpec {
    pub code: String,
    #[serde(default)]
    pub client: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventSpec {
    #[serde(default)]
    pub after_ticks: u32,
    #[serde(default)]
    pub control: Option<String>,
    #[serde(default)]
    pub set: Option<ControlValue>,
    #[serde(default)]
    pub click: bool,
    #[serde(default)]
    pub interrupt: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    /// Magic line run by the blocking cell
    pub magic: String,
    /// Code the blocking cell runs before its magic
    #[serde(default)]
    pub blocking_code: String,
    #[serde(default)]
    pub engine: EngineKind,
    #[serde(default)]
    pub controls: Vec<ControlSpec>,
    /// Plain values bound in the user namespace
    #[serde(default)]
    pub namespace: BTreeMap<String, ControlValue>,
    /// Cells queued while the blocking cell runs
    #[serde(default)]
    pub cells: Vec<CellSpec>,
    /// UI events, delivered after the queued cells
    #[serde(default)]
    pub events: Vec<EventSpec>,
}

/// What a scenario run produced
#[derive(Debug)]
pub struct ScenarioReport {
    pub blocking_msg_id: String,
    pub cell_msg_ids: Vec<String>,
    /// Result of the magic; `Ok(None)` when `%blockrun` did not block
    pub wait: Result<Option<WaitOutcome>, MagicError>,
    pub records: Vec<OutputRecord>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let contents = fs::read_to_string(path).map_err(|source| ScenarioError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn run(&self, config: &Config) -> Result<ScenarioReport, ScenarioError> {
        let session = config.kernel.session.clone();
        let mut kernel = Kernel::new(session.clone(), ScriptExecutor);
        let (namespace, controls) = self.build_namespace(&mut kernel)?;

        let mut cell_msg_ids = Vec::with_capacity(self.cells.len());
        let mut messages = Vec::with_capacity(self.cells.len() + self.events.len());
        for cell in &self.cells {
            let parent = RequestMessage::execute(session.clone(), cell.code.clone());
            cell_msg_ids.push(parent.msg_id().to_string());
            let client = cell.client.as_deref().unwrap_or(DEFAULT_CLIENT);
            messages.push(KernelMessage::Execute(PendingRequest::new(
                StreamHandle::SHELL,
                Identity::new(client),
                parent,
            )));
        }
        for (index, event) in self.events.iter().enumerate() {
            messages.push(event_message(index, event, &controls)?);
        }

        // The blocking cell is already running when the queued cells arrive.
        let blocking = RequestMessage::execute(
            session,
            format!("{}\n{}", self.blocking_code, self.magic),
        );
        let blocking_msg_id = blocking.msg_id().to_string();
        kernel.set_parent(&Identity::new(DEFAULT_CLIENT), &blocking);
        kernel
            .run_code(&self.blocking_code)
            .map_err(ScenarioError::BlockingCell)?;

        let mut magic = CaptureMagic::new(config.wait.wait_options());
        tracing::info!(
            engine = ?self.engine,
            cells = self.cells.len(),
            events = self.events.len(),
            magic = %self.magic,
            "Running scenario"
        );

        let (wait, records) = match self.engine {
            EngineKind::Local => {
                let handle = kernel.handle();
                for message in messages {
                    handle.send(message);
                }
                drive(&mut kernel, &mut magic, &namespace, &self.magic)?
            }
            EngineKind::Deferred => {
                let (tx, mut engine) = channel_engine(kernel, config.kernel.poll_interval)?;
                for message in messages {
                    // The receiver lives in `engine`, so the channel is open.
                    let _ = tx.send(message);
                }
                drop(tx);
                drive(&mut engine, &mut magic, &namespace, &self.magic)?
            }
        };

        Ok(ScenarioReport {
            blocking_msg_id,
            cell_msg_ids,
            wait,
            records,
        })
    }

    fn build_namespace(
        &self,
        kernel: &mut Kernel,
    ) -> Result<(Namespace, HashMap<String, Control>), ScenarioError> {
        let mut namespace = Namespace::new();
        let mut controls = HashMap::new();

        for spec in &self.controls {
            let name = spec.name().to_string();
            if controls.contains_key(&name) {
                return Err(ScenarioError::DuplicateName(name));
            }
            let control: Control = match spec {
                ControlSpec::Value { value, .. } => ValueControl::new(value.clone()).into(),
                ControlSpec::Button { description, .. } => {
                    Button::new(description.clone().unwrap_or_else(|| name.clone())).into()
                }
            };
            kernel.register_control(control.clone());
            let object = match &control {
                Control::Value(v) => UserObject::Value(v.clone()),
                Control::Button(b) => UserObject::Button(b.clone()),
            };
            namespace.insert(name.clone(), object);
            controls.insert(name, control);
        }

        for (name, value) in &self.namespace {
            if namespace.contains(name) {
                return Err(ScenarioError::DuplicateName(name.clone()));
            }
            let object = match value {
                ControlValue::Bool(b) => UserObject::Bool(*b),
                ControlValue::Int(i) => UserObject::Int(*i),
                ControlValue::Float(x) => UserObject::Float(*x),
                ControlValue::Text(s) => UserObject::Text(s.clone()),
                ControlValue::None => return Err(ScenarioError::InvalidValue(name.clone())),
            };
            namespace.insert(name.clone(), object);
        }

        Ok((namespace, controls))
    }
}

fn event_message(
    index: usize,
    event: &EventSpec,
    controls: &HashMap<String, Control>,
) -> Result<KernelMessage, ScenarioError> {
    let invalid = |reason: &str| ScenarioError::InvalidEvent {
        index,
        reason: reason.to_string(),
    };

    let message = match (&event.set, event.click, event.interrupt) {
        (None, false, true) => KernelMessage::Interrupt,
        (Some(_), false, false) | (None, true, false) => {
            let name = event
                .control
                .as_deref()
                .ok_or_else(|| invalid("missing `control`"))?;
            let control = controls
                .get(name)
                .ok_or_else(|| invalid(&format!("unknown control '{name}'")))?;
            let update = match &event.set {
                Some(value) => ControlUpdate::SetValue(value.clone()),
                None => ControlUpdate::Click,
            };
            KernelMessage::Comm {
                target: control.id().clone(),
                update,
            }
        }
        _ => return Err(invalid("expected exactly one of `set`, `click`, `interrupt`")),
    };

    Ok(if event.after_ticks > 0 {
        KernelMessage::after_ticks(event.after_ticks, message)
    } else {
        message
    })
}

type DriveResult = (Result<Option<WaitOutcome>, MagicError>, Vec<OutputRecord>);

/// Run the magic, then let the kernel finish whatever is still queued
fn drive<E: Engine>(
    engine: &mut E,
    magic: &mut CaptureMagic,
    namespace: &Namespace,
    line: &str,
) -> Result<DriveResult, ScenarioError> {
    let wait = magic.run_line(engine, namespace, line);
    if let Err(e) = &wait {
        tracing::warn!(error = %e, "Blocking magic failed");
    }
    engine.flush_output()?;

    let mut drained = 0usize;
    while engine.do_one_iteration()? == StepOutcome::Processed {
        drained += 1;
    }
    tracing::debug!(drained, "Kernel idle after scenario");

    Ok((wait, engine.front_end().take_records()))
}

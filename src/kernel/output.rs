//! Published output and front-end notifications
//!
//! Every record is tagged with the parent `msg_id` that was current when it
//! was published. That tag is what a notebook front end uses to decide which
//! cell an output belongs to.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Script that asks a classic notebook front end to run every cell below
pub const RUN_CELLS_BELOW_JS: &str = "Jupyter.notebook.select_next().execute_cells_below()";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamName {
    Stdout,
    Stderr,
}

/// One message published to the front end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputRecord {
    ExecuteInput {
        parent: Option<String>,
        execution_count: u64,
        code: String,
    },
    Stream {
        parent: Option<String>,
        name: StreamName,
        text: String,
    },
    Error {
        parent: Option<String>,
        message: String,
    },
    ExecuteReply {
        parent: Option<String>,
        status: String,
        execution_count: u64,
    },
    Javascript {
        parent: Option<String>,
        code: String,
    },
}

impl OutputRecord {
    pub fn parent(&self) -> Option<&str> {
        match self {
            OutputRecord::ExecuteInput { parent, .. }
            | OutputRecord::Stream { parent, .. }
            | OutputRecord::Error { parent, .. }
            | OutputRecord::ExecuteReply { parent, .. }
            | OutputRecord::Javascript { parent, .. } => parent.as_deref(),
        }
    }
}

#[derive(Debug, Default)]
struct FrontEndState {
    parent: Option<String>,
    records: Vec<OutputRecord>,
}

/// Publishing side of the front-end connection
#[derive(Debug, Clone, Default)]
pub struct FrontEnd {
    state: Arc<Mutex<FrontEndState>>,
}

impl FrontEnd {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set_parent(&self, msg_id: Option<String>) {
        self.state.lock().parent = msg_id;
    }

    pub fn parent(&self) -> Option<String> {
        self.state.lock().parent.clone()
    }

    pub fn publish(&self, record: OutputRecord) {
        self.state.lock().records.push(record);
    }

    /// Ask the front end to run every cell below the current one
    pub fn execute_cells_below(&self) {
        let parent = self.parent();
        tracing::debug!(parent = ?parent, "Requesting execution of cells below");
        self.publish(OutputRecord::Javascript {
            parent,
            code: RUN_CELLS_BELOW_JS.to_string(),
        });
    }

    pub fn records(&self) -> Vec<OutputRecord> {
        self.state.lock().records.clone()
    }

    pub fn take_records(&self) -> Vec<OutputRecord> {
        std::mem::take(&mut self.state.lock().records)
    }

    /// Concatenated text of the stream records attributed to `msg_id`
    pub fn stream_text(&self, msg_id: &str, name: StreamName) -> String {
        self.state
            .lock()
            .records
            .iter()
            .filter_map(|record| match record {
                OutputRecord::Stream {
                    parent: Some(parent),
                    name: n,
                    text,
                } if parent == msg_id && *n == name => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// Buffered stdout/stderr of the running code
#[derive(Debug, Default)]
pub struct OutputBuffer {
    stdout: String,
    stderr: String,
}

impl OutputBuffer {
    pub fn write(&mut self, name: StreamName, text: &str) {
        match name {
            StreamName::Stdout => self.stdout.push_str(text),
            StreamName::Stderr => self.stderr.push_str(text),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty()
    }

    /// Publish pending text under the front end's current parent
    pub fn flush(&mut self, front_end: &FrontEnd) {
        let parent = front_end.parent();
        for (name, text) in [
            (StreamName::Stdout, std::mem::take(&mut self.stdout)),
            (StreamName::Stderr, std::mem::take(&mut self.stderr)),
        ] {
            if !text.is_empty() {
                front_end.publish(OutputRecord::Stream {
                    parent: parent.clone(),
                    name,
                    text,
                });
            }
        }
    }
}

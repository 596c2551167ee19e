use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::widgets::{ControlId, ControlValue};

/// Transport stream a request arrived on (the shell socket, in practice)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamHandle(pub u32);

impl StreamHandle {
    pub const SHELL: StreamHandle = StreamHandle(0);
}

/// Routing identity of the client that sent a request.
///
/// Output attribution follows this token, so it must survive capture and
/// replay untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity(pub Vec<String>);

impl Identity {
    pub fn new(frame: impl Into<String>) -> Self {
        Self(vec![frame.into()])
    }
}

/// Header of a request message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageHeader {
    pub msg_id: String,
    pub session: String,
    pub username: String,
    pub msg_type: String,
    pub date: DateTime<Utc>,
}

/// A request message as received from the front end: header plus content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMessage {
    pub header: MessageHeader,
    pub content: serde_json::Value,
}

impl RequestMessage {
    /// Build an `execute_request` for the given code
    pub fn execute(session: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            header: MessageHeader {
                msg_id: Uuid::new_v4().to_string(),
                session: session.into(),
                username: "cellblock".to_string(),
                msg_type: "execute_request".to_string(),
                date: Utc::now(),
            },
            content: serde_json::json!({
                "code": code.into(),
                "silent": false,
                "store_history": true,
            }),
        }
    }

    pub fn msg_id(&self) -> &str {
        &self.header.msg_id
    }

    /// The `code` field of an execute request, if present
    pub fn code(&self) -> Option<&str> {
        self.content.get("code").and_then(|c| c.as_str())
    }
}

/// A run-request exactly as the engine's dispatcher received it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub stream: StreamHandle,
    pub identity: Identity,
    pub parent: RequestMessage,
}

impl PendingRequest {
    pub fn new(stream: StreamHandle, identity: Identity, parent: RequestMessage) -> Self {
        Self {
            stream,
            identity,
            parent,
        }
    }
}

/// UI event targeting a control
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ControlUpdate {
    SetValue(ControlValue),
    Click,
}

/// One unit of work for the engine's event loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum KernelMessage {
    /// Run-request on the shell channel
    Execute(PendingRequest),
    /// Comm message from a front-end control
    Comm {
        target: ControlId,
        update: ControlUpdate,
    },
    /// Deliver `message` after `ticks` more iterations
    Timer {
        ticks: u32,
        message: Box<KernelMessage>,
    },
    /// Interrupt request on the control channel
    Interrupt,
}

impl KernelMessage {
    pub fn after_ticks(ticks: u32, message: KernelMessage) -> Self {
        KernelMessage::Timer {
            ticks,
            message: Box::new(message),
        }
    }
}

//! Wire types exchanged with the remote agent.
//!
//! The agent answers `/chat` and `/continue` requests with an NDJSON stream of
//! [`AgentEvent`]s. A `pending_file_ops` event ends the stream and hands control to the
//! client, which replies with one [`ToolOutput`] per proposed call via a [`ContinueRequest`].

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use strum_macros::Display;

/// One line of the agent's NDJSON stream.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Display)]
#[serde(tag = "type", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AgentEvent {
    /// Informational progress message.
    Status { message: String },

    ToolStart { name: String },

    ToolEnd {
        name: String,
        #[serde(default)]
        duration: Option<f64>,
        #[serde(default)]
        entities: Option<Value>,
    },

    TextStart,

    TextDelta {
        #[serde(default)]
        content: String,
    },

    TextEnd,

    /// Complete replacement of the assistant text produced so far.
    Text {
        #[serde(default)]
        content: String,
    },

    /// Proposed file operations awaiting a decision. Terminates the stream.
    PendingFileOps(PendingFileOpsEvent),

    Done(DoneEvent),

    Error { message: String },

    /// Event types this client does not know about.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct PendingFileOpsEvent {
    /// Token required to resume the exchange through `/continue`.
    #[serde(default)]
    pub id: Option<String>,
    /// Raw tool-call entries; shapes vary by agent tool and are normalized by the client.
    #[serde(default)]
    pub operations: Vec<Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct DoneEvent {
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub tool_calls: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ToolStatus {
    Completed,
    Failed,
}

/// Result of executing (or denying) one proposed call.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ToolOutput {
    pub call_id: Option<String>,
    pub status: ToolStatus,
    pub output: String,
}

impl ToolOutput {
    pub fn completed(call_id: Option<String>, output: impl Into<String>) -> Self {
        Self {
            call_id,
            status: ToolStatus::Completed,
            output: output.into(),
        }
    }

    pub fn failed(call_id: Option<String>, output: impl Into<String>) -> Self {
        Self {
            call_id,
            status: ToolStatus::Failed,
            output: output.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == ToolStatus::Failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub content: String,
}

/// Body of `POST {chat_api_url}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<HistoryMessage>,
}

/// Body of `POST {chat_api_url}/continue`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ContinueRequest {
    pub pending_id: String,
    pub tool_outputs: Vec<ToolOutput>,
}

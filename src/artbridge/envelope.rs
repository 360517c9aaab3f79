//! Wire Envelopes
//!
//! One JSON value per WebSocket frame, UTF-8, in both directions.
//!
//! Outbound (server → panel):
//!
//! ```json
//! {"id": 7, "script": "...", "command": {"type": "execute_task"}}
//! ```
//!
//! Inbound (panel → server):
//!
//! ```json
//! {"id": 7, "result": "{\"ok\":true,...}", "duration": 12.5}
//! ```
//!
//! The panel serializes script results as strings more often than not, so
//! [`ScriptResponse::outcome`] performs exactly one level of re-parsing on a
//! string `result` before classifying it as a [`TaskReport`] or the
//! freeform `{success, result?, error?, line?}` envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::error::BridgeError;
use super::executor::report::TaskReport;

/// Human-facing tag logged alongside a request; the panel echoes it back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptCommand {
    #[serde(rename = "type")]
    pub command_type: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, JsonValue>,
}

impl ScriptCommand {
    pub fn new(command_type: impl Into<String>) -> Self {
        Self {
            command_type: command_type.into(),
            extra: Default::default(),
        }
    }
}

/// Server → panel frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptRequest {
    /// Correlation id; monotonically increasing within the process.
    pub id: u64,
    /// The script to execute.
    pub script: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<ScriptCommand>,
}

impl ScriptRequest {
    pub fn new(id: u64, script: impl Into<String>) -> Self {
        Self {
            id,
            script: script.into(),
            command: None,
        }
    }

    pub fn with_command(mut self, command: ScriptCommand) -> Self {
        self.command = Some(command);
        self
    }

    /// Serialize into a single frame.
    pub fn to_frame(&self) -> Result<String, BridgeError> {
        serde_json::to_string(self)
            .map_err(|e| BridgeError::Transport(format!("failed to encode request: {}", e)))
    }
}

/// Panel → server frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptResponse {
    /// Echoed correlation id.
    pub id: u64,
    pub result: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<ScriptCommand>,
    /// Panel-side execution time in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

impl ScriptResponse {
    /// Parse an inbound frame. A frame that is not valid JSON is a
    /// transport error; valid JSON missing the contract fields is a
    /// protocol error.
    pub fn from_frame(frame: &str) -> Result<Self, BridgeError> {
        let value: JsonValue = serde_json::from_str(frame)
            .map_err(|e| BridgeError::Transport(format!("unparseable frame: {}", e)))?;
        serde_json::from_value(value)
            .map_err(|e| BridgeError::Protocol(format!("malformed response envelope: {}", e)))
    }

    /// The classified result payload; see [`ScriptOutcome`].
    pub fn outcome(&self) -> ScriptOutcome {
        classify_result(&self.result)
    }
}

/// Freeform script result envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeformResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Script line number for failures, when the host reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
}

/// What a script sent back: an executor report, a freeform envelope, or a
/// bare value from a script that returned neither.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOutcome {
    Report(Box<TaskReport>),
    Freeform(FreeformResult),
    Raw(JsonValue),
}

fn classify_result(result: &JsonValue) -> ScriptOutcome {
    // One level of re-parsing: panels frequently JSON-encode their result
    // into a string. A string that does not parse stays a raw string.
    let value: JsonValue = match result {
        JsonValue::String(text) => match serde_json::from_str(text) {
            Ok(parsed) => parsed,
            Err(_) => return ScriptOutcome::Raw(result.clone()),
        },
        other => other.clone(),
    };

    if let Some(obj) = value.as_object() {
        if obj.contains_key("ok") && obj.contains_key("stats") {
            if let Ok(report) = serde_json::from_value::<TaskReport>(value.clone()) {
                return ScriptOutcome::Report(Box::new(report));
            }
        }
        if obj.contains_key("success") {
            if let Ok(freeform) = serde_json::from_value::<FreeformResult>(value.clone()) {
                return ScriptOutcome::Freeform(freeform);
            }
        }
    }
    ScriptOutcome::Raw(value)
}

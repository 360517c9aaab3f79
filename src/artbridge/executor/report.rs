//! Task Reports and Error Codes
//!
//! A [`TaskReport`] is the sole return envelope of an executor invocation:
//! ok flag, per-stage timing, item stats, warnings, structured errors, and
//! optional trace lines / retry info / artifacts.
//!
//! Error codes fall into three categories:
//!
//! - **Validation (V)** — payload or document-binding problems; never
//!   retried; translated to argument errors at the tool layer.
//! - **Runtime (R)** — stage failures. `R001`/`R002` are retryable by
//!   default, `R005` (timeout) is retryable, the rest are not.
//! - **System (S)** — host or I/O failures; surfaced verbatim.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::refs::ItemRef;

/// Pipeline stage names as they appear in reports and retry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Validate,
    Collect,
    Compute,
    Apply,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::Collect => "collect",
            Stage::Compute => "compute",
            Stage::Apply => "apply",
        };
        write!(f, "{}", name)
    }
}

/// Structured error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// No active document.
    V001,
    /// Malformed payload (missing/empty task, bad shape).
    V002,
    /// Unrecognized target type.
    V003,
    /// Missing required target field (e.g. `layer.layer`, `compound.anyOf`).
    V004,
    /// Protocol version major mismatch.
    V008,
    /// Collection failure.
    R001,
    /// Compute failure.
    R002,
    /// Apply failure.
    R003,
    /// Per-item failure recorded by `safe_execute`; the stage continued.
    R004,
    /// Host-side timeout.
    R005,
    /// Invalid single-item operation.
    R006,
    /// Host or I/O failure.
    S001,
}

impl ErrorCode {
    /// Whether the safe retry wrapper may retry this code at all.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::R001 | ErrorCode::R002 | ErrorCode::R005)
    }

    /// Category letter: `V`, `R`, or `S`.
    pub fn category(&self) -> char {
        match self {
            ErrorCode::V001
            | ErrorCode::V002
            | ErrorCode::V003
            | ErrorCode::V004
            | ErrorCode::V008 => 'V',
            ErrorCode::S001 => 'S',
            _ => 'R',
        }
    }
}

/// One accumulated error: code, message, originating stage, and optionally
/// the item that failed plus free-form details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskError {
    pub code: ErrorCode,
    pub message: String,
    pub stage: Stage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<JsonValue>,
}

impl TaskError {
    pub fn new(code: ErrorCode, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            stage,
            item: None,
            details: None,
        }
    }

    /// Attach the reference of the item that failed.
    pub fn with_item(mut self, item: ItemRef) -> Self {
        self.item = Some(item);
        self
    }

    pub fn with_details(mut self, details: JsonValue) -> Self {
        self.details = Some(details);
        self
    }
}

/// Item counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    pub items_processed: usize,
    pub items_modified: usize,
    pub items_skipped: usize,
}

/// Per-stage elapsed milliseconds. Stages that never ran report zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskTiming {
    pub collect_ms: u64,
    pub compute_ms: u64,
    pub apply_ms: u64,
    pub total_ms: u64,
}

/// Filled in by the safe retry wrapper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryInfo {
    /// Total pipeline invocations, first attempt included.
    pub attempts: u32,
    /// Stages that triggered at least one retry.
    pub retried_stages: Vec<Stage>,
}

/// The executor's single return envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskReport {
    pub ok: bool,
    pub task: String,
    #[serde(default)]
    pub stats: TaskStats,
    #[serde(default)]
    pub timing: TaskTiming,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub errors: Vec<TaskError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_info: Option<RetryInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<JsonValue>,
}

impl TaskReport {
    /// A fresh report for a task, optimistically ok until an error lands.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            ok: true,
            task: task.into(),
            stats: TaskStats::default(),
            timing: TaskTiming::default(),
            warnings: Vec::new(),
            errors: Vec::new(),
            trace: None,
            retry_info: None,
            artifacts: None,
        }
    }

    /// Record an error; the report can never be ok afterwards.
    pub fn push_error(&mut self, error: TaskError) {
        self.ok = false;
        self.errors.push(error);
    }

    pub fn push_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Append a trace line when tracing is enabled.
    pub fn push_trace(&mut self, line: impl Into<String>) {
        if let Some(trace) = &mut self.trace {
            trace.push(line.into());
        }
    }

    /// Whether any recorded error sits on one of the given stages.
    pub fn has_error_on(&self, stages: &[Stage]) -> bool {
        self.errors.iter().any(|e| stages.contains(&e.stage))
    }
}

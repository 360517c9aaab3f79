//! Tool Surface Contract
//!
//! The seam between the external tool catalog and the bridge core. A tool
//! call is a name plus JSON arguments; it either comes back as a
//! [`ToolOutcome`] — the panel's answer, collapsed from whichever envelope
//! the script produced — or as a [`ToolCallError`] describing why no script
//! ever ran (or why the panel never answered).
//!
//! The split matters: a task that failed *inside* the panel is still an
//! outcome (`success: false`, errors in the output), while a broker
//! timeout, a refused library set, or rejected arguments never reach the
//! panel and surface as call errors. Callers get one of the two, never a
//! raw stack trace.

use std::error::Error;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::artbridge::envelope::{FreeformResult, ScriptOutcome, ScriptResponse};
use crate::artbridge::error::BridgeError;
use crate::artbridge::resolver::ResolverError;

/// What a completed tool call produced.
///
/// Panels answer in three shapes — a task report, the freeform
/// `{success, result?, error?, line?}` envelope, or a bare value — and this
/// type collapses all three so callers stop caring which script style ran.
/// The panel-side execution time rides along when the response carried one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Report `ok`, freeform `success`, or true for bare values.
    pub success: bool,
    /// The full task report, the freeform result, or the bare value.
    pub output: JsonValue,
    /// First failure the panel reported, with its script line when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Warnings accumulated by a task report; empty for other shapes.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Panel-side execution time in milliseconds, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<f64>,
}

impl ToolOutcome {
    /// Collapse a response envelope into the caller-facing outcome.
    pub fn from_response(response: &ScriptResponse) -> Self {
        match response.outcome() {
            ScriptOutcome::Report(report) => Self {
                success: report.ok,
                error: report
                    .errors
                    .first()
                    .map(|e| format!("{:?} at {}: {}", e.code, e.stage, e.message)),
                warnings: report.warnings.clone(),
                output: serde_json::to_value(&*report).unwrap_or(JsonValue::Null),
                duration_ms: response.duration,
            },
            ScriptOutcome::Freeform(FreeformResult {
                success,
                result,
                error,
                line,
            }) => Self {
                success,
                error: error.map(|message| match line {
                    Some(line) => format!("{} (line {})", message, line),
                    None => message,
                }),
                warnings: Vec::new(),
                output: result.unwrap_or(JsonValue::Null),
                duration_ms: response.duration,
            },
            ScriptOutcome::Raw(value) => Self {
                success: true,
                error: None,
                warnings: Vec::new(),
                output: value,
                duration_ms: response.duration,
            },
        }
    }
}

/// How a tool argument is interpreted when the call is assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgKind {
    /// ExtendScript source that becomes the script body.
    ScriptSource,
    /// Library names handed to the resolver ahead of the body.
    LibraryNames,
    /// The task name of a payload.
    TaskName,
    /// A target selector dict, wrapper or legacy flat form.
    Selector,
    /// Free-form task parameters, forwarded untouched.
    ParamsObject,
    /// Executor options: dryRun, trace, idPolicy, retry, idempotency.
    OptionsObject,
}

/// One argument a tool accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgSpec {
    pub name: String,
    pub kind: ArgKind,
    pub required: bool,
    pub summary: String,
}

impl ArgSpec {
    /// An argument the tool refuses to run without.
    pub fn required(name: impl Into<String>, kind: ArgKind, summary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            summary: summary.into(),
        }
    }

    /// An argument with a documented behavior when absent.
    pub fn optional(name: impl Into<String>, kind: ArgKind, summary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            summary: summary.into(),
        }
    }
}

/// A catalog entry: what a tool does, the arguments it takes, and the
/// script libraries its generated body leans on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<ArgSpec>,
    /// Libraries the tool requests from the resolver. `run_script` adds
    /// whatever the caller asks for on top.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<String>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            args: Vec::new(),
            libraries: Vec::new(),
        }
    }

    /// Declare an argument.
    pub fn with_arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    /// Declare the library set the tool's script body needs.
    pub fn with_libraries(mut self, libraries: &[&str]) -> Self {
        self.libraries = libraries.iter().map(|l| l.to_string()).collect();
        self
    }
}

/// Why a tool call produced no outcome at all.
///
/// `Library` and `Bridge` wrap the underlying failures so callers can match
/// on the bridge taxonomy (disconnect vs timeout vs refused assembly)
/// without string-sniffing.
#[derive(Debug)]
pub enum ToolCallError {
    /// No catalog entry under this name.
    UnknownTool(String),
    /// Arguments failed validation before any script was assembled.
    BadArguments(String),
    /// The resolver refused the requested library set.
    Library(ResolverError),
    /// The broker or transport failed underneath the call.
    Bridge(BridgeError),
}

impl fmt::Display for ToolCallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolCallError::UnknownTool(name) => {
                write!(f, "no tool named '{}' in the catalog", name)
            }
            ToolCallError::BadArguments(msg) => write!(f, "rejected arguments: {}", msg),
            ToolCallError::Library(e) => write!(f, "script assembly failed: {}", e),
            ToolCallError::Bridge(e) => write!(f, "panel call failed: {}", e),
        }
    }
}

impl Error for ToolCallError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ToolCallError::Library(e) => Some(e),
            ToolCallError::Bridge(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ResolverError> for ToolCallError {
    fn from(error: ResolverError) -> Self {
        ToolCallError::Library(error)
    }
}

impl From<BridgeError> for ToolCallError {
    fn from(error: BridgeError) -> Self {
        ToolCallError::Bridge(error)
    }
}

/// The bridge-facing tool registry: validated arguments in, exactly one
/// correlated panel round trip, an outcome back.
#[async_trait]
pub trait ToolSurface: Send + Sync {
    /// Run one tool call end to end.
    async fn call(&self, tool: &str, args: JsonValue) -> Result<ToolOutcome, ToolCallError>;

    /// Every tool this surface offers.
    fn catalog(&self) -> Vec<ToolSpec>;

    /// The catalog entry for one tool.
    fn describe(&self, tool: &str) -> Option<ToolSpec> {
        self.catalog().into_iter().find(|t| t.name == tool)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artbridge::executor::report::TaskReport;
    use serde_json::json;

    fn response_with(result: JsonValue, duration: Option<f64>) -> ScriptResponse {
        ScriptResponse {
            id: 1,
            result,
            command: None,
            duration,
        }
    }

    #[test]
    fn test_outcome_from_task_report_carries_warnings_and_duration() {
        let mut report = TaskReport::new("align");
        report.push_warning("dry run: apply skipped");
        let response = response_with(serde_json::to_value(&report).unwrap(), Some(4.5));

        let outcome = ToolOutcome::from_response(&response);
        assert!(outcome.success);
        assert_eq!(outcome.warnings, vec!["dry run: apply skipped"]);
        assert_eq!(outcome.duration_ms, Some(4.5));
        assert_eq!(outcome.output["task"], json!("align"));
    }

    #[test]
    fn test_outcome_from_failed_report_names_code_and_stage() {
        use crate::artbridge::executor::report::{ErrorCode, Stage, TaskError};
        let mut report = TaskReport::new("align");
        report.push_error(TaskError::new(ErrorCode::V001, Stage::Collect, "no active document"));
        let response = response_with(serde_json::to_value(&report).unwrap(), None);

        let outcome = ToolOutcome::from_response(&response);
        assert!(!outcome.success);
        let error = outcome.error.unwrap();
        assert!(error.contains("V001"));
        assert!(error.contains("collect"));
    }

    #[test]
    fn test_outcome_from_freeform_appends_script_line() {
        let response = response_with(
            json!({"success": false, "error": "ReferenceError: foo", "line": 12}),
            Some(0.8),
        );
        let outcome = ToolOutcome::from_response(&response);
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("ReferenceError: foo (line 12)")
        );
        assert_eq!(outcome.duration_ms, Some(0.8));
    }

    #[test]
    fn test_outcome_from_bare_value_succeeds() {
        let outcome = ToolOutcome::from_response(&response_with(json!("3 layers"), None));
        assert!(outcome.success);
        assert_eq!(outcome.output, json!("3 layers"));
        assert!(outcome.error.is_none());
    }

    #[test]
    fn test_arg_spec_constructors() {
        let script = ArgSpec::required("script", ArgKind::ScriptSource, "body to run");
        assert!(script.required);
        assert_eq!(script.kind, ArgKind::ScriptSource);
        let libs = ArgSpec::optional("libraries", ArgKind::LibraryNames, "prelude set");
        assert!(!libs.required);
    }

    #[test]
    fn test_tool_spec_builder() {
        let spec = ToolSpec::new("execute_task", "run a task payload")
            .with_arg(ArgSpec::required("task", ArgKind::TaskName, "task name"))
            .with_libraries(&["tasks", "geometry"]);
        assert_eq!(spec.args.len(), 1);
        assert_eq!(spec.libraries, vec!["tasks", "geometry"]);
    }

    #[test]
    fn test_call_error_display_and_source() {
        let unknown = ToolCallError::UnknownTool("draw_owl".into());
        assert!(unknown.to_string().contains("no tool named 'draw_owl'"));
        assert!(unknown.source().is_none());

        let bridge: ToolCallError = BridgeError::Disconnected.into();
        assert!(bridge.to_string().contains("panel call failed"));
        assert!(bridge.source().is_some());

        let library: ToolCallError = ResolverError::UnknownLibrary("zzz".into()).into();
        assert!(library.to_string().contains("unknown library: zzz"));
        assert!(library.source().is_some());
    }
}

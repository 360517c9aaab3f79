//! Panel Bridge Tool Surface
//!
//! The concrete [`ToolSurface`] that fronts the bridge core. Every tool
//! follows the same thin recipe: validate arguments, assemble a script
//! through the library resolver, perform exactly one broker call, collapse
//! the response into a [`ToolOutcome`]. Nothing here touches the transport
//! directly and nothing blocks on more than its own request.
//!
//! # Tools
//!
//! - **run_script** — freeform ExtendScript with an optional library list.
//! - **execute_task** — ship a declarative task payload to the panel-side
//!   task runner.
//! - **get_document_info** — basic facts about the active document.
//! - **get_task_history** — the panel's recent task reports.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use super::protocol::{ArgKind, ArgSpec, ToolCallError, ToolOutcome, ToolSpec, ToolSurface};
use crate::artbridge::broker::RequestBroker;
use crate::artbridge::envelope::ScriptCommand;
use crate::artbridge::resolver::LibraryResolver;

/// Library sets per tool. The catalog and the assembly step share these so
/// the advertised set cannot drift from the shipped one.
const TASK_LIBRARIES: &[&str] = &[
    "tasks",
    "geometry",
    "selection",
    "layout",
    "presets",
    "assets",
];
const DOCUMENT_INFO_LIBRARIES: &[&str] = &["core"];
const HISTORY_LIBRARIES: &[&str] = &["tasks"];

/// Tool surface routing calls through the broker to the connected panel.
pub struct PanelBridgeProtocol {
    broker: Arc<RequestBroker>,
    resolver: Arc<LibraryResolver>,
}

/// A validated tool call, ready for assembly.
struct PreparedCall {
    libraries: Vec<String>,
    body: String,
    command: ScriptCommand,
}

impl PanelBridgeProtocol {
    pub fn new(broker: Arc<RequestBroker>, resolver: Arc<LibraryResolver>) -> Self {
        Self { broker, resolver }
    }

    fn prepare(&self, tool: &str, args: &JsonValue) -> Result<PreparedCall, ToolCallError> {
        match tool {
            "run_script" => {
                let body = args
                    .get("script")
                    .and_then(JsonValue::as_str)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| {
                        ToolCallError::BadArguments(
                            "run_script requires a 'script' string".into(),
                        )
                    })?
                    .to_string();
                let libraries = match args.get("libraries") {
                    None => Vec::new(),
                    Some(value) => value
                        .as_array()
                        .ok_or_else(|| {
                            ToolCallError::BadArguments(
                                "'libraries' must be an array of names".into(),
                            )
                        })?
                        .iter()
                        .map(|v| {
                            v.as_str().map(str::to_string).ok_or_else(|| {
                                ToolCallError::BadArguments(
                                    "'libraries' must be an array of names".into(),
                                )
                            })
                        })
                        .collect::<Result<Vec<_>, _>>()?,
                };
                Ok(PreparedCall {
                    libraries,
                    body,
                    command: ScriptCommand::new("run_script"),
                })
            }
            "execute_task" => {
                let payload =
                    crate::artbridge::executor::TaskPayload::from_value(args).map_err(|e| {
                        ToolCallError::BadArguments(format!("{:?}: {}", e.code, e.message))
                    })?;
                let encoded = serde_json::to_string(&payload).map_err(|e| {
                    ToolCallError::BadArguments(format!("unencodable payload: {}", e))
                })?;
                Ok(PreparedCall {
                    libraries: TASK_LIBRARIES.iter().map(|l| l.to_string()).collect(),
                    body: format!("runTask({});", encoded),
                    command: ScriptCommand::new("execute_task"),
                })
            }
            "get_document_info" => Ok(PreparedCall {
                libraries: DOCUMENT_INFO_LIBRARIES.iter().map(|l| l.to_string()).collect(),
                body: "abSafeRun(function () {\n\
                       \x20   var doc = app.activeDocument;\n\
                       \x20   return { name: doc.name, layers: doc.layers.length, artboards: doc.artboards.length, selection: doc.selection.length };\n\
                       });"
                    .to_string(),
                command: ScriptCommand::new("document_info"),
            }),
            "get_task_history" => Ok(PreparedCall {
                libraries: HISTORY_LIBRARIES.iter().map(|l| l.to_string()).collect(),
                body: "abSafeRun(function () { return AB_TASK_HISTORY; });".to_string(),
                command: ScriptCommand::new("task_history"),
            }),
            other => Err(ToolCallError::UnknownTool(other.to_string())),
        }
    }
}

#[async_trait]
impl ToolSurface for PanelBridgeProtocol {
    async fn call(&self, tool: &str, args: JsonValue) -> Result<ToolOutcome, ToolCallError> {
        let prepared = self.prepare(tool, &args)?;
        let libraries: Vec<&str> = prepared.libraries.iter().map(String::as_str).collect();
        let script = self.resolver.resolve(&libraries, &prepared.body)?;

        // Exactly one broker call per tool invocation; broker-level
        // failures surface as call errors, never as an outcome.
        let response = self
            .broker
            .send_script(script, Some(prepared.command))
            .await?;
        Ok(ToolOutcome::from_response(&response))
    }

    fn catalog(&self) -> Vec<ToolSpec> {
        vec![
            ToolSpec::new("run_script", "Run freeform ExtendScript in the panel")
                .with_arg(ArgSpec::required(
                    "script",
                    ArgKind::ScriptSource,
                    "ExtendScript source to execute",
                ))
                .with_arg(ArgSpec::optional(
                    "libraries",
                    ArgKind::LibraryNames,
                    "Libraries to prepend; none by default",
                )),
            ToolSpec::new(
                "execute_task",
                "Run a declarative task payload through the panel task runner",
            )
            .with_arg(ArgSpec::required("task", ArgKind::TaskName, "Task name"))
            .with_arg(ArgSpec::optional(
                "targets",
                ArgKind::Selector,
                "What the task operates on; nothing when absent",
            ))
            .with_arg(ArgSpec::optional(
                "params",
                ArgKind::ParamsObject,
                "Free-form task parameters",
            ))
            .with_arg(ArgSpec::optional(
                "options",
                ArgKind::OptionsObject,
                "dryRun, trace, idPolicy, retry, idempotency",
            ))
            .with_libraries(TASK_LIBRARIES),
            ToolSpec::new("get_document_info", "Summarize the active document")
                .with_libraries(DOCUMENT_INFO_LIBRARIES),
            ToolSpec::new("get_task_history", "Recent task reports from this session")
                .with_libraries(HISTORY_LIBRARIES),
        ]
    }
}

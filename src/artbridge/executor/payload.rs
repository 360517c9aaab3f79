//! Task Payloads
//!
//! The declarative input of the executor: a task name, an optional protocol
//! version, a target selector, free-form params, and options. The wire form
//! is untyped JSON; [`TaskPayload::from_value`] lifts it into tagged
//! variants and reports malformed shapes as structured validation errors
//! rather than serde messages.
//!
//! Two selector forms are accepted. The wrapper form:
//!
//! ```json
//! {"targets": {"target": {"type": "layer", "layer": "L1"}, "orderBy": "name"}}
//! ```
//!
//! and the legacy flat form, where the target fields and `orderBy`/`exclude`
//! ride in one dict:
//!
//! ```json
//! {"targets": {"type": "layer", "layer": "L1", "orderBy": "name"}}
//! ```
//!
//! Both normalize to [`TargetSelector`] on entry; only the wrapper exists
//! internally.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::report::{ErrorCode, Stage, TaskError};

/// Protocol version the executor speaks; payloads must match on the major.
pub const PROTOCOL_VERSION: &str = "2.1";

/// How items are ordered after collection. All modes are stable within the
/// input sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderBy {
    /// Host stacking order (the default).
    #[default]
    ZOrder,
    ZOrderReverse,
    /// Rows top-down (10-unit buckets), then left to right.
    Reading,
    /// Columns left-right (10-unit buckets), then top down.
    Column,
    /// Lexicographic by name; empty names sort first.
    Name,
    PositionX,
    PositionY,
    Area,
}

/// Item predicates ORed into the global (or compound-local) exclusion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExcludeFilter {
    pub locked: bool,
    pub hidden: bool,
    pub guides: bool,
    /// Item has an ancestor group whose clipped flag is set (not "is the
    /// mask itself").
    pub clipped: bool,
}

impl ExcludeFilter {
    /// Whether any predicate is enabled at all.
    pub fn is_active(&self) -> bool {
        self.locked || self.hidden || self.guides || self.clipped
    }
}

/// What the task operates on.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Target {
    /// Snapshot of the current selection.
    Selection,
    /// Every layer's items.
    All { recursive: bool },
    /// Items of one named layer.
    Layer { layer: String, recursive: bool },
    /// Walk layers filtering by type and name pattern (`*`/`?` wildcards).
    Query {
        #[serde(skip_serializing_if = "Option::is_none")]
        layer: Option<String>,
        #[serde(rename = "itemType", skip_serializing_if = "Option::is_none")]
        item_type: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        recursive: bool,
    },
    /// Concatenation of sub-targets in declaration order, with an optional
    /// local exclusion applied before returning.
    Compound {
        #[serde(rename = "anyOf")]
        any_of: Vec<Target>,
        #[serde(skip_serializing_if = "Option::is_none")]
        exclude: Option<ExcludeFilter>,
    },
}

fn validation_error(code: ErrorCode, message: impl Into<String>) -> TaskError {
    TaskError::new(code, Stage::Validate, message)
}

fn bool_field(obj: &serde_json::Map<String, JsonValue>, key: &str) -> bool {
    obj.get(key).and_then(JsonValue::as_bool).unwrap_or(false)
}

fn string_field(obj: &serde_json::Map<String, JsonValue>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(JsonValue::as_str)
        .map(str::to_string)
}

impl Target {
    /// Parse a target dict, reporting unrecognized types as `V003` and
    /// missing type-specific fields as `V004`.
    pub fn from_value(value: &JsonValue) -> Result<Self, TaskError> {
        let obj = value
            .as_object()
            .ok_or_else(|| validation_error(ErrorCode::V002, "target must be an object"))?;
        let target_type = obj
            .get("type")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| validation_error(ErrorCode::V003, "target is missing a type"))?;

        match target_type {
            "selection" => Ok(Target::Selection),
            "all" => Ok(Target::All {
                recursive: bool_field(obj, "recursive"),
            }),
            "layer" => {
                let layer = string_field(obj, "layer").filter(|l| !l.is_empty()).ok_or_else(|| {
                    validation_error(ErrorCode::V004, "layer target requires a 'layer' name")
                })?;
                Ok(Target::Layer {
                    layer,
                    recursive: bool_field(obj, "recursive"),
                })
            }
            "query" => Ok(Target::Query {
                layer: string_field(obj, "layer"),
                item_type: string_field(obj, "itemType"),
                pattern: string_field(obj, "pattern"),
                recursive: bool_field(obj, "recursive"),
            }),
            "compound" => {
                let any_of = obj
                    .get("anyOf")
                    .and_then(JsonValue::as_array)
                    .filter(|a| !a.is_empty())
                    .ok_or_else(|| {
                        validation_error(
                            ErrorCode::V004,
                            "compound target requires a non-empty 'anyOf' list",
                        )
                    })?;
                let any_of = any_of
                    .iter()
                    .map(Target::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                let exclude = match obj.get("exclude") {
                    None => None,
                    Some(v) => Some(parse_exclude(v)?),
                };
                Ok(Target::Compound { any_of, exclude })
            }
            other => Err(validation_error(
                ErrorCode::V003,
                format!("unrecognized target type '{}'", other),
            )),
        }
    }

    /// Re-check type-specific required fields on an already-typed target.
    /// Catches payloads constructed in code rather than parsed from JSON.
    pub fn validate(&self) -> Result<(), TaskError> {
        match self {
            Target::Layer { layer, .. } if layer.is_empty() => Err(validation_error(
                ErrorCode::V004,
                "layer target requires a 'layer' name",
            )),
            Target::Compound { any_of, .. } => {
                if any_of.is_empty() {
                    return Err(validation_error(
                        ErrorCode::V004,
                        "compound target requires a non-empty 'anyOf' list",
                    ));
                }
                for sub in any_of {
                    sub.validate()?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn parse_exclude(value: &JsonValue) -> Result<ExcludeFilter, TaskError> {
    serde_json::from_value(value.clone())
        .map_err(|e| validation_error(ErrorCode::V002, format!("invalid exclude filter: {}", e)))
}

fn parse_order_by(value: &JsonValue) -> Result<OrderBy, TaskError> {
    serde_json::from_value(value.clone())
        .map_err(|_| validation_error(ErrorCode::V002, format!("unknown orderBy {}", value)))
}

/// A target plus the global ordering and exclusion applied after collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSelector {
    pub target: Target,
    pub order_by: OrderBy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude: Option<ExcludeFilter>,
}

impl TargetSelector {
    /// Wrap a target with default ordering and no exclusion.
    pub fn new(target: Target) -> Self {
        Self {
            target,
            order_by: OrderBy::default(),
            exclude: None,
        }
    }

    /// Set the ordering mode.
    pub fn with_order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = order_by;
        self
    }

    /// Set the global exclusion filter.
    pub fn with_exclude(mut self, exclude: ExcludeFilter) -> Self {
        self.exclude = Some(exclude);
        self
    }

    /// Parse either selector form, normalizing the legacy flat dict into the
    /// wrapper.
    pub fn from_value(value: &JsonValue) -> Result<Self, TaskError> {
        let obj = value
            .as_object()
            .ok_or_else(|| validation_error(ErrorCode::V002, "targets must be an object"))?;

        let (target, order_by_value, exclude_value) = if let Some(inner) = obj.get("target") {
            (
                Target::from_value(inner)?,
                obj.get("orderBy").cloned(),
                obj.get("exclude").cloned(),
            )
        } else {
            // Legacy flat dict: orderBy/exclude ride alongside the target
            // fields and must not leak into target parsing.
            let mut flat = obj.clone();
            let order_by = flat.remove("orderBy");
            let exclude = flat.remove("exclude");
            (
                Target::from_value(&JsonValue::Object(flat))?,
                order_by,
                exclude,
            )
        };

        let order_by = match order_by_value {
            None => OrderBy::default(),
            Some(v) => parse_order_by(&v)?,
        };
        let exclude = match exclude_value {
            None => None,
            Some(v) => Some(parse_exclude(&v)?),
        };
        Ok(Self {
            target,
            order_by,
            exclude,
        })
    }
}

/// Identity marker policy for collected items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdPolicy {
    /// No writes.
    #[default]
    None,
    /// Assign a fresh id only where none exists.
    OptIn,
    /// Always assign; flag a conflict when an id already existed.
    Always,
    /// Report existing ids; never write.
    Preserve,
}

/// Caller's assertion about whether re-running apply is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Idempotency {
    Safe,
    #[default]
    Unknown,
    Unsafe,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retryable_stages() -> Vec<Stage> {
    vec![Stage::Collect, Stage::Compute]
}

/// Retry policy for the safe retry wrapper. `apply` is honored in
/// `retryable_stages` only when the payload asserts `idempotency: "safe"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryPolicy {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retryable_stages")]
    pub retryable_stages: Vec<Stage>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retryable_stages: default_retryable_stages(),
        }
    }
}

/// Per-invocation switches. Absent fields take their documented defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskOptions {
    pub dry_run: bool,
    pub trace: bool,
    pub id_policy: IdPolicy,
    /// Host-side execution budget in milliseconds, forwarded untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    pub idempotency: Idempotency,
}

/// The executor's declarative input.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskPayload {
    pub task: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub targets: Option<TargetSelector>,
    pub params: JsonValue,
    pub options: TaskOptions,
}

impl TaskPayload {
    /// A payload for `task` with defaults everywhere else.
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            version: Some(PROTOCOL_VERSION.to_string()),
            targets: None,
            params: JsonValue::Object(Default::default()),
            options: TaskOptions::default(),
        }
    }

    /// Select a bare target with default ordering.
    pub fn with_target(mut self, target: Target) -> Self {
        self.targets = Some(TargetSelector::new(target));
        self
    }

    /// Select with a fully specified selector.
    pub fn with_targets(mut self, selector: TargetSelector) -> Self {
        self.targets = Some(selector);
        self
    }

    pub fn with_params(mut self, params: JsonValue) -> Self {
        self.params = params;
        self
    }

    pub fn with_options(mut self, options: TaskOptions) -> Self {
        self.options = options;
        self
    }

    /// Lift a wire payload into the typed form. Shape problems come back as
    /// structured validation errors, never serde messages.
    pub fn from_value(value: &JsonValue) -> Result<Self, TaskError> {
        let obj = value
            .as_object()
            .ok_or_else(|| validation_error(ErrorCode::V002, "payload must be an object"))?;

        let task = obj
            .get("task")
            .and_then(JsonValue::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                validation_error(ErrorCode::V002, "payload requires a non-empty 'task'")
            })?
            .to_string();

        let version = string_field(obj, "version");

        let targets = match obj.get("targets") {
            None => None,
            Some(v) => Some(TargetSelector::from_value(v)?),
        };

        let params = obj
            .get("params")
            .cloned()
            .unwrap_or_else(|| JsonValue::Object(Default::default()));

        let options = match obj.get("options") {
            None => TaskOptions::default(),
            Some(v) => serde_json::from_value(v.clone()).map_err(|e| {
                validation_error(ErrorCode::V002, format!("invalid options: {}", e))
            })?,
        };

        Ok(Self {
            task,
            version,
            targets,
            params,
            options,
        })
    }
}

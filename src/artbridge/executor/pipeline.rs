//! Task Execution Pipeline
//!
//! The executor runs a declarative [`TaskPayload`] through four stages —
//! validate, collect, compute, apply — over the active document and returns
//! a single [`TaskReport`]. Task-specific behavior is injected as three
//! callables bundled in [`TaskCallbacks`]:
//!
//! - **collect** enumerates candidate items for an (already unwrapped)
//!   target; read-only. The standard resolver is installed by default.
//! - **compute** turns collected items plus params into a list of action
//!   descriptors; pure with respect to the document, may append warnings.
//! - **apply** is the only stage permitted to mutate the document; it must
//!   error on failure so the run records an `R003`.
//!
//! The executor applies the global exclusion filter and `orderBy` exactly
//! once, after collection, then assigns identity markers per the payload's
//! id policy. Per-stage wall time lands in the report; stages that never
//! ran report zero.
//!
//! # Retry
//!
//! [`TaskExecutor::execute_task_with_retry_safe`] re-runs the pipeline while
//! the last report is not ok, the attempt budget remains, and at least one
//! error is retryable on a stage the policy allows. `apply` is never
//! retried unless the payload asserts `idempotency: "safe"` — a failed
//! compute can be re-run for free, a half-applied mutation cannot.

use std::collections::VecDeque;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use super::collect::collect_items;
use super::document::{Application, Document, ItemId};
use super::ordering::{apply_exclusion, order_items};
use super::payload::{IdPolicy, Idempotency, RetryPolicy, Target, TaskPayload};
use super::refs::{assign_ids, ItemRef};
use super::report::{ErrorCode, RetryInfo, Stage, TaskError, TaskReport};

/// Reports kept in the in-session history before FIFO eviction.
const HISTORY_CAPACITY: usize = 50;

/// Action descriptors produced by compute and consumed by apply. Kept
/// dynamic: each task defines its own action shape.
pub type Action = JsonValue;

/// Result of a collect callable.
pub type CollectResult = Result<Vec<ItemId>, TaskError>;

type CollectFn = dyn FnMut(&Document, &Target) -> CollectResult + Send;
type ComputeFn =
    dyn FnMut(&Document, &[ItemId], &JsonValue, &mut TaskReport) -> Result<Vec<Action>, String>
        + Send;
type ApplyFn = dyn FnMut(&mut Document, &[Action], &mut TaskReport) -> Result<(), String> + Send;

/// The three stage callables for one task, with the standard target
/// resolver installed as the default collector.
pub struct TaskCallbacks {
    collect: Box<CollectFn>,
    compute: Box<ComputeFn>,
    apply: Box<ApplyFn>,
}

impl TaskCallbacks {
    /// Callbacks with the standard collector and the given compute/apply.
    pub fn new<C, A>(compute: C, apply: A) -> Self
    where
        C: FnMut(&Document, &[ItemId], &JsonValue, &mut TaskReport) -> Result<Vec<Action>, String>
            + Send
            + 'static,
        A: FnMut(&mut Document, &[Action], &mut TaskReport) -> Result<(), String> + Send + 'static,
    {
        Self {
            collect: Box::new(|doc, target| collect_items(doc, target)),
            compute: Box::new(compute),
            apply: Box::new(apply),
        }
    }

    /// Replace the collector (e.g. to stub enumeration in tests).
    pub fn with_collect<F>(mut self, collect: F) -> Self
    where
        F: FnMut(&Document, &Target) -> CollectResult + Send + 'static,
    {
        self.collect = Box::new(collect);
        self
    }

    /// Callbacks that compute nothing and apply nothing. Used by probe tasks
    /// like `ping`.
    pub fn noop() -> Self {
        Self::new(|_, _, _, _| Ok(Vec::new()), |_, _, _| Ok(()))
    }
}

/// One remembered run.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub task: String,
    pub timestamp: DateTime<Utc>,
    pub report: TaskReport,
}

/// Runs payloads through the pipeline and remembers the last fifty reports.
///
/// The executor holds no document state; documents belong to the host and
/// every reference taken during a run dies with that run.
pub struct TaskExecutor {
    history: VecDeque<HistoryEntry>,
    /// Visible-bounds policy for clipping groups, used by ordering and
    /// reporting. The host's own `visibleBounds` would report content
    /// bounds instead.
    pub use_mask_bounds_for_clipped_groups: bool,
}

impl TaskExecutor {
    pub fn new() -> Self {
        Self {
            history: VecDeque::new(),
            use_mask_bounds_for_clipped_groups: true,
        }
    }

    /// Override the clipping-group bounds policy.
    pub fn with_mask_bounds_policy(mut self, use_mask_bounds: bool) -> Self {
        self.use_mask_bounds_for_clipped_groups = use_mask_bounds;
        self
    }

    /// The remembered runs, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.history.iter()
    }

    fn remember(&mut self, report: &TaskReport) {
        if self.history.len() == HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(HistoryEntry {
            task: report.task.clone(),
            timestamp: Utc::now(),
            report: report.clone(),
        });
    }

    /// Run one payload through validate → collect → compute → apply.
    pub fn execute_task(
        &mut self,
        app: &mut Application,
        payload: &TaskPayload,
        callbacks: &mut TaskCallbacks,
    ) -> TaskReport {
        let mut report = TaskReport::new(&payload.task);
        if payload.options.trace {
            report.trace = Some(Vec::new());
        }

        // Validate: payload shape first, then document binding. Failures
        // return with zeroed timings.
        if payload.task.is_empty() {
            report.push_error(TaskError::new(
                ErrorCode::V002,
                Stage::Validate,
                "task name must not be empty",
            ));
            self.remember(&report);
            return report;
        }
        if let Some(version) = &payload.version {
            let major = version.split('.').next().unwrap_or("");
            if major != "2" {
                report.push_error(TaskError::new(
                    ErrorCode::V008,
                    Stage::Validate,
                    format!("unsupported protocol version '{}' (expected major 2)", version),
                ));
                self.remember(&report);
                return report;
            }
        }
        if let Some(selector) = &payload.targets {
            if let Err(error) = selector.target.validate() {
                report.push_error(error);
                self.remember(&report);
                return report;
            }
        }
        report.push_trace("validate: ok");

        let doc = match app.active_document_mut() {
            Some(doc) => doc,
            None => {
                report.push_error(TaskError::new(
                    ErrorCode::V001,
                    Stage::Collect,
                    "no active document",
                ));
                self.remember(&report);
                return report;
            }
        };

        let run_started = Instant::now();

        // Collect, then apply the global exclusion and ordering exactly
        // once, then assign ids per policy.
        let collect_started = Instant::now();
        let items = match &payload.targets {
            None => Vec::new(),
            Some(selector) => match (callbacks.collect)(doc, &selector.target) {
                Ok(collected) => {
                    let filtered = match &selector.exclude {
                        Some(filter) => apply_exclusion(doc, collected, filter),
                        None => collected,
                    };
                    order_items(
                        doc,
                        filtered,
                        selector.order_by,
                        self.use_mask_bounds_for_clipped_groups,
                    )
                }
                Err(error) => {
                    report.push_error(error);
                    report.timing.collect_ms = collect_started.elapsed().as_millis() as u64;
                    report.timing.total_ms = run_started.elapsed().as_millis() as u64;
                    self.remember(&report);
                    return report;
                }
            },
        };
        if payload.options.id_policy != IdPolicy::None {
            let assignments = assign_ids(doc, &items, payload.options.id_policy);
            if !assignments.is_empty() {
                report.artifacts = Some(serde_json::json!({
                    "idAssignments": assignments,
                }));
            }
        }
        report.stats.items_processed = items.len();
        report.timing.collect_ms = collect_started.elapsed().as_millis() as u64;
        report.push_trace(format!("collect: {} items", items.len()));

        if items.is_empty() {
            report.push_warning("collection produced no items; compute and apply skipped");
            report.timing.total_ms = run_started.elapsed().as_millis() as u64;
            self.remember(&report);
            return report;
        }

        // Compute.
        let compute_started = Instant::now();
        let actions =
            match (callbacks.compute)(doc, &items, &payload.params, &mut report) {
                Ok(actions) => actions,
                Err(message) => {
                    report.push_error(TaskError::new(ErrorCode::R002, Stage::Compute, message));
                    report.timing.compute_ms = compute_started.elapsed().as_millis() as u64;
                    report.timing.total_ms = run_started.elapsed().as_millis() as u64;
                    self.remember(&report);
                    return report;
                }
            };
        report.timing.compute_ms = compute_started.elapsed().as_millis() as u64;
        report.push_trace(format!("compute: {} actions", actions.len()));

        // Apply. Never auto-retried here; see the retry wrapper.
        let apply_started = Instant::now();
        if payload.options.dry_run {
            report.push_warning("dry run: apply skipped");
            report.push_trace("apply: skipped (dry run)");
        } else if let Err(message) = (callbacks.apply)(doc, &actions, &mut report) {
            report.push_error(TaskError::new(ErrorCode::R003, Stage::Apply, message));
        } else {
            report.push_trace("apply: done");
        }
        report.timing.apply_ms = apply_started.elapsed().as_millis() as u64;
        report.timing.total_ms = run_started.elapsed().as_millis() as u64;

        self.remember(&report);
        report
    }

    /// Re-run the pipeline on retryable failures, never re-applying unless
    /// the payload asserts idempotency.
    pub fn execute_task_with_retry_safe(
        &mut self,
        app: &mut Application,
        payload: &TaskPayload,
        callbacks: &mut TaskCallbacks,
    ) -> TaskReport {
        let policy = payload.options.retry.clone().unwrap_or_else(RetryPolicy::default);
        let allowed: Vec<Stage> = policy
            .retryable_stages
            .iter()
            .copied()
            .filter(|stage| {
                *stage != Stage::Apply || payload.options.idempotency == Idempotency::Safe
            })
            .collect();

        let mut attempts = 0;
        let mut retried_stages: Vec<Stage> = Vec::new();
        loop {
            attempts += 1;
            let mut report = self.execute_task(app, payload, callbacks);

            // A code must be retryable on an allowed stage. R003 gets one
            // special case: listing apply at all required the idempotency
            // assertion, and asserted-idempotent applies may re-run.
            let retry_triggers: Vec<Stage> = report
                .errors
                .iter()
                .filter(|e| allowed.contains(&e.stage))
                .filter(|e| {
                    e.code.is_retryable()
                        || (e.code == ErrorCode::R003 && e.stage == Stage::Apply)
                })
                .map(|e| e.stage)
                .collect();

            if report.ok || attempts >= policy.max_attempts || retry_triggers.is_empty() {
                if attempts > 1 {
                    let info = RetryInfo {
                        attempts,
                        retried_stages: retried_stages.clone(),
                    };
                    report.retry_info = Some(info.clone());
                    if let Some(last) = self.history.back_mut() {
                        last.report.retry_info = Some(info);
                    }
                }
                return report;
            }
            for stage in retry_triggers {
                if !retried_stages.contains(&stage) {
                    retried_stages.push(stage);
                }
            }
            log::debug!(
                "task '{}' attempt {} failed on retryable stage; retrying",
                payload.task,
                attempts
            );
        }
    }
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::new()
    }
}

/// Run a per-item operation under the stage-continues error policy: a
/// failure records an `R004` carrying the item's reference, bumps
/// `itemsSkipped`, and the caller moves on to the next item.
pub fn safe_execute<T, F>(
    doc: &Document,
    id: ItemId,
    stage: Stage,
    report: &mut TaskReport,
    operation: F,
) -> Option<T>
where
    F: FnOnce() -> Result<T, String>,
{
    match operation() {
        Ok(value) => Some(value),
        Err(message) => {
            report.push_error(
                TaskError::new(ErrorCode::R004, stage, message)
                    .with_item(ItemRef::describe(doc, id)),
            );
            report.stats.items_skipped += 1;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artbridge::executor::document::{Document, ItemKind};
    use crate::artbridge::executor::payload::{TargetSelector, TaskOptions};

    fn doc_with_layer() -> Application {
        let mut doc = Document::new("test");
        let layer = doc.add_layer("L1");
        doc.add_item(layer, ItemKind::Path, "a", [0.0, 10.0, 10.0, 0.0]);
        doc.add_item(layer, ItemKind::Path, "b", [20.0, 10.0, 30.0, 0.0]);
        Application::with_document(doc)
    }

    #[test]
    fn test_ping_without_document_is_v001_with_zero_timing() {
        let mut app = Application::new();
        let mut executor = TaskExecutor::new();
        let payload = TaskPayload::new("ping");
        let report = executor.execute_task(&mut app, &payload, &mut TaskCallbacks::noop());

        assert!(!report.ok);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].code, ErrorCode::V001);
        assert_eq!(report.errors[0].stage, Stage::Collect);
        assert_eq!(report.timing.collect_ms, 0);
        assert_eq!(report.timing.compute_ms, 0);
        assert_eq!(report.timing.apply_ms, 0);
        assert_eq!(report.timing.total_ms, 0);
    }

    #[test]
    fn test_typed_target_with_missing_fields_is_v004() {
        let mut app = doc_with_layer();
        let mut executor = TaskExecutor::new();
        let payload = TaskPayload::new("bad").with_target(Target::Layer {
            layer: String::new(),
            recursive: false,
        });
        let report = executor.execute_task(&mut app, &payload, &mut TaskCallbacks::noop());
        assert_eq!(report.errors[0].code, ErrorCode::V004);
        assert_eq!(report.errors[0].stage, Stage::Validate);
    }

    #[test]
    fn test_version_major_mismatch_is_v008() {
        let mut app = doc_with_layer();
        let mut executor = TaskExecutor::new();
        let mut payload = TaskPayload::new("ping");
        payload.version = Some("3.0".to_string());
        let report = executor.execute_task(&mut app, &payload, &mut TaskCallbacks::noop());
        assert_eq!(report.errors[0].code, ErrorCode::V008);
    }

    #[test]
    fn test_empty_collection_skips_compute_and_apply() {
        let mut app = doc_with_layer();
        let mut executor = TaskExecutor::new();
        let payload = TaskPayload::new("count").with_target(Target::Selection);
        let mut callbacks = TaskCallbacks::new(
            |_, _, _, _| panic!("compute must not run on empty collection"),
            |_, _, _| panic!("apply must not run"),
        );
        let report = executor.execute_task(&mut app, &payload, &mut callbacks);
        assert!(report.ok);
        assert_eq!(report.stats.items_processed, 0);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_dry_run_skips_apply_with_warning() {
        let mut app = doc_with_layer();
        let mut executor = TaskExecutor::new();
        let payload = TaskPayload::new("touch")
            .with_target(Target::All { recursive: false })
            .with_options(TaskOptions {
                dry_run: true,
                ..Default::default()
            });
        let mut callbacks = TaskCallbacks::new(
            |_, items, _, _| Ok(vec![serde_json::json!({"count": items.len()})]),
            |_, _, _| panic!("apply must not run on dry run"),
        );
        let report = executor.execute_task(&mut app, &payload, &mut callbacks);
        assert!(report.ok);
        assert!(report.warnings.iter().any(|w| w.contains("dry run")));
    }

    #[test]
    fn test_compute_failure_is_r002_and_apply_skipped() {
        let mut app = doc_with_layer();
        let mut executor = TaskExecutor::new();
        let payload = TaskPayload::new("boom").with_target(Target::All { recursive: false });
        let mut callbacks = TaskCallbacks::new(
            |_, _, _, _| Err("compute exploded".to_string()),
            |_, _, _| panic!("apply must not run"),
        );
        let report = executor.execute_task(&mut app, &payload, &mut callbacks);
        assert!(!report.ok);
        assert_eq!(report.errors[0].code, ErrorCode::R002);
        assert_eq!(report.timing.apply_ms, 0);
    }

    #[test]
    fn test_trace_lines_cover_stages() {
        let mut app = doc_with_layer();
        let mut executor = TaskExecutor::new();
        let payload = TaskPayload::new("traced")
            .with_target(Target::All { recursive: false })
            .with_options(TaskOptions {
                trace: true,
                ..Default::default()
            });
        let report = executor.execute_task(&mut app, &payload, &mut TaskCallbacks::noop());
        let trace = report.trace.unwrap();
        assert!(trace.iter().any(|l| l.starts_with("validate")));
        assert!(trace.iter().any(|l| l.starts_with("collect")));
        assert!(trace.iter().any(|l| l.starts_with("apply")));
    }

    #[test]
    fn test_history_ring_buffer_evicts_fifo() {
        let mut app = doc_with_layer();
        let mut executor = TaskExecutor::new();
        for i in 0..(HISTORY_CAPACITY + 5) {
            let payload = TaskPayload::new(format!("task_{}", i));
            executor.execute_task(&mut app, &payload, &mut TaskCallbacks::noop());
        }
        assert_eq!(executor.history().count(), HISTORY_CAPACITY);
        assert_eq!(executor.history().next().unwrap().task, "task_5");
    }

    #[test]
    fn test_safe_execute_records_item_and_continues() {
        let mut app = doc_with_layer();
        let doc = app.active_document_mut().unwrap();
        let mut report = TaskReport::new("per_item");
        let ok: Option<u32> = safe_execute(doc, 0, Stage::Apply, &mut report, || Ok(7));
        assert_eq!(ok, Some(7));
        let failed: Option<u32> =
            safe_execute(doc, 1, Stage::Apply, &mut report, || Err("locked".into()));
        assert!(failed.is_none());
        assert_eq!(report.stats.items_skipped, 1);
        assert_eq!(report.errors[0].code, ErrorCode::R004);
        assert_eq!(report.errors[0].item.as_ref().unwrap().item_name, "b");
    }

    #[test]
    fn test_selector_ordering_applied_once_globally() {
        let mut app = doc_with_layer();
        let mut executor = TaskExecutor::new();
        let payload = TaskPayload::new("order").with_targets(
            TargetSelector::new(Target::All { recursive: false })
                .with_order_by(crate::artbridge::executor::payload::OrderBy::ZOrderReverse),
        );
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let mut callbacks = TaskCallbacks::new(
            move |doc, items, _, _| {
                let names: Vec<String> =
                    items.iter().map(|&i| doc.item(i).name.clone()).collect();
                sink.lock().unwrap().extend(names);
                Ok(Vec::new())
            },
            |_, _, _| Ok(()),
        );
        executor.execute_task(&mut app, &payload, &mut callbacks);
        assert_eq!(*seen.lock().unwrap(), vec!["b", "a"]);
    }
}

//! Task Executor
//!
//! The in-process engine that turns a declarative payload into a structured
//! report over a document tree. The pipeline itself lives in
//! [`pipeline`]; the surrounding modules supply the document model, payload
//! and report types, target resolution, ordering, stable references, and
//! the geometry/layout/asset helpers the stage callables build on.

pub mod assets;
pub mod collect;
pub mod document;
pub mod geometry;
pub mod layout;
pub mod ordering;
pub mod payload;
pub mod pipeline;
pub mod refs;
pub mod report;
pub mod selection;

pub use document::{Application, Document};
pub use payload::{TaskOptions, TaskPayload};
pub use pipeline::{safe_execute, TaskCallbacks, TaskExecutor};
pub use refs::ItemRef;
pub use report::{TaskError, TaskReport};

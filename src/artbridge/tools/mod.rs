//! Tool Surface
//!
//! Thin glue between the external tool catalog and the bridge core. The
//! [`protocol`] module defines the bridge's tool-call contract — outcomes,
//! argument specs, and the call-error taxonomy layered over
//! [`BridgeError`](crate::artbridge::error::BridgeError) — and [`panel`]
//! implements it by assembling scripts through the library resolver and
//! awaiting exactly one broker call per invocation.

pub mod panel;
pub mod protocol;

pub use panel::PanelBridgeProtocol;
pub use protocol::{ArgKind, ArgSpec, ToolCallError, ToolOutcome, ToolSpec, ToolSurface};

//! Domain types for the stepscript compiler.
//!
//! This module contains the data that flows between stages:
//! - RawEvent: recorded browser events, as loaded
//! - NormalizedStep: semantic steps
//! - Intent / ValidIntent: described steps before and after the safety gate
//! - IrNode: typed actions consumed by code emission

pub mod event;
pub mod intent;
pub mod ir;
pub mod step;

// Re-export commonly used types
pub use event::{ContextKind, EventCategory, RawEvent};
pub use intent::{Intent, ValidIntent};
pub use ir::{IrAction, IrNode, DEFAULT_WAIT_MS};
pub use step::{ElementHints, ElementRole, NormalizedAction, NormalizedStep, CONTEXT_WAIT_MS};

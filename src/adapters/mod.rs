//! Collaborators around the compiler core.
//!
//! Describers turn a normalized step into a one-sentence description; the
//! reachability check may post-filter the IR against live pages. Neither is
//! required for correctness: the rule-based describer is always available as
//! a fallback, and the reachability check is optional.

pub mod fabric;
pub mod reachability;
pub mod rules;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{IrNode, NormalizedStep};

pub use fabric::FabricDescriber;
pub use reachability::{HttpReachability, ReachabilityReport, UnreachableNode};
pub use rules::{template, RuleBasedDescriber};

/// Sentinel a describer returns to ask for a step to be skipped
pub const SKIP_SENTINEL: &str = "skip";

/// What a describer produced for one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Description {
    /// One-sentence description
    Text(String),

    /// The describer judged the step unsafe to express
    Skip,
}

impl Description {
    /// Interpret raw describer output; empty output or the sentinel means skip
    pub fn parse(raw: &str) -> Self {
        let text = raw.trim();
        if text.is_empty() || text.eq_ignore_ascii_case(SKIP_SENTINEL) {
            Self::Skip
        } else {
            Self::Text(text.to_string())
        }
    }

    /// Intent text; skipped steps carry empty text so the gate rejects them
    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::Skip => String::new(),
        }
    }
}

/// Natural-language description provider
#[async_trait]
pub trait Describer: Send + Sync {
    /// Human-readable describer name
    fn name(&self) -> &str;

    /// Describe one action step
    async fn describe(&self, step: &NormalizedStep) -> Result<Description>;

    /// Check the backend is usable before a run
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Live post-filter over the IR
#[async_trait]
pub trait ReachabilityCheck: Send + Sync {
    fn name(&self) -> &str;

    /// Return the nodes to keep, in order, with a report of what was dropped
    async fn check(&self, nodes: Vec<IrNode>) -> Result<(Vec<IrNode>, ReachabilityReport)>;
}

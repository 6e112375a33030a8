//! Intents: a normalized step paired with a description and a selector.

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use super::step::{NormalizedAction, NormalizedStep};

/// Candidate unit of work handed to the safety gate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    /// Index of the source event in the trace
    pub step_index: usize,

    /// Recorder event type of the source event
    pub event_type: String,

    /// One-sentence description; empty when the describer asked to skip
    pub text: String,

    /// Policy-chosen selector, empty if none
    #[serde(default)]
    pub selector: String,

    pub source_step: NormalizedStep,

    #[serde(default)]
    pub is_context_event: bool,
}

impl Intent {
    /// Pair a step with its description and selector
    pub fn new(step: NormalizedStep, text: impl Into<String>, selector: Option<String>) -> Self {
        Self {
            step_index: step.index,
            event_type: step.original_event_type.clone(),
            text: text.into(),
            selector: selector.unwrap_or_default(),
            is_context_event: step.is_context_event,
            source_step: step,
        }
    }

    /// Action of the source step
    pub fn action(&self) -> NormalizedAction {
        self.source_step.normalized_action
    }

    /// Whether this intent only produces a wait or navigation
    pub fn is_context(&self) -> bool {
        self.is_context_event || self.source_step.is_context()
    }

    /// Key used for consecutive-duplicate detection
    pub fn dedup_key(&self) -> (&str, &str, &str) {
        (&self.event_type, &self.selector, &self.text)
    }
}

/// An intent that passed the safety gate.
///
/// Only the gate constructs these, so holding one proves validation ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidIntent(Intent);

impl ValidIntent {
    pub(crate) fn new(intent: Intent) -> Self {
        Self(intent)
    }

    pub fn into_inner(self) -> Intent {
        self.0
    }
}

impl Deref for ValidIntent {
    type Target = Intent;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

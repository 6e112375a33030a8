//! Error kinds raised by the compiler stages.
//!
//! Per-step errors are non-fatal: the step is dropped and the reason is
//! recorded in the stage report. Pipeline errors end the run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a single step was dropped
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepError {
    #[error("Missing required field: {field}")]
    MissingRequiredField { field: String },

    #[error("Cannot resolve an action kind for event type '{event_type}'")]
    UnresolvableActionKind { event_type: String },

    #[error("Empty selector for {action} action")]
    EmptySelectorForRequiredAction { action: String },

    #[error("Malformed selector '{selector}'")]
    MalformedSelectorGrammar { selector: String },

    #[error("Missing URL for navigate action")]
    MissingNavigationUrl,

    #[error("Duplicate of step {duplicate_of}")]
    DuplicateConsecutiveAction { duplicate_of: usize },
}

impl StepError {
    pub fn missing(field: &str) -> Self {
        Self::MissingRequiredField {
            field: field.to_string(),
        }
    }

    pub fn empty_selector(action: impl std::fmt::Display) -> Self {
        Self::EmptySelectorForRequiredAction {
            action: action.to_string(),
        }
    }

    pub fn malformed(selector: &str) -> Self {
        Self::MalformedSelectorGrammar {
            selector: selector.to_string(),
        }
    }
}

/// A dropped step together with its original index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRejection {
    pub step_index: usize,
    pub reason: StepError,
}

impl StepRejection {
    pub fn new(step_index: usize, reason: StepError) -> Self {
        Self { step_index, reason }
    }
}

impl std::fmt::Display for StepRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Step {}: {}", self.step_index, self.reason)
    }
}

/// Pipeline stage boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Normalize,
    Validate,
    Lower,
    Reachability,
    Emit,
    Audit,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Normalize => "normalize",
            Self::Validate => "validate",
            Self::Lower => "lower",
            Self::Reachability => "reachability",
            Self::Emit => "emit",
            Self::Audit => "audit",
        };
        f.write_str(name)
    }
}

/// Item counts retained after each stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub raw_events: usize,
    pub normalized_steps: usize,
    pub intents: usize,
    pub valid_intents: usize,
    pub deduplicated_intents: usize,
    pub ir_nodes: usize,
    pub emitted_nodes: usize,
}

impl std::fmt::Display for StageCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "events={} steps={} intents={} valid={} deduplicated={} ir={} emitted={}",
            self.raw_events,
            self.normalized_steps,
            self.intents,
            self.valid_intents,
            self.deduplicated_intents,
            self.ir_nodes,
            self.emitted_nodes
        )
    }
}

/// Errors that end a run
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineError {
    #[error("Stage '{stage}' produced no output ({counts})")]
    EmptyPipelineOutput { stage: Stage, counts: StageCounts },

    #[error("Audit failed with {} error(s): {}", .errors.len(), .errors.join("; "))]
    AuditFailure { errors: Vec<String> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_serialization() {
        let err = StepError::malformed("<div>");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "malformed_selector_grammar");
        assert_eq!(json["selector"], "<div>");
    }

    #[test]
    fn test_empty_output_message_names_stage() {
        let err = PipelineError::EmptyPipelineOutput {
            stage: Stage::Validate,
            counts: StageCounts {
                raw_events: 3,
                normalized_steps: 3,
                intents: 3,
                ..Default::default()
            },
        };
        let msg = err.to_string();
        assert!(msg.contains("'validate'"));
        assert!(msg.contains("events=3"));
        assert!(msg.contains("valid=0"));
    }

    #[test]
    fn test_rejection_display() {
        let rejection = StepRejection::new(4, StepError::MissingNavigationUrl);
        assert_eq!(rejection.to_string(), "Step 4: Missing URL for navigate action");
    }
}

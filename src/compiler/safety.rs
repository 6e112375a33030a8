//! Safety gate: per-intent validation and consecutive-duplicate removal.
//!
//! Rejections are never fatal. Each rejected intent is dropped and recorded
//! with its original step index so the run report can explain every gap.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{Intent, ValidIntent};

use super::error::{StepError, StepRejection};
use super::selector;

/// Text given to context intents that arrive without one
pub const DEFAULT_CONTEXT_TEXT: &str = "Wait for context event";

/// An accepted intent removed because it repeated the previous one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRemoval {
    pub step_index: usize,

    /// Step index of the retained intent it duplicated
    pub duplicate_of: usize,
}

impl DedupRemoval {
    pub fn as_rejection(&self) -> StepRejection {
        StepRejection::new(
            self.step_index,
            StepError::DuplicateConsecutiveAction {
                duplicate_of: self.duplicate_of,
            },
        )
    }
}

/// Outcome of gating a whole intent sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub input_count: usize,

    /// Intents that passed validation, before dedup
    pub valid_count: usize,

    /// Intents retained after dedup
    pub after_dedup_count: usize,

    pub rejections: Vec<StepRejection>,

    pub dedup_removals: Vec<DedupRemoval>,
}

impl ValidationReport {
    pub fn dedup_count(&self) -> usize {
        self.dedup_removals.len()
    }
}

/// Validates intents before they can be lowered
#[derive(Debug, Clone, Copy, Default)]
pub struct SafetyGate;

impl SafetyGate {
    pub fn new() -> Self {
        Self
    }

    /// Validate a single intent
    pub fn validate(&self, mut intent: Intent) -> Result<ValidIntent, StepError> {
        if intent.is_context() {
            intent.selector.clear();
            let text = intent.text.trim();
            intent.text = if text.is_empty() {
                DEFAULT_CONTEXT_TEXT.to_string()
            } else {
                text.to_string()
            };
            return Ok(ValidIntent::new(intent));
        }

        let text = intent.text.trim();
        if text.is_empty() {
            return Err(StepError::missing("text"));
        }
        intent.text = text.to_string();

        let action = intent.action();
        if action.requires_selector() {
            let selector = intent.selector.trim();
            if selector.is_empty() {
                return Err(StepError::empty_selector(action));
            }
            if !selector::is_valid(&intent.selector) {
                return Err(StepError::malformed(&intent.selector));
            }
        }

        Ok(ValidIntent::new(intent))
    }

    /// Validate every intent in order, then drop consecutive duplicates.
    ///
    /// A duplicate is compared against the last retained intent, so A, A, A
    /// collapses to one A while A, B, A keeps all three.
    pub fn validate_and_clean(&self, intents: Vec<Intent>) -> (Vec<ValidIntent>, ValidationReport) {
        let mut report = ValidationReport {
            input_count: intents.len(),
            ..Default::default()
        };

        let mut valid = Vec::with_capacity(intents.len());
        for intent in intents {
            let step_index = intent.step_index;
            match self.validate(intent) {
                Ok(accepted) => {
                    debug!(step_index, "Intent accepted");
                    valid.push(accepted);
                }
                Err(reason) => {
                    warn!(step_index, %reason, "Intent rejected");
                    report.rejections.push(StepRejection::new(step_index, reason));
                }
            }
        }
        report.valid_count = valid.len();

        let mut kept: Vec<ValidIntent> = Vec::with_capacity(valid.len());
        for intent in valid {
            if let Some(last) = kept.last() {
                if last.dedup_key() == intent.dedup_key() {
                    debug!(
                        step_index = intent.step_index,
                        duplicate_of = last.step_index,
                        "Removed consecutive duplicate"
                    );
                    report.dedup_removals.push(DedupRemoval {
                        step_index: intent.step_index,
                        duplicate_of: last.step_index,
                    });
                    continue;
                }
            }
            kept.push(intent);
        }
        report.after_dedup_count = kept.len();

        info!(
            input = report.input_count,
            valid = report.valid_count,
            kept = report.after_dedup_count,
            rejected = report.rejections.len(),
            duplicates = report.dedup_count(),
            "Validation complete"
        );

        (kept, report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ElementHints, ElementRole, EventCategory, NormalizedAction, NormalizedStep,
    };

    fn step(index: usize, action: NormalizedAction) -> NormalizedStep {
        NormalizedStep {
            index,
            kind: EventCategory::Action,
            normalized_action: action,
            element_role: ElementRole::Button,
            human_identifier: "Go".into(),
            value: String::new(),
            clean_url: String::new(),
            element_hints: ElementHints::default(),
            is_context_event: false,
            context_kind: None,
            original_event_type: "STEPS_FEATURE_CLICK_EVENT".into(),
            original_step_id: String::new(),
            element_html: String::new(),
        }
    }

    fn click(index: usize, selector: &str, text: &str) -> Intent {
        Intent::new(
            step(index, NormalizedAction::Click),
            text,
            Some(selector.to_string()),
        )
    }

    #[test]
    fn test_context_always_accepted() {
        let mut s = step(0, NormalizedAction::Wait);
        s.is_context_event = true;
        let intent = Intent::new(s, "  ", Some("<bad>".into()));

        let valid = SafetyGate::new().validate(intent).unwrap();
        assert_eq!(valid.selector, "");
        assert_eq!(valid.text, DEFAULT_CONTEXT_TEXT);
    }

    #[test]
    fn test_rejections() {
        let gate = SafetyGate::new();

        let err = gate.validate(click(0, "#go", "   ")).unwrap_err();
        assert_eq!(err, StepError::missing("text"));

        let err = gate.validate(click(0, "", "Click go")).unwrap_err();
        assert!(matches!(err, StepError::EmptySelectorForRequiredAction { .. }));

        let err = gate.validate(click(0, "p>", "Click go")).unwrap_err();
        assert!(matches!(err, StepError::MalformedSelectorGrammar { .. }));
    }

    #[test]
    fn test_unknown_action_requires_selector() {
        let intent = Intent::new(step(0, NormalizedAction::Unknown), "Drag", None);
        let err = SafetyGate::new().validate(intent).unwrap_err();
        assert!(matches!(err, StepError::EmptySelectorForRequiredAction { .. }));
    }

    #[test]
    fn test_navigate_needs_no_selector() {
        let intent = Intent::new(step(0, NormalizedAction::Navigate), " Go home ", None);
        let valid = SafetyGate::new().validate(intent).unwrap();
        assert_eq!(valid.text, "Go home");
    }

    #[test]
    fn test_three_identical_collapse() {
        let intents = vec![
            click(0, ".item", "Click item"),
            click(1, ".item", "Click item"),
            click(2, ".item", "Click item"),
        ];
        let (kept, report) = SafetyGate::new().validate_and_clean(intents);

        assert_eq!(kept.len(), 1);
        assert_eq!(report.valid_count, 3);
        assert_eq!(report.after_dedup_count, 1);
        assert_eq!(
            report.dedup_removals,
            vec![
                DedupRemoval { step_index: 1, duplicate_of: 0 },
                DedupRemoval { step_index: 2, duplicate_of: 0 },
            ]
        );
    }

    #[test]
    fn test_differing_middle_keeps_all() {
        let intents = vec![
            click(0, ".item", "Click item"),
            click(1, ".other", "Click item"),
            click(2, ".item", "Click item"),
        ];
        let (kept, report) = SafetyGate::new().validate_and_clean(intents);
        assert_eq!(kept.len(), 3);
        assert_eq!(report.dedup_count(), 0);
    }

    #[test]
    fn test_dedup_skips_over_rejected_items() {
        let intents = vec![
            click(0, "#go", "Click go"),
            click(1, "", "Click go"),
            click(2, "#go", "Click go"),
        ];
        let (kept, report) = SafetyGate::new().validate_and_clean(intents);

        assert_eq!(kept.len(), 1);
        assert_eq!(report.rejections.len(), 1);
        assert_eq!(report.rejections[0].step_index, 1);
        assert_eq!(report.dedup_removals[0].duplicate_of, 0);
        assert_eq!(
            report.dedup_removals[0].as_rejection().to_string(),
            "Step 2: Duplicate of step 0"
        );
    }
}

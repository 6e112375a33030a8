//! Deterministic template describer.
//!
//! Templates end with an `[action: <kind>]` marker so lowering never has to
//! guess the action from free text.

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{NormalizedAction, NormalizedStep};

use super::{Describer, Description};

/// Template description for a step
pub fn template(step: &NormalizedStep) -> String {
    let role = step.element_role.label();
    let id = &step.human_identifier;
    let value = &step.value;

    let text = match step.normalized_action {
        NormalizedAction::Click => format!("Click on {role}: {id}"),
        NormalizedAction::Type => format!("Type '{value}' in {role}: {id}"),
        NormalizedAction::Select => format!("Select '{value}' from {role}: {id}"),
        NormalizedAction::Submit => format!("Submit {role}: {id}"),
        NormalizedAction::Hover => format!("Hover over {role}: {id}"),
        NormalizedAction::Navigate => {
            let target = if step.clean_url.is_empty() {
                id.as_str()
            } else {
                step.clean_url.as_str()
            };
            format!("Navigate to {target}")
        }
        NormalizedAction::Wait => format!("Wait: {id}"),
        NormalizedAction::Unknown => return format!("Perform action on {role}: {id}"),
    };

    format!("{text} [action: {}]", step.normalized_action)
}

/// Describer backed only by templates
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedDescriber;

impl RuleBasedDescriber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Describer for RuleBasedDescriber {
    fn name(&self) -> &str {
        "rules"
    }

    async fn describe(&self, step: &NormalizedStep) -> Result<Description> {
        Ok(Description::Text(template(step)))
    }
}

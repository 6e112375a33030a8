//! Normalized semantic steps.

use serde::{Deserialize, Serialize};

use super::event::{ContextKind, EventCategory};

/// Duration of the wait emitted for non-navigation context events
pub const CONTEXT_WAIT_MS: u64 = 2000;

/// Semantic action of a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizedAction {
    Click,
    Type,
    Select,
    Submit,
    Hover,
    Navigate,
    Wait,
    /// Action read from a foreign artifact that this version does not know
    #[serde(other)]
    Unknown,
}

impl NormalizedAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Click => "click",
            Self::Type => "type",
            Self::Select => "select",
            Self::Submit => "submit",
            Self::Hover => "hover",
            Self::Navigate => "navigate",
            Self::Wait => "wait",
            Self::Unknown => "unknown",
        }
    }

    /// Whether executing this action needs a target element.
    ///
    /// Unknown actions require one: a step we cannot classify must not slip
    /// through without a target.
    pub fn requires_selector(&self) -> bool {
        match self {
            Self::Click | Self::Type | Self::Select | Self::Submit | Self::Hover => true,
            Self::Navigate | Self::Wait => false,
            Self::Unknown => true,
        }
    }
}

impl std::fmt::Display for NormalizedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Semantic role of the target element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementRole {
    Button,
    Textbox,
    Link,
    Checkbox,
    Radio,
    Dropdown,
    Textarea,
    Image,
    Other,
    /// Context events have no element
    Context,
}

impl ElementRole {
    /// Word used in step descriptions
    pub fn label(&self) -> &'static str {
        match self {
            Self::Button => "button",
            Self::Textbox => "textbox",
            Self::Link => "link",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
            Self::Dropdown => "dropdown",
            Self::Textarea => "textarea",
            Self::Image => "image",
            Self::Other => "element",
            Self::Context => "context",
        }
    }
}

/// Stable element attributes used for selector choice
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHints {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub class: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub test_id: String,
    #[serde(default)]
    pub aria_label: String,
    #[serde(default)]
    pub tag: String,
}

/// A raw event normalized into a semantic step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedStep {
    /// Index of the source event in the trace
    pub index: usize,

    pub kind: EventCategory,

    pub normalized_action: NormalizedAction,

    pub element_role: ElementRole,

    /// What a user would recognize the element by; never empty
    pub human_identifier: String,

    /// Typed text or selected option (type/select only)
    #[serde(default)]
    pub value: String,

    /// Page URL stripped of tracking parameters
    #[serde(default)]
    pub clean_url: String,

    #[serde(default)]
    pub element_hints: ElementHints,

    #[serde(default)]
    pub is_context_event: bool,

    /// Set for context steps only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_kind: Option<ContextKind>,

    #[serde(default)]
    pub original_event_type: String,

    #[serde(default)]
    pub original_step_id: String,

    /// Source markup, kept for selector recomputation during lowering
    #[serde(default)]
    pub element_html: String,
}

impl NormalizedStep {
    /// Whether this step only produces a wait or navigation
    pub fn is_context(&self) -> bool {
        self.is_context_event || self.normalized_action == NormalizedAction::Wait
    }
}

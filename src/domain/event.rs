//! Raw recorded browser events.
//!
//! A trace is an ordered JSON array of these records, exactly as the recorder
//! wrote them. Events are never mutated after loading.

use serde::{Deserialize, Deserializer, Serialize};

/// One recorded browser interaction or lifecycle signal
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Recorder event type (e.g. `STEPS_FEATURE_CLICK_EVENT`)
    #[serde(rename = "eventType", default, deserialize_with = "lenient_string")]
    pub event_type: String,

    /// Page URL at the time of the event
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,

    /// Markup fragment of the target element
    #[serde(rename = "eventElement", default, deserialize_with = "lenient_string")]
    pub element_html: String,

    /// Free-form payload (typed text, selected option, ...)
    #[serde(rename = "eventData", default, deserialize_with = "lenient_string")]
    pub event_data: String,

    /// Recorder timestamp, kept verbatim
    #[serde(default, deserialize_with = "lenient_string")]
    pub timestamp: String,

    /// Recorder event id
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,

    /// Recorder step id; some recorders write it next to `id`
    #[serde(
        rename = "stepId",
        default,
        skip_serializing_if = "String::is_empty",
        deserialize_with = "lenient_string"
    )]
    pub step_id: String,
}

impl RawEvent {
    /// Create an event with the fields the pipeline actually inspects
    pub fn new(
        event_type: impl Into<String>,
        url: impl Into<String>,
        element_html: impl Into<String>,
        event_data: impl Into<String>,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            url: url.into(),
            element_html: element_html.into(),
            event_data: event_data.into(),
            ..Default::default()
        }
    }

    /// Identifier of the recorded step: `id`, else `stepId`
    pub fn source_id(&self) -> &str {
        if self.id.trim().is_empty() {
            &self.step_id
        } else {
            &self.id
        }
    }

    /// Whether the event carries an element or data payload
    pub fn has_payload(&self) -> bool {
        !self.element_html.trim().is_empty() || !self.event_data.trim().is_empty()
    }
}

/// Recorders are inconsistent about scalar types: timestamps and ids show up
/// as numbers, data sometimes as null.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

/// Classification of a raw event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Non-executable lifecycle signal (visibility, navigation, focus)
    Context,

    /// Executable user interaction
    Action,
}

/// Kinds of context events the recorder emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    TabVisible,
    TabActivated,
    Navigation,
    PageLoad,
    PageVisible,
    UrlChanged,
    WindowFocus,
    WindowBlur,
    /// Payload-less event of a type the recorder did not document
    Other,
}

impl ContextKind {
    /// Map a recorder event type onto a context kind
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type.trim() {
            "STEPS_FEATURE_TAB_VISIBLE_EVENT" => Self::TabVisible,
            "STEPS_FEATURE_TAB_ACTIVATED_EVENT" => Self::TabActivated,
            "STEPS_FEATURE_NAVIGATE_EVENT" => Self::Navigation,
            "STEPS_FEATURE_PAGE_LOAD_EVENT" => Self::PageLoad,
            "STEPS_FEATURE_PAGE_VISIBLE_EVENT" => Self::PageVisible,
            "STEPS_FEATURE_URL_CHANGED_EVENT" => Self::UrlChanged,
            "STEPS_FEATURE_WINDOW_FOCUS_EVENT" => Self::WindowFocus,
            "STEPS_FEATURE_WINDOW_BLUR_EVENT" => Self::WindowBlur,
            _ => Self::Other,
        }
    }

    /// Fixed human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::TabVisible => "Tab visibility check",
            Self::TabActivated => "Tab activation",
            Self::Navigation => "Page navigation",
            Self::PageLoad => "Page load complete",
            Self::PageVisible => "Page visibility check",
            Self::UrlChanged => "URL changed - wait for navigation",
            Self::WindowFocus => "Window focused",
            Self::WindowBlur => "Window blurred",
            Self::Other => "Context event",
        }
    }

    pub fn is_navigation(&self) -> bool {
        matches!(self, Self::Navigation)
    }
}

//! Event classification: every raw event is either Context or Action.

use crate::domain::{ContextKind, EventCategory, RawEvent};

/// Lifecycle signals the recorder emits; these never execute anything
pub const CONTEXT_EVENT_TYPES: &[&str] = &[
    "STEPS_FEATURE_TAB_VISIBLE_EVENT",
    "STEPS_FEATURE_TAB_ACTIVATED_EVENT",
    "STEPS_FEATURE_NAVIGATE_EVENT",
    "STEPS_FEATURE_PAGE_LOAD_EVENT",
    "STEPS_FEATURE_PAGE_VISIBLE_EVENT",
    "STEPS_FEATURE_URL_CHANGED_EVENT",
    "STEPS_FEATURE_WINDOW_FOCUS_EVENT",
    "STEPS_FEATURE_WINDOW_BLUR_EVENT",
];

/// User interactions the recorder emits
pub const ACTION_EVENT_TYPES: &[&str] = &[
    "STEPS_FEATURE_CLICK_EVENT",
    "STEPS_FEATURE_TYPE_EVENT",
    "STEPS_FEATURE_CHANGE_EVENT",
    "STEPS_FEATURE_SELECT_EVENT",
    "STEPS_FEATURE_SUBMIT_EVENT",
    "STEPS_FEATURE_HOVER_EVENT",
    "STEPS_FEATURE_FOCUS_EVENT",
    "STEPS_FEATURE_BLUR_EVENT",
    "STEPS_FEATURE_KEY_DOWN_EVENT",
    "STEPS_FEATURE_KEY_UP_EVENT",
];

/// Classify a raw event.
///
/// Unknown event types count as actions only when they carry an element or
/// data payload, so vendor-specific interactions are not silently lost.
pub fn classify(event: &RawEvent) -> EventCategory {
    let event_type = event.event_type.trim();

    if CONTEXT_EVENT_TYPES.contains(&event_type) {
        return EventCategory::Context;
    }
    if ACTION_EVENT_TYPES.contains(&event_type) {
        return EventCategory::Action;
    }

    if event.has_payload() {
        EventCategory::Action
    } else {
        EventCategory::Context
    }
}

/// Context kind for an event already classified as Context
pub fn context_kind(event: &RawEvent) -> ContextKind {
    ContextKind::from_event_type(&event.event_type)
}

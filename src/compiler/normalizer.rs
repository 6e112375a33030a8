//! Raw events to semantic steps.
//!
//! Context events always produce exactly one `wait` or `navigate` step. Action
//! events resolve their action by keyword inspection of the event type and are
//! dropped when nothing matches.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::{
    ElementHints, ElementRole, EventCategory, NormalizedAction, NormalizedStep, RawEvent,
};

use super::classifier;
use super::error::{StepError, StepRejection};
use super::markup::Markup;

/// Longest human identifier taken from free text
pub const MAX_IDENTIFIER_CHARS: usize = 100;

/// Query keys dropped by prefix
const TRACKING_PREFIXES: &[&str] = &["utm_", "gad", "adgrp", "hvp", "hvt", "hvr"];

/// Query keys dropped on exact match
const TRACKING_KEYS: &[&str] = &["ref", "tag", "crid", "sprefix", "rps", "lpg"];

/// Outcome of normalizing a whole trace
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizationReport {
    pub input_count: usize,
    pub context_count: usize,
    pub action_count: usize,

    /// Steps per normalized action
    pub action_breakdown: BTreeMap<String, usize>,

    /// Action events that could not be normalized
    pub dropped: Vec<StepRejection>,
}

impl NormalizationReport {
    pub fn step_count(&self) -> usize {
        self.context_count + self.action_count
    }
}

/// Builds normalized steps from raw events
#[derive(Debug, Clone, Copy, Default)]
pub struct StepNormalizer;

impl StepNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize every event in order
    pub fn normalize_all(&self, events: &[RawEvent]) -> (Vec<NormalizedStep>, NormalizationReport) {
        let mut report = NormalizationReport {
            input_count: events.len(),
            ..Default::default()
        };
        let mut steps = Vec::with_capacity(events.len());

        for (index, event) in events.iter().enumerate() {
            match self.normalize(index, event) {
                Ok(step) => {
                    debug!(
                        index,
                        action = %step.normalized_action,
                        identifier = %step.human_identifier,
                        "Normalized step"
                    );
                    if step.is_context_event {
                        report.context_count += 1;
                    } else {
                        report.action_count += 1;
                    }
                    *report
                        .action_breakdown
                        .entry(step.normalized_action.to_string())
                        .or_default() += 1;
                    steps.push(step);
                }
                Err(reason) => {
                    warn!(index, event_type = %event.event_type, %reason, "Dropped event");
                    report.dropped.push(StepRejection::new(index, reason));
                }
            }
        }

        info!(
            events = report.input_count,
            actions = report.action_count,
            context = report.context_count,
            dropped = report.dropped.len(),
            "Normalization complete"
        );

        (steps, report)
    }

    /// Normalize one event; only action events can fail
    pub fn normalize(&self, index: usize, event: &RawEvent) -> Result<NormalizedStep, StepError> {
        match classifier::classify(event) {
            EventCategory::Context => Ok(self.normalize_context(index, event)),
            EventCategory::Action => self.normalize_action(index, event),
        }
    }

    fn normalize_context(&self, index: usize, event: &RawEvent) -> NormalizedStep {
        let context_kind = classifier::context_kind(event);
        let normalized_action = if context_kind.is_navigation() {
            NormalizedAction::Navigate
        } else {
            NormalizedAction::Wait
        };

        NormalizedStep {
            index,
            kind: EventCategory::Context,
            normalized_action,
            element_role: ElementRole::Context,
            human_identifier: context_kind.description().to_string(),
            value: String::new(),
            clean_url: clean_url(&event.url),
            element_hints: ElementHints::default(),
            is_context_event: true,
            context_kind: Some(context_kind),
            original_event_type: event.event_type.clone(),
            original_step_id: event.source_id().to_string(),
            element_html: event.element_html.clone(),
        }
    }

    fn normalize_action(&self, index: usize, event: &RawEvent) -> Result<NormalizedStep, StepError> {
        let markup = Markup::parse(&event.element_html);
        let normalized_action = resolve_action(&event.event_type, &markup).ok_or_else(|| {
            StepError::UnresolvableActionKind {
                event_type: event.event_type.clone(),
            }
        })?;

        let value = match normalized_action {
            NormalizedAction::Type | NormalizedAction::Select => event.event_data.clone(),
            _ => String::new(),
        };

        Ok(NormalizedStep {
            index,
            kind: EventCategory::Action,
            normalized_action,
            element_role: element_role(&markup, &event.element_html),
            human_identifier: human_identifier(&markup, &event.event_data),
            value,
            clean_url: clean_url(&event.url),
            element_hints: markup.hints(),
            is_context_event: false,
            context_kind: None,
            original_event_type: event.event_type.clone(),
            original_step_id: event.source_id().to_string(),
            element_html: event.element_html.clone(),
        })
    }
}

/// Map an action event type onto a semantic action, first rule wins
fn resolve_action(event_type: &str, markup: &Markup) -> Option<NormalizedAction> {
    let event_type = event_type.to_lowercase();
    let has = |needle: &str| event_type.contains(needle);

    if has("click") {
        if markup.tag() == "select" {
            return Some(NormalizedAction::Select);
        }
        return Some(NormalizedAction::Click);
    }
    if has("type") || has("keyboard") || has("key_") {
        return Some(NormalizedAction::Type);
    }
    if has("change") || has("select") {
        return Some(NormalizedAction::Select);
    }
    if has("submit") {
        return Some(NormalizedAction::Submit);
    }
    if has("hover") || has("mouseover") {
        return Some(NormalizedAction::Hover);
    }
    if has("focus") && markup.is_text_like() {
        return Some(NormalizedAction::Click);
    }
    None
}

/// What a user would recognize the element by; never empty
fn human_identifier(markup: &Markup, event_data: &str) -> String {
    let text = event_data.trim();
    if !text.is_empty() {
        return truncate_chars(text, MAX_IDENTIFIER_CHARS);
    }

    if let Some(text) = markup.inner_text() {
        return truncate_chars(text, MAX_IDENTIFIER_CHARS);
    }

    if let Some(placeholder) = markup.attribute("placeholder") {
        return format!("[Input: {placeholder}]");
    }
    if let Some(label) = markup.attribute("aria-label") {
        return format!("[{label}]");
    }
    if let Some(id) = markup.attribute("id") {
        return format!("[Element with ID: {id}]");
    }
    if let Some(name) = markup.attribute("name") {
        return format!("[Named: {name}]");
    }

    match markup.tag() {
        "" => "[element]".to_string(),
        tag => format!("[{tag}]"),
    }
}

fn element_role(markup: &Markup, element_html: &str) -> ElementRole {
    match markup.tag() {
        "button" => ElementRole::Button,
        "a" => ElementRole::Link,
        "input" => {
            let input_type = markup
                .root()
                .and_then(|root| root.attribute("type"))
                .unwrap_or_default()
                .to_ascii_lowercase();
            match input_type.as_str() {
                "checkbox" => ElementRole::Checkbox,
                "radio" => ElementRole::Radio,
                "submit" => ElementRole::Button,
                _ => ElementRole::Textbox,
            }
        }
        "textarea" => ElementRole::Textarea,
        "select" => ElementRole::Dropdown,
        "img" => ElementRole::Image,
        _ if element_html.to_lowercase().contains("button") => ElementRole::Button,
        _ => ElementRole::Other,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

fn is_tracking_key(key: &str) -> bool {
    TRACKING_PREFIXES.iter().any(|prefix| key.starts_with(prefix)) || TRACKING_KEYS.contains(&key)
}

/// Strip tracking parameters from a URL.
///
/// Only the query is rewritten: scheme, host, path and fragment are copied
/// verbatim, and remaining pairs keep their order and encoding. URLs that do
/// not parse, have no query, or carry no tracking keys come back unchanged.
pub fn clean_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let has_query = Url::parse(trimmed)
        .map(|url| url.query().is_some())
        .unwrap_or(false);
    if !has_query {
        return raw.to_string();
    }

    let Some((base, rest)) = trimmed.split_once('?') else {
        return raw.to_string();
    };
    let (query, fragment) = match rest.split_once('#') {
        Some((query, fragment)) => (query, Some(fragment)),
        None => (rest, None),
    };

    let pairs: Vec<&str> = query.split('&').filter(|pair| !pair.is_empty()).collect();
    let kept: Vec<&str> = pairs
        .iter()
        .copied()
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            !is_tracking_key(key)
        })
        .collect();

    if kept.len() == pairs.len() {
        return raw.to_string();
    }

    let mut cleaned = base.to_string();
    if !kept.is_empty() {
        cleaned.push('?');
        cleaned.push_str(&kept.join("&"));
    }
    if let Some(fragment) = fragment {
        cleaned.push('#');
        cleaned.push_str(fragment);
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ContextKind;

    fn action(event_type: &str, html: &str, data: &str) -> NormalizedStep {
        StepNormalizer::new()
            .normalize(0, &RawEvent::new(event_type, "https://x.test/", html, data))
            .unwrap()
    }

    #[test]
    fn test_click_on_button() {
        let step = action("CLICK", r#"<button id="go">Go</button>"#, "");
        assert_eq!(step.normalized_action, NormalizedAction::Click);
        assert_eq!(step.element_role, ElementRole::Button);
        assert_eq!(step.element_hints.id, "go");
        assert_eq!(step.element_hints.tag, "button");
        assert_eq!(step.human_identifier, "Go");
        assert_eq!(step.value, "");
    }

    #[test]
    fn test_click_on_select_becomes_select() {
        let step = action("STEPS_FEATURE_CLICK_EVENT", r#"<select name="size"></select>"#, "");
        assert_eq!(step.normalized_action, NormalizedAction::Select);
        assert_eq!(step.element_role, ElementRole::Dropdown);
    }

    #[test]
    fn test_type_keeps_value() {
        let step = action(
            "STEPS_FEATURE_TYPE_EVENT",
            r#"<input type="text" name="q" placeholder="Search">"#,
            "shoes",
        );
        assert_eq!(step.normalized_action, NormalizedAction::Type);
        assert_eq!(step.element_role, ElementRole::Textbox);
        assert_eq!(step.value, "shoes");
        assert_eq!(step.human_identifier, "shoes");

        let step = action("STEPS_FEATURE_KEY_DOWN_EVENT", r#"<input name="q">"#, "");
        assert_eq!(step.normalized_action, NormalizedAction::Type);
        assert_eq!(step.human_identifier, "[Named: q]");
    }

    #[test]
    fn test_focus_only_on_text_like() {
        let step = action("STEPS_FEATURE_FOCUS_EVENT", r#"<textarea id="msg"></textarea>"#, "");
        assert_eq!(step.normalized_action, NormalizedAction::Click);
        assert_eq!(step.human_identifier, "[Element with ID: msg]");

        let result = StepNormalizer::new().normalize(
            3,
            &RawEvent::new("STEPS_FEATURE_FOCUS_EVENT", "", r#"<button>x</button>"#, ""),
        );
        assert!(matches!(result, Err(StepError::UnresolvableActionKind { .. })));
    }

    #[test]
    fn test_identifier_fallbacks() {
        assert_eq!(
            action("hover", r#"<input placeholder="Email">"#, "").human_identifier,
            "[Input: Email]"
        );
        assert_eq!(
            action("hover", r#"<div aria-label="Close"></div>"#, "").human_identifier,
            "[Close]"
        );
        assert_eq!(action("hover", "<img src=x>", "").human_identifier, "[img]");
        assert_eq!(action("hover", "junk", "").human_identifier, "[element]");

        let long = "x".repeat(250);
        assert_eq!(action("click", "<b></b>", &long).human_identifier.len(), 100);
    }

    #[test]
    fn test_context_events() {
        let normalizer = StepNormalizer::new();
        let nav = normalizer
            .normalize(
                1,
                &RawEvent::new("STEPS_FEATURE_NAVIGATE_EVENT", "https://x.test/a?utm_medium=x", "", ""),
            )
            .unwrap();
        assert_eq!(nav.normalized_action, NormalizedAction::Navigate);
        assert_eq!(nav.clean_url, "https://x.test/a");
        assert!(nav.is_context_event);
        assert_eq!(nav.element_role, ElementRole::Context);

        let wait = normalizer
            .normalize(2, &RawEvent::new("STEPS_FEATURE_TAB_VISIBLE_EVENT", "", "", ""))
            .unwrap();
        assert_eq!(wait.normalized_action, NormalizedAction::Wait);
        assert_eq!(wait.human_identifier, "Tab visibility check");
        assert_eq!(wait.context_kind, Some(ContextKind::TabVisible));
    }

    #[test]
    fn test_context_steps_only_wait_or_navigate() {
        let normalizer = StepNormalizer::new();
        let events = [
            RawEvent::new("STEPS_FEATURE_PAGE_LOAD_EVENT", "", "<button>x</button>", "y"),
            RawEvent::new("UNKNOWN", "", "", ""),
            RawEvent::new("STEPS_FEATURE_URL_CHANGED_EVENT", "https://x.test", "", ""),
        ];
        let (steps, report) = normalizer.normalize_all(&events);
        assert_eq!(steps.len(), 3);
        assert_eq!(report.context_count, 3);
        for step in steps {
            assert!(matches!(
                step.normalized_action,
                NormalizedAction::Wait | NormalizedAction::Navigate
            ));
        }
    }

    #[test]
    fn test_normalize_all_reports_drops() {
        let events = [
            RawEvent::new("STEPS_FEATURE_CLICK_EVENT", "", "<a href=x>Home</a>", ""),
            RawEvent::new("STEPS_FEATURE_BLUR_EVENT", "", "<div>x</div>", ""),
            RawEvent::new("STEPS_FEATURE_TAB_ACTIVATED_EVENT", "", "", ""),
        ];
        let (steps, report) = StepNormalizer::new().normalize_all(&events);

        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].index, 0);
        assert_eq!(steps[1].index, 2);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.dropped[0].step_index, 1);
        assert_eq!(report.action_breakdown.get("click"), Some(&1));
        assert_eq!(report.action_breakdown.get("wait"), Some(&1));
    }

    #[test]
    fn test_clean_url() {
        assert_eq!(clean_url("https://x.test/?utm_source=a&q=1"), "https://x.test/?q=1");
        assert_eq!(
            clean_url("https://shop.test/p/1?tag=abc&crid=9&k=shoes&gad_source=1#reviews"),
            "https://shop.test/p/1?k=shoes#reviews"
        );
        assert_eq!(clean_url("https://x.test/a?utm_a=1"), "https://x.test/a");
        assert_eq!(clean_url("https://x.test/a?b=%20c&a=1"), "https://x.test/a?b=%20c&a=1");
        assert_eq!(clean_url("https://x.test/a?reference=1"), "https://x.test/a?reference=1");
        assert_eq!(clean_url("https://x.test/a"), "https://x.test/a");
        assert_eq!(clean_url("not a url"), "not a url");
        assert_eq!(clean_url(""), "");
    }

    #[test]
    fn test_clean_url_keeps_untouched_parts_verbatim() {
        assert_eq!(clean_url("HTTPS://X.test?q=1"), "HTTPS://X.test?q=1");
        assert_eq!(clean_url("https://x.test:443/a b?q=1"), "https://x.test:443/a b?q=1");
        assert_eq!(clean_url("HTTPS://X.test?utm_source=a&q=1"), "HTTPS://X.test?q=1");
        assert_eq!(clean_url("https://x.test/a b?utm_campaign=1#top"), "https://x.test/a b#top");
    }
}

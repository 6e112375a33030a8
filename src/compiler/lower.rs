//! Lowering validated intents into IR nodes.
//!
//! The gate has already run, but every field is checked again here: a node
//! must never be built from data that reached the builder some other way.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{IrAction, IrNode, NormalizedAction, ValidIntent, CONTEXT_WAIT_MS};

use super::error::{StepError, StepRejection};
use super::markup::Markup;
use super::selector;

/// Key sent by `press` nodes that carry no value
pub const DEFAULT_PRESS_KEY: &str = "Enter";

/// Keyword fallback order used when the text has no action marker
const KEYWORDS: &[(&str, IrAction)] = &[
    ("navigate", IrAction::Navigate),
    ("click", IrAction::Click),
    ("type", IrAction::Fill),
    ("fill", IrAction::Fill),
    ("select", IrAction::Select),
    ("choose", IrAction::Select),
    ("wait", IrAction::Wait),
    ("scroll", IrAction::Scroll),
    ("hover", IrAction::Hover),
    ("press", IrAction::Press),
];

fn action_marker() -> Option<&'static Regex> {
    static MARKER: OnceLock<Option<Regex>> = OnceLock::new();
    MARKER
        .get_or_init(|| Regex::new(r"(?i)action:\s*(\w+)").ok())
        .as_ref()
}

/// Outcome of lowering a whole intent sequence
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoweringReport {
    pub input_count: usize,
    pub node_count: usize,
    pub rejections: Vec<StepRejection>,

    /// Nodes per IR action
    pub action_distribution: BTreeMap<String, usize>,
}

/// Lowers validated intents into IR nodes
#[derive(Debug, Clone, Copy, Default)]
pub struct IrBuilder;

impl IrBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Lower every intent, keeping order
    pub fn lower_all(&self, intents: &[ValidIntent]) -> (Vec<IrNode>, LoweringReport) {
        let mut report = LoweringReport {
            input_count: intents.len(),
            ..Default::default()
        };
        let mut nodes = Vec::with_capacity(intents.len());

        for intent in intents {
            match self.lower(intent).map(|node| node.with_step_index(intent.step_index)) {
                Ok(node) => {
                    debug!(step_index = intent.step_index, action = %node.action, "Lowered intent");
                    *report
                        .action_distribution
                        .entry(node.action.to_string())
                        .or_default() += 1;
                    nodes.push(node);
                }
                Err(reason) => {
                    warn!(step_index = intent.step_index, %reason, "Intent not lowered");
                    report
                        .rejections
                        .push(StepRejection::new(intent.step_index, reason));
                }
            }
        }
        report.node_count = nodes.len();

        info!(
            intents = report.input_count,
            nodes = report.node_count,
            rejected = report.rejections.len(),
            "Lowering complete"
        );

        (nodes, report)
    }

    /// Lower a single intent
    pub fn lower(&self, intent: &ValidIntent) -> Result<IrNode, StepError> {
        let text = intent.text.trim();
        if text.is_empty() {
            return Err(StepError::missing("text"));
        }
        if intent.event_type.trim().is_empty() {
            return Err(StepError::missing("event_type"));
        }
        let supplied = intent.selector.trim();
        if !supplied.is_empty() && !selector::is_valid(&intent.selector) {
            return Err(StepError::malformed(&intent.selector));
        }

        let step = &intent.source_step;

        if intent.is_context() {
            let navigation = step.normalized_action == NormalizedAction::Navigate
                || step.context_kind.map(|k| k.is_navigation()).unwrap_or(false);

            if navigation {
                if step.clean_url.trim().is_empty() {
                    return Err(StepError::MissingNavigationUrl);
                }
                return Ok(IrNode::new(IrAction::Navigate, text).with_url(&step.clean_url));
            }

            return Ok(IrNode::new(IrAction::Wait, text).with_wait_time(CONTEXT_WAIT_MS));
        }

        let action = resolve_action(text);

        let selector = if supplied.is_empty() {
            selector::choose(&Markup::parse(&step.element_html).hints())
        } else {
            Some(supplied.to_string())
        };

        if action == IrAction::Navigate && step.clean_url.trim().is_empty() {
            return Err(StepError::MissingNavigationUrl);
        }

        let mut node = IrNode::new(action, text);

        if action.is_interactive() {
            let Some(selector) = selector else {
                return Err(StepError::empty_selector(action));
            };
            if !selector::is_valid(&selector) {
                return Err(StepError::malformed(&selector));
            }
            node = node.with_selector(selector);
        } else if let Some(selector) = selector.filter(|s| selector::is_valid(s)) {
            node = node.with_selector(selector);
        }

        if !step.value.is_empty() {
            node = node.with_value(&step.value);
        } else if action == IrAction::Press {
            node = node.with_value(DEFAULT_PRESS_KEY);
        }

        if !step.clean_url.trim().is_empty() {
            node = node.with_url(&step.clean_url);
        }

        if !step.element_html.is_empty() {
            node = node.with_element_html(&step.element_html);
        }

        Ok(node)
    }
}

/// Resolve the IR action from intent text.
///
/// An explicit `action: <kind>` marker wins (the last one, since templates
/// append theirs); otherwise the first keyword that starts a word of the
/// text, defaulting to click.
pub fn resolve_action(text: &str) -> IrAction {
    if let Some(marker) = action_marker() {
        let found = marker
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .filter_map(|kind| IrAction::from_keyword(kind.as_str()))
            .last();
        if let Some(action) = found {
            return action;
        }
    }

    let lowered = text.to_lowercase();
    let words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    KEYWORDS
        .iter()
        .find(|(keyword, _)| words.iter().any(|w| w.starts_with(keyword)))
        .map(|(_, action)| *action)
        .unwrap_or(IrAction::Click)
}

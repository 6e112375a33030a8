//! Flat intermediate representation consumed by code emission.

use serde::{Deserialize, Serialize};

/// Default bounded wait for an action, in milliseconds
pub const DEFAULT_WAIT_MS: u64 = 5000;

fn default_wait_ms() -> u64 {
    DEFAULT_WAIT_MS
}

/// Kind of automation action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IrAction {
    Navigate,
    Click,
    Fill,
    Select,
    Wait,
    Scroll,
    Hover,
    Press,
    Keyboard,
    Screenshot,
}

impl IrAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Click => "click",
            Self::Fill => "fill",
            Self::Select => "select",
            Self::Wait => "wait",
            Self::Scroll => "scroll",
            Self::Hover => "hover",
            Self::Press => "press",
            Self::Keyboard => "keyboard",
            Self::Screenshot => "screenshot",
        }
    }

    /// Actions that target one element through a locator
    pub fn is_interactive(&self) -> bool {
        matches!(self, Self::Click | Self::Fill | Self::Select | Self::Hover)
    }

    /// Parse an action keyword (`type` and `fill` are the same action)
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let action = match keyword.trim().to_ascii_lowercase().as_str() {
            "navigate" => Self::Navigate,
            "click" | "submit" => Self::Click,
            "type" | "fill" => Self::Fill,
            "select" | "choose" => Self::Select,
            "wait" => Self::Wait,
            "scroll" => Self::Scroll,
            "hover" => Self::Hover,
            "press" => Self::Press,
            "keyboard" => Self::Keyboard,
            "screenshot" => Self::Screenshot,
            _ => return None,
        };
        Some(action)
    }
}

impl std::fmt::Display for IrAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One typed action node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IrNode {
    #[serde(rename = "action_type")]
    pub action: IrAction,

    #[serde(default)]
    pub selector: Option<String>,

    #[serde(default)]
    pub value: Option<String>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(rename = "wait_time", default = "default_wait_ms")]
    pub wait_time_ms: u64,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub element_html: Option<String>,

    /// Reserved for nested control flow; always empty
    #[serde(default)]
    pub children: Vec<IrNode>,

    /// Index of the recorded event this node came from
    #[serde(skip)]
    pub step_index: Option<usize>,
}

impl IrNode {
    /// Create a node with defaults for everything but the action
    pub fn new(action: IrAction, description: impl Into<String>) -> Self {
        Self {
            action,
            selector: None,
            value: None,
            url: None,
            wait_time_ms: DEFAULT_WAIT_MS,
            description: description.into(),
            element_html: None,
            children: Vec::new(),
            step_index: None,
        }
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_wait_time(mut self, wait_time_ms: u64) -> Self {
        self.wait_time_ms = wait_time_ms;
        self
    }

    pub fn with_element_html(mut self, html: impl Into<String>) -> Self {
        self.element_html = Some(html.into());
        self
    }

    pub fn with_step_index(mut self, step_index: usize) -> Self {
        self.step_index = Some(step_index);
        self
    }

    /// Non-empty selector, if any
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Non-empty URL, if any
    pub fn url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_json_shape() {
        let node = IrNode::new(IrAction::Click, "Click go").with_selector("#go");
        let json = serde_json::to_value(&node).unwrap();

        assert_eq!(json["action_type"], "click");
        assert_eq!(json["selector"], "#go");
        assert_eq!(json["wait_time"], 5000);
        assert_eq!(json["children"], serde_json::json!([]));
        assert!(json.get("step_index").is_none());
    }

    #[test]
    fn test_wait_time_defaults_when_missing() {
        let node: IrNode =
            serde_json::from_str(r#"{"action_type": "wait", "description": "w"}"#).unwrap();
        assert_eq!(node.wait_time_ms, DEFAULT_WAIT_MS);
        assert!(node.children.is_empty());
    }

    #[test]
    fn test_action_keywords() {
        assert_eq!(IrAction::from_keyword("Type"), Some(IrAction::Fill));
        assert_eq!(IrAction::from_keyword("choose"), Some(IrAction::Select));
        assert_eq!(IrAction::from_keyword("submit"), Some(IrAction::Click));
        assert_eq!(IrAction::from_keyword("teleport"), None);
    }
}

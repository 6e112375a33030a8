//! Playwright script emission.
//!
//! Every node becomes one fail-fast `try`/`catch` block inside a single
//! browser session. Repeated selectors are disambiguated by the order in which
//! they occur in the recorded trace.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{IrAction, IrNode};

use super::error::{PipelineError, Stage, StageCounts, StepError, StepRejection};
use super::selector;

/// Default bounded wait before each locator action, in milliseconds
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 5000;

/// Default timeout for page navigations, in milliseconds
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 30000;

/// Initial URL used when neither an override nor a navigate node exists
pub const DEFAULT_PLACEHOLDER_URL: &str = "https://www.example.com";

const INDENT: &str = "        ";

/// Emission tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitOptions {
    pub action_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    pub placeholder_url: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            action_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            navigation_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            placeholder_url: DEFAULT_PLACEHOLDER_URL.to_string(),
        }
    }
}

/// Selector → positions of the interactive nodes that use it, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorOccurrenceTable {
    positions: HashMap<String, Vec<usize>>,
}

impl SelectorOccurrenceTable {
    /// Build the table over interactive nodes only
    pub fn build(nodes: &[IrNode]) -> Self {
        let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, node) in nodes.iter().enumerate() {
            if !node.action.is_interactive() {
                continue;
            }
            if let Some(selector) = node.selector() {
                positions.entry(selector.to_string()).or_default().push(position);
            }
        }
        Self { positions }
    }

    /// How many interactive nodes share this selector
    pub fn total(&self, selector: &str) -> usize {
        self.positions.get(selector).map(Vec::len).unwrap_or(0)
    }

    /// Zero-based occurrence index of the node at `position`
    pub fn occurrence(&self, selector: &str, position: usize) -> Option<usize> {
        self.positions
            .get(selector)?
            .iter()
            .position(|&p| p == position)
    }
}

/// Where the initial navigation target came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialUrlSource {
    Override,
    FirstNavigate,
    Placeholder,
}

/// Outcome of one emission pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmitReport {
    pub input_count: usize,
    pub emitted_count: usize,

    /// Nodes dropped by the final check, by recorded step index (IR
    /// position for nodes built without one)
    pub dropped: Vec<StepRejection>,

    pub initial_url: String,
    pub initial_url_source: InitialUrlSource,

    /// Locators emitted with `.first()`
    pub first_locators: usize,

    /// Locators emitted with `.nth(k)`
    pub indexed_locators: usize,
}

/// Generated script plus its report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emission {
    pub script: String,
    pub report: EmitReport,
}

/// Lowers IR nodes into a Playwright script
#[derive(Debug, Clone, Default)]
pub struct CodeEmitter {
    options: EmitOptions,
}

impl CodeEmitter {
    pub fn new(options: EmitOptions) -> Self {
        Self { options }
    }

    /// Emit a script for the node sequence
    pub fn emit(
        &self,
        nodes: &[IrNode],
        base_url_override: Option<&str>,
    ) -> Result<Emission, PipelineError> {
        let mut dropped = Vec::new();
        let mut safe: Vec<&IrNode> = Vec::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            match check_node(node) {
                Ok(()) => safe.push(node),
                Err(reason) => {
                    let step_index = node.step_index.unwrap_or(position);
                    warn!(position, step_index, %reason, "Node skipped before emission");
                    dropped.push(StepRejection::new(step_index, reason));
                }
            }
        }

        if safe.is_empty() {
            return Err(PipelineError::EmptyPipelineOutput {
                stage: Stage::Emit,
                counts: StageCounts {
                    ir_nodes: nodes.len(),
                    ..Default::default()
                },
            });
        }

        let safe: Vec<IrNode> = safe.into_iter().cloned().collect();
        let table = SelectorOccurrenceTable::build(&safe);

        let (initial_url, initial_url_source) = self.initial_url(&safe, base_url_override);

        let mut report = EmitReport {
            input_count: nodes.len(),
            emitted_count: safe.len(),
            dropped,
            initial_url: initial_url.clone(),
            initial_url_source,
            first_locators: 0,
            indexed_locators: 0,
        };

        let mut script = String::new();
        script.push_str("// Generated by stepscript from a recorded browser trace\n");
        script.push_str("const { chromium } = require('playwright');\n\n");
        script.push_str("async function run() {\n");
        script.push_str("    const browser = await chromium.launch();\n");
        script.push_str("    const page = await browser.newPage();\n\n");
        script.push_str("    try {\n");
        self.write_initial_navigation(&mut script, &initial_url);

        let first_navigate = safe.iter().position(|n| n.action == IrAction::Navigate);
        for (position, node) in safe.iter().enumerate() {
            if Some(position) == first_navigate {
                continue;
            }

            let locator = match node.selector() {
                Some(sel) if node.action.is_interactive() => {
                    let total = table.total(sel);
                    let occurrence = table.occurrence(sel, position).unwrap_or(0);
                    if total > 1 {
                        report.indexed_locators += 1;
                    } else {
                        report.first_locators += 1;
                    }
                    Some(locator_expression(sel, total, occurrence))
                }
                _ => None,
            };

            debug!(position, action = %node.action, "Emitting step");
            self.write_step(&mut script, position + 1, node, locator.as_deref());
        }

        script.push('\n');
        script.push_str("        console.log(\"All steps completed\");\n");
        script.push_str("    } catch (error) {\n");
        script.push_str("        console.error(\"Run failed: \" + error.message);\n");
        script.push_str("        process.exitCode = 1;\n");
        script.push_str("    } finally {\n");
        script.push_str("        await browser.close();\n");
        script.push_str("    }\n");
        script.push_str("}\n\n");
        script.push_str("run().catch((error) => {\n");
        script.push_str("    console.error(\"Unrecoverable error: \" + error.message);\n");
        script.push_str("    process.exit(1);\n");
        script.push_str("});\n");

        info!(
            nodes = report.input_count,
            emitted = report.emitted_count,
            dropped = report.dropped.len(),
            initial_url = %report.initial_url,
            "Emission complete"
        );

        Ok(Emission { script, report })
    }

    fn initial_url(&self, nodes: &[IrNode], base_url_override: Option<&str>) -> (String, InitialUrlSource) {
        if let Some(url) = base_url_override.map(str::trim).filter(|u| !u.is_empty()) {
            return (url.to_string(), InitialUrlSource::Override);
        }

        let first_navigate = nodes
            .iter()
            .find(|n| n.action == IrAction::Navigate)
            .and_then(IrNode::url);
        if let Some(url) = first_navigate {
            return (url.to_string(), InitialUrlSource::FirstNavigate);
        }

        (self.options.placeholder_url.clone(), InitialUrlSource::Placeholder)
    }

    fn write_initial_navigation(&self, out: &mut String, url: &str) {
        let url = js_string(url);
        let _ = writeln!(out, "{INDENT}// Initial navigation (failures are not fatal)");
        let _ = writeln!(out, "{INDENT}console.log(\"Navigating to \" + {url});");
        let _ = writeln!(out, "{INDENT}try {{");
        let _ = writeln!(
            out,
            "{INDENT}    await page.goto({url}, {{ waitUntil: \"load\", timeout: {} }});",
            self.options.navigation_timeout_ms
        );
        let _ = writeln!(out, "{INDENT}    await page.waitForTimeout(1000);");
        let _ = writeln!(out, "{INDENT}}} catch (error) {{");
        let _ = writeln!(
            out,
            "{INDENT}    console.warn(\"Initial navigation warning: \" + error.message + \" (continuing)\");"
        );
        let _ = writeln!(out, "{INDENT}}}");
    }

    fn write_step(&self, out: &mut String, number: usize, node: &IrNode, locator: Option<&str>) {
        let description = comment_text(&node.description);
        let timeout = self.options.action_timeout_ms;

        let mut body: Vec<String> = Vec::new();
        if let Some(locator) = locator {
            body.push(format!("const locator = {locator};"));
            body.push(format!(
                "await locator.waitFor({{ state: \"visible\", timeout: {timeout} }});"
            ));
        }

        let value = node.value.as_deref().unwrap_or_default();
        match node.action {
            IrAction::Navigate => body.push(format!(
                "await page.goto({}, {{ waitUntil: \"load\", timeout: {} }});",
                js_string(node.url().unwrap_or_default()),
                self.options.navigation_timeout_ms
            )),
            IrAction::Click => body.push("await locator.click();".to_string()),
            IrAction::Fill => body.push(format!("await locator.fill({});", js_string(value))),
            IrAction::Select => {
                body.push(format!("await locator.selectOption({});", js_string(value)))
            }
            IrAction::Hover => body.push("await locator.hover();".to_string()),
            IrAction::Wait => body.push(format!("await page.waitForTimeout({});", node.wait_time_ms)),
            IrAction::Scroll => body.push(
                "await page.evaluate(() => window.scrollBy(0, window.innerHeight));".to_string(),
            ),
            IrAction::Press => {
                let key = if value.is_empty() { "Enter" } else { value };
                body.push(format!("await page.keyboard.press({});", js_string(key)));
            }
            IrAction::Keyboard => {
                body.push(format!("await page.keyboard.type({});", js_string(value)))
            }
            IrAction::Screenshot => body.push(format!(
                "await page.screenshot({{ path: \"step-{number}.png\" }});"
            )),
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "{INDENT}// Step {number}: {} - {description}", node.action);
        let _ = writeln!(
            out,
            "{INDENT}console.log({});",
            js_string(&format!("Step {number}: {description}"))
        );
        let _ = writeln!(out, "{INDENT}try {{");
        for line in body {
            let _ = writeln!(out, "{INDENT}    {line}");
        }
        let _ = writeln!(out, "{INDENT}}} catch (error) {{");
        let _ = writeln!(
            out,
            "{INDENT}    throw new Error(\"{} failed at step {number}: \" + error.message);",
            failure_label(node.action)
        );
        let _ = writeln!(out, "{INDENT}}}");
    }
}

/// Final per-node check before any text is written
fn check_node(node: &IrNode) -> Result<(), StepError> {
    if node.action.is_interactive() {
        let Some(sel) = node.selector() else {
            return Err(StepError::empty_selector(node.action));
        };
        if !selector::is_valid(sel) {
            return Err(StepError::malformed(sel));
        }
    }
    if node.action == IrAction::Navigate && node.url().is_none() {
        return Err(StepError::MissingNavigationUrl);
    }
    Ok(())
}

/// `page.locator('<sel>').first()` for unique selectors, `.nth(k)` otherwise
pub fn locator_expression(selector: &str, total: usize, occurrence: usize) -> String {
    let escaped = selector.replace('\\', "\\\\").replace('\'', "\\'");
    if total > 1 {
        format!("page.locator('{escaped}').nth({occurrence})")
    } else {
        format!("page.locator('{escaped}').first()")
    }
}

fn failure_label(action: IrAction) -> &'static str {
    match action {
        IrAction::Navigate => "Navigation",
        IrAction::Click => "Click",
        IrAction::Fill => "Fill",
        IrAction::Select => "Select",
        IrAction::Wait => "Wait",
        IrAction::Scroll => "Scroll",
        IrAction::Hover => "Hover",
        IrAction::Press => "Key press",
        IrAction::Keyboard => "Keyboard input",
        IrAction::Screenshot => "Screenshot",
    }
}

/// Double-quoted JavaScript string literal
pub fn js_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Single-line text safe to place after `//`
fn comment_text(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_control() || c == '\u{2028}' || c == '\u{2029}' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click(selector: &str) -> IrNode {
        IrNode::new(IrAction::Click, format!("Click {selector}")).with_selector(selector)
    }

    fn emit(nodes: &[IrNode]) -> Emission {
        CodeEmitter::default().emit(nodes, None).unwrap()
    }

    #[test]
    fn test_repeated_selector_gets_indices_in_order() {
        let nodes = vec![click(".item"), click(".item"), click(".item")];
        let emission = emit(&nodes);

        let a = emission.script.find("page.locator('.item').nth(0)").unwrap();
        let b = emission.script.find("page.locator('.item').nth(1)").unwrap();
        let c = emission.script.find("page.locator('.item').nth(2)").unwrap();
        assert!(a < b && b < c);
        assert!(!emission.script.contains(".first()"));
        assert_eq!(emission.report.indexed_locators, 3);
    }

    #[test]
    fn test_unique_selector_uses_first() {
        let emission = emit(&[click("#go")]);
        assert!(emission.script.contains("page.locator('#go').first()"));
        assert!(!emission.script.contains(".nth("));
        assert_eq!(emission.report.first_locators, 1);
    }

    #[test]
    fn test_occurrences_ignore_other_kinds() {
        let nodes = vec![
            click(".item"),
            IrNode::new(IrAction::Wait, "pause").with_selector(".item"),
            IrNode::new(IrAction::Hover, "hover").with_selector(".item"),
        ];
        let table = SelectorOccurrenceTable::build(&nodes);
        assert_eq!(table.total(".item"), 2);
        assert_eq!(table.occurrence(".item", 0), Some(0));
        assert_eq!(table.occurrence(".item", 1), None);
        assert_eq!(table.occurrence(".item", 2), Some(1));
    }

    #[test]
    fn test_initial_url_priority() {
        let nodes = vec![
            click("#a"),
            IrNode::new(IrAction::Navigate, "go").with_url("https://first.test/"),
            IrNode::new(IrAction::Navigate, "again").with_url("https://second.test/"),
        ];

        let emission = CodeEmitter::default()
            .emit(&nodes, Some("https://override.test/"))
            .unwrap();
        assert_eq!(emission.report.initial_url, "https://override.test/");
        assert_eq!(emission.report.initial_url_source, InitialUrlSource::Override);

        let emission = emit(&nodes);
        assert_eq!(emission.report.initial_url, "https://first.test/");
        // The first navigate is covered by the initial navigation
        assert_eq!(emission.script.matches("page.goto(").count(), 2);
        assert!(emission.script.contains("https://second.test/"));

        let emission = emit(&[click("#a")]);
        assert_eq!(emission.report.initial_url, DEFAULT_PLACEHOLDER_URL);
        assert_eq!(emission.report.initial_url_source, InitialUrlSource::Placeholder);
    }

    #[test]
    fn test_every_step_is_fail_fast() {
        let nodes = vec![
            click("#go"),
            IrNode::new(IrAction::Fill, "Type").with_selector("[name=q]").with_value("a \"b\""),
            IrNode::new(IrAction::Wait, "Wait").with_wait_time(2000),
        ];
        let script = emit(&nodes).script;

        assert!(script.contains("throw new Error(\"Click failed at step 1: \" + error.message);"));
        assert!(script.contains("throw new Error(\"Fill failed at step 2: \" + error.message);"));
        assert!(script.contains("throw new Error(\"Wait failed at step 3: \" + error.message);"));
        assert!(script.contains("await locator.fill(\"a \\\"b\\\"\");"));
        assert!(script.contains("await page.waitForTimeout(2000);"));
        assert!(script.contains("console.warn(\"Initial navigation warning"));
        assert!(script.contains("} finally {\n        await browser.close();"));
    }

    #[test]
    fn test_invalid_nodes_dropped_then_empty_is_error() {
        let nodes = vec![
            IrNode::new(IrAction::Click, "no selector"),
            IrNode::new(IrAction::Navigate, "no url"),
        ];
        let err = CodeEmitter::default().emit(&nodes, None).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EmptyPipelineOutput { stage: Stage::Emit, .. }
        ));

        let nodes = vec![IrNode::new(IrAction::Click, "bad").with_selector("p>"), click("#ok")];
        let emission = emit(&nodes);
        assert_eq!(emission.report.dropped.len(), 1);
        assert_eq!(emission.report.dropped[0].step_index, 0);
        assert_eq!(emission.report.emitted_count, 1);
    }

    #[test]
    fn test_dropped_nodes_keep_recorded_index() {
        let nodes = vec![
            click("#ok").with_step_index(3),
            IrNode::new(IrAction::Click, "bad")
                .with_selector("p>")
                .with_step_index(9),
        ];
        let emission = emit(&nodes);
        assert_eq!(emission.report.dropped.len(), 1);
        assert_eq!(emission.report.dropped[0].step_index, 9);
    }

    #[test]
    fn test_escaping() {
        assert_eq!(js_string("a\\b\n\"c\""), "\"a\\\\b\\n\\\"c\\\"\"");
        assert_eq!(
            locator_expression("[aria-label='x']", 1, 0),
            "page.locator('[aria-label=\\'x\\']').first()"
        );
        assert_eq!(comment_text("line one\nline two"), "line one line two");
    }
}

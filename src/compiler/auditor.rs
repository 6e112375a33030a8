//! Static audit of an emitted script.
//!
//! Purely textual: nothing is executed. Structural counts are taken over code
//! with string and comment contents blanked out, so a brace inside a string
//! literal never unbalances the result.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::PipelineError;

/// Fragments every runnable script must contain
pub const REQUIRED_BOILERPLATE: &[(&str, &str)] = &[
    ("require('playwright')", "Missing Playwright import"),
    ("async function", "Missing async function"),
    ("chromium.launch()", "Missing browser launch"),
    ("newPage()", "Missing page creation"),
    ("browser.close()", "Missing browser cleanup"),
];

/// Characters that never belong in a recorded selector
pub const DISALLOWED_SELECTOR_CHARS: &[char] = &['<', '>', '&', '|', '^', '$', '%'];

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn try_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"\btry\s*\{")
}

fn catch_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"\}\s*catch\s*\(")
}

fn locator_pattern() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, r"page\.locator\('((?:[^'\\\n]|\\.)*)'\)")
}

/// Script statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStats {
    pub total_lines: usize,
    pub non_empty_lines: usize,
    pub functions: usize,
    pub goto_calls: usize,
    pub try_blocks: usize,
    pub await_statements: usize,
    pub locators: usize,
    pub waits: usize,
    pub throws: usize,
    pub comments: usize,
}

/// Verdict with an itemized error list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub passed: bool,
    pub errors: Vec<String>,
    pub stats: ScriptStats,
}

impl AuditReport {
    /// Turn a failed audit into a run-level error
    pub fn to_failure(&self) -> Option<PipelineError> {
        if self.passed {
            None
        } else {
            Some(PipelineError::AuditFailure {
                errors: self.errors.clone(),
            })
        }
    }
}

/// Static script checker
#[derive(Debug, Clone, Copy, Default)]
pub struct CodeAuditor;

impl CodeAuditor {
    pub fn new() -> Self {
        Self
    }

    pub fn audit(&self, script: &str) -> AuditReport {
        let mut errors = Vec::new();

        for (fragment, message) in REQUIRED_BOILERPLATE {
            if !script.contains(fragment) {
                errors.push((*message).to_string());
            }
        }

        let scan = scan(script);
        for (open, close, name) in [('{', '}', "braces"), ('(', ')', "parentheses"), ('[', ']', "brackets")] {
            let opened = scan.code.matches(open).count();
            let closed = scan.code.matches(close).count();
            if opened != closed {
                errors.push(format!("Unbalanced {name}: {opened} open, {closed} close"));
            }
        }

        let try_count = count(try_pattern(), &scan.code);
        let catch_count = count(catch_pattern(), &scan.code);
        if try_count != catch_count {
            errors.push(format!(
                "Mismatched try-catch blocks: {try_count} try, {catch_count} catch"
            ));
        }

        let mut locators = 0;
        if let Some(pattern) = locator_pattern() {
            for caps in pattern.captures_iter(script) {
                locators += 1;
                let Some(selector) = caps.get(1).map(|m| m.as_str()) else {
                    continue;
                };
                if let Some(bad) = selector.chars().find(|c| DISALLOWED_SELECTOR_CHARS.contains(c)) {
                    errors.push(format!("Invalid character '{bad}' in selector: {selector}"));
                }
            }
        }

        for line in &scan.unterminated_lines {
            let text: String = script
                .lines()
                .nth(line - 1)
                .unwrap_or_default()
                .trim()
                .chars()
                .take(50)
                .collect();
            errors.push(format!("Unterminated string on line {line}: {text}"));
        }

        let lines: Vec<&str> = script.lines().collect();
        let stats = ScriptStats {
            total_lines: lines.len(),
            non_empty_lines: lines.iter().filter(|l| !l.trim().is_empty()).count(),
            functions: word_count(&scan.code, "function"),
            goto_calls: scan.code.matches("page.goto(").count(),
            try_blocks: try_count,
            await_statements: word_count(&scan.code, "await"),
            locators,
            waits: scan.code.matches(".waitFor(").count()
                + scan.code.matches(".waitForTimeout(").count(),
            throws: word_count(&scan.code, "throw"),
            comments: scan.comments,
        };

        let passed = errors.is_empty();
        if passed {
            info!(lines = stats.total_lines, locators = stats.locators, "Audit passed");
        } else {
            for error in &errors {
                warn!(%error, "Audit finding");
            }
        }

        AuditReport {
            passed,
            errors,
            stats,
        }
    }
}

fn count(pattern: Option<&Regex>, text: &str) -> usize {
    pattern.map(|p| p.find_iter(text).count()).unwrap_or(0)
}

fn word_count(text: &str, word: &str) -> usize {
    text.match_indices(word)
        .filter(|(at, _)| {
            let before = text[..*at].chars().next_back();
            let after = text[at + word.len()..].chars().next();
            !before.map(is_ident_char).unwrap_or(false) && !after.map(is_ident_char).unwrap_or(false)
        })
        .count()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

struct Scan {
    /// Script with string and comment contents replaced by spaces
    code: String,
    /// 1-based lines on which a quoted literal was left open
    unterminated_lines: Vec<usize>,
    comments: usize,
}

#[derive(Clone, Copy)]
enum State {
    Code,
    LineComment,
    BlockComment,
    Quoted(char),
    Template,
}

fn scan(script: &str) -> Scan {
    let mut code = String::with_capacity(script.len());
    let mut unterminated_lines = Vec::new();
    let mut comments = 0;
    let mut state = State::Code;
    let mut line = 1;
    let mut chars = script.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    comments += 1;
                    code.push_str("  ");
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    comments += 1;
                    code.push_str("  ");
                    state = State::BlockComment;
                }
                '\'' | '"' => {
                    code.push(c);
                    state = State::Quoted(c);
                }
                '`' => {
                    code.push(c);
                    state = State::Template;
                }
                _ => code.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    code.push('\n');
                    state = State::Code;
                } else {
                    code.push(' ');
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    code.push_str("  ");
                    state = State::Code;
                } else {
                    code.push(if c == '\n' { '\n' } else { ' ' });
                }
            }
            State::Quoted(quote) => match c {
                '\\' => {
                    code.push(' ');
                    if let Some(escaped) = chars.next() {
                        code.push(if escaped == '\n' { '\n' } else { ' ' });
                        if escaped == '\n' {
                            line += 1;
                        }
                    }
                }
                '\n' => {
                    unterminated_lines.push(line);
                    code.push('\n');
                    state = State::Code;
                }
                c if c == quote => {
                    code.push(c);
                    state = State::Code;
                }
                _ => code.push(' '),
            },
            State::Template => match c {
                '\\' => {
                    code.push(' ');
                    if chars.next().is_some() {
                        code.push(' ');
                    }
                }
                '`' => {
                    code.push(c);
                    state = State::Code;
                }
                '\n' => code.push('\n'),
                _ => code.push(' '),
            },
        }

        if c == '\n' {
            line += 1;
        }
    }

    if let State::Quoted(_) = state {
        unterminated_lines.push(line);
    }

    Scan {
        code,
        unterminated_lines,
        comments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::emitter::CodeEmitter;
    use crate::domain::{IrAction, IrNode};

    const MINIMAL: &str = "const { chromium } = require('playwright');\n\
        async function run() {\n\
        const browser = await chromium.launch();\n\
        const page = await browser.newPage();\n\
        try {\n\
            await page.locator('#go').first().click();\n\
        } catch (error) {\n\
            throw error;\n\
        } finally {\n\
            await browser.close();\n\
        }\n\
        }\n";

    #[test]
    fn test_minimal_script_passes() {
        let report = CodeAuditor::new().audit(MINIMAL);
        assert!(report.passed, "{:?}", report.errors);
        assert_eq!(report.stats.try_blocks, 1);
        assert_eq!(report.stats.locators, 1);
        assert_eq!(report.stats.throws, 1);
        assert!(report.to_failure().is_none());
    }

    #[test]
    fn test_emitted_script_passes() {
        let nodes = vec![
            IrNode::new(IrAction::Navigate, "Open").with_url("https://x.test/"),
            IrNode::new(IrAction::Click, "Click {weird} (text)").with_selector("#go"),
            IrNode::new(IrAction::Fill, "Type").with_selector("[name=q]").with_value("a { b"),
            IrNode::new(IrAction::Scroll, "Scroll"),
        ];
        let script = CodeEmitter::default().emit(&nodes, None).unwrap().script;
        let report = CodeAuditor::new().audit(&script);
        assert!(report.passed, "{:?}", report.errors);
        assert_eq!(report.stats.goto_calls, 1);
        assert_eq!(report.stats.try_blocks, 5);
    }

    #[test]
    fn test_missing_boilerplate() {
        let report = CodeAuditor::new().audit("console.log('hi');\n");
        assert!(!report.passed);
        assert!(report.errors.contains(&"Missing Playwright import".to_string()));
        assert!(report.errors.contains(&"Missing browser cleanup".to_string()));
    }

    #[test]
    fn test_unbalanced_and_mismatched() {
        let script = MINIMAL.replace("} catch (error) {", "} finally {");
        let report = CodeAuditor::new().audit(&script);
        assert!(report
            .errors
            .iter()
            .any(|e| e.starts_with("Mismatched try-catch blocks")));

        let script = format!("{MINIMAL}function extra() {{\n");
        let report = CodeAuditor::new().audit(&script);
        assert!(report.errors.iter().any(|e| e.starts_with("Unbalanced braces")));
    }

    #[test]
    fn test_braces_inside_strings_ignored() {
        let script = format!("{MINIMAL}console.log(\"}}}} ((\"); // ]]\n");
        let report = CodeAuditor::new().audit(&script);
        assert!(report.passed, "{:?}", report.errors);
    }

    #[test]
    fn test_disallowed_selector_chars() {
        let script = MINIMAL.replace("#go", "div > a");
        let report = CodeAuditor::new().audit(&script);
        assert!(report
            .errors
            .iter()
            .any(|e| e.contains("Invalid character '>'")));
    }

    #[test]
    fn test_unterminated_string() {
        let script = format!("{MINIMAL}console.log(\"oops);\n");
        let report = CodeAuditor::new().audit(&script);
        assert!(report.errors.iter().any(|e| e.starts_with("Unterminated string on line 13")));
        let failure = report.to_failure().unwrap();
        assert!(matches!(failure, PipelineError::AuditFailure { .. }));
    }
}

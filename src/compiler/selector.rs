//! Selector-stability policy and the syntactic selector checker.
//!
//! Selectors are chosen from a single attribute in a fixed priority order:
//! id, data-testid, name, aria-label, first class token, then the bare tag.
//! Validation is purely syntactic; nothing here ever looks at a live page.

use crate::domain::ElementHints;

/// Pick the most stable selector for an element, or `None` if the hints are empty
pub fn choose(hints: &ElementHints) -> Option<String> {
    let id = hints.id.trim();
    if !id.is_empty() {
        return Some(format!("#{id}"));
    }

    let test_id = hints.test_id.trim();
    if !test_id.is_empty() {
        return Some(attribute_selector("data-testid", test_id));
    }

    let name = hints.name.trim();
    if !name.is_empty() {
        return Some(attribute_selector("name", name));
    }

    let aria_label = hints.aria_label.trim();
    if !aria_label.is_empty() {
        return Some(attribute_selector("aria-label", aria_label));
    }

    if let Some(class) = hints.class.split_whitespace().next() {
        return Some(format!(".{class}"));
    }

    let tag = hints.tag.trim();
    if !tag.is_empty() {
        return Some(tag.to_ascii_lowercase());
    }

    None
}

/// Build `[attr=value]`, quoting the value unless it is a plain identifier
pub fn attribute_selector(attribute: &str, value: &str) -> String {
    if is_css_identifier(value) {
        format!("[{attribute}={value}]")
    } else {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("[{attribute}=\"{escaped}\"]")
    }
}

fn is_css_identifier(value: &str) -> bool {
    let rest = value.strip_prefix('-').unwrap_or(value);
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Syntactic validity check for a CSS selector.
///
/// Accepts `#id`, `.class`, `[attr...]`, bare tag names, and other
/// letter-initial selectors that survive the generic checks.
pub fn is_valid(selector: &str) -> bool {
    if selector.trim().is_empty() {
        return false;
    }

    if selector.contains(['<', '>', '\n', '\r']) {
        return false;
    }

    let chars: Vec<char> = selector.chars().collect();
    if chars
        .windows(2)
        .any(|pair| pair[0].is_whitespace() && pair[1].is_whitespace())
    {
        return false;
    }

    if selector.contains("[]") || selector.contains("()") {
        return false;
    }

    const EDGE: [char; 5] = ['{', '}', '(', ')', '>'];
    let first = chars[0];
    let last = chars[chars.len() - 1];
    if EDGE.contains(&first) || EDGE.contains(&last) {
        return false;
    }

    if !is_balanced(&chars, '[', ']') || !is_balanced(&chars, '(', ')') {
        return false;
    }

    match first {
        '#' | '.' => chars.len() > 1 && chars[1..].iter().all(|&c| is_word_char(c)),
        '[' => {
            last == ']' && {
                let interior: String = chars[1..chars.len() - 1].iter().collect();
                !interior.trim().is_empty()
            }
        }
        // Bare tag names and compound selectors like `input[name=q]`; the
        // latter are covered by the generic checks above.
        c => c.is_ascii_alphabetic(),
    }
}

fn is_balanced(chars: &[char], open: char, close: char) -> bool {
    let mut depth: i32 = 0;
    for &c in chars {
        if c == open {
            depth += 1;
        } else if c == close {
            depth -= 1;
            if depth < 0 {
                return false;
            }
        }
    }
    depth == 0
}

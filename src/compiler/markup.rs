//! Minimal tokenizer for recorded markup fragments.
//!
//! Recorders capture `outerHTML` of the target element, usually truncated and
//! not always well formed. We only need start tags, their attributes, and the
//! first inner text run, so this is a forgiving single-pass scanner rather than
//! an HTML parser. Attribute lookups return the first non-empty occurrence
//! across all start tags in document order.

use crate::domain::ElementHints;

/// One start tag with its attributes in source order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    /// Lowercased tag name
    pub name: String,

    /// Lowercased attribute names with raw values
    pub attributes: Vec<(String, String)>,
}

impl StartTag {
    /// Value of an attribute on this tag (may be empty for boolean attributes)
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }
}

/// Tokenized markup fragment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Markup {
    tags: Vec<StartTag>,
    leading_tag: bool,
    inner_text: Option<String>,
}

impl Markup {
    /// Tokenize a fragment. Never fails; garbage yields an empty result.
    pub fn parse(html: &str) -> Self {
        let bytes = html.as_bytes();
        let len = bytes.len();
        let mut markup = Markup::default();
        let mut pos = 0;
        let mut after_tag = false;

        let first_content = html.len() - html.trim_start().len();

        while pos < len {
            if bytes[pos] == b'<' {
                if html[pos..].starts_with("<!--") {
                    pos = html[pos..].find("-->").map(|i| pos + i + 3).unwrap_or(len);
                    after_tag = true;
                    continue;
                }

                match bytes.get(pos + 1) {
                    Some(b'/') | Some(b'!') | Some(b'?') => {
                        pos = find_byte(bytes, pos, b'>').map(|i| i + 1).unwrap_or(len);
                        after_tag = true;
                        continue;
                    }
                    Some(c) if c.is_ascii_alphabetic() => {
                        let (tag, end) = parse_start_tag(html, pos + 1);
                        if pos == first_content && markup.tags.is_empty() {
                            markup.leading_tag = true;
                        }
                        markup.tags.push(tag);
                        pos = end;
                        after_tag = true;
                        continue;
                    }
                    // A stray '<' is ordinary text
                    _ => {}
                }
            }

            let end = find_byte(bytes, pos + 1, b'<').unwrap_or(len);
            if after_tag && markup.inner_text.is_none() && html[end..].starts_with("</") {
                let text = html[pos..end].trim();
                if !text.is_empty() {
                    markup.inner_text = Some(text.to_string());
                }
            }
            after_tag = false;
            pos = end;
        }

        markup
    }

    /// The start tag the fragment opens with, if it opens with one
    pub fn root(&self) -> Option<&StartTag> {
        if self.leading_tag {
            self.tags.first()
        } else {
            None
        }
    }

    /// Name of the root tag (lowercase), empty if none
    pub fn tag(&self) -> &str {
        self.root().map(|t| t.name.as_str()).unwrap_or("")
    }

    /// First non-empty value of an attribute across all start tags
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .filter_map(|tag| tag.attribute(name))
            .find(|value| !value.trim().is_empty())
    }

    /// Attribute value or empty string
    pub fn attr(&self, name: &str) -> String {
        self.attribute(name).unwrap_or_default().to_string()
    }

    /// Selector hints for the element this fragment describes
    pub fn hints(&self) -> ElementHints {
        ElementHints {
            id: self.attr("id"),
            class: self.attr("class"),
            name: self.attr("name"),
            test_id: self.attr("data-testid"),
            aria_label: self.attr("aria-label"),
            tag: self.tag().to_string(),
        }
    }

    /// First text run that is directly closed by an end tag
    pub fn inner_text(&self) -> Option<&str> {
        self.inner_text.as_deref()
    }

    pub fn tags(&self) -> &[StartTag] {
        &self.tags
    }

    /// Whether the root element accepts free text input
    pub fn is_text_like(&self) -> bool {
        let Some(root) = self.root() else {
            return false;
        };

        if root.has_attribute("contenteditable") {
            return true;
        }

        match root.name.as_str() {
            "textarea" => true,
            "input" => {
                let input_type = root.attribute("type").unwrap_or("text").to_ascii_lowercase();
                matches!(
                    input_type.as_str(),
                    "" | "text" | "email" | "search" | "password" | "tel" | "url" | "number"
                )
            }
            _ => false,
        }
    }
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    bytes
        .get(from..)?
        .iter()
        .position(|&b| b == needle)
        .map(|i| from + i)
}

fn is_name_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

/// Parse a start tag whose name begins at `start`; returns the tag and the
/// position just past its closing '>'
fn parse_start_tag(html: &str, start: usize) -> (StartTag, usize) {
    let bytes = html.as_bytes();
    let len = bytes.len();
    let mut pos = start;

    while pos < len && is_name_char(bytes[pos]) {
        pos += 1;
    }
    let name = html[start..pos].to_ascii_lowercase();
    let mut attributes = Vec::new();

    loop {
        while pos < len && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }
        if pos >= len {
            break;
        }

        match bytes[pos] {
            b'>' => {
                pos += 1;
                break;
            }
            b'/' => {
                pos += 1;
                continue;
            }
            b'"' | b'\'' | b'=' => {
                pos += 1;
                continue;
            }
            _ => {}
        }

        let name_start = pos;
        while pos < len
            && !bytes[pos].is_ascii_whitespace()
            && !matches!(bytes[pos], b'=' | b'>' | b'/' | b'"' | b'\'')
        {
            pos += 1;
        }
        let attr_name = html[name_start..pos].to_ascii_lowercase();

        while pos < len && bytes[pos].is_ascii_whitespace() {
            pos += 1;
        }

        let mut value = String::new();
        if pos < len && bytes[pos] == b'=' {
            pos += 1;
            while pos < len && bytes[pos].is_ascii_whitespace() {
                pos += 1;
            }
            if pos < len && (bytes[pos] == b'"' || bytes[pos] == b'\'') {
                let quote = bytes[pos];
                let value_start = pos + 1;
                let value_end = find_byte(bytes, value_start, quote).unwrap_or(len);
                value = html[value_start.min(len)..value_end].to_string();
                pos = (value_end + 1).min(len);
            } else {
                let value_start = pos;
                while pos < len && !bytes[pos].is_ascii_whitespace() && bytes[pos] != b'>' {
                    pos += 1;
                }
                value = html[value_start..pos].to_string();
            }
        }

        attributes.push((attr_name, value));
    }

    (StartTag { name, attributes }, pos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_button() {
        let markup = Markup::parse(r#"<button id="go" class="btn primary">Go</button>"#);
        assert_eq!(markup.tag(), "button");
        assert_eq!(markup.attribute("id"), Some("go"));
        assert_eq!(markup.attribute("class"), Some("btn primary"));
        assert_eq!(markup.inner_text(), Some("Go"));
    }

    #[test]
    fn test_testid_does_not_leak_into_id() {
        let markup = Markup::parse(r#"<div data-testid="card"><span>x</span></div>"#);
        assert_eq!(markup.attribute("id"), None);
        assert_eq!(markup.attribute("data-testid"), Some("card"));
    }

    #[test]
    fn test_first_non_empty_match_wins() {
        let markup = Markup::parse(r#"<div id=""><button id="inner" id="second">Go</button></div>"#);
        assert_eq!(markup.attribute("id"), Some("inner"));
        assert_eq!(markup.tag(), "div");
    }

    #[test]
    fn test_single_quotes_and_unquoted_values() {
        let markup = Markup::parse("<input name='q' type=text placeholder=\"Search\" disabled>");
        assert_eq!(markup.attribute("name"), Some("q"));
        assert_eq!(markup.attribute("type"), Some("text"));
        assert_eq!(markup.attribute("placeholder"), Some("Search"));
        assert_eq!(markup.root().unwrap().attribute("disabled"), Some(""));
        assert!(markup.is_text_like());
    }

    #[test]
    fn test_inner_text_must_be_closed() {
        let markup = Markup::parse("<div>Hello <b>world</b></div>");
        assert_eq!(markup.inner_text(), Some("world"));

        let markup = Markup::parse("<a href=\"/x\"><span>  Sign in </span></a>");
        assert_eq!(markup.inner_text(), Some("Sign in"));
    }

    #[test]
    fn test_no_leading_tag() {
        let markup = Markup::parse("text before <b id=\"x\">b</b>");
        assert_eq!(markup.tag(), "");
        assert!(markup.root().is_none());
        assert_eq!(markup.attribute("id"), Some("x"));
        assert_eq!(markup.hints().tag, "");
        assert_eq!(markup.hints().id, "x");
    }

    #[test]
    fn test_truncated_markup_does_not_panic() {
        let markup = Markup::parse(r#"<button id="go" class="bt"#);
        assert_eq!(markup.attribute("id"), Some("go"));
        assert_eq!(markup.attribute("class"), Some("bt"));

        let markup = Markup::parse("<");
        assert!(markup.tags().is_empty());

        let markup = Markup::parse("a < b <!-- c");
        assert!(markup.tags().is_empty());
    }

    #[test]
    fn test_text_like_detection() {
        assert!(Markup::parse("<textarea></textarea>").is_text_like());
        assert!(Markup::parse("<input>").is_text_like());
        assert!(Markup::parse("<div contenteditable>x</div>").is_text_like());
        assert!(!Markup::parse("<input type=\"checkbox\">").is_text_like());
        assert!(!Markup::parse("<button>x</button>").is_text_like());
    }

    #[test]
    fn test_multibyte_text() {
        let markup = Markup::parse("<span title=\"naïve\">café ☕</span>");
        assert_eq!(markup.attribute("title"), Some("naïve"));
        assert_eq!(markup.inner_text(), Some("café ☕"));
    }
}

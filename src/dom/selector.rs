//! Minimal CSS selector support for event delegation.
//!
//! Only compound selectors are understood: a type selector (or `*`) followed by any number
//! of `#id`, `.class`, `[attr]` and `[attr=value]` parts. Lists are separated by commas.
//! Combinators are rejected because delegation only ever tests one element at a time.

use std::fmt;
use std::str::FromStr;

use crate::dom::error::{invalid_selector, DomError, DomResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectorList {
    source: String,
    selectors: Vec<CompoundSelector>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct CompoundSelector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<AttributeSelector>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct AttributeSelector {
    name: String,
    value: Option<String>,
}

impl SelectorList {
    pub fn parse(source: &str) -> DomResult<Self> {
        let mut selectors = Vec::new();
        for part in split_list(source) {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid_selector(format!("empty selector in `{source}`")));
            }
            selectors.push(parse_compound(part)?);
        }
        Ok(Self {
            source: source.trim().to_string(),
            selectors,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Tests an element described by its lower-cased tag name and attribute list.
    pub(crate) fn matches_parts(&self, tag_name: &str, attributes: &[(String, String)]) -> bool {
        self.selectors
            .iter()
            .any(|selector| selector.matches(tag_name, attributes))
    }
}

impl FromStr for SelectorList {
    type Err = DomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SelectorList::parse(s)
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl CompoundSelector {
    fn matches(&self, tag_name: &str, attributes: &[(String, String)]) -> bool {
        let attribute = |name: &str| {
            attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };

        if let Some(tag) = &self.tag {
            if tag != tag_name {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if attribute("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let class_attr = attribute("class").unwrap_or_default();
            if !self
                .classes
                .iter()
                .all(|class| class_attr.split_whitespace().any(|token| token == class))
            {
                return false;
            }
        }
        self.attributes.iter().all(|selector| match attribute(&selector.name) {
            None => false,
            Some(actual) => selector
                .value
                .as_deref()
                .map_or(true, |expected| expected == actual),
        })
    }
}

/// Splits a selector list on commas outside attribute brackets and quoted values.
fn split_list(source: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_brackets = false;
    let mut quote = None;
    for (index, c) in source.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') if in_brackets => quote = Some(c),
            (None, '[') => in_brackets = true,
            (None, ']') => in_brackets = false,
            (None, ',') if !in_brackets => {
                parts.push(&source[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&source[start..]);
    parts
}

fn parse_compound(source: &str) -> DomResult<CompoundSelector> {
    let mut selector = CompoundSelector::default();
    let chars: Vec<char> = source.chars().collect();
    let mut pos = 0;

    if chars[0] == '*' {
        pos = 1;
    } else if is_ident_char(chars[0]) {
        let tag = read_ident(&chars, &mut pos);
        selector.tag = Some(tag.to_ascii_lowercase());
    }

    while pos < chars.len() {
        match chars[pos] {
            '#' => {
                pos += 1;
                let id = read_ident(&chars, &mut pos);
                if id.is_empty() {
                    return Err(invalid_selector(format!("missing id in `{source}`")));
                }
                selector.id = Some(id);
            }
            '.' => {
                pos += 1;
                let class = read_ident(&chars, &mut pos);
                if class.is_empty() {
                    return Err(invalid_selector(format!("missing class name in `{source}`")));
                }
                selector.classes.push(class);
            }
            '[' => {
                pos += 1;
                let start = pos;
                let mut quote = None;
                while pos < chars.len() {
                    match (quote, chars[pos]) {
                        (None, ']') => break,
                        (None, c @ ('"' | '\'')) => quote = Some(c),
                        (Some(q), c) if c == q => quote = None,
                        _ => {}
                    }
                    pos += 1;
                }
                if pos == chars.len() {
                    return Err(invalid_selector(format!("unterminated attribute selector in `{source}`")));
                }
                let body: String = chars[start..pos].iter().collect();
                pos += 1;
                selector.attributes.push(parse_attribute(&body, source)?);
            }
            other => {
                return Err(invalid_selector(format!(
                    "unsupported character `{other}` in selector `{source}`"
                )))
            }
        }
    }

    Ok(selector)
}

fn parse_attribute(body: &str, source: &str) -> DomResult<AttributeSelector> {
    let (name, value) = match body.split_once('=') {
        Some((name, value)) => (name.trim(), Some(unquote(value.trim()))),
        None => (body.trim(), None),
    };
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return Err(invalid_selector(format!("invalid attribute name in `{source}`")));
    }
    Ok(AttributeSelector {
        name: name.to_ascii_lowercase(),
        value: value.map(str::to_string),
    })
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

fn read_ident(chars: &[char], pos: &mut usize) -> String {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    chars[start..*pos].iter().collect()
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn matches_interactive_element_list() {
        let list = SelectorList::parse("a, button, input[type=button], input[type=submit]").unwrap();
        assert!(list.matches_parts("a", &[]));
        assert!(list.matches_parts("button", &[]));
        assert!(list.matches_parts("input", &attrs(&[("type", "submit")])));
        assert!(!list.matches_parts("input", &attrs(&[("type", "text")])));
        assert!(!list.matches_parts("div", &[]));
    }

    #[test]
    fn matches_id_class_and_quoted_attribute() {
        let list = SelectorList::parse("div#main.card.wide[data-role='nav']").unwrap();
        let matching = attrs(&[("id", "main"), ("class", "wide card"), ("data-role", "nav")]);
        assert!(list.matches_parts("div", &matching));

        let missing_class = attrs(&[("id", "main"), ("class", "card"), ("data-role", "nav")]);
        assert!(!list.matches_parts("div", &missing_class));
    }

    #[test]
    fn universal_and_presence_selectors() {
        let list = SelectorList::parse("*[hidden]").unwrap();
        assert!(list.matches_parts("span", &attrs(&[("hidden", "")])));
        assert!(!list.matches_parts("span", &[]));
    }

    #[test]
    fn commas_and_brackets_inside_quoted_values() {
        let list = SelectorList::parse("a[title='a,b'], button[data-x=\"[1]\"]").unwrap();
        assert!(list.matches_parts("a", &attrs(&[("title", "a,b")])));
        assert!(!list.matches_parts("a", &attrs(&[("title", "a")])));
        assert!(list.matches_parts("button", &attrs(&[("data-x", "[1]")])));
        assert_eq!(list.as_str(), "a[title='a,b'], button[data-x=\"[1]\"]");
    }

    #[test]
    fn rejects_combinators_and_empty_parts() {
        let err = SelectorList::parse("nav a").unwrap_err();
        assert_eq!(err.code_str(), "dom/invalid-selector");
        assert!(SelectorList::parse("a,,button").is_err());
        assert!(SelectorList::parse("input[type=button").is_err());
    }
}

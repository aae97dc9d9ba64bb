//! Selector evaluation over the mock DOM.
//!
//! Supports the subset the flows use: CSS compound selectors (tag, `.class`,
//! `#id`, `[attr]`, `[attr="v"]`) joined by descendant combinators and
//! commas; XPath `//tag`, `//tag[text()='v']`, `//tag[normalize-space(.)='v']`
//! and `//tag[@attr='v']`; link text, `name` and tag name lookups.

use std::sync::LazyLock;

use regex::Regex;

use super::dom::{Dom, ROOT};
use crate::error::{ProbeError, ProbeResult};
use crate::locator::Selector;

static COMPOUND: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\*|[a-zA-Z][a-zA-Z0-9-]*)?((?:\.[\w-]+|#[\w-]+|\[[^\]]*\])*)$")
        .expect("compound selector regex")
});

static PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"\.([\w-]+)|#([\w-]+)|\[\s*([\w-]+)\s*(?:=\s*(?:"([^"]*)"|'([^']*)'|([^\]\s]*))\s*)?\]"#,
    )
    .expect("selector part regex")
});

static XPATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^//(\*|[a-zA-Z][\w-]*)(?:\[\s*(text\(\)|normalize-space\(\.?\)|\.|@[\w-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')\s*\])?$"#,
    )
    .expect("xpath regex")
});

#[derive(Debug, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches(&self, dom: &Dom, idx: usize) -> bool {
        let node = dom.node(idx);
        if let Some(tag) = &self.tag {
            if tag != "*" && !tag.eq_ignore_ascii_case(&node.tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if dom.attr(idx, "id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes: Vec<&str> = dom.attr(idx, "class").unwrap_or("").split_whitespace().collect();
            if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
                return false;
            }
        }
        self.attrs.iter().all(|(name, expected)| match (dom.attr(idx, name), expected) {
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == expected,
            (None, _) => false,
        })
    }
}

fn unsupported(selector: &Selector, what: &str) -> ProbeError {
    ProbeError::browser(format!("mock driver cannot evaluate {selector}: {what}"))
}

/// Split on `sep` outside quotes and brackets.
fn split_top_level(input: &str, is_sep: impl Fn(char) -> bool) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut depth = 0usize;
    for c in input.chars() {
        match (quote, c) {
            (Some(q), _) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), _) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (None, '[') => {
                depth += 1;
                current.push(c);
            }
            (None, ']') => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            (None, _) if depth == 0 && is_sep(c) => {
                if !current.trim().is_empty() {
                    parts.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

fn parse_compound(selector: &Selector, raw: &str) -> ProbeResult<Compound> {
    if raw.contains(['>', '+', '~', ':']) && !raw.contains('[') {
        return Err(unsupported(selector, "only descendant combinators are supported"));
    }
    let caps = COMPOUND
        .captures(raw)
        .ok_or_else(|| unsupported(selector, "unsupported compound selector"))?;
    let mut compound = Compound {
        tag: caps.get(1).map(|m| m.as_str().to_ascii_lowercase()),
        ..Compound::default()
    };
    let rest = caps.get(2).map_or("", |m| m.as_str());
    for part in PART.captures_iter(rest) {
        if let Some(class) = part.get(1) {
            compound.classes.push(class.as_str().to_string());
        } else if let Some(id) = part.get(2) {
            compound.id = Some(id.as_str().to_string());
        } else if let Some(name) = part.get(3) {
            let value = part
                .get(4)
                .or_else(|| part.get(5))
                .or_else(|| part.get(6))
                .map(|m| m.as_str().to_string());
            compound.attrs.push((name.as_str().to_string(), value));
        }
    }
    Ok(compound)
}

fn matches_chain(dom: &Dom, idx: usize, chain: &[Compound]) -> bool {
    let Some((last, ancestors)) = chain.split_last() else {
        return false;
    };
    if !last.matches(dom, idx) {
        return false;
    }
    let mut current = idx;
    for compound in ancestors.iter().rev() {
        let mut candidate = dom.parent(current);
        loop {
            match candidate {
                None => return false,
                Some(a) if compound.matches(dom, a) => {
                    current = a;
                    break;
                }
                Some(a) => candidate = dom.parent(a),
            }
        }
    }
    true
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Indices of nodes matching `selector` under `scope`, in document order.
pub(crate) fn find(dom: &Dom, selector: &Selector, scope: Option<usize>) -> ProbeResult<Vec<usize>> {
    let candidates = dom.descendants(scope.unwrap_or(ROOT));
    let matched = match selector {
        Selector::Css(css) => {
            let groups = split_top_level(css, |c| c == ',')
                .iter()
                .map(|group| {
                    split_top_level(group, char::is_whitespace)
                        .iter()
                        .map(|raw| parse_compound(selector, raw))
                        .collect::<ProbeResult<Vec<_>>>()
                })
                .collect::<ProbeResult<Vec<_>>>()?;
            candidates
                .into_iter()
                .filter(|&i| groups.iter().any(|chain| matches_chain(dom, i, chain)))
                .collect()
        }
        Selector::Name(name) => candidates
            .into_iter()
            .filter(|&i| dom.attr(i, "name") == Some(name.as_str()))
            .collect(),
        Selector::TagName(tag) => candidates
            .into_iter()
            .filter(|&i| dom.node(i).tag.eq_ignore_ascii_case(tag))
            .collect(),
        Selector::LinkText(text) => {
            let wanted = normalize(text);
            candidates
                .into_iter()
                .filter(|&i| dom.node(i).tag == "a" && normalize(&dom.text_content(i)) == wanted)
                .collect()
        }
        Selector::XPath(expr) => {
            let caps = XPATH
                .captures(expr.trim())
                .ok_or_else(|| unsupported(selector, "unsupported xpath form"))?;
            let tag = caps.get(1).map_or("*", |m| m.as_str()).to_ascii_lowercase();
            let test = caps.get(2).map(|m| m.as_str().to_string());
            let value = caps.get(3).or_else(|| caps.get(4)).map(|m| m.as_str().to_string());
            candidates
                .into_iter()
                .filter(|&i| tag == "*" || dom.node(i).tag == tag)
                .filter(|&i| match (test.as_deref(), value.as_deref()) {
                    (Some("text()"), Some(v)) => dom.node(i).text == v,
                    (Some(attr), Some(v)) if attr.starts_with('@') => dom.attr(i, &attr[1..]) == Some(v),
                    (Some(_), Some(v)) => normalize(&dom.text_content(i)) == v,
                    _ => true,
                })
                .collect()
        }
    };
    Ok(matched)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mock::app::MockElement;

    fn dom() -> Dom {
        let mut dom = Dom::new();
        dom.append(
            ROOT,
            &MockElement::new("form")
                .attr("id", "signup")
                .child(
                    MockElement::new("input")
                        .attr("type", "email")
                        .attr("placeholder", "Email"),
                )
                .child(MockElement::new("input").attr("placeholder", "Confirm Password"))
                .child(MockElement::new("button").attr("type", "submit").text("Sign up")),
        );
        dom.append(ROOT, &MockElement::new("a").attr("href", "/signup").text("  Sign   Up "));
        dom.append(ROOT, &MockElement::new("button").class("px-2").class("bg-gray-300").text("rust"));
        dom.append(ROOT, &MockElement::new("button").text("Sign out"));
        dom
    }

    fn tags(dom: &Dom, selector: Selector) -> Vec<String> {
        find(dom, &selector, None)
            .unwrap()
            .into_iter()
            .map(|i| dom.node(i).tag.clone())
            .collect()
    }

    #[test]
    fn test_compound_attributes() {
        let dom = dom();
        assert_eq!(
            tags(&dom, Selector::css(r#"input[type="email"][placeholder="Email"]"#)),
            vec!["input"]
        );
        assert_eq!(
            tags(&dom, Selector::css(r#"input[placeholder="Confirm Password"]"#)),
            vec!["input"]
        );
        assert_eq!(tags(&dom, Selector::css("input[type]")).len(), 1);
    }

    #[test]
    fn test_class_id_and_descendant() {
        let dom = dom();
        assert_eq!(tags(&dom, Selector::css("button.bg-gray-300")), vec!["button"]);
        assert_eq!(tags(&dom, Selector::css("#signup button")), vec!["button"]);
        assert_eq!(tags(&dom, Selector::css("form input, a")), vec!["input", "input", "a"]);
    }

    #[test]
    fn test_link_text_normalizes_whitespace() {
        let dom = dom();
        assert_eq!(tags(&dom, Selector::link_text("Sign Up")), vec!["a"]);
    }

    #[test]
    fn test_xpath_subset() {
        let dom = dom();
        assert_eq!(tags(&dom, Selector::xpath(r#"//button[text()="Sign out"]"#)), vec!["button"]);
        assert_eq!(tags(&dom, Selector::xpath("//a[@href='/signup']")), vec!["a"]);
        assert_eq!(tags(&dom, Selector::xpath(r#"//a[normalize-space(.)="Sign Up"]"#)), vec!["a"]);
        assert_eq!(tags(&dom, Selector::xpath("//button")).len(), 3);
    }

    #[test]
    fn test_unsupported_forms_error() {
        let dom = dom();
        assert!(find(&dom, &Selector::xpath("(//option)[2]"), None).is_err());
        assert!(find(&dom, &Selector::css("form > input"), None).is_err());
    }

    #[test]
    fn test_scope_limits_candidates() {
        let dom = dom();
        let form = find(&dom, &Selector::css("form"), None).unwrap()[0];
        let inside = find(&dom, &Selector::tag_name("button"), Some(form)).unwrap();
        assert_eq!(inside.len(), 1);
    }
}

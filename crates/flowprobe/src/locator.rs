//! Declarative selectors and element lookup.
//!
//! A [`Selector`] is an immutable `{kind, value}` pair. Lookup never waits:
//! [`locate`] returns whatever the DOM holds right now (possibly nothing) and
//! [`locate_one`] turns "nothing" into [`ProbeError::NotFound`]. Waiting is
//! the job of [`crate::wait`].

use serde::{Deserialize, Serialize};

use crate::driver::ElementHandle;
use crate::error::{ProbeError, ProbeResult};
use crate::session::Session;

// =============================================================================
// SELECTOR
// =============================================================================

/// Selector kind and value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Selector {
    /// CSS selector (e.g. `input[placeholder="Password"]`)
    Css(String),
    /// Anchor whose visible text equals the value
    LinkText(String),
    /// Element whose `name` attribute equals the value
    Name(String),
    /// XPath expression
    #[serde(rename = "xpath")]
    XPath(String),
    /// Element tag name (e.g. `option`)
    TagName(String),
}

impl Selector {
    /// Create a CSS selector
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    /// Create a link text selector
    #[must_use]
    pub fn link_text(text: impl Into<String>) -> Self {
        Self::LinkText(text.into())
    }

    /// Create a `name` attribute selector
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self::Name(name.into())
    }

    /// Create an XPath selector
    #[must_use]
    pub fn xpath(expr: impl Into<String>) -> Self {
        Self::XPath(expr.into())
    }

    /// Create a tag name selector
    #[must_use]
    pub fn tag_name(tag: impl Into<String>) -> Self {
        Self::TagName(tag.into())
    }

    /// Kind label used in messages
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Css(_) => "css",
            Self::LinkText(_) => "link text",
            Self::Name(_) => "name",
            Self::XPath(_) => "xpath",
            Self::TagName(_) => "tag",
        }
    }

    /// Raw selector value
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Css(v) | Self::LinkText(v) | Self::Name(v) | Self::XPath(v) | Self::TagName(v) => {
                v
            }
        }
    }

    /// Reject selectors that can never be evaluated.
    pub fn validate(&self) -> ProbeResult<()> {
        let value = self.value();
        if value.trim().is_empty() {
            return Err(ProbeError::malformed(self.to_string(), "empty selector"));
        }
        match self {
            Self::Css(css) => check_balanced(css).map_err(|r| ProbeError::malformed(self.to_string(), r)),
            Self::XPath(expr) => {
                let trimmed = expr.trim_start();
                if !(trimmed.starts_with('/') || trimmed.starts_with('(') || trimmed.starts_with('.'))
                {
                    return Err(ProbeError::malformed(
                        self.to_string(),
                        "xpath must start with '/', '(' or '.'",
                    ));
                }
                check_balanced(expr).map_err(|r| ProbeError::malformed(self.to_string(), r))
            }
            Self::Name(name) => {
                if name.contains(['"', '\'', '[', ']']) {
                    Err(ProbeError::malformed(
                        self.to_string(),
                        "name may not contain quotes or brackets",
                    ))
                } else {
                    Ok(())
                }
            }
            Self::TagName(tag) => {
                if tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                    Ok(())
                } else {
                    Err(ProbeError::malformed(self.to_string(), "invalid tag name"))
                }
            }
            Self::LinkText(_) => Ok(()),
        }
    }

    /// Equivalent CSS selector, when one exists
    #[must_use]
    pub fn to_css(&self) -> Option<String> {
        match self {
            Self::Css(css) => Some(css.clone()),
            Self::Name(name) => Some(format!("[name=\"{name}\"]")),
            Self::TagName(tag) => Some(tag.clone()),
            Self::LinkText(_) | Self::XPath(_) => None,
        }
    }

    /// Equivalent XPath expression, when the selector has no CSS form
    #[must_use]
    pub fn to_xpath(&self) -> Option<String> {
        match self {
            Self::XPath(expr) => Some(expr.clone()),
            Self::LinkText(text) => Some(format!(
                "//a[normalize-space(.)={}]",
                xpath_literal(text.trim())
            )),
            Self::Css(_) | Self::Name(_) | Self::TagName(_) => None,
        }
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} `{}`", self.kind(), self.value())
    }
}

fn check_balanced(input: &str) -> Result<(), &'static str> {
    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    for c in input.chars() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '[' | '(' => stack.push(c),
            ']' => {
                if stack.pop() != Some('[') {
                    return Err("unbalanced brackets");
                }
            }
            ')' => {
                if stack.pop() != Some('(') {
                    return Err("unbalanced parentheses");
                }
            }
            _ => {}
        }
    }
    if quote.is_some() {
        return Err("unterminated quote");
    }
    if stack.is_empty() {
        Ok(())
    } else {
        Err("unclosed bracket or parenthesis")
    }
}

/// Quote a string as an XPath literal.
fn xpath_literal(text: &str) -> String {
    if !text.contains('"') {
        format!("\"{text}\"")
    } else if !text.contains('\'') {
        format!("'{text}'")
    } else {
        let parts: Vec<String> = text.split('"').map(|p| format!("\"{p}\"")).collect();
        format!("concat({})", parts.join(", '\"', "))
    }
}

// =============================================================================
// LOOKUP
// =============================================================================

/// Elements matched by a single lookup, in document order
#[derive(Debug)]
pub struct Located {
    inner: std::vec::IntoIter<ElementHandle>,
}

impl Located {
    pub(crate) fn new(handles: Vec<ElementHandle>) -> Self {
        Self {
            inner: handles.into_iter(),
        }
    }
}

impl Iterator for Located {
    type Item = ElementHandle;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for Located {}

/// Resolve a selector against the current DOM, optionally inside `scope`.
///
/// An empty result is not an error.
pub async fn locate(
    session: &Session,
    selector: &Selector,
    scope: Option<&ElementHandle>,
) -> ProbeResult<Located> {
    selector.validate()?;
    let handles = session.driver().find_elements(selector, scope).await?;
    Ok(Located::new(handles))
}

/// First element matching the selector, or [`ProbeError::NotFound`].
pub async fn locate_one(
    session: &Session,
    selector: &Selector,
    scope: Option<&ElementHandle>,
) -> ProbeResult<ElementHandle> {
    locate(session, selector, scope)
        .await?
        .next()
        .ok_or_else(|| ProbeError::NotFound {
            selector: selector.to_string(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod selector_tests {
        use super::*;

        #[test]
        fn test_display() {
            assert_eq!(Selector::name("username").to_string(), "name `username`");
            assert_eq!(Selector::link_text("Sign Up").to_string(), "link text `Sign Up`");
        }

        #[test]
        fn test_to_css() {
            assert_eq!(
                Selector::name("gender").to_css().as_deref(),
                Some("[name=\"gender\"]")
            );
            assert_eq!(Selector::tag_name("option").to_css().as_deref(), Some("option"));
            assert!(Selector::link_text("Sign Up").to_css().is_none());
        }

        #[test]
        fn test_link_text_to_xpath() {
            assert_eq!(
                Selector::link_text("Sign Up").to_xpath().as_deref(),
                Some("//a[normalize-space(.)=\"Sign Up\"]")
            );
        }

        #[test]
        fn test_xpath_literal_with_both_quotes() {
            assert_eq!(xpath_literal("a\"b'c"), "concat(\"a\", '\"', \"b'c\")");
        }

        #[test]
        fn test_serde_shape() {
            let json = serde_json::to_string(&Selector::css("h1")).unwrap();
            assert_eq!(json, r#"{"kind":"css","value":"h1"}"#);
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_valid_selectors() {
            for selector in [
                Selector::css(r#"input[type="email"][placeholder="Email"]"#),
                Selector::css("button.bg-gray-300"),
                Selector::xpath(r#"//button[text()="Sign out"]"#),
                Selector::xpath("(//option)[2]"),
                Selector::name("first_name"),
                Selector::tag_name("option"),
                Selector::link_text("Sign Up"),
            ] {
                assert!(selector.validate().is_ok(), "{selector} should be valid");
            }
        }

        #[test]
        fn test_empty_rejected() {
            let err = Selector::css("  ").validate().unwrap_err();
            assert!(matches!(err, ProbeError::MalformedSelector { .. }));
        }

        #[test]
        fn test_unbalanced_css_rejected() {
            assert!(Selector::css("input[type=\"email\"").validate().is_err());
            assert!(Selector::css("input]").validate().is_err());
            assert!(Selector::css("a[title='x]").validate().is_err());
        }

        #[test]
        fn test_unrooted_xpath_rejected() {
            let err = Selector::xpath("button[text()='x']").validate().unwrap_err();
            assert!(err.to_string().contains("must start with"));
        }

        #[test]
        fn test_bracket_in_quotes_is_fine() {
            assert!(Selector::css(r#"[placeholder="a]b"]"#).validate().is_ok());
        }

        #[test]
        fn test_bad_name_and_tag() {
            assert!(Selector::name("a\"b").validate().is_err());
            assert!(Selector::tag_name("div.x").validate().is_err());
        }
    }

    mod located_tests {
        use super::*;

        fn handle(id: &str) -> ElementHandle {
            ElementHandle::new(id, 1, "div", "")
        }

        #[test]
        fn test_located_is_exact_size() {
            let mut located = Located::new(vec![handle("a"), handle("b")]);
            assert_eq!(located.len(), 2);
            assert_eq!(located.next().unwrap().id(), "a");
            assert_eq!(located.len(), 1);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_plain_css_identifiers_are_valid(tag in "[a-z]{1,8}", class in "[a-z][a-z0-9-]{0,10}") {
                let selector = Selector::css(format!("{tag}.{class}"));
                prop_assert!(selector.validate().is_ok());
            }

            #[test]
            fn prop_extra_open_bracket_is_rejected(attr in "[a-z]{1,8}", value in "[a-zA-Z0-9 ]{0,12}") {
                let selector = Selector::css(format!("input[{attr}=\"{value}\""));
                prop_assert!(selector.validate().is_err());
            }

            #[test]
            fn prop_link_text_xpath_is_valid(text in "[a-zA-Z0-9 '\"]{1,16}") {
                prop_assume!(!text.trim().is_empty());
                let xpath = Selector::link_text(text).to_xpath().unwrap();
                prop_assert!(Selector::xpath(xpath).validate().is_ok());
            }
        }
    }
}

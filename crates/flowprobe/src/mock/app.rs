//! Scripted application model served by [`super::MockDriver`].
//!
//! An app is a set of routed pages. Each page is a static element tree plus
//! reactions: things the "application" does on load or when an element is
//! clicked (navigate, raise a dialog, render more elements later, branch on
//! an input's value).

use std::collections::BTreeMap;

use crate::dialog::Dialog;

/// Something the application does in response to an event
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    /// Client-side navigation to a path
    Navigate(String),
    /// Raise a native dialog; `then` runs once it is resolved
    Dialog {
        /// The dialog to raise
        dialog: Dialog,
        /// Reactions after accept (and after dismiss for alerts)
        then: Vec<Reaction>,
    },
    /// Run `reaction` after `delay_ms` of clock time
    After {
        /// Delay in milliseconds
        delay_ms: u64,
        /// Deferred reaction
        reaction: Box<Reaction>,
    },
    /// Render more elements under the first match of `parent` (or the body)
    Append {
        /// CSS selector of the parent
        parent: Option<String>,
        /// Elements to add
        elements: Vec<MockElement>,
    },
    /// Branch on the current value of the first element matching `selector`
    IfValue {
        /// CSS selector of the input
        selector: String,
        /// Value to compare with
        equals: String,
        /// Reactions when equal
        then: Vec<Reaction>,
        /// Reactions otherwise
        otherwise: Vec<Reaction>,
    },
}

impl Reaction {
    /// Navigate to `path`
    #[must_use]
    pub fn navigate(path: impl Into<String>) -> Self {
        Self::Navigate(path.into())
    }

    /// Raise an alert, then run `then`
    #[must_use]
    pub fn alert(message: impl Into<String>, then: Vec<Self>) -> Self {
        Self::Dialog {
            dialog: Dialog::alert(message),
            then,
        }
    }

    /// Raise a confirm dialog, then run `then` if accepted
    #[must_use]
    pub fn confirm(message: impl Into<String>, then: Vec<Self>) -> Self {
        Self::Dialog {
            dialog: Dialog::confirm(message),
            then,
        }
    }

    /// Defer `reaction` by `delay_ms`
    #[must_use]
    pub fn after(delay_ms: u64, reaction: Self) -> Self {
        Self::After {
            delay_ms,
            reaction: Box::new(reaction),
        }
    }

    /// Append elements to the body
    #[must_use]
    pub fn append(elements: Vec<MockElement>) -> Self {
        Self::Append {
            parent: None,
            elements,
        }
    }

    /// Append elements under the first match of `parent`
    #[must_use]
    pub fn append_to(parent: impl Into<String>, elements: Vec<MockElement>) -> Self {
        Self::Append {
            parent: Some(parent.into()),
            elements,
        }
    }

    /// Branch on an input value
    #[must_use]
    pub fn if_value(
        selector: impl Into<String>,
        equals: impl Into<String>,
        then: Vec<Self>,
        otherwise: Vec<Self>,
    ) -> Self {
        Self::IfValue {
            selector: selector.into(),
            equals: equals.into(),
            then,
            otherwise,
        }
    }
}

/// Static element description
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MockElement {
    pub(crate) tag: String,
    pub(crate) attrs: BTreeMap<String, String>,
    pub(crate) text: String,
    pub(crate) hidden: bool,
    pub(crate) disabled: bool,
    pub(crate) children: Vec<MockElement>,
    pub(crate) on_click: Vec<Reaction>,
    pub(crate) on_change: Vec<Reaction>,
}

impl MockElement {
    /// Element with the given tag
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Set an attribute
    #[must_use]
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(name.into(), value.into());
        self
    }

    /// Add a class
    #[must_use]
    pub fn class(mut self, class: &str) -> Self {
        let entry = self.attrs.entry("class".to_string()).or_default();
        if !entry.is_empty() {
            entry.push(' ');
        }
        entry.push_str(class);
        self
    }

    /// Set own text
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Not rendered visibly
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Disabled control
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Add a child element
    #[must_use]
    pub fn child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Add a click reaction
    #[must_use]
    pub fn on_click(mut self, reaction: Reaction) -> Self {
        self.on_click.push(reaction);
        self
    }

    /// Add a reaction to a dispatched `change` event
    #[must_use]
    pub fn on_change(mut self, reaction: Reaction) -> Self {
        self.on_change.push(reaction);
        self
    }
}

/// A routed page
#[derive(Debug, Clone, PartialEq)]
pub struct MockPage {
    route: String,
    pub(crate) elements: Vec<MockElement>,
    pub(crate) on_load: Vec<Reaction>,
}

impl MockPage {
    /// Page served at `route`. A trailing `*` matches any suffix.
    #[must_use]
    pub fn new(route: impl Into<String>) -> Self {
        Self {
            route: route.into(),
            elements: Vec::new(),
            on_load: Vec::new(),
        }
    }

    /// Add a top-level element
    #[must_use]
    pub fn element(mut self, element: MockElement) -> Self {
        self.elements.push(element);
        self
    }

    /// Add a reaction that runs when the page loads
    #[must_use]
    pub fn on_load(mut self, reaction: Reaction) -> Self {
        self.on_load.push(reaction);
        self
    }

    /// Route pattern
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Whether this page serves `path`
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        match self.route.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == self.route,
        }
    }
}

/// Maximum redirect hops followed before giving up
const MAX_REDIRECTS: usize = 8;

/// A set of pages plus server-side redirects
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MockApp {
    pages: Vec<MockPage>,
    redirects: Vec<(String, String)>,
}

impl MockApp {
    /// Empty application
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page; earlier pages win on overlapping routes
    #[must_use]
    pub fn page(mut self, page: MockPage) -> Self {
        self.pages.push(page);
        self
    }

    /// Redirect `from` to `to`
    #[must_use]
    pub fn redirect(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.redirects.push((from.into(), to.into()));
        self
    }

    /// Final path after redirects, and the page serving it
    #[must_use]
    pub fn resolve(&self, path: &str) -> (String, Option<&MockPage>) {
        let mut current = path.to_string();
        for _ in 0..MAX_REDIRECTS {
            match self.redirects.iter().find(|(from, _)| *from == current) {
                Some((_, to)) => current.clone_from(to),
                None => break,
            }
        }
        let page = self.pages.iter().find(|p| p.matches(&current));
        (current, page)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_route() {
        let page = MockPage::new("/profile/*");
        assert!(page.matches("/profile/nishok"));
        assert!(!page.matches("/profiles"));
        assert!(MockPage::new("/login").matches("/login"));
        assert!(!MockPage::new("/login").matches("/login/x"));
    }

    #[test]
    fn test_redirects_are_followed() {
        let app = MockApp::new()
            .page(MockPage::new("/login"))
            .redirect("/", "/home")
            .redirect("/home", "/login");
        let (path, page) = app.resolve("/");
        assert_eq!(path, "/login");
        assert_eq!(page.unwrap().route(), "/login");
    }

    #[test]
    fn test_redirect_loop_terminates() {
        let app = MockApp::new().redirect("/a", "/b").redirect("/b", "/a");
        let (_, page) = app.resolve("/a");
        assert!(page.is_none());
    }

    #[test]
    fn test_class_builder_accumulates() {
        let el = MockElement::new("BUTTON").class("px-2").class("bg-gray-300");
        assert_eq!(el.tag, "button");
        assert_eq!(el.attrs.get("class").unwrap(), "px-2 bg-gray-300");
    }
}

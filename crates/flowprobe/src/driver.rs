//! BrowserDriver - the browser capability boundary
//!
//! Everything above this trait (locator, conditions, wait engine, dialog
//! handler, flows) talks to the browser only through [`BrowserDriver`].
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  BrowserDriver (async trait)                                 │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌──────────────────────┐      ┌──────────────────────────┐  │
//! │  │  ChromiumDriver      │      │  MockDriver              │  │
//! │  │  (feature: browser)  │      │  scripted in-memory app  │  │
//! │  │  CDP / chromiumoxide │      │  used by the test suite  │  │
//! │  └──────────────────────┘      └──────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Handles carry the DOM generation they were acquired in. Drivers bump the
//! generation whenever the document is replaced and reject handles from
//! older generations with [`crate::ProbeError::StaleHandle`]. While a native
//! dialog is pending every DOM method fails with
//! [`crate::ProbeError::DialogBlocking`]; `current_url` and the dialog
//! methods keep working.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dialog::Dialog;
use crate::error::ProbeResult;
use crate::locator::Selector;

/// Element handle for DOM interactions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementHandle {
    id: String,
    generation: u64,
    tag_name: String,
    text: String,
}

impl ElementHandle {
    /// Create a new element handle
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        generation: u64,
        tag_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            generation,
            tag_name: tag_name.into(),
            text: text.into(),
        }
    }

    /// Driver-assigned identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// DOM generation the handle belongs to
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Lowercase tag name
    #[must_use]
    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Text content at lookup time
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "<{}#{}@{}>", self.tag_name, self.id, self.generation)
    }
}

/// Browser capability used by the harness
#[async_trait]
pub trait BrowserDriver: Send + Sync + std::fmt::Debug {
    /// Load an absolute URL, replacing the document
    async fn navigate(&self, url: &str) -> ProbeResult<()>;

    /// All elements matching `selector`, in document order
    async fn find_elements(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> ProbeResult<Vec<ElementHandle>>;

    /// Click an element
    async fn click(&self, element: &ElementHandle) -> ProbeResult<()>;

    /// Type text into an element as keystrokes
    async fn type_text(&self, element: &ElementHandle, text: &str) -> ProbeResult<()>;

    /// Clear an input's value
    async fn clear(&self, element: &ElementHandle) -> ProbeResult<()>;

    /// Assign an input's value directly, bypassing keystrokes
    async fn set_value(&self, element: &ElementHandle, value: &str) -> ProbeResult<()>;

    /// Choose the option at `index` of a `<select>` the way a user would,
    /// notifying the page with `input` and `change`. Returns the chosen value.
    async fn select_option(&self, select: &ElementHandle, index: usize) -> ProbeResult<String>;

    /// Whether the element is visible and enabled
    async fn is_clickable(&self, element: &ElementHandle) -> ProbeResult<bool>;

    /// Current page URL
    async fn current_url(&self) -> ProbeResult<String>;

    /// Evaluate a script in the page
    async fn evaluate(&self, script: &str) -> ProbeResult<serde_json::Value>;

    /// The pending native dialog, if any
    async fn pending_dialog(&self) -> ProbeResult<Option<Dialog>>;

    /// Accept the pending dialog
    async fn accept_dialog(&self) -> ProbeResult<Dialog>;

    /// Dismiss the pending dialog
    async fn dismiss_dialog(&self) -> ProbeResult<Dialog>;

    /// Maximize the browser window
    async fn maximize_window(&self) -> ProbeResult<()>;

    /// PNG screenshot of the viewport
    async fn screenshot(&self) -> ProbeResult<Vec<u8>>;

    /// Release the browser
    async fn close(&self) -> ProbeResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_accessors() {
        let handle = ElementHandle::new("node-3", 2, "button", "Sign out");
        assert_eq!(handle.id(), "node-3");
        assert_eq!(handle.generation(), 2);
        assert_eq!(handle.tag_name(), "button");
        assert_eq!(handle.text(), "Sign out");
        assert_eq!(handle.to_string(), "<button#node-3@2>");
    }

    #[test]
    fn test_handles_from_different_generations_differ() {
        let a = ElementHandle::new("node-3", 1, "a", "");
        let b = ElementHandle::new("node-3", 2, "a", "");
        assert_ne!(a, b);
    }
}

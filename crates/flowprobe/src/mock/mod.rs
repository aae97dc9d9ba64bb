//! In-memory scripted browser for testing flows without Chromium.
//!
//! [`MockDriver`] serves a [`MockApp`]: a page graph with static element
//! trees and scripted reactions. It honours the same contract as the real
//! driver: navigation replaces the document and bumps the generation, old
//! handles go stale, a pending dialog blocks DOM interaction, and hidden or
//! disabled elements refuse clicks and keystrokes.
//!
//! Deferred reactions ([`Reaction::After`]) run against the tokio clock, so
//! tests on a paused runtime see asynchronous rendering deterministically.
//!
//! ## Example
//!
//! ```rust,ignore
//! use flowprobe::mock::{MockApp, MockDriver, MockElement, MockPage, Reaction};
//!
//! let app = MockApp::new().page(
//!     MockPage::new("/login").element(
//!         MockElement::new("button")
//!             .attr("type", "submit")
//!             .on_click(Reaction::alert("Logged in", vec![Reaction::navigate("/feed")])),
//!     ),
//! );
//! let driver = MockDriver::new(app);
//! ```

mod app;
mod dom;
mod matcher;

pub use app::{MockApp, MockElement, MockPage, Reaction};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::time::{Duration, Instant};
use url::Url;

use crate::dialog::{Dialog, DialogType};
use crate::driver::{BrowserDriver, ElementHandle};
use crate::error::{ProbeError, ProbeResult};
use crate::locator::Selector;
use dom::{Dom, ROOT};

/// Eight-byte PNG signature returned as the mock screenshot
const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Debug)]
struct PendingDialog {
    dialog: Dialog,
    then: Vec<Reaction>,
}

#[derive(Debug)]
struct Scheduled {
    due: Instant,
    reaction: Reaction,
}

#[derive(Debug)]
struct MockState {
    app: MockApp,
    origin: Option<Url>,
    path: Option<String>,
    dom: Dom,
    generation: u64,
    dialog: Option<PendingDialog>,
    scheduled: Vec<Scheduled>,
    navigations: Vec<String>,
    resolved: Vec<Dialog>,
    scripts: Vec<String>,
    maximized: bool,
    closed: bool,
}

impl MockState {
    fn ensure_open(&self) -> ProbeResult<()> {
        if self.closed {
            Err(ProbeError::browser("browser session is closed"))
        } else {
            Ok(())
        }
    }

    fn ensure_no_dialog(&self) -> ProbeResult<()> {
        match &self.dialog {
            Some(pending) => Err(ProbeError::DialogBlocking {
                kind: pending.dialog.dialog_type().to_string(),
                message: pending.dialog.message().to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Checks every DOM operation performs first
    fn ready_for_dom(&mut self) -> ProbeResult<()> {
        self.run_due();
        self.ensure_open()?;
        self.ensure_no_dialog()
    }

    fn resolve(&self, handle: &ElementHandle) -> ProbeResult<usize> {
        let stale = || ProbeError::StaleHandle {
            element: handle.id().to_string(),
            generation: handle.generation(),
        };
        if handle.generation() != self.generation {
            return Err(stale());
        }
        handle
            .id()
            .strip_prefix("mock-")
            .and_then(|n| n.parse::<usize>().ok())
            .filter(|&idx| idx > ROOT && idx < self.dom.len())
            .ok_or_else(stale)
    }

    fn handle_for(&self, idx: usize) -> ElementHandle {
        ElementHandle::new(
            format!("mock-{idx}"),
            self.generation,
            self.dom.node(idx).tag.clone(),
            self.dom.text_content(idx),
        )
    }

    fn ensure_interactable(&self, idx: usize) -> ProbeResult<()> {
        if self.dom.is_interactable(idx) {
            Ok(())
        } else {
            Err(ProbeError::browser(format!(
                "element <{}> is not interactable",
                self.dom.node(idx).tag
            )))
        }
    }

    fn load(&mut self, path: &str) {
        let (final_path, page) = self.app.resolve(path);
        let (elements, on_load) = page
            .map(|p| (p.elements.clone(), p.on_load.clone()))
            .unwrap_or_default();
        self.path = Some(final_path);
        self.generation += 1;
        self.dom = Dom::new();
        self.scheduled.clear();
        for element in &elements {
            self.dom.append(ROOT, element);
        }
        self.apply_all(on_load);
    }

    fn apply_all(&mut self, reactions: Vec<Reaction>) {
        for reaction in reactions {
            self.apply(reaction);
        }
    }

    fn apply(&mut self, reaction: Reaction) {
        match reaction {
            Reaction::Navigate(path) => self.load(&path),
            Reaction::Dialog { dialog, then } => {
                if self.dialog.is_none() {
                    self.dialog = Some(PendingDialog { dialog, then });
                }
            }
            Reaction::After { delay_ms, reaction } => self.scheduled.push(Scheduled {
                due: Instant::now() + Duration::from_millis(delay_ms),
                reaction: *reaction,
            }),
            Reaction::Append { parent, elements } => {
                let parent_idx = parent
                    .and_then(|css| matcher::find(&self.dom, &Selector::css(css), None).ok())
                    .and_then(|found| found.first().copied())
                    .unwrap_or(ROOT);
                for element in &elements {
                    self.dom.append(parent_idx, element);
                }
            }
            Reaction::IfValue {
                selector,
                equals,
                then,
                otherwise,
            } => {
                let current = matcher::find(&self.dom, &Selector::css(selector), None)
                    .ok()
                    .and_then(|found| found.first().copied())
                    .map(|idx| self.dom.node(idx).value.clone());
                if current.as_deref() == Some(equals.as_str()) {
                    self.apply_all(then);
                } else {
                    self.apply_all(otherwise);
                }
            }
        }
    }

    /// Run deferred reactions whose time has come. A pending dialog
    /// suspends the page, so nothing runs while one is open.
    fn run_due(&mut self) {
        loop {
            if self.dialog.is_some() {
                return;
            }
            let now = Instant::now();
            let next = self
                .scheduled
                .iter()
                .enumerate()
                .filter(|(_, s)| s.due <= now)
                .min_by_key(|(_, s)| s.due)
                .map(|(i, _)| i);
            match next {
                Some(i) => {
                    let scheduled = self.scheduled.remove(i);
                    self.apply(scheduled.reaction);
                }
                None => return,
            }
        }
    }

    fn resolve_dialog(&mut self, accept: bool) -> ProbeResult<Dialog> {
        self.run_due();
        self.ensure_open()?;
        let PendingDialog { mut dialog, then } = self.dialog.take().ok_or(ProbeError::NoDialog)?;
        if accept {
            dialog.accept();
        } else {
            dialog.dismiss();
        }
        self.resolved.push(dialog.clone());
        if accept || dialog.dialog_type() == DialogType::Alert {
            self.apply_all(then);
        }
        Ok(dialog)
    }
}

/// Scripted browser driver. Clones share state, so a test can keep one
/// clone for inspection while the session owns another.
#[derive(Debug, Clone)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    /// Serve `app`; the browser starts on `about:blank`
    #[must_use]
    pub fn new(app: MockApp) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                app,
                origin: None,
                path: None,
                dom: Dom::new(),
                generation: 0,
                dialog: None,
                scheduled: Vec::new(),
                navigations: Vec::new(),
                resolved: Vec::new(),
                scripts: Vec::new(),
                maximized: false,
                closed: false,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every URL passed to `navigate`
    #[must_use]
    pub fn navigations(&self) -> Vec<String> {
        self.lock().navigations.clone()
    }

    /// Dialogs accepted or dismissed so far
    #[must_use]
    pub fn resolved_dialogs(&self) -> Vec<Dialog> {
        self.lock().resolved.clone()
    }

    /// Scripts passed to `evaluate`
    #[must_use]
    pub fn scripts(&self) -> Vec<String> {
        self.lock().scripts.clone()
    }

    /// Current path, if any page has been loaded
    #[must_use]
    pub fn current_path(&self) -> Option<String> {
        self.lock().path.clone()
    }

    /// Current DOM generation
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Value of the first element matching a CSS selector
    #[must_use]
    pub fn value_of(&self, css: &str) -> Option<String> {
        let state = self.lock();
        matcher::find(&state.dom, &Selector::css(css), None)
            .ok()
            .and_then(|found| found.first().copied())
            .map(|idx| state.dom.node(idx).value.clone())
    }

    /// Whether `maximize_window` was called
    #[must_use]
    pub fn is_maximized(&self) -> bool {
        self.lock().maximized
    }

    /// Whether `close` was called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn navigate(&self, url: &str) -> ProbeResult<()> {
        let mut state = self.lock();
        state.ready_for_dom()?;
        let parsed = Url::parse(url).map_err(|e| ProbeError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let mut origin = parsed.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        state.origin = Some(origin);
        state.navigations.push(url.to_string());
        state.load(parsed.path());
        Ok(())
    }

    async fn find_elements(
        &self,
        selector: &Selector,
        scope: Option<&ElementHandle>,
    ) -> ProbeResult<Vec<ElementHandle>> {
        let mut state = self.lock();
        state.ready_for_dom()?;
        let scope = scope.map(|h| state.resolve(h)).transpose()?;
        let found = matcher::find(&state.dom, selector, scope)?;
        Ok(found.into_iter().map(|idx| state.handle_for(idx)).collect())
    }

    async fn click(&self, element: &ElementHandle) -> ProbeResult<()> {
        let mut state = self.lock();
        state.ready_for_dom()?;
        let idx = state.resolve(element)?;
        state.ensure_interactable(idx)?;

        // A scripted click on an <option> does not change the selection
        let node = state.dom.node(idx);
        let mut reactions = node.on_click.clone();
        if reactions.is_empty() && node.tag == "a" {
            if let Some(href) = node.attrs.get("href") {
                reactions.push(Reaction::Navigate(href.clone()));
            }
        }
        state.apply_all(reactions);
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> ProbeResult<()> {
        let mut state = self.lock();
        state.ready_for_dom()?;
        let idx = state.resolve(element)?;
        state.ensure_interactable(idx)?;
        state.dom.node_mut(idx).value.push_str(text);
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> ProbeResult<()> {
        let mut state = self.lock();
        state.ready_for_dom()?;
        let idx = state.resolve(element)?;
        state.ensure_interactable(idx)?;
        state.dom.node_mut(idx).value.clear();
        Ok(())
    }

    async fn set_value(&self, element: &ElementHandle, value: &str) -> ProbeResult<()> {
        let mut state = self.lock();
        state.ready_for_dom()?;
        let idx = state.resolve(element)?;
        value.clone_into(&mut state.dom.node_mut(idx).value);
        let reactions = state.dom.node(idx).on_change.clone();
        state.apply_all(reactions);
        Ok(())
    }

    async fn select_option(&self, select: &ElementHandle, index: usize) -> ProbeResult<String> {
        let mut state = self.lock();
        state.ready_for_dom()?;
        let idx = state.resolve(select)?;
        state.ensure_interactable(idx)?;
        if state.dom.node(idx).tag != "select" {
            return Err(ProbeError::browser(format!("{select} is not a select")));
        }
        let option = state
            .dom
            .options(idx)
            .get(index)
            .copied()
            .ok_or_else(|| ProbeError::NotFound {
                selector: format!("option #{index} of {select}"),
            })?;
        let value = state.dom.option_value(option);
        value.clone_into(&mut state.dom.node_mut(idx).value);
        let reactions = state.dom.node(idx).on_change.clone();
        state.apply_all(reactions);
        Ok(value)
    }

    async fn is_clickable(&self, element: &ElementHandle) -> ProbeResult<bool> {
        let mut state = self.lock();
        state.ready_for_dom()?;
        let idx = state.resolve(element)?;
        Ok(state.dom.is_interactable(idx))
    }

    async fn current_url(&self) -> ProbeResult<String> {
        let mut state = self.lock();
        state.run_due();
        state.ensure_open()?;
        match (&state.origin, &state.path) {
            (Some(origin), Some(path)) => Ok(origin
                .join(path)
                .map_or_else(|_| format!("{origin}{path}"), String::from)),
            _ => Ok("about:blank".to_string()),
        }
    }

    async fn evaluate(&self, script: &str) -> ProbeResult<serde_json::Value> {
        let mut state = self.lock();
        state.ready_for_dom()?;
        state.scripts.push(script.to_string());
        Ok(serde_json::Value::Null)
    }

    async fn pending_dialog(&self) -> ProbeResult<Option<Dialog>> {
        let mut state = self.lock();
        state.run_due();
        state.ensure_open()?;
        Ok(state.dialog.as_ref().map(|p| p.dialog.clone()))
    }

    async fn accept_dialog(&self) -> ProbeResult<Dialog> {
        self.lock().resolve_dialog(true)
    }

    async fn dismiss_dialog(&self) -> ProbeResult<Dialog> {
        self.lock().resolve_dialog(false)
    }

    async fn maximize_window(&self) -> ProbeResult<()> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.maximized = true;
        Ok(())
    }

    async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
        let mut state = self.lock();
        state.ready_for_dom()?;
        Ok(PNG_SIGNATURE.to_vec())
    }

    async fn close(&self) -> ProbeResult<()> {
        let mut state = self.lock();
        state.ensure_open()?;
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn signup_like() -> MockApp {
        MockApp::new()
            .redirect("/", "/login")
            .page(
                MockPage::new("/login")
                    .element(MockElement::new("a").attr("href", "/signup").text("Sign Up")),
            )
            .page(
                MockPage::new("/signup")
                    .element(MockElement::new("input").attr("name", "email"))
                    .element(MockElement::new("input").attr("name", "secret").hidden())
                    .element(
                        MockElement::new("select")
                            .attr("name", "gender")
                            .child(MockElement::new("option").attr("value", "").text("Select"))
                            .child(MockElement::new("option").attr("value", "male").text("Male")),
                    )
                    .element(
                        MockElement::new("button").attr("type", "submit").on_click(
                            Reaction::if_value(
                                "select[name=\"gender\"]",
                                "male",
                                vec![Reaction::alert("ok", vec![Reaction::navigate("/done")])],
                                vec![Reaction::alert("pick a gender", vec![])],
                            ),
                        ),
                    )
                    .on_load(Reaction::after(
                        1_500,
                        Reaction::append(vec![MockElement::new("button").class("tag").text("rust")]),
                    )),
            )
            .page(MockPage::new("/done"))
    }

    async fn one(driver: &MockDriver, selector: Selector) -> ElementHandle {
        driver
            .find_elements(&selector, None)
            .await
            .unwrap()
            .into_iter()
            .next()
            .expect("element")
    }

    #[tokio::test]
    async fn test_starts_blank_and_follows_redirect() {
        let driver = MockDriver::new(signup_like());
        assert_eq!(driver.current_url().await.unwrap(), "about:blank");
        driver.navigate("http://localhost:3000/").await.unwrap();
        assert_eq!(driver.current_url().await.unwrap(), "http://localhost:3000/login");
        assert_eq!(driver.current_path().as_deref(), Some("/login"));
    }

    #[tokio::test]
    async fn test_link_click_navigates_and_bumps_generation() {
        let driver = MockDriver::new(signup_like());
        driver.navigate("http://localhost:3000/login").await.unwrap();
        let before = driver.generation();
        let link = one(&driver, Selector::link_text("Sign Up")).await;
        driver.click(&link).await.unwrap();
        assert_eq!(driver.current_path().as_deref(), Some("/signup"));
        assert_eq!(driver.generation(), before + 1);
        assert!(matches!(
            driver.click(&link).await,
            Err(ProbeError::StaleHandle { .. })
        ));
    }

    #[tokio::test]
    async fn test_hidden_element_refuses_input() {
        let driver = MockDriver::new(signup_like());
        driver.navigate("http://localhost:3000/signup").await.unwrap();
        let secret = one(&driver, Selector::name("secret")).await;
        assert!(!driver.is_clickable(&secret).await.unwrap());
        assert!(driver.type_text(&secret, "x").await.is_err());
        driver.set_value(&secret, "direct").await.unwrap();
        assert_eq!(driver.value_of("input[name=\"secret\"]").as_deref(), Some("direct"));
    }

    #[tokio::test]
    async fn test_typing_appends_and_clear_resets() {
        let driver = MockDriver::new(signup_like());
        driver.navigate("http://localhost:3000/signup").await.unwrap();
        let email = one(&driver, Selector::name("email")).await;
        driver.type_text(&email, "abc").await.unwrap();
        driver.type_text(&email, "123").await.unwrap();
        assert_eq!(driver.value_of("[name=\"email\"]").as_deref(), Some("abc123"));
        driver.clear(&email).await.unwrap();
        assert_eq!(driver.value_of("[name=\"email\"]").as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_select_option_sets_select_and_branch() {
        let driver = MockDriver::new(signup_like());
        driver.navigate("http://localhost:3000/signup").await.unwrap();
        let select = one(&driver, Selector::name("gender")).await;
        assert_eq!(driver.select_option(&select, 1).await.unwrap(), "male");
        assert_eq!(driver.value_of("select").as_deref(), Some("male"));

        let submit = one(&driver, Selector::css("button[type=\"submit\"]")).await;
        driver.click(&submit).await.unwrap();
        let dialog = driver.pending_dialog().await.unwrap().unwrap();
        assert_eq!(dialog.message(), "ok");
    }

    #[tokio::test]
    async fn test_change_reaction_needs_a_dispatched_change() {
        let app = MockApp::new().page(
            MockPage::new("/details").element(
                MockElement::new("select")
                    .attr("name", "gender")
                    .child(MockElement::new("option").attr("value", "").text("Select"))
                    .child(MockElement::new("option").attr("value", "Male").text("Male"))
                    .on_change(Reaction::append(vec![MockElement::new("p")
                        .attr("id", "picked")
                        .text("picked")])),
            ),
        );
        let driver = MockDriver::new(app);
        driver.navigate("http://localhost:3000/details").await.unwrap();
        let select = one(&driver, Selector::name("gender")).await;
        let options = driver
            .find_elements(&Selector::tag_name("option"), Some(&select))
            .await
            .unwrap();

        // Clicking the option element leaves a controlled select untouched
        driver.click(&options[1]).await.unwrap();
        assert_eq!(driver.value_of("select").as_deref(), Some(""));
        assert!(driver.find_elements(&Selector::css("#picked"), None).await.unwrap().is_empty());

        driver.select_option(&select, 1).await.unwrap();
        assert_eq!(driver.value_of("select").as_deref(), Some("Male"));
        assert_eq!(driver.find_elements(&Selector::css("#picked"), None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_select_option_rejects_bad_targets() {
        let driver = MockDriver::new(signup_like());
        driver.navigate("http://localhost:3000/signup").await.unwrap();
        let select = one(&driver, Selector::name("gender")).await;
        assert!(matches!(
            driver.select_option(&select, 5).await,
            Err(ProbeError::NotFound { .. })
        ));
        let email = one(&driver, Selector::name("email")).await;
        assert!(matches!(
            driver.select_option(&email, 0).await,
            Err(ProbeError::Browser { .. })
        ));
    }

    #[tokio::test]
    async fn test_dialog_blocks_dom_but_not_url() {
        let driver = MockDriver::new(signup_like());
        driver.navigate("http://localhost:3000/signup").await.unwrap();
        let submit = one(&driver, Selector::css("button[type=\"submit\"]")).await;
        driver.click(&submit).await.unwrap();

        let err = driver.find_elements(&Selector::css("input"), None).await.unwrap_err();
        assert!(matches!(err, ProbeError::DialogBlocking { .. }));
        assert!(driver.current_url().await.unwrap().ends_with("/signup"));

        let dialog = driver.dismiss_dialog().await.unwrap();
        assert_eq!(dialog.message(), "pick a gender");
        assert!(driver.find_elements(&Selector::css("input"), None).await.is_ok());
        assert!(matches!(driver.accept_dialog().await, Err(ProbeError::NoDialog)));
    }

    #[tokio::test]
    async fn test_accept_runs_follow_up() {
        let driver = MockDriver::new(signup_like());
        driver.navigate("http://localhost:3000/signup").await.unwrap();
        let select = one(&driver, Selector::name("gender")).await;
        driver.select_option(&select, 1).await.unwrap();
        let submit = one(&driver, Selector::css("button[type=\"submit\"]")).await;
        driver.click(&submit).await.unwrap();
        driver.accept_dialog().await.unwrap();
        assert_eq!(driver.current_path().as_deref(), Some("/done"));
        assert_eq!(driver.resolved_dialogs().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deferred_render_follows_clock() {
        let driver = MockDriver::new(signup_like());
        driver.navigate("http://localhost:3000/signup").await.unwrap();
        let tags = driver.find_elements(&Selector::css("button.tag"), None).await.unwrap();
        assert!(tags.is_empty());

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        let tags = driver.find_elements(&Selector::css("button.tag"), None).await.unwrap();
        assert_eq!(tags.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_cancels_deferred_reactions() {
        let driver = MockDriver::new(signup_like());
        driver.navigate("http://localhost:3000/signup").await.unwrap();
        driver.navigate("http://localhost:3000/login").await.unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        let tags = driver.find_elements(&Selector::css("button.tag"), None).await.unwrap();
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn test_closed_driver_rejects_calls() {
        let driver = MockDriver::new(signup_like());
        driver.close().await.unwrap();
        assert!(driver.is_closed());
        assert!(driver.navigate("http://localhost:3000/").await.is_err());
        assert!(driver.close().await.is_err());
    }

    #[tokio::test]
    async fn test_evaluate_records_script() {
        let driver = MockDriver::new(signup_like());
        driver.navigate("http://localhost:3000/login").await.unwrap();
        driver.evaluate("window.scrollTo(0, 0)").await.unwrap();
        driver.maximize_window().await.unwrap();
        assert_eq!(driver.scripts(), vec!["window.scrollTo(0, 0)".to_string()]);
        assert!(driver.is_maximized());
        assert_eq!(driver.screenshot().await.unwrap()[1..4], *b"PNG");
    }
}

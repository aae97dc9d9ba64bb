//! Condition predicates for the wait engine.
//!
//! A condition is a read-only probe of browser state. It reports either
//! [`Outcome::Satisfied`] with a value the caller can use (an element, a URL,
//! a dialog) or [`Outcome::NotYetSatisfied`] with a short observation that
//! ends up in the timeout error if the wait gives up.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

use crate::dialog::Dialog;
use crate::driver::ElementHandle;
use crate::error::ProbeResult;
use crate::locator::{locate, Selector};
use crate::session::Session;

/// Result of a single condition evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Not there yet, with what was observed instead
    NotYetSatisfied(String),
    /// Satisfied, with the resolved value
    Satisfied(T),
}

impl<T> Outcome<T> {
    /// Whether the condition held
    #[must_use]
    pub const fn is_satisfied(&self) -> bool {
        matches!(self, Self::Satisfied(_))
    }

    /// Map the satisfied value
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Self::NotYetSatisfied(observed) => Outcome::NotYetSatisfied(observed),
            Self::Satisfied(value) => Outcome::Satisfied(f(value)),
        }
    }
}

/// A pure predicate over session state
#[async_trait]
pub trait Condition: Send + Sync {
    /// Value produced when the condition holds
    type Output: Send;

    /// Evaluate once. Must not mutate application state.
    async fn check(&self, session: &Session) -> ProbeResult<Outcome<Self::Output>>;

    /// Human-readable description for logs and timeout errors
    fn description(&self) -> String;
}

// =============================================================================
// ELEMENT CONDITIONS
// =============================================================================

/// At least one element matches
#[derive(Debug, Clone)]
pub struct ElementPresent {
    selector: Selector,
    scope: Option<ElementHandle>,
}

impl ElementPresent {
    /// Match anywhere in the document
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            scope: None,
        }
    }

    /// Restrict matching to descendants of `scope`
    #[must_use]
    pub fn within(mut self, scope: ElementHandle) -> Self {
        self.scope = Some(scope);
        self
    }
}

#[async_trait]
impl Condition for ElementPresent {
    type Output = ElementHandle;

    async fn check(&self, session: &Session) -> ProbeResult<Outcome<ElementHandle>> {
        let mut found = locate(session, &self.selector, self.scope.as_ref()).await?;
        Ok(match found.next() {
            Some(handle) => Outcome::Satisfied(handle),
            None => Outcome::NotYetSatisfied(format!("no element matches {}", self.selector)),
        })
    }

    fn description(&self) -> String {
        format!("{} to be present", self.selector)
    }
}

/// First matching element is visible and enabled
#[derive(Debug, Clone)]
pub struct ElementClickable {
    selector: Selector,
}

impl ElementClickable {
    /// Create the condition
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        Self { selector }
    }
}

#[async_trait]
impl Condition for ElementClickable {
    type Output = ElementHandle;

    async fn check(&self, session: &Session) -> ProbeResult<Outcome<ElementHandle>> {
        let Some(handle) = locate(session, &self.selector, None).await?.next() else {
            return Ok(Outcome::NotYetSatisfied(format!(
                "no element matches {}",
                self.selector
            )));
        };
        if session.driver().is_clickable(&handle).await? {
            Ok(Outcome::Satisfied(handle))
        } else {
            Ok(Outcome::NotYetSatisfied(format!(
                "{} is present but not clickable",
                self.selector
            )))
        }
    }

    fn description(&self) -> String {
        format!("{} to be clickable", self.selector)
    }
}

/// At least `min` elements match
#[derive(Debug, Clone)]
pub struct ElementCountAtLeast {
    selector: Selector,
    min: usize,
}

impl ElementCountAtLeast {
    /// Create the condition
    #[must_use]
    pub fn new(selector: Selector, min: usize) -> Self {
        Self { selector, min }
    }
}

#[async_trait]
impl Condition for ElementCountAtLeast {
    type Output = Vec<ElementHandle>;

    async fn check(&self, session: &Session) -> ProbeResult<Outcome<Vec<ElementHandle>>> {
        let found: Vec<ElementHandle> = locate(session, &self.selector, None).await?.collect();
        if found.len() >= self.min {
            Ok(Outcome::Satisfied(found))
        } else {
            Ok(Outcome::NotYetSatisfied(format!(
                "{} matched {} element(s)",
                self.selector,
                found.len()
            )))
        }
    }

    fn description(&self) -> String {
        format!("at least {} element(s) matching {}", self.min, self.selector)
    }
}

// =============================================================================
// BROWSER STATE CONDITIONS
// =============================================================================

/// Current URL contains a substring (case-sensitive)
#[derive(Debug, Clone)]
pub struct UrlContains {
    needle: String,
}

impl UrlContains {
    /// Create the condition
    #[must_use]
    pub fn new(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
        }
    }
}

#[async_trait]
impl Condition for UrlContains {
    type Output = String;

    async fn check(&self, session: &Session) -> ProbeResult<Outcome<String>> {
        let url = session.current_url().await?;
        if url.contains(&self.needle) {
            Ok(Outcome::Satisfied(url))
        } else {
            Ok(Outcome::NotYetSatisfied(format!("url is {url}")))
        }
    }

    fn description(&self) -> String {
        format!("url to contain `{}`", self.needle)
    }
}

/// A native dialog is pending
#[derive(Debug, Clone, Copy, Default)]
pub struct DialogPresent;

#[async_trait]
impl Condition for DialogPresent {
    type Output = Dialog;

    async fn check(&self, session: &Session) -> ProbeResult<Outcome<Dialog>> {
        Ok(match session.driver().pending_dialog().await? {
            Some(dialog) => Outcome::Satisfied(dialog),
            None => Outcome::NotYetSatisfied("no dialog pending".to_string()),
        })
    }

    fn description(&self) -> String {
        "a dialog to appear".to_string()
    }
}

// =============================================================================
// COMBINATORS
// =============================================================================

/// Boxed condition producing `T`
pub type BoxedCondition<T> = Box<dyn Condition<Output = T>>;

/// Satisfied when any member is; the first listed satisfied member wins.
///
/// Transient member errors count as "not yet"; any other member error
/// propagates.
pub struct AnyOf<T> {
    members: Vec<BoxedCondition<T>>,
}

impl<T: Send + 'static> AnyOf<T> {
    /// Empty disjunction (never satisfied)
    #[must_use]
    pub fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Append a member
    #[must_use]
    pub fn or(mut self, condition: impl Condition<Output = T> + 'static) -> Self {
        self.members.push(Box::new(condition));
        self
    }

    /// Number of members
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether there are no members
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<T: Send + 'static> Default for AnyOf<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> std::fmt::Debug for AnyOf<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let members: Vec<String> = self.members.iter().map(|m| m.description()).collect();
        f.debug_struct("AnyOf").field("members", &members).finish()
    }
}

#[async_trait]
impl<T: Send + 'static> Condition for AnyOf<T> {
    type Output = T;

    async fn check(&self, session: &Session) -> ProbeResult<Outcome<T>> {
        let mut observed = Vec::with_capacity(self.members.len());
        for member in &self.members {
            match member.check(session).await {
                Ok(Outcome::Satisfied(value)) => return Ok(Outcome::Satisfied(value)),
                Ok(Outcome::NotYetSatisfied(note)) => observed.push(note),
                Err(e) if e.is_transient() => observed.push(e.to_string()),
                Err(e) => return Err(e),
            }
        }
        if observed.is_empty() {
            observed.push("no conditions".to_string());
        }
        Ok(Outcome::NotYetSatisfied(observed.join(" | ")))
    }

    fn description(&self) -> String {
        let members: Vec<String> = self.members.iter().map(|m| m.description()).collect();
        format!("any of [{}]", members.join(", "))
    }
}

/// Future returned by a [`FnCondition`] closure
pub type CheckFuture<'a, T> = Pin<Box<dyn Future<Output = ProbeResult<Outcome<T>>> + Send + 'a>>;

/// A closure-backed condition
pub struct FnCondition<F> {
    func: F,
    description: String,
}

impl<F> std::fmt::Debug for FnCondition<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCondition")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

impl<F> FnCondition<F> {
    /// Create a new function condition
    ///
    /// ```ignore
    /// let heading = FnCondition::new("page title set", |session| {
    ///     Box::pin(async move {
    ///         let title = session.evaluate("document.title").await?;
    ///         Ok(match title.as_str() {
    ///             Some(t) if !t.is_empty() => Outcome::Satisfied(t.to_string()),
    ///             _ => Outcome::NotYetSatisfied("title is empty".into()),
    ///         })
    ///     })
    /// });
    /// ```
    pub fn new<T>(description: impl Into<String>, func: F) -> Self
    where
        F: for<'a> Fn(&'a Session) -> CheckFuture<'a, T> + Send + Sync,
    {
        Self {
            func,
            description: description.into(),
        }
    }
}

#[async_trait]
impl<F, T> Condition for FnCondition<F>
where
    F: for<'a> Fn(&'a Session) -> CheckFuture<'a, T> + Send + Sync,
    T: Send,
{
    type Output = T;

    async fn check(&self, session: &Session) -> ProbeResult<Outcome<T>> {
        (self.func)(session).await
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

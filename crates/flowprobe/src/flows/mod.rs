//! Flow scripts
//!
//! A flow is an ordered list of steps, each one `{locate/act, then wait}`.
//! The first failing step aborts the flow; the error, the state reached and
//! the last URL end up in the [`FlowResult`].

mod login;
mod profile;
mod signup;

pub use login::{LoginFlow, LoginState};
pub use profile::{ProfileFlow, ProfileState};
pub use signup::{SignupFlow, SignupState};

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::condition::{Condition, ElementClickable, ElementPresent};
use crate::dialog::{DialogAction, DialogHandler, DialogPolicy};
use crate::driver::ElementHandle;
use crate::error::{ProbeError, ProbeResult};
use crate::locator::Selector;
use crate::session::Session;
use crate::wait::wait_until;

// =============================================================================
// APPLICATION MAP
// =============================================================================

/// Routes of the application under test
pub mod routes {
    /// Landing page
    pub const HOME: &str = "/";
    /// Login form
    pub const LOGIN: &str = "/login";
    /// Account creation form
    pub const SIGNUP: &str = "/signup";
    /// Profile details form shown after signup
    pub const ENTER_DETAILS: &str = "/enterDetails";
    /// Student landing page after login
    pub const FEED: &str = "/feed";
    /// Landing page for other roles after login
    pub const CREATE_TOPIC: &str = "/create-topic";
    /// Prefix of profile deep links
    pub const PROFILE_PREFIX: &str = "/profile/";
}

/// Selectors for the application's controls
pub mod selectors {
    use crate::locator::Selector;

    /// Email field on the login form
    pub fn login_email() -> Selector {
        Selector::css(r#"input[type="email"][placeholder="Email"]"#)
    }

    /// Email field on the signup form
    pub fn signup_email() -> Selector {
        Selector::css(r#"input[type="email"]"#)
    }

    /// Password field
    pub fn password() -> Selector {
        Selector::css(r#"input[placeholder="Password"]"#)
    }

    /// Password confirmation field
    pub fn confirm_password() -> Selector {
        Selector::css(r#"input[placeholder="Confirm Password"]"#)
    }

    /// Form submit button
    pub fn submit() -> Selector {
        Selector::css(r#"button[type="submit"]"#)
    }

    /// Sidebar logout button
    pub fn sign_out() -> Selector {
        Selector::xpath(r#"//button[text()="Sign out"]"#)
    }

    /// Link from the login page to the signup form
    pub fn sign_up_link() -> Selector {
        Selector::link_text("Sign Up")
    }

    /// Unselected interest tags on the details form
    pub fn tag_buttons() -> Selector {
        Selector::css("button.bg-gray-300")
    }

    /// Main page heading
    pub fn heading() -> Selector {
        Selector::css("h1")
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// One executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step name
    pub name: String,
    /// Time spent in the step
    pub elapsed_ms: u64,
    /// Whether the step succeeded
    pub ok: bool,
}

/// Verdict of one flow run, with diagnostic context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    /// Unique id of this run
    pub run_id: Uuid,
    /// Flow name
    pub flow: String,
    /// Whether the flow reached its terminal success state
    pub passed: bool,
    /// Last state reached
    pub state: String,
    /// Browser URL when the flow ended
    pub last_url: Option<String>,
    /// Error that aborted the flow
    pub error: Option<String>,
    /// Kind of that error, e.g. `timeout`
    pub error_kind: Option<String>,
    /// Texts of the dialogs handled during the flow
    pub dialogs: Vec<String>,
    /// Executed steps in order
    pub steps: Vec<StepRecord>,
    /// Wall time of the flow
    pub duration_ms: u64,
    /// When the flow ended
    pub finished_at: DateTime<Utc>,
}

impl FlowResult {
    /// A passing result with no steps
    #[must_use]
    pub fn passed(flow: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            flow: flow.into(),
            passed: true,
            state: state.into(),
            last_url: None,
            error: None,
            error_kind: None,
            dialogs: Vec::new(),
            steps: Vec::new(),
            duration_ms: 0,
            finished_at: Utc::now(),
        }
    }

    /// A failing result with no steps
    #[must_use]
    pub fn failed(
        flow: impl Into<String>,
        state: impl Into<String>,
        last_url: Option<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            passed: false,
            last_url,
            error: Some(error.into()),
            ..Self::passed(flow, state)
        }
    }

    /// Pretty JSON for the diagnostic dump
    pub fn to_json(&self) -> ProbeResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// =============================================================================
// FLOW TRAIT
// =============================================================================

/// A runnable user scenario
#[async_trait]
pub trait Flow: Send + Sync {
    /// Short name used in logs, reports and dump file names
    fn name(&self) -> &'static str;

    /// Run against an open session. Never panics on application failure.
    async fn run(&self, session: &Session) -> FlowResult;
}

// =============================================================================
// FLOW CONTEXT
// =============================================================================

/// Per-run bookkeeping: current state, handled dialogs, step log
#[derive(Debug)]
pub struct FlowContext<'s, S> {
    session: &'s Session,
    flow: &'static str,
    state: S,
    dialogs: DialogHandler,
    steps: Vec<StepRecord>,
    started: Instant,
    dialog_timeout_ms: u64,
}

impl<'s, S> FlowContext<'s, S>
where
    S: Copy + fmt::Display + Send + Sync,
{
    /// Start a run in `initial` state
    pub fn new(session: &'s Session, flow: &'static str, initial: S, dialog_timeout_ms: u64) -> Self {
        info!(flow, state = %initial, "flow started");
        Self {
            session,
            flow,
            state: initial,
            dialogs: DialogHandler::new(),
            steps: Vec::new(),
            started: Instant::now(),
            dialog_timeout_ms,
        }
    }

    /// The session the flow drives
    pub const fn session(&self) -> &'s Session {
        self.session
    }

    /// Current state
    pub const fn state(&self) -> S {
        self.state
    }

    /// Steps recorded so far
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    /// Move to `next`
    pub fn transition(&mut self, next: S) {
        info!(flow = self.flow, from = %self.state, to = %next, "state transition");
        self.state = next;
    }

    fn record<T>(&mut self, name: &str, started: Instant, result: ProbeResult<T>) -> ProbeResult<T> {
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(flow = self.flow, step = name, elapsed_ms, "step ok"),
            Err(e) => warn!(flow = self.flow, step = name, elapsed_ms, error = %e, "step failed"),
        }
        self.steps.push(StepRecord {
            name: name.to_string(),
            elapsed_ms,
            ok: result.is_ok(),
        });
        result
    }

    /// Navigate to an application path
    pub async fn navigate(&mut self, path: &str) -> ProbeResult<()> {
        let started = Instant::now();
        let result = self.session.navigate(path).await;
        self.record(&format!("navigate {path}"), started, result)
    }

    /// Wait with the session's default budget
    pub async fn wait_for<C>(&mut self, step: &str, condition: &C) -> ProbeResult<C::Output>
    where
        C: Condition,
    {
        let started = Instant::now();
        let result = wait_until(self.session, condition, self.session.wait_options()).await;
        self.record(step, started, result)
    }

    /// Wait with a one-off budget
    pub async fn wait_within<C>(
        &mut self,
        step: &str,
        condition: &C,
        timeout_ms: u64,
    ) -> ProbeResult<C::Output>
    where
        C: Condition,
    {
        let started = Instant::now();
        let options = self.session.wait_options().with_timeout(timeout_ms);
        let result = wait_until(self.session, condition, &options).await;
        self.record(step, started, result)
    }

    async fn fill_once(&self, selector: &Selector, text: &str) -> ProbeResult<()> {
        let field = wait_until(
            self.session,
            &ElementPresent::new(selector.clone()),
            self.session.wait_options(),
        )
        .await?;
        let driver = self.session.driver();
        driver.clear(&field).await?;
        driver.type_text(&field, text).await
    }

    /// Wait for a field, clear it and type `text`. A handle that went stale
    /// between lookup and typing is re-acquired once.
    pub async fn fill(&mut self, step: &str, selector: &Selector, text: &str) -> ProbeResult<()> {
        let started = Instant::now();
        let result = match self.fill_once(selector, text).await {
            Err(ProbeError::StaleHandle { .. }) => {
                debug!(flow = self.flow, step, "field went stale, retrying");
                self.fill_once(selector, text).await
            }
            other => other,
        };
        self.record(step, started, result)
    }

    /// Wait for an element and assign its value directly
    pub async fn set_value(&mut self, step: &str, selector: &Selector, value: &str) -> ProbeResult<()> {
        let started = Instant::now();
        let result = async {
            let field = wait_until(
                self.session,
                &ElementPresent::new(selector.clone()),
                self.session.wait_options(),
            )
            .await?;
            self.session.driver().set_value(&field, value).await
        }
        .await;
        self.record(step, started, result)
    }

    async fn click_once(&self, selector: &Selector) -> ProbeResult<()> {
        let target = wait_until(
            self.session,
            &ElementClickable::new(selector.clone()),
            self.session.wait_options(),
        )
        .await?;
        self.session.driver().click(&target).await
    }

    /// Wait until an element is clickable, then click it
    pub async fn click(&mut self, step: &str, selector: &Selector) -> ProbeResult<()> {
        let started = Instant::now();
        let result = match self.click_once(selector).await {
            Err(ProbeError::StaleHandle { .. }) => {
                debug!(flow = self.flow, step, "target went stale, retrying");
                self.click_once(selector).await
            }
            other => other,
        };
        self.record(step, started, result)
    }

    /// Choose the option at `index` of an already located `<select>`
    pub async fn select_option(
        &mut self,
        step: &str,
        select: &ElementHandle,
        index: usize,
    ) -> ProbeResult<String> {
        let started = Instant::now();
        let result = self.session.driver().select_option(select, index).await;
        self.record(step, started, result)
    }

    /// Click an already located element
    pub async fn click_handle(&mut self, step: &str, handle: &ElementHandle) -> ProbeResult<()> {
        let started = Instant::now();
        let result = self.session.driver().click(handle).await;
        self.record(step, started, result)
    }

    /// Resolve a dialog within the flow's dialog bound
    pub async fn dialog(
        &mut self,
        step: &str,
        policy: DialogPolicy,
        action: DialogAction,
    ) -> ProbeResult<Option<String>> {
        let started = Instant::now();
        let result = self
            .dialogs
            .handle(self.session, policy, action, self.dialog_timeout_ms)
            .await;
        self.record(step, started, result)
    }

    /// Close the run and build its result
    pub async fn finish(self, outcome: ProbeResult<()>) -> FlowResult {
        let last_url = self.session.current_url().await.ok();
        let duration_ms = self.started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(()) => info!(flow = self.flow, state = %self.state, duration_ms, "flow passed"),
            Err(e) => warn!(
                flow = self.flow,
                state = %self.state,
                url = last_url.as_deref().unwrap_or("unknown"),
                error = %e,
                "flow failed"
            ),
        }
        let (error, error_kind) = match outcome {
            Ok(()) => (None, None),
            Err(e) => (Some(e.to_string()), Some(e.kind().to_string())),
        };
        FlowResult {
            run_id: Uuid::new_v4(),
            flow: self.flow.to_string(),
            passed: error.is_none(),
            state: self.state.to_string(),
            last_url,
            error,
            error_kind,
            dialogs: self.dialogs.messages(),
            steps: self.steps,
            duration_ms,
            finished_at: Utc::now(),
        }
    }
}

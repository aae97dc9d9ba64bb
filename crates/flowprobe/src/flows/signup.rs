//! Signup flow: account form, details form, back to login.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{routes, selectors, Flow, FlowContext, FlowResult};
use crate::condition::{ElementCountAtLeast, ElementPresent, UrlContains};
use crate::config::{HarnessConfig, DEFAULT_DIALOG_TIMEOUT_MS};
use crate::dialog::{DialogAction, DialogPolicy};
use crate::error::{ProbeError, ProbeResult};
use crate::fixture::{FixtureGenerator, SignupData};
use crate::locator::{locate, Selector};
use crate::session::Session;
use crate::wait::wait_until;

/// Bound for the "already logged in?" probe and the logout redirect
pub const LOGOUT_PROBE_MS: u64 = 3_000;

/// Bound for interest tags to render on the details form
pub const TAG_RENDER_MS: u64 = 1_500;

/// Tags selected at most
pub const MAX_TAGS: usize = 2;

/// Gender option picked (index into the `<option>` list; 0 is the placeholder)
pub const GENDER_OPTION_INDEX: usize = 1;

/// Signup flow states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignupState {
    /// Nothing done yet
    Start,
    /// On `/signup`
    OnSignupForm,
    /// Details form submitted
    DetailsFormSubmitted,
    /// Waiting for the optional dialog and the redirect to `/login`
    AwaitingRedirectOrAlert,
    /// Back on `/login`
    Done,
}

impl fmt::Display for SignupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Registers a fresh account end to end
#[derive(Debug, Clone)]
pub struct SignupFlow {
    data: SignupData,
    dialog_timeout_ms: u64,
    logout_probe_ms: u64,
    tag_render_ms: u64,
}

impl SignupFlow {
    /// Flow registering `data`
    #[must_use]
    pub fn new(data: SignupData) -> Self {
        Self {
            data,
            dialog_timeout_ms: DEFAULT_DIALOG_TIMEOUT_MS,
            logout_probe_ms: LOGOUT_PROBE_MS,
            tag_render_ms: TAG_RENDER_MS,
        }
    }

    /// Flow with freshly generated account data
    #[must_use]
    pub fn generated(fixtures: &mut FixtureGenerator) -> Self {
        Self::new(fixtures.signup_data())
    }

    /// Generated account data and the configured dialog bound
    #[must_use]
    pub fn from_config(config: &HarnessConfig, fixtures: &mut FixtureGenerator) -> Self {
        Self::generated(fixtures).with_dialog_timeout_ms(config.dialog_timeout_ms)
    }

    /// Set the dialog bound
    #[must_use]
    pub const fn with_dialog_timeout_ms(mut self, ms: u64) -> Self {
        self.dialog_timeout_ms = ms;
        self
    }

    /// Set the logout probe bound
    #[must_use]
    pub const fn with_logout_probe_ms(mut self, ms: u64) -> Self {
        self.logout_probe_ms = ms;
        self
    }

    /// Set the tag render bound
    #[must_use]
    pub const fn with_tag_render_ms(mut self, ms: u64) -> Self {
        self.tag_render_ms = ms;
        self
    }

    /// Account data the flow registers
    #[must_use]
    pub const fn data(&self) -> &SignupData {
        &self.data
    }

    /// Sign out first if a previous session is still active.
    async fn ensure_logged_out(&self, cx: &mut FlowContext<'_, SignupState>) -> ProbeResult<()> {
        let probe = ElementPresent::new(selectors::sign_out());
        let options = cx.session().wait_options().with_timeout(self.logout_probe_ms);
        match wait_until(cx.session(), &probe, &options).await {
            Ok(button) => {
                cx.click_handle("sign out", &button).await?;
                cx.wait_within(
                    "wait for login after sign out",
                    &UrlContains::new(routes::LOGIN),
                    self.logout_probe_ms,
                )
                .await?;
                info!("signed out previous session");
                Ok(())
            }
            Err(ProbeError::Timeout { .. }) => {
                debug!("no active session");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn pick_gender(&self, cx: &mut FlowContext<'_, SignupState>) -> ProbeResult<()> {
        let select = cx
            .wait_for("wait for gender select", &ElementPresent::new(Selector::name("gender")))
            .await?;
        let value = cx
            .select_option("pick gender", &select, GENDER_OPTION_INDEX)
            .await?;
        debug!(gender = %value, "gender picked");
        Ok(())
    }

    /// Click up to [`MAX_TAGS`] tags. Never fails for missing tags.
    async fn pick_tags(&self, cx: &mut FlowContext<'_, SignupState>) -> ProbeResult<usize> {
        let rendered = ElementCountAtLeast::new(selectors::tag_buttons(), MAX_TAGS);
        let options = cx.session().wait_options().with_timeout(self.tag_render_ms);
        match wait_until(cx.session(), &rendered, &options).await {
            Ok(_) | Err(ProbeError::Timeout { .. }) => {}
            Err(e) => return Err(e),
        }
        let tags: Vec<_> = locate(cx.session(), &selectors::tag_buttons(), None)
            .await?
            .take(MAX_TAGS)
            .collect();
        let mut picked = 0;
        for tag in &tags {
            match cx.click_handle("pick tag", tag).await {
                Ok(()) => picked += 1,
                Err(e) if e.is_transient() => debug!(error = %e, "tag vanished"),
                Err(e) => return Err(e),
            }
        }
        info!(picked, "interest tags selected");
        Ok(picked)
    }

    async fn execute(&self, cx: &mut FlowContext<'_, SignupState>) -> ProbeResult<()> {
        let data = &self.data;

        cx.navigate(routes::HOME).await?;
        self.ensure_logged_out(cx).await?;

        cx.click("open signup form", &selectors::sign_up_link()).await?;
        cx.wait_for("wait for signup form", &UrlContains::new(routes::SIGNUP))
            .await?;
        cx.transition(SignupState::OnSignupForm);

        cx.fill("fill email", &selectors::signup_email(), &data.email)
            .await?;
        cx.fill("fill password", &selectors::password(), &data.password)
            .await?;
        cx.fill("confirm password", &selectors::confirm_password(), &data.password)
            .await?;
        cx.click("submit signup", &selectors::submit()).await?;
        cx.dialog("accept signup dialog", DialogPolicy::Optional, DialogAction::Accept)
            .await?;

        cx.wait_for("wait for details form", &UrlContains::new(routes::ENTER_DETAILS))
            .await?;
        for (name, value) in [
            ("username", &data.username),
            ("first_name", &data.first_name),
            ("last_name", &data.last_name),
            ("phone_number", &data.phone_number),
            ("address", &data.address),
            ("linkedin_link", &data.linkedin_link),
        ] {
            cx.fill(&format!("fill {name}"), &Selector::name(name), value)
                .await?;
        }
        cx.set_value(
            "set date_of_birth",
            &Selector::name("date_of_birth"),
            &data.date_of_birth,
        )
        .await?;
        self.pick_gender(cx).await?;
        self.pick_tags(cx).await?;

        info!(
            email = %data.email,
            username = %data.username,
            "submitting details"
        );
        cx.click("submit details", &selectors::submit()).await?;
        cx.transition(SignupState::DetailsFormSubmitted);

        cx.transition(SignupState::AwaitingRedirectOrAlert);
        cx.dialog("accept details dialog", DialogPolicy::Optional, DialogAction::Accept)
            .await?;
        cx.wait_for("wait for login page", &UrlContains::new(routes::LOGIN))
            .await?;
        cx.transition(SignupState::Done);
        Ok(())
    }
}

#[async_trait]
impl Flow for SignupFlow {
    fn name(&self) -> &'static str {
        "signup"
    }

    async fn run(&self, session: &Session) -> FlowResult {
        let mut cx = FlowContext::new(session, self.name(), SignupState::Start, self.dialog_timeout_ms);
        let outcome = self.execute(&mut cx).await;
        cx.finish(outcome).await
    }
}

//! Login flow: credentials in, success dialog accepted, redirected.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{routes, selectors, Flow, FlowContext, FlowResult};
use crate::condition::{AnyOf, UrlContains};
use crate::config::{Credentials, HarnessConfig};
use crate::dialog::{DialogAction, DialogPolicy};
use crate::error::{ProbeError, ProbeResult};
use crate::session::Session;

/// Text the success dialog must contain (case-insensitive)
pub const LOGIN_SUCCESS_TEXT: &str = "logged in successfully";

/// Login flow states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoginState {
    /// Nothing done yet
    Start,
    /// Email and password typed
    FormFilled,
    /// Submitted, waiting for the result dialog
    AwaitingDialog,
    /// Dialog accepted, waiting for the post-login page
    AwaitingRedirect,
    /// On `/feed` or `/create-topic`
    Done,
}

impl fmt::Display for LoginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Navigate to `/login`, fill the form and submit it.
pub(crate) async fn submit_login_form<S>(
    cx: &mut FlowContext<'_, S>,
    credentials: &Credentials,
) -> ProbeResult<()>
where
    S: Copy + fmt::Display + Send + Sync,
{
    cx.navigate(routes::LOGIN).await?;
    cx.fill("fill email", &selectors::login_email(), &credentials.email)
        .await?;
    cx.fill("fill password", &selectors::password(), &credentials.password)
        .await?;
    Ok(())
}

/// Signs in and checks the post-login redirect
#[derive(Debug, Clone)]
pub struct LoginFlow {
    credentials: Credentials,
    /// Bound for the success dialog; the session's wait budget when unset
    dialog_timeout_ms: Option<u64>,
}

impl LoginFlow {
    /// Flow for `credentials`
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            dialog_timeout_ms: None,
        }
    }

    /// Flow using the configured credentials. The success dialog is
    /// mandatory, so it gets the full wait budget rather than the shorter
    /// bound used for optional dialogs.
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self::new(config.credentials.clone())
    }

    /// Set the dialog bound
    #[must_use]
    pub const fn with_dialog_timeout_ms(mut self, ms: u64) -> Self {
        self.dialog_timeout_ms = Some(ms);
        self
    }

    async fn execute(&self, cx: &mut FlowContext<'_, LoginState>) -> ProbeResult<()> {
        submit_login_form(cx, &self.credentials).await?;
        cx.transition(LoginState::FormFilled);

        cx.click("submit login", &selectors::submit()).await?;
        cx.transition(LoginState::AwaitingDialog);

        let message = cx
            .dialog("accept login dialog", DialogPolicy::Mandatory, DialogAction::Accept)
            .await?
            .unwrap_or_default();
        if !message.to_lowercase().contains(LOGIN_SUCCESS_TEXT) {
            return Err(ProbeError::assertion(format!(
                "login dialog said `{message}`, expected it to contain `{LOGIN_SUCCESS_TEXT}`"
            )));
        }
        cx.transition(LoginState::AwaitingRedirect);

        let landing = AnyOf::new()
            .or(UrlContains::new(routes::FEED))
            .or(UrlContains::new(routes::CREATE_TOPIC));
        cx.wait_for("wait for post-login page", &landing).await?;
        cx.transition(LoginState::Done);
        Ok(())
    }
}

#[async_trait]
impl Flow for LoginFlow {
    fn name(&self) -> &'static str {
        "login"
    }

    async fn run(&self, session: &Session) -> FlowResult {
        let dialog_timeout_ms = self
            .dialog_timeout_ms
            .unwrap_or(session.wait_options().timeout_ms);
        let mut cx = FlowContext::new(session, self.name(), LoginState::Start, dialog_timeout_ms);
        let outcome = self.execute(&mut cx).await;
        cx.finish(outcome).await
    }
}

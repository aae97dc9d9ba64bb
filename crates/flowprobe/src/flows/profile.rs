//! Profile-view flow: log in, open a profile by deep link, check it rendered.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::login::submit_login_form;
use super::{routes, selectors, Flow, FlowContext, FlowResult};
use crate::condition::{ElementPresent, UrlContains};
use crate::config::{Credentials, HarnessConfig, DEFAULT_DIALOG_TIMEOUT_MS};
use crate::dialog::{DialogAction, DialogPolicy};
use crate::error::{ProbeError, ProbeResult};
use crate::session::Session;

/// Profile flow states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfileState {
    /// Nothing done yet
    Start,
    /// Signed in, sidebar rendered
    LoggedIn,
    /// Deep link opened
    OnProfile,
    /// Profile heading rendered
    Done,
}

impl fmt::Display for ProfileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Opens `/profile/{username}` as a signed-in user
#[derive(Debug, Clone)]
pub struct ProfileFlow {
    credentials: Credentials,
    username: String,
    dialog_timeout_ms: u64,
}

impl ProfileFlow {
    /// Flow viewing `username`'s profile after signing in with `credentials`
    #[must_use]
    pub fn new(credentials: Credentials, username: impl Into<String>) -> Self {
        Self {
            credentials,
            username: username.into(),
            dialog_timeout_ms: DEFAULT_DIALOG_TIMEOUT_MS,
        }
    }

    /// Flow for the configured account. The account's username is required.
    pub fn from_config(config: &HarnessConfig) -> ProbeResult<Self> {
        let username = config
            .credentials
            .username
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ProbeError::invalid_config("credentials.username is required to view a profile"))?;
        Ok(Self::new(config.credentials.clone(), username)
            .with_dialog_timeout_ms(config.dialog_timeout_ms))
    }

    /// Set the dialog bound
    #[must_use]
    pub const fn with_dialog_timeout_ms(mut self, ms: u64) -> Self {
        self.dialog_timeout_ms = ms;
        self
    }

    /// Path of the profile page
    #[must_use]
    pub fn profile_path(&self) -> String {
        format!("{}{}", routes::PROFILE_PREFIX, self.username)
    }

    async fn execute(&self, cx: &mut FlowContext<'_, ProfileState>) -> ProbeResult<()> {
        submit_login_form(cx, &self.credentials).await?;
        cx.click("submit login", &selectors::submit()).await?;
        cx.dialog("accept login dialog", DialogPolicy::Optional, DialogAction::Accept)
            .await?;
        cx.wait_for("wait for sidebar", &ElementPresent::new(selectors::sign_out()))
            .await?;
        cx.transition(ProfileState::LoggedIn);

        let path = self.profile_path();
        cx.navigate(&path).await?;
        cx.transition(ProfileState::OnProfile);

        cx.wait_for("wait for profile url", &UrlContains::new(path))
            .await?;
        cx.wait_for("wait for profile heading", &ElementPresent::new(selectors::heading()))
            .await?;
        cx.transition(ProfileState::Done);
        Ok(())
    }
}

#[async_trait]
impl Flow for ProfileFlow {
    fn name(&self) -> &'static str {
        "profile"
    }

    async fn run(&self, session: &Session) -> FlowResult {
        let mut cx = FlowContext::new(session, self.name(), ProfileState::Start, self.dialog_timeout_ms);
        let outcome = self.execute(&mut cx).await;
        cx.finish(outcome).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_path() {
        let flow = ProfileFlow::new(Credentials::default(), "abc123");
        assert_eq!(flow.profile_path(), "/profile/abc123");
    }

    #[test]
    fn test_from_config_requires_username() {
        let config = HarnessConfig::default();
        let err = ProfileFlow::from_config(&config).unwrap_err();
        assert_eq!(err.kind(), "invalid_config");

        let mut credentials = Credentials::default();
        credentials.username = Some("abc123".into());
        let config = HarnessConfig::default().with_credentials(credentials);
        let flow = ProfileFlow::from_config(&config).unwrap();
        assert_eq!(flow.profile_path(), "/profile/abc123");
    }
}

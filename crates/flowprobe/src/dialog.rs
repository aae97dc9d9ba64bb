//! Native dialog handling (alert, confirm, prompt, beforeunload).
//!
//! Dialogs interrupt normal control flow: while one is pending the driver
//! refuses DOM interaction. Any action that may raise a dialog is followed by
//! an explicit [`DialogHandler::handle`] call before further DOM work.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::condition::DialogPresent;
use crate::error::{ProbeError, ProbeResult};
use crate::session::Session;
use crate::wait::{wait_until, WaitOptions};

/// Type of browser dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogType {
    /// Alert dialog (OK button only)
    Alert,
    /// Confirm dialog (OK/Cancel buttons)
    Confirm,
    /// Prompt dialog (text input + OK/Cancel)
    Prompt,
    /// Before unload dialog (Leave/Stay buttons)
    BeforeUnload,
}

impl std::fmt::Display for DialogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alert => write!(f, "alert"),
            Self::Confirm => write!(f, "confirm"),
            Self::Prompt => write!(f, "prompt"),
            Self::BeforeUnload => write!(f, "beforeunload"),
        }
    }
}

/// Action taken on a dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogAction {
    /// Dialog was accepted (OK/Yes/Leave)
    Accept,
    /// Dialog was dismissed (Cancel/No/Stay)
    Dismiss,
    /// Dialog is pending (not yet handled)
    Pending,
}

/// Whether a dialog must appear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogPolicy {
    /// Absence is an error
    Mandatory,
    /// Absence is fine
    Optional,
}

/// Represents a browser dialog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dialog {
    dialog_type: DialogType,
    message: String,
    action: DialogAction,
}

impl Dialog {
    /// Create a new pending dialog
    #[must_use]
    pub fn new(dialog_type: DialogType, message: impl Into<String>) -> Self {
        Self {
            dialog_type,
            message: message.into(),
            action: DialogAction::Pending,
        }
    }

    /// Create an alert dialog
    #[must_use]
    pub fn alert(message: impl Into<String>) -> Self {
        Self::new(DialogType::Alert, message)
    }

    /// Create a confirm dialog
    #[must_use]
    pub fn confirm(message: impl Into<String>) -> Self {
        Self::new(DialogType::Confirm, message)
    }

    /// Get dialog type
    #[must_use]
    pub const fn dialog_type(&self) -> DialogType {
        self.dialog_type
    }

    /// Get dialog message
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get action taken
    #[must_use]
    pub const fn action(&self) -> DialogAction {
        self.action
    }

    /// Check if dialog was handled
    #[must_use]
    pub const fn is_handled(&self) -> bool {
        !matches!(self.action, DialogAction::Pending)
    }

    /// Accept the dialog
    pub fn accept(&mut self) {
        self.action = DialogAction::Accept;
    }

    /// Dismiss the dialog
    pub fn dismiss(&mut self) {
        self.action = DialogAction::Dismiss;
    }
}

// =============================================================================
// SESSION-LEVEL OPERATIONS
// =============================================================================

/// Wait up to `within_ms` for a dialog to appear.
pub async fn expect_dialog(session: &Session, within_ms: u64) -> ProbeResult<Dialog> {
    let options = WaitOptions::new()
        .with_timeout(within_ms)
        .with_poll_interval(session.wait_options().poll_interval_ms);
    match wait_until(session, &DialogPresent, &options).await {
        Err(ProbeError::Timeout { .. }) => Err(ProbeError::DialogTimeout { within_ms }),
        other => other,
    }
}

/// Accept the pending dialog and return its text.
pub async fn accept(session: &Session) -> ProbeResult<String> {
    let dialog = session.driver().accept_dialog().await?;
    Ok(dialog.message)
}

/// Dismiss the pending dialog and return its text.
pub async fn dismiss(session: &Session) -> ProbeResult<String> {
    let dialog = session.driver().dismiss_dialog().await?;
    Ok(dialog.message)
}

// =============================================================================
// HANDLER
// =============================================================================

/// Resolves dialogs under a policy and records what it saw
#[derive(Debug, Clone, Default)]
pub struct DialogHandler {
    history: Vec<Dialog>,
}

impl DialogHandler {
    /// Create a new dialog handler
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for a dialog and resolve it with `action`.
    ///
    /// Returns `Ok(None)` when no dialog appeared and the policy is
    /// [`DialogPolicy::Optional`].
    pub async fn handle(
        &mut self,
        session: &Session,
        policy: DialogPolicy,
        action: DialogAction,
        within_ms: u64,
    ) -> ProbeResult<Option<String>> {
        if action == DialogAction::Pending {
            return Err(ProbeError::invalid_config(
                "dialog action must be accept or dismiss",
            ));
        }

        match expect_dialog(session, within_ms).await {
            Ok(_) => {}
            Err(ProbeError::DialogTimeout { within_ms }) if policy == DialogPolicy::Optional => {
                debug!(within_ms, "no dialog appeared");
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        let dialog = match action {
            DialogAction::Dismiss => session.driver().dismiss_dialog().await?,
            _ => session.driver().accept_dialog().await?,
        };
        info!(
            kind = %dialog.dialog_type(),
            message = dialog.message(),
            action = ?dialog.action(),
            "dialog handled"
        );
        let message = dialog.message().to_string();
        self.history.push(dialog);
        Ok(Some(message))
    }

    /// All dialogs handled so far
    #[must_use]
    pub fn dialogs(&self) -> &[Dialog] {
        &self.history
    }

    /// Messages of all handled dialogs
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.history.iter().map(|d| d.message.clone()).collect()
    }

    /// Last handled dialog
    #[must_use]
    pub fn last_dialog(&self) -> Option<&Dialog> {
        self.history.last()
    }
}

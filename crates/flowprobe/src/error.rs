//! Result and error types for Flowprobe.

use thiserror::Error;

/// Result type for Flowprobe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while driving a flow
#[derive(Debug, Error)]
pub enum ProbeError {
    /// No element matched a selector that was required to match
    #[error("No element matches {selector}")]
    NotFound {
        /// Selector that matched nothing
        selector: String,
    },

    /// Handle refers to a DOM generation that no longer exists
    #[error("Stale element handle {element} (acquired in generation {generation})")]
    StaleHandle {
        /// Element id
        element: String,
        /// Generation the handle was acquired in
        generation: u64,
    },

    /// Condition was not satisfied within its budget
    #[error(
        "Timed out after {timeout_ms}ms waiting for {description} (last observed: {last_observed}; url: {})",
        .last_url.as_deref().unwrap_or("unknown")
    )]
    Timeout {
        /// What was being waited for
        description: String,
        /// Budget in milliseconds
        timeout_ms: u64,
        /// Observation from the final evaluation
        last_observed: String,
        /// Browser URL when the budget ran out
        last_url: Option<String>,
    },

    /// Expected native dialog never appeared
    #[error("No dialog appeared within {within_ms}ms")]
    DialogTimeout {
        /// Bound in milliseconds
        within_ms: u64,
    },

    /// Selector is syntactically invalid
    #[error("Malformed selector {selector}: {reason}")]
    MalformedSelector {
        /// Offending selector
        selector: String,
        /// Why it was rejected
        reason: String,
    },

    /// Accept/dismiss was requested with no pending dialog
    #[error("No dialog is pending")]
    NoDialog,

    /// A native dialog blocks DOM interaction
    #[error("A {kind} dialog is blocking the page: {message}")]
    DialogBlocking {
        /// Dialog kind
        kind: String,
        /// Dialog text
        message: String,
    },

    /// Flow-level expectation did not hold
    #[error("Assertion failed: {message}")]
    AssertionFailed {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Any other browser protocol failure
    #[error("Browser error: {message}")]
    Browser {
        /// Error message
        message: String,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Whether the wait engine may retry after this error.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::StaleHandle { .. })
    }

    /// Stable snake_case name of the variant, for reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::StaleHandle { .. } => "stale_handle",
            Self::Timeout { .. } => "timeout",
            Self::DialogTimeout { .. } => "dialog_timeout",
            Self::MalformedSelector { .. } => "malformed_selector",
            Self::NoDialog => "no_dialog",
            Self::DialogBlocking { .. } => "dialog_blocking",
            Self::AssertionFailed { .. } => "assertion_failed",
            Self::Navigation { .. } => "navigation",
            Self::BrowserLaunch { .. } => "browser_launch",
            Self::Browser { .. } => "browser",
            Self::InvalidConfig { .. } => "invalid_config",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Yaml(_) => "yaml",
        }
    }

    /// Create a browser error
    pub fn browser(message: impl Into<String>) -> Self {
        Self::Browser {
            message: message.into(),
        }
    }

    /// Create an assertion failure
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::AssertionFailed {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a malformed selector error
    pub fn malformed(selector: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSelector {
            selector: selector.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ProbeError::NotFound {
            selector: "css `#x`".into()
        }
        .is_transient());
        assert!(ProbeError::StaleHandle {
            element: "n-1".into(),
            generation: 1
        }
        .is_transient());
        assert!(!ProbeError::NoDialog.is_transient());
        assert!(!ProbeError::DialogTimeout { within_ms: 5 }.is_transient());
        assert!(!ProbeError::malformed("xpath `a`", "not rooted").is_transient());
    }

    #[test]
    fn test_timeout_display_includes_context() {
        let err = ProbeError::Timeout {
            description: "url to contain `/feed`".into(),
            timeout_ms: 500,
            last_observed: "url is http://localhost:3000/login".into(),
            last_url: Some("http://localhost:3000/login".into()),
        };
        let text = err.to_string();
        assert!(text.contains("500ms"));
        assert!(text.contains("/feed"));
        assert!(text.contains("url: http://localhost:3000/login"));
    }

    #[test]
    fn test_timeout_display_without_url() {
        let err = ProbeError::Timeout {
            description: "x".into(),
            timeout_ms: 1,
            last_observed: "y".into(),
            last_url: None,
        };
        assert!(err.to_string().ends_with("url: unknown)"));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(ProbeError::NoDialog.kind(), "no_dialog");
        assert_eq!(ProbeError::assertion("x").kind(), "assertion_failed");
        assert_eq!(ProbeError::invalid_config("x").kind(), "invalid_config");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: ProbeError = io.into();
        assert!(matches!(err, ProbeError::Io(_)));
    }
}

//! Harness configuration
//!
//! Loaded from YAML (every field optional) and then overridden by the CLI.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{ProbeError, ProbeResult};
use crate::wait::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};

/// Default application URL
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Default bound for an expected dialog (5 seconds)
pub const DEFAULT_DIALOG_TIMEOUT_MS: u64 = 5_000;

/// What to do with the browser after a flow fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HoldMode {
    /// Close right away
    #[default]
    Off,
    /// Keep open for `secs`, then close
    Bounded {
        /// Hold duration in seconds
        secs: u64,
    },
    /// Keep open until the process is interrupted
    Indefinite,
}

impl std::fmt::Display for HoldMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Bounded { secs } => write!(f, "bounded ({secs}s)"),
            Self::Indefinite => write!(f, "indefinite"),
        }
    }
}

/// Browser launch options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    /// Run without a visible window
    pub headless: bool,
    /// Chromium executable; auto-detected when unset
    pub chromium_path: Option<PathBuf>,
    /// Initial window width
    pub window_width: u32,
    /// Initial window height
    pub window_height: u32,
    /// Maximize the window after launch
    pub maximize: bool,
    /// Keep the Chromium sandbox enabled
    pub sandbox: bool,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: true,
            chromium_path: None,
            window_width: 1280,
            window_height: 800,
            maximize: true,
            sandbox: true,
        }
    }
}

/// Account the flows sign in with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    /// Login email
    pub email: String,
    /// Login password
    pub password: String,
    /// Username whose profile the profile flow opens
    pub username: Option<String>,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            email: "trial@coll.test".to_string(),
            password: "Test@1234".to_string(),
            username: None,
        }
    }
}

/// Full harness configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Application base URL
    pub base_url: String,
    /// Default wait budget in milliseconds
    pub default_timeout_ms: u64,
    /// Poll interval in milliseconds
    pub poll_interval_ms: u64,
    /// Bound for expected dialogs in milliseconds
    pub dialog_timeout_ms: u64,
    /// Diagnostic hold on failure
    pub hold: HoldMode,
    /// Browser launch options
    pub browser: BrowserOptions,
    /// Where diagnostic dumps go
    pub output_dir: PathBuf,
    /// Flow credentials
    pub credentials: Credentials,
    /// Stop after the first failing flow
    pub fail_fast: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            default_timeout_ms: DEFAULT_WAIT_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            dialog_timeout_ms: DEFAULT_DIALOG_TIMEOUT_MS,
            hold: HoldMode::Off,
            browser: BrowserOptions::default(),
            output_dir: PathBuf::from("target/flowprobe"),
            credentials: Credentials::default(),
            fail_fast: false,
        }
    }
}

impl HarnessConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse YAML; missing fields keep their defaults
    pub fn from_yaml_str(yaml: &str) -> ProbeResult<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    /// Load from a YAML file
    pub fn load(path: &Path) -> ProbeResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Render as YAML
    pub fn to_yaml(&self) -> ProbeResult<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }

    /// Set base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set default wait budget
    #[must_use]
    pub const fn with_default_timeout_ms(mut self, ms: u64) -> Self {
        self.default_timeout_ms = ms;
        self
    }

    /// Set poll interval
    #[must_use]
    pub const fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set dialog bound
    #[must_use]
    pub const fn with_dialog_timeout_ms(mut self, ms: u64) -> Self {
        self.dialog_timeout_ms = ms;
        self
    }

    /// Set hold mode
    #[must_use]
    pub const fn with_hold(mut self, hold: HoldMode) -> Self {
        self.hold = hold;
        self
    }

    /// Set browser options
    #[must_use]
    pub fn with_browser(mut self, browser: BrowserOptions) -> Self {
        self.browser = browser;
        self
    }

    /// Set output directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Set credentials
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    /// Set fail fast
    #[must_use]
    pub const fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Reject configurations no run could succeed with.
    pub fn validate(&self) -> ProbeResult<()> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            ProbeError::invalid_config(format!("base_url `{}`: {e}", self.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProbeError::invalid_config(format!(
                "base_url `{}` must use http or https",
                self.base_url
            )));
        }
        if self.default_timeout_ms == 0 {
            return Err(ProbeError::invalid_config("default_timeout_ms must be > 0"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ProbeError::invalid_config("poll_interval_ms must be > 0"));
        }
        if self.poll_interval_ms >= self.default_timeout_ms {
            return Err(ProbeError::invalid_config(
                "poll_interval_ms must be smaller than default_timeout_ms",
            ));
        }
        if self.dialog_timeout_ms == 0 {
            return Err(ProbeError::invalid_config("dialog_timeout_ms must be > 0"));
        }
        if let HoldMode::Bounded { secs: 0 } = self.hold {
            return Err(ProbeError::invalid_config("bounded hold needs secs > 0"));
        }
        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ProbeError::invalid_config("window size must be non-zero"));
        }
        if !self.credentials.email.contains('@') {
            return Err(ProbeError::invalid_config(format!(
                "credentials.email `{}` is not an email address",
                self.credentials.email
            )));
        }
        if self.credentials.password.is_empty() {
            return Err(ProbeError::invalid_config("credentials.password is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Write;

    mod default_tests {
        use super::*;

        #[test]
        fn test_defaults_are_valid() {
            let config = HarnessConfig::default();
            assert!(config.validate().is_ok());
            assert_eq!(config.base_url, "http://localhost:3000");
            assert_eq!(config.default_timeout_ms, 15_000);
            assert_eq!(config.poll_interval_ms, 100);
            assert_eq!(config.hold, HoldMode::Off);
            assert!(config.browser.headless);
        }

        #[test]
        fn test_hold_display() {
            assert_eq!(HoldMode::Off.to_string(), "off");
            assert_eq!(HoldMode::Bounded { secs: 30 }.to_string(), "bounded (30s)");
        }
    }

    mod yaml_tests {
        use super::*;

        #[test]
        fn test_partial_yaml_keeps_defaults() {
            let config = HarnessConfig::from_yaml_str(
                "base_url: https://staging.example.com\nhold:\n  mode: bounded\n  secs: 120\n",
            )
            .unwrap();
            assert_eq!(config.base_url, "https://staging.example.com");
            assert_eq!(config.hold, HoldMode::Bounded { secs: 120 });
            assert_eq!(config.default_timeout_ms, 15_000);
            assert_eq!(config.credentials.email, "trial@coll.test");
        }

        #[test]
        fn test_nested_sections() {
            let yaml = r"
credentials:
  email: tbweqx_345@example.com
  username: nishok
browser:
  headless: false
  sandbox: false
";
            let config = HarnessConfig::from_yaml_str(yaml).unwrap();
            assert_eq!(config.credentials.username.as_deref(), Some("nishok"));
            assert_eq!(config.credentials.password, "Test@1234");
            assert!(!config.browser.headless);
            assert_eq!(config.browser.window_width, 1280);
        }

        #[test]
        fn test_yaml_round_trip() {
            let config = HarnessConfig::default().with_hold(HoldMode::Indefinite);
            let yaml = config.to_yaml().unwrap();
            assert!(yaml.contains("mode: indefinite"));
            assert_eq!(HarnessConfig::from_yaml_str(&yaml).unwrap(), config);
        }

        #[test]
        fn test_invalid_yaml() {
            let err = HarnessConfig::from_yaml_str("default_timeout_ms: [1, 2]").unwrap_err();
            assert!(matches!(err, ProbeError::Yaml(_)));
        }

        #[test]
        fn test_load_from_file() {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            writeln!(file, "default_timeout_ms: 3000\nfail_fast: true").unwrap();
            let config = HarnessConfig::load(file.path()).unwrap();
            assert_eq!(config.default_timeout_ms, 3_000);
            assert!(config.fail_fast);
        }

        #[test]
        fn test_load_missing_file() {
            let dir = tempfile::tempdir().unwrap();
            let err = HarnessConfig::load(&dir.path().join("nope.yaml")).unwrap_err();
            assert!(matches!(err, ProbeError::Io(_)));
        }
    }

    mod validation_tests {
        use super::*;

        #[test]
        fn test_rejects_bad_base_url() {
            let config = HarnessConfig::default().with_base_url("not a url");
            assert!(config.validate().is_err());
            let config = HarnessConfig::default().with_base_url("ftp://host");
            assert!(config.validate().is_err());
        }

        #[test]
        fn test_rejects_poll_not_below_timeout() {
            let config = HarnessConfig::default()
                .with_default_timeout_ms(100)
                .with_poll_interval_ms(100);
            assert!(config.validate().is_err());
        }

        #[test]
        fn test_rejects_zero_bounded_hold() {
            let config = HarnessConfig::default().with_hold(HoldMode::Bounded { secs: 0 });
            assert!(config.validate().is_err());
        }

        #[test]
        fn test_rejects_bad_email() {
            let config = HarnessConfig::default().with_credentials(Credentials {
                email: "nobody".into(),
                ..Credentials::default()
            });
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("not an email"));
        }
    }
}

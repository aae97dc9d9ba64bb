//! Session controller: one browser session per suite.

use std::time::Duration;

use tracing::{debug, info, warn};
use url::Url;

use crate::config::{HarnessConfig, HoldMode};
use crate::driver::BrowserDriver;
use crate::error::{ProbeError, ProbeResult};
use crate::flows::FlowResult;
use crate::wait::{WaitOptions, DEFAULT_POLL_INTERVAL_MS};

/// How often a diagnostic hold reports that it is still holding
pub const HOLD_LOG_INTERVAL_SECS: u64 = 10;

/// An open browser session bound to an application base URL
#[derive(Debug)]
pub struct Session {
    driver: Box<dyn BrowserDriver>,
    base_url: Url,
    wait: WaitOptions,
}

impl Session {
    /// Open a session over `driver`.
    ///
    /// `base_url` must be an absolute http(s) URL.
    pub fn open(
        driver: impl BrowserDriver + 'static,
        base_url: &str,
        default_timeout_ms: u64,
    ) -> ProbeResult<Self> {
        let base_url = parse_base_url(base_url)?;
        Ok(Self {
            driver: Box::new(driver),
            base_url,
            wait: WaitOptions::new()
                .with_timeout(default_timeout_ms)
                .with_poll_interval(DEFAULT_POLL_INTERVAL_MS),
        })
    }

    /// Open a session using the timeouts from `config`
    pub fn from_config(
        driver: impl BrowserDriver + 'static,
        config: &HarnessConfig,
    ) -> ProbeResult<Self> {
        let mut session = Self::open(driver, &config.base_url, config.default_timeout_ms)?;
        session.wait = session.wait.with_poll_interval(config.poll_interval_ms);
        Ok(session)
    }

    /// Underlying driver
    #[must_use]
    pub fn driver(&self) -> &dyn BrowserDriver {
        self.driver.as_ref()
    }

    /// Application base URL
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Default wait budget and poll interval
    #[must_use]
    pub const fn wait_options(&self) -> &WaitOptions {
        &self.wait
    }

    /// Absolute URL for an application path. Absolute URLs pass through.
    pub fn url_for(&self, path: &str) -> ProbeResult<String> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(path.to_string());
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        let joined = format!("{base}/{}", path.trim_start_matches('/'));
        Url::parse(&joined)
            .map(String::from)
            .map_err(|e| ProbeError::Navigation {
                url: joined,
                message: e.to_string(),
            })
    }

    /// Load `path`. Always re-issues the navigation, even to the current URL.
    pub async fn navigate(&self, path: &str) -> ProbeResult<()> {
        let url = self.url_for(path)?;
        debug!(url = %url, "navigate");
        self.driver.navigate(&url).await
    }

    /// Current URL as reported by the browser
    pub async fn current_url(&self) -> ProbeResult<String> {
        self.driver.current_url().await
    }

    /// Maximize the browser window
    pub async fn maximize_window(&self) -> ProbeResult<()> {
        self.driver.maximize_window().await
    }

    /// Evaluate a script in the page
    pub async fn evaluate(&self, script: &str) -> ProbeResult<serde_json::Value> {
        self.driver.evaluate(script).await
    }

    /// PNG screenshot of the current page
    pub async fn screenshot(&self) -> ProbeResult<Vec<u8>> {
        self.driver.screenshot().await
    }

    /// Release the browser.
    pub async fn close(self) -> ProbeResult<()> {
        info!("closing browser session");
        self.driver.close().await
    }

    /// Keep the browser open for manual inspection after `failed`.
    ///
    /// [`HoldMode::Off`] closes right away, [`HoldMode::Bounded`] closes once
    /// the hold expires and [`HoldMode::Indefinite`] never returns.
    pub async fn hold(self, mode: HoldMode, failed: &FlowResult) -> ProbeResult<()> {
        match mode {
            HoldMode::Off => self.close().await,
            HoldMode::Bounded { secs } => {
                warn!(
                    flow = %failed.flow,
                    url = failed.last_url.as_deref().unwrap_or("unknown"),
                    hold_secs = secs,
                    "keeping browser open for inspection"
                );
                let mut remaining = secs;
                while remaining > 0 {
                    let chunk = remaining.min(HOLD_LOG_INTERVAL_SECS);
                    tokio::time::sleep(Duration::from_secs(chunk)).await;
                    remaining -= chunk;
                    if remaining > 0 {
                        info!(flow = %failed.flow, remaining_secs = remaining, "holding browser");
                    }
                }
                self.close().await
            }
            HoldMode::Indefinite => {
                warn!(
                    flow = %failed.flow,
                    url = failed.last_url.as_deref().unwrap_or("unknown"),
                    "keeping browser open until interrupted"
                );
                loop {
                    tokio::time::sleep(Duration::from_secs(HOLD_LOG_INTERVAL_SECS)).await;
                    info!(flow = %failed.flow, "holding browser");
                }
            }
        }
    }
}

fn parse_base_url(raw: &str) -> ProbeResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| ProbeError::invalid_config(format!("base url `{raw}`: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ProbeError::invalid_config(format!(
            "base url `{raw}` must use http or https, not {other}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::locator::{locate_one, Selector};
    use crate::mock::{MockApp, MockDriver, MockElement, MockPage};
    use tokio::time::Instant;

    fn app() -> MockApp {
        MockApp::new()
            .page(MockPage::new("/login").element(MockElement::new("h1").text("Login")))
            .page(MockPage::new("/feed"))
    }

    fn open() -> (Session, MockDriver) {
        let driver = MockDriver::new(app());
        let session = Session::open(driver.clone(), "http://localhost:3000", 15_000).unwrap();
        (session, driver)
    }

    mod open_tests {
        use super::*;

        #[test]
        fn test_rejects_relative_base() {
            let err = Session::open(MockDriver::new(app()), "localhost:3000/", 100).unwrap_err();
            assert!(matches!(err, ProbeError::InvalidConfig { .. }));
        }

        #[test]
        fn test_rejects_non_http_scheme() {
            let err = Session::open(MockDriver::new(app()), "file:///tmp", 100).unwrap_err();
            assert!(err.to_string().contains("http or https"));
        }

        #[test]
        fn test_from_config_uses_poll_interval() {
            let config = HarnessConfig::default()
                .with_default_timeout_ms(2_000)
                .with_poll_interval_ms(50);
            let session = Session::from_config(MockDriver::new(app()), &config).unwrap();
            assert_eq!(session.wait_options().timeout_ms, 2_000);
            assert_eq!(session.wait_options().poll_interval_ms, 50);
        }
    }

    mod url_tests {
        use super::*;

        #[test]
        fn test_url_for_joins_paths() {
            let (session, _) = open();
            assert_eq!(session.url_for("/login").unwrap(), "http://localhost:3000/login");
            assert_eq!(session.url_for("login").unwrap(), "http://localhost:3000/login");
            assert_eq!(
                session.url_for("/profile/nishok").unwrap(),
                "http://localhost:3000/profile/nishok"
            );
        }

        #[test]
        fn test_url_for_passes_absolute_through() {
            let (session, _) = open();
            assert_eq!(
                session.url_for("https://example.com/x").unwrap(),
                "https://example.com/x"
            );
        }

        #[test]
        fn test_url_for_keeps_base_prefix() {
            let session =
                Session::open(MockDriver::new(app()), "http://host:8080/app/", 100).unwrap();
            assert_eq!(session.url_for("/login").unwrap(), "http://host:8080/app/login");
        }
    }

    mod navigation_tests {
        use super::*;

        #[tokio::test]
        async fn test_navigate_twice_reissues_and_invalidates_handles() {
            let (session, driver) = open();
            session.navigate("/login").await.unwrap();
            let heading = locate_one(&session, &Selector::css("h1"), None).await.unwrap();

            session.navigate("/login").await.unwrap();
            assert_eq!(session.current_url().await.unwrap(), "http://localhost:3000/login");
            assert_eq!(driver.navigations().len(), 2);

            let err = session.driver().click(&heading).await.unwrap_err();
            assert!(matches!(err, ProbeError::StaleHandle { .. }));

            let fresh = locate_one(&session, &Selector::css("h1"), None).await.unwrap();
            assert!(fresh.generation() > heading.generation());
            assert!(session.driver().click(&fresh).await.is_ok());
        }

        #[tokio::test]
        async fn test_close_consumes_session() {
            let (session, driver) = open();
            session.close().await.unwrap();
            assert!(driver.is_closed());
        }
    }

    mod hold_tests {
        use super::*;

        fn failed() -> FlowResult {
            FlowResult::failed("login", "AwaitingDialog", None, "boom")
        }

        #[tokio::test(start_paused = true)]
        async fn test_hold_off_closes_immediately() {
            let (session, driver) = open();
            let start = Instant::now();
            session.hold(HoldMode::Off, &failed()).await.unwrap();
            assert_eq!(start.elapsed(), Duration::ZERO);
            assert!(driver.is_closed());
        }

        #[tokio::test(start_paused = true)]
        async fn test_bounded_hold_closes_after_budget() {
            let (session, driver) = open();
            let start = Instant::now();
            session
                .hold(HoldMode::Bounded { secs: 25 }, &failed())
                .await
                .unwrap();
            assert_eq!(start.elapsed(), Duration::from_secs(25));
            assert!(driver.is_closed());
        }

        #[tokio::test(start_paused = true)]
        async fn test_indefinite_hold_never_returns() {
            let (session, driver) = open();
            let failed = failed();
            let held = tokio::time::timeout(
                Duration::from_secs(3_600),
                session.hold(HoldMode::Indefinite, &failed),
            )
            .await;
            assert!(held.is_err());
            assert!(!driver.is_closed());
        }
    }
}

//! Suite runner: drives flows over one session and dumps diagnostics.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::{HarnessConfig, HoldMode};
use crate::error::ProbeResult;
use crate::flows::{Flow, FlowResult};
use crate::session::Session;

/// Results from running a suite of flows
#[derive(Debug, Clone)]
pub struct SuiteResults {
    /// Individual flow results, in run order
    pub results: Vec<FlowResult>,
    /// Total duration
    pub duration: Duration,
}

impl SuiteResults {
    /// Check if all flows passed
    #[must_use]
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    /// Count passed flows
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }

    /// Count failed flows
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.passed).count()
    }

    /// Number of flows that ran
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Failed flows
    #[must_use]
    pub fn failures(&self) -> Vec<&FlowResult> {
        self.results.iter().filter(|r| !r.passed).collect()
    }
}

/// Runs flows sequentially over one session
#[derive(Debug, Clone)]
pub struct FlowRunner {
    /// Stop after the first failing flow
    pub fail_fast: bool,
    /// What to do with the browser after a failure
    pub hold: HoldMode,
    /// Where failure dumps go
    pub output_dir: PathBuf,
}

impl Default for FlowRunner {
    fn default() -> Self {
        Self {
            fail_fast: false,
            hold: HoldMode::Off,
            output_dir: PathBuf::from("target/flowprobe"),
        }
    }
}

impl FlowRunner {
    /// Create a runner with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runner configured from `config`
    #[must_use]
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            fail_fast: config.fail_fast,
            hold: config.hold,
            output_dir: config.output_dir.clone(),
        }
    }

    /// Enable fail-fast mode
    #[must_use]
    pub const fn with_fail_fast(mut self) -> Self {
        self.fail_fast = true;
        self
    }

    /// Set the hold mode
    #[must_use]
    pub const fn with_hold(mut self, hold: HoldMode) -> Self {
        self.hold = hold;
        self
    }

    /// Set the dump directory
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Run `flows` in order, then release the session.
    ///
    /// A failing flow gets a JSON dump (and a screenshot when the page is
    /// not blocked by a dialog). With a hold mode other than off, the first
    /// failure hands the session to [`Session::hold`] and the suite stops.
    pub async fn run(&self, session: Session, flows: &[Box<dyn Flow>]) -> ProbeResult<SuiteResults> {
        let start = Instant::now();
        let mut results = Vec::with_capacity(flows.len());

        for flow in flows {
            let result = flow.run(&session).await;
            if result.passed {
                results.push(result);
                continue;
            }

            self.dump_failure(&session, &result).await;
            if self.hold != HoldMode::Off {
                session.hold(self.hold, &result).await?;
                results.push(result);
                return Ok(SuiteResults {
                    results,
                    duration: start.elapsed(),
                });
            }
            results.push(result);
            if self.fail_fast {
                info!("fail-fast: skipping remaining flows");
                break;
            }
        }

        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close browser session");
        }
        let suite = SuiteResults {
            results,
            duration: start.elapsed(),
        };
        info!(
            passed = suite.passed_count(),
            failed = suite.failed_count(),
            "suite finished"
        );
        Ok(suite)
    }

    /// Best effort: a dump that cannot be written is logged, never raised.
    async fn dump_failure(&self, session: &Session, result: &FlowResult) {
        if let Err(e) = fs::create_dir_all(&self.output_dir).await {
            warn!(dir = %self.output_dir.display(), error = %e, "cannot create dump directory");
            return;
        }
        let stem = format!("{}-{}", result.flow, result.run_id);

        match write_json(&self.output_dir.join(format!("{stem}.json")), result).await {
            Ok(path) => info!(flow = %result.flow, path = %path.display(), "failure dump written"),
            Err(e) => warn!(flow = %result.flow, error = %e, "failed to write failure dump"),
        }

        match session.driver().pending_dialog().await {
            Ok(None) => {}
            Ok(Some(dialog)) => {
                info!(kind = %dialog.dialog_type(), "dialog pending, skipping screenshot");
                return;
            }
            Err(e) => {
                warn!(error = %e, "cannot query dialog state, skipping screenshot");
                return;
            }
        }
        let shot = self.output_dir.join(format!("{stem}.png"));
        match session.screenshot().await {
            Ok(png) => match fs::write(&shot, png).await {
                Ok(()) => info!(path = %shot.display(), "screenshot written"),
                Err(e) => warn!(error = %e, "failed to write screenshot"),
            },
            Err(e) => warn!(error = %e, "failed to capture screenshot"),
        }
    }
}

async fn write_json(path: &Path, result: &FlowResult) -> ProbeResult<PathBuf> {
    fs::write(path, result.to_json()?).await?;
    Ok(path.to_path_buf())
}

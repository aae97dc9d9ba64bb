//! Flowprobe: browser-driven end-to-end checks for a web application
//!
//! Drives a real (or scripted) browser through the application's signup,
//! login and profile-view journeys. Every step goes through one polling wait
//! engine, native dialogs are handled explicitly, and a failing flow leaves a
//! diagnostic dump behind (optionally holding the browser open).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    FLOWPROBE Architecture                       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Flows      │    │ Wait       │    │ Browser    │            │
//! │   │ (signup,   │───►│ engine +   │───►│ Driver     │            │
//! │   │ login, …)  │    │ conditions │    │ (CDP/mock) │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! │         │                                    ▲                  │
//! │         ▼                                    │                  │
//! │   ┌────────────┐    ┌────────────┐           │                  │
//! │   │ FlowRunner │───►│ Session    │───────────┘                  │
//! │   │ + dumps    │    │ + hold     │                              │
//! │   └────────────┘    └────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::large_stack_frames))]

#[cfg(feature = "browser")]
mod browser;
mod condition;
mod config;
mod driver;
mod error;
mod fixture;
mod harness;
mod locator;
mod session;

/// Native dialog handling
pub mod dialog;

/// Flow scripts for the application's user journeys
pub mod flows;

/// Scripted in-memory browser
#[allow(clippy::missing_errors_doc, clippy::must_use_candidate)]
pub mod mock;

/// Wait/poll engine
pub mod wait;

#[cfg(feature = "browser")]
pub use browser::ChromiumDriver;
pub use condition::{
    AnyOf, BoxedCondition, CheckFuture, Condition, DialogPresent, ElementClickable,
    ElementCountAtLeast, ElementPresent, FnCondition, Outcome, UrlContains,
};
pub use config::{
    BrowserOptions, Credentials, HarnessConfig, HoldMode, DEFAULT_BASE_URL,
    DEFAULT_DIALOG_TIMEOUT_MS,
};
pub use dialog::{Dialog, DialogAction, DialogHandler, DialogPolicy, DialogType};
pub use driver::{BrowserDriver, ElementHandle};
pub use error::{ProbeError, ProbeResult};
pub use fixture::{FixtureGenerator, SignupData};
pub use flows::{
    Flow, FlowContext, FlowResult, LoginFlow, LoginState, ProfileFlow, ProfileState, SignupFlow,
    SignupState, StepRecord,
};
pub use harness::{FlowRunner, SuiteResults};
pub use locator::{locate, locate_one, Located, Selector};
pub use session::{Session, HOLD_LOG_INTERVAL_SECS};
pub use wait::{wait_until, WaitOptions, Waiter, DEFAULT_POLL_INTERVAL_MS, DEFAULT_WAIT_TIMEOUT_MS};

/// Prelude for convenient imports
pub mod prelude {
    #[cfg(feature = "browser")]
    pub use super::browser::*;
    pub use super::condition::*;
    pub use super::config::*;
    pub use super::dialog::*;
    pub use super::driver::*;
    pub use super::error::*;
    pub use super::fixture::*;
    pub use super::flows::*;
    pub use super::harness::*;
    pub use super::locator::*;
    pub use super::session::*;
    pub use super::wait::*;
}

//! pagecheck browser acceptance harness
//!
//! This crate drives a browser through the reference application's page
//! workflows and records what happened as an Allure-compatible report:
//! - Reacts to runner lifecycle events (run, scenario, step)
//! - Owns one lazily launched browser session per scenario
//! - Records steps, screenshots and text attachments per scenario
//! - Retries waits that trip over stale DOM references
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Scenario runner (events)                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  LifecycleCoordinator                                       │
//! │    ├── SessionRegistry<F: DriverFactory> -> Session         │
//! │    │     └── RetryingWait (stale-element retry)             │
//! │    ├── EvidenceRecorder                                     │
//! │    │     ├── start_step / end_step / take_steps             │
//! │    │     └── capture_screenshot / attach_text               │
//! │    └── ReportStore                                          │
//! │          ├── <uuid>-result.json                             │
//! │          ├── <uuid>-attachment.{png,txt}                    │
//! │          └── environment.properties                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BrowserDriver                                              │
//! │    ├── WebDriverClient (W3C over HTTP)                      │
//! │    └── testing::MockDriver (in memory)                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod driver;
pub mod error;
pub mod events;
pub mod evidence;
pub mod lifecycle;
pub mod report;
pub mod session;
pub mod testing;
pub mod wait;
pub mod webdriver;
pub mod workflows;

pub use driver::{BrowserDriver, DriverFactory, ElementRef, LaunchOptions, Locator};
pub use error::{E2eError, E2eResult};
pub use events::{RunnerResult, RunnerStatus, ScenarioContext, StepContext};
pub use evidence::{CaptureOutcome, EvidenceRecorder, StepHandle};
pub use lifecycle::{LifecycleCoordinator, Phase};
pub use report::ReportStore;
pub use session::{Session, SessionRegistry};
pub use wait::{RetryPolicy, RetryingWait};
pub use webdriver::{WebDriverClient, WebDriverFactory};

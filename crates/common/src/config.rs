//! Harness configuration and environment resolution

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::{Error, Result};

/// Variables consulted for the browser variant, first non-empty wins
pub const BROWSER_VARS: [&str; 2] = ["BROWSER", "BROWSER_TYPE"];

/// Variables consulted for the environment tag, first non-empty wins
pub const ENVIRONMENT_VARS: [&str; 2] = ["ENV", "ENVIRONMENT"];

pub const RESULTS_DIR_VAR: &str = "PAGECHECK_RESULTS_DIR";
pub const WEBDRIVER_URL_VAR: &str = "PAGECHECK_WEBDRIVER_URL";
pub const HEADLESS_VAR: &str = "PAGECHECK_HEADLESS";

/// Base URL of the reference application, shared by every environment
const REFERENCE_APP_URL: &str = "https://the-internet.herokuapp.com";

/// Browser variant driven by the harness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BrowserKind {
    #[default]
    Chrome,
    Firefox,
    Edge,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chrome => "CHROME",
            BrowserKind::Firefox => "FIREFOX",
            BrowserKind::Edge => "EDGE",
        }
    }

    /// Case-insensitive parse; unrecognized names fall back to Chrome
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "FIREFOX" => BrowserKind::Firefox,
            "EDGE" => BrowserKind::Edge,
            "CHROME" => BrowserKind::Chrome,
            other => {
                debug!("Unrecognized browser '{}', using CHROME", other);
                BrowserKind::Chrome
            }
        }
    }
}

impl fmt::Display for BrowserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for BrowserKind {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl From<BrowserKind> for String {
    fn from(value: BrowserKind) -> Self {
        value.as_str().to_string()
    }
}

/// Deployment environment the suite runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EnvironmentTag {
    Dev,
    #[default]
    Qa,
    Prod,
}

impl EnvironmentTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentTag::Dev => "DEV",
            EnvironmentTag::Qa => "QA",
            EnvironmentTag::Prod => "PROD",
        }
    }

    /// Case-insensitive parse; unrecognized tags fall back to QA
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "DEV" => EnvironmentTag::Dev,
            "PROD" => EnvironmentTag::Prod,
            "QA" => EnvironmentTag::Qa,
            other => {
                debug!("Unrecognized environment '{}', using QA", other);
                EnvironmentTag::Qa
            }
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            EnvironmentTag::Dev | EnvironmentTag::Qa | EnvironmentTag::Prod => REFERENCE_APP_URL,
        }
    }
}

impl fmt::Display for EnvironmentTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for EnvironmentTag {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl From<EnvironmentTag> for String {
    fn from(value: EnvironmentTag) -> Self {
        value.as_str().to_string()
    }
}

/// First non-empty value among `names`
fn first_non_empty<F>(lookup: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .iter()
        .filter_map(|name| lookup(*name))
        .find(|value| !value.trim().is_empty())
}

/// Resolve the browser variant from `BROWSER` / `BROWSER_TYPE`
pub fn resolve_browser<F>(lookup: F) -> BrowserKind
where
    F: Fn(&str) -> Option<String>,
{
    first_non_empty(&lookup, &BROWSER_VARS)
        .map(|value| BrowserKind::parse_lenient(&value))
        .unwrap_or_default()
}

/// Resolve the environment tag from `ENV` / `ENVIRONMENT`
pub fn resolve_environment<F>(lookup: F) -> EnvironmentTag
where
    F: Fn(&str) -> Option<String>,
{
    first_non_empty(&lookup, &ENVIRONMENT_VARS)
        .map(|value| EnvironmentTag::parse_lenient(&value))
        .unwrap_or_default()
}

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Browser variant to launch
    pub browser: BrowserKind,

    /// Environment tag; selects the base URL
    pub environment: EnvironmentTag,

    /// Directory receiving result files and attachments
    pub results_dir: PathBuf,

    /// WebDriver server endpoint
    pub webdriver_url: String,

    /// Launch the browser without a visible window
    pub headless: bool,

    /// Default timeout for element waits
    pub element_timeout_ms: u64,

    /// Upper bound for a single step
    pub step_timeout_ms: u64,

    /// Total attempts for a wait that keeps hitting stale elements
    pub stale_retry_attempts: u32,

    /// Pause between stale-element attempts
    pub stale_retry_backoff_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            browser: BrowserKind::default(),
            environment: EnvironmentTag::default(),
            results_dir: PathBuf::from("allure-results"),
            webdriver_url: "http://127.0.0.1:4444".to_string(),
            headless: false,
            element_timeout_ms: 20_000,
            step_timeout_ms: 60_000,
            stale_retry_attempts: 3,
            stale_retry_backoff_ms: 500,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values the harness cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.webdriver_url.trim().is_empty() {
            return Err(Error::InvalidConfig("webdriver_url is empty".to_string()));
        }
        if self.element_timeout_ms == 0 || self.step_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "element and step timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Self {
        Self::default().apply_env(|name| std::env::var(name).ok())
    }

    /// Override fields from an environment lookup
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if first_non_empty(&lookup, &BROWSER_VARS).is_some() {
            self.browser = resolve_browser(&lookup);
        }
        if first_non_empty(&lookup, &ENVIRONMENT_VARS).is_some() {
            self.environment = resolve_environment(&lookup);
        }
        if let Some(dir) = first_non_empty(&lookup, &[RESULTS_DIR_VAR]) {
            self.results_dir = PathBuf::from(dir);
        }
        if let Some(url) = first_non_empty(&lookup, &[WEBDRIVER_URL_VAR]) {
            self.webdriver_url = url.trim_end_matches('/').to_string();
        }
        if let Some(flag) = first_non_empty(&lookup, &[HEADLESS_VAR]) {
            self.headless = matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            );
        }
        self
    }

    pub fn base_url(&self) -> &'static str {
        self.environment.base_url()
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }
}

//! Poll-until-condition waits with bounded retry on stale elements
//!
//! A DOM reference can be invalidated by a re-render between lookup and use.
//! [`RetryingWait::until`] reruns the whole wait when that happens, a fixed
//! number of times, and lets every other failure through untouched.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pagecheck_common::HarnessConfig;
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::driver::{BrowserDriver, ElementRef, Locator};
use crate::error::{E2eError, E2eResult};

/// Retry and polling policy for [`RetryingWait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    /// Pause between stale-element attempts
    pub backoff: Duration,
    /// Pause between condition evaluations within one attempt
    pub poll_interval: Duration,
    /// Deadline for one attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(500),
            poll_interval: Duration::from_millis(200),
            timeout: Duration::from_secs(20),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &HarnessConfig) -> Self {
        Self {
            attempts: config.stale_retry_attempts,
            backoff: Duration::from_millis(config.stale_retry_backoff_ms),
            timeout: config.element_timeout(),
            ..Default::default()
        }
    }
}

/// Turn "element not found" into "not yet"
fn absent_as_none<T>(result: E2eResult<T>) -> E2eResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(E2eError::ElementNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Wait helper bound to one browser handle
#[derive(Clone)]
pub struct RetryingWait {
    driver: Arc<dyn BrowserDriver>,
    policy: RetryPolicy,
}

impl RetryingWait {
    pub fn new(driver: Arc<dyn BrowserDriver>, policy: RetryPolicy) -> Self {
        Self { driver, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.policy.timeout = timeout;
        self
    }

    /// Poll `condition` until it yields a value, retrying the wait on stale elements
    pub async fn until<T, F, Fut>(&self, what: &str, mut condition: F) -> E2eResult<T>
    where
        F: FnMut(Arc<dyn BrowserDriver>) -> Fut,
        Fut: Future<Output = E2eResult<Option<T>>>,
    {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;

        loop {
            match self.poll(what, &mut condition).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_stale() && attempt < attempts => {
                    warn!(
                        "Stale element while waiting for {} (attempt {}/{}), retrying",
                        what, attempt, attempts
                    );
                    sleep(self.policy.backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One bounded poll loop; condition errors end it immediately
    async fn poll<T, F, Fut>(&self, what: &str, condition: &mut F) -> E2eResult<T>
    where
        F: FnMut(Arc<dyn BrowserDriver>) -> Fut,
        Fut: Future<Output = E2eResult<Option<T>>>,
    {
        let interval = self.policy.poll_interval;
        let polled = timeout(self.policy.timeout, async {
            loop {
                if let Some(value) = condition(self.driver.clone()).await? {
                    return Ok(value);
                }
                sleep(interval).await;
            }
        })
        .await;

        match polled {
            Ok(result) => result,
            Err(_) => {
                debug!("Wait for {} timed out", what);
                Err(E2eError::Timeout {
                    what: what.to_string(),
                    after: self.policy.timeout,
                })
            }
        }
    }

    /// Wait until an element matching `locator` is present
    pub async fn element_located(&self, locator: &Locator) -> E2eResult<ElementRef> {
        let what = format!("element {}", locator);
        self.until(&what, |driver| {
            let locator = locator.clone();
            async move { absent_as_none(driver.find_element(&locator).await) }
        })
        .await
    }

    /// Wait until an element matching `locator` is present and displayed
    pub async fn element_visible(&self, locator: &Locator) -> E2eResult<ElementRef> {
        let what = format!("visible {}", locator);
        self.until(&what, |driver| {
            let locator = locator.clone();
            async move {
                let Some(element) = absent_as_none(driver.find_element(&locator).await)? else {
                    return Ok(None);
                };
                let shown = absent_as_none(driver.is_displayed(&element).await)?.unwrap_or(false);
                Ok(shown.then_some(element))
            }
        })
        .await
    }

    /// Wait until an element matching `locator` is displayed and enabled
    pub async fn element_clickable(&self, locator: &Locator) -> E2eResult<ElementRef> {
        let what = format!("clickable {}", locator);
        self.until(&what, |driver| {
            let locator = locator.clone();
            async move {
                let Some(element) = absent_as_none(driver.find_element(&locator).await)? else {
                    return Ok(None);
                };
                Self::ready(driver.as_ref(), &element).await
            }
        })
        .await
    }

    async fn ready(driver: &dyn BrowserDriver, element: &ElementRef) -> E2eResult<Option<ElementRef>> {
        let shown = absent_as_none(driver.is_displayed(element).await)?.unwrap_or(false);
        if !shown {
            return Ok(None);
        }
        if !absent_as_none(driver.is_enabled(element).await)?.unwrap_or(false) {
            return Ok(None);
        }
        Ok(Some(element.clone()))
    }

    /// Wait until `script` returns a truthy value
    pub async fn script_truthy(&self, script: &str) -> E2eResult<Value> {
        self.until(script, |driver| {
            let script = script.to_string();
            async move {
                let value = driver.execute_script(&script, Vec::new()).await?;
                let truthy = match &value {
                    Value::Null => false,
                    Value::Bool(b) => *b,
                    Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
                    Value::String(s) => !s.is_empty(),
                    Value::Array(_) | Value::Object(_) => true,
                };
                Ok(truthy.then_some(value))
            }
        })
        .await
    }

    /// Wait until switching into `frame` succeeds
    pub async fn frame_entered(&self, frame: &ElementRef) -> E2eResult<()> {
        let what = format!("frame {}", frame.id);
        self.until(&what, |driver| {
            let frame = frame.clone();
            async move {
                match driver.switch_to_frame(Some(&frame)).await {
                    Ok(()) => Ok(Some(())),
                    Err(e) if e.is_stale() => Err(e),
                    Err(e) => {
                        debug!("Frame not ready yet: {}", e);
                        Ok(None)
                    }
                }
            }
        })
        .await
    }
}

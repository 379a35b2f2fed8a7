//! Interaction helpers shared by every page

use std::sync::Arc;

use tracing::debug;

use crate::driver::{BrowserDriver, ElementRef, Locator};
use crate::error::E2eResult;
use crate::session::Session;
use crate::wait::RetryingWait;

/// A browser handle positioned on the reference application
#[derive(Clone)]
pub struct Page {
    driver: Arc<dyn BrowserDriver>,
    wait: RetryingWait,
    base_url: String,
}

impl Page {
    pub fn new(driver: Arc<dyn BrowserDriver>, wait: RetryingWait, base_url: impl Into<String>) -> Self {
        Self {
            driver,
            wait,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn for_session(session: &Session, base_url: impl Into<String>) -> Self {
        Self::new(session.driver().clone(), session.wait(), base_url)
    }

    pub fn driver(&self) -> &dyn BrowserDriver {
        self.driver.as_ref()
    }

    pub fn wait(&self) -> &RetryingWait {
        &self.wait
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Navigate to `path` under the base URL
    pub async fn open(&self, path: &str) -> E2eResult<()> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Opening {}", url);
        self.driver.goto(&url).await
    }

    /// Locate, wait until clickable, click. Suits elements that may not be
    /// in the DOM yet, such as banners.
    pub async fn click_when_clickable(&self, locator: &Locator) -> E2eResult<ElementRef> {
        let element = self.wait.element_clickable(locator).await?;
        self.driver.click(&element).await?;
        Ok(element)
    }

    pub async fn enter_frame(&self, frame: &ElementRef) -> E2eResult<()> {
        self.wait.frame_entered(frame).await
    }

    /// Back to the top-level document
    pub async fn default_content(&self) -> E2eResult<()> {
        self.driver.switch_to_frame(None).await
    }
}

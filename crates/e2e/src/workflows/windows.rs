//! Multiple windows page

use tracing::{debug, info};

use crate::driver::{ElementRef, Locator};
use crate::error::E2eResult;
use crate::workflows::page::Page;

pub const PATH: &str = "/windows";

fn click_here_link() -> Locator {
    Locator::xpath("//a[text()='Click Here']")
}

fn new_window_heading() -> Locator {
    Locator::xpath("//h3[text()='New Window']")
}

pub struct WindowsPage {
    page: Page,
    heading: Option<String>,
}

impl WindowsPage {
    pub fn new(page: Page) -> Self {
        Self { page, heading: None }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub async fn navigate(&self) -> E2eResult<()> {
        self.page.open(PATH).await
    }

    /// Click "Click Here"; returns the link for highlighting
    pub async fn open_new_window(&self) -> E2eResult<ElementRef> {
        self.page.click_when_clickable(&click_here_link()).await
    }

    /// Move to the first other window and close the one we came from.
    /// Returns the handle now in use.
    pub async fn switch_to_new_closing_original(&self) -> E2eResult<String> {
        let driver = self.page.driver();
        let original = driver.window_handle().await?;

        let target = self
            .page
            .wait()
            .until("a second window", |driver| {
                let original = original.clone();
                async move {
                    let handles = driver.window_handles().await?;
                    Ok(handles.into_iter().find(|h| *h != original))
                }
            })
            .await?;

        driver.switch_to_window(&original).await?;
        driver.close_window().await?;
        driver.switch_to_window(&target).await?;
        info!("Switched to window {} and closed {}", target, original);
        Ok(target)
    }

    /// Read and remember the "New Window" heading
    pub async fn read_heading(&mut self) -> E2eResult<(ElementRef, String)> {
        let element = self.page.wait().element_visible(&new_window_heading()).await?;
        let text = self.page.driver().text(&element).await?;
        debug!("New window heading: {}", text);
        self.heading = Some(text.clone());
        Ok((element, text))
    }

    pub fn heading(&self) -> Option<&str> {
        self.heading.as_deref()
    }
}

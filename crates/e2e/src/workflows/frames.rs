//! Nested frames page: collect the text of every leaf frame

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, info};

use crate::driver::{BrowserDriver, ElementRef, Locator};
use crate::error::E2eResult;
use crate::workflows::page::Page;

pub const PATH: &str = "/nested_frames";

type Visit<'a> = Pin<Box<dyn Future<Output = E2eResult<()>> + Send + 'a>>;

/// `frame` then `iframe` children of the current browsing context
async fn child_frames(driver: &dyn BrowserDriver) -> E2eResult<Vec<ElementRef>> {
    let mut frames = driver.find_elements(&Locator::tag("frame")).await?;
    frames.extend(driver.find_elements(&Locator::tag("iframe")).await?);
    Ok(frames)
}

async fn frame_name(driver: &dyn BrowserDriver, frame: &ElementRef, index: usize) -> String {
    match driver.attribute(frame, "name").await {
        Ok(Some(name)) if !name.is_empty() => name,
        _ => format!("frame-{}", index),
    }
}

/// Depth-first walk from the current context. Leaf bodies contribute their
/// trimmed text; a frame that cannot be entered or read is skipped.
fn visit<'a>(driver: &'a dyn BrowserDriver, path: String, texts: &'a mut Vec<String>) -> Visit<'a> {
    Box::pin(async move {
        let frames = child_frames(driver).await?;

        if frames.is_empty() {
            let body = driver.find_element(&Locator::tag("body")).await?;
            let text = driver.text(&body).await?;
            let text = text.trim();
            if !text.is_empty() && !texts.iter().any(|t| t == text) {
                debug!("Frame text at {}: {}", path, text);
                texts.push(text.to_string());
            }
            return Ok(());
        }

        for (index, frame) in frames.iter().enumerate() {
            let name = frame_name(driver, frame, index).await;
            let child = format!("{} -> {}", path, name);

            let entered = driver.switch_to_frame_index(index).await;
            match entered {
                Ok(()) => {
                    if let Err(e) = visit(driver, child.clone(), texts).await {
                        debug!("Skipping frame {}: {}", child, e);
                    }
                }
                Err(e) => debug!("Cannot enter frame {}: {}", child, e),
            }

            if driver.switch_to_parent_frame().await.is_err() {
                driver.switch_to_frame(None).await?;
            }
        }
        Ok(())
    })
}

pub struct NestedFramesPage {
    page: Page,
    texts: Vec<String>,
}

impl NestedFramesPage {
    pub fn new(page: Page) -> Self {
        Self {
            page,
            texts: Vec::new(),
        }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Open the page and forget texts from any earlier visit
    pub async fn navigate(&mut self) -> E2eResult<()> {
        self.page.open(PATH).await?;
        self.texts.clear();
        Ok(())
    }

    /// Frames of the top-level document, for highlighting
    pub async fn top_level_frames(&self) -> E2eResult<Vec<ElementRef>> {
        self.page.default_content().await?;
        child_frames(self.page.driver()).await
    }

    /// Walk every frame and collect unique leaf texts in discovery order
    pub async fn collect_texts(&mut self) -> E2eResult<&[String]> {
        let driver = self.page.driver();
        driver.switch_to_frame(None).await?;

        if let Err(e) = visit(driver, "main".to_string(), &mut self.texts).await {
            debug!("Frame walk ended early: {}", e);
        }
        driver.switch_to_frame(None).await?;

        info!("Collected frame texts: {}", self.texts.join(", "));
        Ok(&self.texts)
    }

    pub fn texts(&self) -> &[String] {
        &self.texts
    }
}

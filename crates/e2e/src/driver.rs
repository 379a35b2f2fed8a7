//! Browser automation boundary
//!
//! The harness never speaks a browser protocol directly; it drives an
//! implementation of [`BrowserDriver`] obtained from a [`DriverFactory`].
//! [`crate::webdriver`] provides the W3C WebDriver implementation and
//! [`crate::testing`] an in-memory one.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use pagecheck_common::BrowserKind;
use serde_json::{json, Value};

use crate::error::E2eResult;

/// W3C web element identifier key
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// How to find an element on the page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Locator {
    Css(String),
    XPath(String),
    TagName(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Locator::XPath(expr.into())
    }

    pub fn tag(name: impl Into<String>) -> Self {
        Locator::TagName(name.into())
    }

    /// W3C location strategy and value
    pub fn strategy(&self) -> (&'static str, String) {
        match self {
            Locator::Css(s) => ("css selector", s.clone()),
            Locator::XPath(s) => ("xpath", s.clone()),
            Locator::TagName(s) => ("tag name", s.clone()),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css={}", s),
            Locator::XPath(s) => write!(f, "xpath={}", s),
            Locator::TagName(s) => write!(f, "tag={}", s),
        }
    }
}

/// Reference to an element located in the current browsing context
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub id: String,
}

impl ElementRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    /// JSON form accepted as a script argument or frame id
    pub fn to_json(&self) -> Value {
        json!({ ELEMENT_KEY: self.id })
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        value.get(ELEMENT_KEY)?.as_str().map(Self::new)
    }
}

/// Launch arguments for a browser variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub args: Vec<String>,
}

impl LaunchOptions {
    pub fn for_browser(browser: BrowserKind, headless: bool) -> Self {
        let mut args: Vec<String> = match browser {
            BrowserKind::Chrome => vec!["--start-maximized", "--incognito", "--remote-allow-origins=*"],
            BrowserKind::Firefox => vec!["-private"],
            BrowserKind::Edge => vec!["--start-maximized", "--inprivate"],
        }
        .into_iter()
        .map(String::from)
        .collect();

        if headless {
            args.push(match browser {
                BrowserKind::Firefox => "-headless".to_string(),
                BrowserKind::Chrome | BrowserKind::Edge => "--headless=new".to_string(),
            });
        }

        Self { args }
    }
}

/// A live browser automation handle
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn goto(&self, url: &str) -> E2eResult<()>;

    async fn find_element(&self, locator: &Locator) -> E2eResult<ElementRef>;

    async fn find_elements(&self, locator: &Locator) -> E2eResult<Vec<ElementRef>>;

    async fn click(&self, element: &ElementRef) -> E2eResult<()>;

    async fn is_displayed(&self, element: &ElementRef) -> E2eResult<bool>;

    async fn is_enabled(&self, element: &ElementRef) -> E2eResult<bool>;

    async fn text(&self, element: &ElementRef) -> E2eResult<String>;

    async fn attribute(&self, element: &ElementRef, name: &str) -> E2eResult<Option<String>>;

    /// Enter a frame, or return to the top-level document with `None`
    async fn switch_to_frame(&self, frame: Option<&ElementRef>) -> E2eResult<()>;

    async fn switch_to_frame_index(&self, index: usize) -> E2eResult<()>;

    async fn switch_to_parent_frame(&self) -> E2eResult<()>;

    async fn window_handle(&self) -> E2eResult<String>;

    async fn window_handles(&self) -> E2eResult<Vec<String>>;

    async fn switch_to_window(&self, handle: &str) -> E2eResult<()>;

    /// Close the current window
    async fn close_window(&self) -> E2eResult<()>;

    /// Run synchronous script in the page; element arguments use [`ElementRef::to_json`]
    async fn execute_script(&self, script: &str, args: Vec<Value>) -> E2eResult<Value>;

    /// Full-page capture as base64-encoded PNG
    async fn screenshot_base64(&self) -> E2eResult<String>;

    /// End the automation session
    async fn quit(&self) -> E2eResult<()>;
}

/// Creates browser handles on demand
#[async_trait]
pub trait DriverFactory: Send + Sync {
    async fn launch(
        &self,
        browser: BrowserKind,
        options: &LaunchOptions,
    ) -> E2eResult<Arc<dyn BrowserDriver>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_strategies() {
        assert_eq!(Locator::css("a.b").strategy(), ("css selector", "a.b".to_string()));
        assert_eq!(Locator::xpath("//h3").strategy().0, "xpath");
        assert_eq!(Locator::tag("iframe").strategy().0, "tag name");
        assert_eq!(Locator::xpath("//h3").to_string(), "xpath=//h3");
    }

    #[test]
    fn test_element_json() {
        let element = ElementRef::new("abc");
        let value = element.to_json();
        assert_eq!(value[ELEMENT_KEY], "abc");
        assert_eq!(ElementRef::from_json(&value), Some(element));
        assert_eq!(ElementRef::from_json(&json!({"other": 1})), None);
    }

    #[test]
    fn test_launch_options_per_browser() {
        let chrome = LaunchOptions::for_browser(BrowserKind::Chrome, false);
        assert!(chrome.args.contains(&"--incognito".to_string()));
        assert!(chrome.args.contains(&"--remote-allow-origins=*".to_string()));

        let firefox = LaunchOptions::for_browser(BrowserKind::Firefox, true);
        assert_eq!(firefox.args, vec!["-private", "-headless"]);

        let edge = LaunchOptions::for_browser(BrowserKind::Edge, false);
        assert_eq!(edge.args, vec!["--start-maximized", "--inprivate"]);
    }
}

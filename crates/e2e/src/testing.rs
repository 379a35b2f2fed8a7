//! In-memory browser driver for exercising the harness without a browser
//!
//! [`MockDriver`] keeps a tiny model of a page: elements per frame context,
//! element text/attributes/visibility, windows, canned script results and a
//! log of every call. [`MockFactory`] hands out fresh drivers and records
//! each launch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use pagecheck_common::BrowserKind;
use parking_lot::Mutex;
use serde_json::Value;

use crate::driver::{BrowserDriver, DriverFactory, ElementRef, LaunchOptions, Locator};
use crate::error::{E2eError, E2eResult};

/// A valid 1x1 PNG, base64 encoded
pub const PIXEL_PNG_BASE64: &str =
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

#[derive(Default)]
struct MockState {
    url: String,
    /// Frame path from the top document, e.g. `["0", "1"]`
    frames: Vec<String>,
    elements: HashMap<(String, String), Vec<String>>,
    texts: HashMap<String, String>,
    attributes: HashMap<(String, String), String>,
    hidden: HashSet<String>,
    disabled: HashSet<String>,
    script_results: HashMap<String, Value>,
    /// Elements whose styling scripts fail
    script_failures: HashSet<String>,
    scripts: Vec<(String, Vec<Value>)>,
    windows: Vec<String>,
    current_window: usize,
    screenshot: Option<String>,
    screenshot_error: Option<String>,
    quit_error: bool,
    quits: u32,
    calls: Vec<String>,
}

impl MockState {
    fn context(&self) -> String {
        self.frames.join("/")
    }
}

/// Scriptable in-memory [`BrowserDriver`]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDriver {
    pub fn new() -> Self {
        let state = MockState {
            windows: vec!["window-0".to_string()],
            screenshot: Some(PIXEL_PNG_BASE64.to_string()),
            ..Default::default()
        };
        Self {
            state: Mutex::new(state),
        }
    }

    /// Register elements found by `locator` in frame context `context`
    /// (`""` is the top document, `"0/1"` the second frame of the first frame)
    pub fn add_elements(&self, context: &str, locator: &Locator, ids: &[&str]) {
        let mut state = self.state.lock();
        state
            .elements
            .entry((context.to_string(), locator.to_string()))
            .or_default()
            .extend(ids.iter().map(|id| id.to_string()));
    }

    pub fn set_text(&self, id: &str, text: &str) {
        self.state.lock().texts.insert(id.to_string(), text.to_string());
    }

    pub fn set_attribute(&self, id: &str, name: &str, value: &str) {
        self.state
            .lock()
            .attributes
            .insert((id.to_string(), name.to_string()), value.to_string());
    }

    pub fn set_displayed(&self, id: &str, displayed: bool) {
        let mut state = self.state.lock();
        if displayed {
            state.hidden.remove(id);
        } else {
            state.hidden.insert(id.to_string());
        }
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) {
        let mut state = self.state.lock();
        if enabled {
            state.disabled.remove(id);
        } else {
            state.disabled.insert(id.to_string());
        }
    }

    pub fn set_script_result(&self, script: &str, value: Value) {
        self.state.lock().script_results.insert(script.to_string(), value);
    }

    /// Make every script receiving `id` as first argument fail
    pub fn fail_scripts_for(&self, id: &str) {
        self.state.lock().script_failures.insert(id.to_string());
    }

    pub fn set_screenshot(&self, base64: &str) {
        self.state.lock().screenshot = Some(base64.to_string());
    }

    pub fn fail_screenshot(&self, message: &str) {
        self.state.lock().screenshot_error = Some(message.to_string());
    }

    pub fn fail_quit(&self) {
        self.state.lock().quit_error = true;
    }

    pub fn set_windows(&self, handles: &[&str]) {
        let mut state = self.state.lock();
        state.windows = handles.iter().map(|h| h.to_string()).collect();
        state.current_window = 0;
    }

    pub fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    pub fn frame_context(&self) -> String {
        self.state.lock().context()
    }

    pub fn windows(&self) -> Vec<String> {
        self.state.lock().windows.clone()
    }

    pub fn quit_count(&self) -> u32 {
        self.state.lock().quits
    }

    pub fn scripts(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().scripts.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    fn record(&self, call: String) {
        self.state.lock().calls.push(call);
    }

    fn lookup(&self, locator: &Locator) -> Vec<ElementRef> {
        let state = self.state.lock();
        state
            .elements
            .get(&(state.context(), locator.to_string()))
            .map(|ids| ids.iter().map(ElementRef::new).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.record(format!("goto {}", url));
        let mut state = self.state.lock();
        state.url = url.to_string();
        state.frames.clear();
        Ok(())
    }

    async fn find_element(&self, locator: &Locator) -> E2eResult<ElementRef> {
        self.lookup(locator)
            .into_iter()
            .next()
            .ok_or_else(|| E2eError::ElementNotFound(locator.to_string()))
    }

    async fn find_elements(&self, locator: &Locator) -> E2eResult<Vec<ElementRef>> {
        Ok(self.lookup(locator))
    }

    async fn click(&self, element: &ElementRef) -> E2eResult<()> {
        self.record(format!("click {}", element.id));
        Ok(())
    }

    async fn is_displayed(&self, element: &ElementRef) -> E2eResult<bool> {
        Ok(!self.state.lock().hidden.contains(&element.id))
    }

    async fn is_enabled(&self, element: &ElementRef) -> E2eResult<bool> {
        Ok(!self.state.lock().disabled.contains(&element.id))
    }

    async fn text(&self, element: &ElementRef) -> E2eResult<String> {
        Ok(self
            .state
            .lock()
            .texts
            .get(&element.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> E2eResult<Option<String>> {
        Ok(self
            .state
            .lock()
            .attributes
            .get(&(element.id.clone(), name.to_string()))
            .cloned())
    }

    async fn switch_to_frame(&self, frame: Option<&ElementRef>) -> E2eResult<()> {
        let mut state = self.state.lock();
        match frame {
            Some(element) => state.frames.push(element.id.clone()),
            None => state.frames.clear(),
        }
        Ok(())
    }

    async fn switch_to_frame_index(&self, index: usize) -> E2eResult<()> {
        self.state.lock().frames.push(index.to_string());
        Ok(())
    }

    async fn switch_to_parent_frame(&self) -> E2eResult<()> {
        self.state.lock().frames.pop();
        Ok(())
    }

    async fn window_handle(&self) -> E2eResult<String> {
        let state = self.state.lock();
        state
            .windows
            .get(state.current_window)
            .cloned()
            .ok_or_else(|| E2eError::WebDriver {
                code: "no such window".into(),
                message: "current window is closed".into(),
            })
    }

    async fn window_handles(&self) -> E2eResult<Vec<String>> {
        Ok(self.windows())
    }

    async fn switch_to_window(&self, handle: &str) -> E2eResult<()> {
        let mut state = self.state.lock();
        match state.windows.iter().position(|w| w == handle) {
            Some(index) => {
                state.current_window = index;
                state.frames.clear();
                Ok(())
            }
            None => Err(E2eError::WebDriver {
                code: "no such window".into(),
                message: handle.to_string(),
            }),
        }
    }

    async fn close_window(&self) -> E2eResult<()> {
        let mut state = self.state.lock();
        let index = state.current_window;
        if index < state.windows.len() {
            let closed = state.windows.remove(index);
            state.calls.push(format!("close_window {}", closed));
        }
        state.current_window = usize::MAX;
        Ok(())
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> E2eResult<Value> {
        let mut state = self.state.lock();
        state.scripts.push((script.to_string(), args.clone()));

        let target = args.first().and_then(ElementRef::from_json);
        if let Some(element) = target {
            if state.script_failures.contains(&element.id) {
                return Err(E2eError::WebDriver {
                    code: "javascript error".into(),
                    message: format!("script failed for {}", element.id),
                });
            }
        }

        Ok(state.script_results.get(script).cloned().unwrap_or(Value::Null))
    }

    async fn screenshot_base64(&self) -> E2eResult<String> {
        let state = self.state.lock();
        if let Some(message) = &state.screenshot_error {
            return Err(E2eError::WebDriver {
                code: "unable to capture screen".into(),
                message: message.clone(),
            });
        }
        Ok(state.screenshot.clone().unwrap_or_default())
    }

    async fn quit(&self) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.quits += 1;
        if state.quit_error {
            return Err(E2eError::WebDriver {
                code: "invalid session id".into(),
                message: "session already deleted".into(),
            });
        }
        Ok(())
    }
}

type Setup = Box<dyn Fn(&MockDriver) + Send + Sync>;

/// [`DriverFactory`] handing out [`MockDriver`]s
pub struct MockFactory {
    setup: Option<Setup>,
    launch_error: Option<String>,
    drivers: Mutex<Vec<Arc<MockDriver>>>,
    launches: Mutex<Vec<(BrowserKind, LaunchOptions)>>,
}

impl Default for MockFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFactory {
    pub fn new() -> Self {
        Self {
            setup: None,
            launch_error: None,
            drivers: Mutex::new(Vec::new()),
            launches: Mutex::new(Vec::new()),
        }
    }

    /// Every launch fails with [`E2eError::Launch`]
    pub fn failing(message: &str) -> Self {
        Self {
            launch_error: Some(message.to_string()),
            ..Self::new()
        }
    }

    /// Run `setup` on every driver before it is handed out
    pub fn with_setup(mut self, setup: impl Fn(&MockDriver) + Send + Sync + 'static) -> Self {
        self.setup = Some(Box::new(setup));
        self
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().len()
    }

    pub fn launches(&self) -> Vec<(BrowserKind, LaunchOptions)> {
        self.launches.lock().clone()
    }

    pub fn drivers(&self) -> Vec<Arc<MockDriver>> {
        self.drivers.lock().clone()
    }

    /// Most recently launched driver
    pub fn last_driver(&self) -> Option<Arc<MockDriver>> {
        self.drivers.lock().last().cloned()
    }
}

#[async_trait]
impl DriverFactory for MockFactory {
    async fn launch(
        &self,
        browser: BrowserKind,
        options: &LaunchOptions,
    ) -> E2eResult<Arc<dyn BrowserDriver>> {
        if let Some(message) = &self.launch_error {
            return Err(E2eError::Launch(message.clone()));
        }

        let driver = Arc::new(MockDriver::new());
        if let Some(setup) = &self.setup {
            setup(&driver);
        }
        self.launches.lock().push((browser, options.clone()));
        self.drivers.lock().push(driver.clone());
        Ok(driver)
    }
}

//! W3C WebDriver client
//!
//! Speaks the JSON wire protocol to a running driver server (chromedriver,
//! geckodriver, msedgedriver or a Selenium grid) over HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pagecheck_common::{BrowserKind, HarnessConfig};
use reqwest::{Method, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::driver::{BrowserDriver, DriverFactory, ElementRef, LaunchOptions, Locator};
use crate::error::{E2eError, E2eResult};

/// Per-request HTTP timeout; page loads can be slow
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

fn browser_name(browser: BrowserKind) -> &'static str {
    match browser {
        BrowserKind::Chrome => "chrome",
        BrowserKind::Firefox => "firefox",
        BrowserKind::Edge => "MicrosoftEdge",
    }
}

fn vendor_options_key(browser: BrowserKind) -> &'static str {
    match browser {
        BrowserKind::Chrome => "goog:chromeOptions",
        BrowserKind::Firefox => "moz:firefoxOptions",
        BrowserKind::Edge => "ms:edgeOptions",
    }
}

/// New-session payload for `browser` launched with `options`
pub fn capabilities(browser: BrowserKind, options: &LaunchOptions) -> Value {
    let mut always_match = serde_json::Map::new();
    always_match.insert("browserName".into(), json!(browser_name(browser)));
    always_match.insert(
        vendor_options_key(browser).into(),
        json!({ "args": options.args }),
    );
    json!({ "capabilities": { "alwaysMatch": always_match } })
}

/// Map a W3C error code onto the harness error kinds
pub fn map_error(code: &str, message: &str) -> E2eError {
    match code {
        "stale element reference" => E2eError::StaleElement(message.to_string()),
        "no such element" => E2eError::ElementNotFound(message.to_string()),
        "session not created" => E2eError::Launch(message.to_string()),
        // the server does not report its own deadline
        "timeout" | "script timeout" => E2eError::Timeout {
            what: message.to_string(),
            after: Duration::ZERO,
        },
        _ => E2eError::WebDriver {
            code: code.to_string(),
            message: message.to_string(),
        },
    }
}

/// Unwrap the `value` member of a response, turning error payloads into errors
pub fn decode_response(status: StatusCode, body: &str) -> E2eResult<Value> {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) if status.is_success() => return Err(e.into()),
        Err(_) => {
            return Err(E2eError::WebDriver {
                code: status.as_u16().to_string(),
                message: body.trim().to_string(),
            })
        }
    };

    let value = parsed.get("value").cloned().unwrap_or(Value::Null);
    if let Some(code) = value.get("error").and_then(Value::as_str) {
        let message = value.get("message").and_then(Value::as_str).unwrap_or("");
        return Err(map_error(code, message));
    }
    if !status.is_success() {
        return Err(E2eError::WebDriver {
            code: status.as_u16().to_string(),
            message: value.to_string(),
        });
    }
    Ok(value)
}

fn element_from(value: &Value) -> E2eResult<ElementRef> {
    ElementRef::from_json(value)
        .ok_or_else(|| E2eError::WebDriver {
            code: "invalid response".into(),
            message: format!("not an element reference: {}", value),
        })
}

fn string_from(value: Value) -> E2eResult<String> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(E2eError::WebDriver {
            code: "invalid response".into(),
            message: format!("expected a string, got {}", other),
        }),
    }
}

/// One WebDriver session
pub struct WebDriverClient {
    http: reqwest::Client,
    base_url: String,
    session_id: String,
}

impl WebDriverClient {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> E2eResult<Value> {
        let url = format!("{}/session/{}{}", self.base_url, self.session_id, path);
        send(&self.http, method, &url, body).await
    }

    async fn post(&self, path: &str, body: Value) -> E2eResult<Value> {
        self.command(Method::POST, path, Some(body)).await
    }

    async fn get(&self, path: &str) -> E2eResult<Value> {
        self.command(Method::GET, path, None).await
    }

    async fn element_get(&self, element: &ElementRef, what: &str) -> E2eResult<Value> {
        self.get(&format!("/element/{}/{}", element.id, what)).await
    }

    async fn frame(&self, id: Value) -> E2eResult<()> {
        self.post("/frame", json!({ "id": id })).await?;
        Ok(())
    }
}

async fn send(
    http: &reqwest::Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> E2eResult<Value> {
    debug!("WebDriver {} {}", method, url);
    let mut request = http.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    decode_response(status, &text)
}

#[async_trait]
impl BrowserDriver for WebDriverClient {
    async fn goto(&self, url: &str) -> E2eResult<()> {
        self.post("/url", json!({ "url": url })).await?;
        Ok(())
    }

    async fn find_element(&self, locator: &Locator) -> E2eResult<ElementRef> {
        let (using, value) = locator.strategy();
        let found = self
            .post("/element", json!({ "using": using, "value": value }))
            .await
            .map_err(|e| match e {
                E2eError::ElementNotFound(_) => E2eError::ElementNotFound(locator.to_string()),
                other => other,
            })?;
        element_from(&found)
    }

    async fn find_elements(&self, locator: &Locator) -> E2eResult<Vec<ElementRef>> {
        let (using, value) = locator.strategy();
        let found = self
            .post("/elements", json!({ "using": using, "value": value }))
            .await?;
        found
            .as_array()
            .map(|items| items.iter().map(element_from).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn click(&self, element: &ElementRef) -> E2eResult<()> {
        self.post(&format!("/element/{}/click", element.id), json!({}))
            .await?;
        Ok(())
    }

    async fn is_displayed(&self, element: &ElementRef) -> E2eResult<bool> {
        Ok(self
            .element_get(element, "displayed")
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    async fn is_enabled(&self, element: &ElementRef) -> E2eResult<bool> {
        Ok(self
            .element_get(element, "enabled")
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    async fn text(&self, element: &ElementRef) -> E2eResult<String> {
        string_from(self.element_get(element, "text").await?)
    }

    async fn attribute(&self, element: &ElementRef, name: &str) -> E2eResult<Option<String>> {
        let value = self
            .element_get(element, &format!("attribute/{}", name))
            .await?;
        Ok(value.as_str().map(String::from))
    }

    async fn switch_to_frame(&self, frame: Option<&ElementRef>) -> E2eResult<()> {
        self.frame(frame.map(ElementRef::to_json).unwrap_or(Value::Null))
            .await
    }

    async fn switch_to_frame_index(&self, index: usize) -> E2eResult<()> {
        self.frame(json!(index)).await
    }

    async fn switch_to_parent_frame(&self) -> E2eResult<()> {
        self.post("/frame/parent", json!({})).await?;
        Ok(())
    }

    async fn window_handle(&self) -> E2eResult<String> {
        string_from(self.get("/window").await?)
    }

    async fn window_handles(&self) -> E2eResult<Vec<String>> {
        let value = self.get("/window/handles").await?;
        Ok(value
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|h| h.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn switch_to_window(&self, handle: &str) -> E2eResult<()> {
        self.post("/window", json!({ "handle": handle })).await?;
        Ok(())
    }

    async fn close_window(&self) -> E2eResult<()> {
        self.command(Method::DELETE, "/window", None).await?;
        Ok(())
    }

    async fn execute_script(&self, script: &str, args: Vec<Value>) -> E2eResult<Value> {
        self.post("/execute/sync", json!({ "script": script, "args": args }))
            .await
    }

    async fn screenshot_base64(&self) -> E2eResult<String> {
        string_from(self.get("/screenshot").await?)
    }

    async fn quit(&self) -> E2eResult<()> {
        self.command(Method::DELETE, "", None).await?;
        Ok(())
    }
}

/// Opens sessions against a driver server
pub struct WebDriverFactory {
    http: reqwest::Client,
    base_url: String,
}

impl WebDriverFactory {
    pub fn new(base_url: impl Into<String>) -> E2eResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &HarnessConfig) -> E2eResult<Self> {
        Self::new(config.webdriver_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl DriverFactory for WebDriverFactory {
    async fn launch(
        &self,
        browser: BrowserKind,
        options: &LaunchOptions,
    ) -> E2eResult<Arc<dyn BrowserDriver>> {
        let url = format!("{}/session", self.base_url);
        let created = send(
            &self.http,
            Method::POST,
            &url,
            Some(capabilities(browser, options)),
        )
        .await
        .map_err(|e| match e {
            E2eError::Launch(_) => e,
            other => E2eError::Launch(other.to_string()),
        })?;

        let session_id = created
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| E2eError::Launch(format!("no sessionId in response: {}", created)))?
            .to_string();
        info!("WebDriver session {} opened for {}", session_id, browser);

        Ok(Arc::new(WebDriverClient {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            session_id,
        }))
    }
}

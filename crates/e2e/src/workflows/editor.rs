//! TinyMCE rich-text editor page

use std::fmt;

use chrono::NaiveDateTime;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::driver::{ElementRef, Locator};
use crate::error::E2eResult;
use crate::workflows::page::Page;

pub const PATH: &str = "/tinymce";

const EDITOR_READY: &str = "return tinymce.activeEditor != null";
const CLEAR_CONTENT: &str = "tinymce.activeEditor.setContent('')";
const INSERT_CONTENT: &str = "tinymce.activeEditor.insertContent(arguments[0])";
const CENTER_CONTENT: &str = "var editor = tinymce.activeEditor; \
    editor.setContent('<div style=\"text-align: center;\">' + editor.getContent() + '</div>')";
const RECOLOR_CONTENT: &str = "var body = tinymce.activeEditor.getBody(); \
    body.style.color = arguments[0]; \
    var all = body.getElementsByTagName('*'); \
    for (var i = 0; i < all.length; i++) { all[i].style.color = arguments[0]; }";
const IS_CENTERED: &str = "var body = tinymce.activeEditor.getBody(); \
    return window.getComputedStyle(body).textAlign === 'center' || body.style.textAlign === 'center';";

/// Text colors offered by the editor scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextColor {
    #[default]
    Rojo,
    Azul,
    Verde,
    Amarillo,
    Negro,
}

impl TextColor {
    pub fn hex(&self) -> &'static str {
        match self {
            TextColor::Rojo => "#cc0000",
            TextColor::Azul => "#0000cc",
            TextColor::Verde => "#00cc00",
            TextColor::Amarillo => "#cccc00",
            TextColor::Negro => "#000000",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TextColor::Rojo => "ROJO",
            TextColor::Azul => "AZUL",
            TextColor::Verde => "VERDE",
            TextColor::Amarillo => "AMARILLO",
            TextColor::Negro => "NEGRO",
        }
    }

    /// Case-insensitive parse; unknown names fall back to red
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "ROJO" => TextColor::Rojo,
            "AZUL" => TextColor::Azul,
            "VERDE" => TextColor::Verde,
            "AMARILLO" => TextColor::Amarillo,
            "NEGRO" => TextColor::Negro,
            other => {
                debug!("Unrecognized color '{}', using ROJO", other);
                TextColor::Rojo
            }
        }
    }
}

impl fmt::Display for TextColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `text` followed by `dd/mm/yyyy HH:MM:SS`
pub fn timestamped(text: &str, at: NaiveDateTime) -> String {
    format!("{} {}", text, at.format("%d/%m/%Y %H:%M:%S"))
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn editor_iframe() -> Locator {
    Locator::xpath("//iframe[contains(@id, 'mce_')]")
}

fn editor_body() -> Locator {
    Locator::xpath("//body[@id='tinymce']")
}

fn banner_close() -> Locator {
    Locator::xpath(
        "//div[contains(@class, 'tox-notification')]//button \
         | //button[contains(@aria-label, 'Close') or contains(@title, 'Close')]",
    )
}

pub struct EditorPage {
    page: Page,
}

impl EditorPage {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Open the editor and dismiss the notification banner if it shows up
    pub async fn navigate(&self) -> E2eResult<()> {
        self.page.open(PATH).await?;
        match self.page.click_when_clickable(&banner_close()).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_timeout() => {
                info!("No notification banner to dismiss");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// The editor iframe, for highlighting
    pub async fn editor_frame(&self) -> E2eResult<ElementRef> {
        self.page.default_content().await?;
        self.page.wait().element_located(&editor_iframe()).await
    }

    async fn editor_script(&self, script: &str, args: Vec<Value>) -> E2eResult<Value> {
        self.page.default_content().await?;
        self.page.wait().script_truthy(EDITOR_READY).await?;
        self.page.driver().execute_script(script, args).await
    }

    pub async fn clear(&self) -> E2eResult<()> {
        self.editor_script(CLEAR_CONTENT, Vec::new()).await?;
        Ok(())
    }

    pub async fn insert_bold(&self, text: &str) -> E2eResult<()> {
        let html = format!("<strong>{}</strong>", escape_html(text));
        self.editor_script(INSERT_CONTENT, vec![json!(html)]).await?;
        Ok(())
    }

    /// Wrap the current content in a centered block
    pub async fn center(&self) -> E2eResult<()> {
        self.editor_script(CENTER_CONTENT, Vec::new()).await?;
        Ok(())
    }

    pub async fn recolor(&self, color: TextColor) -> E2eResult<()> {
        debug!("Recoloring editor text to {} ({})", color, color.hex());
        self.editor_script(RECOLOR_CONTENT, vec![json!(color.hex())])
            .await?;
        Ok(())
    }

    /// Visible text of the editor body
    pub async fn text(&self) -> E2eResult<String> {
        self.read_body(false).await
    }

    /// Inner HTML of the editor body
    pub async fn html(&self) -> E2eResult<String> {
        self.read_body(true).await
    }

    async fn read_body(&self, html: bool) -> E2eResult<String> {
        let frame = self.editor_frame().await?;
        self.page.enter_frame(&frame).await?;

        let read = async {
            let body = self.page.wait().element_visible(&editor_body()).await?;
            if html {
                Ok(self
                    .page
                    .driver()
                    .attribute(&body, "innerHTML")
                    .await?
                    .unwrap_or_default())
            } else {
                self.page.driver().text(&body).await
            }
        }
        .await;

        self.page.default_content().await?;
        read
    }

    /// Whether the body is centered by style or by a centered wrapper
    pub async fn is_centered(&self) -> E2eResult<bool> {
        let styled = self.editor_script(IS_CENTERED, Vec::new()).await?;
        if styled.as_bool().unwrap_or(false) {
            return Ok(true);
        }
        Ok(self.html().await?.contains("text-align: center"))
    }
}

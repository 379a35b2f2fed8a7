//! Report data model
//!
//! These types serialize to the Allure result layout: one
//! `<uuid>-result.json` per scenario, attachment blobs referenced by file
//! name, and an `environment.properties` descriptor per run.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::{BrowserKind, EnvironmentTag};

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Stable history key derived from a scenario's full name
pub fn history_id(full_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(full_name.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}

/// Reported outcome of a step or scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Passed,
    Failed,
}

impl Status {
    pub fn is_failed(&self) -> bool {
        matches!(self, Status::Failed)
    }
}

/// Execution stage. Everything this harness persists has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Finished,
}

/// Media kind of a persisted evidence blob
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "text/plain")]
    Text,
}

impl MediaKind {
    pub fn extension(&self) -> &'static str {
        match self {
            MediaKind::Png => "png",
            MediaKind::Text => "txt",
        }
    }

    /// Blob file name for an attachment id
    pub fn file_name(&self, uuid: &Uuid) -> String {
        format!("{}-attachment.{}", uuid, self.extension())
    }
}

/// Reference to an evidence blob in the results directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub uuid: Uuid,
    pub name: String,
    /// File name of the blob, relative to the results directory
    pub source: String,
    #[serde(rename = "type")]
    pub media: MediaKind,
}

/// One step node of a scenario report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub uuid: Uuid,
    pub name: String,
    pub status: Status,
    pub stage: Stage,
    pub start: i64,
    /// `None` while the step is open
    pub stop: Option<i64>,
    pub attachments: Vec<AttachmentRecord>,
    /// Nested steps; the flat runner model never fills these
    pub steps: Vec<StepRecord>,
}

impl StepRecord {
    /// A new open step starting now
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.into(),
            status: Status::Passed,
            stage: Stage::Finished,
            start: now_millis(),
            stop: None,
            attachments: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.stop.is_none()
    }

    pub fn close(&mut self, status: Status) {
        self.status = status;
        self.stop = Some(now_millis());
    }

    /// Copy for persistence; steps still open are stamped with `now`
    pub fn finalized(mut self, now: i64) -> Self {
        if self.stop.is_none() {
            self.stop = Some(now);
        }
        self.steps = self.steps.into_iter().map(|s| s.finalized(now)).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Failure detail attached to a failed scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusDetails {
    pub message: String,
    pub trace: String,
}

/// Persisted report of one completed scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub uuid: Uuid,
    pub name: String,
    pub history_id: String,
    pub full_name: String,
    pub labels: Vec<Label>,
    pub links: Vec<Link>,
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,
    pub stage: Stage,
    pub steps: Vec<StepRecord>,
    pub attachments: Vec<AttachmentRecord>,
    pub start: i64,
    pub stop: i64,
}

impl ScenarioResult {
    /// Assemble a finished scenario; open steps are stamped with `stop`
    pub fn new(
        uuid: Uuid,
        name: &str,
        feature: &str,
        start: i64,
        stop: i64,
        steps: Vec<StepRecord>,
    ) -> Self {
        let full_name = format!("{}: {}", feature, name);
        Self {
            uuid,
            name: name.to_string(),
            history_id: history_id(&full_name),
            full_name,
            labels: vec![
                Label::new("package", "features"),
                Label::new("testClass", "Cucumber"),
                Label::new("testMethod", name),
                Label::new("suite", feature),
            ],
            links: Vec::new(),
            status: Status::Passed,
            status_details: None,
            stage: Stage::Finished,
            steps: steps.into_iter().map(|s| s.finalized(stop)).collect(),
            attachments: Vec::new(),
            start,
            stop,
        }
    }

    /// Mark the scenario failed with the runner's message and trace
    pub fn failed(mut self, message: Option<&str>, trace: Option<&str>) -> Self {
        self.status = Status::Failed;
        self.status_details = Some(StatusDetails {
            message: message
                .filter(|m| !m.is_empty())
                .unwrap_or("Test failed")
                .to_string(),
            trace: trace.unwrap_or_default().to_string(),
        });
        self
    }

    /// Result file name inside the results directory
    pub fn file_name(&self) -> String {
        format!("{}-result.json", self.uuid)
    }
}

/// Run-wide descriptor written once at the end of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentRecord {
    pub environment: EnvironmentTag,
    pub browser: BrowserKind,
}

impl EnvironmentRecord {
    pub const FILE_NAME: &'static str = "environment.properties";

    pub fn to_properties(&self) -> String {
        format!("Environment={}\nBrowser={}", self.environment, self.browser)
    }
}

//! Payloads delivered by the scenario runner
//!
//! Field names follow the runner's camelCase message format so contexts can
//! be deserialized straight from its JSON. Every field is optional; the
//! lifecycle coordinator applies the fallbacks.

use serde::{Deserialize, Serialize};

/// Outcome reported by the runner for a step or scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunnerStatus {
    #[default]
    Passed,
    Failed,
    Skipped,
    Pending,
    Undefined,
    Ambiguous,
    Unknown,
}

impl RunnerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerStatus::Passed => "PASSED",
            RunnerStatus::Failed => "FAILED",
            RunnerStatus::Skipped => "SKIPPED",
            RunnerStatus::Pending => "PENDING",
            RunnerStatus::Undefined => "UNDEFINED",
            RunnerStatus::Ambiguous => "AMBIGUOUS",
            RunnerStatus::Unknown => "UNKNOWN",
        }
    }
}

impl From<String> for RunnerStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "PASSED" => RunnerStatus::Passed,
            "FAILED" => RunnerStatus::Failed,
            "SKIPPED" => RunnerStatus::Skipped,
            "PENDING" => RunnerStatus::Pending,
            "UNDEFINED" => RunnerStatus::Undefined,
            "AMBIGUOUS" => RunnerStatus::Ambiguous,
            _ => RunnerStatus::Unknown,
        }
    }
}

impl From<RunnerStatus> for String {
    fn from(value: RunnerStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Exception detail attached to a failed result
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerException {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub stack: Option<String>,
}

/// Result of a step or scenario
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerResult {
    #[serde(default)]
    pub status: RunnerStatus,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub exception: Option<RunnerException>,
}

impl RunnerResult {
    pub fn passed() -> Self {
        Self::default()
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: RunnerStatus::Failed,
            message: Some(message.into()),
            exception: None,
        }
    }

    pub fn with_status(status: RunnerStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.exception = Some(RunnerException {
            message: self.message.clone(),
            stack: Some(stack.into()),
        });
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == RunnerStatus::Failed
    }

    pub fn trace(&self) -> Option<&str> {
        self.exception.as_ref()?.stack.as_deref()
    }
}

/// A step as written in the feature file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GherkinStep {
    pub id: String,
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub text: String,
}

/// Scenario or background body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContainer {
    #[serde(default)]
    pub steps: Vec<GherkinStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureChild {
    #[serde(default)]
    pub scenario: Option<StepContainer>,
    #[serde(default)]
    pub background: Option<StepContainer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub children: Vec<FeatureChild>,
}

/// Parsed feature file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GherkinDocument {
    #[serde(default)]
    pub feature: Option<Feature>,
}

impl GherkinDocument {
    /// Keyword of the step whose id is `ast_node_id`, trimmed and upper-cased
    pub fn keyword_for(&self, ast_node_id: &str) -> Option<String> {
        self.feature
            .as_ref()?
            .children
            .iter()
            .flat_map(|child| child.scenario.iter().chain(child.background.iter()))
            .flat_map(|container| container.steps.iter())
            .find(|step| step.id == ast_node_id)
            .map(|step| step.keyword.trim().to_uppercase())
            .filter(|keyword| !keyword.is_empty())
    }
}

/// Compiled scenario
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pickle {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

/// Payload of scenario start/end events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioContext {
    #[serde(default)]
    pub pickle: Pickle,
    #[serde(default)]
    pub gherkin_document: Option<GherkinDocument>,
    /// Scenario name some runners send beside the pickle
    #[serde(default)]
    pub name: Option<String>,
}

/// Compiled step
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickleStep {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub ast_node_ids: Vec<String>,
}

/// Payload of step start/end events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepContext {
    #[serde(default)]
    pub pickle_step: Option<PickleStep>,
    #[serde(default)]
    pub text: Option<String>,
}

impl StepContext {
    /// Literal step text
    pub fn step_text(&self) -> Option<&str> {
        self.pickle_step
            .as_ref()
            .and_then(|p| p.text.as_deref())
            .filter(|t| !t.is_empty())
            .or_else(|| self.text.as_deref().filter(|t| !t.is_empty()))
    }

    /// First AST node id the step was compiled from
    pub fn ast_node_id(&self) -> Option<&str> {
        self.pickle_step.as_ref()?.ast_node_ids.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_runner_payloads() {
        let json = r#"{
            "pickle": { "id": "p-1", "name": "Read nested frames", "uri": "features/frames.feature" },
            "gherkinDocument": {
                "feature": {
                    "name": "Nested frames",
                    "children": [
                        { "background": { "steps": [ { "id": "b1", "keyword": "Given ", "text": "a browser" } ] } },
                        { "scenario": { "steps": [
                            { "id": "s1", "keyword": "When ", "text": "frames are read" },
                            { "id": "s2", "keyword": "Then ", "text": "texts exist" }
                        ] } }
                    ]
                }
            }
        }"#;

        let ctx: ScenarioContext = serde_json::from_str(json).unwrap();
        assert_eq!(ctx.pickle.id, "p-1");
        let document = ctx.gherkin_document.as_ref().unwrap();
        assert_eq!(document.keyword_for("b1").as_deref(), Some("GIVEN"));
        assert_eq!(document.keyword_for("s2").as_deref(), Some("THEN"));
        assert_eq!(document.keyword_for("missing"), None);

        let result: RunnerResult = serde_json::from_str(
            r#"{ "status": "FAILED", "message": "boom", "exception": { "stack": "at frames.rs:1" } }"#,
        )
        .unwrap();
        assert!(result.is_failed());
        assert_eq!(result.trace(), Some("at frames.rs:1"));
    }

    #[test]
    fn test_unrecognized_status_is_unknown() {
        let result: RunnerResult = serde_json::from_str(r#"{ "status": "weird" }"#).unwrap();
        assert_eq!(result.status, RunnerStatus::Unknown);
        let result: RunnerResult = serde_json::from_str("{}").unwrap();
        assert_eq!(result.status, RunnerStatus::Passed);
    }

    #[test]
    fn test_step_text_fallbacks() {
        let step: StepContext = serde_json::from_str(
            r#"{ "pickleStep": { "text": "the page loads", "astNodeIds": ["s1", "x"] } }"#,
        )
        .unwrap();
        assert_eq!(step.step_text(), Some("the page loads"));
        assert_eq!(step.ast_node_id(), Some("s1"));

        let bare = StepContext {
            text: Some("plain".into()),
            ..Default::default()
        };
        assert_eq!(bare.step_text(), Some("plain"));
        assert_eq!(bare.ast_node_id(), None);
        assert_eq!(StepContext::default().step_text(), None);
    }

    #[test]
    fn test_empty_pickle_text_falls_back_to_step_text() {
        let step: StepContext =
            serde_json::from_str(r#"{ "pickleStep": { "text": "" }, "text": "X" }"#).unwrap();
        assert_eq!(step.step_text(), Some("X"));

        let blank = StepContext {
            pickle_step: Some(PickleStep::default()),
            text: Some(String::new()),
        };
        assert_eq!(blank.step_text(), None);
    }
}

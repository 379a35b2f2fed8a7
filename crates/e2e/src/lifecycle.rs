//! Runner lifecycle coordination
//!
//! [`LifecycleCoordinator`] receives the runner's run/scenario/step events,
//! keeps the browser session and the evidence recorder in step with them,
//! and writes one result file per scenario plus the run's environment file.
//!
//! ```text
//! before_run ─► before_scenario ─► (before_step ─► after_step)* ─► after_scenario ─► … ─► after_run
//!                 Idle ─► Active                                     Active ─► Finalized
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use pagecheck_common::{now_millis, EnvironmentRecord, HarnessConfig, ScenarioResult, Status};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::driver::{BrowserDriver, DriverFactory, ElementRef};
use crate::error::{E2eError, E2eResult};
use crate::events::{GherkinDocument, RunnerResult, RunnerStatus, ScenarioContext, StepContext};
use crate::evidence::{CaptureOutcome, EvidenceRecorder, StepHandle};
use crate::report::ReportStore;
use crate::session::{Session, SessionRegistry};
use crate::wait::RetryingWait;

/// Name of the screenshot taken when a step fails
pub const ERROR_SCREENSHOT_NAME: &str = "Error in step";

const UNKNOWN_SCENARIO: &str = "Unknown scenario";
const UNKNOWN_FEATURE: &str = "Unknown feature";
const UNKNOWN_STEP: &str = "Unknown step";

/// Where the coordinator is in the current scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
    Finalized,
}

struct ActiveScenario {
    uuid: Uuid,
    name: String,
    feature: String,
    start: i64,
    document: Option<GherkinDocument>,
}

/// Map a runner status onto the two reported ones.
///
/// Only `FAILED` is reported as failed; skipped, pending and the rest are
/// reported as passed.
pub fn report_status(status: RunnerStatus) -> Status {
    match status {
        RunnerStatus::Failed => Status::Failed,
        RunnerStatus::Passed => Status::Passed,
        other => {
            debug!("Reporting {} as passed", other.as_str());
            Status::Passed
        }
    }
}

fn scenario_name(ctx: &ScenarioContext) -> String {
    [&ctx.pickle.name, &ctx.name]
        .into_iter()
        .flatten()
        .find(|n| !n.is_empty())
        .cloned()
        .unwrap_or_else(|| UNKNOWN_SCENARIO.to_string())
}

fn feature_name(ctx: &ScenarioContext) -> String {
    let from_document = ctx
        .gherkin_document
        .as_ref()
        .and_then(|d| d.feature.as_ref())
        .and_then(|f| f.name.clone())
        .filter(|n| !n.is_empty());

    let from_uri = || {
        let uri = ctx.pickle.uri.as_deref()?;
        let file = uri.rsplit('/').next()?;
        let stem = file.strip_suffix(".feature").unwrap_or(file);
        (!stem.is_empty()).then(|| stem.to_string())
    };

    from_document
        .or_else(from_uri)
        .unwrap_or_else(|| UNKNOWN_FEATURE.to_string())
}

/// Translates runner events into session and evidence operations
pub struct LifecycleCoordinator<F> {
    config: HarnessConfig,
    sessions: SessionRegistry<F>,
    recorder: EvidenceRecorder,
    scenario: Option<ActiveScenario>,
    phase: Phase,
    run_info: Option<EnvironmentRecord>,
}

impl<F: DriverFactory> LifecycleCoordinator<F> {
    pub fn new(config: HarnessConfig, factory: F) -> Self {
        let sessions = SessionRegistry::new(factory, &config);
        let recorder = EvidenceRecorder::new(ReportStore::new(config.results_dir.clone()));
        Self {
            config,
            sessions,
            recorder,
            scenario: None,
            phase: Phase::Idle,
            run_info: None,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn sessions(&self) -> &SessionRegistry<F> {
        &self.sessions
    }

    pub fn recorder(&self) -> &EvidenceRecorder {
        &self.recorder
    }

    /// Start of the run: make sure no session from an earlier run lingers
    pub async fn before_run(&mut self) {
        info!(
            "Run starting: browser={} environment={} results={}",
            self.config.browser,
            self.config.environment,
            self.config.results_dir.display()
        );
        self.sessions.destroy().await;
        self.phase = Phase::Idle;
    }

    /// Start of a scenario. Session launch failures propagate.
    pub async fn before_scenario(&mut self, ctx: &ScenarioContext) -> E2eResult<()> {
        if let Some(previous) = &self.scenario {
            warn!("Scenario '{}' never finished; discarding it", previous.name);
        }

        let scenario = ActiveScenario {
            uuid: Uuid::new_v4(),
            name: scenario_name(ctx),
            feature: feature_name(ctx),
            start: now_millis(),
            document: ctx.gherkin_document.clone(),
        };
        info!("Scenario started: {}: {}", scenario.feature, scenario.name);

        let browser = self.sessions.browser();
        let environment = self.config.environment;
        self.run_info.get_or_insert(EnvironmentRecord { environment, browser });

        self.scenario = Some(scenario);
        self.phase = Phase::Active;
        self.recorder.clear();

        self.sessions.get().await?;
        Ok(())
    }

    /// Start of a step; opens a step record labelled `KEYWORD text`
    pub fn before_step(&mut self, step: &StepContext) -> StepHandle {
        let text = step.step_text().unwrap_or(UNKNOWN_STEP);
        let keyword = step.ast_node_id().and_then(|id| {
            self.scenario
                .as_ref()?
                .document
                .as_ref()?
                .keyword_for(id)
        });

        let label = match keyword {
            Some(keyword) => format!("{} {}", keyword, text),
            None => text.to_string(),
        };

        if self.phase != Phase::Active {
            warn!("Step '{}' started outside an active scenario", label);
        }
        self.recorder.start_step(label)
    }

    /// End of a step. Failed steps get an error screenshot before closing.
    pub async fn after_step(&mut self, step: &StepContext, result: &RunnerResult) {
        if result.is_failed() {
            debug!(
                "Step failed: {}",
                step.step_text().unwrap_or(UNKNOWN_STEP)
            );
            let outcome = self.capture(ERROR_SCREENSHOT_NAME, &[]).await;
            if let CaptureOutcome::Failed { reason } = outcome {
                warn!("No error screenshot for failed step: {}", reason);
            }
        }
        self.recorder.end_step(report_status(result.status));
    }

    /// End of a scenario: persist its result, then always tear the session down.
    /// Returns the result file when one was written.
    pub async fn after_scenario(
        &mut self,
        ctx: &ScenarioContext,
        result: &RunnerResult,
    ) -> Option<PathBuf> {
        let written = match self.scenario.take() {
            Some(active) => self.finalize(active, result),
            None => {
                warn!(
                    "Scenario '{}' ended without having started; no result written",
                    scenario_name(ctx)
                );
                None
            }
        };

        self.sessions.destroy().await;
        self.phase = Phase::Finalized;
        written
    }

    fn finalize(&mut self, active: ActiveScenario, result: &RunnerResult) -> Option<PathBuf> {
        let steps = self.recorder.take_steps();
        let mut report = ScenarioResult::new(
            active.uuid,
            &active.name,
            &active.feature,
            active.start,
            now_millis(),
            steps,
        );

        if result.is_failed() {
            let message = result.message.as_deref().or_else(|| {
                result
                    .exception
                    .as_ref()
                    .and_then(|e| e.message.as_deref())
            });
            report = report.failed(message, result.trace());
        }

        info!(
            "Scenario finished: {} ({:?}, {} step(s))",
            report.full_name,
            report.status,
            report.steps.len()
        );

        match self.recorder.store().write_result(&report) {
            Ok(path) => Some(path),
            Err(e) => {
                error!("Failed to write result for '{}': {}", report.full_name, e);
                None
            }
        }
    }

    /// End of the run: write the environment descriptor
    pub fn after_run(&mut self) -> Option<PathBuf> {
        let record = self.run_info.unwrap_or(EnvironmentRecord {
            environment: self.config.environment,
            browser: self.config.browser,
        });

        match self.recorder.store().write_environment(&record) {
            Ok(path) => Some(path),
            Err(e) => {
                error!("Failed to write environment descriptor: {}", e);
                None
            }
        }
    }

    /// The live session, launching one if needed
    pub async fn session(&mut self) -> E2eResult<&Session> {
        self.sessions.get().await
    }

    pub async fn driver(&mut self) -> E2eResult<Arc<dyn BrowserDriver>> {
        Ok(self.sessions.get().await?.driver().clone())
    }

    /// Fresh wait helper for the live session
    pub async fn wait(&mut self) -> E2eResult<RetryingWait> {
        self.sessions.wait().await
    }

    /// Screenshot into the current step. Never launches a session and never fails.
    pub async fn capture(&mut self, name: &str, targets: &[ElementRef]) -> CaptureOutcome {
        let Some(driver) = self.sessions.current().map(|s| s.driver().clone()) else {
            let reason = E2eError::Report(format!("no live session for screenshot '{}'", name));
            warn!("{}", reason);
            return CaptureOutcome::Failed {
                reason: reason.to_string(),
            };
        };

        let step = self.recorder.current_step();
        self.recorder
            .capture_screenshot(driver.as_ref(), step, name, targets)
            .await
    }

    /// Text attachment into the current step
    pub fn attach(&mut self, name: &str, content: &str) -> CaptureOutcome {
        let step = self.recorder.current_step();
        self.recorder.attach_text(step, name, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{Feature, FeatureChild, GherkinStep, Pickle, PickleStep, StepContainer};
    use crate::testing::MockFactory;
    use tempfile::TempDir;

    fn coordinator(tmp: &TempDir) -> LifecycleCoordinator<MockFactory> {
        let config = HarnessConfig {
            results_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };
        LifecycleCoordinator::new(config, MockFactory::new())
    }

    fn scenario_with_document() -> ScenarioContext {
        ScenarioContext {
            pickle: Pickle {
                id: "p1".into(),
                name: Some("Open window".into()),
                uri: Some("features/windows.feature".into()),
            },
            gherkin_document: Some(GherkinDocument {
                feature: Some(Feature {
                    name: Some("Windows".into()),
                    children: vec![FeatureChild {
                        scenario: Some(StepContainer {
                            steps: vec![GherkinStep {
                                id: "s1".into(),
                                keyword: "Given ".into(),
                                text: "the main page".into(),
                            }],
                        }),
                        background: None,
                    }],
                }),
            }),
            name: None,
        }
    }

    fn step(text: &str, node: &str) -> StepContext {
        StepContext {
            pickle_step: Some(PickleStep {
                text: Some(text.into()),
                ast_node_ids: vec![node.into()],
            }),
            text: None,
        }
    }

    #[test]
    fn test_report_status_coercion() {
        assert_eq!(report_status(RunnerStatus::Failed), Status::Failed);
        assert_eq!(report_status(RunnerStatus::Passed), Status::Passed);
        assert_eq!(report_status(RunnerStatus::Skipped), Status::Passed);
        assert_eq!(report_status(RunnerStatus::Undefined), Status::Passed);
    }

    #[test]
    fn test_feature_name_fallbacks() {
        let mut ctx = scenario_with_document();
        assert_eq!(feature_name(&ctx), "Windows");

        ctx.gherkin_document = None;
        assert_eq!(feature_name(&ctx), "windows");

        ctx.pickle.uri = None;
        assert_eq!(feature_name(&ctx), UNKNOWN_FEATURE);

        ctx.pickle.name = None;
        assert_eq!(scenario_name(&ctx), UNKNOWN_SCENARIO);
    }

    #[test]
    fn test_scenario_name_falls_back_to_context_name() {
        let mut ctx = scenario_with_document();
        ctx.name = Some("Outer name".into());
        assert_eq!(scenario_name(&ctx), "Open window");

        ctx.pickle.name = Some(String::new());
        assert_eq!(scenario_name(&ctx), "Outer name");

        ctx.pickle.name = None;
        ctx.name = Some(String::new());
        assert_eq!(scenario_name(&ctx), UNKNOWN_SCENARIO);

        let parsed: ScenarioContext =
            serde_json::from_str(r#"{ "pickle": { "id": "p" }, "name": "From runner" }"#).unwrap();
        assert_eq!(scenario_name(&parsed), "From runner");
    }

    #[tokio::test]
    async fn test_step_label_uses_resolved_keyword() {
        let tmp = TempDir::new().unwrap();
        let mut coordinator = coordinator(&tmp);
        coordinator.before_scenario(&scenario_with_document()).await.unwrap();

        coordinator.before_step(&step("the main page", "s1"));
        coordinator.after_step(&StepContext::default(), &RunnerResult::passed()).await;
        coordinator.before_step(&step("an orphan step", "nope"));
        coordinator.after_step(&StepContext::default(), &RunnerResult::passed()).await;
        coordinator.before_step(&StepContext::default());

        let steps = coordinator.recorder.take_steps();
        assert_eq!(steps[0].name, "GIVEN the main page");
        assert_eq!(steps[1].name, "an orphan step");
        assert_eq!(steps[2].name, UNKNOWN_STEP);
    }

    #[tokio::test]
    async fn test_session_destroyed_even_when_result_cannot_be_written() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("results");
        std::fs::write(&blocker, "in the way").unwrap();
        let config = HarnessConfig {
            results_dir: blocker,
            ..Default::default()
        };
        let mut coordinator = LifecycleCoordinator::new(config, MockFactory::new());

        coordinator.before_scenario(&scenario_with_document()).await.unwrap();
        let written = coordinator
            .after_scenario(&scenario_with_document(), &RunnerResult::failed("assertion"))
            .await;

        assert!(written.is_none());
        assert!(!coordinator.sessions().is_active());
        assert_eq!(coordinator.phase(), Phase::Finalized);
    }

    #[tokio::test]
    async fn test_after_scenario_without_start_still_tears_down() {
        let tmp = TempDir::new().unwrap();
        let mut coordinator = coordinator(&tmp);
        coordinator.session().await.unwrap();

        let written = coordinator
            .after_scenario(&ScenarioContext::default(), &RunnerResult::passed())
            .await;

        assert!(written.is_none());
        assert!(!coordinator.sessions().is_active());
    }

    #[tokio::test]
    async fn test_launch_failure_propagates_from_before_scenario() {
        let tmp = TempDir::new().unwrap();
        let config = HarnessConfig {
            results_dir: tmp.path().to_path_buf(),
            ..Default::default()
        };
        let mut coordinator =
            LifecycleCoordinator::new(config, MockFactory::failing("no driver server"));

        let err = coordinator
            .before_scenario(&scenario_with_document())
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::Launch(_)));

        let written = coordinator
            .after_scenario(&scenario_with_document(), &RunnerResult::failed("launch failed"))
            .await
            .unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(written).unwrap()).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["statusDetails"]["message"], "launch failed");
    }

    #[tokio::test]
    async fn test_capture_without_session_does_not_launch() {
        let tmp = TempDir::new().unwrap();
        let mut coordinator = coordinator(&tmp);

        let outcome = coordinator.capture("nothing to see", &[]).await;

        assert!(matches!(outcome, CaptureOutcome::Failed { .. }));
        assert_eq!(coordinator.sessions().factory().launch_count(), 0);
    }

    #[tokio::test]
    async fn test_environment_uses_first_scenario_values() {
        let tmp = TempDir::new().unwrap();
        let mut coordinator = coordinator(&tmp);
        coordinator.before_run().await;
        coordinator.before_scenario(&scenario_with_document()).await.unwrap();
        coordinator
            .after_scenario(&scenario_with_document(), &RunnerResult::passed())
            .await;

        let path = coordinator.after_run().unwrap();
        assert_eq!(
            std::fs::read_to_string(path).unwrap(),
            "Environment=QA\nBrowser=CHROME"
        );
    }

    #[tokio::test]
    async fn test_environment_written_without_scenarios() {
        let tmp = TempDir::new().unwrap();
        let config = HarnessConfig {
            results_dir: tmp.path().to_path_buf(),
            browser: pagecheck_common::BrowserKind::Firefox,
            ..Default::default()
        };
        let mut coordinator = LifecycleCoordinator::new(config, MockFactory::new());

        let path = coordinator.after_run().unwrap();
        assert!(std::fs::read_to_string(path).unwrap().ends_with("Browser=FIREFOX"));
    }
}

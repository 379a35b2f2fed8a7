//! Per-scenario step and attachment recorder
//!
//! The recorder buffers [`StepRecord`]s for the scenario in flight. Captures
//! are fail-soft: every capture returns a [`CaptureOutcome`] instead of an
//! error, so a broken screenshot can never fail the step that asked for it.

use std::future::Future;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pagecheck_common::{AttachmentRecord, MediaKind, Status, StepRecord};
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::driver::{BrowserDriver, ElementRef};
use crate::report::ReportStore;

const HIGHLIGHT_SCRIPT: &str = "var element = arguments[0];\
 var original = { border: element.style.border, outline: element.style.outline };\
 element.style.border = '3px solid red';\
 element.style.outline = '2px solid orange';\
 return original;";

const RESTORE_SCRIPT: &str = "var element = arguments[0];\
 var style = arguments[1] || {};\
 element.style.border = style.border || '';\
 element.style.outline = style.outline || '';";

/// Handle to a step started by [`EvidenceRecorder::start_step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepHandle {
    generation: u64,
    index: usize,
}

impl StepHandle {
    /// Position of the step in the scenario's step list
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Result of a fail-soft capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Written and linked to the step
    Attached { uuid: Uuid, step: StepHandle },
    /// Written, but no open step to link it to
    Detached { uuid: Uuid },
    /// Nothing usable was written
    Failed { reason: String },
}

impl CaptureOutcome {
    /// Attachment id when a blob was written
    pub fn uuid(&self) -> Option<Uuid> {
        match self {
            CaptureOutcome::Attached { uuid, .. } | CaptureOutcome::Detached { uuid } => Some(*uuid),
            CaptureOutcome::Failed { .. } => None,
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self, CaptureOutcome::Attached { .. })
    }
}

/// Buffer of the current scenario's steps and their evidence
pub struct EvidenceRecorder {
    store: ReportStore,
    steps: Vec<StepRecord>,
    current: Option<usize>,
    generation: u64,
}

impl EvidenceRecorder {
    pub fn new(store: ReportStore) -> Self {
        Self {
            store,
            steps: Vec::new(),
            current: None,
            generation: 0,
        }
    }

    pub fn store(&self) -> &ReportStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Append an open step and make it current. A previously current step is
    /// not closed; that is the caller's job.
    pub fn start_step(&mut self, name: impl Into<String>) -> StepHandle {
        let step = StepRecord::open(name);
        debug!("Step started: {}", step.name);
        self.steps.push(step);

        let index = self.steps.len() - 1;
        self.current = Some(index);
        StepHandle {
            generation: self.generation,
            index,
        }
    }

    /// Close the current step. No-op when no step is current.
    pub fn end_step(&mut self, status: Status) {
        let Some(index) = self.current.take() else {
            debug!("end_step without an open step ignored");
            return;
        };
        if let Some(step) = self.steps.get_mut(index) {
            step.close(status);
            debug!("Step ended: {} ({:?})", step.name, status);
        }
    }

    pub fn current_step(&self) -> Option<StepHandle> {
        self.current.map(|index| StepHandle {
            generation: self.generation,
            index,
        })
    }

    /// Return the buffered steps and reset. Each scenario's steps are handed out once.
    pub fn take_steps(&mut self) -> Vec<StepRecord> {
        self.reset();
        std::mem::take(&mut self.steps)
    }

    /// Drop any buffered state, e.g. left over from an aborted scenario
    pub fn clear(&mut self) {
        if !self.steps.is_empty() {
            warn!("Discarding {} stale step(s) from a previous scenario", self.steps.len());
        }
        self.reset();
        self.steps.clear();
    }

    fn reset(&mut self) {
        self.current = None;
        self.generation += 1;
    }

    /// Capture the page, highlighting `targets` for the duration of the shot
    pub async fn capture_screenshot(
        &mut self,
        driver: &dyn BrowserDriver,
        step: Option<StepHandle>,
        name: &str,
        targets: &[ElementRef],
    ) -> CaptureOutcome {
        let encoded = match with_highlight(driver, targets, driver.screenshot_base64()).await {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!("Screenshot '{}' failed: {}", name, e);
                return CaptureOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let bytes = match STANDARD.decode(encoded.trim()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Screenshot '{}' is not valid base64: {}", name, e);
                return CaptureOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        self.persist(step, name, MediaKind::Png, &bytes)
    }

    /// Attach a text blob
    pub fn attach_text(&mut self, step: Option<StepHandle>, name: &str, content: &str) -> CaptureOutcome {
        self.persist(step, name, MediaKind::Text, content.as_bytes())
    }

    fn persist(
        &mut self,
        step: Option<StepHandle>,
        name: &str,
        media: MediaKind,
        bytes: &[u8],
    ) -> CaptureOutcome {
        let uuid = Uuid::new_v4();
        let source = match self.store.write_blob(&uuid, media, bytes) {
            Ok(source) => source,
            Err(e) => {
                warn!("Attachment '{}' could not be written: {}", name, e);
                return CaptureOutcome::Failed {
                    reason: e.to_string(),
                };
            }
        };

        let record = AttachmentRecord {
            uuid,
            name: name.to_string(),
            source,
            media,
        };

        match step.filter(|handle| Some(*handle) == self.current_step()) {
            Some(handle) => {
                self.steps[handle.index].attachments.push(record);
                CaptureOutcome::Attached { uuid, step: handle }
            }
            None => {
                warn!(
                    "No open step for attachment '{}'; saved as {} but left out of the report",
                    name, record.source
                );
                CaptureOutcome::Detached { uuid }
            }
        }
    }
}

/// Run `body` with `targets` highlighted; original styling is restored on every path
async fn with_highlight<T, Fut>(driver: &dyn BrowserDriver, targets: &[ElementRef], body: Fut) -> T
where
    Fut: Future<Output = T>,
{
    let mut originals: Vec<(&ElementRef, Value)> = Vec::with_capacity(targets.len());
    for element in targets {
        match driver
            .execute_script(HIGHLIGHT_SCRIPT, vec![element.to_json()])
            .await
        {
            Ok(style) => originals.push((element, style)),
            Err(e) => {
                debug!("Highlight of {} failed: {}", element.id, e);
                originals.push((element, Value::Null));
            }
        }
    }

    let output = body.await;

    for (element, style) in originals {
        if let Err(e) = driver
            .execute_script(RESTORE_SCRIPT, vec![element.to_json(), style])
            .await
        {
            debug!("Restoring style of {} failed: {}", element.id, e);
        }
    }

    output
}

//! Results directory writer

use std::path::{Path, PathBuf};

use pagecheck_common::{EnvironmentRecord, MediaKind, ScenarioResult};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{E2eError, E2eResult};

/// Writes report artifacts into one results directory
#[derive(Debug, Clone)]
pub struct ReportStore {
    dir: PathBuf,
}

impl ReportStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn ensure_dir(&self) -> E2eResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Persist an evidence blob and return its file name. The file is verified to exist.
    pub fn write_blob(&self, uuid: &Uuid, media: MediaKind, bytes: &[u8]) -> E2eResult<String> {
        self.ensure_dir()?;

        let file_name = media.file_name(uuid);
        let path = self.dir.join(&file_name);
        std::fs::write(&path, bytes)?;

        if !path.exists() {
            return Err(E2eError::Report(format!(
                "attachment missing after write: {}",
                path.display()
            )));
        }

        debug!("Wrote {} ({} bytes)", file_name, bytes.len());
        Ok(file_name)
    }

    /// Write `<uuid>-result.json`
    pub fn write_result(&self, result: &ScenarioResult) -> E2eResult<PathBuf> {
        self.ensure_dir()?;

        let path = self.dir.join(result.file_name());
        let json = serde_json::to_string_pretty(result)?;
        std::fs::write(&path, json)?;

        info!("Result written to: {}", path.display());
        Ok(path)
    }

    /// Write `environment.properties`
    pub fn write_environment(&self, record: &EnvironmentRecord) -> E2eResult<PathBuf> {
        self.ensure_dir()?;

        let path = self.dir.join(EnvironmentRecord::FILE_NAME);
        std::fs::write(&path, record.to_properties())?;

        info!("Environment written to: {}", path.display());
        Ok(path)
    }
}

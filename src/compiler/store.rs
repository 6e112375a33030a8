//! File-based store for compile runs.
//!
//! Layout under the runs directory:
//!
//! ```text
//! <runs>/<run-id>/run.json        run summary (reports, status, counts)
//! <runs>/<run-id>/script.js       generated script, when one was emitted
//! <runs>/<run-id>/steps.json      normalized steps   (intermediates only)
//! <runs>/<run-id>/intents.json    described intents  (intermediates only)
//! <runs>/<run-id>/ir.json         IR nodes           (intermediates only)
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::fs;
use uuid::Uuid;

use super::run::CompileRun;

pub const RUN_FILE: &str = "run.json";
pub const SCRIPT_FILE: &str = "script.js";
pub const STEPS_FILE: &str = "steps.json";
pub const INTENTS_FILE: &str = "intents.json";
pub const IR_FILE: &str = "ir.json";

/// Persists run summaries and artifacts
pub struct RunStore {
    /// Directory holding one subdirectory per run
    base_dir: PathBuf,
}

impl RunStore {
    /// Store rooted at the configured runs directory
    pub fn open_default() -> Result<Self> {
        Ok(Self::new(crate::config::runs_dir()?))
    }

    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.base_dir.join(run_id.to_string())
    }

    /// Write a run; intermediates only when asked
    pub async fn save(&self, run: &CompileRun, intermediates: bool) -> Result<PathBuf> {
        let run_dir = self.run_dir(run.id);
        fs::create_dir_all(&run_dir)
            .await
            .with_context(|| format!("Failed to create run directory: {}", run_dir.display()))?;

        write_json(&run_dir.join(RUN_FILE), run).await?;

        if let Some(script) = run.script() {
            let path = run_dir.join(SCRIPT_FILE);
            fs::write(&path, script)
                .await
                .with_context(|| format!("Failed to write script: {}", path.display()))?;
        }

        if intermediates {
            write_json(&run_dir.join(STEPS_FILE), &run.artifacts.steps).await?;
            write_json(&run_dir.join(INTENTS_FILE), &run.artifacts.intents).await?;
            write_json(&run_dir.join(IR_FILE), &run.artifacts.nodes).await?;
        }

        Ok(run_dir)
    }

    /// Load a run summary (artifacts are not restored)
    pub async fn load(&self, run_id: Uuid) -> Result<CompileRun> {
        let path = self.run_dir(run_id).join(RUN_FILE);
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Run {} not found", run_id))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse run summary: {}", path.display()))
    }

    /// Load the script of a run, if one was written
    pub async fn load_script(&self, run_id: Uuid) -> Result<Option<String>> {
        let path = self.run_dir(run_id).join(SCRIPT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let script = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read script: {}", path.display()))?;
        Ok(Some(script))
    }

    /// List all run ids in the base directory
    pub async fn list_ids(&self) -> Result<Vec<Uuid>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        let mut entries = fs::read_dir(&self.base_dir)
            .await
            .with_context(|| format!("Failed to read runs directory: {}", self.base_dir.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(id) = Uuid::parse_str(name) {
                        ids.push(id);
                    }
                }
            }
        }

        Ok(ids)
    }

    /// Most recent runs first
    pub async fn list(&self, limit: usize) -> Result<Vec<CompileRun>> {
        let mut runs = Vec::new();
        for id in self.list_ids().await? {
            // Directories without a readable summary are skipped
            if let Ok(run) = self.load(id).await {
                runs.push(run);
            }
        }

        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit);
        Ok(runs)
    }
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

//! Fabric describer.
//!
//! Spawns the `fabric` CLI with a pattern, pipes a prompt describing the step
//! to stdin and reads the one-sentence description from stdout. Any failure is
//! returned as an error; the caller falls back to the template describer.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

use crate::domain::NormalizedStep;

use super::{Describer, Description};

/// Default pattern used for step descriptions
pub const DEFAULT_PATTERN: &str = "summarize_micro";

/// Longest markup excerpt sent in a prompt
const MAX_MARKUP_CHARS: usize = 200;

/// Describer that shells out to Fabric
pub struct FabricDescriber {
    /// Path to the fabric binary
    binary_path: String,

    /// Pattern passed with `-p`
    pattern: String,

    /// Upper bound for one describe call
    call_timeout: Duration,
}

impl FabricDescriber {
    /// Create a describer for an explicit binary
    pub fn new(binary_path: impl Into<String>, pattern: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            binary_path: binary_path.into(),
            pattern: pattern.into(),
            call_timeout,
        }
    }

    /// Find the binary on PATH: `fabric-ai` (Homebrew name) first, then `fabric`
    pub fn detect(pattern: impl Into<String>, call_timeout: Duration) -> Self {
        let binary_path = if std::process::Command::new("fabric-ai")
            .arg("--help")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok()
        {
            "fabric-ai"
        } else {
            "fabric"
        };
        Self::new(binary_path, pattern, call_timeout)
    }

    pub fn binary_path(&self) -> &str {
        &self.binary_path
    }

    /// Prompt sent for one step
    pub fn prompt(step: &NormalizedStep) -> String {
        let markup: String = step.element_html.chars().take(MAX_MARKUP_CHARS).collect();
        format!(
            "Describe this recorded browser action in one sentence.\n\
             Name the action and the element a user would recognize.\n\
             If the element cannot be identified safely, answer SKIP.\n\
             Return only the sentence.\n\n\
             Event Type: {}\n\
             Action: {}\n\
             URL: {}\n\
             Element: {}\n\
             Data: {}\n",
            step.original_event_type,
            step.normalized_action,
            step.clean_url,
            markup,
            step.value,
        )
    }

    async fn run_pattern(&self, input: &str) -> Result<String> {
        let mut child = Command::new(&self.binary_path)
            .args(["-p", &self.pattern])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn fabric for pattern '{}'", self.pattern))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .await
                .context("Failed to write to fabric stdin")?;
        }

        let output = timeout(self.call_timeout, child.wait_with_output())
            .await
            .with_context(|| {
                format!(
                    "Fabric pattern '{}' timed out after {:?}",
                    self.pattern, self.call_timeout
                )
            })?
            .with_context(|| format!("Failed to wait for fabric pattern '{}'", self.pattern))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Fabric pattern '{}' failed with exit code {}: {}",
                self.pattern,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        String::from_utf8(output.stdout).context("Fabric output is not valid UTF-8")
    }
}

#[async_trait]
impl Describer for FabricDescriber {
    fn name(&self) -> &str {
        "fabric"
    }

    async fn describe(&self, step: &NormalizedStep) -> Result<Description> {
        let output = self.run_pattern(&Self::prompt(step)).await?;
        // Keep the first non-empty line; patterns sometimes add commentary
        let first_line = output.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
        Ok(Description::parse(first_line))
    }

    async fn health_check(&self) -> Result<()> {
        let output = Command::new(&self.binary_path)
            .arg("-l")
            .output()
            .await
            .context("Failed to run fabric health check")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Fabric health check failed: {}", stderr.trim());
        }

        Ok(())
    }
}

//! Compile run record.
//!
//! A CompileRun is one pass of the pipeline over one trace. It carries the
//! report of every stage that ran, the final status and, outside of its JSON
//! form, the intermediate artifacts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::ReachabilityReport;
use crate::domain::{Intent, IrNode, NormalizedStep};

use super::auditor::AuditReport;
use super::emitter::EmitReport;
use super::error::{PipelineError, StageCounts};
use super::lower::LoweringReport;
use super::normalizer::NormalizationReport;
use super::safety::ValidationReport;

/// A single compilation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileRun {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Where the trace came from (file path), if known
    #[serde(default)]
    pub source: Option<String>,

    /// SHA-256 of the trace JSON
    pub fingerprint: String,

    pub status: RunStatus,

    pub started_at: DateTime<Utc>,

    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    /// Items retained after each stage
    pub counts: StageCounts,

    #[serde(default)]
    pub describer: String,

    #[serde(default)]
    pub normalization: Option<NormalizationReport>,

    #[serde(default)]
    pub validation: Option<ValidationReport>,

    #[serde(default)]
    pub lowering: Option<LoweringReport>,

    #[serde(default)]
    pub reachability: Option<ReachabilityReport>,

    #[serde(default)]
    pub emit: Option<EmitReport>,

    #[serde(default)]
    pub audit: Option<AuditReport>,

    /// Stage outputs; written separately by the run store
    #[serde(skip)]
    pub artifacts: RunArtifacts,
}

/// Intermediate outputs of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunArtifacts {
    pub steps: Vec<NormalizedStep>,
    pub intents: Vec<Intent>,
    pub nodes: Vec<IrNode>,
    pub script: Option<String>,
}

impl CompileRun {
    /// Start a run for a trace
    pub fn new(id: Uuid, source: Option<String>, fingerprint: String) -> Self {
        Self {
            id,
            source,
            fingerprint,
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            counts: StageCounts::default(),
            describer: String::new(),
            normalization: None,
            validation: None,
            lowering: None,
            reachability: None,
            emit: None,
            audit: None,
            artifacts: RunArtifacts::default(),
        }
    }

    /// Generated script, if emission succeeded
    pub fn script(&self) -> Option<&str> {
        self.artifacts.script.as_deref()
    }

    /// Finish with the given status
    pub fn finish(&mut self, status: RunStatus) {
        self.status = status;
        self.completed_at = Some(Utc::now());
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, RunStatus::Running)
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.status, RunStatus::Aborted { .. })
    }

    /// Error that ended the run, if any
    pub fn error(&self) -> Option<&PipelineError> {
        match &self.status {
            RunStatus::Aborted { error } => Some(error),
            _ => None,
        }
    }

    /// Process exit code for this run
    pub fn exit_code(&self) -> i32 {
        match self.status {
            RunStatus::Success | RunStatus::CompletedWithWarnings { .. } => 0,
            RunStatus::Running | RunStatus::Aborted { .. } => 1,
        }
    }

    /// Wall time in milliseconds, once finished
    pub fn duration_ms(&self) -> Option<i64> {
        self.completed_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

/// State of a compile run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunStatus {
    /// Stages still executing
    Running,

    /// Script emitted and audit passed
    Success,

    /// Script emitted; the advisory audit found problems
    CompletedWithWarnings { audit_errors: Vec<String> },

    /// A stage produced nothing, or the audit was configured fatal
    Aborted { error: PipelineError },
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Running
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Success => f.write_str("success"),
            Self::CompletedWithWarnings { audit_errors } => {
                write!(f, "completed with {} warning(s)", audit_errors.len())
            }
            Self::Aborted { error } => write!(f, "aborted: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::error::Stage;

    #[test]
    fn test_run_creation() {
        let run_id = Uuid::new_v4();
        let run = CompileRun::new(run_id, Some("trace.json".into()), "abc".into());

        assert_eq!(run.id, run_id);
        assert!(run.is_running());
        assert!(run.script().is_none());
        assert_eq!(run.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes() {
        let mut run = CompileRun::new(Uuid::new_v4(), None, String::new());
        run.finish(RunStatus::CompletedWithWarnings {
            audit_errors: vec!["Unbalanced braces".into()],
        });
        assert_eq!(run.exit_code(), 0);
        assert!(run.completed_at.is_some());

        run.finish(RunStatus::Aborted {
            error: PipelineError::EmptyPipelineOutput {
                stage: Stage::Normalize,
                counts: StageCounts::default(),
            },
        });
        assert_eq!(run.exit_code(), 1);
        assert!(run.is_aborted());
        assert!(run.error().is_some());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(RunStatus::Aborted {
            error: PipelineError::AuditFailure {
                errors: vec!["Missing async function".into()],
            },
        })
        .unwrap();

        assert_eq!(json["status"], "aborted");
        assert_eq!(json["error"]["kind"], "audit_failure");
    }

    #[test]
    fn test_artifacts_not_serialized() {
        let mut run = CompileRun::new(Uuid::new_v4(), None, String::new());
        run.artifacts.script = Some("// script".into());
        let json = serde_json::to_string(&run).unwrap();
        assert!(!json.contains("// script"));

        let back: CompileRun = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, run.id);
        assert!(back.artifacts.script.is_none());
    }
}

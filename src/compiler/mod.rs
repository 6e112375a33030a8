//! Compiler stages.
//!
//! This module contains:
//! - Classifier / StepNormalizer: raw events to semantic steps
//! - Selector policy: stable selector choice and grammar checking
//! - SafetyGate: intent validation and deduplication
//! - IrBuilder: lowering to typed IR
//! - CodeEmitter / CodeAuditor: script generation and static audit
//! - Compiler: the driver that runs them in order
//! - RunStore: persistence of run summaries and artifacts

pub mod auditor;
pub mod classifier;
pub mod emitter;
pub mod error;
pub mod lower;
pub mod markup;
pub mod normalizer;
pub mod pipeline;
pub mod run;
pub mod safety;
pub mod selector;
pub mod store;

// Re-export commonly used types
pub use auditor::{AuditReport, CodeAuditor, ScriptStats};
pub use emitter::{CodeEmitter, EmitOptions, EmitReport, Emission, SelectorOccurrenceTable};
pub use error::{PipelineError, Stage, StageCounts, StepError, StepRejection};
pub use lower::{IrBuilder, LoweringReport};
pub use normalizer::{clean_url, NormalizationReport, StepNormalizer};
pub use pipeline::{fingerprint, load_trace, parse_trace, Compiler};
pub use run::{CompileRun, RunArtifacts, RunStatus};
pub use safety::{SafetyGate, ValidationReport};
pub use store::RunStore;

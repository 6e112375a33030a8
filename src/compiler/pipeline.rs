//! Compiler driver.
//!
//! Runs every stage in order over one trace and records each stage's report
//! on the CompileRun. The first stage boundary that yields zero items aborts
//! the run with `EmptyPipelineOutput`; per-step rejections never do.

use std::path::Path;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{self, Describer, Description, ReachabilityCheck, RuleBasedDescriber};
use crate::domain::{Intent, NormalizedStep, RawEvent};

use super::auditor::CodeAuditor;
use super::emitter::{CodeEmitter, EmitOptions};
use super::error::{PipelineError, Stage};
use super::lower::IrBuilder;
use super::normalizer::StepNormalizer;
use super::run::{CompileRun, RunStatus};
use super::safety::SafetyGate;
use super::selector;

/// Parse a trace: a JSON array of recorded events
pub fn parse_trace(json: &str) -> Result<Vec<RawEvent>> {
    serde_json::from_str(json).context("Trace is not a JSON array of events")
}

/// Read and parse a trace file
pub async fn load_trace(path: &Path) -> Result<Vec<RawEvent>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read trace: {}", path.display()))?;
    parse_trace(&content).with_context(|| format!("Failed to parse trace: {}", path.display()))
}

/// SHA-256 of the serialized trace, hex encoded
pub fn fingerprint(events: &[RawEvent]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(events).unwrap_or_default());
    hex::encode(hasher.finalize())
}

/// Full compilation pipeline
pub struct Compiler {
    describer: Box<dyn Describer>,
    reachability: Option<Box<dyn ReachabilityCheck>>,
    emitter: CodeEmitter,
    audit_fatal: bool,
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new(Box::new(RuleBasedDescriber::new()))
    }
}

impl Compiler {
    /// Create a compiler around a describer
    pub fn new(describer: Box<dyn Describer>) -> Self {
        Self {
            describer,
            reachability: None,
            emitter: CodeEmitter::default(),
            audit_fatal: false,
        }
    }

    pub fn with_reachability(mut self, check: Box<dyn ReachabilityCheck>) -> Self {
        self.reachability = Some(check);
        self
    }

    pub fn with_emit_options(mut self, options: EmitOptions) -> Self {
        self.emitter = CodeEmitter::new(options);
        self
    }

    /// Abort runs whose script fails the audit
    pub fn with_audit_fatal(mut self, fatal: bool) -> Self {
        self.audit_fatal = fatal;
        self
    }

    pub fn describer_name(&self) -> &str {
        self.describer.name()
    }

    /// Compile a trace into a script
    #[instrument(skip(self, events, base_url), fields(events = events.len(), describer = %self.describer_name()))]
    pub async fn compile(&self, events: &[RawEvent], base_url: Option<&str>) -> CompileRun {
        let run_id = Uuid::new_v4();
        let mut run = CompileRun::new(run_id, None, fingerprint(events));
        run.describer = self.describer_name().to_string();
        info!(%run_id, "Starting compilation");

        run.counts.raw_events = events.len();
        if events.is_empty() {
            return abort(run, Stage::Load);
        }

        // Normalize
        let (steps, normalization) = StepNormalizer::new().normalize_all(events);
        run.counts.normalized_steps = steps.len();
        run.normalization = Some(normalization);
        if steps.is_empty() {
            return abort(run, Stage::Normalize);
        }

        // Describe
        let mut intents = Vec::with_capacity(steps.len());
        for step in &steps {
            intents.push(self.assemble_intent(step).await);
        }
        run.counts.intents = intents.len();
        run.artifacts.steps = steps;
        run.artifacts.intents = intents.clone();

        // Validate
        let (valid, validation) = SafetyGate::new().validate_and_clean(intents);
        run.counts.valid_intents = validation.valid_count;
        run.counts.deduplicated_intents = valid.len();
        run.validation = Some(validation);
        if valid.is_empty() {
            return abort(run, Stage::Validate);
        }

        // Lower
        let (mut nodes, lowering) = IrBuilder::new().lower_all(&valid);
        run.counts.ir_nodes = nodes.len();
        run.lowering = Some(lowering);
        if nodes.is_empty() {
            return abort(run, Stage::Lower);
        }

        // Optional live filter
        if let Some(check) = &self.reachability {
            match check.check(nodes.clone()).await {
                Ok((kept, report)) => {
                    nodes = kept;
                    run.reachability = Some(report);
                }
                Err(e) => {
                    warn!(check = %check.name(), error = %e, "Reachability check failed, keeping all nodes");
                }
            }
            run.counts.ir_nodes = nodes.len();
            if nodes.is_empty() {
                return abort(run, Stage::Reachability);
            }
        }
        run.artifacts.nodes = nodes.clone();

        // Emit
        let emission = match self.emitter.emit(&nodes, base_url) {
            Ok(emission) => emission,
            Err(PipelineError::EmptyPipelineOutput { stage, .. }) => return abort(run, stage),
            Err(other) => return fail(run, other),
        };
        run.counts.emitted_nodes = emission.report.emitted_count;
        run.emit = Some(emission.report);

        // Audit
        let audit = CodeAuditor::new().audit(&emission.script);
        run.artifacts.script = Some(emission.script);
        let failure = audit.to_failure();
        let audit_errors = audit.errors.clone();
        run.audit = Some(audit);

        match failure {
            None => {
                run.finish(RunStatus::Success);
                info!(%run_id, counts = %run.counts, "Compilation succeeded");
                run
            }
            Some(error) if self.audit_fatal => fail(run, error),
            Some(_) => {
                warn!(%run_id, errors = audit_errors.len(), "Compilation completed with audit warnings");
                run.finish(RunStatus::CompletedWithWarnings { audit_errors });
                run
            }
        }
    }

    /// Pair a step with its description and policy-chosen selector
    async fn assemble_intent(&self, step: &NormalizedStep) -> Intent {
        if step.is_context() {
            return Intent::new(step.clone(), adapters::template(step), None);
        }

        let text = match self.describer.describe(step).await {
            Ok(description) => {
                if description == Description::Skip {
                    debug!(index = step.index, "Describer asked to skip step");
                }
                description.into_text()
            }
            Err(e) => {
                warn!(index = step.index, error = %e, "Describer failed, using template");
                adapters::template(step)
            }
        };

        Intent::new(step.clone(), text, selector::choose(&step.element_hints))
    }
}

fn abort(run: CompileRun, stage: Stage) -> CompileRun {
    let error = PipelineError::EmptyPipelineOutput {
        stage,
        counts: run.counts,
    };
    fail(run, error)
}

fn fail(mut run: CompileRun, error: PipelineError) -> CompileRun {
    error!(run_id = %run.id, %error, "Compilation aborted");
    run.finish(RunStatus::Aborted { error });
    run
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ReachabilityReport;
    use crate::domain::IrNode;
    use async_trait::async_trait;

    fn click(id: &str) -> RawEvent {
        RawEvent::new(
            "STEPS_FEATURE_CLICK_EVENT",
            "https://shop.test/",
            format!("<button id=\"{id}\">Go</button>"),
            "",
        )
    }

    struct SkipAll;

    #[async_trait]
    impl Describer for SkipAll {
        fn name(&self) -> &str {
            "skip-all"
        }

        async fn describe(&self, _step: &NormalizedStep) -> Result<Description> {
            Ok(Description::Skip)
        }
    }

    struct Broken;

    #[async_trait]
    impl Describer for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        async fn describe(&self, _step: &NormalizedStep) -> Result<Description> {
            anyhow::bail!("backend down")
        }
    }

    struct DropEverything;

    #[async_trait]
    impl ReachabilityCheck for DropEverything {
        fn name(&self) -> &str {
            "drop"
        }

        async fn check(&self, _nodes: Vec<IrNode>) -> Result<(Vec<IrNode>, ReachabilityReport)> {
            Ok((Vec::new(), ReachabilityReport::default()))
        }
    }

    #[tokio::test]
    async fn test_compile_success() {
        let run = Compiler::default()
            .compile(&[click("go"), click("next")], None)
            .await;

        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.counts.raw_events, 2);
        assert_eq!(run.counts.emitted_nodes, 2);
        assert_eq!(run.describer, "rules");
        let script = run.script().unwrap();
        assert!(script.contains("page.locator('#go').first()"));
        assert!(script.contains("page.locator('#next').first()"));
    }

    #[tokio::test]
    async fn test_empty_trace_aborts_at_load() {
        let run = Compiler::default().compile(&[], None).await;
        assert!(matches!(
            run.error(),
            Some(PipelineError::EmptyPipelineOutput { stage: Stage::Load, .. })
        ));
    }

    #[tokio::test]
    async fn test_skipped_steps_abort_at_validate() {
        let compiler = Compiler::new(Box::new(SkipAll));
        assert_eq!(compiler.describer_name(), "skip-all");

        let run = compiler.compile(&[click("go")], None).await;
        assert_eq!(run.describer, "skip-all");
        assert_eq!(run.artifacts.intents[0].text, "");

        match run.error() {
            Some(PipelineError::EmptyPipelineOutput { stage, counts }) => {
                assert_eq!(*stage, Stage::Validate);
                assert_eq!(counts.intents, 1);
                assert_eq!(counts.valid_intents, 0);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(run.exit_code(), 1);
    }

    #[tokio::test]
    async fn test_describer_failure_falls_back_to_template() {
        let run = Compiler::new(Box::new(Broken))
            .compile(&[click("go")], None)
            .await;
        assert_eq!(run.status, RunStatus::Success);
        assert!(run.artifacts.intents[0].text.starts_with("Click on button"));
    }

    #[tokio::test]
    async fn test_reachability_can_empty_the_run() {
        let run = Compiler::default()
            .with_reachability(Box::new(DropEverything))
            .compile(&[click("go")], None)
            .await;
        assert!(matches!(
            run.error(),
            Some(PipelineError::EmptyPipelineOutput { stage: Stage::Reachability, .. })
        ));
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint(&[click("go")]);
        assert_eq!(a, fingerprint(&[click("go")]));
        assert_ne!(a, fingerprint(&[click("next")]));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_parse_trace_rejects_objects() {
        assert!(parse_trace("{}").is_err());
        assert_eq!(parse_trace("[]").unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_trace_with_id_and_step_id() {
        let events = parse_trace(
            r#"[{"eventType":"STEPS_FEATURE_CLICK_EVENT","eventElement":"<button id=\"go\">Go</button>","id":"e1","stepId":"s1"}]"#,
        )
        .unwrap();
        assert_eq!(events.len(), 1);

        let run = Compiler::default().compile(&events, None).await;
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.artifacts.steps[0].original_step_id, "e1");
    }
}

//! Command-line interface for stepscript.
//!
//! Provides commands for compiling traces, inspecting normalization, auditing
//! scripts, listing runs and searching the step index.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;
use uuid::Uuid;

use crate::adapters::{Describer, FabricDescriber, HttpReachability, RuleBasedDescriber};
use crate::compiler::{
    self, CodeAuditor, CompileRun, Compiler, RunStatus, RunStore, StepNormalizer,
};
use crate::config::{self, DescriberBackend, ResolvedConfig};
use crate::domain::RawEvent;
use crate::index::{StepIndex, TextChunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};

/// stepscript - Compile recorded browser traces into Playwright scripts
#[derive(Parser, Debug)]
#[command(name = "stepscript")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a trace into a script
    Compile {
        /// Trace file (JSON array of events); `-` reads stdin
        trace: PathBuf,

        /// Write the script here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Initial URL for the script (overrides the first navigation)
        #[arg(long)]
        base_url: Option<String>,

        /// Describer backend
        #[arg(long, value_enum)]
        describer: Option<DescriberBackend>,

        /// Drop navigations whose URL is unreachable
        #[arg(long)]
        check_reachability: bool,

        /// Treat audit failures as fatal
        #[arg(long)]
        audit_fatal: bool,

        /// Also save steps.json, intents.json and ir.json with the run
        #[arg(long)]
        save_intermediates: bool,
    },

    /// Print the normalized steps of a trace as JSON
    Normalize {
        /// Trace file; `-` reads stdin
        trace: PathBuf,
    },

    /// Audit an existing script
    Audit {
        /// Script file
        script: PathBuf,
    },

    /// List recent runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the summary of a run
    Status {
        /// Run ID (UUID)
        run_id: String,
    },

    /// Build the step index from a trace
    Index {
        /// Trace file; `-` reads stdin
        trace: PathBuf,

        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,

        #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
        overlap: usize,
    },

    /// Search the step index
    Search {
        /// Search query
        query: String,

        /// Maximum number of hits
        #[arg(short, default_value = "5")]
        k: usize,
    },

    /// Show resolved configuration (debug)
    Config,
}

/// Options of the compile command
struct CompileArgs {
    trace: PathBuf,
    output: Option<PathBuf>,
    base_url: Option<String>,
    describer: Option<DescriberBackend>,
    check_reachability: bool,
    audit_fatal: bool,
    save_intermediates: bool,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Compile {
                trace,
                output,
                base_url,
                describer,
                check_reachability,
                audit_fatal,
                save_intermediates,
            } => {
                compile_trace(CompileArgs {
                    trace,
                    output,
                    base_url,
                    describer,
                    check_reachability,
                    audit_fatal,
                    save_intermediates,
                })
                .await
            }
            Commands::Normalize { trace } => normalize_trace(&trace).await,
            Commands::Audit { script } => audit_script(&script).await,
            Commands::Runs { limit } => list_runs(limit).await,
            Commands::Status { run_id } => show_status(&run_id).await,
            Commands::Index {
                trace,
                chunk_size,
                overlap,
            } => build_index(&trace, chunk_size, overlap).await,
            Commands::Search { query, k } => search_index(&query, k).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Read a trace from a file, or stdin for `-`
async fn read_trace(path: &Path) -> Result<Vec<RawEvent>> {
    if path == Path::new("-") {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        return compiler::parse_trace(&buffer);
    }
    compiler::load_trace(path).await
}

/// Pick the describer, falling back to templates when fabric is unusable
async fn build_describer(backend: DescriberBackend, cfg: &ResolvedConfig) -> Box<dyn Describer> {
    match backend {
        DescriberBackend::Rules => Box::new(RuleBasedDescriber::new()),
        DescriberBackend::Fabric => {
            let settings = &cfg.describer;
            let fabric = match &settings.fabric_binary {
                Some(binary) => {
                    FabricDescriber::new(binary.clone(), settings.pattern.clone(), settings.timeout())
                }
                None => FabricDescriber::detect(settings.pattern.clone(), settings.timeout()),
            };

            match fabric.health_check().await {
                Ok(()) => Box::new(fabric),
                Err(e) => {
                    warn!(binary = %fabric.binary_path(), error = %e, "Fabric unavailable, using template describer");
                    Box::new(RuleBasedDescriber::new())
                }
            }
        }
    }
}

/// Compile a trace and save the run
async fn compile_trace(args: CompileArgs) -> Result<()> {
    let cfg = config::config()?;
    let events = read_trace(&args.trace).await?;

    let backend = args.describer.unwrap_or(cfg.describer.backend);
    let mut compiler = Compiler::new(build_describer(backend, cfg).await)
        .with_emit_options(cfg.emitter.clone())
        .with_audit_fatal(args.audit_fatal || cfg.audit_fatal);

    if args.check_reachability || cfg.reachability.enabled {
        let check = HttpReachability::new(cfg.reachability.timeout())?;
        compiler = compiler.with_reachability(Box::new(check));
    }

    let base_url = args.base_url.or_else(|| cfg.base_url.clone());
    let mut run = compiler.compile(&events, base_url.as_deref()).await;
    run.source = Some(args.trace.display().to_string());

    let store = RunStore::open_default()?;
    let run_dir = store.save(&run, args.save_intermediates).await?;

    if let (false, Some(script)) = (run.is_aborted(), run.script()) {
        match &args.output {
            Some(path) => {
                std::fs::write(path, script)
                    .with_context(|| format!("Failed to write script: {}", path.display()))?;
            }
            None => {
                let mut stdout = io::stdout().lock();
                stdout
                    .write_all(script.as_bytes())
                    .context("Failed to write script to stdout")?;
            }
        }
    }

    print_summary(&run);
    eprintln!("[Run {} saved to {}]", run.id, run_dir.display());

    let code = run.exit_code();
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// Per-stage summary on stderr
fn print_summary(run: &CompileRun) {
    eprintln!();
    eprintln!("Run {}: {}", run.id, run.status);
    eprintln!("  Describer: {}", run.describer);
    eprintln!("  Counts:    {}", run.counts);

    if let Some(report) = &run.normalization {
        for rejection in &report.dropped {
            eprintln!("  dropped   {}", rejection);
        }
    }
    if let Some(report) = &run.validation {
        for rejection in &report.rejections {
            eprintln!("  rejected  {}", rejection);
        }
        for removal in &report.dedup_removals {
            eprintln!("  dedup     {}", removal.as_rejection());
        }
    }
    if let Some(report) = &run.lowering {
        for rejection in &report.rejections {
            eprintln!("  lowering  {}", rejection);
        }
    }
    if let Some(report) = &run.reachability {
        for node in &report.dropped {
            match node.step_index {
                Some(index) => eprintln!("  offline   Step {}: {} ({})", index, node.url, node.reason),
                None => eprintln!("  offline   {} ({})", node.url, node.reason),
            }
        }
    }
    if let Some(report) = &run.emit {
        for rejection in &report.dropped {
            eprintln!("  emit      {}", rejection);
        }
    }
    if let Some(report) = &run.audit {
        for error in &report.errors {
            eprintln!("  audit     {}", error);
        }
    }
}

/// Print normalized steps
async fn normalize_trace(trace: &Path) -> Result<()> {
    let events = read_trace(trace).await?;
    let (steps, report) = StepNormalizer::new().normalize_all(&events);

    let json = serde_json::to_string_pretty(&steps).context("Failed to serialize steps")?;
    println!("{}", json);

    eprintln!(
        "\n[{} events -> {} steps ({} context, {} action, {} dropped)]",
        report.input_count,
        report.step_count(),
        report.context_count,
        report.action_count,
        report.dropped.len()
    );
    for rejection in &report.dropped {
        eprintln!("  {}", rejection);
    }

    Ok(())
}

/// Audit a script file
async fn audit_script(path: &Path) -> Result<()> {
    let script = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read script: {}", path.display()))?;

    let report = CodeAuditor::new().audit(&script);
    let stats = &report.stats;

    println!("Script: {}", path.display());
    println!("  Lines:     {} ({} non-empty)", stats.total_lines, stats.non_empty_lines);
    println!("  Functions: {}", stats.functions);
    println!("  Awaits:    {}", stats.await_statements);
    println!("  Gotos:     {}", stats.goto_calls);
    println!("  Locators:  {}", stats.locators);
    println!("  Waits:     {}", stats.waits);
    println!("  Try:       {}", stats.try_blocks);
    println!("  Throws:    {}", stats.throws);
    println!("  Comments:  {}", stats.comments);
    println!();

    if report.passed {
        println!("Audit passed");
        return Ok(());
    }

    println!("Audit failed:");
    for error in &report.errors {
        println!("  - {}", error);
    }
    std::process::exit(1);
}

/// List recent runs
async fn list_runs(limit: usize) -> Result<()> {
    let store = RunStore::open_default()?;
    let runs = store.list(limit).await?;

    if runs.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    println!("{:<38} {:<22} {:<10} {:<24}", "RUN ID", "STARTED", "EMITTED", "STATUS");
    println!("{}", "-".repeat(96));

    for run in runs {
        let status = match &run.status {
            RunStatus::Running => "running".to_string(),
            RunStatus::Success => "success".to_string(),
            RunStatus::CompletedWithWarnings { audit_errors } => {
                format!("warnings ({})", audit_errors.len())
            }
            RunStatus::Aborted { .. } => "aborted".to_string(),
        };
        println!(
            "{:<38} {:<22} {:<10} {:<24}",
            run.id,
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.counts.emitted_nodes,
            status
        );
    }

    Ok(())
}

/// Show the summary of one run
async fn show_status(run_id_str: &str) -> Result<()> {
    let run_id = Uuid::parse_str(run_id_str)
        .with_context(|| format!("Invalid run ID: {}", run_id_str))?;

    let store = RunStore::open_default()?;
    let run = store.load(run_id).await?;

    println!("Run ID:      {}", run.id);
    println!("Source:      {}", run.source.as_deref().unwrap_or("(unknown)"));
    println!("Fingerprint: {}", run.fingerprint);
    println!("Status:      {}", run.status);
    println!("Started:     {}", run.started_at);
    if let Some(completed) = run.completed_at {
        println!("Completed:   {}", completed);
    }
    println!("Counts:      {}", run.counts);
    if let Some(report) = &run.normalization {
        println!("\nActions:");
        for (action, count) in &report.action_breakdown {
            println!("  {}: {}", action, count);
        }
    }
    if let Some(report) = &run.lowering {
        println!("\nIR actions:");
        for (action, count) in &report.action_distribution {
            println!("  {}: {}", action, count);
        }
    }
    if store.load_script(run_id).await?.is_some() {
        println!("\nScript: {}", store.run_dir(run_id).join(compiler::store::SCRIPT_FILE).display());
    }

    Ok(())
}

/// Build and save the step index
async fn build_index(trace: &Path, chunk_size: usize, overlap: usize) -> Result<()> {
    let chunker = TextChunker::new(chunk_size, overlap)?;
    let events = read_trace(trace).await?;

    let index = StepIndex::build(&events, &chunker, Some(trace.display().to_string()));
    let path = StepIndex::default_path()?;
    index.save(&path).await?;

    println!(
        "Indexed {} steps into {} chunks ({})",
        index.documents,
        index.len(),
        path.display()
    );
    Ok(())
}

/// Search the step index
async fn search_index(query: &str, k: usize) -> Result<()> {
    let path = StepIndex::default_path()?;
    if !path.exists() {
        anyhow::bail!("No step index at {}. Run `stepscript index <trace>` first", path.display());
    }

    let index = StepIndex::load(&path).await?;
    let hits = index.search(query, k);

    if hits.is_empty() {
        println!("No results for: {}", query);
        return Ok(());
    }

    println!("Found {} result(s):\n", hits.len());
    for hit in hits {
        println!(
            "[step {} chunk {}] score {} - {}",
            hit.chunk.step_index, hit.chunk.chunk_index, hit.score, hit.chunk.event_type
        );
        for line in hit.chunk.text.lines() {
            println!("    {}", line);
        }
        println!();
    }

    Ok(())
}

/// Show resolved configuration
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("stepscript configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:  {}", cfg.home.display());
    println!("  Runs:  {}", config::runs_dir()?.display());
    println!("  Index: {}", config::index_path()?.display());
    println!();
    println!("Emitter:");
    println!("  Action timeout:     {}ms", cfg.emitter.action_timeout_ms);
    println!("  Navigation timeout: {}ms", cfg.emitter.navigation_timeout_ms);
    println!("  Placeholder URL:    {}", cfg.emitter.placeholder_url);
    println!("  Base URL:           {}", cfg.base_url.as_deref().unwrap_or("(first navigation)"));
    println!();
    println!("Describer:");
    println!("  Backend: {}", cfg.describer.backend);
    println!("  Binary:  {}", cfg.describer.fabric_binary.as_deref().unwrap_or("(detect)"));
    println!("  Pattern: {}", cfg.describer.pattern);
    println!("  Timeout: {}s", cfg.describer.timeout_seconds);
    println!();
    println!("Reachability:");
    println!("  Enabled: {}", cfg.reachability.enabled);
    println!("  Timeout: {}s", cfg.reachability.timeout_seconds);
    println!();
    println!("Audit fatal: {}", cfg.audit_fatal);

    Ok(())
}

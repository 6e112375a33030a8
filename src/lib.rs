//! stepscript - Compile recorded browser traces into Playwright scripts
//!
//! A trace is the ordered list of events a browser recorder captured while a
//! user worked through a page. stepscript turns it into a runnable Playwright
//! script, dropping every step it cannot express safely.
//!
//! # Architecture
//!
//! The compiler is a sequence of stages, each returning its output and a
//! report:
//! - Classify and normalize raw events into semantic steps
//! - Describe each step and choose a stable selector (an intent)
//! - Validate intents and drop consecutive duplicates
//! - Lower to a flat typed IR
//! - Emit the script, disambiguating repeated selectors by occurrence order
//! - Audit the script statically
//!
//! A stage that yields nothing aborts the run; single bad steps never do.
//!
//! # Modules
//!
//! - `adapters`: Describers (templates, Fabric) and the reachability check
//! - `compiler`: Stages, the Compiler driver and the RunStore
//! - `domain`: Data structures (RawEvent, NormalizedStep, Intent, IrNode)
//! - `index`: Chunked keyword index over recorded steps
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Compile a trace
//! stepscript compile trace.json -o flow.js
//!
//! # Audit a script
//! stepscript audit flow.js
//!
//! # List runs
//! stepscript runs
//! ```

pub mod adapters;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod domain;
pub mod index;

// Re-export main types at crate root for convenience
pub use compiler::{CompileRun, Compiler, PipelineError, RunStatus, StepError};
pub use domain::{Intent, IrAction, IrNode, NormalizedStep, RawEvent, ValidIntent};

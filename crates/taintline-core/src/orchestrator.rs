use crate::config::Config;
use crate::context;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::options::{self, Mode, RawOptions};
use crate::report::RunReport;
use crate::sink;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

/// Progress of a single invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Validated,
    ContextBuilt,
    Ran,
    Saved,
    Done,
    Failed,
}

impl Stage {
    /// What the orchestrator does while leaving this stage.
    pub fn activity(&self) -> &'static str {
        match self {
            Stage::Start => "validating options",
            Stage::Validated => "building the execution context",
            Stage::ContextBuilt => "running the analysis",
            Stage::Ran => "saving the report",
            Stage::Saved | Stage::Done => "finishing",
            Stage::Failed => "failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One command-line invocation, already parsed but not yet validated.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub mode: Mode,
    pub options: RawOptions,
    pub output_folder: PathBuf,
    pub config: Config,
}

/// Result of a successful run.
#[derive(Debug)]
pub struct Outcome {
    pub report: RunReport,
    pub report_path: PathBuf,
}

/// Drives validate -> build -> run -> save and remembers how far it got.
#[derive(Debug)]
pub struct Orchestrator {
    stage: Stage,
    failed_during: Option<Stage>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            stage: Stage::Start,
            failed_during: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// The last stage reached before a failure, if any.
    pub fn failed_during(&self) -> Option<Stage> {
        self.failed_during
    }

    pub fn run(&mut self, invocation: &Invocation, fetcher: &dyn Fetcher) -> Result<Outcome> {
        let result = self.drive(invocation, fetcher);
        if result.is_err() {
            debug!("Stage {} -> {} ({})", self.stage, Stage::Failed, self.stage.activity());
            self.failed_during = Some(self.stage);
            self.stage = Stage::Failed;
        }
        result
    }

    fn drive(&mut self, invocation: &Invocation, fetcher: &dyn Fetcher) -> Result<Outcome> {
        let validated = options::validate(invocation.mode, invocation.options.clone())?;
        self.advance(Stage::Validated);

        let ctx = context::build(validated, &invocation.config, &invocation.output_folder)?;
        self.advance(Stage::ContextBuilt);
        info!("Scanning {} in {} mode", ctx.target(), ctx.mode());

        let report = ctx.run(fetcher, &invocation.config)?;
        self.advance(Stage::Ran);

        let report_path = sink::persist(&ctx, &report)?;
        self.advance(Stage::Saved);

        drop(ctx);
        self.advance(Stage::Done);
        Ok(Outcome {
            report,
            report_path,
        })
    }

    fn advance(&mut self, next: Stage) {
        debug!("Stage {} -> {}", self.stage, next);
        self.stage = next;
    }
}

/// Run one invocation end to end.
pub fn run(invocation: &Invocation, fetcher: &dyn Fetcher) -> Result<Outcome> {
    Orchestrator::new().run(invocation, fetcher)
}

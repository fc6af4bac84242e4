pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod ir;
pub mod options;
pub mod orchestrator;
pub mod report;
pub mod revision;
pub mod sarif;
pub mod sink;
pub mod taint;
pub mod target;
pub mod workflow;

pub use config::Config;
pub use context::{AnalysisContext, ExecutionContext};
pub use error::{Error, ParameterError, Result};
pub use fetch::{Checkout, FetchError, Fetcher, GitFetcher};
pub use options::{Mode, RawOptions, ValidatedOptions};
pub use orchestrator::{Invocation, Orchestrator, Outcome, Stage};
pub use report::{Finding, RunReport, Severity, WorkflowReport};
pub use revision::RevisionSelector;
pub use taint::TaintEngine;

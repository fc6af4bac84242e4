use crate::fetch::FetchError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Illegal or conflicting command-line input, detected before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("--file is required for file mode")]
    MissingFile,

    #[error("file mode cannot be used with {}", flags(.fields))]
    FileModeConflict { fields: Vec<&'static str> },

    #[error("--url is required for repo and action modes")]
    MissingUrl,

    #[error("--file can only be used with --mode file")]
    FileOutsideFileMode,

    #[error("at most one of --branch, --commit, --tag may be given (got {})", flags(.given))]
    ConflictingRevisions { given: Vec<&'static str> },

    #[error("--action-path cannot be used in repo mode")]
    ActionPathInRepoMode,

    #[error("--workflow-path cannot be used in action mode")]
    WorkflowPathInActionMode,
}

impl ParameterError {
    /// The command-line flags this error is about.
    pub fn offending_flags(&self) -> Vec<&'static str> {
        match self {
            ParameterError::MissingFile | ParameterError::FileOutsideFileMode => vec!["file"],
            ParameterError::MissingUrl => vec!["url"],
            ParameterError::FileModeConflict { fields } => fields.clone(),
            ParameterError::ConflictingRevisions { given } => given.clone(),
            ParameterError::ActionPathInRepoMode => vec!["action-path"],
            ParameterError::WorkflowPathInActionMode => vec!["workflow-path"],
        }
    }
}

fn flags(names: &[&'static str]) -> String {
    names
        .iter()
        .map(|n| format!("--{n}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Every way a scan can fail, grouped by the stage that raised it.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parameter(#[from] ParameterError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to load config: {0}")]
    Config(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("analysis failed: {0}")]
    Analysis(String),

    #[error("failed to write report to {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn parse(path: impl Into<String>, err: anyhow::Error) -> Self {
        Error::Parse {
            path: path.into(),
            message: format!("{err:#}"),
        }
    }

    /// True for errors raised by input validation rather than by a collaborator.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Error::Parameter(_) | Error::InvalidInput(_))
    }
}

use crate::error::ParameterError;
use crate::revision::RevisionSelector;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What kind of target a single invocation scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every workflow of a remote repository.
    #[serde(rename = "repo")]
    RemoteRepo,
    /// A single reusable action in a remote repository.
    #[serde(rename = "action")]
    RemoteAction,
    /// One workflow file on the local filesystem.
    #[serde(rename = "file")]
    LocalFile,
}

impl Mode {
    pub fn label(&self) -> &'static str {
        match self {
            Mode::RemoteRepo => "repo",
            Mode::RemoteAction => "action",
            Mode::LocalFile => "file",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Targeting options exactly as they arrive from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawOptions {
    pub url: Option<String>,
    pub file: Option<PathBuf>,
    pub branch: Option<String>,
    pub commit: Option<String>,
    pub tag: Option<String>,
    pub action_path: Option<String>,
    pub workflow_path: Option<String>,
}

/// A mode-consistent option set. Only [`validate`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedOptions {
    Repo {
        url: String,
        revision: RevisionSelector,
        workflow_path: Option<String>,
    },
    Action {
        url: String,
        revision: RevisionSelector,
        action_path: Option<String>,
    },
    File {
        path: PathBuf,
    },
}

impl ValidatedOptions {
    pub fn mode(&self) -> Mode {
        match self {
            ValidatedOptions::Repo { .. } => Mode::RemoteRepo,
            ValidatedOptions::Action { .. } => Mode::RemoteAction,
            ValidatedOptions::File { .. } => Mode::LocalFile,
        }
    }

    pub fn revision(&self) -> Option<&RevisionSelector> {
        match self {
            ValidatedOptions::Repo { revision, .. } | ValidatedOptions::Action { revision, .. } => {
                Some(revision)
            }
            ValidatedOptions::File { .. } => None,
        }
    }
}

/// Check the option combination for `mode` and return the normalized set.
///
/// Rules are applied in this order, and the first violation wins:
/// file-mode exclusivity, remote-mode url/file, revision exclusivity,
/// then the per-mode sub-path restrictions.
pub fn validate(mode: Mode, raw: RawOptions) -> Result<ValidatedOptions, ParameterError> {
    let raw = normalize(raw);

    match mode {
        Mode::LocalFile => {
            if raw.file.is_none() {
                return Err(ParameterError::MissingFile);
            }
            let fields: Vec<&'static str> = [
                ("url", raw.url.is_some()),
                ("branch", raw.branch.is_some()),
                ("commit", raw.commit.is_some()),
                ("tag", raw.tag.is_some()),
                ("action-path", raw.action_path.is_some()),
                ("workflow-path", raw.workflow_path.is_some()),
            ]
            .into_iter()
            .filter_map(|(name, set)| set.then_some(name))
            .collect();
            if !fields.is_empty() {
                return Err(ParameterError::FileModeConflict { fields });
            }
        }
        Mode::RemoteRepo | Mode::RemoteAction => {
            if raw.url.is_none() {
                return Err(ParameterError::MissingUrl);
            }
            if raw.file.is_some() {
                return Err(ParameterError::FileOutsideFileMode);
            }
        }
    }

    let given: Vec<&'static str> = [
        ("branch", raw.branch.is_some()),
        ("commit", raw.commit.is_some()),
        ("tag", raw.tag.is_some()),
    ]
    .into_iter()
    .filter_map(|(name, set)| set.then_some(name))
    .collect();
    if given.len() > 1 {
        return Err(ParameterError::ConflictingRevisions { given });
    }

    let revision = RevisionSelector::select(
        raw.branch.as_deref(),
        raw.commit.as_deref(),
        raw.tag.as_deref(),
    );

    match mode {
        Mode::RemoteRepo => {
            if raw.action_path.is_some() {
                return Err(ParameterError::ActionPathInRepoMode);
            }
            Ok(ValidatedOptions::Repo {
                url: raw.url.unwrap_or_default(),
                revision,
                workflow_path: raw.workflow_path,
            })
        }
        Mode::RemoteAction => {
            if raw.workflow_path.is_some() {
                return Err(ParameterError::WorkflowPathInActionMode);
            }
            Ok(ValidatedOptions::Action {
                url: raw.url.unwrap_or_default(),
                revision,
                action_path: raw.action_path,
            })
        }
        Mode::LocalFile => Ok(ValidatedOptions::File {
            path: raw.file.unwrap_or_default(),
        }),
    }
}

/// Empty strings mean "not given".
fn normalize(raw: RawOptions) -> RawOptions {
    fn keep(v: Option<String>) -> Option<String> {
        v.filter(|s| !s.trim().is_empty())
    }

    RawOptions {
        url: keep(raw.url),
        file: raw.file.filter(|p| !p.as_os_str().is_empty()),
        branch: keep(raw.branch),
        commit: keep(raw.commit),
        tag: keep(raw.tag),
        action_path: keep(raw.action_path),
        workflow_path: keep(raw.workflow_path),
    }
}

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Scanner configuration, optionally loaded from a TOML file.
///
/// ```toml
/// results_folder = "/var/tmp/scans"
///
/// [taint]
/// extra_sources = ["github.event.release.body"]
/// ignored_sources = ["github.head_ref"]
///
/// [fetch]
/// git = "/usr/bin/git"
/// depth = 1
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Where file-mode reports are written.
    #[serde(default = "default_results_folder")]
    pub results_folder: PathBuf,

    #[serde(default)]
    pub taint: TaintConfig,

    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            results_folder: default_results_folder(),
            taint: TaintConfig::default(),
            fetch: FetchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TaintConfig {
    /// Additional expression prefixes to treat as attacker-controlled.
    #[serde(default)]
    pub extra_sources: Vec<String>,

    /// Built-in sources to stop treating as attacker-controlled.
    #[serde(default)]
    pub ignored_sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchConfig {
    #[serde(default = "default_git")]
    pub git: String,

    #[serde(default = "default_depth")]
    pub depth: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            git: default_git(),
            depth: default_depth(),
        }
    }
}

fn default_results_folder() -> PathBuf {
    PathBuf::from("/tmp")
}

fn default_git() -> String {
    "git".to_string()
}

fn default_depth() -> u32 {
    1
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read '{}': {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("failed to parse '{}': {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

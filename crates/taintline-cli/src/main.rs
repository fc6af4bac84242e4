mod display;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, ValueEnum};
use std::path::PathBuf;
use taintline_core::{options, Config, GitFetcher, Invocation, Mode, Orchestrator, RawOptions, Stage};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "taintline",
    version,
    about = "taintline: taint analysis for GitHub Actions workflows",
    long_about = "Scan a remote repository, a remote action, or a local workflow file for \
                  attacker-controlled data reaching scripts, and write the findings as SARIF."
)]
#[command(group(
    ArgGroup::new("revision")
        .args(["branch", "commit", "tag"])
        .multiple(false)
))]
struct Cli {
    /// What to scan
    #[arg(long, value_enum)]
    mode: ModeArg,

    /// Repository URL; may embed credentials as user:token@host/owner/repo
    #[arg(long)]
    url: Option<String>,

    /// Local workflow file (file mode)
    #[arg(long, value_parser = existing_file)]
    file: Option<PathBuf>,

    /// Folder for repo and action reports
    #[arg(long, default_value = "/tmp", value_parser = existing_dir)]
    output_folder: PathBuf,

    /// TOML configuration file
    #[arg(long, value_parser = existing_file)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Branch to scan
    #[arg(long)]
    branch: Option<String>,

    /// Commit sha to scan
    #[arg(long)]
    commit: Option<String>,

    /// Tag to scan
    #[arg(long)]
    tag: Option<String>,

    /// Directory of the action inside the repository (action mode)
    #[arg(long)]
    action_path: Option<String>,

    /// Workflow file or directory inside the repository (repo mode)
    #[arg(long)]
    workflow_path: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Repo,
    Action,
    File,
}

impl From<ModeArg> for Mode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Repo => Mode::RemoteRepo,
            ModeArg::Action => Mode::RemoteAction,
            ModeArg::File => Mode::LocalFile,
        }
    }
}

fn existing_file(raw: &str) -> std::result::Result<PathBuf, String> {
    let path = PathBuf::from(raw);
    if path.is_file() {
        Ok(path)
    } else {
        Err(format!("'{raw}' does not exist or is not a file"))
    }
}

fn existing_dir(raw: &str) -> std::result::Result<PathBuf, String> {
    let path = PathBuf::from(raw);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("'{raw}' does not exist or is not a directory"))
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over `--verbose`.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Turn parsed arguments into an invocation. Flag combinations are checked
/// before the config file is read, so a usage error is reported as such even
/// when the config is broken too.
fn prepare(cli: Cli) -> Result<Invocation> {
    let mode = Mode::from(cli.mode);
    let raw = RawOptions {
        url: cli.url,
        file: cli.file,
        branch: cli.branch,
        commit: cli.commit,
        tag: cli.tag,
        action_path: cli.action_path,
        workflow_path: cli.workflow_path,
    };
    options::validate(mode, raw.clone()).map_err(taintline_core::Error::from)?;

    let config = Config::load_or_default(cli.config.as_deref())
        .context("Failed to load configuration")?;
    debug!(mode = %mode, config = ?cli.config, "Configuration loaded");

    Ok(Invocation {
        mode,
        options: raw,
        output_folder: cli.output_folder,
        config,
    })
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let invocation = prepare(cli)?;
    let fetcher = GitFetcher::new(&invocation.config.fetch);
    let mut orchestrator = Orchestrator::new();
    match orchestrator.run(&invocation, &fetcher) {
        Ok(outcome) => {
            display::print_summary(&outcome);
            Ok(())
        }
        Err(err) => {
            let stage = orchestrator.failed_during().unwrap_or(Stage::Start);
            Err(anyhow::Error::new(err).context(format!("Scan failed while {}", stage.activity())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::ffi::OsString;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_revision_flags_are_exclusive() {
        let err = Cli::try_parse_from([
            "taintline", "--mode", "repo", "--url", "github.com/o/r", "--branch", "main", "--tag",
            "v1",
        ])
        .err()
        .expect("two revision flags must be rejected");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_mode_is_required() {
        assert!(Cli::try_parse_from(["taintline", "--url", "github.com/o/r"]).is_err());
    }

    #[test]
    fn test_repo_mode_parses() {
        let cli = Cli::try_parse_from([
            "taintline", "--mode", "repo", "--url", "github.com/o/r", "--commit", "abc123",
        ])
        .unwrap();
        assert!(matches!(Mode::from(cli.mode), Mode::RemoteRepo));
        assert_eq!(cli.commit.as_deref(), Some("abc123"));
        assert_eq!(cli.output_folder, PathBuf::from("/tmp"));
    }

    #[test]
    fn test_flag_conflict_reported_before_broken_config() {
        let dir = tempfile::tempdir().unwrap();
        let workflow = dir.path().join("ci.yml");
        std::fs::write(&workflow, "on: push\njobs: {}\n").unwrap();
        let config = dir.path().join("taintline.toml");
        std::fs::write(&config, "[fetch\ngit = ").unwrap();

        let args: Vec<OsString> = vec![
            "taintline".into(),
            "--mode".into(),
            "file".into(),
            "--file".into(),
            workflow.clone().into(),
            "--url".into(),
            "github.com/o/r".into(),
            "--config".into(),
            config.clone().into(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let err = prepare(cli).unwrap_err();
        let core = err
            .downcast_ref::<taintline_core::Error>()
            .expect("usage error, not a config error");
        assert!(core.is_usage_error());
        assert!(err.to_string().contains("--url"));
    }

    #[test]
    fn test_broken_config_fails_after_valid_flags() {
        let dir = tempfile::tempdir().unwrap();
        let workflow = dir.path().join("ci.yml");
        std::fs::write(&workflow, "on: push\njobs: {}\n").unwrap();
        let config = dir.path().join("taintline.toml");
        std::fs::write(&config, "[fetch\ngit = ").unwrap();

        let args: Vec<OsString> = vec![
            "taintline".into(),
            "--mode".into(),
            "file".into(),
            "--file".into(),
            workflow.clone().into(),
            "--config".into(),
            config.clone().into(),
        ];
        let cli = Cli::try_parse_from(args).unwrap();
        let err = prepare(cli).unwrap_err();
        assert!(err.to_string().contains("Failed to load configuration"));
    }
}

use crate::config::FetchConfig;
use crate::revision::RevisionSelector;
use crate::target::{redact, RemoteUrl};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while materializing a remote repository.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("git executable '{0}' not found")]
    GitNotFound(String),

    #[error("could not create a temporary checkout directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error("repository not found: {0}")]
    NotFound(String),

    #[error("authentication required for {0}; pass credentials as user:token@host/...")]
    AuthRequired(String),

    #[error("{revision} not found in {url}")]
    RevisionNotFound { url: String, revision: String },

    #[error("git {step} failed for {url}: {message}")]
    Git {
        step: &'static str,
        url: String,
        message: String,
    },
}

/// A repository tree on disk. A fetched checkout removes itself when dropped.
#[derive(Debug)]
pub struct Checkout {
    root: PathBuf,
    head: Option<String>,
    _temp_dir: Option<TempDir>,
}

impl Checkout {
    /// Wrap a tree that already exists and is owned by someone else.
    pub fn existing(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            head: None,
            _temp_dir: None,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Commit sha of the checked-out HEAD, when known.
    pub fn head(&self) -> Option<&str> {
        self.head.as_deref()
    }
}

/// Materializes a remote repository at a revision.
pub trait Fetcher {
    fn fetch(&self, url: &RemoteUrl, revision: &RevisionSelector) -> Result<Checkout, FetchError>;
}

/// Fetches with the `git` command line, with hooks disabled and a shallow history.
pub struct GitFetcher {
    git: String,
    depth: u32,
}

impl GitFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            git: config.git.clone(),
            depth: config.depth.max(1),
        }
    }

    fn git(&self, cwd: Option<&Path>) -> Command {
        let mut cmd = Command::new(&self.git);
        cmd.env("GIT_TEMPLATE_DIR", "")
            .env("GIT_TERMINAL_PROMPT", "0")
            .args(["-c", "core.hooksPath=/dev/null", "-c", "advice.detachedHead=false"]);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd
    }

    fn run(&self, mut cmd: Command, step: &'static str, url: &RemoteUrl) -> Result<String, FetchError> {
        let output = cmd.output().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => FetchError::GitNotFound(self.git.clone()),
            _ => FetchError::Git {
                step,
                url: url.to_string(),
                message: e.to_string(),
            },
        })?;

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }

        let stderr = redact(String::from_utf8_lossy(&output.stderr).trim());
        if stderr.contains("Repository not found")
            || (stderr.contains("not found") && stderr.contains("repository"))
        {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if stderr.contains("Authentication failed") || stderr.contains("could not read Username") {
            return Err(FetchError::AuthRequired(url.to_string()));
        }
        Err(FetchError::Git {
            step,
            url: url.to_string(),
            message: stderr,
        })
    }

    fn clone_ref(&self, url: &RemoteUrl, dest: &Path, revision: &RevisionSelector) -> Result<(), FetchError> {
        let depth = self.depth.to_string();
        let mut cmd = self.git(None);
        cmd.args(["clone", "--depth", depth.as_str(), "--single-branch", "--no-tags"]);
        if let Some(r) = revision.value() {
            cmd.args(["--branch", r]);
        }
        cmd.arg(url.clone_url()).arg(dest);

        self.run(cmd, "clone", url).map(|_| ()).map_err(|err| match err {
            FetchError::Git { message, .. }
                if revision.is_specified() && message.contains("not found in upstream") =>
            {
                FetchError::RevisionNotFound {
                    url: url.to_string(),
                    revision: revision.to_string(),
                }
            }
            err => err,
        })
    }

    fn fetch_commit(&self, url: &RemoteUrl, dest: &Path, revision: &RevisionSelector, sha: &str) -> Result<(), FetchError> {
        let mut init = self.git(None);
        init.args(["init", "--quiet"]).arg(dest);
        self.run(init, "init", url)?;

        let mut remote = self.git(Some(dest));
        remote.args(["remote", "add", "origin"]).arg(url.clone_url());
        self.run(remote, "remote add", url)?;

        let depth = self.depth.to_string();
        let mut fetch = self.git(Some(dest));
        fetch.args(["fetch", "--quiet", "--depth", depth.as_str(), "origin", sha]);
        self.run(fetch, "fetch", url).map_err(|err| match err {
            FetchError::Git { .. } => FetchError::RevisionNotFound {
                url: url.to_string(),
                revision: revision.to_string(),
            },
            other => other,
        })?;

        let mut checkout = self.git(Some(dest));
        checkout.args(["checkout", "--quiet", "FETCH_HEAD"]);
        self.run(checkout, "checkout", url)?;
        Ok(())
    }
}

impl Fetcher for GitFetcher {
    fn fetch(&self, url: &RemoteUrl, revision: &RevisionSelector) -> Result<Checkout, FetchError> {
        let temp_dir = TempDir::new().map_err(FetchError::TempDir)?;
        // Fixed child name: nothing from the URL ends up in the path.
        let dest = temp_dir.path().join("checkout");

        info!("Fetching {} at {}", url, revision);

        match revision {
            RevisionSelector::Commit(sha) => self.fetch_commit(url, &dest, revision, sha)?,
            _ => self.clone_ref(url, &dest, revision)?,
        }

        let mut rev_parse = self.git(Some(&dest));
        rev_parse.args(["rev-parse", "HEAD"]);
        let head = self.run(rev_parse, "rev-parse", url).ok();
        debug!("Checked out {} at {:?} into {}", url, head, dest.display());

        Ok(Checkout {
            root: dest,
            head,
            _temp_dir: Some(temp_dir),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_checkout_keeps_path() {
        let dir = tempfile::tempdir().unwrap();
        let checkout = Checkout::existing(dir.path());
        assert_eq!(checkout.root(), dir.path());
        assert!(checkout.head().is_none());
    }

    #[test]
    fn test_missing_git_binary() {
        let fetcher = GitFetcher::new(&FetchConfig {
            git: "definitely-not-a-git-binary-xyz".to_string(),
            depth: 1,
        });
        let url = RemoteUrl::parse("https://github.com/octo/hello").unwrap();
        let err = fetcher
            .fetch(&url, &RevisionSelector::Unspecified)
            .unwrap_err();
        assert!(matches!(err, FetchError::GitNotFound(_)));
    }

    #[test]
    fn test_error_messages_name_the_url() {
        let err = FetchError::RevisionNotFound {
            url: "https://github.com/octo/hello".into(),
            revision: "tag v9".into(),
        };
        assert_eq!(
            err.to_string(),
            "tag v9 not found in https://github.com/octo/hello"
        );
    }

    #[cfg(unix)]
    const HEAD_SHA: &str = "0123456789abcdef0123456789abcdef01234567";
    #[cfg(unix)]
    const HOOKS: &str = "-c core.hooksPath=/dev/null -c advice.detachedHead=false";

    /// A stand-in `git` that appends `<cwd>\t<args>` to `git.log` and then
    /// runs `body` with `$last` set to its final argument.
    #[cfg(unix)]
    fn fake_git(dir: &Path, body: &str) -> (FetchConfig, PathBuf) {
        use std::os::unix::fs::PermissionsExt;

        let log = dir.join("git.log");
        let script = dir.join("git");
        std::fs::write(
            &script,
            format!(
                "#!/bin/sh\nprintf '%s\\t%s\\n' \"$(pwd)\" \"$*\" >> '{}'\nfor last; do :; done\n{}\n",
                log.display(),
                body
            ),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let config = FetchConfig {
            git: script.to_string_lossy().to_string(),
            depth: 1,
        };
        (config, log)
    }

    #[cfg(unix)]
    const SUCCEEDS: &str = r#"case " $* " in
  *" clone "*|*" init "*) mkdir -p "$last" ;;
  *" rev-parse "*) echo 0123456789abcdef0123456789abcdef01234567 ;;
esac
exit 0"#;

    #[cfg(unix)]
    fn calls(log: &Path) -> Vec<(String, String)> {
        std::fs::read_to_string(log)
            .unwrap()
            .lines()
            .map(|l| {
                let (cwd, args) = l.split_once('\t').unwrap();
                (cwd.to_string(), args.to_string())
            })
            .collect()
    }

    #[cfg(unix)]
    fn fetch_with_log(revision: RevisionSelector) -> (Vec<(String, String)>, String) {
        let dir = tempfile::tempdir().unwrap();
        let (config, log) = fake_git(dir.path(), SUCCEEDS);
        let url = RemoteUrl::parse("https://github.com/octo/hello").unwrap();
        let checkout = GitFetcher::new(&config).fetch(&url, &revision).unwrap();
        assert_eq!(checkout.head(), Some(HEAD_SHA));
        (calls(&log), checkout.root().display().to_string())
    }

    #[cfg(unix)]
    #[test]
    fn test_branch_and_tag_use_shallow_clone() {
        for (revision, name) in [
            (RevisionSelector::Branch("main".into()), "main"),
            (RevisionSelector::Tag("v1.2.0".into()), "v1.2.0"),
        ] {
            let (calls, root) = fetch_with_log(revision);
            assert_eq!(calls.len(), 2);
            assert_eq!(
                calls[0].1,
                format!(
                    "{HOOKS} clone --depth 1 --single-branch --no-tags --branch {name} \
                     https://github.com/octo/hello.git {root}"
                )
            );
            assert_eq!(calls[1].1, format!("{HOOKS} rev-parse HEAD"));
            assert!(calls[1].0.ends_with("/checkout"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_default_revision_clones_without_branch() {
        let (calls, root) = fetch_with_log(RevisionSelector::Unspecified);
        assert_eq!(
            calls[0].1,
            format!(
                "{HOOKS} clone --depth 1 --single-branch --no-tags \
                 https://github.com/octo/hello.git {root}"
            )
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_commit_fetches_sha_and_checks_out() {
        let (calls, root) = fetch_with_log(RevisionSelector::Commit("abc123".into()));
        let args: Vec<String> = calls.iter().map(|(_, a)| a.clone()).collect();
        assert_eq!(
            args,
            vec![
                format!("{HOOKS} init --quiet {root}"),
                format!("{HOOKS} remote add origin https://github.com/octo/hello.git"),
                format!("{HOOKS} fetch --quiet --depth 1 origin abc123"),
                format!("{HOOKS} checkout --quiet FETCH_HEAD"),
                format!("{HOOKS} rev-parse HEAD"),
            ]
        );
        // Everything after init runs inside the checkout.
        assert!(calls[1..].iter().all(|(cwd, _)| cwd.ends_with("/checkout")));
    }

    #[cfg(unix)]
    #[test]
    fn test_checkout_stays_inside_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let (config, _) = fake_git(dir.path(), SUCCEEDS);
        let url = RemoteUrl::parse("https://github.com/octo/hello").unwrap();
        let checkout = GitFetcher::new(&config)
            .fetch(&url, &RevisionSelector::Commit("abc123".into()))
            .unwrap();

        let root = checkout.root().to_path_buf();
        assert_eq!(root.file_name().unwrap(), "checkout");
        let parent = root.parent().unwrap().to_path_buf();
        assert_ne!(parent, std::env::temp_dir());
        assert!(parent.is_dir());
        drop(checkout);
        assert!(!parent.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_missing_branch_names_revision_kind() {
        let dir = tempfile::tempdir().unwrap();
        let (config, _) = fake_git(
            dir.path(),
            "echo 'fatal: Remote branch nope not found in upstream origin' >&2\nexit 128",
        );
        let url = RemoteUrl::parse("https://github.com/octo/hello").unwrap();
        let err = GitFetcher::new(&config)
            .fetch(&url, &RevisionSelector::Branch("nope".into()))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "branch nope not found in https://github.com/octo/hello"
        );
    }
}

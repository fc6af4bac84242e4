use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;

/// Severity level for taint findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    High,
    Medium,
}

impl Severity {
    pub fn priority(&self) -> u8 {
        match self {
            Severity::Critical => 5,
            Severity::High => 4,
            Severity::Medium => 3,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
        }
    }

    /// SARIF `level` for this severity.
    pub fn sarif_level(&self) -> &'static str {
        match self {
            Severity::Critical | Severity::High => "error",
            Severity::Medium => "warning",
        }
    }
}

/// The check that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Rule {
    CodeInjection,
    ScriptInjection,
    EnvInjection,
    LocalActionInjection,
    UntrustedCheckout,
}

impl Rule {
    pub fn id(&self) -> &'static str {
        match self {
            Rule::CodeInjection => "TL001",
            Rule::ScriptInjection => "TL002",
            Rule::EnvInjection => "TL003",
            Rule::LocalActionInjection => "TL004",
            Rule::UntrustedCheckout => "TL005",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Rule::CodeInjection => "Code injection in run script",
            Rule::ScriptInjection => "Code injection in github-script",
            Rule::EnvInjection => "Environment injection via GITHUB_ENV",
            Rule::LocalActionInjection => "Tainted input to local action sink",
            Rule::UntrustedCheckout => "Checkout of untrusted pull request code",
        }
    }

    pub fn help(&self) -> &'static str {
        match self {
            Rule::CodeInjection | Rule::ScriptInjection | Rule::LocalActionInjection => {
                "Attacker-controlled data is expanded into code before it runs. Pass it through an \
                 environment variable and reference the variable from the script instead."
            }
            Rule::EnvInjection => {
                "Writing attacker-controlled data to GITHUB_ENV lets it define variables such as \
                 LD_PRELOAD or NODE_OPTIONS for every later step."
            }
            Rule::UntrustedCheckout => {
                "Privileged triggers run with repository secrets. Checking out and building the \
                 pull request head in that context executes untrusted code."
            }
        }
    }

    pub fn all() -> &'static [Rule] {
        &[
            Rule::CodeInjection,
            Rule::ScriptInjection,
            Rule::EnvInjection,
            Rule::LocalActionInjection,
            Rule::UntrustedCheckout,
        ]
    }
}

/// A single taint-analysis finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub rule: Rule,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub job: Option<String>,
    pub step: Option<String>,
    pub line: Option<usize>,
    /// The tainted expression as written, e.g. `github.event.issue.title`.
    pub expression: Option<String>,
    /// How taint reached the sink, source first.
    pub taint_path: Vec<String>,
    pub recommendation: String,
    pub confidence: f64,
}

/// Findings for one workflow or action file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub name: String,
    /// Path of the analysed file, relative to the scanned tree when remote.
    pub source: String,
    pub findings: Vec<Finding>,
}

impl WorkflowReport {
    pub fn new(name: String, source: String, mut findings: Vec<Finding>) -> Self {
        // Most severe first, then by position.
        findings.sort_by(|a, b| {
            b.severity
                .priority()
                .cmp(&a.severity.priority())
                .then(a.line.cmp(&b.line))
        });
        Self {
            name,
            source,
            findings,
        }
    }
}

/// Everything one invocation produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// What was scanned: a URL (credentials removed) or a local path.
    pub target: String,
    pub revision: Option<String>,
    pub commit: Option<String>,
    pub workflows: Vec<WorkflowReport>,
}

impl RunReport {
    pub fn new(target: String) -> Self {
        Self {
            target,
            revision: None,
            commit: None,
            workflows: Vec::new(),
        }
    }

    pub fn findings(&self) -> impl Iterator<Item = (&WorkflowReport, &Finding)> {
        self.workflows
            .iter()
            .flat_map(|w| w.findings.iter().map(move |f| (w, f)))
    }

    pub fn finding_count(&self) -> usize {
        self.workflows.iter().map(|w| w.findings.len()).sum()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings().filter(|(_, f)| f.severity == severity).count()
    }

    pub fn critical_count(&self) -> usize {
        self.count(Severity::Critical)
    }

    pub fn high_count(&self) -> usize {
        self.count(Severity::High)
    }

    pub fn medium_count(&self) -> usize {
        self.count(Severity::Medium)
    }

    /// Serialize as SARIF to `path`, creating the parent folder if needed.
    /// The file is flushed and synced before this returns.
    pub fn write_sarif(&self, path: &Path) -> Result<()> {
        let persist = |source: std::io::Error| Error::Persist {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(persist)?;
        }

        let sarif = crate::sarif::to_sarif(self);
        let body = serde_json::to_vec_pretty(&sarif).map_err(|e| persist(e.into()))?;

        let mut file = std::fs::File::create(path).map_err(persist)?;
        file.write_all(&body).map_err(persist)?;
        file.write_all(b"\n").map_err(persist)?;
        file.sync_all().map_err(persist)?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn sample_finding(severity: Severity, line: Option<usize>) -> Finding {
    Finding {
        rule: Rule::CodeInjection,
        severity,
        title: "Code injection via github.event.issue.title".to_string(),
        description: "issue title reaches a run script".to_string(),
        job: Some("greet".to_string()),
        step: Some("Echo".to_string()),
        line,
        expression: Some("github.event.issue.title".to_string()),
        taint_path: vec!["github.event.issue.title".to_string()],
        recommendation: "use an env var".to_string(),
        confidence: 0.9,
    }
}

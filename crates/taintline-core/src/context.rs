use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetch::{Checkout, Fetcher};
use crate::ir::{ActionIr, WorkflowIr};
use crate::options::{Mode, ValidatedOptions};
use crate::report::{RunReport, WorkflowReport};
use crate::revision::{sanitize, RevisionSelector};
use crate::taint::TaintEngine;
use crate::target::{check_sub_path, RemoteUrl, TargetDescriptor};
use crate::workflow::{
    discover_workflows, find_action_definition, has_workflow_extension, ActionDefinition, Workflow,
};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// What the taint engine may ask about the tree it is analysing.
pub trait AnalysisContext {
    /// Short human-readable name for logs.
    fn describe(&self) -> String;

    /// Repository root, if the analysed file belongs to one.
    fn root(&self) -> Option<&Path>;

    /// Resolve `uses: ./path` to its action definition file.
    fn resolve_local_action(&self, uses: &str) -> Option<PathBuf> {
        let root = self.root()?;
        let rel = uses.trim_start_matches("./").trim_end_matches('/');
        if Path::new(rel)
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir))
        {
            return None;
        }
        find_action_definition(&root.join(rel))
    }

    /// `path` as it should appear in reports.
    fn display_path(&self, path: &Path) -> String {
        self.root()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }
}

/// A fetched repository tree.
pub struct CheckoutRepo<'c> {
    url: &'c RemoteUrl,
    checkout: &'c Checkout,
}

impl<'c> CheckoutRepo<'c> {
    pub fn new(url: &'c RemoteUrl, checkout: &'c Checkout) -> Self {
        Self { url, checkout }
    }
}

impl AnalysisContext for CheckoutRepo<'_> {
    fn describe(&self) -> String {
        match self.checkout.head() {
            Some(head) => format!("{} @ {}", self.url, head),
            None => self.url.to_string(),
        }
    }

    fn root(&self) -> Option<&Path> {
        Some(self.checkout.root())
    }
}

/// A single workflow file on disk. When it sits in `.github/workflows`, the
/// directory above `.github` is treated as the repository root.
pub struct LocalFileRepo {
    file: PathBuf,
    root: Option<PathBuf>,
}

impl LocalFileRepo {
    pub fn new(file: PathBuf) -> Self {
        let root = file
            .parent()
            .filter(|dir| dir.ends_with(".github/workflows"))
            .and_then(|dir| dir.parent())
            .and_then(|github| github.parent())
            .map(Path::to_path_buf);
        Self { file, root }
    }
}

impl AnalysisContext for LocalFileRepo {
    fn describe(&self) -> String {
        self.file.display().to_string()
    }

    fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoContext {
    pub url: RemoteUrl,
    pub revision: RevisionSelector,
    pub workflow_path: Option<String>,
    pub output_folder: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionContext {
    pub url: RemoteUrl,
    pub revision: RevisionSelector,
    pub action_path: Option<String>,
    pub output_folder: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileContext {
    /// Absolute path of the workflow file.
    pub path: PathBuf,
    pub working_dir: PathBuf,
    /// File name without its extension.
    pub base_name: String,
    pub results_folder: PathBuf,
}

/// Everything needed to run one scan, specific to the selected mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionContext {
    Repo(RepoContext),
    Action(ActionContext),
    LocalFile(LocalFileContext),
}

/// Turn validated options into an execution context. No network access.
pub fn build(validated: ValidatedOptions, config: &Config, output_folder: &Path) -> Result<ExecutionContext> {
    match validated {
        ValidatedOptions::Repo {
            url,
            revision,
            workflow_path,
        } => Ok(ExecutionContext::Repo(RepoContext {
            url: RemoteUrl::parse(&url)?,
            revision,
            workflow_path: workflow_path
                .map(|p| check_sub_path("workflow-path", &p))
                .transpose()?,
            output_folder: output_folder.to_path_buf(),
        })),
        ValidatedOptions::Action {
            url,
            revision,
            action_path,
        } => Ok(ExecutionContext::Action(ActionContext {
            url: RemoteUrl::parse(&url)?,
            revision,
            action_path: action_path
                .map(|p| check_sub_path("action-path", &p))
                .transpose()?,
            output_folder: output_folder.to_path_buf(),
        })),
        ValidatedOptions::File { path } => {
            build_local_file(path, config).map(ExecutionContext::LocalFile)
        }
    }
}

fn build_local_file(path: PathBuf, config: &Config) -> Result<LocalFileContext> {
    if !has_workflow_extension(&path) {
        return Err(Error::InvalidInput(format!(
            "{} is not a workflow file (expected .yml or .yaml)",
            path.display()
        )));
    }
    let path = std::path::absolute(&path).map_err(|e| {
        Error::InvalidInput(format!("cannot resolve {}: {}", path.display(), e))
    })?;
    let working_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("/"));
    let base_name = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| Error::InvalidInput(format!("{} has no file name", path.display())))?;

    Ok(LocalFileContext {
        path,
        working_dir,
        base_name,
        results_folder: config.results_folder.clone(),
    })
}

impl ExecutionContext {
    pub fn mode(&self) -> Mode {
        match self {
            ExecutionContext::Repo(_) => Mode::RemoteRepo,
            ExecutionContext::Action(_) => Mode::RemoteAction,
            ExecutionContext::LocalFile(_) => Mode::LocalFile,
        }
    }

    pub fn target(&self) -> TargetDescriptor {
        match self {
            ExecutionContext::Repo(ctx) => TargetDescriptor::Remote {
                url: ctx.url.clone(),
                sub_path: ctx.workflow_path.clone(),
            },
            ExecutionContext::Action(ctx) => TargetDescriptor::Remote {
                url: ctx.url.clone(),
                sub_path: ctx.action_path.clone(),
            },
            ExecutionContext::LocalFile(ctx) => TargetDescriptor::Local {
                path: ctx.path.clone(),
            },
        }
    }

    /// Run the analysis. Remote modes fetch through `fetcher`.
    pub fn run(&self, fetcher: &dyn Fetcher, config: &Config) -> Result<RunReport> {
        match self {
            ExecutionContext::Repo(ctx) => ctx.run(fetcher, config),
            ExecutionContext::Action(ctx) => ctx.run(fetcher, config),
            ExecutionContext::LocalFile(ctx) => ctx.run(config),
        }
    }
}

impl RepoContext {
    fn run(&self, fetcher: &dyn Fetcher, config: &Config) -> Result<RunReport> {
        let checkout = fetcher.fetch(&self.url, &self.revision)?;
        let repo = CheckoutRepo::new(&self.url, &checkout);
        let engine = TaintEngine::new(&config.taint, &repo);

        let files = self.workflow_files(checkout.root())?;
        info!("Analysing {} workflow(s)", files.len());

        let mut report = RunReport::new(self.url.to_string());
        report.revision = Some(self.revision.to_string());
        report.commit = checkout.head().map(String::from);

        for file in files {
            let source = repo.display_path(&file);
            let workflow = Workflow::parse_file(&file).map_err(|e| Error::parse(&source, e))?;
            let ir = WorkflowIr::build(&workflow)
                .map_err(|e| Error::Analysis(format!("{source}: {e:#}")))?;
            let findings = engine.run_workflow(&ir);
            debug!("{}: {} finding(s)", source, findings.len());
            report
                .workflows
                .push(WorkflowReport::new(workflow.name, source, findings));
        }
        Ok(report)
    }

    fn workflow_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let Some(sub) = &self.workflow_path else {
            return discover_workflows(root).map_err(|e| Error::Analysis(format!("{e:#}")));
        };
        let path = root.join(sub);
        if path.is_file() {
            if !has_workflow_extension(&path) {
                return Err(Error::InvalidInput(format!(
                    "--workflow-path '{sub}' is not a .yml or .yaml file"
                )));
            }
            return Ok(vec![path]);
        }
        if path.is_dir() {
            let mut files: Vec<PathBuf> = std::fs::read_dir(&path)
                .map_err(|e| Error::Analysis(format!("cannot read {sub}: {e}")))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && has_workflow_extension(p))
                .collect();
            files.sort();
            return Ok(files);
        }
        Err(Error::InvalidInput(format!(
            "--workflow-path '{}' does not exist in {}",
            sub, self.url
        )))
    }

    /// `<output>/<owner>_<repo>[_<revision>].sarif`
    pub fn report_path(&self) -> PathBuf {
        let mut name = format!("{}_{}", self.url.owner(), self.url.repo());
        if let Some(rev) = self.revision.slug() {
            name.push('_');
            name.push_str(&rev);
        }
        self.output_folder.join(format!("{name}.sarif"))
    }

    pub fn save_report(&self, report: &RunReport) -> Result<PathBuf> {
        let path = self.report_path();
        report.write_sarif(&path)?;
        Ok(path)
    }
}

impl ActionContext {
    fn run(&self, fetcher: &dyn Fetcher, config: &Config) -> Result<RunReport> {
        let checkout = fetcher.fetch(&self.url, &self.revision)?;
        let repo = CheckoutRepo::new(&self.url, &checkout);

        let dir = match &self.action_path {
            Some(sub) => checkout.root().join(sub),
            None => checkout.root().to_path_buf(),
        };
        let file = find_action_definition(&dir).ok_or_else(|| {
            Error::InvalidInput(format!(
                "no action.yml or action.yaml in {}{}",
                self.url,
                self.action_path
                    .as_deref()
                    .map(|p| format!(" at '{p}'"))
                    .unwrap_or_default()
            ))
        })?;

        let source = repo.display_path(&file);
        let action = ActionDefinition::parse_file(&file).map_err(|e| Error::parse(&source, e))?;
        let ir = ActionIr::build(&action);
        let findings = TaintEngine::new(&config.taint, &repo).run_action(&ir);

        let mut report = RunReport::new(self.url.to_string());
        report.revision = Some(self.revision.to_string());
        report.commit = checkout.head().map(String::from);
        report
            .workflows
            .push(WorkflowReport::new(action.name, source, findings));
        Ok(report)
    }

    /// `<output>/<owner>_<repo>[_<action-path>][_<revision>].sarif`
    pub fn report_path(&self) -> PathBuf {
        let mut name = format!("{}_{}", self.url.owner(), self.url.repo());
        let sub = self.action_path.as_deref().map(sanitize).filter(|s| !s.is_empty());
        for part in [sub, self.revision.slug()].into_iter().flatten() {
            name.push('_');
            name.push_str(&part);
        }
        self.output_folder.join(format!("{name}.sarif"))
    }

    pub fn save_report(&self, report: &RunReport) -> Result<PathBuf> {
        let path = self.report_path();
        report.write_sarif(&path)?;
        Ok(path)
    }
}

impl LocalFileContext {
    fn run(&self, config: &Config) -> Result<RunReport> {
        let repo = LocalFileRepo::new(self.path.clone());
        let source = repo.display_path(&self.path);

        let workflow = Workflow::parse_file(&self.path).map_err(|e| Error::parse(&source, e))?;
        let ir = WorkflowIr::build(&workflow)
            .map_err(|e| Error::Analysis(format!("{source}: {e:#}")))?;
        let findings = TaintEngine::new(&config.taint, &repo).run_workflow(&ir);

        let mut report = RunReport::new(self.path.display().to_string());
        report
            .workflows
            .push(WorkflowReport::new(workflow.name, source, findings));
        Ok(report)
    }
}

use crate::context::{ExecutionContext, LocalFileContext};
use crate::error::Result;
use crate::report::RunReport;
use std::path::PathBuf;
use tracing::info;

/// Where the report for `ctx` will be written. Depends only on the context,
/// so repeated runs with the same inputs overwrite the same file.
pub fn report_path(ctx: &ExecutionContext) -> PathBuf {
    match ctx {
        ExecutionContext::Repo(repo) => repo.report_path(),
        ExecutionContext::Action(action) => action.report_path(),
        ExecutionContext::LocalFile(file) => local_report_path(file),
    }
}

/// `<results_folder>/<base_name>.sarif`
pub fn local_report_path(ctx: &LocalFileContext) -> PathBuf {
    ctx.results_folder.join(format!("{}.sarif", ctx.base_name))
}

/// Persist `report` and return the written path.
pub fn persist(ctx: &ExecutionContext, report: &RunReport) -> Result<PathBuf> {
    let path = match ctx {
        ExecutionContext::Repo(repo) => repo.save_report(report)?,
        ExecutionContext::Action(action) => action.save_report(report)?,
        ExecutionContext::LocalFile(file) => {
            let path = local_report_path(file);
            report.write_sarif(&path)?;
            path
        }
    };
    info!("Report written to {}", path.display());
    Ok(path)
}

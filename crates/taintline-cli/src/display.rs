use colored::*;
use taintline_core::{Finding, Outcome, Severity};

/// Print a short summary of a finished scan.
pub fn print_summary(outcome: &Outcome) {
    let report = &outcome.report;
    println!();
    println!(
        "{}",
        format!(" taintline v{}: {}", env!("CARGO_PKG_VERSION"), report.target).bold()
    );
    if let Some(rev) = &report.revision {
        let commit = report
            .commit
            .as_deref()
            .map(|c| format!(" ({})", c.chars().take(12).collect::<String>()))
            .unwrap_or_default();
        println!(" {} {}{}", "|-".dimmed(), rev, commit.dimmed());
    }
    println!();

    if report.finding_count() == 0 {
        println!(" {} No tainted data reaches a sink.", "OK".green().bold());
    } else {
        for workflow in &report.workflows {
            if workflow.findings.is_empty() {
                continue;
            }
            println!(" {}", workflow.source.underline());
            for finding in &workflow.findings {
                print_finding(finding);
            }
            println!();
        }
    }

    let critical = report.critical_count();
    let high = report.high_count();
    println!(
        " {} {} workflow(s), findings: {} critical, {} high, {} medium",
        "|-".dimmed(),
        report.workflows.len(),
        if critical > 0 {
            critical.to_string().red().bold().to_string()
        } else {
            "0".to_string()
        },
        if high > 0 {
            high.to_string().yellow().bold().to_string()
        } else {
            "0".to_string()
        },
        report.medium_count(),
    );
    println!(
        " {} SARIF report: {}",
        "|-".dimmed(),
        outcome.report_path.display().to_string().cyan()
    );
    println!();
}

fn print_finding(finding: &Finding) {
    let tag = format!(" {} ", finding.severity.symbol());
    let tag = match finding.severity {
        Severity::Critical => tag.on_red().white().bold(),
        Severity::High => tag.on_yellow().black().bold(),
        Severity::Medium => tag.on_blue().white().bold(),
    };
    let line = finding
        .line
        .map(|l| format!(":{l}"))
        .unwrap_or_default();
    println!("   {} {}{}", tag, finding.title.bold(), line.dimmed());
    if finding.taint_path.len() > 1 {
        println!("     {} {}", "|".dimmed(), finding.taint_path.join(" -> ").dimmed());
    }
}

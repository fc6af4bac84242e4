use crate::report::{Finding, Rule, RunReport};
use serde_json::json;
use std::collections::BTreeSet;

/// Generate a SARIF 2.1.0 document from a run report.
/// SARIF (Static Analysis Results Interchange Format) is consumed by
/// GitHub Code Scanning, VS Code, and other tools.
pub fn to_sarif(report: &RunReport) -> serde_json::Value {
    let used: BTreeSet<Rule> = report.findings().map(|(_, f)| f.rule).collect();
    let rules: Vec<serde_json::Value> = used.iter().map(sarif_rule).collect();

    let results: Vec<serde_json::Value> = report
        .findings()
        .map(|(workflow, finding)| sarif_result(finding, &workflow.source))
        .collect();

    let mut properties = json!({
        "target": report.target,
    });
    if let Some(rev) = &report.revision {
        properties["revision"] = json!(rev);
    }
    if let Some(commit) = &report.commit {
        properties["commit"] = json!(commit);
    }

    json!({
        "$schema": "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json",
        "version": "2.1.0",
        "runs": [{
            "tool": {
                "driver": {
                    "name": "taintline",
                    "version": env!("CARGO_PKG_VERSION"),
                    "rules": rules,
                }
            },
            "results": results,
            "invocations": [{
                "executionSuccessful": true,
                "endTimeUtc": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                "toolExecutionNotifications": [],
            }],
            "properties": properties,
        }]
    })
}

fn sarif_rule(rule: &Rule) -> serde_json::Value {
    json!({
        "id": rule.id(),
        "name": rule.label(),
        "shortDescription": {
            "text": rule.label(),
        },
        "fullDescription": {
            "text": rule.help(),
        },
    })
}

fn sarif_result(finding: &Finding, source: &str) -> serde_json::Value {
    let mut location = json!({
        "physicalLocation": {
            "artifactLocation": {
                "uri": source,
            },
            "region": {
                "startLine": finding.line.unwrap_or(1),
            }
        }
    });

    let logical: Vec<String> = [finding.job.as_deref(), finding.step.as_deref()]
        .into_iter()
        .flatten()
        .map(String::from)
        .collect();
    if !logical.is_empty() {
        location["logicalLocations"] = json!([{
            "fullyQualifiedName": logical.join("/"),
        }]);
    }

    let mut result = json!({
        "ruleId": finding.rule.id(),
        "level": finding.severity.sarif_level(),
        "message": {
            "text": format!("{}\n\nRecommendation: {}", finding.description, finding.recommendation),
        },
        "locations": [location],
        "properties": {
            "severity": finding.severity.symbol(),
            "confidence": finding.confidence,
        }
    });

    if !finding.taint_path.is_empty() {
        result["codeFlows"] = json!([{
            "threadFlows": [{
                "locations": finding
                    .taint_path
                    .iter()
                    .map(|hop| json!({
                        "location": {
                            "message": { "text": hop },
                        }
                    }))
                    .collect::<Vec<_>>(),
            }]
        }]);
    }

    result
}

use crate::workflow::{ActionDefinition, ActionKind, Step, Workflow};
use anyhow::{anyhow, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

static EXPRESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\{\s*(.*?)\s*\}\}").expect("valid expression regex"));

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\b(?:github|env|steps|needs|inputs|matrix|vars|secrets|jobs|runner|strategy)(?:\.[A-Za-z0-9_*-]+|\[\s*(?:'[^']+'|\d+|\*)\s*\])+",
    )
    .expect("valid reference regex")
});

/// Where in a step an expression was written.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ExprSite {
    Run,
    With(String),
    Env(String),
    Output(String),
    Condition,
}

impl ExprSite {
    pub fn describe(&self) -> String {
        match self {
            ExprSite::Run => "run script".to_string(),
            ExprSite::With(key) => format!("with.{key}"),
            ExprSite::Env(key) => format!("env.{key}"),
            ExprSite::Output(key) => format!("outputs.{key}"),
            ExprSite::Condition => "if condition".to_string(),
        }
    }
}

/// One `${{ ... }}` occurrence and the context paths it reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprUse {
    pub site: ExprSite,
    /// Expression body without the `${{ }}` delimiters.
    pub text: String,
    /// Context references such as `github.event.issue.title` or `steps.a.outputs.b`.
    pub references: Vec<String>,
}

/// A step with its expressions pulled out.
#[derive(Debug, Clone)]
pub struct IrStep {
    pub step: Step,
    pub expressions: Vec<ExprUse>,
}

impl IrStep {
    pub fn build(step: &Step) -> Self {
        let mut expressions = Vec::new();
        if let Some(run) = &step.run {
            expressions.extend(extract(ExprSite::Run, run));
        }
        for (key, value) in &step.with {
            expressions.extend(extract(ExprSite::With(key.clone()), value));
        }
        for (key, value) in &step.env {
            expressions.extend(extract(ExprSite::Env(key.clone()), value));
        }
        if let Some(cond) = &step.condition {
            // Conditions are often written without delimiters.
            if cond.contains("${{") {
                expressions.extend(extract(ExprSite::Condition, cond));
            } else {
                expressions.push(ExprUse {
                    site: ExprSite::Condition,
                    text: cond.trim().to_string(),
                    references: references(cond),
                });
            }
        }
        Self {
            step: step.clone(),
            expressions,
        }
    }

    pub fn expressions_at<'a>(&'a self, site: &'a ExprSite) -> impl Iterator<Item = &'a ExprUse> + 'a {
        self.expressions.iter().filter(move |e| &e.site == site)
    }

    /// True if the run script writes to `$GITHUB_OUTPUT` (or the legacy `set-output`).
    pub fn writes_outputs(&self) -> bool {
        self.step
            .run
            .as_deref()
            .map(|r| r.contains("GITHUB_OUTPUT") || r.contains("::set-output"))
            .unwrap_or(false)
    }

    /// True if the run script writes to `$GITHUB_ENV`.
    pub fn writes_env(&self) -> bool {
        self.step
            .run
            .as_deref()
            .map(|r| r.contains("GITHUB_ENV"))
            .unwrap_or(false)
    }
}

/// A job node in the workflow IR.
#[derive(Debug, Clone)]
pub struct IrJob {
    pub id: String,
    pub name: String,
    pub env: Vec<(String, Vec<ExprUse>)>,
    pub outputs: Vec<(String, Vec<ExprUse>)>,
    pub steps: Vec<IrStep>,
    pub uses: Option<String>,
    pub line: Option<usize>,
}

/// The normalized form of a workflow consumed by the taint engine: jobs as a
/// `needs` graph plus per-step expression uses.
#[derive(Debug, Clone)]
pub struct WorkflowIr {
    pub name: String,
    pub source: String,
    pub triggers: Vec<String>,
    pub env: Vec<(String, Vec<ExprUse>)>,
    pub graph: DiGraph<IrJob, ()>,
    pub node_map: HashMap<String, NodeIndex>,
    order: Vec<NodeIndex>,
}

impl WorkflowIr {
    /// Build the IR. Unknown `needs` targets and dependency cycles are errors.
    pub fn build(workflow: &Workflow) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for job in &workflow.jobs {
            let node = IrJob {
                id: job.id.clone(),
                name: job.name.clone(),
                env: extract_map(&job.env, ExprSite::Env),
                outputs: extract_map(&job.outputs, ExprSite::Output),
                steps: job.steps.iter().map(IrStep::build).collect(),
                uses: job.uses.clone(),
                line: job.line,
            };
            let idx = graph.add_node(node);
            node_map.insert(job.id.clone(), idx);
        }

        // Edges run from the dependency to the dependent job.
        for job in &workflow.jobs {
            let to = node_map[&job.id];
            for dep in &job.needs {
                let from = node_map
                    .get(dep)
                    .ok_or_else(|| anyhow!("Job '{}' needs unknown job '{}'", job.id, dep))?;
                graph.add_edge(*from, to, ());
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            anyhow!(
                "Dependency cycle involving job '{}'",
                graph[cycle.node_id()].id
            )
        })?;

        Ok(Self {
            name: workflow.name.clone(),
            source: workflow.source.clone(),
            triggers: workflow.triggers.clone(),
            env: extract_map(&workflow.env, ExprSite::Env),
            graph,
            node_map,
            order,
        })
    }

    /// Jobs in dependency order: every job comes after the jobs it needs.
    pub fn jobs_in_order(&self) -> impl Iterator<Item = &IrJob> {
        self.order.iter().map(|idx| &self.graph[*idx])
    }

    pub fn job(&self, id: &str) -> Option<&IrJob> {
        self.node_map.get(id).map(|idx| &self.graph[*idx])
    }


    pub fn triggered_by(&self, event: &str) -> bool {
        self.triggers.iter().any(|t| t == event)
    }
}

/// IR of a composite action.
#[derive(Debug, Clone)]
pub struct ActionIr {
    pub name: String,
    pub source: String,
    pub inputs: Vec<String>,
    pub kind: ActionKind,
    pub steps: Vec<IrStep>,
}

impl ActionIr {
    pub fn build(action: &ActionDefinition) -> Self {
        Self {
            name: action.name.clone(),
            source: action.source.clone(),
            inputs: action.inputs.clone(),
            kind: action.kind.clone(),
            steps: action.steps.iter().map(IrStep::build).collect(),
        }
    }

    pub fn is_composite(&self) -> bool {
        self.kind == ActionKind::Composite
    }
}

/// All `${{ }}` expressions in `text`.
pub fn extract(site: ExprSite, text: &str) -> Vec<ExprUse> {
    EXPRESSION_RE
        .captures_iter(text)
        .map(|cap| {
            let body = cap[1].to_string();
            ExprUse {
                site: site.clone(),
                references: references(&body),
                text: body,
            }
        })
        .collect()
}

/// Context paths read by an expression body, normalized to dotted form.
pub fn references(body: &str) -> Vec<String> {
    REFERENCE_RE
        .find_iter(body)
        .map(|m| normalize_reference(m.as_str()))
        .collect()
}

fn normalize_reference(raw: &str) -> String {
    raw.replace(' ', "")
        .replace("['", ".")
        .replace("']", "")
        .replace('[', ".")
        .replace(']', "")
}

fn extract_map(
    map: &BTreeMap<String, String>,
    site: fn(String) -> ExprSite,
) -> Vec<(String, Vec<ExprUse>)> {
    map.iter()
        .map(|(k, v)| (k.clone(), extract(site(k.clone()), v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workflow(yaml: &str) -> Workflow {
        Workflow::parse(yaml, "wf.yml".to_string()).unwrap()
    }

    #[test]
    fn test_extract_expressions() {
        let uses = extract(
            ExprSite::Run,
            "echo ${{ github.event.issue.title }} && echo ${{ format('{0}', env.NAME) }}",
        );
        assert_eq!(uses.len(), 2);
        assert_eq!(uses[0].text, "github.event.issue.title");
        assert_eq!(uses[0].references, vec!["github.event.issue.title"]);
        assert_eq!(uses[1].references, vec!["env.NAME"]);
    }

    #[test]
    fn test_bracket_references_are_normalized() {
        let refs = references("steps['get-title'].outputs.title");
        assert_eq!(refs, vec!["steps.get-title.outputs.title"]);
        let refs = references("github.event.commits[0].message");
        assert_eq!(refs, vec!["github.event.commits.0.message"]);
    }

    #[test]
    fn test_build_orders_jobs_by_needs() {
        let wf = workflow(
            r#"
on: push
jobs:
  deploy:
    needs: [build, test]
    steps: [{run: echo deploy}]
  test:
    needs: build
    steps: [{run: echo test}]
  build:
    steps: [{run: echo build}]
"#,
        );
        let ir = WorkflowIr::build(&wf).unwrap();
        let order: Vec<_> = ir.jobs_in_order().map(|j| j.id.as_str()).collect();
        assert_eq!(order, vec!["build", "test", "deploy"]);
    }

    #[test]
    fn test_unknown_needs_is_error() {
        let wf = workflow("on: push\njobs:\n  a:\n    needs: ghost\n    steps: []\n");
        let err = WorkflowIr::build(&wf).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_cycle_is_error() {
        let wf = workflow(
            "on: push\njobs:\n  a:\n    needs: b\n    steps: []\n  b:\n    needs: a\n    steps: []\n",
        );
        let err = WorkflowIr::build(&wf).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn test_step_sites() {
        let wf = workflow(
            r#"
on: issue_comment
jobs:
  a:
    steps:
      - uses: actions/github-script@v7
        if: github.event.comment.user.login == 'bot'
        with:
          script: console.log("${{ github.event.comment.body }}")
        env:
          BODY: ${{ github.event.comment.body }}
      - run: echo hi >> "$GITHUB_OUTPUT"
"#,
        );
        let ir = WorkflowIr::build(&wf).unwrap();
        let job = ir.job("a").unwrap();
        let step = &job.steps[0];
        let with_site = ExprSite::With("script".into());
        assert_eq!(step.expressions_at(&with_site).count(), 1);
        assert_eq!(step.expressions_at(&ExprSite::Env("BODY".into())).count(), 1);
        let cond: Vec<_> = step.expressions_at(&ExprSite::Condition).collect();
        assert_eq!(cond[0].references, vec!["github.event.comment.user.login"]);
        assert!(!step.writes_outputs());
        assert!(job.steps[1].writes_outputs());
    }
}

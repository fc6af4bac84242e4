use crate::config::TaintConfig;
use crate::context::AnalysisContext;
use crate::ir::{ActionIr, ExprSite, ExprUse, IrStep, WorkflowIr};
use crate::report::{Finding, Rule, Severity};
use crate::workflow::ActionDefinition;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, warn};

/// Attacker-controlled GitHub contexts. `*` matches one path segment.
const DANGEROUS_CONTEXTS: &[&str] = &[
    "github.event.issue.title",
    "github.event.issue.body",
    "github.event.pull_request.title",
    "github.event.pull_request.body",
    "github.event.pull_request.head.ref",
    "github.event.pull_request.head.label",
    "github.event.pull_request.head.repo.default_branch",
    "github.event.comment.body",
    "github.event.review.body",
    "github.event.review_comment.body",
    "github.event.pages.*.page_name",
    "github.event.commits.*.message",
    "github.event.commits.*.author.email",
    "github.event.commits.*.author.name",
    "github.event.head_commit.message",
    "github.event.head_commit.author.email",
    "github.event.head_commit.author.name",
    "github.head_ref",
    "github.event.workflow_run.head_branch",
    "github.event.workflow_run.head_commit.message",
    "github.event.workflow_run.head_commit.author.email",
    "github.event.workflow_run.head_commit.author.name",
    "github.event.discussion.title",
    "github.event.discussion.body",
];

/// Triggers that run with secrets and a write token for events outsiders can cause.
const PRIVILEGED_TRIGGERS: &[&str] = &["pull_request_target", "workflow_run"];

/// References that point a checkout at pull request code.
const UNTRUSTED_REFS: &[&str] = &[
    "github.event.pull_request.head.ref",
    "github.event.pull_request.head.sha",
    "github.head_ref",
    "github.event.workflow_run.head_sha",
    "github.event.workflow_run.head_branch",
];

const MAX_ACTION_DEPTH: usize = 3;

/// Taint facts for one scope: tainted key -> propagation path (source first).
#[derive(Debug, Clone, Default)]
struct Scope {
    tainted: HashMap<String, Vec<String>>,
}

impl Scope {
    fn mark(&mut self, key: String, mut path: Vec<String>) {
        if path.last() != Some(&key) {
            path.push(key.clone());
        }
        self.tainted.entry(key).or_insert(path);
    }

    fn lookup(&self, reference: &str) -> Option<&Vec<String>> {
        if let Some(path) = self.tainted.get(reference) {
            return Some(path);
        }
        // steps.<id>.outputs.<name> is tracked per step, not per output.
        let mut parts = reference.splitn(4, '.');
        match (parts.next(), parts.next(), parts.next()) {
            (Some("steps"), Some(id), Some("outputs")) => {
                self.tainted.get(&format!("steps.{id}.outputs"))
            }
            _ => None,
        }
    }
}

/// Where the steps being analysed live, for labelling findings.
struct StepsCtx<'s> {
    job: Option<&'s str>,
    inputs_tainted: bool,
    privileged: bool,
    depth: usize,
}

/// Traces attacker-controlled data through workflow expressions to code sinks.
pub struct TaintEngine<'a> {
    sources: Vec<String>,
    context: &'a dyn AnalysisContext,
}

impl<'a> TaintEngine<'a> {
    pub fn new(config: &TaintConfig, context: &'a dyn AnalysisContext) -> Self {
        let mut sources: Vec<String> = DANGEROUS_CONTEXTS
            .iter()
            .filter(|s| !config.ignored_sources.iter().any(|i| i == *s))
            .map(|s| s.to_string())
            .collect();
        sources.extend(config.extra_sources.iter().cloned());
        Self { sources, context }
    }

    /// Analyse a workflow and return its findings.
    pub fn run_workflow(&self, ir: &WorkflowIr) -> Vec<Finding> {
        debug!("Running taint analysis on {} ({})", ir.source, self.context.describe());
        let mut findings = Vec::new();
        let privileged = PRIVILEGED_TRIGGERS.iter().any(|t| ir.triggered_by(t));

        let mut workflow_scope = Scope::default();
        for (name, exprs) in &ir.env {
            if let Some(path) = self.first_tainted(exprs.iter(), &workflow_scope, false) {
                workflow_scope.mark(format!("env.{name}"), path);
            }
        }

        let mut job_outputs = Scope::default();

        for job in ir.jobs_in_order() {
            if let Some(uses) = &job.uses {
                debug!("Job '{}' calls reusable workflow {}, not followed", job.id, uses);
            }

            let mut scope = workflow_scope.clone();
            scope.tainted.extend(job_outputs.tainted.clone());
            for (name, exprs) in &job.env {
                if let Some(path) = self.first_tainted(exprs.iter(), &scope, false) {
                    scope.mark(format!("env.{name}"), path);
                }
            }

            let ctx = StepsCtx {
                job: Some(&job.id),
                inputs_tainted: false,
                privileged,
                depth: 0,
            };
            self.analyze_steps(&job.steps, &mut scope, &ctx, &mut findings);

            if privileged {
                findings.extend(untrusted_checkouts(&job.id, &job.steps, &ir.triggers));
            }

            for (name, exprs) in &job.outputs {
                if let Some(path) = self.first_tainted(exprs.iter(), &scope, false) {
                    job_outputs.mark(format!("needs.{}.outputs.{}", job.id, name), path);
                }
            }
        }

        findings
    }

    /// Analyse a composite action. Its inputs count as tainted.
    pub fn run_action(&self, ir: &ActionIr) -> Vec<Finding> {
        if !ir.is_composite() {
            debug!("Action {} is {:?}, only composite actions are analysed", ir.source, ir.kind);
            return Vec::new();
        }
        let mut findings = Vec::new();
        let ctx = StepsCtx {
            job: None,
            inputs_tainted: true,
            privileged: false,
            depth: 0,
        };
        self.analyze_steps(&ir.steps, &mut Scope::default(), &ctx, &mut findings);
        findings
    }

    fn analyze_steps(
        &self,
        steps: &[IrStep],
        scope: &mut Scope,
        ctx: &StepsCtx<'_>,
        findings: &mut Vec<Finding>,
    ) {
        for ir_step in steps {
            let step = &ir_step.step;
            let mut step_scope = scope.clone();
            for (key, _) in &step.env {
                let site = ExprSite::Env(key.clone());
                if let Some(path) =
                    self.first_tainted(ir_step.expressions_at(&site), &step_scope, ctx.inputs_tainted)
                {
                    step_scope.mark(format!("env.{key}"), path);
                }
            }

            let mut seen = BTreeSet::new();
            let mut run_tainted = None;
            for expr in ir_step.expressions_at(&ExprSite::Run) {
                let Some(path) = self.taint_of_expr(expr, &step_scope, ctx.inputs_tainted) else {
                    continue;
                };
                run_tainted.get_or_insert_with(|| path.clone());
                if seen.insert(expr.text.clone()) {
                    findings.push(self.injection_finding(Rule::CodeInjection, ir_step, expr, path, ctx));
                }
            }

            if step.action_name() == Some("actions/github-script") {
                let site = ExprSite::With("script".to_string());
                for expr in ir_step.expressions_at(&site) {
                    if let Some(path) = self.taint_of_expr(expr, &step_scope, ctx.inputs_tainted) {
                        if seen.insert(expr.text.clone()) {
                            findings.push(self.injection_finding(
                                Rule::ScriptInjection,
                                ir_step,
                                expr,
                                path,
                                ctx,
                            ));
                        }
                    }
                }
            }

            // Mitigated with an env var, but the value still lands in GITHUB_ENV.
            let shell_tainted = shell_vars_tainted(ir_step, &step_scope);
            if ir_step.writes_env() {
                for (var, path) in &shell_tainted {
                    findings.push(env_injection_finding(ir_step, var, path.clone(), ctx));
                }
            }

            if let Some(uses) = step.uses.as_deref().filter(|u| u.starts_with("./")) {
                self.check_local_action(uses, ir_step, &step_scope, ctx, findings);
            }

            if let Some(id) = &step.id {
                if ir_step.writes_outputs() {
                    let path = run_tainted.or_else(|| shell_tainted.into_iter().next().map(|(_, p)| p));
                    if let Some(path) = path {
                        scope.mark(format!("steps.{id}.outputs"), path);
                    }
                }
            }
        }
    }

    fn check_local_action(
        &self,
        uses: &str,
        ir_step: &IrStep,
        scope: &Scope,
        ctx: &StepsCtx<'_>,
        findings: &mut Vec<Finding>,
    ) {
        if ctx.depth >= MAX_ACTION_DEPTH {
            return;
        }
        let Some(path) = self.context.resolve_local_action(uses) else {
            debug!("Local action {} could not be resolved in {}", uses, self.context.describe());
            return;
        };
        let action = match ActionDefinition::parse_file(&path) {
            Ok(a) => ActionIr::build(&a),
            Err(e) => {
                warn!("Skipping local action {}: {:#}", path.display(), e);
                return;
            }
        };
        let sinks = self.action_sink_inputs(&action, ctx.depth + 1);

        for (key, _) in &ir_step.step.with {
            if !sinks.contains(key) {
                continue;
            }
            let site = ExprSite::With(key.clone());
            for expr in ir_step.expressions_at(&site) {
                if let Some(mut taint_path) = self.taint_of_expr(expr, scope, ctx.inputs_tainted) {
                    taint_path.push(format!("{uses} inputs.{key}"));
                    let mut finding =
                        self.injection_finding(Rule::LocalActionInjection, ir_step, expr, taint_path, ctx);
                    finding.severity = Severity::High;
                    finding.description = format!(
                        "{} The value is passed as input '{}' to local action {}, which expands it into a script.",
                        finding.description, key, uses
                    );
                    findings.push(finding);
                }
            }
        }
    }

    /// Inputs of `action` that reach a code sink inside it.
    fn action_sink_inputs(&self, action: &ActionIr, depth: usize) -> HashSet<String> {
        if !action.is_composite() {
            return HashSet::new();
        }
        let ctx = StepsCtx {
            job: None,
            inputs_tainted: true,
            privileged: false,
            depth,
        };
        let mut findings = Vec::new();
        self.analyze_steps(&action.steps, &mut Scope::default(), &ctx, &mut findings);
        findings
            .iter()
            .filter_map(|f| f.taint_path.first())
            .filter_map(|root| root.strip_prefix("inputs."))
            .map(String::from)
            .collect()
    }

    fn first_tainted<'e>(
        &self,
        exprs: impl Iterator<Item = &'e ExprUse>,
        scope: &Scope,
        inputs_tainted: bool,
    ) -> Option<Vec<String>> {
        exprs
            .filter_map(|e| self.taint_of_expr(e, scope, inputs_tainted))
            .next()
    }

    fn taint_of_expr(&self, expr: &ExprUse, scope: &Scope, inputs_tainted: bool) -> Option<Vec<String>> {
        expr.references
            .iter()
            .find_map(|r| self.taint_of(r, scope, inputs_tainted))
    }

    fn taint_of(&self, reference: &str, scope: &Scope, inputs_tainted: bool) -> Option<Vec<String>> {
        if self.is_source(reference) {
            return Some(vec![reference.to_string()]);
        }
        if inputs_tainted && reference.starts_with("inputs.") {
            return Some(vec![reference.to_string()]);
        }
        scope.lookup(reference).cloned()
    }

    /// True if `reference` names an attacker-controlled context.
    pub fn is_source(&self, reference: &str) -> bool {
        self.sources.iter().any(|s| matches_pattern(reference, s))
    }

    fn injection_finding(
        &self,
        rule: Rule,
        ir_step: &IrStep,
        expr: &ExprUse,
        taint_path: Vec<String>,
        ctx: &StepsCtx<'_>,
    ) -> Finding {
        let step = &ir_step.step;
        let root = taint_path.first().cloned().unwrap_or_default();
        let from_input = root.starts_with("inputs.");
        let direct = taint_path.len() == 1;

        let severity = match (from_input, direct, ctx.privileged) {
            (true, _, _) => Severity::Medium,
            (false, true, _) | (false, false, true) => Severity::Critical,
            (false, false, false) => Severity::High,
        };

        let location = match ctx.job {
            Some(job) => format!("Job '{}', step '{}'", job, step.label()),
            None => format!("Step '{}'", step.label()),
        };
        let via = if direct {
            String::new()
        } else {
            format!(" (via {})", taint_path[1..].join(" -> "))
        };

        Finding {
            rule,
            severity,
            title: format!("{} from {}", rule.label(), root),
            description: format!(
                "{} expands `${{{{ {} }}}}` in its {}. `{}` is attacker-controlled{}.",
                location,
                expr.text,
                expr.site.describe(),
                root,
                via
            ),
            job: ctx.job.map(String::from),
            step: Some(step.label()),
            line: step.line,
            expression: Some(expr.text.clone()),
            taint_path,
            recommendation: format!(
                "Assign the value to an environment variable and reference it from the script:\n  \
                 env:\n    VALUE: ${{{{ {} }}}}\n  \
                 Then use \"$VALUE\" in the script.",
                expr.text
            ),
            confidence: if direct { 0.95 } else { 0.8 },
        }
    }
}

/// Segment-wise prefix match where `*` matches any single segment.
fn matches_pattern(reference: &str, pattern: &str) -> bool {
    let mut r = reference.split('.');
    for p in pattern.split('.') {
        match r.next() {
            Some(seg) if p == "*" || p == seg || seg == "*" => {}
            _ => return false,
        }
    }
    true
}

/// Tainted `env.NAME` entries the run script reads as `$NAME` / `${NAME}`.
fn shell_vars_tainted(ir_step: &IrStep, scope: &Scope) -> Vec<(String, Vec<String>)> {
    let Some(run) = ir_step.step.run.as_deref() else {
        return Vec::new();
    };
    let mut hits: Vec<(String, Vec<String>)> = scope
        .tainted
        .iter()
        .filter_map(|(key, path)| {
            let var = key.strip_prefix("env.")?;
            let used = run.contains(&format!("${var}")) || run.contains(&format!("${{{var}}}"));
            used.then(|| (var.to_string(), path.clone()))
        })
        .collect();
    hits.sort();
    hits
}

fn env_injection_finding(
    ir_step: &IrStep,
    var: &str,
    taint_path: Vec<String>,
    ctx: &StepsCtx<'_>,
) -> Finding {
    let step = &ir_step.step;
    let root = taint_path.first().cloned().unwrap_or_default();
    Finding {
        rule: Rule::EnvInjection,
        severity: if root.starts_with("inputs.") { Severity::Medium } else { Severity::High },
        title: format!("{} from {}", Rule::EnvInjection.label(), root),
        description: format!(
            "Step '{}' writes ${} to GITHUB_ENV. `{}` is attacker-controlled and can set \
             arbitrary variables for later steps.",
            step.label(),
            var,
            root
        ),
        job: ctx.job.map(String::from),
        step: Some(step.label()),
        line: step.line,
        expression: Some(format!("env.{var}")),
        taint_path,
        recommendation: "Do not write untrusted values to GITHUB_ENV; pass them to later steps \
                         through step outputs and environment variables instead."
            .to_string(),
        confidence: 0.7,
    }
}

fn untrusted_checkouts(job: &str, steps: &[IrStep], triggers: &[String]) -> Vec<Finding> {
    let trigger = triggers
        .iter()
        .find(|t| PRIVILEGED_TRIGGERS.contains(&t.as_str()))
        .cloned()
        .unwrap_or_default();

    steps
        .iter()
        .filter(|s| s.step.action_name() == Some("actions/checkout"))
        .filter_map(|s| {
            let site = ExprSite::With("ref".to_string());
            let untrusted = s
                .expressions_at(&site)
                .flat_map(|e| e.references.iter())
                .find(|r| UNTRUSTED_REFS.iter().any(|u| matches_pattern(r, u)))
                .cloned()
                .or_else(|| {
                    s.step
                        .with
                        .get("ref")
                        .filter(|v| v.contains("refs/pull/"))
                        .cloned()
                })?;
            Some(Finding {
                rule: Rule::UntrustedCheckout,
                severity: Severity::High,
                title: format!("{} on {}", Rule::UntrustedCheckout.label(), trigger),
                description: format!(
                    "Job '{}', step '{}' checks out `{}` in a `{}` workflow, which runs with \
                     secrets and a write token.",
                    job,
                    s.step.label(),
                    untrusted,
                    trigger
                ),
                job: Some(job.to_string()),
                step: Some(s.step.label()),
                line: s.step.line,
                expression: Some(untrusted.clone()),
                taint_path: vec![untrusted],
                recommendation: "Use the `pull_request` trigger for building untrusted code, or \
                                 split the privileged part into a separate `workflow_run` job \
                                 that never executes checked-out code."
                    .to_string(),
                confidence: 0.85,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LocalFileRepo;
    use crate::workflow::Workflow;
    use std::path::PathBuf;

    fn analyze(yaml: &str) -> Vec<Finding> {
        analyze_with(yaml, &TaintConfig::default())
    }

    fn analyze_with(yaml: &str, config: &TaintConfig) -> Vec<Finding> {
        let wf = Workflow::parse(yaml, "wf.yml".to_string()).unwrap();
        let ir = WorkflowIr::build(&wf).unwrap();
        let ctx = LocalFileRepo::new(PathBuf::from("/nonexistent/wf.yml"));
        TaintEngine::new(config, &ctx).run_workflow(&ir)
    }

    #[test]
    fn test_direct_injection() {
        let findings = analyze(
            r#"
on: issues
jobs:
  greet:
    steps:
      - name: Echo title
        run: echo "${{ github.event.issue.title }}"
"#,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, Rule::CodeInjection);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].step.as_deref(), Some("Echo title"));
        assert_eq!(findings[0].taint_path, vec!["github.event.issue.title"]);
    }

    #[test]
    fn test_safe_context_not_flagged() {
        let findings = analyze(
            r#"
on: push
jobs:
  build:
    steps:
      - run: echo ${{ github.sha }} ${{ secrets.TOKEN }}
"#,
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_env_var_mitigation_not_flagged() {
        let findings = analyze(
            r#"
on: issues
jobs:
  greet:
    steps:
      - run: echo "$TITLE"
        env:
          TITLE: ${{ github.event.issue.title }}
"#,
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_wildcard_source() {
        let findings = analyze(
            r#"
on: push
jobs:
  log:
    steps:
      - run: echo "${{ github.event.commits[0].message }}"
"#,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].taint_path, vec!["github.event.commits.0.message"]);

        assert!(matches_pattern(
            "github.event.commits.0.message",
            "github.event.commits.*.message"
        ));
        assert!(matches_pattern(
            "github.event.pull_request.*",
            "github.event.pull_request.title"
        ));
        assert!(!matches_pattern("github.event.issue", "github.event.issue.title"));
    }

    #[test]
    fn test_propagation_through_env_and_outputs() {
        let findings = analyze(
            r#"
on: pull_request_target
env:
  BRANCH: ${{ github.head_ref }}
jobs:
  prepare:
    runs-on: ubuntu-latest
    outputs:
      branch: ${{ steps.name.outputs.value }}
    steps:
      - id: name
        run: echo "value=${{ env.BRANCH }}" >> "$GITHUB_OUTPUT"
  use:
    needs: prepare
    runs-on: ubuntu-latest
    steps:
      - name: Deploy
        run: ./deploy.sh ${{ needs.prepare.outputs.branch }}
"#,
        );
        let deploy = findings
            .iter()
            .find(|f| f.step.as_deref() == Some("Deploy"))
            .expect("deploy finding");
        assert_eq!(deploy.rule, Rule::CodeInjection);
        assert_eq!(deploy.job.as_deref(), Some("use"));
        assert_eq!(
            deploy.taint_path,
            vec![
                "github.head_ref",
                "env.BRANCH",
                "steps.name.outputs",
                "needs.prepare.outputs.branch"
            ]
        );
        // Privileged trigger: propagated taint is still critical.
        assert_eq!(deploy.severity, Severity::Critical);
    }

    #[test]
    fn test_propagated_taint_is_high_without_privileged_trigger() {
        let findings = analyze(
            r#"
on: issue_comment
jobs:
  a:
    env:
      BODY: ${{ github.event.comment.body }}
    steps:
      - run: echo "${{ env.BODY }}"
"#,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[0].taint_path, vec!["github.event.comment.body", "env.BODY"]);
    }

    #[test]
    fn test_github_script_sink() {
        let findings = analyze(
            r#"
on: pull_request_target
jobs:
  label:
    steps:
      - uses: actions/github-script@v7
        with:
          script: |
            const title = "${{ github.event.pull_request.title }}";
"#,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, Rule::ScriptInjection);
    }

    #[test]
    fn test_github_env_write() {
        let findings = analyze(
            r#"
on: issues
jobs:
  a:
    steps:
      - run: echo "TITLE=$TITLE" >> "$GITHUB_ENV"
        env:
          TITLE: ${{ github.event.issue.title }}
"#,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, Rule::EnvInjection);
        assert_eq!(findings[0].severity, Severity::High);
    }

    #[test]
    fn test_untrusted_checkout() {
        let findings = analyze(
            r#"
on: pull_request_target
jobs:
  build:
    steps:
      - uses: actions/checkout@v4
        with:
          ref: ${{ github.event.pull_request.head.sha }}
      - run: npm ci && npm test
"#,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, Rule::UntrustedCheckout);
        assert!(findings[0].title.contains("pull_request_target"));
    }

    #[test]
    fn test_checkout_on_pull_request_is_fine() {
        let findings = analyze(
            r#"
on: pull_request
jobs:
  build:
    steps:
      - uses: actions/checkout@v4
        with:
          ref: ${{ github.event.pull_request.head.sha }}
"#,
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_config_sources() {
        let yaml = r#"
on: release
jobs:
  a:
    steps:
      - run: echo "${{ github.event.release.body }}" "${{ github.head_ref }}"
"#;
        assert_eq!(analyze(yaml).len(), 1);

        let config = TaintConfig {
            extra_sources: vec!["github.event.release.body".into()],
            ignored_sources: vec!["github.head_ref".into()],
        };
        let findings = analyze_with(yaml, &config);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].taint_path, vec!["github.event.release.body"]);
    }

    #[test]
    fn test_action_inputs_are_sources() {
        let action = ActionDefinition::parse(
            r#"
name: tagger
inputs:
  tag: {}
  quiet: {}
runs:
  using: composite
  steps:
    - run: git tag "${{ inputs.tag }}"
      shell: bash
    - run: echo "${{ inputs.quiet == 'true' && 'q' || 'v' }}"
      shell: bash
"#,
            "action.yml".into(),
        )
        .unwrap();
        let ir = ActionIr::build(&action);
        let ctx = LocalFileRepo::new(PathBuf::from("/nonexistent/action.yml"));
        let engine = TaintEngine::new(&TaintConfig::default(), &ctx);
        let findings = engine.run_action(&ir);
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.severity == Severity::Medium));

        let sinks = engine.action_sink_inputs(&ir, 1);
        assert!(sinks.contains("tag"));
    }

    #[test]
    fn test_docker_action_skipped() {
        let action = ActionDefinition::parse(
            "name: d\nruns:\n  using: docker\n  image: Dockerfile\n",
            "action.yml".into(),
        )
        .unwrap();
        let ctx = LocalFileRepo::new(PathBuf::from("/nonexistent/action.yml"));
        let findings = TaintEngine::new(&TaintConfig::default(), &ctx).run_action(&ActionIr::build(&action));
        assert!(findings.is_empty());
    }

    #[test]
    fn test_local_action_injection() {
        let dir = tempfile::tempdir().unwrap();
        let wf_dir = dir.path().join(".github/workflows");
        let action_dir = dir.path().join(".github/actions/echo");
        std::fs::create_dir_all(&wf_dir).unwrap();
        std::fs::create_dir_all(&action_dir).unwrap();
        std::fs::write(
            action_dir.join("action.yml"),
            "name: echo\ninputs:\n  msg: {}\nruns:\n  using: composite\n  steps:\n    - run: echo \"${{ inputs.msg }}\"\n      shell: bash\n",
        )
        .unwrap();
        let wf_path = wf_dir.join("ci.yml");
        std::fs::write(
            &wf_path,
            "on: issues\njobs:\n  a:\n    steps:\n      - uses: ./.github/actions/echo\n        with:\n          msg: ${{ github.event.issue.body }}\n",
        )
        .unwrap();

        let wf = Workflow::parse_file(&wf_path).unwrap();
        let ir = WorkflowIr::build(&wf).unwrap();
        let ctx = LocalFileRepo::new(wf_path.clone());
        let findings = TaintEngine::new(&TaintConfig::default(), &ctx).run_workflow(&ir);

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, Rule::LocalActionInjection);
        assert_eq!(
            findings[0].taint_path,
            vec!["github.event.issue.body", "./.github/actions/echo inputs.msg"]
        );
    }
}

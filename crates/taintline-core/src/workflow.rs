use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// A single step of a job or a composite action.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Step {
    /// Position within its job, starting at 0.
    pub index: usize,
    pub id: Option<String>,
    pub name: String,
    pub uses: Option<String>,
    pub run: Option<String>,
    pub shell: Option<String>,
    pub condition: Option<String>,
    pub with: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    /// 1-based line in the source file, when it could be located.
    pub line: Option<usize>,
}

impl Step {
    /// The `uses:` target without its `@ref`.
    pub fn action_name(&self) -> Option<&str> {
        self.uses
            .as_deref()
            .map(|u| u.split_once('@').map(|(name, _)| name).unwrap_or(u))
    }

    pub fn label(&self) -> String {
        match (&self.id, self.name.as_str()) {
            (_, name) if !name.is_empty() => name.to_string(),
            (Some(id), _) => id.clone(),
            _ => format!("step {}", self.index + 1),
        }
    }
}

/// A job in a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub runs_on: String,
    pub needs: Vec<String>,
    pub condition: Option<String>,
    pub env: BTreeMap<String, String>,
    pub outputs: BTreeMap<String, String>,
    pub steps: Vec<Step>,
    /// Reusable workflow call (`jobs.<id>.uses`).
    pub uses: Option<String>,
    pub with: BTreeMap<String, String>,
    pub line: Option<usize>,
}

/// A parsed GitHub Actions workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    pub source: String,
    pub triggers: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub jobs: Vec<Job>,
}

impl Workflow {
    /// Parse a workflow file from disk.
    pub fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file: {}", path.display()))?;
        Self::parse(&content, path.to_string_lossy().to_string())
    }

    /// Parse workflow YAML. `source` labels findings and report locations.
    pub fn parse(content: &str, source: String) -> Result<Self> {
        let yaml: Value = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        if !yaml.is_mapping() {
            anyhow::bail!("Workflow is not a YAML mapping");
        }

        let name = yaml
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("Unnamed Workflow")
            .to_string();

        let triggers = yaml.get("on").map(parse_triggers).unwrap_or_default();

        let jobs_map = yaml
            .get("jobs")
            .and_then(|v| v.as_mapping())
            .context("No 'jobs' section found in workflow")?;

        let mut jobs = Vec::new();
        for (job_id, config) in jobs_map {
            let job_id = job_id
                .as_str()
                .context("Job ids must be strings")?
                .to_string();
            jobs.push(parse_job(&job_id, config));
        }

        let mut workflow = Workflow {
            name,
            source,
            triggers,
            env: yaml.get("env").map(parse_string_map).unwrap_or_default(),
            jobs,
        };
        locate_lines(content, &mut workflow);
        Ok(workflow)
    }

    pub fn get_job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn triggered_by(&self, event: &str) -> bool {
        self.triggers.iter().any(|t| t == event)
    }
}

/// How an action executes (`runs.using`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    Composite,
    Docker,
    JavaScript(String),
    Unknown(String),
}

/// A parsed `action.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDefinition {
    pub name: String,
    pub source: String,
    pub inputs: Vec<String>,
    pub kind: ActionKind,
    pub steps: Vec<Step>,
}

impl ActionDefinition {
    pub fn parse_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read action file: {}", path.display()))?;
        Self::parse(&content, path.to_string_lossy().to_string())
    }

    pub fn parse(content: &str, source: String) -> Result<Self> {
        let yaml: Value = serde_yaml::from_str(content).context("Failed to parse YAML")?;

        let name = yaml
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or("Unnamed Action")
            .to_string();

        let inputs = yaml
            .get("inputs")
            .and_then(|v| v.as_mapping())
            .map(|m| m.keys().filter_map(|k| k.as_str().map(String::from)).collect())
            .unwrap_or_default();

        let runs = yaml.get("runs").context("No 'runs' section found in action")?;
        let using = runs
            .get("using")
            .and_then(|v| v.as_str())
            .context("Action 'runs' section has no 'using' key")?;

        let kind = match using {
            "composite" => ActionKind::Composite,
            "docker" => ActionKind::Docker,
            js if js.starts_with("node") => ActionKind::JavaScript(js.to_string()),
            other => ActionKind::Unknown(other.to_string()),
        };

        let steps = match kind {
            ActionKind::Composite => runs
                .get("steps")
                .and_then(|v| v.as_sequence())
                .map(|seq| seq.iter().enumerate().map(|(i, s)| parse_step(i, s)).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        };

        let mut action = ActionDefinition {
            name,
            source,
            inputs,
            kind,
            steps,
        };
        locate_steps(content, 0, &mut action.steps);
        Ok(action)
    }
}

fn parse_triggers(on: &Value) -> Vec<String> {
    match on {
        Value::String(event) => vec![event.clone()],
        Value::Sequence(events) => events
            .iter()
            .filter_map(|e| e.as_str().map(String::from))
            .collect(),
        Value::Mapping(map) => map
            .keys()
            .filter_map(|e| e.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_job(job_id: &str, config: &Value) -> Job {
    let name = config
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(job_id)
        .to_string();

    let runs_on = match config.get("runs-on") {
        Some(Value::Sequence(labels)) => labels
            .iter()
            .filter_map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(","),
        Some(v) => scalar(v).unwrap_or_default(),
        None => String::new(),
    };

    let steps = config
        .get("steps")
        .and_then(|v| v.as_sequence())
        .map(|seq| seq.iter().enumerate().map(|(i, s)| parse_step(i, s)).collect())
        .unwrap_or_default();

    Job {
        id: job_id.to_string(),
        name,
        runs_on,
        needs: config.get("needs").map(parse_needs).unwrap_or_default(),
        condition: config.get("if").and_then(scalar),
        env: config.get("env").map(parse_string_map).unwrap_or_default(),
        outputs: config.get("outputs").map(parse_string_map).unwrap_or_default(),
        steps,
        uses: config.get("uses").and_then(|v| v.as_str()).map(String::from),
        with: config.get("with").map(parse_string_map).unwrap_or_default(),
        line: None,
    }
}

fn parse_needs(needs: &Value) -> Vec<String> {
    match needs {
        Value::String(s) => vec![s.clone()],
        Value::Sequence(seq) => seq
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    }
}

fn parse_step(index: usize, step: &Value) -> Step {
    Step {
        index,
        id: step.get("id").and_then(scalar),
        name: step
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        uses: step.get("uses").and_then(|v| v.as_str()).map(String::from),
        run: step.get("run").and_then(|v| v.as_str()).map(String::from),
        shell: step.get("shell").and_then(|v| v.as_str()).map(String::from),
        condition: step.get("if").and_then(scalar),
        with: step.get("with").map(parse_string_map).unwrap_or_default(),
        env: step.get("env").map(parse_string_map).unwrap_or_default(),
        line: None,
    }
}

fn parse_string_map(value: &Value) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    if let Some(mapping) = value.as_mapping() {
        for (k, v) in mapping {
            if let (Some(key), Some(val)) = (k.as_str(), scalar(v)) {
                map.insert(key.to_string(), val);
            }
        }
    }
    map
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Best-effort line numbers: serde_yaml drops positions, so find each job
/// header and then each step's first distinctive line, scanning forward.
fn locate_lines(content: &str, workflow: &mut Workflow) {
    let lines: Vec<&str> = content.lines().collect();
    let mut cursor = lines
        .iter()
        .position(|l| l.trim_end() == "jobs:")
        .unwrap_or(0);

    for job in &mut workflow.jobs {
        let header = format!("{}:", job.id);
        if let Some(offset) = lines[cursor..].iter().position(|l| {
            let l = l.trim();
            l == header || l.trim_matches(|c| c == '\'' || c == '"' || c == ':') == job.id
        }) {
            cursor += offset;
            job.line = Some(cursor + 1);
        }
        cursor = locate_steps_from(&lines, cursor, &mut job.steps);
    }
}

fn locate_steps(content: &str, start: usize, steps: &mut [Step]) {
    let lines: Vec<&str> = content.lines().collect();
    locate_steps_from(&lines, start, steps);
}

fn locate_steps_from(lines: &[&str], mut cursor: usize, steps: &mut [Step]) -> usize {
    for step in steps {
        let needle = step
            .run
            .as_deref()
            .and_then(|r| r.lines().find(|l| !l.trim().is_empty()))
            .map(str::trim)
            .or(step.uses.as_deref())
            .or(step.id.as_deref())
            .or(Some(step.name.as_str()).filter(|n| !n.is_empty()));

        let Some(needle) = needle else { continue };
        if let Some(offset) = lines
            .get(cursor..)
            .unwrap_or_default()
            .iter()
            .position(|l| l.contains(needle))
        {
            cursor += offset;
            step.line = Some(cursor + 1);
        }
    }
    cursor
}

/// All workflow files under `<root>/.github/workflows`, sorted.
pub fn discover_workflows(root: &Path) -> Result<Vec<PathBuf>> {
    let dir = root.join(".github").join("workflows");
    let mut files = Vec::new();
    for ext in ["yml", "yaml"] {
        let pattern = format!("{}/*.{}", dir.display(), ext);
        files.extend(
            glob::glob(&pattern)
                .context("Failed to read glob pattern")?
                .filter_map(|r| r.ok())
                .filter(|p| p.is_file()),
        );
    }
    files.sort();
    Ok(files)
}

/// `action.yml` or `action.yaml` inside `dir`.
pub fn find_action_definition(dir: &Path) -> Option<PathBuf> {
    ["action.yml", "action.yaml"]
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// True for paths ending in `.yml` or `.yaml`.
pub fn has_workflow_extension(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml") | Some("yaml")
    )
}

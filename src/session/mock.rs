//! In-memory session backend for tests and the demo binary
//!
//! Holds a small dataset (a schema plus JSON samples) and evaluates
//! pipelines against it well enough to produce realistic summaries and
//! schema-level rejections.
//!
//! # Supported semantics
//!
//! - Field references are checked against the schema; an unknown field
//!   rejects the pipeline at that stage with `unknown field '<name>'`
//! - `match` / `filter_*` expressions are compiled with strict variables
//!   and evaluated per sample with rhai
//! - `limit`, `skip`, `take`, `exists`, `match_tag(s)`, `select`,
//!   `exclude` change the sample set; `select_fields` / `exclude_fields`
//!   change the visible fields
//! - `shuffle`, `sort_by` and `mongo` do not change counts
//!
//! # Enabling
//!
//! Only compiled with the `mock-session` feature (on by default).

use crate::session::bridge::{EvaluateError, SessionBackend};
use crate::session::protocol::SerializedStage;
use crate::stage::{ParamValue, Parameters, StageKind};
use crate::types::{DatasetId, PipelineSummary};
use rhai::{Dynamic, Engine, ParseErrorType, Scope, AST};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Fields every view shows, which `exclude_fields` may not remove
pub const DEFAULT_FIELDS: &[&str] = &["id", "filepath", "tags"];

/// A named in-memory dataset.
#[derive(Debug, Clone)]
pub struct MockDataset {
    pub name: String,
    /// Top-level field names
    pub schema: Vec<String>,
    pub samples: Vec<Value>,
}

impl MockDataset {
    pub fn new(name: impl Into<String>, schema: Vec<String>, samples: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            schema,
            samples,
        }
    }

    /// Twelve labelled images with detections
    pub fn quickstart() -> Self {
        const LABELS: [&str; 3] = ["cat", "dog", "bird"];
        let samples = (0..12u64)
            .map(|i| {
                let detections: Vec<Value> = (0..i % 4)
                    .map(|j| {
                        json!({
                            "label": LABELS[((i + j) % 3) as usize],
                            "confidence": 0.5 + 0.1 * j as f64,
                        })
                    })
                    .collect();
                json!({
                    "id": format!("{:024x}", i + 1),
                    "filepath": format!("/data/quickstart/{:06}.jpg", i),
                    "tags": [if i % 3 == 0 { "validation" } else { "train" }],
                    "label": LABELS[(i % 3) as usize],
                    "confidence": 0.05 + 0.08 * i as f64,
                    "width": 640 + 10 * i,
                    "detections": detections,
                })
            })
            .collect();
        let schema = ["id", "filepath", "tags", "label", "confidence", "width", "detections"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self::new("quickstart", schema, samples)
    }

    pub fn has_field(&self, path: &str) -> bool {
        let root = path.split('.').next().unwrap_or(path);
        self.schema.iter().any(|f| f == root)
    }
}

/// Working state while applying stages.
struct View<'a> {
    samples: Vec<&'a Value>,
    fields: Vec<String>,
}

/// In-memory [`SessionBackend`].
pub struct MockBackend {
    engine: Engine,
    datasets: HashMap<String, MockDataset>,
    current: Option<String>,
    latency: Option<Duration>,
    /// Evaluations left before a simulated backend fault
    fault_after: Option<usize>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// A backend serving the `quickstart` dataset
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_strict_variables(true);
        engine.set_max_expr_depths(64, 64);
        Self {
            engine,
            datasets: HashMap::new(),
            current: None,
            latency: None,
            fault_after: None,
        }
        .with_dataset(MockDataset::quickstart())
    }

    pub fn with_dataset(mut self, dataset: MockDataset) -> Self {
        self.datasets.insert(dataset.name.clone(), dataset);
        self
    }

    /// Sleep this long in every call
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Fail with a backend fault once `n` evaluations have succeeded
    pub fn with_fault_after(mut self, n: usize) -> Self {
        self.fault_after = Some(n);
        self
    }

    fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
    }

    /// Evaluate `stages` against `dataset` without touching session state
    pub fn evaluate_on(
        &self,
        dataset: &MockDataset,
        stages: &[SerializedStage],
    ) -> Result<PipelineSummary, EvaluateError> {
        let mut view = View {
            samples: dataset.samples.iter().collect(),
            fields: dataset.schema.clone(),
        };
        for (index, stage) in stages.iter().enumerate() {
            let reject = |reason: String| EvaluateError::Rejected {
                stage_index: index,
                reason,
            };
            let (kind, params) = stage.decode().map_err(|e| reject(e.to_string()))?;
            check_field_refs(dataset, kind, &params).map_err(reject)?;
            self.apply(dataset, kind, &params, &mut view).map_err(reject)?;
        }
        Ok(PipelineSummary::new(
            view.samples.len() as u64,
            dataset.samples.len() as u64,
            view.fields,
        ))
    }

    fn apply(
        &self,
        dataset: &MockDataset,
        kind: StageKind,
        params: &Parameters,
        view: &mut View<'_>,
    ) -> Result<(), String> {
        let int = |name: &str| params.get(name).and_then(|v| v.as_int()).unwrap_or(0);
        let strs = |name: &str| -> Vec<String> {
            params
                .get(name)
                .map(|v| v.as_str_list().into_iter().map(String::from).collect())
                .unwrap_or_default()
        };

        match kind {
            StageKind::Match => {
                let ast = self.compile(dataset, params.get("filter"), &[])?;
                let mut kept = Vec::new();
                for sample in view.samples.drain(..) {
                    let mut scope = sample_scope(dataset, sample);
                    if self.test(&mut scope, &ast)? {
                        kept.push(sample);
                    }
                }
                view.samples = kept;
            }
            StageKind::FilterField
            | StageKind::FilterClassifications
            | StageKind::FilterDetections => {
                let field = params.get("field").and_then(|v| v.as_str()).unwrap_or_default();
                let ast = self.compile(dataset, params.get("filter"), &["value"])?;
                let mut kept = Vec::new();
                for sample in view.samples.drain(..) {
                    let items: Vec<&Value> = match sample.get(field) {
                        Some(Value::Array(items)) => items.iter().collect(),
                        Some(Value::Null) | None => Vec::new(),
                        Some(value) => vec![value],
                    };
                    let mut matched = false;
                    for item in items {
                        let mut scope = sample_scope(dataset, sample);
                        scope.push_dynamic("value", to_dynamic(item));
                        if self.test(&mut scope, &ast)? {
                            matched = true;
                            break;
                        }
                    }
                    if matched {
                        kept.push(sample);
                    }
                }
                view.samples = kept;
            }
            StageKind::Exists => {
                let field = strs("field").pop().unwrap_or_default();
                view.samples
                    .retain(|s| s.get(&field).is_some_and(|v| !v.is_null()));
            }
            StageKind::Limit | StageKind::Take => {
                let n = int(if kind == StageKind::Limit { "limit" } else { "size" });
                view.samples.truncate(n.max(0) as usize);
            }
            StageKind::Skip => {
                let n = (int("skip").max(0) as usize).min(view.samples.len());
                view.samples.drain(..n);
            }
            StageKind::MatchTag | StageKind::MatchTags => {
                let wanted = strs(if kind == StageKind::MatchTag { "tag" } else { "tags" });
                view.samples.retain(|s| {
                    sample_tags(s).iter().any(|t| wanted.iter().any(|w| w == t))
                });
            }
            StageKind::Select | StageKind::Exclude => {
                let ids = strs("sample_ids");
                let keep = kind == StageKind::Select;
                view.samples.retain(|s| {
                    let id = s.get("id").and_then(Value::as_str).unwrap_or_default();
                    ids.iter().any(|i| i == id) == keep
                });
            }
            StageKind::SelectFields => {
                let chosen = strs("field_names");
                view.fields.retain(|f| {
                    DEFAULT_FIELDS.contains(&f.as_str()) || chosen.iter().any(|c| c == f)
                });
            }
            StageKind::ExcludeFields => {
                let excluded = strs("field_names");
                if let Some(f) = excluded.iter().find(|f| DEFAULT_FIELDS.contains(&f.as_str())) {
                    return Err(format!("cannot exclude default field '{}'", f));
                }
                view.fields.retain(|f| !excluded.contains(f));
            }
            StageKind::SortBy => {
                if let Some(ParamValue::Expr(_)) = params.get("field_or_expr") {
                    self.compile(dataset, params.get("field_or_expr"), &[])?;
                }
            }
            StageKind::Shuffle | StageKind::Mongo => {}
        }
        Ok(())
    }

    /// Compile an expression parameter against the schema.
    fn compile(
        &self,
        dataset: &MockDataset,
        value: Option<&ParamValue>,
        extra: &[&str],
    ) -> Result<AST, String> {
        let src = match value {
            Some(ParamValue::Expr(src)) | Some(ParamValue::Str(src)) => src,
            _ => return Err("missing expression".to_string()),
        };
        let mut scope = Scope::new();
        for name in dataset.schema.iter().map(String::as_str).chain(extra.iter().copied()) {
            scope.push_dynamic(name.to_string(), Dynamic::UNIT);
        }
        self.engine
            .compile_expression_with_scope(&scope, src)
            .map_err(|e| match e.err_type() {
                ParseErrorType::VariableUndefined(name) => format!("unknown field '{}'", name),
                _ => e.to_string(),
            })
    }

    fn test(&self, scope: &mut Scope<'_>, ast: &AST) -> Result<bool, String> {
        let result: Dynamic = self
            .engine
            .eval_ast_with_scope(scope, ast)
            .map_err(|e| e.to_string())?;
        result
            .as_bool()
            .map_err(|ty| format!("filter must evaluate to a bool, got {}", ty))
    }
}

impl SessionBackend for MockBackend {
    fn attach(&mut self, dataset: &DatasetId) -> Result<PipelineSummary, String> {
        self.simulate_latency();
        let data = self
            .datasets
            .get(dataset.as_str())
            .ok_or_else(|| format!("dataset '{}' not found", dataset))?;
        let summary = PipelineSummary::new(
            data.samples.len() as u64,
            data.samples.len() as u64,
            data.schema.clone(),
        );
        self.current = Some(dataset.as_str().to_string());
        Ok(summary)
    }

    fn evaluate(&mut self, stages: &[SerializedStage]) -> Result<PipelineSummary, EvaluateError> {
        self.simulate_latency();
        match self.fault_after {
            Some(0) => return Err(EvaluateError::Fault("mock backend fault".to_string())),
            Some(n) => self.fault_after = Some(n - 1),
            None => {}
        }
        let dataset = self
            .current
            .as_ref()
            .and_then(|name| self.datasets.get(name))
            .ok_or_else(|| EvaluateError::Fault("no dataset attached".to_string()))?;
        self.evaluate_on(dataset, stages)
    }

    fn detach(&mut self) {
        self.current = None;
    }

    fn name(&self) -> String {
        "mock://in-memory".to_string()
    }
}

/// Reject references to fields outside the schema.
fn check_field_refs(dataset: &MockDataset, kind: StageKind, params: &Parameters) -> Result<(), String> {
    for spec in kind.params().iter().filter(|s| s.references_fields()) {
        let names = match params.get(spec.name) {
            Some(ParamValue::Str(s)) => vec![s.as_str()],
            Some(value @ ParamValue::List(_)) => value.as_str_list(),
            _ => continue,
        };
        if let Some(unknown) = names.into_iter().find(|n| !dataset.has_field(n)) {
            return Err(format!("unknown field '{}'", unknown));
        }
    }
    Ok(())
}

fn sample_scope(dataset: &MockDataset, sample: &Value) -> Scope<'static> {
    let mut scope = Scope::new();
    for field in &dataset.schema {
        let value = sample.get(field).map(to_dynamic).unwrap_or(Dynamic::UNIT);
        scope.push_dynamic(field.clone(), value);
    }
    scope
}

fn sample_tags(sample: &Value) -> Vec<&str> {
    sample
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default()
}

fn to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from_bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Dynamic::from_int(i),
            None => Dynamic::from_float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(items) => Dynamic::from_array(items.iter().map(to_dynamic).collect()),
        Value::Object(map) => {
            let mut out = rhai::Map::new();
            for (k, v) in map {
                out.insert(k.as_str().into(), to_dynamic(v));
            }
            Dynamic::from_map(out)
        }
    }
}

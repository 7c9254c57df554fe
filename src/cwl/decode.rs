//! Value Decoder
//!
//! Turns an untyped YAML tree into the typed AST. Every union-shaped field
//! is resolved by looking at the node kind (scalar, sequence or mapping)
//! rather than by trying decoders in turn, so a looser shape can never
//! silently win over a stricter one.
//!
//! Leaf records (bindings, parameter bodies, requirement payloads) are
//! plain serde derives; the collection shapes around them are decoded
//! here.

use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use super::model::{
    lift_strings, scalar_to_string, CommandLineTool, CwlExpression, Hints, Identified,
};
use super::requirements::Requirements;
use super::workflow::{
    Scatter, ScatterMethod, Workflow, WorkflowInputParameter, WorkflowOutputParameter,
    WorkflowStep, WorkflowStepInput, STEP_INPUT_FIELDS,
};
use crate::config::TranspileConfig;
use crate::error::{DecodeError, ResolutionError, TranspileResult};

/// A decoded top-level document.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    CommandLineTool(Box<CommandLineTool>),
    Workflow(Box<Workflow>),
    /// A class this crate does not lower
    Other(String),
}

/// Decodes documents, resolving nested `run:` files through the configured search path.
pub struct Decoder<'a> {
    config: &'a TranspileConfig,
}

impl<'a> Decoder<'a> {
    pub fn new(config: &'a TranspileConfig) -> Self {
        Self { config }
    }

    /// Decodes a document, dispatching on its `class`.
    pub fn decode_document(&self, value: Value) -> TranspileResult<Document> {
        let class = match &value {
            Value::Mapping(map) => match map.get("class") {
                Some(class) => class
                    .as_str()
                    .ok_or_else(|| DecodeError::shape("class", "a string"))?
                    .to_string(),
                None => {
                    return Err(DecodeError::MissingField {
                        field: "document".to_string(),
                        name: "class",
                    }
                    .into())
                }
            },
            _ => return Err(DecodeError::shape("document", "a mapping").into()),
        };

        match class.as_str() {
            "CommandLineTool" => {
                info!("Found CommandLineTool");
                Ok(Document::CommandLineTool(Box::new(self.decode_tool(value)?)))
            }
            "Workflow" => {
                info!("Found Workflow");
                Ok(Document::Workflow(Box::new(self.decode_workflow(value)?)))
            }
            other => {
                warn!("Document class '{}' is not supported, nothing to emit", other);
                Ok(Document::Other(class))
            }
        }
    }

    /// Decodes a `CommandLineTool` mapping.
    pub fn decode_tool(&self, value: Value) -> TranspileResult<CommandLineTool> {
        let mut map = into_mapping("CommandLineTool", value)?;

        let id = take_string(&mut map, "CommandLineTool", "id")?;
        let ctx = id.clone().unwrap_or_else(|| "CommandLineTool".to_string());

        let tool = CommandLineTool {
            class: take_string(&mut map, &ctx, "class")?,
            label: take_string(&mut map, &ctx, "label")?,
            doc: take_strings(&mut map, &ctx, "doc")?,
            requirements: Requirements::from_value(
                &format!("{}.requirements", ctx),
                take(&mut map, "requirements"),
            )?,
            hints: decode_hints(&format!("{}.hints", ctx), take(&mut map, "hints"))?,
            cwl_version: take_string(&mut map, &ctx, "cwlVersion")?,
            intent: take_strings(&mut map, &ctx, "intent")?,
            base_command: take_strings(&mut map, &ctx, "baseCommand")?,
            arguments: take_strings(&mut map, &ctx, "arguments")?,
            inputs: decode_parameters(&format!("{}.inputs", ctx), take(&mut map, "inputs"))?,
            outputs: decode_parameters(&format!("{}.outputs", ctx), take(&mut map, "outputs"))?,
            stdin: take_expression(&mut map, &ctx, "stdin")?,
            stdout: take_expression(&mut map, &ctx, "stdout")?,
            stderr: take_expression(&mut map, &ctx, "stderr")?,
            id,
        };

        debug!(
            "Decoded tool '{}' with {} inputs and {} outputs",
            tool.display_id(),
            tool.inputs.len(),
            tool.outputs.len()
        );
        Ok(tool)
    }

    /// Decodes a `Workflow` mapping, including every step's `run` target.
    pub fn decode_workflow(&self, value: Value) -> TranspileResult<Workflow> {
        let mut map = into_mapping("Workflow", value)?;

        let id = take_string(&mut map, "Workflow", "id")?;
        let ctx = id.clone().unwrap_or_else(|| "Workflow".to_string());

        let inputs = decode_parameters::<WorkflowInputParameter>(
            &format!("{}.inputs", ctx),
            take(&mut map, "inputs"),
        )?
        .into_iter()
        .map(|p| (p.id.clone().unwrap_or_default(), p))
        .collect();
        let outputs = decode_parameters::<WorkflowOutputParameter>(
            &format!("{}.outputs", ctx),
            take(&mut map, "outputs"),
        )?
        .into_iter()
        .map(|p| (p.id.clone().unwrap_or_default(), p))
        .collect();

        let workflow = Workflow {
            class: take_string(&mut map, &ctx, "class")?,
            label: take_string(&mut map, &ctx, "label")?,
            doc: take_strings(&mut map, &ctx, "doc")?,
            requirements: Requirements::from_value(
                &format!("{}.requirements", ctx),
                take(&mut map, "requirements"),
            )?,
            hints: decode_hints(&format!("{}.hints", ctx), take(&mut map, "hints"))?,
            cwl_version: take_string(&mut map, &ctx, "cwlVersion")?,
            intent: take_strings(&mut map, &ctx, "intent")?,
            inputs,
            outputs,
            steps: self.decode_steps(&ctx, take(&mut map, "steps"))?,
            id,
        };

        debug!(
            "Decoded workflow '{}' with {} steps",
            workflow.display_id(),
            workflow.steps.len()
        );
        Ok(workflow)
    }

    /// Steps as a list of objects with `id`, or a mapping keyed by step id.
    fn decode_steps(&self, ctx: &str, value: Value) -> TranspileResult<Vec<WorkflowStep>> {
        let field = format!("{}.steps", ctx);
        let bodies: Vec<(Option<String>, Value)> = match value {
            Value::Null => Vec::new(),
            Value::Sequence(items) => items.into_iter().map(|item| (None, item)).collect(),
            Value::Mapping(map) => map
                .into_iter()
                .map(|(key, body)| {
                    key.as_str()
                        .map(|k| (Some(k.to_string()), body))
                        .ok_or_else(|| DecodeError::shape(field.as_str(), "step ids as keys"))
                })
                .collect::<Result<_, _>>()?,
            _ => {
                return Err(
                    DecodeError::shape(field, "a list of steps or a mapping keyed by step id").into(),
                )
            }
        };

        let mut steps: Vec<WorkflowStep> = Vec::with_capacity(bodies.len());
        for (key, body) in bodies {
            let step = self.decode_step(&field, key, body)?;
            if steps.iter().any(|s| s.id == step.id) {
                return Err(DecodeError::DuplicateId { field, id: step.id }.into());
            }
            steps.push(step);
        }
        Ok(steps)
    }

    fn decode_step(
        &self,
        field: &str,
        key: Option<String>,
        value: Value,
    ) -> TranspileResult<WorkflowStep> {
        let mut map = into_mapping(field, value)?;

        // An explicit `id` wins over the mapping key.
        let id = match take_string(&mut map, field, "id")?.or(key) {
            Some(id) => id,
            None => {
                return Err(DecodeError::MissingField {
                    field: field.to_string(),
                    name: "id",
                }
                .into())
            }
        };
        let ctx = format!("{}.{}", field, id);

        let run = match map.remove("run") {
            Some(run) => self.decode_run(&id, run)?,
            None => {
                return Err(DecodeError::MissingField {
                    field: ctx,
                    name: "run",
                }
                .into())
            }
        };

        let scatter_method = match take(&mut map, "scatterMethod") {
            Value::Null => None,
            other => Some(
                serde_yaml::from_value::<ScatterMethod>(other)
                    .map_err(|e| DecodeError::yaml(format!("{}.scatterMethod", ctx), e))?,
            ),
        };

        Ok(WorkflowStep {
            inputs: decode_step_inputs(&ctx, take(&mut map, "in"))?,
            out: decode_step_outputs(&ctx, take(&mut map, "out"))?,
            run: Box::new(run),
            requirements: Requirements::from_value(
                &format!("{}.requirements", ctx),
                take(&mut map, "requirements"),
            )?,
            hints: decode_hints(&format!("{}.hints", ctx), take(&mut map, "hints"))?,
            label: take_string(&mut map, &ctx, "label")?,
            doc: take_strings(&mut map, &ctx, "doc")?,
            scatter: decode_scatter(&ctx, take(&mut map, "scatter"))?,
            scatter_method,
            id,
        })
    }

    /// Resolves a step's `run`: a `.cwl` reference or an inline tool.
    fn decode_run(&self, step: &str, value: Value) -> TranspileResult<CommandLineTool> {
        match value {
            Value::String(reference) if reference.ends_with(".cwl") => {
                let path = self.config.locate(&reference)?;
                info!("Loading run target for step '{}' from {}", step, path.display());
                self.load_tool(&path)
            }
            Value::String(reference) => Err(DecodeError::Run {
                step: step.to_string(),
                reason: format!("expected .cwl file reference, got {}", reference),
            }
            .into()),
            Value::Mapping(map) => {
                if map.get("class").and_then(Value::as_str) == Some("Workflow") {
                    return Err(DecodeError::Run {
                        step: step.to_string(),
                        reason: "nested Workflow run targets are not supported".to_string(),
                    }
                    .into());
                }
                self.decode_tool(Value::Mapping(map))
            }
            _ => Err(DecodeError::Run {
                step: step.to_string(),
                reason: "run must be a .cwl file reference or an inline CommandLineTool"
                    .to_string(),
            }
            .into()),
        }
    }

    fn load_tool(&self, path: &Path) -> TranspileResult<CommandLineTool> {
        let content = fs::read_to_string(path).map_err(|source| ResolutionError::RunUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let value: Value = serde_yaml::from_str(&content)
            .map_err(|e| DecodeError::yaml(path.display().to_string(), e))?;

        let class = value
            .get("class")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        if class != "CommandLineTool" {
            return Err(ResolutionError::RunNotCommandLineTool {
                path: path.display().to_string(),
                class,
            }
            .into());
        }

        self.decode_tool(value)
    }
}

fn into_mapping(field: &str, value: Value) -> Result<Mapping, DecodeError> {
    match value {
        Value::Mapping(map) => Ok(map),
        _ => Err(DecodeError::shape(field, "a mapping")),
    }
}

/// Removes a key, yielding `Null` when absent.
fn take(map: &mut Mapping, key: &str) -> Value {
    map.remove(key).unwrap_or(Value::Null)
}

fn take_string(map: &mut Mapping, ctx: &str, key: &str) -> Result<Option<String>, DecodeError> {
    match take(map, key) {
        Value::Null => Ok(None),
        value => scalar_to_string(&value)
            .map(Some)
            .ok_or_else(|| DecodeError::shape(format!("{}.{}", ctx, key), "a string")),
    }
}

fn take_strings(map: &mut Mapping, ctx: &str, key: &str) -> Result<Vec<String>, DecodeError> {
    lift_strings(take(map, key))
        .map_err(|expected| DecodeError::shape(format!("{}.{}", ctx, key), expected))
}

fn take_expression(
    map: &mut Mapping,
    ctx: &str,
    key: &str,
) -> Result<Option<CwlExpression>, DecodeError> {
    match take(map, key) {
        Value::Null => Ok(None),
        value => CwlExpression::from_value(value)
            .map(Some)
            .map_err(|expected| DecodeError::shape(format!("{}.{}", ctx, key), expected)),
    }
}

/// Decodes a parameter collection written as a list or as a mapping keyed by id.
///
/// In the mapping form a scalar body is shorthand for `{type: <scalar>}`.
/// The result is always in document order with every id populated.
pub fn decode_parameters<T>(field: &str, value: Value) -> Result<Vec<T>, DecodeError>
where
    T: DeserializeOwned + Identified,
{
    let mut params: Vec<T> = match value {
        Value::Null => Vec::new(),
        Value::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                let ctx = format!("{}[{}]", field, idx);
                if !item.is_mapping() {
                    return Err(DecodeError::shape(ctx, "a parameter object"));
                }
                let param: T =
                    serde_yaml::from_value(item).map_err(|e| DecodeError::yaml(ctx.as_str(), e))?;
                if param.id().map_or(true, str::is_empty) {
                    return Err(DecodeError::MissingField { field: ctx, name: "id" });
                }
                Ok(param)
            })
            .collect::<Result<_, _>>()?,
        Value::Mapping(map) => map
            .into_iter()
            .map(|(key, body)| {
                let id = key
                    .as_str()
                    .ok_or_else(|| DecodeError::shape(field, "parameter ids as keys"))?
                    .to_string();
                let ctx = format!("{}.{}", field, id);
                let body = match body {
                    Value::Mapping(body) => Value::Mapping(body),
                    Value::String(ty) => {
                        let mut body = Mapping::new();
                        body.insert(Value::from("type"), Value::String(ty));
                        Value::Mapping(body)
                    }
                    _ => return Err(DecodeError::shape(ctx, "a parameter object or a type name")),
                };
                let mut param: T =
                    serde_yaml::from_value(body).map_err(|e| DecodeError::yaml(ctx.as_str(), e))?;
                param.set_id(id);
                Ok(param)
            })
            .collect::<Result<_, _>>()?,
        _ => {
            return Err(DecodeError::shape(
                field,
                "a list of parameters or a mapping keyed by id",
            ))
        }
    };

    // A leading '#' is the CWL fragment marker, not part of the id.
    for param in params.iter_mut() {
        let stripped = param
            .id()
            .and_then(|id| id.strip_prefix('#'))
            .map(str::to_string);
        if let Some(stripped) = stripped {
            param.set_id(stripped);
        }
    }

    for (idx, param) in params.iter().enumerate() {
        let id = param.id().unwrap_or_default();
        if params[..idx].iter().any(|p| p.id() == Some(id)) {
            return Err(DecodeError::DuplicateId {
                field: field.to_string(),
                id: id.to_string(),
            });
        }
    }

    Ok(params)
}

/// A source without `/` refers to a workflow input.
pub fn normalize_source(source: &str) -> String {
    if source.contains('/') {
        source.to_string()
    } else {
        format!("global/{}", source)
    }
}

fn step_input_from_source(
    id: String,
    source: &Value,
    ctx: &str,
) -> Result<WorkflowStepInput, DecodeError> {
    let source = scalar_to_string(source)
        .ok_or_else(|| DecodeError::shape(ctx, "a source string"))?;
    Ok(WorkflowStepInput {
        id,
        source: Some(normalize_source(&source)),
        ..WorkflowStepInput::default()
    })
}

fn step_input_from_object(
    default_id: String,
    body: Mapping,
    ctx: &str,
) -> Result<WorkflowStepInput, DecodeError> {
    let mut input: WorkflowStepInput = serde_yaml::from_value(Value::Mapping(body))
        .map_err(|e| DecodeError::yaml(ctx, e))?;
    if input.id.is_empty() {
        input.id = default_id;
    }
    input.source = input.source.as_deref().map(normalize_source);
    Ok(input)
}

/// True when a mapping under `in` is one step-input object rather than a keyed map.
fn is_single_step_input(map: &Mapping) -> bool {
    let has_scalar_id = map
        .get("id")
        .map_or(false, |id| id.is_string() || id.is_number());
    has_scalar_id
        && map
            .keys()
            .all(|k| k.as_str().map_or(false, |k| STEP_INPUT_FIELDS.contains(&k)))
}

/// Decodes a step's `in` collection by node shape.
///
/// * scalar: one source, named `step-0`
/// * sequence: scalars or objects, unnamed entries become `step-<index>`
/// * mapping: one object when it carries only step-input fields and an `id`,
///   otherwise a map from input id to a source or an object
pub fn decode_step_inputs(
    ctx: &str,
    value: Value,
) -> Result<Vec<WorkflowStepInput>, DecodeError> {
    let field = format!("{}.in", ctx);
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                let default_id = format!("step-{}", idx);
                let item_ctx = format!("{}[{}]", field, idx);
                match item {
                    Value::Mapping(body) => step_input_from_object(default_id, body, &item_ctx),
                    other => step_input_from_source(default_id, &other, &item_ctx),
                }
            })
            .collect(),
        Value::Mapping(map) if is_single_step_input(&map) => {
            Ok(vec![step_input_from_object("step-0".to_string(), map, &field)?])
        }
        Value::Mapping(map) => {
            let mut inputs = Vec::with_capacity(map.len());
            for (key, body) in map {
                let id = scalar_to_string(&key)
                    .ok_or_else(|| DecodeError::shape(field.as_str(), "input ids as keys"))?;
                let entry_ctx = format!("{}.{}", field, id);
                let input = match body {
                    Value::Null => WorkflowStepInput {
                        id,
                        ..WorkflowStepInput::default()
                    },
                    Value::Mapping(body) => step_input_from_object(id, body, &entry_ctx)?,
                    Value::Sequence(_) => {
                        return Err(DecodeError::shape(entry_ctx, "a single source"));
                    }
                    other => step_input_from_source(id, &other, &entry_ctx)?,
                };
                inputs.push(input);
            }
            Ok(inputs)
        }
        other => Ok(vec![step_input_from_source("step-0".to_string(), &other, &field)?]),
    }
}

/// Decodes `out`: ids as strings or `{id}` objects.
pub fn decode_step_outputs(ctx: &str, value: Value) -> Result<Vec<String>, DecodeError> {
    let field = format!("{}.out", ctx);
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Sequence(items) => items,
        other => vec![other],
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Mapping(map) => map
                .get("id")
                .and_then(scalar_to_string)
                .ok_or_else(|| DecodeError::MissingField {
                    field: field.clone(),
                    name: "id",
                }),
            other => {
                scalar_to_string(&other).ok_or_else(|| DecodeError::shape(field.as_str(), "output ids"))
            }
        })
        .collect()
}

/// Decodes `scatter`: a single key or a list of keys.
pub fn decode_scatter(ctx: &str, value: Value) -> Result<Option<Scatter>, DecodeError> {
    let field = format!("{}.scatter", ctx);
    match value {
        Value::Null => Ok(None),
        Value::String(key) => Ok(Some(Scatter::Single(key))),
        Value::Sequence(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .map(|keys| Some(Scatter::Many(keys)))
            .ok_or_else(|| DecodeError::shape(field, "string | []string")),
        _ => Err(DecodeError::shape(field, "string | []string")),
    }
}

/// Hints are kept untyped: a list or a mapping.
pub fn decode_hints(field: &str, value: Value) -> Result<Option<Hints>, DecodeError> {
    match value {
        Value::Null => Ok(None),
        Value::Sequence(items) => Ok(Some(Hints::List(items))),
        Value::Mapping(map) => Ok(Some(Hints::Map(map))),
        _ => Err(DecodeError::shape(field, "a list or a mapping")),
    }
}

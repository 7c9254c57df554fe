//! CommandLineTool Emitter
//!
//! Lowers one type-checked `CommandLineTool` plus its job inputs and file
//! locations into an Argo `Workflow` with a single container template.
//!
//! # Lowering Overview
//!
//! - `DockerRequirement.dockerPull` becomes the container image
//! - `baseCommand` followed by `arguments` becomes the container command
//! - bound inputs, ordered by `inputBinding.position`, become container args
//! - scalar inputs become template input parameters and workflow arguments
//! - File outputs request a shared volume sized by `outdirMin`
//! - File locations, when given, become input and output artifacts

use log::{debug, info};
use serde_yaml::Value;

use super::container::{attach_volume, container_from_docker, quantity, volume_claim};
use super::model::{Artifact, Container, ObjectMeta, Parameter, Template, Workflow};
use super::references::input_parameter;
use crate::config::TranspileConfig;
use crate::cwl::job::{FileLocationData, FileLocations, JobInputs, JobValue};
use crate::cwl::model::{
    primary_kind, CommandLineBinding, CommandLineInputParameter, CommandLineOutputParameter,
    CommandLineTool, Glob, TypeKind,
};
use crate::error::{EmissionError, ResolutionError, TranspileResult, ValidationError};

/// An input parameter paired with its concrete value, if any.
#[derive(Debug)]
struct FlatInput<'t> {
    id: &'t str,
    kind: TypeKind,
    binding: Option<&'t CommandLineBinding>,
    value: Option<JobValue>,
}

impl FlatInput<'_> {
    /// Scalars travel as parameters; everything else only as args or artifacts.
    fn is_scalar(&self) -> bool {
        !matches!(
            self.kind,
            TypeKind::File
                | TypeKind::Array
                | TypeKind::Enum
                | TypeKind::Record
                | TypeKind::RecordField
        )
    }

    fn file_path(&self) -> Result<&str, ResolutionError> {
        match &self.value {
            Some(JobValue::File(file)) => file
                .path
                .as_deref()
                .ok_or_else(|| ResolutionError::MissingValue(self.id.to_string())),
            _ => Err(ResolutionError::MissingValue(self.id.to_string())),
        }
    }
}

fn flatten_input<'t>(
    param: &'t CommandLineInputParameter,
    job: &JobInputs,
) -> TranspileResult<FlatInput<'t>> {
    let id = param.name();

    // Without a job order, only string defaults carry a value.
    if job.is_empty() {
        let value = match &param.default {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(JobValue::String(s.clone())),
            Some(_) => return Err(EmissionError::UnsupportedDefault(id.to_string()).into()),
        };
        return Ok(FlatInput {
            id,
            kind: primary_kind(&param.types),
            binding: param.input_binding.as_ref(),
            value,
        });
    }

    let value = job
        .get(id)
        .ok_or_else(|| ResolutionError::MissingJobInput(id.to_string()))?;

    if !param.types.iter().any(|ty| value.matches(ty)) {
        return Err(ResolutionError::TypeMismatch {
            id: id.to_string(),
            found: value.kind().to_string(),
        }
        .into());
    }

    Ok(FlatInput {
        id,
        kind: value.kind(),
        binding: param.input_binding.as_ref(),
        value: Some(value.clone()),
    })
}

fn check_output(output: &CommandLineOutputParameter) -> Result<(), EmissionError> {
    if output.types.len() != 1 {
        return Err(EmissionError::AmbiguousOutputType {
            id: output.name().to_string(),
            count: output.types.len(),
        });
    }
    let kind = output.types[0].kind();
    if kind != TypeKind::File {
        return Err(EmissionError::UnsupportedOutputType {
            id: output.name().to_string(),
            kind: kind.to_string(),
        });
    }
    Ok(())
}

/// The single-string glob of a File output.
pub(crate) fn output_glob(output: &CommandLineOutputParameter) -> Result<&str, EmissionError> {
    let glob = output
        .output_binding
        .as_ref()
        .and_then(|b| b.glob.as_ref())
        .ok_or_else(|| EmissionError::MissingGlob(output.name().to_string()))?;

    match glob {
        Glob::Single(path) => Ok(path),
        Glob::List(_) | Glob::Expression(_) => {
            Err(EmissionError::UnsupportedGlob(output.name().to_string()))
        }
    }
}

/// `baseCommand` then `arguments`; with no base command the arguments
/// alone form the command.
fn container_command(tool: &CommandLineTool) -> Vec<String> {
    tool.base_command
        .iter()
        .chain(tool.arguments.iter())
        .cloned()
        .collect()
}

/// Renders bound inputs, stably sorted by position (absent counts as 0).
fn container_args(inputs: &[FlatInput<'_>]) -> TranspileResult<Vec<String>> {
    let mut bound: Vec<(&FlatInput<'_>, &CommandLineBinding)> = inputs
        .iter()
        .filter_map(|input| input.binding.map(|binding| (input, binding)))
        .collect();
    bound.sort_by_key(|(_, binding)| binding.position.unwrap_or(0));

    let mut args = Vec::new();
    for (input, binding) in bound {
        let mut fused = String::new();
        if let Some(prefix) = &binding.prefix {
            if binding.is_separate() {
                args.push(prefix.clone());
            } else {
                fused = prefix.clone();
            }
        }

        match input.kind {
            TypeKind::File => {
                args.push(format!("{}{}", fused, input.file_path()?));
            }
            TypeKind::Array => {
                let items = match input.value.as_ref().and_then(JobValue::array_items) {
                    Some(Ok(items)) => items,
                    Some(Err(reason)) => {
                        return Err(ResolutionError::TypeMismatch {
                            id: input.id.to_string(),
                            found: reason.to_string(),
                        }
                        .into())
                    }
                    None => return Err(ResolutionError::MissingValue(input.id.to_string()).into()),
                };
                match &binding.item_separator {
                    Some(separator) => args.push(format!("{}{}", fused, items.join(separator))),
                    None => {
                        for (idx, item) in items.into_iter().enumerate() {
                            if idx == 0 {
                                args.push(format!("{}{}", fused, item));
                            } else {
                                args.push(item);
                            }
                        }
                    }
                }
            }
            _ => args.push(format!("{}{}", fused, input_parameter(input.id))),
        }
    }
    Ok(args)
}

/// Workflow arguments for the scalar inputs.
fn workflow_arguments(scalars: &[&FlatInput<'_>]) -> Result<Vec<Parameter>, EmissionError> {
    scalars
        .iter()
        .map(|input| match input.kind {
            TypeKind::String
            | TypeKind::Int
            | TypeKind::Long
            | TypeKind::Float
            | TypeKind::Double
            | TypeKind::Bool => Ok(Parameter {
                name: input.id.to_string(),
                value: input.value.as_ref().and_then(JobValue::as_parameter),
                value_from: None,
            }),
            other => Err(EmissionError::UnsupportedInputType {
                id: input.id.to_string(),
                kind: other.to_string(),
            }),
        })
        .collect()
}

fn artifact(name: String, path: String, location: &FileLocationData) -> Artifact {
    Artifact {
        name,
        path,
        http: location.http.clone(),
        s3: location.s3.clone(),
        hdfs: location.hdfs.clone(),
    }
}

/// Input artifacts for File inputs, in declaration order.
fn input_artifacts(
    inputs: &[FlatInput<'_>],
    locations: &FileLocations,
) -> TranspileResult<Vec<Artifact>> {
    if locations.inputs.is_empty() {
        return Ok(Vec::new());
    }

    let mut artifacts = Vec::new();
    for input in inputs.iter().filter(|i| i.kind == TypeKind::File) {
        let location = locations
            .inputs
            .get(input.id)
            .ok_or_else(|| ResolutionError::MissingFileLocation(input.id.to_string()))?;
        let name = if location.name.is_empty() {
            input.id.to_string()
        } else {
            location.name.clone()
        };
        artifacts.push(artifact(name, input.file_path()?.to_string(), location));
    }
    Ok(artifacts)
}

fn output_artifacts(
    outputs: &[CommandLineOutputParameter],
    locations: &FileLocations,
) -> TranspileResult<Vec<Artifact>> {
    if locations.outputs.is_empty() {
        return Ok(Vec::new());
    }

    let mut artifacts = Vec::new();
    for output in outputs {
        let path = output_glob(output)?;
        let location = locations
            .outputs
            .get(output.name())
            .ok_or_else(|| ResolutionError::MissingFileLocation(output.name().to_string()))?;
        artifacts.push(artifact(output.name().to_string(), path.to_string(), location));
    }
    Ok(artifacts)
}

/// Emits the Argo resource for a standalone `CommandLineTool`.
///
/// # Arguments
///
/// * `tool` - A tool that passed type checking
/// * `job` - Job inputs; when empty, string defaults are used instead
/// * `locations` - Remote locations for File inputs and outputs
/// * `config` - Volume naming
pub fn emit_tool(
    tool: &CommandLineTool,
    job: &JobInputs,
    locations: &FileLocations,
    config: &TranspileConfig,
) -> TranspileResult<Workflow> {
    let id = tool.id.as_deref().ok_or(ValidationError::MissingId)?;
    info!("Emitting CommandLineTool '{}'", id);

    let mut container: Container = container_from_docker(id, tool.requirements.docker())?;

    let inputs = tool
        .inputs
        .iter()
        .map(|param| flatten_input(param, job))
        .collect::<TranspileResult<Vec<_>>>()?;
    let scalars: Vec<&FlatInput<'_>> = inputs.iter().filter(|i| i.is_scalar()).collect();

    for output in &tool.outputs {
        check_output(output)?;
    }

    let mut wf = Workflow::new(ObjectMeta::named(id));

    if !tool.outputs.is_empty() {
        let resource = tool
            .requirements
            .resource()
            .ok_or_else(|| EmissionError::MissingResourceRequirement(id.to_string()))?;
        let outdir_min = resource
            .outdir_min
            .as_ref()
            .ok_or(EmissionError::MissingOutdirMin)?;

        wf.spec.volume_claim_templates =
            vec![volume_claim(&config.volume_claim_name, quantity(outdir_min)?)];
        attach_volume(&mut container, &config.volume_claim_name, &config.default_mount_path);
    }

    container.command = container_command(tool);
    container.args = container_args(&inputs)?;

    wf.spec.arguments.parameters = workflow_arguments(&scalars)?;

    let mut template = Template {
        name: Some(id.to_string()),
        ..Template::default()
    };
    template.inputs.parameters = scalars.iter().map(|i| Parameter::named(i.id)).collect();
    template.inputs.artifacts = input_artifacts(&inputs, locations)?;
    template.outputs.artifacts = output_artifacts(&tool.outputs, locations)?;
    template.container = Some(container);

    debug!(
        "Lowered template '{}' with {} parameters and {} artifacts",
        id,
        template.inputs.parameters.len(),
        template.inputs.artifacts.len() + template.outputs.artifacts.len()
    );

    wf.spec.entrypoint = id.to_string();
    wf.spec.templates = vec![template];
    Ok(wf)
}

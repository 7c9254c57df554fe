//! Workflow Emitter
//!
//! Lowers a type-checked CWL `Workflow` into an Argo steps template named
//! `global-template`. Each CWL step becomes one sequential stage holding a
//! single inline container template.
//!
//! Step inputs reference workflow arguments or earlier step outputs through
//! Argo templating; step outputs are read from the run tool's output glob.

use log::{debug, info, warn};
use serde_yaml::Value;

use super::container::container_from_docker;
use super::model::{
    ObjectMeta, ParallelSteps, Parameter, Template, ValueFrom, Workflow, WorkflowStep,
};
use super::references::{normalize_step_name, resolve_source, rewrite_arguments};
use super::tool::output_glob;
use crate::cwl::job::{JobInputs, JobValue};
use crate::cwl::model::{primary_kind, TypeKind};
use crate::cwl::workflow::{
    Workflow as CwlWorkflow, WorkflowInputParameter, WorkflowStep as CwlStep,
};
use crate::error::{EmissionError, ResolutionError, TranspileResult};

/// Name of the steps template every workflow is lowered into.
pub const GLOBAL_TEMPLATE: &str = "global-template";

/// Prefix for Argo-generated names of workflows without an id.
pub const GENERATED_NAME_PREFIX: &str = "generated-workflow-";

fn workflow_metadata(workflow: &CwlWorkflow) -> ObjectMeta {
    match &workflow.id {
        Some(id) => ObjectMeta::named(id.as_str()),
        None => ObjectMeta {
            name: None,
            generate_name: Some(GENERATED_NAME_PREFIX.to_string()),
        },
    }
}

/// Workflow argument for one declared input.
///
/// A concrete job value wins over the declared default.
fn workflow_argument(
    key: &str,
    param: &WorkflowInputParameter,
    job: &JobInputs,
) -> Result<Option<Parameter>, EmissionError> {
    match primary_kind(&param.types) {
        TypeKind::String | TypeKind::File => {}
        TypeKind::Null => return Ok(None),
        other => {
            return Err(EmissionError::UnsupportedInputType {
                id: key.to_string(),
                kind: other.to_string(),
            })
        }
    }

    let from_job = job.get(key).and_then(|value| match value {
        JobValue::File(file) => file.path.clone(),
        other => other.as_parameter(),
    });
    if from_job.is_some() {
        return Ok(Some(Parameter {
            name: key.to_string(),
            value: from_job,
            value_from: None,
        }));
    }

    let value = match &param.default {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(EmissionError::UnsupportedDefault(key.to_string())),
    };

    Ok(Some(Parameter {
        name: key.to_string(),
        value,
        value_from: None,
    }))
}

/// Output parameters of a step, read from the run tool's output globs.
fn step_outputs(step: &CwlStep) -> TranspileResult<Vec<Parameter>> {
    let mut outputs = Vec::with_capacity(step.out.len());
    for id in &step.out {
        let output = step
            .run
            .output(id)
            .ok_or_else(|| ResolutionError::UnknownStepOutput {
                step: step.id.clone(),
                output: id.clone(),
            })?;

        outputs.push(Parameter {
            name: id.clone(),
            value: None,
            value_from: Some(ValueFrom {
                path: output_glob(output)?.to_string(),
            }),
        });
    }
    Ok(outputs)
}

fn step_inputs(
    workflow: &CwlWorkflow,
    position: usize,
    step: &CwlStep,
) -> TranspileResult<Vec<Parameter>> {
    let mut parameters = Vec::with_capacity(step.inputs.len());
    for input in &step.inputs {
        let value = match (&input.source, &input.default) {
            (Some(source), _) => resolve_source(workflow, position, &step.id, source)?,
            (None, Some(Value::String(default))) => default.clone(),
            _ => {
                return Err(ResolutionError::MissingSource {
                    step: step.id.clone(),
                    input: input.id.clone(),
                }
                .into())
            }
        };
        parameters.push(Parameter::with_value(input.id.as_str(), value));
    }
    Ok(parameters)
}

fn lower_step(
    workflow: &CwlWorkflow,
    position: usize,
    step: &CwlStep,
) -> TranspileResult<WorkflowStep> {
    if let Some(scatter) = &step.scatter {
        warn!(
            "Step '{}': scatter over {} is not lowered, the step runs once",
            step.id,
            scatter.keys().join(", ")
        );
    }

    let mut container = container_from_docker(&step.id, step.docker())?;
    container.command = step.run.base_command.clone();
    container.args = rewrite_arguments(&step.run.arguments)?;

    let mut template = Template::default();
    template.inputs.parameters = step_inputs(workflow, position, step)?;
    template.outputs.parameters = step_outputs(step)?;
    template.container = Some(container);

    let name = normalize_step_name(&step.id);
    debug!("Lowered step '{}' as '{}'", step.id, name);

    Ok(WorkflowStep {
        name,
        inline: Box::new(template),
    })
}

/// Emits the Argo resource for a CWL `Workflow`.
///
/// Steps run in declaration order, one per stage of `global-template`.
///
/// # Arguments
///
/// * `workflow` - A workflow that passed type checking
/// * `job` - Job inputs overriding the declared input defaults
pub fn emit_workflow(workflow: &CwlWorkflow, job: &JobInputs) -> TranspileResult<Workflow> {
    info!(
        "Emitting Workflow '{}' with {} steps",
        workflow.display_id(),
        workflow.steps.len()
    );

    let mut wf = Workflow::new(workflow_metadata(workflow));

    for (key, param) in &workflow.inputs {
        if let Some(parameter) = workflow_argument(key, param, job)? {
            wf.spec.arguments.parameters.push(parameter);
        }
    }

    let steps = workflow
        .steps
        .iter()
        .enumerate()
        .map(|(position, step)| {
            lower_step(workflow, position, step).map(|lowered| ParallelSteps(vec![lowered]))
        })
        .collect::<TranspileResult<Vec<_>>>()?;

    wf.spec.templates = vec![Template {
        name: Some(GLOBAL_TEMPLATE.to_string()),
        steps,
        ..Template::default()
    }];
    wf.spec.entrypoint = GLOBAL_TEMPLATE.to_string();
    Ok(wf)
}

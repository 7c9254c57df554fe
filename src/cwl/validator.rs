//! Type Checker
//!
//! Pure passes over the decoded AST that enforce the CWL subset the
//! emitters can honor. Each pass returns the first violated rule; nothing
//! is aggregated.
//!
//! The checks run in a fixed order:
//! 1. Parameter auxiliary fields (inputs, then outputs)
//! 2. Document class and id
//! 3. DockerRequirement presence and `dockerPull`
//! 4. Supported `cwlVersion`
//! 5. Command shape (`baseCommand` or `arguments`)

use log::{debug, warn};

use super::model::{
    all_directories, all_files, CommandLineInputParameter, CommandLineOutputParameter,
    CommandLineTool, CwlType,
};
use super::requirements::DockerRequirement;
use super::workflow::{Workflow, WorkflowInputParameter, WorkflowOutputParameter, WorkflowStep};
use crate::config::TranspileConfig;
use crate::error::ValidationError;

const FILE_TYPES: &str = "File|[]File";
const DIRECTORY_TYPES: &str = "Directory|[]Directory";

/// The parameter fields whose legality depends on the declared type.
trait AuxiliaryFields {
    fn param_id(&self) -> &str;
    fn types(&self) -> &[CwlType];
    fn has_secondary_files(&self) -> bool;
    fn has_streamable(&self) -> bool;
    fn has_format(&self) -> bool;

    fn has_load_contents(&self) -> bool {
        false
    }

    fn has_load_listing(&self) -> bool {
        false
    }
}

macro_rules! common_auxiliary_fields {
    () => {
        fn param_id(&self) -> &str {
            self.id.as_deref().unwrap_or_default()
        }

        fn types(&self) -> &[CwlType] {
            &self.types
        }

        fn has_secondary_files(&self) -> bool {
            self.secondary_files.is_some()
        }

        fn has_streamable(&self) -> bool {
            self.streamable.is_some()
        }

        fn has_format(&self) -> bool {
            self.format.is_some()
        }
    };
}

impl AuxiliaryFields for CommandLineInputParameter {
    common_auxiliary_fields!();

    fn has_load_contents(&self) -> bool {
        self.load_contents.is_some()
    }

    fn has_load_listing(&self) -> bool {
        self.load_listing.is_some()
    }
}

impl AuxiliaryFields for WorkflowInputParameter {
    common_auxiliary_fields!();

    fn has_load_contents(&self) -> bool {
        self.load_contents.is_some()
    }

    fn has_load_listing(&self) -> bool {
        self.load_listing.is_some()
    }
}

impl AuxiliaryFields for CommandLineOutputParameter {
    common_auxiliary_fields!();
}

impl AuxiliaryFields for WorkflowOutputParameter {
    common_auxiliary_fields!();
}

fn illegal(param: &dyn AuxiliaryFields, field: &'static str, expected: &'static str) -> ValidationError {
    ValidationError::IllegalAuxiliaryField {
        param: param.param_id().to_string(),
        field,
        expected,
    }
}

/// Checks the type-gated fields of each parameter.
///
/// `loadContents` is rejected whenever it is set.
fn check_parameters<'p, P>(params: impl IntoIterator<Item = &'p P>) -> Result<(), ValidationError>
where
    P: AuxiliaryFields + 'p,
{
    for param in params {
        let files = all_files(param.types());
        let directories = all_directories(param.types());

        if param.has_secondary_files() && !files {
            return Err(illegal(param, "secondaryFiles", FILE_TYPES));
        }
        if param.has_streamable() && !files {
            return Err(illegal(param, "streamable", FILE_TYPES));
        }
        if param.has_format() && !files {
            return Err(illegal(param, "format", FILE_TYPES));
        }
        if param.has_load_contents() {
            return Err(illegal(param, "loadContents", FILE_TYPES));
        }
        if param.has_load_listing() && !directories {
            return Err(illegal(param, "loadListing", DIRECTORY_TYPES));
        }
    }
    Ok(())
}

fn check_docker(owner: &str, docker: Option<&DockerRequirement>) -> Result<(), ValidationError> {
    match docker {
        None => Err(ValidationError::MissingDockerRequirement(owner.to_string())),
        Some(d) if d.docker_pull.is_none() => {
            Err(ValidationError::MissingDockerPull(owner.to_string()))
        }
        Some(_) => Ok(()),
    }
}

fn check_version(
    id: &str,
    version: Option<&str>,
    config: &TranspileConfig,
) -> Result<(), ValidationError> {
    match version {
        Some(found) if found != config.cwl_version => Err(ValidationError::UnsupportedVersion {
            id: id.to_string(),
            found: found.to_string(),
            expected: config.cwl_version.clone(),
        }),
        _ => Ok(()),
    }
}

fn check_class(owner: &str, tool: &CommandLineTool) -> Result<(), ValidationError> {
    let class = tool.class.as_deref().unwrap_or_default();
    if class != "CommandLineTool" {
        return Err(ValidationError::WrongClass {
            id: owner.to_string(),
            expected: "CommandLineTool",
            found: class.to_string(),
        });
    }
    Ok(())
}

fn check_command(owner: &str, tool: &CommandLineTool) -> Result<(), ValidationError> {
    if tool.base_command.is_empty() && tool.arguments.is_empty() {
        return Err(ValidationError::EmptyCommand(owner.to_string()));
    }
    Ok(())
}

/// Type-checks a standalone `CommandLineTool`.
///
/// # Arguments
///
/// * `tool` - The decoded tool
/// * `config` - Supplies the accepted `cwlVersion`
pub fn type_check_tool(
    tool: &CommandLineTool,
    config: &TranspileConfig,
) -> Result<(), ValidationError> {
    check_parameters(&tool.inputs)?;
    check_parameters(&tool.outputs)?;
    check_class(tool.display_id(), tool)?;

    let id = match tool.id.as_deref() {
        Some(id) if !id.is_empty() => id,
        _ => return Err(ValidationError::MissingId),
    };

    check_docker(id, tool.requirements.docker())?;
    check_version(id, tool.cwl_version.as_deref(), config)?;
    check_command(id, tool)?;

    debug!("Tool '{}' passed type checking", id);
    Ok(())
}

/// Run tools get the standalone tool checks, keyed by the step id; their
/// own `id` stays optional.
fn check_step(step: &WorkflowStep, config: &TranspileConfig) -> Result<(), ValidationError> {
    check_parameters(&step.run.inputs)?;
    check_parameters(&step.run.outputs)?;
    check_class(&step.id, &step.run)?;
    check_docker(&step.id, step.docker())?;
    check_version(&step.id, step.run.cwl_version.as_deref(), config)?;
    check_command(&step.id, &step.run)?;

    let scatter_keys = step.scatter.as_ref().map_or(0, |s| s.len());
    if scatter_keys > 1 && step.scatter_method.is_none() {
        return Err(ValidationError::MissingScatterMethod(step.id.clone()));
    }
    Ok(())
}

/// Type-checks a `Workflow` and every step's run tool.
///
/// Top-level requirements and hints are not inherited by steps; they only
/// produce a warning.
pub fn type_check_workflow(
    workflow: &Workflow,
    config: &TranspileConfig,
) -> Result<(), ValidationError> {
    check_parameters(workflow.inputs.values())?;
    check_parameters(workflow.outputs.values())?;
    check_version(workflow.display_id(), workflow.cwl_version.as_deref(), config)?;

    for step in &workflow.steps {
        check_step(step, config)?;
    }

    if !workflow.requirements.is_empty() {
        warn!("Workflow-level requirements are set but currently ignored; declare them per step");
    }
    if workflow.hints.as_ref().map_or(false, |h| !h.is_empty()) {
        warn!("Workflow-level hints are set but currently ignored");
    }

    debug!("Workflow '{}' passed type checking", workflow.display_id());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cwl::decode::Decoder;
    use crate::cwl::requirements::{Requirement, Requirements};
    use crate::cwl::workflow::{Scatter, ScatterMethod};

    fn config() -> TranspileConfig {
        TranspileConfig::with_search_paths(Vec::new())
    }

    fn tool(yaml: &str) -> CommandLineTool {
        let config = config();
        Decoder::new(&config)
            .decode_tool(serde_yaml::from_str(yaml).unwrap())
            .unwrap()
    }

    fn workflow(yaml: &str) -> Workflow {
        let config = config();
        Decoder::new(&config)
            .decode_workflow(serde_yaml::from_str(yaml).unwrap())
            .unwrap()
    }

    const ECHO_TOOL: &str = r#"
class: CommandLineTool
id: echo-tool
cwlVersion: v1.2
requirements:
  DockerRequirement:
    dockerPull: busybox
baseCommand: [echo]
inputs:
  message:
    type: string
    inputBinding: {position: 0}
outputs: []
"#;

    #[test]
    fn test_valid_tool_passes() {
        assert!(type_check_tool(&tool(ECHO_TOOL), &config()).is_ok());
    }

    #[test]
    fn test_missing_docker_requirement_names_tool() {
        let mut t = tool(ECHO_TOOL);
        t.requirements = Requirements::default();
        let err = type_check_tool(&t, &config()).unwrap_err();
        assert_eq!(err, ValidationError::MissingDockerRequirement("echo-tool".into()));
    }

    #[test]
    fn test_docker_without_pull_rejected() {
        let mut t = tool(ECHO_TOOL);
        t.requirements = Requirements::new(vec![Requirement::DockerRequirement(
            DockerRequirement {
                docker_file: Some(serde_yaml::Value::from("FROM scratch")),
                ..Default::default()
            },
        )]);
        let err = type_check_tool(&t, &config()).unwrap_err();
        assert_eq!(err, ValidationError::MissingDockerPull("echo-tool".into()));
    }

    #[test]
    fn test_docker_presence_decides_outcome() {
        // With a pull reference the tool passes; remove it and the tool fails.
        let with_docker = tool(ECHO_TOOL);
        assert!(type_check_tool(&with_docker, &config()).is_ok());

        let mut without = with_docker.clone();
        without.requirements = Requirements::new(vec![Requirement::ShellCommandRequirement]);
        assert!(matches!(
            type_check_tool(&without, &config()),
            Err(ValidationError::MissingDockerRequirement(_))
        ));
    }

    #[test]
    fn test_command_invariant() {
        let mut t = tool(ECHO_TOOL);
        t.base_command.clear();
        assert_eq!(
            type_check_tool(&t, &config()).unwrap_err(),
            ValidationError::EmptyCommand("echo-tool".into())
        );

        t.arguments.push("echo".into());
        assert!(type_check_tool(&t, &config()).is_ok());

        t.base_command.push("printf".into());
        t.arguments.clear();
        assert!(type_check_tool(&t, &config()).is_ok());
    }

    #[test]
    fn test_wrong_class() {
        let mut t = tool(ECHO_TOOL);
        t.class = Some("ExpressionTool".into());
        assert!(matches!(
            type_check_tool(&t, &config()),
            Err(ValidationError::WrongClass { expected: "CommandLineTool", .. })
        ));
    }

    #[test]
    fn test_missing_id() {
        let mut t = tool(ECHO_TOOL);
        t.id = None;
        assert_eq!(type_check_tool(&t, &config()), Err(ValidationError::MissingId));
    }

    #[test]
    fn test_version_mismatch() {
        let mut t = tool(ECHO_TOOL);
        t.cwl_version = Some("v1.0".into());
        assert!(matches!(
            type_check_tool(&t, &config()),
            Err(ValidationError::UnsupportedVersion { ref found, .. }) if found == "v1.0"
        ));

        t.cwl_version = None;
        assert!(type_check_tool(&t, &config()).is_ok());
    }

    #[test]
    fn test_configured_version_is_honored() {
        let mut t = tool(ECHO_TOOL);
        t.cwl_version = Some("v1.1".into());
        let mut cfg = config();
        cfg.cwl_version = "v1.1".into();
        assert!(type_check_tool(&t, &cfg).is_ok());
    }

    #[test]
    fn test_auxiliary_fields_require_file_types() {
        let t = tool(
            r#"
class: CommandLineTool
id: t
requirements: {DockerRequirement: {dockerPull: busybox}}
baseCommand: cat
inputs:
  name:
    type: string
    format: edam:format_1930
outputs: []
"#,
        );
        assert_eq!(
            type_check_tool(&t, &config()).unwrap_err(),
            ValidationError::IllegalAuxiliaryField {
                param: "name".into(),
                field: "format",
                expected: FILE_TYPES,
            }
        );

        let t = tool(
            r#"
class: CommandLineTool
id: t
requirements: {DockerRequirement: {dockerPull: busybox}}
baseCommand: cat
inputs:
  reads:
    type: File
    format: edam:format_1930
    secondaryFiles: [.bai]
    streamable: true
outputs: []
"#,
        );
        assert!(type_check_tool(&t, &config()).is_ok());
    }

    #[test]
    fn test_load_contents_always_rejected() {
        let t = tool(
            r#"
class: CommandLineTool
id: t
requirements: {DockerRequirement: {dockerPull: busybox}}
baseCommand: cat
inputs:
  reads: {type: File, loadContents: true}
outputs: []
"#,
        );
        assert!(matches!(
            type_check_tool(&t, &config()),
            Err(ValidationError::IllegalAuxiliaryField { field: "loadContents", .. })
        ));
    }

    #[test]
    fn test_load_listing_requires_directories() {
        let t = tool(
            r#"
class: CommandLineTool
id: t
requirements: {DockerRequirement: {dockerPull: busybox}}
baseCommand: ls
inputs:
  dir: {type: File, loadListing: deep_listing}
outputs: []
"#,
        );
        assert!(matches!(
            type_check_tool(&t, &config()),
            Err(ValidationError::IllegalAuxiliaryField { field: "loadListing", .. })
        ));
    }

    const TWO_STEP: &str = r#"
class: Workflow
id: pipeline
inputs:
  message: string
outputs: {}
steps:
  first:
    requirements:
      DockerRequirement: {dockerPull: busybox}
    run:
      class: CommandLineTool
      baseCommand: echo
      inputs: {}
      outputs: {}
    in: {text: message}
    out: []
  second:
    run:
      class: CommandLineTool
      requirements:
        - class: DockerRequirement
          dockerPull: alpine
      baseCommand: cat
      inputs: {}
      outputs: {}
    in: []
    out: []
"#;

    #[test]
    fn test_workflow_steps_need_docker() {
        let wf = workflow(TWO_STEP);
        assert!(type_check_workflow(&wf, &config()).is_ok());

        let mut broken = wf.clone();
        broken.steps[1].run.requirements = Requirements::default();
        assert_eq!(
            type_check_workflow(&broken, &config()).unwrap_err(),
            ValidationError::MissingDockerRequirement("second".into())
        );
    }

    #[test]
    fn test_top_level_requirements_only_warn() {
        let mut wf = workflow(TWO_STEP);
        wf.requirements = Requirements::new(vec![Requirement::DockerRequirement(
            DockerRequirement {
                docker_pull: Some("ubuntu".into()),
                ..Default::default()
            },
        )]);
        assert!(type_check_workflow(&wf, &config()).is_ok());

        // Not inherited by steps.
        wf.steps[0].requirements = Requirements::default();
        assert!(type_check_workflow(&wf, &config()).is_err());
    }

    #[test]
    fn test_scatter_invariant() {
        let mut wf = workflow(TWO_STEP);
        wf.steps[0].scatter = Some(Scatter::Many(vec!["a".into(), "b".into()]));
        assert_eq!(
            type_check_workflow(&wf, &config()).unwrap_err(),
            ValidationError::MissingScatterMethod("first".into())
        );

        wf.steps[0].scatter_method = Some(ScatterMethod::Dotproduct);
        assert!(type_check_workflow(&wf, &config()).is_ok());

        wf.steps[0].scatter = Some(Scatter::Single("a".into()));
        wf.steps[0].scatter_method = None;
        assert!(type_check_workflow(&wf, &config()).is_ok());
    }

    #[test]
    fn test_step_tool_needs_a_command() {
        let wf = workflow(
            r#"
class: Workflow
inputs: {}
outputs: {}
steps:
  s1:
    run:
      class: CommandLineTool
      requirements: {DockerRequirement: {dockerPull: busybox}}
      inputs: {}
      outputs: {}
    in: []
    out: []
"#,
        );
        assert_eq!(
            type_check_workflow(&wf, &config()).unwrap_err(),
            ValidationError::EmptyCommand("s1".into())
        );

        let mut fixed = wf.clone();
        fixed.steps[0].run.arguments.push("ls".into());
        assert!(type_check_workflow(&fixed, &config()).is_ok());
    }

    #[test]
    fn test_step_tool_version_checked() {
        let wf = workflow(
            r#"
class: Workflow
cwlVersion: v1.2
inputs: {}
outputs: {}
steps:
  s1:
    run:
      class: CommandLineTool
      cwlVersion: v0.9
      requirements: {DockerRequirement: {dockerPull: busybox}}
      baseCommand: ls
      inputs: {}
      outputs: {}
    in: []
    out: []
"#,
        );
        assert!(matches!(
            type_check_workflow(&wf, &config()),
            Err(ValidationError::UnsupportedVersion { ref id, ref found, .. })
                if id == "s1" && found == "v0.9"
        ));
    }

    #[test]
    fn test_step_tool_class_checked() {
        let mut wf = workflow(TWO_STEP);
        wf.steps[0].run.class = None;
        assert!(matches!(
            type_check_workflow(&wf, &config()),
            Err(ValidationError::WrongClass { ref id, .. }) if id == "first"
        ));

        // Run tools do not need an id of their own.
        let wf = workflow(TWO_STEP);
        assert!(wf.steps[0].run.id.is_none());
        assert!(type_check_workflow(&wf, &config()).is_ok());
    }

    #[test]
    fn test_workflow_parameters_checked() {
        let mut wf = workflow(TWO_STEP);
        if let Some(message) = wf.inputs.get_mut("message") {
            message.streamable = Some(true);
        }
        assert!(matches!(
            type_check_workflow(&wf, &config()),
            Err(ValidationError::IllegalAuxiliaryField { field: "streamable", .. })
        ));
    }
}

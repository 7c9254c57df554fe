//! Error Types
//!
//! One error enum per pipeline stage, plus [`TranspileError`] which wraps
//! them for callers that run the whole decode → check → emit pipeline.
//!
//! Every pipeline stage is fail-fast: the first error aborts the document.

use std::path::PathBuf;

use thiserror::Error;

/// The document shape does not match any accepted variant.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{field}: expected {expected}")]
    Shape {
        field: String,
        expected: &'static str,
    },

    #[error("{field}: missing required field '{name}'")]
    MissingField { field: String, name: &'static str },

    #[error("'{0}' is not a supported type")]
    UnknownType(String),

    #[error("{field}: {what} types are not supported yet")]
    UnsupportedType { field: String, what: &'static str },

    #[error("requirement class '{0}' is not implemented")]
    UnknownRequirement(String),

    #[error("requirement class '{0}' is declared more than once")]
    DuplicateRequirement(String),

    #[error("{field}: duplicate id '{id}'")]
    DuplicateId { field: String, id: String },

    #[error("step '{step}': {reason}")]
    Run { step: String, reason: String },

    #[error("job input '{id}': {reason}")]
    JobInput { id: String, reason: String },

    #[error("{context}: {source}")]
    Yaml {
        context: String,
        #[source]
        source: serde_yaml::Error,
    },
}

impl DecodeError {
    pub(crate) fn shape(field: impl Into<String>, expected: &'static str) -> Self {
        Self::Shape {
            field: field.into(),
            expected,
        }
    }

    pub(crate) fn yaml(context: impl Into<String>, source: serde_yaml::Error) -> Self {
        Self::Yaml {
            context: context.into(),
            source,
        }
    }
}

/// A type-checker invariant is violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("\"{expected}\" required but '{found}' was provided in {id}")]
    WrongClass {
        id: String,
        expected: &'static str,
        found: String,
    },

    #[error("\"id\" cannot be empty")]
    MissingId,

    #[error("DockerRequirement must be present in all Argo CWL definitions, {0} does not satisfy this")]
    MissingDockerRequirement(String),

    #[error("{0}: dockerPull is required")]
    MissingDockerPull(String),

    #[error("in {id} cwlVersion provided was {found} but {expected} was expected")]
    UnsupportedVersion {
        id: String,
        found: String,
        expected: String,
    },

    #[error("in {0} len(baseCommand) == 0 and len(arguments) was not > 0")]
    EmptyCommand(String),

    #[error("parameter '{param}': {field} only valid when types are of {expected}")]
    IllegalAuxiliaryField {
        param: String,
        field: &'static str,
        expected: &'static str,
    },

    #[error("step '{0}': scatterMethod must be set when more than one scatter key is given")]
    MissingScatterMethod(String),
}

/// A reference could not be resolved to a concrete file, value or producer.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("could not find the file: {0}")]
    RunNotFound(String),

    #[error("failed to read '{path}': {source}")]
    RunUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("'{path}': only CommandLineTools are currently supported as step run targets, found '{class}'")]
    RunNotCommandLineTool { path: String, class: String },

    #[error("step '{step}': input '{input}' has no source")]
    MissingSource { step: String, input: String },

    #[error("step '{step}': unresolvable source '{source_ref}': {reason}")]
    UnresolvableSource {
        step: String,
        source_ref: String,
        reason: String,
    },

    #[error("step '{step}': output '{output}' is not declared by its run tool")]
    UnknownStepOutput { step: String, output: String },

    #[error("{0} was not present in input")]
    MissingJobInput(String),

    #[error("input '{id}': job value of kind {found} does not match any declared type")]
    TypeMismatch { id: String, found: String },

    #[error("location data not present for {0}")]
    MissingFileLocation(String),

    #[error("input '{0}': no concrete value is available")]
    MissingValue(String),
}

/// An unsupported value kind was reached while lowering to the target model.
#[derive(Debug, Error)]
pub enum EmissionError {
    #[error("{0} is not currently supported")]
    UnsupportedDockerSource(&'static str),

    #[error("DockerRequirement was not found in {0}")]
    MissingDockerRequirement(String),

    #[error("{0}: dockerPull is a required field")]
    MissingDockerPull(String),

    #[error("ResourceRequirement was not found in {0}")]
    MissingResourceRequirement(String),

    #[error("ResourceRequirement.outdirMin is required to size the output volume")]
    MissingOutdirMin,

    #[error("'{0}' is not a valid quantity")]
    InvalidQuantity(String),

    #[error("{0} is not a supported type for quantity conversion")]
    UnsupportedQuantity(&'static str),

    #[error("parameter '{0}': only string defaults are supported")]
    UnsupportedDefault(String),

    #[error("input '{id}': {kind} is currently an unsupported type")]
    UnsupportedInputType { id: String, kind: String },

    #[error("output '{id}': expected exactly one type, got {count}")]
    AmbiguousOutputType { id: String, count: usize },

    #[error("output '{id}': {kind} is not supported")]
    UnsupportedOutputType { id: String, kind: String },

    #[error("output '{0}': output binding with a glob is required")]
    MissingGlob(String),

    #[error("output '{0}': only a single string glob is supported at the moment")]
    UnsupportedGlob(String),

    #[error("argument '{text}': {reason}")]
    MalformedReference { text: String, reason: String },
}

/// Any failure of the decode → check → emit pipeline.
#[derive(Debug, Error)]
pub enum TranspileError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("emission error: {0}")]
    Emission(#[from] EmissionError),

    #[error("invalid file extension '{0}', only common workflow language (.cwl) files are allowed")]
    InvalidExtension(String),

    #[error("failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize the Argo resource: {0}")]
    Serialize(#[source] serde_yaml::Error),
}

pub type TranspileResult<T> = Result<T, TranspileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_the_tool() {
        let err = ValidationError::MissingDockerRequirement("echo-tool".to_string());
        assert!(err.to_string().contains("echo-tool"));
        assert!(err.to_string().contains("DockerRequirement"));
    }

    #[test]
    fn test_transpile_error_wraps_stage() {
        let err: TranspileError = ValidationError::MissingId.into();
        assert!(matches!(err, TranspileError::Validation(ValidationError::MissingId)));
        assert!(err.to_string().starts_with("validation error"));

        let err: TranspileError = DecodeError::UnknownRequirement("FooRequirement".into()).into();
        assert!(err.to_string().contains("FooRequirement"));
    }

    #[test]
    fn test_resolution_error_display() {
        let err = ResolutionError::MissingJobInput("message".to_string());
        assert_eq!(err.to_string(), "message was not present in input");

        let err = ResolutionError::RunNotFound("tool.cwl".to_string());
        assert!(err.to_string().contains("tool.cwl"));
    }
}

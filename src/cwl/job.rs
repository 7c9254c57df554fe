//! Job Inputs and File Locations
//!
//! The two side files that accompany a document: the job order, mapping
//! input ids to concrete values, and the file-location map describing
//! where File parameters live remotely (HTTP, S3 or HDFS).

use std::convert::TryFrom;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::model::{lift_strings, CwlType, TypeKind};
use crate::argo::model::{HdfsArtifact, HttpArtifact, S3Artifact};
use crate::error::DecodeError;

/// A `File` object from a job order.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CwlFile {
    pub class: String,
    pub location: Option<String>,
    pub path: Option<String>,
    pub dirname: Option<String>,
    pub nameroot: Option<String>,
    pub nameext: Option<String>,
    pub checksum: Option<String>,
    pub size: Option<i64>,
    #[serde(default)]
    pub secondary_files: Vec<CwlFile>,
    pub format: Option<Value>,
    pub contents: Option<String>,
}

/// One concrete job input value.
#[derive(Debug, Clone, PartialEq)]
pub enum JobValue {
    Bool(bool),
    Int(i64),
    String(String),
    Array(Vec<Value>),
    File(Box<CwlFile>),
}

impl JobValue {
    /// Decodes by node shape: bool, int, string, array, then `File` object.
    ///
    /// Floats are kept as their textual form.
    pub fn from_value(id: &str, value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Bool(b) => Ok(Self::Bool(b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(Self::Int(i)),
                None => Ok(Self::String(n.to_string())),
            },
            Value::String(s) => Ok(Self::String(s)),
            Value::Sequence(items) => Ok(Self::Array(items)),
            Value::Mapping(ref map) => {
                let class = map.get("class").and_then(Value::as_str).unwrap_or("");
                if class != "File" {
                    return Err(DecodeError::JobInput {
                        id: id.to_string(),
                        reason: format!("'{}' was received instead of 'File'", class),
                    });
                }
                let file: CwlFile = serde_yaml::from_value(value)
                    .map_err(|e| DecodeError::yaml(format!("job input '{}'", id), e))?;
                Ok(Self::File(Box::new(file)))
            }
            _ => Err(DecodeError::JobInput {
                id: id.to_string(),
                reason: "unable to convert into a job value".to_string(),
            }),
        }
    }

    pub fn kind(&self) -> TypeKind {
        match self {
            Self::Bool(_) => TypeKind::Bool,
            Self::Int(_) => TypeKind::Int,
            Self::String(_) => TypeKind::String,
            Self::Array(_) => TypeKind::Array,
            Self::File(_) => TypeKind::File,
        }
    }

    /// Whether this value inhabits the declared type.
    pub fn matches(&self, ty: &CwlType) -> bool {
        match (self, ty.kind()) {
            (Self::Int(_), TypeKind::Int | TypeKind::Long | TypeKind::Float | TypeKind::Double) => {
                true
            }
            (Self::String(s), TypeKind::Float | TypeKind::Double) => s.parse::<f64>().is_ok(),
            (value, kind) => value.kind() == kind,
        }
    }

    /// Renders the scalar value as a parameter string.
    pub fn as_parameter(&self) -> Option<String> {
        match self {
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Array(_) | Self::File(_) => None,
        }
    }

    /// Renders array items as command-line tokens.
    pub fn array_items(&self) -> Option<Result<Vec<String>, &'static str>> {
        match self {
            Self::Array(items) => Some(lift_strings(Value::Sequence(items.clone()))),
            _ => None,
        }
    }
}

/// Job order keyed by input id, in file order.
pub type JobInputs = IndexMap<String, JobValue>;

/// Decodes a job order document.
pub fn decode_job_inputs(value: Value) -> Result<JobInputs, DecodeError> {
    let map = match value {
        Value::Null => return Ok(JobInputs::new()),
        Value::Mapping(map) => map,
        _ => return Err(DecodeError::shape("job inputs", "a mapping of input ids")),
    };

    let mut inputs = JobInputs::with_capacity(map.len());
    for (key, value) in map {
        let id = key
            .as_str()
            .ok_or_else(|| DecodeError::shape("job inputs", "string keys"))?
            .to_string();
        let entry = JobValue::from_value(&id, value)?;
        inputs.insert(id, entry);
    }
    Ok(inputs)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Http,
    S3,
    Hdfs,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Http => "http",
            Self::S3 => "s3",
            Self::Hdfs => "hdfs",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Deserialize)]
struct RawFileLocationData {
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: TransportKind,
    http: Option<HttpArtifact>,
    s3: Option<S3Artifact>,
    hdfs: Option<HdfsArtifact>,
}

/// Where one File parameter lives remotely.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "RawFileLocationData")]
pub struct FileLocationData {
    pub name: String,
    pub kind: TransportKind,
    pub http: Option<HttpArtifact>,
    pub s3: Option<S3Artifact>,
    pub hdfs: Option<HdfsArtifact>,
}

impl TryFrom<RawFileLocationData> for FileLocationData {
    type Error = String;

    fn try_from(raw: RawFileLocationData) -> Result<Self, Self::Error> {
        let present = match raw.kind {
            TransportKind::Http => raw.http.is_some(),
            TransportKind::S3 => raw.s3.is_some(),
            TransportKind::Hdfs => raw.hdfs.is_some(),
        };
        if !present {
            return Err(format!("{} data not provided", raw.kind));
        }

        Ok(Self {
            name: raw.name,
            kind: raw.kind,
            http: raw.http,
            s3: raw.s3,
            hdfs: raw.hdfs,
        })
    }
}

/// File-location side file: `inputs` and `outputs` keyed by parameter id.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FileLocations {
    #[serde(default)]
    pub inputs: IndexMap<String, FileLocationData>,
    #[serde(default)]
    pub outputs: IndexMap<String, FileLocationData>,
}

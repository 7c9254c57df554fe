//! Requirement classes
//!
//! Every CWL requirement class the decoder understands is one variant of
//! [`Requirement`]. A requirement collection may be written either as a
//! list of objects tagged with `class`, or as a mapping keyed by class
//! name; both decode into the same ordered [`Requirements`] set.

use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use super::model::{single_or_vec, CwlExpression, LoadListing};
use crate::error::DecodeError;

/// Class names accepted in a requirement collection.
pub const KNOWN_CLASSES: &[&str] = &[
    "DockerRequirement",
    "ResourceRequirement",
    "SoftwareRequirement",
    "InitialWorkDirRequirement",
    "EnvVarRequirement",
    "ShellCommandRequirement",
    "WorkReuse",
    "NetworkAccess",
    "InplaceUpdateRequirement",
    "ToolTimeLimit",
    "LoadListingRequirement",
    "SchemaDefRequirement",
    "InlineJavascriptRequirement",
    "ScatterFeatureRequirement",
    "SubworkflowFeatureRequirement",
    "MultipleInputFeatureRequirement",
    "StepInputExpressionRequirement",
];

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "class")]
pub enum Requirement {
    DockerRequirement(DockerRequirement),
    ResourceRequirement(ResourceRequirement),
    SoftwareRequirement(SoftwareRequirement),
    InitialWorkDirRequirement(InitialWorkDirRequirement),
    EnvVarRequirement(EnvVarRequirement),
    ShellCommandRequirement,
    WorkReuse(WorkReuse),
    NetworkAccess(NetworkAccess),
    InplaceUpdateRequirement(InplaceUpdateRequirement),
    ToolTimeLimit(ToolTimeLimit),
    LoadListingRequirement(LoadListingRequirement),
    SchemaDefRequirement(SchemaDefRequirement),
    InlineJavascriptRequirement(InlineJavascriptRequirement),
    ScatterFeatureRequirement,
    SubworkflowFeatureRequirement,
    MultipleInputFeatureRequirement,
    StepInputExpressionRequirement,
}

impl Requirement {
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::DockerRequirement(_) => "DockerRequirement",
            Self::ResourceRequirement(_) => "ResourceRequirement",
            Self::SoftwareRequirement(_) => "SoftwareRequirement",
            Self::InitialWorkDirRequirement(_) => "InitialWorkDirRequirement",
            Self::EnvVarRequirement(_) => "EnvVarRequirement",
            Self::ShellCommandRequirement => "ShellCommandRequirement",
            Self::WorkReuse(_) => "WorkReuse",
            Self::NetworkAccess(_) => "NetworkAccess",
            Self::InplaceUpdateRequirement(_) => "InplaceUpdateRequirement",
            Self::ToolTimeLimit(_) => "ToolTimeLimit",
            Self::LoadListingRequirement(_) => "LoadListingRequirement",
            Self::SchemaDefRequirement(_) => "SchemaDefRequirement",
            Self::InlineJavascriptRequirement(_) => "InlineJavascriptRequirement",
            Self::ScatterFeatureRequirement => "ScatterFeatureRequirement",
            Self::SubworkflowFeatureRequirement => "SubworkflowFeatureRequirement",
            Self::MultipleInputFeatureRequirement => "MultipleInputFeatureRequirement",
            Self::StepInputExpressionRequirement => "StepInputExpressionRequirement",
        }
    }
}

/// Container image source. Only `dockerPull` is honored at emission time.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DockerRequirement {
    pub docker_pull: Option<String>,
    pub docker_load: Option<String>,
    pub docker_file: Option<Value>,
    pub docker_import: Option<String>,
    #[serde(alias = "dockerImageID")]
    pub docker_image_id: Option<String>,
    pub docker_output_directory: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequirement {
    pub cores_min: Option<CwlExpression>,
    pub cores_max: Option<CwlExpression>,
    pub ram_min: Option<CwlExpression>,
    pub ram_max: Option<CwlExpression>,
    pub tmpdir_min: Option<CwlExpression>,
    pub tmpdir_max: Option<CwlExpression>,
    pub outdir_min: Option<CwlExpression>,
    pub outdir_max: Option<CwlExpression>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SoftwarePackage {
    pub package: String,
    #[serde(default, deserialize_with = "single_or_vec")]
    pub version: Vec<String>,
    #[serde(default, deserialize_with = "single_or_vec")]
    pub specs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SoftwareRequirement {
    #[serde(default)]
    pub packages: Vec<SoftwarePackage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InitialWorkDirRequirement {
    pub listing: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentDef {
    pub env_name: String,
    pub env_value: CwlExpression,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarRequirement {
    #[serde(deserialize_with = "env_defs")]
    pub env_def: Vec<EnvironmentDef>,
}

/// `envDef` as a list of `{envName, envValue}` or a name → value mapping.
fn env_defs<'de, D>(deserializer: D) -> Result<Vec<EnvironmentDef>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Sequence(items) => items
            .into_iter()
            .map(|item| serde_yaml::from_value(item).map_err(de::Error::custom))
            .collect(),
        Value::Mapping(map) => map
            .into_iter()
            .map(|(name, value)| {
                let env_name = name
                    .as_str()
                    .ok_or_else(|| de::Error::custom("envDef keys must be strings"))?
                    .to_string();
                let env_value = CwlExpression::from_value(value).map_err(de::Error::custom)?;
                Ok(EnvironmentDef {
                    env_name,
                    env_value,
                })
            })
            .collect(),
        _ => Err(de::Error::custom("envDef must be a list or a mapping")),
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkReuse {
    pub enable_reuse: CwlExpression,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkAccess {
    pub network_access: CwlExpression,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InplaceUpdateRequirement {
    pub inplace_update: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolTimeLimit {
    pub time_limit: CwlExpression,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadListingRequirement {
    pub load_listing: Option<LoadListing>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SchemaDefRequirement {
    #[serde(default)]
    pub types: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineJavascriptRequirement {
    #[serde(default, deserialize_with = "single_or_vec")]
    pub expression_lib: Vec<String>,
}

/// Ordered set of requirements, at most one per class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Requirements(Vec<Requirement>);

impl Requirements {
    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self(requirements)
    }

    /// Decodes a list of tagged objects or a mapping keyed by class name.
    ///
    /// # Arguments
    /// * `field` - Path of the collection, used in error messages
    /// * `value` - The raw `requirements` (or `hints`-like) node
    pub fn from_value(field: &str, value: Value) -> Result<Self, DecodeError> {
        let entries: Vec<(String, Mapping)> = match value {
            Value::Null => Vec::new(),
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Mapping(map) => {
                        let class = map
                            .get("class")
                            .and_then(Value::as_str)
                            .ok_or_else(|| DecodeError::MissingField {
                                field: field.to_string(),
                                name: "class",
                            })?
                            .to_string();
                        Ok((class, map))
                    }
                    _ => Err(DecodeError::shape(field, "a list of requirement objects")),
                })
                .collect::<Result<_, _>>()?,
            Value::Mapping(map) => map
                .into_iter()
                .map(|(key, body)| {
                    let class = key
                        .as_str()
                        .ok_or_else(|| DecodeError::shape(field, "requirement class names as keys"))?
                        .to_string();
                    let mut body = match body {
                        Value::Mapping(body) => body,
                        Value::Null => Mapping::new(),
                        _ => {
                            return Err(DecodeError::shape(
                                format!("{}.{}", field, class),
                                "a mapping",
                            ))
                        }
                    };
                    body.insert(Value::from("class"), Value::from(class.as_str()));
                    Ok((class, body))
                })
                .collect::<Result<_, _>>()?,
            _ => {
                return Err(DecodeError::shape(
                    field,
                    "a list of requirements or a mapping keyed by class",
                ))
            }
        };

        let mut requirements = Vec::with_capacity(entries.len());
        for (class, body) in entries {
            if !KNOWN_CLASSES.contains(&class.as_str()) {
                return Err(DecodeError::UnknownRequirement(class));
            }
            if requirements
                .iter()
                .any(|r: &Requirement| r.class_name() == class)
            {
                return Err(DecodeError::DuplicateRequirement(class));
            }

            let requirement: Requirement = serde_yaml::from_value(Value::Mapping(body))
                .map_err(|e| DecodeError::yaml(format!("{}.{}", field, class), e))?;
            requirements.push(requirement);
        }

        Ok(Self(requirements))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Requirement> {
        self.0.iter()
    }

    pub fn find(&self, class: &str) -> Option<&Requirement> {
        self.0.iter().find(|r| r.class_name() == class)
    }

    pub fn docker(&self) -> Option<&DockerRequirement> {
        self.0.iter().find_map(|r| match r {
            Requirement::DockerRequirement(docker) => Some(docker),
            _ => None,
        })
    }

    pub fn resource(&self) -> Option<&ResourceRequirement> {
        self.0.iter().find_map(|r| match r {
            Requirement::ResourceRequirement(resource) => Some(resource),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(yaml: &str) -> Result<Requirements, DecodeError> {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        Requirements::from_value("requirements", value)
    }

    #[test]
    fn test_list_and_map_forms_agree() {
        let list = decode(
            r#"
- class: DockerRequirement
  dockerPull: busybox
- class: ShellCommandRequirement
"#,
        )
        .unwrap();
        let map = decode(
            r#"
DockerRequirement:
  dockerPull: busybox
ShellCommandRequirement: {}
"#,
        )
        .unwrap();

        assert_eq!(list, map);
        assert_eq!(list.len(), 2);
        assert_eq!(
            list.docker().unwrap().docker_pull.as_deref(),
            Some("busybox")
        );
        assert!(list.find("ShellCommandRequirement").is_some());
    }

    #[test]
    fn test_unknown_class_is_an_error() {
        let err = decode("- class: TeleportRequirement").unwrap_err();
        assert!(matches!(err, DecodeError::UnknownRequirement(ref c) if c == "TeleportRequirement"));
    }

    #[test]
    fn test_duplicate_class_is_an_error() {
        let err = decode(
            r#"
- class: DockerRequirement
  dockerPull: busybox
- class: DockerRequirement
  dockerPull: alpine
"#,
        )
        .unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateRequirement(_)));
    }

    #[test]
    fn test_missing_class_in_list() {
        let err = decode("- dockerPull: busybox").unwrap_err();
        assert!(matches!(err, DecodeError::MissingField { name: "class", .. }));
    }

    #[test]
    fn test_resource_requirement_expressions() {
        let reqs = decode(
            r#"
ResourceRequirement:
  coresMin: 2
  ramMin: 512.5
  outdirMin: 1Gi
"#,
        )
        .unwrap();
        let resource = reqs.resource().unwrap();
        assert_eq!(resource.cores_min, Some(CwlExpression::Int(2)));
        assert_eq!(resource.ram_min, Some(CwlExpression::Float(512.5)));
        assert_eq!(resource.outdir_min, Some(CwlExpression::Raw("1Gi".into())));
        assert_eq!(resource.tmpdir_min, None);
    }

    #[test]
    fn test_docker_image_id_alias() {
        let reqs = decode(
            r#"
DockerRequirement:
  dockerImageID: sha256:abc
"#,
        )
        .unwrap();
        let docker = reqs.docker().unwrap();
        assert_eq!(docker.docker_image_id.as_deref(), Some("sha256:abc"));
        assert!(docker.docker_pull.is_none());
    }

    #[test]
    fn test_env_var_forms() {
        let list = decode(
            r#"
EnvVarRequirement:
  envDef:
    - envName: HOME
      envValue: /root
"#,
        )
        .unwrap();
        let map = decode(
            r#"
EnvVarRequirement:
  envDef:
    HOME: /root
"#,
        )
        .unwrap();
        assert_eq!(list, map);
    }

    #[test]
    fn test_software_packages_versions_lifted() {
        let reqs = decode(
            r#"
SoftwareRequirement:
  packages:
    - package: samtools
      version: "1.9"
"#,
        )
        .unwrap();
        match reqs.find("SoftwareRequirement") {
            Some(Requirement::SoftwareRequirement(sw)) => {
                assert_eq!(sw.packages[0].version, vec!["1.9".to_string()]);
            }
            other => panic!("unexpected requirement: {:?}", other),
        }
    }

    #[test]
    fn test_feature_requirements() {
        let reqs = decode(
            r#"
- class: ScatterFeatureRequirement
- class: StepInputExpressionRequirement
"#,
        )
        .unwrap();
        assert_eq!(reqs.len(), 2);
        assert!(reqs.docker().is_none());
    }

    #[test]
    fn test_wrong_shape() {
        assert!(matches!(
            decode("just-a-string").unwrap_err(),
            DecodeError::Shape { .. }
        ));
    }
}

//! Argo Workflows Resource Model
//!
//! The subset of the `argoproj.io/v1alpha1` `Workflow` resource the
//! emitters produce. Empty collections and unset optionals are skipped on
//! serialization so the rendered YAML only carries what was emitted.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const API_VERSION: &str = "argoproj.io/v1alpha1";
pub const KIND: &str = "Workflow";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: WorkflowSpec,
}

impl Workflow {
    /// Creates an empty resource with the given metadata.
    pub fn new(metadata: ObjectMeta) -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata,
            spec: WorkflowSpec::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
}

impl ObjectMeta {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            generate_name: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSpec {
    pub entrypoint: String,

    #[serde(skip_serializing_if = "Arguments::is_empty")]
    pub arguments: Arguments,

    pub templates: Vec<Template>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volume_claim_templates: Vec<PersistentVolumeClaim>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Arguments {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

impl Arguments {
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.artifacts.is_empty()
    }
}

/// Template inputs and outputs share one shape.
pub type Inputs = Arguments;
pub type Outputs = Arguments;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Template {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Arguments::is_empty")]
    pub inputs: Inputs,

    #[serde(skip_serializing_if = "Arguments::is_empty")]
    pub outputs: Outputs,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub container: Option<Container>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<ParallelSteps>,
}

/// Steps that run concurrently within one stage of a steps template.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParallelSteps(pub Vec<WorkflowStep>);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowStep {
    pub name: String,
    pub inline: Box<Template>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value_from: Option<ValueFrom>,
}

impl Parameter {
    /// A parameter declared by name only.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_value(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueFrom {
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Artifact {
    pub name: String,
    pub path: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpArtifact>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Artifact>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hdfs: Option<HdfsArtifact>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpArtifact {
    pub url: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,
}

/// Reference to a key inside a Kubernetes secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretKeySelector {
    pub name: String,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Artifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_secret: Option<SecretKeySelector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_secret: Option<SecretKeySelector>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HdfsArtifact {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,

    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hdfs_user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub image: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volume_mounts: Vec<VolumeMount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistentVolumeClaim {
    pub metadata: ObjectMeta,
    pub spec: PersistentVolumeClaimSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolumeClaimSpec {
    pub access_modes: Vec<String>,
    pub resources: ResourceRequests,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceRequests {
    pub requests: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_fields_are_skipped() {
        let mut wf = Workflow::new(ObjectMeta::named("echo-tool"));
        wf.spec.entrypoint = "echo-tool".into();
        wf.spec.templates.push(Template {
            name: Some("echo-tool".into()),
            container: Some(Container {
                image: "busybox".into(),
                ..Default::default()
            }),
            ..Default::default()
        });

        let yaml = serde_yaml::to_string(&wf).unwrap();
        assert!(yaml.contains("apiVersion: argoproj.io/v1alpha1"));
        assert!(yaml.contains("kind: Workflow"));
        assert!(yaml.contains("image: busybox"));
        assert!(!yaml.contains("arguments"));
        assert!(!yaml.contains("volumeClaimTemplates"));
        assert!(!yaml.contains("generateName"));
        assert!(!yaml.contains("inputs"));
    }

    #[test]
    fn test_parallel_steps_serialize_as_list() {
        let stage = ParallelSteps(vec![WorkflowStep {
            name: "step-one".into(),
            inline: Box::new(Template::default()),
        }]);
        let value = serde_json::to_value(&stage).unwrap();
        assert!(value.is_array());
        assert_eq!(value[0]["name"], "step-one");
    }

    #[test]
    fn test_s3_artifact_from_json() {
        let s3: S3Artifact = serde_json::from_str(
            r#"{
                "endpoint": "minio:9000",
                "bucket": "data",
                "key": "in/reads.fq",
                "insecure": true,
                "accessKeySecret": {"name": "creds", "key": "access"}
            }"#,
        )
        .unwrap();
        assert_eq!(s3.bucket.as_deref(), Some("data"));
        assert_eq!(s3.access_key_secret.unwrap().key, "access");
        assert!(s3.secret_key_secret.is_none());
    }

    #[test]
    fn test_parameter_value_from() {
        let param = Parameter {
            name: "out".into(),
            value: None,
            value_from: Some(ValueFrom {
                path: "out.txt".into(),
            }),
        };
        let value = serde_json::to_value(&param).unwrap();
        assert_eq!(value["valueFrom"]["path"], "out.txt");
        assert!(value.get("value").is_none());
    }
}

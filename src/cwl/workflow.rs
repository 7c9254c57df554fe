//! Workflow Data Model
//!
//! A CWL `Workflow` is an ordered sequence of steps. Each step runs a
//! `CommandLineTool`, either written inline or loaded from a `.cwl` file,
//! and wires its inputs to workflow inputs or to earlier steps' outputs.
//!
//! Step order and input order are taken from the document as written and
//! are never derived from map iteration later on.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_yaml::Value;

use super::model::{
    cwl_types, optional_single_or_vec, secondary_files, single_or_vec, CommandLineTool,
    CwlExpression, CwlType, Hints, Identified, LoadListing, SecondaryFileSchema,
};
use super::requirements::{DockerRequirement, Requirements};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInputBinding {
    pub load_contents: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowInputParameter {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(rename = "type", deserialize_with = "cwl_types")]
    pub types: Vec<CwlType>,

    pub label: Option<String>,

    #[serde(default, deserialize_with = "secondary_files")]
    pub secondary_files: Option<Vec<SecondaryFileSchema>>,

    pub streamable: Option<bool>,

    #[serde(default, deserialize_with = "single_or_vec")]
    pub doc: Vec<String>,

    #[serde(default, deserialize_with = "optional_single_or_vec")]
    pub format: Option<Vec<String>>,

    pub load_contents: Option<bool>,

    pub load_listing: Option<LoadListing>,

    pub default: Option<Value>,

    pub input_binding: Option<WorkflowInputBinding>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMergeMethod {
    MergeNested,
    MergeFlattened,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickValueMethod {
    FirstNonNull,
    TheOnlyNonNull,
    AllNonNull,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowOutputParameter {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(rename = "type", deserialize_with = "cwl_types")]
    pub types: Vec<CwlType>,

    pub label: Option<String>,

    #[serde(default, deserialize_with = "secondary_files")]
    pub secondary_files: Option<Vec<SecondaryFileSchema>>,

    pub streamable: Option<bool>,

    #[serde(default, deserialize_with = "single_or_vec")]
    pub doc: Vec<String>,

    #[serde(default, deserialize_with = "optional_single_or_vec")]
    pub format: Option<Vec<String>>,

    #[serde(default, deserialize_with = "single_or_vec")]
    pub output_source: Vec<String>,

    pub link_merge: Option<LinkMergeMethod>,

    pub pick_value: Option<PickValueMethod>,
}

impl Identified for WorkflowInputParameter {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

impl Identified for WorkflowOutputParameter {
    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }
}

/// One entry of a step's `in` collection.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStepInput {
    #[serde(default)]
    pub id: String,
    pub source: Option<String>,
    pub link_merge: Option<LinkMergeMethod>,
    pub load_contents: Option<bool>,
    pub load_listing: Option<LoadListing>,
    pub label: Option<String>,
    pub default: Option<Value>,
    pub value_from: Option<CwlExpression>,
}

/// Field names a single step-input object may carry.
pub const STEP_INPUT_FIELDS: &[&str] = &[
    "id",
    "source",
    "linkMerge",
    "loadContents",
    "loadListing",
    "label",
    "default",
    "valueFrom",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scatter {
    Single(String),
    Many(Vec<String>),
}

impl Scatter {
    pub fn keys(&self) -> Vec<&str> {
        match self {
            Self::Single(key) => vec![key.as_str()],
            Self::Many(keys) => keys.iter().map(String::as_str).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Many(keys) => keys.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScatterMethod {
    Dotproduct,
    NestedCrossproduct,
    FlatCrossproduct,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowStep {
    pub id: String,
    pub inputs: Vec<WorkflowStepInput>,
    pub out: Vec<String>,
    pub run: Box<CommandLineTool>,
    pub requirements: Requirements,
    pub hints: Option<Hints>,
    pub label: Option<String>,
    pub doc: Vec<String>,
    pub scatter: Option<Scatter>,
    pub scatter_method: Option<ScatterMethod>,
}

impl WorkflowStep {
    /// The step's own DockerRequirement, else the one of its run tool.
    pub fn docker(&self) -> Option<&DockerRequirement> {
        self.requirements
            .docker()
            .or_else(|| self.run.requirements.docker())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Workflow {
    pub class: Option<String>,
    pub id: Option<String>,
    pub label: Option<String>,
    pub doc: Vec<String>,
    pub requirements: Requirements,
    pub hints: Option<Hints>,
    pub cwl_version: Option<String>,
    pub intent: Vec<String>,
    pub inputs: IndexMap<String, WorkflowInputParameter>,
    pub outputs: IndexMap<String, WorkflowOutputParameter>,
    pub steps: Vec<WorkflowStep>,
}

impl Workflow {
    pub fn display_id(&self) -> &str {
        self.id.as_deref().unwrap_or("<anonymous Workflow>")
    }

    pub fn step(&self, id: &str) -> Option<&WorkflowStep> {
        self.steps.iter().find(|s| s.id == id)
    }
}

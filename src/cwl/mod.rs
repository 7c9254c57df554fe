//! Common Workflow Language Module
//!
//! Decodes CWL documents into a typed AST and type-checks them against
//! the subset the Argo emitters support.
//!
//! # Structure
//!
//! - [`model`]: CommandLineTool, parameters, types and expressions
//! - [`requirements`]: Requirement classes and the requirement set
//! - [`workflow`]: Workflow, steps and step inputs
//! - [`job`]: Job inputs and file-location side files
//! - [`decode`]: Structural decoding from YAML
//! - [`validator`]: Type checking

pub mod decode;
pub mod job;
pub mod model;
pub mod requirements;
pub mod validator;
pub mod workflow;

pub use decode::{Decoder, Document};
pub use job::{decode_job_inputs, FileLocations, JobInputs, JobValue};
pub use model::{CommandLineTool, CwlExpression, CwlType, TypeKind};
pub use requirements::{Requirement, Requirements};
pub use validator::{type_check_tool, type_check_workflow};
pub use workflow::{Workflow, WorkflowStep, WorkflowStepInput};

//! Argo Workflows Module
//!
//! Lowers type-checked CWL documents into `argoproj.io/v1alpha1`
//! `Workflow` resources.
//!
//! # Structure
//!
//! - [`model`]: The emitted resource tree
//! - [`container`]: Container image, volume mount and volume claim lowering
//! - [`references`]: Source resolution and `$(...)` expression rewriting
//! - [`tool`]: CommandLineTool emitter
//! - [`workflow`]: Workflow emitter

pub mod container;
pub mod model;
pub mod references;
pub mod tool;
pub mod workflow;

pub use model::Workflow;
pub use tool::emit_tool;
pub use workflow::emit_workflow;

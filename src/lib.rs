//! cwl2argo - Common Workflow Language to Argo Workflows Transpiler
//!
//! Converts CWL `CommandLineTool` and `Workflow` documents into Argo
//! `Workflow` resources that run each tool in a container on Kubernetes.
//!
//! # Architecture
//!
//! The library is organized as a three-stage pipeline:
//!
//! - [`cwl`]: Decodes documents into a typed AST and type-checks them
//! - [`argo`]: Emits the Argo resource tree from a checked AST
//! - [`transpile`]: Runs decode → check → emit and handles files
//!
//! Supporting modules:
//!
//! - [`config`]: Supported version, `run:` search path, volume naming
//! - [`error`]: One error type per pipeline stage
//!
//! # Example
//!
//! ```rust
//! use cwl2argo::{transpile, FileLocations, JobInputs, TranspileConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let document = serde_yaml::from_str(
//!         r#"
//! class: CommandLineTool
//! id: echo-tool
//! requirements:
//!   DockerRequirement:
//!     dockerPull: busybox
//! baseCommand: echo
//! inputs:
//!   message:
//!     type: string
//!     inputBinding: {position: 0}
//! outputs: []
//! "#,
//!     )?;
//!
//!     let config = TranspileConfig::default();
//!     let resource = transpile(document, &JobInputs::new(), &FileLocations::default(), &config)?;
//!     assert!(resource.is_some());
//!     Ok(())
//! }
//! ```

pub mod argo;
pub mod config;
pub mod cwl;
pub mod error;
pub mod transpile;

// Re-export commonly used types
pub use config::TranspileConfig;
pub use cwl::{FileLocations, JobInputs};
pub use error::{TranspileError, TranspileResult};
pub use transpile::{process_file, render_yaml, transpile};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "cwl2argo";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_tool_renders_argo_workflow() {
        let document = serde_yaml::from_str(
            r#"
class: CommandLineTool
id: echo-tool
requirements:
  DockerRequirement:
    dockerPull: busybox
baseCommand: echo
inputs:
  message:
    type: string
    default: hello
    inputBinding: {position: 0}
outputs: []
"#,
        )
        .unwrap();
        let resource = transpile(
            document,
            &JobInputs::new(),
            &FileLocations::default(),
            &TranspileConfig::default(),
        )
        .unwrap()
        .unwrap();

        let yaml = render_yaml(&resource).unwrap();
        assert!(yaml.contains("argoproj.io/v1alpha1"));
        assert!(yaml.contains("echo-tool"));
        assert!(yaml.contains("busybox"));
    }

    #[test]
    fn test_app_name() {
        assert_eq!(APP_NAME, "cwl2argo");
    }

    #[test]
    fn test_module_exports_transpile() {
        let document = serde_yaml::from_str("class: Operation\nid: op\n").unwrap();
        let result = transpile(
            document,
            &JobInputs::new(),
            &FileLocations::default(),
            &TranspileConfig::default(),
        )
        .unwrap();
        assert!(result.is_none());
    }
}

//! Transpile Pipeline
//!
//! Runs decode → type check → emit over one document, and wraps that in a
//! file-level entry point that reads the side files and writes the result.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use cwl2argo::config::TranspileConfig;
//! use cwl2argo::transpile::process_file;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = TranspileConfig::default();
//!     if let Some(written) = process_file(Path::new("echo.cwl"), None, None, &config)? {
//!         println!("Wrote {}", written.display());
//!     }
//!     Ok(())
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde_yaml::Value;

use crate::argo::{self, emit_tool, emit_workflow};
use crate::config::TranspileConfig;
use crate::cwl::{
    decode_job_inputs, type_check_tool, type_check_workflow, Decoder, Document, FileLocations,
    JobInputs,
};
use crate::error::{DecodeError, TranspileError, TranspileResult};

/// Suffix appended to the document stem for the emitted file.
pub const OUTPUT_SUFFIX: &str = "_argo_output.yaml";

/// Transpiles one parsed document.
///
/// Returns `None` for document classes that have no Argo lowering.
///
/// # Arguments
///
/// * `document` - The parsed CWL document
/// * `job` - Job inputs, possibly empty
/// * `locations` - File locations, possibly empty
/// * `config` - Version, search path and volume settings
pub fn transpile(
    document: Value,
    job: &JobInputs,
    locations: &FileLocations,
    config: &TranspileConfig,
) -> TranspileResult<Option<argo::Workflow>> {
    info!("Decoding document");
    let document = Decoder::new(config).decode_document(document)?;

    match document {
        Document::CommandLineTool(tool) => {
            info!("Type checking CommandLineTool '{}'", tool.display_id());
            type_check_tool(&tool, config)?;
            emit_tool(&tool, job, locations, config).map(Some)
        }
        Document::Workflow(workflow) => {
            info!("Type checking Workflow '{}'", workflow.display_id());
            type_check_workflow(&workflow, config)?;
            emit_workflow(&workflow, job).map(Some)
        }
        Document::Other(_) => Ok(None),
    }
}

fn read_to_string(path: &Path) -> TranspileResult<String> {
    fs::read_to_string(path).map_err(|source| TranspileError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads and parses a YAML file.
pub fn read_yaml(path: &Path) -> TranspileResult<Value> {
    let content = read_to_string(path)?;
    serde_yaml::from_str(&content)
        .map_err(|e| DecodeError::yaml(path.display().to_string(), e).into())
}

/// Loads a YAML job order.
pub fn load_job_inputs(path: &Path) -> TranspileResult<JobInputs> {
    debug!("Loading job inputs from {}", path.display());
    Ok(decode_job_inputs(read_yaml(path)?)?)
}

/// Loads a JSON file-location map.
pub fn load_file_locations(path: &Path) -> TranspileResult<FileLocations> {
    debug!("Loading file locations from {}", path.display());
    let content = read_to_string(path)?;
    serde_json::from_str(&content).map_err(|source| TranspileError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// `<dir>/<stem>_argo_output.yaml` for a document at `<dir>/<stem>.cwl`.
pub fn output_path_for(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!("{}{}", stem, OUTPUT_SUFFIX))
}

/// Serializes the resource as YAML.
pub fn render_yaml(workflow: &argo::Workflow) -> TranspileResult<String> {
    serde_yaml::to_string(workflow).map_err(TranspileError::Serialize)
}

/// Transpiles a `.cwl` file and writes the result next to it.
///
/// Nested `run:` files are also looked up relative to the document's
/// directory. Returns the written path, or `None` when the document class
/// has no lowering.
pub fn process_file(
    input: &Path,
    inputs_file: Option<&Path>,
    locations_file: Option<&Path>,
    config: &TranspileConfig,
) -> TranspileResult<Option<PathBuf>> {
    let extension = input
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default();
    if extension != "cwl" {
        return Err(TranspileError::InvalidExtension(extension));
    }

    let mut config = config.clone();
    if let Some(parent) = input.parent().filter(|p| !p.as_os_str().is_empty()) {
        config.prepend_search_paths(vec![parent.to_path_buf()]);
    }

    info!("Loading document: {}", input.display());
    let document = read_yaml(input)?;

    let job = match inputs_file {
        Some(path) => load_job_inputs(path)?,
        None => JobInputs::new(),
    };
    let locations = match locations_file {
        Some(path) => load_file_locations(path)?,
        None => FileLocations::default(),
    };

    let Some(workflow) = transpile(document, &job, &locations, &config)? else {
        return Ok(None);
    };

    let output = output_path_for(input);
    let rendered = render_yaml(&workflow)?;
    fs::write(&output, rendered).map_err(|source| TranspileError::Io {
        path: output.clone(),
        source,
    })?;

    info!("Wrote {}", output.display());
    Ok(Some(output))
}

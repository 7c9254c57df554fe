//! Transpiler Configuration
//!
//! Holds the values the pipeline would otherwise hard-code: the supported
//! CWL version, where nested `run:` documents are looked up, and how the
//! shared output volume is named and mounted.
//!
//! # Search Path Priority
//!
//! A nested `run: tool.cwl` reference is resolved in the following order:
//! 1. The working directory (the reference as written)
//! 2. Any extra directories supplied by the caller
//! 3. `/usr/share/commonwl/`
//! 4. `/usr/local/share/commonwl/`
//! 5. `$HOME/.local/share/commonwl/`

use std::path::{Path, PathBuf};

use log::debug;
use once_cell::sync::Lazy;

use crate::error::ResolutionError;

/// The only CWL version the type checker accepts.
pub const CWL_VERSION: &str = "v1.2";

/// Name of the shared persistent volume claim.
pub const VOLUME_CLAIM_NAME: &str = "argovolume";

/// Mount path used when the container has no working directory.
pub const DEFAULT_MOUNT_PATH: &str = "/mnt/pvol";

/// Lazily-resolved system share directories, in lookup order.
static SYSTEM_SHARE_DIRS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    let mut dirs = vec![
        PathBuf::from("/usr/share/commonwl"),
        PathBuf::from("/usr/local/share/commonwl"),
    ];

    if let Some(home) = std::env::var_os("HOME") {
        dirs.push(PathBuf::from(home).join(".local/share/commonwl"));
    }

    dirs
});

/// Configuration injected into every pipeline stage.
#[derive(Debug, Clone)]
pub struct TranspileConfig {
    /// Accepted `cwlVersion` value
    pub cwl_version: String,

    /// Directories searched for nested `run:` documents after the working directory
    pub search_paths: Vec<PathBuf>,

    /// Name given to the output volume claim
    pub volume_claim_name: String,

    /// Fallback mount path for the output volume
    pub default_mount_path: String,
}

impl Default for TranspileConfig {
    fn default() -> Self {
        Self {
            cwl_version: CWL_VERSION.to_string(),
            search_paths: SYSTEM_SHARE_DIRS.clone(),
            volume_claim_name: VOLUME_CLAIM_NAME.to_string(),
            default_mount_path: DEFAULT_MOUNT_PATH.to_string(),
        }
    }
}

impl TranspileConfig {
    /// Creates a configuration that searches only the given directories.
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            ..Self::default()
        }
    }

    /// Inserts extra directories ahead of the system share directories.
    pub fn prepend_search_paths(&mut self, dirs: impl IntoIterator<Item = PathBuf>) {
        let mut paths: Vec<PathBuf> = dirs.into_iter().collect();
        paths.append(&mut self.search_paths);
        self.search_paths = paths;
    }

    /// Resolves a nested `run:` reference to an existing file.
    ///
    /// The reference is tried as written first, then joined onto every
    /// search directory in order. The first existing file wins.
    pub fn locate(&self, reference: &str) -> Result<PathBuf, ResolutionError> {
        let direct = Path::new(reference);
        if direct.is_file() {
            debug!("Resolved '{}' in working directory", reference);
            return Ok(direct.to_path_buf());
        }

        for dir in &self.search_paths {
            let candidate = dir.join(reference);
            if candidate.is_file() {
                debug!("Resolved '{}' to {}", reference, candidate.display());
                return Ok(candidate);
            }
        }

        Err(ResolutionError::RunNotFound(reference.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = TranspileConfig::default();
        assert_eq!(config.cwl_version, "v1.2");
        assert_eq!(config.volume_claim_name, "argovolume");
        assert_eq!(config.default_mount_path, "/mnt/pvol");
        assert_eq!(config.search_paths[0], PathBuf::from("/usr/share/commonwl"));
        assert_eq!(config.search_paths[1], PathBuf::from("/usr/local/share/commonwl"));
    }

    #[test]
    fn test_locate_first_match_wins() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        std::fs::write(first.path().join("tool.cwl"), "class: CommandLineTool").unwrap();
        std::fs::write(second.path().join("tool.cwl"), "class: CommandLineTool").unwrap();

        let config = TranspileConfig::with_search_paths(vec![
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);

        let found = config.locate("tool.cwl").unwrap();
        assert_eq!(found, first.path().join("tool.cwl"));
    }

    #[test]
    fn test_locate_falls_through_search_path() {
        let empty = tempdir().unwrap();
        let share = tempdir().unwrap();
        std::fs::write(share.path().join("nested.cwl"), "class: CommandLineTool").unwrap();

        let config = TranspileConfig::with_search_paths(vec![
            empty.path().to_path_buf(),
            share.path().to_path_buf(),
        ]);

        assert_eq!(config.locate("nested.cwl").unwrap(), share.path().join("nested.cwl"));
    }

    #[test]
    fn test_locate_not_found() {
        let empty = tempdir().unwrap();
        let config = TranspileConfig::with_search_paths(vec![empty.path().to_path_buf()]);

        let err = config.locate("missing-tool-7f3a.cwl").unwrap_err();
        assert!(matches!(err, ResolutionError::RunNotFound(_)));
    }

    #[test]
    fn test_prepend_search_paths() {
        let mut config = TranspileConfig::with_search_paths(vec![PathBuf::from("/b")]);
        config.prepend_search_paths(vec![PathBuf::from("/a")]);
        assert_eq!(config.search_paths, vec![PathBuf::from("/a"), PathBuf::from("/b")]);
    }
}

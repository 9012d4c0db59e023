//! Staging and committing generated files.
//!
//! Outputs live in memory until the build commits; a failed build leaves the output directory untouched.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;

use crate::error::BuildError;

/// Check a processor-supplied relative output path.
pub fn validate_output_path(path: &Path) -> Result<(), String> {
    if path.as_os_str().is_empty() {
        return Err("empty output path".to_string());
    }
    for component in path.components() {
        match component {
            Component::ParentDir => return Err("output path contains path traversal (..)".to_string()),
            Component::RootDir | Component::Prefix(_) => {
                return Err("output path must be relative to the output directory".to_string());
            }
            _ => {}
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub(crate) struct StagedFile {
    pub processor: String,
    pub contents: String,
}

/// Generated files of the current build, keyed by their path under the output directory.
#[derive(Debug, Default)]
pub(crate) struct OutputStage {
    output_dir: PathBuf,
    files: IndexMap<PathBuf, StagedFile>,
}

impl OutputStage {
    pub fn new(output_dir: &Path) -> Self {
        if output_dir.is_absolute() {
            tracing::debug!(dir = %output_dir.display(), "using absolute output directory");
        }
        Self {
            output_dir: output_dir.to_path_buf(),
            files: IndexMap::new(),
        }
    }

    /// Validate and stage one file. Returns its full path.
    pub fn stage(&mut self, relative: &Path, processor: &str, contents: String) -> Result<PathBuf, BuildError> {
        validate_output_path(relative).map_err(|reason| BuildError::InvalidOutput {
            path: relative.to_path_buf(),
            processor: processor.to_string(),
            reason,
        })?;
        let full = self.output_dir.join(relative);
        if let Some(existing) = self.files.get(&full) {
            return Err(BuildError::InvalidOutput {
                path: relative.to_path_buf(),
                processor: processor.to_string(),
                reason: format!("already generated by `{}` in this build", existing.processor),
            });
        }
        self.files.insert(
            full.clone(),
            StagedFile {
                processor: processor.to_string(),
                contents,
            },
        );
        Ok(full)
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.keys().cloned().collect()
    }

    /// Write staged files and delete `stale` outputs that were not regenerated.
    ///
    /// Returns the removed paths.
    #[tracing::instrument(skip_all, fields(files = self.files.len()))]
    pub fn commit(&self, stale: &BTreeSet<PathBuf>) -> Result<Vec<PathBuf>, BuildError> {
        for (path, file) in &self.files {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).map_err(|source| BuildError::Io {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
            fs::write(path, &file.contents).map_err(|source| BuildError::Io {
                path: path.clone(),
                source,
            })?;
        }
        let mut removed = Vec::new();
        for path in stale {
            if self.files.contains_key(path) {
                continue;
            }
            match fs::remove_file(path) {
                Ok(()) => removed.push(path.clone()),
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => removed.push(path.clone()),
                Err(source) => {
                    return Err(BuildError::Io {
                        path: path.clone(),
                        source,
                    });
                }
            }
        }
        tracing::debug!(written = self.files.len(), removed = removed.len(), "outputs committed");
        Ok(removed)
    }
}

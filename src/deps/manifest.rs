use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bumped whenever the persisted layout changes; older manifests force a full rebuild.
pub const MANIFEST_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no dependency manifest at {}", path.display())]
    Missing { path: PathBuf },
    #[error("dependency manifest at {} is corrupt: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("dependency manifest at {} has schema version {found}, expected {expected}", path.display())]
    Incompatible { path: PathBuf, found: u32, expected: u32 },
    #[error("failed to access dependency manifest at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode dependency manifest: {0}")]
    Encode(#[source] serde_json::Error),
}

/// What one processor read during the build that produced the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorRecord {
    pub consumed_files: BTreeSet<PathBuf>,
    /// Qualified names of the symbols the processor looked at.
    pub consumed_symbols: BTreeSet<String>,
    pub depends_on_all: bool,
    pub supports_incremental: bool,
}

/// Provenance of one generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub processor: String,
    pub sources: BTreeSet<PathBuf>,
    pub aggregating: bool,
    pub round: u32,
}

/// `consumer` (an output) was derived from `producer` (an input or an earlier output).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub consumer: PathBuf,
    pub producer: PathBuf,
}

/// The persisted dependency graph of one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyManifest {
    pub schema_version: u32,
    #[serde(default)]
    pub processors: BTreeMap<String, ProcessorRecord>,
    #[serde(default)]
    pub outputs: BTreeMap<PathBuf, OutputRecord>,
    /// Source files present in the compilation.
    #[serde(default)]
    pub inputs: BTreeSet<PathBuf>,
}

impl Default for DependencyManifest {
    fn default() -> Self {
        Self {
            schema_version: MANIFEST_SCHEMA_VERSION,
            processors: BTreeMap::new(),
            outputs: BTreeMap::new(),
            inputs: BTreeSet::new(),
        }
    }
}

impl DependencyManifest {
    /// Load a manifest, classifying why it cannot be used.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(ManifestError::Missing { path: path.to_path_buf() });
            }
            Err(source) => {
                return Err(ManifestError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_json(&text, path)
    }

    fn from_json(text: &str, path: &Path) -> Result<Self, ManifestError> {
        let corrupt = |source| ManifestError::Corrupt {
            path: path.to_path_buf(),
            source,
        };
        let value: serde_json::Value = serde_json::from_str(text).map_err(corrupt)?;
        let found = value
            .get("schema_version")
            .and_then(serde_json::Value::as_u64)
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .unwrap_or(0);
        if found != MANIFEST_SCHEMA_VERSION {
            return Err(ManifestError::Incompatible {
                path: path.to_path_buf(),
                found,
                expected: MANIFEST_SCHEMA_VERSION,
            });
        }
        serde_json::from_value(value).map_err(corrupt)
    }

    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let text = serde_json::to_string_pretty(self).map_err(ManifestError::Encode)?;
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|source| ManifestError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, text).map_err(|source| ManifestError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Every output-to-source edge, sorted.
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.outputs
            .iter()
            .flat_map(|(output, record)| {
                record.sources.iter().map(move |source| DependencyEdge {
                    consumer: output.clone(),
                    producer: source.clone(),
                })
            })
            .collect()
    }

    pub fn is_output(&self, path: &Path) -> bool {
        self.outputs.contains_key(path)
    }

    /// Outputs recorded for `processor`.
    pub fn outputs_of<'a>(&'a self, processor: &'a str) -> impl Iterator<Item = (&'a PathBuf, &'a OutputRecord)> + 'a {
        self.outputs.iter().filter(move |(_, r)| r.processor == processor)
    }

    /// Fail with the offending chain if some output transitively derives from itself.
    pub fn check_acyclic(&self) -> Result<(), Vec<PathBuf>> {
        let mut visited = HashSet::new();
        let mut on_stack = HashSet::new();
        for output in self.outputs.keys() {
            if !visited.contains(output) {
                if let Some(cycle) = self.find_cycle(output, &mut visited, &mut on_stack) {
                    return Err(cycle);
                }
            }
        }
        Ok(())
    }

    fn find_cycle<'a>(
        &'a self,
        current: &'a PathBuf,
        visited: &mut HashSet<&'a PathBuf>,
        on_stack: &mut HashSet<&'a PathBuf>,
    ) -> Option<Vec<PathBuf>> {
        visited.insert(current);
        on_stack.insert(current);
        if let Some(record) = self.outputs.get(current) {
            for source in &record.sources {
                if on_stack.contains(source) {
                    return Some(vec![current.clone(), source.clone()]);
                }
                if !visited.contains(source) {
                    if let Some(mut cycle) = self.find_cycle(source, visited, on_stack) {
                        cycle.insert(0, current.clone());
                        return Some(cycle);
                    }
                }
            }
        }
        on_stack.remove(current);
        None
    }
}

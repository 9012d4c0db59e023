//! Compilation snapshots: a whole compilation serialized as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use symproc_core::QualifiedName;

use super::{FileStub, Frontend, FrontendError, MemoryFrontend};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("cannot read snapshot '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot '{}': {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Frontend(#[from] FrontendError),
}

/// The set of source files and library declarations of one compilation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilationSnapshot {
    /// Name reported by the resulting adapter.
    #[serde(default = "default_frontend_name")]
    pub frontend: String,
    #[serde(default)]
    pub default_packages: Vec<QualifiedName>,
    #[serde(default)]
    pub files: Vec<FileStub>,
}

fn default_frontend_name() -> String {
    "memory".to_string()
}

impl CompilationSnapshot {
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let text = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| SnapshotError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Build a [`MemoryFrontend`] holding every file of the snapshot.
    #[tracing::instrument(skip_all, fields(files = self.files.len()))]
    pub fn into_frontend(self) -> Result<MemoryFrontend, SnapshotError> {
        let frontend = MemoryFrontend::new(self.frontend).with_default_packages(self.default_packages);
        for file in self.files {
            frontend.add_file(file)?;
        }
        Ok(frontend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_loads_into_frontend() {
        let json = r#"{
            "default_packages": ["kotlin"],
            "files": [
                {"path": "lib/Base.kt", "package": "kotlin", "origin": "library",
                 "declarations": [{"name": "Any", "kind": "class"}]},
                {"path": "src/A.kt", "package": "com.example",
                 "declarations": [{"name": "Foo", "kind": "class", "super_types": ["Any"]}]}
            ]
        }"#;
        let snapshot: CompilationSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.frontend, "memory");
        let frontend = snapshot.into_frontend().unwrap();
        assert_eq!(frontend.files().len(), 2);
        assert!(frontend.class_by_name(&QualifiedName::new("com.example.Foo")).is_some());
    }

    #[test]
    fn test_missing_snapshot_is_io_error() {
        let err = CompilationSnapshot::load(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
    }
}

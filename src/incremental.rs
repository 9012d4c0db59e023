//! Incremental planning: decide which files to reprocess from a changed-files set and the previous manifest.
//!
//! The planner never guesses. Whenever the previous build's records cannot be trusted (missing, corrupt or
//! incompatible manifest, a processor that opts out of incremental runs, a different processor set) it asks
//! for a full rebuild and says why.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::deps::{DependencyManifest, ManifestError};

/// File-level changes since the previous build, as reported by the build system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangedFiles {
    pub modified: BTreeSet<PathBuf>,
    pub added: BTreeSet<PathBuf>,
    pub removed: BTreeSet<PathBuf>,
    /// Qualified names of classes whose signatures changed (e.g. in libraries on the classpath).
    pub changed_classes: BTreeSet<String>,
}

impl ChangedFiles {
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.added.is_empty() && self.removed.is_empty() && self.changed_classes.is_empty()
    }

    /// modified ∪ added ∪ removed
    pub fn dirty_files(&self) -> BTreeSet<PathBuf> {
        self.modified
            .iter()
            .chain(&self.added)
            .chain(&self.removed)
            .cloned()
            .collect()
    }
}

/// A processor as registered for this build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorInfo {
    pub id: String,
    pub supports_incremental: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FullRebuildReason {
    Disabled,
    ManifestMissing,
    ManifestCorrupt,
    ManifestIncompatible { found: u32, expected: u32 },
    NonIncrementalProcessor(String),
    ProcessorSetChanged,
}

impl fmt::Display for FullRebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FullRebuildReason::Disabled => write!(f, "incremental processing is disabled"),
            FullRebuildReason::ManifestMissing => write!(f, "no previous dependency manifest"),
            FullRebuildReason::ManifestCorrupt => write!(f, "previous dependency manifest is corrupt"),
            FullRebuildReason::ManifestIncompatible { found, expected } => {
                write!(f, "manifest schema version {found} is not {expected}")
            }
            FullRebuildReason::NonIncrementalProcessor(id) => {
                write!(f, "processor `{id}` does not support incremental processing")
            }
            FullRebuildReason::ProcessorSetChanged => write!(f, "the set of processors changed"),
        }
    }
}

/// Work for an incremental build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilesToReprocess {
    pub files: BTreeSet<PathBuf>,
    /// Processors whose previous records and outputs are invalid.
    pub processors: BTreeSet<String>,
    /// Previous outputs that must be regenerated or deleted.
    pub stale_outputs: BTreeSet<PathBuf>,
    pub explanations: Vec<String>,
}

impl FilesToReprocess {
    /// Nothing to do; the previous outputs and manifest stand.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.processors.is_empty() && self.stale_outputs.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Full { reason: FullRebuildReason },
    Incremental(FilesToReprocess),
}

impl Plan {
    pub fn is_full(&self) -> bool {
        matches!(self, Plan::Full { .. })
    }

    /// One line per decision, for `--explain` style output and the incremental log.
    pub fn explain(&self) -> Vec<String> {
        match self {
            Plan::Full { reason } => vec![format!("full rebuild: {reason}")],
            Plan::Incremental(work) if work.is_empty() => vec!["nothing changed".to_string()],
            Plan::Incremental(work) => work.explanations.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct IncrementalPlanner {
    enabled: bool,
}

impl IncrementalPlanner {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    /// Plan the next build.
    ///
    /// `previous` is the outcome of loading the last manifest; load failures select a full rebuild.
    #[tracing::instrument(skip_all, fields(changed = changes.dirty_files().len()))]
    pub fn plan(
        &self,
        changes: &ChangedFiles,
        previous: Result<&DependencyManifest, &ManifestError>,
        processors: &[ProcessorInfo],
    ) -> Plan {
        if !self.enabled {
            return full(FullRebuildReason::Disabled);
        }
        let manifest = match previous {
            Ok(manifest) => manifest,
            Err(ManifestError::Missing { .. }) => return full(FullRebuildReason::ManifestMissing),
            Err(ManifestError::Incompatible { found, expected, .. }) => {
                return full(FullRebuildReason::ManifestIncompatible {
                    found: *found,
                    expected: *expected,
                });
            }
            Err(err) => {
                tracing::warn!(error = %err, "ignoring unusable dependency manifest");
                return full(FullRebuildReason::ManifestCorrupt);
            }
        };
        if let Some(p) = processors.iter().find(|p| !p.supports_incremental) {
            return full(FullRebuildReason::NonIncrementalProcessor(p.id.clone()));
        }
        let registered: BTreeSet<&str> = processors.iter().map(|p| p.id.as_str()).collect();
        let recorded: BTreeSet<&str> = manifest.processors.keys().map(String::as_str).collect();
        if registered != recorded {
            return full(FullRebuildReason::ProcessorSetChanged);
        }

        let work = stale_closure(changes, manifest);
        for line in &work.explanations {
            tracing::debug!("{line}");
        }
        tracing::info!(
            files = work.files.len(),
            stale_processors = work.processors.len(),
            stale_outputs = work.stale_outputs.len(),
            "incremental plan"
        );
        Plan::Incremental(work)
    }
}

fn full(reason: FullRebuildReason) -> Plan {
    tracing::info!(%reason, "full rebuild");
    Plan::Full { reason }
}

fn stale_closure(changes: &ChangedFiles, manifest: &DependencyManifest) -> FilesToReprocess {
    let mut dirty = changes.dirty_files();
    let anything_changed = !changes.is_empty();
    let mut work = FilesToReprocess::default();

    loop {
        let mut grew = false;

        for (id, record) in &manifest.processors {
            if work.processors.contains(id) {
                continue;
            }
            let why = if record.depends_on_all && anything_changed {
                Some("depends on all sources".to_string())
            } else if let Some(file) = record.consumed_files.iter().find(|f| dirty.contains(*f)) {
                Some(format!("read changed file {}", file.display()))
            } else {
                record
                    .consumed_symbols
                    .iter()
                    .find(|s| changes.changed_classes.contains(*s))
                    .map(|s| format!("read changed class {s}"))
            };
            if let Some(why) = why {
                work.explanations.push(format!("processor `{id}` is stale: {why}"));
                work.processors.insert(id.clone());
                grew = true;
            }
        }

        for (path, output) in &manifest.outputs {
            if work.stale_outputs.contains(path) {
                continue;
            }
            let why = if work.processors.contains(&output.processor) {
                Some(format!("its processor `{}` is stale", output.processor))
            } else if output.aggregating && anything_changed {
                Some("aggregating output and inputs changed".to_string())
            } else {
                output
                    .sources
                    .iter()
                    .find(|s| dirty.contains(*s))
                    .map(|s| format!("source {} changed", s.display()))
            };
            if let Some(why) = why {
                work.explanations.push(format!("output {} is stale: {why}", path.display()));
                work.stale_outputs.insert(path.clone());
                dirty.insert(path.clone());
                if work.processors.insert(output.processor.clone()) {
                    work.explanations
                        .push(format!("processor `{}` is stale: owns stale output {}", output.processor, path.display()));
                }
                grew = true;
            }
        }

        if !grew {
            break;
        }
    }

    let mut files: BTreeSet<PathBuf> = changes.modified.iter().chain(&changes.added).cloned().collect();
    for path in &work.stale_outputs {
        if let Some(output) = manifest.outputs.get(path) {
            files.extend(output.sources.iter().cloned());
        }
    }
    files.retain(|f| !changes.removed.contains(f) && !manifest.is_output(f));
    for file in &files {
        work.explanations.push(format!("reprocess {}", file.display()));
    }
    work.files = files;
    work
}

/// Write the plan's explanations to the incremental log.
pub fn write_log(path: &Path, plan: &Plan) -> io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let mut text = format!("symproc {}\n", crate::version::SYMPROC_VERSION);
    for line in plan.explain() {
        text.push_str(&line);
        text.push('\n');
    }
    fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deps::{OutputRecord, ProcessorRecord};

    fn paths(items: &[&str]) -> BTreeSet<PathBuf> {
        items.iter().map(PathBuf::from).collect()
    }

    fn info(ids: &[&str]) -> Vec<ProcessorInfo> {
        ids.iter()
            .map(|id| ProcessorInfo {
                id: id.to_string(),
                supports_incremental: true,
            })
            .collect()
    }

    /// P reads A and writes gen/AP.kt; Q reads B and writes gen/BQ.kt.
    fn two_processors() -> DependencyManifest {
        let mut manifest = DependencyManifest::default();
        manifest.inputs = paths(&["src/A.kt", "src/B.kt"]);
        for (id, input, output) in [("P", "src/A.kt", "gen/AP.kt"), ("Q", "src/B.kt", "gen/BQ.kt")] {
            manifest.processors.insert(
                id.to_string(),
                ProcessorRecord {
                    consumed_files: paths(&[input]),
                    supports_incremental: true,
                    ..ProcessorRecord::default()
                },
            );
            manifest.outputs.insert(
                PathBuf::from(output),
                OutputRecord {
                    processor: id.to_string(),
                    sources: paths(&[input]),
                    aggregating: false,
                    round: 1,
                },
            );
        }
        manifest
    }

    #[test]
    fn test_modifying_one_input_only_stales_its_reader() {
        let manifest = two_processors();
        let changes = ChangedFiles {
            modified: paths(&["src/A.kt"]),
            ..ChangedFiles::default()
        };
        let Plan::Incremental(work) = IncrementalPlanner::new(true).plan(&changes, Ok(&manifest), &info(&["P", "Q"]))
        else {
            panic!("expected incremental plan");
        };
        assert_eq!(work.files, paths(&["src/A.kt"]));
        assert_eq!(work.processors, ["P".to_string()].into_iter().collect());
        assert_eq!(work.stale_outputs, paths(&["gen/AP.kt"]));
    }

    #[test]
    fn test_no_changes_is_empty_plan() {
        let manifest = two_processors();
        let plan = IncrementalPlanner::new(true).plan(&ChangedFiles::default(), Ok(&manifest), &info(&["P", "Q"]));
        assert!(matches!(&plan, Plan::Incremental(work) if work.is_empty()));
        assert_eq!(plan.explain(), vec!["nothing changed".to_string()]);
    }

    #[test]
    fn test_full_rebuild_reasons() {
        let manifest = two_processors();
        let planner = IncrementalPlanner::new(true);
        let changes = ChangedFiles::default();

        assert_eq!(
            IncrementalPlanner::new(false).plan(&changes, Ok(&manifest), &info(&["P", "Q"])),
            Plan::Full { reason: FullRebuildReason::Disabled }
        );
        assert_eq!(
            planner.plan(&changes, Ok(&manifest), &info(&["P"])),
            Plan::Full { reason: FullRebuildReason::ProcessorSetChanged }
        );
        let missing = ManifestError::Missing {
            path: PathBuf::from("m.json"),
        };
        assert_eq!(
            planner.plan(&changes, Err(&missing), &info(&["P", "Q"])),
            Plan::Full { reason: FullRebuildReason::ManifestMissing }
        );
        let mut processors = info(&["P", "Q"]);
        processors[1].supports_incremental = false;
        assert_eq!(
            planner.plan(&changes, Ok(&manifest), &processors),
            Plan::Full {
                reason: FullRebuildReason::NonIncrementalProcessor("Q".to_string())
            }
        );
    }

    #[test]
    fn test_removed_input_is_not_reprocessed() {
        let manifest = two_processors();
        let changes = ChangedFiles {
            removed: paths(&["src/B.kt"]),
            ..ChangedFiles::default()
        };
        let Plan::Incremental(work) = IncrementalPlanner::new(true).plan(&changes, Ok(&manifest), &info(&["P", "Q"]))
        else {
            panic!("expected incremental plan");
        };
        assert!(work.files.is_empty());
        assert_eq!(work.stale_outputs, paths(&["gen/BQ.kt"]));
    }

    #[test]
    fn test_changed_class_stales_symbol_reader() {
        let mut manifest = two_processors();
        if let Some(record) = manifest.processors.get_mut("Q") {
            record.consumed_symbols.insert("lib.Base".to_string());
        }
        let changes = ChangedFiles {
            changed_classes: ["lib.Base".to_string()].into_iter().collect(),
            ..ChangedFiles::default()
        };
        let Plan::Incremental(work) = IncrementalPlanner::new(true).plan(&changes, Ok(&manifest), &info(&["P", "Q"]))
        else {
            panic!("expected incremental plan");
        };
        assert_eq!(work.processors, ["Q".to_string()].into_iter().collect());
        assert_eq!(work.files, paths(&["src/B.kt"]));
    }
}

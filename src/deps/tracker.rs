use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::{Dependencies, DependencyManifest, OutputRecord, ProcessorRecord};

/// Reads made by one processor since the buffer was last drained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadSet {
    pub files: BTreeSet<PathBuf>,
    pub symbols: BTreeSet<String>,
    pub all: bool,
}

impl ReadSet {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.symbols.is_empty() && !self.all
    }
}

/// Per-processor read log, shared with the processor's resolver view.
#[derive(Debug, Default)]
pub struct ReadBuffer {
    reads: Mutex<ReadSet>,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_file(&self, path: &Path) {
        let mut reads = self.reads.lock().unwrap_or_else(PoisonError::into_inner);
        if !reads.files.contains(path) {
            reads.files.insert(path.to_path_buf());
        }
    }

    pub fn record_symbol(&self, qualified_name: &str) {
        let mut reads = self.reads.lock().unwrap_or_else(PoisonError::into_inner);
        if !reads.symbols.contains(qualified_name) {
            reads.symbols.insert(qualified_name.to_string());
        }
    }

    /// The processor looked at the whole compilation (e.g. listed all files).
    pub fn mark_all(&self) {
        self.reads.lock().unwrap_or_else(PoisonError::into_inner).all = true;
    }

    /// Drain the buffer.
    pub fn take(&self) -> ReadSet {
        mem::take(&mut *self.reads.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

struct PendingOutput {
    processor: String,
    dependencies: Dependencies,
    round: u32,
}

/// Accumulates reads and outputs over a build and turns them into a [`DependencyManifest`].
#[derive(Default)]
pub struct DependencyTracker {
    processors: BTreeMap<String, ProcessorRecord>,
    outputs: BTreeMap<PathBuf, PendingOutput>,
    inputs: BTreeSet<PathBuf>,
    carried: Option<DependencyManifest>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_processor(&mut self, processor: &str, supports_incremental: bool) {
        self.processors
            .entry(processor.to_string())
            .or_insert_with(ProcessorRecord::default)
            .supports_incremental = supports_incremental;
    }

    fn entry(&mut self, processor: &str) -> &mut ProcessorRecord {
        self.processors.entry(processor.to_string()).or_default()
    }

    pub fn record(&mut self, processor: &str, file: &Path) {
        self.entry(processor).consumed_files.insert(file.to_path_buf());
    }

    pub fn record_symbol(&mut self, processor: &str, qualified_name: &str) {
        self.entry(processor).consumed_symbols.insert(qualified_name.to_string());
    }

    pub fn mark_depends_on_all(&mut self, processor: &str) {
        self.entry(processor).depends_on_all = true;
    }

    /// Fold a drained [`ReadBuffer`] into `processor`'s record.
    pub fn merge(&mut self, processor: &str, reads: ReadSet) {
        let record = self.entry(processor);
        record.consumed_files.extend(reads.files);
        record.consumed_symbols.extend(reads.symbols);
        record.depends_on_all |= reads.all;
    }

    /// A source file present in the compilation.
    pub fn record_input(&mut self, path: &Path) {
        self.inputs.insert(path.to_path_buf());
    }

    pub fn record_output(&mut self, path: &Path, processor: &str, dependencies: &Dependencies, round: u32) {
        if dependencies.all_sources {
            self.mark_depends_on_all(processor);
        }
        self.outputs.insert(
            path.to_path_buf(),
            PendingOutput {
                processor: processor.to_string(),
                dependencies: dependencies.clone(),
                round,
            },
        );
    }

    /// Keep the records and outputs of processors not in `stale` from a previous manifest.
    ///
    /// Outputs regenerated in this build replace carried outputs with the same path.
    pub fn carry_over(&mut self, previous: &DependencyManifest, stale: &BTreeSet<String>) {
        let mut carried = DependencyManifest::default();
        for (id, record) in &previous.processors {
            if !stale.contains(id) {
                carried.processors.insert(id.clone(), record.clone());
            }
        }
        for (path, record) in &previous.outputs {
            if !stale.contains(&record.processor) {
                carried.outputs.insert(path.clone(), record.clone());
            }
        }
        tracing::debug!(
            processors = carried.processors.len(),
            outputs = carried.outputs.len(),
            "carrying over dependency records"
        );
        self.carried = Some(carried);
    }

    /// The manifest for this build. `all_sources` outputs list every input seen.
    pub fn build_manifest(&self) -> DependencyManifest {
        let mut manifest = self.carried.clone().unwrap_or_default();
        manifest.inputs = self.inputs.clone();
        for (id, record) in &self.processors {
            // A carried processor only saw the reprocessed files this time; keep what it read before.
            manifest
                .processors
                .entry(id.clone())
                .and_modify(|carried| {
                    carried.consumed_files.extend(record.consumed_files.iter().cloned());
                    carried.consumed_symbols.extend(record.consumed_symbols.iter().cloned());
                    carried.depends_on_all |= record.depends_on_all;
                    carried.supports_incremental = record.supports_incremental;
                })
                .or_insert_with(|| record.clone());
        }
        for (path, pending) in &self.outputs {
            let sources = if pending.dependencies.all_sources {
                self.inputs.clone()
            } else {
                pending.dependencies.sources.clone()
            };
            manifest.outputs.insert(
                path.clone(),
                OutputRecord {
                    processor: pending.processor.clone(),
                    sources,
                    aggregating: pending.dependencies.aggregating,
                    round: pending.round,
                },
            );
        }
        manifest
    }
}

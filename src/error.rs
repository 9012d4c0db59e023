//! Fatal build errors.
//!
//! Everything recoverable (unresolved names, deferred symbols, processor warnings) is reported through the
//! build report instead. A `BuildError` means nothing was committed, except where noted.

use std::io;
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::config::ConfigError;
use crate::deps::ManifestError;
use crate::frontend::FrontendError;
use crate::frontend::snapshot::SnapshotError;
use crate::processing::ProcessorError;
use crate::symbols::FacadeError;

#[derive(Debug, Error, Diagnostic)]
pub enum BuildError {
    #[error("processor `{processor}` failed: {source}")]
    #[diagnostic(code(symproc::processor_failed))]
    Processor {
        processor: String,
        #[source]
        source: ProcessorError,
    },

    #[error("internal inconsistency: {0}")]
    #[diagnostic(
        code(symproc::internal_inconsistency),
        help("the compilation changed while the build was running")
    )]
    InternalInconsistency(String),

    #[error("invalid output `{}` from `{processor}`: {reason}", path.display())]
    #[diagnostic(code(symproc::invalid_output))]
    InvalidOutput {
        path: PathBuf,
        processor: String,
        reason: String,
    },

    #[error("processing did not converge after {rounds} rounds ({deferred} deferred symbols)")]
    #[diagnostic(
        code(symproc::non_convergence),
        help("raise max_rounds, or check which processor keeps deferring")
    )]
    NonConvergence { rounds: u32, deferred: usize },

    #[error("dependency cycle between outputs: {}", display_chain(cycle))]
    #[diagnostic(code(symproc::dependency_cycle))]
    DependencyCycle { cycle: Vec<PathBuf> },

    #[error("processor id `{0}` is registered twice")]
    #[diagnostic(code(symproc::duplicate_processor))]
    DuplicateProcessor(String),

    #[error("build cancelled before round {round}")]
    #[diagnostic(code(symproc::cancelled))]
    Cancelled { round: u32 },

    #[error("cannot write {}: {source}", path.display())]
    #[diagnostic(code(symproc::io))]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(symproc::manifest))]
    Manifest(#[from] ManifestError),

    #[error("front-end rejected generated file: {0}")]
    #[diagnostic(code(symproc::frontend))]
    Frontend(#[from] FrontendError),

    #[error(transparent)]
    #[diagnostic(code(symproc::snapshot))]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    #[diagnostic(code(symproc::config))]
    Config(#[from] ConfigError),
}

impl From<FacadeError> for BuildError {
    fn from(err: FacadeError) -> Self {
        BuildError::InternalInconsistency(err.to_string())
    }
}

impl BuildError {
    /// Wrap a processor failure, surfacing vanished handles as internal inconsistencies.
    pub fn from_processor(processor: &str, err: ProcessorError) -> Self {
        match err {
            ProcessorError::Facade(facade) => facade.into(),
            other => BuildError::Processor {
                processor: processor.to_string(),
                source: other,
            },
        }
    }
}

fn display_chain(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

//! Round orchestration: drive registered processors over rounds until nothing new is generated.
//!
//! ## Round lifecycle
//!
//! `Idle → RoundRunning(1) → RoundFinishing(1) → RoundRunning(2) → … → Done | Failed`
//!
//! 1. Every processor sees the top-level declarations of files new this round plus the symbols it deferred.
//! 2. At round end outputs are validated and staged, new files are fed to the front-end, read buffers are
//!    merged into the dependency tracker and the deferred sets are compared.
//! 3. Processing stops when a round generates no files and leaves the deferred set unchanged.
//!
//! Nothing touches the output directory before the build commits.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod diagnostics;
mod orchestrator;
mod output;
mod processor;
mod resolver;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::deps::DependencyManifest;
use crate::incremental::Plan;
use crate::symbols::Symbol;

pub use diagnostics::{Diagnostic, Logger, Severity};
pub use orchestrator::Orchestrator;
pub use output::validate_output_path;
pub use processor::{
    Deferral, FinishContext, GeneratedFile, ProcessOutput, ProcessorError, RoundContext, SymbolProcessor,
};
pub use resolver::Resolver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    Idle,
    RoundRunning(u32),
    RoundFinishing(u32),
    Done,
    Failed,
}

impl fmt::Display for RoundState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundState::Idle => write!(f, "idle"),
            RoundState::RoundRunning(round) => write!(f, "round {round} running"),
            RoundState::RoundFinishing(round) => write!(f, "round {round} finishing"),
            RoundState::Done => write!(f, "done"),
            RoundState::Failed => write!(f, "failed"),
        }
    }
}

/// A symbol a processor could not handle by the end of processing.
#[derive(Debug, Clone)]
pub struct DeferredSymbol {
    pub processor: String,
    pub symbol: Symbol,
    pub reason: String,
    /// Round in which it was first deferred.
    pub round: u32,
}

/// Cooperative cancellation, checked between rounds.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    Succeeded,
    Failed,
}

/// Outcome of a build that ran to completion (successfully or not).
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub status: BuildStatus,
    pub plan: Plan,
    pub rounds: u32,
    /// Files written under the output directory.
    pub generated: Vec<PathBuf>,
    /// Stale outputs deleted.
    pub removed: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
    /// Symbols still deferred when processing stopped.
    pub unresolved: Vec<DeferredSymbol>,
    pub manifest: DependencyManifest,
    /// Whether outputs and manifest were written.
    pub committed: bool,
}

impl BuildReport {
    pub fn succeeded(&self) -> bool {
        self.status == BuildStatus::Succeeded
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancellation_is_shared_between_clones() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(RoundState::RoundRunning(2).to_string(), "round 2 running");
        assert_eq!(RoundState::Failed.to_string(), "failed");
    }
}

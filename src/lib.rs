#![forbid(unsafe_code)]
//! Symbol processing engine
//!
//! `symproc` runs source-generating processors over a compilation in rounds. Processors see a stable symbol
//! façade over whatever front-end produced the compilation, resolve types through it, and emit new files that
//! are fed back into the next round until nothing new appears. Every read is recorded so the next build can
//! reprocess only what a change actually reaches.
//!
//! - `frontend` - the contract a front-end implements, plus an in-memory reference front-end
//! - `symbols` - interned symbols with lazily computed properties
//! - `types` - type references, resolution, substitution and assignability
//! - `processing` - processor trait, round orchestration, diagnostics and output staging
//! - `deps` / `incremental` - read tracking, the dependency manifest and rebuild planning
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli`, `processing` and
//!   `incremental` modules enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **Poisoned locks**: caches recover the inner value with `PoisonError::into_inner`; a panicking processor
//!   must not wedge the rest of the build.

pub mod cli;
pub mod config;
pub mod deps;
pub mod error;
pub mod frontend;
pub mod incremental;
pub mod processing;
pub mod processors;
pub mod session;
pub mod symbols;
pub mod types;
pub mod version;

pub use config::ProcessingConfig;
pub use error::BuildError;
pub use frontend::{CompilationSnapshot, Frontend, MemoryFrontend};
pub use incremental::{ChangedFiles, IncrementalPlanner, Plan};
pub use processing::{BuildReport, BuildStatus, ProcessOutput, RoundContext, SymbolProcessor};
pub use session::BuildSession;
pub use symbols::{Symbol, SymbolFacade, SymbolKind};
pub use types::{Type, TypeResolver};

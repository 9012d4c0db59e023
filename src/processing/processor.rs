use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;

use symproc_core::QualifiedName;

use crate::deps::Dependencies;
use crate::frontend::DeclStub;
use crate::symbols::{FacadeError, Symbol};

use super::diagnostics::Logger;
use super::resolver::Resolver;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("{0}")]
    Message(String),
    #[error(transparent)]
    Facade(#[from] FacadeError),
}

impl ProcessorError {
    pub fn msg(message: impl Into<String>) -> Self {
        ProcessorError::Message(message.into())
    }
}

/// A third-party processor.
///
/// Processors are driven in registration order. `process` runs once per round; `finish` once after the last
/// round; `on_error` instead of further calls when the build fails.
pub trait SymbolProcessor: Send {
    fn id(&self) -> &str;

    /// Whether the processor's reads fully describe its inputs.
    fn supports_incremental(&self) -> bool {
        true
    }

    fn process(&mut self, ctx: &RoundContext<'_>) -> Result<ProcessOutput, ProcessorError>;

    /// Files returned here are committed but never presented to another round.
    fn finish(&mut self, _ctx: &FinishContext<'_>) -> Result<Vec<GeneratedFile>, ProcessorError> {
        Ok(Vec::new())
    }

    fn on_error(&mut self) {}
}

/// A symbol the processor could not handle yet.
#[derive(Debug, Clone)]
pub struct Deferral {
    pub symbol: Symbol,
    pub reason: String,
}

/// Result of one `process` call.
#[derive(Debug, Default)]
pub struct ProcessOutput {
    pub files: Vec<GeneratedFile>,
    pub deferred: Vec<Deferral>,
}

impl ProcessOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, file: GeneratedFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn defer(&mut self, symbol: Symbol, reason: impl Into<String>) {
        self.deferred.push(Deferral {
            symbol,
            reason: reason.into(),
        });
    }
}

/// A file produced by a processor.
///
/// `path` is relative to the output directory. `declarations` describe the file's contents to the front-end
/// so later rounds can see the new symbols.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedFile {
    pub path: PathBuf,
    pub package: QualifiedName,
    pub contents: String,
    pub imports: Vec<QualifiedName>,
    pub declarations: Vec<DeclStub>,
    pub dependencies: Dependencies,
}

impl GeneratedFile {
    pub fn new(path: impl Into<PathBuf>, package: impl Into<QualifiedName>, dependencies: Dependencies) -> Self {
        Self {
            path: path.into(),
            package: package.into(),
            contents: String::new(),
            imports: Vec::new(),
            declarations: Vec::new(),
            dependencies,
        }
    }

    pub fn with_contents(mut self, contents: impl Into<String>) -> Self {
        self.contents = contents.into();
        self
    }

    pub fn with_import(mut self, import: impl Into<QualifiedName>) -> Self {
        self.imports.push(import.into());
        self
    }

    pub fn with_declaration(mut self, declaration: DeclStub) -> Self {
        self.declarations.push(declaration);
        self
    }
}

/// What a processor sees during one round.
pub struct RoundContext<'a> {
    pub round: u32,
    /// Top-level declarations of files new this round, then this processor's deferred symbols.
    pub symbols: &'a [Symbol],
    pub resolver: &'a Resolver,
    pub options: &'a BTreeMap<String, String>,
    pub logger: &'a Logger,
}

impl RoundContext<'_> {
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

/// What a processor sees in `finish`.
pub struct FinishContext<'a> {
    /// Rounds run before `finish`.
    pub rounds: u32,
    pub resolver: &'a Resolver,
    pub options: &'a BTreeMap<String, String>,
    pub logger: &'a Logger,
}

impl FinishContext<'_> {
    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }
}

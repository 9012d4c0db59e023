//! Front-end capability interface.
//!
//! The engine never talks to a concrete compiler. Everything it needs from the underlying front-end (files,
//! declarations, type-name lookup, diagnostics, and the incremental-add mechanism for generated code) goes
//! through the [`Frontend`] trait. One adapter exists per underlying front-end; [`MemoryFrontend`] is the
//! reference adapter used by the CLI (fed from a [`CompilationSnapshot`]) and by tests.
//!
//! ## Notes
//!
//! - Native handles ([`FileHandle`], [`DeclHandle`]) are opaque and only meaningful to the adapter that issued
//!   them. A handle that no longer resolves mid-build is an internal inconsistency.
//! - Native data is returned by value (snapshots). The symbol façade caches what it needs.

pub mod memory;
pub mod snapshot;
pub mod stub;
pub mod typeref;

use std::path::PathBuf;

use thiserror::Error;

use symproc_core::{ClassKind, ModifierId, Nullability, Origin, QualifiedName, Variance};

pub use memory::MemoryFrontend;
pub use snapshot::CompilationSnapshot;
pub use stub::{DeclStub, DeclStubKind, FileStub, ParamStub, TypeParamStub};
pub use typeref::{NativeTypeArg, NativeTypeRef, TypeRefParseError};

/// Opaque handle to a file known to the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileHandle(pub u32);

/// Opaque handle to a declaration known to the front-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclHandle(pub u32);

/// A file as seen by the front-end.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeFile {
    pub handle: FileHandle,
    pub path: PathBuf,
    pub package: QualifiedName,
    pub origin: Origin,
    pub imports: Vec<QualifiedName>,
    /// Top-level declarations, in source order.
    pub declarations: Vec<DeclHandle>,
}

/// A declaration as seen by the front-end.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeDecl {
    pub handle: DeclHandle,
    pub name: String,
    pub qualified_name: QualifiedName,
    pub file: Option<FileHandle>,
    pub parent: Option<DeclHandle>,
    pub origin: Origin,
    pub modifiers: Vec<ModifierId>,
    pub annotations: Vec<NativeAnnotation>,
    /// Nested declarations (class members), in source order.
    pub members: Vec<DeclHandle>,
    pub type_parameters: Vec<DeclHandle>,
    pub kind: NativeDeclKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NativeDeclKind {
    Class {
        kind: ClassKind,
        super_types: Vec<NativeTypeRef>,
    },
    Function {
        return_type: Option<NativeTypeRef>,
        receiver: Option<NativeTypeRef>,
        parameters: Vec<DeclHandle>,
    },
    Property {
        ty: NativeTypeRef,
        mutable: bool,
    },
    TypeParameter {
        variance: Variance,
        bounds: Vec<NativeTypeRef>,
        reified: bool,
    },
    ValueParameter {
        ty: NativeTypeRef,
        has_default: bool,
    },
    TypeAlias {
        target: NativeTypeRef,
    },
}

/// An annotation usage attached to a declaration or type reference.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NativeAnnotation {
    /// Annotation class name as written (simple or qualified); resolved in the annotated declaration's scope.
    pub name: String,
    /// Arguments in declaration order.
    #[serde(default)]
    pub arguments: indexmap::IndexMap<String, NativeValue>,
}

impl NativeAnnotation {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: indexmap::IndexMap::new(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: NativeValue) -> Self {
        self.arguments.insert(name.into(), value);
        self
    }
}

/// A constant value in an annotation argument.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    Class(NativeTypeRef),
    EnumConstant { enum_type: String, entry: String },
    Annotation(Box<NativeAnnotation>),
    Array(Vec<NativeValue>),
}

/// Outcome of looking a type name up in a declaration's scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameResolution {
    /// A class-like declaration or a type alias.
    Declaration(DeclHandle),
    TypeParameter(DeclHandle),
    Unresolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FrontendSeverity {
    Warning,
    Error,
}

/// A diagnostic reported by the front-end itself (not by a processor).
#[derive(Debug, Clone, PartialEq)]
pub struct FrontendDiagnostic {
    pub severity: FrontendSeverity,
    pub message: String,
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FrontendError {
    #[error("file '{}' is already part of the compilation", .0.display())]
    DuplicateFile(PathBuf),

    #[error("'{name}' is already declared in '{}'", .existing.display())]
    Redeclaration { name: QualifiedName, existing: PathBuf },

    #[error("invalid declaration in '{}': {message}", .file.display())]
    InvalidDeclaration { file: PathBuf, message: String },
}

/// Capability interface over one underlying front-end.
///
/// Implementations must be safe to query from several processor threads at once; `add_file` is only called
/// between rounds.
pub trait Frontend: Send + Sync {
    /// Adapter name, for logs.
    fn name(&self) -> &str;

    /// All files of the compilation, including files added by earlier rounds.
    fn files(&self) -> Vec<FileHandle>;

    fn file(&self, handle: FileHandle) -> Option<NativeFile>;

    /// `None` means the handle vanished.
    fn declaration(&self, handle: DeclHandle) -> Option<NativeDecl>;

    /// Look a type name up as written inside `scope`.
    ///
    /// Order: type parameters and nested classes of enclosing declarations (innermost first), exact qualified
    /// name, same package, explicit imports, default packages.
    fn resolve_type_name(&self, scope: DeclHandle, name: &str) -> NameResolution;

    fn class_by_name(&self, name: &QualifiedName) -> Option<DeclHandle>;

    /// Feed a generated file back into the compilation.
    fn add_file(&self, stub: FileStub) -> Result<FileHandle, FrontendError>;

    fn diagnostics(&self) -> Vec<FrontendDiagnostic>;
}

//! Symbol façade: stable, immutable symbol objects over native declarations.
//!
//! A [`Symbol`] is an `Arc`-shared [`SymbolNode`]. Nodes are created by the [`SymbolFacade`] from a snapshot of
//! the native declaration and never mutated afterwards; lazily populated properties live in compute-once
//! [`Lazy`] cells that the façade fills on first access.
//!
//! ## Ownership
//!
//! - A file symbol owns its declarations (through its `members` cell), and a class owns its members.
//! - Every other link is a non-owning lookup: parents are stored as native handles and resolved through the
//!   façade cache; types refer to declarations through the type resolver's cache, not the symbol.
//!
//! ## Identity
//!
//! Symbols compare and hash by [`SymbolIdentity`]: kind, qualified name, owning file, origin, sibling
//! ordinal and the ordinals of the enclosing declarations. Identity is stable across rounds and, for unchanged declarations, across builds.

mod annotation;
mod facade;
mod lazy;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use symproc_core::modifiers::{self, ModifierId, Visibility};
use symproc_core::{ClassKind, Origin, QualifiedName, Variance};

use crate::frontend::{DeclHandle, FileHandle, NativeDecl, NativeDeclKind};
use crate::types::TypeReference;

pub use annotation::{Annotation, AnnotationValue};
pub use facade::{FacadeError, SymbolFacade};
pub use lazy::Lazy;

/// Shared handle to an immutable symbol.
pub type Symbol = Arc<SymbolNode>;

/// The symbol variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolKind {
    Class(ClassKind),
    Function,
    Property,
    TypeParameter,
    ValueParameter,
    TypeAlias,
    File,
    /// Sentinel for an unresolved declaration.
    Error,
}

impl SymbolKind {
    pub fn is_class(self) -> bool {
        matches!(self, SymbolKind::Class(_))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Class(kind) => kind.as_str(),
            SymbolKind::Function => "function",
            SymbolKind::Property => "property",
            SymbolKind::TypeParameter => "type_parameter",
            SymbolKind::ValueParameter => "value_parameter",
            SymbolKind::TypeAlias => "type_alias",
            SymbolKind::File => "file",
            SymbolKind::Error => "error",
        }
    }
}

/// Stable identity of a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolIdentity {
    pub kind: SymbolKind,
    pub qualified_name: QualifiedName,
    pub file: Option<PathBuf>,
    pub origin: Origin,
    /// Position among same-named, same-kind siblings (overloads).
    pub ordinal: u32,
    /// Ordinals of the enclosing declarations, outermost first. Parameters of two overloads differ here.
    pub owner_ordinals: Vec<u32>,
}

/// What native entity a symbol stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolHandle {
    Decl(DeclHandle),
    File(FileHandle),
    Error,
}

/// An immutable symbol. Obtain instances from [`SymbolFacade`].
pub struct SymbolNode {
    identity: SymbolIdentity,
    name: String,
    package: QualifiedName,
    handle: SymbolHandle,
    parent: Option<DeclHandle>,
    file_handle: Option<FileHandle>,
    modifiers: Vec<ModifierId>,
    native: Option<NativeDecl>,

    pub(crate) members: Lazy<Result<Arc<[Symbol]>, FacadeError>>,
    pub(crate) type_parameters: Lazy<Result<Arc<[Symbol]>, FacadeError>>,
    pub(crate) parameters: Lazy<Result<Arc<[Symbol]>, FacadeError>>,
    pub(crate) super_types: Lazy<Arc<[TypeReference]>>,
    pub(crate) bounds: Lazy<Arc<[TypeReference]>>,
    pub(crate) annotations: Lazy<Arc<[Annotation]>>,
    pub(crate) type_ref: Lazy<Option<TypeReference>>,
}

impl SymbolNode {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        identity: SymbolIdentity,
        name: String,
        package: QualifiedName,
        handle: SymbolHandle,
        parent: Option<DeclHandle>,
        file_handle: Option<FileHandle>,
        modifiers: Vec<ModifierId>,
        native: Option<NativeDecl>,
    ) -> Self {
        Self {
            identity,
            name,
            package,
            handle,
            parent,
            file_handle,
            modifiers,
            native,
            members: Lazy::new(),
            type_parameters: Lazy::new(),
            parameters: Lazy::new(),
            super_types: Lazy::new(),
            bounds: Lazy::new(),
            annotations: Lazy::new(),
            type_ref: Lazy::new(),
        }
    }

    pub fn identity(&self) -> &SymbolIdentity {
        &self.identity
    }

    pub fn kind(&self) -> SymbolKind {
        self.identity.kind
    }

    /// Simple name (`Foo` for `com.example.Foo`). For files, the file name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn qualified_name(&self) -> &QualifiedName {
        &self.identity.qualified_name
    }

    /// Package of the declaration (for files, the file's package).
    pub fn package_name(&self) -> &QualifiedName {
        &self.package
    }

    pub fn origin(&self) -> Origin {
        self.identity.origin
    }

    pub fn handle(&self) -> SymbolHandle {
        self.handle
    }

    pub fn decl_handle(&self) -> Option<DeclHandle> {
        match self.handle {
            SymbolHandle::Decl(h) => Some(h),
            _ => None,
        }
    }

    /// Native handle of the enclosing declaration. Resolve it with [`SymbolFacade::parent`].
    pub fn parent_handle(&self) -> Option<DeclHandle> {
        self.parent
    }

    pub(crate) fn file_handle(&self) -> Option<FileHandle> {
        self.file_handle
    }

    /// Path of the owning file, if the symbol lives in one.
    pub fn file_path(&self) -> Option<&Path> {
        self.identity.file.as_deref()
    }

    pub fn modifiers(&self) -> &[ModifierId] {
        &self.modifiers
    }

    pub fn has_modifier(&self, modifier: ModifierId) -> bool {
        self.modifiers.contains(&modifier)
    }

    pub fn visibility(&self) -> Visibility {
        modifiers::visibility_of(&self.modifiers)
    }

    /// Whether the declaration can be subclassed or overridden.
    pub fn is_open(&self) -> bool {
        matches!(self.kind(), SymbolKind::Class(ClassKind::Interface))
            || self.has_modifier(ModifierId::Open)
            || self.has_modifier(ModifierId::Abstract)
            || self.has_modifier(ModifierId::Sealed)
            || (self.origin().is_foreign() && !self.has_modifier(ModifierId::Final))
    }

    pub fn is_abstract(&self) -> bool {
        self.has_modifier(ModifierId::Abstract) || matches!(self.kind(), SymbolKind::Class(ClassKind::Interface))
    }

    pub fn is_error(&self) -> bool {
        self.kind() == SymbolKind::Error
    }

    pub(crate) fn native(&self) -> Option<&NativeDecl> {
        self.native.as_ref()
    }

    /// Declaration-site variance of a type parameter; `Invariant` for everything else.
    pub fn variance(&self) -> Variance {
        match self.native.as_ref().map(|n| &n.kind) {
            Some(NativeDeclKind::TypeParameter { variance, .. }) => *variance,
            _ => Variance::Invariant,
        }
    }

    pub fn is_reified(&self) -> bool {
        matches!(
            self.native.as_ref().map(|n| &n.kind),
            Some(NativeDeclKind::TypeParameter { reified: true, .. })
        ) || self.has_modifier(ModifierId::Reified)
    }

    /// Whether a property is declared mutable.
    pub fn is_mutable(&self) -> bool {
        matches!(
            self.native.as_ref().map(|n| &n.kind),
            Some(NativeDeclKind::Property { mutable: true, .. })
        )
    }

    /// Whether a value parameter declares a default value.
    pub fn has_default(&self) -> bool {
        matches!(
            self.native.as_ref().map(|n| &n.kind),
            Some(NativeDeclKind::ValueParameter { has_default: true, .. })
        )
    }
}

impl PartialEq for SymbolNode {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for SymbolNode {}

impl Hash for SymbolNode {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl fmt::Debug for SymbolNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Symbol")
            .field("kind", &self.identity.kind)
            .field("name", &self.identity.qualified_name.as_str())
            .field("origin", &self.identity.origin)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for SymbolNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            SymbolKind::File => write!(f, "file {}", self.name),
            SymbolKind::Error => write!(f, "<error: {}>", self.identity.qualified_name),
            kind => write!(f, "{} {}", kind.as_str(), self.identity.qualified_name),
        }
    }
}

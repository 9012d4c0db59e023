//! Type references, resolved types and the type resolver.
//!
//! A [`TypeReference`] is a native reference plus the declaration scope it was written in. The
//! [`TypeResolver`] turns it into a [`Type`] on first request and memoizes the result per reference identity.
//!
//! ## Equality
//!
//! Types compare structurally: same declaration, same substituted arguments, same nullability. Type aliases
//! are expanded before comparison; the alias form is kept on the [`Type`] for display only. Annotations on
//! the reference never take part in equality.

mod resolver;
mod substitution;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use symproc_core::{Nullability, Variance};

use crate::frontend::{DeclHandle, NativeTypeRef};
use crate::symbols::{Symbol, SymbolKind};

pub use resolver::{FunctionSignature, TypeResolver};
pub use substitution::Substitution;

/// Identity of a [`TypeReference`] within one build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RefId(pub u64);

/// An unresolved type reference and the scope it appears in.
#[derive(Debug, Clone)]
pub struct TypeReference {
    id: RefId,
    native: Arc<NativeTypeRef>,
    scope: DeclHandle,
}

impl TypeReference {
    pub(crate) fn new(id: RefId, native: NativeTypeRef, scope: DeclHandle) -> Self {
        Self {
            id,
            native: Arc::new(native),
            scope,
        }
    }

    pub fn id(&self) -> RefId {
        self.id
    }

    /// The reference as written.
    pub fn native(&self) -> &NativeTypeRef {
        &self.native
    }

    pub fn scope(&self) -> DeclHandle {
        self.scope
    }
}

/// References are the same reference, not merely equal text.
impl PartialEq for TypeReference {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// How platform (flexible) nullability from a foreign type system surfaces in resolved types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullabilityPolicy {
    /// Keep platform nullability as its own state.
    #[default]
    Flexible,
    /// Treat platform types as nullable.
    AssumeNullable,
    /// Treat platform types as not-null.
    AssumeNotNull,
}

impl NullabilityPolicy {
    pub fn apply(self, nullability: Nullability) -> Nullability {
        match (self, nullability) {
            (NullabilityPolicy::AssumeNullable, Nullability::Platform) => Nullability::Nullable,
            (NullabilityPolicy::AssumeNotNull, Nullability::Platform) => Nullability::NotNull,
            (_, n) => n,
        }
    }
}

/// A type argument. `ty == None` is the star projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeArgument {
    pub variance: Variance,
    pub ty: Option<Type>,
}

impl TypeArgument {
    pub fn invariant(ty: Type) -> Self {
        Self {
            variance: Variance::Invariant,
            ty: Some(ty),
        }
    }

    pub fn projected(variance: Variance, ty: Type) -> Self {
        if variance == Variance::Star {
            return Self::star();
        }
        Self { variance, ty: Some(ty) }
    }

    pub fn star() -> Self {
        Self {
            variance: Variance::Star,
            ty: None,
        }
    }

    pub fn is_star(&self) -> bool {
        self.ty.is_none()
    }
}

/// The unexpanded alias a type was written as.
#[derive(Debug, Clone)]
pub struct AliasForm {
    pub alias: Symbol,
    pub arguments: Vec<TypeArgument>,
}

/// A resolved type.
#[derive(Debug, Clone)]
pub struct Type {
    declaration: Symbol,
    arguments: Vec<TypeArgument>,
    nullability: Nullability,
    alias: Option<Box<AliasForm>>,
}

impl Type {
    pub fn new(declaration: Symbol, arguments: Vec<TypeArgument>, nullability: Nullability) -> Self {
        Self {
            declaration,
            arguments,
            nullability,
            alias: None,
        }
    }

    /// Error type around an error symbol.
    pub fn error(symbol: Symbol) -> Self {
        Self::new(symbol, Vec::new(), Nullability::NotNull)
    }

    pub(crate) fn with_alias(mut self, alias: AliasForm) -> Self {
        self.alias = Some(Box::new(alias));
        self
    }

    pub fn declaration(&self) -> &Symbol {
        &self.declaration
    }

    pub fn arguments(&self) -> &[TypeArgument] {
        &self.arguments
    }

    pub fn nullability(&self) -> Nullability {
        self.nullability
    }

    pub fn alias(&self) -> Option<&AliasForm> {
        self.alias.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.declaration.is_error()
    }

    pub fn is_marked_nullable(&self) -> bool {
        self.nullability == Nullability::Nullable
    }

    pub fn is_type_parameter(&self) -> bool {
        self.declaration.kind() == SymbolKind::TypeParameter
    }

    pub fn make_nullable(&self) -> Type {
        self.with_nullability(Nullability::Nullable)
    }

    pub fn make_not_nullable(&self) -> Type {
        self.with_nullability(Nullability::NotNull)
    }

    pub fn with_nullability(&self, nullability: Nullability) -> Type {
        let mut ty = self.clone();
        ty.nullability = nullability;
        ty
    }

    /// The same declaration with every argument replaced by `*`.
    pub fn star_projection(&self) -> Type {
        Type {
            declaration: Arc::clone(&self.declaration),
            arguments: self.arguments.iter().map(|_| TypeArgument::star()).collect(),
            nullability: self.nullability,
            alias: None,
        }
    }

    /// The same declaration with different arguments. The alias form is dropped.
    ///
    /// ## Returns
    /// - `None` when the argument count differs from the current one.
    pub fn replace(&self, arguments: Vec<TypeArgument>) -> Option<Type> {
        if arguments.len() != self.arguments.len() {
            return None;
        }
        Some(Type {
            declaration: Arc::clone(&self.declaration),
            arguments,
            nullability: self.nullability,
            alias: None,
        })
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        self.declaration == other.declaration
            && self.nullability == other.nullability
            && self.arguments == other.arguments
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.declaration.hash(state);
        self.nullability.hash(state);
        self.arguments.hash(state);
    }
}

fn write_arguments(f: &mut fmt::Formatter<'_>, arguments: &[TypeArgument]) -> fmt::Result {
    if arguments.is_empty() {
        return Ok(());
    }
    f.write_str("<")?;
    for (i, arg) in arguments.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        match &arg.ty {
            None => f.write_str("*")?,
            Some(ty) => write!(f, "{}{}", arg.variance.label(), ty)?,
        }
    }
    f.write_str(">")
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_error() {
            return write!(f, "<ERROR TYPE: {}>", self.declaration.name());
        }
        match &self.alias {
            Some(alias) => {
                f.write_str(alias.alias.name())?;
                write_arguments(f, &alias.arguments)?;
            }
            None => {
                f.write_str(self.declaration.name())?;
                write_arguments(f, &self.arguments)?;
            }
        }
        f.write_str(self.nullability.suffix())
    }
}

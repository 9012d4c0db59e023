use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use symproc_core::{Origin, QualifiedName};

use crate::frontend::{
    DeclHandle, FileHandle, Frontend, NameResolution, NativeAnnotation, NativeDecl, NativeDeclKind, NativeTypeRef,
    NativeValue,
};
use crate::types::{RefId, TypeReference};

use super::{Annotation, AnnotationValue, Symbol, SymbolHandle, SymbolIdentity, SymbolKind, SymbolNode};

/// Failure to reach front-end state the façade already handed out.
///
/// Always fatal for the build: the compilation changed underneath it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FacadeError {
    #[error("native handle {0:?} vanished mid-build")]
    HandleVanished(SymbolHandle),
}

/// Builds and caches symbols for one build.
///
/// Caching is keyed by native handle with install-once semantics: when two threads race on the first access
/// to the same handle, both receive the `Arc` that won the insertion.
pub struct SymbolFacade {
    frontend: Arc<dyn Frontend>,
    decls: RwLock<HashMap<DeclHandle, Symbol>>,
    files: RwLock<HashMap<FileHandle, Symbol>>,
    errors: RwLock<HashMap<String, Symbol>>,
    next_ref: AtomicU64,
}

impl SymbolFacade {
    pub fn new(frontend: Arc<dyn Frontend>) -> Self {
        Self {
            frontend,
            decls: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
            errors: RwLock::new(HashMap::new()),
            next_ref: AtomicU64::new(0),
        }
    }

    pub fn frontend(&self) -> &Arc<dyn Frontend> {
        &self.frontend
    }

    /// Number of declaration and file symbols built so far.
    pub fn cached_symbols(&self) -> usize {
        self.decls.read().unwrap_or_else(PoisonError::into_inner).len()
            + self.files.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    // ---- symbol construction ------------------------------------------------------------------------------

    /// The symbol for a native declaration, built on first access.
    pub fn symbol_for_decl(&self, handle: DeclHandle) -> Result<Symbol, FacadeError> {
        if let Some(symbol) = self.decls.read().unwrap_or_else(PoisonError::into_inner).get(&handle) {
            return Ok(Arc::clone(symbol));
        }
        let native = self
            .frontend
            .declaration(handle)
            .ok_or(FacadeError::HandleVanished(SymbolHandle::Decl(handle)))?;
        let node = self.build_decl_node(native)?;
        tracing::trace!(handle = handle.0, name = %node.qualified_name(), "façade cache miss");

        let mut cache = self.decls.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(handle).or_insert_with(|| Arc::new(node))))
    }

    /// The symbol for a native file, built on first access.
    pub fn symbol_for_file(&self, handle: FileHandle) -> Result<Symbol, FacadeError> {
        if let Some(symbol) = self.files.read().unwrap_or_else(PoisonError::into_inner).get(&handle) {
            return Ok(Arc::clone(symbol));
        }
        let native = self
            .frontend
            .file(handle)
            .ok_or(FacadeError::HandleVanished(SymbolHandle::File(handle)))?;
        let name = native
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| native.path.to_string_lossy().into_owned());
        let identity = SymbolIdentity {
            kind: SymbolKind::File,
            qualified_name: native.package.clone(),
            file: Some(native.path.clone()),
            origin: native.origin,
            ordinal: 0,
            owner_ordinals: Vec::new(),
        };
        let node = SymbolNode::new(
            identity,
            name,
            native.package.clone(),
            SymbolHandle::File(handle),
            None,
            Some(handle),
            Vec::new(),
            None,
        );

        let mut cache = self.files.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(handle).or_insert_with(|| Arc::new(node))))
    }

    /// The error sentinel for an unresolved name. Equal names yield the same symbol.
    pub fn error_symbol(&self, name: &str) -> Symbol {
        if let Some(symbol) = self.errors.read().unwrap_or_else(PoisonError::into_inner).get(name) {
            return Arc::clone(symbol);
        }
        let identity = SymbolIdentity {
            kind: SymbolKind::Error,
            qualified_name: QualifiedName::new(name),
            file: None,
            origin: Origin::Synthetic,
            ordinal: 0,
            owner_ordinals: Vec::new(),
        };
        let node = SymbolNode::new(
            identity,
            name.to_string(),
            QualifiedName::root(),
            SymbolHandle::Error,
            None,
            None,
            Vec::new(),
            None,
        );
        let mut cache = self.errors.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(cache.entry(name.to_string()).or_insert_with(|| Arc::new(node)))
    }

    fn build_decl_node(&self, native: NativeDecl) -> Result<SymbolNode, FacadeError> {
        let file = match native.file {
            Some(fh) => Some(
                self.frontend
                    .file(fh)
                    .ok_or(FacadeError::HandleVanished(SymbolHandle::File(fh)))?,
            ),
            None => None,
        };
        let kind = symbol_kind(&native.kind);
        let top_level = file.as_ref().map(|f| f.declarations.as_slice());
        let ordinal = self.sibling_ordinal(&native, kind, top_level);
        let mut owner_ordinals = Vec::new();
        let mut owner = native.parent;
        while let Some(handle) = owner {
            let decl = self
                .frontend
                .declaration(handle)
                .ok_or(FacadeError::HandleVanished(SymbolHandle::Decl(handle)))?;
            owner_ordinals.push(self.sibling_ordinal(&decl, symbol_kind(&decl.kind), top_level));
            owner = decl.parent;
        }
        owner_ordinals.reverse();
        let identity = SymbolIdentity {
            kind,
            qualified_name: native.qualified_name.clone(),
            file: file.as_ref().map(|f| f.path.clone()),
            origin: native.origin,
            ordinal,
            owner_ordinals,
        };
        let package = file.as_ref().map(|f| f.package.clone()).unwrap_or_default();
        Ok(SymbolNode::new(
            identity,
            native.name.clone(),
            package,
            SymbolHandle::Decl(native.handle),
            native.parent,
            native.file,
            native.modifiers.clone(),
            Some(native),
        ))
    }

    /// Position of `native` among earlier siblings with the same name and kind.
    fn sibling_ordinal(&self, native: &NativeDecl, kind: SymbolKind, top_level: Option<&[DeclHandle]>) -> u32 {
        let parent = native.parent.and_then(|p| self.frontend.declaration(p));
        let siblings: Vec<DeclHandle> = match (&parent, kind) {
            (Some(p), SymbolKind::TypeParameter) => p.type_parameters.clone(),
            (Some(p), SymbolKind::ValueParameter) => match &p.kind {
                NativeDeclKind::Function { parameters, .. } => parameters.clone(),
                _ => Vec::new(),
            },
            (Some(p), _) => p.members.clone(),
            (None, _) => top_level.map(<[DeclHandle]>::to_vec).unwrap_or_default(),
        };
        let mut ordinal = 0;
        for sibling in siblings {
            if sibling == native.handle {
                break;
            }
            if let Some(other) = self.frontend.declaration(sibling) {
                if other.name == native.name && symbol_kind(&other.kind) == kind {
                    ordinal += 1;
                }
            }
        }
        ordinal
    }

    fn new_reference(&self, native: NativeTypeRef, scope: DeclHandle) -> TypeReference {
        TypeReference::new(RefId(self.next_ref.fetch_add(1, Ordering::Relaxed)), native, scope)
    }

    // ---- lazy properties ----------------------------------------------------------------------------------

    /// All nested declarations: top-level declarations for a file, members for a class.
    pub fn declarations(&self, symbol: &Symbol) -> Result<Arc<[Symbol]>, FacadeError> {
        symbol
            .members
            .get_or_init(|| {
                let handles = match symbol.handle() {
                    SymbolHandle::File(fh) => match self.frontend.file(fh) {
                        Some(file) => file.declarations,
                        None => return Err(FacadeError::HandleVanished(SymbolHandle::File(fh))),
                    },
                    SymbolHandle::Decl(_) => symbol.native().map(|n| n.members.clone()).unwrap_or_default(),
                    SymbolHandle::Error => Vec::new(),
                };
                self.symbols_for(&handles)
            })
            .clone()
    }

    pub fn declared_functions(&self, symbol: &Symbol) -> Result<Vec<Symbol>, FacadeError> {
        Ok(self
            .declarations(symbol)?
            .iter()
            .filter(|s| s.kind() == SymbolKind::Function)
            .cloned()
            .collect())
    }

    pub fn declared_properties(&self, symbol: &Symbol) -> Result<Vec<Symbol>, FacadeError> {
        Ok(self
            .declarations(symbol)?
            .iter()
            .filter(|s| s.kind() == SymbolKind::Property)
            .cloned()
            .collect())
    }

    /// Nested class-like declarations.
    pub fn nested_classes(&self, symbol: &Symbol) -> Result<Vec<Symbol>, FacadeError> {
        Ok(self
            .declarations(symbol)?
            .iter()
            .filter(|s| s.kind().is_class())
            .cloned()
            .collect())
    }

    pub fn type_parameters(&self, symbol: &Symbol) -> Result<Arc<[Symbol]>, FacadeError> {
        symbol
            .type_parameters
            .get_or_init(|| {
                let handles = symbol.native().map(|n| n.type_parameters.clone()).unwrap_or_default();
                self.symbols_for(&handles)
            })
            .clone()
    }

    /// Value parameters of a function.
    pub fn parameters(&self, symbol: &Symbol) -> Result<Arc<[Symbol]>, FacadeError> {
        symbol
            .parameters
            .get_or_init(|| {
                let handles = match symbol.native().map(|n| &n.kind) {
                    Some(NativeDeclKind::Function { parameters, .. }) => parameters.clone(),
                    _ => Vec::new(),
                };
                self.symbols_for(&handles)
            })
            .clone()
    }

    /// Declared supertypes of a class.
    pub fn super_types(&self, symbol: &Symbol) -> Arc<[TypeReference]> {
        symbol
            .super_types
            .get_or_init(|| match (symbol.native(), symbol.decl_handle()) {
                (Some(NativeDecl { kind: NativeDeclKind::Class { super_types, .. }, .. }), Some(scope)) => super_types
                    .iter()
                    .map(|t| self.new_reference(t.clone(), scope))
                    .collect(),
                _ => Arc::from(Vec::new()),
            })
            .clone()
    }

    /// Upper bounds of a type parameter.
    pub fn bounds(&self, symbol: &Symbol) -> Arc<[TypeReference]> {
        symbol
            .bounds
            .get_or_init(|| match (symbol.native(), symbol.decl_handle()) {
                (Some(NativeDecl { kind: NativeDeclKind::TypeParameter { bounds, .. }, .. }), Some(scope)) => bounds
                    .iter()
                    .map(|t| self.new_reference(t.clone(), scope))
                    .collect(),
                _ => Arc::from(Vec::new()),
            })
            .clone()
    }

    /// The declared type: property type, function return type, parameter type, or alias target.
    pub fn type_of(&self, symbol: &Symbol) -> Option<TypeReference> {
        symbol
            .type_ref
            .get_or_init(|| {
                let scope = symbol.decl_handle()?;
                let native = match &symbol.native()?.kind {
                    NativeDeclKind::Property { ty, .. } => ty.clone(),
                    NativeDeclKind::Function { return_type, .. } => return_type.clone()?,
                    NativeDeclKind::ValueParameter { ty, .. } => ty.clone(),
                    NativeDeclKind::TypeAlias { target } => target.clone(),
                    NativeDeclKind::Class { .. } | NativeDeclKind::TypeParameter { .. } => return None,
                };
                Some(self.new_reference(native, scope))
            })
            .clone()
    }

    /// Extension receiver type of a function. Not memoized.
    pub fn receiver_type(&self, symbol: &Symbol) -> Option<TypeReference> {
        match (&symbol.native()?.kind, symbol.decl_handle()) {
            (NativeDeclKind::Function { receiver: Some(r), .. }, Some(scope)) => Some(self.new_reference(r.clone(), scope)),
            _ => None,
        }
    }

    pub fn annotations(&self, symbol: &Symbol) -> Arc<[Annotation]> {
        symbol
            .annotations
            .get_or_init(|| match (symbol.native(), symbol.decl_handle()) {
                (Some(native), Some(scope)) => native
                    .annotations
                    .iter()
                    .map(|a| self.convert_annotation(a, scope))
                    .collect(),
                _ => Arc::from(Vec::new()),
            })
            .clone()
    }

    fn convert_annotation(&self, native: &NativeAnnotation, scope: DeclHandle) -> Annotation {
        Annotation {
            short_name: native.name.clone(),
            annotation_type: self.new_reference(NativeTypeRef::named(native.name.clone()), scope),
            arguments: native
                .arguments
                .iter()
                .map(|(k, v)| (k.clone(), self.convert_value(v, scope)))
                .collect(),
        }
    }

    fn convert_value(&self, value: &NativeValue, scope: DeclHandle) -> AnnotationValue {
        match value {
            NativeValue::Bool(b) => AnnotationValue::Bool(*b),
            NativeValue::Int(i) => AnnotationValue::Int(*i),
            NativeValue::Float(x) => AnnotationValue::Float(*x),
            NativeValue::Char(c) => AnnotationValue::Char(*c),
            NativeValue::Str(s) => AnnotationValue::Str(s.clone()),
            NativeValue::Class(t) => AnnotationValue::Class(self.new_reference(t.clone(), scope)),
            NativeValue::EnumConstant { enum_type, entry } => AnnotationValue::EnumConstant {
                enum_type: enum_type.clone(),
                entry: entry.clone(),
            },
            NativeValue::Annotation(a) => AnnotationValue::Annotation(Box::new(self.convert_annotation(a, scope))),
            NativeValue::Array(items) => {
                AnnotationValue::Array(items.iter().map(|v| self.convert_value(v, scope)).collect())
            }
        }
    }

    fn symbols_for(&self, handles: &[DeclHandle]) -> Result<Arc<[Symbol]>, FacadeError> {
        handles
            .iter()
            .map(|h| self.symbol_for_decl(*h))
            .collect::<Result<Vec<_>, _>>()
            .map(Arc::from)
    }

    // ---- navigation ---------------------------------------------------------------------------------------

    /// The enclosing declaration (`None` for top-level declarations and files).
    pub fn parent(&self, symbol: &Symbol) -> Result<Option<Symbol>, FacadeError> {
        symbol.parent_handle().map(|h| self.symbol_for_decl(h)).transpose()
    }

    pub fn containing_file(&self, symbol: &Symbol) -> Result<Option<Symbol>, FacadeError> {
        symbol.file_handle().map(|h| self.symbol_for_file(h)).transpose()
    }

    pub fn class_by_name(&self, name: &QualifiedName) -> Result<Option<Symbol>, FacadeError> {
        self.frontend.class_by_name(name).map(|h| self.symbol_for_decl(h)).transpose()
    }

    pub fn all_files(&self) -> Result<Vec<Symbol>, FacadeError> {
        self.frontend.files().into_iter().map(|h| self.symbol_for_file(h)).collect()
    }

    pub fn file_by_path(&self, path: &Path) -> Result<Option<Symbol>, FacadeError> {
        for handle in self.frontend.files() {
            if self.frontend.file(handle).is_some_and(|f| f.path == path) {
                return self.symbol_for_file(handle).map(Some);
            }
        }
        Ok(None)
    }

    /// Top-level declarations of the files at `paths`; paths outside the compilation contribute nothing.
    pub fn symbols_in_files<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<Symbol>, FacadeError> {
        let mut out = Vec::new();
        for path in paths {
            if let Some(file) = self.file_by_path(path.as_ref())? {
                out.extend(self.declarations(&file)?.iter().cloned());
            }
        }
        Ok(out)
    }

    /// Every declaration under `roots` (recursively, including parameters) carrying annotation `name`.
    ///
    /// `name` is compared against the annotation's resolved qualified name, falling back to the written
    /// spelling when the annotation class is not part of the compilation.
    pub fn symbols_with_annotation(&self, name: &str, roots: &[Symbol]) -> Result<Vec<Symbol>, FacadeError> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<Symbol> = roots.iter().rev().cloned().collect();
        while let Some(symbol) = stack.pop() {
            if !seen.insert(symbol.identity().clone()) {
                continue;
            }
            if self.annotations(&symbol).iter().any(|a| self.annotation_matches(&symbol, a, name)) {
                found.push(Arc::clone(&symbol));
            }
            let mut children: Vec<Symbol> = self.declarations(&symbol)?.to_vec();
            children.extend(self.parameters(&symbol)?.iter().cloned());
            stack.extend(children.into_iter().rev());
        }
        Ok(found)
    }

    fn annotation_matches(&self, symbol: &Symbol, annotation: &Annotation, name: &str) -> bool {
        let Some(scope) = symbol.decl_handle() else {
            return false;
        };
        match self.frontend.resolve_type_name(scope, &annotation.short_name) {
            NameResolution::Declaration(h) => self
                .frontend
                .declaration(h)
                .is_some_and(|d| d.qualified_name.as_str() == name || (!name.contains('.') && d.name == name)),
            _ => annotation.matches_name(name),
        }
    }
}

fn symbol_kind(kind: &NativeDeclKind) -> SymbolKind {
    match kind {
        NativeDeclKind::Class { kind, .. } => SymbolKind::Class(*kind),
        NativeDeclKind::Function { .. } => SymbolKind::Function,
        NativeDeclKind::Property { .. } => SymbolKind::Property,
        NativeDeclKind::TypeParameter { .. } => SymbolKind::TypeParameter,
        NativeDeclKind::ValueParameter { .. } => SymbolKind::ValueParameter,
        NativeDeclKind::TypeAlias { .. } => SymbolKind::TypeAlias,
    }
}

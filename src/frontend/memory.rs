//! Reference front-end adapter backed by an in-memory arena.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use symproc_core::{Origin, QualifiedName};

use super::{
    DeclHandle, DeclStub, DeclStubKind, FileHandle, FileStub, Frontend, FrontendDiagnostic, FrontendError,
    NameResolution, NativeDecl, NativeDeclKind, NativeFile,
};

/// A [`Frontend`] whose whole compilation lives in memory.
///
/// Declarations are appended to an arena and never moved; a removed file leaves tombstones so stale handles
/// are reported as vanished instead of aliasing new declarations.
#[derive(Debug)]
pub struct MemoryFrontend {
    name: String,
    arena: RwLock<Arena>,
}

#[derive(Debug, Default)]
struct Arena {
    files: Vec<Option<NativeFile>>,
    decls: Vec<Option<NativeDecl>>,
    /// Class-like declarations and type aliases by qualified name.
    classes: HashMap<QualifiedName, DeclHandle>,
    paths: HashMap<PathBuf, FileHandle>,
    default_packages: Vec<QualifiedName>,
    diagnostics: Vec<FrontendDiagnostic>,
}

impl MemoryFrontend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arena: RwLock::new(Arena::default()),
        }
    }

    /// Packages searched last when resolving simple names (like an implicit import).
    pub fn with_default_packages(self, packages: impl IntoIterator<Item = QualifiedName>) -> Self {
        self.write().default_packages.extend(packages);
        self
    }

    pub fn report(&self, diagnostic: FrontendDiagnostic) {
        self.write().diagnostics.push(diagnostic);
    }

    /// Drop a file and all of its declarations. Outstanding handles into it stop resolving.
    pub fn remove_file(&self, path: &Path) -> bool {
        let mut arena = self.write();
        let Some(handle) = arena.paths.remove(path) else {
            return false;
        };
        arena.files[handle.0 as usize] = None;
        let doomed: Vec<usize> = arena
            .decls
            .iter()
            .enumerate()
            .filter_map(|(idx, d)| match d {
                Some(d) if d.file == Some(handle) => Some(idx),
                _ => None,
            })
            .collect();
        for idx in doomed {
            if let Some(decl) = arena.decls[idx].take() {
                if arena.classes.get(&decl.qualified_name) == Some(&decl.handle) {
                    arena.classes.remove(&decl.qualified_name);
                }
            }
        }
        true
    }

    pub fn file_by_path(&self, path: &Path) -> Option<FileHandle> {
        self.read().paths.get(path).copied()
    }

    fn read(&self) -> RwLockReadGuard<'_, Arena> {
        self.arena.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arena> {
        self.arena.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Arena {
    fn decl(&self, handle: DeclHandle) -> Option<&NativeDecl> {
        self.decls.get(handle.0 as usize).and_then(Option::as_ref)
    }

    fn file(&self, handle: FileHandle) -> Option<&NativeFile> {
        self.files.get(handle.0 as usize).and_then(Option::as_ref)
    }

    fn insert_file(&mut self, stub: FileStub) -> Result<FileHandle, FrontendError> {
        if self.paths.contains_key(&stub.path) {
            return Err(FrontendError::DuplicateFile(stub.path));
        }
        // Validate all names before touching the arena so a rejected file leaves no trace.
        let mut pending = Vec::new();
        for decl in &stub.declarations {
            collect_class_names(decl, &stub.package, &mut pending);
        }
        for name in &pending {
            if let Some(existing) = self.classes.get(name) {
                let existing = self
                    .decl(*existing)
                    .and_then(|d| d.file)
                    .and_then(|f| self.file(f))
                    .map(|f| f.path.clone())
                    .unwrap_or_default();
                return Err(FrontendError::Redeclaration {
                    name: name.clone(),
                    existing,
                });
            }
        }
        for (idx, name) in pending.iter().enumerate() {
            if pending[..idx].contains(name) {
                return Err(FrontendError::Redeclaration {
                    name: name.clone(),
                    existing: stub.path.clone(),
                });
            }
        }

        let handle = FileHandle(self.files.len() as u32);
        self.files.push(Some(NativeFile {
            handle,
            path: stub.path.clone(),
            package: stub.package.clone(),
            origin: stub.origin,
            imports: stub.imports.clone(),
            declarations: Vec::new(),
        }));

        let mut top_level = Vec::with_capacity(stub.declarations.len());
        for decl in &stub.declarations {
            top_level.push(self.insert_decl(decl, handle, None, &stub.package, stub.origin));
        }
        if let Some(Some(file)) = self.files.get_mut(handle.0 as usize) {
            file.declarations = top_level;
        }
        self.paths.insert(stub.path, handle);
        Ok(handle)
    }

    fn reserve(&mut self) -> DeclHandle {
        let handle = DeclHandle(self.decls.len() as u32);
        self.decls.push(None);
        handle
    }

    fn insert_decl(
        &mut self,
        stub: &DeclStub,
        file: FileHandle,
        parent: Option<DeclHandle>,
        qualifier: &QualifiedName,
        origin: Origin,
    ) -> DeclHandle {
        let handle = self.reserve();
        let qualified_name = qualifier.child(&stub.name);

        let type_parameters: Vec<DeclHandle> = stub
            .type_parameters
            .iter()
            .map(|tp| {
                let tp_handle = self.reserve();
                self.decls[tp_handle.0 as usize] = Some(NativeDecl {
                    handle: tp_handle,
                    name: tp.name.clone(),
                    qualified_name: qualified_name.child(&tp.name),
                    file: Some(file),
                    parent: Some(handle),
                    origin,
                    modifiers: Vec::new(),
                    annotations: Vec::new(),
                    members: Vec::new(),
                    type_parameters: Vec::new(),
                    kind: NativeDeclKind::TypeParameter {
                        variance: tp.variance,
                        bounds: tp.bounds.clone(),
                        reified: tp.reified,
                    },
                });
                tp_handle
            })
            .collect();

        let kind = match &stub.kind {
            DeclStubKind::Class { class_kind, super_types } => NativeDeclKind::Class {
                kind: *class_kind,
                super_types: super_types.clone(),
            },
            DeclStubKind::Function {
                return_type,
                receiver,
                parameters,
            } => {
                let params = parameters
                    .iter()
                    .map(|p| {
                        let p_handle = self.reserve();
                        self.decls[p_handle.0 as usize] = Some(NativeDecl {
                            handle: p_handle,
                            name: p.name.clone(),
                            qualified_name: qualified_name.child(&p.name),
                            file: Some(file),
                            parent: Some(handle),
                            origin,
                            modifiers: Vec::new(),
                            annotations: p.annotations.clone(),
                            members: Vec::new(),
                            type_parameters: Vec::new(),
                            kind: NativeDeclKind::ValueParameter {
                                ty: p.ty.clone(),
                                has_default: p.has_default,
                            },
                        });
                        p_handle
                    })
                    .collect();
                NativeDeclKind::Function {
                    return_type: return_type.clone(),
                    receiver: receiver.clone(),
                    parameters: params,
                }
            }
            DeclStubKind::Property { ty, mutable } => NativeDeclKind::Property {
                ty: ty.clone(),
                mutable: *mutable,
            },
            DeclStubKind::TypeAlias { target } => NativeDeclKind::TypeAlias { target: target.clone() },
        };

        let members: Vec<DeclHandle> = stub
            .members
            .iter()
            .map(|m| self.insert_decl(m, file, Some(handle), &qualified_name, origin))
            .collect();

        if matches!(kind, NativeDeclKind::Class { .. } | NativeDeclKind::TypeAlias { .. }) {
            self.classes.insert(qualified_name.clone(), handle);
        }

        self.decls[handle.0 as usize] = Some(NativeDecl {
            handle,
            name: stub.name.clone(),
            qualified_name,
            file: Some(file),
            parent,
            origin,
            modifiers: stub.modifiers.clone(),
            annotations: stub.annotations.clone(),
            members,
            type_parameters,
            kind,
        });
        handle
    }

    /// Look `name` up among the type parameters and nested classes of `scope` and its ancestors.
    fn lookup_in_scopes(&self, scope: DeclHandle, name: &str) -> Option<NameResolution> {
        let mut current = self.decl(scope);
        while let Some(decl) = current {
            if decl.name == name && matches!(decl.kind, NativeDeclKind::TypeParameter { .. }) {
                return Some(NameResolution::TypeParameter(decl.handle));
            }
            for tp in &decl.type_parameters {
                if self.decl(*tp).is_some_and(|d| d.name == name) {
                    return Some(NameResolution::TypeParameter(*tp));
                }
            }
            if let NativeDeclKind::Class { .. } = decl.kind {
                let nested = decl.qualified_name.child(name);
                if let Some(h) = self.classes.get(&nested) {
                    return Some(NameResolution::Declaration(*h));
                }
            }
            current = decl.parent.and_then(|p| self.decl(p));
        }
        None
    }
}

fn collect_class_names(decl: &DeclStub, qualifier: &QualifiedName, out: &mut Vec<QualifiedName>) {
    let name = qualifier.child(&decl.name);
    for member in &decl.members {
        collect_class_names(member, &name, out);
    }
    if matches!(decl.kind, DeclStubKind::Class { .. } | DeclStubKind::TypeAlias { .. }) {
        out.push(name);
    }
}

impl Frontend for MemoryFrontend {
    fn name(&self) -> &str {
        &self.name
    }

    fn files(&self) -> Vec<FileHandle> {
        self.read().files.iter().flatten().map(|f| f.handle).collect()
    }

    fn file(&self, handle: FileHandle) -> Option<NativeFile> {
        self.read().file(handle).cloned()
    }

    fn declaration(&self, handle: DeclHandle) -> Option<NativeDecl> {
        self.read().decl(handle).cloned()
    }

    fn resolve_type_name(&self, scope: DeclHandle, name: &str) -> NameResolution {
        let arena = self.read();
        let simple = !name.contains('.');

        if simple {
            if let Some(found) = arena.lookup_in_scopes(scope, name) {
                return found;
            }
        }

        let qualified = QualifiedName::new(name);
        if let Some(h) = arena.classes.get(&qualified) {
            return NameResolution::Declaration(*h);
        }

        let Some(file) = arena.decl(scope).and_then(|d| d.file).and_then(|f| arena.file(f)) else {
            return NameResolution::Unresolved;
        };

        if let Some(h) = arena.classes.get(&file.package.child(name)) {
            return NameResolution::Declaration(*h);
        }

        // `import a.b.Outer` makes `Outer` and `Outer.Inner` visible.
        let mut segments = name.splitn(2, '.');
        let head = segments.next().unwrap_or(name);
        let tail = segments.next();
        for import in &file.imports {
            if import.simple_name() == head {
                let candidate = match tail {
                    Some(rest) => import.child(rest),
                    None => import.clone(),
                };
                if let Some(h) = arena.classes.get(&candidate) {
                    return NameResolution::Declaration(*h);
                }
            }
        }

        for package in &arena.default_packages {
            if let Some(h) = arena.classes.get(&package.child(name)) {
                return NameResolution::Declaration(*h);
            }
        }
        NameResolution::Unresolved
    }

    fn class_by_name(&self, name: &QualifiedName) -> Option<DeclHandle> {
        self.read().classes.get(name).copied()
    }

    fn add_file(&self, stub: FileStub) -> Result<FileHandle, FrontendError> {
        let path = stub.path.clone();
        let handle = self.write().insert_file(stub)?;
        tracing::debug!(path = %path.display(), handle = handle.0, "front-end registered file");
        Ok(handle)
    }

    fn diagnostics(&self) -> Vec<FrontendDiagnostic> {
        self.read().diagnostics.clone()
    }
}

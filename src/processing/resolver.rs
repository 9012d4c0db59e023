use std::path::Path;
use std::sync::Arc;

use symproc_core::QualifiedName;

use crate::deps::ReadBuffer;
use crate::symbols::{Annotation, FacadeError, Symbol, SymbolFacade, SymbolKind};
use crate::types::{FunctionSignature, Type, TypeReference, TypeResolver};

/// A processor's window onto the compilation.
///
/// Every query records what it touched in the processor's [`ReadBuffer`]: the owning file of each symbol
/// returned or inspected, and the qualified names of classes looked up by name (present or not).
pub struct Resolver {
    types: Arc<TypeResolver>,
    reads: Arc<ReadBuffer>,
    /// Files new this round.
    new_files: Vec<Symbol>,
    /// Symbols visible to annotation searches: declarations of new files plus deferred symbols.
    roots: Vec<Symbol>,
}

impl Resolver {
    pub(crate) fn new(types: Arc<TypeResolver>, reads: Arc<ReadBuffer>, new_files: Vec<Symbol>, roots: Vec<Symbol>) -> Self {
        Self {
            types,
            reads,
            new_files,
            roots,
        }
    }

    fn facade(&self) -> &SymbolFacade {
        self.types.facade()
    }

    fn touch(&self, symbol: &Symbol) {
        if let Some(path) = symbol.file_path() {
            self.reads.record_file(path);
        }
        if symbol.kind().is_class() || symbol.kind() == SymbolKind::TypeAlias {
            self.reads.record_symbol(symbol.qualified_name().as_str());
        }
    }

    fn touch_all(&self, symbols: &[Symbol]) {
        for symbol in symbols {
            self.touch(symbol);
        }
    }

    fn touch_type(&self, ty: &Type) {
        if !ty.is_error() {
            self.touch(ty.declaration());
        } else {
            self.reads.record_symbol(ty.declaration().qualified_name().as_str());
        }
        for arg in ty.arguments() {
            if let Some(inner) = &arg.ty {
                self.touch_type(inner);
            }
        }
    }

    // ---- navigation ---------------------------------------------------------------------------------------

    /// Files added to the compilation this round.
    pub fn new_files(&self) -> &[Symbol] {
        self.touch_all(&self.new_files);
        &self.new_files
    }

    /// Every file of the compilation. Makes the processor depend on all sources.
    pub fn all_files(&self) -> Result<Vec<Symbol>, FacadeError> {
        self.reads.mark_all();
        self.facade().all_files()
    }

    pub fn class_by_name(&self, name: &str) -> Result<Option<Symbol>, FacadeError> {
        self.reads.record_symbol(name);
        let found = self.facade().class_by_name(&QualifiedName::new(name))?;
        if let Some(symbol) = &found {
            self.touch(symbol);
        }
        Ok(found)
    }

    /// Top-level declarations of the given files.
    pub fn symbols_in_files(&self, paths: &[&Path]) -> Result<Vec<Symbol>, FacadeError> {
        for path in paths {
            self.reads.record_file(path);
        }
        self.facade().symbols_in_files(paths)
    }

    /// Symbols among this round's new declarations and deferred symbols annotated with `name`.
    pub fn symbols_with_annotation(&self, name: &str) -> Result<Vec<Symbol>, FacadeError> {
        let found = self.facade().symbols_with_annotation(name, &self.roots)?;
        self.touch_all(&found);
        Ok(found)
    }

    pub fn declarations(&self, symbol: &Symbol) -> Result<Arc<[Symbol]>, FacadeError> {
        self.touch(symbol);
        self.facade().declarations(symbol)
    }

    pub fn declared_functions(&self, symbol: &Symbol) -> Result<Vec<Symbol>, FacadeError> {
        self.touch(symbol);
        self.facade().declared_functions(symbol)
    }

    pub fn declared_properties(&self, symbol: &Symbol) -> Result<Vec<Symbol>, FacadeError> {
        self.touch(symbol);
        self.facade().declared_properties(symbol)
    }

    pub fn nested_classes(&self, symbol: &Symbol) -> Result<Vec<Symbol>, FacadeError> {
        self.touch(symbol);
        self.facade().nested_classes(symbol)
    }

    pub fn type_parameters(&self, symbol: &Symbol) -> Result<Arc<[Symbol]>, FacadeError> {
        self.touch(symbol);
        self.facade().type_parameters(symbol)
    }

    pub fn parameters(&self, symbol: &Symbol) -> Result<Arc<[Symbol]>, FacadeError> {
        self.touch(symbol);
        self.facade().parameters(symbol)
    }

    pub fn super_types(&self, symbol: &Symbol) -> Arc<[TypeReference]> {
        self.touch(symbol);
        self.facade().super_types(symbol)
    }

    pub fn annotations(&self, symbol: &Symbol) -> Arc<[Annotation]> {
        self.touch(symbol);
        self.facade().annotations(symbol)
    }

    pub fn type_of(&self, symbol: &Symbol) -> Option<TypeReference> {
        self.touch(symbol);
        self.facade().type_of(symbol)
    }

    pub fn parent(&self, symbol: &Symbol) -> Result<Option<Symbol>, FacadeError> {
        let parent = self.facade().parent(symbol)?;
        if let Some(p) = &parent {
            self.touch(p);
        }
        Ok(parent)
    }

    pub fn containing_file(&self, symbol: &Symbol) -> Result<Option<Symbol>, FacadeError> {
        self.touch(symbol);
        self.facade().containing_file(symbol)
    }

    // ---- types --------------------------------------------------------------------------------------------

    pub fn resolve(&self, reference: &TypeReference) -> Result<Type, FacadeError> {
        let ty = self.types.resolve(reference)?;
        self.touch_type(&ty);
        Ok(ty)
    }

    pub fn declared_type(&self, symbol: &Symbol) -> Result<Type, FacadeError> {
        self.touch(symbol);
        let ty = self.types.declared_type(symbol)?;
        self.touch_type(&ty);
        Ok(ty)
    }

    pub fn as_member_of(&self, member: &Symbol, containing: &Type) -> Result<Type, FacadeError> {
        self.touch(member);
        self.touch_type(containing);
        let ty = self.types.as_member_of(member, containing)?;
        self.touch_type(&ty);
        Ok(ty)
    }

    pub fn function_as_member_of(&self, function: &Symbol, containing: &Type) -> Result<FunctionSignature, FacadeError> {
        self.touch(function);
        self.touch_type(containing);
        let signature = self.types.function_as_member_of(function, containing)?;
        for (_, ty) in &signature.parameters {
            self.touch_type(ty);
        }
        if let Some(ty) = &signature.return_type {
            self.touch_type(ty);
        }
        Ok(signature)
    }

    pub fn as_super_type(&self, ty: &Type, target: &Symbol) -> Result<Option<Type>, FacadeError> {
        self.touch_type(ty);
        self.touch(target);
        self.types.as_super_type(ty, target)
    }

    pub fn is_assignable_from(&self, target: &Type, source: &Type) -> Result<bool, FacadeError> {
        self.touch_type(target);
        self.touch_type(source);
        self.types.is_assignable_from(target, source)
    }

    pub fn error_type(&self, name: &str) -> Type {
        self.types.error_type(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::{DeclStub, FileStub, Frontend, MemoryFrontend, NativeTypeRef};
    use crate::types::NullabilityPolicy;
    use std::path::PathBuf;

    fn view() -> (Resolver, Arc<ReadBuffer>) {
        let fe = Arc::new(MemoryFrontend::new("memory"));
        fe.add_file(FileStub::new("src/Base.kt", "p").with_declaration(DeclStub::interface("Base")))
            .unwrap();
        fe.add_file(
            FileStub::new("src/Foo.kt", "p").with_declaration(
                DeclStub::class("Foo")
                    .with_super_type(NativeTypeRef::parse("Base").unwrap())
                    .with_member(DeclStub::property("missing", NativeTypeRef::parse("Gone").unwrap())),
            ),
        )
        .unwrap();
        let facade = Arc::new(SymbolFacade::new(fe as Arc<dyn Frontend>));
        let types = Arc::new(TypeResolver::new(facade, NullabilityPolicy::Flexible));
        let reads = Arc::new(ReadBuffer::new());
        (Resolver::new(types, Arc::clone(&reads), Vec::new(), Vec::new()), reads)
    }

    #[test]
    fn test_resolution_records_owning_files() {
        let (resolver, reads) = view();
        let foo = resolver.class_by_name("p.Foo").unwrap().unwrap();
        for reference in resolver.super_types(&foo).iter() {
            resolver.resolve(reference).unwrap();
        }
        let taken = reads.take();
        assert!(taken.files.contains(&PathBuf::from("src/Foo.kt")));
        assert!(taken.files.contains(&PathBuf::from("src/Base.kt")));
        assert!(taken.symbols.contains("p.Base"));
    }

    #[test]
    fn test_unresolved_names_are_recorded() {
        let (resolver, reads) = view();
        assert!(resolver.class_by_name("p.Later").unwrap().is_none());
        let foo = resolver.class_by_name("p.Foo").unwrap().unwrap();
        let missing = resolver.declared_properties(&foo).unwrap()[0].clone();
        let ty = resolver.resolve(&resolver.type_of(&missing).unwrap()).unwrap();
        assert!(ty.is_error());
        let taken = reads.take();
        assert!(taken.symbols.contains("p.Later"));
        assert!(taken.symbols.contains("Gone"));
    }

    #[test]
    fn test_all_files_marks_everything() {
        let (resolver, reads) = view();
        assert_eq!(resolver.all_files().unwrap().len(), 2);
        assert!(reads.take().all);
    }
}

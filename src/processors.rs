//! Built-in processors.
//!
//! - `impl-stub`: generates `<Name>Impl` for every class annotated with a marker annotation.
//! - `annotation-index`: writes one index of every class carrying an annotation, across all rounds.

use std::collections::BTreeSet;
use std::path::PathBuf;

use symproc_core::{ClassKind, ModifierId, QualifiedName, Variance};

use crate::deps::Dependencies;
use crate::frontend::{DeclStub, NativeTypeArg, NativeTypeRef};
use crate::processing::{
    FinishContext, GeneratedFile, ProcessOutput, ProcessorError, RoundContext, SymbolProcessor,
};
use crate::symbols::{Symbol, SymbolKind};
use crate::types::Type;

/// Ids of the built-in processors, in their default registration order.
pub const BUILTIN_PROCESSORS: &[&str] = &[ImplStubProcessor::ID, AnnotationIndexProcessor::ID];

/// Instantiate a built-in processor by id.
pub fn builtin(id: &str) -> Option<Box<dyn SymbolProcessor>> {
    match id {
        ImplStubProcessor::ID => Some(Box::new(ImplStubProcessor::default())),
        AnnotationIndexProcessor::ID => Some(Box::new(AnnotationIndexProcessor::default())),
        _ => None,
    }
}

fn package_dir(package: &QualifiedName) -> PathBuf {
    package.segments().collect()
}

/// The reference form of a resolved type, written with qualified names.
fn native_of(ty: &Type) -> NativeTypeRef {
    let name = if ty.is_type_parameter() {
        ty.declaration().name().to_string()
    } else {
        ty.declaration().qualified_name().to_string()
    };
    let mut native = NativeTypeRef::named(name).with_nullability(ty.nullability());
    for arg in ty.arguments() {
        native = native.with_argument(match &arg.ty {
            None => NativeTypeArg::star(),
            Some(inner) => NativeTypeArg {
                variance: arg.variance,
                ty: Some(native_of(inner)),
            },
        });
    }
    native
}

// ============================================================================
// impl-stub
// ============================================================================

/// Generates an implementation skeleton for each annotated open class or interface.
#[derive(Debug, Default)]
pub struct ImplStubProcessor {
    generated: usize,
}

impl ImplStubProcessor {
    pub const ID: &'static str = "impl-stub";
    pub const ANNOTATION_OPTION: &'static str = "impl-stub.annotation";
    pub const DEFAULT_ANNOTATION: &'static str = "symproc.GenerateImpl";

    fn generate(&self, ctx: &RoundContext<'_>, class: &Symbol) -> Result<GeneratedFile, ProcessorError> {
        let resolver = ctx.resolver;
        let name = format!("{}Impl", class.name());
        let package = class.package_name().clone();
        let class_type = resolver.declared_type(class)?;
        let type_params = resolver.type_parameters(class)?;
        let is_interface = class.kind() == SymbolKind::Class(ClassKind::Interface);

        // Functions of the class and of its direct supertypes, seen from the class.
        let mut owners = vec![class.clone()];
        for reference in resolver.super_types(class).iter() {
            let super_type = resolver.resolve(reference)?;
            if super_type.declaration().kind().is_class() {
                owners.push(super_type.declaration().clone());
            }
        }
        let mut seen = BTreeSet::new();
        let mut stub = DeclStub::class(name.clone()).with_super_type(native_of(&class_type));
        for param in type_params.iter() {
            stub = stub.with_type_parameter(param.name(), Variance::Invariant);
        }

        let mut body = String::new();
        for owner in &owners {
            for function in resolver.declared_functions(owner)? {
                if !function.is_open() && !function.is_abstract() && owner.kind() != SymbolKind::Class(ClassKind::Interface) {
                    continue;
                }
                let signature = resolver.function_as_member_of(&function, &class_type)?;
                let params: Vec<String> = signature.parameters.iter().map(|(n, t)| format!("{n}: {t}")).collect();
                let key = format!("{}({})", function.name(), params.join(", "));
                if !seen.insert(key) {
                    continue;
                }
                let mut member = DeclStub::function(function.name(), signature.return_type.as_ref().map(native_of))
                    .with_modifier(ModifierId::Override);
                for (param_name, ty) in &signature.parameters {
                    member = member.with_parameter(param_name.clone(), native_of(ty));
                }
                stub = stub.with_member(member);

                let ret = signature.return_type.as_ref().map(|t| format!(": {t}")).unwrap_or_default();
                body.push_str(&format!(
                    "    override fun {}({}){} = error(\"not implemented\")\n",
                    function.name(),
                    params.join(", "),
                    ret
                ));
            }
        }

        let generics = if type_params.is_empty() {
            String::new()
        } else {
            let names: Vec<&str> = type_params.iter().map(|p| p.name()).collect();
            format!("<{}>", names.join(", "))
        };
        let super_call = if is_interface { "" } else { "()" };
        let mut contents = String::new();
        if !package.is_root() {
            contents.push_str(&format!("package {package}\n\n"));
        }
        contents.push_str(&format!("class {name}{generics} : {class_type}{super_call} {{\n"));
        contents.push_str(&body);
        contents.push_str("}\n");

        let sources: Vec<PathBuf> = class.file_path().map(|p| vec![p.to_path_buf()]).unwrap_or_default();
        Ok(GeneratedFile::new(
            package_dir(&package).join(format!("{name}.kt")),
            package,
            Dependencies::isolating(sources),
        )
        .with_contents(contents)
        .with_declaration(stub))
    }
}

impl SymbolProcessor for ImplStubProcessor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn process(&mut self, ctx: &RoundContext<'_>) -> Result<ProcessOutput, ProcessorError> {
        let annotation = ctx.option(Self::ANNOTATION_OPTION).unwrap_or(Self::DEFAULT_ANNOTATION);
        let mut output = ProcessOutput::new();
        for class in ctx.resolver.symbols_with_annotation(annotation)? {
            if !class.kind().is_class() {
                ctx.logger
                    .warn(format!("@{annotation} only applies to classes"), Some(&class));
                continue;
            }
            if !class.is_open() {
                ctx.logger
                    .warn("class is final; no implementation generated", Some(&class));
                continue;
            }
            let mut unresolved = None;
            for reference in ctx.resolver.super_types(&class).iter() {
                let ty = ctx.resolver.resolve(reference)?;
                if ty.is_error() {
                    unresolved = Some(ty);
                    break;
                }
            }
            if let Some(ty) = unresolved {
                output.defer(class, format!("supertype {} is not resolved", reference_name(&ty)));
                continue;
            }
            output.files.push(self.generate(ctx, &class)?);
            self.generated += 1;
        }
        Ok(output)
    }

    fn finish(&mut self, ctx: &FinishContext<'_>) -> Result<Vec<GeneratedFile>, ProcessorError> {
        tracing::debug!(generated = self.generated, rounds = ctx.rounds, "impl-stub finished");
        Ok(Vec::new())
    }
}

fn reference_name(ty: &Type) -> &str {
    ty.declaration().qualified_name().as_str()
}

// ============================================================================
// annotation-index
// ============================================================================

/// Collects annotated classes across rounds and writes a single sorted index from `finish`.
#[derive(Debug, Default)]
pub struct AnnotationIndexProcessor {
    collected: BTreeSet<String>,
}

impl AnnotationIndexProcessor {
    pub const ID: &'static str = "annotation-index";
    pub const ANNOTATION_OPTION: &'static str = "annotation-index.annotation";
    pub const PATH_OPTION: &'static str = "annotation-index.path";
    pub const DEFAULT_ANNOTATION: &'static str = "symproc.Indexed";
    pub const DEFAULT_PATH: &'static str = "META-INF/symproc/index.txt";
}

impl SymbolProcessor for AnnotationIndexProcessor {
    fn id(&self) -> &str {
        Self::ID
    }

    fn process(&mut self, ctx: &RoundContext<'_>) -> Result<ProcessOutput, ProcessorError> {
        let annotation = ctx.option(Self::ANNOTATION_OPTION).unwrap_or(Self::DEFAULT_ANNOTATION);
        for symbol in ctx.resolver.symbols_with_annotation(annotation)? {
            if symbol.kind().is_class() {
                self.collected.insert(symbol.qualified_name().to_string());
            }
        }
        Ok(ProcessOutput::new())
    }

    fn finish(&mut self, ctx: &FinishContext<'_>) -> Result<Vec<GeneratedFile>, ProcessorError> {
        let path = ctx.option(Self::PATH_OPTION).unwrap_or(Self::DEFAULT_PATH);
        let mut contents = String::new();
        for name in &self.collected {
            contents.push_str(name);
            contents.push('\n');
        }
        ctx.logger.info(format!("indexed {} classes", self.collected.len()));
        Ok(vec![
            GeneratedFile::new(path, QualifiedName::root(), Dependencies::all_sources()).with_contents(contents),
        ])
    }

    fn on_error(&mut self) {
        self.collected.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        for id in BUILTIN_PROCESSORS {
            let processor = builtin(id).unwrap();
            assert_eq!(processor.id(), *id);
            assert!(processor.supports_incremental());
        }
        assert!(builtin("nope").is_none());
    }

    #[test]
    fn test_package_dir() {
        assert_eq!(package_dir(&QualifiedName::new("com.example")), PathBuf::from("com/example"));
        assert_eq!(package_dir(&QualifiedName::root()), PathBuf::new());
    }
}

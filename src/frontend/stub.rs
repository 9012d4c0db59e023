//! Declaration stubs: the serializable description of a file's declarations.
//!
//! Stubs are how declarations enter a [`super::MemoryFrontend`], both from a compilation snapshot and from
//! processors (every generated file carries the stubs of what it declares, since the engine never parses
//! source text).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use symproc_core::{ClassKind, ModifierId, Origin, QualifiedName, Variance};

use super::{NativeAnnotation, NativeTypeRef};

/// One file and its top-level declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStub {
    pub path: PathBuf,
    #[serde(default)]
    pub package: QualifiedName,
    #[serde(default = "default_origin")]
    pub origin: Origin,
    #[serde(default)]
    pub imports: Vec<QualifiedName>,
    #[serde(default)]
    pub declarations: Vec<DeclStub>,
}

fn default_origin() -> Origin {
    Origin::Source
}

impl FileStub {
    pub fn new(path: impl Into<PathBuf>, package: impl Into<QualifiedName>) -> Self {
        Self {
            path: path.into(),
            package: package.into(),
            origin: Origin::Source,
            imports: Vec::new(),
            declarations: Vec::new(),
        }
    }

    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_import(mut self, import: impl Into<QualifiedName>) -> Self {
        self.imports.push(import.into());
        self
    }

    pub fn with_declaration(mut self, decl: DeclStub) -> Self {
        self.declarations.push(decl);
        self
    }
}

/// One declaration (and its nested members).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclStub {
    pub name: String,
    #[serde(flatten)]
    pub kind: DeclStubKind,
    #[serde(default)]
    pub modifiers: Vec<ModifierId>,
    #[serde(default)]
    pub annotations: Vec<NativeAnnotation>,
    #[serde(default)]
    pub type_parameters: Vec<TypeParamStub>,
    #[serde(default)]
    pub members: Vec<DeclStub>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeclStubKind {
    Class {
        #[serde(default)]
        class_kind: ClassKind,
        #[serde(default)]
        super_types: Vec<NativeTypeRef>,
    },
    Function {
        #[serde(default)]
        return_type: Option<NativeTypeRef>,
        #[serde(default)]
        receiver: Option<NativeTypeRef>,
        #[serde(default)]
        parameters: Vec<ParamStub>,
    },
    Property {
        ty: NativeTypeRef,
        #[serde(default)]
        mutable: bool,
    },
    TypeAlias {
        target: NativeTypeRef,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeParamStub {
    pub name: String,
    #[serde(default)]
    pub variance: Variance,
    #[serde(default)]
    pub bounds: Vec<NativeTypeRef>,
    #[serde(default)]
    pub reified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamStub {
    pub name: String,
    pub ty: NativeTypeRef,
    #[serde(default)]
    pub has_default: bool,
    #[serde(default)]
    pub annotations: Vec<NativeAnnotation>,
}

impl DeclStub {
    fn new(name: impl Into<String>, kind: DeclStubKind) -> Self {
        Self {
            name: name.into(),
            kind,
            modifiers: Vec::new(),
            annotations: Vec::new(),
            type_parameters: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::class_of_kind(name, ClassKind::Class)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::class_of_kind(name, ClassKind::Interface)
    }

    pub fn class_of_kind(name: impl Into<String>, class_kind: ClassKind) -> Self {
        Self::new(
            name,
            DeclStubKind::Class {
                class_kind,
                super_types: Vec::new(),
            },
        )
    }

    pub fn function(name: impl Into<String>, return_type: Option<NativeTypeRef>) -> Self {
        Self::new(
            name,
            DeclStubKind::Function {
                return_type,
                receiver: None,
                parameters: Vec::new(),
            },
        )
    }

    pub fn property(name: impl Into<String>, ty: NativeTypeRef) -> Self {
        Self::new(name, DeclStubKind::Property { ty, mutable: false })
    }

    pub fn type_alias(name: impl Into<String>, target: NativeTypeRef) -> Self {
        Self::new(name, DeclStubKind::TypeAlias { target })
    }

    /// Add a supertype. Ignored unless this is a class.
    pub fn with_super_type(mut self, ty: NativeTypeRef) -> Self {
        if let DeclStubKind::Class { super_types, .. } = &mut self.kind {
            super_types.push(ty);
        }
        self
    }

    /// Add a value parameter. Ignored unless this is a function.
    pub fn with_parameter(mut self, name: impl Into<String>, ty: NativeTypeRef) -> Self {
        if let DeclStubKind::Function { parameters, .. } = &mut self.kind {
            parameters.push(ParamStub {
                name: name.into(),
                ty,
                has_default: false,
                annotations: Vec::new(),
            });
        }
        self
    }

    /// Annotate the most recently added value parameter.
    pub fn with_parameter_annotation(mut self, annotation: NativeAnnotation) -> Self {
        if let DeclStubKind::Function { parameters, .. } = &mut self.kind {
            if let Some(param) = parameters.last_mut() {
                param.annotations.push(annotation);
            }
        }
        self
    }

    pub fn with_type_parameter(mut self, name: impl Into<String>, variance: Variance) -> Self {
        self.type_parameters.push(TypeParamStub {
            name: name.into(),
            variance,
            bounds: Vec::new(),
            reified: false,
        });
        self
    }

    /// Add a bound to the most recently added type parameter.
    pub fn with_bound(mut self, bound: NativeTypeRef) -> Self {
        if let Some(tp) = self.type_parameters.last_mut() {
            tp.bounds.push(bound);
        }
        self
    }

    pub fn with_modifier(mut self, modifier: ModifierId) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_annotation(mut self, annotation: NativeAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_member(mut self, member: DeclStub) -> Self {
        self.members.push(member);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decl_stub_json_is_flat() {
        let json = r#"{
            "name": "Foo",
            "kind": "class",
            "class_kind": "interface",
            "super_types": ["Base<T>"],
            "type_parameters": [{"name": "T", "variance": "covariant"}],
            "annotations": [{"name": "symproc.GenerateImpl"}]
        }"#;
        let stub: DeclStub = serde_json::from_str(json).unwrap();
        assert_eq!(stub.name, "Foo");
        match &stub.kind {
            DeclStubKind::Class { class_kind, super_types } => {
                assert_eq!(*class_kind, ClassKind::Interface);
                assert_eq!(super_types[0].to_string(), "Base<T>");
            }
            other => panic!("expected class, got {other:?}"),
        }
        assert_eq!(stub.type_parameters[0].variance, Variance::Covariant);
    }

    #[test]
    fn test_builders_ignore_mismatched_kinds() {
        let prop = DeclStub::property("x", NativeTypeRef::named("Int"))
            .with_super_type(NativeTypeRef::named("Base"))
            .with_parameter("p", NativeTypeRef::named("Int"));
        assert_eq!(
            prop.kind,
            DeclStubKind::Property {
                ty: NativeTypeRef::named("Int"),
                mutable: false
            }
        );
    }

    #[test]
    fn test_file_stub_defaults() {
        let stub: FileStub = serde_json::from_str(r#"{"path": "A.kt"}"#).unwrap();
        assert_eq!(stub.origin, Origin::Source);
        assert!(stub.package.is_root());
        assert!(stub.declarations.is_empty());
    }
}

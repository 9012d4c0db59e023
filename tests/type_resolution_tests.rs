//! Type resolution through the public façade: sentinels, substitution and nullability policies.

use std::sync::Arc;

use symproc::frontend::{DeclStub, FileStub, Frontend, MemoryFrontend, NativeTypeRef};
use symproc::symbols::{Symbol, SymbolFacade};
use symproc::types::{NullabilityPolicy, Type, TypeResolver};
use symproc_core::{Origin, QualifiedName, Variance};

fn ty(text: &str) -> NativeTypeRef {
    NativeTypeRef::parse(text).unwrap()
}

fn frontend() -> Arc<dyn Frontend> {
    let fe = MemoryFrontend::new("memory").with_default_packages([QualifiedName::new("base")]);
    fe.add_file(
        FileStub::new("lib/base.kt", "base")
            .with_origin(Origin::Library)
            .with_declaration(DeclStub::class("Int"))
            .with_declaration(DeclStub::class("Str"))
            .with_declaration(DeclStub::interface("List").with_type_parameter("E", Variance::Covariant)),
    )
    .unwrap();
    fe.add_file(
        FileStub::new("src/Pair.kt", "app")
            .with_declaration(
                DeclStub::class("Pair")
                    .with_type_parameter("A", Variance::Invariant)
                    .with_type_parameter("B", Variance::Invariant)
                    .with_member(DeclStub::property("first", ty("A")))
                    .with_member(DeclStub::property("second", ty("B"))),
            )
            .with_declaration(DeclStub::class("Holder").with_super_type(ty("Pair<Str, Int?>")))
            .with_declaration(
                DeclStub::class("Broken")
                    .with_member(DeclStub::property("a", ty("Missing")))
                    .with_member(DeclStub::property("b", ty("Missing"))),
            ),
    )
    .unwrap();
    fe.add_file(
        FileStub::new("src/Chain.kt", "app")
            .with_declaration(DeclStub::class("Box").with_type_parameter("T", Variance::Invariant))
            .with_declaration(
                DeclStub::class("Base")
                    .with_type_parameter("B", Variance::Invariant)
                    .with_member(DeclStub::property("item", ty("B")))
                    .with_member(DeclStub::property("items", ty("List<out B>"))),
            )
            .with_declaration(
                DeclStub::class("Mid")
                    .with_type_parameter("M", Variance::Invariant)
                    .with_super_type(ty("Base<Box<M>>")),
            )
            .with_declaration(
                DeclStub::class("Leaf")
                    .with_type_parameter("L", Variance::Invariant)
                    .with_super_type(ty("Mid<L?>")),
            )
            .with_declaration(
                DeclStub::class("Uses")
                    .with_member(DeclStub::property("a", ty("Leaf<Str>")))
                    .with_member(DeclStub::property("b", ty("Leaf<Str?>")))
                    .with_member(DeclStub::property("c", ty("Leaf<*>")))
                    .with_member(DeclStub::property("d", ty("Leaf<out Str>")))
                    .with_member(DeclStub::property("e", ty("Leaf<in Str>"))),
            ),
    )
    .unwrap();
    fe.add_file(
        FileStub::new("src/Legacy.java", "legacy")
            .with_origin(Origin::Foreign)
            .with_declaration(
                DeclStub::class("Legacy")
                    .with_member(DeclStub::property("name", ty("Str!")))
                    .with_member(DeclStub::function("items", Some(ty("List<Str!>!")))),
            ),
    )
    .unwrap();
    Arc::new(fe)
}

fn resolver(policy: NullabilityPolicy) -> TypeResolver {
    TypeResolver::new(Arc::new(SymbolFacade::new(frontend())), policy)
}

fn class(r: &TypeResolver, name: &str) -> Symbol {
    r.facade().class_by_name(&QualifiedName::new(name)).unwrap().unwrap()
}

fn member(r: &TypeResolver, owner: &str, name: &str) -> Symbol {
    let owner = class(r, owner);
    r.facade()
        .declarations(&owner)
        .unwrap()
        .iter()
        .find(|m| m.name() == name)
        .cloned()
        .unwrap()
}

fn type_of(r: &TypeResolver, member: &Symbol) -> Type {
    r.resolve(&r.facade().type_of(member).unwrap()).unwrap()
}

#[test]
fn test_unresolved_references_yield_equal_sentinels() {
    let r = resolver(NullabilityPolicy::Flexible);
    let a = type_of(&r, &member(&r, "app.Broken", "a"));
    let b = type_of(&r, &member(&r, "app.Broken", "b"));

    assert!(a.is_error());
    assert!(a.declaration().is_error());
    assert_eq!(a, b);
    assert_eq!(a, type_of(&r, &member(&r, "app.Broken", "a")));
    insta::assert_snapshot!(a.to_string(), @"<ERROR TYPE: Missing>");
}

#[test]
fn test_supertype_arguments_substitute_into_members() {
    let r = resolver(NullabilityPolicy::Flexible);
    let holder = r.declared_type(&class(&r, "app.Holder")).unwrap();
    let pair = r.as_super_type(&holder, &class(&r, "app.Pair")).unwrap().unwrap();
    insta::assert_snapshot!(pair.to_string(), @"Pair<Str, Int?>");

    let first = r.as_member_of(&member(&r, "app.Pair", "first"), &holder).unwrap();
    let second = r.as_member_of(&member(&r, "app.Pair", "second"), &holder).unwrap();
    assert_eq!(first.to_string(), "Str");
    assert_eq!(second.to_string(), "Int?");
    assert!(second.is_marked_nullable());
}

#[test]
fn test_member_view_composes_across_three_levels() {
    let r = resolver(NullabilityPolicy::Flexible);
    let mid = class(&r, "app.Mid");
    let base = class(&r, "app.Base");
    let item = member(&r, "app.Base", "item");
    let items = member(&r, "app.Base", "items");

    let cases = [
        ("a", "Box<Str?>", "List<out Box<Str?>>"),
        ("b", "Box<Str?>", "List<out Box<Str?>>"),
        ("c", "Box<*>", "List<out Box<*>>"),
        ("d", "Box<out Str?>", "List<out Box<out Str?>>"),
        ("e", "Box<in Str?>", "List<out Box<in Str?>>"),
    ];
    for (property, item_text, items_text) in cases {
        let leaf = type_of(&r, &member(&r, "app.Uses", property));
        let via_mid = r.as_super_type(&leaf, &mid).unwrap().unwrap();
        let via_base = r.as_super_type(&leaf, &base).unwrap().unwrap();
        assert_eq!(r.as_super_type(&via_mid, &base).unwrap().unwrap(), via_base, "{property}");

        for (field, expected) in [(&item, item_text), (&items, items_text)] {
            let direct = r.as_member_of(field, &leaf).unwrap();
            assert_eq!(direct.to_string(), expected, "{property}.{}", field.name());
            assert_eq!(r.as_member_of(field, &via_mid).unwrap(), direct, "{property}.{}", field.name());
            assert_eq!(r.as_member_of(field, &via_base).unwrap(), direct, "{property}.{}", field.name());
        }
    }
}

#[test]
fn test_declared_type_of_generic_class() {
    let r = resolver(NullabilityPolicy::Flexible);
    let pair = r.declared_type(&class(&r, "app.Pair")).unwrap();
    insta::assert_snapshot!(pair.to_string(), @"Pair<A, B>");
    assert!(pair.arguments().iter().all(|a| a.ty.as_ref().is_some_and(Type::is_type_parameter)));
}

#[test]
fn test_nullability_policy_table() {
    let cases = [
        (NullabilityPolicy::Flexible, "Str!", "List<Str!>!"),
        (NullabilityPolicy::AssumeNullable, "Str?", "List<Str?>?"),
        (NullabilityPolicy::AssumeNotNull, "Str", "List<Str>"),
    ];
    for (policy, name, items) in cases {
        let r = resolver(policy);
        assert_eq!(type_of(&r, &member(&r, "legacy.Legacy", "name")).to_string(), name, "{policy:?}");
        assert_eq!(type_of(&r, &member(&r, "legacy.Legacy", "items")).to_string(), items, "{policy:?}");
    }
}

#[test]
fn test_platform_types_accept_both_nullabilities() {
    let r = resolver(NullabilityPolicy::Flexible);
    let platform = type_of(&r, &member(&r, "legacy.Legacy", "name"));
    let str_ty = r.declared_type(&class(&r, "base.Str")).unwrap();

    assert!(r.is_assignable_from(&platform, &str_ty.make_nullable()).unwrap());
    assert!(r.is_assignable_from(&str_ty, &platform).unwrap());
    assert!(!r.is_assignable_from(&str_ty, &str_ty.make_nullable()).unwrap());
}

#[test]
fn test_resolved_types_are_shared_per_reference() {
    let r = resolver(NullabilityPolicy::Flexible);
    let holder = class(&r, "app.Holder");
    let reference = r.facade().super_types(&holder)[0].clone();
    let once = r.resolve(&reference).unwrap();
    let twice = r.resolve(&reference).unwrap();
    assert_eq!(once, twice);
    assert!(Arc::ptr_eq(once.declaration(), twice.declaration()));
}

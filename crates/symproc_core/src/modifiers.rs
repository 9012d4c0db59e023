//! Define the declaration modifier vocabulary.
//!
//! This module is the single source of truth for modifiers a front-end may attach to a declaration: a stable
//! identifier ([`ModifierId`]) plus a const metadata table ([`MODIFIERS`]) that records canonical spellings,
//! aliases and categories.
//!
//! ## Notes
//! - Lookup via [`from_str`] is **case-sensitive**. Aliases cover the spellings of the foreign type system
//!   (e.g. `package-private`, `static`).
//! - Visibility is derived from the modifier set with [`visibility_of`]; the absence of a visibility modifier
//!   means public.
//!
//! ## Examples
//! ```rust
//! use symproc_core::modifiers::{self, ModifierId};
//!
//! assert_eq!(modifiers::from_str("open"), Some(ModifierId::Open));
//! assert_eq!(modifiers::as_str(ModifierId::Open), "open");
//! ```

use super::registry::{ItemInfo, Stability};

/// Stable identifier for every declaration modifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ModifierId {
    // Visibility
    Public,
    Internal,
    Protected,
    Private,

    // Inheritance
    Open,
    Final,
    Abstract,
    Sealed,
    Override,

    // Class shape
    Data,
    Inner,
    Companion,
    Value,

    // Members
    Const,
    Lateinit,
    Inline,
    Suspend,
    Operator,
    Infix,
    Static,
    External,

    // Parameters
    Vararg,
    Noinline,
    Crossinline,
    Reified,

    // Multiplatform
    Expect,
    Actual,
}

/// High-level grouping for documentation and tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModifierCategory {
    Visibility,
    Inheritance,
    ClassShape,
    Member,
    Parameter,
    Platform,
}

/// Metadata for a modifier.
#[derive(Debug, Clone, Copy)]
pub struct ModifierInfo {
    pub item: ItemInfo<ModifierId>,
    pub category: ModifierCategory,
}

/// Effective visibility of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Visibility {
    Private,
    Protected,
    Internal,
    Public,
}

/// Registry of all modifiers.
pub const MODIFIERS: &[ModifierInfo] = &[
    // Visibility
    info(ModifierId::Public, "public", &[], ModifierCategory::Visibility, "Visible everywhere."),
    info(
        ModifierId::Internal,
        "internal",
        &["package-private"],
        ModifierCategory::Visibility,
        "Visible inside the declaring module (or package for foreign declarations).",
    ),
    info(
        ModifierId::Protected,
        "protected",
        &[],
        ModifierCategory::Visibility,
        "Visible to subclasses.",
    ),
    info(
        ModifierId::Private,
        "private",
        &[],
        ModifierCategory::Visibility,
        "Visible inside the declaring scope only.",
    ),
    // Inheritance
    info(ModifierId::Open, "open", &[], ModifierCategory::Inheritance, "May be subclassed or overridden."),
    info(ModifierId::Final, "final", &[], ModifierCategory::Inheritance, "May not be subclassed or overridden."),
    info(
        ModifierId::Abstract,
        "abstract",
        &[],
        ModifierCategory::Inheritance,
        "Has no implementation; must be overridden.",
    ),
    info(
        ModifierId::Sealed,
        "sealed",
        &[],
        ModifierCategory::Inheritance,
        "Subclasses are restricted to the declaring module.",
    ),
    info(
        ModifierId::Override,
        "override",
        &[],
        ModifierCategory::Inheritance,
        "Overrides a supertype member.",
    ),
    // Class shape
    info(ModifierId::Data, "data", &[], ModifierCategory::ClassShape, "Value-like class with generated members."),
    info(ModifierId::Inner, "inner", &[], ModifierCategory::ClassShape, "Nested class holding an outer reference."),
    info(
        ModifierId::Companion,
        "companion",
        &[],
        ModifierCategory::ClassShape,
        "Object bound to its enclosing class.",
    ),
    info(ModifierId::Value, "value", &[], ModifierCategory::ClassShape, "Single-field inline value class."),
    // Members
    info(ModifierId::Const, "const", &[], ModifierCategory::Member, "Compile-time constant property."),
    info(
        ModifierId::Lateinit,
        "lateinit",
        &[],
        ModifierCategory::Member,
        "Non-null property initialized after construction.",
    ),
    info(ModifierId::Inline, "inline", &[], ModifierCategory::Member, "Function body inlined at call sites."),
    info(ModifierId::Suspend, "suspend", &[], ModifierCategory::Member, "Function may suspend."),
    info(ModifierId::Operator, "operator", &[], ModifierCategory::Member, "Function implements an operator."),
    info(ModifierId::Infix, "infix", &[], ModifierCategory::Member, "Function callable with infix notation."),
    info(
        ModifierId::Static,
        "static",
        &["jvm-static"],
        ModifierCategory::Member,
        "Member not bound to an instance (foreign type system).",
    ),
    info(
        ModifierId::External,
        "external",
        &["native"],
        ModifierCategory::Member,
        "Implementation provided outside the compilation.",
    ),
    // Parameters
    info(ModifierId::Vararg, "vararg", &[], ModifierCategory::Parameter, "Accepts a variable number of arguments."),
    info(ModifierId::Noinline, "noinline", &[], ModifierCategory::Parameter, "Lambda parameter is not inlined."),
    info(
        ModifierId::Crossinline,
        "crossinline",
        &[],
        ModifierCategory::Parameter,
        "Inlined lambda that may not return non-locally.",
    ),
    info(
        ModifierId::Reified,
        "reified",
        &[],
        ModifierCategory::Parameter,
        "Type parameter available at runtime.",
    ),
    // Multiplatform
    info(ModifierId::Expect, "expect", &[], ModifierCategory::Platform, "Platform-independent declaration."),
    info(ModifierId::Actual, "actual", &[], ModifierCategory::Platform, "Platform implementation of an expect."),
];

/// Canonical spelling.
pub fn as_str(id: ModifierId) -> &'static str {
    info_for(id).item.canonical
}

/// Accepted alias spellings.
pub fn aliases(id: ModifierId) -> &'static [&'static str] {
    info_for(id).item.aliases
}

/// Category.
pub fn category(id: ModifierId) -> ModifierCategory {
    info_for(id).category
}

/// Full metadata.
///
/// ## Panics
/// - If the registry is missing an entry for `id` (this indicates a programming error).
pub fn info_for(id: ModifierId) -> &'static ModifierInfo {
    MODIFIERS
        .iter()
        .find(|m| m.item.id == id)
        .expect("INVARIANT: modifier info missing from registry")
}

/// Lookup by spelling (canonical or alias).
///
/// ## Returns
/// - `Some(ModifierId)` if the spelling matches this registry.
/// - `None` otherwise.
pub fn from_str(s: &str) -> Option<ModifierId> {
    if let Some(m) = MODIFIERS.iter().find(|m| m.item.canonical == s) {
        return Some(m.item.id);
    }
    MODIFIERS
        .iter()
        .find(|m| {
            let aliases: &[&str] = m.item.aliases;
            aliases.contains(&s)
        })
        .map(|m| m.item.id)
}

/// Derive the effective visibility from a modifier set.
///
/// The most restrictive visibility modifier wins; no visibility modifier means [`Visibility::Public`].
pub fn visibility_of(modifiers: &[ModifierId]) -> Visibility {
    modifiers
        .iter()
        .filter_map(|m| match m {
            ModifierId::Private => Some(Visibility::Private),
            ModifierId::Protected => Some(Visibility::Protected),
            ModifierId::Internal => Some(Visibility::Internal),
            ModifierId::Public => Some(Visibility::Public),
            _ => None,
        })
        .min()
        .unwrap_or(Visibility::Public)
}

// --- helpers -----------------------------------------------------------------

const fn info(
    id: ModifierId,
    canonical: &'static str,
    aliases: &'static [&'static str],
    category: ModifierCategory,
    description: &'static str,
) -> ModifierInfo {
    ModifierInfo {
        item: ItemInfo {
            id,
            canonical,
            aliases,
            description,
            since_version: None,
            stability: Stability::Stable,
        },
        category,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_lookup() {
        assert_eq!(from_str("package-private"), Some(ModifierId::Internal));
        assert_eq!(from_str("native"), Some(ModifierId::External));
        assert_eq!(from_str("Open"), None);
    }

    #[test]
    fn test_visibility_defaults_to_public() {
        assert_eq!(visibility_of(&[ModifierId::Open, ModifierId::Data]), Visibility::Public);
    }

    #[test]
    fn test_most_restrictive_visibility_wins() {
        assert_eq!(
            visibility_of(&[ModifierId::Public, ModifierId::Private]),
            Visibility::Private
        );
        assert_eq!(
            visibility_of(&[ModifierId::Internal, ModifierId::Protected]),
            Visibility::Protected
        );
    }
}

//! Shareable metadata for registry-first vocabularies.
//!
//! Vocabularies in this crate (currently [`crate::modifiers`]) are const tables keyed by a stable id. This module
//! provides the small metadata types reused across them.
//!
//! ## Notes
//! - These types are `Copy` so registries can live in `const` tables.
//! - Metadata is meant for tooling/diagnostics; enforcement of declaration rules stays with the front-end.

/// Identify the engine version a vocabulary item is available since.
///
/// ## Examples
/// ```rust
/// use symproc_core::registry::SinceVersion;
///
/// let since: SinceVersion = "0.1.0";
/// assert!(!since.is_empty());
/// ```
pub type SinceVersion = &'static str;

/// Describe the lifecycle status of a vocabulary item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stability {
    Stable,
    Draft,
    Deprecated,
}

/// Shared metadata shape for registry-first vocabulary items.
///
/// Many vocabularies share the same core fields:
/// - stable identity (`id`)
/// - accepted spellings (`canonical` + `aliases`)
/// - documentation (`description`)
/// - provenance (`since_version`, `stability`)
///
/// Registries that need extra per-item data wrap this struct in an "extension" info type.
#[derive(Debug, Clone, Copy)]
pub struct ItemInfo<Id> {
    pub id: Id,
    pub canonical: &'static str,
    pub aliases: &'static [&'static str],
    pub description: &'static str,
    pub since_version: Option<SinceVersion>,
    pub stability: Stability,
}

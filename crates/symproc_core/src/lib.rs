//! Provide the shared, pure vocabulary of the symproc engine.
//!
//! This crate is intentionally small and dependency-light. It holds the value types that every layer of the
//! engine (front-end adapters, the symbol façade, the type resolver, the manifest) must agree on:
//! - qualified names,
//! - declaration modifiers (a registry-first vocabulary with canonical spellings),
//! - use-site / declaration-site variance,
//! - nullability, including the platform (flexible) nullability of foreign type systems,
//! - declaration origin and class kinds.
//!
//! ## Notes
//!
//! - This is a "vocabulary" crate: **no IO**, no global state, and no engine-specific types.
//! - Serialization support is behind the optional `serde` feature.

pub mod kinds;
pub mod modifiers;
pub mod names;
pub mod nullability;
pub mod registry;
pub mod variance;

pub use kinds::{ClassKind, Origin};
pub use modifiers::{ModifierId, Visibility};
pub use names::QualifiedName;
pub use nullability::Nullability;
pub use variance::Variance;

//! Nullability of type usages.

use std::fmt;

/// Nullability of a type usage.
///
/// `Platform` is the flexible nullability of foreign types: the declaring type system does not say whether the
/// value may be null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Nullability {
    #[default]
    NotNull,
    Nullable,
    Platform,
}

impl Nullability {
    /// Combine the nullability of a substituted argument with the nullability of the usage it replaces.
    ///
    /// Dominance is `Nullable > Platform > NotNull`.
    ///
    /// ## Examples
    /// ```rust
    /// use symproc_core::Nullability;
    ///
    /// assert_eq!(Nullability::NotNull.join(Nullability::Nullable), Nullability::Nullable);
    /// assert_eq!(Nullability::Platform.join(Nullability::NotNull), Nullability::Platform);
    /// ```
    pub fn join(self, other: Nullability) -> Nullability {
        match (self, other) {
            (Nullability::Nullable, _) | (_, Nullability::Nullable) => Nullability::Nullable,
            (Nullability::Platform, _) | (_, Nullability::Platform) => Nullability::Platform,
            _ => Nullability::NotNull,
        }
    }

    pub fn is_nullable(self) -> bool {
        self == Nullability::Nullable
    }

    /// Rendering suffix (`?`, `!` or empty).
    pub fn suffix(self) -> &'static str {
        match self {
            Nullability::NotNull => "",
            Nullability::Nullable => "?",
            Nullability::Platform => "!",
        }
    }
}

impl fmt::Display for Nullability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Nullability::NotNull => write!(f, "not-null"),
            Nullability::Nullable => write!(f, "nullable"),
            Nullability::Platform => write!(f, "platform"),
        }
    }
}

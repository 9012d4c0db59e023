//! Declaration origin and class kinds.

use std::fmt;

/// Where a declaration comes from.
///
/// Foreign origins come from a different type system that shares the compilation (their types carry platform
/// nullability). Library origins come from compiled dependencies rather than sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Origin {
    Source,
    Library,
    Foreign,
    ForeignLibrary,
    /// Produced by a processor in an earlier round.
    Generated,
    /// Made up by the engine (e.g. error symbols).
    Synthetic,
}

impl Origin {
    pub fn is_foreign(self) -> bool {
        matches!(self, Origin::Foreign | Origin::ForeignLibrary)
    }

    /// Whether declarations of this origin live in a file of the compilation.
    pub fn has_source_file(self) -> bool {
        matches!(self, Origin::Source | Origin::Foreign | Origin::Generated)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Source => "source",
            Origin::Library => "library",
            Origin::Foreign => "foreign",
            Origin::ForeignLibrary => "foreign_library",
            Origin::Generated => "generated",
            Origin::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The shape of a class-like declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ClassKind {
    #[default]
    Class,
    Interface,
    Enum,
    EnumEntry,
    Object,
    Annotation,
}

impl ClassKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassKind::Class => "class",
            ClassKind::Interface => "interface",
            ClassKind::Enum => "enum",
            ClassKind::EnumEntry => "enum_entry",
            ClassKind::Object => "object",
            ClassKind::Annotation => "annotation",
        }
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

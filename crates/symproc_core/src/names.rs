//! Qualified declaration names.
//!
//! A [`QualifiedName`] is a dot-separated path such as `com.example.Foo.bar`. The root package is the empty
//! name.

use std::fmt;

/// A dot-separated, fully qualified declaration name.
///
/// ## Examples
/// ```rust
/// use symproc_core::QualifiedName;
///
/// let name = QualifiedName::new("com.example.Foo");
/// assert_eq!(name.simple_name(), "Foo");
/// assert_eq!(name.qualifier().as_str(), "com.example");
/// assert_eq!(name.child("Impl").as_str(), "com.example.Foo.Impl");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct QualifiedName(String);

impl QualifiedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The root (empty) package name.
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The last segment (`Foo` for `com.example.Foo`).
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or("")
    }

    /// Everything before the last segment (`com.example` for `com.example.Foo`).
    pub fn qualifier(&self) -> QualifiedName {
        match self.0.rfind('.') {
            Some(idx) => Self(self.0[..idx].to_string()),
            None => Self::root(),
        }
    }

    /// Append one segment.
    pub fn child(&self, segment: &str) -> QualifiedName {
        if self.is_root() {
            Self(segment.to_string())
        } else {
            Self(format!("{}.{}", self.0, segment))
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.').filter(|s| !s.is_empty())
    }

    /// Whether `self` names a declaration inside `package` (directly or nested).
    pub fn is_in(&self, package: &QualifiedName) -> bool {
        package.is_root()
            || (self.0.len() > package.0.len()
                && self.0.starts_with(package.as_str())
                && self.0.as_bytes()[package.0.len()] == b'.')
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QualifiedName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for QualifiedName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_name() {
        let root = QualifiedName::root();
        assert!(root.is_root());
        assert_eq!(root.simple_name(), "");
        assert_eq!(root.child("Foo").as_str(), "Foo");
    }

    #[test]
    fn test_unqualified_name_has_root_qualifier() {
        let name = QualifiedName::new("Foo");
        assert!(name.qualifier().is_root());
        assert_eq!(name.simple_name(), "Foo");
    }

    #[test]
    fn test_is_in_package() {
        let name = QualifiedName::new("com.example.Foo");
        assert!(name.is_in(&QualifiedName::new("com.example")));
        assert!(name.is_in(&QualifiedName::new("com")));
        assert!(!name.is_in(&QualifiedName::new("com.ex")));
        assert!(name.is_in(&QualifiedName::root()));
    }

    #[test]
    fn test_segments_skip_empty() {
        let name = QualifiedName::new("a.b.c");
        assert_eq!(name.segments().collect::<Vec<_>>(), vec!["a", "b", "c"]);
        assert_eq!(QualifiedName::root().segments().count(), 0);
    }
}

//! Annotation usages as seen by processors.

use std::fmt;

use indexmap::IndexMap;

use crate::types::TypeReference;

/// One annotation usage: the annotation class plus its arguments in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Name as written at the usage site.
    pub short_name: String,
    /// Reference to the annotation class, resolved in the annotated declaration's scope.
    pub annotation_type: TypeReference,
    pub arguments: IndexMap<String, AnnotationValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
    Class(TypeReference),
    EnumConstant { enum_type: String, entry: String },
    Annotation(Box<Annotation>),
    Array(Vec<AnnotationValue>),
}

impl Annotation {
    /// Argument by name.
    pub fn argument(&self, name: &str) -> Option<&AnnotationValue> {
        self.arguments.get(name)
    }

    /// Whether the usage names `name`, compared by qualified name when `name` is qualified and by simple name
    /// otherwise.
    pub fn matches_name(&self, name: &str) -> bool {
        if self.short_name == name {
            return true;
        }
        let written_simple = self.short_name.rsplit('.').next().unwrap_or(&self.short_name);
        if name.contains('.') {
            // `name` is qualified: the written form must be a suffix of it on a segment boundary.
            name.strip_suffix(self.short_name.as_str())
                .is_some_and(|prefix| prefix.is_empty() || prefix.ends_with('.'))
        } else {
            written_simple == name
        }
    }
}

impl AnnotationValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AnnotationValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AnnotationValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for AnnotationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationValue::Bool(b) => write!(f, "{b}"),
            AnnotationValue::Int(i) => write!(f, "{i}"),
            AnnotationValue::Float(x) => write!(f, "{x}"),
            AnnotationValue::Char(c) => write!(f, "'{c}'"),
            AnnotationValue::Str(s) => write!(f, "{s:?}"),
            AnnotationValue::Class(r) => write!(f, "{}::class", r.native()),
            AnnotationValue::EnumConstant { enum_type, entry } => write!(f, "{enum_type}.{entry}"),
            AnnotationValue::Annotation(a) => write!(f, "{a}"),
            AnnotationValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.short_name)?;
        if !self.arguments.is_empty() {
            f.write_str("(")?;
            for (i, (name, value)) in self.arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{name} = {value}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

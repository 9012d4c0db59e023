//! Native type references and their textual form.
//!
//! Snapshots and declaration stubs spell type references as text (`Map<String, out List<T>>?`). This module
//! holds the native reference type and a small recursive-descent parser for that syntax:
//!
//! ```text
//! type := name ('<' arg (',' arg)* '>')? ('?' | '!')?
//! arg  := '*' | ('in' | 'out')? type
//! ```
//!
//! `?` marks a nullable usage, `!` a platform (flexible) usage from a foreign type system.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use symproc_core::{Nullability, Variance};

use super::NativeAnnotation;

/// A type reference as written in the front-end's native representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TypeRefRepr")]
pub struct NativeTypeRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<NativeTypeArg>,
    #[serde(default)]
    pub nullability: Nullability,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<NativeAnnotation>,
}

/// A type argument. `ty == None` is the star projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeTypeArg {
    #[serde(default)]
    pub variance: Variance,
    #[serde(default)]
    pub ty: Option<NativeTypeRef>,
}

impl NativeTypeArg {
    pub fn invariant(ty: NativeTypeRef) -> Self {
        Self {
            variance: Variance::Invariant,
            ty: Some(ty),
        }
    }

    pub fn star() -> Self {
        Self {
            variance: Variance::Star,
            ty: None,
        }
    }

    pub fn is_star(&self) -> bool {
        self.ty.is_none()
    }
}

impl NativeTypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: Vec::new(),
            nullability: Nullability::NotNull,
            annotations: Vec::new(),
        }
    }

    pub fn with_argument(mut self, arg: NativeTypeArg) -> Self {
        self.arguments.push(arg);
        self
    }

    pub fn with_nullability(mut self, nullability: Nullability) -> Self {
        self.nullability = nullability;
        self
    }

    pub fn with_annotation(mut self, annotation: NativeAnnotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Parse the textual form.
    ///
    /// ## Errors
    /// - [`TypeRefParseError`] with the byte position of the first unexpected character.
    pub fn parse(text: &str) -> Result<Self, TypeRefParseError> {
        let mut parser = Parser { src: text, pos: 0 };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != text.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }
}

impl FromStr for NativeTypeRef {
    type Err = TypeRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NativeTypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.arguments.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.arguments.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                match &arg.ty {
                    None => f.write_str("*")?,
                    Some(ty) => write!(f, "{}{}", arg.variance.label(), ty)?,
                }
            }
            f.write_str(">")?;
        }
        f.write_str(self.nullability.suffix())
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid type reference '{input}' at {position}: {message}")]
pub struct TypeRefParseError {
    pub input: String,
    pub position: usize,
    pub message: &'static str,
}

/// Either the textual form or the structured form.
#[derive(Deserialize)]
#[serde(untagged)]
enum TypeRefRepr {
    Text(String),
    Full {
        name: String,
        #[serde(default)]
        arguments: Vec<NativeTypeArg>,
        #[serde(default)]
        nullability: Nullability,
        #[serde(default)]
        annotations: Vec<NativeAnnotation>,
    },
}

impl TryFrom<TypeRefRepr> for NativeTypeRef {
    type Error = TypeRefParseError;

    fn try_from(repr: TypeRefRepr) -> Result<Self, Self::Error> {
        match repr {
            TypeRefRepr::Text(text) => NativeTypeRef::parse(&text),
            TypeRefRepr::Full {
                name,
                arguments,
                nullability,
                annotations,
            } => Ok(NativeTypeRef {
                name,
                arguments,
                nullability,
                annotations,
            }),
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn parse_type(&mut self) -> Result<NativeTypeRef, TypeRefParseError> {
        self.skip_ws();
        let name = self.parse_name()?;
        let mut ty = NativeTypeRef::named(name);

        self.skip_ws();
        if self.eat('<') {
            loop {
                let arg = self.parse_arg()?;
                ty.arguments.push(arg);
                self.skip_ws();
                if self.eat(',') {
                    continue;
                }
                if self.eat('>') {
                    break;
                }
                return Err(self.error("expected ',' or '>'"));
            }
            self.skip_ws();
        }

        if self.eat('?') {
            ty.nullability = Nullability::Nullable;
        } else if self.eat('!') {
            ty.nullability = Nullability::Platform;
        }
        Ok(ty)
    }

    fn parse_arg(&mut self) -> Result<NativeTypeArg, TypeRefParseError> {
        self.skip_ws();
        if self.eat('*') {
            return Ok(NativeTypeArg::star());
        }
        let variance = if self.eat_keyword("out") {
            Variance::Covariant
        } else if self.eat_keyword("in") {
            Variance::Contravariant
        } else {
            Variance::Invariant
        };
        let ty = self.parse_type()?;
        Ok(NativeTypeArg { variance, ty: Some(ty) })
    }

    fn parse_name(&mut self) -> Result<String, TypeRefParseError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' || c == '$' {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
        let name = &self.src[start..self.pos];
        if name.is_empty() || name.starts_with('.') || name.ends_with('.') || name.contains("..") {
            self.pos = start;
            return Err(self.error("expected a type name"));
        }
        Ok(name.to_string())
    }

    /// Consume `kw` only when it is followed by whitespace.
    fn eat_keyword(&mut self, kw: &str) -> bool {
        let rest = &self.src[self.pos..];
        if let Some(after) = rest.strip_prefix(kw) {
            if after.starts_with(char::is_whitespace) {
                self.pos += kw.len();
                return true;
            }
        }
        false
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn error(&self, message: &'static str) -> TypeRefParseError {
        TypeRefParseError {
            input: self.src.to_string(),
            position: self.pos,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_name() {
        let ty = NativeTypeRef::parse("com.example.Foo").unwrap();
        assert_eq!(ty.name, "com.example.Foo");
        assert!(ty.arguments.is_empty());
        assert_eq!(ty.nullability, Nullability::NotNull);
    }

    #[test]
    fn test_parse_projections_and_nullability() {
        let ty = NativeTypeRef::parse("Map<in K, out List<V?>>!").unwrap();
        assert_eq!(ty.nullability, Nullability::Platform);
        assert_eq!(ty.arguments[0].variance, Variance::Contravariant);
        assert_eq!(ty.arguments[1].variance, Variance::Covariant);
        let list = ty.arguments[1].ty.as_ref().unwrap();
        assert_eq!(list.arguments[0].ty.as_ref().unwrap().nullability, Nullability::Nullable);
    }

    #[test]
    fn test_parse_star() {
        let ty = NativeTypeRef::parse("Box<*>").unwrap();
        assert!(ty.arguments[0].is_star());
    }

    #[test]
    fn test_keyword_prefix_is_not_a_projection() {
        let ty = NativeTypeRef::parse("Box<outer.Type>").unwrap();
        let arg = &ty.arguments[0];
        assert_eq!(arg.variance, Variance::Invariant);
        assert_eq!(arg.ty.as_ref().unwrap().name, "outer.Type");
    }

    #[test]
    fn test_display_round_trips_text() {
        for text in ["Foo", "List<out T>?", "Map<String, *>", "Array<in Int>!"] {
            assert_eq!(NativeTypeRef::parse(text).unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_parse_errors() {
        assert!(NativeTypeRef::parse("").is_err());
        assert!(NativeTypeRef::parse("List<").is_err());
        assert!(NativeTypeRef::parse("List<Int").is_err());
        assert!(NativeTypeRef::parse("Foo Bar").is_err());
        assert!(NativeTypeRef::parse("a..b").is_err());
    }

    #[test]
    fn test_deserialize_text_or_structured() {
        let text: NativeTypeRef = serde_json::from_str(r#""List<Int>?""#).unwrap();
        let full: NativeTypeRef = serde_json::from_str(
            r#"{"name": "List", "arguments": [{"ty": "Int"}], "nullability": "nullable"}"#,
        )
        .unwrap();
        assert_eq!(text, full);
    }
}

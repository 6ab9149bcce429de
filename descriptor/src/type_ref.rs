//! Type references carried by descriptors

use crate::interner::Name;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;

/// Source-level text of a type plus array shape and type-use annotations.
///
/// `text` is the element type (`java.util.List<T>`, `int`), `array_depth`
/// counts trailing dimensions. A varargs parameter keeps its last dimension
/// and renders it as `...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeRef {
    text: Name,
    array_depth: u8,
    varargs: bool,
    annotations: Vec<Name>,
}

impl TypeRef {
    pub fn new(text: impl Into<Name>) -> Self {
        Self {
            text: text.into(),
            array_depth: 0,
            varargs: false,
            annotations: Vec::new(),
        }
    }

    pub fn void() -> Self {
        Self::new("void")
    }

    /// Parse rendered text such as `int[][]` or `String...`
    pub fn from_text(text: &str) -> Self {
        let mut element = text.trim();
        let mut depth = 0u8;
        let mut varargs = false;
        if let Some(stripped) = element.strip_suffix("...") {
            element = stripped;
            depth = 1;
            varargs = true;
        }
        while let Some(stripped) = element.strip_suffix("[]") {
            element = stripped;
            depth = depth.saturating_add(1);
        }
        Self {
            text: Name::from(element),
            array_depth: depth,
            varargs,
            annotations: Vec::new(),
        }
    }

    pub fn with_array_depth(mut self, depth: u8) -> Self {
        self.array_depth = depth;
        self
    }

    /// Mark as a varargs parameter type; only arrays can be varargs
    pub fn into_varargs(mut self) -> Self {
        self.varargs = self.array_depth > 0;
        self
    }

    pub(crate) fn from_parts(
        text: Name,
        array_depth: u8,
        varargs: bool,
        annotations: Vec<Name>,
    ) -> Self {
        Self {
            text,
            array_depth,
            varargs: varargs && array_depth > 0,
            annotations,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub(crate) fn text_name(&self) -> &Name {
        &self.text
    }

    pub const fn array_depth(&self) -> u8 {
        self.array_depth
    }

    pub const fn is_varargs(&self) -> bool {
        self.varargs
    }

    pub fn annotations(&self) -> &[Name] {
        &self.annotations
    }

    pub fn is_void(&self) -> bool {
        self.array_depth == 0 && &*self.text == "void"
    }

    /// Attach type-use annotations.
    ///
    /// Annotations already present are skipped, so applying the same set twice
    /// yields the same reference as applying it once.
    pub fn apply_annotations<'a>(&self, annotations: impl IntoIterator<Item = &'a Name>) -> Self {
        let mut resolved = self.clone();
        for annotation in annotations {
            if !resolved.annotations.contains(annotation) {
                resolved.annotations.push(annotation.clone());
            }
        }
        resolved
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for annotation in &self.annotations {
            write!(f, "@{} ", annotation)?;
        }
        f.write_str(&self.text)?;
        let brackets = if self.varargs {
            self.array_depth.saturating_sub(1)
        } else {
            self.array_depth
        };
        for _ in 0..brackets {
            f.write_str("[]")?;
        }
        if self.varargs {
            f.write_str("...")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TypeRef::new("int").to_string(), "int");
        assert_eq!(TypeRef::new("int").with_array_depth(2).to_string(), "int[][]");
        assert_eq!(
            TypeRef::new("java.lang.String")
                .with_array_depth(2)
                .into_varargs()
                .to_string(),
            "java.lang.String[]..."
        );
    }

    #[test]
    fn test_from_text() {
        let parsed = TypeRef::from_text("String...");
        assert_eq!(parsed.text(), "String");
        assert_eq!(parsed.array_depth(), 1);
        assert!(parsed.is_varargs());

        let parsed = TypeRef::from_text("long[][]");
        assert_eq!(parsed.text(), "long");
        assert_eq!(parsed.array_depth(), 2);
        assert!(!parsed.is_varargs());
    }

    #[test]
    fn test_varargs_requires_array() {
        assert!(!TypeRef::new("int").into_varargs().is_varargs());
    }

    #[test]
    fn test_apply_annotations_is_idempotent() {
        let nullable = Name::from("org.jetbrains.annotations.Nullable");
        let base = TypeRef::new("java.lang.String");

        let once = base.apply_annotations([&nullable]);
        let twice = once.apply_annotations([&nullable]);
        assert_eq!(once, twice);
        assert_eq!(
            once.to_string(),
            "@org.jetbrains.annotations.Nullable java.lang.String"
        );
        assert!(base.annotations().is_empty());
    }
}

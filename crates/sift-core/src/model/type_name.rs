//! Dotted binary type names.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Primitive descriptor characters and their source names.
const PRIMITIVES: &[(char, &str)] = &[
    ('B', "byte"),
    ('C', "char"),
    ('D', "double"),
    ('F', "float"),
    ('I', "int"),
    ('J', "long"),
    ('S', "short"),
    ('Z', "boolean"),
    ('V', "void"),
];

/// A type name in dotted binary form, e.g. `java.util.Map$Entry` or `int`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Convert from the slash-separated internal form (`java/lang/String`).
    pub fn from_internal(internal: &str) -> Self {
        Self(internal.replace('/', "."))
    }

    /// Parse a field descriptor. Arrays render with `[]` suffixes.
    pub fn from_descriptor(desc: &str) -> Option<Self> {
        let dims = desc.chars().take_while(|&c| c == '[').count();
        let element = &desc[dims..];
        let base = match element.chars().next()? {
            'L' => {
                let internal = element.strip_prefix('L')?.strip_suffix(';')?;
                Self::from_internal(internal).0
            }
            c if element.len() == 1 => Self::primitive(c)?.0,
            _ => return None,
        };
        Some(Self(format!("{base}{}", "[]".repeat(dims))))
    }

    /// The primitive type for a descriptor character.
    pub fn primitive(c: char) -> Option<Self> {
        PRIMITIVES
            .iter()
            .find(|(d, _)| *d == c)
            .map(|(_, name)| Self((*name).to_string()))
    }

    /// Descriptor character, if this is a primitive type.
    pub fn descriptor_char(&self) -> Option<char> {
        PRIMITIVES
            .iter()
            .find(|(_, name)| *name == self.0)
            .map(|(d, _)| *d)
    }

    pub fn is_primitive(&self) -> bool {
        self.descriptor_char().is_some()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Slash-separated internal form.
    pub fn internal_name(&self) -> String {
        self.0.replace('.', "/")
    }

    /// Name without package or enclosing classes: `Map$Entry` -> `Entry`.
    pub fn simple_name(&self) -> &str {
        let tail = self.0.rsplit('.').next().unwrap_or(&self.0);
        tail.rsplit('$').next().unwrap_or(tail)
    }

    pub fn package(&self) -> &str {
        self.0.rsplit_once('.').map(|(pkg, _)| pkg).unwrap_or("")
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

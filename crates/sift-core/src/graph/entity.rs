//! Entity graph node and edge types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::element::ElementId;
use crate::model::{Literal, TypeName};

/// Interned entity tag, e.g. `controller`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(Arc<str>);

impl EntityType {
    pub fn new(name: &str) -> Self {
        Self(Arc::from(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Run-unique entity id; doubles as the graph node index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Text(String),
    Number(i64),
    Decimal(f64),
    Bool(bool),
    Type(TypeName),
    Element(ElementId),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Type(t) => write!(f, "{t}"),
            Self::Element(e) => write!(f, "{e}"),
        }
    }
}

impl From<&Literal> for PropertyValue {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Str(s) => Self::Text(s.clone()),
            Literal::Int(v) => Self::Number(i64::from(*v)),
            Literal::Long(v) => Self::Number(*v),
            Literal::Float(v) => Self::Decimal(f64::from(*v)),
            Literal::Double(v) => Self::Decimal(*v),
            Literal::Bool(v) => Self::Bool(*v),
            Literal::Char(c) => Self::Text(c.to_string()),
            Literal::Type(t) => Self::Type(t.clone()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Ordered multimap of property values.
pub type Properties = Vec<(String, Vec<PropertyValue>)>;

/// Append `values` under `key`, keeping first-seen key order.
pub fn merge_property(properties: &mut Properties, key: &str, values: Vec<PropertyValue>) {
    match properties.iter_mut().find(|(k, _)| k == key) {
        Some((_, existing)) => existing.extend(values),
        None => properties.push((key.to_string(), values)),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: EntityId,
    pub entity_type: EntityType,
    pub label: String,
    pub element: ElementId,
    pub properties: Properties,
}

impl Entity {
    pub fn property(&self, key: &str) -> Option<&[PropertyValue]> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// First value of a property, rendered as text.
    pub fn property_text(&self, key: &str) -> Option<String> {
        self.property(key)
            .and_then(|v| v.first())
            .map(|v| v.to_string())
    }
}

/// Labeled parent -> child edge.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Relation {
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_convert_to_property_values() {
        assert_eq!(PropertyValue::from(&Literal::Int(7)), PropertyValue::Number(7));
        assert_eq!(
            PropertyValue::from(&Literal::Str("/owners".to_string())),
            PropertyValue::Text("/owners".to_string())
        );
        assert_eq!(
            PropertyValue::from(&Literal::Type(TypeName::new("app.Owner"))).to_string(),
            "app.Owner"
        );
    }

    #[test]
    fn merge_appends_under_existing_key() {
        let mut props = Properties::new();
        merge_property(&mut props, "path", vec!["/a".into()]);
        merge_property(&mut props, "verb", vec!["GET".into()]);
        merge_property(&mut props, "path", vec!["/b".into()]);
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].1, vec![PropertyValue::from("/a"), PropertyValue::from("/b")]);
    }

    #[test]
    fn entity_types_compare_by_name() {
        assert_eq!(EntityType::new("controller"), EntityType::from("controller"));
        let json = serde_json::to_string(&EntityType::new("endpoint")).unwrap();
        assert_eq!(json, "\"endpoint\"");
    }
}

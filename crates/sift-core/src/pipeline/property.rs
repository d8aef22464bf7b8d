//! Property strategies and label templates for entity actions.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::element::ElementId;
use crate::error::Result;
use crate::graph::{Properties, PropertyValue};
use crate::model::{Literal, TypeName};

use super::context::Context;
use super::predicate::declared_class_name;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z0-9_.\-]+)\}").unwrap());

fn default_field() -> String {
    "value".to_string()
}

/// How a property value is read from an element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum PropertyStrategy {
    Name,
    Label,
    AnnotationValue {
        annotation: TypeName,
        #[serde(default = "default_field")]
        field: String,
    },
    /// Declared type in readable generic form, specialized where inherited.
    ResolvedType,
    /// Declared type erased to a class name.
    ErasedType,
    Literal {
        value: Literal,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    pub key: String,
    pub value: PropertyStrategy,
}

impl PropertySpec {
    pub fn new(key: &str, value: PropertyStrategy) -> Self {
        Self {
            key: key.to_string(),
            value,
        }
    }

    pub fn annotation_value(key: &str, annotation: &str) -> Self {
        Self::new(
            key,
            PropertyStrategy::AnnotationValue {
                annotation: TypeName::new(annotation),
                field: default_field(),
            },
        )
    }
}

/// Evaluate every spec against `id`. Keys with no value are omitted.
pub fn evaluate(ctx: &mut Context, id: ElementId, specs: &[PropertySpec]) -> Result<Properties> {
    let mut properties = Properties::new();
    for spec in specs {
        let values = read(ctx, id, &spec.value)?;
        if !values.is_empty() {
            properties.push((spec.key.clone(), values));
        }
    }
    Ok(properties)
}

fn read(
    ctx: &mut Context,
    id: ElementId,
    strategy: &PropertyStrategy,
) -> Result<Vec<PropertyValue>> {
    Ok(match strategy {
        PropertyStrategy::Name => vec![PropertyValue::Text(ctx.index.name(id))],
        PropertyStrategy::Label => vec![PropertyValue::Text(ctx.index.label(id))],
        PropertyStrategy::AnnotationValue { annotation, field } => {
            annotation_values(ctx, id, annotation, field)
        }
        PropertyStrategy::ResolvedType => ctx
            .resolver
            .declared_type(&ctx.index, id)
            .map(|sig| PropertyValue::Text(sig.to_string()))
            .into_iter()
            .collect(),
        PropertyStrategy::ErasedType => declared_class_name(ctx, id)
            .map(PropertyValue::Type)
            .into_iter()
            .collect(),
        PropertyStrategy::Literal { value } => vec![PropertyValue::from(value)],
    })
}

/// Values of `field` on the element's `annotation`, interned as value
/// elements beneath the annotation element.
fn annotation_values(
    ctx: &mut Context,
    id: ElementId,
    annotation: &TypeName,
    field: &str,
) -> Vec<PropertyValue> {
    let Some(position) = ctx
        .index
        .annotation_nodes(id)
        .iter()
        .position(|a| a.type_name().as_ref() == Some(annotation))
    else {
        return Vec::new();
    };
    let literals = ctx.index.annotation_nodes(id)[position]
        .value(field)
        .map(|v| v.literals())
        .unwrap_or_default();
    let Some(&annotation_id) = ctx.index.annotations(id).get(position) else {
        return Vec::new();
    };
    literals
        .iter()
        .enumerate()
        .map(|(i, lit)| {
            ctx.index
                .intern_value(annotation_id, &format!("{field}[{i}]"), lit.clone());
            PropertyValue::from(lit)
        })
        .collect()
}

/// Substitute `${name}`, `${label}` and `${<property>}` placeholders.
/// Unknown placeholders render empty.
pub fn render_label(
    ctx: &Context,
    id: ElementId,
    template: &str,
    properties: &Properties,
) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| match &caps[1] {
            "name" => ctx.index.name(id),
            "label" => ctx.index.label(id),
            key => properties
                .iter()
                .find(|(k, _)| k == key)
                .and_then(|(_, v)| v.first())
                .map(|v| v.to_string())
                .unwrap_or_default(),
        })
        .into_owned()
}

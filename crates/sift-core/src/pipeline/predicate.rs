//! Side-effect free element tests used by `filter` and `fork`.

use serde::{Deserialize, Serialize};

use crate::element::{Element, ElementId};
use crate::error::Result;
use crate::graph::EntityType;
use crate::model::TypeName;

use super::context::Context;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "test", rename_all = "snake_case")]
pub enum Predicate {
    /// Regex search over the element name (qualified for classes and annotations).
    Name { pattern: String },
    /// Every flag in `flags` is set on a class, field or method.
    Modifiers { flags: u32 },
    AnnotatedBy { annotation: TypeName },
    /// `type_name` is a transitive supertype of the element's class.
    Implements { type_name: TypeName },
    /// The element's declared type erases to `type_name`.
    TypeIs { type_name: TypeName },
    HasEntity {
        #[serde(default)]
        entity: Option<EntityType>,
    },
    Synthetic,
    Not { predicate: Box<Predicate> },
    All { predicates: Vec<Predicate> },
    Any { predicates: Vec<Predicate> },
}

impl Predicate {
    pub fn name(pattern: &str) -> Self {
        Self::Name {
            pattern: pattern.to_string(),
        }
    }

    pub fn annotated_by(annotation: &str) -> Self {
        Self::AnnotatedBy {
            annotation: TypeName::new(annotation),
        }
    }

    pub fn implements(type_name: &str) -> Self {
        Self::Implements {
            type_name: TypeName::new(type_name),
        }
    }

    pub fn has_entity(entity: &str) -> Self {
        Self::HasEntity {
            entity: Some(EntityType::new(entity)),
        }
    }

    pub fn negate(self) -> Self {
        Self::Not {
            predicate: Box::new(self),
        }
    }

    pub fn test(&self, ctx: &mut Context, id: ElementId) -> Result<bool> {
        match self {
            Self::Name { pattern } => {
                let name = ctx.index.name(id);
                Ok(ctx.pattern(pattern)?.is_match(&name))
            }
            Self::Modifiers { flags } => {
                Ok(access_flags(ctx, id).is_some_and(|a| (a & flags) == *flags))
            }
            Self::AnnotatedBy { annotation } => {
                let own = match ctx.index.get(id) {
                    Some(Element::Annotation { .. }) => ctx
                        .index
                        .annotation_node(id)
                        .and_then(|a| a.type_name())
                        .is_some_and(|t| t == *annotation),
                    _ => false,
                };
                Ok(own
                    || ctx
                        .index
                        .annotation_nodes(id)
                        .iter()
                        .any(|a| a.type_name().as_ref() == Some(annotation)))
            }
            Self::Implements { type_name } => {
                let class = match ctx.index.get(id) {
                    Some(Element::Class { class }) => Some(*class),
                    _ => None,
                };
                let class = match class {
                    Some(c) => Some(c),
                    None => declared_class_name(ctx, id)
                        .and_then(|t| ctx.index.class_index_by_name(&t)),
                };
                Ok(class.is_some_and(|c| ctx.index.supertypes(c).contains(type_name)))
            }
            Self::TypeIs { type_name } => {
                Ok(declared_class_name(ctx, id).is_some_and(|t| t == *type_name))
            }
            Self::HasEntity { entity } => Ok(ctx.entities.find(id).is_some_and(|e| match entity {
                Some(t) => e.entity_type == *t,
                None => true,
            })),
            Self::Synthetic => Ok(id.is_synthetic()),
            Self::Not { predicate } => Ok(!predicate.test(ctx, id)?),
            Self::All { predicates } => {
                for p in predicates {
                    if !p.test(ctx, id)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Any { predicates } => {
                for p in predicates {
                    if p.test(ctx, id)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

fn access_flags(ctx: &Context, id: ElementId) -> Option<u32> {
    match ctx.index.get(id)? {
        Element::Class { .. } => ctx.index.class_node(id).map(|c| c.access),
        Element::Field { .. } => ctx.index.field_node(id).map(|(_, f)| f.access),
        Element::Method { .. } => ctx.index.method_node(id).map(|(_, m)| m.access),
        _ => None,
    }
}

/// Erased declared type of an element.
pub(crate) fn declared_class_name(ctx: &mut Context, id: ElementId) -> Option<TypeName> {
    let sig = ctx.resolver.declared_type(&ctx.index, id)?;
    Some(ctx.resolver.erasure(&ctx.index, &sig))
}

//! Error taxonomy for pipeline runs.

use thiserror::Error;

use crate::element::{ElementId, ElementKind};
use crate::graph::{EntityId, EntityType};
use crate::pipeline::ScopeKind;
use crate::signature::SignatureError;

pub type Result<T, E = SiftError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SiftError {
    /// Each element carries at most one entity type per run.
    #[error("element {element} is bound to `{existing_type}` entity {existing}, not `{attempted}`")]
    EntityAlreadyExists {
        element: ElementId,
        existing: EntityId,
        existing_type: EntityType,
        attempted: EntityType,
    },

    #[error("no entity is bound to element {element}")]
    EntityNotFound { element: ElementId },

    #[error("entity type `{0}` has not been registered")]
    EntityNotRegistered(EntityType),

    #[error("cannot resolve a `{parent}` entity for `{child}` entities under key `{key}`")]
    FailedToResolveParentRelation {
        parent: EntityType,
        key: String,
        child: EntityType,
    },

    /// Entity types are bound to one element kind for the whole run.
    #[error("entity type `{entity_type}` is bound to {existing} elements, not {attempted}")]
    IllegalEntityAssignment {
        entity_type: EntityType,
        existing: ElementKind,
        attempted: ElementKind,
    },

    #[error("expected a {expected} scope, found {found}")]
    IllegalGenericCast {
        expected: ScopeKind,
        found: ScopeKind,
    },

    #[error(transparent)]
    SignatureParsing(#[from] SignatureError),

    #[error("invalid name pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("pipeline serialization failed")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown element {0}")]
    UnknownElement(ElementId),

    #[error("failed to write {path}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

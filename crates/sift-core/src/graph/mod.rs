//! The entity graph produced by a pipeline run.

pub mod entity;
pub mod entity_service;

pub use entity::{
    merge_property, Entity, EntityId, EntityType, Properties, PropertyValue, Relation,
};
pub use entity_service::EntityService;

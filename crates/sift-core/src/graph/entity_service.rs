//! Entity graph backed by petgraph::DiGraph.
//!
//! `register` is the only way entities come into existence. The service
//! keeps the element <-> entity binding and a by-type index alongside the
//! graph; relation edges point from parent to child.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};

use crate::element::{ElementId, ElementKind};
use crate::error::{Result, SiftError};

use super::entity::{merge_property, Entity, EntityId, EntityType, Properties, Relation};

#[derive(Debug, Default)]
pub struct EntityService {
    graph: DiGraph<Entity, Relation>,
    by_element: HashMap<ElementId, NodeIndex>,
    by_type: BTreeMap<EntityType, Vec<NodeIndex>>,
    /// Element kind each entity type was first bound to.
    type_kinds: HashMap<EntityType, ElementKind>,
}

impl EntityService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `element` to an entity of `entity_type`.
    ///
    /// The first registration creates the entity. Registering the same
    /// element under the same type again merges into it: a new label
    /// replaces the old one and properties are appended.
    pub fn register(
        &mut self,
        entity_type: &EntityType,
        element: ElementId,
        kind: ElementKind,
        label: Option<String>,
        properties: Properties,
    ) -> Result<EntityId> {
        if let Some(&idx) = self.by_element.get(&element) {
            let entity = &mut self.graph[idx];
            if entity.entity_type != *entity_type {
                return Err(SiftError::EntityAlreadyExists {
                    element,
                    existing: entity.id,
                    existing_type: entity.entity_type.clone(),
                    attempted: entity_type.clone(),
                });
            }
            if let Some(label) = label {
                entity.label = label;
            }
            for (key, values) in properties {
                merge_property(&mut entity.properties, &key, values);
            }
            return Ok(entity.id);
        }

        if let Some(&existing) = self.type_kinds.get(entity_type) {
            if existing != kind {
                return Err(SiftError::IllegalEntityAssignment {
                    entity_type: entity_type.clone(),
                    existing,
                    attempted: kind,
                });
            }
        }

        let id = EntityId(self.graph.node_count() as u32);
        let idx = self.graph.add_node(Entity {
            id,
            entity_type: entity_type.clone(),
            label: label.unwrap_or_default(),
            element,
            properties,
        });
        self.by_element.insert(element, idx);
        self.by_type.entry(entity_type.clone()).or_default().push(idx);
        self.type_kinds.insert(entity_type.clone(), kind);
        Ok(id)
    }

    /// Mutate an already-bound entity.
    pub fn update(&mut self, id: EntityId, label: Option<String>, properties: Properties) -> bool {
        let Some(entity) = self.graph.node_weight_mut(NodeIndex::new(id.0 as usize)) else {
            return false;
        };
        if let Some(label) = label {
            entity.label = label;
        }
        for (key, values) in properties {
            merge_property(&mut entity.properties, &key, values);
        }
        true
    }

    /// Add a `key`-labeled edge; returns false when it already existed.
    pub fn add_child(&mut self, parent: EntityId, key: &str, child: EntityId) -> bool {
        let (p, c) = (Self::node(parent), Self::node(child));
        if self.graph.node_weight(p).is_none() || self.graph.node_weight(c).is_none() {
            return false;
        }
        if self
            .graph
            .edges_connecting(p, c)
            .any(|e| e.weight().key == key)
        {
            return false;
        }
        self.graph.add_edge(
            p,
            c,
            Relation {
                key: key.to_string(),
            },
        );
        true
    }

    fn node(id: EntityId) -> NodeIndex {
        NodeIndex::new(id.0 as usize)
    }

    // --- Queries ---

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.graph.node_weight(Self::node(id))
    }

    pub fn entity_for(&self, element: ElementId) -> Result<&Entity> {
        self.find(element)
            .ok_or(SiftError::EntityNotFound { element })
    }

    pub fn find(&self, element: ElementId) -> Option<&Entity> {
        self.by_element
            .get(&element)
            .and_then(|&idx| self.graph.node_weight(idx))
    }

    /// Entities of a type in registration order; empty for unknown types.
    pub fn entities_of(&self, entity_type: &EntityType) -> Vec<&Entity> {
        self.by_type
            .get(entity_type)
            .map(|nodes| nodes.iter().map(|&idx| &self.graph[idx]).collect())
            .unwrap_or_default()
    }

    pub fn entity_ids_of(&self, entity_type: &EntityType) -> Result<Vec<EntityId>> {
        self.by_type
            .get(entity_type)
            .map(|nodes| nodes.iter().map(|&idx| self.graph[idx].id).collect())
            .ok_or_else(|| SiftError::EntityNotRegistered(entity_type.clone()))
    }

    pub fn element_of(&self, id: EntityId) -> Option<ElementId> {
        self.entity(id).map(|e| e.element)
    }

    /// Element kind an entity type is bound to.
    pub fn kind_of(&self, entity_type: &EntityType) -> Option<ElementKind> {
        self.type_kinds.get(entity_type).copied()
    }

    /// Children grouped by relation key, keys and ids sorted.
    pub fn children(&self, id: EntityId) -> BTreeMap<String, Vec<EntityId>> {
        let mut result: BTreeMap<String, Vec<EntityId>> = BTreeMap::new();
        for edge in self.graph.edges_directed(Self::node(id), Direction::Outgoing) {
            result
                .entry(edge.weight().key.clone())
                .or_default()
                .push(self.graph[edge.target()].id);
        }
        for ids in result.values_mut() {
            ids.sort();
        }
        result
    }

    pub fn children_of(&self, id: EntityId, key: &str) -> Vec<EntityId> {
        self.children(id).remove(key).unwrap_or_default()
    }

    /// Reverse lookup: `(parent, key)` pairs pointing at this entity.
    pub fn parents(&self, id: EntityId) -> Vec<(EntityId, String)> {
        let mut result: Vec<(EntityId, String)> = self
            .graph
            .edges_directed(Self::node(id), Direction::Incoming)
            .map(|e| (self.graph[e.source()].id, e.weight().key.clone()))
            .collect();
        result.sort();
        result
    }

    /// All relation edges as `(parent, key, child)`, sorted.
    pub fn relations(&self) -> Vec<(EntityId, String, EntityId)> {
        let mut result: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| {
                (
                    self.graph[e.source()].id,
                    e.weight().key.clone(),
                    self.graph[e.target()].id,
                )
            })
            .collect();
        result.sort();
        result
    }

    pub fn types(&self) -> Vec<&EntityType> {
        self.by_type.keys().collect()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.graph.node_weights()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn relation_count(&self) -> usize {
        self.graph.edge_count()
    }
}

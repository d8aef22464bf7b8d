//! Exclusive per-run state.

use regex::Regex;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::config::AnalysisConfig;
use crate::element::{ElementId, ElementIndex};
use crate::error::{Result, SiftError};
use crate::graph::{Entity, EntityService, EntityType};
use crate::model::ClassNode;
use crate::relations::RelationScanner;
use crate::signature::SignatureResolver;
use crate::trace::{ElementTrace, MeasurementRecorder};

/// Everything one pipeline run owns. Nothing here outlives the run.
pub struct Context {
    pub config: AnalysisConfig,
    pub index: ElementIndex,
    pub resolver: SignatureResolver,
    pub entities: EntityService,
    pub trace: ElementTrace,
    pub measurements: MeasurementRecorder,
    pub scanner: RelationScanner,
    /// Descriptions of the actions currently executing, outermost first.
    pub path: Vec<String>,
    patterns: HashMap<String, Regex>,
}

impl Context {
    pub fn new(config: &AnalysisConfig, classes: Vec<ClassNode>) -> Self {
        Self {
            config: config.clone(),
            index: ElementIndex::new(classes),
            resolver: SignatureResolver::new(),
            entities: EntityService::new(),
            trace: ElementTrace::new(),
            measurements: MeasurementRecorder::new(config.record_measurements),
            scanner: RelationScanner::new(config.follow_lambdas),
            path: Vec::new(),
            patterns: HashMap::new(),
        }
    }

    /// Compiled pattern, cached for the run.
    pub fn pattern(&mut self, pattern: &str) -> Result<&Regex> {
        match self.patterns.entry(pattern.to_string()) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                let compiled = Regex::new(pattern).map_err(|source| SiftError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                })?;
                Ok(e.insert(compiled))
            }
        }
    }

    /// Entity of `entity_type` bound to `element` or its nearest ancestor.
    pub fn enclosing_entity(
        &self,
        element: ElementId,
        entity_type: &EntityType,
    ) -> Option<&Entity> {
        std::iter::once(element)
            .chain(self.trace.ancestors(&self.index, element))
            .find_map(|id| {
                self.entities
                    .find(id)
                    .filter(|e| e.entity_type == *entity_type)
            })
    }
}

//! Run configuration and the serialized result schema.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::graph::PropertyValue;
use crate::trace::Measurement;

/// Configuration for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Treat method handles captured by `invokedynamic` as calls.
    #[serde(default = "default_true")]
    pub follow_lambdas: bool,
    /// Record a measurement node per executed action.
    #[serde(default = "default_true")]
    pub record_measurements: bool,
    /// Fail an association when a child entity has no parent entity in
    /// either direction; otherwise the child is skipped with a warning.
    #[serde(default = "default_true")]
    pub strict_relations: bool,
}

fn default_true() -> bool {
    true
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            follow_lambdas: default_true(),
            record_measurements: default_true(),
            strict_relations: default_true(),
        }
    }
}

/// Snapshot of an entity graph, the JSON output schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub stats: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub entities: Vec<EntityOutput>,
    #[serde(default)]
    pub relations: Vec<RelationOutput>,
    /// Measurement tree of the run, empty when recording was disabled.
    #[serde(default)]
    pub measurements: Vec<Measurement>,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for GraphSnapshot {
    fn default() -> Self {
        Self {
            version: default_version(),
            metadata: HashMap::new(),
            stats: HashMap::new(),
            entities: Vec::new(),
            relations: Vec::new(),
            measurements: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityOutput {
    pub id: u32,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub label: String,
    pub element: i32,
    #[serde(default)]
    pub synthetic: bool,
    #[serde(default)]
    pub properties: BTreeMap<String, Vec<PropertyValue>>,
    /// Child entity ids by relation key.
    #[serde(default)]
    pub children: BTreeMap<String, Vec<u32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationOutput {
    pub source: u32,
    pub target: u32,
    pub key: String,
}

//! Shared test helpers for integration tests.

use std::path::{Path, PathBuf};

use sift_core::config::AnalysisConfig;
use sift_core::graph::{Entity, EntityType};
use sift_core::model::{AnnotationNode, AnnotationValue, ClassNode, Literal, TypeName};
use sift_core::pipeline::{run_pipeline, Pipeline, RunResult};

// ---------------------------------------------------------------------------
// Fixture path resolution
// ---------------------------------------------------------------------------

/// Resolve `tests/fixtures/{name}` relative to the workspace root.
pub fn fixture_path(name: &str) -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    Path::new(manifest_dir)
        .join("../../tests/fixtures")
        .join(name)
        .canonicalize()
        .unwrap_or_else(|_| {
            Path::new(manifest_dir)
                .join("../../tests/fixtures")
                .join(name)
        })
}

/// Load `{fixture}/classes.json` as class nodes.
pub fn load_classes(fixture: &str) -> Vec<ClassNode> {
    let path = fixture_path(fixture).join("classes.json");
    let json = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    serde_json::from_str(&json).unwrap()
}

/// Load `{fixture}/pipeline.json`.
pub fn load_pipeline(fixture: &str) -> Pipeline {
    let path = fixture_path(fixture).join("pipeline.json");
    let json = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()));
    Pipeline::from_json(&json).unwrap()
}

// ---------------------------------------------------------------------------
// Runners
// ---------------------------------------------------------------------------

/// Run a fixture's own pipeline over its classes with the default config.
pub fn run_fixture(fixture: &str) -> RunResult {
    run_pipeline(
        &AnalysisConfig::default(),
        load_classes(fixture),
        &load_pipeline(fixture),
    )
    .unwrap_or_else(|failure| panic!("{failure}"))
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

pub fn annotation(type_name: &str) -> AnnotationNode {
    AnnotationNode::new(&TypeName::new(type_name))
}

/// Annotation with a single string `value` element.
pub fn annotation_with_value(type_name: &str, value: &str) -> AnnotationNode {
    annotation(type_name).with_value(
        "value",
        AnnotationValue::Literal(Literal::Str(value.to_string())),
    )
}

pub fn class(name: &str) -> ClassNode {
    ClassNode::new(&TypeName::new(name))
}

// ---------------------------------------------------------------------------
// Extractors from RunResult
// ---------------------------------------------------------------------------

/// Labels of every entity of a type, sorted.
pub fn labels_of(result: &RunResult, entity_type: &str) -> Vec<String> {
    let mut labels: Vec<String> = result
        .entities
        .entities_of(&EntityType::new(entity_type))
        .into_iter()
        .map(|e| e.label.clone())
        .collect();
    labels.sort();
    labels
}

/// The single entity of a type with the given label.
pub fn entity_labelled<'a>(result: &'a RunResult, entity_type: &str, label: &str) -> &'a Entity {
    result
        .entities
        .entities_of(&EntityType::new(entity_type))
        .into_iter()
        .find(|e| e.label == label)
        .unwrap_or_else(|| panic!("no {entity_type} labelled {label}"))
}

/// Child labels of an entity under `key`, sorted.
pub fn child_labels(result: &RunResult, parent: &Entity, key: &str) -> Vec<String> {
    let mut labels: Vec<String> = result
        .entities
        .children_of(parent.id, key)
        .into_iter()
        .filter_map(|id| result.entities.entity(id))
        .map(|e| e.label.clone())
        .collect();
    labels.sort();
    labels
}

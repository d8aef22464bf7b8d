//! JSON snapshot of a finished run.

use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;

use crate::config::{EntityOutput, GraphSnapshot, RelationOutput};
use crate::error::{Result, SiftError};
use crate::pipeline::RunResult;

/// Build the serializable snapshot from a run result.
pub fn build_snapshot(result: &RunResult) -> GraphSnapshot {
    let mut metadata = HashMap::new();
    metadata.insert(
        "pipeline".to_string(),
        serde_json::Value::String(result.pipeline.clone()),
    );
    metadata.insert(
        "started_at".to_string(),
        serde_json::Value::String(result.started_at.clone()),
    );
    metadata.insert(
        "analysed_at".to_string(),
        serde_json::Value::String(Utc::now().to_rfc3339()),
    );
    metadata.insert(
        "core_version".to_string(),
        serde_json::Value::String(env!("CARGO_PKG_VERSION").to_string()),
    );
    metadata.insert(
        "duration_ms".to_string(),
        serde_json::json!((result.duration_ms * 10.0).round() / 10.0),
    );

    let entities: Vec<EntityOutput> = result
        .entities
        .entities()
        .map(|e| EntityOutput {
            id: e.id.0,
            entity_type: e.entity_type.to_string(),
            label: e.label.clone(),
            element: e.element.0,
            synthetic: e.element.is_synthetic(),
            properties: e.properties.iter().cloned().collect(),
            children: result
                .entities
                .children(e.id)
                .into_iter()
                .map(|(key, ids)| (key, ids.into_iter().map(|id| id.0).collect::<Vec<u32>>()))
                .collect(),
        })
        .collect();

    let relations: Vec<RelationOutput> = result
        .entities
        .relations()
        .into_iter()
        .map(|(source, key, target)| RelationOutput {
            source: source.0,
            target: target.0,
            key,
        })
        .collect();

    let mut per_type = serde_json::Map::new();
    for entity_type in result.entities.types() {
        per_type.insert(
            entity_type.to_string(),
            serde_json::json!(result.entities.entities_of(entity_type).len()),
        );
    }

    let mut stats = HashMap::new();
    stats.insert(
        "elements".to_string(),
        serde_json::json!(result.elements.len()),
    );
    stats.insert(
        "synthetic_elements".to_string(),
        serde_json::json!(result.elements.synthetic_count()),
    );
    stats.insert("entities".to_string(), serde_json::json!(entities.len()));
    stats.insert(
        "entities_by_type".to_string(),
        serde_json::Value::Object(per_type),
    );
    stats.insert("relations".to_string(), serde_json::json!(relations.len()));
    stats.insert(
        "signature_fallbacks".to_string(),
        serde_json::json!(result.signature_fallbacks),
    );

    GraphSnapshot {
        metadata,
        stats,
        entities,
        relations,
        measurements: result.measurements.clone(),
        ..Default::default()
    }
}

/// Write a snapshot as pretty-printed JSON, creating parent directories.
pub fn write_output(snapshot: &GraphSnapshot, output_path: &str) -> Result<()> {
    let io_error = |source| SiftError::Io {
        path: output_path.to_string(),
        source,
    };
    if let Some(parent) = Path::new(output_path).parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(output_path, json).map_err(io_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::model::{AnnotationNode, ClassNode, TypeName};
    use crate::pipeline::{run_pipeline, Action, Pipeline, Predicate};

    fn run() -> RunResult {
        let classes = vec![
            ClassNode::new(&TypeName::new("app.OwnerController"))
                .with_annotation(AnnotationNode::new(&TypeName::new("web.Controller"))),
            ClassNode::new(&TypeName::new("app.Owner")),
        ];
        let pipeline = Pipeline::new(
            "controllers",
            Action::chain(vec![
                Action::Classes,
                Action::filter(Predicate::annotated_by("web.Controller")),
                Action::register("controller"),
            ]),
        );
        run_pipeline(&AnalysisConfig::default(), classes, &pipeline).unwrap()
    }

    #[test]
    fn snapshot_counts_entities() {
        let snapshot = build_snapshot(&run());
        assert_eq!(snapshot.version, "1.0");
        assert_eq!(snapshot.entities.len(), 1);
        assert_eq!(snapshot.entities[0].entity_type, "controller");
        assert_eq!(snapshot.entities[0].label, "OwnerController");
        assert!(!snapshot.entities[0].synthetic);
        assert_eq!(snapshot.stats["entities"], serde_json::json!(1));
        assert_eq!(
            snapshot.stats["entities_by_type"]["controller"],
            serde_json::json!(1)
        );
        assert!(snapshot.metadata.contains_key("analysed_at"));
        assert_eq!(snapshot.measurements.len(), 1);
    }

    #[test]
    fn write_output_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/graph.json");
        let path = path.to_string_lossy().to_string();
        write_output(&build_snapshot(&run()), &path).unwrap();
        let written: GraphSnapshot =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written.entities.len(), 1);
        assert!(written.relations.is_empty());
    }
}

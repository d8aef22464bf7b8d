//! Pipeline definitions and the run entrypoint.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;

use crate::config::AnalysisConfig;
use crate::element::{ElementId, ElementIndex};
use crate::error::{Result, SiftError};
use crate::graph::EntityService;
use crate::model::ClassNode;
use crate::trace::{ElementTrace, Measurement};

pub mod action;
pub mod context;
pub mod interpreter;
pub mod predicate;
pub mod property;
pub mod scope;

pub use action::{Action, RelationKind, SynthesisTarget};
pub use context::Context;
pub use predicate::Predicate;
pub use property::{PropertySpec, PropertyStrategy};
pub use scope::{Scope, ScopeKind};

/// A named, serializable action tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    pub action: Action,
}

impl Pipeline {
    pub fn new(name: &str, action: Action) -> Self {
        Self {
            name: name.to_string(),
            action,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Everything a successful run produced.
#[derive(Debug)]
pub struct RunResult {
    pub pipeline: String,
    pub elements: ElementIndex,
    pub entities: EntityService,
    pub trace: ElementTrace,
    pub measurements: Vec<Measurement>,
    /// RFC 3339 start time.
    pub started_at: String,
    pub duration_ms: f64,
    pub signature_fallbacks: usize,
}

impl RunResult {
    /// Ancestor chain explaining why an element is part of the run.
    pub fn explain(&self, element: ElementId) -> Vec<String> {
        self.trace.explain(&self.elements, element)
    }
}

/// A run aborted by `error` while executing `action`.
#[derive(Debug, Error)]
#[error("pipeline failed in `{action}`: {error}")]
pub struct PipelineFailure {
    #[source]
    pub error: SiftError,
    /// Path of action descriptions from the root to the failing action.
    pub action: String,
    pub measurements: Vec<Measurement>,
    pub trace: ElementTrace,
}

/// Discover `classes` and interpret `pipeline` against them in one pass.
pub fn run_pipeline(
    config: &AnalysisConfig,
    classes: Vec<ClassNode>,
    pipeline: &Pipeline,
) -> std::result::Result<RunResult, Box<PipelineFailure>> {
    let started_at = Utc::now().to_rfc3339();
    let start = Instant::now();
    let mut ctx = Context::new(config, classes);
    log::debug!(
        "pipeline {}: {} elements discovered",
        pipeline.name,
        ctx.index.len()
    );

    match interpreter::execute(&mut ctx, &pipeline.action, Scope::Template) {
        Ok(_) => Ok(RunResult {
            pipeline: pipeline.name.clone(),
            signature_fallbacks: ctx.resolver.fallbacks(),
            elements: ctx.index,
            entities: ctx.entities,
            trace: ctx.trace,
            measurements: ctx.measurements.finish(),
            started_at,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
        }),
        Err(error) => {
            ctx.measurements.fail(ctx.entities.len());
            let action = ctx.path.join(" > ");
            log::debug!("pipeline {} failed in {action}: {error}", pipeline.name);
            Err(Box::new(PipelineFailure {
                error,
                action,
                measurements: ctx.measurements.finish(),
                trace: ctx.trace,
            }))
        }
    }
}

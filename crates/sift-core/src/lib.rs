//! Sift Core — architecture modelling over compiled class files.
//!
//! This crate contains the analysis engine: the element model over parsed
//! class nodes, generic signature parsing and specialization, the pipeline
//! interpreter, the entity graph, and call-graph relationship resolution.

pub mod config;
pub mod element;
pub mod error;
pub mod graph;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod relations;
pub mod signature;
pub mod trace;

pub use config::{AnalysisConfig, GraphSnapshot};
pub use element::{Element, ElementId, ElementIndex, ElementKind};
pub use error::{Result, SiftError};
pub use graph::{Entity, EntityId, EntityService, EntityType};
pub use pipeline::{run_pipeline, Action, Pipeline, PipelineFailure, RunResult};

//! Provenance per element and a measurement tree per action invocation.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use crate::element::{ElementId, ElementIndex};
use crate::pipeline::ScopeKind;

/// Records which elements caused others to be produced, beyond the
/// structural parent (e.g. a class reached by exploding a parameter type).
#[derive(Debug, Clone, Default)]
pub struct ElementTrace {
    provenance: HashMap<ElementId, Vec<ElementId>>,
}

impl ElementTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, element: ElementId, cause: ElementId) {
        if element == cause {
            return;
        }
        let causes = self.provenance.entry(element).or_default();
        if !causes.contains(&cause) {
            causes.push(cause);
        }
    }

    pub fn causes(&self, element: ElementId) -> &[ElementId] {
        self.provenance
            .get(&element)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.provenance.len()
    }

    pub fn is_empty(&self) -> bool {
        self.provenance.is_empty()
    }

    /// Structural parents and recorded causes, breadth-first, nearest first.
    pub fn ancestors(&self, index: &ElementIndex, element: ElementId) -> Vec<ElementId> {
        let mut result = Vec::new();
        let mut visited: HashSet<ElementId> = HashSet::from([element]);
        let mut queue: VecDeque<ElementId> = VecDeque::from([element]);
        while let Some(current) = queue.pop_front() {
            let next = index
                .parent(current)
                .into_iter()
                .chain(self.causes(current).iter().copied());
            for ancestor in next {
                if visited.insert(ancestor) {
                    result.push(ancestor);
                    queue.push_back(ancestor);
                }
            }
        }
        result
    }

    /// "Why does this element exist": the element followed by its ancestors, as labels.
    pub fn explain(&self, index: &ElementIndex, element: ElementId) -> Vec<String> {
        std::iter::once(element)
            .chain(self.ancestors(index, element))
            .map(|id| {
                let kind = index.kind(id).map(|k| k.as_str()).unwrap_or("?");
                format!("{} {} {}", id, kind, index.label(id))
            })
            .collect()
    }
}

/// One action invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub action: String,
    pub scope_in: ScopeKind,
    pub scope_out: Option<ScopeKind>,
    pub input: usize,
    pub output: usize,
    pub duration_us: u64,
    pub entities_delta: i64,
    #[serde(default)]
    pub failed: bool,
    #[serde(default)]
    pub children: Vec<Measurement>,
}

impl Measurement {
    /// Action names from this node down to the first failed leaf.
    pub fn failure_path(&self) -> Option<Vec<&str>> {
        if !self.failed {
            return None;
        }
        let mut path = vec![self.action.as_str()];
        if let Some(rest) = self.children.iter().find_map(|c| c.failure_path()) {
            path.extend(rest);
        }
        Some(path)
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(|c| c.node_count()).sum::<usize>()
    }
}

struct OpenMeasurement {
    node: Measurement,
    started: Instant,
    entities_before: usize,
}

/// Builds the measurement tree while the interpreter recurses.
pub struct MeasurementRecorder {
    enabled: bool,
    open: Vec<OpenMeasurement>,
    roots: Vec<Measurement>,
}

impl MeasurementRecorder {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            open: Vec::new(),
            roots: Vec::new(),
        }
    }

    pub fn begin(&mut self, action: &str, scope_in: ScopeKind, input: usize, entities: usize) {
        if !self.enabled {
            return;
        }
        self.open.push(OpenMeasurement {
            node: Measurement {
                action: action.to_string(),
                scope_in,
                scope_out: None,
                input,
                output: 0,
                duration_us: 0,
                entities_delta: 0,
                failed: false,
                children: Vec::new(),
            },
            started: Instant::now(),
            entities_before: entities,
        });
    }

    pub fn end(&mut self, scope_out: ScopeKind, output: usize, entities: usize) {
        self.close(Some(scope_out), output, entities, false);
    }

    /// Close every open node as failed so the partial tree stays well formed.
    pub fn fail(&mut self, entities: usize) {
        while !self.open.is_empty() {
            self.close(None, 0, entities, true);
        }
    }

    fn close(
        &mut self,
        scope_out: Option<ScopeKind>,
        output: usize,
        entities: usize,
        failed: bool,
    ) {
        let Some(open) = self.open.pop() else {
            return;
        };
        let mut node = open.node;
        node.scope_out = scope_out;
        node.output = output;
        node.duration_us = open.started.elapsed().as_micros() as u64;
        node.entities_delta = entities as i64 - open.entities_before as i64;
        node.failed = failed;
        match self.open.last_mut() {
            Some(parent) => parent.node.children.push(node),
            None => self.roots.push(node),
        }
    }

    pub fn finish(self) -> Vec<Measurement> {
        self.roots
    }
}

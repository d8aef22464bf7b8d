//! Instantiation and invocation edges from a static call-graph scan.
//!
//! Each method's instructions are scanned once per run. Reachability from a
//! start method follows calls into discovered (or synthesized) methods,
//! guarded by a visited set, and is memoized per start so shared call
//! subgraphs are walked once.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

use crate::element::{Element, ElementId, ElementIndex, ElementKind};
use crate::graph::{EntityId, EntityService, EntityType};
use crate::model::{Instruction, TypeName};
use crate::pipeline::RelationKind;

pub const BACKTRACK: &str = "backtrack";

#[derive(Debug, Default)]
struct DirectRefs {
    instantiated: Vec<ElementId>,
    /// Classes named as the owner of an invoked method.
    receivers: Vec<ElementId>,
    callees: Vec<ElementId>,
}

/// Everything a method reaches through calls, transitively.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Reachable {
    /// Called methods; the start only appears when a cycle leads back to it.
    pub methods: BTreeSet<ElementId>,
    pub instantiated: BTreeSet<ElementId>,
    pub receivers: BTreeSet<ElementId>,
}

impl Reachable {
    fn merge(&mut self, other: &Reachable) {
        self.methods.extend(other.methods.iter().copied());
        self.instantiated.extend(other.instantiated.iter().copied());
        self.receivers.extend(other.receivers.iter().copied());
    }
}

#[derive(Debug)]
pub struct RelationScanner {
    follow_lambdas: bool,
    direct: HashMap<ElementId, Rc<DirectRefs>>,
    reachable: HashMap<ElementId, Rc<Reachable>>,
}

impl RelationScanner {
    pub fn new(follow_lambdas: bool) -> Self {
        Self {
            follow_lambdas,
            direct: HashMap::new(),
            reachable: HashMap::new(),
        }
    }

    /// Methods whose instructions have been scanned so far.
    pub fn scanned(&self) -> usize {
        self.direct.len()
    }

    fn direct(&mut self, index: &ElementIndex, method: ElementId) -> Rc<DirectRefs> {
        if let Some(refs) = self.direct.get(&method) {
            return Rc::clone(refs);
        }
        let mut refs = DirectRefs::default();
        if let Some((_, node)) = index.method_node(method) {
            for insn in &node.instructions {
                match insn {
                    Instruction::New { type_name } => {
                        let type_name = TypeName::from_internal(type_name);
                        if let Some(class) = index.class_by_name(&type_name) {
                            refs.instantiated.push(class);
                        }
                    }
                    Instruction::Invoke {
                        owner, name, desc, ..
                    } => {
                        let owner = TypeName::from_internal(owner);
                        if let Some(class) = index.class_by_name(&owner) {
                            refs.receivers.push(class);
                        }
                        if let Some(callee) = index.resolve_method(&owner, name, desc) {
                            refs.callees.push(callee);
                        }
                    }
                    Instruction::InvokeDynamic { handles, .. } if self.follow_lambdas => {
                        for handle in handles {
                            let owner = TypeName::from_internal(&handle.owner);
                            if let Some(callee) =
                                index.resolve_method(&owner, &handle.name, &handle.desc)
                            {
                                refs.callees.push(callee);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        let refs = Rc::new(refs);
        self.direct.insert(method, Rc::clone(&refs));
        refs
    }

    pub fn reachable(&mut self, index: &ElementIndex, start: ElementId) -> Rc<Reachable> {
        if let Some(r) = self.reachable.get(&start) {
            return Rc::clone(r);
        }
        let mut result = Reachable::default();
        let mut visited: HashSet<ElementId> = HashSet::from([start]);
        let mut stack = vec![start];
        while let Some(method) = stack.pop() {
            let refs = self.direct(index, method);
            result.instantiated.extend(refs.instantiated.iter().copied());
            result.receivers.extend(refs.receivers.iter().copied());
            for &callee in &refs.callees {
                result.methods.insert(callee);
                if !visited.insert(callee) {
                    continue;
                }
                if let Some(memo) = self.reachable.get(&callee).cloned() {
                    visited.extend(memo.methods.iter().copied());
                    result.merge(&memo);
                    continue;
                }
                stack.push(callee);
            }
        }
        let result = Rc::new(result);
        self.reachable.insert(start, Rc::clone(&result));
        result
    }

    /// Scan roots for a source element: a method itself, or every method a
    /// class declares.
    fn roots(index: &ElementIndex, source: ElementId) -> Vec<ElementId> {
        match index.kind(source) {
            Some(ElementKind::Method) => vec![source],
            Some(ElementKind::Class) => index
                .children(source)
                .iter()
                .copied()
                .filter(|c| index.kind(*c) == Some(ElementKind::Method))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Add `key` edges from every `source` entity to each `target` entity its
/// call graph instantiates or invokes. Returns the number of new edges.
#[allow(clippy::too_many_arguments)]
pub fn relate(
    scanner: &mut RelationScanner,
    index: &ElementIndex,
    entities: &mut EntityService,
    kind: RelationKind,
    source: &EntityType,
    target: &EntityType,
    key: &str,
    backtrack: bool,
) -> usize {
    let targets: HashMap<ElementId, EntityId> = entities
        .entities_of(target)
        .into_iter()
        .map(|e| (e.element, e.id))
        .collect();
    let sources: Vec<(EntityId, ElementId)> = entities
        .entities_of(source)
        .into_iter()
        .map(|e| (e.id, e.element))
        .collect();
    if targets.is_empty() || sources.is_empty() {
        log::debug!("{}: no {source} or {target} entities", kind.as_str());
        return 0;
    }

    let mut added = 0;
    for (source_entity, element) in sources {
        let mut reach = Reachable::default();
        for root in RelationScanner::roots(index, element) {
            reach.merge(&scanner.reachable(index, root));
        }
        let mut matched: BTreeSet<EntityId> = BTreeSet::new();
        match kind {
            RelationKind::Instantiates => {
                matched.extend(reach.instantiated.iter().filter_map(|c| targets.get(c)));
            }
            RelationKind::Invokes => {
                for method in &reach.methods {
                    if let Some(&t) = targets.get(method) {
                        matched.insert(t);
                    } else if let Some(Element::Method { owner, .. }) = index.get(*method) {
                        matched.extend(targets.get(owner));
                    }
                }
                matched.extend(reach.receivers.iter().filter_map(|c| targets.get(c)));
            }
        }
        for target_entity in matched {
            if target_entity == source_entity {
                continue;
            }
            if entities.add_child(source_entity, key, target_entity) {
                added += 1;
            }
            if backtrack {
                entities.add_child(target_entity, BACKTRACK, source_entity);
            }
        }
    }
    log::debug!(
        "{}: {added} edges from {source} to {target}, {} methods scanned",
        kind.as_str(),
        scanner.scanned()
    );
    added
}

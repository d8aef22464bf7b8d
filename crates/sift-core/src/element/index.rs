//! Per-run element arena with a stable identity index.
//!
//! Construction discovers every input class into a fixed tree of member
//! elements. Derived elements (signatures, values, inherited members) are
//! interned on demand through the same identity map, so revisiting a
//! construct always yields the element it produced the first time.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::element::{Element, ElementId, ElementKind};
use crate::model::{access, AnnotationNode, ClassNode, FieldNode, Literal, MethodNode, TypeName};
use crate::signature::{self, TypeSignature};

/// Which signature of an owner element a signature element stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureSlot {
    /// Declared type of a field or parameter, or a method's return type.
    Declared,
    /// The n-th type argument of a signature element.
    Argument(usize),
}

/// Identity of the underlying construct an element stands for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NodeKey {
    Class(usize),
    Field {
        class: usize,
        field: usize,
        seen_from: usize,
    },
    Method {
        class: usize,
        method: usize,
        seen_from: usize,
    },
    Parameter {
        method: ElementId,
        index: usize,
    },
    Annotation {
        owner: ElementId,
        index: usize,
    },
    Signature {
        owner: ElementId,
        slot: SignatureSlot,
    },
    Value {
        owner: ElementId,
        key: String,
    },
}

#[derive(Debug)]
pub struct ElementIndex {
    classes: Vec<ClassNode>,
    /// `classes[..discovered]` came from the input; the rest were synthesized.
    discovered: usize,
    elements: Vec<Element>,
    synthetic: Vec<Element>,
    identity: HashMap<NodeKey, ElementId>,
    class_names: HashMap<TypeName, usize>,
    children: HashMap<ElementId, Vec<ElementId>>,
    method_keys: HashMap<(usize, String, String), usize>,
}

impl ElementIndex {
    /// Discover every class, in input order.
    pub fn new(classes: Vec<ClassNode>) -> Self {
        let discovered = classes.len();
        let mut index = Self {
            classes,
            discovered,
            elements: Vec::new(),
            synthetic: Vec::new(),
            identity: HashMap::new(),
            class_names: HashMap::new(),
            children: HashMap::new(),
            method_keys: HashMap::new(),
        };
        for class in 0..discovered {
            index.discover(class);
        }
        index
    }

    fn discover(&mut self, class: usize) {
        let type_name = self.classes[class].type_name();
        if self.class_names.contains_key(&type_name) {
            log::warn!("duplicate class {type_name}, keeping the first definition");
        } else {
            self.class_names.insert(type_name, class);
        }
        for (i, m) in self.classes[class].methods.iter().enumerate() {
            self.method_keys
                .entry((class, m.name.clone(), m.desc.clone()))
                .or_insert(i);
        }

        let class_id = self.intern(NodeKey::Class(class), Element::Class { class });
        let mut class_children = self.annotations(class_id);

        for field in 0..self.classes[class].fields.len() {
            let field_id = self.member(ElementKind::Field, class, field, class);
            let annotations = self.annotations(field_id);
            self.children.insert(field_id, annotations);
            class_children.push(field_id);
        }
        for method in 0..self.classes[class].methods.len() {
            let method_id = self.member(ElementKind::Method, class, method, class);
            let mut method_children = self.annotations(method_id);
            for param in self.parameters(method_id) {
                let annotations = self.annotations(param);
                self.children.insert(param, annotations);
                method_children.push(param);
            }
            self.children.insert(method_id, method_children);
            class_children.push(method_id);
        }
        self.children.insert(class_id, class_children);
    }

    /// Return the element for `key`, creating it from `element` on first sight.
    pub fn intern(&mut self, key: NodeKey, element: Element) -> ElementId {
        if let Some(&id) = self.identity.get(&key) {
            return id;
        }
        let id = if self.derives_synthetic(&element) {
            let id = ElementId(-(self.synthetic.len() as i32));
            self.synthetic.push(element);
            id
        } else {
            self.elements.push(element);
            ElementId(self.elements.len() as i32)
        };
        self.identity.insert(key, id);
        id
    }

    fn derives_synthetic(&self, element: &Element) -> bool {
        match element {
            Element::Class { class } => *class >= self.discovered,
            Element::Field { class, owner, .. } | Element::Method { class, owner, .. } => {
                *class >= self.discovered || owner.is_synthetic()
            }
            other => other.parent().is_some_and(|p| p.is_synthetic()),
        }
    }

    fn member(
        &mut self,
        kind: ElementKind,
        class: usize,
        member: usize,
        seen_from: usize,
    ) -> ElementId {
        let owner = self.intern(NodeKey::Class(seen_from), Element::Class { class: seen_from });
        let origin = (seen_from != class).then(|| self.member(kind, class, member, class));
        match kind {
            ElementKind::Field => self.intern(
                NodeKey::Field { class, field: member, seen_from },
                Element::Field { class, field: member, owner, origin },
            ),
            _ => self.intern(
                NodeKey::Method { class, method: member, seen_from },
                Element::Method { class, method: member, owner, origin },
            ),
        }
    }

    // --- Lookup ---

    pub fn get(&self, id: ElementId) -> Option<&Element> {
        if id.0 > 0 {
            self.elements.get(id.0 as usize - 1)
        } else {
            self.synthetic.get(id.0.unsigned_abs() as usize)
        }
    }

    pub fn kind(&self, id: ElementId) -> Option<ElementKind> {
        self.get(id).map(Element::kind)
    }

    pub fn parent(&self, id: ElementId) -> Option<ElementId> {
        self.get(id).and_then(Element::parent)
    }

    /// Discovered children, in declaration order.
    pub fn children(&self, id: ElementId) -> &[ElementId] {
        self.children.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// All class elements: discovered first, then synthesized.
    pub fn classes(&self) -> Vec<ElementId> {
        (0..self.classes.len())
            .filter_map(|c| self.identity.get(&NodeKey::Class(c)).copied())
            .collect()
    }

    pub fn class_by_name(&self, type_name: &TypeName) -> Option<ElementId> {
        self.class_names
            .get(type_name)
            .and_then(|&c| self.identity.get(&NodeKey::Class(c)).copied())
    }

    pub fn class_index_by_name(&self, type_name: &TypeName) -> Option<usize> {
        self.class_names.get(type_name).copied()
    }

    pub fn class_at(&self, class: usize) -> Option<&ClassNode> {
        self.classes.get(class)
    }

    /// Number of discovered plus synthesized elements.
    pub fn len(&self) -> usize {
        self.elements.len() + self.synthetic.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn synthetic_count(&self) -> usize {
        self.synthetic.len()
    }

    /// Class node index for a class element, or the class a member is seen from.
    pub fn class_index(&self, id: ElementId) -> Option<usize> {
        match self.get(id)? {
            Element::Class { class } => Some(*class),
            Element::Field { owner, .. } | Element::Method { owner, .. } => {
                self.class_index(*owner)
            }
            _ => None,
        }
    }

    pub fn class_node(&self, id: ElementId) -> Option<&ClassNode> {
        match self.get(id)? {
            Element::Class { class } => self.classes.get(*class),
            _ => None,
        }
    }

    /// Declaring class and method node of a method element.
    pub fn method_node(&self, id: ElementId) -> Option<(&ClassNode, &MethodNode)> {
        match self.get(id)? {
            Element::Method { class, method, .. } => {
                let node = self.classes.get(*class)?;
                Some((node, node.methods.get(*method)?))
            }
            _ => None,
        }
    }

    pub fn field_node(&self, id: ElementId) -> Option<(&ClassNode, &FieldNode)> {
        match self.get(id)? {
            Element::Field { class, field, .. } => {
                let node = self.classes.get(*class)?;
                Some((node, node.fields.get(*field)?))
            }
            _ => None,
        }
    }

    /// Annotations attached to a class, field, method or parameter.
    pub fn annotation_nodes(&self, id: ElementId) -> &[AnnotationNode] {
        match self.get(id) {
            Some(Element::Class { class }) => &self.classes[*class].annotations,
            Some(Element::Field { .. }) => self
                .field_node(id)
                .map(|(_, f)| f.annotations.as_slice())
                .unwrap_or(&[]),
            Some(Element::Method { .. }) => self
                .method_node(id)
                .map(|(_, m)| m.annotations.as_slice())
                .unwrap_or(&[]),
            Some(Element::Parameter { method, index }) => self
                .method_node(*method)
                .map(|(_, m)| m.parameter_annotations(*index))
                .unwrap_or(&[]),
            _ => &[],
        }
    }

    pub fn annotation_node(&self, id: ElementId) -> Option<&AnnotationNode> {
        match self.get(id)? {
            Element::Annotation { owner, index } => self.annotation_nodes(*owner).get(*index),
            _ => None,
        }
    }

    // --- Members ---

    pub fn annotations(&mut self, owner: ElementId) -> Vec<ElementId> {
        let count = self.annotation_nodes(owner).len();
        (0..count)
            .map(|index| {
                self.intern(
                    NodeKey::Annotation { owner, index },
                    Element::Annotation { owner, index },
                )
            })
            .collect()
    }

    pub fn parameters(&mut self, method: ElementId) -> Vec<ElementId> {
        let count = match self.method_node(method) {
            Some((class, node)) => match signature::descriptor_parameter_count(&node.desc) {
                Ok(n) => n,
                Err(e) => {
                    log::warn!("{}.{}: {e}", class.type_name(), node.name);
                    0
                }
            },
            None => 0,
        };
        (0..count)
            .map(|index| {
                self.intern(
                    NodeKey::Parameter { method, index },
                    Element::Parameter { method, index },
                )
            })
            .collect()
    }

    /// Fields of a class; with `inherited`, also the visible fields of
    /// discovered superclasses, seen from this class.
    pub fn fields(&mut self, class_id: ElementId, inherited: bool) -> Vec<ElementId> {
        let Some(class) = self.class_index(class_id) else {
            return Vec::new();
        };
        let mut result: Vec<ElementId> = (0..self.classes[class].fields.len())
            .map(|f| self.member(ElementKind::Field, class, f, class))
            .collect();
        if inherited {
            let mut seen: HashSet<String> =
                self.classes[class].fields.iter().map(|f| f.name.clone()).collect();
            for sup in self.superclass_chain(class).into_iter().skip(1) {
                for f in 0..self.classes[sup].fields.len() {
                    let node = &self.classes[sup].fields[f];
                    if node.access & (access::PRIVATE | access::STATIC) != 0
                        || !seen.insert(node.name.clone())
                    {
                        continue;
                    }
                    result.push(self.member(ElementKind::Field, sup, f, class));
                }
            }
        }
        result
    }

    /// Methods of a class; with `inherited`, also non-overridden instance
    /// methods of discovered superclasses, seen from this class.
    pub fn methods(&mut self, class_id: ElementId, inherited: bool) -> Vec<ElementId> {
        let Some(class) = self.class_index(class_id) else {
            return Vec::new();
        };
        let mut result: Vec<ElementId> = (0..self.classes[class].methods.len())
            .map(|m| self.member(ElementKind::Method, class, m, class))
            .collect();
        if inherited {
            let mut seen: HashSet<(String, String)> = self.classes[class]
                .methods
                .iter()
                .map(|m| (m.name.clone(), m.desc.clone()))
                .collect();
            for sup in self.superclass_chain(class).into_iter().skip(1) {
                for m in 0..self.classes[sup].methods.len() {
                    let node = &self.classes[sup].methods[m];
                    if node.is_constructor()
                        || node.is_static_initializer()
                        || node.access & (access::PRIVATE | access::STATIC) != 0
                        || !seen.insert((node.name.clone(), node.desc.clone()))
                    {
                        continue;
                    }
                    result.push(self.member(ElementKind::Method, sup, m, class));
                }
            }
        }
        result
    }

    pub fn intern_signature(
        &mut self,
        owner: ElementId,
        slot: SignatureSlot,
        signature: TypeSignature,
    ) -> ElementId {
        self.intern(
            NodeKey::Signature { owner, slot },
            Element::Signature { owner, signature },
        )
    }

    pub fn intern_value(&mut self, owner: ElementId, key: &str, value: Literal) -> ElementId {
        self.intern(
            NodeKey::Value {
                owner,
                key: key.to_string(),
            },
            Element::Value { owner, value },
        )
    }

    // --- Synthesis ---

    /// Stub a class referenced only by name, optionally with stub methods.
    /// Returns the existing element when the class was discovered.
    pub fn synthesize_class(&mut self, type_name: &TypeName, methods: &[String]) -> ElementId {
        if let Some(existing) = self.class_by_name(type_name) {
            return existing;
        }
        let mut node = ClassNode::new(type_name);
        node.access |= access::SYNTHETIC;
        for name in methods {
            node.methods.push(MethodNode::new(name, "()V"));
        }
        self.classes.push(node);
        let class = self.classes.len() - 1;
        self.discover(class);
        self.identity[&NodeKey::Class(class)]
    }

    // --- Hierarchy ---

    /// `class` followed by its discovered superclasses, nearest first.
    pub fn superclass_chain(&self, class: usize) -> Vec<usize> {
        let mut chain = vec![class];
        let mut current = class;
        while let Some(sup) = self.classes[current]
            .super_type()
            .and_then(|t| self.class_names.get(&t).copied())
        {
            if chain.contains(&sup) {
                break;
            }
            chain.push(sup);
            current = sup;
        }
        chain
    }

    /// Superclass chain, followed by every discovered superinterface of
    /// that chain, breadth-first.
    fn method_lookup_order(&self, class: usize) -> Vec<usize> {
        let mut order = self.superclass_chain(class);
        let mut visited: HashSet<usize> = order.iter().copied().collect();
        let mut queue: VecDeque<usize> = order.iter().copied().collect();
        while let Some(current) = queue.pop_front() {
            for interface in self.classes[current].interface_types() {
                if let Some(&idx) = self.class_names.get(&interface) {
                    if visited.insert(idx) {
                        order.push(idx);
                        queue.push_back(idx);
                    }
                }
            }
        }
        order
    }

        /// Discovered enclosing classes, outermost first.
    pub fn outer_chain(&self, class: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut current = class;
        while let Some(outer) = self.classes[current]
            .outer_class
            .as_deref()
            .and_then(|o| self.class_names.get(&TypeName::from_internal(o)).copied())
        {
            if outer == class || chain.contains(&outer) {
                break;
            }
            chain.push(outer);
            current = outer;
        }
        chain.reverse();
        chain
    }

    /// Direct supertypes (superclass, then interfaces) of a class node.
    pub fn direct_supertypes(&self, class: usize) -> Vec<TypeName> {
        let node = &self.classes[class];
        node.super_type()
            .into_iter()
            .chain(node.interface_types())
            .collect()
    }

    /// Transitive supertypes, including ones outside the discovered set.
    pub fn supertypes(&self, class: usize) -> Vec<TypeName> {
        let mut result: Vec<TypeName> = Vec::new();
        let mut queue: VecDeque<usize> = VecDeque::from([class]);
        let mut visited: HashSet<usize> = HashSet::from([class]);
        while let Some(current) = queue.pop_front() {
            for sup in self.direct_supertypes(current) {
                if result.contains(&sup) {
                    continue;
                }
                if let Some(&idx) = self.class_names.get(&sup) {
                    if visited.insert(idx) {
                        queue.push_back(idx);
                    }
                }
                result.push(sup);
            }
        }
        result
    }

    /// Discovered supertype path from `from` up to `to`, both inclusive.
    pub fn supertype_path(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        let mut parents: HashMap<usize, usize> = HashMap::new();
        let mut queue: VecDeque<usize> = VecDeque::from([from]);
        let mut visited: HashSet<usize> = HashSet::from([from]);
        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut node = to;
                while let Some(&p) = parents.get(&node) {
                    path.push(p);
                    node = p;
                }
                path.reverse();
                return Some(path);
            }
            for sup in self.direct_supertypes(current) {
                if let Some(&idx) = self.class_names.get(&sup) {
                    if visited.insert(idx) {
                        parents.insert(idx, current);
                        queue.push_back(idx);
                    }
                }
            }
        }
        None
    }

    /// Resolve a call target the way the JVM links it: the named class
    /// first, then its discovered superclasses, then their discovered
    /// superinterfaces breadth-first. Synthesized classes match on name alone.
    pub fn resolve_method(&self, owner: &TypeName, name: &str, desc: &str) -> Option<ElementId> {
        let class = self.class_index_by_name(owner)?;
        for c in self.method_lookup_order(class) {
            let method = if c >= self.discovered {
                self.classes[c].methods.iter().position(|m| m.name == name)
            } else {
                self.method_keys
                    .get(&(c, name.to_string(), desc.to_string()))
                    .copied()
            };
            if let Some(m) = method {
                return self
                    .identity
                    .get(&NodeKey::Method {
                        class: c,
                        method: m,
                        seen_from: c,
                    })
                    .copied();
            }
        }
        None
    }

    // --- Naming ---

    /// Name used by pattern filters: qualified for classes and annotations.
    pub fn name(&self, id: ElementId) -> String {
        match self.get(id) {
            Some(Element::Class { class }) => self.classes[*class].type_name().to_string(),
            Some(Element::Field { .. }) => self
                .field_node(id)
                .map(|(_, f)| f.name.clone())
                .unwrap_or_default(),
            Some(Element::Method { .. }) => self
                .method_node(id)
                .map(|(_, m)| m.name.clone())
                .unwrap_or_default(),
            Some(Element::Parameter { method, index }) => self
                .method_node(*method)
                .and_then(|(_, m)| m.parameter_names.get(*index).cloned())
                .unwrap_or_else(|| format!("arg{index}")),
            Some(Element::Annotation { .. }) => self
                .annotation_node(id)
                .and_then(|a| a.type_name())
                .map(|t| t.to_string())
                .unwrap_or_default(),
            Some(Element::Signature { signature, .. }) => signature.to_string(),
            Some(Element::Value { value, .. }) => value.to_string(),
            None => String::new(),
        }
    }

    /// Short human-readable label, used as the default entity label.
    pub fn label(&self, id: ElementId) -> String {
        let owner_name = |owner: &ElementId| {
            self.class_node(*owner)
                .map(|c| c.type_name().simple_name().to_string())
                .unwrap_or_default()
        };
        match self.get(id) {
            Some(Element::Class { class }) => {
                self.classes[*class].type_name().simple_name().to_string()
            }
            Some(Element::Field { owner, .. }) => {
                format!("{}.{}", owner_name(owner), self.name(id))
            }
            Some(Element::Method { owner, .. }) => {
                format!("{}::{}", owner_name(owner), self.name(id))
            }
            Some(Element::Annotation { .. }) => self
                .annotation_node(id)
                .and_then(|a| a.type_name())
                .map(|t| format!("@{}", t.simple_name()))
                .unwrap_or_default(),
            _ => self.name(id),
        }
    }
}

//! Per-run signature cache over an [`ElementIndex`].
//!
//! Each declaration's signature is parsed at most once. A declaration whose
//! signature fails to parse is logged and falls back to its erased
//! descriptor; the rest of the run is unaffected.

use std::collections::HashMap;
use std::rc::Rc;

use crate::element::{Element, ElementId, ElementIndex};
use crate::model::{Literal, TypeName};

use super::{
    parse_class_signature, parse_field_signature, parse_method_signature, ArgType,
    ClassSignature, MethodSignature, SignatureError, TypeBindings, TypeSignature, TypeVariable,
    TypeVariableOwner, TypeVariableScope,
};

#[derive(Debug, Default)]
pub struct SignatureResolver {
    classes: HashMap<usize, Rc<ClassSignature>>,
    methods: HashMap<(usize, usize), Option<Rc<MethodSignature>>>,
    fields: HashMap<(usize, usize), Option<Rc<TypeSignature>>>,
    bindings: HashMap<(usize, usize), Rc<TypeBindings>>,
    fallbacks: usize,
}

impl SignatureResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declarations that fell back to their erased descriptor.
    pub fn fallbacks(&self) -> usize {
        self.fallbacks
    }

    // --- Declarations ---

    pub fn class_signature(&mut self, index: &ElementIndex, class: usize) -> Rc<ClassSignature> {
        if let Some(sig) = self.classes.get(&class) {
            return Rc::clone(sig);
        }
        // Placeholder while enclosing classes resolve; cuts `outer_class` cycles.
        self.classes.insert(class, Rc::new(erased_class(index, class)));
        let mut scope = TypeVariableScope::new();
        for outer in index.outer_chain(class) {
            let outer_sig = self.class_signature(index, outer);
            if let Some(node) = index.class_at(outer) {
                scope.push(
                    TypeVariableOwner::Class {
                        class: node.type_name(),
                    },
                    outer_sig.type_parameters.clone(),
                );
            }
        }

        let sig = match index.class_at(class) {
            Some(node) => {
                let type_name = node.type_name();
                let parsed = node
                    .signature
                    .as_deref()
                    .map(|s| parse_class_signature(s, &type_name, &scope));
                match parsed {
                    Some(Ok(sig)) => sig,
                    Some(Err(e)) => {
                        log::warn!("{type_name}: {e}; using erased supertypes");
                        self.fallbacks += 1;
                        erased_class(index, class)
                    }
                    None => erased_class(index, class),
                }
            }
            None => erased_class(index, class),
        };
        let sig = Rc::new(sig);
        self.classes.insert(class, Rc::clone(&sig));
        sig
    }

    /// Type variables visible inside `class`: enclosing classes, then its own.
    pub fn class_scope(&mut self, index: &ElementIndex, class: usize) -> TypeVariableScope {
        let mut scope = TypeVariableScope::new();
        for c in index.outer_chain(class).into_iter().chain([class]) {
            let sig = self.class_signature(index, c);
            if let Some(node) = index.class_at(c) {
                scope.push(
                    TypeVariableOwner::Class {
                        class: node.type_name(),
                    },
                    sig.type_parameters.clone(),
                );
            }
        }
        scope
    }

    /// `None` only when even the descriptor is malformed.
    pub fn method_signature(
        &mut self,
        index: &ElementIndex,
        class: usize,
        method: usize,
    ) -> Option<Rc<MethodSignature>> {
        if let Some(sig) = self.methods.get(&(class, method)) {
            return sig.clone();
        }
        let scope = self.class_scope(index, class);
        let sig = index.class_at(class).and_then(|node| {
            let m = node.methods.get(method)?;
            let owner = TypeVariableOwner::Method {
                class: node.type_name(),
                name: m.name.clone(),
                desc: m.desc.clone(),
            };
            let declared = m
                .signature
                .as_deref()
                .map(|s| parse_method_signature(s, owner.clone(), &scope));
            match declared {
                Some(Ok(sig)) => return Some(sig),
                Some(Err(e)) => {
                    log::warn!("{}::{}: {e}; using descriptor", node.type_name(), m.name);
                    self.fallbacks += 1;
                }
                None => {}
            }
            match parse_method_signature(&m.desc, owner, &scope) {
                Ok(sig) => Some(sig),
                Err(e) => {
                    log::warn!("{}::{}: {e}", node.type_name(), m.name);
                    None
                }
            }
        });
        let sig = sig.map(Rc::new);
        self.methods.insert((class, method), sig.clone());
        sig
    }

    pub fn field_signature(
        &mut self,
        index: &ElementIndex,
        class: usize,
        field: usize,
    ) -> Option<Rc<TypeSignature>> {
        if let Some(sig) = self.fields.get(&(class, field)) {
            return sig.clone();
        }
        let scope = self.class_scope(index, class);
        let sig = index.class_at(class).and_then(|node| {
            let f = node.fields.get(field)?;
            if let Some(declared) = f.signature.as_deref() {
                match parse_field_signature(declared, &scope) {
                    Ok(sig) => return Some(sig),
                    Err(e) => {
                        log::warn!("{}.{}: {e}; using descriptor", node.type_name(), f.name);
                        self.fallbacks += 1;
                    }
                }
            }
            match parse_field_signature(&f.desc, &scope) {
                Ok(sig) => Some(sig),
                Err(e) => {
                    log::warn!("{}.{}: {e}", node.type_name(), f.name);
                    None
                }
            }
        });
        let sig = sig.map(Rc::new);
        self.fields.insert((class, field), sig.clone());
        sig
    }

    // --- Specialization ---

    /// Bindings for `to`'s type variables as seen from subtype `from`,
    /// folded along the discovered supertype path. Empty when `to` is not a
    /// discovered supertype of `from`.
    pub fn bindings(
        &mut self,
        index: &ElementIndex,
        from: usize,
        to: usize,
    ) -> Rc<TypeBindings> {
        if let Some(b) = self.bindings.get(&(from, to)) {
            return Rc::clone(b);
        }
        let mut current = TypeBindings::new();
        if let Some(path) = index.supertype_path(from, to) {
            for step in path.windows(2) {
                let (sub, sup) = (step[0], step[1]);
                let Some(sup_name) = index.class_at(sup).map(|n| n.type_name()) else {
                    break;
                };
                let sub_sig = self.class_signature(index, sub);
                let sup_sig = self.class_signature(index, sup);
                let reference = sub_sig
                    .supertypes()
                    .find(|s| s.type_name() == Some(&sup_name))
                    .cloned();
                let args: Vec<TypeSignature> = match reference {
                    Some(r) => r.args.iter().map(|a| a.specialize(&current)).collect(),
                    None => Vec::new(),
                };
                current = TypeBindings::from_arguments(&sup_name, &sup_sig.type_parameters, &args);
            }
        }
        let current = Rc::new(current);
        self.bindings.insert((from, to), Rc::clone(&current));
        current
    }

    /// Declared type of a field, parameter or method return, specialized for
    /// the class the member is seen from. Classes yield their own generic
    /// form, e.g. `Repository<T, ID>`.
    pub fn declared_type(
        &mut self,
        index: &ElementIndex,
        id: ElementId,
    ) -> Option<TypeSignature> {
        let element = index.get(id)?;
        match element {
            Element::Class { class } => {
                let class = *class;
                let type_name = index.class_at(class)?.type_name();
                let sig = self.class_signature(index, class);
                let args = sig
                    .type_parameters
                    .iter()
                    .map(|p| {
                        TypeSignature::variable(TypeVariable {
                            name: p.name.clone(),
                            owner: TypeVariableOwner::Class {
                                class: type_name.clone(),
                            },
                        })
                    })
                    .collect();
                Some(TypeSignature::plain(type_name).with_args(args))
            }
            Element::Field {
                class,
                field,
                owner,
                ..
            } => {
                let (class, field, owner) = (*class, *field, *owner);
                let sig = self.field_signature(index, class, field)?;
                Some(self.seen_from(index, owner, class, &sig))
            }
            Element::Method {
                class,
                method,
                owner,
                ..
            } => {
                let (class, method, owner) = (*class, *method, *owner);
                let sig = self.method_signature(index, class, method)?;
                Some(self.seen_from(index, owner, class, &sig.return_type))
            }
            Element::Parameter { method, index: i } => {
                let (method, i) = (*method, *i);
                let Some(Element::Method {
                    class,
                    method: m,
                    owner,
                    ..
                }) = index.get(method)
                else {
                    return None;
                };
                let (class, m, owner) = (*class, *m, *owner);
                let sig = self.method_signature(index, class, m)?;
                let param = sig.parameters.get(i)?.clone();
                Some(self.seen_from(index, owner, class, &param))
            }
            Element::Signature { signature, .. } => Some(signature.clone()),
            Element::Annotation { .. } => index
                .annotation_node(id)
                .and_then(|a| a.type_name())
                .map(TypeSignature::plain),
            Element::Value { value, .. } => match value {
                Literal::Type(t) => Some(TypeSignature::plain(t.clone())),
                Literal::Str(_) => Some(TypeSignature::plain(TypeName::new("java.lang.String"))),
                _ => None,
            },
        }
    }

    fn seen_from(
        &mut self,
        index: &ElementIndex,
        owner: ElementId,
        declaring: usize,
        sig: &TypeSignature,
    ) -> TypeSignature {
        match index.class_index(owner) {
            Some(seen) if seen != declaring => {
                let bindings = self.bindings(index, seen, declaring);
                sig.specialize(&bindings)
            }
            _ => sig.clone(),
        }
    }

    /// The class a signature must denote to be navigated to. A method type
    /// variable only has one at a call site, which is unsupported.
    pub fn concrete_class(
        &mut self,
        index: &ElementIndex,
        sig: &TypeSignature,
    ) -> Result<TypeName, SignatureError> {
        if let Some(v) = sig.method_variable() {
            return Err(SignatureError::CallSiteResolution {
                name: v.name.clone(),
                owner: v.owner.to_string(),
            });
        }
        Ok(self.erasure(index, sig))
    }

    /// The erased class name a signature denotes: variables erase to their
    /// leftmost bound, or `java.lang.Object`.
    pub fn erasure(&mut self, index: &ElementIndex, sig: &TypeSignature) -> TypeName {
        match &sig.arg {
            ArgType::Plain(t) => t.clone(),
            ArgType::Var(v) => {
                let class = match &v.owner {
                    TypeVariableOwner::Class { class }
                    | TypeVariableOwner::Method { class, .. } => index.class_index_by_name(class),
                };
                let scope = match class {
                    Some(c) => self.class_scope(index, c),
                    None => TypeVariableScope::new(),
                };
                scope
                    .declaration(v)
                    .and_then(|p| p.upper_bound())
                    .and_then(|b| b.type_name().cloned())
                    .unwrap_or_else(|| TypeName::new("java.lang.Object"))
            }
        }
    }
}

fn erased_class(index: &ElementIndex, class: usize) -> ClassSignature {
    let Some(node) = index.class_at(class) else {
        return ClassSignature {
            type_parameters: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
        };
    };
    ClassSignature {
        type_parameters: Vec::new(),
        superclass: node.super_type().map(TypeSignature::plain),
        interfaces: node
            .interface_types()
            .into_iter()
            .map(TypeSignature::plain)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassNode, FieldNode, MethodNode};
    use pretty_assertions::assert_eq;

    fn hierarchy() -> Vec<ClassNode> {
        vec![
            ClassNode::new(&TypeName::new("app.Base"))
                .with_signature("<T:Ljava/lang/Object;>Ljava/lang/Object;")
                .with_field(
                    FieldNode::new("items", "Ljava/util/List;")
                        .with_signature("Ljava/util/List<TT;>;"),
                )
                .with_method(
                    MethodNode::new("first", "()Ljava/lang/Object;").with_signature("()TT;"),
                ),
            ClassNode::new(&TypeName::new("app.Middle"))
                .with_super(&TypeName::new("app.Base"))
                .with_signature("<U:Ljava/lang/Object;>Lapp/Base<Ljava/util/Set<TU;>;>;"),
            ClassNode::new(&TypeName::new("app.Leaf"))
                .with_super(&TypeName::new("app.Middle"))
                .with_signature("Lapp/Middle<Ljava/lang/String;>;"),
            ClassNode::new(&TypeName::new("app.Broken"))
                .with_field(FieldNode::new("bad", "I").with_signature("Ljava/util/List<"))
                .with_signature("<T:>>"),
        ]
    }

    fn class(index: &ElementIndex, name: &str) -> ElementId {
        index.class_by_name(&TypeName::new(name)).unwrap()
    }

    #[test]
    fn bindings_fold_along_supertype_path() {
        let index = ElementIndex::new(hierarchy());
        let mut resolver = SignatureResolver::new();
        let bindings = resolver.bindings(&index, 2, 0);
        assert_eq!(bindings.len(), 1);
        let (_, bound) = bindings.iter().next().unwrap();
        assert_eq!(bound.to_string(), "Set<String>");
    }

    #[test]
    fn inherited_field_type_is_specialized() {
        let mut index = ElementIndex::new(hierarchy());
        let mut resolver = SignatureResolver::new();
        let leaf = class(&index, "app.Leaf");
        let fields = index.fields(leaf, true);
        let ty = resolver.declared_type(&index, fields[0]).unwrap();
        assert_eq!(ty.to_string(), "List<Set<String>>");

        let base = class(&index, "app.Base");
        let declared = index.fields(base, false)[0];
        let ty = resolver.declared_type(&index, declared).unwrap();
        assert_eq!(ty.to_string(), "List<T>");
    }

    #[test]
    fn inherited_return_type_is_specialized() {
        let mut index = ElementIndex::new(hierarchy());
        let mut resolver = SignatureResolver::new();
        let middle = class(&index, "app.Middle");
        let methods = index.methods(middle, true);
        let ty = resolver.declared_type(&index, methods[0]).unwrap();
        assert_eq!(ty.to_string(), "Set<U>");
    }

    #[test]
    fn class_type_carries_its_variables() {
        let index = ElementIndex::new(hierarchy());
        let mut resolver = SignatureResolver::new();
        let ty = resolver
            .declared_type(&index, class(&index, "app.Middle"))
            .unwrap();
        assert_eq!(ty.to_string(), "Middle<U>");
        assert_eq!(resolver.erasure(&index, &ty.args[0]), TypeName::new("java.lang.Object"));
    }

    #[test]
    fn malformed_signatures_fall_back_to_descriptors() {
        let mut index = ElementIndex::new(hierarchy());
        let mut resolver = SignatureResolver::new();
        let broken = class(&index, "app.Broken");
        let sig = resolver.class_signature(&index, 3);
        assert!(sig.type_parameters.is_empty());
        assert_eq!(sig.superclass.as_ref().unwrap().to_string(), "Object");
        let field = index.fields(broken, false)[0];
        let ty = resolver.declared_type(&index, field).unwrap();
        assert_eq!(ty.to_string(), "int");
        assert_eq!(resolver.fallbacks(), 2);
    }

    fn crud() -> Vec<ClassNode> {
        vec![
            ClassNode::new(&TypeName::new("data.Crud"))
                .with_signature("<T:Ljava/lang/Object;>Ljava/lang/Object;")
                .with_method(
                    MethodNode::new("save", "(Ljava/lang/Object;)Ljava/lang/Object;")
                        .with_signature("<S:TT;>(TS;)TS;"),
                )
                .with_method(
                    MethodNode::new("all", "()Ljava/util/List;")
                        .with_signature("()Ljava/util/List<TT;>;"),
                ),
            ClassNode::new(&TypeName::new("app.OwnerRepo"))
                .with_super(&TypeName::new("data.Crud"))
                .with_signature("Ldata/Crud<Lapp/Owner;>;"),
        ]
    }

    #[test]
    fn inherited_generic_method_keeps_its_variable() {
        let mut index = ElementIndex::new(crud());
        let mut resolver = SignatureResolver::new();
        let repo = class(&index, "app.OwnerRepo");
        let methods = index.methods(repo, true);
        let save = resolver.declared_type(&index, methods[0]).unwrap();
        assert_eq!(save.to_string(), "S");
        assert_eq!(save.method_variable().unwrap().name, "S");
        let all = resolver.declared_type(&index, methods[1]).unwrap();
        assert_eq!(all.to_string(), "List<Owner>");

        let err = resolver.concrete_class(&index, &save).unwrap_err();
        assert!(matches!(err, SignatureError::CallSiteResolution { ref name, .. } if name == "S"));
        assert_eq!(
            resolver.concrete_class(&index, &all).unwrap(),
            TypeName::new("java.util.List")
        );
    }

    #[test]
    fn cyclic_outer_classes_terminate() {
        let mut a = ClassNode::new(&TypeName::new("app.A"))
            .with_signature("<X:Ljava/lang/Object;>Ljava/lang/Object;")
            .with_field(FieldNode::new("x", "Ljava/lang/Object;").with_signature("TX;"));
        a.outer_class = Some("app/B".to_string());
        let mut b = ClassNode::new(&TypeName::new("app.B"));
        b.outer_class = Some("app/A".to_string());
        let mut index = ElementIndex::new(vec![a, b]);
        let mut resolver = SignatureResolver::new();
        let a = class(&index, "app.A");
        let field = index.fields(a, false)[0];
        let ty = resolver.declared_type(&index, field).unwrap();
        assert_eq!(ty.to_string(), "X");
        assert_eq!(resolver.class_signature(&index, 0).type_parameters.len(), 1);
        assert_eq!(resolver.fallbacks(), 0);
    }
}

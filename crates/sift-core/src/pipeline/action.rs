//! The pipeline expression tree.
//!
//! Actions are plain data: they serialize to and from JSON and are
//! interpreted by [`super::interpreter`]. The associated constructors form
//! the authoring surface for pipelines built in code.

use serde::{Deserialize, Serialize};

use crate::graph::EntityType;
use crate::model::TypeName;

use super::predicate::Predicate;
use super::property::PropertySpec;
use super::scope::ScopeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    Instantiates,
    Invokes,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instantiates => "instantiates",
            Self::Invokes => "invokes",
        }
    }
}

/// A class to stub, with optional stub method names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisTarget {
    pub type_name: TypeName,
    #[serde(default)]
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    // --- Combinators ---
    Chain {
        actions: Vec<Action>,
    },
    /// Both actions see the same input; outputs are combined.
    Compose {
        first: Box<Action>,
        second: Box<Action>,
    },
    /// Matching elements go to `then`, the rest to `otherwise` (or pass
    /// through unchanged).
    Fork {
        predicate: Predicate,
        then: Box<Action>,
        #[serde(default)]
        otherwise: Option<Box<Action>>,
    },
    /// Run for side effects, keep the current scope.
    Nested {
        body: Box<Action>,
    },
    Identity,

    // --- Scopes ---
    Classes,
    ElementsOf {
        entity: EntityType,
    },
    Methods {
        #[serde(default)]
        inherited: bool,
    },
    Fields {
        #[serde(default)]
        inherited: bool,
    },
    Parameters,
    Annotations {
        #[serde(default)]
        annotation: Option<TypeName>,
    },
    Signature,
    TypeArguments,
    /// Class of each element's declared type.
    ExplodeType {
        #[serde(default)]
        synthesize: bool,
    },
    /// Run `body` on the nearest enclosing `kind` elements, keep the current scope.
    OuterScope {
        kind: ScopeKind,
        body: Box<Action>,
    },
    Ascend {
        kind: ScopeKind,
    },
    Filter {
        predicate: Predicate,
    },

    // --- Entities ---
    RegisterEntity {
        entity: EntityType,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        properties: Vec<PropertySpec>,
    },
    UpdateEntity {
        entity: EntityType,
        #[serde(default)]
        label: Option<String>,
        #[serde(default)]
        properties: Vec<PropertySpec>,
    },
    Associate {
        parent: EntityType,
        key: String,
        child: EntityType,
    },
    Synthesize {
        targets: Vec<SynthesisTarget>,
    },
    Relate {
        kind: RelationKind,
        source: EntityType,
        target: EntityType,
        #[serde(default)]
        key: Option<String>,
        #[serde(default)]
        backtrack: bool,
    },
}

impl Action {
    pub fn chain(actions: Vec<Action>) -> Self {
        Self::Chain { actions }
    }

    pub fn compose(first: Action, second: Action) -> Self {
        Self::Compose {
            first: Box::new(first),
            second: Box::new(second),
        }
    }

    pub fn fork(predicate: Predicate, then: Action, otherwise: Option<Action>) -> Self {
        Self::Fork {
            predicate,
            then: Box::new(then),
            otherwise: otherwise.map(Box::new),
        }
    }

    pub fn nested(body: Action) -> Self {
        Self::Nested {
            body: Box::new(body),
        }
    }

    pub fn methods() -> Self {
        Self::Methods { inherited: false }
    }

    pub fn fields() -> Self {
        Self::Fields { inherited: false }
    }

    pub fn filter(predicate: Predicate) -> Self {
        Self::Filter { predicate }
    }

    pub fn outer_scope(kind: ScopeKind, body: Action) -> Self {
        Self::OuterScope {
            kind,
            body: Box::new(body),
        }
    }

    pub fn register(entity: &str) -> Self {
        Self::RegisterEntity {
            entity: EntityType::new(entity),
            label: None,
            properties: Vec::new(),
        }
    }

    pub fn register_with(entity: &str, label: Option<&str>, properties: Vec<PropertySpec>) -> Self {
        Self::RegisterEntity {
            entity: EntityType::new(entity),
            label: label.map(str::to_string),
            properties,
        }
    }

    pub fn update(entity: &str, properties: Vec<PropertySpec>) -> Self {
        Self::UpdateEntity {
            entity: EntityType::new(entity),
            label: None,
            properties,
        }
    }

    pub fn associate(parent: &str, key: &str, child: &str) -> Self {
        Self::Associate {
            parent: EntityType::new(parent),
            key: key.to_string(),
            child: EntityType::new(child),
        }
    }

    pub fn synthesize(targets: &[(&str, &[&str])]) -> Self {
        Self::Synthesize {
            targets: targets
                .iter()
                .map(|(name, methods)| SynthesisTarget {
                    type_name: TypeName::new(*name),
                    methods: methods.iter().map(|m| m.to_string()).collect(),
                })
                .collect(),
        }
    }

    pub fn relate(kind: RelationKind, source: &str, target: &str, backtrack: bool) -> Self {
        Self::Relate {
            kind,
            source: EntityType::new(source),
            target: EntityType::new(target),
            key: None,
            backtrack,
        }
    }

    /// Short tag naming this action in traces and failure paths.
    pub fn describe(&self) -> String {
        match self {
            Self::Chain { actions } => format!("chain[{}]", actions.len()),
            Self::Compose { .. } => "compose".to_string(),
            Self::Fork { .. } => "fork".to_string(),
            Self::Nested { .. } => "nested".to_string(),
            Self::Identity => "identity".to_string(),
            Self::Classes => "classes".to_string(),
            Self::ElementsOf { entity } => format!("elements_of({entity})"),
            Self::Methods { inherited } => format!("methods(inherited={inherited})"),
            Self::Fields { inherited } => format!("fields(inherited={inherited})"),
            Self::Parameters => "parameters".to_string(),
            Self::Annotations { annotation: Some(t) } => format!("annotations({t})"),
            Self::Annotations { annotation: None } => "annotations".to_string(),
            Self::Signature => "signature".to_string(),
            Self::TypeArguments => "type_arguments".to_string(),
            Self::ExplodeType { .. } => "explode_type".to_string(),
            Self::OuterScope { kind, .. } => format!("outer_scope({kind})"),
            Self::Ascend { kind } => format!("ascend({kind})"),
            Self::Filter { .. } => "filter".to_string(),
            Self::RegisterEntity { entity, .. } => format!("register_entity({entity})"),
            Self::UpdateEntity { entity, .. } => format!("update_entity({entity})"),
            Self::Associate { parent, key, child } => {
                format!("associate({parent}[{key}] = {child})")
            }
            Self::Synthesize { targets } => format!("synthesize[{}]", targets.len()),
            Self::Relate {
                kind,
                source,
                target,
                ..
            } => format!("{}({source} -> {target})", kind.as_str()),
        }
    }

    /// Direct sub-actions, for tree walks.
    pub fn children(&self) -> Vec<&Action> {
        match self {
            Self::Chain { actions } => actions.iter().collect(),
            Self::Compose { first, second } => vec![first.as_ref(), second.as_ref()],
            Self::Fork {
                then, otherwise, ..
            } => std::iter::once(then.as_ref())
                .chain(otherwise.as_deref())
                .collect(),
            Self::Nested { body } | Self::OuterScope { body, .. } => vec![body.as_ref()],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_shape() {
        let json = r#"{
            "action": "chain",
            "actions": [
                {"action": "classes"},
                {"action": "filter",
                 "predicate": {"test": "annotated_by", "annotation": "web.Controller"}},
                {"action": "register_entity", "entity": "controller", "label": "${name}"},
                {"action": "methods", "inherited": true},
                {"action": "relate", "kind": "invokes",
                 "source": "controller", "target": "repository"}
            ]
        }"#;
        let action: Action = serde_json::from_str(json).unwrap();
        let Action::Chain { actions } = &action else {
            panic!("expected chain");
        };
        assert_eq!(actions.len(), 5);
        assert_eq!(actions[3], Action::Methods { inherited: true });
        assert!(matches!(
            &actions[4],
            Action::Relate { key: None, backtrack: false, .. }
        ));
        assert_eq!(action.children().len(), 5);
    }

    #[test]
    fn descriptions_name_arguments() {
        assert_eq!(
            Action::associate("controller", "endpoints", "endpoint").describe(),
            "associate(controller[endpoints] = endpoint)"
        );
        assert_eq!(
            Action::relate(RelationKind::Invokes, "endpoint", "repository", true).describe(),
            "invokes(endpoint -> repository)"
        );
    }
}

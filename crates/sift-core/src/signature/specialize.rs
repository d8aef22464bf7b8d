//! Type-variable substitution.

use std::collections::HashMap;

use crate::model::TypeName;

use super::{
    ArgType, Bound, FormalTypeParameter, MethodSignature, TypeSignature, TypeVariable,
    TypeVariableOwner,
};

/// Concrete arguments for class type variables, keyed by the declaring variable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeBindings {
    map: HashMap<TypeVariable, TypeSignature>,
}

impl TypeBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `class`'s formal parameters positionally to `args`. A raw
    /// reference (no arguments) binds nothing.
    pub fn from_arguments(
        class: &TypeName,
        formals: &[FormalTypeParameter],
        args: &[TypeSignature],
    ) -> Self {
        let mut bindings = Self::new();
        for (formal, arg) in formals.iter().zip(args) {
            bindings.bind(class_variable(class, &formal.name), arg.clone());
        }
        bindings
    }

    /// Convenience for building bindings by variable name.
    pub fn for_class(class: &TypeName, pairs: &[(&str, TypeSignature)]) -> Self {
        let mut bindings = Self::new();
        for (name, sig) in pairs {
            bindings.bind(class_variable(class, name), sig.clone());
        }
        bindings
    }

    pub fn bind(&mut self, variable: TypeVariable, signature: TypeSignature) {
        self.map.insert(variable, signature);
    }

    pub fn get(&self, variable: &TypeVariable) -> Option<&TypeSignature> {
        self.map.get(variable)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TypeVariable, &TypeSignature)> {
        self.map.iter()
    }
}

fn class_variable(class: &TypeName, name: &str) -> TypeVariable {
    TypeVariable {
        name: name.to_string(),
        owner: TypeVariableOwner::Class {
            class: class.clone(),
        },
    }
}

impl TypeSignature {
    /// Substitute bound class variables recursively. Unbound class variables
    /// and method variables are kept as declared.
    pub fn specialize(&self, bindings: &TypeBindings) -> TypeSignature {
        match &self.arg {
            ArgType::Var(v) => match bindings.get(v) {
                Some(concrete) => {
                    let mut out = concrete.clone();
                    out.array_depth += self.array_depth;
                    if self.bound != Bound::Exact {
                        out.bound = self.bound;
                    }
                    out
                }
                None => self.clone(),
            },
            ArgType::Plain(_) => Self {
                args: self.args.iter().map(|a| a.specialize(bindings)).collect(),
                ..self.clone()
            },
        }
    }

    /// Whether any class or method type variable occurs in this tree.
    pub fn has_variables(&self) -> bool {
        matches!(self.arg, ArgType::Var(_)) || self.args.iter().any(|a| a.has_variables())
    }

    /// The method type variable this signature is, if any. Such a type is
    /// only known at a call site.
    pub fn method_variable(&self) -> Option<&TypeVariable> {
        match &self.arg {
            ArgType::Var(v) if matches!(v.owner, TypeVariableOwner::Method { .. }) => Some(v),
            _ => None,
        }
    }
}

impl MethodSignature {
    /// Specialize parameters, return and exception types. The method's own
    /// formal parameters are kept as declared.
    pub fn specialize(&self, bindings: &TypeBindings) -> MethodSignature {
        let all = |sigs: &[TypeSignature]| -> Vec<TypeSignature> {
            sigs.iter().map(|s| s.specialize(bindings)).collect()
        };
        MethodSignature {
            type_parameters: self.type_parameters.clone(),
            parameters: all(&self.parameters),
            return_type: self.return_type.specialize(bindings),
            exceptions: all(&self.exceptions),
        }
    }
}

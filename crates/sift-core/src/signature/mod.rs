//! Generic signatures: decoded trees, formatting and specialization.
//!
//! Signature strings follow the class-file grammar (JVMS 4.7.9.1). Plain
//! descriptors are a subset of that grammar and parse through the same path.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::TypeName;

pub mod parser;
pub mod resolver;
pub mod specialize;

pub use parser::{
    descriptor_parameter_count, parse_class_signature, parse_field_signature,
    parse_method_signature, TypeVariableScope,
};
pub use resolver::SignatureResolver;
pub use specialize::TypeBindings;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("unexpected end of signature `{input}`, expected {expected}")]
    UnexpectedEnd {
        input: String,
        expected: &'static str,
    },
    #[error("unexpected `{found}` at {position} in signature `{input}`, expected {expected}")]
    Unexpected {
        input: String,
        position: usize,
        found: char,
        expected: &'static str,
    },
    #[error("trailing input at {position} in signature `{input}`")]
    TrailingInput { input: String, position: usize },
    #[error("type variable `{name}` is not declared in scope")]
    UnboundTypeVariable { name: String },
    #[error("type variable `{name}` of {owner} can only be resolved at a call site")]
    CallSiteResolution { name: String, owner: String },
}

/// The declaration a type variable belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeVariableOwner {
    Class {
        class: TypeName,
    },
    Method {
        class: TypeName,
        name: String,
        desc: String,
    },
}

impl fmt::Display for TypeVariableOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class { class } => write!(f, "{class}"),
            Self::Method { class, name, .. } => write!(f, "{class}::{name}"),
        }
    }
}

/// A type-variable reference, resolved to its declaring scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeVariable {
    pub name: String,
    pub owner: TypeVariableOwner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgType {
    Plain(TypeName),
    Var(TypeVariable),
}

/// Wildcard classification of a type argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    #[default]
    Exact,
    Extends,
    Super,
    /// `*`: any type.
    Unbounded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    Plain,
    TypeVariable,
    Array,
}

/// One node of a decoded signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeSignature {
    pub arg: ArgType,
    #[serde(default)]
    pub bound: Bound,
    #[serde(default)]
    pub array_depth: u32,
    #[serde(default)]
    pub args: Vec<TypeSignature>,
}

impl TypeSignature {
    pub fn plain(type_name: TypeName) -> Self {
        Self {
            arg: ArgType::Plain(type_name),
            bound: Bound::Exact,
            array_depth: 0,
            args: Vec::new(),
        }
    }

    pub fn variable(variable: TypeVariable) -> Self {
        Self {
            arg: ArgType::Var(variable),
            bound: Bound::Exact,
            array_depth: 0,
            args: Vec::new(),
        }
    }

    pub fn with_args(mut self, args: Vec<TypeSignature>) -> Self {
        self.args = args;
        self
    }

    pub fn kind(&self) -> SignatureKind {
        match (&self.arg, self.array_depth) {
            (_, d) if d > 0 => SignatureKind::Array,
            (ArgType::Plain(_), _) => SignatureKind::Plain,
            (ArgType::Var(_), _) => SignatureKind::TypeVariable,
        }
    }

    /// The named type, ignoring array depth; `None` for type variables.
    pub fn type_name(&self) -> Option<&TypeName> {
        match &self.arg {
            ArgType::Plain(t) => Some(t),
            ArgType::Var(_) => None,
        }
    }

    pub fn is_array(&self) -> bool {
        self.array_depth > 0
    }

    /// Grammar form, as stored in the class file.
    pub fn signature_string(&self) -> String {
        let mut out = String::new();
        self.write_signature(&mut out);
        out
    }

    fn write_signature(&self, out: &mut String) {
        match self.bound {
            Bound::Exact => {}
            Bound::Extends => out.push('+'),
            Bound::Super => out.push('-'),
            Bound::Unbounded => {
                out.push('*');
                return;
            }
        }
        for _ in 0..self.array_depth {
            out.push('[');
        }
        match &self.arg {
            ArgType::Var(v) => {
                out.push('T');
                out.push_str(&v.name);
                out.push(';');
            }
            ArgType::Plain(t) => {
                if let Some(c) = t.descriptor_char() {
                    out.push(c);
                    return;
                }
                out.push('L');
                out.push_str(&t.internal_name());
                if !self.args.is_empty() {
                    out.push('<');
                    for arg in &self.args {
                        arg.write_signature(out);
                    }
                    out.push('>');
                }
                out.push(';');
            }
        }
    }
}

/// Readable form with simple names, e.g. `List<? extends Owner>[]`.
impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bound {
            Bound::Unbounded => return f.write_str("?"),
            Bound::Extends => f.write_str("? extends ")?,
            Bound::Super => f.write_str("? super ")?,
            Bound::Exact => {}
        }
        match &self.arg {
            ArgType::Plain(t) => f.write_str(t.simple_name())?,
            ArgType::Var(v) => f.write_str(&v.name)?,
        }
        if !self.args.is_empty() {
            f.write_str("<")?;
            for (i, arg) in self.args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{arg}")?;
            }
            f.write_str(">")?;
        }
        for _ in 0..self.array_depth {
            f.write_str("[]")?;
        }
        Ok(())
    }
}

/// A declared type parameter, e.g. `T extends Number & Comparable<T>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormalTypeParameter {
    pub name: String,
    /// Class bound; absent when only interface bounds are declared.
    pub bound: Option<TypeSignature>,
    #[serde(default)]
    pub interface_bounds: Vec<TypeSignature>,
}

impl FormalTypeParameter {
    /// Leftmost bound, which determines the erasure.
    pub fn upper_bound(&self) -> Option<&TypeSignature> {
        self.bound.as_ref().or(self.interface_bounds.first())
    }

    fn write_signature(&self, out: &mut String) {
        out.push_str(&self.name);
        out.push(':');
        if let Some(bound) = &self.bound {
            bound.write_signature(out);
        }
        for bound in &self.interface_bounds {
            out.push(':');
            bound.write_signature(out);
        }
    }
}

fn write_type_parameters(params: &[FormalTypeParameter], out: &mut String) {
    if params.is_empty() {
        return;
    }
    out.push('<');
    for p in params {
        p.write_signature(out);
    }
    out.push('>');
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSignature {
    pub type_parameters: Vec<FormalTypeParameter>,
    pub superclass: Option<TypeSignature>,
    pub interfaces: Vec<TypeSignature>,
}

impl ClassSignature {
    /// Supertypes in declaration order: superclass, then interfaces.
    pub fn supertypes(&self) -> impl Iterator<Item = &TypeSignature> {
        self.superclass.iter().chain(self.interfaces.iter())
    }

    pub fn signature_string(&self) -> String {
        let mut out = String::new();
        write_type_parameters(&self.type_parameters, &mut out);
        for sup in self.supertypes() {
            sup.write_signature(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSignature {
    pub type_parameters: Vec<FormalTypeParameter>,
    pub parameters: Vec<TypeSignature>,
    pub return_type: TypeSignature,
    pub exceptions: Vec<TypeSignature>,
}

impl MethodSignature {
    pub fn signature_string(&self) -> String {
        let mut out = String::new();
        write_type_parameters(&self.type_parameters, &mut out);
        out.push('(');
        for p in &self.parameters {
            p.write_signature(&mut out);
        }
        out.push(')');
        self.return_type.write_signature(&mut out);
        for e in &self.exceptions {
            out.push('^');
            e.write_signature(&mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list_of(arg: TypeSignature) -> TypeSignature {
        TypeSignature::plain(TypeName::new("java.util.List")).with_args(vec![arg])
    }

    #[test]
    fn display_uses_simple_names() {
        let sig = list_of(TypeSignature::plain(TypeName::new("java.lang.String")));
        assert_eq!(sig.to_string(), "List<String>");
        assert_eq!(sig.signature_string(), "Ljava/util/List<Ljava/lang/String;>;");
    }

    #[test]
    fn wildcards_and_arrays() {
        let mut arg = TypeSignature::plain(TypeName::new("app.Owner"));
        arg.bound = Bound::Extends;
        let mut sig = list_of(arg);
        sig.array_depth = 1;
        assert_eq!(sig.kind(), SignatureKind::Array);
        assert_eq!(sig.to_string(), "List<? extends Owner>[]");
        assert_eq!(sig.signature_string(), "[Ljava/util/List<+Lapp/Owner;>;");

        let mut any = TypeSignature::plain(TypeName::new("java.lang.Object"));
        any.bound = Bound::Unbounded;
        assert_eq!(list_of(any).signature_string(), "Ljava/util/List<*>;");
    }

    #[test]
    fn primitives_render_as_descriptors() {
        let mut sig = TypeSignature::plain(TypeName::new("int"));
        sig.array_depth = 2;
        assert_eq!(sig.signature_string(), "[[I");
        assert_eq!(sig.to_string(), "int[][]");
    }
}

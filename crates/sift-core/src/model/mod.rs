//! Parsed class-file constructs, as handed over by an external loader.
//!
//! The core never reads class files itself. Loaders produce these nodes
//! (or their JSON form) and the element model addresses them read-only.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod type_name;

pub use type_name::TypeName;

/// Access flags, as stored in the class file.
pub mod access {
    pub const PUBLIC: u32 = 0x0001;
    pub const PRIVATE: u32 = 0x0002;
    pub const PROTECTED: u32 = 0x0004;
    pub const STATIC: u32 = 0x0008;
    pub const FINAL: u32 = 0x0010;
    pub const INTERFACE: u32 = 0x0200;
    pub const ABSTRACT: u32 = 0x0400;
    pub const SYNTHETIC: u32 = 0x1000;
    pub const ANNOTATION: u32 = 0x2000;
    pub const ENUM: u32 = 0x4000;
}

/// A constant value: field initializer, `ldc` operand or annotation element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Str(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Char(char),
    Type(TypeName),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Char(v) => write!(f, "{v}"),
            Self::Type(t) => write!(f, "{t}"),
        }
    }
}

/// Value of one annotation element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnnotationValue {
    Literal(Literal),
    Enum { desc: String, value: String },
    Array(Vec<AnnotationValue>),
    Annotation(AnnotationNode),
}

impl AnnotationValue {
    /// Flatten into literals; enum constants become their constant name.
    pub fn literals(&self) -> Vec<Literal> {
        match self {
            Self::Literal(lit) => vec![lit.clone()],
            Self::Enum { value, .. } => vec![Literal::Str(value.clone())],
            Self::Array(values) => values.iter().flat_map(|v| v.literals()).collect(),
            Self::Annotation(node) => match node.type_name() {
                Some(t) => vec![Literal::Type(t)],
                None => Vec::new(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationNode {
    /// Type descriptor, e.g. `Lorg/acme/Controller;`.
    pub desc: String,
    #[serde(default)]
    pub values: Vec<(String, AnnotationValue)>,
}

impl AnnotationNode {
    pub fn new(type_name: &TypeName) -> Self {
        Self {
            desc: format!("L{};", type_name.internal_name()),
            values: Vec::new(),
        }
    }

    pub fn with_value(mut self, name: &str, value: AnnotationValue) -> Self {
        self.values.push((name.to_string(), value));
        self
    }

    pub fn type_name(&self) -> Option<TypeName> {
        TypeName::from_descriptor(&self.desc)
    }

    pub fn value(&self, name: &str) -> Option<&AnnotationValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokeKind {
    Virtual,
    Static,
    Special,
    Interface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldOp {
    Get,
    Put,
    GetStatic,
    PutStatic,
}

/// Target of a method handle, as captured by `invokedynamic` bootstrap arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodHandle {
    pub owner: String,
    pub name: String,
    pub desc: String,
}

/// The subset of the instruction stream relevant to relationship scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Instruction {
    Invoke {
        kind: InvokeKind,
        owner: String,
        name: String,
        desc: String,
    },
    New {
        type_name: String,
    },
    FieldAccess {
        access: FieldOp,
        owner: String,
        name: String,
        desc: String,
    },
    Ldc {
        value: Literal,
    },
    InvokeDynamic {
        name: String,
        desc: String,
        #[serde(default)]
        handles: Vec<MethodHandle>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldNode {
    pub name: String,
    pub desc: String,
    #[serde(default)]
    pub access: u32,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub annotations: Vec<AnnotationNode>,
    #[serde(default)]
    pub value: Option<Literal>,
}

impl FieldNode {
    pub fn new(name: &str, desc: &str) -> Self {
        Self {
            name: name.to_string(),
            desc: desc.to_string(),
            access: 0,
            signature: None,
            annotations: Vec::new(),
            value: None,
        }
    }

    pub fn with_access(mut self, access: u32) -> Self {
        self.access = access;
        self
    }

    pub fn with_signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationNode) -> Self {
        self.annotations.push(annotation);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodNode {
    pub name: String,
    pub desc: String,
    #[serde(default)]
    pub access: u32,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub annotations: Vec<AnnotationNode>,
    #[serde(default)]
    pub parameter_annotations: Vec<Vec<AnnotationNode>>,
    #[serde(default)]
    pub parameter_names: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<Instruction>,
}

impl MethodNode {
    pub fn new(name: &str, desc: &str) -> Self {
        Self {
            name: name.to_string(),
            desc: desc.to_string(),
            access: access::PUBLIC,
            signature: None,
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            parameter_names: Vec::new(),
            instructions: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: AnnotationNode) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn with_instruction(mut self, instruction: Instruction) -> Self {
        self.instructions.push(instruction);
        self
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }

    pub fn is_static_initializer(&self) -> bool {
        self.name == "<clinit>"
    }

    pub fn parameter_annotations(&self, index: usize) -> &[AnnotationNode] {
        self.parameter_annotations
            .get(index)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassNode {
    /// Internal name, e.g. `org/acme/web/OwnerController`.
    pub name: String,
    #[serde(default)]
    pub access: u32,
    #[serde(default)]
    pub super_name: Option<String>,
    #[serde(default)]
    pub interfaces: Vec<String>,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub outer_class: Option<String>,
    #[serde(default)]
    pub annotations: Vec<AnnotationNode>,
    #[serde(default)]
    pub fields: Vec<FieldNode>,
    #[serde(default)]
    pub methods: Vec<MethodNode>,
}

impl ClassNode {
    pub fn new(type_name: &TypeName) -> Self {
        Self {
            name: type_name.internal_name(),
            access: access::PUBLIC,
            super_name: Some("java/lang/Object".to_string()),
            interfaces: Vec::new(),
            signature: None,
            outer_class: None,
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn with_super(mut self, super_type: &TypeName) -> Self {
        self.super_name = Some(super_type.internal_name());
        self
    }

    pub fn with_interface(mut self, interface: &TypeName) -> Self {
        self.interfaces.push(interface.internal_name());
        self
    }

    pub fn with_signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationNode) -> Self {
        self.annotations.push(annotation);
        self
    }

    pub fn with_field(mut self, field: FieldNode) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: MethodNode) -> Self {
        self.methods.push(method);
        self
    }

    pub fn type_name(&self) -> TypeName {
        TypeName::from_internal(&self.name)
    }

    pub fn super_type(&self) -> Option<TypeName> {
        self.super_name.as_deref().map(TypeName::from_internal)
    }

    pub fn interface_types(&self) -> Vec<TypeName> {
        self.interfaces
            .iter()
            .map(|i| TypeName::from_internal(i))
            .collect()
    }

    pub fn is_interface(&self) -> bool {
        self.access & access::INTERFACE != 0
    }
}

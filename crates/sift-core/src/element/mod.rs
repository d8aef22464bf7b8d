//! Uniform addressing over class-file constructs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::Literal;
use crate::signature::TypeSignature;

pub mod index;

pub use index::{ElementIndex, NodeKey, SignatureSlot};

/// Run-scoped element identifier.
///
/// Discovered elements count up from 1; synthesized elements count down from 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(pub i32);

impl ElementId {
    pub fn is_synthetic(self) -> bool {
        self.0 <= 0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Class,
    Field,
    Method,
    Parameter,
    Annotation,
    Signature,
    Value,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Class => "class",
            Self::Field => "field",
            Self::Method => "method",
            Self::Parameter => "parameter",
            Self::Annotation => "annotation",
            Self::Signature => "signature",
            Self::Value => "value",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One addressable construct. Class and member variants index into the
/// class nodes held by the [`ElementIndex`].
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Class {
        class: usize,
    },
    /// `owner` is the class the field is seen from; `origin` is the declaring
    /// field element when that differs.
    Field {
        class: usize,
        field: usize,
        owner: ElementId,
        origin: Option<ElementId>,
    },
    Method {
        class: usize,
        method: usize,
        owner: ElementId,
        origin: Option<ElementId>,
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
        signature: TypeSignature,
    },
    Value {
        owner: ElementId,
        value: Literal,
    },
}

impl Element {
    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Class { .. } => ElementKind::Class,
            Self::Field { .. } => ElementKind::Field,
            Self::Method { .. } => ElementKind::Method,
            Self::Parameter { .. } => ElementKind::Parameter,
            Self::Annotation { .. } => ElementKind::Annotation,
            Self::Signature { .. } => ElementKind::Signature,
            Self::Value { .. } => ElementKind::Value,
        }
    }

    /// Structural owner; classes have none.
    pub fn parent(&self) -> Option<ElementId> {
        match self {
            Self::Class { .. } => None,
            Self::Field { owner, .. } | Self::Method { owner, .. } => Some(*owner),
            Self::Parameter { method, .. } => Some(*method),
            Self::Annotation { owner, .. }
            | Self::Signature { owner, .. }
            | Self::Value { owner, .. } => Some(*owner),
        }
    }
}

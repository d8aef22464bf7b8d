//! Typed element collections flowing between actions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::element::{ElementId, ElementKind};
use crate::error::{Result, SiftError};

/// What a scope holds. `Unresolved` marks a scope whose element kind could
/// not be determined (mixed, or an unregistered entity type).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Template,
    Class,
    Field,
    Method,
    Parameter,
    Annotation,
    Signature,
    Value,
    Unresolved,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Template => "template",
            Self::Class => "class",
            Self::Field => "field",
            Self::Method => "method",
            Self::Parameter => "parameter",
            Self::Annotation => "annotation",
            Self::Signature => "signature",
            Self::Value => "value",
            Self::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ElementKind> for ScopeKind {
    fn from(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Class => Self::Class,
            ElementKind::Field => Self::Field,
            ElementKind::Method => Self::Method,
            ElementKind::Parameter => Self::Parameter,
            ElementKind::Annotation => Self::Annotation,
            ElementKind::Signature => Self::Signature,
            ElementKind::Value => Self::Value,
        }
    }
}

/// Input and output of every action: the root template, or an ordered,
/// duplicate-free element list of one kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    Template,
    Elements { kind: ScopeKind, ids: Vec<ElementId> },
}

impl Scope {
    pub fn elements(kind: ScopeKind, ids: Vec<ElementId>) -> Self {
        let mut seen = HashSet::new();
        let ids = ids.into_iter().filter(|id| seen.insert(*id)).collect();
        Self::Elements { kind, ids }
    }

    pub fn kind(&self) -> ScopeKind {
        match self {
            Self::Template => ScopeKind::Template,
            Self::Elements { kind, .. } => *kind,
        }
    }

    pub fn ids(&self) -> &[ElementId] {
        match self {
            Self::Template => &[],
            Self::Elements { ids, .. } => ids,
        }
    }

    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }

    pub fn expect_template(&self) -> Result<()> {
        match self {
            Self::Template => Ok(()),
            other => Err(SiftError::IllegalGenericCast {
                expected: ScopeKind::Template,
                found: other.kind(),
            }),
        }
    }

    /// Elements, provided the scope holds one of `accepted`. Empty and
    /// unresolved scopes are accepted as-is.
    pub fn expect(&self, accepted: &[ScopeKind]) -> Result<&[ElementId]> {
        match self {
            Self::Template => Err(SiftError::IllegalGenericCast {
                expected: accepted.first().copied().unwrap_or(ScopeKind::Unresolved),
                found: ScopeKind::Template,
            }),
            Self::Elements { ids, .. } if ids.is_empty() => Ok(ids),
            Self::Elements { kind, ids } => {
                if *kind == ScopeKind::Unresolved || accepted.contains(kind) {
                    Ok(ids)
                } else {
                    Err(SiftError::IllegalGenericCast {
                        expected: accepted.first().copied().unwrap_or(ScopeKind::Unresolved),
                        found: *kind,
                    })
                }
            }
        }
    }

    /// Any non-template scope.
    pub fn expect_elements(&self) -> Result<&[ElementId]> {
        match self {
            Self::Template => Err(SiftError::IllegalGenericCast {
                expected: ScopeKind::Unresolved,
                found: ScopeKind::Template,
            }),
            Self::Elements { ids, .. } => Ok(ids),
        }
    }

    /// Order-preserving union. The template contributes no elements.
    pub fn union(self, other: Scope) -> Scope {
        match (self, other) {
            (Self::Template, Self::Template) => Self::Template,
            (Self::Template, s) | (s, Self::Template) => s,
            (Self::Elements { kind: a, ids: mut left }, Self::Elements { kind: b, ids: right }) => {
                let kind = match (a, b) {
                    _ if left.is_empty() => b,
                    _ if right.is_empty() => a,
                    (a, b) if a == b => a,
                    _ => ScopeKind::Unresolved,
                };
                left.extend(right);
                Self::elements(kind, left)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scopes_are_vacuously_compatible() {
        let scope = Scope::elements(ScopeKind::Field, Vec::new());
        assert!(scope.expect(&[ScopeKind::Method]).is_ok());
        let scope = Scope::elements(ScopeKind::Field, vec![ElementId(3)]);
        let err = scope.expect(&[ScopeKind::Method]).unwrap_err();
        assert!(matches!(
            err,
            SiftError::IllegalGenericCast {
                expected: ScopeKind::Method,
                found: ScopeKind::Field
            }
        ));
    }

    #[test]
    fn template_is_strict() {
        assert!(Scope::Template.expect_template().is_ok());
        assert!(Scope::elements(ScopeKind::Class, Vec::new())
            .expect_template()
            .is_err());
        assert!(Scope::Template.expect(&[ScopeKind::Class]).is_err());
    }

    #[test]
    fn union_deduplicates_and_tracks_kind() {
        let a = Scope::elements(ScopeKind::Method, vec![ElementId(1), ElementId(2)]);
        let b = Scope::elements(ScopeKind::Method, vec![ElementId(2), ElementId(3)]);
        let u = a.union(b);
        assert_eq!(u.ids(), &[ElementId(1), ElementId(2), ElementId(3)]);
        assert_eq!(u.kind(), ScopeKind::Method);

        let c = Scope::elements(ScopeKind::Class, vec![ElementId(7)]);
        assert_eq!(u.union(c).kind(), ScopeKind::Unresolved);
        let empty = Scope::elements(ScopeKind::Field, Vec::new());
        assert_eq!(empty.union(Scope::Template), Scope::elements(ScopeKind::Field, Vec::new()));
    }
}

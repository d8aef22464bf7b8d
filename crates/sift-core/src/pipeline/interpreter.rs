//! Evaluates an [`Action`] tree against a [`Context`].
//!
//! Every invocation pushes its description onto `ctx.path` and opens a
//! measurement node. Both are popped on success only, so when an error
//! unwinds, `ctx.path` still names the failing action and its ancestors.

use crate::element::{Element, ElementId, ElementKind, SignatureSlot};
use crate::error::{Result, SiftError};
use crate::graph::{EntityId, EntityType};
use crate::relations;

use super::action::{Action, SynthesisTarget};
use super::context::Context;
use super::predicate::Predicate;
use super::property::{evaluate, render_label, PropertySpec};
use super::scope::{Scope, ScopeKind};

pub fn execute(ctx: &mut Context, action: &Action, scope: Scope) -> Result<Scope> {
    let description = action.describe();
    log::debug!("{description}: {} {} elements", scope.kind(), scope.len());
    ctx.path.push(description.clone());
    ctx.measurements
        .begin(&description, scope.kind(), scope.len(), ctx.entities.len());

    let out = apply(ctx, action, scope)?;

    ctx.measurements
        .end(out.kind(), out.len(), ctx.entities.len());
    ctx.path.pop();
    Ok(out)
}

fn apply(ctx: &mut Context, action: &Action, scope: Scope) -> Result<Scope> {
    match action {
        // --- Combinators ---
        Action::Chain { actions } => {
            let mut current = scope;
            for a in actions {
                current = execute(ctx, a, current)?;
            }
            Ok(current)
        }
        Action::Compose { first, second } => {
            let left = execute(ctx, first, scope.clone())?;
            let right = execute(ctx, second, scope)?;
            Ok(left.union(right))
        }
        Action::Fork {
            predicate,
            then,
            otherwise,
        } => fork(ctx, predicate, then, otherwise.as_deref(), scope),
        Action::Nested { body } => {
            execute(ctx, body, scope.clone())?;
            Ok(scope)
        }
        Action::Identity => Ok(scope),

        // --- Scopes ---
        Action::Classes => {
            scope.expect_template()?;
            Ok(Scope::elements(ScopeKind::Class, ctx.index.classes()))
        }
        Action::ElementsOf { entity } => {
            let ids: Vec<ElementId> = ctx
                .entities
                .entities_of(entity)
                .iter()
                .map(|e| e.element)
                .collect();
            let kind = ctx
                .entities
                .kind_of(entity)
                .map(ScopeKind::from)
                .unwrap_or(ScopeKind::Unresolved);
            Ok(Scope::elements(kind, ids))
        }
        Action::Methods { inherited } => {
            let ids = scope.expect(&[ScopeKind::Class])?.to_vec();
            let out = ids
                .into_iter()
                .flat_map(|c| ctx.index.methods(c, *inherited))
                .collect();
            Ok(Scope::elements(ScopeKind::Method, out))
        }
        Action::Fields { inherited } => {
            let ids = scope.expect(&[ScopeKind::Class])?.to_vec();
            let out = ids
                .into_iter()
                .flat_map(|c| ctx.index.fields(c, *inherited))
                .collect();
            Ok(Scope::elements(ScopeKind::Field, out))
        }
        Action::Parameters => {
            let ids = scope.expect(&[ScopeKind::Method])?.to_vec();
            let out = ids
                .into_iter()
                .flat_map(|m| ctx.index.parameters(m))
                .collect();
            Ok(Scope::elements(ScopeKind::Parameter, out))
        }
        Action::Annotations { annotation } => {
            let ids = scope
                .expect(&[
                    ScopeKind::Class,
                    ScopeKind::Field,
                    ScopeKind::Method,
                    ScopeKind::Parameter,
                ])?
                .to_vec();
            let mut out = Vec::new();
            for owner in ids {
                for a in ctx.index.annotations(owner) {
                    let wanted = match annotation {
                        Some(t) => ctx
                            .index
                            .annotation_node(a)
                            .and_then(|n| n.type_name())
                            .is_some_and(|n| n == *t),
                        None => true,
                    };
                    if wanted {
                        out.push(a);
                    }
                }
            }
            Ok(Scope::elements(ScopeKind::Annotation, out))
        }
        Action::Signature => {
            let ids = scope
                .expect(&[ScopeKind::Field, ScopeKind::Parameter, ScopeKind::Method])?
                .to_vec();
            let mut out = Vec::new();
            for owner in ids {
                if let Some(sig) = ctx.resolver.declared_type(&ctx.index, owner) {
                    out.push(ctx.index.intern_signature(owner, SignatureSlot::Declared, sig));
                }
            }
            Ok(Scope::elements(ScopeKind::Signature, out))
        }
        Action::TypeArguments => {
            let ids = scope.expect(&[ScopeKind::Signature])?.to_vec();
            let mut out = Vec::new();
            for owner in ids {
                let args = match ctx.index.get(owner) {
                    Some(Element::Signature { signature, .. }) => signature.args.clone(),
                    _ => continue,
                };
                for (i, arg) in args.into_iter().enumerate() {
                    out.push(ctx.index.intern_signature(owner, SignatureSlot::Argument(i), arg));
                }
            }
            Ok(Scope::elements(ScopeKind::Signature, out))
        }
        Action::ExplodeType { synthesize } => explode(ctx, *synthesize, scope),
        Action::OuterScope { kind, body } => {
            let outer = ascend(ctx, *kind, &scope)?;
            execute(ctx, body, outer)?;
            Ok(scope)
        }
        Action::Ascend { kind } => ascend(ctx, *kind, &scope),
        Action::Filter { predicate } => {
            let kind = scope.kind();
            let ids = scope.expect_elements()?.to_vec();
            let mut out = Vec::new();
            for id in ids {
                if predicate.test(ctx, id)? {
                    out.push(id);
                }
            }
            Ok(Scope::elements(kind, out))
        }

        // --- Entities ---
        Action::RegisterEntity {
            entity,
            label,
            properties,
        } => {
            let ids = scope.expect_elements()?.to_vec();
            for id in ids {
                register(ctx, entity, label.as_deref(), properties, id)?;
            }
            Ok(scope)
        }
        Action::UpdateEntity {
            entity,
            label,
            properties,
        } => {
            let ids = scope.expect_elements()?.to_vec();
            for id in ids {
                update(ctx, entity, label.as_deref(), properties, id)?;
            }
            Ok(scope)
        }
        Action::Associate { parent, key, child } => {
            let ids = scope.expect_elements()?.to_vec();
            for id in ids {
                associate(ctx, parent, key, child, id)?;
            }
            Ok(scope)
        }
        Action::Synthesize { targets } => {
            scope.expect_template()?;
            Ok(Scope::elements(ScopeKind::Class, synthesize(ctx, targets)))
        }
        Action::Relate {
            kind,
            source,
            target,
            key,
            backtrack,
        } => {
            let key = key.as_deref().unwrap_or(kind.as_str());
            relations::relate(
                &mut ctx.scanner,
                &ctx.index,
                &mut ctx.entities,
                *kind,
                source,
                target,
                key,
                *backtrack,
            );
            Ok(scope)
        }
    }
}

fn fork(
    ctx: &mut Context,
    predicate: &Predicate,
    then: &Action,
    otherwise: Option<&Action>,
    scope: Scope,
) -> Result<Scope> {
    let kind = scope.kind();
    let ids = scope.expect_elements()?.to_vec();
    let (mut matched, mut rest) = (Vec::new(), Vec::new());
    for id in ids {
        if predicate.test(ctx, id)? {
            matched.push(id);
        } else {
            rest.push(id);
        }
    }
    let mut out = Scope::elements(kind, Vec::new());
    if !matched.is_empty() {
        out = out.union(execute(ctx, then, Scope::elements(kind, matched))?);
    }
    if !rest.is_empty() {
        let rest = Scope::elements(kind, rest);
        out = out.union(match otherwise {
            Some(action) => execute(ctx, action, rest)?,
            None => rest,
        });
    }
    Ok(out)
}

/// Class of each element's declared type, recording the element as its cause.
fn explode(ctx: &mut Context, synthesize: bool, scope: Scope) -> Result<Scope> {
    let ids = scope
        .expect(&[
            ScopeKind::Field,
            ScopeKind::Parameter,
            ScopeKind::Method,
            ScopeKind::Signature,
            ScopeKind::Annotation,
            ScopeKind::Value,
        ])?
        .to_vec();
    let mut out = Vec::new();
    for id in ids {
        let Some(sig) = ctx.resolver.declared_type(&ctx.index, id) else {
            continue;
        };
        let type_name = ctx.resolver.concrete_class(&ctx.index, &sig)?;
        let class = match ctx.index.class_by_name(&type_name) {
            Some(class) => class,
            None if synthesize && !type_name.is_primitive() => {
                ctx.index.synthesize_class(&type_name, &[])
            }
            None => continue,
        };
        ctx.trace.record(class, id);
        out.push(class);
    }
    Ok(Scope::elements(ScopeKind::Class, out))
}

/// Nearest ancestor of `kind` for each element, structural parents first.
fn ascend(ctx: &Context, kind: ScopeKind, scope: &Scope) -> Result<Scope> {
    let ids = scope.expect_elements()?;
    let out = ids
        .iter()
        .filter_map(|&id| {
            ctx.trace
                .ancestors(&ctx.index, id)
                .into_iter()
                .find(|a| ctx.index.kind(*a).map(ScopeKind::from) == Some(kind))
        })
        .collect();
    Ok(Scope::elements(kind, out))
}

fn element_kind(ctx: &Context, id: ElementId) -> Result<ElementKind> {
    ctx.index.kind(id).ok_or(SiftError::UnknownElement(id))
}

fn register(
    ctx: &mut Context,
    entity: &EntityType,
    label: Option<&str>,
    specs: &[PropertySpec],
    id: ElementId,
) -> Result<()> {
    let kind = element_kind(ctx, id)?;
    let properties = evaluate(ctx, id, specs)?;
    let label = match label {
        Some(template) => Some(render_label(ctx, id, template, &properties)),
        None if ctx.entities.find(id).is_none() => Some(ctx.index.label(id)),
        None => None,
    };
    ctx.entities.register(entity, id, kind, label, properties)?;
    Ok(())
}

/// Update the entity bound to `id` or its nearest ancestor, reading
/// properties from `id` itself.
fn update(
    ctx: &mut Context,
    entity: &EntityType,
    label: Option<&str>,
    specs: &[PropertySpec],
    id: ElementId,
) -> Result<()> {
    let target = ctx
        .enclosing_entity(id, entity)
        .map(|e| e.id)
        .ok_or(SiftError::EntityNotFound { element: id })?;
    let properties = evaluate(ctx, id, specs)?;
    let label = label.map(|t| render_label(ctx, id, t, &properties));
    ctx.entities.update(target, label, properties);
    Ok(())
}

/// Wire `parent[key] = child` for one element of the scope.
///
/// Both entities are first looked up on the element and its ancestors.
/// When only one side is found there, the other is searched among entities
/// whose elements descend from it. A child left without any parent fails
/// the run under `strict_relations`.
fn associate(
    ctx: &mut Context,
    parent: &EntityType,
    key: &str,
    child: &EntityType,
    id: ElementId,
) -> Result<()> {
    let parent_entity = ctx.enclosing_entity(id, parent).map(|e| (e.id, e.element));
    let child_entity = ctx.enclosing_entity(id, child).map(|e| (e.id, e.element));

    let pairs: Vec<(EntityId, EntityId)> = match (parent_entity, child_entity) {
        (Some((p, _)), Some((c, _))) => vec![(p, c)],
        (Some((p, anchor)), None) => descendants(ctx, child, anchor)
            .into_iter()
            .map(|c| (p, c))
            .collect(),
        (None, Some((c, anchor))) => {
            let parents = descendants(ctx, parent, anchor);
            if parents.is_empty() {
                if ctx.config.strict_relations {
                    return Err(SiftError::FailedToResolveParentRelation {
                        parent: parent.clone(),
                        key: key.to_string(),
                        child: child.clone(),
                    });
                }
                log::warn!("{parent}[{key}] = {child}: no parent for {}", ctx.index.label(id));
            }
            parents.into_iter().map(|p| (p, c)).collect()
        }
        (None, None) => Vec::new(),
    };
    for (p, c) in pairs {
        if p != c {
            ctx.entities.add_child(p, key, c);
        }
    }
    Ok(())
}

/// Entities of `entity_type` whose element has `anchor` among its ancestors.
fn descendants(ctx: &Context, entity_type: &EntityType, anchor: ElementId) -> Vec<EntityId> {
    ctx.entities
        .entities_of(entity_type)
        .into_iter()
        .filter(|e| ctx.trace.ancestors(&ctx.index, e.element).contains(&anchor))
        .map(|e| e.id)
        .collect()
}

fn synthesize(ctx: &mut Context, targets: &[SynthesisTarget]) -> Vec<ElementId> {
    targets
        .iter()
        .map(|t| ctx.index.synthesize_class(&t.type_name, &t.methods))
        .collect()
}

//! Augment & Grouping Expander
//!
//! Locates groupings referenced by `uses`, indexes where each grouping is
//! instantiated, and merges augment contributions into their targets.
//!
//! Merging is by node identity: a child already present in the target is
//! never inserted again, so re-applying an augment leaves the target
//! unchanged.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::context::ResolveContext;
use crate::diagnostics::{DiagnosticItem, Operation};
use crate::error::{ResolveError, Result};
use crate::model::{ModuleId, NodeBody, NodeId, NodeKind, SchemaModel};
use crate::path::split_qualified;
use crate::registry::ModuleRegistry;
use crate::traverse::traverse;

/// Child kinds an augment contributes directly
const AUGMENT_KINDS: [NodeKind; 7] = [
    NodeKind::Container,
    NodeKind::List,
    NodeKind::Leaf,
    NodeKind::LeafList,
    NodeKind::Choice,
    NodeKind::Notification,
    NodeKind::Case,
];

/// Grouping fields contributed through `uses`
const GROUPING_FIELD_KINDS: [NodeKind; 5] = [
    NodeKind::Container,
    NodeKind::List,
    NodeKind::Leaf,
    NodeKind::LeafList,
    NodeKind::Choice,
];

// =============================================================================
// Grouping Resolution
// =============================================================================

/// Locate the grouping a `uses` node refers to.
///
/// Unprefixed (or self-prefixed) names are looked up in the enclosing
/// scopes of the `uses` first, then at the top level of the module and its
/// submodules. Other prefixes are translated through the using module's
/// imports and searched at the imported module's top level.
pub fn resolve_grouping(
    model: &SchemaModel,
    registry: &ModuleRegistry,
    uses: NodeId,
) -> Result<NodeId> {
    let node = model.node(uses);
    let reference = match &node.body {
        NodeBody::Uses { grouping } => grouping.as_str(),
        _ => node.name.as_str(),
    };
    let context = model.module_of(uses);
    let (prefix, name) = split_qualified(reference);
    let target = registry.resolve_by_prefix(model, context, prefix.unwrap_or(""))?;

    if target == context {
        let mut scope = model.parent_node(uses);
        while let Some(current) = scope {
            if let Some(children) = model.node(current).children() {
                if let Some(found) = children
                    .groupings
                    .iter()
                    .find(|g| model.node(**g).name == name)
                {
                    return Ok(*found);
                }
            }
            scope = model.parent_node(current);
        }
    }

    model
        .module(target)
        .submodules
        .iter()
        .flat_map(|sm| model.submodule(*sm).body.groupings.iter())
        .find(|g| model.node(**g).name == name)
        .copied()
        .ok_or_else(|| ResolveError::UnresolvedGroupingReference {
            grouping: reference.to_string(),
            module: model.module(context).name.clone(),
        })
}

/// Reverse index: grouping -> `uses` nodes that instantiate it
#[derive(Debug, Clone, Default)]
pub struct GroupingSites {
    sites: HashMap<NodeId, Vec<NodeId>>,
}

impl GroupingSites {
    /// Index every resolvable `uses` in the model. Unresolvable ones are
    /// reported when they are expanded, not here.
    pub fn build(model: &SchemaModel, registry: &ModuleRegistry) -> Self {
        let mut sites: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for (id, node) in model.nodes() {
            if node.kind() != NodeKind::Uses {
                continue;
            }
            match resolve_grouping(model, registry, id) {
                Ok(grouping) => sites.entry(grouping).or_default().push(id),
                Err(e) => debug!(uses = %model.describe(id), error = %e, "Uses not indexed"),
            }
        }
        Self { sites }
    }

    /// Instantiation sites of `grouping`, in model order
    pub fn uses_of(&self, grouping: NodeId) -> &[NodeId] {
        self.sites.get(&grouping).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Collect the fields a `uses` contributes, following nested `uses`
/// inside the grouping. Each grouping is expanded at most once.
fn expand_uses(
    model: &SchemaModel,
    registry: &ModuleRegistry,
    uses: NodeId,
    visited: &mut HashSet<NodeId>,
    expansion: &mut Expansion,
) {
    let grouping = match resolve_grouping(model, registry, uses) {
        Ok(g) => g,
        Err(e) => {
            expansion.failures.push((uses, e));
            return;
        }
    };
    if !visited.insert(grouping) {
        return;
    }
    expansion.groupings.push(grouping);

    let Some(fields) = model.node(grouping).children() else {
        return;
    };
    for kind in GROUPING_FIELD_KINDS {
        if let Some(slot) = fields.slot(kind) {
            expansion.fields.extend(slot.iter().map(|id| (kind, *id)));
        }
    }
    for nested in &fields.uses {
        expand_uses(model, registry, *nested, visited, expansion);
    }
}

#[derive(Debug, Default)]
struct Expansion {
    fields: Vec<(NodeKind, NodeId)>,
    groupings: Vec<NodeId>,
    failures: Vec<(NodeId, ResolveError)>,
}

// =============================================================================
// Augments
// =============================================================================

/// Target of an augment: the recorded one once applied, resolved on demand
/// before that
pub fn augment_target(ctx: &ResolveContext, augment: NodeId) -> Result<NodeId> {
    if let Some(target) = ctx.augment_targets.get(&augment) {
        return Ok(*target);
    }
    match &ctx.model.node(augment).body {
        NodeBody::Augment { target, .. } => traverse(ctx, target, augment, false),
        _ => Err(not_an_augment(ctx, augment)),
    }
}

fn not_an_augment(ctx: &ResolveContext, node: NodeId) -> ResolveError {
    ResolveError::InvalidDocument {
        source_name: ctx.module_name_of(node).to_string(),
        message: format!("{} is not an augment", ctx.model.describe(node)),
    }
}

/// Whether a contribution of `child` kind may be merged into a `target`
fn accepts(target: NodeKind, child: NodeKind) -> bool {
    match child {
        NodeKind::Case => target == NodeKind::Choice,
        NodeKind::Notification => matches!(target, NodeKind::Container | NodeKind::List),
        _ => true,
    }
}

/// Resolve an augment's target and merge its contributions.
///
/// Direct children and the fields of every `uses` inside the augment are
/// merged. Groupings that fail to resolve are handled through the
/// context's policy; the rest of the augment still applies.
pub fn apply_augment(ctx: &mut ResolveContext, augment: NodeId) -> Result<NodeId> {
    let (path, children) = match &ctx.model.node(augment).body {
        NodeBody::Augment { target, children } => (target.clone(), children.clone()),
        _ => return Err(not_an_augment(ctx, augment)),
    };

    let target = traverse(ctx, &path, augment, false)?;
    let target_kind = ctx.model.kind(target);
    if !target_kind.is_augmentable() {
        return Err(ResolveError::InvalidAugmentTarget {
            path,
            kind: target_kind.to_string(),
            module: ctx.module_name_of(augment).to_string(),
        });
    }

    let mut expansion = Expansion::default();
    for kind in AUGMENT_KINDS {
        if let Some(slot) = children.slot(kind) {
            expansion.fields.extend(slot.iter().map(|id| (kind, *id)));
        }
    }
    let mut visited = HashSet::new();
    for uses in &children.uses {
        expand_uses(&ctx.model, &ctx.registry, *uses, &mut visited, &mut expansion);
    }

    let mut added = 0;
    if let Some(target_children) = ctx.model.children_mut(target) {
        for (kind, id) in &expansion.fields {
            if !accepts(target_kind, *kind) {
                warn!(
                    augment = %path,
                    kind = %kind,
                    target = %target_kind,
                    "Contribution not allowed in target"
                );
                continue;
            }
            if target_children.insert_unique(*kind, *id) {
                added += 1;
            }
        }
    }

    ctx.augment_targets.insert(augment, target);
    ctx.augmented_groupings.extend(expansion.groupings);

    for (uses, err) in expansion.failures {
        let subject = ctx.model.describe(uses);
        ctx.recover(Operation::ExpandUses, subject, err)?;
    }

    debug!(
        augment = %path,
        target = %ctx.model.describe(target),
        added,
        "Applied augment"
    );
    Ok(target)
}

/// Apply every top-level augment of `module`.
///
/// The module's own body goes first, then included submodules in
/// declaration order, then any attached submodule the includes do not name.
/// Returns the number of augments applied.
pub fn preprocess_augments(ctx: &mut ResolveContext, module: ModuleId) -> Result<usize> {
    let module_name = ctx.module_name(module).to_string();
    let declared = ctx.model.module(module);
    let mut units = vec![declared.main_submodule()];

    for include in declared.includes.clone() {
        match ctx.model.submodule_by_name(module, &include) {
            Some(sm) if !units.contains(&sm) => units.push(sm),
            Some(_) => {}
            None => {
                warn!(
                    module = %module_name,
                    submodule = %include,
                    "Included submodule not in batch"
                );
                ctx.diagnostics.push(DiagnosticItem::warning(
                    Operation::ApplyAugment,
                    "W001",
                    module_name.clone(),
                    include.clone(),
                    format!("included submodule {} is not part of the batch", include),
                ));
            }
        }
    }
    for sm in ctx.model.module(module).submodules.clone() {
        if !units.contains(&sm) {
            debug!(
                module = %module_name,
                submodule = %ctx.model.submodule(sm).name,
                "Submodule not listed in includes"
            );
            units.push(sm);
        }
    }

    let mut applied = 0;
    for sm in units {
        let augments = ctx.model.submodule(sm).body.augments.clone();
        for augment in augments {
            match apply_augment(ctx, augment) {
                Ok(_) => applied += 1,
                Err(e) => {
                    let subject = ctx.model.describe(augment);
                    ctx.recover(Operation::ApplyAugment, subject, e)?;
                }
            }
        }
    }

    info!(module = %module_name, applied, "Preprocessed augments");
    Ok(applied)
}

/// Whether `grouping`'s fields were merged somewhere through an augment
pub fn grouping_in_augment(ctx: &ResolveContext, grouping: NodeId) -> bool {
    ctx.augmented_groupings.contains(&grouping)
}

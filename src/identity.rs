//! Identity Hierarchy Builder
//!
//! Identities form a forest through their `base` references. Roots get a
//! generated value-domain type; every derived identity contributes one
//! lookup-table entry per ancestor, emitted later as deferred
//! initialization of its submodule.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::context::ResolveContext;
use crate::diagnostics::Operation;
use crate::error::{ResolveError, Result};
use crate::model::{IdentityMapEntry, ModuleId, NodeBody, NodeId, SchemaModel};
use crate::naming::identity_type_name;
use crate::path::split_qualified;
use crate::registry::ModuleRegistry;

/// Identity named by `reference` (`prefix:name` or `name`) as seen from
/// `context`, searched across the owning module's submodules
pub fn find_identity(
    model: &SchemaModel,
    registry: &ModuleRegistry,
    context: ModuleId,
    reference: &str,
) -> Result<Option<NodeId>> {
    let (prefix, name) = split_qualified(reference);
    let owner = registry.resolve_by_prefix(model, context, prefix.unwrap_or(""))?;
    Ok(model
        .module(owner)
        .submodules
        .iter()
        .flat_map(|sm| model.submodule(*sm).body.identities.iter())
        .find(|id| model.node(**id).name == name)
        .copied())
}

/// Ancestors of `identity` from its direct base up to the root, following
/// the first `base` of each identity.
///
/// Empty for a root. Revisiting an identity is a cycle.
pub fn base_chain(ctx: &ResolveContext, identity: NodeId) -> Result<Vec<NodeId>> {
    let model = &ctx.model;
    let mut chain = Vec::new();
    let mut visited = HashSet::from([identity]);
    let mut current = identity;

    loop {
        let base_ref = match &model.node(current).body {
            NodeBody::Identity { bases } => bases.first(),
            _ => None,
        };
        let Some(base_ref) = base_ref else {
            break;
        };

        let context = model.module_of(current);
        let base = find_identity(model, &ctx.registry, context, base_ref)?.ok_or_else(|| {
            ResolveError::UnresolvedIdentity {
                base: base_ref.clone(),
                identity: model.node(current).name.clone(),
                module: ctx.module_name(context).to_string(),
            }
        })?;

        if !visited.insert(base) {
            let mut names: Vec<String> = std::iter::once(identity)
                .chain(chain.iter().copied())
                .map(|id| model.node(id).name.clone())
                .collect();
            names.push(model.node(base).name.clone());
            return Err(ResolveError::CyclicIdentityBase {
                identity: model.node(identity).name.clone(),
                module: ctx.module_name_of(identity).to_string(),
                chain: names,
            });
        }

        chain.push(base);
        current = base;
    }

    Ok(chain)
}

/// Root of the hierarchy `identity` belongs to (itself for a root)
pub fn locate_base(ctx: &ResolveContext, identity: NodeId) -> Result<NodeId> {
    Ok(base_chain(ctx, identity)?.last().copied().unwrap_or(identity))
}

/// Register roots and record lookup-table entries for every identity
/// declared in `module`. Returns the number of identities processed.
pub fn preprocess_identities(ctx: &mut ResolveContext, module: ModuleId) -> Result<usize> {
    let mut processed = 0;

    for sm in ctx.model.module(module).submodules.clone() {
        for identity in ctx.model.submodule(sm).body.identities.clone() {
            let chain = match base_chain(ctx, identity) {
                Ok(chain) => chain,
                Err(e) => {
                    let subject = ctx.model.describe(identity);
                    ctx.recover(Operation::LocateBase, subject, e)?;
                    continue;
                }
            };

            let name = ctx.model.node(identity).name.clone();
            let Some(root) = chain.last().copied() else {
                ctx.model.module_mut(module).base_identities.insert(name, identity);
                processed += 1;
                continue;
            };

            let root_module = ctx.model.module_of(root);
            let root_name = ctx.model.node(root).name.clone();
            ctx.model
                .module_mut(root_module)
                .base_identities
                .insert(root_name, root);

            // tables are keyed by the namespace of the module defining the first base
            let base_module = ctx.model.module(ctx.model.module_of(chain[0]));
            let namespace = base_module.namespace.clone();
            let prefix = base_module.prefix.clone();

            let mut entries = Vec::with_capacity(chain.len());
            for base in &chain {
                match identity_type_name(&ctx.model, &ctx.registry, *base) {
                    Ok(base_type) => entries.push(IdentityMapEntry {
                        identity: name.clone(),
                        base: *base,
                        base_type,
                        namespace: namespace.clone(),
                        prefix: prefix.clone(),
                    }),
                    Err(e) => {
                        let subject = ctx.model.describe(identity);
                        ctx.recover(Operation::LocateBase, subject, e)?;
                    }
                }
            }

            let init = &mut ctx.model.submodule_mut(sm).init;
            for entry in entries {
                if !init.contains(&entry) {
                    init.push(entry);
                }
            }
            debug!(identity = %name, depth = chain.len(), "Indexed identity");
            processed += 1;
        }
    }

    info!(module = %ctx.module_name(module), processed, "Preprocessed identities");
    Ok(processed)
}

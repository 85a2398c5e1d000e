//! Batch Compilation
//!
//! Runs the whole resolution pipeline over a loaded model:
//! register -> order -> per module (identities, augments) -> type check.
//! The result is a read-only [`ResolvedSchema`] that emitters query.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::augment::{augment_target, grouping_in_augment, preprocess_augments};
use crate::config::ResolverConfig;
use crate::context::{Policy, ResolveContext};
use crate::diagnostics::{Diagnostics, Operation};
use crate::error::Result;
use crate::identity::{locate_base, preprocess_identities};
use crate::model::{IdentityMapEntry, ModuleId, NodeId, NodeKind, SchemaModel, SubModuleId};
use crate::traverse::{is_instantiated, resolve_leafref, traverse, traverse_from_module};
use crate::types::{declared_type_name, effective_type_name};

/// Pipeline driver
#[derive(Debug, Clone, Copy, Default)]
pub struct Compiler {
    policy: Policy,
}

impl Compiler {
    pub fn new(policy: Policy) -> Self {
        Self { policy }
    }

    pub fn from_config(config: &ResolverConfig) -> Self {
        Self::new(config.resolution.policy)
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    /// Resolve every module of `model`.
    ///
    /// Duplicate modules and import cycles abort under either policy.
    /// Node-local failures abort under [`Policy::Strict`] and are collected
    /// in the result's diagnostics otherwise.
    pub fn compile(&self, model: SchemaModel) -> Result<ResolvedSchema> {
        let mut ctx = ResolveContext::new(model, self.policy)?;
        let order = ctx.registry.compute_order(&ctx.model)?;
        info!(
            order = ?order.iter().map(|m| ctx.module_name(*m)).collect::<Vec<_>>(),
            "Processing modules"
        );

        for module in &order {
            preprocess_identities(&mut ctx, *module)?;
            preprocess_augments(&mut ctx, *module)?;
        }

        let checked = check_types(&mut ctx)?;
        info!(
            typed = checked,
            errors = ctx.diagnostics.error_count(),
            warnings = ctx.diagnostics.warning_count(),
            "Resolution complete"
        );

        Ok(ResolvedSchema { ctx, order })
    }
}

/// Compile with the given policy
pub fn compile(model: SchemaModel, policy: Policy) -> Result<ResolvedSchema> {
    Compiler::new(policy).compile(model)
}

/// Resolve the type of every leaf, leaf-list and typedef so failures surface
/// in the run's diagnostics. Nodes outside every data tree (inside groupings
/// that are never instantiated) are skipped: their relative paths have no
/// anchor.
fn check_types(ctx: &mut ResolveContext) -> Result<usize> {
    let typed: Vec<NodeId> = {
        let view: &ResolveContext = ctx;
        view.model
            .nodes()
            .filter(|(_, node)| {
                matches!(node.kind(), NodeKind::Leaf | NodeKind::LeafList | NodeKind::Typedef)
            })
            .map(|(id, _)| id)
            .filter(|id| is_instantiated(view, *id))
            .collect()
    };

    for id in &typed {
        if let Err(e) = effective_type_name(ctx, *id) {
            let subject = ctx.model.describe(*id);
            ctx.recover(Operation::ResolveType, subject, e)?;
        }
    }
    debug!(count = typed.len(), "Checked types");
    Ok(typed.len())
}

// =============================================================================
// Resolved Schema
// =============================================================================

/// Fully preprocessed model plus the queries emitters use
#[derive(Debug)]
pub struct ResolvedSchema {
    ctx: ResolveContext,
    order: Vec<ModuleId>,
}

impl ResolvedSchema {
    pub fn model(&self) -> &SchemaModel {
        self.ctx.model()
    }

    pub fn context(&self) -> &ResolveContext {
        &self.ctx
    }

    /// Processing order: every module after the modules it imports
    pub fn order(&self) -> &[ModuleId] {
        &self.order
    }

    pub fn order_names(&self) -> Vec<&str> {
        self.order.iter().map(|m| self.ctx.module_name(*m)).collect()
    }

    pub fn module(&self, name: &str) -> Option<ModuleId> {
        self.ctx.registry.get(name)
    }

    /// Whether `node` belongs to some module's data tree
    /// (see [`crate::traverse::is_instantiated`])
    pub fn is_instantiated(&self, node: NodeId) -> bool {
        is_instantiated(&self.ctx, node)
    }

    pub fn traverse(&self, path: &str, origin: NodeId, require_leaf: bool) -> Result<NodeId> {
        traverse(&self.ctx, path, origin, require_leaf)
    }

    pub fn traverse_from_module(
        &self,
        module: ModuleId,
        path: &str,
        require_leaf: bool,
    ) -> Result<NodeId> {
        traverse_from_module(&self.ctx, module, path, require_leaf)
    }

    pub fn resolve_leafref(&self, path: &str, from: NodeId) -> Result<NodeId> {
        resolve_leafref(&self.ctx, path, from)
    }

    pub fn effective_type_name(&self, node: NodeId) -> Result<String> {
        effective_type_name(&self.ctx, node)
    }

    pub fn declared_type_name(&self, node: NodeId) -> Result<String> {
        declared_type_name(&self.ctx, node)
    }

    pub fn locate_base(&self, identity: NodeId) -> Result<NodeId> {
        locate_base(&self.ctx, identity)
    }

    /// Root identities of `module` that need a generated type
    pub fn base_identities(&self, module: ModuleId) -> &BTreeMap<String, NodeId> {
        &self.model().module(module).base_identities
    }

    /// Deferred identity-table entries of a submodule
    pub fn identity_entries(&self, submodule: SubModuleId) -> &[IdentityMapEntry] {
        &self.model().submodule(submodule).init
    }

    pub fn grouping_in_augment(&self, grouping: NodeId) -> bool {
        grouping_in_augment(&self.ctx, grouping)
    }

    /// Target an applied augment was merged into
    pub fn augment_target(&self, augment: NodeId) -> Option<NodeId> {
        augment_target(&self.ctx, augment).ok()
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        self.ctx.diagnostics()
    }

    pub fn has_errors(&self) -> bool {
        self.ctx.diagnostics().has_errors()
    }
}

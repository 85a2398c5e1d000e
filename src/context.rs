//! Resolution Context
//!
//! Everything one compilation run shares: the model, the module registry,
//! the grouping instantiation index, augment bookkeeping, accumulated
//! diagnostics and the failure policy. Independent runs get independent
//! contexts.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{error, info};

use crate::augment::GroupingSites;
use crate::diagnostics::{Diagnostics, Operation};
use crate::error::{ResolveError, Result};
use crate::model::{ModuleId, NodeId, SchemaModel};
use crate::registry::ModuleRegistry;

/// How node-local failures are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// The first failure aborts the run
    Strict,
    /// Failures are logged and recorded, the offending contribution skipped
    #[default]
    BestEffort,
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Policy::Strict => write!(f, "strict"),
            Policy::BestEffort => write!(f, "best_effort"),
        }
    }
}

/// Shared state of a single compilation run
#[derive(Debug)]
pub struct ResolveContext {
    pub(crate) model: SchemaModel,
    pub(crate) registry: ModuleRegistry,
    pub(crate) policy: Policy,
    pub(crate) diagnostics: Diagnostics,
    /// grouping -> `uses` nodes instantiating it
    pub(crate) grouping_sites: GroupingSites,
    /// augment -> resolved target
    pub(crate) augment_targets: HashMap<NodeId, NodeId>,
    /// groupings whose fields were merged through an augment
    pub(crate) augmented_groupings: HashSet<NodeId>,
}

impl ResolveContext {
    /// Register every module of `model`. Duplicate names or prefixes are
    /// fatal under either policy.
    pub fn new(model: SchemaModel, policy: Policy) -> Result<Self> {
        let mut registry = ModuleRegistry::new();
        for id in model.module_ids() {
            registry.register(&model, id)?;
        }

        let grouping_sites = GroupingSites::build(&model, &registry);

        info!(
            modules = registry.len(),
            nodes = model.node_count(),
            policy = %policy,
            "Resolution context ready"
        );

        Ok(Self {
            model,
            registry,
            policy,
            diagnostics: Diagnostics::new(),
            grouping_sites,
            augment_targets: HashMap::new(),
            augmented_groupings: HashSet::new(),
        })
    }

    pub fn model(&self) -> &SchemaModel {
        &self.model
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn policy(&self) -> Policy {
        self.policy
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn module_name(&self, id: ModuleId) -> &str {
        &self.model.module(id).name
    }

    /// Name of the module enclosing `node`
    pub fn module_name_of(&self, node: NodeId) -> &str {
        self.module_name(self.model.module_of(node))
    }

    /// Apply the policy to a node-local failure.
    ///
    /// Fatal errors and strict runs return the error; best-effort runs log
    /// it, record it, and return `Ok` so the caller can skip the
    /// contribution.
    pub(crate) fn recover(
        &mut self,
        operation: Operation,
        subject: impl Into<String>,
        err: ResolveError,
    ) -> Result<()> {
        if err.is_fatal() || self.policy == Policy::Strict {
            return Err(err);
        }

        let subject = subject.into();
        let module = err.module().unwrap_or_default().to_string();
        error!(
            operation = %operation,
            module = %module,
            subject = %subject,
            code = err.code(),
            "{}",
            err
        );
        self.diagnostics.error(operation, module, subject, err);
        Ok(())
    }
}

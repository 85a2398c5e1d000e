//! Module Registry
//!
//! Indexes modules by name and by prefix, translates prefixes in the context
//! of an importing module, and computes the import-respecting processing
//! order over the whole batch.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, warn};

use crate::error::{DuplicateField, ResolveError, Result};
use crate::model::{ModuleId, SchemaModel};

/// Name and prefix index over registered modules
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    by_name: HashMap<String, ModuleId>,
    by_prefix: HashMap<String, ModuleId>,
    /// Registration order, used to keep ordering deterministic
    registered: Vec<ModuleId>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module. Name and prefix must both be unused; on collision
    /// nothing is inserted.
    pub fn register(&mut self, model: &SchemaModel, id: ModuleId) -> Result<()> {
        let module = model.module(id);

        if let Some(existing) = self.by_name.get(&module.name) {
            return Err(ResolveError::DuplicateModule {
                field: DuplicateField::Name,
                value: module.name.clone(),
                existing: model.module(*existing).name.clone(),
            });
        }
        if let Some(existing) = self.by_prefix.get(&module.prefix) {
            return Err(ResolveError::DuplicateModule {
                field: DuplicateField::Prefix,
                value: module.prefix.clone(),
                existing: model.module(*existing).name.clone(),
            });
        }

        debug!(module = %module.name, prefix = %module.prefix, "Registered module");
        self.by_name.insert(module.name.clone(), id);
        self.by_prefix.insert(module.prefix.clone(), id);
        self.registered.push(id);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<ModuleId> {
        self.by_name.get(name).copied()
    }

    /// Module whose own prefix is `prefix`
    pub fn get_by_prefix(&self, prefix: &str) -> Option<ModuleId> {
        self.by_prefix.get(prefix).copied()
    }

    pub fn modules(&self) -> &[ModuleId] {
        &self.registered
    }

    pub fn len(&self) -> usize {
        self.registered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registered.is_empty()
    }

    /// Module that `prefix` denotes inside `context`.
    ///
    /// An empty prefix or the context's own prefix is the context itself;
    /// anything else must be declared by one of its imports.
    pub fn resolve_by_prefix(
        &self,
        model: &SchemaModel,
        context: ModuleId,
        prefix: &str,
    ) -> Result<ModuleId> {
        let module = model.module(context);
        if prefix.is_empty() || prefix == module.prefix {
            return Ok(context);
        }

        let import = module
            .imports
            .iter()
            .find(|imp| imp.prefix == prefix)
            .ok_or_else(|| ResolveError::UnknownPrefix {
                prefix: prefix.to_string(),
                module: module.name.clone(),
            })?;

        self.get(&import.module).ok_or_else(|| ResolveError::UnknownModule {
            name: import.module.clone(),
            module: module.name.clone(),
        })
    }

    /// Topological order over the import graph (Kahn's algorithm).
    ///
    /// Edges run from an imported module to each importer. Ties are broken
    /// by registration order. Imports naming modules outside the batch are
    /// skipped with a warning.
    pub fn compute_order(&self, model: &SchemaModel) -> Result<Vec<ModuleId>> {
        let mut graph: DiGraph<ModuleId, ()> =
            DiGraph::with_capacity(self.registered.len(), self.registered.len() * 2);
        let mut indices: HashMap<ModuleId, NodeIndex> =
            HashMap::with_capacity(self.registered.len());

        for id in &self.registered {
            indices.insert(*id, graph.add_node(*id));
        }

        for id in &self.registered {
            let module = model.module(*id);
            for import in &module.imports {
                match self.get(&import.module) {
                    Some(dep) => {
                        graph.update_edge(indices[&dep], indices[id], ());
                    }
                    None => warn!(
                        module = %module.name,
                        import = %import.module,
                        "Import of a module outside the batch ignored for ordering"
                    ),
                }
            }
        }

        let mut in_degree: Vec<usize> = graph
            .node_indices()
            .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();

        let mut queue: VecDeque<NodeIndex> = graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .collect();

        let mut order = Vec::with_capacity(graph.node_count());
        while let Some(n) = queue.pop_front() {
            order.push(graph[n]);

            let mut dependents: Vec<NodeIndex> = graph.neighbors(n).collect();
            dependents.sort();
            for dep in dependents {
                in_degree[dep.index()] -= 1;
                if in_degree[dep.index()] == 0 {
                    queue.push_back(dep);
                }
            }
        }

        if order.len() < graph.node_count() {
            let mut modules: Vec<String> = kosaraju_scc(&graph)
                .into_iter()
                .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
                .flatten()
                .map(|idx| model.module(graph[idx]).name.clone())
                .collect();
            modules.sort();
            return Err(ResolveError::CyclicImports { modules });
        }

        debug!(count = order.len(), "Computed module order");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Import;

    /// (name, prefix, imported module names); imports bind the module's own prefix
    fn batch(specs: &[(&str, &str, &[&str])]) -> (SchemaModel, ModuleRegistry) {
        let mut model = SchemaModel::new();
        for (name, prefix, _) in specs {
            model.add_module(*name, *prefix, format!("urn:{}", name));
        }
        for (i, (_, _, imports)) in specs.iter().enumerate() {
            let id = model.module_ids().nth(i).unwrap();
            let imports: Vec<Import> = imports
                .iter()
                .map(|dep| {
                    let prefix = specs.iter().find(|s| s.0 == *dep).map(|s| s.1).unwrap_or("zz");
                    Import { module: dep.to_string(), prefix: prefix.to_string() }
                })
                .collect();
            model.module_mut(id).imports = imports;
        }
        let mut registry = ModuleRegistry::new();
        for id in model.module_ids() {
            registry.register(&model, id).unwrap();
        }
        (model, registry)
    }

    fn names(model: &SchemaModel, order: &[ModuleId]) -> Vec<String> {
        order.iter().map(|id| model.module(*id).name.clone()).collect()
    }

    #[test]
    fn test_duplicate_name_and_prefix() {
        let mut model = SchemaModel::new();
        let a = model.add_module("a", "a", "urn:a");
        let b = model.add_module("a", "other", "urn:a2");
        let c = model.add_module("c", "a", "urn:c");

        let mut registry = ModuleRegistry::new();
        registry.register(&model, a).unwrap();

        let err = registry.register(&model, b).unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateModule { field: DuplicateField::Name, .. }));

        let err = registry.register(&model, c).unwrap_err();
        assert!(matches!(err, ResolveError::DuplicateModule { field: DuplicateField::Prefix, .. }));

        // failed registrations leave no trace
        assert_eq!(registry.len(), 1);
        assert!(registry.get("c").is_none());
        assert!(registry.get_by_prefix("other").is_none());
    }

    #[test]
    fn test_resolve_by_prefix() {
        let (model, registry) = batch(&[("base", "b", &[]), ("mid", "m", &["base"])]);
        let base = registry.get("base").unwrap();
        let mid = registry.get("mid").unwrap();

        assert_eq!(registry.resolve_by_prefix(&model, mid, "").unwrap(), mid);
        assert_eq!(registry.resolve_by_prefix(&model, mid, "m").unwrap(), mid);
        assert_eq!(registry.resolve_by_prefix(&model, mid, "b").unwrap(), base);

        let err = registry.resolve_by_prefix(&model, base, "m").unwrap_err();
        assert_eq!(err, ResolveError::UnknownPrefix { prefix: "m".into(), module: "base".into() });
    }

    #[test]
    fn test_prefix_rebinding_per_importer() {
        let mut model = SchemaModel::new();
        let base = model.add_module("base", "b", "urn:base");
        let user = model.add_module("user", "u", "urn:user");
        model.module_mut(user).imports = vec![Import {
            module: "base".into(),
            prefix: "bb".into(),
        }];
        let mut registry = ModuleRegistry::new();
        registry.register(&model, base).unwrap();
        registry.register(&model, user).unwrap();

        assert_eq!(registry.resolve_by_prefix(&model, user, "bb").unwrap(), base);
        assert!(registry.resolve_by_prefix(&model, user, "b").is_err());
    }

    #[test]
    fn test_import_of_missing_module() {
        let (model, registry) = batch(&[("a", "a", &["ghost"])]);
        let a = registry.get("a").unwrap();
        let err = registry.resolve_by_prefix(&model, a, "zz").unwrap_err();
        assert_eq!(err, ResolveError::UnknownModule { name: "ghost".into(), module: "a".into() });

        // ordering ignores the dangling import
        assert_eq!(names(&model, &registry.compute_order(&model).unwrap()), vec!["a"]);
    }

    #[test]
    fn test_order_respects_imports() {
        let (model, registry) = batch(&[
            ("top", "t", &["mid", "base"]),
            ("mid", "m", &["base"]),
            ("base", "b", &[]),
            ("side", "s", &[]),
        ]);
        let order = names(&model, &registry.compute_order(&model).unwrap());
        assert_eq!(order.len(), 4);

        let pos = |n: &str| order.iter().position(|o| o == n).unwrap();
        assert!(pos("base") < pos("mid"));
        assert!(pos("mid") < pos("top"));
        assert!(order.contains(&"side".to_string()));
    }

    #[test]
    fn test_order_rejects_cycle() {
        let (model, registry) = batch(&[
            ("a", "a", &["c"]),
            ("b", "b", &["a"]),
            ("c", "c", &["b"]),
            ("free", "f", &[]),
        ]);
        let err = registry.compute_order(&model).unwrap_err();
        assert_eq!(
            err,
            ResolveError::CyclicImports { modules: vec!["a".into(), "b".into(), "c".into()] }
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn test_self_import_is_a_cycle() {
        let (model, registry) = batch(&[("selfish", "s", &["selfish"])]);
        let err = registry.compute_order(&model).unwrap_err();
        assert_eq!(err, ResolveError::CyclicImports { modules: vec!["selfish".into()] });
    }
}

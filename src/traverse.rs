//! Cross-Reference Resolver
//!
//! Resolves absolute and relative schema paths to nodes. Segment lookup
//! checks direct children first, then fields contributed through `uses`
//! (depth-first into the referenced groupings), then descends transparently
//! through choices and cases.
//!
//! `..` follows the syntactic parent, except where that parent is a
//! grouping: the walk then re-anchors at every place the grouping is
//! instantiated and succeeds if any of them does. A parent that is an
//! augment is replaced by the augment's target.

use std::collections::HashSet;
use tracing::debug;

use crate::augment::{augment_target, resolve_grouping};
use crate::context::ResolveContext;
use crate::error::{ResolveError, Result};
use crate::model::{Children, ModuleId, NodeId, NodeKind, Parent};
use crate::path::{SchemaPath, Segment};

/// Position of a walk: a module's top level or a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cursor {
    Module(ModuleId),
    Node(NodeId),
}

/// Resolve `path` starting at `origin`.
///
/// Absolute paths start at the module selected by their first segment's
/// prefix, as bound in the origin's module. With `require_leaf` the result
/// must be a leaf or leaf-list.
pub fn traverse(
    ctx: &ResolveContext,
    path: &str,
    origin: NodeId,
    require_leaf: bool,
) -> Result<NodeId> {
    let origin = ctx.model.type_owner(origin);
    let module = ctx.model.module_of(origin);
    Walker::new(ctx, path, module, require_leaf).run(Cursor::Node(origin))
}

/// Resolve `path` from the top level of `module`, interpreting prefixes as
/// bound in that module
pub fn traverse_from_module(
    ctx: &ResolveContext,
    module: ModuleId,
    path: &str,
    require_leaf: bool,
) -> Result<NodeId> {
    Walker::new(ctx, path, module, require_leaf).run(Cursor::Module(module))
}

/// Follow a leafref to the leaf at the end of the chain.
///
/// A leaf reached twice (including the starting leaf) is a cycle.
pub fn resolve_leafref(ctx: &ResolveContext, path: &str, from: NodeId) -> Result<NodeId> {
    let model = &ctx.model;
    let from = model.type_owner(from);

    let mut visited = HashSet::from([from]);
    let mut origin = from;
    let mut path = path.to_string();

    loop {
        let leaf = traverse(ctx, &path, origin, true)?;
        if !visited.insert(leaf) {
            return Err(ResolveError::CyclicTypeReference {
                leaf: model.describe(leaf),
                path,
                module: ctx.module_name_of(origin).to_string(),
            });
        }

        let next = model
            .node(leaf)
            .type_node()
            .and_then(|ty| model.node(ty).type_spec())
            .filter(|spec| spec.name == "leafref")
            .and_then(|spec| spec.path.clone());

        match next {
            Some(next) => {
                debug!(from = %model.describe(leaf), path = %next, "Following leafref");
                origin = leaf;
                path = next;
            }
            None => return Ok(leaf),
        }
    }
}

/// Whether `node` has a place in some module's data tree.
///
/// Nodes inside a grouping only do if one of the grouping's `uses` sites
/// does in turn; a grouping instantiated solely by groupings nobody uses is
/// not part of any tree and neither are its nodes.
pub fn is_instantiated(ctx: &ResolveContext, node: NodeId) -> bool {
    let node = ctx.model.type_owner(node);
    let mut visited = HashSet::new();
    anchored(ctx, ctx.model.node(node).parent, &mut visited)
}

fn anchored(ctx: &ResolveContext, parent: Parent, visited: &mut HashSet<NodeId>) -> bool {
    let model = &ctx.model;
    let p = match parent {
        Parent::SubModule(_) => return true,
        Parent::Node(p) => p,
    };
    if !visited.insert(p) {
        return false;
    }

    match model.kind(p) {
        NodeKind::Grouping => ctx
            .grouping_sites
            .uses_of(p)
            .iter()
            .any(|uses| anchored(ctx, model.node(*uses).parent, visited)),
        NodeKind::Augment => match augment_target(ctx, p) {
            Ok(target) => anchored(ctx, Parent::Node(target), visited),
            Err(_) => false,
        },
        _ => anchored(ctx, model.node(p).parent, visited),
    }
}

// ========== Walker ==========

struct Walker<'a> {
    ctx: &'a ResolveContext,
    path: SchemaPath,
    /// Module whose import table binds the path's prefixes
    context: ModuleId,
    require_leaf: bool,
}

impl<'a> Walker<'a> {
    fn new(ctx: &'a ResolveContext, path: &str, context: ModuleId, require_leaf: bool) -> Self {
        Self {
            ctx,
            path: SchemaPath::parse(path),
            context,
            require_leaf,
        }
    }

    fn run(&self, origin: Cursor) -> Result<NodeId> {
        let last = self.path.segments().len().saturating_sub(1);
        if self.path.segments().is_empty() {
            return Err(self.fail(0, "empty path".to_string()));
        }

        let start = if self.path.is_absolute() {
            let prefix = self.path.leading_prefix().unwrap_or("");
            Cursor::Module(
                self.ctx
                    .registry
                    .resolve_by_prefix(&self.ctx.model, self.context, prefix)?,
            )
        } else {
            origin
        };

        match self.walk(start, 0)? {
            Cursor::Node(id) => {
                let kind = self.ctx.model.kind(id);
                if self.require_leaf && !kind.is_leaf_like() {
                    return Err(self.fail(last, format!("resolves to a {}, not a leaf", kind)));
                }
                Ok(id)
            }
            Cursor::Module(m) => Err(self.fail(
                last,
                format!("resolves to module {}, not a node", self.ctx.module_name(m)),
            )),
        }
    }

    fn walk(&self, cursor: Cursor, index: usize) -> Result<Cursor> {
        let Some(segment) = self.path.segments().get(index) else {
            return Ok(cursor);
        };

        match segment {
            Segment::Current => self.walk(cursor, index + 1),
            Segment::Parent => {
                let mut last_err = None;
                for parent in self.parents(cursor, index)? {
                    match self.walk(parent, index + 1) {
                        Ok(found) => return Ok(found),
                        Err(e) => last_err = Some(e),
                    }
                }
                Err(last_err
                    .unwrap_or_else(|| self.fail(index, "no parent to move to".to_string())))
            }
            Segment::Step { prefix, name } => {
                if let Some(prefix) = prefix {
                    self.ctx
                        .registry
                        .resolve_by_prefix(&self.ctx.model, self.context, prefix)?;
                }
                match self.child(cursor, name) {
                    Some(next) => {
                        debug!(
                            path = %self.path.raw(),
                            segment = %segment,
                            node = %self.ctx.model.describe(next),
                            "Matched segment"
                        );
                        self.walk(Cursor::Node(next), index + 1)
                    }
                    None => Err(self.fail(
                        index,
                        format!("no child named '{}' under {}", name, self.describe(cursor)),
                    )),
                }
            }
        }
    }

    // ========== Upward ==========

    fn parents(&self, cursor: Cursor, index: usize) -> Result<Vec<Cursor>> {
        match cursor {
            Cursor::Module(m) => Err(self.fail(
                index,
                format!("cannot move above module {}", self.ctx.module_name(m)),
            )),
            Cursor::Node(id) => {
                let mut visited = HashSet::new();
                let anchors = self.anchors_for(self.ctx.model.node(id).parent, &mut visited);
                if anchors.is_empty() {
                    return Err(self.fail(
                        index,
                        format!("{} is not instantiated anywhere", self.ctx.model.describe(id)),
                    ));
                }
                Ok(anchors)
            }
        }
    }

    /// Data-tree positions corresponding to a syntactic parent
    fn anchors_for(&self, parent: Parent, visited: &mut HashSet<NodeId>) -> Vec<Cursor> {
        let model = &self.ctx.model;
        let p = match parent {
            Parent::SubModule(sm) => return vec![Cursor::Module(model.submodule(sm).module)],
            Parent::Node(p) => p,
        };

        match model.kind(p) {
            NodeKind::Choice | NodeKind::Case => self.anchors_for(model.node(p).parent, visited),
            NodeKind::Grouping => {
                if !visited.insert(p) {
                    return Vec::new();
                }
                let mut anchors = Vec::new();
                for uses in self.ctx.grouping_sites.uses_of(p) {
                    for anchor in self.anchors_for(model.node(*uses).parent, visited) {
                        if !anchors.contains(&anchor) {
                            anchors.push(anchor);
                        }
                    }
                }
                anchors
            }
            NodeKind::Augment => match augment_target(self.ctx, p) {
                Ok(target) => vec![Cursor::Node(target)],
                Err(e) => {
                    debug!(augment = %model.describe(p), error = %e, "Augment target unavailable");
                    Vec::new()
                }
            },
            _ => vec![Cursor::Node(p)],
        }
    }

    // ========== Downward ==========

    fn child(&self, cursor: Cursor, name: &str) -> Option<NodeId> {
        let model = &self.ctx.model;
        let mut visited = HashSet::new();
        match cursor {
            Cursor::Module(m) => {
                let scopes: Vec<&Children> = model
                    .module(m)
                    .submodules
                    .iter()
                    .map(|sm| &model.submodule(*sm).body)
                    .collect();
                self.child_in(&scopes, name, &mut visited)
            }
            Cursor::Node(id) => {
                let id = if model.kind(id) == NodeKind::Augment {
                    augment_target(self.ctx, id).ok()?
                } else {
                    id
                };
                let children = model.node(id).children()?;
                self.child_in(&[children], name, &mut visited)
            }
        }
    }

    fn child_in(
        &self,
        scopes: &[&Children],
        name: &str,
        visited: &mut HashSet<NodeId>,
    ) -> Option<NodeId> {
        let model = &self.ctx.model;

        // direct children
        for children in scopes {
            if let Some(found) = children.data_nodes().find(|id| model.node(*id).name == name) {
                return Some(found);
            }
        }

        // fields instantiated through uses
        for children in scopes {
            for uses in &children.uses {
                let grouping = match resolve_grouping(model, &self.ctx.registry, *uses) {
                    Ok(g) => g,
                    Err(e) => {
                        debug!(
                            uses = %model.describe(*uses),
                            error = %e,
                            "Skipping unresolved uses"
                        );
                        continue;
                    }
                };
                if !visited.insert(grouping) {
                    continue;
                }
                if let Some(fields) = model.node(grouping).children() {
                    if let Some(found) = self.child_in(&[fields], name, visited) {
                        return Some(found);
                    }
                }
            }
        }

        // choice and case are not data nodes
        for children in scopes {
            for branch in children.choices.iter().chain(&children.cases) {
                if let Some(inner) = model.node(*branch).children() {
                    if let Some(found) = self.child_in(&[inner], name, visited) {
                        return Some(found);
                    }
                }
            }
        }

        None
    }

    // ========== Reporting ==========

    fn describe(&self, cursor: Cursor) -> String {
        match cursor {
            Cursor::Module(m) => format!("module:{}", self.ctx.module_name(m)),
            Cursor::Node(id) => self.ctx.model.describe(id),
        }
    }

    fn fail(&self, index: usize, reason: String) -> ResolveError {
        ResolveError::UnresolvedPath {
            path: self.path.raw().to_string(),
            index,
            segment: self
                .path
                .segments()
                .get(index)
                .map(|s| s.to_string())
                .unwrap_or_default(),
            accumulated: self.path.accumulated(index),
            module: self.ctx.module_name(self.context).to_string(),
            reason,
        }
    }
}

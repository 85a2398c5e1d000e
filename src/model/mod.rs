//! Schema Model
//!
//! Arena-allocated representation of modules, submodules and their node trees.
//! Nodes are addressed by [`NodeId`]; parent links are non-owning indices so
//! upward navigation is O(1) without ownership cycles.
//!
//! The model is data-only. Resolution behavior lives in the registry,
//! traversal, augment and identity modules, which borrow the model through a
//! [`ResolveContext`](crate::context::ResolveContext).

pub mod document;

pub use document::{Document, ModuleDoc, Statement, SubModuleDoc, TypeDoc};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// Handles
// =============================================================================

/// Stable handle of a node in the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

/// Stable handle of a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId(u32);

/// Stable handle of a submodule (every module owns at least its main submodule)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SubModuleId(u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl ModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl SubModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// =============================================================================
// Node Kinds
// =============================================================================

/// Discriminant of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Container,
    List,
    Leaf,
    LeafList,
    Choice,
    Case,
    Grouping,
    Uses,
    Augment,
    Notification,
    Identity,
    Typedef,
    Type,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::List => "list",
            Self::Leaf => "leaf",
            Self::LeafList => "leaf-list",
            Self::Choice => "choice",
            Self::Case => "case",
            Self::Grouping => "grouping",
            Self::Uses => "uses",
            Self::Augment => "augment",
            Self::Notification => "notification",
            Self::Identity => "identity",
            Self::Typedef => "typedef",
            Self::Type => "type",
        }
    }

    /// Kinds that an augment may extend
    pub fn is_augmentable(&self) -> bool {
        matches!(
            self,
            Self::Container | Self::List | Self::Choice | Self::Case | Self::Notification
        )
    }

    /// Kinds that carry a value type
    pub fn is_leaf_like(&self) -> bool {
        matches!(self, Self::Leaf | Self::LeafList)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered, typed child collections.
///
/// Every node that can own schema children carries one of these; only the
/// collections appropriate to its kind are ever populated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children {
    pub containers: Vec<NodeId>,
    pub lists: Vec<NodeId>,
    pub leaves: Vec<NodeId>,
    pub leaf_lists: Vec<NodeId>,
    pub choices: Vec<NodeId>,
    pub cases: Vec<NodeId>,
    pub notifications: Vec<NodeId>,
    pub groupings: Vec<NodeId>,
    pub uses: Vec<NodeId>,
    pub augments: Vec<NodeId>,
    pub identities: Vec<NodeId>,
    pub typedefs: Vec<NodeId>,
}

impl Children {
    /// Collection a child of `kind` is stored in
    pub fn slot(&self, kind: NodeKind) -> Option<&Vec<NodeId>> {
        Some(match kind {
            NodeKind::Container => &self.containers,
            NodeKind::List => &self.lists,
            NodeKind::Leaf => &self.leaves,
            NodeKind::LeafList => &self.leaf_lists,
            NodeKind::Choice => &self.choices,
            NodeKind::Case => &self.cases,
            NodeKind::Notification => &self.notifications,
            NodeKind::Grouping => &self.groupings,
            NodeKind::Uses => &self.uses,
            NodeKind::Augment => &self.augments,
            NodeKind::Identity => &self.identities,
            NodeKind::Typedef => &self.typedefs,
            NodeKind::Type => return None,
        })
    }

    pub fn slot_mut(&mut self, kind: NodeKind) -> Option<&mut Vec<NodeId>> {
        Some(match kind {
            NodeKind::Container => &mut self.containers,
            NodeKind::List => &mut self.lists,
            NodeKind::Leaf => &mut self.leaves,
            NodeKind::LeafList => &mut self.leaf_lists,
            NodeKind::Choice => &mut self.choices,
            NodeKind::Case => &mut self.cases,
            NodeKind::Notification => &mut self.notifications,
            NodeKind::Grouping => &mut self.groupings,
            NodeKind::Uses => &mut self.uses,
            NodeKind::Augment => &mut self.augments,
            NodeKind::Identity => &mut self.identities,
            NodeKind::Typedef => &mut self.typedefs,
            NodeKind::Type => return None,
        })
    }

    /// Insert `id` unless the very same node is already present.
    /// Returns true if the collection grew.
    pub fn insert_unique(&mut self, kind: NodeKind, id: NodeId) -> bool {
        match self.slot_mut(kind) {
            Some(slot) if !slot.contains(&id) => {
                slot.push(id);
                true
            }
            _ => false,
        }
    }

    /// Data-bearing children in search order
    pub fn data_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.containers
            .iter()
            .chain(&self.leaves)
            .chain(&self.lists)
            .chain(&self.leaf_lists)
            .chain(&self.choices)
            .chain(&self.cases)
            .chain(&self.notifications)
            .copied()
    }

    /// Total number of children across all collections
    pub fn len(&self) -> usize {
        self.containers.len()
            + self.lists.len()
            + self.leaves.len()
            + self.leaf_lists.len()
            + self.choices.len()
            + self.cases.len()
            + self.notifications.len()
            + self.groupings.len()
            + self.uses.len()
            + self.augments.len()
            + self.identities.len()
            + self.typedefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Value domain of a leaf, leaf-list or typedef
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSpec {
    /// Builtin (`string`, `leafref`, `union`...) or derived (`pfx:name`) type name
    pub name: String,
    pub range: Option<String>,
    pub length: Option<String>,
    pub pattern: Option<String>,
    /// leafref target path
    pub path: Option<String>,
    /// identityref base identity
    pub base: Option<String>,
    /// union member type nodes, in declaration order
    pub members: Vec<NodeId>,
    /// enumeration / bits labels
    pub enums: Vec<String>,
}

impl TypeSpec {
    /// Range, length or pattern restrictions force a distinct generated type
    pub fn has_constraints(&self) -> bool {
        self.range.is_some() || self.length.is_some() || self.pattern.is_some()
    }
}

/// Kind-specific payload of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeBody {
    Container(Children),
    List(Children),
    Choice(Children),
    Case(Children),
    Grouping(Children),
    Notification(Children),
    Augment { target: String, children: Children },
    Uses { grouping: String },
    Leaf { ty: NodeId },
    LeafList { ty: NodeId },
    Identity { bases: Vec<String> },
    Typedef { ty: NodeId },
    Type(TypeSpec),
}

impl NodeBody {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Container(_) => NodeKind::Container,
            Self::List(_) => NodeKind::List,
            Self::Choice(_) => NodeKind::Choice,
            Self::Case(_) => NodeKind::Case,
            Self::Grouping(_) => NodeKind::Grouping,
            Self::Notification(_) => NodeKind::Notification,
            Self::Augment { .. } => NodeKind::Augment,
            Self::Uses { .. } => NodeKind::Uses,
            Self::Leaf { .. } => NodeKind::Leaf,
            Self::LeafList { .. } => NodeKind::LeafList,
            Self::Identity { .. } => NodeKind::Identity,
            Self::Typedef { .. } => NodeKind::Typedef,
            Self::Type(_) => NodeKind::Type,
        }
    }

    pub fn children(&self) -> Option<&Children> {
        match self {
            Self::Container(c)
            | Self::List(c)
            | Self::Choice(c)
            | Self::Case(c)
            | Self::Grouping(c)
            | Self::Notification(c)
            | Self::Augment { children: c, .. } => Some(c),
            _ => None,
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Children> {
        match self {
            Self::Container(c)
            | Self::List(c)
            | Self::Choice(c)
            | Self::Case(c)
            | Self::Grouping(c)
            | Self::Notification(c)
            | Self::Augment { children: c, .. } => Some(c),
            _ => None,
        }
    }
}

/// Syntactic parent of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Parent {
    /// Top-level statement of a (sub)module
    SubModule(SubModuleId),
    Node(NodeId),
}

/// A schema node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub description: Option<String>,
    pub parent: Parent,
    pub body: NodeBody,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.body.kind()
    }

    pub fn children(&self) -> Option<&Children> {
        self.body.children()
    }

    /// Type node of a leaf, leaf-list or typedef
    pub fn type_node(&self) -> Option<NodeId> {
        match self.body {
            NodeBody::Leaf { ty } | NodeBody::LeafList { ty } | NodeBody::Typedef { ty } => {
                Some(ty)
            }
            _ => None,
        }
    }

    pub fn type_spec(&self) -> Option<&TypeSpec> {
        match &self.body {
            NodeBody::Type(spec) => Some(spec),
            _ => None,
        }
    }
}

// =============================================================================
// Modules
// =============================================================================

/// `import` statement: module name bound to a local prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub module: String,
    pub prefix: String,
}

/// Entry of an identity lookup table, emitted as deferred initialization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityMapEntry {
    /// Derived identity name
    pub identity: String,
    /// Ancestor identity whose table receives the entry
    pub base: NodeId,
    /// Generated type name of the ancestor's table
    pub base_type: String,
    /// Namespace of the module declaring `identity`
    pub namespace: String,
    /// Prefix of the module declaring `identity`
    pub prefix: String,
}

/// A top-level schema unit
#[derive(Debug, Clone)]
pub struct Module {
    pub name: String,
    pub prefix: String,
    pub namespace: String,
    pub description: Option<String>,
    pub imports: Vec<Import>,
    /// Included submodule names, in declaration order
    pub includes: Vec<String>,
    /// Main submodule first, then attached submodules in attachment order
    pub submodules: Vec<SubModuleId>,
    /// Root identities that need a generated value-domain type
    pub base_identities: BTreeMap<String, NodeId>,
}

impl Module {
    pub fn main_submodule(&self) -> SubModuleId {
        self.submodules[0]
    }

    /// Local prefix this module binds to an imported module name
    pub fn import_prefix(&self, module: &str) -> Option<&str> {
        self.imports
            .iter()
            .find(|imp| imp.module == module)
            .map(|imp| imp.prefix.as_str())
    }
}

/// A unit contributing to exactly one module's node tree
#[derive(Debug, Clone)]
pub struct SubModule {
    pub name: String,
    pub module: ModuleId,
    pub is_main: bool,
    pub body: Children,
    /// Deferred initialization (identity table population)
    pub init: Vec<IdentityMapEntry>,
}

// =============================================================================
// Schema Model
// =============================================================================

/// The arena holding every module, submodule and node of a compilation run
#[derive(Debug, Clone, Default)]
pub struct SchemaModel {
    pub(crate) nodes: Vec<Node>,
    pub(crate) modules: Vec<Module>,
    pub(crate) submodules: Vec<SubModule>,
}

impl SchemaModel {
    pub fn new() -> Self {
        Self::default()
    }

    // ========== Construction ==========

    /// Add a module together with its main submodule
    pub fn add_module(
        &mut self,
        name: impl Into<String>,
        prefix: impl Into<String>,
        namespace: impl Into<String>,
    ) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        let name = name.into();
        self.modules.push(Module {
            name: name.clone(),
            prefix: prefix.into(),
            namespace: namespace.into(),
            description: None,
            imports: Vec::new(),
            includes: Vec::new(),
            submodules: Vec::new(),
            base_identities: BTreeMap::new(),
        });
        self.attach_submodule(id, name, true);
        id
    }

    /// Attach an additional submodule to `module`
    pub fn add_submodule(&mut self, module: ModuleId, name: impl Into<String>) -> SubModuleId {
        self.attach_submodule(module, name.into(), false)
    }

    fn attach_submodule(&mut self, module: ModuleId, name: String, is_main: bool) -> SubModuleId {
        let id = SubModuleId(self.submodules.len() as u32);
        self.submodules.push(SubModule {
            name,
            module,
            is_main,
            body: Children::default(),
            init: Vec::new(),
        });
        self.modules[module.index()].submodules.push(id);
        id
    }

    /// Allocate a node and link it into its parent's typed collection.
    ///
    /// Type nodes are owned through their leaf/typedef/union field rather
    /// than a child collection.
    pub fn add_node(
        &mut self,
        parent: Parent,
        name: impl Into<String>,
        description: Option<String>,
        body: NodeBody,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let kind = body.kind();
        self.nodes.push(Node {
            name: name.into(),
            description,
            parent,
            body,
        });
        let siblings = match parent {
            Parent::SubModule(sm) => Some(&mut self.submodules[sm.index()].body),
            Parent::Node(p) => self.nodes[p.index()].body.children_mut(),
        };
        if let Some(siblings) = siblings {
            siblings.insert_unique(kind, id);
        }
        id
    }

    /// Point a leaf, leaf-list or typedef at its type node
    pub(crate) fn set_type_node(&mut self, owner: NodeId, ty: NodeId) {
        match &mut self.nodes[owner.index()].body {
            NodeBody::Leaf { ty: slot }
            | NodeBody::LeafList { ty: slot }
            | NodeBody::Typedef { ty: slot } => {
                *slot = ty;
            }
            _ => {}
        }
    }

    /// Append a union member to a type node
    pub(crate) fn push_union_member(&mut self, union: NodeId, member: NodeId) {
        if let NodeBody::Type(spec) = &mut self.nodes[union.index()].body {
            spec.members.push(member);
        }
    }

    pub fn module_mut(&mut self, id: ModuleId) -> &mut Module {
        &mut self.modules[id.index()]
    }

    pub fn submodule_mut(&mut self, id: SubModuleId) -> &mut SubModule {
        &mut self.submodules[id.index()]
    }

    pub(crate) fn children_mut(&mut self, id: NodeId) -> Option<&mut Children> {
        self.nodes[id.index()].body.children_mut()
    }

    // ========== Lookup ==========

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind()
    }

    pub fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id.index()]
    }

    pub fn submodule(&self, id: SubModuleId) -> &SubModule {
        &self.submodules[id.index()]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn module_ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.modules.len() as u32).map(ModuleId)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// First module carrying `name` (the registry rejects duplicates)
    pub fn module_by_name(&self, name: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .position(|m| m.name == name)
            .map(|i| ModuleId(i as u32))
    }

    /// Submodule of `module` called `name`
    pub fn submodule_by_name(&self, module: ModuleId, name: &str) -> Option<SubModuleId> {
        self.module(module)
            .submodules
            .iter()
            .copied()
            .find(|sm| self.submodule(*sm).name == name)
    }

    /// Syntactic parent node, `None` for top-level statements
    pub fn parent_node(&self, id: NodeId) -> Option<NodeId> {
        match self.node(id).parent {
            Parent::Node(p) => Some(p),
            Parent::SubModule(_) => None,
        }
    }

    /// Submodule boundary reached by walking parent links upward
    pub fn submodule_of(&self, id: NodeId) -> SubModuleId {
        let mut current = id;
        loop {
            match self.node(current).parent {
                Parent::SubModule(sm) => return sm,
                Parent::Node(p) => current = p,
            }
        }
    }

    /// Module owning a node (through its submodule)
    pub fn module_of(&self, id: NodeId) -> ModuleId {
        self.submodule(self.submodule_of(id)).module
    }

    /// Nearest ancestor that is not a type node (the leaf/typedef owning a type)
    pub fn type_owner(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while self.kind(current) == NodeKind::Type {
            match self.parent_node(current) {
                Some(p) => current = p,
                None => break,
            }
        }
        current
    }

    /// Follow direct children by name from a module's top level.
    /// Purely syntactic: no `uses` expansion, no augment awareness.
    pub fn find_path(&self, module: ModuleId, names: &[&str]) -> Option<NodeId> {
        let (first, rest) = names.split_first()?;
        let mut current = self.module(module).submodules.iter().find_map(|sm| {
            find_named(self, &self.submodule(*sm).body, first)
        })?;
        for name in rest {
            let children = self.node(current).children()?;
            current = find_named(self, children, name)?;
        }
        Some(current)
    }

    /// `kind:name` label used in logs and diagnostics
    pub fn describe(&self, id: NodeId) -> String {
        let node = self.node(id);
        format!("{}:{}", node.kind(), node.name)
    }
}

fn find_named(model: &SchemaModel, children: &Children, name: &str) -> Option<NodeId> {
    children
        .data_nodes()
        .chain(children.groupings.iter().copied())
        .chain(children.augments.iter().copied())
        .chain(children.identities.iter().copied())
        .chain(children.typedefs.iter().copied())
        .chain(children.uses.iter().copied())
        .find(|id| model.node(*id).name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(model: &mut SchemaModel, parent: Parent, name: &str, ty: &str) -> NodeId {
        let leaf = model.add_node(parent, name, None, NodeBody::Leaf { ty: NodeId(u32::MAX) });
        let spec = TypeSpec { name: ty.to_string(), ..Default::default() };
        let ty = model.add_node(Parent::Node(leaf), ty, None, NodeBody::Type(spec));
        model.set_type_node(leaf, ty);
        leaf
    }

    #[test]
    fn test_parent_links_reach_module() {
        let mut model = SchemaModel::new();
        let m = model.add_module("base", "b", "urn:base");
        let main = model.module(m).main_submodule();
        let root = model.add_node(
            Parent::SubModule(main),
            "root",
            None,
            NodeBody::Container(Children::default()),
        );
        let name = leaf(&mut model, Parent::Node(root), "name", "string");

        assert_eq!(model.module_of(name), m);
        assert_eq!(model.parent_node(name), Some(root));
        assert_eq!(model.parent_node(root), None);
        assert_eq!(model.find_path(m, &["root", "name"]), Some(name));

        let ty = model.node(name).type_node().unwrap();
        assert_eq!(model.kind(ty), NodeKind::Type);
        assert_eq!(model.type_owner(ty), name);
        // type nodes are not listed among schema children
        assert_eq!(model.node(root).children().unwrap().len(), 1);
    }

    #[test]
    fn test_insert_unique_is_by_identity() {
        let mut children = Children::default();
        assert!(children.insert_unique(NodeKind::Leaf, NodeId(3)));
        assert!(!children.insert_unique(NodeKind::Leaf, NodeId(3)));
        assert!(children.insert_unique(NodeKind::Leaf, NodeId(4)));
        assert!(!children.insert_unique(NodeKind::Type, NodeId(5)));
        assert_eq!(children.leaves, vec![NodeId(3), NodeId(4)]);
    }

    #[test]
    fn test_submodules_keep_main_first() {
        let mut model = SchemaModel::new();
        let m = model.add_module("base", "b", "urn:base");
        let sub = model.add_submodule(m, "base-types");
        let module = model.module(m);
        assert_eq!(module.submodules.len(), 2);
        assert!(model.submodule(module.main_submodule()).is_main);
        assert_eq!(model.submodule_by_name(m, "base-types"), Some(sub));
    }
}

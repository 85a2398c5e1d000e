//! Parsed module documents
//!
//! The text parser is an external collaborator. Its output reaches this crate
//! as one JSON document per module or submodule; this module defines those
//! documents and lowers them into the [`SchemaModel`] arena.

use super::{Children, Import, NodeBody, NodeId, Parent, SchemaModel, TypeSpec};
use crate::error::{ResolveError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

// =============================================================================
// Documents
// =============================================================================

/// A single parsed unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Document {
    Module(ModuleDoc),
    SubModule(SubModuleDoc),
}

impl Document {
    pub fn name(&self) -> &str {
        match self {
            Document::Module(m) => &m.name,
            Document::SubModule(s) => &s.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleDoc {
    #[serde(rename = "module")]
    pub name: String,
    pub prefix: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub imports: Vec<Import>,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubModuleDoc {
    #[serde(rename = "submodule")]
    pub name: String,
    pub belongs_to: String,
    #[serde(default)]
    pub body: Vec<Statement>,
}

/// Statement inside a module body, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Statement {
    Container(BlockDoc),
    List(BlockDoc),
    Choice(BlockDoc),
    Case(BlockDoc),
    Grouping(BlockDoc),
    Notification(BlockDoc),
    Leaf(TypedDoc),
    LeafList(TypedDoc),
    Typedef(TypedDoc),
    Uses(UsesDoc),
    Augment(AugmentDoc),
    Identity(IdentityDoc),
}

/// Any statement owning nested statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub body: Vec<Statement>,
}

/// leaf / leaf-list / typedef
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeDoc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsesDoc {
    /// Grouping reference, optionally `prefix:name`
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AugmentDoc {
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub bases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDoc {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<TypeDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enums: Vec<String>,
}

// =============================================================================
// Lowering
// =============================================================================

impl SchemaModel {
    /// Build the arena from parsed documents.
    ///
    /// Modules are lowered first, in input order; submodules are then
    /// attached to the module named by `belongs_to`.
    pub fn from_documents(documents: impl IntoIterator<Item = Document>) -> Result<Self> {
        let mut model = SchemaModel::new();
        let mut submodules = Vec::new();

        for doc in documents {
            match doc {
                Document::Module(module) => lower_module(&mut model, module)?,
                Document::SubModule(sub) => submodules.push(sub),
            }
        }

        for sub in submodules {
            let module = model.module_by_name(&sub.belongs_to).ok_or_else(|| {
                ResolveError::UnknownModule {
                    name: sub.belongs_to.clone(),
                    module: sub.name.clone(),
                }
            })?;
            debug!(submodule = %sub.name, module = %sub.belongs_to, "Attaching submodule");
            let id = model.add_submodule(module, &sub.name);
            let mut lowering = Lowering { model: &mut model, source: &sub.name };
            lowering.statements(Parent::SubModule(id), sub.body)?;
        }

        Ok(model)
    }
}

fn lower_module(model: &mut SchemaModel, doc: ModuleDoc) -> Result<()> {
    if doc.name.is_empty() || doc.prefix.is_empty() {
        return Err(ResolveError::InvalidDocument {
            source_name: doc.name,
            message: "module requires a name and a prefix".to_string(),
        });
    }
    debug!(module = %doc.name, prefix = %doc.prefix, "Lowering module");

    let id = model.add_module(&doc.name, &doc.prefix, &doc.namespace);
    let module = model.module_mut(id);
    module.description = doc.description;
    module.imports = doc.imports;
    module.includes = doc.includes;
    let main = module.main_submodule();

    let mut lowering = Lowering { model, source: &doc.name };
    lowering.statements(Parent::SubModule(main), doc.body)
}

struct Lowering<'a> {
    model: &'a mut SchemaModel,
    source: &'a str,
}

impl Lowering<'_> {
    fn invalid(&self, message: String) -> ResolveError {
        ResolveError::InvalidDocument {
            source_name: self.source.to_string(),
            message,
        }
    }

    fn statements(&mut self, parent: Parent, statements: Vec<Statement>) -> Result<()> {
        for statement in statements {
            self.statement(parent, statement)?;
        }
        Ok(())
    }

    fn statement(&mut self, parent: Parent, statement: Statement) -> Result<NodeId> {
        let id = match statement {
            Statement::Container(b) => self.block(parent, b, NodeBody::Container)?,
            Statement::List(b) => self.block(parent, b, NodeBody::List)?,
            Statement::Choice(b) => self.block(parent, b, NodeBody::Choice)?,
            Statement::Case(b) => self.block(parent, b, NodeBody::Case)?,
            Statement::Grouping(b) => self.block(parent, b, NodeBody::Grouping)?,
            Statement::Notification(b) => self.block(parent, b, NodeBody::Notification)?,
            Statement::Leaf(t) => self.typed(parent, t, |ty| NodeBody::Leaf { ty })?,
            Statement::LeafList(t) => self.typed(parent, t, |ty| NodeBody::LeafList { ty })?,
            Statement::Typedef(t) => self.typed(parent, t, |ty| NodeBody::Typedef { ty })?,
            Statement::Uses(u) => {
                if u.name.is_empty() {
                    return Err(self.invalid("uses without a grouping name".to_string()));
                }
                let body = NodeBody::Uses { grouping: u.name.clone() };
                self.model.add_node(parent, u.name, None, body)
            }
            Statement::Augment(a) => {
                if a.target.is_empty() {
                    return Err(self.invalid("augment without a target path".to_string()));
                }
                let body = NodeBody::Augment {
                    target: a.target.clone(),
                    children: Children::default(),
                };
                let id = self.model.add_node(parent, a.target, a.description, body);
                self.statements(Parent::Node(id), a.body)?;
                id
            }
            Statement::Identity(i) => {
                self.require_name(&i.name, "identity")?;
                let body = NodeBody::Identity { bases: i.bases };
                self.model.add_node(parent, i.name, i.description, body)
            }
        };
        Ok(id)
    }

    fn require_name(&self, name: &str, kind: &str) -> Result<()> {
        if name.is_empty() {
            return Err(self.invalid(format!("{} without a name", kind)));
        }
        Ok(())
    }

    fn block(
        &mut self,
        parent: Parent,
        doc: BlockDoc,
        make: fn(Children) -> NodeBody,
    ) -> Result<NodeId> {
        let body = make(Children::default());
        self.require_name(&doc.name, body.kind().as_str())?;
        let id = self.model.add_node(parent, doc.name, doc.description, body);
        self.statements(Parent::Node(id), doc.body)?;
        Ok(id)
    }

    fn typed(
        &mut self,
        parent: Parent,
        doc: TypedDoc,
        make: fn(NodeId) -> NodeBody,
    ) -> Result<NodeId> {
        // Placeholder handle, replaced once the type node exists
        let body = make(NodeId(u32::MAX));
        self.require_name(&doc.name, body.kind().as_str())?;
        let owner = self.model.add_node(parent, doc.name, doc.description, body);
        let ty = self.type_node(owner, doc.ty)?;
        self.model.set_type_node(owner, ty);
        Ok(owner)
    }

    fn type_node(&mut self, owner: NodeId, doc: TypeDoc) -> Result<NodeId> {
        if doc.name.is_empty() {
            let owner_name = self.model.describe(owner);
            return Err(self.invalid(format!("{} has a type without a name", owner_name)));
        }
        let spec = TypeSpec {
            name: doc.name.clone(),
            range: doc.range,
            length: doc.length,
            pattern: doc.pattern,
            path: doc.path,
            base: doc.base,
            members: Vec::new(),
            enums: doc.enums,
        };
        let id = self
            .model
            .add_node(Parent::Node(owner), doc.name, None, NodeBody::Type(spec));
        for member in doc.members {
            let member_id = self.type_node(id, member)?;
            self.model.push_union_member(id, member_id);
        }
        Ok(id)
    }
}

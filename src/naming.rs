//! Generated names
//!
//! Type names handed to emitters are derived from qualified schema names:
//! the prefix is translated to the defining module's own prefix, separators
//! become `_`, and the first letter is upper-cased (`b:crypto-alg` ->
//! `B_crypto_alg`).

use crate::error::Result;
use crate::model::{ModuleId, NodeBody, NodeId, Parent, SchemaModel};
use crate::path::{split_qualified, SchemaPath, Segment};
use crate::registry::ModuleRegistry;

/// Generated type name for `raw` as written in `module`
pub fn type_name(
    model: &SchemaModel,
    registry: &ModuleRegistry,
    module: ModuleId,
    raw: &str,
) -> Result<String> {
    let qualified = match split_qualified(raw) {
        (Some(prefix), name) => {
            let owner = registry.resolve_by_prefix(model, module, prefix)?;
            format!("{}:{}", model.module(owner).prefix, name)
        }
        (None, name) => format!("{}:{}", model.module(module).prefix, name),
    };
    Ok(sanitize(&qualified))
}

/// Generated type of an identity's value domain
pub fn identity_type_name(
    model: &SchemaModel,
    registry: &ModuleRegistry,
    identity: NodeId,
) -> Result<String> {
    let module = model.module_of(identity);
    type_name(model, registry, module, &format!("{}_id", model.node(identity).name))
}

/// Field name for a schema identifier
pub fn field_name(raw: &str) -> String {
    sanitize(raw)
}

/// `_`-joined names from the module's top level down to `node`.
///
/// Augments contribute the local names of their target path.
pub fn full_name(model: &SchemaModel, node: NodeId) -> String {
    let mut labels = Vec::new();
    let mut current = node;
    loop {
        labels.push(label(model, current));
        match model.node(current).parent {
            Parent::Node(p) => current = p,
            Parent::SubModule(_) => break,
        }
    }
    labels.reverse();
    labels.join("_")
}

fn label(model: &SchemaModel, node: NodeId) -> String {
    let node = model.node(node);
    match &node.body {
        NodeBody::Augment { target, .. } => SchemaPath::parse(target)
            .segments()
            .iter()
            .filter_map(|s| match s {
                Segment::Step { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("_"),
        _ => node.name.clone(),
    }
}

fn sanitize(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| match c {
            ':' | '.' | '-' => '_',
            other => other,
        })
        .collect();
    let mut chars = replaced.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

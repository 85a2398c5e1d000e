//! Type Hierarchy
//!
//! Effective type names for leaves, leaf-lists and typedefs. Unconstrained
//! primitives keep their builtin name; constrained primitives, enumerations,
//! unions, bits and binary get a generated name scoped by the enclosing
//! construct; union members are further suffixed with their type and
//! position. Leafrefs take the name of the leaf they end at.

use crate::context::ResolveContext;
use crate::error::{ResolveError, Result};
use crate::identity::find_identity;
use crate::model::{NodeId, NodeKind, TypeSpec};
use crate::naming::{full_name, type_name};
use crate::traverse::resolve_leafref;

/// Builtin types that map directly onto a primitive
const PRIMITIVES: [&str; 13] = [
    "int8", "int16", "int32", "int64", "uint8", "uint16", "uint32", "uint64", "string",
    "boolean", "decimal64", "empty", "instance-identifier",
];

/// Builtin types that always need a generated definition
const GENERATED: [&str; 4] = ["enumeration", "union", "bits", "binary"];

pub fn is_primitive(name: &str) -> bool {
    PRIMITIVES.contains(&name)
}

/// Type node and spec of a leaf, leaf-list or typedef; type nodes map to
/// themselves
fn type_of(ctx: &ResolveContext, node: NodeId) -> Result<(NodeId, &TypeSpec)> {
    let model = &ctx.model;
    let ty = if model.kind(node) == NodeKind::Type {
        Some(node)
    } else {
        model.node(node).type_node()
    };
    ty.and_then(|ty| model.node(ty).type_spec().map(|spec| (ty, spec)))
        .ok_or_else(|| ResolveError::InvalidDocument {
            source_name: ctx.module_name_of(node).to_string(),
            message: format!("{} carries no type", model.describe(node)),
        })
}

fn leafref_target(ctx: &ResolveContext, ty: NodeId, spec: &TypeSpec) -> Result<NodeId> {
    let path = spec.path.as_deref().ok_or_else(|| ResolveError::UnresolvedPath {
        path: String::new(),
        index: 0,
        segment: String::new(),
        accumulated: String::new(),
        module: ctx.module_name_of(ty).to_string(),
        reason: format!("leafref in {} has no path", ctx.model.describe(ctx.model.type_owner(ty))),
    })?;
    resolve_leafref(ctx, path, ty)
}

fn identity_base<'s>(ctx: &ResolveContext, ty: NodeId, spec: &'s TypeSpec) -> Result<&'s str> {
    let module = ctx.model.module_of(ty);
    let missing = |base: &str| ResolveError::UnresolvedIdentity {
        base: base.to_string(),
        identity: ctx.model.node(ctx.model.type_owner(ty)).name.clone(),
        module: ctx.module_name(module).to_string(),
    };
    let base = spec.base.as_deref().ok_or_else(|| missing(""))?;
    find_identity(&ctx.model, &ctx.registry, module, base)?.ok_or_else(|| missing(base))?;
    Ok(base)
}

/// Name emitters use for the value domain of `node` (a leaf, leaf-list,
/// typedef or type node)
pub fn effective_type_name(ctx: &ResolveContext, node: NodeId) -> Result<String> {
    let (ty, spec) = type_of(ctx, node)?;
    let model = &ctx.model;
    let module = model.module_of(ty);

    let parent = model.parent_node(ty).unwrap_or(ty);
    let member_index = model
        .node(parent)
        .type_spec()
        .and_then(|union| union.members.iter().position(|m| *m == ty));

    let scoped = || type_name(model, &ctx.registry, module, &full_name(model, parent));
    let member = |index: usize| -> Result<String> {
        Ok(format!("{}_{}_{}", scoped()?, spec.name.replace('-', "_"), index))
    };

    match spec.name.as_str() {
        "leafref" => {
            let target = leafref_target(ctx, ty, spec)?;
            effective_type_name(ctx, target)
        }
        "identityref" => {
            let base = identity_base(ctx, ty, spec)?;
            type_name(model, &ctx.registry, module, &format!("{}_id", base))
        }
        name if GENERATED.contains(&name) || is_primitive(name) => match member_index {
            Some(index) => member(index),
            None if GENERATED.contains(&name) || spec.has_constraints() => scoped(),
            None => Ok(name.to_string()),
        },
        derived => type_name(model, &ctx.registry, module, derived),
    }
}

/// Type as written: leafrefs report the declared type of their target,
/// identityrefs their base
pub fn declared_type_name(ctx: &ResolveContext, node: NodeId) -> Result<String> {
    let (ty, spec) = type_of(ctx, node)?;
    match spec.name.as_str() {
        "leafref" => {
            let target = leafref_target(ctx, ty, spec)?;
            Ok(type_of(ctx, target)?.1.name.clone())
        }
        "identityref" => Ok(identity_base(ctx, ty, spec)?.to_string()),
        name => Ok(name.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{context, node};
    use serde_json::json;

    fn typed() -> ResolveContext {
        context(vec![
            json!({"module": "base", "prefix": "b", "namespace": "urn:base", "body": [
                {"kind": "typedef", "name": "percent",
                    "type": {"name": "uint8", "range": "0..100"}},
                {"kind": "identity", "name": "crypto"},
                {"kind": "container", "name": "sys", "body": [
                    {"kind": "leaf", "name": "host", "type": {"name": "string"}},
                    {"kind": "leaf", "name": "short-name",
                        "type": {"name": "string", "length": "1..8"}},
                    {"kind": "leaf", "name": "mode",
                        "type": {"name": "enumeration", "enums": ["on", "off"]}},
                    {"kind": "leaf", "name": "load", "type": {"name": "percent"}},
                    {"kind": "leaf", "name": "alg",
                        "type": {"name": "identityref", "base": "crypto"}},
                    {"kind": "leaf", "name": "addr", "type": {"name": "union", "members": [
                        {"name": "string"},
                        {"name": "uint32"},
                        {"name": "enumeration", "enums": ["any"]}
                    ]}},
                    {"kind": "leaf-list", "name": "peers",
                        "type": {"name": "leafref", "path": "../host"}}
                ]}
            ]}),
            json!({
                "module": "user", "prefix": "u", "namespace": "urn:user",
                "imports": [{"module": "base", "prefix": "bs"}],
                "body": [
                    {"kind": "leaf", "name": "limit", "type": {"name": "bs:percent"}},
                    {"kind": "leaf", "name": "pick",
                        "type": {"name": "identityref", "base": "bs:crypto"}},
                    {"kind": "leaf", "name": "mirror",
                        "type": {"name": "leafref", "path": "/bs:sys/bs:mode"}},
                    {"kind": "leaf", "name": "bad",
                        "type": {"name": "identityref", "base": "bs:nothing"}}
                ]
            }),
        ])
    }

    fn effective(ctx: &ResolveContext, module: &str, names: &[&str]) -> String {
        effective_type_name(ctx, node(ctx, module, names)).unwrap()
    }

    #[test]
    fn test_primitive_and_constrained() {
        let ctx = typed();
        assert_eq!(effective(&ctx, "base", &["sys", "host"]), "string");
        assert_eq!(effective(&ctx, "base", &["sys", "short-name"]), "B_sys_short_name");
        assert_eq!(effective(&ctx, "base", &["percent"]), "B_percent");
    }

    #[test]
    fn test_generated_kinds() {
        let ctx = typed();
        assert_eq!(effective(&ctx, "base", &["sys", "mode"]), "B_sys_mode");
        assert_eq!(effective(&ctx, "base", &["sys", "addr"]), "B_sys_addr");
    }

    #[test]
    fn test_union_members_are_positional() {
        let ctx = typed();
        let addr = node(&ctx, "base", &["sys", "addr"]);
        let union = ctx.model().node(addr).type_node().unwrap();
        let members = ctx.model().node(union).type_spec().unwrap().members.clone();
        let names: Vec<String> = members
            .iter()
            .map(|m| effective_type_name(&ctx, *m).unwrap())
            .collect();
        assert_eq!(
            names,
            vec![
                "B_sys_addr_union_string_0",
                "B_sys_addr_union_uint32_1",
                "B_sys_addr_union_enumeration_2",
            ]
        );
    }

    #[test]
    fn test_derived_and_identityref() {
        let ctx = typed();
        assert_eq!(effective(&ctx, "base", &["sys", "load"]), "B_percent");
        assert_eq!(effective(&ctx, "user", &["limit"]), "B_percent");
        assert_eq!(effective(&ctx, "base", &["sys", "alg"]), "B_crypto_id");
        assert_eq!(effective(&ctx, "user", &["pick"]), "B_crypto_id");

        let err = effective_type_name(&ctx, node(&ctx, "user", &["bad"])).unwrap_err();
        assert!(matches!(err, ResolveError::UnresolvedIdentity { .. }));
    }

    #[test]
    fn test_leafref_takes_target_type() {
        let ctx = typed();
        assert_eq!(effective(&ctx, "base", &["sys", "peers"]), "string");
        // target's generated name is scoped by the target, not the referrer
        assert_eq!(effective(&ctx, "user", &["mirror"]), "B_sys_mode");
    }

    #[test]
    fn test_declared_type_name() {
        let ctx = typed();
        let declared = |m: &str, n: &[&str]| declared_type_name(&ctx, node(&ctx, m, n)).unwrap();
        assert_eq!(declared("user", &["mirror"]), "enumeration");
        assert_eq!(declared("user", &["pick"]), "bs:crypto");
        assert_eq!(declared("user", &["limit"]), "bs:percent");
    }

    #[test]
    fn test_non_typed_node() {
        let ctx = typed();
        let sys = node(&ctx, "base", &["sys"]);
        assert!(matches!(
            effective_type_name(&ctx, sys),
            Err(ResolveError::InvalidDocument { .. })
        ));
    }
}

//! End-to-end resolution over fixture module batches

use std::path::{Path, PathBuf};

use schema_resolver::augment::apply_augment;
use schema_resolver::{
    compile, load_from_directory, load_from_str, LoadConfig, ModuleId, NodeId, NodeKind, Operation,
    Policy, ResolveContext, ResolveError, ResolvedSchema, SchemaModel,
};

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn single(content: &str, source_name: &str) -> SchemaModel {
    let document = load_from_str(content, source_name).unwrap();
    SchemaModel::from_documents(vec![document]).unwrap()
}

fn layered() -> SchemaModel {
    load_from_directory(&fixtures_path().join("layered"), &LoadConfig::default())
        .unwrap()
        .model
}

fn find(model: &SchemaModel, module: &str, names: &[&str]) -> NodeId {
    let module = model.module_by_name(module).unwrap();
    model.find_path(module, names).unwrap()
}

fn module(resolved: &ResolvedSchema, name: &str) -> ModuleId {
    resolved.module(name).unwrap()
}

// =============================================================================
// Module Order
// =============================================================================

#[test]
fn test_order_places_imports_first() {
    let resolved = compile(layered(), Policy::Strict).unwrap();
    let order = resolved.order();
    assert_eq!(order.len(), resolved.model().module_count());

    let position = |id: ModuleId| order.iter().position(|m| *m == id).unwrap();
    for id in order {
        for import in &resolved.model().module(*id).imports {
            let imported = module(&resolved, &import.module);
            assert!(
                position(imported) < position(*id),
                "{} before {}",
                import.module,
                resolved.model().module(*id).name
            );
        }
    }
    assert_eq!(resolved.order_names(), vec!["base", "mid", "top"]);
}

#[test]
fn test_import_cycle_has_no_order() {
    let bundle =
        load_from_directory(&fixtures_path().join("cyclic"), &LoadConfig::default()).unwrap();
    for policy in [Policy::Strict, Policy::BestEffort] {
        let err = compile(bundle.model.clone(), policy).unwrap_err();
        assert_eq!(
            err,
            ResolveError::CyclicImports {
                modules: vec!["alpha".to_string(), "beta".to_string()]
            }
        );
    }
}

#[test]
fn test_duplicate_module_is_rejected() {
    let first = r#"{"module": "dup", "prefix": "d1", "namespace": "urn:d1"}"#;
    let second = r#"{"module": "dup", "prefix": "d2", "namespace": "urn:d2"}"#;
    let first = load_from_str(first, "one.json").unwrap();
    let second = load_from_str(second, "two.json").unwrap();
    let model = SchemaModel::from_documents(vec![first, second]).unwrap();

    let err = compile(model, Policy::BestEffort).unwrap_err();
    assert!(matches!(err, ResolveError::DuplicateModule { ref value, .. } if value == "dup"));
    assert!(err.is_fatal());
}

// =============================================================================
// Layered Augment Scenario
// =============================================================================

#[test]
fn test_augmented_leaf_reachable_from_every_module() {
    let resolved = compile(layered(), Policy::Strict).unwrap();
    assert!(!resolved.has_errors(), "{}", resolved.diagnostics().format_all());

    let from_base = resolved
        .traverse_from_module(module(&resolved, "base"), "/b:system/b:audited-by", true)
        .unwrap();
    let from_mid = resolved
        .traverse_from_module(module(&resolved, "mid"), "/bs:system/bs:audited-by", true)
        .unwrap();
    let from_top = resolved
        .traverse_from_module(module(&resolved, "top"), "/sys:system/md:audited-by", true)
        .unwrap();
    assert_eq!(from_base, from_mid);
    assert_eq!(from_base, from_top);

    let system = find(resolved.model(), "base", &["system"]);
    let leaves = &resolved.model().node(system).children().unwrap().leaves;
    assert!(leaves.contains(&from_base));
    assert_eq!(resolved.model().kind(from_base), NodeKind::Leaf);

    let note = resolved
        .traverse_from_module(module(&resolved, "base"), "/b:system/b:audit-note", true)
        .unwrap();
    assert!(leaves.contains(&note));
}

#[test]
fn test_grouping_leaf_types_resolve_through_instantiation() {
    let resolved = compile(layered(), Policy::Strict).unwrap();
    let audited_by = find(resolved.model(), "mid", &["audit", "audited-by"]);
    let level = find(resolved.model(), "mid", &["audit", "audit-level"]);

    // `../hostname` only makes sense where the grouping is instantiated
    assert_eq!(resolved.effective_type_name(audited_by).unwrap(), "string");
    assert_eq!(resolved.declared_type_name(audited_by).unwrap(), "string");
    assert_eq!(resolved.effective_type_name(level).unwrap(), "M_audit_audit_level");

    let grouping = find(resolved.model(), "mid", &["audit"]);
    assert!(resolved.grouping_in_augment(grouping));
}

#[test]
fn test_only_instantiated_leaves_are_reported() {
    let resolved = compile(layered(), Policy::Strict).unwrap();
    let model = resolved.model();

    // mid's grouping leaves reach base's tree through top's augment
    let audited_by = find(model, "mid", &["audit", "audited-by"]);
    assert!(resolved.is_instantiated(audited_by));

    let orphaned = single(
        r#"{"module": "m", "prefix": "m", "namespace": "urn:m", "body": [
            {"kind": "grouping", "name": "inner", "body": [
                {"kind": "leaf", "name": "name", "type": {"name": "string"}},
                {"kind": "leaf", "name": "alias", "type": {"name": "leafref", "path": "../name"}}
            ]},
            {"kind": "grouping", "name": "outer", "body": [{"kind": "uses", "name": "inner"}]},
            {"kind": "leaf", "name": "plain", "type": {"name": "string"}}
        ]}"#,
        "orphaned.json",
    );
    let resolved = compile(orphaned, Policy::Strict).unwrap();
    assert!(!resolved.has_errors());

    let leaves: Vec<String> = resolved
        .model()
        .nodes()
        .filter(|(id, node)| node.kind().is_leaf_like() && resolved.is_instantiated(*id))
        .map(|(_, node)| node.name.clone())
        .collect();
    assert_eq!(leaves, vec!["plain"]);

    let alias = find(resolved.model(), "m", &["inner", "alias"]);
    assert!(resolved.effective_type_name(alias).is_err());
}

#[test]
fn test_augment_is_idempotent() {
    let mut ctx = ResolveContext::new(layered(), Policy::Strict).unwrap();
    let top = ctx.registry().get("top").unwrap();
    let main = ctx.model().module(top).main_submodule();
    let augment = ctx.model().submodule(main).body.augments[0];

    let target = apply_augment(&mut ctx, augment).unwrap();
    let once = ctx.model().node(target).children().unwrap().clone();

    assert_eq!(apply_augment(&mut ctx, augment).unwrap(), target);
    let twice = ctx.model().node(target).children().unwrap().clone();
    assert_eq!(once, twice);
    assert_eq!(twice.leaves.len(), 4);
}

#[test]
fn test_parent_step_round_trips_absolute_descent() {
    let resolved = compile(layered(), Policy::Strict).unwrap();
    let base = module(&resolved, "base");

    let system = resolved.traverse_from_module(base, "/b:system", false).unwrap();
    let clock = resolved.traverse_from_module(base, "/b:system/b:clock", false).unwrap();
    assert_eq!(resolved.traverse("..", clock, false).unwrap(), system);

    // a merged grouping leaf climbs to the augment target, not the grouping
    let audited_by = resolved.traverse_from_module(base, "/b:system/b:audited-by", true).unwrap();
    assert_eq!(resolved.traverse("..", audited_by, false).unwrap(), system);
    let timezone = resolved
        .traverse_from_module(base, "/b:system/b:clock/b:timezone", true)
        .unwrap();
    assert_eq!(resolved.traverse("../clock/timezone", audited_by, true).unwrap(), timezone);
}

#[test]
fn test_unknown_prefix_in_path() {
    let resolved = compile(layered(), Policy::Strict).unwrap();
    let err = resolved
        .traverse_from_module(module(&resolved, "top"), "/zz:system", false)
        .unwrap_err();
    assert!(matches!(err, ResolveError::UnknownPrefix { .. }));
}

// =============================================================================
// Identities
// =============================================================================

#[test]
fn test_identity_chain_and_self_cycle() {
    let model = single(include_str!("fixtures/identities.json"), "identities.json");
    let resolved = compile(model, Policy::BestEffort).unwrap();
    let find_identity = |name: &str| find(resolved.model(), "crypto", &[name]);

    let a = find_identity("a");
    assert_eq!(resolved.locate_base(find_identity("c")).unwrap(), a);
    assert_eq!(resolved.locate_base(a).unwrap(), a);

    let err = resolved.locate_base(find_identity("d")).unwrap_err();
    assert_eq!(
        err,
        ResolveError::CyclicIdentityBase {
            identity: "d".to_string(),
            module: "crypto".to_string(),
            chain: vec!["d".to_string(), "d".to_string()],
        }
    );

    // the cycle is collected, the rest of the hierarchy still indexed
    assert_eq!(resolved.diagnostics().error_count(), 1);
    assert_eq!(resolved.diagnostics().errors().next().unwrap().operation, Operation::LocateBase);

    let crypto = module(&resolved, "crypto");
    let roots: Vec<&String> = resolved.base_identities(crypto).keys().collect();
    assert_eq!(roots, vec!["a"]);

    let main = resolved.model().module(crypto).main_submodule();
    let entries: Vec<(&str, &str)> = resolved
        .identity_entries(main)
        .iter()
        .map(|e| (e.identity.as_str(), e.base_type.as_str()))
        .collect();
    assert_eq!(
        entries,
        vec![("b", "Cr_a_id"), ("c", "Cr_b_id"), ("c", "Cr_a_id")]
    );
    assert!(resolved
        .identity_entries(main)
        .iter()
        .all(|e| e.namespace == "urn:example:crypto" && e.prefix == "cr"));

    let algorithm = find(resolved.model(), "crypto", &["algorithm"]);
    assert_eq!(resolved.effective_type_name(algorithm).unwrap(), "Cr_c_id");
}

#[test]
fn test_identity_cycle_aborts_strict_run() {
    let model = single(include_str!("fixtures/identities.json"), "identities.json");
    let err = compile(model, Policy::Strict).unwrap_err();
    assert!(matches!(
        err,
        ResolveError::CyclicIdentityBase { ref identity, .. } if identity == "d"
    ));
}

// =============================================================================
// Leafref Chains
// =============================================================================

#[test]
fn test_leafref_chain_and_cycle() {
    let model = single(include_str!("fixtures/leafrefs.json"), "leafrefs.json");
    let resolved = compile(model, Policy::BestEffort).unwrap();

    let l1 = find(resolved.model(), "refs", &["chain", "l1"]);
    let l3 = find(resolved.model(), "refs", &["chain", "l3"]);
    assert_eq!(resolved.effective_type_name(l1).unwrap(), "string");
    assert_eq!(resolved.resolve_leafref("../l2", l1).unwrap(), l3);

    let l4 = find(resolved.model(), "refs", &["loop", "l4"]);
    let err = resolved.effective_type_name(l4).unwrap_err();
    assert!(matches!(err, ResolveError::CyclicTypeReference { .. }));
    assert!(!err.is_fatal());

    let errors: Vec<_> = resolved.diagnostics().errors().collect();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.operation == Operation::ResolveType));
    assert!(errors.iter().all(|e| e.code == "E009"));
}

#[test]
fn test_leafref_cycle_aborts_strict_run() {
    let model = single(include_str!("fixtures/leafrefs.json"), "leafrefs.json");
    let err = compile(model, Policy::Strict).unwrap_err();
    assert!(matches!(err, ResolveError::CyclicTypeReference { .. }));
}

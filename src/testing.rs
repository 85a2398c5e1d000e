//! Shared fixtures for unit tests

use crate::context::{Policy, ResolveContext};
use crate::model::{Document, NodeId, SchemaModel};

pub(crate) fn model(docs: Vec<serde_json::Value>) -> SchemaModel {
    let docs: Vec<Document> = docs
        .into_iter()
        .map(|d| serde_json::from_value(d).expect("fixture document"))
        .collect();
    SchemaModel::from_documents(docs).expect("fixture lowering")
}

pub(crate) fn context(docs: Vec<serde_json::Value>) -> ResolveContext {
    context_with(docs, Policy::BestEffort)
}

pub(crate) fn context_with(docs: Vec<serde_json::Value>, policy: Policy) -> ResolveContext {
    ResolveContext::new(model(docs), policy).expect("fixture registration")
}

/// Node reached by following direct children by name from a module's top level
pub(crate) fn node(ctx: &ResolveContext, module: &str, names: &[&str]) -> NodeId {
    let model = ctx.model();
    let module = model.module_by_name(module).expect("fixture module");
    model
        .find_path(module, names)
        .unwrap_or_else(|| panic!("fixture node {:?}", names))
}

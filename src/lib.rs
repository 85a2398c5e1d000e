//! Schema Resolver
//!
//! Cross-module resolution engine for hierarchical schema modules. It takes
//! the parsed node trees of a batch of modules and produces a fully expanded
//! model that code emitters can walk.
//!
//! ## Features
//!
//! - **Module Registry**: name/prefix indexes and an import-respecting order
//! - **Path Traversal**: absolute and relative paths across prefix rebinding,
//!   `uses` expansion and grouping re-anchoring
//! - **Augment Expansion**: idempotent merging of out-of-line extensions
//! - **Identity Hierarchies**: root discovery and lookup-table entries
//! - **Type Names**: effective names for leaves, leafref chains and unions
//!
//! ## Pipeline
//!
//! ```text
//! documents ──> SchemaModel ──> ResolveContext (register)
//!                                   │
//!                                   ├─ compute_order (Kahn, cycles fatal)
//!                                   ├─ per module: identities, augments
//!                                   └─ type check
//!                                          │
//!                                          v
//!                                   ResolvedSchema (queries)
//! ```

pub mod augment;
pub mod compiler;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod identity;
pub mod loader;
pub mod model;
pub mod naming;
pub mod path;
pub mod registry;
pub mod traverse;
pub mod types;

#[cfg(test)]
mod testing;

pub use compiler::{compile, Compiler, ResolvedSchema};
pub use config::ResolverConfig;
pub use context::{Policy, ResolveContext};
pub use diagnostics::{DiagnosticItem, Diagnostics, Operation, Severity};
pub use error::{ResolveError, Result};
pub use loader::{load_from_directory, load_from_str, LoadConfig, LoadedBundle};
pub use model::{
    Document, IdentityMapEntry, ModuleId, NodeId, NodeKind, SchemaModel, SubModuleId,
};
pub use registry::ModuleRegistry;

//! Error types for schema resolution

use thiserror::Error;

/// Result type for resolution operations
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Resolution errors
///
/// Graph-level errors (`DuplicateModule`, `CyclicImports`) and ingestion
/// errors are fatal. Everything else is node-local and may be recovered from
/// under [`Policy::BestEffort`](crate::context::Policy).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Duplicate module {field}: {value} (already registered by module {existing})")]
    DuplicateModule {
        field: DuplicateField,
        value: String,
        existing: String,
    },

    #[error("Unknown prefix '{prefix}' in module {module}")]
    UnknownPrefix { prefix: String, module: String },

    #[error("Module {name} referenced from {module} is not part of the batch")]
    UnknownModule { name: String, module: String },

    #[error("Cyclic imports between modules: {}", modules.join(", "))]
    CyclicImports { modules: Vec<String> },

    #[error(
        "Unresolved path {path} at segment {index} '{segment}' \
         (reached '{accumulated}') in module {module}: {reason}"
    )]
    UnresolvedPath {
        path: String,
        index: usize,
        segment: String,
        accumulated: String,
        module: String,
        reason: String,
    },

    #[error("Augment {path} in module {module} targets a {kind}, which cannot be augmented")]
    InvalidAugmentTarget {
        path: String,
        kind: String,
        module: String,
    },

    #[error(
        "Identity {identity} in module {module} is its own base (chain: {})",
        chain.join(" -> ")
    )]
    CyclicIdentityBase {
        identity: String,
        module: String,
        chain: Vec<String>,
    },

    #[error("Base identity {base} of {identity} not found in module {module}")]
    UnresolvedIdentity {
        base: String,
        identity: String,
        module: String,
    },

    #[error("Cyclic leafref chain through {leaf} (path {path}) in module {module}")]
    CyclicTypeReference {
        leaf: String,
        path: String,
        module: String,
    },

    #[error("Grouping {grouping} used in module {module} could not be located")]
    UnresolvedGroupingReference { grouping: String, module: String },

    #[error("Invalid document {source_name}: {message}")]
    InvalidDocument { source_name: String, message: String },

    #[error("IO error: {0}")]
    Io(String),

    #[error("JSON error: {0}")]
    Json(String),
}

/// Which registry key collided on registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateField {
    Name,
    Prefix,
}

impl std::fmt::Display for DuplicateField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicateField::Name => write!(f, "name"),
            DuplicateField::Prefix => write!(f, "prefix"),
        }
    }
}

impl ResolveError {
    /// Errors that invalidate the processing order and abort the whole run
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DuplicateModule { .. }
                | Self::CyclicImports { .. }
                | Self::InvalidDocument { .. }
                | Self::Io(_)
                | Self::Json(_)
        )
    }

    /// Stable short code used in diagnostics output
    pub fn code(&self) -> &'static str {
        match self {
            Self::DuplicateModule { .. } => "E001",
            Self::UnknownPrefix { .. } => "E002",
            Self::UnknownModule { .. } => "E003",
            Self::CyclicImports { .. } => "E004",
            Self::UnresolvedPath { .. } => "E005",
            Self::InvalidAugmentTarget { .. } => "E006",
            Self::CyclicIdentityBase { .. } => "E007",
            Self::UnresolvedIdentity { .. } => "E008",
            Self::CyclicTypeReference { .. } => "E009",
            Self::UnresolvedGroupingReference { .. } => "E010",
            Self::InvalidDocument { .. } => "E011",
            Self::Io(_) => "E012",
            Self::Json(_) => "E013",
        }
    }

    /// Module the failure was observed in, when there is one
    pub fn module(&self) -> Option<&str> {
        match self {
            Self::UnknownPrefix { module, .. }
            | Self::UnknownModule { module, .. }
            | Self::UnresolvedPath { module, .. }
            | Self::InvalidAugmentTarget { module, .. }
            | Self::CyclicIdentityBase { module, .. }
            | Self::UnresolvedIdentity { module, .. }
            | Self::CyclicTypeReference { module, .. }
            | Self::UnresolvedGroupingReference { module, .. } => Some(module.as_str()),
            Self::DuplicateModule { value, .. } => Some(value.as_str()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ResolveError {
    fn from(err: std::io::Error) -> Self {
        ResolveError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ResolveError {
    fn from(err: serde_json::Error) -> Self {
        ResolveError::Json(err.to_string())
    }
}

//! Resolution Diagnostics
//!
//! Failures recovered under the best-effort policy are accumulated here so a
//! run can report every problem at once and derive its exit status.

use serde::Serialize;
use std::fmt;

use crate::error::ResolveError;

// =============================================================================
// Operation
// =============================================================================

/// Operation that was being attempted when a problem was observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Traverse,
    ApplyAugment,
    ExpandUses,
    LocateBase,
    ResolveType,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Traverse => "traverse",
            Self::ApplyAugment => "apply_augment",
            Self::ExpandUses => "expand_uses",
            Self::LocateBase => "locate_base",
            Self::ResolveType => "resolve_type",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Diagnostic Item
// =============================================================================

/// A single recorded problem
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticItem {
    pub operation: Operation,
    pub severity: Severity,
    /// `E0xx` for resolution errors, `W0xx` for warnings
    pub code: String,
    /// Enclosing module
    pub module: String,
    /// Node or path involved
    pub subject: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    #[serde(skip)]
    pub error: Option<ResolveError>,
}

impl DiagnosticItem {
    pub fn from_error(
        operation: Operation,
        module: impl Into<String>,
        subject: impl Into<String>,
        error: ResolveError,
    ) -> Self {
        Self {
            operation,
            severity: Severity::Error,
            code: error.code().to_string(),
            module: module.into(),
            subject: subject.into(),
            message: error.to_string(),
            context: Vec::new(),
            error: Some(error),
        }
    }

    pub fn warning(
        operation: Operation,
        code: &str,
        module: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            severity: Severity::Warning,
            code: code.to_string(),
            module: module.into(),
            subject: subject.into(),
            message: message.into(),
            context: Vec::new(),
            error: None,
        }
    }

    pub fn with_context(mut self, ctx: impl Into<String>) -> Self {
        self.context.push(ctx.into());
        self
    }
}

impl fmt::Display for DiagnosticItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} ({} in {})",
            self.code, self.severity, self.message, self.operation, self.module
        )?;

        for ctx in &self.context {
            write!(f, "\n  - {}", ctx)?;
        }

        Ok(())
    }
}

// =============================================================================
// Diagnostics Collection
// =============================================================================

#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    items: Vec<DiagnosticItem>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: DiagnosticItem) {
        self.items.push(item);
    }

    /// Record a recovered error
    pub fn error(
        &mut self,
        operation: Operation,
        module: impl Into<String>,
        subject: impl Into<String>,
        error: ResolveError,
    ) {
        self.push(DiagnosticItem::from_error(operation, module, subject, error));
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &DiagnosticItem> {
        self.items.iter().filter(|i| i.severity == Severity::Warning)
    }

    pub fn all(&self) -> &[DiagnosticItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn merge(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    /// One line per item followed by a count summary
    pub fn format_all(&self) -> String {
        let mut output = String::new();
        for item in &self.items {
            output.push_str(&item.to_string());
            output.push('\n');
        }
        output.push_str(&format!(
            "{} error(s), {} warning(s)",
            self.error_count(),
            self.warning_count()
        ));
        output
    }
}

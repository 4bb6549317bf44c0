//! Diagnostic codes for lineage runs
//!
//! IMPORTANT: Diagnostic codes are versioned and stable.
//! NEVER rename or remove codes - they are part of the public API.
//! Add new codes with new names only.

use serde::{Deserialize, Serialize};

/// Diagnostic code registry (v1)
///
/// These codes are STABLE and VERSIONED.
/// Do NOT rename or remove codes - only add new ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiagnosticCode {
    // Inference skips (1xxx)
    /// Model has no compiled SQL, so no edges can be inferred for it
    ModelNoCompiledSql,

    /// Model has no table/view entry in the catalog
    ModelNotInCatalog,

    /// A declared dependency has no table/view entry in the catalog
    DependencyNotInCatalog,

    // Target selection (2xxx)
    /// The requested target model does not exist in the manifest
    TargetModelNotFound,

    /// The target model exists but has no catalog columns to root closures at
    TargetModelNoColumns,
}

impl DiagnosticCode {
    /// Get the diagnostic code as a stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ModelNoCompiledSql => "MODEL_NO_COMPILED_SQL",
            Self::ModelNotInCatalog => "MODEL_NOT_IN_CATALOG",
            Self::DependencyNotInCatalog => "DEPENDENCY_NOT_IN_CATALOG",
            Self::TargetModelNotFound => "TARGET_MODEL_NOT_FOUND",
            Self::TargetModelNoColumns => "TARGET_MODEL_NO_COLUMNS",
        }
    }
}

impl std::fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Diagnostic severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational message
    Info,

    /// Warning - should be reviewed, results may be empty or narrowed
    Warn,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
        }
    }
}

/// A diagnostic message with structured metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code
    pub code: DiagnosticCode,

    /// Severity level
    pub severity: Severity,

    /// Human-readable message
    pub message: String,

    /// Model unique_id the diagnostic is about
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Dependency unique_id, for dependency-level skips
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependency: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with minimal fields
    pub fn new(code: DiagnosticCode, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            model: None,
            dependency: None,
        }
    }

    /// Set the model this diagnostic refers to
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the dependency this diagnostic refers to
    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.dependency = Some(dependency.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_code_stability() {
        assert_eq!(DiagnosticCode::ModelNoCompiledSql.as_str(), "MODEL_NO_COMPILED_SQL");
        assert_eq!(DiagnosticCode::TargetModelNotFound.as_str(), "TARGET_MODEL_NOT_FOUND");
    }

    #[test]
    fn serde_names_match_stable_strings() {
        let json = serde_json::to_string(&DiagnosticCode::DependencyNotInCatalog).unwrap();
        assert_eq!(json, "\"DEPENDENCY_NOT_IN_CATALOG\"");
    }

    #[test]
    fn diagnostic_serialization() {
        let diag = Diagnostic::new(
            DiagnosticCode::DependencyNotInCatalog,
            Severity::Info,
            "dependency has no catalog entry",
        )
        .with_model("model.shop.order_summary")
        .with_dependency("model.shop.orders");

        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("DEPENDENCY_NOT_IN_CATALOG"));
        assert!(json.contains("\"dependency\":\"model.shop.orders\""));
    }

    #[test]
    fn optional_fields_are_omitted() {
        let diag = Diagnostic::new(DiagnosticCode::ModelNoCompiledSql, Severity::Info, "ok");
        let json = serde_json::to_string(&diag).unwrap();
        assert!(!json.contains("model"));
        assert!(!json.contains("dependency"));
    }
}

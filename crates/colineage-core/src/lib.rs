//! Colineage Core
//!
//! Shared domain types for column lineage runs: configuration, stable
//! diagnostic codes and the versioned run report.
//! Never rename diagnostic codes - they are part of the public API.

pub mod diagnostic;
pub mod report;
pub mod config;

pub use diagnostic::{Diagnostic, DiagnosticCode, Severity};
pub use report::{Report, ReportSummary, ReportVersion};
pub use config::{Config, ConfigError, InferenceConfig, LintSettings};

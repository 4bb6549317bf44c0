//! Configuration schema (colineage.toml)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which artifact entries take part in edge inference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Manifest resource types that produce lineage (the downstream side)
    #[serde(default = "default_resource_types")]
    pub resource_types: Vec<String>,

    /// Catalog relation types whose columns are known
    #[serde(default = "default_relation_types")]
    pub relation_types: Vec<String>,

    /// Also read columns of catalog sources, so models reading sources get edges
    #[serde(default)]
    pub include_sources: bool,
}

fn default_resource_types() -> Vec<String> {
    vec!["model".to_string()]
}

fn default_relation_types() -> Vec<String> {
    vec!["table".to_string(), "view".to_string()]
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            resource_types: default_resource_types(),
            relation_types: default_relation_types(),
            include_sources: false,
        }
    }
}

impl InferenceConfig {
    /// Check if a manifest resource type produces lineage
    pub fn is_producing(&self, resource_type: &str) -> bool {
        self.resource_types.iter().any(|t| t == resource_type)
    }

    /// Check if a catalog relation type contributes columns (case-insensitive)
    pub fn is_relation(&self, relation_type: &str) -> bool {
        self.relation_types
            .iter()
            .any(|t| t.eq_ignore_ascii_case(relation_type))
    }
}

/// Settings for the sqlfluff style checker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintSettings {
    /// sqlfluff dialect
    #[serde(default = "default_dialect")]
    pub dialect: String,

    /// sqlfluff templater
    #[serde(default = "default_templater")]
    pub templater: String,

    /// Maximum line length
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,

    /// Rules excluded from the check
    #[serde(default = "default_exclude_rules")]
    pub exclude_rules: Vec<String>,

    /// Executable to invoke
    #[serde(default = "default_executable")]
    pub executable: String,
}

fn default_dialect() -> String {
    "redshift".to_string()
}

fn default_templater() -> String {
    "dbt".to_string()
}

fn default_max_line_length() -> usize {
    120
}

fn default_exclude_rules() -> Vec<String> {
    vec!["L029".to_string(), "L031".to_string(), "L034".to_string()]
}

fn default_executable() -> String {
    "sqlfluff".to_string()
}

impl Default for LintSettings {
    fn default() -> Self {
        Self {
            dialect: default_dialect(),
            templater: default_templater(),
            max_line_length: default_max_line_length(),
            exclude_rules: default_exclude_rules(),
            executable: default_executable(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory that lineage artifacts are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Reduce model identifiers to their last segment in CSV rows
    #[serde(default = "default_true")]
    pub short_names: bool,

    /// Indent JSON documents
    #[serde(default = "default_true")]
    pub pretty_json: bool,

    /// Edge inference settings
    #[serde(default)]
    pub inference: InferenceConfig,

    /// Style checker settings
    #[serde(default)]
    pub lint: LintSettings,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("lineage_output")
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            short_names: true,
            pretty_json: true,
            inference: InferenceConfig::default(),
            lint: LintSettings::default(),
        }
    }
}

impl Config {
    /// Load config from TOML file
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.display().to_string(), e.to_string()))?;

        Self::from_toml(&contents)
    }

    /// Load config from TOML string
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml)
            .map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// Config error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    IoError(String, String),

    #[error("Invalid colineage.toml: {0}")]
    ParseError(String),
}

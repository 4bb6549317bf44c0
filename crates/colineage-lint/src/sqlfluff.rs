//! sqlfluff invocation
//!
//! The rendered configuration is written to a temporary file for the duration
//! of one `sqlfluff fix` run and removed afterwards.

use colineage_core::LintSettings;
use std::io::Write;
use std::path::Path;
use std::process::Command;

/// Rules applied on top of the configurable `[sqlfluff]` section
const FIXED_RULES: &str = "\
[sqlfluff:indentation]
indented_joins = false
indented_using_on = true
template_blocks_indent = false
indent_unit = tab

[sqlfluff:templater:dbt]
project_dir = .
profile = ''

[sqlfluff:templater:jinja]
apply_dbt_builtins = true

[sqlfluff:layout:type:comma]
line_position = leading

[sqlfluff:layout:spacing]
spacing_before_parenthesis = 0
spacing_after_parenthesis = 0
spacing_within_parenthesis = 0
tab_space_size = 4
line_spacing = 0
spacing_before_comma = 1
spacing_after_comma = 0

[sqlfluff:rules:convention.comparison_operator]
preferred_comparison_operator = !=

[sqlfluff:rules:capitalisation.keywords]
capitalisation_policy = lower

[sqlfluff:rules:capitalisation.identifiers]
capitalisation_policy = lower
ignore_words = []

[sqlfluff:rules:capitalisation.functions]
extended_capitalisation_policy = lower

[sqlfluff:rules:aliasing.table]
force_explicit = True

[sqlfluff:rules:aliasing.column]
aliasing = explicit

[sqlfluff:rules:layout.select_targets]
line_position = single
spacing_after = 0

[sqlfluff:rules:layout.spacing]
spacing_before_parenthesis = 0
spacing_after_parenthesis = 0
spacing_within_parenthesis = 0
line_spacing = 0
treat_multiple_whitespace = True
allow_mixed_indentation = False

[sqlfluff:rules:references.from]
force_from = True

[sqlfluff:rules:structure.subquery]
forbid_subquery_in = both

[sqlfluff:rules:ambiguous.column_references]
group_by_policy = consistent

[sqlfluff:rules:convention.quoted_literals]
preferred_quoted_literal_style = consistent

[sqlfluff:rules:layout.long_lines]
ignore_comment_lines = True
ignore_comment_clauses = True

[sqlfluff:rules:layout.align_expressions]
align_to = left

[sqlfluff:rules:layout.operators]
operator_new_lines = before

[sqlfluff:rules:convention.select_trailing_comma]
select_clause_trailing_comma = forbid
";

/// Render the sqlfluff configuration file for the given settings
pub fn render_config(settings: &LintSettings) -> String {
    format!(
        "[sqlfluff]\n\
         dialect = {}\n\
         templater = {}\n\
         max_line_length = {}\n\
         exclude_rules = {}\n\
         sql_file_exts = .sql,.sql.jinja2,.dml,.ddl\n\n{}",
        settings.dialect,
        settings.templater,
        settings.max_line_length,
        settings.exclude_rules.join(","),
        FIXED_RULES,
    )
}

/// Captured result of one sqlfluff run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintOutcome {
    pub stdout: String,
    pub stderr: String,

    /// Exit code, if the process was not killed by a signal
    pub status: Option<i32>,
}

impl LintOutcome {
    /// sqlfluff reports problems it could not fix on stderr
    pub fn is_clean(&self) -> bool {
        self.stderr.is_empty()
    }
}

/// Runs `sqlfluff fix` with a generated configuration
#[derive(Debug, Clone, Default)]
pub struct SqlFluff {
    settings: LintSettings,
}

impl SqlFluff {
    pub fn new(settings: LintSettings) -> Self {
        Self { settings }
    }

    /// Fix `file` in place, running from `project_dir`
    pub fn fix(&self, file: &Path, project_dir: &Path) -> Result<LintOutcome, LintError> {
        let mut config_file = tempfile::Builder::new()
            .suffix(".sqlfluff")
            .tempfile()
            .map_err(|e| LintError::ConfigError(e.to_string()))?;
        config_file
            .write_all(render_config(&self.settings).as_bytes())
            .and_then(|_| config_file.flush())
            .map_err(|e| LintError::ConfigError(e.to_string()))?;

        tracing::info!(
            file = %file.display(),
            config = %config_file.path().display(),
            project_dir = %project_dir.display(),
            "running sqlfluff"
        );

        let output = Command::new(&self.settings.executable)
            .arg("fix")
            .arg(file)
            .arg("--config")
            .arg(config_file.path())
            .arg("--verbose")
            .current_dir(project_dir)
            .output()
            .map_err(|e| LintError::SpawnError(self.settings.executable.clone(), e.to_string()))?;

        Ok(LintOutcome {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            status: output.status.code(),
        })
    }
}

/// Lint errors
#[derive(Debug, thiserror::Error)]
pub enum LintError {
    #[error("SQL file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to write sqlfluff config: {0}")]
    ConfigError(String),

    #[error("Failed to run {0}: {1}")]
    SpawnError(String, String),
}

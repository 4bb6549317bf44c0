//! SQL style checking for dbt models
//!
//! Locates a model's SQL file, renders a sqlfluff configuration from
//! [`LintSettings`](colineage_core::LintSettings) and runs `sqlfluff fix`.

pub mod locate;
pub mod sqlfluff;

pub use locate::find_sql_file;
pub use sqlfluff::{LintError, LintOutcome, SqlFluff, render_config};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use colineage_core::{Config, Report, Severity};
use colineage_dbt::{Catalog, ColumnCatalog, Manifest, ModelGraph};
use colineage_engine::{run_all_models, run_flat, run_targeted, Exporter};
use colineage_lint::{find_sql_file, LintError, SqlFluff};

const DEFAULT_CONFIG: &str = "colineage.toml";
const RUN_REPORT: &str = "run_report.json";

/// Colineage - column-level lineage for dbt projects
#[derive(Parser)]
#[command(name = "colineage")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: colineage.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory artifacts are written to (overrides output_dir)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer one-hop column lineage for every model
    Lineage {
        #[command(flatten)]
        artifacts: ArtifactArgs,
    },

    /// Expand upstream and downstream lineage for one model
    Model {
        /// Model name or unique_id
        model: Option<String>,

        /// Expand every cataloged model instead of one target
        #[arg(short, long, conflicts_with = "model")]
        all: bool,

        #[command(flatten)]
        artifacts: ArtifactArgs,
    },

    /// Run sqlfluff fix on a model's SQL file
    Lint {
        /// SQL file name, with or without the .sql extension
        filename: String,

        /// dbt project directory to search and run from
        #[arg(short, long, default_value = ".")]
        project_dir: PathBuf,
    },
}

#[derive(clap::Args)]
struct ArtifactArgs {
    /// Path to dbt manifest.json
    #[arg(short = 'f', long, default_value = "target/manifest.json")]
    manifest: PathBuf,

    /// Path to dbt catalog.json
    #[arg(short = 'k', long, default_value = "target/catalog.json")]
    catalog: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)?
    } else if Path::new(DEFAULT_CONFIG).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if let Some(output) = cli.output {
        config.output_dir = output;
    }

    match cli.command {
        Commands::Lineage { artifacts } => lineage_command(&config, &artifacts, cli.verbose),
        Commands::Model { model, all, artifacts } => {
            model_command(&config, model.as_deref(), all, &artifacts, cli.verbose)
        }
        Commands::Lint { filename, project_dir } => lint_command(&config, &filename, &project_dir),
    }
}

/// Log to stderr; RUST_LOG takes precedence over the verbosity flag
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load both dbt artifacts and build the structures inference runs on
fn load_artifacts(config: &Config, args: &ArtifactArgs, verbose: bool) -> Result<(ModelGraph, ColumnCatalog)> {
    if verbose {
        eprintln!("{} {}", "Loading manifest from:".cyan(), args.manifest.display());
    }
    let manifest = Manifest::from_file(&args.manifest).with_context(|| {
        format!(
            "Failed to load manifest at {}. Run 'dbt compile' first.",
            args.manifest.display()
        )
    })?;

    if verbose {
        eprintln!("{} {}", "Loading catalog from:".cyan(), args.catalog.display());
    }
    let catalog = Catalog::from_file(&args.catalog).with_context(|| {
        format!(
            "Failed to load catalog at {}. Run 'dbt docs generate' first.",
            args.catalog.display()
        )
    })?;

    let graph = ModelGraph::from_manifest(&manifest);
    let columns = ColumnCatalog::from_catalog(&catalog, &config.inference);
    tracing::info!(
        dbt_version = %manifest.metadata.dbt_version,
        nodes = graph.len(),
        relations = columns.len(),
        "artifacts loaded"
    );

    Ok((graph, columns))
}

/// Lineage command - flat one-hop graph plus its inverse
fn lineage_command(config: &Config, args: &ArtifactArgs, verbose: bool) -> Result<()> {
    let (graph, catalog) = load_artifacts(config, args, verbose)?;

    if verbose {
        eprintln!("{}", "Inferring column lineage...".cyan());
    }
    let flat = run_flat(&graph, &catalog, &config.inference)?;

    let exporter = Exporter::from_config(config);
    let artifacts = exporter
        .export_flat(&flat.lineage, &flat.downstream)
        .with_context(|| format!("Failed to write lineage to {}", exporter.output_dir().display()))?;

    let report = finish_report(flat.report(), &artifacts, exporter.output_dir())?;
    print_report_summary("Column Lineage Report", &report, verbose);

    Ok(())
}

/// Model command - upstream and downstream closures for a target model
fn model_command(
    config: &Config,
    model: Option<&str>,
    all: bool,
    args: &ArtifactArgs,
    verbose: bool,
) -> Result<()> {
    let (graph, catalog) = load_artifacts(config, args, verbose)?;

    let targeted = if all {
        if verbose {
            eprintln!("{}", "Resolving lineage for all models...".cyan());
        }
        run_all_models(&graph, &catalog, &config.inference)?
    } else {
        match model {
            Some(name) if verbose => eprintln!("{} {}", "Resolving lineage for:".cyan(), name),
            None => eprintln!("{}", "No model given, closures will be empty (use --all to expand every model)".yellow()),
            _ => {}
        }
        run_targeted(&graph, &catalog, &config.inference, model)?
    };

    let exporter = Exporter::from_config(config);
    let artifacts = exporter
        .export_targeted(&targeted.name, &targeted.upstream, &targeted.downstream)
        .with_context(|| format!("Failed to write lineage to {}", exporter.output_dir().display()))?;

    let report = finish_report(targeted.report(), &artifacts, exporter.output_dir())?;
    print_report_summary("Model Lineage Report", &report, verbose);

    Ok(())
}

/// Lint command - locate the SQL file and let sqlfluff fix it
fn lint_command(config: &Config, filename: &str, project_dir: &Path) -> Result<()> {
    let file = find_sql_file(project_dir, filename)
        .ok_or_else(|| LintError::FileNotFound(filename.to_string()))?;
    // sqlfluff runs from the project directory
    let relative = file.strip_prefix(project_dir).unwrap_or(&file);

    println!("{} {}", "Linting".cyan(), relative.display());
    let outcome = SqlFluff::new(config.lint.clone()).fix(relative, project_dir)?;

    if !outcome.stdout.is_empty() {
        println!("{}", outcome.stdout);
    }

    if outcome.is_clean() {
        println!("{}", "✓ Linting complete".green().bold());
        Ok(())
    } else {
        eprintln!("{}", outcome.stderr);
        anyhow::bail!("sqlfluff reported errors for {}", relative.display())
    }
}

/// Record the written artifacts and save the run report next to them
fn finish_report(mut report: Report, artifacts: &[PathBuf], output_dir: &Path) -> Result<Report> {
    for path in artifacts {
        report.add_artifact(path);
    }

    let report_path = output_dir.join(RUN_REPORT);
    report
        .save_to_file(&report_path)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;
    tracing::info!(path = %report_path.display(), "run report saved");

    Ok(report)
}

fn print_report_summary(title: &str, report: &Report, verbose: bool) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", title.bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    if let Some(target) = &report.target {
        println!("{} {}", "Target:".bold(), target.green());
    }
    println!("Timestamp: {}", report.timestamp);
    println!();

    println!("{}", "Summary:".bold());
    println!("  Models considered:   {}", report.summary.models_considered);
    println!("  Models with lineage: {}", report.summary.models_with_lineage);
    println!("  Edges:               {}", report.summary.edges);

    if report.summary.warnings > 0 {
        println!("  Warnings:            {}", report.summary.warnings.to_string().yellow());
    } else {
        println!("  Warnings:            {}", report.summary.warnings.to_string().green());
    }
    println!("  Skipped (info):      {}", report.summary.info);
    println!();

    // info diagnostics only record skipped models
    let shown: Vec<_> = report
        .diagnostics
        .iter()
        .filter(|d| verbose || d.severity != Severity::Info)
        .collect();

    if !shown.is_empty() {
        println!("{}", "Diagnostics:".bold());
        for diag in shown {
            let severity_str = match diag.severity {
                Severity::Warn => "WARN".yellow().bold(),
                Severity::Info => "INFO".cyan(),
            };
            println!("  [{}] {}: {}", severity_str, diag.code, diag.message);
        }
        println!();
    }

    println!("{}", "Artifacts:".bold());
    for artifact in &report.artifacts {
        println!("  {}", artifact);
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn model_argument_is_optional() {
        let cli = Cli::try_parse_from(["colineage", "model"]).unwrap();
        match cli.command {
            Commands::Model { model, all, artifacts } => {
                assert!(model.is_none());
                assert!(!all);
                assert_eq!(artifacts.manifest, PathBuf::from("target/manifest.json"));
                assert_eq!(artifacts.catalog, PathBuf::from("target/catalog.json"));
            }
            _ => panic!("expected model command"),
        }
    }

    #[test]
    fn all_flag_conflicts_with_model() {
        let cli = Cli::try_parse_from(["colineage", "model", "--all"]).unwrap();
        assert!(matches!(cli.command, Commands::Model { all: true, .. }));

        assert!(Cli::try_parse_from(["colineage", "model", "orders", "--all"]).is_err());
    }

    #[test]
    fn global_output_overrides_after_subcommand() {
        let cli = Cli::try_parse_from(["colineage", "lineage", "--output", "out", "-f", "m.json"]).unwrap();
        assert_eq!(cli.output, Some(PathBuf::from("out")));
        match cli.command {
            Commands::Lineage { artifacts } => assert_eq!(artifacts.manifest, PathBuf::from("m.json")),
            _ => panic!("expected lineage command"),
        }
    }
}

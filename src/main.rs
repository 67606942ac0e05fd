// xarf-schema-tools/src/main.rs

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, process::ExitCode};
use tracing::info;
use tracing_subscriber::EnvFilter;

use xarf_schema_tools::{
    config::ToolConfig,
    definitions::TypeTable,
    report::{ConsoleReporter, Reporter, Status},
    validator::{self, ValidatorSettings},
    ConfigManager, Generator, Patcher,
};

#[derive(Parser)]
#[command(name = "xarf-schema", version, about = "Authoring tools for the XARF v4 schema tree")]
struct Cli {
    /// Project root that relative paths resolve against
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Extra config file layered over user and workspace config
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Normalize connection type schemas in place
    Patch {
        #[arg(long)]
        types_dir: Option<PathBuf>,
        /// File name glob inside the types directory
        #[arg(long)]
        pattern: Option<String>,
        /// File name to skip; repeatable, replaces the configured list
        #[arg(long)]
        exclude: Vec<String>,
    },
    /// Write a schema for every catalog type that has none yet
    Generate {
        #[arg(long)]
        types_dir: Option<PathBuf>,
        /// Type definition table (TOML) instead of the built-in catalog
        #[arg(long)]
        definitions: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate every sample against the resolved master schema
    Validate {
        #[arg(long)]
        samples_dir: Option<PathBuf>,
        #[arg(long)]
        schemas_dir: Option<PathBuf>,
        /// Master schema, relative to the schemas directory
        #[arg(long)]
        master: Option<PathBuf>,
        #[arg(long)]
        no_color: bool,
    },
    /// Print the catalog as category, type and schema file name
    ListTypes {
        #[arg(long)]
        definitions: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            // Config may not have loaded, so the color setting is unknown here.
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let mut cfg = ConfigManager::load(&cli.root, cli.config.as_deref()).context("load configuration")?;
    let mut overlay = ToolConfig::default();

    match cli.cmd {
        Cmd::Patch { types_dir, pattern, exclude } => {
            overlay.paths.types_dir = types_dir;
            overlay.patch.pattern = pattern;
            if !exclude.is_empty() { overlay.patch.exclude = Some(exclude); }
            cfg.apply_runtime_overlay(&overlay);

            let mut reporter = ConsoleReporter::new(cfg.color());
            let report = Patcher::new(cfg.types_dir(), cfg.patch_pattern())
                .exclude(cfg.patch_exclude())
                .run(&mut reporter)
                .with_context(|| format!("patch schemas in {}", cfg.types_dir().display()))?;
            Ok(if report.is_clean() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
        }
        Cmd::Generate { types_dir, definitions, dry_run } => {
            overlay.paths.types_dir = types_dir;
            overlay.paths.definitions = definitions;
            cfg.apply_runtime_overlay(&overlay);

            let table = TypeTable::load_or_builtin(cfg.definitions().as_deref()).context("load type definitions")?;
            info!(types = table.len(), "type catalog loaded");
            let mut reporter = ConsoleReporter::new(cfg.color());
            Generator::new(&table, cfg.types_dir())
                .dry_run(dry_run)
                .run(&mut reporter)
                .with_context(|| format!("generate type schemas in {}", cfg.types_dir().display()))?;
            Ok(ExitCode::SUCCESS)
        }
        Cmd::Validate { samples_dir, schemas_dir, master, no_color } => {
            overlay.paths.samples_dir = samples_dir;
            overlay.paths.schemas_dir = schemas_dir;
            overlay.paths.master_schema = master;
            if no_color { overlay.validate.color = Some(false); }
            cfg.apply_runtime_overlay(&overlay);

            let mut reporter = ConsoleReporter::new(cfg.color());
            match validator::run(&ValidatorSettings::from_config(&cfg), &mut reporter) {
                Ok(summary) => Ok(if summary.all_valid() { ExitCode::SUCCESS } else { ExitCode::FAILURE }),
                Err(err) => {
                    reporter.line(Status::Error, &err.to_string());
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Cmd::ListTypes { definitions } => {
            overlay.paths.definitions = definitions;
            cfg.apply_runtime_overlay(&overlay);

            let table = TypeTable::load_or_builtin(cfg.definitions().as_deref()).context("load type definitions")?;
            let mut reporter = ConsoleReporter::new(cfg.color());
            for entry in table.entries() {
                reporter.line(
                    Status::Plain,
                    &format!("{:<16} {:<22} {}", entry.category, entry.type_name, entry.file_name()),
                );
            }
            reporter.line(Status::Info, &format!("{} types in {} categories", table.len(), table.categories().count()));
            Ok(ExitCode::SUCCESS)
        }
    }
}

//! `uilink` command-line entry point.
//!
//! ```bash
//! # Index a source tree and print the index
//! uilink scan --root ./MyApp
//!
//! # Map a captured accessibility tree onto the sources
//! uilink map --root ./MyApp --snapshot tree.json --out enriched.json
//!
//! # Gate on critical mappings (exit status 1 when any fails)
//! uilink audit --hierarchy enriched.json --root ./MyApp --out ./audit
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use uilink::config::Config;
use uilink::pipeline::{self, Project};
use uilink::snapshot::load_snapshot;

#[derive(Parser, Debug)]
#[command(name = "uilink", version, about = "Map live UI elements back to their source")]
struct Cli {
    /// Log level when RUST_LOG is not set.
    #[arg(long, global = true, value_enum, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index a source tree.
    Scan {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Write the index here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Build or refresh the identifier registry.
    Registry {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Rebuild even when the registry is fresh.
        #[arg(long)]
        rebuild: bool,
    },
    /// Map an accessibility snapshot onto the sources.
    Map {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long)]
        snapshot: PathBuf,
        /// Write the enriched hierarchy here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        rebuild: bool,
    },
    /// Check an enriched hierarchy against critical mappings.
    Audit {
        #[arg(long)]
        hierarchy: PathBuf,
        /// Source root whose configuration supplies the rules.
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Extra rules file merged over the layered configuration.
        #[arg(long)]
        rules: Option<PathBuf>,
        /// Directory for audit-report.json and audit-unmatched.json.
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Write a starter project configuration.
    Init {
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Overwrite an existing configuration.
        #[arg(long)]
        force: bool,
    },
}

fn init_tracing(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_directive()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level);

    match run(cli.command) {
        Ok(code) => code,
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(command: Command) -> Result<ExitCode> {
    match command {
        Command::Scan { root, out } => {
            let project = Project::open(&root)?;
            let index = project.index()?;
            match out {
                Some(path) => pipeline::write_index(&path, &index)?,
                None => println!("{}", pipeline::to_json(&index, "source index")?),
            }
        }
        Command::Registry { root, rebuild } => {
            let project = Project::open(&root)?;
            let index = project.index()?;
            let registry = project.registry(&index, rebuild);
            info!(
                "{} identifiers at {} locations in {}",
                registry.identifiers.len(),
                registry.location_count(),
                project.registry_path().display()
            );
        }
        Command::Map {
            root,
            snapshot,
            out,
            rebuild,
        } => {
            let project = Project::open(&root)?;
            let roots = load_snapshot(&snapshot)
                .with_context(|| format!("Failed to load snapshot {}", snapshot.display()))?;
            let enriched = project.map(&roots, rebuild)?;
            match out {
                Some(path) => pipeline::write_hierarchy(&path, &enriched)?,
                None => println!("{}", pipeline::to_json(&enriched, "enriched hierarchy")?),
            }
        }
        Command::Audit {
            hierarchy,
            root,
            rules,
            out,
        } => {
            let config = match rules {
                Some(ref rules) => Config::load_with_rules(&root, rules)?,
                None => Config::load_for_root(&root)?,
            };
            let project = Project::with_config(&root, config)?;
            let nodes = uilink::audit::load_hierarchy(&hierarchy)?;
            let audit = project.audit(&nodes);
            let (report, unmatched) = audit
                .write(&out)
                .context("Failed to write audit artifacts")?;
            info!("Wrote {} and {}", report.display(), unmatched.display());

            for rule in audit.failed_rules() {
                error!(
                    "critical mapping {} failed: {:.2} < {:.2}",
                    rule.pattern, rule.best_confidence, rule.min_confidence
                );
            }
            return Ok(ExitCode::from(pipeline::audit_exit_status(&audit)));
        }
        Command::Init { root, force } => match pipeline::init_config(&root, force)? {
            Some(path) => info!("Created {}", path.display()),
            None => info!("Configuration already exists; pass --force to overwrite"),
        },
    }
    Ok(ExitCode::SUCCESS)
}

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(rust_2018_idioms)]
#![warn(rust_2024_compatibility)]
#![warn(deprecated_safe)]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use env_logger::Env;
use hook_guards::{Config, EXIT_PROCEED, GuardKind, load_config, process_hook_input, validate_config};
use log::{debug, warn};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[clap(author, version, about = "Guards for agent tool use: block, warn, approve or rewrite")]
struct Opts {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one guard (reads the hook JSON from stdin)
    Run {
        #[clap(short, long, value_enum)]
        guard: GuardKind,
        #[clap(short, long, value_parser)]
        config: Option<PathBuf>,
    },
    /// Validate a configuration file and its rule catalog
    Validate {
        #[clap(short, long, value_parser)]
        config: Option<PathBuf>,
    },
    /// List guard kinds and what they can do
    List,
}

impl Commands {
    fn config_path(&self) -> Option<&PathBuf> {
        match self {
            Commands::Run { config, .. } | Commands::Validate { config } => config.as_ref(),
            Commands::List => None,
        }
    }
}

/// Never fails: anything that goes wrong before a decision lets the action
/// proceed.
fn run_hook(guard: GuardKind, config_path: Option<PathBuf>) -> ExitCode {
    let (config, catalog) = match load_config(config_path.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            warn!("{} guard disabled: {:#}", guard, e);
            return exit_code(EXIT_PROCEED);
        }
    };

    let mut raw = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut raw) {
        warn!("Failed to read hook input: {}", e);
        return exit_code(EXIT_PROCEED);
    }

    let result = process_hook_input(&config, &catalog, guard, &raw);
    debug!(
        "{} decided {:?} with {} finding(s)",
        guard,
        result.evaluation.decision.outcome,
        result.evaluation.findings.len()
    );

    if let Err(e) = result.response.write() {
        warn!("Failed to write hook response: {:#}", e);
    }
    exit_code(result.exit_code())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    let summary = validate_config(config_path.as_deref())?;

    println!("Configuration is valid!");
    match &config_path {
        Some(path) => println!("  Config: {}", path.display()),
        None => println!("  Config: built-in defaults"),
    }
    println!("  Rule sets: {}", summary.rule_sets);
    println!("  Rules: {}", summary.rules);
    Ok(())
}

fn list_guards() {
    for kind in GuardKind::ALL {
        let caps = kind.capabilities();
        let mut traits = vec![format!("{:?}", caps.shape).to_lowercase()];
        if caps.blocking {
            traits.push("blocking".to_string());
        }
        if caps.rewrite {
            traits.push("rewrite".to_string());
        }
        println!("{:<18} {:<18} {}", kind.name(), kind.event().name(), traits.join(", "));
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(0))
}

fn main() -> Result<ExitCode> {
    let opts = Opts::parse();

    // Logging follows the config when it loads; `run` reports a broken config
    // itself, `validate` fails on it below.
    let log_level = match opts.command.config_path() {
        Some(path) => Config::load_from_file(path)
            .map(|config| config.logging.log_level)
            .unwrap_or_else(|_| "warn".to_string()),
        None => "warn".to_string(),
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    match opts.command {
        Commands::Run { guard, config } => Ok(run_hook(guard, config)),
        Commands::Validate { config } => {
            validate(config).context("Configuration is invalid")?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::List => {
            list_guards();
            Ok(ExitCode::SUCCESS)
        }
    }
}

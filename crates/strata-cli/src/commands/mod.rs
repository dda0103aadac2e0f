//! CLI command definitions and dispatch.

pub mod check;
pub mod classpath;
pub mod plan;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use strata_common::config::ComposerConfig;
use strata_common::constants::{BIN_NAME, DESCRIPTION_EXTENSION};

/// strata — Layered compilation-unit composer.
#[derive(Parser, Debug)]
#[command(name = BIN_NAME, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// JSON composer configuration file.
    #[arg(long, global = true, env = "STRATA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate, evaluate and compose a description; print its fingerprint.
    Check(check::CheckArgs),
    /// Print composed classpaths.
    Classpath(classpath::ClasspathArgs),
    /// Show evaluation order, fired barriers and scope resolution order.
    Plan(plan::PlanArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded or the command
/// fails.
pub fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Check(args) => check::execute(args, config),
        Command::Classpath(args) => classpath::execute(args, config),
        Command::Plan(args) => plan::execute(args, config),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ComposerConfig> {
    let Some(path) = path else {
        return Ok(ComposerConfig::default());
    };
    tracing::debug!(path = %path.display(), "loading composer config");
    ComposerConfig::load(path).map_err(|e| anyhow::anyhow!("{e}"))
}

/// Fails early for a missing description and warns about an unusual name.
fn check_description_path(file: &Path) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("file not found: {}", file.display());
    }
    if !file.to_string_lossy().ends_with(DESCRIPTION_EXTENSION) {
        tracing::warn!(
            path = %file.display(),
            "description file does not end in {DESCRIPTION_EXTENSION}"
        );
    }
    Ok(())
}

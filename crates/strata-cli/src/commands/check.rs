//! `strata check` — Validate, evaluate and compose a description.

use std::path::PathBuf;

use clap::Args;
use strata_common::config::ComposerConfig;
use strata_common::constants::DEFAULT_DESCRIPTION_FILE;
use strata_common::types::Role;
use strata_sdk::resolver::ClasspathResolver;

/// Arguments for the `check` command.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to the .strata description.
    #[arg(default_value = DEFAULT_DESCRIPTION_FILE)]
    pub file: PathBuf,
}

/// Executes the `check` command.
///
/// Runs the full pipeline and prints a one-line summary with the
/// composition fingerprint. Any failure is fatal.
///
/// # Errors
///
/// Returns the first parse, validation, evaluation or integrity error.
pub fn execute(args: CheckArgs, config: ComposerConfig) -> anyhow::Result<()> {
    super::check_description_path(&args.file)?;

    let mut resolver = ClasspathResolver::new(config);
    let composition = resolver
        .load_file(&args.file)
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    let projects = composition.evaluation_order.len();
    let units = composition.classpaths.len() / Role::ALL.len();
    let fingerprint = resolver.fingerprint().map_err(|e| anyhow::anyhow!("{e}"))?;

    println!(
        "{}: {projects} project(s), {units} unit(s) composed",
        args.file.display()
    );
    println!("fingerprint: {fingerprint}");
    Ok(())
}

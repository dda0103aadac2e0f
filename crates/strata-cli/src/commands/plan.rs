//! `strata plan` — Show how a description is evaluated and resolved.

use std::path::PathBuf;

use clap::Args;
use strata_common::config::ComposerConfig;
use strata_common::constants::DEFAULT_DESCRIPTION_FILE;
use strata_compose::loader;

use crate::output;

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Path to the .strata description.
    #[arg(default_value = DEFAULT_DESCRIPTION_FILE)]
    pub file: PathBuf,

    /// Also list every scope in resolution order.
    #[arg(long)]
    pub scopes: bool,
}

/// Executes the `plan` command.
///
/// Loads and evaluates the description, then displays the order in which
/// projects were evaluated and barriers fired.
///
/// # Errors
///
/// Returns an error if loading or evaluation fails.
pub fn execute(args: PlanArgs, config: ComposerConfig) -> anyhow::Result<()> {
    super::check_description_path(&args.file)?;

    let mut workspace = loader::load_file(&args.file, config).map_err(|e| anyhow::anyhow!("{e}"))?;
    workspace.evaluate().map_err(|e| anyhow::anyhow!("{e}"))?;

    print!(
        "{}",
        output::banner(&format!("Evaluation plan for: {}", args.file.display()))
    );
    print!(
        "{}",
        output::format_numbered("Projects", workspace.evaluation_order())
    );
    print!(
        "{}",
        output::format_numbered("Barriers", workspace.fired_barriers())
    );

    if args.scopes {
        let order = workspace.scope_order().map_err(|e| anyhow::anyhow!("{e}"))?;
        print!("{}", output::format_numbered("Scopes", &order));
    }

    println!();
    println!(
        "  {} project(s) evaluated.",
        workspace.evaluation_order().len()
    );
    Ok(())
}

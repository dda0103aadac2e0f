//! `strata classpath` — Print composed classpaths.

use std::path::PathBuf;

use clap::Args;
use strata_common::config::ComposerConfig;
use strata_common::constants::DEFAULT_DESCRIPTION_FILE;
use strata_common::types::Role;
use strata_sdk::resolver::ClasspathResolver;

use crate::output;

/// Arguments for the `classpath` command.
#[derive(Args, Debug)]
pub struct ClasspathArgs {
    /// Path to the .strata description.
    #[arg(default_value = DEFAULT_DESCRIPTION_FILE)]
    pub file: PathBuf,

    /// Only this unit, as `:path/unit`.
    #[arg(short, long)]
    pub unit: Option<String>,

    /// Only this role (`compile` or `runtime`).
    #[arg(short, long)]
    pub role: Option<Role>,

    /// Print the composition report as JSON.
    #[arg(long)]
    pub json: bool,
}

/// Executes the `classpath` command.
///
/// # Errors
///
/// Returns an error if the description does not compose or the requested
/// unit does not exist.
pub fn execute(args: ClasspathArgs, config: ComposerConfig) -> anyhow::Result<()> {
    super::check_description_path(&args.file)?;

    let mut resolver = ClasspathResolver::new(config);
    let composition = resolver
        .load_file(&args.file)
        .map_err(|e| anyhow::anyhow!("{e}"))?
        .clone();

    if let Some(unit) = &args.unit {
        let roles = args.role.map_or_else(|| Role::ALL.to_vec(), |role| vec![role]);
        for role in roles {
            let entries = resolver
                .classpath(unit, role)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(entries)?);
            } else {
                print!("{}", output::format_classpath(unit, role, entries));
            }
        }
        return Ok(());
    }

    if args.json {
        println!("{}", composition.to_json().map_err(|e| anyhow::anyhow!("{e}"))?);
        return Ok(());
    }

    let selected = composition
        .classpaths
        .iter()
        .filter(|c| args.role.is_none_or(|role| c.role == role));
    for classpath in selected {
        print!(
            "{}",
            output::format_classpath(&classpath.unit.to_string(), classpath.role, &classpath.entries)
        );
    }
    Ok(())
}

use clap::Args;
use std::path::PathBuf;

use crate::cli::formatter::print_success;
use crate::core::config::{default_config, save_config};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Where to write the configuration
    #[arg(short, long, value_name = "FILE", default_value = "kmatrix.toml")]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: ConfigArgs) -> anyhow::Result<()> {
    if args.output.exists() && !args.force {
        anyhow::bail!(
            "{} already exists, pass --force to overwrite it",
            args.output.display()
        );
    }
    save_config(&args.output, &default_config())?;
    print_success(&format!("Default configuration written to {}", args.output.display()));
    Ok(())
}

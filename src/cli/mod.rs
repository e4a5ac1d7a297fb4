pub mod commands;
pub mod formatter;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kmatrix",
    version,
    about = "Pairwise k-mer similarity matrices for sequencing samples",
    long_about = "kmatrix subsamples a directory of FASTA samples, counts the k-mers of every \
                  sample and, for every ordered pair of samples, counts the reads of one sample \
                  whose typical k-mer is present in the other. The counts are assembled into a \
                  square tab-separated matrix."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Number of concurrent workers (0 = all available)
    #[arg(short = 'j', long, global = true)]
    pub threads: Option<usize>,

    /// Hide progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the pipeline over a directory of samples
    Run(commands::run::RunArgs),

    /// Write the default configuration to a file
    Config(commands::config::ConfigArgs),
}

/// Settings shared by every subcommand
#[derive(Debug, Clone, Copy)]
pub struct GlobalArgs {
    pub threads: Option<usize>,
    pub quiet: bool,
}

impl Cli {
    pub fn globals(&self) -> GlobalArgs {
        GlobalArgs {
            threads: self.threads,
            quiet: self.quiet,
        }
    }

    /// Default log filter for the requested verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

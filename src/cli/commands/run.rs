use clap::Args;
use std::path::PathBuf;

use crate::cli::formatter::{print_run_summary, print_tip, print_warning};
use crate::cli::GlobalArgs;
use crate::core::config::{default_config, load_config, Config, EngineKind};
use crate::pipeline::Pipeline;
use crate::stats::TieBreak;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Directory holding one FASTA file per sample
    #[arg(short, long, value_name = "DIR")]
    pub input: PathBuf,

    /// Output directory; existing results in it are reused
    #[arg(short, long, value_name = "DIR")]
    pub output: PathBuf,

    /// Configuration file (TOML)
    #[arg(short = 'c', long, env = "KMATRIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// k-mer length
    #[arg(short = 'k', long)]
    pub kmer: Option<usize>,

    /// Compare at most this many samples, chosen at random
    #[arg(long)]
    pub max_samples: Option<usize>,

    /// Subsample samples with at least this many sequences down to it
    #[arg(long)]
    pub max_sequences: Option<usize>,

    /// Minimum mode count for a read to be tallied
    #[arg(short = 'm', long)]
    pub mode_min: Option<u64>,

    /// Tie-break rule for multi-modal reads: smallest, largest, first-seen
    #[arg(long)]
    pub tie_break: Option<TieBreak>,

    /// Counting engine: jellyfish or native
    #[arg(short = 'e', long)]
    pub engine: Option<EngineKind>,

    /// Path to the jellyfish binary
    #[arg(long, value_name = "PATH")]
    pub jellyfish: Option<String>,

    /// Initial hash size handed to the engine (e.g. 100M)
    #[arg(long)]
    pub hash_size: Option<String>,

    /// Threads used by the engine for each index build
    #[arg(long)]
    pub engine_threads: Option<usize>,

    /// Seed for sample selection and subsampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Restrict the run to these samples (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub samples: Vec<String>,
}

impl RunArgs {
    /// Layer command line overrides over the file configuration
    pub fn resolve_config(&self, globals: &GlobalArgs) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => default_config(),
        };

        if let Some(k) = self.kmer {
            config.kmer.length = k;
        }
        if let Some(max) = self.max_samples {
            config.selection.max_samples = Some(max);
        }
        if let Some(max) = self.max_sequences {
            config.selection.max_sequences = max;
        }
        if let Some(seed) = self.seed {
            config.selection.seed = Some(seed);
        }
        if !self.samples.is_empty() {
            config.selection.samples = self.samples.clone();
        }
        if let Some(mode_min) = self.mode_min {
            config.comparison.mode_min = mode_min;
        }
        if let Some(tie_break) = self.tie_break {
            config.comparison.tie_break = tie_break;
        }
        if let Some(kind) = self.engine {
            config.engine.kind = kind;
        }
        if let Some(binary) = &self.jellyfish {
            config.engine.binary = binary.clone();
        }
        if let Some(hash_size) = &self.hash_size {
            config.engine.hash_size = hash_size.clone();
        }
        if let Some(threads) = self.engine_threads {
            config.engine.threads = threads;
        }
        if let Some(workers) = globals.threads {
            config.performance.workers = workers;
        }

        Ok(config)
    }
}

pub fn run(args: RunArgs, globals: GlobalArgs) -> anyhow::Result<()> {
    let config = args.resolve_config(&globals)?;
    tracing::debug!("Using {} workers", config.workers());
    if config.engine.kind == EngineKind::Native && config.selection.max_sequences > 100_000 {
        print_warning("the native engine keeps whole indexes in memory; prefer jellyfish for large samples");
    }

    let pipeline = Pipeline::new(config, &args.input, &args.output)?.with_progress(!globals.quiet);
    let summary = pipeline.run()?;

    if !globals.quiet {
        print_run_summary(&summary);
        if summary.stages.iter().all(|s| s.computed == 0) {
            print_tip("every stage was already complete; remove files under the output directory to recompute them");
        }
    }
    Ok(())
}

pub mod compare;
pub mod extract;
pub mod index;
pub mod matrix;
pub mod select;

pub use compare::{directional_pairs, CountConsumer, Pair, PairwiseComparator};
pub use extract::KmerExtractor;
pub use index::IndexBuilder;
pub use matrix::{MatrixAssembler, SimilarityMatrix};
pub use select::{Sample, SampleSelector, SubsetStatus};

use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::config::Config;
use crate::core::layout::OutputLayout;
use crate::tools::{engine_from_config, IndexParams, KmerEngine};
use crate::utils::atomic::write_atomic;
use crate::utils::parallel::build_thread_pool;
use crate::utils::progress::create_progress_bar;
use crate::{KmatrixError, Result};

/// Work done by one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: String,
    pub computed: usize,
    pub skipped: usize,
}

impl StageReport {
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            computed: 0,
            skipped: 0,
        }
    }

    pub fn record(&mut self, computed: bool) {
        if computed {
            self.computed += 1;
        } else {
            self.skipped += 1;
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub engine: String,
    pub kmer_length: usize,
    pub samples: Vec<Sample>,
    pub stages: Vec<StageReport>,
    pub matrix_path: PathBuf,
    pub elapsed_secs: f64,
}

impl RunSummary {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == name)
    }
}

/// select, extract, index, compare and matrix over one input directory.
/// Samples or pairs within a stage run on the run's own pool.
pub struct Pipeline {
    config: Config,
    input_dir: PathBuf,
    layout: OutputLayout,
    engine: Box<dyn KmerEngine>,
    show_progress: bool,
}

impl Pipeline {
    /// Validate the configuration and prepare the output directory
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(config: Config, input_dir: P, output_dir: Q) -> Result<Self> {
        config.validate()?;
        let input_dir = input_dir.as_ref().to_path_buf();
        if !input_dir.is_dir() {
            return Err(KmatrixError::Config(format!(
                "Input directory not found: {}",
                input_dir.display()
            )));
        }

        let layout = OutputLayout::new(output_dir.as_ref());
        layout.create()?;
        let engine = engine_from_config(&config.engine);

        Ok(Self {
            config,
            input_dir,
            layout,
            engine,
            show_progress: true,
        })
    }

    /// Replace the configured engine
    pub fn with_engine(mut self, engine: Box<dyn KmerEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn run(&self) -> Result<RunSummary> {
        let start = Instant::now();
        self.engine.verify_installation()?;
        let pool = build_thread_pool(self.config.performance.workers)?;
        tracing::info!(
            "Running with {} workers, engine {}, k={}",
            pool.current_num_threads(),
            self.engine.name(),
            self.config.kmer.length
        );

        let (samples, stages) = pool.install(|| self.run_stages())?;

        let summary = RunSummary {
            engine: self.engine.name().to_string(),
            kmer_length: self.config.kmer.length,
            samples,
            stages,
            matrix_path: self.layout.matrix_file(),
            elapsed_secs: start.elapsed().as_secs_f64(),
        };
        write_atomic(&self.layout.run_summary(), |w| {
            serde_json::to_writer_pretty(&mut *w, &summary)?;
            writeln!(w)?;
            Ok(())
        })?;
        Ok(summary)
    }

    fn run_stages(&self) -> Result<(Vec<Sample>, Vec<StageReport>)> {
        let mut stages = Vec::with_capacity(5);

        let progress = create_progress_bar(0, "select", self.show_progress);
        let selector = SampleSelector::new(&self.config.selection, &self.layout);
        let (samples, report) = selector.run(&self.input_dir, &progress)?;
        progress.finish_and_clear();
        self.log_stage(&report);
        stages.push(report);

        let progress = create_progress_bar(0, "extract", self.show_progress);
        let report = KmerExtractor::new(self.config.kmer.length, &self.layout).run(&samples, &progress)?;
        progress.finish_and_clear();
        self.log_stage(&report);
        stages.push(report);

        let params = IndexParams {
            kmer_length: self.config.kmer.length,
            hash_size: self.config.engine.hash_size.clone(),
            threads: self.config.engine.threads,
        };
        let progress = create_progress_bar(0, "index", self.show_progress);
        let report = IndexBuilder::new(self.engine.as_ref(), params, &self.layout).run(&samples, &progress)?;
        progress.finish_and_clear();
        self.log_stage(&report);
        stages.push(report);

        let progress = create_progress_bar(0, "compare", self.show_progress);
        let comparator = PairwiseComparator::new(&self.config.comparison, self.engine.as_ref(), &self.layout);
        let (_, report) = comparator.run(&samples, &progress)?;
        progress.finish_and_clear();
        self.log_stage(&report);
        stages.push(report);

        let names: Vec<String> = samples.iter().map(|s| s.name.clone()).collect();
        let (_, computed) = MatrixAssembler::new(&self.layout).run(&names)?;
        let mut report = StageReport::new("matrix");
        report.record(computed);
        self.log_stage(&report);
        stages.push(report);

        Ok((samples, stages))
    }

    fn log_stage(&self, report: &StageReport) {
        tracing::info!(
            "Stage {}: {} computed, {} skipped",
            report.stage,
            report.computed,
            report.skipped
        );
    }
}

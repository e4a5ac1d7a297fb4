/// Per-sample k-mer count indexes

use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::core::layout::OutputLayout;
use crate::pipeline::select::Sample;
use crate::pipeline::StageReport;
use crate::tools::{IndexParams, KmerEngine};
use crate::utils::atomic::{is_committed, pending_path};
use crate::Result;

pub struct IndexBuilder<'a> {
    engine: &'a dyn KmerEngine,
    params: IndexParams,
    layout: &'a OutputLayout,
}

impl<'a> IndexBuilder<'a> {
    pub fn new(engine: &'a dyn KmerEngine, params: IndexParams, layout: &'a OutputLayout) -> Self {
        Self {
            engine,
            params,
            layout,
        }
    }

    pub fn run(&self, samples: &[Sample], progress: &ProgressBar) -> Result<StageReport> {
        progress.set_length(samples.len() as u64);
        let built = samples
            .par_iter()
            .map(|sample| {
                let built = self.build(sample);
                progress.inc(1);
                built
            })
            .collect::<Result<Vec<_>>>()?;

        let mut report = StageReport::new("index");
        for built in built {
            report.record(built);
        }
        Ok(report)
    }

    /// Build the index of one sample unless it exists; true when built
    pub fn build(&self, sample: &Sample) -> Result<bool> {
        let target = self
            .layout
            .index_file(&sample.name, self.engine.index_extension());
        if is_committed(&target) {
            tracing::info!("{}: index already exists, skipping", sample.name);
            return Ok(false);
        }

        let pending = pending_path(&target)?;
        self.engine
            .build_index(&sample.subset, &pending, &self.params)?;
        pending.persist(&target)?;
        tracing::info!("{}: built {} index", sample.name, self.engine.name());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::select::SubsetStatus;
    use crate::tools::{NativeEngine, NativeIndex};
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct FailingEngine;

    impl KmerEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }
        fn index_extension(&self) -> &str {
            "idx"
        }
        fn verify_installation(&self) -> Result<()> {
            Ok(())
        }
        fn build_index(&self, _fasta: &Path, index: &Path, _params: &IndexParams) -> Result<()> {
            fs::write(index, b"partial")?;
            Err(crate::KmatrixError::Engine("out of memory".to_string()))
        }
        fn query(&self, _kmers: &Path, _index: &Path, _output: &Path) -> Result<()> {
            unreachable!()
        }
    }

    #[derive(Default)]
    struct CountingEngine {
        builds: AtomicUsize,
    }

    impl KmerEngine for CountingEngine {
        fn name(&self) -> &str {
            "counting"
        }
        fn index_extension(&self) -> &str {
            "idx"
        }
        fn verify_installation(&self) -> Result<()> {
            Ok(())
        }
        fn build_index(&self, _fasta: &Path, index: &Path, _params: &IndexParams) -> Result<()> {
            self.builds.fetch_add(1, Ordering::SeqCst);
            fs::write(index, b"idx")?;
            Ok(())
        }
        fn query(&self, _kmers: &Path, _index: &Path, _output: &Path) -> Result<()> {
            unreachable!()
        }
    }

    fn params() -> IndexParams {
        IndexParams {
            kmer_length: 3,
            hash_size: "1M".to_string(),
            threads: 1,
        }
    }

    fn sample(dir: &Path) -> Sample {
        let subset = dir.join("A.fasta");
        fs::write(&subset, ">r1\nACGTACG\n").unwrap();
        Sample {
            name: "A".to_string(),
            source: subset.clone(),
            subset,
            status: SubsetStatus::Copied { sequences: 1 },
        }
    }

    #[test]
    fn test_native_index_is_written_under_index_dir() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        let engine = NativeEngine::new();
        let builder = IndexBuilder::new(&engine, params(), &layout);

        assert!(builder.build(&sample(dir.path())).unwrap());
        let index = NativeIndex::load(&layout.index_file("A", "kidx")).unwrap();
        assert_eq!(index.count(b"ACG"), 2);
    }

    #[test]
    fn test_failed_build_leaves_no_index() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        let builder = IndexBuilder::new(&FailingEngine, params(), &layout);

        assert!(builder.build(&sample(dir.path())).is_err());
        assert!(!layout.index_file("A", "idx").exists());
        assert_eq!(fs::read_dir(layout.index_dir()).unwrap().count(), 0);
    }

    #[test]
    fn test_existing_index_is_not_rebuilt() {
        let dir = TempDir::new().unwrap();
        let layout = OutputLayout::new(dir.path().join("out"));
        let engine = CountingEngine::default();
        let builder = IndexBuilder::new(&engine, params(), &layout);
        let s = sample(dir.path());

        assert!(builder.build(&s).unwrap());
        assert!(!builder.build(&s).unwrap());
        assert_eq!(engine.builds.load(Ordering::SeqCst), 1);
    }
}

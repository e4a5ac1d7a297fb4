use indicatif::ProgressBar;
use rayon::prelude::*;

use crate::bio::fasta::open_fasta;
use crate::bio::kmer::{write_location, KmerWriter, LocationEntry};
use crate::core::layout::OutputLayout;
use crate::pipeline::select::Sample;
use crate::pipeline::StageReport;
use crate::utils::atomic::{is_committed, AtomicFile};
use crate::Result;
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub sequences: usize,
    pub kmers: u64,
}

pub struct KmerExtractor<'a> {
    kmer_length: usize,
    layout: &'a OutputLayout,
}

impl<'a> KmerExtractor<'a> {
    pub fn new(kmer_length: usize, layout: &'a OutputLayout) -> Self {
        Self {
            kmer_length,
            layout,
        }
    }

    pub fn run(&self, samples: &[Sample], progress: &ProgressBar) -> Result<StageReport> {
        progress.set_length(samples.len() as u64);
        let outcomes = samples
            .par_iter()
            .map(|sample| {
                let outcome = self.extract(sample);
                progress.inc(1);
                outcome
            })
            .collect::<Result<Vec<_>>>()?;

        let mut report = StageReport::new("extract");
        for outcome in outcomes {
            report.record(outcome.is_some());
        }
        Ok(report)
    }

    /// Extract one sample; `None` when both outputs were already present
    pub fn extract(&self, sample: &Sample) -> Result<Option<ExtractionStats>> {
        let kmer_path = self.layout.kmer_file(&sample.name);
        let location_path = self.layout.location_file(&sample.name);
        if is_committed(&kmer_path) && is_committed(&location_path) {
            tracing::info!("{}: k-mer files already exist, skipping", sample.name);
            return Ok(None);
        }

        let stats = self
            .write_outputs(sample, &kmer_path, &location_path)
            .map_err(|e| {
                e.in_stage(
                    "extract",
                    format!("sample {} ({})", sample.name, sample.subset.display()),
                )
            })?;

        tracing::info!(
            "{}: {} k-mers from {} sequences",
            sample.name,
            stats.kmers,
            stats.sequences
        );
        Ok(Some(stats))
    }

    fn write_outputs(&self, sample: &Sample, kmer_path: &Path, location_path: &Path) -> Result<ExtractionStats> {
        let mut kmer_file = AtomicFile::create(kmer_path)?;
        let mut location_file = AtomicFile::create(location_path)?;
        let mut stats = ExtractionStats::default();
        {
            let mut writer = KmerWriter::new(kmer_file.writer());
            for record in open_fasta(&sample.subset)? {
                let record = record?;
                let kmer_count = writer.write_sequence(&record.sequence, self.kmer_length)?;
                write_location(
                    location_file.writer(),
                    &LocationEntry {
                        sequence_id: record.id,
                        kmer_count,
                    },
                )?;
                stats.sequences += 1;
            }
            stats.kmers = writer.records_written();
        }
        location_file.commit()?;
        kmer_file.commit()?;
        Ok(stats)
    }
}

use indicatif::ProgressBar;
use rayon::prelude::*;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};

use crate::bio::kmer::{read_locations, LocationEntry};
use crate::core::config::ComparisonConfig;
use crate::core::layout::OutputLayout;
use crate::pipeline::select::Sample;
use crate::pipeline::StageReport;
use crate::stats::ReadMode;
use crate::tools::KmerEngine;
use crate::utils::atomic::{is_committed, is_committed_nonempty, pending_path, write_atomic, AtomicFile};
use crate::{KmatrixError, Result};

/// One directional comparison: `query` reads looked up in `index`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Pair {
    pub query: String,
    pub index: String,
}

/// Every ordered pair of names, self-pairs included
pub fn directional_pairs(names: &[String]) -> Vec<Pair> {
    let mut pairs = Vec::with_capacity(names.len() * names.len());
    for index in names {
        for query in names {
            pairs.push(Pair {
                query: query.clone(),
                index: index.clone(),
            });
        }
    }
    pairs
}

/// Count field of a `KMER COUNT` result line
pub fn parse_count_line(line: &str) -> Option<u64> {
    line.split_whitespace().last()?.parse().ok()
}

/// Hands out engine result lines in fixed-size groups, strictly in order
pub struct CountConsumer<I> {
    lines: I,
    consumed: usize,
}

impl<I> CountConsumer<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    pub fn new(lines: I) -> Self {
        Self { lines, consumed: 0 }
    }

    /// Consume the next `n` lines, returning the counts that parsed.
    /// Lines that do not parse still use up their position.
    pub fn take(&mut self, n: usize) -> Result<Vec<u64>> {
        let mut counts = Vec::with_capacity(n);
        for _ in 0..n {
            let line = self.lines.next().ok_or_else(|| {
                KmatrixError::Engine(format!(
                    "result stream ended after {} lines, expected more",
                    self.consumed
                ))
            })??;
            self.consumed += 1;
            match parse_count_line(&line) {
                Some(count) => counts.push(count),
                None => tracing::debug!("Dropping malformed result line {:?}", line),
            }
        }
        Ok(counts)
    }

    /// Number of non-blank lines left unconsumed
    pub fn remaining(self) -> Result<usize> {
        let mut extra = 0;
        for line in self.lines {
            if !line?.trim().is_empty() {
                extra += 1;
            }
        }
        Ok(extra)
    }
}

/// Walk `locations` against the count stream, calling `accept` for every
/// read whose mode reaches `mode_min`. Returns the number of accepted reads.
pub fn tally_reads<I, F>(
    locations: &[LocationEntry],
    consumer: &mut CountConsumer<I>,
    config: &ComparisonConfig,
    mut accept: F,
) -> Result<usize>
where
    I: Iterator<Item = io::Result<String>>,
    F: FnMut(&LocationEntry, u64) -> Result<()>,
{
    let mut accepted = 0;
    for entry in locations {
        let counts = consumer.take(entry.kmer_count)?;
        let read = ReadMode::evaluate(&counts, config.mode_min, config.tie_break);
        if read.accepted {
            accept(entry, read.mode)?;
            accepted += 1;
        }
    }
    Ok(accepted)
}

/// Outcome of one pair; `accepted` is `None` when the pair was skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairOutcome {
    pub pair: Pair,
    pub accepted: Option<usize>,
}

/// Looks up each query sample's k-mers in each index sample's counts and
/// tallies the reads whose mode reaches `mode_min`
pub struct PairwiseComparator<'a> {
    config: &'a ComparisonConfig,
    engine: &'a dyn KmerEngine,
    layout: &'a OutputLayout,
}

impl<'a> PairwiseComparator<'a> {
    pub fn new(config: &'a ComparisonConfig, engine: &'a dyn KmerEngine, layout: &'a OutputLayout) -> Self {
        Self {
            config,
            engine,
            layout,
        }
    }

    /// Every sample needs an index, a k-mer file and a location manifest
    pub fn check_preconditions(&self, samples: &[Sample]) -> Result<()> {
        let extension = self.engine.index_extension();
        let indexes = samples
            .iter()
            .filter(|s| is_committed(&self.layout.index_file(&s.name, extension)))
            .count();
        let kmer_files = samples
            .iter()
            .filter(|s| is_committed(&self.layout.kmer_file(&s.name)))
            .count();
        let location_files = samples
            .iter()
            .filter(|s| is_committed(&self.layout.location_file(&s.name)))
            .count();

        if indexes != kmer_files || kmer_files != location_files || indexes != samples.len() {
            return Err(KmatrixError::Precondition {
                stage: "compare".to_string(),
                message: format!(
                    "{} samples but {} indexes, {} k-mer files and {} location files",
                    samples.len(),
                    indexes,
                    kmer_files,
                    location_files
                ),
            });
        }
        Ok(())
    }

    pub fn run(&self, samples: &[Sample], progress: &ProgressBar) -> Result<(Vec<PairOutcome>, StageReport)> {
        self.check_preconditions(samples)?;

        let names: Vec<String> = samples.iter().map(|s| s.name.clone()).collect();
        let pairs = directional_pairs(&names);
        progress.set_length(pairs.len() as u64);

        let outcomes = pairs
            .into_par_iter()
            .map(|pair| -> Result<PairOutcome> {
                let accepted = self.compare(&pair)?;
                progress.inc(1);
                Ok(PairOutcome { pair, accepted })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut report = StageReport::new("compare");
        for outcome in &outcomes {
            report.record(outcome.accepted.is_some());
        }
        Ok((outcomes, report))
    }

    /// Compare one pair unless its summary exists; returns the accepted count
    pub fn compare(&self, pair: &Pair) -> Result<Option<usize>> {
        let summary = self.layout.mode_file(&pair.index, &pair.query);
        if is_committed_nonempty(&summary) {
            tracing::info!(
                "{} vs {}: summary already exists, skipping",
                pair.query,
                pair.index
            );
            return Ok(None);
        }

        let pair_name = format!("{} vs {}", pair.query, pair.index);
        let index = self
            .layout
            .index_file(&pair.index, self.engine.index_extension());
        let scratch = pending_path(&self.layout.read_mode_file(&pair.index, &pair.query))?;
        self.engine
            .query(&self.layout.kmer_file(&pair.query), &index, &scratch)
            .map_err(|e| e.in_stage("compare", &pair_name))?;

        let location_path = self.layout.location_file(&pair.query);
        let locations = read_locations(&location_path).map_err(|e| {
            e.in_stage("compare", format!("{} ({})", pair_name, location_path.display()))
        })?;
        let mut consumer = CountConsumer::new(BufReader::new(File::open(&scratch)?).lines());
        let mut detail = AtomicFile::create(self.layout.read_mode_file(&pair.index, &pair.query))?;
        let accepted = tally_reads(&locations, &mut consumer, self.config, |entry, mode| {
            writeln!(detail.writer(), "{}\t{}", entry.sequence_id, mode)?;
            Ok(())
        })
        .map_err(|e| e.in_stage("compare", &pair_name))?;

        let extra = consumer.remaining()?;
        if extra > 0 {
            tracing::warn!(
                "{} vs {}: ignoring {} result lines beyond the location manifest",
                pair.query,
                pair.index,
                extra
            );
        }

        detail.commit()?;
        write_atomic(&summary, |w| {
            writeln!(w, "{}", accepted)?;
            Ok(())
        })?;

        tracing::info!(
            "{} vs {}: {} of {} reads accepted",
            pair.query,
            pair.index,
            accepted,
            locations.len()
        );
        Ok(Some(accepted))
    }
}

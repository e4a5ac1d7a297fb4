/// Sample selection and subsampling

use indicatif::ProgressBar;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::fs::{self, File};
use std::hash::{Hash, Hasher};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::bio::fasta::{open_fasta, sample_name, write_record};
use crate::core::config::SelectionConfig;
use crate::core::layout::OutputLayout;
use crate::pipeline::StageReport;
use crate::utils::atomic::{is_committed, write_atomic, AtomicFile};
use crate::{KmatrixError, Result};

/// What the selection stage did with a sample's subset file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubsetStatus {
    /// Subset file was already present; nothing was read
    Existing,
    /// Below the sequence budget, copied unchanged
    Copied { sequences: usize },
    /// At or above the budget, reduced to `kept` records
    Subsampled { sequences: usize, kept: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Sample {
    pub name: String,
    pub source: PathBuf,
    pub subset: PathBuf,
    pub status: SubsetStatus,
}

impl Sample {
    pub fn is_subsampled(&self) -> bool {
        matches!(self.status, SubsetStatus::Subsampled { .. })
    }
}

/// A sample file found in the input directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub path: PathBuf,
}

/// List FASTA sample files of `input_dir`, sorted by sample name
pub fn discover_samples(input_dir: &Path) -> Result<Vec<Candidate>> {
    if !input_dir.is_dir() {
        return Err(KmatrixError::Config(format!(
            "Input directory not found: {}",
            input_dir.display()
        )));
    }

    let mut candidates = Vec::new();
    for entry in fs::read_dir(input_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let file_name = entry.file_name().to_string_lossy().to_string();
        if let Some(name) = sample_name(&file_name) {
            candidates.push(Candidate {
                name: name.to_string(),
                path: entry.path(),
            });
        }
    }
    candidates.sort_by(|a, b| a.name.cmp(&b.name));

    for pair in candidates.windows(2) {
        if pair[0].name == pair[1].name {
            return Err(KmatrixError::Config(format!(
                "Sample name {:?} is used by both {} and {}",
                pair[0].name,
                pair[0].path.display(),
                pair[1].path.display()
            )));
        }
    }
    Ok(candidates)
}

fn read_manifest(path: &Path) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut names = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let name = line.trim();
        if !name.is_empty() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

fn pick_named(candidates: &[Candidate], names: &[String], origin: &str) -> Result<Vec<Candidate>> {
    names
        .iter()
        .map(|name| {
            candidates
                .iter()
                .find(|c| &c.name == name)
                .cloned()
                .ok_or_else(|| {
                    KmatrixError::Config(format!(
                        "Sample {:?} from {} is not in the input directory",
                        name, origin
                    ))
                })
        })
        .collect()
}

/// Per-sample RNG derived from the run seed, independent of scheduling order
fn sample_rng(seed: Option<u64>, name: &str) -> StdRng {
    match seed {
        Some(seed) => {
            let mut hasher = DefaultHasher::new();
            name.hash(&mut hasher);
            StdRng::seed_from_u64(seed ^ hasher.finish())
        }
        None => StdRng::from_entropy(),
    }
}

pub struct SampleSelector<'a> {
    config: &'a SelectionConfig,
    layout: &'a OutputLayout,
}

impl<'a> SampleSelector<'a> {
    pub fn new(config: &'a SelectionConfig, layout: &'a OutputLayout) -> Self {
        Self { config, layout }
    }

    /// Decide which samples take part, reusing a previous run's selection
    pub fn choose(&self, candidates: &[Candidate]) -> Result<Vec<Candidate>> {
        let manifest = self.layout.selection_manifest();
        let mut chosen = if is_committed(&manifest) {
            let names = read_manifest(&manifest)?;
            tracing::info!("Reusing sample selection from {}", manifest.display());
            pick_named(candidates, &names, "the selection manifest")?
        } else {
            let pool = if self.config.samples.is_empty() {
                candidates.to_vec()
            } else {
                pick_named(candidates, &self.config.samples, "the configuration")?
            };

            match self.config.max_samples {
                Some(max) if pool.len() > max => {
                    let mut rng = match self.config.seed {
                        Some(seed) => StdRng::seed_from_u64(seed),
                        None => StdRng::from_entropy(),
                    };
                    tracing::info!("Selecting {} of {} samples at random", max, pool.len());
                    pool.choose_multiple(&mut rng, max).cloned().collect()
                }
                _ => pool,
            }
        };
        chosen.sort_by(|a, b| a.name.cmp(&b.name));
        chosen.dedup_by(|a, b| a.name == b.name);

        if chosen.len() < 2 {
            return Err(KmatrixError::Config(format!(
                "Found {} usable sample(s), a pairwise comparison needs at least 2",
                chosen.len()
            )));
        }

        if !is_committed(&manifest) {
            write_atomic(&manifest, |w| {
                for candidate in &chosen {
                    writeln!(w, "{}", candidate.name)?;
                }
                Ok(())
            })?;
        }
        Ok(chosen)
    }

    /// Choose samples from `input_dir` and write their subsets
    pub fn run(&self, input_dir: &Path, progress: &ProgressBar) -> Result<(Vec<Sample>, StageReport)> {
        let candidates = discover_samples(input_dir)?;
        let chosen = self.choose(&candidates)?;
        progress.set_length(chosen.len() as u64);

        let samples = chosen
            .par_iter()
            .map(|candidate| {
                let sample = self.prepare(candidate);
                progress.inc(1);
                sample
            })
            .collect::<Result<Vec<_>>>()?;

        let mut report = StageReport::new("select");
        for sample in &samples {
            report.record(sample.status != SubsetStatus::Existing);
        }
        Ok((samples, report))
    }

    /// Write the subset file of one sample unless it already exists
    pub fn prepare(&self, candidate: &Candidate) -> Result<Sample> {
        let file_name = candidate
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| KmatrixError::Config(format!("Bad sample path {:?}", candidate.path)))?;
        let subset = self.layout.subset_file(&file_name);

        let status = if is_committed(&subset) {
            tracing::info!("{}: subset already exists, skipping", candidate.name);
            SubsetStatus::Existing
        } else {
            let mut rng = sample_rng(self.config.seed, &candidate.name);
            let status = subsample_file(
                &candidate.path,
                &subset,
                self.config.max_sequences,
                self.config.draw_attempt_factor,
                &mut rng,
            )
            .map_err(|e| {
                e.in_stage(
                    "select",
                    format!("sample {} ({})", candidate.name, candidate.path.display()),
                )
            })?;
            match status {
                SubsetStatus::Subsampled { sequences, kept } => tracing::info!(
                    "{}: subsampled {} -> {} sequences",
                    candidate.name,
                    sequences,
                    kept
                ),
                SubsetStatus::Copied { sequences } => {
                    tracing::info!("{}: copied ({} sequences)", candidate.name, sequences)
                }
                SubsetStatus::Existing => {}
            }
            status
        };

        Ok(Sample {
            name: candidate.name.clone(),
            source: candidate.path.clone(),
            subset,
            status,
        })
    }
}

/// Draw `wanted` distinct indices into `ids`, discarding repeated draws and
/// draws of an id already taken. Fails after `max_draws` draws.
pub fn draw_distinct_ids<'s, R: Rng>(
    ids: &'s [String],
    wanted: usize,
    max_draws: usize,
    rng: &mut R,
) -> Result<HashSet<&'s str>> {
    let distinct = ids.iter().map(String::as_str).collect::<HashSet<_>>().len();
    if distinct < wanted {
        return Err(KmatrixError::Sampling(format!(
            "only {} distinct sequence ids, cannot draw {}",
            distinct, wanted
        )));
    }

    let mut chosen = HashSet::with_capacity(wanted);
    let mut draws = 0;
    while chosen.len() < wanted {
        if draws >= max_draws {
            return Err(KmatrixError::Sampling(format!(
                "gave up after {} draws with {} of {} ids collected",
                draws,
                chosen.len(),
                wanted
            )));
        }
        draws += 1;
        chosen.insert(ids[rng.gen_range(0..ids.len())].as_str());
    }
    Ok(chosen)
}

/// Copy or subsample `source` into `target`
pub fn subsample_file<R: Rng>(
    source: &Path,
    target: &Path,
    max_sequences: usize,
    draw_attempt_factor: usize,
    rng: &mut R,
) -> Result<SubsetStatus> {
    let mut ids = Vec::new();
    for record in open_fasta(source)? {
        ids.push(record?.id);
    }
    let sequences = ids.len();

    if sequences < max_sequences {
        let mut input = File::open(source)?;
        write_atomic(target, |w| {
            io::copy(&mut input, w)?;
            Ok(())
        })?;
        return Ok(SubsetStatus::Copied { sequences });
    }

    let max_draws = max_sequences.saturating_mul(draw_attempt_factor);
    let mut chosen = draw_distinct_ids(&ids, max_sequences, max_draws, rng)?;

    let mut file = AtomicFile::create(target)?;
    let kept = if target.extension().and_then(|s| s.to_str()) == Some("gz") {
        let mut encoder =
            flate2::write::GzEncoder::new(file.writer(), flate2::Compression::default());
        let kept = write_chosen(source, &mut chosen, &mut encoder)?;
        encoder.finish()?;
        kept
    } else {
        write_chosen(source, &mut chosen, file.writer())?
    };
    file.commit()?;

    Ok(SubsetStatus::Subsampled { sequences, kept })
}

/// Stream `source`, writing each chosen id the first time it is seen
fn write_chosen<W: Write>(source: &Path, chosen: &mut HashSet<&str>, writer: &mut W) -> Result<usize> {
    let mut kept = 0;
    for record in open_fasta(source)? {
        let record = record?;
        if chosen.remove(record.id.as_str()) {
            write_record(writer, &record)?;
            kept += 1;
        }
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::fasta::parse_fasta;
    use tempfile::TempDir;

    fn write_sample(dir: &Path, name: &str, reads: usize) -> PathBuf {
        let path = dir.join(name);
        let mut text = String::new();
        for i in 0..reads {
            text.push_str(&format!(">read_{}\nACGTACGTAC\n", i));
        }
        fs::write(&path, text).unwrap();
        path
    }

    #[test]
    fn test_discover_samples_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        write_sample(dir.path(), "B.fa", 1);
        write_sample(dir.path(), "A.fasta", 1);
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("C.fasta")).unwrap();

        let found = discover_samples(dir.path()).unwrap();
        let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_discover_rejects_duplicate_names() {
        let dir = TempDir::new().unwrap();
        write_sample(dir.path(), "A.fasta", 1);
        write_sample(dir.path(), "A.fa", 1);
        assert!(matches!(discover_samples(dir.path()), Err(KmatrixError::Config(_))));
    }

    #[test]
    fn test_below_budget_is_byte_identical_copy() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("A.fasta");
        fs::write(&source, ">r1 desc\nacgt\nAC\n>r2\nGG\n").unwrap();
        let target = dir.path().join("out").join("A.fasta");

        let mut rng = StdRng::seed_from_u64(1);
        let status = subsample_file(&source, &target, 3, 100, &mut rng).unwrap();
        assert_eq!(status, SubsetStatus::Copied { sequences: 2 });
        assert_eq!(fs::read(&source).unwrap(), fs::read(&target).unwrap());
    }

    #[test]
    fn test_at_budget_keeps_exactly_max_distinct_records() {
        let dir = TempDir::new().unwrap();
        let source = write_sample(dir.path(), "A.fasta", 50);
        let target = dir.path().join("out").join("A.fasta");

        let mut rng = StdRng::seed_from_u64(9);
        let status = subsample_file(&source, &target, 10, 100, &mut rng).unwrap();
        assert_eq!(status, SubsetStatus::Subsampled { sequences: 50, kept: 10 });

        let kept = parse_fasta(&target).unwrap();
        assert_eq!(kept.len(), 10);
        let ids: HashSet<&str> = kept.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids.len(), 10);
        let original = parse_fasta(&source).unwrap();
        assert!(kept.iter().all(|s| original.contains(s)));
    }

    #[test]
    fn test_duplicate_ids_written_once() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("A.fasta");
        fs::write(&source, ">x\nAAAA\n>x\nCCCC\n>y\nGGGG\n").unwrap();
        let target = dir.path().join("out").join("A.fasta");

        let mut rng = StdRng::seed_from_u64(3);
        let status = subsample_file(&source, &target, 2, 100, &mut rng).unwrap();
        assert_eq!(status, SubsetStatus::Subsampled { sequences: 3, kept: 2 });
        let kept = parse_fasta(&target).unwrap();
        let ids: Vec<&str> = kept.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }

    #[test]
    fn test_too_few_distinct_ids_fails_fast() {
        let ids: Vec<String> = vec!["a".into(), "a".into(), "b".into()];
        let mut rng = StdRng::seed_from_u64(0);
        let err = draw_distinct_ids(&ids, 3, 1_000, &mut rng).unwrap_err();
        assert!(matches!(err, KmatrixError::Sampling(_)));
    }

    #[test]
    fn test_draw_budget_is_enforced() {
        let ids: Vec<String> = (0..100).map(|i| format!("r{}", i)).collect();
        let mut rng = StdRng::seed_from_u64(0);
        // 100 distinct ids cannot be collected in 10 draws
        let err = draw_distinct_ids(&ids, 100, 10, &mut rng).unwrap_err();
        assert!(err.to_string().contains("gave up after 10 draws"));
    }

    #[test]
    fn test_choose_caps_and_persists_selection() {
        let input = TempDir::new().unwrap();
        for name in ["A", "B", "C", "D", "E"] {
            write_sample(input.path(), &format!("{}.fasta", name), 1);
        }
        let output = TempDir::new().unwrap();
        let layout = OutputLayout::new(output.path());

        let config = SelectionConfig {
            max_samples: Some(3),
            seed: Some(11),
            ..SelectionConfig::default()
        };
        let selector = SampleSelector::new(&config, &layout);
        let candidates = discover_samples(input.path()).unwrap();
        let first = selector.choose(&candidates).unwrap();
        assert_eq!(first.len(), 3);

        // a different seed on re-run still reuses the manifest
        let config2 = SelectionConfig {
            seed: Some(12),
            ..config.clone()
        };
        let second = SampleSelector::new(&config2, &layout).choose(&candidates).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_choose_requires_two_samples() {
        let input = TempDir::new().unwrap();
        write_sample(input.path(), "A.fasta", 1);
        let output = TempDir::new().unwrap();
        let layout = OutputLayout::new(output.path());
        let config = SelectionConfig::default();

        let candidates = discover_samples(input.path()).unwrap();
        let err = SampleSelector::new(&config, &layout).choose(&candidates).unwrap_err();
        assert!(matches!(err, KmatrixError::Config(_)));
        assert!(!layout.selection_manifest().exists());
    }

    #[test]
    fn test_choose_unknown_explicit_sample() {
        let input = TempDir::new().unwrap();
        write_sample(input.path(), "A.fasta", 1);
        write_sample(input.path(), "B.fasta", 1);
        let output = TempDir::new().unwrap();
        let layout = OutputLayout::new(output.path());
        let config = SelectionConfig {
            samples: vec!["A".to_string(), "Z".to_string()],
            ..SelectionConfig::default()
        };

        let candidates = discover_samples(input.path()).unwrap();
        let err = SampleSelector::new(&config, &layout).choose(&candidates).unwrap_err();
        assert!(err.to_string().contains("\"Z\""));
    }

    #[test]
    fn test_prepare_error_names_sample() {
        let input = TempDir::new().unwrap();
        let path = input.path().join("Broken.fasta");
        fs::write(&path, "ACGT\n>r1\nACGT\n").unwrap();
        let output = TempDir::new().unwrap();
        let layout = OutputLayout::new(output.path());
        layout.create().unwrap();

        let config = SelectionConfig::default();
        let err = SampleSelector::new(&config, &layout)
            .prepare(&Candidate {
                name: "Broken".to_string(),
                path,
            })
            .unwrap_err();
        let shown = err.to_string();
        assert!(matches!(err, KmatrixError::Parse(_)));
        assert!(shown.contains("select stage"), "{}", shown);
        assert!(shown.contains("sample Broken"), "{}", shown);
        assert!(shown.contains("line 1"), "{}", shown);
        assert!(!layout.subset_file("Broken.fasta").exists());
    }

    #[test]
    fn test_prepare_skips_existing_subset() {
        let input = TempDir::new().unwrap();
        let path = write_sample(input.path(), "A.fasta", 3);
        let output = TempDir::new().unwrap();
        let layout = OutputLayout::new(output.path());
        layout.create().unwrap();
        fs::write(layout.subset_file("A.fasta"), ">kept\nAC\n").unwrap();

        let config = SelectionConfig::default();
        let selector = SampleSelector::new(&config, &layout);
        let sample = selector
            .prepare(&Candidate {
                name: "A".to_string(),
                path,
            })
            .unwrap();
        assert_eq!(sample.status, SubsetStatus::Existing);
        assert_eq!(
            fs::read_to_string(layout.subset_file("A.fasta")).unwrap(),
            ">kept\nAC\n"
        );
    }
}

/// In-process k-mer counter

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::bio::fasta::{open_fasta, parse_fasta};
use crate::bio::kmer::kmers;
use crate::tools::traits::{IndexParams, KmerEngine};
use crate::{KmatrixError, Result};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NativeIndex {
    pub kmer_length: usize,
    pub counts: HashMap<Vec<u8>, u64>,
}

impl NativeIndex {
    pub fn from_fasta(fasta: &Path, kmer_length: usize) -> Result<Self> {
        let mut counts: HashMap<Vec<u8>, u64> = HashMap::new();
        for record in parse_fasta(fasta)? {
            for kmer in kmers(&record.sequence, kmer_length) {
                *counts.entry(kmer.to_vec()).or_insert(0) += 1;
            }
        }
        Ok(Self {
            kmer_length,
            counts,
        })
    }

    pub fn count(&self, kmer: &[u8]) -> u64 {
        self.counts.get(kmer).copied().unwrap_or(0)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        bincode::deserialize_from(reader).map_err(|e| {
            KmatrixError::Engine(format!("Failed to load index {}: {}", path.display(), e))
        })
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        NativeEngine
    }
}

impl KmerEngine for NativeEngine {
    fn name(&self) -> &str {
        "native"
    }

    fn index_extension(&self) -> &str {
        "kidx"
    }

    fn verify_installation(&self) -> Result<()> {
        Ok(())
    }

    fn build_index(&self, fasta: &Path, index: &Path, params: &IndexParams) -> Result<()> {
        let native = NativeIndex::from_fasta(fasta, params.kmer_length)?;
        tracing::debug!(
            "native index for {:?}: {} distinct {}-mers",
            fasta,
            native.counts.len(),
            params.kmer_length
        );
        native.save(index)
    }

    fn query(&self, kmers: &Path, index: &Path, output: &Path) -> Result<()> {
        let native = NativeIndex::load(index)?;
        let mut writer = BufWriter::new(File::create(output)?);
        for record in open_fasta(kmers)? {
            let record = record?;
            writer.write_all(&record.sequence)?;
            writeln!(writer, " {}", native.count(&record.sequence))?;
        }
        writer.flush()?;
        Ok(())
    }
}

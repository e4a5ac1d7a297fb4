//! k-mer decomposition and the location manifest
//!
//! A sample's k-mer file is a FASTA stream of `>id` / k-mer pairs, ids
//! counting up from 0 across the whole sample. The location manifest
//! records, in read order, how many of those k-mers each read produced so
//! the flat per-k-mer count stream can be regrouped by read.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::KmatrixError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmerRecord<'a> {
    pub id: u64,
    pub kmer: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationEntry {
    pub sequence_id: String,
    pub kmer_count: usize,
}

/// Number of overlapping k-mers in a sequence of length `len`
pub fn kmer_count(len: usize, k: usize) -> usize {
    if k == 0 || len < k {
        0
    } else {
        len + 1 - k
    }
}

/// Overlapping k-mers of `sequence` in left-to-right order
pub fn kmers(sequence: &[u8], k: usize) -> impl Iterator<Item = &[u8]> {
    // windows(0) panics
    let size = k.max(1);
    let take = kmer_count(sequence.len(), k);
    sequence.windows(size).take(take)
}

/// Writes k-mers with sample-wide sequential ids
pub struct KmerWriter<W: Write> {
    writer: W,
    next_id: u64,
}

impl<W: Write> KmerWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, next_id: 0 }
    }

    /// Emit every k-mer of one read; returns how many were written
    pub fn write_sequence(&mut self, sequence: &[u8], k: usize) -> Result<usize, KmatrixError> {
        let mut written = 0;
        for kmer in kmers(sequence, k) {
            let record = KmerRecord {
                id: self.next_id,
                kmer,
            };
            writeln!(self.writer, ">{}", record.id)?;
            self.writer.write_all(record.kmer)?;
            self.writer.write_all(b"\n")?;
            self.next_id += 1;
            written += 1;
        }
        Ok(written)
    }

    pub fn records_written(&self) -> u64 {
        self.next_id
    }
}

pub fn write_location<W: Write>(writer: &mut W, entry: &LocationEntry) -> Result<(), KmatrixError> {
    writeln!(writer, "{}\t{}", entry.sequence_id, entry.kmer_count)?;
    Ok(())
}

fn parse_location_line(line: &str, line_number: usize) -> Result<LocationEntry, KmatrixError> {
    let (id, count) = line.rsplit_once('\t').ok_or_else(|| {
        KmatrixError::Parse(format!("location line {} has no tab separator", line_number))
    })?;
    let kmer_count = count.trim().parse::<usize>().map_err(|_| {
        KmatrixError::Parse(format!(
            "location line {} has an invalid k-mer count: {:?}",
            line_number, count
        ))
    })?;
    Ok(LocationEntry {
        sequence_id: id.to_string(),
        kmer_count,
    })
}

/// Read a location manifest back in order
pub fn read_locations<P: AsRef<Path>>(path: P) -> Result<Vec<LocationEntry>, KmatrixError> {
    let reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        entries.push(parse_location_line(&line, i + 1)?);
    }
    Ok(entries)
}

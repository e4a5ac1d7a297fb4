/// Trait definitions for k-mer counting engines
///
/// The pipeline only needs two things from an engine: build a count index
/// from a FASTA file, and report, for each query k-mer, its count in an
/// index, in query order. Keeping that behind a trait lets the external
/// Jellyfish binary and the in-process counter be swapped freely.
use std::path::Path;

use crate::Result;

/// Parameters handed to the engine when building an index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexParams {
    pub kmer_length: usize,
    /// Initial hash table size, engine syntax (e.g. "100M")
    pub hash_size: String,
    /// Threads the engine may use for one build
    pub threads: usize,
}

/// Common interface for k-mer counting engines
pub trait KmerEngine: Send + Sync {
    /// Get the name of this engine
    fn name(&self) -> &str;

    /// File extension used for index artifacts
    fn index_extension(&self) -> &str;

    /// Verify that the engine can run
    fn verify_installation(&self) -> Result<()>;

    /// Build a count index from `fasta` into `index`
    fn build_index(&self, fasta: &Path, index: &Path, params: &IndexParams) -> Result<()>;

    /// Look up every k-mer of the FASTA file `kmers` in `index`, writing one
    /// `KMER COUNT` line per query to `output`, in query order
    fn query(&self, kmers: &Path, index: &Path, output: &Path) -> Result<()>;
}

pub mod fasta;
pub mod kmer;
pub mod sequence;

pub use kmer::{KmerRecord, LocationEntry};
pub use sequence::Sequence;

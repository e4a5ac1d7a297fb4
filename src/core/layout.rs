use std::fs;
use std::path::{Path, PathBuf};

use crate::Result;

const SUBSET_DIR: &str = "subset";
const KMER_DIR: &str = "kmer";
const INDEX_DIR: &str = "index";
const MODE_DIR: &str = "mode";
const READ_MODE_DIR: &str = "read_mode";
const MATRIX_DIR: &str = "matrix";

pub const KMER_EXTENSION: &str = "kmer";
pub const LOCATION_EXTENSION: &str = "loc";
pub const MATRIX_FILE: &str = "matrix.tab";
pub const SELECTION_MANIFEST: &str = "samples.txt";
pub const RUN_SUMMARY: &str = "run_summary.json";

#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Create the stage directories below the root
    pub fn create(&self) -> Result<()> {
        for dir in [
            self.subset_dir(),
            self.kmer_dir(),
            self.index_dir(),
            self.mode_dir(),
            self.read_mode_dir(),
            self.matrix_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn subset_dir(&self) -> PathBuf {
        self.root.join(SUBSET_DIR)
    }

    pub fn kmer_dir(&self) -> PathBuf {
        self.root.join(KMER_DIR)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.root.join(INDEX_DIR)
    }

    pub fn mode_dir(&self) -> PathBuf {
        self.root.join(MODE_DIR)
    }

    pub fn read_mode_dir(&self) -> PathBuf {
        self.root.join(READ_MODE_DIR)
    }

    pub fn matrix_dir(&self) -> PathBuf {
        self.root.join(MATRIX_DIR)
    }

    pub fn selection_manifest(&self) -> PathBuf {
        self.root.join(SELECTION_MANIFEST)
    }

    pub fn run_summary(&self) -> PathBuf {
        self.root.join(RUN_SUMMARY)
    }

    /// Reduced copy of a sample, keeping the source file name
    pub fn subset_file(&self, file_name: &str) -> PathBuf {
        self.subset_dir().join(file_name)
    }

    pub fn kmer_file(&self, sample: &str) -> PathBuf {
        self.kmer_dir().join(format!("{}.{}", sample, KMER_EXTENSION))
    }

    pub fn location_file(&self, sample: &str) -> PathBuf {
        self.kmer_dir().join(format!("{}.{}", sample, LOCATION_EXTENSION))
    }

    pub fn index_file(&self, sample: &str, extension: &str) -> PathBuf {
        self.index_dir().join(format!("{}.{}", sample, extension))
    }

    /// Summary tally for `query` looked up in the index of `index`
    pub fn mode_file(&self, index: &str, query: &str) -> PathBuf {
        self.mode_dir().join(index).join(query)
    }

    /// Per-read detail for `query` looked up in the index of `index`
    pub fn read_mode_file(&self, index: &str, query: &str) -> PathBuf {
        self.read_mode_dir().join(index).join(query)
    }

    pub fn matrix_file(&self) -> PathBuf {
        self.matrix_dir().join(MATRIX_FILE)
    }
}

//! Shared fixtures for pipeline integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use kmatrix::core::config::{Config, EngineKind};
use kmatrix::Pipeline;

/// Sample A: reads of length 25, 30 and 15
pub const SAMPLE_A: &str = ">a1 first read\n\
GCTAAAGACAATTACATAACATACA\n\
>a2\n\
CGTCAGCACGAAACTTGTTGGCCCAGTGTG\n\
>a3\n\
AATCGCTTAAGGGTT\n";

/// Sample B: a 22-long prefix of A's first read and one read of length 19
pub const SAMPLE_B: &str = ">b1\n\
GCTAAAGACAATTACATAACAT\n\
>b2\n\
AAGTAAGTGTGATGCATAC\n";

pub struct TestEnvironment {
    temp_dir: TempDir,
    pub input: PathBuf,
    pub output: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let input = temp_dir.path().join("samples");
        let output = temp_dir.path().join("results");
        std::fs::create_dir_all(&input).expect("Failed to create input dir");

        TestEnvironment {
            temp_dir,
            input,
            output,
        }
    }

    /// Environment holding samples A and B
    pub fn with_two_samples() -> Self {
        let env = Self::new();
        env.add_sample("A.fasta", SAMPLE_A);
        env.add_sample("B.fasta", SAMPLE_B);
        env
    }

    pub fn add_sample(&self, file_name: &str, contents: &str) -> PathBuf {
        let path = self.input.join(file_name);
        std::fs::write(&path, contents).expect("Failed to write sample");
        path
    }

    /// Output path relative to the results directory
    pub fn out(&self, relative: &str) -> PathBuf {
        self.output.join(relative)
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn pipeline(&self, config: Config) -> Pipeline {
        Pipeline::new(config, &self.input, &self.output)
            .expect("Failed to create pipeline")
            .with_progress(false)
    }
}

/// Configuration using the in-process engine, k = 20
pub fn native_config() -> Config {
    let mut config = Config::default();
    config.engine.kind = EngineKind::Native;
    config.selection.seed = Some(42);
    config.performance.workers = 2;
    config
}

/// Sample with `reads` distinct 24-base reads
pub fn numbered_reads(prefix: &str, reads: usize) -> String {
    let mut text = String::new();
    for i in 0..reads {
        let mut seq = String::new();
        let mut n = i as u64 * 2_654_435_761 + 97;
        for _ in 0..24 {
            seq.push(['A', 'C', 'G', 'T'][(n % 4) as usize]);
            n = n / 4 + 7919 * (i as u64 + 1);
        }
        text.push_str(&format!(">{}_{}\n{}\n", prefix, i, seq));
    }
    text
}

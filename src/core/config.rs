use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::stats::mode::TieBreak;
use crate::KmatrixError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub selection: SelectionConfig,
    pub kmer: KmerConfig,
    pub engine: EngineConfig,
    pub comparison: ComparisonConfig,
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Upper bound on the number of samples taking part (None = all)
    pub max_samples: Option<usize>,
    /// Samples with at least this many records are downsampled to it
    pub max_sequences: usize,
    /// Draw budget for subsampling, as a multiple of `max_sequences`
    pub draw_attempt_factor: usize,
    pub seed: Option<u64>,
    /// Explicit subset of sample names; empty selects from the whole input directory
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KmerConfig {
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Jellyfish,
    Native,
}

impl std::str::FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "jellyfish" | "jf" => Ok(EngineKind::Jellyfish),
            "native" | "builtin" => Ok(EngineKind::Native),
            _ => Err(format!("Unknown engine: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kind: EngineKind,
    /// Path or name of the jellyfish binary
    pub binary: String,
    /// Initial hash table size handed to the engine (e.g. "100M")
    pub hash_size: String,
    /// Threads used by the engine inside a single index build
    pub threads: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparisonConfig {
    /// Reads whose mode count is below this value are not tallied
    pub mode_min: u64,
    pub tie_break: TieBreak,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Concurrent samples or pairs per stage (0 = all cores)
    pub workers: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            max_samples: None,
            max_sequences: 10_000,
            draw_attempt_factor: 100,
            seed: None,
            samples: Vec::new(),
        }
    }
}

impl Default for KmerConfig {
    fn default() -> Self {
        Self { length: 20 }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::Jellyfish,
            binary: "jellyfish".to_string(),
            hash_size: "100M".to_string(),
            threads: 1,
        }
    }
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            mode_min: 1,
            tie_break: TieBreak::Smallest,
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self { workers: 0 }
    }
}

impl Config {
    /// Check value ranges once, before any stage runs
    pub fn validate(&self) -> Result<(), KmatrixError> {
        if self.kmer.length == 0 {
            return Err(KmatrixError::Config("k-mer length must be at least 1".to_string()));
        }
        if self.selection.max_sequences == 0 {
            return Err(KmatrixError::Config("max_sequences must be at least 1".to_string()));
        }
        if self.selection.draw_attempt_factor == 0 {
            return Err(KmatrixError::Config(
                "draw_attempt_factor must be at least 1".to_string(),
            ));
        }
        if let Some(max) = self.selection.max_samples {
            if max < 2 {
                return Err(KmatrixError::Config(format!(
                    "max_samples is {}, a pairwise comparison needs at least 2",
                    max
                )));
            }
        }
        if self.engine.hash_size.trim().is_empty() {
            return Err(KmatrixError::Config("engine hash_size must not be empty".to_string()));
        }
        if self.engine.threads == 0 {
            return Err(KmatrixError::Config("engine threads must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn workers(&self) -> usize {
        crate::utils::parallel::resolve_workers(self.performance.workers)
    }
}

pub fn default_config() -> Config {
    Config::default()
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, KmatrixError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| KmatrixError::Config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<(), KmatrixError> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| KmatrixError::Config(format!("Failed to serialize config: {}", e)))?;
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_valid() {
        let config = default_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.kmer.length, 20);
        assert_eq!(config.comparison.mode_min, 1);
        assert_eq!(config.engine.hash_size, "100M");
    }

    #[test]
    fn test_validate_rejects_small_sample_cap() {
        let mut config = Config::default();
        config.selection.max_samples = Some(1);
        assert!(matches!(config.validate(), Err(KmatrixError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_kmer() {
        let mut config = Config::default();
        config.kmer.length = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kmatrix.toml");

        let mut config = Config::default();
        config.selection.seed = Some(7);
        config.engine.kind = EngineKind::Native;
        config.comparison.tie_break = TieBreak::Largest;

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[kmer]\nlength = 31\n").unwrap();
        assert_eq!(config.kmer.length, 31);
        assert_eq!(config.selection.max_sequences, 10_000);
        assert_eq!(config.engine.kind, EngineKind::Jellyfish);
    }

    #[test]
    fn test_engine_kind_from_str() {
        assert_eq!("Jellyfish".parse::<EngineKind>().unwrap(), EngineKind::Jellyfish);
        assert_eq!("native".parse::<EngineKind>().unwrap(), EngineKind::Native);
        assert!("kmc".parse::<EngineKind>().is_err());
    }
}

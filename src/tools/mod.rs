//! k-mer counting engines used to build and query per-sample indexes

pub mod jellyfish;
pub mod native;
pub mod traits;

pub use jellyfish::{align_query_output, JellyfishEngine};
pub use native::{NativeEngine, NativeIndex};
pub use traits::{IndexParams, KmerEngine};

use crate::core::config::{EngineConfig, EngineKind};

/// Build the engine selected in the configuration
pub fn engine_from_config(config: &EngineConfig) -> Box<dyn KmerEngine> {
    match config.kind {
        EngineKind::Jellyfish => Box::new(JellyfishEngine::new(&config.binary)),
        EngineKind::Native => Box::new(NativeEngine::new()),
    }
}

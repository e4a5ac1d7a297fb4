/// Parallel processing utilities
use crate::{KmatrixError, Result};

/// Resolve a worker count, 0 meaning one per core
pub fn resolve_workers(workers: usize) -> usize {
    if workers == 0 {
        num_cpus::get()
    } else {
        workers
    }
}

/// Build a dedicated pool for one pipeline run
pub fn build_thread_pool(workers: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(resolve_workers(workers))
        .thread_name(|i| format!("kmatrix-worker-{}", i))
        .build()
        .map_err(|e| KmatrixError::Config(format!("Failed to build thread pool: {}", e)))
}

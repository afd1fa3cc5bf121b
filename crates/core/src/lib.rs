//! # egihash-core
//!
//! An Ethash-style memory-hard proof-of-work hashing engine. For a block
//! number and a `(header hash, nonce)` pair the engine produces a 256-bit
//! hash value plus a 256-bit mix digest, evaluated against a very large
//! pseudo-random dataset so that the verifier's working set dominates the
//! runtime cost.
//!
//! # Overview
//!
//! Every [`EPOCH_LENGTH`] blocks form an epoch with its own seed hash,
//! cache (tens of MiB) and dataset (>= 1 GiB). Light clients keep only the
//! cache and recompute dataset elements on demand; full nodes materialize
//! the whole dataset. Both evaluation paths are bit-identical.
//!
//! Caches and datasets are process-wide singletons: repeated requests for
//! the same epoch share one instance, and concurrent requests share one
//! build. Long-running phases report progress through a callback that can
//! cancel the operation at any step.
//!
//! # Example
//!
//! ```no_run
//! use egihash_core::{build_cache, hashimoto_light, keccak256};
//!
//! let block = 0;
//! let cache = build_cache(block, |_, _, _| true)?;
//! let header = keccak256(b"block header");
//! let result = hashimoto_light(block, &cache, &header, 0x42);
//! println!("value = {:x?}", result.value);
//! # Ok::<(), egihash_core::Error>(())
//! ```

mod cache;
mod config;
mod dag;
pub mod dagfile;
mod error;
mod hashimoto;
mod keccak;
mod node;
pub mod params;
mod progress;
mod registry;


pub use cache::{seed_hash, Cache, GENESIS_SEED};
pub use config::{Config, Retention};
pub use dag::{calc_dataset_item, Dag};
pub use error::{Error, Result};
pub use hashimoto::{fnv, hashimoto, HashimotoResult, FNV_PRIME};
pub use keccak::keccak256;
pub use node::Node;
pub use params::{cache_size, epoch, full_size, EPOCH_LENGTH};
pub use progress::Phase;

use std::path::Path;
use std::sync::Arc;

use progress::Reporter;

/// Build the cache for the epoch containing `block_number`, or return the
/// shared instance if it is already resident.
///
/// Concurrent callers for the same epoch share a single build. The callback
/// observes [`Phase::CacheSeeding`] and [`Phase::CacheGeneration`];
/// returning `false` cancels the build and nothing is published.
pub fn build_cache(
    block_number: u64,
    progress: impl FnMut(usize, usize, Phase) -> bool,
) -> Result<Arc<Cache>> {
    build_cache_with(&Config::default(), block_number, progress)
}

/// [`build_cache`] with explicit engine configuration.
pub fn build_cache_with(
    config: &Config,
    block_number: u64,
    mut progress: impl FnMut(usize, usize, Phase) -> bool,
) -> Result<Arc<Cache>> {
    registry::CACHES.get_or_build(
        params::epoch(block_number),
        config.cache_retention,
        || {
            let seed = seed_hash(block_number);
            let mut reporter = Reporter::new(&mut progress, config.progress_frequency);
            Cache::build(block_number, &seed, &mut reporter)
        },
    )
}

/// Materialize the dataset for the epoch containing `block_number`, or
/// return the shared instance if it is already resident.
///
/// The returned handle embeds the epoch's cache singleton. Expect this to
/// run for minutes and allocate over a GiB when the epoch is cold.
pub fn build_dag(
    block_number: u64,
    progress: impl FnMut(usize, usize, Phase) -> bool,
) -> Result<Arc<Dag>> {
    build_dag_with(&Config::default(), block_number, progress)
}

/// [`build_dag`] with explicit engine configuration.
pub fn build_dag_with(
    config: &Config,
    block_number: u64,
    mut progress: impl FnMut(usize, usize, Phase) -> bool,
) -> Result<Arc<Dag>> {
    registry::DAGS.get_or_build(params::epoch(block_number), config.dag_retention, || {
        let cache = build_cache_with(config, block_number, &mut progress)?;
        let mut reporter = Reporter::new(&mut progress, config.progress_frequency);
        Dag::generate(block_number, cache, &mut reporter)
    })
}

/// Load a dataset (and its embedded cache) from a container previously
/// written by [`save_dag`].
///
/// The file's epoch is read from the header; if that epoch is already
/// resident the shared instance is returned and the file body is not read.
pub fn load_dag(
    path: impl AsRef<Path>,
    progress: impl FnMut(usize, usize, Phase) -> bool,
) -> Result<Arc<Dag>> {
    load_dag_with(&Config::default(), path, progress)
}

/// [`load_dag`] with explicit engine configuration.
pub fn load_dag_with(
    config: &Config,
    path: impl AsRef<Path>,
    mut progress: impl FnMut(usize, usize, Phase) -> bool,
) -> Result<Arc<Dag>> {
    let path = path.as_ref();
    let header = dagfile::read_header(path)?;
    registry::DAGS.get_or_build(header.epoch, config.dag_retention, || {
        let mut reporter = Reporter::new(&mut progress, config.progress_frequency);
        let contents = dagfile::load(path, &mut reporter)?;
        let dagfile::DagFileContents { epoch, cache, dag } = contents;
        // The loaded cache only becomes the epoch's cache singleton if none
        // is resident yet; otherwise the resident instance wins.
        let cache = registry::CACHES.get_or_build(epoch, config.cache_retention, || {
            Ok(Cache::from_parts(epoch, cache))
        })?;
        Ok(Dag::from_parts(epoch, cache, dag))
    })
}

/// Write `dag` and its embedded cache to `path`.
///
/// A cancelled or failed save may leave a partial file behind; removing it
/// is the caller's responsibility.
pub fn save_dag(
    dag: &Dag,
    path: impl AsRef<Path>,
    progress: impl FnMut(usize, usize, Phase) -> bool,
) -> Result<()> {
    save_dag_with(&Config::default(), dag, path, progress)
}

/// [`save_dag`] with explicit engine configuration.
pub fn save_dag_with(
    config: &Config,
    dag: &Dag,
    path: impl AsRef<Path>,
    mut progress: impl FnMut(usize, usize, Phase) -> bool,
) -> Result<()> {
    let mut reporter = Reporter::new(&mut progress, config.progress_frequency);
    dagfile::save(dag, path.as_ref(), &mut reporter)
}

/// Light evaluation of one `(header hash, nonce)` pair: every dataset
/// element is derived from the cache on the fly.
pub fn hashimoto_light(
    block_number: u64,
    cache: &Cache,
    header: &[u8; 32],
    nonce: u64,
) -> HashimotoResult {
    hashimoto::hashimoto_light(params::full_size(block_number), cache, header, nonce)
}

/// Full evaluation of one `(header hash, nonce)` pair against a
/// materialized dataset. Bit-identical to [`hashimoto_light`].
pub fn hashimoto_full(dag: &Dag, header: &[u8; 32], nonce: u64) -> HashimotoResult {
    hashimoto::hashimoto_full(dag, header, nonce)
}

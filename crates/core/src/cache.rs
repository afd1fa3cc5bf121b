//! Seed-hash chain and epoch cache construction.
//!
//! The cache is seeded by chaining keccak-512 from the epoch seed, then
//! mixed with `CACHE_ROUNDS` passes of RandMemoHash: each element is XORed
//! with a pseudo-randomly chosen partner and its predecessor, then rehashed.

use tracing::debug;

use crate::error::{Error, Result};
use crate::keccak::{keccak256, keccak512};
use crate::node::Node;
use crate::params::{self, CACHE_ROUNDS, HASH_BYTES, HASH_WORDS};
use crate::progress::{Phase, Reporter};

/// Seed for epoch 0.
pub const GENESIS_SEED: [u8; 32] = [0u8; 32];

/// Seed hash for the epoch containing `block_number`: the genesis seed run
/// through keccak-256 once per elapsed epoch.
pub fn seed_hash(block_number: u64) -> [u8; 32] {
    let mut seed = GENESIS_SEED;
    for _ in 0..params::epoch(block_number) {
        seed = keccak256(&seed);
    }
    seed
}

/// The per-epoch cache: a prime number of 64-byte elements, immutable once
/// built. Light verification derives dataset elements from it on the fly;
/// full nodes expand it into the complete dataset.
#[derive(Debug)]
pub struct Cache {
    epoch: u64,
    data: Vec<Node>,
}

impl Cache {
    /// Build the cache for the epoch containing `block_number`.
    pub(crate) fn build(
        block_number: u64,
        seed: &[u8; 32],
        progress: &mut Reporter<'_>,
    ) -> Result<Self> {
        let epoch = params::epoch(block_number);
        let size = params::cache_size(block_number);
        debug!(epoch, bytes = size, "building cache");
        let cache = Self::generate(epoch, size / HASH_BYTES, seed, progress)?;
        debug!(epoch, "cache ready");
        Ok(cache)
    }

    /// Generation over an explicit element count, shared by [`Cache::build`]
    /// and the small-geometry tests.
    pub(crate) fn generate(
        epoch: u64,
        n: usize,
        seed: &[u8; 32],
        progress: &mut Reporter<'_>,
    ) -> Result<Self> {
        let mut data: Vec<Node> = Vec::new();
        data.try_reserve_exact(n)
            .map_err(|_| Error::OutOfMemory(n * HASH_BYTES))?;

        data.push(Node(keccak512(seed)));
        for i in 1..n {
            let prev = *data[i - 1].as_bytes();
            data.push(Node(keccak512(&prev)));
            progress.step(i, n, Phase::CacheSeeding)?;
        }

        for round in 0..CACHE_ROUNDS {
            for j in 0..n {
                let v = data[j].word(0) as usize % n;
                let mut u = data[(j + n - 1) % n];
                for k in 0..HASH_WORDS {
                    u.set_word(k, u.word(k) ^ data[v].word(k));
                }
                data[j] = Node(keccak512(u.as_bytes()));
                progress.step(round * n + j, CACHE_ROUNDS * n, Phase::CacheGeneration)?;
            }
        }

        Ok(Self { epoch, data })
    }

    /// Reassemble a cache from already-validated parts (file loading).
    pub(crate) fn from_parts(epoch: u64, data: Vec<Node>) -> Self {
        Self { epoch, data }
    }

    /// The epoch this cache belongs to.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Cache size in bytes.
    pub fn size(&self) -> usize {
        self.data.len() * HASH_BYTES
    }

    /// The cache elements.
    pub fn data(&self) -> &[Node] {
        &self.data
    }
}

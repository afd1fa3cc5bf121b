//! The memory-bound mixing loop producing the proof-of-work output.
//!
//! Hashimoto is polymorphic over a dataset-element oracle: light evaluation
//! recomputes each element from the cache, full evaluation indexes a
//! materialized dataset. Both produce bit-identical results.

use crate::cache::Cache;
use crate::dag::{calc_dataset_item, Dag};
use crate::keccak::{keccak256, keccak512};
use crate::node::Node;
use crate::params::{ACCESSES, HASH_BYTES, HASH_WORDS, MIX_HASHES, MIX_WORDS};

/// Prime of the FNV-like word mixer.
pub const FNV_PRIME: u32 = 0x0100_0193;

/// `((a * FNV_PRIME) ^ b) mod 2^32`.
#[inline(always)]
pub fn fnv(a: u32, b: u32) -> u32 {
    a.wrapping_mul(FNV_PRIME) ^ b
}

/// The outcome of one evaluation: the 256-bit hash value compared against
/// the difficulty target, and the 256-bit mix digest committed in headers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashimotoResult {
    pub value: [u8; 32],
    pub mixhash: [u8; 32],
}

/// Evaluate hashimoto for one `(header, nonce)` pair against an arbitrary
/// dataset-element oracle.
pub fn hashimoto(
    header: &[u8; 32],
    nonce: u64,
    full_size: usize,
    mut lookup: impl FnMut(usize) -> Node,
) -> HashimotoResult {
    let n = full_size / HASH_BYTES;

    let mut seed = [0u8; 40];
    seed[..32].copy_from_slice(header);
    seed[32..].copy_from_slice(&nonce.to_le_bytes());
    let s = Node(keccak512(&seed));

    // The mix starts as the seed hash replicated across the buffer.
    let mut mix = [0u32; MIX_WORDS];
    for (i, w) in mix.iter_mut().enumerate() {
        *w = s.word(i % HASH_WORDS);
    }

    for i in 0..ACCESSES {
        let p = (fnv(i as u32 ^ s.word(0), mix[i % MIX_WORDS]) as usize % (n / MIX_HASHES))
            * MIX_HASHES;
        let mut fetched = [0u32; MIX_WORDS];
        for j in 0..MIX_HASHES {
            let element = lookup(p + j);
            for k in 0..HASH_WORDS {
                fetched[j * HASH_WORDS + k] = element.word(k);
            }
        }
        for k in 0..MIX_WORDS {
            mix[k] = fnv(mix[k], fetched[k]);
        }
    }

    // Compress 32 mix words down to the 8-word digest.
    let mut mixhash = [0u8; 32];
    for i in (0..MIX_WORDS).step_by(4) {
        let c = fnv(fnv(fnv(mix[i], mix[i + 1]), mix[i + 2]), mix[i + 3]);
        mixhash[i..i + 4].copy_from_slice(&c.to_le_bytes());
    }

    let mut tail = [0u8; HASH_BYTES + 32];
    tail[..HASH_BYTES].copy_from_slice(s.as_bytes());
    tail[HASH_BYTES..].copy_from_slice(&mixhash);

    HashimotoResult {
        value: keccak256(&tail),
        mixhash,
    }
}

/// Light evaluation: derives every dataset element from the cache.
pub fn hashimoto_light(
    full_size: usize,
    cache: &Cache,
    header: &[u8; 32],
    nonce: u64,
) -> HashimotoResult {
    hashimoto(header, nonce, full_size, |i| calc_dataset_item(cache, i))
}

/// Full evaluation: indexed lookups into a materialized dataset.
pub fn hashimoto_full(dag: &Dag, header: &[u8; 32], nonce: u64) -> HashimotoResult {
    hashimoto(header, nonce, dag.size(), |i| dag.data()[i])
}

//! Keccak adapter.
//!
//! Thin wrappers over the external Keccak-f[1600] primitive. Everything else
//! in this crate treats the hash functions as black boxes producing exact
//! byte outputs.

use sha3::{Digest, Keccak256, Keccak512};

/// Keccak-256 of `input`.
#[inline]
pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Keccak256::digest(input));
    out
}

/// Keccak-512 of `input`.
#[inline]
pub fn keccak512(input: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Keccak512::digest(input));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn known_digests() {
        assert_eq!(
            keccak256(b""),
            hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470")
        );
        assert_eq!(
            &keccak512(b"")[..16],
            &hex!("0eab42de4c3ceb9235fc91acffe746b2")[..]
        );
    }
}

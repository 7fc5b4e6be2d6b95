//! The keyed hash family shared by the IBLT and the Bloom filter.
//!
//! A single MurmurHash3 (x86, 32-bit) variant, keyed by `seed`, backs both
//! structures. Seeds `0..N_HASH` are reserved for IBLT bucket assignment,
//! `SEED_CHECK` for the IBLT's pure-cell check hash, and `bloom::SALT_BASE
//! + i` for Bloom filter index `i`. No other caller may reuse these seeds.

/// Number of hash functions an IBLT uses to place a key.
pub const N_HASH: u32 = 3;

/// Seed reserved for the IBLT "is this cell pure" check hash.
pub const SEED_CHECK: u32 = 11;

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// MurmurHash3 x86_32, keyed by `seed`.
pub fn murmur3_32(seed: u32, data: &[u8]) -> u32 {
    let mut h1 = seed;
    let nblocks = data.len() / 4;

    for block in data[..nblocks * 4].chunks_exact(4) {
        let mut k1 = u32::from_le_bytes(block.try_into().expect("chunk of 4 bytes"));
        k1 = k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h1 ^= k1;
        h1 = h1.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = &data[nblocks * 4..];
    let mut k1: u32 = 0;
    for (i, byte) in tail.iter().enumerate().rev() {
        k1 ^= (*byte as u32) << (8 * i);
    }
    if !tail.is_empty() {
        k1 = k1.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2);
        h1 ^= k1;
    }

    h1 ^= data.len() as u32;
    h1 ^= h1 >> 16;
    h1 = h1.wrapping_mul(0x85eb_ca6b);
    h1 ^= h1 >> 13;
    h1 = h1.wrapping_mul(0xc2b2_ae35);
    h1 ^= h1 >> 16;
    h1
}

/// The hash of a 32-bit IBLT key, little-endian encoded, via `SEED_CHECK`.
pub fn check_hash(key: u32) -> u32 {
    murmur3_32(SEED_CHECK, &key.to_le_bytes())
}

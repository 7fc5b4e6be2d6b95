//! Wire encoding: the size-prefix varnum used to make a binary
//! name component self-delimiting, and the IBLT/Bloom table byte layouts
//! built on top of it. Centralized here per the design notes rather
//! than inlined at each call site.

use crate::bloom::BloomFilter;
use crate::error::CodecError;
use crate::iblt::{HashCell, Iblt};

const BYTES_PER_CELL: usize = 12;

/// Write a nonnegative-integer size prefix: one byte if `< 253`, else a
/// marker byte (`253`/`254`/`255`) followed by a big-endian `u16`/`u32`/
/// `u64`.
pub fn write_varnum(n: u64, out: &mut Vec<u8>) {
    if n < 253 {
        out.push(n as u8);
    } else if n <= u16::MAX as u64 {
        out.push(253);
        out.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= u32::MAX as u64 {
        out.push(254);
        out.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        out.push(255);
        out.extend_from_slice(&n.to_be_bytes());
    }
}

/// Read a varnum from the front of `bytes`, returning the value and the
/// number of bytes it occupied.
pub fn read_varnum(bytes: &[u8]) -> Result<(u64, usize), CodecError> {
    let marker = *bytes.first().ok_or(CodecError::TruncatedVarNum)?;
    match marker {
        0..=252 => Ok((marker as u64, 1)),
        253 => {
            let field = bytes.get(1..3).ok_or(CodecError::TruncatedVarNum)?;
            Ok((u16::from_be_bytes(field.try_into().unwrap()) as u64, 3))
        }
        254 => {
            let field = bytes.get(1..5).ok_or(CodecError::TruncatedVarNum)?;
            Ok((u32::from_be_bytes(field.try_into().unwrap()) as u64, 5))
        }
        255 => {
            let field = bytes.get(1..9).ok_or(CodecError::TruncatedVarNum)?;
            Ok((u64::from_be_bytes(field.try_into().unwrap()), 9))
        }
    }
}

/// Encode an IBLT as a varnum-prefixed, self-delimiting byte string: for
/// each cell, `count` (two's-complement `i32`), `keySum`, `keyCheck`, each
/// little-endian.
pub fn encode_iblt(iblt: &Iblt) -> Vec<u8> {
    let payload_len = iblt.len() * BYTES_PER_CELL;
    let mut out = Vec::with_capacity(payload_len + 9);
    write_varnum(payload_len as u64, &mut out);
    for cell in iblt.cells() {
        out.extend_from_slice(&cell.count.to_le_bytes());
        out.extend_from_slice(&cell.key_sum.to_le_bytes());
        out.extend_from_slice(&cell.key_check.to_le_bytes());
    }
    out
}

/// Decode a varnum-prefixed IBLT byte string produced by [`encode_iblt`].
/// The corrected loop form from the design notes: index by `4*i`,
/// not `i/4`.
pub fn decode_iblt(bytes: &[u8]) -> Result<Iblt, CodecError> {
    let (len, header) = read_varnum(bytes)?;
    let payload = bytes
        .get(header..header + len as usize)
        .ok_or(CodecError::TrailingBytes)?;
    if header + len as usize != bytes.len() {
        return Err(CodecError::TrailingBytes);
    }
    if payload.len() % BYTES_PER_CELL != 0 {
        return Err(CodecError::TrailingBytes);
    }
    let num_cells = payload.len() / BYTES_PER_CELL;
    let mut cells = Vec::with_capacity(num_cells);
    for i in 0..num_cells {
        let base = i * BYTES_PER_CELL;
        let count = i32::from_le_bytes(payload[base..base + 4].try_into().unwrap());
        let key_sum = u32::from_le_bytes(payload[base + 4..base + 8].try_into().unwrap());
        let key_check = u32::from_le_bytes(payload[base + 8..base + 12].try_into().unwrap());
        cells.push(HashCell {
            count,
            key_sum,
            key_check,
        });
    }
    Ok(Iblt::from_cells(cells))
}

/// Encode a Bloom filter's raw bit table as a varnum-prefixed byte
/// string. `(n, p)` travel alongside in earlier name components and
/// are not repeated here.
pub fn encode_bloom(bf: &BloomFilter) -> Vec<u8> {
    let table = bf.table();
    let mut out = Vec::with_capacity(table.len() + 9);
    write_varnum(table.len() as u64, &mut out);
    out.extend_from_slice(table);
    out
}

/// Decode a varnum-prefixed Bloom filter table into raw bytes; the caller
/// combines this with `(n, p)` via [`BloomFilter::from_table`].
pub fn decode_bloom_table(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let (len, header) = read_varnum(bytes)?;
    let payload = bytes
        .get(header..header + len as usize)
        .ok_or(CodecError::TrailingBytes)?;
    if header + len as usize != bytes.len() {
        return Err(CodecError::TrailingBytes);
    }
    Ok(payload.to_vec())
}

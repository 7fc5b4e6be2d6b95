//! The sync/hello name scheme and the `"<prefix> <seq>"` content
//! format shared by hello and sync Data. Centralizing this here means the
//! producer and consumer engines build and parse identical wire forms
//! without duplicating the layout.
//!
//! Name component layout, relative to `<syncPrefix>`:
//! - hello interest: `["hello"]`
//! - hello data: `["hello", iblt_size, iblt_bytes]`
//! - sync interest: `["sync", n, p_scaled, bf_size, bf_bytes, iblt_size, iblt_bytes]`
//! - sync data: `<sync interest name> ++ [iblt_size, iblt_bytes]`
//!
//! `*_bytes` components are themselves self-delimiting (they carry their
//! own internal varnum); the `*_size` components are simple integer name
//! components recording the same length, so both ends are validated to
//! agree rather than relying on either alone (see DESIGN.md).

use psync_types::{Name, NameComponent};

use crate::bloom::BloomFilter;
use crate::codec;
use crate::error::CodecError;
use crate::iblt::Iblt;

pub const HELLO_COMPONENT: &str = "hello";
pub const SYNC_COMPONENT: &str = "sync";
pub const NACK_BODY: &str = "NACK 0";

fn append_sized(name: Name, bytes: Vec<u8>) -> Name {
    name.append_number(bytes.len() as u64).append_generic(bytes)
}

fn append_iblt(name: Name, iblt: &Iblt) -> Name {
    append_sized(name, codec::encode_iblt(iblt))
}

fn append_bloom(name: Name, bf: &BloomFilter) -> Name {
    append_sized(name, codec::encode_bloom(bf))
}

pub fn hello_interest_name(sync_prefix: &Name) -> Name {
    sync_prefix.clone().append_generic(HELLO_COMPONENT)
}

pub fn hello_data_name(sync_prefix: &Name, iblt: &Iblt) -> Name {
    append_iblt(hello_interest_name(sync_prefix), iblt)
}

pub fn sync_interest_name(
    sync_prefix: &Name,
    n: u32,
    p_scaled: u32,
    bf: &BloomFilter,
    iblt: &Iblt,
) -> Name {
    let name = sync_prefix
        .clone()
        .append_generic(SYNC_COMPONENT)
        .append_number(n as u64)
        .append_number(p_scaled as u64);
    let name = append_bloom(name, bf);
    append_iblt(name, iblt)
}

pub fn sync_data_name(request_name: &Name, iblt: &Iblt) -> Name {
    append_iblt(request_name.clone(), iblt)
}

fn get_number(comps: &[NameComponent], idx: usize) -> Result<u64, CodecError> {
    match comps.get(idx) {
        Some(NameComponent::Number(v)) => Ok(*v),
        _ => Err(CodecError::MalformedName),
    }
}

fn get_generic<'a>(comps: &'a [NameComponent], idx: usize) -> Result<&'a [u8], CodecError> {
    match comps.get(idx) {
        Some(NameComponent::Generic(b)) => Ok(b.as_slice()),
        _ => Err(CodecError::MalformedName),
    }
}

/// Extracts the trailing `[size, bytes]` pair and decodes it as an IBLT,
/// used both for hello data and for sync data/interest IBLT components.
pub fn parse_trailing_iblt(name: &Name) -> Result<Iblt, CodecError> {
    let comps = name.components();
    if comps.len() < 2 {
        return Err(CodecError::MalformedName);
    }
    let size = get_number(comps, comps.len() - 2)? as usize;
    let bytes = get_generic(comps, comps.len() - 1)?;
    if bytes.len() != size {
        return Err(CodecError::TrailingBytes);
    }
    codec::decode_iblt(bytes)
}

pub struct ParsedSyncInterest {
    pub n: u32,
    pub p_scaled: u32,
    pub bf: BloomFilter,
    pub iblt: Iblt,
}

/// Parses a sync interest name, given the number of components in
/// `<syncPrefix>` (so this works regardless of how deep the sync prefix
/// itself is nested).
pub fn parse_sync_interest(name: &Name, sync_prefix_len: usize) -> Result<ParsedSyncInterest, CodecError> {
    let comps = name.components();
    if get_generic(comps, sync_prefix_len)? != SYNC_COMPONENT.as_bytes() {
        return Err(CodecError::MalformedName);
    }
    let n = get_number(comps, sync_prefix_len + 1)? as u32;
    let p_scaled = get_number(comps, sync_prefix_len + 2)? as u32;
    let bf_size = get_number(comps, sync_prefix_len + 3)? as usize;
    let bf_bytes = get_generic(comps, sync_prefix_len + 4)?;
    if bf_bytes.len() != bf_size {
        return Err(CodecError::TrailingBytes);
    }
    let iblt_size = get_number(comps, sync_prefix_len + 5)? as usize;
    let iblt_bytes = get_generic(comps, sync_prefix_len + 6)?;
    if iblt_bytes.len() != iblt_size {
        return Err(CodecError::TrailingBytes);
    }

    let p = p_scaled as f64 / 1000.0;
    let table = codec::decode_bloom_table(bf_bytes)?;
    let bf = BloomFilter::from_table(table, n, p).map_err(|_| CodecError::MalformedName)?;
    let iblt = codec::decode_iblt(iblt_bytes)?;
    Ok(ParsedSyncInterest { n, p_scaled, bf, iblt })
}

pub fn is_hello_interest(name: &Name, sync_prefix_len: usize) -> bool {
    matches!(
        name.get(sync_prefix_len),
        Some(NameComponent::Generic(b)) if b.as_slice() == HELLO_COMPONENT.as_bytes()
    )
}

/// Format `(prefix, seq)` pairs as newline-joined `"<prefix> <seq>"`
/// lines, the content body for both hello and sync Data.
pub fn format_prefix_seq_lines<'a>(pairs: impl IntoIterator<Item = (&'a str, u64)>) -> String {
    pairs
        .into_iter()
        .map(|(prefix, seq)| format!("{prefix} {seq}"))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn parse_prefix_seq_lines(content: &str) -> Vec<(String, u64)> {
    content
        .lines()
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let (prefix, seq) = line.rsplit_once(' ')?;
            let seq = seq.parse::<u64>().ok()?;
            Some((prefix.to_string(), seq))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iblt::Iblt;

    #[test]
    fn sync_interest_name_round_trips() {
        let sync_prefix = Name::from_uri("/psync");
        let mut bf = BloomFilter::new(10, 0.01);
        bf.insert(b"/a");
        let mut iblt = Iblt::new(40);
        iblt.insert(7);

        let name = sync_interest_name(&sync_prefix, 10, 10, &bf, &iblt);
        let parsed = parse_sync_interest(&name, sync_prefix.len()).unwrap();
        assert_eq!(parsed.n, 10);
        assert_eq!(parsed.p_scaled, 10);
        assert_eq!(parsed.iblt, iblt);
        assert!(parsed.bf.contains(b"/a"));
    }

    #[test]
    fn hello_data_name_carries_the_iblt() {
        let sync_prefix = Name::from_uri("/psync");
        let mut iblt = Iblt::new(40);
        iblt.insert(99);
        let name = hello_data_name(&sync_prefix, &iblt);
        assert!(is_hello_interest(&name, sync_prefix.len()));
        let decoded = parse_trailing_iblt(&name).unwrap();
        assert_eq!(decoded, iblt);
    }

    #[test]
    fn content_lines_round_trip() {
        let pairs = vec![("/a", 3u64), ("/b", 9u64)];
        let formatted = format_prefix_seq_lines(pairs.iter().map(|(p, s)| (*p, *s)));
        let parsed = parse_prefix_seq_lines(&formatted);
        assert_eq!(
            parsed,
            vec![("/a".to_string(), 3), ("/b".to_string(), 9)]
        );
    }

    #[test]
    fn sync_data_name_extends_the_request_name() {
        let sync_prefix = Name::from_uri("/psync");
        let bf = BloomFilter::new(1, 0.001);
        let request_iblt = Iblt::new(40);
        let request = sync_interest_name(&sync_prefix, 1, 1, &bf, &request_iblt);

        let mut fresh_iblt = Iblt::new(40);
        fresh_iblt.insert(5);
        let data_name = sync_data_name(&request, &fresh_iblt);

        assert!(request.is_prefix_of(&data_name));
        assert_eq!(parse_trailing_iblt(&data_name).unwrap(), fresh_iblt);
    }
}

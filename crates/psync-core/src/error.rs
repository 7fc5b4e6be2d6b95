//! Per-module error enums. Library code returns these instead of
//! panicking; only the CLI binary collapses them into `anyhow::Error` at
//! the process boundary.

use thiserror::Error;

use crate::face::FaceError;

/// Failures decoding the wire form of an IBLT or Bloom filter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("truncated size-prefix varnum")]
    TruncatedVarNum,
    #[error("iblt cell count mismatch: expected {expected}, found {found}")]
    CellCountMismatch { expected: usize, found: usize },
    #[error("trailing or missing bytes after decoding a varnum-prefixed component")]
    TrailingBytes,
    #[error("bloom filter table length mismatch: expected {expected} bytes, found {found}")]
    BloomTableMismatch { expected: usize, found: usize },
    #[error("malformed sync or hello interest name")]
    MalformedName,
}

/// Failures at the producer/consumer engine level.
#[derive(Error, Debug)]
pub enum EngineError {
    /// A publish was attempted against a prefix never registered via
    /// `add_sync_node`. This is normally a silent drop at the call site;
    /// this variant exists for callers that want to observe it.
    #[error("unknown prefix: {0}")]
    UnknownPrefix(String),
    #[error(transparent)]
    Face(#[from] FaceError),
    #[error(transparent)]
    Wire(#[from] CodecError),
    /// The consumer tried to send a sync Interest before a hello reply had
    /// ever been processed.
    #[error("sync interest precondition violated: {0}")]
    Precondition(&'static str),
}

use std::fmt;

/// A producer-registered prefix, e.g. `/node-a/topic`.
///
/// Newtype over `String` rather than a bare `Name` because the producer
/// and consumer engines key several maps by prefix identity and format it
/// into the `prefix/seq` strings hashed into the IBLT; keeping it as the
/// exact string the application registered avoids re-deriving a URI form
/// that might not round-trip identically through `Name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Prefix(String);

impl Prefix {
    pub fn new(uri: impl Into<String>) -> Self {
        Prefix(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The exact byte string hashed into the IBLT for a given sequence
    /// number: `"<prefix>/<seq>"`.
    pub fn with_seq_bytes(&self, seq: SeqNo) -> Vec<u8> {
        format!("{}/{}", self.0, seq.0).into_bytes()
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Prefix {
    fn from(s: &str) -> Self {
        Prefix::new(s)
    }
}

impl From<String> for Prefix {
    fn from(s: String) -> Self {
        Prefix::new(s)
    }
}

/// A producer-side sequence number. Sequence `0` means "never published".
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub struct SeqNo(pub u64);

impl SeqNo {
    pub const ZERO: SeqNo = SeqNo(0);

    pub fn next(self) -> SeqNo {
        SeqNo(self.0 + 1)
    }
}

impl fmt::Display for SeqNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for SeqNo {
    fn from(n: u64) -> Self {
        SeqNo(n)
    }
}

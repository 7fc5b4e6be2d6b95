use std::time::Duration;

use crate::name::Name;

/// An in-memory stand-in for a signed Data packet.
///
/// Signing itself is out of scope for the sync core; `signature` is
/// populated by whatever `KeyChain` implementation the face layer plugs
/// in and is otherwise opaque to the engines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub name: Name,
    pub content: Vec<u8>,
    pub freshness: Duration,
    pub can_be_cached: bool,
    pub signature: Option<Vec<u8>>,
}

impl Data {
    pub fn new(name: Name, content: impl Into<Vec<u8>>, freshness: Duration) -> Self {
        Data {
            name,
            content: content.into(),
            freshness,
            can_be_cached: true,
            signature: None,
        }
    }

    /// A Data packet marked not cacheable, e.g. the hello reply.
    pub fn uncacheable(name: Name, content: impl Into<Vec<u8>>, freshness: Duration) -> Self {
        Data {
            can_be_cached: false,
            ..Self::new(name, content, freshness)
        }
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

use std::fmt;

/// A single component of a hierarchical content name.
///
/// Generic components carry opaque bytes (a prefix segment, a serialized
/// IBLT, a serialized Bloom filter table). Number components carry a
/// nonnegative integer, used for sequence numbers and for the small
/// integers (`n`, `p * 1000`) that travel alongside a sync Interest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NameComponent {
    Generic(Vec<u8>),
    Number(u64),
}

impl NameComponent {
    pub fn generic(bytes: impl Into<Vec<u8>>) -> Self {
        NameComponent::Generic(bytes.into())
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        match self {
            NameComponent::Generic(b) => b.clone(),
            NameComponent::Number(n) => n.to_be_bytes().to_vec(),
        }
    }
}

impl fmt::Display for NameComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameComponent::Generic(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => write!(f, "{s}"),
                Err(_) => write!(f, "<{} bytes>", bytes.len()),
            },
            NameComponent::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A hierarchical name: an ordered sequence of components.
///
/// This is the crate's stand-in for the network layer's name type. The
/// sync protocol only ever needs to build, inspect, and append to names.
/// It never resolves or routes them, so a thin `Vec<NameComponent>`
/// wrapper is all that is required.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct Name(Vec<NameComponent>);

impl Name {
    pub fn new() -> Self {
        Name(Vec::new())
    }

    pub fn from_uri(uri: &str) -> Self {
        let components = uri
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| NameComponent::Generic(s.as_bytes().to_vec()))
            .collect();
        Name(components)
    }

    pub fn append(mut self, component: NameComponent) -> Self {
        self.0.push(component);
        self
    }

    pub fn append_generic(self, bytes: impl Into<Vec<u8>>) -> Self {
        self.append(NameComponent::generic(bytes))
    }

    pub fn append_number(self, n: u64) -> Self {
        self.append(NameComponent::Number(n))
    }

    pub fn components(&self) -> &[NameComponent] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.0.get(index)
    }

    /// Component indexed from the end: `get_from_back(0)` is the last component.
    pub fn get_from_back(&self, index_from_back: usize) -> Option<&NameComponent> {
        let len = self.0.len();
        if index_from_back >= len {
            return None;
        }
        self.0.get(len - 1 - index_from_back)
    }

    /// The name formed by keeping only the first `n` components.
    pub fn prefix(&self, n: usize) -> Name {
        Name(self.0.iter().take(n).cloned().collect())
    }

    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for component in &self.0 {
            write!(f, "/{component}")?;
        }
        Ok(())
    }
}

impl From<&str> for Name {
    fn from(uri: &str) -> Self {
        Name::from_uri(uri)
    }
}

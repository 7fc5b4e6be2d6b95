use crate::prefix::{Prefix, SeqNo};

/// A single prefix's advancement as surfaced to a consumer application:
/// everything strictly after `low` up to and including `high` is new.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct MissingData {
    pub prefix: Prefix,
    pub low: SeqNo,
    pub high: SeqNo,
}

impl MissingData {
    pub fn new(prefix: Prefix, low: SeqNo, high: SeqNo) -> Self {
        MissingData { prefix, low, high }
    }

    /// The individual sequence numbers this range covers, `low+1..=high`.
    pub fn seqs(&self) -> impl Iterator<Item = SeqNo> {
        ((self.low.0 + 1)..=self.high.0).map(SeqNo)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seqs_enumerates_the_gap() {
        let missing = MissingData::new(Prefix::new("/a"), SeqNo(2), SeqNo(5));
        let collected: Vec<_> = missing.seqs().collect();
        assert_eq!(collected, vec![SeqNo(3), SeqNo(4), SeqNo(5)]);
    }
}

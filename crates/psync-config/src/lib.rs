//! Producer/consumer configuration.
//!
//! Plain, `clap`-free config types, kept separate from the CLI crate's
//! flag parsing. `psync-cli` owns the `clap::Parser` structs and converts
//! them into these.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Interest lifetime used by both hello and sync Interests.
pub const DEFAULT_INTEREST_LIFETIME_MS: u64 = 4_000;

/// Producer-side configuration: sizes the authoritative IBLT and governs
/// reply freshness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub expected_entries: usize,
    #[serde(with = "duration_millis")]
    pub hello_reply_freshness: Duration,
    #[serde(with = "duration_millis")]
    pub sync_reply_freshness: Duration,
    pub sync_prefix: String,
}

impl SyncConfig {
    pub fn new(expected_entries: usize, sync_prefix: impl Into<String>) -> Self {
        SyncConfig {
            expected_entries,
            sync_prefix: sync_prefix.into(),
            ..Default::default()
        }
    }

    /// The pending-entry flush threshold: `expected_entries / 2`.
    pub fn threshold(&self) -> usize {
        self.expected_entries / 2
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            expected_entries: 80,
            hello_reply_freshness: Duration::ZERO,
            sync_reply_freshness: Duration::ZERO,
            sync_prefix: "/psync".to_string(),
        }
    }
}

/// Consumer-side configuration: drives Bloom filter sizing and Interest
/// lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    pub sync_prefix: String,
    pub projected_element_count: u32,
    pub false_positive_rate: f64,
    #[serde(with = "duration_millis")]
    pub interest_lifetime: Duration,
}

impl ConsumerConfig {
    pub fn new(sync_prefix: impl Into<String>, projected_element_count: u32, false_positive_rate: f64) -> Self {
        ConsumerConfig {
            sync_prefix: sync_prefix.into(),
            projected_element_count,
            false_positive_rate,
            ..Default::default()
        }
    }

    /// `(n=1, p=0.001)`, the "subscribe to everything" sentinel.
    pub fn subscribe_all(sync_prefix: impl Into<String>) -> Self {
        ConsumerConfig {
            sync_prefix: sync_prefix.into(),
            projected_element_count: 1,
            false_positive_rate: 0.001,
            interest_lifetime: Duration::from_millis(DEFAULT_INTEREST_LIFETIME_MS),
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        ConsumerConfig {
            sync_prefix: "/psync".to_string(),
            projected_element_count: 10,
            false_positive_rate: 0.01,
            interest_lifetime: Duration::from_millis(DEFAULT_INTEREST_LIFETIME_MS),
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

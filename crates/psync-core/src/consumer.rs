//! The consumer engine: drives the hello→sync request loop,
//! tracks the last IBLT snapshot it learned, and surfaces
//! [`MissingData`] batches to the application through a callback.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use psync_types::{MissingData, Name, Prefix, SeqNo};

use crate::bloom::BloomFilter;
use crate::error::EngineError;
use crate::face::{Face, FaceEvent};
use crate::iblt::Iblt;
use crate::wire;
use psync_config::ConsumerConfig;

/// Invoked with every freshly-learned prefix/seq map after a hello reply.
pub trait HelloCallback: Send + Sync {
    fn on_receive_hello(&self, prefixes: &HashMap<Prefix, SeqNo>);
}

/// Invoked with a batch of [`MissingData`] whenever a sync reply reveals
/// that one or more subscribed (or newly-seen) prefixes advanced.
pub trait UpdateCallback: Send + Sync {
    fn on_update(&self, missing: Vec<MissingData>);
}

/// Consumer-side sync engine.
pub struct LogicConsumer<F> {
    sync_prefix: Name,
    config: ConsumerConfig,
    known: HashMap<Prefix, SeqNo>,
    last_iblt: Option<Iblt>,
    subscriptions: HashSet<Prefix>,
    bf: BloomFilter,
    hello_sent: bool,
    face: Arc<F>,
    on_hello: Arc<dyn HelloCallback>,
    on_update: Arc<dyn UpdateCallback>,
}

impl<F: Face + 'static> LogicConsumer<F> {
    pub fn new(
        config: ConsumerConfig,
        face: Arc<F>,
        on_hello: Arc<dyn HelloCallback>,
        on_update: Arc<dyn UpdateCallback>,
    ) -> Self {
        let sync_prefix = Name::from_uri(&config.sync_prefix);
        let bf = BloomFilter::new(config.projected_element_count, config.false_positive_rate);
        LogicConsumer {
            sync_prefix,
            config,
            known: HashMap::new(),
            last_iblt: None,
            subscriptions: HashSet::new(),
            bf,
            hello_sent: false,
            face,
            on_hello,
            on_update,
        }
    }

    pub fn known_seq(&self, prefix: &Prefix) -> Option<SeqNo> {
        self.known.get(prefix).copied()
    }

    pub fn hello_sent(&self) -> bool {
        self.hello_sent
    }

    /// `addSL`: subscribes to `prefix`, inserting it into both the
    /// subscription set and the Bloom filter.
    pub fn add_sl(&mut self, prefix: Prefix) {
        self.bf.insert(prefix.as_str().as_bytes());
        self.subscriptions.insert(prefix);
    }

    pub fn subscriptions(&self) -> &HashSet<Prefix> {
        &self.subscriptions
    }

    /// Sends the hello Interest, retrying on timeout/nack until a reply
    /// is processed.
    pub async fn send_hello_interest(&mut self) -> Result<(), EngineError> {
        loop {
            let name = wire::hello_interest_name(&self.sync_prefix);
            match self
                .face
                .express_interest(name, self.config.interest_lifetime, true)
                .await?
            {
                FaceEvent::Data(data) => {
                    self.process_hello_data(&data)?;
                    self.hello_sent = true;
                    return Ok(());
                }
                FaceEvent::Timeout => {
                    tracing::debug!("hello interest timed out, reissuing");
                }
                FaceEvent::Nack => {
                    tracing::debug!("hello interest nacked, reissuing");
                }
            }
        }
    }

    fn process_hello_data(&mut self, data: &psync_types::Data) -> Result<(), EngineError> {
        let iblt = wire::parse_trailing_iblt(&data.name)?;
        self.last_iblt = Some(iblt);
        let content = String::from_utf8_lossy(&data.content);
        for (prefix_str, seq) in wire::parse_prefix_seq_lines(&content) {
            self.known.insert(Prefix::new(prefix_str), SeqNo(seq));
        }
        self.on_hello.on_receive_hello(&self.known);
        Ok(())
    }

    /// Sends a sync Interest built from the current subscription BF and
    /// the last learned IBLT. Precondition: a hello reply has already
    /// been processed.
    pub async fn send_sync_interest(&mut self) -> Result<(), EngineError> {
        if !self.hello_sent {
            return Err(EngineError::Precondition("hello must be sent before sync"));
        }
        let iblt = self
            .last_iblt
            .clone()
            .ok_or(EngineError::Precondition("iblt snapshot must be non-empty"))?;

        let n = self.config.projected_element_count;
        let p_scaled = (self.config.false_positive_rate * 1000.0).round() as u32;
        let name = wire::sync_interest_name(&self.sync_prefix, n, p_scaled, &self.bf, &iblt);

        match self
            .face
            .express_interest(name.clone(), self.config.interest_lifetime, true)
            .await?
        {
            FaceEvent::Data(data) => self.process_sync_data(&data),
            FaceEvent::Timeout => {
                tracing::debug!("sync interest timed out, reissuing");
                Ok(())
            }
            FaceEvent::Nack => {
                tracing::debug!("sync interest nacked, reissuing");
                Ok(())
            }
        }
    }

    fn process_sync_data(&mut self, data: &psync_types::Data) -> Result<(), EngineError> {
        let iblt = wire::parse_trailing_iblt(&data.name)?;
        self.last_iblt = Some(iblt);

        let content = String::from_utf8_lossy(&data.content);
        if content.trim() == wire::NACK_BODY {
            tracing::debug!("received NACK, reissuing sync with fresh IBLT");
            return Ok(());
        }

        let mut missing = Vec::new();
        for (prefix_str, seq) in wire::parse_prefix_seq_lines(&content) {
            let prefix = Prefix::new(prefix_str);
            let new_seq = SeqNo(seq);
            let old_seq = self.known.get(&prefix).copied().unwrap_or(SeqNo::ZERO);
            if new_seq > old_seq {
                missing.push(MissingData::new(prefix.clone(), old_seq, new_seq));
                self.known.insert(prefix, new_seq);
            }
        }

        if !missing.is_empty() {
            tracing::info!(count = missing.len(), "received update batch");
            self.on_update.on_update(missing);
        }
        Ok(())
    }

    /// Drives the hello→sync loop forever: one hello, then sync,
    /// reissued on every reply. Intended to be spawned as its own
    /// task; returns only on a face-level error.
    pub async fn run(&mut self) -> Result<(), EngineError> {
        self.send_hello_interest().await?;
        loop {
            self.send_sync_interest().await?;
        }
    }
}

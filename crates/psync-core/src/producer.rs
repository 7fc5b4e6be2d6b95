//! The producer engine: owns the authoritative IBLT and the
//! prefix registry, answers hello/sync Interests, and holds long-lived
//! pending sync requests until a publication or the scheduler resolves
//! them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use psync_types::{Data, Name, Prefix, SeqNo};
use tokio::sync::mpsc;

use crate::error::EngineError;
use crate::face::{EventHandle, Face, KeyChain, Scheduler};
use crate::hash::{self, SEED_CHECK};
use crate::iblt::Iblt;
use crate::wire;
use psync_config::SyncConfig;

struct PendingEntry {
    bf: crate::bloom::BloomFilter,
    iblt: Iblt,
    expiration: EventHandle,
}

/// Producer-side sync engine.
///
/// Not `Send`-shareable by design: it is meant to be owned exclusively by
/// one driving task, which owns it behind a command channel rather than
/// sharing `&mut` access directly.
pub struct LogicRepo<F, S, K, D> {
    config: SyncConfig,
    iblt: Iblt,
    prefixes: IndexMap<Prefix, SeqNo>,
    prefix_to_hash: HashMap<Prefix, u32>,
    hash_to_prefix: HashMap<u32, Prefix>,
    pending: IndexMap<Name, PendingEntry>,
    face: Arc<F>,
    scheduler: Arc<S>,
    keychain: Arc<K>,
    store: Arc<D>,
    expired_tx: mpsc::UnboundedSender<Name>,
}

impl<F, S, K, D> LogicRepo<F, S, K, D>
where
    F: Face + 'static,
    S: Scheduler + 'static,
    K: KeyChain + 'static,
    D: crate::face::DataStore + 'static,
{
    /// Returns the engine plus a receiver of expired pending-entry names.
    /// The driving task must forward each received name to
    /// [`LogicRepo::on_pending_expire`]: a message-passing pattern for
    /// scheduler callbacks that would otherwise capture `&mut self`.
    pub fn new(
        config: SyncConfig,
        face: Arc<F>,
        scheduler: Arc<S>,
        keychain: Arc<K>,
        store: Arc<D>,
    ) -> (Self, mpsc::UnboundedReceiver<Name>) {
        let iblt = Iblt::new(config.expected_entries);
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let repo = LogicRepo {
            config,
            iblt,
            prefixes: IndexMap::new(),
            prefix_to_hash: HashMap::new(),
            hash_to_prefix: HashMap::new(),
            pending: IndexMap::new(),
            face,
            scheduler,
            keychain,
            store,
            expired_tx,
        };
        (repo, expired_rx)
    }

    pub fn threshold(&self) -> usize {
        self.config.threshold()
    }

    pub fn iblt(&self) -> &Iblt {
        &self.iblt
    }

    pub fn seq_of(&self, prefix: &Prefix) -> Option<SeqNo> {
        self.prefixes.get(prefix).copied()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// The key tracked by the IBLT for a given `(prefix, seq)`:
    /// `H_check(bytes(prefix + "/" + seq))`.
    fn prefix_key_hash(prefix: &Prefix, seq: SeqNo) -> u32 {
        hash::murmur3_32(SEED_CHECK, &prefix.with_seq_bytes(seq))
    }

    /// `addSyncNode`: registers a new prefix at seq 0, or is a
    /// no-op if already registered.
    pub fn add_sync_node(&mut self, prefix: Prefix) {
        if self.prefixes.contains_key(&prefix) {
            return;
        }
        let seq = SeqNo::ZERO;
        let key_hash = Self::prefix_key_hash(&prefix, seq);
        self.iblt.insert(key_hash);
        self.prefixes.insert(prefix.clone(), seq);
        self.prefix_to_hash.insert(prefix.clone(), key_hash);
        self.hash_to_prefix.insert(key_hash, prefix.clone());

        let handler: Arc<dyn crate::face::InterestHandler> =
            Arc::new(crate::face::AppDataInterestHandler::new(self.store.clone()));
        if let Err(err) = self.face.set_interest_filter(Name::from_uri(prefix.as_str()), handler) {
            tracing::warn!(%prefix, error = %err, "failed to register interest filter for prefix; continuing, face may retry");
        }
        tracing::debug!(%prefix, "added sync node");
    }

    /// `removeSyncNode`: erases the current hash and drops all
    /// bookkeeping for `prefix`.
    pub fn remove_sync_node(&mut self, prefix: &Prefix) {
        if let Some(hash) = self.prefix_to_hash.remove(prefix) {
            self.iblt.erase(hash);
            self.hash_to_prefix.remove(&hash);
        }
        self.prefixes.shift_remove(prefix);
        tracing::debug!(%prefix, "removed sync node");
    }

    /// `publishData`: stores a new signed Data under
    /// `prefix/seq+1` and advances the authoritative IBLT. Publishing
    /// against an unregistered prefix is silently dropped.
    pub async fn publish_data(
        &mut self,
        prefix: &Prefix,
        content: Vec<u8>,
        freshness: Duration,
    ) -> Result<Option<Name>, EngineError> {
        let Some(&seq) = self.prefixes.get(prefix) else {
            tracing::warn!(%prefix, "publish against unknown prefix; dropping");
            return Ok(None);
        };
        let new_seq = seq.next();
        let name = Name::from_uri(prefix.as_str()).append_number(new_seq.0);
        let mut data = Data::new(name.clone(), content, freshness);
        self.keychain.sign(&mut data);
        self.store.insert(data);

        self.update_seq(prefix, new_seq).await?;
        Ok(Some(name))
    }

    async fn update_seq(&mut self, prefix: &Prefix, new_seq: SeqNo) -> Result<(), EngineError> {
        if let Some(old_hash) = self.prefix_to_hash.get(prefix).copied() {
            self.iblt.erase(old_hash);
            self.hash_to_prefix.remove(&old_hash);
        }
        let new_hash = Self::prefix_key_hash(prefix, new_seq);
        self.iblt.insert(new_hash);
        self.prefix_to_hash.insert(prefix.clone(), new_hash);
        self.hash_to_prefix.insert(new_hash, prefix.clone());
        self.prefixes.insert(prefix.clone(), new_seq);
        tracing::debug!(%prefix, seq = new_seq.0, "published update");

        self.scan_pending(prefix).await
    }

    /// Builds the `"<prefix> <seq>"` content lines for every positively
    /// recovered key whose prefix the requester's Bloom filter contains.
    fn build_content(&self, positive: &std::collections::BTreeSet<u32>, bf: &crate::bloom::BloomFilter) -> String {
        let mut pairs: Vec<(&str, u64)> = Vec::new();
        for key in positive {
            let Some(prefix) = self.hash_to_prefix.get(key) else {
                continue;
            };
            if !bf.contains(prefix.as_str().as_bytes()) {
                continue;
            }
            if let Some(seq) = self.prefixes.get(prefix) {
                pairs.push((prefix.as_str(), seq.0));
            }
        }
        wire::format_prefix_seq_lines(pairs)
    }

    async fn send_nack(&self, request_name: &Name) -> Result<(), EngineError> {
        let name = wire::sync_data_name(request_name, &self.iblt);
        let mut data = Data::uncacheable(name, wire::NACK_BODY.as_bytes().to_vec(), self.config.sync_reply_freshness);
        self.keychain.sign(&mut data);
        tracing::warn!(%request_name, "sync diff undecodable, replying with NACK");
        self.face.put(data).await?;
        Ok(())
    }

    async fn send_sync_response(
        &self,
        request_name: &Name,
        positive: &std::collections::BTreeSet<u32>,
        bf: &crate::bloom::BloomFilter,
    ) -> Result<(), EngineError> {
        let content = self.build_content(positive, bf);
        let name = wire::sync_data_name(request_name, &self.iblt);
        let mut data = Data::uncacheable(name, content.into_bytes(), self.config.sync_reply_freshness);
        self.keychain.sign(&mut data);
        self.face.put(data).await?;
        Ok(())
    }

    /// Handles a hello Interest: replies with the live prefix/seq
    /// list and an opaque snapshot of the authoritative IBLT. Caching is
    /// disabled.
    pub async fn on_hello_interest(&self, sync_prefix: &Name) -> Result<(), EngineError> {
        let name = wire::hello_data_name(sync_prefix, &self.iblt);
        let pairs: Vec<(&str, u64)> = self
            .prefixes
            .iter()
            .map(|(prefix, seq)| (prefix.as_str(), seq.0))
            .collect();
        let content = wire::format_prefix_seq_lines(pairs);
        let mut data = Data::uncacheable(name, content.into_bytes(), self.config.hello_reply_freshness);
        self.keychain.sign(&mut data);
        self.face.put(data).await?;
        Ok(())
    }

    /// Handles a sync Interest: decodes the requester's BF/IBLT,
    /// diffs against the authoritative IBLT, and either answers
    /// immediately, NACKs an undecodable diff, or holds the request
    /// pending until a relevant publication or expiration.
    pub async fn on_sync_interest(
        &mut self,
        interest_name: Name,
        sync_prefix_len: usize,
        remaining_lifetime: Duration,
    ) -> Result<(), EngineError> {
        let parsed = match wire::parse_sync_interest(&interest_name, sync_prefix_len) {
            Ok(p) => p,
            Err(_) => {
                self.send_nack(&interest_name).await?;
                return Ok(());
            }
        };

        if parsed.iblt.len() != self.iblt.len() {
            self.send_nack(&interest_name).await?;
            return Ok(());
        }

        let diff = self.iblt.subtract(&parsed.iblt)?;
        let (positive, negative, ok) = diff.list_entries();
        if !ok {
            self.send_nack(&interest_name).await?;
            return Ok(());
        }

        let content = self.build_content(&positive, &parsed.bf);
        if positive.len() + negative.len() >= self.threshold() || !content.is_empty() {
            self.send_sync_response(&interest_name, &positive, &parsed.bf).await?;
            return Ok(());
        }

        let expired_tx = self.expired_tx.clone();
        let expire_name = interest_name.clone();
        let handle = self.scheduler.schedule(
            remaining_lifetime,
            Box::new(move || {
                let _ = expired_tx.send(expire_name);
            }),
        );
        self.pending.insert(
            interest_name,
            PendingEntry {
                bf: parsed.bf,
                iblt: parsed.iblt,
                expiration: handle,
            },
        );
        Ok(())
    }

    /// Scans every pending entry after a publication: entries
    /// whose diff is now undecodable are NACKed, entries whose BF
    /// contains the just-advanced prefix (or whose diff has grown past
    /// threshold) are answered, and the rest are left in place. Removal
    /// is deferred until after iteration.
    async fn scan_pending(&mut self, changed_prefix: &Prefix) -> Result<(), EngineError> {
        let names: Vec<Name> = self.pending.keys().cloned().collect();
        let mut done = Vec::new();
        let threshold = self.threshold();

        for name in names {
            let (diff_result, bf_contains_changed) = {
                let entry = self.pending.get(&name).expect("name came from this map's own keys");
                (
                    self.iblt.subtract(&entry.iblt),
                    entry.bf.contains(changed_prefix.as_str().as_bytes()),
                )
            };

            let diff = match diff_result {
                Ok(diff) => diff,
                Err(_) => {
                    self.send_nack(&name).await?;
                    done.push(name);
                    continue;
                }
            };
            let (positive, negative, ok) = diff.list_entries();
            if !ok {
                self.send_nack(&name).await?;
                done.push(name);
                continue;
            }

            if bf_contains_changed || positive.len() + negative.len() >= threshold {
                let bf = self.pending.get(&name).expect("checked above").bf.clone();
                self.send_sync_response(&name, &positive, &bf).await?;
                done.push(name);
            }
        }

        for name in done {
            if let Some(entry) = self.pending.shift_remove(&name) {
                self.scheduler.cancel(entry.expiration);
            }
        }
        Ok(())
    }

    /// Called by the driver task when a pending entry's scheduled
    /// expiration fires (see [`LogicRepo::new`]). No response is sent;
    /// the consumer's own timeout will reissue.
    pub fn on_pending_expire(&mut self, name: &Name) {
        if self.pending.shift_remove(name).is_some() {
            tracing::debug!(%name, "pending entry expired");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psync_face_inmemory::{InMemoryDataStore, InMemoryFace, InMemoryKeyChain, InMemoryNetwork, InMemoryScheduler};

    fn build_repo(expected: usize) -> LogicRepo<InMemoryFace, InMemoryScheduler, InMemoryKeyChain, InMemoryDataStore> {
        let network = InMemoryNetwork::new();
        let face = Arc::new(network.face());
        let scheduler = InMemoryScheduler::new();
        let keychain = InMemoryKeyChain::new();
        let store = InMemoryDataStore::new();
        LogicRepo::new(SyncConfig::new(expected, "/psync"), face, scheduler, keychain, store).0
    }

    #[tokio::test]
    async fn publish_data_advances_seq_and_iblt_membership() {
        let mut repo = build_repo(40);
        repo.add_sync_node(Prefix::new("/a"));
        let old_hash = *repo.prefix_to_hash.get(&Prefix::new("/a")).unwrap();

        let name = repo
            .publish_data(&Prefix::new("/a"), b"v1".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(name, Some(Name::from_uri("/a").append_number(1)));

        assert_eq!(repo.seq_of(&Prefix::new("/a")), Some(SeqNo(1)));
        let new_hash = *repo.prefix_to_hash.get(&Prefix::new("/a")).unwrap();
        assert_ne!(old_hash, new_hash);
        assert!(!repo.hash_to_prefix.contains_key(&old_hash));
        assert_eq!(repo.hash_to_prefix.get(&new_hash), Some(&Prefix::new("/a")));
    }

    #[tokio::test]
    async fn publishing_against_an_unregistered_prefix_is_a_silent_no_op() {
        let mut repo = build_repo(40);
        let before = repo.iblt().clone();

        let result = repo
            .publish_data(&Prefix::new("/ghost"), b"x".to_vec(), Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(result, None);
        assert_eq!(repo.iblt(), &before);
    }

    #[tokio::test]
    async fn add_then_remove_sync_node_returns_iblt_to_its_prior_state() {
        let mut repo = build_repo(40);
        let before = repo.iblt().clone();

        repo.add_sync_node(Prefix::new("/x"));
        assert_ne!(repo.iblt(), &before);

        repo.remove_sync_node(&Prefix::new("/x"));
        assert_eq!(repo.iblt(), &before);
        assert!(repo.prefix_to_hash.is_empty());
        assert!(repo.hash_to_prefix.is_empty());
    }
}

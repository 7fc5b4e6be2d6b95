//! A concrete, in-process implementation of the `Face`/`Scheduler`/
//! `KeyChain`/`DataStore` contracts, built around a channel-actor
//! pattern: a shared broker owns the registered filters and in-flight
//! Interests behind a lock, `express_interest` callers wait on a
//! `oneshot` that `put` resolves by NDN-style name-prefix match, and
//! `Scheduler::schedule` spawns a cancellable `tokio::time::sleep` task
//! instead of capturing `&mut` engine state directly.
//!
//! This crate is a test/demo double, out of scope of the protocol core
//! itself: it is what lets `psync-core`'s producer and consumer engines
//! be exercised without a real NDN face.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use psync_core::{DataStore, EventHandle, Face, FaceError, FaceEvent, InterestHandler, KeyChain, Scheduler};
use psync_types::{Data, Name};
use tokio::sync::oneshot;

struct PendingInterest {
    name: Name,
    reply: oneshot::Sender<FaceEvent>,
}

#[derive(Default)]
struct NetworkInner {
    filters: Vec<(Name, Arc<dyn InterestHandler>)>,
    pending: HashMap<u64, PendingInterest>,
    next_id: u64,
}

/// The shared in-process "network": a broker that routes Interests from
/// any [`InMemoryFace`] handle to whichever handle registered a matching
/// filter, and matches outgoing Data back to waiting Interests by
/// longest-prefix match, the same relationship a real NDN face has to
/// the Interests/Data it forwards.
#[derive(Default)]
pub struct InMemoryNetwork {
    inner: Mutex<NetworkInner>,
}

impl InMemoryNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(InMemoryNetwork::default())
    }

    /// Creates a new face handle attached to this network.
    pub fn face(self: &Arc<Self>) -> InMemoryFace {
        InMemoryFace {
            network: self.clone(),
        }
    }
}

/// A `Face` handle backed by a shared [`InMemoryNetwork`].
#[derive(Clone)]
pub struct InMemoryFace {
    network: Arc<InMemoryNetwork>,
}

fn find_matching_handler(inner: &NetworkInner, name: &Name) -> Option<Arc<dyn InterestHandler>> {
    inner
        .filters
        .iter()
        .filter(|(prefix, _)| prefix.is_prefix_of(name))
        .max_by_key(|(prefix, _)| prefix.len())
        .map(|(_, handler)| handler.clone())
}

#[async_trait]
impl Face for InMemoryFace {
    async fn express_interest(
        &self,
        name: Name,
        lifetime: Duration,
        _must_be_fresh: bool,
    ) -> Result<FaceEvent, FaceError> {
        let handler = {
            let inner = self.network.inner.lock().expect("network lock poisoned");
            find_matching_handler(&inner, &name)
        };

        let Some(handler) = handler else {
            tracing::trace!(%name, "no filter registered, interest will time out");
            tokio::time::sleep(lifetime).await;
            return Ok(FaceEvent::Timeout);
        };

        if let Some(data) = handler.handle(name.clone(), lifetime).await {
            return Ok(FaceEvent::Data(data));
        }

        // The handler answers asynchronously (e.g. the producer engine's
        // own `face.put` call for hello/sync); register a pending wait.
        let (tx, rx) = oneshot::channel();
        let id = {
            let mut inner = self.network.inner.lock().expect("network lock poisoned");
            let id = inner.next_id;
            inner.next_id += 1;
            inner.pending.insert(
                id,
                PendingInterest {
                    name: name.clone(),
                    reply: tx,
                },
            );
            id
        };

        match tokio::time::timeout(lifetime, rx).await {
            Ok(Ok(event)) => Ok(event),
            Ok(Err(_canceled)) => Ok(FaceEvent::Timeout),
            Err(_elapsed) => {
                self.network.inner.lock().expect("network lock poisoned").pending.remove(&id);
                Ok(FaceEvent::Timeout)
            }
        }
    }

    fn set_interest_filter(&self, prefix: Name, handler: Arc<dyn InterestHandler>) -> Result<(), FaceError> {
        let mut inner = self.network.inner.lock().expect("network lock poisoned");
        inner.filters.push((prefix, handler));
        Ok(())
    }

    async fn put(&self, data: Data) -> Result<(), FaceError> {
        let matched: Vec<u64> = {
            let inner = self.network.inner.lock().expect("network lock poisoned");
            inner
                .pending
                .iter()
                .filter(|(_, pending)| pending.name.is_prefix_of(&data.name))
                .map(|(id, _)| *id)
                .collect()
        };
        let mut inner = self.network.inner.lock().expect("network lock poisoned");
        for id in matched {
            if let Some(pending) = inner.pending.remove(&id) {
                let _ = pending.reply.send(FaceEvent::Data(data.clone()));
            }
        }
        Ok(())
    }
}

/// A `Scheduler` backed by `tokio::time::sleep`; cancellation aborts the
/// spawned task. Canceling before removing an entry is the caller's
/// responsibility; this just makes cancellation effective.
#[derive(Default)]
pub struct InMemoryScheduler {
    next_id: AtomicU64,
    tasks: Mutex<HashMap<u64, tokio::task::JoinHandle<()>>>,
}

impl InMemoryScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(InMemoryScheduler::default())
    }
}

impl Scheduler for InMemoryScheduler {
    fn schedule(&self, delay: Duration, action: Box<dyn FnOnce() + Send>) -> EventHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        });
        self.tasks.lock().expect("scheduler lock poisoned").insert(id, task);
        EventHandle(id)
    }

    fn cancel(&self, handle: EventHandle) {
        if let Some(task) = self.tasks.lock().expect("scheduler lock poisoned").remove(&handle.0) {
            task.abort();
        }
    }
}

/// A `KeyChain` stub: signing is out of scope for the sync core, so
/// this attaches a fixed placeholder signature rather than a real one.
#[derive(Default)]
pub struct InMemoryKeyChain;

impl InMemoryKeyChain {
    pub fn new() -> Arc<Self> {
        Arc::new(InMemoryKeyChain)
    }
}

impl KeyChain for InMemoryKeyChain {
    fn sign(&self, data: &mut Data) {
        data.signature = Some(b"in-memory-test-signature".to_vec());
    }
}

/// A `DataStore` backed by a `HashMap` keyed by name.
#[derive(Default)]
pub struct InMemoryDataStore {
    map: Mutex<HashMap<Name, Data>>,
}

impl InMemoryDataStore {
    pub fn new() -> Arc<Self> {
        Arc::new(InMemoryDataStore::default())
    }
}

impl DataStore for InMemoryDataStore {
    fn insert(&self, data: Data) {
        self.map.lock().expect("data store lock poisoned").insert(data.name.clone(), data);
    }

    fn find(&self, name: &Name) -> Option<Data> {
        self.map.lock().expect("data store lock poisoned").get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn put_resolves_a_waiting_interest_by_prefix_match() {
        let network = InMemoryNetwork::new();
        let face = network.face();

        let interest_name = Name::from_uri("/psync/hello");
        let express = tokio::spawn({
            let face = face.clone();
            async move { face.express_interest(interest_name, Duration::from_secs(2), true).await }
        });

        // Give the express_interest call a moment to register as pending.
        tokio::time::sleep(Duration::from_millis(10)).await;

        let data_name = Name::from_uri("/psync/hello").append_number(12);
        face.put(Data::new(data_name.clone(), b"hi".to_vec(), Duration::ZERO))
            .await
            .unwrap();

        let event = express.await.unwrap().unwrap();
        match event {
            FaceEvent::Data(data) => assert_eq!(data.name, data_name),
            other => panic!("expected Data, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unmatched_interest_times_out() {
        let network = InMemoryNetwork::new();
        let face = network.face();
        let event = face
            .express_interest(Name::from_uri("/nobody/home"), Duration::from_millis(20), true)
            .await
            .unwrap();
        assert_eq!(event, FaceEvent::Timeout);
    }

    #[tokio::test]
    async fn scheduler_cancel_prevents_the_action_from_running() {
        let scheduler = InMemoryScheduler::new();
        let fired = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let handle = scheduler.schedule(Duration::from_millis(20), {
            let fired = fired.clone();
            Box::new(move || fired.store(true, Ordering::SeqCst))
        });
        scheduler.cancel(handle);
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn data_store_round_trips() {
        let store = InMemoryDataStore::new();
        let name = Name::from_uri("/a/1");
        store.insert(Data::new(name.clone(), b"payload".to_vec(), Duration::ZERO));
        assert_eq!(store.find(&name).unwrap().content, b"payload");
    }
}

//! End-to-end scenarios: a producer and one or more consumers
//! synchronizing over the in-memory face double, driving `LogicRepo`
//! through `spawn_producer` and `LogicConsumer` directly.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use psync_config::{ConsumerConfig, SyncConfig};
use psync_core::consumer::{HelloCallback, LogicConsumer, UpdateCallback};
use psync_core::producer::LogicRepo;
use psync_core::producer_actor::{spawn_producer, ProducerHandle};
use psync_core::face::{Face, FaceEvent};
use psync_core::wire;
use psync_face_inmemory::{InMemoryDataStore, InMemoryKeyChain, InMemoryNetwork, InMemoryScheduler};
use psync_types::{MissingData, Name, Prefix, SeqNo};

struct NoOpHelloCallback;
impl HelloCallback for NoOpHelloCallback {
    fn on_receive_hello(&self, _prefixes: &HashMap<Prefix, SeqNo>) {}
}

#[derive(Default, Clone)]
struct UpdateCollector(Arc<Mutex<Vec<MissingData>>>);

impl UpdateCollector {
    fn snapshot(&self) -> Vec<MissingData> {
        self.0.lock().expect("collector lock poisoned").clone()
    }
}

impl UpdateCallback for UpdateCollector {
    fn on_update(&self, missing: Vec<MissingData>) {
        self.0.lock().expect("collector lock poisoned").extend(missing);
    }
}

/// Spins up a producer task over a fresh in-memory network and returns a
/// handle to it plus the network (needed so a test can attach its own
/// consumer face).
fn spawn_test_producer(sync_prefix: &str, expected_entries: usize) -> (ProducerHandle, Arc<InMemoryNetwork>) {
    let network = InMemoryNetwork::new();
    let face = Arc::new(network.face());
    let scheduler = InMemoryScheduler::new();
    let keychain = InMemoryKeyChain::new();
    let store = InMemoryDataStore::new();

    let (repo, expired_rx) = LogicRepo::new(SyncConfig::new(expected_entries, sync_prefix), face.clone(), scheduler, keychain, store);
    let (handle, _join) = spawn_producer(repo, Name::from_uri(sync_prefix), face, expired_rx).expect("spawn_producer failed");
    (handle, network)
}

fn test_consumer_config(sync_prefix: &str, expected_entries: usize) -> ConsumerConfig {
    let mut config = ConsumerConfig::new(sync_prefix, expected_entries as u32, 0.01);
    // Keep scenario tests fast; the default 4s lifetime would make every
    // timeout-driven assertion below slow without changing the behavior
    // under test.
    config.interest_lifetime = Duration::from_millis(300);
    config
}

#[tokio::test]
async fn single_subscribed_consumer_receives_its_update() {
    let sync_prefix = "/psync";
    let (producer, network) = spawn_test_producer(sync_prefix, 80);
    producer.add_sync_node(Prefix::new("/a"));
    producer.add_sync_node(Prefix::new("/b"));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let consumer_face = Arc::new(network.face());
    let collector = UpdateCollector::default();
    let mut consumer = LogicConsumer::new(
        test_consumer_config(sync_prefix, 80),
        consumer_face,
        Arc::new(NoOpHelloCallback),
        Arc::new(collector.clone()),
    );
    consumer.add_sl(Prefix::new("/a"));
    consumer.send_hello_interest().await.expect("hello failed");

    let consumer_task = tokio::spawn(async move {
        consumer.send_sync_interest().await.expect("sync interest failed");
    });

    // Give the sync interest time to land as a pending entry before the
    // publish that should resolve it.
    tokio::time::sleep(Duration::from_millis(50)).await;
    producer
        .publish_data(Prefix::new("/a"), b"payload".to_vec(), Duration::from_secs(1))
        .await
        .expect("publish failed");

    tokio::time::timeout(Duration::from_secs(2), consumer_task)
        .await
        .expect("consumer task timed out")
        .expect("consumer task panicked");

    assert_eq!(
        collector.snapshot(),
        vec![MissingData::new(Prefix::new("/a"), SeqNo(0), SeqNo(1))]
    );
}

#[tokio::test]
async fn publication_on_unsubscribed_prefix_stays_silent() {
    let sync_prefix = "/psync";
    let (producer, network) = spawn_test_producer(sync_prefix, 80);
    producer.add_sync_node(Prefix::new("/a"));
    producer.add_sync_node(Prefix::new("/b"));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let consumer_face = Arc::new(network.face());
    let collector = UpdateCollector::default();
    let mut consumer = LogicConsumer::new(
        test_consumer_config(sync_prefix, 80),
        consumer_face,
        Arc::new(NoOpHelloCallback),
        Arc::new(collector.clone()),
    );
    consumer.add_sl(Prefix::new("/a"));
    consumer.send_hello_interest().await.expect("hello failed");

    let consumer_task = tokio::spawn(async move {
        consumer.send_sync_interest().await.expect("sync interest failed");
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    producer
        .publish_data(Prefix::new("/b"), b"payload".to_vec(), Duration::from_secs(1))
        .await
        .expect("publish failed");

    // A single unsubscribed publication must not flush the pending entry:
    // give it well under the interest lifetime and confirm it is still
    // outstanding.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!consumer_task.is_finished(), "pending entry was flushed by an unsubscribed publication");

    // Let the interest lifetime elapse; the consumer's own timeout
    // reissue logic resolves the task without ever seeing an update.
    consumer_task.await.expect("consumer task panicked");
    assert!(collector.snapshot().is_empty());
}

#[tokio::test]
async fn publications_past_threshold_force_a_flush() {
    let sync_prefix = "/psync";
    let expected_entries = 80; // threshold = 40
    let (producer, network) = spawn_test_producer(sync_prefix, expected_entries);
    producer.add_sync_node(Prefix::new("/a"));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let consumer_face = Arc::new(network.face());
    let collector = UpdateCollector::default();
    let mut consumer = LogicConsumer::new(
        test_consumer_config(sync_prefix, expected_entries),
        consumer_face,
        Arc::new(NoOpHelloCallback),
        Arc::new(collector.clone()),
    );
    consumer.add_sl(Prefix::new("/a"));
    consumer.send_hello_interest().await.expect("hello failed");

    let consumer_task = tokio::spawn(async move {
        consumer.send_sync_interest().await.expect("sync interest failed");
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Repeatedly publishing the *same* prefix nets to a tiny diff (the
    // intermediate seq hashes cancel against each other), so reaching the
    // threshold requires genuinely new entries: 40 distinct, unsubscribed
    // prefixes published once each, each contributing exactly one new
    // positive entry the consumer's stale IBLT doesn't have.
    for i in 0..40 {
        let prefix = Prefix::new(format!("/extra-{i}"));
        producer.add_sync_node(prefix.clone());
        producer
            .publish_data(prefix, format!("payload {i}").into_bytes(), Duration::from_secs(1))
            .await
            .expect("publish failed");
    }

    // The threshold flush should resolve the pending entry well before
    // the consumer's own 300ms interest-lifetime timeout would.
    tokio::time::timeout(Duration::from_millis(200), consumer_task)
        .await
        .expect("threshold flush did not happen before the interest lifetime")
        .expect("consumer task panicked");

    // Nothing the consumer is subscribed to advanced, so no MissingData
    // is surfaced even though the producer had to flush the entry.
    assert!(collector.snapshot().is_empty());
}

#[tokio::test]
async fn undecodable_diff_is_nacked_and_recovered_by_reissue() {
    let sync_prefix = "/psync";
    let expected_entries = 80;
    let (producer, network) = spawn_test_producer(sync_prefix, expected_entries);
    producer.add_sync_node(Prefix::new("/a"));
    tokio::time::sleep(Duration::from_millis(20)).await;

    let consumer_face = Arc::new(network.face());
    let collector = UpdateCollector::default();
    let mut consumer = LogicConsumer::new(
        test_consumer_config(sync_prefix, expected_entries),
        consumer_face,
        Arc::new(NoOpHelloCallback),
        Arc::new(collector.clone()),
    );
    consumer.send_hello_interest().await.expect("hello failed");

    // Advance the producer far beyond what the consumer's stale IBLT
    // snapshot can still decode against: 200 new prefixes, each
    // contributing a fresh hash the consumer has never seen.
    for i in 0..200 {
        producer.add_sync_node(Prefix::new(format!("/extra-{i}")));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    // First sync interest: diff is undecodable, producer NACKs; the
    // consumer must accept that as a normal reply (not hang until
    // timeout) and must not surface any MissingData for it.
    tokio::time::timeout(Duration::from_millis(200), consumer.send_sync_interest())
        .await
        .expect("NACK path took as long as a timeout would")
        .expect("sync interest errored instead of accepting the NACK");
    assert!(collector.snapshot().is_empty());

    // Reissuing now compares the consumer's freshly-overwritten IBLT
    // (learned from the NACK reply) against the producer's current one:
    // zero diff, so this goes pending normally rather than erroring.
    let second = tokio::spawn(async move { consumer.send_sync_interest().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!second.is_finished(), "expected the second sync interest to be pending, not resolved");
    second.abort();
}

#[test]
fn add_and_remove_sync_node_is_symmetric() {
    let network = InMemoryNetwork::new();
    let face = Arc::new(network.face());
    let scheduler = InMemoryScheduler::new();
    let keychain = InMemoryKeyChain::new();
    let store = InMemoryDataStore::new();

    let (mut repo, _expired_rx) = LogicRepo::new(SyncConfig::new(80, "/psync"), face, scheduler, keychain, store);
    let before = repo.iblt().clone();

    repo.add_sync_node(Prefix::new("/x"));
    assert_ne!(repo.iblt(), &before);
    repo.remove_sync_node(&Prefix::new("/x"));

    assert_eq!(repo.iblt(), &before);
    assert_eq!(repo.seq_of(&Prefix::new("/x")), None);
}

#[tokio::test]
async fn hello_replies_are_never_cacheable() {
    let sync_prefix = "/psync";
    let (producer, network) = spawn_test_producer(sync_prefix, 80);
    producer.add_sync_node(Prefix::new("/a"));
    tokio::time::sleep(Duration::from_millis(20)).await;

    for _ in 0..2 {
        let consumer_face = network.face();
        let event = consumer_face
            .express_interest(wire::hello_interest_name(&Name::from_uri(sync_prefix)), Duration::from_secs(2), true)
            .await
            .expect("hello interest failed");
        match event {
            FaceEvent::Data(data) => assert!(!data.can_be_cached, "hello reply must not be cacheable"),
            other => panic!("expected a hello Data reply, got {other:?}"),
        }
    }
}

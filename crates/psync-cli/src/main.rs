//! Demo binary wiring one [`LogicRepo`] producer and one [`LogicConsumer`]
//! over a shared in-memory face: registers the producer's
//! prefixes, subscribes the consumer to a subset of them, publishes a few
//! updates, and prints the hello/update traffic as it arrives.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use psync_config::{ConsumerConfig, SyncConfig};
use psync_core::consumer::{HelloCallback, LogicConsumer, UpdateCallback};
use psync_core::producer::LogicRepo;
use psync_core::producer_actor::spawn_producer;
use psync_face_inmemory::{InMemoryDataStore, InMemoryKeyChain, InMemoryNetwork, InMemoryScheduler};
use psync_types::{MissingData, Name, Prefix, SeqNo};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "psync demo: a producer and a consumer synchronizing over an in-memory face"
)]
struct Cli {
    /// IBLT sizing: expected number of distinct (prefix, seq) pairs live at once.
    #[arg(long, default_value_t = 80)]
    expected_entries: usize,

    /// Bloom filter false-positive rate for the consumer's subscription set.
    #[arg(long, default_value_t = 0.01)]
    false_positive_rate: f64,

    /// Sync prefix shared by producer and consumer.
    #[arg(long, default_value = "/psync")]
    sync_prefix: String,

    /// Prefixes the producer registers at startup.
    #[arg(long, num_args = 1.., default_values_t = ["/node-a".to_string(), "/node-b".to_string()])]
    prefix: Vec<String>,

    /// Prefixes the consumer subscribes to (need not be a full subset of `--prefix`).
    #[arg(long, num_args = 1.., default_values_t = ["/node-a".to_string()])]
    subscribe: Vec<String>,

    /// Number of Data packets to publish on the first `--prefix` entry.
    #[arg(long, default_value_t = 3)]
    publications: u32,
}

/// Prints the live prefix/seq map learned at hello.
struct HelloLogger;

impl HelloCallback for HelloLogger {
    fn on_receive_hello(&self, prefixes: &HashMap<Prefix, SeqNo>) {
        let mut entries: Vec<_> = prefixes.iter().collect();
        entries.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));
        for (prefix, seq) in entries {
            println!("hello: {prefix} at seq {seq}");
        }
    }
}

/// Prints every [`MissingData`] batch the consumer learns about.
struct UpdateLogger;

impl UpdateCallback for UpdateLogger {
    fn on_update(&self, missing: Vec<MissingData>) {
        for item in missing {
            println!("update: {} advanced {}..={}", item.prefix, item.low, item.high);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let network = InMemoryNetwork::new();
    let producer_face = Arc::new(network.face());
    let consumer_face = Arc::new(network.face());

    let sync_config = SyncConfig::new(cli.expected_entries, cli.sync_prefix.clone());
    let scheduler = InMemoryScheduler::new();
    let keychain = InMemoryKeyChain::new();
    let store = InMemoryDataStore::new();

    let (repo, expired_rx) = LogicRepo::new(sync_config, producer_face.clone(), scheduler, keychain, store);

    let sync_prefix_name = Name::from_uri(&cli.sync_prefix);
    let (producer, _producer_task) = spawn_producer(repo, sync_prefix_name, producer_face, expired_rx)
        .context("failed to start producer task")?;

    for prefix in &cli.prefix {
        producer.add_sync_node(Prefix::new(prefix.clone()));
    }

    let consumer_config = ConsumerConfig::new(
        cli.sync_prefix.clone(),
        cli.expected_entries as u32,
        cli.false_positive_rate,
    );
    let mut consumer = LogicConsumer::new(
        consumer_config,
        consumer_face,
        Arc::new(HelloLogger),
        Arc::new(UpdateLogger),
    );
    for prefix in &cli.subscribe {
        consumer.add_sl(Prefix::new(prefix.clone()));
    }

    // Give the producer task a moment to process the `addSyncNode` commands
    // above before the consumer's hello interest arrives.
    tokio::time::sleep(Duration::from_millis(20)).await;

    consumer.send_hello_interest().await.context("hello interest failed")?;

    let consumer_task = tokio::spawn(async move {
        loop {
            if let Err(err) = consumer.send_sync_interest().await {
                tracing::warn!(error = %err, "consumer sync interest failed, stopping");
                return;
            }
        }
    });

    if let Some(first) = cli.prefix.first() {
        let prefix = Prefix::new(first.clone());
        for i in 0..cli.publications {
            tokio::time::sleep(Duration::from_millis(100)).await;
            let name = producer
                .publish_data(prefix.clone(), format!("payload #{i}").into_bytes(), Duration::from_secs(5))
                .await
                .context("publish failed")?;
            println!("published: {name:?}");
        }
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    consumer_task.abort();

    Ok(())
}

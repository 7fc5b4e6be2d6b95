//! Drives a [`LogicRepo`] from one exclusively-owning task.
//!
//! The engine itself is a plain `&mut self` struct with no internal
//! locking: it is not meant to be shared across tasks. A single-threaded
//! cooperative event loop is realized here as an actor task that owns the
//! engine exclusively and receives work over channels, replying via
//! `oneshot` where the caller needs a result. Three event sources feed
//! the loop: application commands, hello/sync Interests forwarded by
//! [`SyncInterestForwarder`] (an `InterestHandler` can't hold `&mut
//! LogicRepo` itself), and pending-entry expirations forwarded from the
//! channel `LogicRepo::new` hands back.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use psync_types::{Data, Name, Prefix};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::EngineError;
use crate::face::{DataStore, Face, InterestHandler, KeyChain, Scheduler};
use crate::producer::LogicRepo;
use crate::wire;

/// Application-facing commands accepted by a running producer task.
enum ProducerCommand {
    AddSyncNode(Prefix),
    RemoveSyncNode(Prefix),
    PublishData {
        prefix: Prefix,
        content: Vec<u8>,
        freshness: Duration,
        reply: oneshot::Sender<Result<Option<Name>, EngineError>>,
    },
}

/// A cloneable front for a producer task spawned by [`spawn_producer`].
/// State lives behind the task; callers only ever see a channel.
#[derive(Clone)]
pub struct ProducerHandle {
    commands: mpsc::UnboundedSender<ProducerCommand>,
}

impl ProducerHandle {
    /// `addSyncNode`, dispatched to the owning task. Fire-and-forget:
    /// there is nothing useful to return.
    pub fn add_sync_node(&self, prefix: Prefix) {
        let _ = self.commands.send(ProducerCommand::AddSyncNode(prefix));
    }

    /// `removeSyncNode`, dispatched to the owning task.
    pub fn remove_sync_node(&self, prefix: Prefix) {
        let _ = self.commands.send(ProducerCommand::RemoveSyncNode(prefix));
    }

    /// `publishData`; awaits the task's reply so the caller learns
    /// the name actually published (or that the prefix was unknown and
    /// the publish was dropped).
    pub async fn publish_data(
        &self,
        prefix: Prefix,
        content: impl Into<Vec<u8>>,
        freshness: Duration,
    ) -> Result<Option<Name>, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(ProducerCommand::PublishData {
                prefix,
                content: content.into(),
                freshness,
                reply: reply_tx,
            })
            .map_err(|_| EngineError::Precondition("producer task is no longer running"))?;
        reply_rx
            .await
            .map_err(|_| EngineError::Precondition("producer task dropped the reply channel"))?
    }
}

/// Forwards every Interest matching the registered sync prefix into the
/// producer task's event loop instead of answering inline.
struct SyncInterestForwarder {
    tx: mpsc::UnboundedSender<(Name, Duration)>,
}

#[async_trait]
impl InterestHandler for SyncInterestForwarder {
    async fn handle(&self, interest_name: Name, remaining_lifetime: Duration) -> Option<Data> {
        let _ = self.tx.send((interest_name, remaining_lifetime));
        None
    }
}

/// Spawns a task that owns `repo` exclusively, registers the sync-prefix
/// Interest filter on `face`, and drives the engine from application
/// commands, forwarded hello/sync Interests, and pending-entry
/// expirations until the returned [`ProducerHandle`] (and any clones) are
/// dropped.
pub fn spawn_producer<F, S, K, D>(
    mut repo: LogicRepo<F, S, K, D>,
    sync_prefix: Name,
    face: Arc<F>,
    mut expired_rx: mpsc::UnboundedReceiver<Name>,
) -> Result<(ProducerHandle, JoinHandle<()>), EngineError>
where
    F: Face + 'static,
    S: Scheduler + 'static,
    K: KeyChain + 'static,
    D: DataStore + 'static,
{
    let (command_tx, mut command_rx) = mpsc::unbounded_channel();
    let (interest_tx, mut interest_rx) = mpsc::unbounded_channel();

    let forwarder = Arc::new(SyncInterestForwarder { tx: interest_tx });
    face.set_interest_filter(sync_prefix.clone(), forwarder)?;

    let sync_prefix_len = sync_prefix.len();

    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;

                Some((name, lifetime)) = interest_rx.recv() => {
                    let result = if wire::is_hello_interest(&name, sync_prefix_len) {
                        repo.on_hello_interest(&sync_prefix).await
                    } else {
                        repo.on_sync_interest(name, sync_prefix_len, lifetime).await
                    };
                    if let Err(err) = result {
                        tracing::warn!(error = %err, "failed to answer hello/sync interest");
                    }
                }

                Some(name) = expired_rx.recv() => {
                    repo.on_pending_expire(&name);
                }

                command = command_rx.recv() => {
                    let Some(command) = command else {
                        tracing::debug!("producer command channel closed, stopping producer task");
                        return;
                    };
                    match command {
                        ProducerCommand::AddSyncNode(prefix) => repo.add_sync_node(prefix),
                        ProducerCommand::RemoveSyncNode(prefix) => repo.remove_sync_node(&prefix),
                        ProducerCommand::PublishData { prefix, content, freshness, reply } => {
                            let result = repo.publish_data(&prefix, content, freshness).await;
                            let _ = reply.send(result);
                        }
                    }
                }
            }
        }
    });

    Ok((ProducerHandle { commands: command_tx }, join))
}

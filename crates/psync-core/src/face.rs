//! The face, scheduler, keychain, and data-store contracts.
//!
//! These are pure collaborator interfaces: the sync core is specified
//! against them and never against a concrete network stack. A concrete
//! in-memory implementation, built around a channel-actor pattern, lives
//! in the separate `psync-face-inmemory` crate and exists to exercise the
//! engines in tests and the demo binary; it is not part of the protocol
//! core itself.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use psync_types::{Data, Name};
use thiserror::Error;

/// Failures raised by a face implementation. Canonically defined here
/// (rather than duplicated per face implementation) so `EngineError` can
/// wrap it with a single `#[from]` regardless of which concrete face is
/// plugged in.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaceError {
    #[error("face channel closed")]
    Closed,
    #[error("interest timed out")]
    Timeout,
    #[error("interest was nacked")]
    Nack,
    #[error("failed to register interest filter: {0}")]
    RegisterFilterFailed(String),
}

/// The outcome of an `express_interest` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaceEvent {
    Data(Data),
    Nack,
    Timeout,
}

/// Opaque handle to a scheduled event, returned by [`Scheduler::schedule`]
/// and consumed by [`Scheduler::cancel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventHandle(pub u64);

/// Handles an incoming Interest matching a registered filter. Returning
/// `Some(data)` tells the face to answer immediately (the ordinary
/// "serve a stored Data" case); returning `None` means the handler will
/// (or already did) answer out-of-band via [`Face::put`]: the shape the
/// producer engine uses for hello/sync replies, which it builds, signs,
/// and sends itself.
#[async_trait]
pub trait InterestHandler: Send + Sync {
    async fn handle(&self, interest_name: Name, remaining_lifetime: Duration) -> Option<Data>;
}

#[async_trait]
pub trait Face: Send + Sync {
    async fn express_interest(
        &self,
        name: Name,
        lifetime: Duration,
        must_be_fresh: bool,
    ) -> Result<FaceEvent, FaceError>;

    fn set_interest_filter(
        &self,
        prefix: Name,
        handler: Arc<dyn InterestHandler>,
    ) -> Result<(), FaceError>;

    async fn put(&self, data: Data) -> Result<(), FaceError>;
}

/// The scheduler primitive used to time pending-entry expirations.
/// `action` is boxed rather than generic so `Scheduler` can be
/// object-safe and stored behind an `Arc<dyn Scheduler>`.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, delay: Duration, action: Box<dyn FnOnce() + Send>) -> EventHandle;
    fn cancel(&self, handle: EventHandle);
}

/// Signs a `Data` packet. Signing itself is out of scope for the sync
/// core; this trait exists only so the engine can call `sign` at the
/// right points without knowing how.
pub trait KeyChain: Send + Sync {
    fn sign(&self, data: &mut Data);
}

/// In-memory Data storage for serving fetches, out of scope for the
/// core's own logic beyond `insert`/`find`.
pub trait DataStore: Send + Sync {
    fn insert(&self, data: Data);
    fn find(&self, name: &Name) -> Option<Data>;
}

/// An [`InterestHandler`] that answers application-data fetches straight
/// out of a [`DataStore`]: `publish_data` places Data here, and the
/// registered filter from `add_sync_node` serves it back out.
pub struct AppDataInterestHandler<D: DataStore> {
    store: Arc<D>,
}

impl<D: DataStore> AppDataInterestHandler<D> {
    pub fn new(store: Arc<D>) -> Self {
        AppDataInterestHandler { store }
    }
}

#[async_trait]
impl<D: DataStore + 'static> InterestHandler for AppDataInterestHandler<D> {
    async fn handle(&self, interest_name: Name, _remaining_lifetime: Duration) -> Option<Data> {
        self.store.find(&interest_name)
    }
}

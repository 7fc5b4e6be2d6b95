//! The core synchronization engine of a partial-sync (PSync) protocol:
//! the IBLT/Bloom-filter set-reconciliation scheme and the producer and
//! consumer state machines built on top of it.

pub mod bloom;
pub mod codec;
pub mod consumer;
pub mod error;
pub mod face;
pub mod hash;
pub mod iblt;
pub mod producer;
pub mod producer_actor;
pub mod util;
pub mod wire;

pub use bloom::BloomFilter;
pub use consumer::LogicConsumer;
pub use error::{CodecError, EngineError};
pub use face::{
    AppDataInterestHandler, DataStore, EventHandle, Face, FaceError, FaceEvent, InterestHandler, KeyChain,
    Scheduler,
};
pub use iblt::{HashCell, Iblt};
pub use producer::LogicRepo;
pub use producer_actor::{spawn_producer, ProducerHandle};

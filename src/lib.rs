//! Background job processing compatible with Sidekiq's Redis format.
//!
//! A [`Node`] pulls JSON-encoded jobs from one or more queue sets with
//! blocking pops and fans them out to groups of workers, with a two-phase
//! graceful shutdown. An [`Enqueuer`] pushes jobs onto the same queues.

mod connection;
mod dequeuer;
mod enqueuer;
mod error;
mod job;
mod node;
mod pool;
mod queue_set;
mod retry;
mod shutdown;
mod sidekiq;
mod worker;
mod worker_manager;

pub mod tracing_config;

pub use self::{
    connection::{ConnProvider, LongPollConn},
    enqueuer::Enqueuer,
    error::Error,
    job::Job,
    node::Node,
    pool::{RedisConfig, RedisPool},
    queue_set::{OrderedQueueSet, QueueSet, RandomQueueSet},
    shutdown::{Shutdown, ShutdownConsumer},
    worker::{Worker, WorkerFn},
};

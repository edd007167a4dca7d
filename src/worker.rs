use std::future::Future;

use async_trait::async_trait;

use crate::{job::Job, shutdown::ShutdownConsumer};

/// Processes jobs from one or more queues. Implementations must be safe
/// for concurrent use.
///
/// The context reports whether the node has given up waiting for
/// in-flight jobs; a long-running worker should watch it and wind down
/// once it fires.
#[async_trait]
pub trait Worker: Send + Sync {
    async fn work(&self, ctx: ShutdownConsumer, job: Job) -> Result<(), anyhow::Error>;
}

/// Adapter to allow the use of plain async functions as workers.
///
/// ```no_run
/// use kogeri::{Job, ShutdownConsumer, WorkerFn};
///
/// let worker = WorkerFn::new(|_ctx: ShutdownConsumer, job: Job| async move {
///     println!("processing {}", job.id());
///     Ok::<(), anyhow::Error>(())
/// });
/// ```
pub struct WorkerFn<F>(F);

impl<F> WorkerFn<F> {
    pub fn new(f: F) -> WorkerFn<F> {
        WorkerFn(f)
    }
}

#[async_trait]
impl<F, Fut> Worker for WorkerFn<F>
where
    F: Fn(ShutdownConsumer, Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), anyhow::Error>> + Send + 'static,
{
    async fn work(&self, ctx: ShutdownConsumer, job: Job) -> Result<(), anyhow::Error> {
        (self.0)(ctx, job).await
    }
}

//! Enqueues a few jobs and runs a worker node against a local Redis.
//! Stop it with ctrl-c; in-flight jobs get a 10 second grace period.

use std::{sync::Arc, time::Duration};

use kogeri::{
    Enqueuer, Job, Node, OrderedQueueSet, RandomQueueSet, RedisConfig, RedisPool,
    ShutdownConsumer, WorkerFn,
};
use tracing::{event, Level};

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv::dotenv().ok();
    kogeri::tracing_config::configure("kogeri-demo");

    let pool = Arc::new(RedisPool::new(RedisConfig::from_env())?);
    let long_poll_timeout = pool.config().long_poll_timeout;

    let enqueuer = Enqueuer::new(pool.clone());

    let mut critical = Job::new();
    critical.set_queue("critical").set_class("CriticalJob");
    enqueuer.enqueue(&mut critical).await?;

    let mut low = Job::new();
    low.set_queue("low_priority").set_class("LowPriorityJob");
    enqueuer.enqueue(&mut low).await?;

    let node = Arc::new(Node::new(pool, long_poll_timeout));

    node.process_queues(
        OrderedQueueSet::new(vec!["critical"]),
        WorkerFn::new(|_ctx: ShutdownConsumer, job: Job| async move {
            event!(Level::INFO, queue = %job.queue(), class = %job.class(), id = %job.id(), "Working");
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), anyhow::Error>(())
        }),
        1,
    );

    let mut weighted = RandomQueueSet::new();
    weighted.add("low_priority", 1).add("high_priority", 3);

    node.process_queues(
        weighted,
        WorkerFn::new(|_ctx: ShutdownConsumer, job: Job| async move {
            event!(Level::INFO, queue = %job.queue(), class = %job.class(), id = %job.id(), "Working");
            tokio::time::sleep(Duration::from_secs(7)).await;
            Ok::<(), anyhow::Error>(())
        }),
        5,
    );

    let run_node = node.clone();
    let run_task = tokio::spawn(async move { run_node.run().await });

    tokio::signal::ctrl_c().await?;
    event!(Level::INFO, "Shutting down");

    node.stop(Some(Duration::from_secs(10))).await;
    run_task.await?;

    Ok(())
}

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use futures::future::join_all;
use tokio::sync::watch;
use tracing::{event, Level};

use crate::{
    connection::ConnProvider,
    dequeuer::Dequeuer,
    queue_set::QueueSet,
    shutdown::Shutdown,
    worker::Worker,
    worker_manager::WorkerManager,
};

/// A single server instance, processing any number of queue sets with as
/// many worker instances each as needed.
pub struct Node {
    cp: Arc<dyn ConnProvider>,
    long_poll_timeout: u64,

    // Base context for workers; cancelled only when the grace period
    // expires during stop.
    base: Shutdown,

    managers: Mutex<Vec<Arc<WorkerManager>>>,

    // Flips to true once `run` has joined every manager.
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl Node {
    pub fn new(cp: Arc<dyn ConnProvider>, long_poll_timeout: u64) -> Node {
        let (done_tx, done_rx) = watch::channel(false);
        Node {
            cp,
            long_poll_timeout,
            base: Shutdown::new(),
            managers: Mutex::new(Vec::new()),
            done_tx,
            done_rx,
        }
    }

    /// Configures the node to process the given queue set with the desired
    /// number of worker instances.
    ///
    /// Call it as many times as needed with different queue sets and
    /// workers, but not after `run`: the running node does not pick up new
    /// registrations.
    pub fn process_queues<Q, W>(&self, qset: Q, worker: W, instances: usize)
    where
        Q: QueueSet + 'static,
        W: Worker + 'static,
    {
        let (dequeuer, rx) =
            Dequeuer::new(self.cp.clone(), Box::new(qset), self.long_poll_timeout);
        let manager = WorkerManager::new(dequeuer, rx, Arc::new(worker), instances);
        self.managers.lock().unwrap().push(Arc::new(manager));
    }

    /// Starts taking jobs from the queues and passing them to workers.
    /// Blocks until the node is shut down; see `stop`.
    pub async fn run(&self) {
        let managers: Vec<Arc<WorkerManager>> = self.managers.lock().unwrap().clone();

        event!(Level::DEBUG, "Starting managers");

        let mut tasks = Vec::with_capacity(managers.len());
        for m in managers {
            let base = self.base.consumer();
            tasks.push(tokio::spawn(async move { m.run(base).await }));
        }

        event!(Level::INFO, "Running");

        for res in join_all(tasks).await {
            if let Err(e) = res {
                event!(Level::ERROR, error = %e, "Manager panicked");
            }
        }

        self.done_tx.send(true).ok();
    }

    /// Initiates shutdown. Once it completes, the call to `run` returns.
    ///
    /// New jobs are not taken from the queues any more. Workers currently
    /// processing jobs get the grace period to finish; when it expires,
    /// the context passed to every worker is cancelled. With no grace
    /// period the node waits for in-flight jobs indefinitely.
    ///
    /// Call it only while `run` is in progress. Blocks until the shutdown
    /// process has completed.
    pub async fn stop(&self, grace: Option<Duration>) {
        match grace {
            Some(d) => {
                event!(Level::INFO, timeout = ?d, "Stopping managers with a grace period")
            }
            None => event!(Level::INFO, "Stopping managers with no deadline"),
        }

        for m in self.managers.lock().unwrap().iter() {
            m.stop();
        }

        let mut done = self.done_rx.clone();
        match grace {
            Some(d) => match tokio::time::timeout(d, wait_done(&mut done)).await {
                Ok(()) => event!(Level::INFO, "Managers have stopped within the grace period"),
                Err(_) => {
                    event!(Level::WARN, "Timeout while waiting, aborting the remaining workers")
                }
            },
            None => wait_done(&mut done).await,
        }

        // A no-op when everything already stopped gracefully.
        self.base.shutdown();
        wait_done(&mut done).await;

        event!(Level::INFO, "Stopped");
    }
}

async fn wait_done(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

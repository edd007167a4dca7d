use std::{
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex},
};

use anyhow::anyhow;
use futures::{future::join_all, FutureExt};
use tokio::sync::mpsc;
use tracing::{event, Level};

use crate::{
    dequeuer::{Dequeuer, WorkItem},
    job::Job,
    shutdown::ShutdownConsumer,
    worker::Worker,
};

/// Controls a group of runners processing one queue set, fed by a single
/// dequeuer.
pub(crate) struct WorkerManager {
    dequeuer: Arc<Dequeuer>,
    rx: Mutex<Option<mpsc::Receiver<WorkItem>>>,
    worker: Arc<dyn Worker>,
    instances: usize,
    queue_names: Vec<String>,
}

impl WorkerManager {
    pub fn new(
        dequeuer: Dequeuer,
        rx: mpsc::Receiver<WorkItem>,
        worker: Arc<dyn Worker>,
        instances: usize,
    ) -> WorkerManager {
        let queue_names = dequeuer.queue_names().to_vec();
        WorkerManager {
            dequeuer: Arc::new(dequeuer),
            rx: Mutex::new(Some(rx)),
            worker,
            instances,
            queue_names,
        }
    }

    /// Starts the dequeuer and the runners, and blocks until all of them
    /// have stopped. The provided context becomes the base context for the
    /// workers.
    pub async fn run(&self, base: ShutdownConsumer) {
        let rx = match self.rx.lock().unwrap().take() {
            Some(rx) => rx,
            None => return,
        };

        event!(Level::DEBUG, queue_set = ?self.queue_names, "Starting manager");

        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let mut tasks = Vec::with_capacity(self.instances + 1);

        let dq = self.dequeuer.clone();
        tasks.push(tokio::spawn(async move { dq.run().await }));

        for n in 1..=self.instances {
            let rx = rx.clone();
            let worker = self.worker.clone();
            let base = base.clone();
            tasks.push(tokio::spawn(job_loop(n, rx, worker, base)));
        }

        for res in join_all(tasks).await {
            if let Err(e) = res {
                event!(Level::ERROR, error = %e, "Manager task panicked");
            }
        }

        event!(Level::DEBUG, queue_set = ?self.queue_names, "Manager stopped");
    }

    /// Initiates shutdown: no new jobs are taken from the queues, while
    /// jobs already picked up are allowed to finish. Does not block.
    pub fn stop(&self) {
        self.dequeuer.stop();
    }
}

async fn job_loop(
    n: usize,
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<WorkItem>>>,
    worker: Arc<dyn Worker>,
    base: ShutdownConsumer,
) {
    event!(Level::DEBUG, worker = n, "Runner started");

    loop {
        // The lock is only held while waiting for the next item, so busy
        // runners do not keep idle ones from receiving.
        let item = rx.lock().await.recv().await;
        let item = match item {
            Some(item) => item,
            None => {
                event!(Level::DEBUG, worker = n, "No more work");
                return;
            }
        };

        let job = match Job::from_json(&item.payload) {
            Ok(job) => job,
            Err(e) => {
                event!(Level::WARN, worker = n, error = %e, "Invalid job");
                continue;
            }
        };

        let job_id = job.id().to_string();
        event!(Level::INFO, worker = n, job_id = %job_id, queue = %item.queue, "Processing");

        match safely_work(worker.as_ref(), base.clone(), job).await {
            Ok(()) => event!(Level::INFO, worker = n, job_id = %job_id, "Job done"),
            Err(e) => {
                event!(Level::WARN, worker = n, job_id = %job_id, error = %e, "Job has failed")
            }
        }
    }
}

/// Invokes the worker, converting a panic into an error so that one bad
/// job cannot take its runner down.
async fn safely_work(
    worker: &dyn Worker,
    ctx: ShutdownConsumer,
    job: Job,
) -> Result<(), anyhow::Error> {
    match AssertUnwindSafe(worker.work(ctx, job)).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            Err(anyhow!("worker panic: {}", msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::shutdown::Shutdown;

    struct FlakyWorker {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Worker for FlakyWorker {
        async fn work(&self, _ctx: ShutdownConsumer, _job: Job) -> Result<(), anyhow::Error> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("boom");
            }
            Ok(())
        }
    }

    fn payload(class: &str) -> Vec<u8> {
        let mut job = Job::new();
        job.set_class(class);
        job.set_defaults();
        job.encode().unwrap()
    }

    fn item(class: &str) -> WorkItem {
        WorkItem {
            queue: "default".to_string(),
            payload: payload(class),
        }
    }

    #[tokio::test]
    async fn panicking_worker_does_not_kill_its_runner() {
        let (tx, rx) = mpsc::channel(1);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let calls = Arc::new(AtomicUsize::new(0));
        let worker: Arc<dyn Worker> = Arc::new(FlakyWorker {
            calls: calls.clone(),
        });

        let shutdown = Shutdown::new();
        let runner = tokio::spawn(job_loop(1, rx, worker, shutdown.consumer()));

        tx.send(item("FirstJob")).await.unwrap();
        tx.send(item("SecondJob")).await.unwrap();
        drop(tx);

        runner.await.expect("runner must survive a worker panic");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalid_payloads_are_discarded() {
        let (tx, rx) = mpsc::channel(1);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let calls = Arc::new(AtomicUsize::new(0));
        let worker: Arc<dyn Worker> = Arc::new(FlakyWorker {
            calls: calls.clone(),
        });
        // Skip the panic on the first call.
        calls.fetch_add(1, Ordering::SeqCst);

        let shutdown = Shutdown::new();
        let runner = tokio::spawn(job_loop(1, rx, worker, shutdown.consumer()));

        tx.send(WorkItem {
            queue: "default".to_string(),
            payload: b"not json".to_vec(),
        })
        .await
        .unwrap();
        tx.send(item("GoodJob")).await.unwrap();
        drop(tx);

        runner.await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn panic_becomes_an_error() {
        let worker = FlakyWorker {
            calls: Arc::new(AtomicUsize::new(0)),
        };
        let shutdown = Shutdown::new();

        let mut job = Job::new();
        job.set_class("PanicJob");

        let err = safely_work(&worker, shutdown.consumer(), job)
            .await
            .expect_err("panic must surface as an error");
        assert_eq!(err.to_string(), "worker panic: boom");
    }
}

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tokio::sync::mpsc;
use tracing::{event, Level};

use crate::{
    connection::{ConnProvider, LongPollConn},
    queue_set::QueueSet,
    shutdown::{Shutdown, ShutdownConsumer},
};

/// One unit of work read from a queue: the queue name (without the key
/// prefix) and the raw payload.
pub(crate) struct WorkItem {
    pub queue: String,
    pub payload: Vec<u8>,
}

/// Reads jobs from a set of queues over a dedicated long-poll connection
/// and hands them out over a channel. The channel is closed exactly once,
/// when the dequeuer stops, signalling that no more work is coming.
pub(crate) struct Dequeuer {
    cp: Arc<dyn ConnProvider>,
    qset: Mutex<Box<dyn QueueSet>>,
    queue_names: Vec<String>,
    pop_timeout: u64,
    shutdown: Shutdown,
    tx: Mutex<Option<mpsc::Sender<WorkItem>>>,
}

impl Dequeuer {
    pub fn new(
        cp: Arc<dyn ConnProvider>,
        qset: Box<dyn QueueSet>,
        pop_timeout: u64,
    ) -> (Dequeuer, mpsc::Receiver<WorkItem>) {
        // Capacity 1 keeps backpressure on the broker: the next pop cannot
        // be issued until a runner has taken the previous item.
        let (tx, rx) = mpsc::channel(1);
        let queue_names = qset.names().to_vec();
        let dq = Dequeuer {
            cp,
            qset: Mutex::new(qset),
            queue_names,
            pop_timeout,
            shutdown: Shutdown::new(),
            tx: Mutex::new(Some(tx)),
        };
        (dq, rx)
    }

    pub fn queue_names(&self) -> &[String] {
        &self.queue_names
    }

    /// Runs until stopped, closing the work channel on the way out.
    pub async fn run(&self) {
        let tx = match self.tx.lock().unwrap().take() {
            Some(tx) => tx,
            None => return,
        };

        let mut stop = self.shutdown.consumer();
        self.connect_loop(&tx, &mut stop).await;
        drop(tx);

        event!(Level::DEBUG, queue_set = ?self.queue_names, "Dequeuer stopped");
    }

    /// Initiates shutdown without blocking. An in-flight blocking pop is
    /// abandoned, closing the connection it was issued on.
    pub fn stop(&self) {
        event!(Level::DEBUG, queue_set = ?self.queue_names, "Stopping dequeuer");
        self.shutdown.shutdown();
    }

    async fn connect_loop(&self, tx: &mpsc::Sender<WorkItem>, stop: &mut ShutdownConsumer) {
        loop {
            if stop.shutting_down() {
                return;
            }

            event!(Level::INFO, queue_set = ?self.queue_names, "Connecting");
            let dialled = tokio::select! {
                biased;
                _ = stop.wait_for_shutdown() => return,
                conn = self.cp.dial_long_poll() => conn,
            };

            match dialled {
                Ok(conn) => {
                    event!(Level::INFO, queue_set = ?self.queue_names, "Connected");
                    self.read_loop(conn, tx, stop).await;
                }
                Err(e) => {
                    event!(Level::ERROR, error = %e, "Failed to connect to Redis");
                    if !stop.shutting_down() {
                        tokio::select! {
                            biased;
                            _ = stop.wait_for_shutdown() => return,
                            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                        }
                    }
                }
            }
        }
    }

    async fn read_loop(
        &self,
        mut conn: LongPollConn,
        tx: &mpsc::Sender<WorkItem>,
        stop: &mut ShutdownConsumer,
    ) {
        // Any exit path drops `conn`, closing the socket; the outer loop
        // reconnects. A pop the server already answered is lost at most
        // once per reconnect, before anything was read from the reply.
        loop {
            if stop.shutting_down() {
                return;
            }

            let mut cmd = redis::cmd("BRPOP");
            {
                let mut qset = self.qset.lock().unwrap();
                for q in qset.get_queues() {
                    cmd.arg(format!("queue:{}", q));
                }
            }
            cmd.arg(self.pop_timeout);

            event!(Level::TRACE, "BRPOP");
            let reply = tokio::select! {
                biased;
                _ = stop.wait_for_shutdown() => return,
                r = tokio::time::timeout(
                    conn.read_timeout,
                    cmd.query_async::<_, Option<(String, Vec<u8>)>>(&mut conn.conn),
                ) => r,
            };

            match reply {
                Ok(Ok(Some((key, payload)))) => {
                    let queue = key.strip_prefix("queue:").unwrap_or(key.as_str()).to_string();
                    // A blocked send is deliberate backpressure; it only
                    // fails once every runner is gone.
                    if tx.send(WorkItem { queue, payload }).await.is_err() {
                        return;
                    }
                }
                Ok(Ok(None)) => {
                    event!(Level::TRACE, "BRPOP timeout");
                }
                Ok(Err(e)) => {
                    if e.kind() == redis::ErrorKind::TypeError {
                        event!(Level::ERROR, error = %e, "Unexpected reply from the queue set");
                    } else if !stop.shutting_down() {
                        event!(Level::ERROR, error = %e, "Failed to read from the queue set");
                    }
                    return;
                }
                Err(_) => {
                    if !stop.shutting_down() {
                        event!(Level::ERROR, "Timed out reading from the queue set");
                    }
                    return;
                }
            }
        }
    }
}

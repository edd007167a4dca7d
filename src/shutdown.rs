use tokio::sync::watch;

/// Owner side of a shutdown signal. Dropping it has the same effect as
/// calling [`Shutdown::shutdown`].
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
    consumer: ShutdownConsumer,
}

impl Shutdown {
    pub fn new() -> Shutdown {
        // The channel changes to true, or drops, when shutdown starts.
        let (tx, rx) = watch::channel(false);
        Shutdown {
            tx,
            consumer: ShutdownConsumer(rx),
        }
    }

    pub fn consumer(&self) -> ShutdownConsumer {
        self.consumer.clone()
    }

    /// Signals shutdown. Calling it more than once is fine.
    pub fn shutdown(&self) {
        self.tx.send(true).ok();
    }
}

impl Default for Shutdown {
    fn default() -> Shutdown {
        Shutdown::new()
    }
}

/// A clonable handle that observes a shutdown signal. This is the context
/// workers receive; a long-running worker should watch it and wind down
/// once it fires.
#[derive(Clone, Debug)]
pub struct ShutdownConsumer(watch::Receiver<bool>);

impl ShutdownConsumer {
    pub fn shutting_down(&self) -> bool {
        *self.0.borrow()
    }

    pub async fn wait_for_shutdown(&mut self) {
        if *self.0.borrow() {
            return;
        }
        loop {
            match self.0.changed().await {
                Ok(_) => {
                    if *self.0.borrow() {
                        return;
                    }
                }
                // Sender dropped, which also means we are shutting down.
                Err(_) => return,
            }
        }
    }
}

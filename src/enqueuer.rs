use std::sync::Arc;

use crate::{connection::ConnProvider, error::Error, job::Job};

/// Puts jobs in queues.
pub struct Enqueuer {
    cp: Arc<dyn ConnProvider>,
}

impl Enqueuer {
    pub fn new(cp: Arc<dyn ConnProvider>) -> Enqueuer {
        Enqueuer { cp }
    }

    /// Adds the job to the queue configured in the job, or the default
    /// queue if none is configured. Fills in the job's identifier,
    /// timestamps and retry policy first.
    pub async fn enqueue(&self, job: &mut Job) -> Result<(), Error> {
        job.set_defaults();
        let payload = job.encode()?;

        let mut conn = self.cp.conn().await?;

        // One round trip: register the queue, then push the payload. An
        // error reply from either command fails the whole call.
        deadpool_redis::Pipeline::with_capacity(2)
            .cmd("SADD")
            .arg("queues")
            .arg(job.queue())
            .cmd("LPUSH")
            .arg(format!("queue:{}", job.queue()))
            .arg(payload)
            .query_async::<()>(&mut conn)
            .await
            .map_err(Error::Enqueue)?;

        Ok(())
    }
}

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Error;

/// Provides Redis connections, encapsulating how they are established and
/// configured. Implementations must be safe for concurrent use.
///
/// Cancelling a dial (dropping the future) must only affect the dial;
/// once established, a connection's lifetime is independent of it.
#[async_trait]
pub trait ConnProvider: Send + Sync {
    /// Returns a connection from a shared pool, suitable for short
    /// commands. The connection goes back to the pool when dropped.
    async fn conn(&self) -> Result<deadpool_redis::Connection, Error>;

    /// Returns a new, dedicated connection for blocking pops. The caller
    /// owns it; dropping it closes the socket.
    async fn dial_long_poll(&self) -> Result<LongPollConn, Error>;
}

/// A dedicated connection for blocking pops, carrying the read deadline
/// that covers the pop timeout plus transport slack.
pub struct LongPollConn {
    pub(crate) conn: redis::aio::Connection,
    pub(crate) read_timeout: Duration,
}

impl LongPollConn {
    pub fn new(conn: redis::aio::Connection, read_timeout: Duration) -> LongPollConn {
        LongPollConn { conn, read_timeout }
    }
}

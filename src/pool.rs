use std::{env, time::Duration};

use async_trait::async_trait;

use crate::{
    connection::{ConnProvider, LongPollConn},
    error::Error,
};

/// Configuration for Redis connections.
#[derive(Clone, Debug)]
pub struct RedisConfig {
    /// Connection URL.
    pub url: String,

    /// Timeout in seconds for the blocking pop that reads from the
    /// queues. Zero means the pop never times out on the server side;
    /// prefer a value, since the timeout doubles as a liveness ping for
    /// the connection.
    pub long_poll_timeout: u64,

    /// Size of the shared connection pool. Callers wait when the pool is
    /// exhausted.
    pub max_active: usize,

    /// Slack added on top of the pop timeout to form the long-poll read
    /// deadline.
    pub read_timeout: Duration,

    /// Deadline for establishing a connection.
    pub write_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> RedisConfig {
        RedisConfig {
            url: "redis://localhost".to_string(),
            long_poll_timeout: 30,
            max_active: 2,
            read_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
        }
    }
}

impl RedisConfig {
    /// Returns the default configuration, with the URL taken from the
    /// `REDIS_URL` environment variable when it is set.
    pub fn from_env() -> RedisConfig {
        let mut cfg = RedisConfig::default();
        if let Ok(url) = env::var("REDIS_URL") {
            cfg.url = url;
        }
        cfg
    }
}

/// The default [`ConnProvider`]: a shared pool for short commands and
/// fresh, dedicated connections for long polls.
pub struct RedisPool {
    cfg: RedisConfig,
    pool: deadpool_redis::Pool,
    client: redis::Client,
}

impl RedisPool {
    pub fn new(cfg: RedisConfig) -> Result<RedisPool, Error> {
        let client = redis::Client::open(cfg.url.as_str())?;
        let pool = deadpool_redis::Config {
            url: Some(cfg.url.clone()),
            pool: Some(deadpool::managed::PoolConfig::new(cfg.max_active)),
        }
        .create_pool()?;
        Ok(RedisPool { cfg, pool, client })
    }

    pub fn config(&self) -> &RedisConfig {
        &self.cfg
    }
}

#[async_trait]
impl ConnProvider for RedisPool {
    async fn conn(&self) -> Result<deadpool_redis::Connection, Error> {
        self.pool.get().await.map_err(Error::from)
    }

    async fn dial_long_poll(&self) -> Result<LongPollConn, Error> {
        let conn = match tokio::time::timeout(
            self.cfg.write_timeout,
            self.client.get_async_connection(),
        )
        .await
        {
            Ok(conn) => conn?,
            Err(_) => return Err(Error::Timeout),
        };

        let read_timeout =
            Duration::from_secs(self.cfg.long_poll_timeout) + self.cfg.read_timeout;
        Ok(LongPollConn::new(conn, read_timeout))
    }
}

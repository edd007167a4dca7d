use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Redis error {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis connection error {0}")]
    RedisPool(#[from] deadpool::managed::PoolError<::redis::RedisError>),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("enqueue job: {0}")]
    Enqueue(redis::RedisError),

    #[error("timed out")]
    Timeout,
}

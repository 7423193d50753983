//! Event sources feeding the dispatcher.

mod backoff;
mod http;
mod redis;

pub use backoff::{BackoffConfig, ExponentialBackoff};
pub use http::pubsub_push;
pub use redis::RedisSubscriber;

use thiserror::Error;

/// Errors from history and profile fetches.
///
/// Surfaced to the presentation sink as a loading/error state; never fatal
/// and never retried internally by the loader.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed with status {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("decode error: {0}")]
    Decode(String),
}

/// Errors from the optimistic-send path.
///
/// A failed durable write or live publish leaves the provisional entry
/// visible but unconfirmed; the client does not roll it back.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("message content is empty")]
    EmptyContent,

    #[error("session is not live")]
    NotLive,

    #[error("durable write failed: {0}")]
    Durable(String),

    #[error("live publish failed: {0}")]
    Publish(String),
}

/// Errors from the transport channel.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("connect failed: {0}")]
    Connect(String),

    #[error("transport is closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),
}

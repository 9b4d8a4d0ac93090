use thiserror::Error;

/// Error type for Room operations.
///
/// One-shot operations surface these to the caller. Background refresh and
/// channel paths never do: they fold failures into the connection monitor
/// and let the retry schedule recover.
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("server returned status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("invalid payload: {0}")]
    Json(#[from] serde_json::Error),

    /// The duplex channel to the server is gone and will not be revived
    /// for this handle.
    #[error("channel closed")]
    ChannelClosed,

    /// Operation on a subscription after `unsubscribe()`.
    #[error("subscription is closed")]
    SubscriptionClosed,

    #[error("internal error: {0}")]
    Internal(String),
}

pub type RoomResult<T> = Result<T, RoomError>;

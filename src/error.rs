use gesture_realtime_types::InvalidSequence;
use tokio_tungstenite::tungstenite;

use crate::client::ErrorInfo;

/// Errors returned synchronously by [`crate::playback::Sequencer`]
/// operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    #[error("invalid sequence: {0}")]
    InvalidSequence(#[from] InvalidSequence),
    #[error("no instructions to play")]
    EmptySequence,
    #[error("no sequence loaded")]
    NotLoaded,
    #[error("playback speed must be positive and finite, got {0}")]
    InvalidSpeed(f64),
    #[error("seek position must be non-negative and finite, got {0}")]
    InvalidSeek(f64),
}

/// Errors surfaced by the transport [`crate::Client`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("connection failed after {attempts} retries: {last_error}")]
    ConnectionFailed { attempts: u32, last_error: ErrorInfo },
    #[error("transport session has shut down")]
    Closed,
    #[error("websocket error: {0}")]
    Socket(#[from] tungstenite::Error),
    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

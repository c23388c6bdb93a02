use desktop_protocol::ErrorCode;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("worker unreachable at {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: std::io::Error,
    },
    #[error("websocket error: {0}")]
    Ws(#[from] tungstenite::Error),
    #[error("worker fault ({code:?}): {msg}")]
    Fault { code: ErrorCode, msg: String },
    #[error("undecodable frame from worker: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("request encoding failed: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("worker closed the session before replying to {0}")]
    Closed(&'static str),
    #[error("unexpected reply to {request}: {reply}")]
    Unexpected {
        request: &'static str,
        reply: String,
    },
}

/// A wire record that cannot become a domain record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedRecordError {
    #[error("record has no {0}")]
    Missing(&'static str),
    #[error("record has an empty {0}")]
    Empty(&'static str),
    #[error("{field} has negative size {width}x{height}")]
    NegativeSize {
        field: &'static str,
        width: i32,
        height: i32,
    },
    #[error("monitor handle {0:#x} does not fit a native handle")]
    HandleOutOfRange(i64),
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed wallpaper record: {0}")]
    Malformed(#[from] MalformedRecordError),
    #[error("control message encoding failed: {0}")]
    Message(#[source] serde_json::Error),
}

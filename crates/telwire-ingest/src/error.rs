use std::net::SocketAddr;

/// Errors that can occur while running the ingest server.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Failed to bind the listening socket.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// Frame-level error while preparing a connection.
    #[error("frame error: {0}")]
    Frame(#[from] telwire_codec::FrameError),
}

/// Errors delivering a decoded reading to the downstream sink.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Writing the record failed.
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serializing the record failed.
    #[error("sink serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Forwarding the record over HTTP failed.
    #[error("sink HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;

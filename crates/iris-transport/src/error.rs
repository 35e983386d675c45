use thiserror::Error;

/// Errors specific to the transport layer.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Send operation failed: {0}")]
    SendFailed(String),

    #[error("Receive operation failed: {0}")]
    ReceiveFailed(String),

    /// The peer sent bytes that do not form a `<length>:<json>` frame.
    #[error("Malformed packet frame: {0}")]
    Decode(String),

    /// The stream ended in the middle of a frame.
    #[error("Stream ended inside a packet frame")]
    Truncated,

    #[error("Connection timed out")]
    Timeout,

    #[error("Underlying I/O error: {0}")]
    Io(String),
}

// Helper for converting std::io::Error
impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

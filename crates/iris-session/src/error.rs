use iris_core::CoreError;
use iris_rdp::RdpError;
use thiserror::Error;

/// Errors surfaced by the session layer.
#[derive(Error, Debug)]
pub enum SessionError {
    /// Could not reach the browser's debugger server.
    #[error("Failed to connect to the browser: {0}")]
    Connect(String),

    /// The engine is too old for this bridge.
    #[error("Unsupported browser: {0}")]
    Unsupported(String),

    #[error("Launching the browser failed: {0}")]
    Launch(String),

    /// Only launch-wait and terminate-wait time out; requests never do.
    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Rdp(#[from] RdpError),

    #[error("Configuration error: {0}")]
    Config(#[from] CoreError),

    #[error("Unknown thread id {0}")]
    UnknownThread(i64),

    #[error("Thread has exited")]
    ThreadExited,

    #[error("Unknown frame id {0}")]
    UnknownFrame(i64),

    #[error("Unknown variables reference {0}")]
    UnknownVariablesReference(i64),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Actor system error: {0}")]
    Mailbox(String),
}

impl From<actix::MailboxError> for SessionError {
    fn from(err: actix::MailboxError) -> Self {
        SessionError::Mailbox(err.to_string())
    }
}

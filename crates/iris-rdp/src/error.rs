use iris_transport::TransportError;
use thiserror::Error;

/// Errors originating from the protocol layer.
#[derive(Error, Debug, Clone)]
pub enum RdpError {
    /// An error occurred in the transport layer underneath.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The connection is gone; pending and future requests fail with this.
    #[error("Connection closed")]
    Disconnected,

    /// The server-side actor replied with an error packet.
    #[error("Protocol error from {actor}: [{kind:?}] {message}")]
    Actor {
        actor: String,
        kind: ActorErrorKind,
        message: String,
    },

    /// A packet could not be parsed at all.
    #[error("Malformed packet: {0}")]
    Malformed(String),

    /// A reply parsed, but not into the shape the proxy expected.
    #[error("Unexpected reply shape: {0}")]
    UnexpectedReply(String),

    /// An error occurred within the actor system (e.g. mailbox closed).
    #[error("Actor system error: {0}")]
    Mailbox(String),

    /// The request was dropped before a response arrived.
    #[error("Request cancelled")]
    Cancelled,
}

/// Known error codes carried in the `error` field of a reply packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorErrorKind {
    WrongState,
    NoScript,
    NoCodeAtLineColumn,
    UnknownMethod,
    NoSuchActor,
    MissingParameter,
    BadParameterType,
    Other,
}

impl ActorErrorKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "wrongState" => ActorErrorKind::WrongState,
            "noScript" => ActorErrorKind::NoScript,
            "noCodeAtLineColumn" => ActorErrorKind::NoCodeAtLineColumn,
            "unknownMethod" | "unrecognizedPacketType" => ActorErrorKind::UnknownMethod,
            "noSuchActor" => ActorErrorKind::NoSuchActor,
            "missingParameter" => ActorErrorKind::MissingParameter,
            "badParameterType" => ActorErrorKind::BadParameterType,
            _ => ActorErrorKind::Other,
        }
    }
}

impl RdpError {
    /// `wrongState` during a pause/resume race is expected and safe to drop.
    pub fn is_benign_state_race(&self) -> bool {
        matches!(
            self,
            RdpError::Actor {
                kind: ActorErrorKind::WrongState,
                ..
            }
        )
    }
}

impl From<serde_json::Error> for RdpError {
    fn from(err: serde_json::Error) -> Self {
        RdpError::Malformed(err.to_string())
    }
}

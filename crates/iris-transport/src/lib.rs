//! # Iris Transport
//!
//! The low-level wire layer of the bridge: a length-prefixed JSON packet
//! stream (`<decimal-length>:<json-bytes>`) over a TCP socket, as spoken by
//! the browser's remote debugging server.
//!
//! The `Transport` trait abstracts the byte stream and splits it into
//! independent read/write halves; the `ConnectionActor` owns one such link
//! and pumps packets between the socket and the actor system.

pub mod codec;
pub mod connection;
pub mod error;
pub mod tcp;
pub mod traits;
pub mod types;

// Re-export key items
pub use connection::{
    CloseConnection, ConnectionActor, ConnectionState, LinkStateChanged, PacketReceived,
    WritePacket,
};
pub use error::TransportError;
pub use tcp::create_transport;
pub use traits::{PacketSink, PacketSource, Transport};
pub use types::ConnectParams;

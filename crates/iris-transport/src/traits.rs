use async_trait::async_trait;

use crate::error::TransportError;

/// A not-yet-opened packet channel to the debugger server.
///
/// Opening consumes the transport and yields independent sink and source
/// halves. The split is deliberate: the writer is fed by whoever owns the
/// connection, the reader is drained into the dispatcher, and neither ever
/// waits on the other.
#[async_trait]
pub trait Transport: Send {
    async fn open(
        self: Box<Self>,
    ) -> Result<(Box<dyn PacketSink>, Box<dyn PacketSource>), TransportError>;
}

/// Write half: frames and sends one packet payload at a time.
#[async_trait]
pub trait PacketSink: Send {
    async fn send(&mut self, packet: &str) -> Result<(), TransportError>;

    /// Flush and shut the stream down. Best effort; the peer may already be
    /// gone.
    async fn close(&mut self);
}

/// Read half: yields complete packet payloads in arrival order.
#[async_trait]
pub trait PacketSource: Send {
    /// `None` when the peer closed the stream cleanly between packets.
    async fn receive(&mut self) -> Option<Result<String, TransportError>>;
}

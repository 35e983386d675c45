//! TCP implementation of the packet transport.

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::codec::{self, FrameDecoder};
use crate::error::TransportError;
use crate::traits::{PacketSink, PacketSource, Transport};
use crate::types::ConnectParams;

/// Creates the transport for the given parameters. The debugger server only
/// speaks framed JSON over plain TCP, so there is no scheme dispatch here;
/// the factory exists to keep the `Box<dyn Transport>` seam that the
/// connection actor and its tests rely on.
pub fn create_transport(params: &ConnectParams) -> Box<dyn Transport> {
    Box::new(TcpTransport {
        params: params.clone(),
    })
}

pub struct TcpTransport {
    params: ConnectParams,
}

#[async_trait]
impl Transport for TcpTransport {
    async fn open(
        self: Box<Self>,
    ) -> Result<(Box<dyn PacketSink>, Box<dyn PacketSource>), TransportError> {
        let stream = TcpStream::connect(self.params.address())
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
        // Packets are small and latency-sensitive.
        let _ = stream.set_nodelay(true);
        let (reader, writer) = stream.into_split();
        Ok((
            Box::new(TcpPacketSink { writer }),
            Box::new(TcpPacketSource {
                reader,
                decoder: FrameDecoder::new(),
            }),
        ))
    }
}

struct TcpPacketSink {
    writer: OwnedWriteHalf,
}

#[async_trait]
impl PacketSink for TcpPacketSink {
    async fn send(&mut self, packet: &str) -> Result<(), TransportError> {
        let frame = codec::encode_frame(packet);
        self.writer
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}

struct TcpPacketSource {
    reader: OwnedReadHalf,
    decoder: FrameDecoder,
}

#[async_trait]
impl PacketSource for TcpPacketSource {
    async fn receive(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.decoder.next_frame() {
                Ok(Some(frame)) => return Some(Ok(frame)),
                Ok(None) => {},
                Err(e) => return Some(Err(e)),
            }

            let mut chunk = [0u8; 8192];
            match self.reader.read(&mut chunk).await {
                Ok(0) => {
                    return if self.decoder.is_mid_frame() {
                        Some(Err(TransportError::Truncated))
                    } else {
                        None
                    };
                },
                Ok(n) => self.decoder.push(&chunk[..n]),
                Err(e) => return Some(Err(TransportError::Io(e.to_string()))),
            }
        }
    }
}

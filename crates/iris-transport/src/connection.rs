//! The connection actor: owns one link to the debugger server.
//!
//! The opened transport splits into a sink fed from a bounded outbox and a
//! source drained straight into the dispatcher. Each half runs as its own
//! pump; whichever pump finishes first decides how the link went down. RDP
//! has no reconnect, so `Closed` is terminal and a new session means a new
//! actor.

use actix::prelude::*;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::tcp::create_transport;
use crate::traits::{PacketSink, PacketSource, Transport};
use crate::types::ConnectParams;

/// Where the link currently stands.
#[derive(Debug, Clone)]
pub enum ConnectionState {
    Opening,
    Ready,
    /// Terminal. `None` means a clean close, from either end.
    Closed(Option<TransportError>),
}

/// One packet payload to put on the wire.
#[derive(Message, Clone)]
#[rtype(result = "()")]
pub struct WritePacket(pub String);

/// One packet payload taken off the wire.
#[derive(Message)]
#[rtype(result = "()")]
pub struct PacketReceived(pub String);

/// Close the link and stop the actor once the stream is down.
#[derive(Message)]
#[rtype(result = "()")]
pub struct CloseConnection;

/// Link state notification for the supervising session.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct LinkStateChanged(pub ConnectionState);

// Internal: outcome reports from the pump pair.
#[derive(Message)]
#[rtype(result = "()")]
enum Link {
    Up,
    Down(Option<TransportError>),
}

pub struct ConnectionActor {
    params: ConnectParams,
    state: ConnectionState,
    /// Receives every inbound packet (the dispatcher).
    packets: Recipient<PacketReceived>,
    supervisor: Recipient<LinkStateChanged>,
    /// Feeds the write pump. Dropping it is the local-close signal.
    outbox: Option<mpsc::Sender<String>>,
    /// Consumed on start. Injectable so tests can run without a socket.
    transport: Option<Box<dyn Transport>>,
}

impl ConnectionActor {
    pub fn new(
        params: ConnectParams,
        packets: Recipient<PacketReceived>,
        supervisor: Recipient<LinkStateChanged>,
    ) -> Self {
        ConnectionActor {
            params,
            state: ConnectionState::Opening,
            packets,
            supervisor,
            outbox: None,
            transport: None,
        }
    }

    /// Like `new`, but with a pre-built transport instead of the TCP factory.
    pub fn with_transport(
        params: ConnectParams,
        transport: Box<dyn Transport>,
        packets: Recipient<PacketReceived>,
        supervisor: Recipient<LinkStateChanged>,
    ) -> Self {
        let mut actor = ConnectionActor::new(params, packets, supervisor);
        actor.transport = Some(transport);
        actor
    }

    fn announce(&mut self, state: ConnectionState) {
        self.state = state.clone();
        if self.supervisor.try_send(LinkStateChanged(state)).is_err() {
            debug!("Connection supervisor is gone; state change not delivered.");
        }
    }

    /// Drain the outbox onto the wire. Runs until a send fails or the
    /// outbox sender is dropped, which doubles as the local close request.
    async fn pump_outbox(
        mut sink: Box<dyn PacketSink>,
        mut outbox: mpsc::Receiver<String>,
    ) -> Option<TransportError> {
        while let Some(packet) = outbox.recv().await {
            if let Err(e) = sink.send(&packet).await {
                return Some(e);
            }
        }
        sink.close().await;
        None
    }

    /// Hand every inbound packet to the dispatcher. Runs until the peer
    /// closes or the stream breaks.
    async fn pump_inbox(
        mut source: Box<dyn PacketSource>,
        packets: Recipient<PacketReceived>,
    ) -> Option<TransportError> {
        loop {
            match source.receive().await {
                Some(Ok(packet)) => {
                    if packets.try_send(PacketReceived(packet)).is_err() {
                        return Some(TransportError::ReceiveFailed(
                            "packet recipient went away".into(),
                        ));
                    }
                },
                Some(Err(e)) => return Some(e),
                None => return None,
            }
        }
    }
}

impl Actor for ConnectionActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("Opening debugger connection to {}", self.params.address());
        self.announce(ConnectionState::Opening);

        let transport = self
            .transport
            .take()
            .unwrap_or_else(|| create_transport(&self.params));
        let (outbox_tx, outbox_rx) = mpsc::channel(256);
        self.outbox = Some(outbox_tx);

        let packets = self.packets.clone();
        let open_timeout = self.params.connect_timeout;
        let addr = ctx.address();

        let link = async move {
            let (sink, source) =
                match tokio::time::timeout(open_timeout, transport.open()).await {
                    Ok(Ok(halves)) => halves,
                    Ok(Err(e)) => {
                        addr.do_send(Link::Down(Some(e)));
                        return;
                    },
                    Err(_elapsed) => {
                        addr.do_send(Link::Down(Some(TransportError::Timeout)));
                        return;
                    },
                };
            addr.do_send(Link::Up);

            // The pumps are independent; the first one to stop takes the
            // link with it and the select drops the other.
            let failure = tokio::select! {
                outcome = Self::pump_outbox(sink, outbox_rx) => outcome,
                outcome = Self::pump_inbox(source, packets) => outcome,
            };
            addr.do_send(Link::Down(failure));
        };
        ctx.spawn(link.into_actor(self).map(|_, _, _| ()));
    }
}

impl Handler<Link> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: Link, ctx: &mut Context<Self>) {
        match msg {
            Link::Up => {
                info!("Debugger connection ready.");
                self.announce(ConnectionState::Ready);
            },
            Link::Down(failure) => {
                match &failure {
                    Some(e) => warn!("Debugger connection lost: {e}"),
                    None => info!("Debugger connection closed."),
                }
                self.outbox = None;
                self.announce(ConnectionState::Closed(failure));
                ctx.stop();
            },
        }
    }
}

impl Handler<WritePacket> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: WritePacket, _ctx: &mut Context<Self>) {
        // Packets queued while the link is still opening are flushed by the
        // write pump as soon as it comes up.
        let Some(outbox) = &self.outbox else {
            warn!("Dropping outbound packet; the link is {:?}.", self.state);
            return;
        };
        if outbox.try_send(msg.0).is_err() {
            // A full outbox means the peer stopped reading long ago.
            error!("Outbox overflow; dropping an outbound packet.");
        }
    }
}

impl Handler<CloseConnection> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, _msg: CloseConnection, _ctx: &mut Context<Self>) {
        debug!("Local close requested.");
        // Dropping the outbox ends the write pump, which shuts the stream
        // down; the link then reports a clean close and the actor stops.
        self.outbox = None;
    }
}

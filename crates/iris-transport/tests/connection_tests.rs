//! Integration tests driving `ConnectionActor` against a real TCP listener.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix::prelude::*;
use iris_transport::{
    CloseConnection, ConnectParams, ConnectionActor, ConnectionState, LinkStateChanged,
    PacketReceived, WritePacket,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

// --- Collector actors ---

struct PacketCollector {
    packets: Arc<Mutex<Vec<String>>>,
}

impl Actor for PacketCollector {
    type Context = Context<Self>;
}

impl Handler<PacketReceived> for PacketCollector {
    type Result = ();

    fn handle(&mut self, msg: PacketReceived, _ctx: &mut Context<Self>) {
        self.packets.lock().unwrap().push(msg.0);
    }
}

struct StateCollector {
    states: Arc<Mutex<Vec<ConnectionState>>>,
}

impl Actor for StateCollector {
    type Context = Context<Self>;
}

impl Handler<LinkStateChanged> for StateCollector {
    type Result = ();

    fn handle(&mut self, msg: LinkStateChanged, _ctx: &mut Context<Self>) {
        self.states.lock().unwrap().push(msg.0);
    }
}

fn spawn_collectors() -> (
    Arc<Mutex<Vec<String>>>,
    Recipient<PacketReceived>,
    Arc<Mutex<Vec<ConnectionState>>>,
    Recipient<LinkStateChanged>,
) {
    let packets = Arc::new(Mutex::new(Vec::new()));
    let packet_recipient = PacketCollector {
        packets: packets.clone(),
    }
    .start()
    .recipient();
    let states = Arc::new(Mutex::new(Vec::new()));
    let state_recipient = StateCollector {
        states: states.clone(),
    }
    .start()
    .recipient();
    (packets, packet_recipient, states, state_recipient)
}

fn params_for(addr: std::net::SocketAddr) -> ConnectParams {
    ConnectParams {
        host: addr.ip().to_string(),
        port: addr.port(),
        connect_timeout: Duration::from_secs(1),
    }
}

// --- Tests ---

#[actix_rt::test]
async fn delivers_framed_packets_in_order() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        for payload in ["{\"from\":\"root\"}", "{\"from\":\"thread1\"}"] {
            let frame = format!("{}:{}", payload.len(), payload);
            sock.write_all(frame.as_bytes()).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(300)).await;
    });

    let (packets, packet_recipient, _states, state_recipient) = spawn_collectors();
    let _conn = ConnectionActor::new(params_for(addr), packet_recipient, state_recipient).start();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let received = packets.lock().unwrap().clone();
    assert_eq!(
        received,
        vec![
            "{\"from\":\"root\"}".to_string(),
            "{\"from\":\"thread1\"}".to_string()
        ]
    );
}

#[actix_rt::test]
async fn frames_outgoing_packets() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (read_tx, read_rx) = tokio::sync::oneshot::channel::<Vec<u8>>();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 256];
        let n = sock.read(&mut buf).await.unwrap();
        buf.truncate(n);
        let _ = read_tx.send(buf);
    });

    let (_packets, packet_recipient, _states, state_recipient) = spawn_collectors();
    let conn = ConnectionActor::new(params_for(addr), packet_recipient, state_recipient).start();

    // Queued writes flush once the link is up, so no need to wait for it.
    conn.send(WritePacket(
        "{\"to\":\"root\",\"type\":\"listTabs\"}".to_string(),
    ))
    .await
    .unwrap();

    let bytes = tokio::time::timeout(Duration::from_secs(1), read_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        "31:{\"to\":\"root\",\"type\":\"listTabs\"}"
    );
}

#[actix_rt::test]
async fn remote_close_reports_a_clean_closed_state() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (sock, _) = listener.accept().await.unwrap();
        drop(sock); // close immediately
    });

    let (_packets, packet_recipient, states, state_recipient) = spawn_collectors();
    let _conn = ConnectionActor::new(params_for(addr), packet_recipient, state_recipient).start();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let seen = states.lock().unwrap().clone();
    assert!(
        seen.iter()
            .any(|s| matches!(s, ConnectionState::Closed(None))),
        "expected a clean Closed state, got {seen:?}"
    );
}

#[actix_rt::test]
async fn local_close_shuts_the_stream_down() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let (eof_tx, eof_rx) = tokio::sync::oneshot::channel::<usize>();
    tokio::spawn(async move {
        let (mut sock, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 64];
        // A read of zero bytes means the bridge half-closed the stream.
        let n = sock.read(&mut buf).await.unwrap();
        let _ = eof_tx.send(n);
    });

    let (_packets, packet_recipient, states, state_recipient) = spawn_collectors();
    let conn = ConnectionActor::new(params_for(addr), packet_recipient, state_recipient).start();

    tokio::time::sleep(Duration::from_millis(100)).await;
    conn.send(CloseConnection).await.unwrap();

    let n = tokio::time::timeout(Duration::from_secs(1), eof_rx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(n, 0, "the peer should observe end-of-stream");

    tokio::time::sleep(Duration::from_millis(100)).await;
    let seen = states.lock().unwrap().clone();
    assert!(
        seen.iter()
            .any(|s| matches!(s, ConnectionState::Closed(None))),
        "local close must end in a clean Closed state, got {seen:?}"
    );
}

#[actix_rt::test]
async fn connect_failure_reports_an_error() {
    // Nothing is listening on this port.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (_packets, packet_recipient, states, state_recipient) = spawn_collectors();
    let _conn = ConnectionActor::new(params_for(addr), packet_recipient, state_recipient).start();

    tokio::time::sleep(Duration::from_millis(200)).await;

    let seen = states.lock().unwrap().clone();
    assert!(
        seen.iter()
            .any(|s| matches!(s, ConnectionState::Closed(Some(_)))),
        "expected a failed Closed state, got {seen:?}"
    );
}

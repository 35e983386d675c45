//! The DispatchActor routes packets between the connection and the actor
//! proxies: it keeps the registry of known server-side actors, correlates
//! replies to requests per actor in FIFO order, memoizes idempotent
//! requests, and hands unsolicited events to the orchestrator.

use std::collections::{HashMap, VecDeque};

use actix::prelude::*;
use futures_channel::oneshot;
use iris_transport::{ConnectionState, LinkStateChanged, PacketReceived, WritePacket};
use log::{debug, trace, warn};
use serde_json::{Map, Value};

use crate::error::{ActorErrorKind, RdpError};
use crate::packet::{self, Packet};

/// Result of one protocol request: the reply body or a typed failure.
pub type RequestResult = Result<Value, RdpError>;

/// An unsolicited notification from a server-side actor. There is exactly
/// one consumer, the session orchestrator: protocol events are state input,
/// not a broadcast.
#[derive(Debug, Clone, Message)]
#[rtype(result = "()")]
pub struct RdpEvent {
    /// Name of the actor the event came from.
    pub actor: String,
    /// Event name (the packet `type`, or `init` for the root greeting).
    pub event: String,
    pub body: Map<String, Value>,
}

/// Category of a server-side actor. Decides which inbound packets are
/// unsolicited events rather than replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorKind {
    Root,
    Descriptor,
    Watcher,
    Target,
    Thread,
    Console,
    Source,
    BreakpointList,
    ThreadConfiguration,
    Preference,
    Addons,
    ObjectGrip,
    LongString,
    Other,
}

impl ActorKind {
    /// Classify an inbound packet for this actor category. Returns the event
    /// name when the packet is an unsolicited notification; `None` means it
    /// consumes the oldest pending request.
    fn classify_event(&self, type_: Option<&str>, body: &Map<String, Value>) -> Option<String> {
        let type_ = match self {
            // The root greeting has no `type` at all; it announces itself
            // through `applicationType`.
            ActorKind::Root if body.contains_key("applicationType") => {
                return Some("init".to_string());
            },
            _ => type_?,
        };
        let is_event = match self {
            ActorKind::Root => matches!(type_, "tabOpened" | "tabListChanged" | "addonListChanged"),
            ActorKind::Descriptor => matches!(type_, "descriptor-destroyed"),
            ActorKind::Watcher => matches!(type_, "target-available" | "target-destroyed"),
            ActorKind::Target => matches!(
                type_,
                "console-message" | "error-message" | "source" | "thread-state"
            ),
            ActorKind::Thread => matches!(type_, "newSource" | "paused" | "resumed"),
            ActorKind::Console => matches!(type_, "consoleAPICall" | "pageError"),
            _ => false,
        };
        is_event.then(|| type_.to_string())
    }

    /// Whether requests may be written immediately after registration. The
    /// root actor queues until its `init` greeting has arrived.
    fn ready_on_register(&self) -> bool {
        !matches!(self, ActorKind::Root)
    }

    /// Some notifications double as the reply to an in-flight request: the
    /// thread answers `resume` with its `resumed` packet and `interrupt`
    /// with `paused`. Such packets resolve the matching pending request and
    /// still fan out as events.
    fn event_resolves_request(&self, event: &str, pending_type: &str) -> bool {
        matches!(
            (self, event, pending_type),
            (ActorKind::Thread, "resumed", "resume") | (ActorKind::Thread, "paused", "interrupt")
        )
    }
}

// --- Messages ---

/// Request sent by a proxy to execute one protocol request. The reply (or
/// failure) arrives through `result_tx`; the message result only signals
/// whether the request was accepted.
#[derive(Debug)]
pub struct SendRequest {
    pub actor: String,
    pub type_: String,
    pub params: Value,
    pub result_tx: oneshot::Sender<RequestResult>,
}

impl Message for SendRequest {
    type Result = Result<(), RdpError>;
}

/// Like `SendRequest`, but memoized: at most one wire request is issued per
/// (actor, cache key); later callers get the stored reply.
#[derive(Debug)]
pub struct SendCachedRequest {
    pub actor: String,
    pub type_: String,
    pub params: Value,
    pub cache_key: String,
    pub result_tx: oneshot::Sender<RequestResult>,
}

impl Message for SendCachedRequest {
    type Result = Result<(), RdpError>;
}

/// Register an actor proxy. Idempotent: re-registering an existing name is a
/// no-op, so there is at most one live entry per actor name.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct RegisterActor {
    pub name: String,
    pub kind: ActorKind,
}

/// Remove an actor entry, cancelling anything still outstanding on it.
#[derive(Debug, Message)]
#[rtype(result = "()")]
pub struct UnregisterActor {
    pub name: String,
}

// --- Per-actor bookkeeping ---

struct OutboundRequest {
    type_: String,
    params: Value,
    result_tx: oneshot::Sender<RequestResult>,
    cache_key: Option<String>,
}

struct PendingRequest {
    type_: String,
    result_tx: oneshot::Sender<RequestResult>,
    cache_key: Option<String>,
}

struct ActorEntry {
    kind: ActorKind,
    ready: bool,
    /// Requests not yet written (actor not ready).
    queued: VecDeque<OutboundRequest>,
    /// Requests written to the wire, oldest first. The wire guarantees the
    /// next non-event packet from this actor answers the front entry.
    pending: VecDeque<PendingRequest>,
    cache: HashMap<String, Value>,
    /// Callers waiting on an in-flight cached request, per key.
    cache_waiters: HashMap<String, Vec<oneshot::Sender<RequestResult>>>,
}

impl ActorEntry {
    fn new(kind: ActorKind) -> Self {
        ActorEntry {
            kind,
            ready: kind.ready_on_register(),
            queued: VecDeque::new(),
            pending: VecDeque::new(),
            cache: HashMap::new(),
            cache_waiters: HashMap::new(),
        }
    }

    fn reject_all(&mut self, error: &RdpError) {
        for request in self.queued.drain(..) {
            let _ = request.result_tx.send(Err(error.clone()));
        }
        for request in self.pending.drain(..) {
            let _ = request.result_tx.send(Err(error.clone()));
        }
        for (_, waiters) in self.cache_waiters.drain() {
            for waiter in waiters {
                let _ = waiter.send(Err(error.clone()));
            }
        }
    }
}

// --- Actor ---

pub struct DispatchActor {
    connection: Recipient<WritePacket>,
    events: Recipient<RdpEvent>,
    actors: HashMap<String, ActorEntry>,
    disconnected: bool,
}

impl DispatchActor {
    pub fn new(connection: Recipient<WritePacket>, events: Recipient<RdpEvent>) -> Self {
        DispatchActor {
            connection,
            events,
            actors: HashMap::new(),
            disconnected: false,
        }
    }

    fn entry_mut(&mut self, name: &str) -> &mut ActorEntry {
        self.actors.entry(name.to_string()).or_insert_with(|| {
            debug!("Request for unregistered actor {name}; registering as Other.");
            ActorEntry::new(ActorKind::Other)
        })
    }

    /// Write one request to the wire and move it to the pending queue.
    fn write_request(
        connection: &Recipient<WritePacket>,
        entry: &mut ActorEntry,
        actor: &str,
        request: OutboundRequest,
    ) {
        let raw = packet::request(actor, &request.type_, request.params);
        trace!("-> {raw}");
        entry.pending.push_back(PendingRequest {
            type_: request.type_,
            result_tx: request.result_tx,
            cache_key: request.cache_key,
        });
        if connection.try_send(WritePacket(raw)).is_err() {
            // The connection actor is gone; the pending entry will be
            // rejected when the disconnect status lands. Fail it now so the
            // caller is not left waiting on that race.
            if let Some(pending) = entry.pending.pop_back() {
                let _ = pending.result_tx.send(Err(RdpError::Disconnected));
            }
        }
    }

    fn enqueue(&mut self, actor: String, request: OutboundRequest) {
        let connection = self.connection.clone();
        let entry = self.entry_mut(&actor);
        if entry.ready {
            Self::write_request(&connection, entry, &actor, request);
        } else {
            trace!(
                "Actor {actor} not ready; queueing request {}",
                request.type_
            );
            entry.queued.push_back(request);
        }
    }

    fn flush_queued(&mut self, actor: &str) {
        let connection = self.connection.clone();
        if let Some(entry) = self.actors.get_mut(actor) {
            entry.ready = true;
            while let Some(request) = entry.queued.pop_front() {
                Self::write_request(&connection, entry, actor, request);
            }
        }
    }

    fn resolve_reply(&mut self, packet: Packet) {
        let actor = packet.from.clone();
        let Some(entry) = self.actors.get_mut(&actor) else {
            warn!("Dropping packet from unknown actor {actor}");
            return;
        };

        let Some(pending) = entry.pending.pop_front() else {
            warn!(
                "Dropping unexpected packet from {actor} (type {:?}): no pending request",
                packet.type_
            );
            return;
        };

        let result: RequestResult = match packet.error_code() {
            Some(code) => Err(RdpError::Actor {
                actor: actor.clone(),
                kind: ActorErrorKind::from_code(code),
                message: packet.error_message(),
            }),
            None => Ok(packet.into_reply_value()),
        };

        if let Some(key) = pending.cache_key {
            if let Ok(value) = &result {
                entry.cache.insert(key.clone(), value.clone());
            }
            if let Some(waiters) = entry.cache_waiters.remove(&key) {
                for waiter in waiters {
                    let _ = waiter.send(result.clone());
                }
            }
        }

        if pending.result_tx.send(result).is_err() {
            // Expected when the requester dropped its future.
            debug!(
                "Requester for {}.{} dropped the result channel.",
                actor, pending.type_
            );
        }
    }

    fn fail_everything(&mut self, error: RdpError) {
        self.disconnected = true;
        for (name, entry) in self.actors.iter_mut() {
            if !entry.pending.is_empty() || !entry.queued.is_empty() {
                debug!("Rejecting outstanding requests for {name}");
            }
            entry.reject_all(&error);
        }
    }
}

impl Actor for DispatchActor {
    type Context = Context<Self>;
}

impl Handler<RegisterActor> for DispatchActor {
    type Result = ();

    fn handle(&mut self, msg: RegisterActor, _ctx: &mut Context<Self>) {
        use std::collections::hash_map::Entry;
        match self.actors.entry(msg.name) {
            Entry::Occupied(occupied) => {
                trace!("Actor {} already registered", occupied.key());
            },
            Entry::Vacant(vacant) => {
                debug!("Registering actor {} ({:?})", vacant.key(), msg.kind);
                vacant.insert(ActorEntry::new(msg.kind));
            },
        }
    }
}

impl Handler<UnregisterActor> for DispatchActor {
    type Result = ();

    fn handle(&mut self, msg: UnregisterActor, _ctx: &mut Context<Self>) {
        if let Some(mut entry) = self.actors.remove(&msg.name) {
            debug!("Unregistering actor {}", msg.name);
            entry.reject_all(&RdpError::Cancelled);
        }
    }
}

impl Handler<SendRequest> for DispatchActor {
    type Result = Result<(), RdpError>;

    fn handle(&mut self, msg: SendRequest, _ctx: &mut Context<Self>) -> Self::Result {
        if self.disconnected {
            let _ = msg.result_tx.send(Err(RdpError::Disconnected));
            return Err(RdpError::Disconnected);
        }
        self.enqueue(
            msg.actor,
            OutboundRequest {
                type_: msg.type_,
                params: msg.params,
                result_tx: msg.result_tx,
                cache_key: None,
            },
        );
        Ok(())
    }
}

impl Handler<SendCachedRequest> for DispatchActor {
    type Result = Result<(), RdpError>;

    fn handle(&mut self, msg: SendCachedRequest, _ctx: &mut Context<Self>) -> Self::Result {
        if self.disconnected {
            let _ = msg.result_tx.send(Err(RdpError::Disconnected));
            return Err(RdpError::Disconnected);
        }

        let entry = self.entry_mut(&msg.actor);
        if let Some(value) = entry.cache.get(&msg.cache_key) {
            trace!("Cache hit for {}.{}", msg.actor, msg.cache_key);
            let _ = msg.result_tx.send(Ok(value.clone()));
            return Ok(());
        }
        if let Some(waiters) = entry.cache_waiters.get_mut(&msg.cache_key) {
            trace!("Joining in-flight cached request {}", msg.cache_key);
            waiters.push(msg.result_tx);
            return Ok(());
        }

        entry.cache_waiters.insert(msg.cache_key.clone(), Vec::new());
        self.enqueue(
            msg.actor,
            OutboundRequest {
                type_: msg.type_,
                params: msg.params,
                result_tx: msg.result_tx,
                cache_key: Some(msg.cache_key),
            },
        );
        Ok(())
    }
}

// Inbound packets from the ConnectionActor.
impl Handler<PacketReceived> for DispatchActor {
    type Result = ();

    fn handle(&mut self, msg: PacketReceived, _ctx: &mut Context<Self>) {
        trace!("<- {}", msg.0);
        let packet = match Packet::parse(&msg.0) {
            Ok(packet) => packet,
            Err(e) => {
                warn!("Dropping undecodable packet: {e} (raw: {})", msg.0);
                return;
            },
        };

        let Some(entry) = self.actors.get_mut(&packet.from) else {
            warn!("Dropping packet from unknown actor {}", packet.from);
            return;
        };

        if let Some(event) = entry
            .kind
            .classify_event(packet.type_.as_deref(), &packet.body)
        {
            let resolves_front = entry
                .pending
                .front()
                .map(|pending| entry.kind.event_resolves_request(&event, &pending.type_))
                .unwrap_or(false);
            if resolves_front {
                if let Some(pending) = entry.pending.pop_front() {
                    let mut body = packet.body.clone();
                    body.insert("type".to_string(), Value::String(event.clone()));
                    let _ = pending.result_tx.send(Ok(Value::Object(body)));
                }
            }
            if event == "init" && !entry.ready {
                debug!("Root actor initialized; flushing queued requests.");
                self.flush_queued(&packet.from);
            }
            if self
                .events
                .try_send(RdpEvent {
                    actor: packet.from,
                    event,
                    body: packet.body,
                })
                .is_err()
            {
                warn!("Orchestrator is gone; protocol event dropped.");
            }
            return;
        }

        self.resolve_reply(packet);
    }
}

// Forwarded link state; a closed link fails everything outstanding.
impl Handler<LinkStateChanged> for DispatchActor {
    type Result = ();

    fn handle(&mut self, msg: LinkStateChanged, _ctx: &mut Context<Self>) {
        if let ConnectionState::Closed(err_opt) = msg.0 {
            warn!("Connection closed; failing all outstanding requests.");
            let error = match err_opt {
                Some(transport_err) => RdpError::Transport(transport_err),
                None => RdpError::Disconnected,
            };
            self.fail_everything(error);
        }
    }
}

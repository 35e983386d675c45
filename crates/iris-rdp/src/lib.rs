//! # Iris RDP
//!
//! The browser-facing protocol layer: parsing of actor-addressed JSON
//! packets, per-actor request/response correlation, event delivery, and the
//! typed proxies for the server-side actors the bridge talks to.
//!
//! Every server-side object is an *actor* addressed by an opaque name. The
//! wire guarantees that, per actor, responses arrive in request order; the
//! `DispatchActor` relies on exactly that to correlate without request ids.

pub mod actors;
pub mod dispatch;
pub mod error;
pub mod packet;

pub use dispatch::{
    ActorKind, DispatchActor, RdpEvent, RegisterActor, RequestResult, SendCachedRequest,
    SendRequest, UnregisterActor,
};
pub use error::{ActorErrorKind, RdpError};
pub use packet::Packet;

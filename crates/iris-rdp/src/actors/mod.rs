//! Typed proxies for the server-side actors.
//!
//! Each proxy is a thin handle around an actor name and the dispatcher
//! address: building request payloads, awaiting the correlated reply and
//! giving it a shape. All queueing, correlation and caching lives in the
//! dispatcher; proxies stay stateless and cheap to clone.

pub mod breakpoints;
pub mod console;
pub mod descriptor;
pub mod grips;
pub mod misc;
pub mod root;
pub mod source;
pub mod target;
pub mod thread;
pub mod watcher;

use actix::prelude::*;
use futures_channel::oneshot;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::dispatch::{
    ActorKind, DispatchActor, RequestResult, SendCachedRequest, SendRequest, UnregisterActor,
};
use crate::error::RdpError;

pub use breakpoints::{
    BreakpointListProxy, BreakpointLocation, BreakpointOptions, ThreadConfigurationProxy,
    ThreadConfigurationUpdate,
};
pub use console::{ConsoleProxy, EvaluationResult};
pub use descriptor::{DescriptorProxy, WatcherTraits};
pub use grips::{LongStringProxy, ObjectGripProxy, ObjectProperties, grip_actor};
pub use misc::{AddonsProxy, InstalledAddon, PreferenceProxy};
pub use root::{RootForm, RootInit, RootProxy, RootTraits, TabDescriptorForm};
pub use source::{BreakpointPosition, SourceContent, SourceForm, SourceProxy};
pub use target::{
    ConsoleMessageResource, ErrorMessageResource, TargetForm, TargetProxy, ThreadStateUpdate,
    TimerData,
};
pub use thread::{FrameForm, PauseReason, SourceLocation, StepKind, ThreadProxy};
pub use watcher::{ResourceKind, TargetKind, WatcherProxy};

/// Shared plumbing for every typed proxy: registration, request issuing,
/// reply awaiting.
#[derive(Clone)]
pub struct ActorHandle {
    name: String,
    dispatch: Addr<DispatchActor>,
}

impl ActorHandle {
    pub fn new(name: String, kind: ActorKind, dispatch: Addr<DispatchActor>) -> Self {
        // Registration is idempotent, so two proxies for the same name share
        // one dispatcher entry.
        dispatch.do_send(crate::dispatch::RegisterActor {
            name: name.clone(),
            kind,
        });
        ActorHandle { name, dispatch }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dispatch(&self) -> &Addr<DispatchActor> {
        &self.dispatch
    }

    /// Issue one request and await its reply.
    pub async fn request(&self, type_: &str, params: Value) -> RequestResult {
        let (result_tx, result_rx) = oneshot::channel();
        self.dispatch
            .send(SendRequest {
                actor: self.name.clone(),
                type_: type_.to_string(),
                params,
                result_tx,
            })
            .await
            .map_err(|e| RdpError::Mailbox(e.to_string()))??;
        result_rx.await.map_err(|_| RdpError::Cancelled)?
    }

    /// Issue one memoized request; repeated calls with the same key cost at
    /// most one wire round-trip.
    pub async fn request_cached(&self, cache_key: &str, type_: &str, params: Value) -> RequestResult {
        let (result_tx, result_rx) = oneshot::channel();
        self.dispatch
            .send(SendCachedRequest {
                actor: self.name.clone(),
                type_: type_.to_string(),
                params,
                cache_key: cache_key.to_string(),
                result_tx,
            })
            .await
            .map_err(|e| RdpError::Mailbox(e.to_string()))??;
        result_rx.await.map_err(|_| RdpError::Cancelled)?
    }

    /// Deregister from the dispatcher, cancelling anything outstanding.
    pub fn unregister(&self) {
        self.dispatch.do_send(UnregisterActor {
            name: self.name.clone(),
        });
    }
}

/// Decode a reply value into a typed form, labeling failures with the actor.
pub(crate) fn decode<T: DeserializeOwned>(actor: &str, value: Value) -> Result<T, RdpError> {
    serde_json::from_value(value).map_err(|e| RdpError::UnexpectedReply(format!("{actor}: {e}")))
}

//! The watcher actor brokers target discovery and resource subscriptions for
//! its descriptor, and hands out the session-wide thread-configuration and
//! breakpoint-list actors.

use actix::Addr;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::breakpoints::{BreakpointListProxy, ThreadConfigurationProxy};
use super::target::TargetForm;
use super::{ActorHandle, decode};
use crate::dispatch::{ActorKind, DispatchActor};
use crate::error::RdpError;

/// Kinds of execution targets a watcher can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Frame,
    Worker,
    ContentScript,
}

impl TargetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Frame => "frame",
            TargetKind::Worker => "worker",
            TargetKind::ContentScript => "content_script",
        }
    }
}

/// Kinds of resources a watcher can stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    ConsoleMessage,
    ErrorMessage,
    Source,
    ThreadState,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::ConsoleMessage => "console-message",
            ResourceKind::ErrorMessage => "error-message",
            ResourceKind::Source => "source",
            ResourceKind::ThreadState => "thread-state",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetThreadConfigurationReply {
    configuration: ActorRef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetBreakpointListReply {
    breakpoint_list: ActorRef,
}

#[derive(Debug, Clone, Deserialize)]
struct ActorRef {
    actor: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TargetAvailableBody {
    target: TargetForm,
}

#[derive(Debug, Clone, Deserialize)]
struct TargetDestroyedBody {
    target: String,
}

/// Decode the body of a `target-available` event.
pub fn parse_target_available(body: &Map<String, Value>) -> Result<TargetForm, RdpError> {
    let parsed: TargetAvailableBody = decode("watcher", Value::Object(body.clone()))?;
    Ok(parsed.target)
}

/// Decode the body of a `target-destroyed` event into the target actor name.
pub fn parse_target_destroyed(body: &Map<String, Value>) -> Result<String, RdpError> {
    let parsed: TargetDestroyedBody = decode("watcher", Value::Object(body.clone()))?;
    Ok(parsed.target)
}

#[derive(Clone)]
pub struct WatcherProxy {
    handle: ActorHandle,
}

impl WatcherProxy {
    pub fn new(name: String, dispatch: Addr<DispatchActor>) -> Self {
        WatcherProxy {
            handle: ActorHandle::new(name, ActorKind::Watcher, dispatch),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Start watching one kind of target. `target-available` events follow
    /// for every matching target, current and future.
    pub async fn watch_targets(&self, kind: TargetKind) -> Result<(), RdpError> {
        self.handle
            .request("watchTargets", json!({ "targetType": kind.as_str() }))
            .await?;
        Ok(())
    }

    /// Subscribe to resource streams. Must be issued after the target
    /// watches so early resources are not lost in the parent process.
    pub async fn watch_resources(&self, kinds: &[ResourceKind]) -> Result<(), RdpError> {
        let resource_types: Vec<&str> = kinds.iter().map(ResourceKind::as_str).collect();
        self.handle
            .request("watchResources", json!({ "resourceTypes": resource_types }))
            .await?;
        Ok(())
    }

    /// The session-wide thread configuration actor (cached).
    pub async fn get_thread_configuration(&self) -> Result<ThreadConfigurationProxy, RdpError> {
        let value = self
            .handle
            .request_cached(
                "getThreadConfigurationActor",
                "getThreadConfigurationActor",
                json!({}),
            )
            .await?;
        let reply: GetThreadConfigurationReply = decode(self.name(), value)?;
        Ok(ThreadConfigurationProxy::new(
            reply.configuration.actor,
            self.handle.dispatch().clone(),
        ))
    }

    /// The session-wide breakpoint list actor (cached).
    pub async fn get_breakpoint_list(&self) -> Result<BreakpointListProxy, RdpError> {
        let value = self
            .handle
            .request_cached(
                "getBreakpointListActor",
                "getBreakpointListActor",
                json!({}),
            )
            .await?;
        let reply: GetBreakpointListReply = decode(self.name(), value)?;
        Ok(BreakpointListProxy::new(
            reply.breakpoint_list.actor,
            self.handle.dispatch().clone(),
        ))
    }

    pub fn unregister(&self) {
        self.handle.unregister();
    }
}

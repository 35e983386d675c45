//! Descriptor actors represent a debuggable scope (a tab, the parent
//! process, a web-extension). Each descriptor owns exactly one watcher.

use actix::Addr;
use serde::Deserialize;
use serde_json::json;

use super::target::TargetForm;
use super::watcher::WatcherProxy;
use super::{ActorHandle, decode};
use crate::dispatch::{ActorKind, DispatchActor};
use crate::error::RdpError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatcherTraits {
    // Wire names for watcher target kinds are snake_case.
    #[serde(default)]
    pub content_script: bool,
    #[serde(default)]
    pub worker: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetWatcherReply {
    actor: String,
    #[serde(default)]
    traits: WatcherTraits,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetTargetReply {
    frame: TargetForm,
}

#[derive(Clone)]
pub struct DescriptorProxy {
    handle: ActorHandle,
}

impl DescriptorProxy {
    pub fn new(name: String, dispatch: Addr<DispatchActor>) -> Self {
        DescriptorProxy {
            handle: ActorHandle::new(name, ActorKind::Descriptor, dispatch),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// The watcher for this descriptor. One watcher exists per descriptor,
    /// so the reply is cached.
    pub async fn get_watcher(&self) -> Result<(WatcherProxy, WatcherTraits), RdpError> {
        let value = self
            .handle
            .request_cached("getWatcher", "getWatcher", json!({}))
            .await?;
        let reply: GetWatcherReply = decode(self.name(), value)?;
        let watcher = WatcherProxy::new(reply.actor, self.handle.dispatch().clone());
        Ok((watcher, reply.traits))
    }

    /// The directly-attached target (legacy tab attach path).
    pub async fn get_target(&self) -> Result<TargetForm, RdpError> {
        let value = self.handle.request("getTarget", json!({})).await?;
        let reply: GetTargetReply = decode(self.name(), value)?;
        Ok(reply.frame)
    }

    /// Reload the document this descriptor represents.
    pub async fn reload(&self) -> Result<(), RdpError> {
        self.handle.request("reload", json!({})).await?;
        Ok(())
    }

    pub fn unregister(&self) {
        self.handle.unregister();
    }
}

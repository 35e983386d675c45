//! The root actor: the first actor on every connection. It greets the client
//! with an `init` packet carrying the server traits and hands out the
//! top-level sub-actors.

use actix::Addr;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{ActorHandle, decode};
use crate::dispatch::{ActorKind, DispatchActor};
use crate::error::RdpError;

/// The root greeting. Arrives unsolicited as the first packet; requests sent
/// before it are queued by the dispatcher.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootInit {
    pub application_type: String,
    #[serde(default)]
    pub traits: RootTraits,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootTraits {
    /// Engine-side logpoints. The bridge requires these; without them
    /// log-message breakpoints cannot be installed.
    #[serde(default)]
    pub native_logpoints: bool,
    #[serde(default)]
    pub web_extension_addon_connect: bool,
    /// Selects the modern watcher-based discovery mode.
    #[serde(default)]
    pub supports_enable_window_global_thread_actors: bool,
}

impl RootInit {
    pub fn from_body(body: &Map<String, Value>) -> Result<Self, RdpError> {
        decode("root", Value::Object(body.clone()))
    }
}

/// Top-level sub-actors enumerated by `getRoot`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootForm {
    #[serde(default)]
    pub preference_actor: Option<String>,
    #[serde(default)]
    pub addons_actor: Option<String>,
    #[serde(default)]
    pub device_actor: Option<String>,
}

/// One tab as enumerated by `listTabs` (legacy discovery).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabDescriptorForm {
    pub actor: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub selected: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTabsReply {
    tabs: Vec<TabDescriptorForm>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetProcessReply {
    process_descriptor: ProcessDescriptorForm,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDescriptorForm {
    pub actor: String,
}

#[derive(Clone)]
pub struct RootProxy {
    handle: ActorHandle,
}

impl RootProxy {
    /// There is exactly one root actor and its name is fixed by the protocol.
    pub const NAME: &'static str = "root";

    pub fn new(dispatch: Addr<DispatchActor>) -> Self {
        RootProxy {
            handle: ActorHandle::new(Self::NAME.to_string(), ActorKind::Root, dispatch),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Enumerate the top-level sub-actors. Immutable for the lifetime of the
    /// connection, hence cached.
    pub async fn fetch_root(&self) -> Result<RootForm, RdpError> {
        let value = self
            .handle
            .request_cached("getRoot", "getRoot", json!({}))
            .await?;
        decode(self.name(), value)
    }

    pub async fn list_tabs(&self) -> Result<Vec<TabDescriptorForm>, RdpError> {
        let value = self.handle.request("listTabs", json!({})).await?;
        let reply: ListTabsReply = decode(self.name(), value)?;
        Ok(reply.tabs)
    }

    /// The descriptor for the parent process, used by modern discovery.
    pub async fn get_process_descriptor(&self) -> Result<ProcessDescriptorForm, RdpError> {
        let value = self.handle.request("getProcess", json!({ "id": 0 })).await?;
        let reply: GetProcessReply = decode(self.name(), value)?;
        Ok(reply.process_descriptor)
    }

    pub fn dispatch(&self) -> &Addr<DispatchActor> {
        self.handle.dispatch()
    }
}

//! Preference and addons actors, enumerated through `getRoot`.

use actix::Addr;
use serde::Deserialize;
use serde_json::json;

use super::{ActorHandle, decode};
use crate::dispatch::{ActorKind, DispatchActor};
use crate::error::RdpError;

#[derive(Debug, Clone, Deserialize)]
struct BoolPrefReply {
    value: bool,
}

#[derive(Clone)]
pub struct PreferenceProxy {
    handle: ActorHandle,
}

impl PreferenceProxy {
    pub fn new(name: String, dispatch: Addr<DispatchActor>) -> Self {
        PreferenceProxy {
            handle: ActorHandle::new(name, ActorKind::Preference, dispatch),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub async fn get_bool(&self, pref: &str) -> Result<bool, RdpError> {
        let value = self
            .handle
            .request("getBoolPref", json!({ "value": pref }))
            .await?;
        let reply: BoolPrefReply = decode(self.name(), value)?;
        Ok(reply.value)
    }

    pub async fn set_bool(&self, pref: &str, value: bool) -> Result<(), RdpError> {
        self.handle
            .request("setBoolPref", json!({ "name": pref, "value": value }))
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledAddon {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct InstallAddonReply {
    addon: InstalledAddon,
}

#[derive(Clone)]
pub struct AddonsProxy {
    handle: ActorHandle,
}

impl AddonsProxy {
    pub fn new(name: String, dispatch: Addr<DispatchActor>) -> Self {
        AddonsProxy {
            handle: ActorHandle::new(name, ActorKind::Addons, dispatch),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Side-load an unpacked extension. Used for the addon under debug and
    /// for the terminator helper during shutdown.
    pub async fn install_temporary_addon(&self, path: &str) -> Result<InstalledAddon, RdpError> {
        let value = self
            .handle
            .request("installTemporaryAddon", json!({ "addonPath": path }))
            .await?;
        let reply: InstallAddonReply = decode(self.name(), value)?;
        Ok(reply.addon)
    }
}

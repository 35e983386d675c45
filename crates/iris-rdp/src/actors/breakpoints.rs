//! The session-wide breakpoint-list and thread-configuration actors handed
//! out by the watcher.

use actix::Addr;
use serde::Serialize;
use serde_json::json;

use super::ActorHandle;
use crate::dispatch::{ActorKind, DispatchActor};
use crate::error::RdpError;

/// A breakpoint position keyed by generated-source URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointLocation {
    pub source_url: String,
    pub line: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Engine-side logpoint expression; requires the `nativeLogpoints`
    /// server trait.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_value: Option<String>,
}

#[derive(Clone)]
pub struct BreakpointListProxy {
    handle: ActorHandle,
}

impl BreakpointListProxy {
    pub fn new(name: String, dispatch: Addr<DispatchActor>) -> Self {
        BreakpointListProxy {
            handle: ActorHandle::new(name, ActorKind::BreakpointList, dispatch),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub async fn set_breakpoint(
        &self,
        location: &BreakpointLocation,
        options: &BreakpointOptions,
    ) -> Result<(), RdpError> {
        self.handle
            .request(
                "setBreakpoint",
                json!({ "location": location, "options": options }),
            )
            .await?;
        Ok(())
    }

    pub async fn remove_breakpoint(&self, location: &BreakpointLocation) -> Result<(), RdpError> {
        self.handle
            .request("removeBreakpoint", json!({ "location": location }))
            .await?;
        Ok(())
    }
}

/// Configuration flags applied to every thread of the session.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadConfigurationUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pause_on_exceptions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_caught_exceptions: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_pause_on_debugger_statement: Option<bool>,
}

#[derive(Clone)]
pub struct ThreadConfigurationProxy {
    handle: ActorHandle,
}

impl ThreadConfigurationProxy {
    pub fn new(name: String, dispatch: Addr<DispatchActor>) -> Self {
        ThreadConfigurationProxy {
            handle: ActorHandle::new(name, ActorKind::ThreadConfiguration, dispatch),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub async fn update_configuration(
        &self,
        update: &ThreadConfigurationUpdate,
    ) -> Result<(), RdpError> {
        self.handle
            .request("updateConfiguration", json!({ "configuration": update }))
            .await?;
        Ok(())
    }
}

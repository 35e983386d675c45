//! Proxies for server-side value references (grips). Object grips expose
//! their properties, long-string grips their missing tail. Lifetime is tied
//! to the pause or the thread per the grip's lifetime tag; pause-lifetime
//! grips die with the pause and need no explicit release.

use actix::Addr;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{ActorHandle, decode};
use crate::dispatch::{ActorKind, DispatchActor};
use crate::error::RdpError;

/// The actor name of an object or long-string grip, when it has one.
pub fn grip_actor(grip: &Value) -> Option<&str> {
    grip.get("actor").and_then(Value::as_str)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectProperties {
    #[serde(default)]
    pub own_properties: Map<String, Value>,
    #[serde(default)]
    pub prototype: Option<Value>,
}

#[derive(Clone)]
pub struct ObjectGripProxy {
    handle: ActorHandle,
}

impl ObjectGripProxy {
    pub fn new(name: String, dispatch: Addr<DispatchActor>) -> Self {
        ObjectGripProxy {
            handle: ActorHandle::new(name, ActorKind::ObjectGrip, dispatch),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub async fn prototype_and_properties(&self) -> Result<ObjectProperties, RdpError> {
        let value = self
            .handle
            .request("prototypeAndProperties", json!({}))
            .await?;
        decode(self.name(), value)
    }

    /// Release a thread-lifetime grip explicitly.
    pub async fn release(&self) -> Result<(), RdpError> {
        self.handle.request("release", json!({})).await?;
        Ok(())
    }

    pub fn unregister(&self) {
        self.handle.unregister();
    }
}

#[derive(Debug, Clone, Deserialize)]
struct SubstringReply {
    substring: String,
}

#[derive(Clone)]
pub struct LongStringProxy {
    handle: ActorHandle,
}

impl LongStringProxy {
    pub fn new(name: String, dispatch: Addr<DispatchActor>) -> Self {
        LongStringProxy {
            handle: ActorHandle::new(name, ActorKind::LongString, dispatch),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub async fn substring(&self, start: u64, end: u64) -> Result<String, RdpError> {
        let value = self
            .handle
            .request("substring", json!({ "start": start, "end": end }))
            .await?;
        let reply: SubstringReply = decode(self.name(), value)?;
        Ok(reply.substring)
    }

    pub fn unregister(&self) {
        self.handle.unregister();
    }
}

//! Thread actors: pause, resume and stepping for one target, plus stack
//! frame enumeration. In modern trait mode there is no explicit attach;
//! pause state is observed through the target's `thread-state` resource.

use actix::Addr;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ActorHandle, decode};
use crate::dispatch::{ActorKind, DispatchActor};
use crate::error::RdpError;

/// A position inside a source actor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
}

/// One stack frame as reported by the engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameForm {
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(rename = "type", default)]
    pub frame_type: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(rename = "where")]
    pub location: SourceLocation,
    #[serde(default)]
    pub this: Option<Value>,
    /// Scope chain head; carries the frame's bindings.
    #[serde(default)]
    pub environment: Option<Value>,
}

/// Why a thread paused.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseReason {
    #[serde(rename = "type")]
    pub kind: String,
    /// Grip of the thrown value, for exception stops.
    #[serde(default)]
    pub exception: Option<Value>,
    /// Breakpoint actors responsible for the stop, when any.
    #[serde(default)]
    pub actors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Step over.
    Next,
    /// Step in.
    Step,
    /// Step out.
    Finish,
}

impl StepKind {
    fn as_str(&self) -> &'static str {
        match self {
            StepKind::Next => "next",
            StepKind::Step => "step",
            StepKind::Finish => "finish",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FramesReply {
    frames: Vec<FrameForm>,
}

#[derive(Clone)]
pub struct ThreadProxy {
    handle: ActorHandle,
}

impl ThreadProxy {
    pub fn new(name: String, dispatch: Addr<DispatchActor>) -> Self {
        ThreadProxy {
            handle: ActorHandle::new(name, ActorKind::Thread, dispatch),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub async fn resume(&self) -> Result<(), RdpError> {
        self.handle.request("resume", json!({})).await?;
        Ok(())
    }

    pub async fn step(&self, kind: StepKind) -> Result<(), RdpError> {
        self.handle
            .request(
                "resume",
                json!({ "resumeLimit": { "type": kind.as_str() } }),
            )
            .await?;
        Ok(())
    }

    pub async fn interrupt(&self) -> Result<(), RdpError> {
        self.handle
            .request("interrupt", json!({ "when": "onNext" }))
            .await?;
        Ok(())
    }

    /// Fetch a slice of the call stack, outermost-last.
    pub async fn frames(&self, start: u32, count: u32) -> Result<Vec<FrameForm>, RdpError> {
        let value = self
            .handle
            .request("frames", json!({ "start": start, "count": count }))
            .await?;
        let reply: FramesReply = decode(self.name(), value)?;
        Ok(reply.frames)
    }

    pub fn unregister(&self) {
        self.handle.unregister();
    }
}

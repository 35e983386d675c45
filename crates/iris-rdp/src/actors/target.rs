//! Target actors: one per concrete execution context (document frame,
//! worker, iframe, content script, background script). Resources observed by
//! the watcher are emitted as events from the target.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use actix::Addr;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::thread::FrameForm;
use super::{ActorHandle, decode};
use crate::dispatch::{ActorKind, DispatchActor};
use crate::error::RdpError;

/// The form describing a target, as carried by `target-available`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetForm {
    pub actor: String,
    pub target_type: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub addon_id: Option<String>,
    /// Placeholder documents the extension framework loads into empty
    /// panels; never debuggable.
    #[serde(default)]
    pub is_fallback_document: bool,
    #[serde(default)]
    pub outer_window_id: Option<u64>,
    pub thread_actor: String,
    pub console_actor: String,
}

/// Body of a `thread-state` resource event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadStateUpdate {
    pub state: String,
    #[serde(default)]
    pub why: Option<super::thread::PauseReason>,
    #[serde(default)]
    pub frame: Option<FrameForm>,
}

impl ThreadStateUpdate {
    pub fn from_body(body: &Map<String, Value>) -> Result<Self, RdpError> {
        decode("target", Value::Object(body.clone()))
    }

    /// Build from a legacy thread-actor `paused`/`resumed` packet, which
    /// carries the state in its packet type.
    pub fn from_legacy(event: &str, body: &Map<String, Value>) -> Self {
        ThreadStateUpdate {
            state: event.to_string(),
            why: body
                .get("why")
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok()),
            frame: body
                .get("frame")
                .cloned()
                .and_then(|v| serde_json::from_value(v).ok()),
        }
    }
}

/// Body of a `console-message` resource event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleMessageResource {
    #[serde(default)]
    pub arguments: Vec<Value>,
    #[serde(default)]
    pub level: Option<String>,
    /// Distinguishes plain calls from `time`/`timeEnd` and friends.
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub column_number: Option<u32>,
    #[serde(default)]
    pub timer: Option<TimerData>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerData {
    pub name: String,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl ConsoleMessageResource {
    pub fn from_body(body: &Map<String, Value>) -> Result<Self, RdpError> {
        decode("target", Value::Object(body.clone()))
    }
}

/// Body of an `error-message` resource event.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessageResource {
    pub error_message: String,
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default)]
    pub line_number: Option<u32>,
    #[serde(default)]
    pub column_number: Option<u32>,
}

impl ErrorMessageResource {
    pub fn from_body(body: &Map<String, Value>) -> Result<Self, RdpError> {
        decode("target", Value::Object(body.clone()))
    }

    /// Accept both the resource shape and the legacy `pageError` envelope.
    pub fn from_body_or_page_error(body: &Map<String, Value>) -> Result<Self, RdpError> {
        if let Some(page_error) = body.get("pageError") {
            return decode("target", page_error.clone());
        }
        Self::from_body(body)
    }
}

#[derive(Clone)]
pub struct TargetProxy {
    handle: ActorHandle,
    destroyed: Arc<AtomicBool>,
}

impl TargetProxy {
    pub fn new(name: String, dispatch: Addr<DispatchActor>) -> Self {
        TargetProxy {
            handle: ActorHandle::new(name, ActorKind::Target, dispatch),
            destroyed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Set when the engine destroys the target; requests afterwards are
    /// pointless and their failures benign.
    pub fn mark_destroyed(&self) {
        self.destroyed.store(true, Ordering::Relaxed);
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Relaxed)
    }

    pub fn unregister(&self) {
        self.handle.unregister();
    }
}

//! Source actors: one per script the engine has seen.

use actix::Addr;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{ActorHandle, decode};
use crate::dispatch::{ActorKind, DispatchActor};
use crate::error::RdpError;

/// The form describing a source, as carried by `source` resource events and
/// legacy `newSource` notifications.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceForm {
    pub actor: String,
    #[serde(default)]
    pub url: Option<String>,
    /// For pretty-printed or mapped sources: the URL of the generated file.
    #[serde(default)]
    pub generated_url: Option<String>,
    #[serde(rename = "sourceMapURL", default)]
    pub source_map_url: Option<String>,
    /// How the script entered the page ("scriptElement", "eval",
    /// "debugger eval", ...).
    #[serde(default)]
    pub introduction_type: Option<String>,
    #[serde(default)]
    pub is_black_boxed: bool,
}

impl SourceForm {
    pub fn from_body(body: &Map<String, Value>) -> Result<Self, RdpError> {
        #[derive(Deserialize)]
        struct SourceBody {
            source: SourceForm,
        }
        let parsed: SourceBody = decode("source", Value::Object(body.clone()))?;
        Ok(parsed.source)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct BreakpointPosition {
    pub line: u32,
    #[serde(default)]
    pub column: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceContent {
    /// Either the text itself or a long-string grip.
    pub source: Value,
    #[serde(default)]
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PositionsReply {
    positions: Vec<BreakpointPosition>,
}

#[derive(Clone)]
pub struct SourceProxy {
    handle: ActorHandle,
}

impl SourceProxy {
    pub fn new(name: String, dispatch: Addr<DispatchActor>) -> Self {
        SourceProxy {
            handle: ActorHandle::new(name, ActorKind::Source, dispatch),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Flip engine-side blackboxing for this source.
    pub async fn set_blackbox(&self, blackbox: bool) -> Result<(), RdpError> {
        let type_ = if blackbox { "blackbox" } else { "unblackbox" };
        self.handle.request(type_, json!({})).await?;
        Ok(())
    }

    pub async fn get_breakpoint_positions(&self) -> Result<Vec<BreakpointPosition>, RdpError> {
        let value = self
            .handle
            .request("getBreakpointPositions", json!({}))
            .await?;
        let reply: PositionsReply = decode(self.name(), value)?;
        Ok(reply.positions)
    }

    pub async fn prettify(&self) -> Result<(), RdpError> {
        self.handle.request("prettyPrint", json!({ "indent": 2 })).await?;
        Ok(())
    }

    pub async fn load_source(&self) -> Result<SourceContent, RdpError> {
        let value = self.handle.request("source", json!({})).await?;
        decode(self.name(), value)
    }

    pub fn unregister(&self) {
        self.handle.unregister();
    }
}

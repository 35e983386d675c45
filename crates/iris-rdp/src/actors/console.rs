//! Console actors: expression evaluation and console API subscription.

use actix::Addr;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{ActorHandle, decode};
use crate::dispatch::{ActorKind, DispatchActor};
use crate::error::RdpError;

/// Outcome of a console evaluation. Either `result` holds the value grip, or
/// `exception`/`exception_message` describe what was thrown.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub exception: Option<Value>,
    #[serde(default)]
    pub exception_message: Option<String>,
}

#[derive(Clone)]
pub struct ConsoleProxy {
    handle: ActorHandle,
}

impl ConsoleProxy {
    pub fn new(name: String, dispatch: Addr<DispatchActor>) -> Self {
        ConsoleProxy {
            handle: ActorHandle::new(name, ActorKind::Console, dispatch),
        }
    }

    pub fn name(&self) -> &str {
        self.handle.name()
    }

    /// Evaluate an expression in the target's global, returning a grip.
    pub async fn evaluate(&self, expression: &str) -> Result<EvaluationResult, RdpError> {
        let value = self
            .handle
            .request("evaluateJS", json!({ "text": expression }))
            .await?;
        decode(self.name(), value)
    }

    /// Subscribe to console API calls and page errors (legacy discovery;
    /// modern sessions receive these as watcher resources instead).
    pub async fn start_listeners(&self) -> Result<(), RdpError> {
        self.handle
            .request(
                "startListeners",
                json!({ "listeners": ["ConsoleAPI", "PageError"] }),
            )
            .await?;
        Ok(())
    }

    pub fn unregister(&self) {
        self.handle.unregister();
    }
}

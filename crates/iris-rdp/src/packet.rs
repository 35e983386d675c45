//! Wire packet parsing and construction.
//!
//! Every inbound packet carries a `from` actor name; outbound packets carry
//! `to` and `type`. Anything else is packet-specific payload kept as a raw
//! JSON map until a typed proxy gives it a shape.

use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::RdpError;

/// One parsed inbound packet.
#[derive(Debug, Clone, Deserialize)]
pub struct Packet {
    pub from: String,
    #[serde(rename = "type", default)]
    pub type_: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl Packet {
    pub fn parse(raw: &str) -> Result<Packet, RdpError> {
        serde_json::from_str(raw).map_err(|e| RdpError::Malformed(e.to_string()))
    }

    /// The error code of an error reply, if this is one.
    pub fn error_code(&self) -> Option<&str> {
        self.body.get("error").and_then(Value::as_str)
    }

    pub fn error_message(&self) -> String {
        self.body
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// The packet body as a JSON object, with `type` folded back in. Replies
    /// such as the thread's resume acknowledgement carry their state in
    /// `type`, so it must survive into the reply value.
    pub fn into_reply_value(mut self) -> Value {
        if let Some(type_) = self.type_.take() {
            self.body.insert("type".to_string(), Value::String(type_));
        }
        Value::Object(self.body)
    }
}

/// Build one serialized outbound request packet.
pub fn request(actor: &str, type_: &str, params: Value) -> String {
    let mut obj = match params {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            // Request parameters are always objects; anything else is a
            // caller bug. Keep the payload rather than dropping it.
            log::warn!("non-object request params for {actor}.{type_}: {other}");
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            map
        },
    };
    obj.insert("to".to_string(), json!(actor));
    obj.insert("type".to_string(), json!(type_));
    Value::Object(obj).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_from_and_type() {
        let packet = Packet::parse(r#"{"from":"server1.conn0.watcher2","type":"target-available","target":{}}"#)
            .unwrap();
        assert_eq!(packet.from, "server1.conn0.watcher2");
        assert_eq!(packet.type_.as_deref(), Some("target-available"));
        assert!(packet.body.contains_key("target"));
    }

    #[test]
    fn error_replies_are_detected() {
        let packet =
            Packet::parse(r#"{"from":"thread1","error":"wrongState","message":"not paused"}"#)
                .unwrap();
        assert_eq!(packet.error_code(), Some("wrongState"));
        assert_eq!(packet.error_message(), "not paused");
    }

    #[test]
    fn reply_value_keeps_the_type_field() {
        let packet = Packet::parse(r#"{"from":"thread1","type":"resumed"}"#).unwrap();
        let value = packet.into_reply_value();
        assert_eq!(value["type"], "resumed");
    }

    #[test]
    fn requests_carry_to_and_type() {
        let raw = request("root", "listTabs", json!({}));
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["to"], "root");
        assert_eq!(value["type"], "listTabs");
    }
}

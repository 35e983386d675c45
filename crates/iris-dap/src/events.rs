//! The closed set of events the bridge emits toward the editor.

use serde::Serialize;

use crate::types::Source;

/// One DAP event. Serializes adjacently tagged as `{event, body}`; the
/// editor integration wraps it into its protocol envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "body", rename_all = "camelCase")]
pub enum DapEvent {
    Initialized,
    Terminated,
    Stopped(StoppedEventBody),
    Continued(ContinuedEventBody),
    Thread(ThreadEventBody),
    Output(OutputEventBody),
    Breakpoint(BreakpointEventBody),
    // Custom events
    NewSource(NewSourceEventBody),
    ThreadStarted(ThreadStartedEventBody),
    ThreadExited(ThreadExitedEventBody),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoppedEventBody {
    pub reason: String,
    pub thread_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub all_threads_stopped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuedEventBody {
    pub thread_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadEventBody {
    /// `started` or `exited`.
    pub reason: String,
    pub thread_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCategory {
    Stdout,
    Stderr,
    Console,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputEventBody {
    pub output: String,
    pub category: OutputCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<i64>,
    /// Non-zero when the output value can be expanded like a variable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables_reference: Option<i64>,
}

impl OutputEventBody {
    pub fn plain(output: impl Into<String>, category: OutputCategory) -> Self {
        OutputEventBody {
            output: output.into(),
            category,
            source: None,
            line: None,
            column: None,
            variables_reference: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakpointEventBody {
    /// `changed`, `new` or `removed`.
    pub reason: String,
    pub breakpoint: crate::types::Breakpoint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSourceEventBody {
    pub thread_id: i64,
    pub source_id: i64,
    pub url: String,
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadStartedEventBody {
    pub name: String,
    pub id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadExitedEventBody {
    pub id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_event_and_body() {
        let event = DapEvent::Stopped(StoppedEventBody {
            reason: "breakpoint".to_string(),
            thread_id: 1,
            text: None,
            all_threads_stopped: false,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "stopped");
        assert_eq!(value["body"]["threadId"], 1);
        assert_eq!(value["body"]["allThreadsStopped"], false);
    }

    #[test]
    fn custom_events_use_camel_case_names() {
        let event = DapEvent::ThreadStarted(ThreadStartedEventBody {
            name: "Tab 1".to_string(),
            id: 2,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "threadStarted");

        let event = DapEvent::NewSource(NewSourceEventBody {
            thread_id: 2,
            source_id: 7,
            url: "https://example.com/app.js".to_string(),
            path: None,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "newSource");
        assert_eq!(value["body"]["path"], serde_json::Value::Null);
    }

    #[test]
    fn unit_variants_serialize_without_body() {
        let value = serde_json::to_value(DapEvent::Initialized).unwrap();
        assert_eq!(value["event"], "initialized");
    }
}

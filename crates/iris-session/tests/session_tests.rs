//! End-to-end session tests against a scripted in-process debugger server.
//!
//! The mock connection answers every request by packet type, so discovery
//! runs exactly like it would against a live browser, and the tests then
//! drive pause/resume/breakpoint traffic by hand.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix::prelude::*;
use iris_core::config::{PathMappingEntry, SessionConfig};
use iris_dap::DapEvent;
use iris_rdp::{DispatchActor, RdpEvent};
use iris_session::session::{EmitDapEvent, SessionActor};
use iris_session::{Continue, Scopes, SetBreakpoints, StackTrace, Threads, Variables};
use iris_transport::{PacketReceived, WritePacket};
use serde_json::{Value, json};

// --- Mock debugger server ---

#[derive(Default)]
struct ServerState {
    sent: Vec<Value>,
    dispatch: Option<Recipient<PacketReceived>>,
}

struct MockServer {
    state: Arc<Mutex<ServerState>>,
}

impl Actor for MockServer {
    type Context = Context<Self>;
}

#[derive(Message)]
#[rtype(result = "()")]
struct SetDispatch(Recipient<PacketReceived>);

impl Handler<SetDispatch> for MockServer {
    type Result = ();

    fn handle(&mut self, msg: SetDispatch, _ctx: &mut Context<Self>) {
        self.state.lock().unwrap().dispatch = Some(msg.0);
    }
}

/// Scripted replies, keyed by (to, type). Unknown requests get an empty
/// acknowledgement so nothing ever hangs.
fn replies_for(packet: &Value) -> Vec<Value> {
    let to = packet["to"].as_str().unwrap_or_default();
    let type_ = packet["type"].as_str().unwrap_or_default();
    match (to, type_) {
        ("root", "getRoot") => vec![json!({
            "from": "root",
            "preferenceActor": "pref1",
            "addonsActor": "addons1"
        })],
        ("root", "getProcess") => vec![json!({
            "from": "root",
            "processDescriptor": { "actor": "processDescriptor1" }
        })],
        // Legacy discovery: two already-open tabs.
        ("root", "listTabs") => vec![json!({
            "from": "root",
            "tabs": [
                { "actor": "tab1", "title": "One", "url": "https://one.test/" },
                { "actor": "tab2", "title": "Two", "url": "https://two.test/" }
            ]
        })],
        ("processDescriptor1", "getWatcher") => vec![json!({
            "from": "processDescriptor1",
            "actor": "watcher1",
            "traits": { "content_script": true, "worker": true }
        })],
        ("watcher1", "getThreadConfigurationActor") => vec![json!({
            "from": "watcher1",
            "configuration": { "actor": "threadConfig1" }
        })],
        ("watcher1", "getBreakpointListActor") => vec![json!({
            "from": "watcher1",
            "breakpointList": { "actor": "breakpointList1" }
        })],
        // Completing the resource watch triggers the first target, like a
        // real parent process replaying existing targets.
        ("watcher1", "watchResources") => vec![
            json!({ "from": "watcher1" }),
            json!({
                "from": "watcher1",
                "type": "target-available",
                "target": {
                    "actor": "target1",
                    "targetType": "frame",
                    "url": "https://example.com/",
                    "title": "Example",
                    "threadActor": "thread1",
                    "consoleActor": "console1"
                }
            }),
        ],
        ("thread1", "frames") => vec![json!({
            "from": "thread1",
            "frames": [{
                "actor": "frame1",
                "type": "call",
                "displayName": "f",
                "where": { "actor": "source1", "line": 5, "column": 0 },
                "environment": {
                    "type": "function",
                    "bindings": {
                        "arguments": [],
                        "variables": { "i": { "value": 2 } }
                    }
                }
            }]
        })],
        ("thread1", "resume") => vec![json!({ "from": "thread1", "type": "resumed" })],
        ("pref1", "getBoolPref") => vec![json!({ "from": "pref1", "value": false })],
        ("addons1", "installTemporaryAddon") => vec![json!({
            "from": "addons1",
            "addon": { "id": "helper@iris" }
        })],
        // Per-tab watchers (legacy discovery) share generic shapes.
        (tab, "getWatcher") => vec![json!({
            "from": tab,
            "actor": format!("{tab}-watcher"),
            "traits": {}
        })],
        (watcher, "getThreadConfigurationActor") => vec![json!({
            "from": watcher,
            "configuration": { "actor": format!("{watcher}-config") }
        })],
        (watcher, "getBreakpointListActor") => vec![json!({
            "from": watcher,
            "breakpointList": { "actor": format!("{watcher}-bps") }
        })],
        _ => vec![json!({ "from": to })],
    }
}

impl Handler<WritePacket> for MockServer {
    type Result = ();

    fn handle(&mut self, msg: WritePacket, _ctx: &mut Context<Self>) {
        let packet: Value = serde_json::from_str(&msg.0).expect("outbound packets are JSON");
        let mut state = self.state.lock().unwrap();
        state.sent.push(packet.clone());
        if let Some(dispatch) = state.dispatch.clone() {
            for reply in replies_for(&packet) {
                let _ = dispatch.do_send(PacketReceived(reply.to_string()));
            }
        }
    }
}

// --- DAP event collector ---

struct DapCollector {
    events: Arc<Mutex<Vec<DapEvent>>>,
}

impl Actor for DapCollector {
    type Context = Context<Self>;
}

impl Handler<EmitDapEvent> for DapCollector {
    type Result = ();

    fn handle(&mut self, msg: EmitDapEvent, _ctx: &mut Context<Self>) {
        self.events.lock().unwrap().push(msg.0);
    }
}

// --- Event plumbing ---
//
// The dispatcher wants its event recipient up front, but the session under
// test does not exist yet at that point; this forwarder stands in until
// the session address is known.

#[derive(Default)]
struct EventForwarder {
    target: Option<Recipient<RdpEvent>>,
}

impl Actor for EventForwarder {
    type Context = Context<Self>;
}

#[derive(Message)]
#[rtype(result = "()")]
struct SetTarget(Recipient<RdpEvent>);

impl Handler<SetTarget> for EventForwarder {
    type Result = ();

    fn handle(&mut self, msg: SetTarget, _ctx: &mut Context<Self>) {
        self.target = Some(msg.0);
    }
}

impl Handler<RdpEvent> for EventForwarder {
    type Result = ();

    fn handle(&mut self, msg: RdpEvent, _ctx: &mut Context<Self>) {
        if let Some(target) = &self.target {
            let _ = target.do_send(msg);
        }
    }
}

// --- Fixture ---

struct Fixture {
    session: Addr<SessionActor>,
    dispatch: Addr<DispatchActor>,
    server: Arc<Mutex<ServerState>>,
    events: Arc<Mutex<Vec<DapEvent>>>,
}

impl Fixture {
    async fn inject(&self, packet: Value) {
        self.dispatch
            .send(PacketReceived(packet.to_string()))
            .await
            .unwrap();
        settle().await;
    }

    fn dap_events(&self) -> Vec<DapEvent> {
        self.events.lock().unwrap().clone()
    }

    fn sent_types(&self) -> Vec<(String, String)> {
        self.server
            .lock()
            .unwrap()
            .sent
            .iter()
            .map(|p| {
                (
                    p["to"].as_str().unwrap_or_default().to_string(),
                    p["type"].as_str().unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    fn count_sent(&self, to: &str, type_: &str) -> usize {
        self.sent_types()
            .iter()
            .filter(|(t, ty)| t == to && ty == type_)
            .count()
    }

    fn stopped_count(&self) -> usize {
        self.dap_events()
            .iter()
            .filter(|e| matches!(e, DapEvent::Stopped(_)))
            .count()
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(60)).await;
}

fn test_config() -> SessionConfig {
    let mut config = SessionConfig::default();
    config.debug.path_mappings.push(PathMappingEntry {
        url: "https://example.com/".to_string(),
        path: "/work/".to_string(),
    });
    config
}

async fn start_session_in(config: SessionConfig, modern: bool) -> Fixture {
    let server_state = Arc::new(Mutex::new(ServerState::default()));
    let server = MockServer {
        state: server_state.clone(),
    }
    .start();

    let events = Arc::new(Mutex::new(Vec::new()));
    let collector = DapCollector {
        events: events.clone(),
    }
    .start();

    let forwarder = EventForwarder::default().start();
    let dispatch =
        DispatchActor::new(server.clone().recipient(), forwarder.clone().recipient()).start();
    server
        .send(SetDispatch(dispatch.clone().recipient()))
        .await
        .unwrap();

    let session = SessionActor::with_protocol(config, collector.recipient(), dispatch.clone())
        .unwrap()
        .start();
    forwarder
        .send(SetTarget(session.clone().recipient()))
        .await
        .unwrap();
    settle().await;

    let fixture = Fixture {
        session,
        dispatch,
        server: server_state,
        events,
    };
    // The root greeting kicks off discovery; the scripted replies carry it
    // through to the first target (or tab list).
    fixture
        .inject(json!({
            "from": "root",
            "applicationType": "browser",
            "traits": {
                "nativeLogpoints": true,
                "supportsEnableWindowGlobalThreadActors": modern
            }
        }))
        .await;
    settle().await;
    fixture
}

async fn start_session(config: SessionConfig) -> Fixture {
    start_session_in(config, true).await
}

/// Announce one script source on the discovered target.
async fn announce_source(fixture: &Fixture, url: &str, introduction_type: Option<&str>) {
    let mut source = json!({
        "actor": "source1",
        "url": url,
        "isBlackBoxed": false
    });
    if let Some(kind) = introduction_type {
        source["introductionType"] = json!(kind);
    }
    fixture
        .inject(json!({
            "from": "target1",
            "type": "source",
            "source": source
        }))
        .await;
}

fn paused_packet(why: Value) -> Value {
    json!({
        "from": "target1",
        "type": "thread-state",
        "state": "paused",
        "why": why,
        "frame": {
            "actor": "frame1",
            "type": "call",
            "displayName": "f",
            "where": { "actor": "source1", "line": 5, "column": 0 }
        }
    })
}

fn resumed_packet() -> Value {
    json!({ "from": "target1", "type": "thread-state", "state": "resumed" })
}

// --- Tests ---

#[actix_rt::test]
async fn discovery_reaches_running_and_registers_the_thread() {
    let fixture = start_session(test_config()).await;

    let events = fixture.dap_events();
    assert!(events.iter().any(|e| matches!(e, DapEvent::Initialized)));
    assert!(events.iter().any(|e| matches!(
        e,
        DapEvent::Thread(body) if body.reason == "started" && body.thread_id == 1
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        DapEvent::ThreadStarted(body) if body.id == 1 && body.name == "Example"
    )));

    // Resources are watched only after every target watch completed.
    let sent = fixture.sent_types();
    let resources_at = sent
        .iter()
        .position(|(_, t)| t == "watchResources")
        .expect("watchResources must be sent");
    let last_target_watch = sent
        .iter()
        .rposition(|(_, t)| t == "watchTargets")
        .expect("watchTargets must be sent");
    assert!(last_target_watch < resources_at);

    let threads = fixture.session.send(Threads).await.unwrap().unwrap();
    assert_eq!(threads.threads.len(), 1);
    assert_eq!(threads.threads[0].name, "Example");
}

#[actix_rt::test]
async fn target_lifecycle_emits_started_then_exited_exactly_once() {
    let fixture = start_session(test_config()).await;
    announce_source(&fixture, "https://example.com/s.js", None).await;

    let new_source_seen = fixture
        .dap_events()
        .iter()
        .any(|e| matches!(e, DapEvent::NewSource(body) if body.thread_id == 1));
    assert!(new_source_seen);

    fixture
        .inject(json!({
            "from": "watcher1",
            "type": "target-destroyed",
            "target": "target1"
        }))
        .await;
    // A duplicate destroy notification must not produce a second exit.
    fixture
        .inject(json!({
            "from": "watcher1",
            "type": "target-destroyed",
            "target": "target1"
        }))
        .await;

    let exits: Vec<_> = fixture
        .dap_events()
        .into_iter()
        .filter(|e| matches!(e, DapEvent::ThreadExited(_)))
        .collect();
    assert_eq!(exits.len(), 1);

    // The thread is gone; its stack can no longer be requested.
    let result = fixture
        .session
        .send(StackTrace { thread_id: 1 })
        .await
        .unwrap();
    assert!(result.is_err());
}

#[actix_rt::test]
async fn surfaced_stop_builds_stack_scopes_and_variables() {
    let fixture = start_session(test_config()).await;
    announce_source(&fixture, "https://example.com/s.js", None).await;

    fixture
        .inject(paused_packet(json!({ "type": "debuggerStatement" })))
        .await;
    settle().await;

    let events = fixture.dap_events();
    let stopped = events
        .iter()
        .find_map(|e| match e {
            DapEvent::Stopped(body) => Some(body.clone()),
            _ => None,
        })
        .expect("a stopped event must be emitted");
    assert_eq!(stopped.reason, "debugger statement");
    assert_eq!(stopped.thread_id, 1);
    assert!(!stopped.all_threads_stopped);

    let stack = fixture
        .session
        .send(StackTrace { thread_id: 1 })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stack.stack_frames.len(), 1);
    let frame = &stack.stack_frames[0];
    assert_eq!(frame.name, "f");
    assert_eq!(frame.line, 5);
    assert_eq!(
        frame.source.as_ref().unwrap().path.as_deref(),
        Some("/work/s.js")
    );

    let scopes = fixture
        .session
        .send(Scopes { frame_id: frame.id })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(scopes.scopes.len(), 1);
    let reference = scopes.scopes[0].variables_reference;

    let variables = fixture
        .session
        .send(Variables {
            variables_reference: reference,
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(variables.variables.len(), 1);
    assert_eq!(variables.variables[0].name, "i");
    assert_eq!(variables.variables[0].value, "2");

    // Resume: pause-lifetime references die before `continued` is observed.
    let _ = fixture
        .session
        .send(Continue { thread_id: 1 })
        .await
        .unwrap()
        .unwrap();
    fixture.inject(resumed_packet()).await;

    assert!(fixture
        .dap_events()
        .iter()
        .any(|e| matches!(e, DapEvent::Continued(body) if body.thread_id == 1)));
    let stale = fixture
        .session
        .send(Variables {
            variables_reference: reference,
        })
        .await
        .unwrap();
    assert!(stale.is_err(), "pause-lifetime reference must be invalid");
}

#[actix_rt::test]
async fn hit_count_breakpoint_surfaces_only_the_nth_stop() {
    let fixture = start_session(test_config()).await;
    announce_source(&fixture, "https://example.com/s.js", None).await;

    let response = fixture
        .session
        .send(SetBreakpoints {
            args: serde_json::from_value(json!({
                "source": { "path": "/work/s.js" },
                "breakpoints": [ { "line": 5, "hitCondition": "3" } ]
            }))
            .unwrap(),
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(response.breakpoints.len(), 1);
    assert!(response.breakpoints[0].verified);

    let breakpoint_stop = json!({ "type": "breakpoint" });
    // Hits 1 and 2 are swallowed and auto-resumed.
    for _ in 0..2 {
        fixture.inject(paused_packet(breakpoint_stop.clone())).await;
        fixture.inject(resumed_packet()).await;
    }
    assert_eq!(fixture.stopped_count(), 0);

    // Hit 3 surfaces.
    fixture.inject(paused_packet(breakpoint_stop.clone())).await;
    assert_eq!(fixture.stopped_count(), 1);

    // Continue; hits 4 and 5 are swallowed again.
    let _ = fixture.session.send(Continue { thread_id: 1 }).await.unwrap();
    fixture.inject(resumed_packet()).await;
    for _ in 0..2 {
        fixture.inject(paused_packet(breakpoint_stop.clone())).await;
        fixture.inject(resumed_packet()).await;
    }
    assert_eq!(fixture.stopped_count(), 1, "exactly one stop for five hits");
}

#[actix_rt::test]
async fn blackboxed_sources_auto_resume_without_a_stop() {
    let mut config = test_config();
    config.debug.skip_files = vec!["**/lib/**".to_string()];
    let fixture = start_session(config).await;
    announce_source(&fixture, "https://example.com/lib/a.js", None).await;

    // The skip rule disagrees with the engine state; the bridge pushes the
    // blackbox flag down.
    assert!(fixture
        .sent_types()
        .iter()
        .any(|(to, t)| to == "source1" && t == "blackbox"));

    fixture
        .inject(paused_packet(json!({ "type": "exception" })))
        .await;

    assert_eq!(fixture.stopped_count(), 0, "blackboxed stop must not surface");
    assert!(
        fixture
            .sent_types()
            .iter()
            .any(|(to, t)| to == "thread1" && t == "resume"),
        "the stop must be auto-resumed"
    );
}

#[actix_rt::test]
async fn debugger_eval_exceptions_are_swallowed() {
    let fixture = start_session(test_config()).await;
    announce_source(&fixture, "https://example.com/s.js", Some("debugger eval")).await;

    fixture
        .inject(paused_packet(json!({ "type": "exception" })))
        .await;

    assert_eq!(fixture.stopped_count(), 0);
    assert!(fixture
        .sent_types()
        .iter()
        .any(|(to, t)| to == "thread1" && t == "resume"));

    // A breakpoint stop in the same source still surfaces.
    fixture.inject(resumed_packet()).await;
    fixture
        .inject(paused_packet(json!({ "type": "breakpoint" })))
        .await;
    assert_eq!(fixture.stopped_count(), 1);
}

#[actix_rt::test]
async fn console_timer_messages_render_once() {
    let fixture = start_session(test_config()).await;

    fixture
        .inject(json!({
            "from": "target1",
            "type": "console-message",
            "messageType": "time",
            "timer": { "name": "t" },
            "arguments": []
        }))
        .await;
    fixture
        .inject(json!({
            "from": "target1",
            "type": "console-message",
            "messageType": "timeEnd",
            "timer": { "name": "t", "duration": 123.0 },
            "arguments": []
        }))
        .await;

    let outputs: Vec<String> = fixture
        .dap_events()
        .into_iter()
        .filter_map(|e| match e {
            DapEvent::Output(body) => Some(body.output),
            _ => None,
        })
        .collect();
    assert_eq!(outputs.len(), 1, "the timer start must not produce output");
    assert!(
        outputs[0].starts_with("t: 123ms - timer ended"),
        "got {:?}",
        outputs[0]
    );
}

#[actix_rt::test]
async fn exception_stops_carry_the_error_text() {
    let fixture = start_session(test_config()).await;
    announce_source(&fixture, "https://example.com/s.js", None).await;

    fixture
        .inject(paused_packet(json!({
            "type": "exception",
            "exception": {
                "type": "object",
                "class": "Error",
                "actor": "obj1",
                "preview": { "kind": "Error", "name": "Error", "message": "x" }
            }
        })))
        .await;

    let stopped = fixture
        .dap_events()
        .into_iter()
        .find_map(|e| match e {
            DapEvent::Stopped(body) => Some(body),
            _ => None,
        })
        .expect("exception stop must surface");
    assert_eq!(stopped.reason, "exception");
    assert_eq!(stopped.text.as_deref(), Some("Error: x"));
}

#[actix_rt::test]
async fn disconnect_cleans_up_and_emits_terminated_last() {
    let fixture = start_session(test_config()).await;
    announce_source(&fixture, "https://example.com/s.js", None).await;

    fixture
        .session
        .send(iris_session::DisconnectSession { terminate: None })
        .await
        .unwrap()
        .unwrap();
    settle().await;
    settle().await;

    assert!(fixture
        .dap_events()
        .iter()
        .any(|e| matches!(e, DapEvent::Terminated)));

    let threads = fixture.session.send(Threads).await.unwrap().unwrap();
    assert!(threads.threads.is_empty(), "registries must be empty");

    // Events after termination are dropped.
    let before = fixture.dap_events().len();
    fixture
        .inject(json!({
            "from": "target1",
            "type": "console-message",
            "arguments": ["late"]
        }))
        .await;
    assert_eq!(fixture.dap_events().len(), before);
}

#[actix_rt::test]
async fn reload_tabs_reloads_each_tab_exactly_once() {
    let mut config = test_config();
    config.firefox.reload_tabs = true;
    // Legacy discovery is the path where tab descriptors (and their reload
    // surface) are in hand.
    let fixture = start_session_in(config, false).await;
    settle().await;

    assert_eq!(fixture.count_sent("tab1", "reload"), 1);
    assert_eq!(fixture.count_sent("tab2", "reload"), 1);

    // A tab opened after the first discovery wave must not be reloaded.
    fixture
        .inject(json!({
            "from": "root",
            "type": "tabOpened",
            "tab": { "actor": "tab3", "title": "Three", "url": "https://three.test/" }
        }))
        .await;
    settle().await;

    assert!(
        fixture.count_sent("tab3", "getWatcher") >= 1,
        "the late tab must still be attached"
    );
    assert_eq!(fixture.count_sent("tab3", "reload"), 0);
    assert_eq!(fixture.count_sent("tab1", "reload"), 1);
    assert_eq!(fixture.count_sent("tab2", "reload"), 1);
}

#[actix_rt::test]
async fn re_attach_disconnect_leaves_the_browser_running() {
    let mut config = test_config();
    config.firefox.re_attach = true;
    config.firefox.terminator_addon_path = Some("/opt/iris/terminator".into());
    config.firefox.terminate_timeout = Duration::from_millis(50);
    let fixture = start_session(config).await;

    fixture
        .session
        .send(iris_session::DisconnectSession { terminate: None })
        .await
        .unwrap()
        .unwrap();
    settle().await;
    settle().await;

    assert!(fixture
        .dap_events()
        .iter()
        .any(|e| matches!(e, DapEvent::Terminated)));
    assert_eq!(
        fixture.count_sent("addons1", "installTemporaryAddon"),
        0,
        "a reAttach session must not shut the browser down"
    );
}

#[actix_rt::test]
async fn terminate_installs_the_terminator_addon_for_attached_browsers() {
    let mut config = test_config();
    config.firefox.terminator_addon_path = Some("/opt/iris/terminator".into());
    config.firefox.terminate_timeout = Duration::from_millis(50);
    let fixture = start_session(config).await;

    fixture
        .session
        .send(iris_session::DisconnectSession { terminate: None })
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(fixture.count_sent("addons1", "installTemporaryAddon"), 1);
    assert!(fixture
        .dap_events()
        .iter()
        .any(|e| matches!(e, DapEvent::Terminated)));
}

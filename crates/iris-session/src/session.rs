//! The session orchestrator: one actor owning the protocol stack, the
//! registries and the lifecycle from connect to terminate.
//!
//! All bridge state mutation happens on this actor. Protocol work that has
//! to await the wire runs in spawned futures built from cloned proxies; the
//! results come back as internal messages and are applied here.

use std::collections::HashMap;
use std::sync::Arc;

use actix::prelude::*;
use globset::{Glob, GlobSet, GlobSetBuilder};
use iris_core::Registry;
use iris_core::config::{RequestKind, SessionConfig};
use iris_dap::{
    BreakpointEventBody, ContinuedEventBody, DapEvent, OutputCategory, OutputEventBody,
    StoppedEventBody, ThreadEventBody, ThreadExitedEventBody, ThreadStartedEventBody,
};
use iris_rdp::actors::{
    AddonsProxy, BreakpointListProxy, BreakpointLocation, BreakpointOptions,
    ConsoleMessageResource, ConsoleProxy, DescriptorProxy, ErrorMessageResource, FrameForm,
    PauseReason, PreferenceProxy, RootForm, RootInit, RootProxy, SourceForm, SourceProxy,
    TabDescriptorForm, TargetForm, TargetKind, TargetProxy, ThreadConfigurationProxy,
    ThreadConfigurationUpdate, ThreadProxy, ThreadStateUpdate, WatcherProxy,
    watcher::{self, ResourceKind},
};
use iris_rdp::{DispatchActor, RdpEvent};
use iris_transport::{
    CloseConnection, ConnectParams, ConnectionActor, ConnectionState, LinkStateChanged,
};
use log::{debug, error, info, warn};
use serde_json::Value;

use crate::breakpoints::{BreakpointManager, HitVerdict};
use crate::error::SessionError;
use crate::launch::{self, LaunchedFirefox};
use crate::pathmap::PathMappings;
use crate::skip::SkipFileManager;
use crate::source::SourceManager;
use crate::sourcemaps::{FileSourceMapLoader, SourceMapCache, SourceMapLoader};
use crate::thread::{
    FrameEntry, PauseState, StopDisposition, ThreadAdapter, evaluate_stop_gates,
};
use crate::variables::VariablesProvider;

/// Outbound DAP event, delivered to the editor integration.
#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct EmitDapEvent(pub DapEvent);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionState {
    Connecting,
    Discovering,
    Running,
    Terminating,
    Terminated,
}

/// The four resource streams every attached descriptor watches.
const WATCHED_RESOURCES: &[ResourceKind] = &[
    ResourceKind::ConsoleMessage,
    ResourceKind::ErrorMessage,
    ResourceKind::Source,
    ResourceKind::ThreadState,
];

pub(crate) struct Discovery {
    pub descriptor: DescriptorProxy,
    pub watcher: WatcherProxy,
    pub thread_configuration: ThreadConfigurationProxy,
    pub breakpoint_list: BreakpointListProxy,
}

/// A frame prepared off-actor: fetched and source-mapped.
pub(crate) struct PreparedFrame {
    pub form: FrameForm,
    pub source_url: Option<String>,
    pub line: u32,
    pub column: u32,
}

#[derive(Message)]
#[rtype(result = "()")]
pub(crate) enum Internal {
    ConnectionPrepared(Result<Option<LaunchedFirefox>, SessionError>),
    RootFetched(RootForm),
    DiscoveryDone(Result<Discovery, SessionError>),
    TabsListed(Vec<TabDescriptorForm>),
    FramesInstalled {
        thread_id: u32,
        frames: Vec<PreparedFrame>,
    },
    SourceMapped {
        source_id: u32,
        original_url: String,
    },
    BreakpointVerified {
        path: String,
        id: i64,
        line: u32,
        column: Option<u32>,
    },
    Emit(DapEvent),
    TerminationDone,
}

pub struct SessionActor {
    pub(crate) config: SessionConfig,
    dap: Recipient<EmitDapEvent>,
    pub(crate) state: SessionState,
    connection: Option<Addr<ConnectionActor>>,
    pub(crate) dispatch: Option<Addr<DispatchActor>>,
    root: Option<RootProxy>,
    /// Watcher-based discovery, selected by the server traits.
    modern: bool,
    launched: Option<LaunchedFirefox>,
    /// Reload tabs once, on the first discovery wave after connect.
    reload_pending: bool,
    /// A tab target just went away; if its replacement shows up the page
    /// reloaded and the console may need clearing.
    console_clear_pending: bool,
    descriptors: HashMap<String, DescriptorProxy>,
    watchers: Vec<WatcherProxy>,
    /// Watcher actor -> owning descriptor actor, for destruction cascades.
    watcher_descriptors: HashMap<String, String>,
    pub(crate) thread_configuration: Option<ThreadConfigurationProxy>,
    pub(crate) breakpoint_list: Option<BreakpointListProxy>,
    preference: Option<PreferenceProxy>,
    addons: Option<AddonsProxy>,
    pub(crate) threads: Registry<ThreadAdapter>,
    pub(crate) thread_by_target: HashMap<String, u32>,
    thread_by_thread_actor: HashMap<String, u32>,
    thread_by_console: HashMap<String, u32>,
    pub(crate) frames: Registry<FrameEntry>,
    pub(crate) variable_providers: Registry<VariablesProvider>,
    pub(crate) sources: SourceManager,
    pub(crate) sourcemaps: Arc<SourceMapCache>,
    skip: SkipFileManager,
    pub(crate) breakpoints: BreakpointManager,
    pub(crate) active_thread: Option<u32>,
    pub(crate) exception_filters: Vec<String>,
    tab_include: GlobSet,
    tab_exclude: GlobSet,
}

fn compile_globs(patterns: &[String]) -> Result<GlobSet, SessionError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).map_err(|e| {
            SessionError::InvalidRequest(format!("bad tab filter pattern {pattern:?}: {e}"))
        })?);
    }
    builder
        .build()
        .map_err(|e| SessionError::InvalidRequest(e.to_string()))
}

impl SessionActor {
    pub fn new(
        config: SessionConfig,
        dap: Recipient<EmitDapEvent>,
    ) -> Result<Self, SessionError> {
        let skip = SkipFileManager::new(&config.debug.skip_files)?;
        let mappings = PathMappings::new(config.debug.path_mappings.clone());
        let tab_include = compile_globs(&config.debug.tab_filter.include)?;
        let tab_exclude = compile_globs(&config.debug.tab_filter.exclude)?;
        let reload_pending = config.firefox.reload_tabs;
        Ok(SessionActor {
            config,
            dap,
            state: SessionState::Connecting,
            connection: None,
            dispatch: None,
            root: None,
            modern: false,
            launched: None,
            reload_pending,
            console_clear_pending: false,
            descriptors: HashMap::new(),
            watchers: Vec::new(),
            watcher_descriptors: HashMap::new(),
            thread_configuration: None,
            breakpoint_list: None,
            preference: None,
            addons: None,
            threads: Registry::new(),
            thread_by_target: HashMap::new(),
            thread_by_thread_actor: HashMap::new(),
            thread_by_console: HashMap::new(),
            frames: Registry::new(),
            variable_providers: Registry::new(),
            sources: SourceManager::new(mappings),
            sourcemaps: Arc::new(SourceMapCache::new(Arc::new(FileSourceMapLoader))),
            skip,
            breakpoints: BreakpointManager::new(),
            active_thread: None,
            exception_filters: Vec::new(),
            tab_include,
            tab_exclude,
        })
    }

    /// Replace the source-map loader (tests, remote-map integrations).
    pub fn with_source_map_loader(mut self, loader: Arc<dyn SourceMapLoader>) -> Self {
        self.sourcemaps = Arc::new(SourceMapCache::new(loader));
        self
    }

    /// Run against an externally-built dispatcher instead of opening a
    /// socket. Used by tests driving the wire by hand; the caller is
    /// responsible for pointing the dispatcher's event recipient at this
    /// session once it is started.
    pub fn with_protocol(
        config: SessionConfig,
        dap: Recipient<EmitDapEvent>,
        dispatch: Addr<DispatchActor>,
    ) -> Result<Self, SessionError> {
        let mut session = SessionActor::new(config, dap)?;
        session.dispatch = Some(dispatch);
        Ok(session)
    }

    // --- event emission ---

    pub(crate) fn emit(&self, event: DapEvent) {
        if self.state == SessionState::Terminated {
            return;
        }
        if self.dap.try_send(EmitDapEvent(event)).is_err() {
            warn!("DAP event sink is gone.");
        }
    }

    pub(crate) fn emit_output(&self, category: OutputCategory, text: impl Into<String>) {
        let mut output: String = text.into();
        if !output.ends_with('\n') {
            output.push('\n');
        }
        self.emit(DapEvent::Output(OutputEventBody::plain(output, category)));
    }

    // --- connection bring-up ---

    fn begin_connect(&mut self, ctx: &mut Context<Self>) {
        let config = self.config.clone();
        let addr = ctx.address();
        let fut = async move {
            let result = prepare_connection(&config).await;
            addr.do_send(Internal::ConnectionPrepared(result));
        };
        ctx.spawn(fut.into_actor(self).map(|_, _, _| ()));
    }

    fn setup_protocol(&mut self, ctx: &mut Context<Self>) {
        let params = ConnectParams {
            host: self.config.connection.host.clone(),
            port: self.config.connection.port,
            connect_timeout: self.config.connection.connect_timeout,
        };

        // Protocol events land directly on this actor; there is no other
        // consumer.
        let session_events = ctx.address().recipient::<RdpEvent>();
        let session_status = ctx.address().recipient::<LinkStateChanged>();
        let mut connection_slot = None;
        let dispatch = DispatchActor::create(|dispatch_ctx| {
            let connection = ConnectionActor::new(
                params,
                dispatch_ctx.address().recipient(),
                session_status,
            )
            .start();
            connection_slot = Some(connection.clone());
            DispatchActor::new(connection.recipient(), session_events)
        });

        self.connection = connection_slot;
        self.root = Some(RootProxy::new(dispatch.clone()));
        self.dispatch = Some(dispatch);
        info!("Protocol stack is up; waiting for the root greeting.");
    }

    // --- root init & discovery ---

    fn handle_root_init(&mut self, init: RootInit, ctx: &mut Context<Self>) {
        info!(
            "Root greeting from a {} (modern mode: {})",
            init.application_type, init.traits.supports_enable_window_global_thread_actors
        );

        if !init.traits.native_logpoints {
            self.fail_session(
                "The browser is too old for this debug adapter (no native logpoint support). \
                 Please update it.",
            );
            return;
        }
        self.modern = init.traits.supports_enable_window_global_thread_actors;
        self.state = SessionState::Discovering;

        let Some(root) = self.root.clone() else {
            return;
        };
        let addr = ctx.address();

        // Top-level sub-actors (preference, addons) in parallel with the
        // descriptor discovery.
        let fetch_root = {
            let root = root.clone();
            let addr = addr.clone();
            async move {
                match root.fetch_root().await {
                    Ok(form) => addr.do_send(Internal::RootFetched(form)),
                    Err(e) => warn!("getRoot failed: {e}"),
                }
            }
        };
        ctx.spawn(fetch_root.into_actor(self).map(|_, _, _| ()));

        if self.modern {
            let dispatch = self.dispatch.clone();
            let discover = async move {
                let result = discover_parent_process(root, dispatch).await;
                addr.do_send(Internal::DiscoveryDone(result));
            };
            ctx.spawn(discover.into_actor(self).map(|_, _, _| ()));
        } else {
            let list = async move {
                match root.list_tabs().await {
                    Ok(tabs) => addr.do_send(Internal::TabsListed(tabs)),
                    Err(e) => {
                        addr.do_send(Internal::DiscoveryDone(Err(SessionError::Rdp(e))));
                    },
                }
            };
            ctx.spawn(list.into_actor(self).map(|_, _, _| ()));
        }
    }

    /// Attach one tab descriptor (legacy discovery): watcher, targets,
    /// resources, exactly like the parent-process path but per tab.
    fn attach_tab(&mut self, tab: TabDescriptorForm, ctx: &mut Context<Self>) {
        if self.descriptors.contains_key(&tab.actor) {
            return;
        }
        let Some(dispatch) = self.dispatch.clone() else {
            return;
        };
        let descriptor = DescriptorProxy::new(tab.actor.clone(), dispatch);
        self.descriptors.insert(tab.actor.clone(), descriptor.clone());

        let reload = self.reload_pending;
        let addr = ctx.address();
        let fut = async move {
            let result = attach_descriptor(descriptor, reload).await;
            addr.do_send(Internal::DiscoveryDone(result));
        };
        ctx.spawn(fut.into_actor(self).map(|_, _, _| ()));
    }

    fn finish_discovery(&mut self, discovery: Discovery) {
        self.watcher_descriptors.insert(
            discovery.watcher.name().to_string(),
            discovery.descriptor.name().to_string(),
        );
        self.descriptors
            .insert(discovery.descriptor.name().to_string(), discovery.descriptor);
        self.watchers.push(discovery.watcher);
        if self.breakpoint_list.is_none() {
            self.breakpoint_list = Some(discovery.breakpoint_list);
        }
        let is_first = self.thread_configuration.is_none();
        if is_first {
            self.thread_configuration = Some(discovery.thread_configuration);
        }
        if self.state == SessionState::Discovering {
            self.state = SessionState::Running;
            self.emit(DapEvent::Initialized);
        }
        // The first discovery wave is over; later tab discoveries must not
        // reload anything.
        self.reload_pending = false;

        if is_first && !self.exception_filters.is_empty() {
            self.apply_exception_filters();
        }
    }

    pub(crate) fn apply_exception_filters(&self) {
        let Some(configuration) = self.thread_configuration.clone() else {
            return;
        };
        let pause = !self.exception_filters.is_empty();
        let ignore_caught = !self.exception_filters.iter().any(|f| f == "all");
        let update = ThreadConfigurationUpdate {
            pause_on_exceptions: Some(pause),
            ignore_caught_exceptions: Some(ignore_caught),
            should_pause_on_debugger_statement: Some(true),
        };
        actix::spawn(async move {
            if let Err(e) = configuration.update_configuration(&update).await {
                warn!("Updating the thread configuration failed: {e}");
            }
        });
    }

    // --- targets & threads ---

    fn should_attach_target(&self, form: &TargetForm) -> bool {
        if form.is_fallback_document {
            return false;
        }
        if let (Some(wanted), Some(actual)) =
            (self.config.debug.addon_id.as_deref(), form.addon_id.as_deref())
        {
            if wanted != actual {
                return false;
            }
        }
        if form.target_type == "frame" && form.addon_id.is_none() {
            let url = form.url.as_deref().unwrap_or("");
            if !self.tab_include.is_match(url) {
                return false;
            }
            if self.tab_exclude.is_match(url) {
                return false;
            }
        }
        true
    }

    fn handle_target_available(
        &mut self,
        form: TargetForm,
        descriptor_actor: Option<String>,
        ctx: &mut Context<Self>,
    ) {
        if self.thread_by_target.contains_key(&form.actor) {
            return;
        }
        if !self.should_attach_target(&form) {
            debug!("Ignoring target {} ({:?})", form.actor, form.url);
            return;
        }
        let Some(dispatch) = self.dispatch.clone() else {
            return;
        };

        let target = TargetProxy::new(form.actor.clone(), dispatch.clone());
        let thread = ThreadProxy::new(form.thread_actor.clone(), dispatch.clone());
        let console = ConsoleProxy::new(form.console_actor.clone(), dispatch.clone());
        let kind = thread_kind(&form);

        let id = self.threads.add(ThreadAdapter::new(
            0,
            String::new(),
            kind.to_string(),
            target,
            thread,
            console.clone(),
        ));
        let name = thread_name(&form, kind, id);
        if let Some(adapter) = self.threads.get_mut(id) {
            adapter.id = id;
            adapter.name = name.clone();
            adapter.descriptor_actor = descriptor_actor;
        }

        self.thread_by_target.insert(form.actor.clone(), id);
        self.thread_by_thread_actor
            .insert(form.thread_actor.clone(), id);
        self.thread_by_console
            .insert(form.console_actor.clone(), id);
        if self.active_thread.is_none() {
            self.active_thread = Some(id);
        }

        if kind == "tab" && std::mem::take(&mut self.console_clear_pending) {
            // The ANSI clear sequence is what editors interpret as
            // "clear the debug console".
            self.emit_output(OutputCategory::Console, "\u{1b}[2J");
        }

        info!("Thread {id} started: {name} ({})", form.actor);
        self.emit(DapEvent::Thread(ThreadEventBody {
            reason: "started".to_string(),
            thread_id: id as i64,
        }));
        self.emit(DapEvent::ThreadStarted(ThreadStartedEventBody {
            name,
            id: id as i64,
        }));

        if !self.modern {
            // Legacy targets do not stream console resources; subscribe
            // through the console actor instead.
            let fut = async move {
                if let Err(e) = console.start_listeners().await {
                    debug!("startListeners failed: {e}");
                }
            };
            ctx.spawn(fut.into_actor(self).map(|_, _, _| ()));
        }
    }

    fn handle_target_destroyed(&mut self, target_actor: &str) {
        let Some(&thread_id) = self.thread_by_target.get(target_actor) else {
            // Normal during teardown races; nothing to clean up.
            debug!("target-destroyed for unknown target {target_actor}; ignoring");
            return;
        };
        self.destroy_thread(thread_id);
    }

    pub(crate) fn destroy_thread(&mut self, thread_id: u32) {
        let Some(mut adapter) = self.threads.remove(thread_id) else {
            return;
        };
        adapter.state = PauseState::Exited;

        let (frame_ids, variable_refs) = adapter.take_pause_state();
        for id in frame_ids {
            self.frames.remove(id);
        }
        for id in variable_refs {
            self.variable_providers.remove(id);
        }
        // Thread-lifetime providers (console output objects) die here too.
        let stale: Vec<u32> = self
            .variable_providers
            .iter()
            .filter(|(_, provider)| provider.thread_id() == thread_id)
            .map(|(id, _)| id)
            .collect();
        for id in stale {
            self.variable_providers.remove(id);
        }

        self.sources.remove_sources(&adapter.sources);
        self.thread_by_target.remove(adapter.target.name());
        self.thread_by_thread_actor.remove(adapter.thread.name());
        self.thread_by_console.remove(adapter.console.name());
        adapter.target.mark_destroyed();
        adapter.target.unregister();
        adapter.thread.unregister();
        adapter.console.unregister();

        if self.active_thread == Some(thread_id) {
            self.active_thread = self.threads.ids().into_iter().min();
        }
        if adapter.kind == "tab" && self.config.debug.clear_console_on_reload {
            self.console_clear_pending = true;
        }

        info!("Thread {thread_id} exited ({})", adapter.name);
        self.emit(DapEvent::Thread(ThreadEventBody {
            reason: "exited".to_string(),
            thread_id: thread_id as i64,
        }));
        self.emit(DapEvent::ThreadExited(ThreadExitedEventBody {
            id: thread_id as i64,
        }));
    }

    // --- pause state machine ---

    fn handle_thread_state(
        &mut self,
        thread_id: u32,
        update: ThreadStateUpdate,
        ctx: &mut Context<Self>,
    ) {
        match update.state.as_str() {
            "paused" => {
                let why = update.why.unwrap_or_else(|| PauseReason {
                    kind: "interrupted".to_string(),
                    exception: None,
                    actors: Vec::new(),
                });
                self.handle_paused(thread_id, why, update.frame, ctx);
            },
            "resumed" => self.handle_resumed(thread_id),
            other => debug!("Unknown thread-state {other:?} for thread {thread_id}"),
        }
    }

    fn handle_paused(
        &mut self,
        thread_id: u32,
        why: PauseReason,
        frame: Option<FrameForm>,
        ctx: &mut Context<Self>,
    ) {
        let Some(adapter) = self.threads.get(thread_id) else {
            return;
        };
        if adapter.has_exited() {
            return;
        }

        // Look up what we know about the pausing source.
        let mut blackboxed = false;
        let mut is_debugger_eval = false;
        let mut path_key = None;
        let mut stop_line = None;
        let mut stop_column = None;
        if let Some(frame) = &frame {
            stop_line = frame.location.line;
            stop_column = frame.location.column;
            if let Some(source_actor) = &frame.location.actor {
                if let Some(source) = self.sources.get_by_actor(source_actor) {
                    blackboxed =
                        source.blackboxed || self.skip.decide(source).unwrap_or(false);
                    is_debugger_eval = source.is_debugger_eval();
                    path_key = source.path.clone().or_else(|| source.url.clone());
                }
            }
        }

        let hit_verdict = match (&path_key, stop_line) {
            (Some(path), Some(line)) if why.kind == "breakpoint" => {
                self.breakpoints.register_hit(path, line, stop_column)
            },
            _ => HitVerdict::Surface,
        };

        match evaluate_stop_gates(&why, blackboxed, hit_verdict, is_debugger_eval) {
            StopDisposition::AutoResume => {
                debug!("Suppressing stop on thread {thread_id} ({})", why.kind);
                self.auto_resume(thread_id, ctx);
            },
            StopDisposition::Surface { reason, text } => {
                if let Some(adapter) = self.threads.get_mut(thread_id) {
                    adapter.state = PauseState::Paused {
                        reason: reason.clone(),
                    };
                    adapter.paused_why = Some(why);
                }
                // Editors ask for the stack right after `stopped`; have it
                // ready.
                self.spawn_frame_fetch(thread_id, ctx);
                self.emit(DapEvent::Stopped(StoppedEventBody {
                    reason,
                    thread_id: thread_id as i64,
                    text,
                    all_threads_stopped: false,
                }));
            },
        }
    }

    fn auto_resume(&mut self, thread_id: u32, ctx: &mut Context<Self>) {
        let Some(adapter) = self.threads.get(thread_id) else {
            return;
        };
        let thread = adapter.thread.clone();
        let fut = async move {
            match thread.resume().await {
                Ok(()) => {},
                Err(e) if e.is_benign_state_race() => {},
                Err(e) => warn!("Auto-resume failed: {e}"),
            }
        };
        ctx.spawn(fut.into_actor(self).map(|_, _, _| ()));
    }

    fn handle_resumed(&mut self, thread_id: u32) {
        let Some(adapter) = self.threads.get_mut(thread_id) else {
            return;
        };
        if !adapter.is_paused() {
            // The resume after a suppressed stop; the editor never saw it.
            return;
        }
        adapter.state = PauseState::Running;

        // Dispose everything pause-scoped before `continued` goes out, so a
        // stale variables reference can never resolve after the event.
        let (frame_ids, variable_refs) = adapter.take_pause_state();
        for id in frame_ids {
            self.frames.remove(id);
        }
        for id in variable_refs {
            self.variable_providers.remove(id);
        }

        self.emit(DapEvent::Continued(ContinuedEventBody {
            thread_id: thread_id as i64,
        }));
    }

    // --- frames ---

    /// Build the off-actor future that fetches and source-maps the stack.
    pub(crate) fn frame_fetch_future(
        &self,
        thread_id: u32,
    ) -> Option<impl Future<Output = Result<Vec<PreparedFrame>, iris_rdp::RdpError>> + use<>>
    {
        let adapter = self.threads.get(thread_id)?;
        let thread = adapter.thread.clone();
        let sourcemaps = self.sourcemaps.clone();

        // Snapshot of what the spawned future needs to know about this
        // thread's sources.
        let mut snapshot: HashMap<String, SourceSnapshot> = HashMap::new();
        for &source_id in &adapter.sources {
            if let Some(source) = self.sources.get(source_id) {
                snapshot.insert(
                    source.actor.clone(),
                    SourceSnapshot {
                        url: source.url.clone(),
                        generated_url: source.generated_url.clone(),
                        source_map_url: source.source_map_url.clone(),
                    },
                );
            }
        }

        Some(async move {
            let forms = thread.frames(0, 1000).await?;
            let mut prepared = Vec::with_capacity(forms.len());
            for form in forms {
                let mut source_url = None;
                let mut line = form.location.line.unwrap_or(1);
                let mut column = form.location.column.unwrap_or(0);

                if let Some(actor) = &form.location.actor {
                    if let Some(snap) = snapshot.get(actor) {
                        source_url = snap.url.clone();
                        if let Some(map_url) = &snap.source_map_url {
                            let generated =
                                snap.generated_url.as_deref().or(snap.url.as_deref());
                            if let Some(generated) = generated {
                                if let Some(original) = sourcemaps
                                    .find_original_location(generated, map_url, line, column)
                                    .await
                                {
                                    source_url = Some(original.url);
                                    line = original.line;
                                    column = original.column;
                                }
                            }
                        }
                    }
                }
                prepared.push(PreparedFrame {
                    form,
                    source_url,
                    line,
                    column,
                });
            }
            Ok(prepared)
        })
    }

    fn spawn_frame_fetch(&mut self, thread_id: u32, ctx: &mut Context<Self>) {
        let Some(fut) = self.frame_fetch_future(thread_id) else {
            return;
        };
        let addr = ctx.address();
        let fut = async move {
            match fut.await {
                Ok(frames) => addr.do_send(Internal::FramesInstalled { thread_id, frames }),
                Err(e) if e.is_benign_state_race() => {},
                Err(e) => debug!("Frame prefetch for thread {thread_id} failed: {e}"),
            }
        };
        ctx.spawn(fut.into_actor(self).map(|_, _, _| ()));
    }

    /// Register prepared frames for a paused thread, replacing any earlier
    /// registration for the same pause.
    pub(crate) fn install_frames(&mut self, thread_id: u32, frames: Vec<PreparedFrame>) {
        let Some(adapter) = self.threads.get_mut(thread_id) else {
            return;
        };
        if !adapter.is_paused() {
            // Stale: the thread resumed while the fetch was in flight.
            return;
        }
        for id in std::mem::take(&mut adapter.frame_ids) {
            self.frames.remove(id);
        }

        let mut ids = Vec::with_capacity(frames.len());
        for prepared in frames {
            let source_path = prepared
                .source_url
                .as_deref()
                .and_then(|url| self.sources.resolve_path(url));
            let id = self.frames.add(FrameEntry {
                thread_id,
                form: prepared.form,
                source_path,
                source_url: prepared.source_url,
                line: prepared.line,
                column: prepared.column,
            });
            ids.push(id);
        }
        if let Some(adapter) = self.threads.get_mut(thread_id) {
            adapter.frame_ids = ids;
        }
    }

    // --- sources ---

    fn handle_new_source(&mut self, thread_id: u32, form: SourceForm, ctx: &mut Context<Self>) {
        let Some(dispatch) = self.dispatch.clone() else {
            return;
        };
        let proxy = SourceProxy::new(form.actor.clone(), dispatch);
        let source_id = self.sources.add_source(&form, proxy);
        if let Some(adapter) = self.threads.get_mut(thread_id) {
            if !adapter.sources.contains(&source_id) {
                adapter.sources.push(source_id);
            }
        }

        self.reconcile_blackbox(source_id, ctx);
        self.announce_source(thread_id, source_id);
        self.install_pending_breakpoints(source_id, ctx);
        self.resolve_source_map(source_id, ctx);
    }

    /// Flip the engine-side blackbox flag when it disagrees with the skip
    /// rules.
    fn reconcile_blackbox(&mut self, source_id: u32, ctx: &mut Context<Self>) {
        let Some(source) = self.sources.get(source_id) else {
            return;
        };
        let Some(wanted) = self.skip.decide(source) else {
            return;
        };
        if wanted == source.blackboxed {
            return;
        }
        let proxy = source.proxy.clone();
        if let Some(source) = self.sources.get_mut(source_id) {
            source.blackboxed = wanted;
        }
        let fut = async move {
            if let Err(e) = proxy.set_blackbox(wanted).await {
                warn!("Propagating blackbox flag failed: {e}");
            }
        };
        ctx.spawn(fut.into_actor(self).map(|_, _, _| ()));
    }

    fn announce_source(&mut self, thread_id: u32, source_id: u32) {
        let Some(source) = self.sources.get(source_id) else {
            return;
        };
        let Some(url) = source.url.clone().or_else(|| source.generated_url.clone()) else {
            // Eval sources without a URL stay internal.
            return;
        };
        self.emit(DapEvent::NewSource(iris_dap::NewSourceEventBody {
            thread_id: thread_id as i64,
            source_id: source_id as i64,
            url,
            path: source.path.clone(),
        }));
    }

    /// Install breakpoints that were set before this source existed.
    fn install_pending_breakpoints(&mut self, source_id: u32, ctx: &mut Context<Self>) {
        let Some(source) = self.sources.get(source_id) else {
            return;
        };
        let Some(path) = source.path.clone() else {
            return;
        };
        let Some(url) = source.url.clone().or_else(|| source.generated_url.clone()) else {
            return;
        };
        let Some(breakpoint_list) = self.breakpoint_list.clone() else {
            return;
        };
        let pending = self.breakpoints.unverified_for(&path);
        if pending.is_empty() {
            return;
        }

        let addr = ctx.address();
        let fut = async move {
            for bp in pending {
                let location = BreakpointLocation {
                    source_url: url.clone(),
                    line: bp.desired.line,
                    column: bp.desired.column,
                };
                let options = BreakpointOptions {
                    condition: bp.desired.condition.clone(),
                    log_value: bp.desired.log_message.clone(),
                };
                match breakpoint_list.set_breakpoint(&location, &options).await {
                    Ok(()) => addr.do_send(Internal::BreakpointVerified {
                        path: path.clone(),
                        id: bp.id,
                        line: bp.desired.line,
                        column: bp.desired.column,
                    }),
                    Err(e) => warn!("Late breakpoint install failed: {e}"),
                }
            }
        };
        ctx.spawn(fut.into_actor(self).map(|_, _, _| ()));
    }

    fn resolve_source_map(&mut self, source_id: u32, ctx: &mut Context<Self>) {
        let Some(source) = self.sources.get(source_id) else {
            return;
        };
        let (Some(map_url), Some(generated)) = (
            source.source_map_url.clone(),
            source
                .generated_url
                .clone()
                .or_else(|| source.url.clone()),
        ) else {
            return;
        };
        let sourcemaps = self.sourcemaps.clone();
        let addr = ctx.address();
        let fut = async move {
            for original_url in sourcemaps.original_urls(&generated, &map_url).await {
                addr.do_send(Internal::SourceMapped {
                    source_id,
                    original_url,
                });
            }
        };
        ctx.spawn(fut.into_actor(self).map(|_, _, _| ()));
    }

    // --- console output ---

    fn console_category(level: Option<&str>) -> OutputCategory {
        match level {
            Some("error") | Some("exception") | Some("assert") => OutputCategory::Stderr,
            Some("warn") | Some("warning") => OutputCategory::Console,
            _ => OutputCategory::Stdout,
        }
    }

    fn handle_console_message(&mut self, thread_id: u32, resource: ConsoleMessageResource) {
        match resource.message_type.as_deref() {
            // The timer start is bookkeeping, not output.
            Some("time") => return,
            Some("timeEnd") => {
                if let Some(timer) = &resource.timer {
                    let duration = timer.duration.unwrap_or(0.0);
                    self.emit_output(
                        OutputCategory::Stdout,
                        format!("{}: {}ms - timer ended", timer.name, duration),
                    );
                }
                return;
            },
            Some("clear") => {
                self.emit_output(OutputCategory::Console, "Console was cleared.");
                return;
            },
            _ => {},
        }

        let category = Self::console_category(resource.level.as_deref());
        let rendered: Vec<String> = resource
            .arguments
            .iter()
            .map(crate::variables::render_grip)
            .collect();
        let mut output = rendered.join(" ");
        output.push('\n');

        // A single expandable argument stays inspectable.
        let variables_reference = match resource.arguments.as_slice() {
            [grip] if crate::variables::grip_is_expandable(grip) => {
                Some(self.register_provider_for_thread(thread_id, grip, false))
            },
            _ => None,
        };

        let (source, line, column) = if self.config.debug.show_console_call_location {
            let path = resource
                .filename
                .as_deref()
                .and_then(|url| self.sources.resolve_path(url));
            let source = resource.filename.as_ref().map(|url| iris_dap::Source {
                name: Some(url.clone()),
                path,
                source_reference: None,
            });
            (
                source,
                resource.line_number.map(i64::from),
                resource.column_number.map(i64::from),
            )
        } else {
            (None, None, None)
        };

        self.emit(DapEvent::Output(OutputEventBody {
            output,
            category,
            source,
            line,
            column,
            variables_reference,
        }));
    }

    fn handle_error_message(&mut self, resource: ErrorMessageResource) {
        let source = resource.source_name.as_ref().map(|url| iris_dap::Source {
            name: Some(url.clone()),
            path: self.sources.resolve_path(url),
            source_reference: None,
        });
        self.emit(DapEvent::Output(OutputEventBody {
            output: format!("{}\n", resource.error_message),
            category: OutputCategory::Stderr,
            source,
            line: resource.line_number.map(i64::from),
            column: resource.column_number.map(i64::from),
            variables_reference: None,
        }));
    }

    /// Register a variables provider for a grip. Pause-scoped providers are
    /// disposed on resume; thread-scoped ones on thread exit.
    pub(crate) fn register_provider_for_thread(
        &mut self,
        thread_id: u32,
        grip: &Value,
        pause_lifetime: bool,
    ) -> i64 {
        let provider = match grip.get("type").and_then(Value::as_str) {
            Some("longString") => VariablesProvider::LongString {
                thread_id,
                grip: grip.clone(),
            },
            _ => VariablesProvider::Object {
                thread_id,
                actor: grip
                    .get("actor")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            },
        };
        let id = self.variable_providers.add(provider);
        if pause_lifetime {
            if let Some(adapter) = self.threads.get_mut(thread_id) {
                adapter.pause_variable_refs.push(id);
            }
        }
        id as i64
    }

    // --- termination ---

    pub(crate) fn fail_session(&mut self, message: &str) {
        error!("{message}");
        self.emit_output(OutputCategory::Stderr, message);
        self.cleanup_registries();
        self.emit(DapEvent::Terminated);
        self.state = SessionState::Terminated;
    }

    fn cleanup_registries(&mut self) {
        for id in self.threads.ids() {
            if let Some(adapter) = self.threads.remove(id) {
                adapter.target.unregister();
                adapter.thread.unregister();
                adapter.console.unregister();
            }
        }
        self.thread_by_target.clear();
        self.thread_by_thread_actor.clear();
        self.thread_by_console.clear();
        self.frames.clear();
        self.variable_providers.clear();
        self.sources.clear();
        self.descriptors.clear();
        self.watchers.clear();
        self.watcher_descriptors.clear();
        self.breakpoints.clear();
        self.active_thread = None;
    }

    pub(crate) fn begin_termination(&mut self, socket_alive: bool, ctx: &mut Context<Self>) {
        if matches!(
            self.state,
            SessionState::Terminating | SessionState::Terminated
        ) {
            return;
        }
        info!("Session terminating (socket alive: {socket_alive}).");
        self.state = SessionState::Terminating;

        let should_terminate =
            self.config.firefox.terminate && !self.config.firefox.re_attach;
        let terminate_timeout = self.config.firefox.terminate_timeout;
        let cleanup_grace = self.config.firefox.cleanup_grace;
        let terminator_path = self.config.firefox.terminator_addon_path.clone();
        let launched = self.launched.take();
        let connection = self.connection.take();
        let addons = self.addons.clone();
        let addr = ctx.address();

        let fut = async move {
            let (child, profile) = match launched {
                Some(launched) => (launched.child, launched.profile),
                None => (None, None),
            };

            if should_terminate {
                match child {
                    Some(mut child) => {
                        launch::terminate_child(&mut child, terminate_timeout).await;
                    },
                    None => {
                        // We did not start this browser; ask it to quit from
                        // the inside.
                        if let (true, Some(addons), Some(path)) =
                            (socket_alive, addons, terminator_path)
                        {
                            if let Err(e) = addons
                                .install_temporary_addon(&path.to_string_lossy())
                                .await
                            {
                                warn!("Installing the terminator addon failed: {e}");
                            }
                            tokio::time::sleep(terminate_timeout).await;
                        }
                    },
                }
            }

            if let Some(connection) = connection {
                connection.do_send(CloseConnection);
            }
            if let Some(profile) = profile {
                launch::cleanup_profile(profile, cleanup_grace).await;
            }
            addr.do_send(Internal::TerminationDone);
        };
        ctx.spawn(fut.into_actor(self).map(|_, _, _| ()));
    }
}

struct SourceSnapshot {
    url: Option<String>,
    generated_url: Option<String>,
    source_map_url: Option<String>,
}

fn thread_kind(form: &TargetForm) -> &'static str {
    match form.target_type.as_str() {
        "worker" => "worker",
        "content_script" => "content-script",
        "frame" if form.addon_id.is_some() => "background-script",
        _ => "tab",
    }
}

fn thread_name(form: &TargetForm, kind: &str, id: u32) -> String {
    form.title
        .clone()
        .filter(|title| !title.is_empty())
        .or_else(|| form.url.clone().filter(|url| !url.is_empty()))
        .unwrap_or_else(|| format!("{kind} {id}"))
}

/// Resolve how to reach the debugger server: attach to a live socket, or
/// launch the browser and wait for its server to come up.
async fn prepare_connection(
    config: &SessionConfig,
) -> Result<Option<LaunchedFirefox>, SessionError> {
    let host = config.connection.host.clone();
    let port = config.connection.port;

    match config.firefox.request {
        RequestKind::Attach => {
            launch::wait_for_socket(&host, port, config.connection.connect_timeout)
                .await
                .map_err(|e| SessionError::Connect(e.to_string()))?;
            Ok(None)
        },
        RequestKind::Launch => {
            // With reAttach the previous session's browser may still be
            // running; reuse it rather than spawning a second one.
            if config.firefox.re_attach
                && launch::wait_for_socket(&host, port, std::time::Duration::from_millis(200))
                    .await
                    .is_ok()
            {
                info!("Reusing a running debugger server on port {port}.");
                return Ok(None);
            }
            let launched = launch::launch_firefox(&config.firefox, port)?;
            launch::wait_for_socket(&host, port, config.firefox.launch_wait_timeout).await?;
            Ok(Some(launched))
        },
    }
}

/// Modern discovery: the parent-process descriptor and its watcher cover
/// every target.
async fn discover_parent_process(
    root: RootProxy,
    dispatch: Option<Addr<DispatchActor>>,
) -> Result<Discovery, SessionError> {
    let dispatch =
        dispatch.ok_or_else(|| SessionError::InvalidRequest("no protocol stack".into()))?;
    let process = root.get_process_descriptor().await?;
    let descriptor = DescriptorProxy::new(process.actor, dispatch);
    attach_descriptor(descriptor, false).await
}

/// Watch a descriptor: targets first, then the session-wide actors, then
/// resources. Resources must come last so the parent process has the
/// targets registered before any early events are replayed.
async fn attach_descriptor(
    descriptor: DescriptorProxy,
    reload: bool,
) -> Result<Discovery, SessionError> {
    let (watcher, traits) = descriptor.get_watcher().await?;
    watcher.watch_targets(TargetKind::Frame).await?;
    if traits.worker {
        watcher.watch_targets(TargetKind::Worker).await?;
    }
    if traits.content_script {
        watcher.watch_targets(TargetKind::ContentScript).await?;
    }
    let thread_configuration = watcher.get_thread_configuration().await?;
    let breakpoint_list = watcher.get_breakpoint_list().await?;
    watcher.watch_resources(WATCHED_RESOURCES).await?;

    if reload {
        if let Err(e) = descriptor.reload().await {
            warn!("Reloading tab {} failed: {e}", descriptor.name());
        }
    }

    Ok(Discovery {
        descriptor,
        watcher,
        thread_configuration,
        breakpoint_list,
    })
}

// --- Actor implementation ---

impl Actor for SessionActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("Debug session starting.");
        if let Some(dispatch) = self.dispatch.clone() {
            // Externally-provided dispatcher (tests): just wait for the
            // greeting.
            self.root = Some(RootProxy::new(dispatch));
            return;
        }
        self.begin_connect(ctx);
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        info!("Debug session stopping.");
        Running::Stop
    }
}

impl Handler<Internal> for SessionActor {
    type Result = ();

    fn handle(&mut self, msg: Internal, ctx: &mut Context<Self>) {
        match msg {
            Internal::ConnectionPrepared(Ok(launched)) => {
                self.launched = launched;
                self.setup_protocol(ctx);
            },
            Internal::ConnectionPrepared(Err(e)) => {
                self.fail_session(&format!("Could not start the debug session: {e}"));
            },
            Internal::RootFetched(form) => {
                if let Some(dispatch) = self.dispatch.clone() {
                    self.preference = form
                        .preference_actor
                        .map(|name| PreferenceProxy::new(name, dispatch.clone()));
                    self.addons = form
                        .addons_actor
                        .map(|name| AddonsProxy::new(name, dispatch.clone()));
                }
                self.setup_preferences(ctx);
                self.install_debuggee_addon(ctx);
            },
            Internal::DiscoveryDone(Ok(discovery)) => self.finish_discovery(discovery),
            Internal::DiscoveryDone(Err(e)) => {
                // A failed target attach is not fatal; the session keeps
                // serving whatever it already discovered.
                warn!("Discovery failed: {e}");
                if self.state == SessionState::Discovering && self.descriptors.is_empty() {
                    self.fail_session(&format!("Could not attach to the browser: {e}"));
                }
            },
            Internal::TabsListed(tabs) => {
                for tab in tabs {
                    self.attach_tab(tab, ctx);
                }
            },
            Internal::FramesInstalled { thread_id, frames } => {
                self.install_frames(thread_id, frames);
            },
            Internal::SourceMapped {
                source_id,
                original_url,
            } => {
                let path = self.sources.resolve_path(&original_url);
                self.sources
                    .apply_original(source_id, &original_url, path.clone());
                if path.is_some() {
                    self.install_pending_breakpoints(source_id, ctx);
                }
            },
            Internal::BreakpointVerified {
                path,
                id,
                line,
                column,
            } => {
                self.breakpoints.mark_verified(&path, id, line, column);
                self.emit(DapEvent::Breakpoint(BreakpointEventBody {
                    reason: "changed".to_string(),
                    breakpoint: iris_dap::Breakpoint {
                        id: Some(id),
                        verified: true,
                        message: None,
                        source: Some(iris_dap::Source {
                            name: None,
                            path: Some(path),
                            source_reference: None,
                        }),
                        line: Some(line as i64),
                        column: column.map(|c| c as i64),
                    },
                }));
            },
            Internal::Emit(event) => self.emit(event),
            Internal::TerminationDone => {
                self.cleanup_registries();
                self.emit(DapEvent::Terminated);
                self.state = SessionState::Terminated;
                info!("Session terminated.");
            },
        }
    }
}

impl SessionActor {
    fn setup_preferences(&mut self, ctx: &mut Context<Self>) {
        let Some(preference) = self.preference.clone() else {
            return;
        };
        // The launch path covers these through the profile; an attached
        // browser may still have the connection prompt enabled.
        let fut = async move {
            match preference.get_bool("devtools.debugger.prompt-connection").await {
                Ok(true) => {
                    if let Err(e) = preference
                        .set_bool("devtools.debugger.prompt-connection", false)
                        .await
                    {
                        debug!("Disabling the connection prompt failed: {e}");
                    }
                },
                Ok(false) => {},
                Err(e) => debug!("Reading preferences failed: {e}"),
            }
        };
        ctx.spawn(fut.into_actor(self).map(|_, _, _| ()));
    }

    fn install_debuggee_addon(&mut self, ctx: &mut Context<Self>) {
        let (Some(addons), Some(path)) =
            (self.addons.clone(), self.config.debug.addon_path.clone())
        else {
            return;
        };
        let addr = ctx.address();
        let fut = async move {
            match addons.install_temporary_addon(&path.to_string_lossy()).await {
                Ok(installed) => info!("Installed addon {}", installed.id),
                Err(e) => {
                    addr.do_send(Internal::Emit(DapEvent::Output(OutputEventBody::plain(
                        format!("Installing the addon failed: {e}\n"),
                        OutputCategory::Stderr,
                    ))));
                },
            }
        };
        ctx.spawn(fut.into_actor(self).map(|_, _, _| ()));
    }
}

impl Handler<LinkStateChanged> for SessionActor {
    type Result = ();

    fn handle(&mut self, msg: LinkStateChanged, ctx: &mut Context<Self>) {
        // The dispatcher fails pending requests on a closed link.
        if let Some(dispatch) = &self.dispatch {
            dispatch.do_send(msg.clone());
        }
        match msg.0 {
            ConnectionState::Ready => {
                debug!("Connection established; expecting the root greeting.");
            },
            ConnectionState::Closed(reason) => {
                if self.state != SessionState::Terminated {
                    if let Some(e) = reason {
                        warn!("Connection lost: {e}");
                    }
                    // Remote socket close unconditionally ends the session.
                    self.begin_termination(false, ctx);
                }
            },
            ConnectionState::Opening => {},
        }
    }
}

impl Handler<RdpEvent> for SessionActor {
    type Result = ();

    fn handle(&mut self, event: RdpEvent, ctx: &mut Context<Self>) {
        match event.event.as_str() {
            "init" => match RootInit::from_body(&event.body) {
                Ok(init) => self.handle_root_init(init, ctx),
                Err(e) => self.fail_session(&format!("Malformed root greeting: {e}")),
            },
            "tabOpened" => {
                if !self.modern {
                    match serde_json::from_value::<TabOpenedBody>(Value::Object(
                        event.body.clone(),
                    )) {
                        Ok(body) => self.attach_tab(body.tab, ctx),
                        Err(e) => warn!("Malformed tabOpened event: {e}"),
                    }
                }
            },
            "tabListChanged" => {
                if !self.modern {
                    if let Some(root) = self.root.clone() {
                        let addr = ctx.address();
                        let fut = async move {
                            match root.list_tabs().await {
                                Ok(tabs) => addr.do_send(Internal::TabsListed(tabs)),
                                Err(e) => warn!("listTabs failed: {e}"),
                            }
                        };
                        ctx.spawn(fut.into_actor(self).map(|_, _, _| ()));
                    }
                }
            },
            "target-available" => match watcher::parse_target_available(&event.body) {
                Ok(form) => {
                    let descriptor = self.watcher_descriptors.get(&event.actor).cloned();
                    self.handle_target_available(form, descriptor, ctx);
                },
                Err(e) => warn!("Malformed target-available event: {e}"),
            },
            "target-destroyed" => match watcher::parse_target_destroyed(&event.body) {
                Ok(actor) => self.handle_target_destroyed(&actor),
                Err(e) => warn!("Malformed target-destroyed event: {e}"),
            },
            "descriptor-destroyed" => {
                if let Some(descriptor) = self.descriptors.remove(&event.actor) {
                    descriptor.unregister();
                }
                // A dead descriptor takes its threads with it; the engine
                // does not always send separate target-destroyed events.
                let orphaned: Vec<u32> = self
                    .threads
                    .iter()
                    .filter(|(_, t)| t.descriptor_actor.as_deref() == Some(&event.actor))
                    .map(|(id, _)| id)
                    .collect();
                for thread_id in orphaned {
                    self.destroy_thread(thread_id);
                }
            },
            "thread-state" => {
                let Some(&thread_id) = self.thread_by_target.get(&event.actor) else {
                    debug!("thread-state for unknown target {}", event.actor);
                    return;
                };
                match ThreadStateUpdate::from_body(&event.body) {
                    Ok(update) => self.handle_thread_state(thread_id, update, ctx),
                    Err(e) => warn!("Malformed thread-state event: {e}"),
                }
            },
            // Legacy pause notifications come straight from the thread actor.
            "paused" | "resumed" => {
                let Some(&thread_id) = self.thread_by_thread_actor.get(&event.actor) else {
                    return;
                };
                let update = ThreadStateUpdate::from_legacy(&event.event, &event.body);
                self.handle_thread_state(thread_id, update, ctx);
            },
            "source" => {
                let Some(&thread_id) = self.thread_by_target.get(&event.actor) else {
                    return;
                };
                match SourceForm::from_body(&event.body) {
                    Ok(form) => self.handle_new_source(thread_id, form, ctx),
                    Err(e) => warn!("Malformed source event: {e}"),
                }
            },
            "newSource" => {
                let Some(&thread_id) = self.thread_by_thread_actor.get(&event.actor) else {
                    return;
                };
                match SourceForm::from_body(&event.body) {
                    Ok(form) => self.handle_new_source(thread_id, form, ctx),
                    Err(e) => warn!("Malformed newSource event: {e}"),
                }
            },
            "console-message" => {
                let Some(&thread_id) = self.thread_by_target.get(&event.actor) else {
                    return;
                };
                match ConsoleMessageResource::from_body(&event.body) {
                    Ok(resource) => self.handle_console_message(thread_id, resource),
                    Err(e) => warn!("Malformed console-message event: {e}"),
                }
            },
            "consoleAPICall" => {
                let Some(&thread_id) = self.thread_by_console.get(&event.actor) else {
                    return;
                };
                let message = event.body.get("message").cloned().unwrap_or(Value::Null);
                match serde_json::from_value::<ConsoleMessageResource>(message) {
                    Ok(resource) => self.handle_console_message(thread_id, resource),
                    Err(e) => warn!("Malformed consoleAPICall event: {e}"),
                }
            },
            "error-message" | "pageError" => {
                match ErrorMessageResource::from_body_or_page_error(&event.body) {
                    Ok(resource) => self.handle_error_message(resource),
                    Err(e) => warn!("Malformed error event: {e}"),
                }
            },
            other => debug!("Unhandled event {other} from {}", event.actor),
        }
    }
}

#[derive(serde::Deserialize)]
struct TabOpenedBody {
    tab: TabDescriptorForm,
}

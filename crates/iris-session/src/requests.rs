//! The DAP request surface: typed actor messages and their handlers.
//!
//! Handlers that need the wire run as actor futures built from cloned
//! proxies; everything that touches session state happens back on the
//! actor.

use actix::prelude::*;
use iris_dap::{
    Breakpoint, ContinueResponseBody, DataBreakpoint, EvaluateResponseBody,
    InstructionBreakpoint, Scope, ScopesResponseBody, SetBreakpointsArguments,
    SetBreakpointsResponseBody, SourceResponseBody, StackFrame, StackTraceResponseBody,
    Thread, ThreadsResponseBody, Variable, VariablesResponseBody,
};
use iris_rdp::actors::{
    BreakpointLocation, BreakpointOptions, LongStringProxy, ObjectGripProxy, StepKind,
    grip_actor,
};
use log::warn;
use serde_json::Value;

use crate::breakpoints::{DesiredBreakpoint, RealizedBreakpoint, parse_hit_condition};
use crate::error::SessionError;
use crate::session::SessionActor;
use crate::variables::{
    VariablesProvider, grip_is_expandable, property_bindings, render_grip, scope_bindings,
    variable_from_grip,
};

// --- Messages ---

#[derive(Message, Debug)]
#[rtype(result = "Result<ThreadsResponseBody, SessionError>")]
pub struct Threads;

#[derive(Message, Debug)]
#[rtype(result = "Result<StackTraceResponseBody, SessionError>")]
pub struct StackTrace {
    pub thread_id: i64,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<ScopesResponseBody, SessionError>")]
pub struct Scopes {
    pub frame_id: i64,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<VariablesResponseBody, SessionError>")]
pub struct Variables {
    pub variables_reference: i64,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<ContinueResponseBody, SessionError>")]
pub struct Continue {
    pub thread_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepDirection {
    /// `next` (step over).
    Next,
    /// `stepIn`.
    In,
    /// `stepOut`.
    Out,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<(), SessionError>")]
pub struct Step {
    pub thread_id: i64,
    pub direction: StepDirection,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<(), SessionError>")]
pub struct Pause {
    pub thread_id: i64,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<EvaluateResponseBody, SessionError>")]
pub struct Evaluate {
    pub expression: String,
    pub frame_id: Option<i64>,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<SetBreakpointsResponseBody, SessionError>")]
pub struct SetBreakpoints {
    pub args: SetBreakpointsArguments,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<(), SessionError>")]
pub struct SetExceptionBreakpoints {
    pub filters: Vec<String>,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<SetBreakpointsResponseBody, SessionError>")]
pub struct SetDataBreakpoints {
    pub breakpoints: Vec<DataBreakpoint>,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<SetBreakpointsResponseBody, SessionError>")]
pub struct SetInstructionBreakpoints {
    pub breakpoints: Vec<InstructionBreakpoint>,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<SourceResponseBody, SessionError>")]
pub struct SourceContent {
    pub source_reference: Option<i64>,
    pub url: Option<String>,
}

#[derive(Message, Debug)]
#[rtype(result = "Result<(), SessionError>")]
pub struct DisconnectSession {
    /// Editor override for the configured terminate behavior.
    pub terminate: Option<bool>,
}

// --- Helpers ---

fn file_name_of(url: &str) -> String {
    url.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or(url)
        .to_string()
}

impl SessionActor {
    pub(crate) fn active_live_thread(&self) -> Option<u32> {
        self.active_thread
            .filter(|&id| self.threads.contains(id))
            .or_else(|| self.threads.ids().into_iter().min())
    }

    fn build_stack_trace(&self, thread_id: u32) -> Result<StackTraceResponseBody, SessionError> {
        let adapter = self
            .threads
            .get(thread_id)
            .ok_or(SessionError::UnknownThread(thread_id as i64))?;

        let mut stack_frames = Vec::with_capacity(adapter.frame_ids.len());
        for &frame_id in &adapter.frame_ids {
            let Some(entry) = self.frames.get(frame_id) else {
                continue;
            };
            let name = entry
                .form
                .display_name
                .clone()
                .filter(|name| !name.is_empty())
                .or_else(|| entry.form.frame_type.clone())
                .unwrap_or_else(|| "(anonymous)".to_string());
            // URL-only sources stay reachable through a source reference.
            let source_reference = match (&entry.source_path, &entry.source_url) {
                (None, Some(url)) => self.sources.get_by_url(url).map(|s| s.id as i64),
                _ => None,
            };
            let source = entry.source_url.as_ref().map(|url| iris_dap::Source {
                name: Some(file_name_of(url)),
                path: entry.source_path.clone(),
                source_reference,
            });
            stack_frames.push(StackFrame {
                id: frame_id as i64,
                name,
                source,
                line: entry.line as i64,
                column: entry.column as i64,
                presentation_hint: None,
            });
        }
        let total = stack_frames.len() as i64;
        Ok(StackTraceResponseBody {
            stack_frames,
            total_frames: Some(total),
        })
    }

    fn bind_variables(
        &mut self,
        thread_id: u32,
        bindings: &[(String, Value)],
        pause_lifetime: bool,
    ) -> Vec<Variable> {
        let mut variables = Vec::with_capacity(bindings.len());
        for (name, grip) in bindings {
            let mut register =
                |grip: &Value| self.register_provider_for_thread(thread_id, grip, pause_lifetime);
            variables.push(variable_from_grip(name, grip, &mut register));
        }
        variables
    }
}

// --- Handlers ---

impl Handler<Threads> for SessionActor {
    type Result = Result<ThreadsResponseBody, SessionError>;

    fn handle(&mut self, _msg: Threads, _ctx: &mut Context<Self>) -> Self::Result {
        let mut threads: Vec<Thread> = self
            .threads
            .iter()
            .map(|(id, adapter)| Thread {
                id: id as i64,
                name: adapter.name.clone(),
            })
            .collect();
        threads.sort_by_key(|t| t.id);
        Ok(ThreadsResponseBody { threads })
    }
}

impl Handler<StackTrace> for SessionActor {
    type Result = ResponseActFuture<Self, Result<StackTraceResponseBody, SessionError>>;

    fn handle(&mut self, msg: StackTrace, _ctx: &mut Context<Self>) -> Self::Result {
        let thread_id = msg.thread_id as u32;
        let (paused, cached) = match self.threads.get(thread_id) {
            Some(adapter) => (adapter.is_paused(), !adapter.frame_ids.is_empty()),
            None => {
                return Box::pin(actix::fut::ready(Err(SessionError::UnknownThread(
                    msg.thread_id,
                ))));
            },
        };
        self.active_thread = Some(thread_id);

        if !paused {
            return Box::pin(actix::fut::ready(Err(SessionError::InvalidRequest(
                "thread is not paused".to_string(),
            ))));
        }
        if cached {
            return Box::pin(actix::fut::ready(self.build_stack_trace(thread_id)));
        }

        // The prefetch has not landed yet; fetch inline.
        let Some(fut) = self.frame_fetch_future(thread_id) else {
            return Box::pin(actix::fut::ready(Err(SessionError::UnknownThread(
                msg.thread_id,
            ))));
        };
        Box::pin(fut.into_actor(self).map(move |result, actor, _ctx| {
            match result {
                Ok(frames) => {
                    actor.install_frames(thread_id, frames);
                    actor.build_stack_trace(thread_id)
                },
                Err(e) => Err(SessionError::Rdp(e)),
            }
        }))
    }
}

impl Handler<Scopes> for SessionActor {
    type Result = Result<ScopesResponseBody, SessionError>;

    fn handle(&mut self, msg: Scopes, _ctx: &mut Context<Self>) -> Self::Result {
        let frame_id = msg.frame_id as u32;
        let (thread_id, environment) = match self.frames.get(frame_id) {
            Some(entry) => (entry.thread_id, entry.form.environment.clone()),
            None => return Err(SessionError::UnknownFrame(msg.frame_id)),
        };
        self.active_thread = Some(thread_id);

        let Some(environment) = environment else {
            return Ok(ScopesResponseBody { scopes: Vec::new() });
        };
        let provider_id = self.variable_providers.add(VariablesProvider::FrameScope {
            thread_id,
            environment,
        });
        if let Some(adapter) = self.threads.get_mut(thread_id) {
            adapter.pause_variable_refs.push(provider_id);
        }
        Ok(ScopesResponseBody {
            scopes: vec![Scope {
                name: "Local".to_string(),
                presentation_hint: Some("locals".to_string()),
                variables_reference: provider_id as i64,
                expensive: false,
            }],
        })
    }
}

impl Handler<Variables> for SessionActor {
    type Result = ResponseActFuture<Self, Result<VariablesResponseBody, SessionError>>;

    fn handle(&mut self, msg: Variables, _ctx: &mut Context<Self>) -> Self::Result {
        let reference = msg.variables_reference as u32;
        let Some(provider) = self.variable_providers.get(reference).cloned() else {
            return Box::pin(actix::fut::ready(Err(
                SessionError::UnknownVariablesReference(msg.variables_reference),
            )));
        };

        match provider {
            VariablesProvider::FrameScope {
                thread_id,
                environment,
            } => {
                let bindings = scope_bindings(&environment);
                let variables = self.bind_variables(thread_id, &bindings, true);
                Box::pin(actix::fut::ready(Ok(VariablesResponseBody { variables })))
            },
            VariablesProvider::Object { thread_id, actor } => {
                let Some(dispatch) = self.dispatch.clone() else {
                    return Box::pin(actix::fut::ready(Err(SessionError::InvalidRequest(
                        "no protocol stack".to_string(),
                    ))));
                };
                let proxy = ObjectGripProxy::new(actor, dispatch);
                let fut = async move { proxy.prototype_and_properties().await };
                Box::pin(fut.into_actor(self).map(move |result, actor_self, _ctx| {
                    let properties = result.map_err(SessionError::Rdp)?;
                    let bindings = property_bindings(&properties.own_properties);
                    let pause_lifetime = actor_self
                        .threads
                        .get(thread_id)
                        .map(|a| a.is_paused())
                        .unwrap_or(false);
                    Ok(VariablesResponseBody {
                        variables: actor_self.bind_variables(
                            thread_id,
                            &bindings,
                            pause_lifetime,
                        ),
                    })
                }))
            },
            VariablesProvider::LongString { grip, .. } => {
                let Some(dispatch) = self.dispatch.clone() else {
                    return Box::pin(actix::fut::ready(Err(SessionError::InvalidRequest(
                        "no protocol stack".to_string(),
                    ))));
                };
                let Some(actor) = grip_actor(&grip).map(str::to_string) else {
                    return Box::pin(actix::fut::ready(Err(SessionError::InvalidRequest(
                        "long string grip without actor".to_string(),
                    ))));
                };
                let length = grip.get("length").and_then(Value::as_u64).unwrap_or(0);
                let proxy = LongStringProxy::new(actor, dispatch);
                let fut = async move { proxy.substring(0, length).await };
                Box::pin(fut.into_actor(self).map(|result, _actor, _ctx| {
                    let full = result.map_err(SessionError::Rdp)?;
                    Ok(VariablesResponseBody {
                        variables: vec![Variable {
                            name: "value".to_string(),
                            value: format!("\"{full}\""),
                            type_: Some("string".to_string()),
                            variables_reference: 0,
                        }],
                    })
                }))
            },
        }
    }
}

impl Handler<Continue> for SessionActor {
    type Result = ResponseFuture<Result<ContinueResponseBody, SessionError>>;

    fn handle(&mut self, msg: Continue, _ctx: &mut Context<Self>) -> Self::Result {
        let thread_id = msg.thread_id as u32;
        let thread = match self.threads.get(thread_id) {
            Some(adapter) => adapter.thread.clone(),
            None => {
                return Box::pin(std::future::ready(Err(SessionError::UnknownThread(
                    msg.thread_id,
                ))));
            },
        };
        self.active_thread = Some(thread_id);

        Box::pin(async move {
            match thread.resume().await {
                Ok(()) => {},
                Err(e) if e.is_benign_state_race() => {},
                Err(e) => return Err(SessionError::Rdp(e)),
            }
            Ok(ContinueResponseBody {
                all_threads_continued: false,
            })
        })
    }
}

impl Handler<Step> for SessionActor {
    type Result = ResponseFuture<Result<(), SessionError>>;

    fn handle(&mut self, msg: Step, _ctx: &mut Context<Self>) -> Self::Result {
        let thread_id = msg.thread_id as u32;
        let thread = match self.threads.get(thread_id) {
            Some(adapter) => adapter.thread.clone(),
            None => {
                return Box::pin(std::future::ready(Err(SessionError::UnknownThread(
                    msg.thread_id,
                ))));
            },
        };
        self.active_thread = Some(thread_id);
        let kind = match msg.direction {
            StepDirection::Next => StepKind::Next,
            StepDirection::In => StepKind::Step,
            StepDirection::Out => StepKind::Finish,
        };

        Box::pin(async move {
            match thread.step(kind).await {
                Ok(()) => Ok(()),
                Err(e) if e.is_benign_state_race() => Ok(()),
                Err(e) => Err(SessionError::Rdp(e)),
            }
        })
    }
}

impl Handler<Pause> for SessionActor {
    type Result = ResponseFuture<Result<(), SessionError>>;

    fn handle(&mut self, msg: Pause, _ctx: &mut Context<Self>) -> Self::Result {
        let thread_id = msg.thread_id as u32;
        let thread = match self.threads.get(thread_id) {
            Some(adapter) => adapter.thread.clone(),
            None => {
                return Box::pin(std::future::ready(Err(SessionError::UnknownThread(
                    msg.thread_id,
                ))));
            },
        };
        self.active_thread = Some(thread_id);

        Box::pin(async move {
            match thread.interrupt().await {
                Ok(()) => Ok(()),
                Err(e) if e.is_benign_state_race() => Ok(()),
                Err(e) => Err(SessionError::Rdp(e)),
            }
        })
    }
}

impl Handler<Evaluate> for SessionActor {
    type Result = ResponseActFuture<Self, Result<EvaluateResponseBody, SessionError>>;

    fn handle(&mut self, msg: Evaluate, _ctx: &mut Context<Self>) -> Self::Result {
        // REPL evaluation targets the frame's thread, else the last thread
        // the user touched, else any live one.
        let thread_id = msg
            .frame_id
            .and_then(|frame_id| self.frames.get(frame_id as u32).map(|f| f.thread_id))
            .or_else(|| self.active_live_thread());
        let Some(thread_id) = thread_id else {
            return Box::pin(actix::fut::ready(Err(SessionError::ThreadExited)));
        };
        let Some(adapter) = self.threads.get(thread_id) else {
            return Box::pin(actix::fut::ready(Err(SessionError::ThreadExited)));
        };
        self.active_thread = Some(thread_id);
        let console = adapter.console.clone();
        let expression = msg.expression;

        let fut = async move { console.evaluate(&expression).await };
        Box::pin(fut.into_actor(self).map(move |result, actor, _ctx| {
            let evaluation = result.map_err(SessionError::Rdp)?;

            if evaluation.exception.is_some() || evaluation.exception_message.is_some() {
                let text = evaluation
                    .exception_message
                    .or_else(|| {
                        evaluation
                            .exception
                            .as_ref()
                            .map(crate::variables::exception_text)
                    })
                    .unwrap_or_else(|| "exception".to_string());
                actor.emit_output(iris_dap::OutputCategory::Stderr, text.clone());
                return Ok(EvaluateResponseBody {
                    result: text,
                    variables_reference: 0,
                });
            }

            let grip = evaluation.result.unwrap_or(Value::Null);
            let pause_lifetime = actor
                .threads
                .get(thread_id)
                .map(|a| a.is_paused())
                .unwrap_or(false);
            let variables_reference = if grip_is_expandable(&grip) {
                actor.register_provider_for_thread(thread_id, &grip, pause_lifetime)
            } else {
                0
            };
            Ok(EvaluateResponseBody {
                result: render_grip(&grip),
                variables_reference,
            })
        }))
    }
}

impl Handler<SetBreakpoints> for SessionActor {
    type Result = ResponseActFuture<Self, Result<SetBreakpointsResponseBody, SessionError>>;

    fn handle(&mut self, msg: SetBreakpoints, _ctx: &mut Context<Self>) -> Self::Result {
        let source = msg.args.source.clone();
        let Some(path) = source.path.clone().or_else(|| source.name.clone()) else {
            return Box::pin(actix::fut::ready(Err(SessionError::InvalidRequest(
                "setBreakpoints without a source path".to_string(),
            ))));
        };

        let desired: Vec<DesiredBreakpoint> = msg
            .args
            .breakpoints
            .iter()
            .map(|bp| DesiredBreakpoint {
                line: bp.line.max(1) as u32,
                column: bp.column.map(|c| c as u32),
                condition: bp.condition.clone(),
                log_message: bp.log_message.clone(),
                hit_limit: parse_hit_condition(bp.hit_condition.as_deref()),
            })
            .collect();

        let plan = self.breakpoints.plan_update(&path, desired);
        let urls: Vec<String> = self
            .sources
            .ids_for_path(&path)
            .iter()
            .filter_map(|&id| self.sources.get(id))
            .filter_map(|s| s.url.clone().or_else(|| s.generated_url.clone()))
            .collect();
        let breakpoint_list = self.breakpoint_list.clone();
        let record_path = path.clone();

        let fut = async move {
            let mut results: Vec<(RealizedBreakpoint, bool)> = Vec::new();

            if let Some(list) = &breakpoint_list {
                for removed in &plan.removed {
                    for url in &urls {
                        let location = BreakpointLocation {
                            source_url: url.clone(),
                            line: removed.desired.line,
                            column: removed.desired.column,
                        };
                        if let Err(e) = list.remove_breakpoint(&location).await {
                            warn!("Removing breakpoint failed: {e}");
                        }
                    }
                }
            }

            for (bp, _is_new) in plan.ordered {
                let mut verified = bp.verified;
                if let Some(list) = &breakpoint_list {
                    for url in &urls {
                        let location = BreakpointLocation {
                            source_url: url.clone(),
                            line: bp.desired.line,
                            column: bp.desired.column,
                        };
                        let options = BreakpointOptions {
                            condition: bp.desired.condition.clone(),
                            log_value: bp.desired.log_message.clone(),
                        };
                        match list.set_breakpoint(&location, &options).await {
                            Ok(()) => verified = true,
                            Err(e) => warn!("Installing breakpoint failed: {e}"),
                        }
                    }
                }
                results.push((bp, verified));
            }
            results
        };

        Box::pin(fut.into_actor(self).map(move |results, actor, _ctx| {
            let mut realized = Vec::with_capacity(results.len());
            let mut reply = Vec::with_capacity(results.len());
            for (mut bp, verified) in results {
                bp.verified = verified;
                reply.push(Breakpoint {
                    id: Some(bp.id),
                    verified: bp.verified,
                    message: None,
                    source: Some(source.clone()),
                    line: Some(bp.actual_line as i64),
                    column: bp.actual_column.map(|c| c as i64),
                });
                realized.push(bp);
            }
            actor.breakpoints.record(&record_path, realized);
            Ok(SetBreakpointsResponseBody { breakpoints: reply })
        }))
    }
}

impl Handler<SetExceptionBreakpoints> for SessionActor {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, msg: SetExceptionBreakpoints, _ctx: &mut Context<Self>) -> Self::Result {
        self.exception_filters = msg.filters;
        self.apply_exception_filters();
        Ok(())
    }
}

impl Handler<SetDataBreakpoints> for SessionActor {
    type Result = Result<SetBreakpointsResponseBody, SessionError>;

    fn handle(&mut self, msg: SetDataBreakpoints, _ctx: &mut Context<Self>) -> Self::Result {
        // The engine offers no way to install these; acknowledge unverified.
        Ok(SetBreakpointsResponseBody {
            breakpoints: msg
                .breakpoints
                .iter()
                .map(|_| Breakpoint {
                    verified: false,
                    message: Some("data breakpoints are not supported".to_string()),
                    ..Default::default()
                })
                .collect(),
        })
    }
}

impl Handler<SetInstructionBreakpoints> for SessionActor {
    type Result = Result<SetBreakpointsResponseBody, SessionError>;

    fn handle(
        &mut self,
        msg: SetInstructionBreakpoints,
        _ctx: &mut Context<Self>,
    ) -> Self::Result {
        Ok(SetBreakpointsResponseBody {
            breakpoints: msg
                .breakpoints
                .iter()
                .map(|_| Breakpoint {
                    verified: false,
                    message: Some("instruction breakpoints are not supported".to_string()),
                    ..Default::default()
                })
                .collect(),
        })
    }
}

impl Handler<SourceContent> for SessionActor {
    type Result = ResponseFuture<Result<SourceResponseBody, SessionError>>;

    fn handle(&mut self, msg: SourceContent, _ctx: &mut Context<Self>) -> Self::Result {
        let adapter = match msg.source_reference {
            Some(reference) => self.sources.get(reference as u32),
            None => msg.url.as_deref().and_then(|url| self.sources.get_by_url(url)),
        };
        let Some(adapter) = adapter else {
            return Box::pin(std::future::ready(Err(SessionError::InvalidRequest(
                "unknown source".to_string(),
            ))));
        };
        let proxy = adapter.proxy.clone();
        let dispatch = self.dispatch.clone();

        Box::pin(async move {
            let content = proxy.load_source().await.map_err(SessionError::Rdp)?;
            match content.source {
                Value::String(text) => Ok(SourceResponseBody {
                    content: text,
                    mime_type: content.content_type,
                }),
                grip => {
                    let (Some(actor), Some(dispatch)) =
                        (grip_actor(&grip).map(str::to_string), dispatch)
                    else {
                        return Err(SessionError::InvalidRequest(
                            "source content is not retrievable".to_string(),
                        ));
                    };
                    let length = grip.get("length").and_then(Value::as_u64).unwrap_or(0);
                    let long_string = LongStringProxy::new(actor, dispatch);
                    let text = long_string
                        .substring(0, length)
                        .await
                        .map_err(SessionError::Rdp)?;
                    Ok(SourceResponseBody {
                        content: text,
                        mime_type: content.content_type,
                    })
                },
            }
        })
    }
}

impl Handler<DisconnectSession> for SessionActor {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, msg: DisconnectSession, ctx: &mut Context<Self>) -> Self::Result {
        if let Some(terminate) = msg.terminate {
            self.config.firefox.terminate = terminate;
        }
        self.begin_termination(true, ctx);
        Ok(())
    }
}

//! # Iris Session
//!
//! The heart of the bridge: the session orchestrator that discovers
//! execution targets, drives the pause state machine, manages sources,
//! source maps, breakpoints and skip rules, and translates between the
//! editor's requests and the browser's protocol.
//!
//! The editor integration starts a [`SessionActor`], passes it a recipient
//! for [`EmitDapEvent`] notifications, and forwards DAP requests as the
//! typed messages in [`requests`].

pub mod breakpoints;
pub mod error;
pub mod launch;
pub mod pathmap;
pub mod requests;
pub mod session;
pub mod skip;
pub mod source;
pub mod sourcemaps;
pub mod thread;
pub mod variables;

pub use error::SessionError;
pub use requests::{
    Continue, DisconnectSession, Evaluate, Pause, Scopes, SetBreakpoints,
    SetDataBreakpoints, SetExceptionBreakpoints, SetInstructionBreakpoints, SourceContent,
    StackTrace, Step, StepDirection, Threads, Variables,
};
pub use session::{EmitDapEvent, SessionActor};

//! Per-target thread state: the pause/resume machine, stop classification
//! and the gates that decide whether a stop reaches the editor.

use iris_rdp::actors::{ConsoleProxy, FrameForm, PauseReason, TargetProxy, ThreadProxy};

use crate::breakpoints::HitVerdict;
use crate::variables::exception_text;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PauseState {
    Running,
    Paused { reason: String },
    /// Terminal; events referencing the thread afterwards are dropped.
    Exited,
}

/// Bridge-side state for one target.
pub struct ThreadAdapter {
    pub id: u32,
    pub name: String,
    /// Type tag: `tab`, `worker`, `content-script`, `background-script`...
    pub kind: String,
    pub target: TargetProxy,
    pub thread: ThreadProxy,
    pub console: ConsoleProxy,
    /// The descriptor this target came from; destruction cascades from it.
    pub descriptor_actor: Option<String>,
    pub state: PauseState,
    /// Source adapter ids this thread has observed (and owns).
    pub sources: Vec<u32>,
    /// Frame ids registered for the current pause.
    pub frame_ids: Vec<u32>,
    /// Variable references issued under the current pause.
    pub pause_variable_refs: Vec<u32>,
    /// Why the thread is paused, kept for re-classification.
    pub paused_why: Option<PauseReason>,
}

impl ThreadAdapter {
    pub fn new(
        id: u32,
        name: String,
        kind: String,
        target: TargetProxy,
        thread: ThreadProxy,
        console: ConsoleProxy,
    ) -> Self {
        ThreadAdapter {
            id,
            name,
            kind,
            target,
            thread,
            console,
            descriptor_actor: None,
            state: PauseState::Running,
            sources: Vec::new(),
            frame_ids: Vec::new(),
            pause_variable_refs: Vec::new(),
            paused_why: None,
        }
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, PauseState::Paused { .. })
    }

    pub fn has_exited(&self) -> bool {
        self.state == PauseState::Exited
    }

    /// Drop all pause-lifetime state, returning the ids to purge from the
    /// session registries. Must complete before `continued` goes out.
    pub fn take_pause_state(&mut self) -> (Vec<u32>, Vec<u32>) {
        self.paused_why = None;
        (
            std::mem::take(&mut self.frame_ids),
            std::mem::take(&mut self.pause_variable_refs),
        )
    }
}

/// A frame registered for the current pause, with its display position
/// already source-mapped.
pub struct FrameEntry {
    pub thread_id: u32,
    pub form: FrameForm,
    /// Path or URL shown to the editor.
    pub source_path: Option<String>,
    pub source_url: Option<String>,
    pub line: u32,
    pub column: u32,
}

/// Outcome of the pause gates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopDisposition {
    Surface { reason: String, text: Option<String> },
    /// Resume silently; the editor never learns the engine stopped.
    AutoResume,
}

/// Map an engine pause reason onto the editor's vocabulary.
pub fn classify_stop(why: &PauseReason) -> (String, Option<String>) {
    match why.kind.as_str() {
        "exception" => {
            let text = why.exception.as_ref().map(exception_text);
            ("exception".to_string(), text)
        },
        "breakpoint" => ("breakpoint".to_string(), None),
        "debuggerStatement" => ("debugger statement".to_string(), None),
        _ => ("interrupt".to_string(), None),
    }
}

/// Run the pause gates in order: blackbox, hit count, debugger-eval
/// exception. Any gate tripping turns the stop into a silent resume.
pub fn evaluate_stop_gates(
    why: &PauseReason,
    source_blackboxed: bool,
    hit_verdict: HitVerdict,
    source_is_debugger_eval: bool,
) -> StopDisposition {
    if source_blackboxed {
        return StopDisposition::AutoResume;
    }
    if why.kind == "breakpoint" && hit_verdict == HitVerdict::Suppress {
        return StopDisposition::AutoResume;
    }
    if why.kind == "exception" && source_is_debugger_eval {
        return StopDisposition::AutoResume;
    }
    let (reason, text) = classify_stop(why);
    StopDisposition::Surface { reason, text }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn why(kind: &str) -> PauseReason {
        serde_json::from_value(json!({ "type": kind })).unwrap()
    }

    #[test]
    fn stop_reasons_map_to_editor_vocabulary() {
        assert_eq!(classify_stop(&why("breakpoint")).0, "breakpoint");
        assert_eq!(classify_stop(&why("debuggerStatement")).0, "debugger statement");
        assert_eq!(classify_stop(&why("interrupted")).0, "interrupt");
        assert_eq!(classify_stop(&why("resumeLimit")).0, "interrupt");
    }

    #[test]
    fn exception_stops_carry_preview_text() {
        let why: PauseReason = serde_json::from_value(json!({
            "type": "exception",
            "exception": {
                "type": "object",
                "class": "Error",
                "actor": "obj4",
                "preview": { "kind": "Error", "name": "TypeError", "message": "nope" }
            }
        }))
        .unwrap();
        let (reason, text) = classify_stop(&why);
        assert_eq!(reason, "exception");
        assert_eq!(text.as_deref(), Some("TypeError: nope"));
    }

    #[test]
    fn blackboxed_sources_auto_resume() {
        let disposition =
            evaluate_stop_gates(&why("exception"), true, HitVerdict::Surface, false);
        assert_eq!(disposition, StopDisposition::AutoResume);
    }

    #[test]
    fn suppressed_hits_auto_resume_only_breakpoint_stops() {
        let disposition =
            evaluate_stop_gates(&why("breakpoint"), false, HitVerdict::Suppress, false);
        assert_eq!(disposition, StopDisposition::AutoResume);

        // A suppress verdict is meaningless for non-breakpoint stops.
        let disposition =
            evaluate_stop_gates(&why("debuggerStatement"), false, HitVerdict::Suppress, false);
        assert!(matches!(disposition, StopDisposition::Surface { .. }));
    }

    #[test]
    fn eval_exceptions_are_swallowed() {
        let disposition =
            evaluate_stop_gates(&why("exception"), false, HitVerdict::Surface, true);
        assert_eq!(disposition, StopDisposition::AutoResume);

        // Breakpoints inside eval code still surface.
        let disposition =
            evaluate_stop_gates(&why("breakpoint"), false, HitVerdict::Surface, true);
        assert!(matches!(disposition, StopDisposition::Surface { .. }));
    }
}

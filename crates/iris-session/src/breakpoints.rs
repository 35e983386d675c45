//! Desired-versus-realized breakpoint bookkeeping.
//!
//! The editor owns the desired set per path; the engine owns the suspension.
//! This manager diffs the two on every `setBreakpoints`, and decides whether
//! a breakpoint stop is surfaced or silently resumed (hit counts).

use std::collections::HashMap;

/// What the editor asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredBreakpoint {
    pub line: u32,
    pub column: Option<u32>,
    pub condition: Option<String>,
    pub log_message: Option<String>,
    /// Parsed from the DAP `hitCondition` string.
    pub hit_limit: Option<u32>,
}

/// What the engine has (or will have) installed.
#[derive(Debug, Clone)]
pub struct RealizedBreakpoint {
    pub id: i64,
    pub desired: DesiredBreakpoint,
    pub actual_line: u32,
    pub actual_column: Option<u32>,
    pub verified: bool,
    /// Hits since the last surfaced stop; stays below `hit_limit`.
    pub hit_count: u32,
}

impl RealizedBreakpoint {
    fn matches_location(&self, line: u32, column: Option<u32>) -> bool {
        self.actual_line == line
            && match (self.actual_column, column) {
                (Some(a), Some(b)) => a == b,
                _ => true,
            }
    }
}

/// Plan produced by diffing a new desired list against the realized state.
pub struct BreakpointUpdate {
    /// Realized entries in the editor's order; the flag marks fresh
    /// entries that have never been installed.
    pub ordered: Vec<(RealizedBreakpoint, bool)>,
    /// Stale entries to remove from the engine.
    pub removed: Vec<RealizedBreakpoint>,
}

/// Whether a breakpoint stop is shown to the user or swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitVerdict {
    Surface,
    Suppress,
}

#[derive(Default)]
pub struct BreakpointManager {
    by_path: HashMap<String, Vec<RealizedBreakpoint>>,
    next_id: i64,
}

impl BreakpointManager {
    pub fn new() -> Self {
        BreakpointManager {
            by_path: HashMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Diff the new desired list against the current state of `path`.
    /// Existing breakpoints are matched by requested line and column; kept
    /// ones preserve their id and hit count but take the new condition, log
    /// message and hit limit.
    pub fn plan_update(&mut self, path: &str, desired: Vec<DesiredBreakpoint>) -> BreakpointUpdate {
        let mut old = self.by_path.remove(path).unwrap_or_default();
        let mut ordered = Vec::new();

        for want in desired {
            let existing = old
                .iter()
                .position(|bp| bp.desired.line == want.line && bp.desired.column == want.column);
            match existing {
                Some(index) => {
                    let mut survivor = old.swap_remove(index);
                    survivor.desired = want;
                    ordered.push((survivor, false));
                },
                None => {
                    let id = self.allocate_id();
                    ordered.push((
                        RealizedBreakpoint {
                            id,
                            actual_line: want.line,
                            actual_column: want.column,
                            desired: want,
                            verified: false,
                            hit_count: 0,
                        },
                        true,
                    ));
                },
            }
        }

        BreakpointUpdate {
            ordered,
            removed: old,
        }
    }

    /// Store the final realized list for a path, in the editor's order.
    pub fn record(&mut self, path: &str, realized: Vec<RealizedBreakpoint>) {
        if realized.is_empty() {
            self.by_path.remove(path);
        } else {
            self.by_path.insert(path.to_string(), realized);
        }
    }

    pub fn breakpoints_for(&self, path: &str) -> &[RealizedBreakpoint] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Desired breakpoints for a path that are not yet verified (a source
    /// may have loaded after `setBreakpoints`).
    pub fn unverified_for(&self, path: &str) -> Vec<RealizedBreakpoint> {
        self.breakpoints_for(path)
            .iter()
            .filter(|bp| !bp.verified)
            .cloned()
            .collect()
    }

    pub fn mark_verified(&mut self, path: &str, id: i64, actual_line: u32, actual_column: Option<u32>) {
        if let Some(list) = self.by_path.get_mut(path) {
            if let Some(bp) = list.iter_mut().find(|bp| bp.id == id) {
                bp.verified = true;
                bp.actual_line = actual_line;
                bp.actual_column = actual_column;
            }
        }
    }

    /// Account one engine stop at a realized location. With a hit limit of
    /// N, the first N-1 hits are suppressed, the N-th is surfaced and the
    /// counter starts over; without a limit every hit surfaces.
    pub fn register_hit(&mut self, path: &str, line: u32, column: Option<u32>) -> HitVerdict {
        let Some(list) = self.by_path.get_mut(path) else {
            return HitVerdict::Surface;
        };
        let Some(bp) = list.iter_mut().find(|bp| bp.matches_location(line, column)) else {
            return HitVerdict::Surface;
        };
        let Some(limit) = bp.desired.hit_limit else {
            return HitVerdict::Surface;
        };

        bp.hit_count += 1;
        if bp.hit_count >= limit {
            bp.hit_count = 0;
            HitVerdict::Surface
        } else {
            HitVerdict::Suppress
        }
    }

    pub fn clear(&mut self) {
        self.by_path.clear();
    }
}

/// Parse a DAP `hitCondition` into a hit limit. Only plain counts are
/// supported; anything else is ignored rather than rejected.
pub fn parse_hit_condition(hit_condition: Option<&str>) -> Option<u32> {
    let raw = hit_condition?.trim();
    raw.parse().ok().filter(|&n| n > 0)
}

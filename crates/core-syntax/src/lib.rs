//! Regex-driven syntax highlighting state machine.
//!
//! Grounded in `dte`'s `syntax/syntax.h`/`syntax/state.c` state machine and
//! in the condition/action table this crate's callers already specify. A
//! [`Syntax`] is a named map of [`State`]s; highlighting a line replays the
//! state's ordered [`Condition`] list until one matches, falling back to the
//! state's `default_action`. [`Highlighter`] wraps a `Syntax` with the
//! per-buffer line-start cache and the incremental update rules
//! (`hl_insert`/`hl_delete`).

pub mod action;
pub mod condition;
pub mod registry;
pub mod state;

pub use action::Action;
pub use condition::{Condition, ConditionKind};
pub use state::{State, StateId, Syntax};

use tracing::warn;

/// One highlighted span within a line: byte range `[start, end)` and the
/// emit name to color it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub emit_name: String,
}

/// The engine's notion of "where it is": which state, in which syntax, plus
/// the stack of (state, return state) pairs for nested subsyntaxes entered
/// via `HeredocBegin` / subsyntax reference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HlState {
    pub stack: Vec<StackFrame>,
    pub current: StateId,
    /// Heredoc delimiter captured when a subsyntax was entered via
    /// `HeredocBegin`; empty when not inside a heredoc body.
    pub heredoc_delim: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub syntax: String,
    pub return_state: StateId,
}

/// Wraps a [`Syntax`] with the per-buffer line-start state cache described
/// by the engine's incremental update rules.
pub struct Highlighter {
    pub syntax: Syntax,
    /// `line_start_states[r]` is the state the scanner enters row `r` in.
    /// Index 0 is always the syntax's start state.
    line_start_states: Vec<HlState>,
}

impl Highlighter {
    pub fn new(syntax: Syntax) -> Self {
        let start = HlState {
            current: syntax.start_state(),
            ..HlState::default()
        };
        Highlighter {
            syntax,
            line_start_states: vec![start],
        }
    }

    pub fn line_start_state(&self, row: usize) -> Option<&HlState> {
        self.line_start_states.get(row)
    }

    /// Highlight one line of bytes (without its trailing `\n`), starting
    /// from `line_start_states[row]`. Returns the spans found and the state
    /// reached at end-of-line.
    pub fn highlight_line(&self, row: usize, line: &[u8]) -> (Vec<Span>, HlState) {
        let mut st = self
            .line_start_states
            .get(row)
            .cloned()
            .unwrap_or_default();
        let mut spans = Vec::new();
        let mut pos = 0usize;
        let mut buffered_start = pos;
        let mut in_buffer = false;

        while pos < line.len() {
            let pos_before = pos;
            let state = match self.syntax.resolve(&st) {
                Some(s) => s,
                None => break,
            };
            let state_before = st.current;
            let buffered = if in_buffer { &line[buffered_start..pos] } else { &line[pos..pos] };
            match state.try_match(line, pos, buffered, &st.heredoc_delim) {
                Some(m) => {
                    if !m.emit_name.is_empty() {
                        spans.push(Span {
                            start: pos,
                            end: pos + m.consumed,
                            emit_name: m.emit_name,
                        });
                    }
                    if m.starts_buffer {
                        in_buffer = true;
                        buffered_start = pos;
                    }
                    pos += m.consumed;
                    let action = m.action;
                    self.syntax.transition(&mut st, m.dest, action, &line[buffered_start..pos]);
                    if action != Action::Eat {
                        in_buffer = in_buffer && action != Action::NoeatBuffer;
                    }
                }
                None => {
                    let default = state.default_action();
                    let action = default.action;
                    self.syntax.transition(&mut st, default.dest.clone(), action, &line[buffered_start..pos]);
                    match action {
                        Action::Eat => pos += 1,
                        Action::Noeat => {}
                        Action::NoeatBuffer => in_buffer = false,
                        Action::HeredocBegin => {
                            st.heredoc_delim = String::from_utf8_lossy(&line[buffered_start..pos]).into_owned();
                            in_buffer = false;
                        }
                    }
                }
            }
            // A state whose default action neither consumes a byte nor
            // changes state would otherwise spin forever; force progress.
            if pos == pos_before && st.current == state_before {
                pos += 1;
            }
        }
        (spans, st)
    }

    /// Insert `nl` newlines' worth of new lines at `row`; if `nl == 0` only
    /// `row` itself needs rehighlighting.
    pub fn hl_insert(&mut self, row: usize, nl: usize) {
        if nl == 0 {
            if row < self.line_start_states.len() {
                self.line_start_states.truncate(row + 1);
            }
            return;
        }
        self.line_start_states.truncate(row + 1);
        for _ in 0..nl {
            self.line_start_states.push(HlState::default());
        }
    }

    /// Remove `nl` cached line-start entries at `row + 1`.
    pub fn hl_delete(&mut self, row: usize, nl: usize) {
        let start = (row + 1).min(self.line_start_states.len());
        let end = (start + nl).min(self.line_start_states.len());
        self.line_start_states.drain(start..end);
    }

    /// Rehighlight forward from `from_row` through `lines`, stopping early
    /// once a recomputed end-of-line state matches the previously cached
    /// value for the following row (the engine's incremental-update fast
    /// path). Returns the highest row whose cache entry changed.
    pub fn rehighlight_from(&mut self, from_row: usize, lines: &[&[u8]]) -> usize {
        let mut row = from_row;
        let mut last_changed = from_row;
        while row < lines.len() {
            let (_, end_state) = self.highlight_line(row, lines[row]);
            let next_row = row + 1;
            if next_row >= self.line_start_states.len() {
                self.line_start_states.push(end_state);
                last_changed = row;
            } else if self.line_start_states[next_row] != end_state {
                self.line_start_states[next_row] = end_state;
                last_changed = row;
            } else {
                break; // converged: rows after this are already correct
            }
            row += 1;
        }
        last_changed
    }
}

pub fn warn_dropped_condition(syntax_name: &str, state_name: &str, err: &regex::Error) {
    warn!(syntax = syntax_name, state = state_name, %err, "dropping condition with invalid regex");
}

//! Transition actions taken once a condition (or a state's default) fires.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Consume one byte (or the whole match) and transition.
    Eat,
    /// Transition without consuming any input.
    Noeat,
    /// Transition without consuming, and reset the buffered-match span.
    NoeatBuffer,
    /// Enter a subsyntax whose `HeredocEnd` delimiter is the text buffered
    /// so far, remembering the state to return to on `END`.
    HeredocBegin,
}

/// Where a transition goes: a named state in the same syntax, a named
/// subsyntax's start state (pushed on the return stack), or `END` (pop the
/// return stack — valid only inside a subsyntax).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dest {
    State(String),
    Subsyntax(String),
    End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub dest: Dest,
    pub action: Action,
    /// Color/name to emit for the matched span; empty means "inherit
    /// whatever the previous span emitted" (no recolor).
    pub emit_name: String,
}

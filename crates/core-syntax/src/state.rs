//! States and the [`Syntax`] they belong to.

use std::collections::HashMap;

use crate::action::{Action, Dest, Transition};
use crate::condition::{Condition, Match};
use crate::{HlState, StackFrame};

/// Index of a [`State`] within its owning [`Syntax`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct StateId(pub u32);

pub struct State {
    pub name: String,
    pub emit_name: String,
    pub conditions: Vec<Condition>,
    default_action: Transition,
}

impl State {
    pub fn new(name: impl Into<String>, emit_name: impl Into<String>, default_action: Transition) -> Self {
        State {
            name: name.into(),
            emit_name: emit_name.into(),
            conditions: Vec::new(),
            default_action,
        }
    }

    pub fn with_condition(mut self, cond: Condition) -> Self {
        self.conditions.push(cond);
        self
    }

    pub fn try_match(&self, line: &[u8], pos: usize, buffered: &[u8], heredoc_delim: &str) -> Option<Match> {
        self.conditions.iter().find_map(|c| c.try_match(line, pos, buffered, heredoc_delim))
    }

    pub fn default_action(&self) -> &Transition {
        &self.default_action
    }
}

/// A named state machine. Subsyntaxes are modeled as ordinary states reached
/// through a [`Dest::Subsyntax`] transition that pushes a [`StackFrame`]
/// remembering which state to resume once a `HeredocEnd`/`END` condition
/// pops back out — this crate parses no external grammar files, so every
/// subsyntax is just another named group of states declared in the same
/// [`Syntax`], not a separate registry entry.
pub struct Syntax {
    pub name: String,
    states: Vec<State>,
    by_name: HashMap<String, u32>,
    start: u32,
}

impl Syntax {
    pub fn builder(name: impl Into<String>) -> SyntaxBuilder {
        SyntaxBuilder {
            name: name.into(),
            states: Vec::new(),
        }
    }

    pub fn start_state(&self) -> StateId {
        StateId(self.start)
    }

    pub fn state(&self, id: StateId) -> &State {
        &self.states[id.0 as usize]
    }

    fn id_of(&self, name: &str) -> Option<StateId> {
        self.by_name.get(name).map(|&i| StateId(i))
    }

    /// Resolve the state `st.current` currently refers to.
    pub fn resolve(&self, st: &HlState) -> Option<&State> {
        self.states.get(st.current.0 as usize)
    }

    /// Apply a transition's destination/action to `st`, in place.
    pub fn transition(&self, st: &mut HlState, dest: Dest, action: Action, _buffered: &[u8]) {
        match dest {
            Dest::State(name) => {
                if let Some(id) = self.id_of(&name) {
                    st.current = id;
                }
            }
            Dest::Subsyntax(name) => {
                if let Some(id) = self.id_of(&name) {
                    st.stack.push(StackFrame {
                        syntax: self.name.clone(),
                        return_state: st.current,
                    });
                    st.current = id;
                }
            }
            Dest::End => {
                if let Some(frame) = st.stack.pop() {
                    st.current = frame.return_state;
                }
            }
        }
        if action == Action::HeredocBegin {
            // handled by caller: it sets st.heredoc_delim from the buffer.
        }
    }
}

pub struct SyntaxBuilder {
    name: String,
    states: Vec<State>,
}

impl SyntaxBuilder {
    pub fn state(mut self, state: State) -> Self {
        self.states.push(state);
        self
    }

    /// Build the syntax, with `start_name` as the entry state. Panics if
    /// `start_name` was never added — this is a registration-time
    /// programmer error, not a runtime condition.
    pub fn build(self, start_name: &str) -> Syntax {
        let mut by_name = HashMap::new();
        for (i, s) in self.states.iter().enumerate() {
            by_name.insert(s.name.clone(), i as u32);
        }
        let start = *by_name
            .get(start_name)
            .unwrap_or_else(|| panic!("syntax {:?} has no state named {start_name:?}", self.name));
        Syntax {
            name: self.name,
            states: self.states,
            by_name,
            start,
        }
    }
}

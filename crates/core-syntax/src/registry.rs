//! Process-wide registry of built-in [`Syntax`] definitions.
//!
//! No external grammar file format is parsed here — loading textual syntax
//! definitions, if ever added, belongs to an external collaborator. What
//! ships in the core is a small set of built-ins defined directly in Rust.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::bytes::Regex;

use crate::action::{Action, Dest, Transition};
use crate::condition::{Condition, ConditionKind};
use crate::state::{State, Syntax};

pub struct Registry {
    by_name: HashMap<&'static str, fn() -> Syntax>,
}

impl Registry {
    pub fn get(&self, name: &str) -> Option<Syntax> {
        self.by_name.get(name).map(|f| f())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.by_name.keys().copied()
    }
}

pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut by_name: HashMap<&'static str, fn() -> Syntax> = HashMap::new();
        by_name.insert("plain", build_plain);
        by_name.insert("hash-comment", build_hash_comment);
        Registry { by_name }
    })
}

fn noop(dest: &str) -> Transition {
    Transition {
        dest: Dest::State(dest.to_string()),
        action: Action::Eat,
        emit_name: String::new(),
    }
}

/// A syntax with exactly one state that never recolors anything; the
/// fallback when a buffer has no recognized filetype.
fn build_plain() -> Syntax {
    Syntax::builder("plain")
        .state(State::new("default", "text", noop("default")))
        .build("default")
}

/// Demonstrates line comments (`# ...`) and a bare keyword list, grounded in
/// the condition table in this crate's module docs: `Char1` to notice `#`,
/// `Regex` to consume the rest of the line as a comment span, `Inlist` to
/// recolor a small set of keywords matched via `CharBuffer`.
fn build_hash_comment() -> Syntax {
    let keyword_start: Box<[bool; 256]> = {
        let mut set = [false; 256];
        for c in b'a'..=b'z' {
            set[c as usize] = true;
        }
        for c in b'A'..=b'Z' {
            set[c as usize] = true;
        }
        Box::new(set)
    };
    let keyword_cont = keyword_start.clone();

    let default = State::new("default", "text", noop("default"))
        .with_condition(Condition {
            kind: ConditionKind::Char1(b'#'),
            transition: Transition {
                dest: Dest::State("comment".into()),
                action: Action::Eat,
                emit_name: "comment".into(),
            },
        })
        .with_condition(Condition {
            kind: ConditionKind::CharBuffer(keyword_start),
            transition: Transition {
                dest: Dest::State("word".into()),
                action: Action::Eat,
                emit_name: String::new(),
            },
        });

    let comment = State::new(
        "comment",
        "comment",
        Transition {
            dest: Dest::State("default".into()),
            action: Action::Noeat,
            emit_name: String::new(),
        },
    )
    .with_condition(Condition {
        kind: ConditionKind::Regex(Regex::new(r"^.*").expect("static regex is valid")),
        transition: Transition {
            dest: Dest::State("default".into()),
            action: Action::Eat,
            emit_name: "comment".into(),
        },
    });

    let word = State::new(
        "word",
        "text",
        Transition {
            dest: Dest::State("default".into()),
            action: Action::NoeatBuffer,
            emit_name: String::new(),
        },
    )
    .with_condition(Condition {
        kind: ConditionKind::CharBuffer(keyword_cont),
        transition: Transition {
            dest: Dest::State("word".into()),
            action: Action::Eat,
            emit_name: String::new(),
        },
    })
    .with_condition(Condition {
        kind: ConditionKind::Inlist(vec!["if".into(), "else".into(), "fn".into(), "let".into()]),
        transition: Transition {
            dest: Dest::State("default".into()),
            action: Action::NoeatBuffer,
            emit_name: "keyword".into(),
        },
    });

    Syntax::builder("hash-comment")
        .state(default)
        .state(comment)
        .state(word)
        .build("default")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Highlighter;

    #[test]
    fn plain_produces_no_spans() {
        let syntax = registry().get("plain").unwrap();
        let hl = Highlighter::new(syntax);
        let (spans, _) = hl.highlight_line(0, b"hello world");
        assert!(spans.is_empty());
    }

    #[test]
    fn hash_comment_recolors_after_pound() {
        let syntax = registry().get("hash-comment").unwrap();
        let hl = Highlighter::new(syntax);
        let (spans, _) = hl.highlight_line(0, b"let x = 1 # note");
        assert!(spans.iter().any(|s| s.emit_name == "comment"));
        assert!(spans.iter().any(|s| s.emit_name == "keyword"));
    }
}

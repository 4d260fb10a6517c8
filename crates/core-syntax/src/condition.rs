//! Condition kinds a [`crate::State`] tests, in order, against the current
//! input position.

use crate::action::Transition;

#[derive(Debug, Clone)]
pub enum ConditionKind {
    /// Next byte equals `ch`.
    Char1(u8),
    /// Next byte is a member of the bitset.
    Char(Box<[bool; 256]>),
    /// As `Char`, but also begins a buffered match for `Bufis`/`Inlist`.
    CharBuffer(Box<[bool; 256]>),
    /// Next 2 bytes equal this literal.
    Str2([u8; 2]),
    /// Next N bytes equal this literal exactly.
    Str(Vec<u8>),
    /// Next N bytes equal this literal, ASCII case-insensitively.
    StrIcase(Vec<u8>),
    /// The buffered match equals this literal exactly.
    Bufis(Vec<u8>),
    /// The buffered match equals this literal, ASCII case-insensitively.
    BufisIcase(Vec<u8>),
    /// The buffered match is a member of a named string set.
    Inlist(Vec<String>),
    /// The buffered match equals the active heredoc delimiter.
    HeredocEnd,
    /// Always matches; repaints the buffered span.
    RecolorBuffer,
    /// Always matches; repaints the previous `n` bytes (1..=2500).
    Recolor(usize),
    /// A compiled regex matches starting at the current byte.
    Regex(regex::bytes::Regex),
}

#[derive(Debug, Clone)]
pub struct Condition {
    pub kind: ConditionKind,
    pub transition: Transition,
}

/// Outcome of a successful condition match.
pub struct Match {
    pub consumed: usize,
    pub dest: crate::action::Dest,
    pub action: crate::action::Action,
    pub emit_name: String,
    /// True if this match should start (or continue) a buffered span.
    pub starts_buffer: bool,
}

fn ascii_ieq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_ascii_lowercase() == y.to_ascii_lowercase())
}

impl Condition {
    /// Try to match this condition at `line[pos..]`, given the bytes
    /// buffered so far (`buffered`) and the active heredoc delimiter.
    pub fn try_match(&self, line: &[u8], pos: usize, buffered: &[u8], heredoc_delim: &str) -> Option<Match> {
        let rest = &line[pos..];
        let mut starts_buffer = false;
        let consumed = match &self.kind {
            ConditionKind::Char1(ch) => {
                if rest.first() != Some(ch) {
                    return None;
                }
                1
            }
            ConditionKind::Char(set) => {
                let b = *rest.first()?;
                if !set[b as usize] {
                    return None;
                }
                1
            }
            ConditionKind::CharBuffer(set) => {
                let b = *rest.first()?;
                if !set[b as usize] {
                    return None;
                }
                starts_buffer = true;
                1
            }
            ConditionKind::Str2(lit) => {
                if rest.len() < 2 || &rest[..2] != lit {
                    return None;
                }
                2
            }
            ConditionKind::Str(lit) => {
                if rest.len() < lit.len() || &rest[..lit.len()] != lit.as_slice() {
                    return None;
                }
                lit.len()
            }
            ConditionKind::StrIcase(lit) => {
                if rest.len() < lit.len() || !ascii_ieq(&rest[..lit.len()], lit) {
                    return None;
                }
                lit.len()
            }
            ConditionKind::Bufis(lit) => {
                if buffered != lit.as_slice() {
                    return None;
                }
                0
            }
            ConditionKind::BufisIcase(lit) => {
                if !ascii_ieq(buffered, lit) {
                    return None;
                }
                0
            }
            ConditionKind::Inlist(set) => {
                if !set.iter().any(|s| s.as_bytes() == buffered) {
                    return None;
                }
                0
            }
            ConditionKind::HeredocEnd => {
                if heredoc_delim.is_empty() || buffered != heredoc_delim.as_bytes() {
                    return None;
                }
                0
            }
            ConditionKind::RecolorBuffer => 0,
            ConditionKind::Recolor(_) => 0,
            ConditionKind::Regex(re) => {
                let m = re.find(rest).filter(|m| m.start() == 0)?;
                m.end()
            }
        };
        Some(Match {
            consumed,
            dest: self.transition.dest.clone(),
            action: self.transition.action,
            emit_name: self.transition.emit_name.clone(),
            starts_buffer,
        })
    }
}

//! Byte-ring terminal input decoder (§4.8), grounded in `term-read.c` and
//! `terminal/xterm-keys.c`: no `crossterm::EventStream` here, just UTF-8
//! decode plus a hand-rolled CSI/SS3 grammar.

use core_events::{InputEvent, KeyEventExt, KeyToken, ModMask, NamedKey};
use core_text::unicode::decode_utf8;

/// What a single decode attempt did with the front of the ring.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodeOutcome {
    /// Consumed `len` bytes and produced an event.
    Event(usize, InputEvent),
    /// The buffer might hold a truncated escape sequence; wait for more
    /// input (or the ESC-disambiguation timeout) before retrying.
    NeedMoreInput,
    /// Consumed `len` bytes with nothing to report (an unknown escape
    /// sequence, logged at trace level by the caller).
    Discard(usize),
}

/// Decodes one event at a time from a byte slice that the caller refills
/// from stdin. Holds only the bracketed-paste "are we inside a paste"
/// flag; everything else is derived from the slice passed to [`step`].
#[derive(Debug, Default)]
pub struct Decoder {
    in_paste: bool,
}

const ESC: u8 = 0x1b;
const PASTE_BEGIN: &[u8] = b"\x1b[200~";
const PASTE_END: &[u8] = b"\x1b[201~";

fn is_text(buf: &[u8]) -> bool {
    buf.iter().all(|&b| matches!(b, b'\t' | b'\n' | b'\r') || !(b < 0x20 || b == 0x7f))
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt to decode one event from the front of `buf`. The caller
    /// drops the returned byte count from its ring before the next call.
    pub fn step(&mut self, buf: &[u8]) -> DecodeOutcome {
        if buf.is_empty() {
            return DecodeOutcome::NeedMoreInput;
        }

        if self.in_paste {
            return self.step_paste(buf);
        }

        if buf.starts_with(PASTE_BEGIN) {
            self.in_paste = true;
            return DecodeOutcome::Event(PASTE_BEGIN.len(), InputEvent::PasteStart);
        }

        if buf.len() > 4 && is_text(buf) {
            let text = String::from_utf8_lossy(buf).replace('\r', "\n");
            return DecodeOutcome::Event(buf.len(), InputEvent::TextCommit(text));
        }

        if buf[0] == ESC {
            return self.step_escape(buf);
        }

        self.step_simple(buf)
    }

    fn step_paste(&mut self, buf: &[u8]) -> DecodeOutcome {
        if let Some(pos) = find_subslice(buf, PASTE_END) {
            if pos == 0 {
                self.in_paste = false;
                return DecodeOutcome::Event(PASTE_END.len(), InputEvent::PasteEnd);
            }
            let text = String::from_utf8_lossy(&buf[..pos]).replace('\r', "\n");
            return DecodeOutcome::Event(pos, InputEvent::PasteChunk(text));
        }
        if buf.is_empty() {
            return DecodeOutcome::NeedMoreInput;
        }
        let text = String::from_utf8_lossy(buf).replace('\r', "\n");
        DecodeOutcome::Event(buf.len(), InputEvent::PasteChunk(text))
    }

    fn step_escape(&mut self, buf: &[u8]) -> DecodeOutcome {
        debug_assert_eq!(buf[0], ESC);
        let rest = &buf[1..];
        if rest.is_empty() {
            // Bare ESC so far; caller decides (after the timeout) whether
            // this is the Esc key or the prefix of an alt-chord.
            return DecodeOutcome::NeedMoreInput;
        }
        match rest[0] {
            b'[' => match parse_csi(&rest[1..]) {
                CsiResult::Matched(len, token, mods) => {
                    DecodeOutcome::Event(2 + len, InputEvent::KeyPress(chord(token, mods)))
                }
                CsiResult::Truncated => DecodeOutcome::NeedMoreInput,
                CsiResult::NoMatch => self.fallback_after_esc(buf),
            },
            b'O' => match parse_ss3(&rest[1..]) {
                CsiResult::Matched(len, token, mods) => {
                    DecodeOutcome::Event(2 + len, InputEvent::KeyPress(chord(token, mods)))
                }
                CsiResult::Truncated => DecodeOutcome::NeedMoreInput,
                CsiResult::NoMatch => self.fallback_after_esc(buf),
            },
            _ => self.fallback_after_esc(buf),
        }
    }

    /// `ESC` followed by exactly one more byte and no CSI/SS3 match:
    /// deliver that byte as a key with the Meta modifier. More than one
    /// trailing byte with no match is an unrecognized sequence, discarded.
    fn fallback_after_esc(&mut self, buf: &[u8]) -> DecodeOutcome {
        if buf.len() != 2 {
            return DecodeOutcome::Discard(buf.len());
        }
        match self.step_simple(&buf[1..]) {
            DecodeOutcome::Event(len, InputEvent::KeyPress(ev)) => {
                let KeyEventExt { token, repeat, timestamp } = ev;
                let merged = match token {
                    KeyToken::Chord { base, mods } => KeyToken::Chord { base, mods: mods | ModMask::META },
                    other => KeyToken::Chord { base: Box::new(other), mods: ModMask::META },
                };
                DecodeOutcome::Event(1 + len, InputEvent::KeyPress(KeyEventExt::from_parts(merged, repeat, timestamp)))
            }
            other => other,
        }
    }

    fn step_simple(&mut self, buf: &[u8]) -> DecodeOutcome {
        let (cp, consumed) = decode_utf8(buf);
        if consumed == 0 {
            return DecodeOutcome::NeedMoreInput;
        }
        let token = if consumed == 1 && cp < 0x80 {
            match cp as u8 {
                b'\t' => KeyToken::Named(NamedKey::Tab),
                b'\r' => KeyToken::Named(NamedKey::Enter),
                0x7f => KeyToken::Chord { base: Box::new(KeyToken::Char('?')), mods: ModMask::CTRL },
                c if c < 0x20 => KeyToken::Chord {
                    base: Box::new(KeyToken::Char((c | 0x40) as char)),
                    mods: ModMask::CTRL,
                },
                c => KeyToken::Char(c as char),
            }
        } else {
            KeyToken::Char(char::from_u32(cp).unwrap_or('\u{fffd}'))
        };
        DecodeOutcome::Event(consumed, InputEvent::KeyPress(KeyEventExt::new(token)))
    }
}

fn chord(token: KeyToken, mods: ModMask) -> KeyEventExt {
    let token = if mods.is_empty() { token } else { KeyToken::Chord { base: Box::new(token), mods } };
    KeyEventExt::new(token)
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

enum CsiResult {
    Matched(usize, KeyToken, ModMask),
    Truncated,
    NoMatch,
}

fn decode_modifiers(n: u32) -> Option<ModMask> {
    let bits = n.checked_sub(1)?;
    let mut mods = ModMask::empty();
    if bits & 1 != 0 {
        mods |= ModMask::SHIFT;
    }
    if bits & 2 != 0 {
        mods |= ModMask::META;
    }
    if bits & 4 != 0 {
        mods |= ModMask::CTRL;
    }
    Some(mods)
}

fn named_for_letter(letter: u8) -> Option<NamedKey> {
    Some(match letter {
        b'A' => NamedKey::Up,
        b'B' => NamedKey::Down,
        b'C' => NamedKey::Right,
        b'D' => NamedKey::Left,
        b'F' => NamedKey::End,
        b'H' => NamedKey::Home,
        b'P' => NamedKey::F(1),
        b'Q' => NamedKey::F(2),
        b'R' => NamedKey::F(3),
        b'S' => NamedKey::F(4),
        _ => return None,
    })
}

fn named_for_tilde(n: u32) -> Option<NamedKey> {
    Some(match n {
        1 | 7 => NamedKey::Home,
        2 => NamedKey::Insert,
        3 => NamedKey::Delete,
        4 | 8 => NamedKey::End,
        5 => NamedKey::PageUp,
        6 => NamedKey::PageDown,
        11 => NamedKey::F(1),
        12 => NamedKey::F(2),
        13 => NamedKey::F(3),
        14 => NamedKey::F(4),
        15 => NamedKey::F(5),
        17 => NamedKey::F(6),
        18 => NamedKey::F(7),
        19 => NamedKey::F(8),
        20 => NamedKey::F(9),
        21 => NamedKey::F(10),
        23 => NamedKey::F(11),
        24 => NamedKey::F(12),
        _ => return None,
    })
}

/// Parses the parameter/final-byte grammar after `ESC [`: up to three
/// `;`-separated numeric parameters, then a final byte in `A-Z` or `~`.
fn parse_csi(bytes: &[u8]) -> CsiResult {
    let mut i = 0;
    let mut params: Vec<u32> = Vec::with_capacity(3);
    let mut num: u32 = 0;
    let mut has_digits = false;

    loop {
        let Some(&b) = bytes.get(i) else {
            return CsiResult::Truncated;
        };
        match b {
            b'0'..=b'9' => {
                num = num.saturating_mul(10).saturating_add((b - b'0') as u32);
                has_digits = true;
                i += 1;
            }
            b';' => {
                if params.len() >= 3 {
                    return CsiResult::NoMatch;
                }
                params.push(num);
                num = 0;
                has_digits = false;
                i += 1;
            }
            b'A'..=b'Z' | b'~' => {
                if has_digits || !params.is_empty() {
                    params.push(num);
                }
                i += 1;
                return resolve_csi(&params, b, i);
            }
            _ => return CsiResult::NoMatch,
        }
    }
}

fn resolve_csi(params: &[u32], final_byte: u8, consumed: usize) -> CsiResult {
    match (params, final_byte) {
        ([], b'Z') => CsiResult::Matched(consumed, KeyToken::Named(NamedKey::Tab), ModMask::SHIFT),
        ([], letter) => match named_for_letter(letter) {
            Some(k) => CsiResult::Matched(consumed, KeyToken::Named(k), ModMask::empty()),
            None => CsiResult::NoMatch,
        },
        ([n], b'~') => match named_for_tilde(*n) {
            Some(k) => CsiResult::Matched(consumed, KeyToken::Named(k), ModMask::empty()),
            None => CsiResult::NoMatch,
        },
        ([1, m], letter) => match (named_for_letter(letter), decode_modifiers(*m)) {
            (Some(k), Some(mods)) => CsiResult::Matched(consumed, KeyToken::Named(k), mods),
            _ => CsiResult::NoMatch,
        },
        ([n, m], b'~') => match (named_for_tilde(*n), decode_modifiers(*m)) {
            (Some(k), Some(mods)) => CsiResult::Matched(consumed, KeyToken::Named(k), mods),
            _ => CsiResult::NoMatch,
        },
        _ => CsiResult::NoMatch,
    }
}

/// Parses the byte after `ESC O` (SS3: arrows/Home/End/F1-F4 in
/// application-keypad mode).
fn parse_ss3(bytes: &[u8]) -> CsiResult {
    let Some(&b) = bytes.first() else {
        return CsiResult::Truncated;
    };
    match named_for_letter(b) {
        Some(k) => CsiResult::Matched(1, KeyToken::Named(k), ModMask::empty()),
        None => CsiResult::NoMatch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plain_char() {
        let mut d = Decoder::new();
        match d.step(b"a") {
            DecodeOutcome::Event(1, InputEvent::KeyPress(ev)) => {
                assert_eq!(ev.token, KeyToken::Char('a'));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_control_char_as_ctrl_chord() {
        let mut d = Decoder::new();
        match d.step(&[0x04]) {
            DecodeOutcome::Event(1, InputEvent::KeyPress(ev)) => {
                assert_eq!(ev.token, KeyToken::Chord { base: Box::new(KeyToken::Char('D')), mods: ModMask::CTRL });
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_arrow_key() {
        let mut d = Decoder::new();
        match d.step(b"\x1b[A") {
            DecodeOutcome::Event(3, InputEvent::KeyPress(ev)) => {
                assert_eq!(ev.token, KeyToken::Named(NamedKey::Up));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_modified_arrow_key() {
        let mut d = Decoder::new();
        // Ctrl+Right: ESC [ 1 ; 5 C
        match d.step(b"\x1b[1;5C") {
            DecodeOutcome::Event(6, InputEvent::KeyPress(ev)) => {
                assert_eq!(ev.token, KeyToken::Chord { base: Box::new(KeyToken::Named(NamedKey::Right)), mods: ModMask::CTRL });
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn decodes_tilde_function_key() {
        let mut d = Decoder::new();
        match d.step(b"\x1b[5~") {
            DecodeOutcome::Event(4, InputEvent::KeyPress(ev)) => {
                assert_eq!(ev.token, KeyToken::Named(NamedKey::PageUp));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn truncated_csi_requests_more_input() {
        let mut d = Decoder::new();
        assert_eq!(d.step(b"\x1b[1;5"), DecodeOutcome::NeedMoreInput);
    }

    #[test]
    fn bare_esc_requests_more_input_for_timeout_disambiguation() {
        let mut d = Decoder::new();
        assert_eq!(d.step(b"\x1b"), DecodeOutcome::NeedMoreInput);
    }

    #[test]
    fn esc_plus_one_byte_becomes_meta_chord() {
        let mut d = Decoder::new();
        match d.step(b"\x1bx") {
            DecodeOutcome::Event(2, InputEvent::KeyPress(ev)) => {
                assert_eq!(ev.token, KeyToken::Chord { base: Box::new(KeyToken::Char('x')), mods: ModMask::META });
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn bulk_printable_run_becomes_text_commit() {
        let mut d = Decoder::new();
        match d.step(b"hello world") {
            DecodeOutcome::Event(11, InputEvent::TextCommit(s)) => assert_eq!(s, "hello world"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn bracketed_paste_frames_start_chunk_end() {
        let mut d = Decoder::new();
        assert_eq!(d.step(b"\x1b[200~"), DecodeOutcome::Event(6, InputEvent::PasteStart));
        match d.step(b"hi\x1b[201~") {
            DecodeOutcome::Event(2, InputEvent::PasteChunk(s)) => assert_eq!(s, "hi"),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(d.step(b"\x1b[201~"), DecodeOutcome::Event(6, InputEvent::PasteEnd));
    }
}

//! Buffer storage and the change-graph undo/redo engine.
//!
//! `core-state` owns [`Buffer`] (a block list plus its change graph) and
//! [`EditorState`], which holds the open buffer collection. Cursor/view
//! concerns (multiple windows onto one buffer, scrolling, selection) live in
//! `core-model`; command dispatch lives in `core-actions`.

pub mod buffer;
pub mod change;

pub use buffer::Buffer;
pub use change::{Change, ChangeGraph, ChangeId, ChangeKind};

use std::collections::BTreeMap;
use tracing::info;

/// Arena index of an open [`Buffer`] within an [`EditorState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufferId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Unix,
    Dos,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Unix => "\n",
            LineEnding::Dos => "\r\n",
        }
    }

    /// Detect the dominant line ending in `data` by counting `\r\n` against
    /// bare `\n`; ties and empty input default to Unix.
    pub fn detect(data: &[u8]) -> Self {
        let mut crlf = 0usize;
        let mut lf = 0usize;
        let mut prev_cr = false;
        for &b in data {
            if b == b'\n' {
                if prev_cr {
                    crlf += 1;
                } else {
                    lf += 1;
                }
            }
            prev_cr = b == b'\r';
        }
        if crlf > lf {
            LineEnding::Dos
        } else {
            LineEnding::Unix
        }
    }
}

/// A buffer plus the metadata `core-state` tracks about it independent of
/// view/cursor state: display name, detected line ending, read-only flag.
#[derive(Debug)]
pub struct OpenBuffer {
    pub buffer: Buffer,
    pub line_ending: LineEnding,
    pub read_only: bool,
}

impl OpenBuffer {
    pub fn from_bytes(filename: Option<String>, data: &[u8]) -> Self {
        let line_ending = LineEnding::detect(data);
        let mut buffer = Buffer::from_bytes(data);
        buffer.filename = filename;
        OpenBuffer {
            buffer,
            line_ending,
            read_only: false,
        }
    }
}

/// The set of open buffers. Owns no view/cursor state; `core-model` holds
/// `BufferId` handles into this collection.
#[derive(Debug, Default)]
pub struct EditorState {
    buffers: BTreeMap<u32, OpenBuffer>,
    next_id: u32,
}

impl EditorState {
    pub fn new() -> Self {
        EditorState::default()
    }

    pub fn open(&mut self, filename: Option<String>, data: &[u8]) -> BufferId {
        let id = BufferId(self.next_id);
        self.next_id += 1;
        info!(?filename, bytes = data.len(), "opening buffer");
        self.buffers.insert(id.0, OpenBuffer::from_bytes(filename, data));
        id
    }

    pub fn close(&mut self, id: BufferId) -> Option<OpenBuffer> {
        self.buffers.remove(&id.0)
    }

    pub fn get(&self, id: BufferId) -> Option<&OpenBuffer> {
        self.buffers.get(&id.0)
    }

    pub fn get_mut(&mut self, id: BufferId) -> Option<&mut OpenBuffer> {
        self.buffers.get_mut(&id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (BufferId, &OpenBuffer)> {
        self.buffers.iter().map(|(&id, b)| (BufferId(id), b))
    }

    pub fn any_modified(&self) -> bool {
        self.buffers.values().any(|b| b.buffer.changes.is_modified())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_dos_line_ending() {
        assert_eq!(LineEnding::detect(b"a\r\nb\r\n"), LineEnding::Dos);
        assert_eq!(LineEnding::detect(b"a\nb\n"), LineEnding::Unix);
        assert_eq!(LineEnding::detect(b""), LineEnding::Unix);
    }

    #[test]
    fn editor_state_tracks_modification() {
        let mut state = EditorState::new();
        let id = state.open(Some("a.txt".into()), b"hello\n");
        assert!(!state.any_modified());
        state.get_mut(id).unwrap().buffer.insert(5, b"!", true);
        assert!(state.any_modified());
    }
}

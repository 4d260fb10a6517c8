//! Buffer: a block list plus its change graph, and the edit primitives that
//! keep the two in sync. Ported from `dte`'s `edit.c` (`do_insert`,
//! `do_delete`, `do_replace`, `insert_bytes`, `insert_to_current`).

use core_text::{split_into_blocks, BlockId, BlockIter, BlockList};
use tracing::trace;

use crate::change::{Change, ChangeGraph, ChangeKind};

#[derive(Debug)]
pub struct Buffer {
    pub blocks: BlockList,
    pub changes: ChangeGraph,
    pub filename: Option<String>,
    /// Smallest and largest line numbers touched since the last full
    /// rehighlight/redraw, inclusive; `None` means nothing changed.
    pub changed_lines: Option<(usize, usize)>,
}

impl Default for Buffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Buffer {
    pub fn new() -> Self {
        Buffer {
            blocks: BlockList::new(),
            changes: ChangeGraph::new(),
            filename: None,
            changed_lines: None,
        }
    }

    pub fn from_bytes(data: &[u8]) -> Self {
        let mut buf = Buffer::new();
        if !data.is_empty() {
            let head = buf.blocks.head();
            for piece in split_into_blocks(data) {
                buf.blocks.insert_before(head, piece.to_vec());
            }
            if buf.blocks.len() > 1 {
                buf.blocks.free(head);
            }
        }
        buf.blocks.check_invariants();
        buf
    }

    pub fn len(&self) -> usize {
        self.blocks.to_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_single_empty_block()
    }

    fn mark_changed(&mut self, line: usize) {
        self.changed_lines = Some(match self.changed_lines {
            Some((lo, hi)) => (lo.min(line), hi.max(line)),
            None => (line, line),
        });
    }

    /// Insert `data` at `offset`, recording an undo entry. Splits `data`
    /// into newline-bounded pieces the same way the block list's own
    /// invariant requires, and merges a short insert into whichever
    /// existing block it lands inside when the result would still fit
    /// under [`core_text::BLOCK_EDIT_SIZE`] — mirroring `insert_to_current`
    /// — falling back to splicing in fresh blocks for longer inserts.
    pub fn insert(&mut self, offset: usize, data: &[u8], move_after: bool) {
        if data.is_empty() {
            return;
        }
        self.do_insert(offset, data);
        self.changes.record_insert(offset, data, move_after);
        trace!(offset, len = data.len(), "buffer insert");
    }

    fn do_insert(&mut self, offset: usize, data: &[u8]) {
        let mut it = BlockIter::from_offset(&self.blocks, offset);
        it.normalize(&self.blocks);
        let blk = it.blk;
        let at = it.offset;
        let existing = &self.blocks.get(blk).data;

        if existing.len() + data.len() <= core_text::BLOCK_EDIT_SIZE || !data.contains(&b'\n') {
            let new_data = splice(existing, at, &[], data);
            if !new_data.contains(&b'\n') || new_data.len() <= core_text::BLOCK_EDIT_SIZE {
                let block = self.blocks.get_mut(blk);
                block.nl = core_text::count_newlines(&new_data);
                block.data = new_data;
                self.blocks.check_invariants();
                return;
            }
        }
        // Fall back: rebuild this block's content plus the insertion as a
        // fresh run of newline-bounded pieces spliced in before `blk`.
        let merged = splice(existing, at, &[], data);
        let pieces: Vec<Vec<u8>> = split_into_blocks(&merged).into_iter().map(|p| p.to_vec()).collect();
        for piece in pieces {
            self.blocks.insert_before(blk, piece);
        }
        if self.blocks.len() > 1 {
            self.blocks.free(blk);
        }
        self.blocks.check_invariants();
    }

    /// Delete `count` bytes starting at `offset`, recording the deleted
    /// bytes for undo.
    pub fn delete(&mut self, offset: usize, count: usize) -> Vec<u8> {
        if count == 0 {
            return Vec::new();
        }
        let deleted = self.do_delete(offset, count);
        self.changes.record_delete(offset, deleted.clone());
        trace!(offset, count, "buffer delete");
        deleted
    }

    fn do_delete(&mut self, offset: usize, count: usize) -> Vec<u8> {
        let mut removed = Vec::with_capacity(count);
        let mut remaining = count;
        let mut it = BlockIter::from_offset(&self.blocks, offset);
        it.normalize(&self.blocks);

        while remaining > 0 {
            let blk = it.blk;
            let size = self.blocks.get(blk).size();
            let avail = size - it.offset;
            if avail == 0 {
                break; // EOF
            }
            let take = remaining.min(avail);
            let data = &self.blocks.get(blk).data;
            removed.extend_from_slice(&data[it.offset..it.offset + take]);
            let new_data = splice(data, it.offset, &data[it.offset..it.offset + take].to_vec(), &[]);
            let still_has_content = !new_data.is_empty();
            if still_has_content || self.blocks.len() == 1 {
                let block = self.blocks.get_mut(blk);
                block.nl = core_text::count_newlines(&new_data);
                block.data = new_data;
                it.offset = it.offset.min(self.blocks.get(blk).size());
            } else {
                let next = self.blocks.next(blk);
                self.blocks.free(blk);
                it = match next {
                    Some(n) => BlockIter { blk: n, offset: 0 },
                    None => BlockIter::at_tail(&self.blocks),
                };
            }
            remaining -= take;
        }
        self.blocks.check_invariants();
        removed
    }

    /// Replace `del_count` bytes at `offset` with `data`, as one atomic
    /// change-graph entry (`buffer_replace_bytes`).
    pub fn replace(&mut self, offset: usize, del_count: usize, data: &[u8]) {
        let deleted = if del_count > 0 {
            self.do_delete(offset, del_count)
        } else {
            Vec::new()
        };
        if !data.is_empty() {
            self.do_insert(offset, data);
        }
        self.changes.record_replace(offset, deleted, data.to_vec());
    }

    /// Undo the most recent change, returning the buffer offset the cursor
    /// should move to.
    pub fn undo(&mut self) -> Option<usize> {
        let (change, _) = self.changes.undo()?;
        self.reverse(&change);
        Some(if change.move_after {
            change.offset
        } else {
            change.offset + change.ins_count()
        })
    }

    /// Redo the change on branch `which` (0 = most recent), returning the
    /// buffer offset the cursor should move to.
    pub fn redo(&mut self, which: usize) -> Option<usize> {
        let (change, _) = self.changes.redo(which)?;
        self.apply_forward(&change);
        Some(if change.move_after {
            change.offset + change.ins_count()
        } else {
            change.offset
        })
    }

    /// Re-apply a change in its original (forward) direction, as redo does.
    fn apply_forward(&mut self, change: &Change) {
        match change.kind {
            ChangeKind::Insert => {
                self.do_insert(change.offset, &change.inserted);
            }
            ChangeKind::Delete => {
                self.do_delete(change.offset, change.del_count());
            }
            ChangeKind::Replace => {
                self.do_delete(change.offset, change.del_count());
                self.do_insert(change.offset, &change.inserted);
            }
        }
    }

    /// Undo a change by applying its inverse.
    fn reverse(&mut self, change: &Change) {
        match change.kind {
            ChangeKind::Insert => {
                self.do_delete(change.offset, change.ins_count());
            }
            ChangeKind::Delete => {
                self.do_insert(change.offset, &change.deleted);
            }
            ChangeKind::Replace => {
                self.do_delete(change.offset, change.ins_count());
                self.do_insert(change.offset, &change.deleted);
            }
        }
    }

    pub fn line_count(&self) -> usize {
        self.blocks.total_newlines().max(1)
    }

    pub fn block_at(&self, offset: usize) -> BlockId {
        BlockIter::from_offset(&self.blocks, offset).blk
    }
}

/// Remove `old` (if non-empty, assumed already present at `data[at..]`) and
/// insert `new` at `at`, returning the spliced byte vector.
fn splice(data: &[u8], at: usize, old: &[u8], new: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() - old.len() + new.len());
    out.extend_from_slice(&data[..at]);
    out.extend_from_slice(new);
    out.extend_from_slice(&data[at + old.len()..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_then_delete_round_trips() {
        let mut buf = Buffer::from_bytes(b"hello\nworld\n");
        buf.insert(5, b" there", true);
        assert_eq!(buf.blocks.to_bytes(), b"hello there\nworld\n");
        buf.delete(5, 6);
        assert_eq!(buf.blocks.to_bytes(), b"hello\nworld\n");
    }

    #[test]
    fn undo_restores_previous_content() {
        let mut buf = Buffer::from_bytes(b"abc\n");
        buf.insert(3, b"def", true);
        assert_eq!(buf.blocks.to_bytes(), b"abcdef\n");
        buf.undo();
        assert_eq!(buf.blocks.to_bytes(), b"abc\n");
    }

    #[test]
    fn replace_is_atomic() {
        let mut buf = Buffer::from_bytes(b"abcdef\n");
        buf.replace(1, 2, b"XY");
        assert_eq!(buf.blocks.to_bytes(), b"aXYdef\n");
        buf.undo();
        assert_eq!(buf.blocks.to_bytes(), b"abcdef\n");
    }

    #[test]
    fn long_insert_splits_across_blocks() {
        let mut buf = Buffer::new();
        let long_line = "x".repeat(core_text::BLOCK_EDIT_SIZE * 3);
        let mut data = long_line.into_bytes();
        data.push(b'\n');
        buf.insert(0, &data, true);
        assert_eq!(buf.blocks.to_bytes(), data);
        buf.blocks.check_invariants();
    }
}

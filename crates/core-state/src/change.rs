//! Change graph: a DAG of edit records used for undo/redo.
//!
//! Ported from `dte`'s `change.c`. Every mutation to a buffer's block list is
//! first recorded as a [`Change`] node hung off the "current" node
//! (`cur_change`). Undo walks up to a node's parent; redo walks back down to
//! a child. Because redo can fork (undo, then make a different edit), a node
//! may have more than one child — redo is then ambiguous and the caller must
//! pick which child to replay, mirroring the C original's last-child-wins
//! default with an explicit override for "redo nth branch".
//!
//! Adjacent edits of the same kind, not separated by a [`begin_chain`] /
//! [`end_chain`] barrier, are merged into the existing top-of-graph node
//! instead of allocating a new one - this is what makes a typing burst undo
//! as a single unit while a delete-then-retype does not merge across the
//! Escape-key boundary.

/// Arena index of a [`Change`] node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangeId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Delete,
    /// A delete immediately followed by an insert at the same offset
    /// (`buffer_replace_bytes`), recorded atomically so undo restores both
    /// sides in one step.
    Replace,
}

#[derive(Debug, Clone)]
pub struct Change {
    pub kind: ChangeKind,
    /// Absolute byte offset in the buffer where the edit begins.
    pub offset: usize,
    /// Bytes inserted at `offset` by this change (redo replays these).
    /// Empty for a pure delete.
    pub inserted: Vec<u8>,
    /// Bytes deleted at `offset` by this change, prior to any insert (undo
    /// replays these). Empty for a pure insert.
    pub deleted: Vec<u8>,
    /// If true, the cursor should land after the change on redo and before
    /// it on undo (set for edits the user made while moving forward, e.g.
    /// typing); if false, the cursor stays pinned to `offset` both ways.
    pub move_after: bool,
    parent: Option<ChangeId>,
    children: Vec<ChangeId>,
    /// True for a barrier node: an empty placeholder that `begin_chain`
    /// pushes so no later edit can merge across it.
    pub is_barrier: bool,
}

impl Change {
    pub fn ins_count(&self) -> usize {
        self.inserted.len()
    }

    pub fn del_count(&self) -> usize {
        self.deleted.len()
    }

    fn leaf(kind: ChangeKind, offset: usize, inserted: Vec<u8>, deleted: Vec<u8>, move_after: bool) -> Self {
        Change {
            kind,
            offset,
            inserted,
            deleted,
            move_after,
            parent: None,
            children: Vec::new(),
            is_barrier: false,
        }
    }

    fn barrier(offset: usize) -> Self {
        Change {
            kind: ChangeKind::Insert,
            offset,
            inserted: Vec::new(),
            deleted: Vec::new(),
            move_after: false,
            parent: None,
            children: Vec::new(),
            is_barrier: true,
        }
    }
}

/// The DAG rooted at a sentinel node representing "no edits yet". `cur` is
/// the node the buffer's current content matches; `saved` is the node that
/// was current when the buffer was last written to disk, used to decide
/// whether the buffer is modified.
#[derive(Debug, Clone)]
pub struct ChangeGraph {
    nodes: Vec<Change>,
    root: ChangeId,
    cur: ChangeId,
    saved: Option<ChangeId>,
}

impl Default for ChangeGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeGraph {
    pub fn new() -> Self {
        let root = Change::barrier(0);
        let graph = ChangeGraph {
            nodes: vec![root],
            root: ChangeId(0),
            cur: ChangeId(0),
            saved: Some(ChangeId(0)),
        };
        graph
    }

    #[inline]
    fn get(&self, id: ChangeId) -> &Change {
        &self.nodes[id.0 as usize]
    }

    #[inline]
    fn get_mut(&mut self, id: ChangeId) -> &mut Change {
        &mut self.nodes[id.0 as usize]
    }

    pub fn cur(&self) -> ChangeId {
        self.cur
    }

    pub fn is_modified(&self) -> bool {
        self.saved != Some(self.cur)
    }

    pub fn mark_saved(&mut self) {
        self.saved = Some(self.cur);
    }

    fn push_child(&mut self, change: Change) -> ChangeId {
        let id = ChangeId(self.nodes.len() as u32);
        self.nodes.push(change);
        self.get_mut(id).parent = Some(self.cur);
        self.get_mut(self.cur).children.push(id);
        self.cur = id;
        id
    }

    /// Push a barrier so that no later edit merges backward across this
    /// point, then return its id. Used to bracket a sequence of edits
    /// (e.g. a single keymap-triggered multi-step command) as one atomic
    /// chain for undo purposes — the barrier itself is never visited by
    /// undo/redo, only skipped over.
    pub fn begin_chain(&mut self) {
        let offset = self.cur_offset();
        self.push_child(Change::barrier(offset));
    }

    /// No-op counterpart to [`begin_chain`] kept for symmetry with the C
    /// original's `begin_change_chain`/`end_change_chain` pair; chains in
    /// this model are delimited purely by the barrier node itself.
    pub fn end_chain(&self) {}

    fn cur_offset(&self) -> usize {
        self.get(self.cur).offset + self.get(self.cur).ins_count()
    }

    /// Record an insert of `data` at `offset`, merging into the current node
    /// if it is an adjacent, non-barrier insert.
    pub fn record_insert(&mut self, offset: usize, data: &[u8], move_after: bool) {
        let cur = self.get(self.cur);
        let mergeable = !cur.is_barrier
            && cur.kind == ChangeKind::Insert
            && cur.del_count() == 0
            && cur.offset + cur.ins_count() == offset;
        if mergeable {
            self.get_mut(self.cur).inserted.extend_from_slice(data);
            self.get_mut(self.cur).move_after = move_after;
            return;
        }
        self.push_child(Change::leaf(ChangeKind::Insert, offset, data.to_vec(), Vec::new(), move_after));
    }

    /// Record a delete of `deleted` bytes at `offset`. Subsequent deletes at
    /// a fixed offset (forward delete, e.g. repeated `Delete` key) merge by
    /// appending, and deletes that each land where the previous one started
    /// (backward delete, e.g. repeated Backspace) merge by prepending.
    pub fn record_delete(&mut self, offset: usize, deleted: Vec<u8>) {
        let cur_id = self.cur;
        let cur = self.get(cur_id);
        if !cur.is_barrier && cur.kind == ChangeKind::Delete {
            if cur.offset == offset {
                // forward delete: new bytes were removed right after offset
                self.get_mut(cur_id).deleted.extend_from_slice(&deleted);
                return;
            }
            if offset + deleted.len() == cur.offset {
                // backward delete (backspace): prepend
                let mut merged = deleted;
                merged.extend_from_slice(&self.get(cur_id).deleted);
                self.get_mut(cur_id).deleted = merged;
                self.get_mut(cur_id).offset = offset;
                return;
            }
        }
        self.push_child(Change::leaf(ChangeKind::Delete, offset, Vec::new(), deleted, false));
    }

    /// Record a replace (delete then insert at the same offset) as one
    /// atomic node; replaces never merge with a neighbor.
    pub fn record_replace(&mut self, offset: usize, deleted: Vec<u8>, inserted: Vec<u8>) {
        self.push_child(Change::leaf(ChangeKind::Replace, offset, inserted, deleted, true));
    }

    /// Step to the parent of `cur`, returning the change to reverse and the
    /// node undo landed on, or `None` at the root (nothing left to undo).
    pub fn undo(&mut self) -> Option<(Change, ChangeId)> {
        let mut id = self.cur;
        loop {
            let node = self.get(id);
            let parent = node.parent?;
            if node.is_barrier {
                id = parent;
                continue;
            }
            let change = node.clone();
            self.cur = parent;
            return Some((change, id));
        }
    }

    /// Step to a child of `cur`. `which` selects among multiple children
    /// when redo is ambiguous (0 = most recently created branch, matching
    /// the C original's default of replaying the latest fork). Returns the
    /// change to replay and the node redo landed on.
    pub fn redo(&mut self, which: usize) -> Option<(Change, ChangeId)> {
        let mut id = self.cur;
        loop {
            let node = self.get(id);
            let children = &node.children;
            if children.is_empty() {
                return None;
            }
            let idx = children.len() - 1 - which.min(children.len() - 1);
            let child_id = children[idx];
            let child = self.get(child_id).clone();
            if child.is_barrier {
                id = child_id;
                continue;
            }
            self.cur = child_id;
            return Some((child, child_id));
        }
    }

    /// Number of sibling branches available for redo from the current node
    /// (after skipping barriers), used by callers that want to prompt for
    /// "which redo branch" when it's greater than one.
    pub fn redo_branch_count(&self) -> usize {
        let mut id = self.cur;
        loop {
            let node = self.get(id);
            if node.children.is_empty() {
                return 0;
            }
            if node.children.len() == 1 && self.get(node.children[0]).is_barrier {
                id = node.children[0];
                continue;
            }
            return node.children.len();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_inserts_merge() {
        let mut g = ChangeGraph::new();
        g.record_insert(0, 3, true);
        g.record_insert(3, 2, true);
        assert_eq!(g.get(g.cur()).ins_count(), 5);
    }

    #[test]
    fn barrier_blocks_merge() {
        let mut g = ChangeGraph::new();
        g.record_insert(0, 3, true);
        g.begin_chain();
        g.record_insert(3, 2, true);
        assert_eq!(g.get(g.cur()).ins_count(), 2);
    }

    #[test]
    fn backward_deletes_merge_by_prepending() {
        let mut g = ChangeGraph::new();
        g.record_delete(5, b"c".to_vec());
        g.record_delete(4, b"b".to_vec());
        g.record_delete(3, b"a".to_vec());
        let cur = g.get(g.cur());
        assert_eq!(cur.deleted, b"abc");
        assert_eq!(cur.offset, 3);
    }

    #[test]
    fn undo_then_redo_round_trips() {
        let mut g = ChangeGraph::new();
        g.record_insert(0, 3, true);
        assert!(g.is_modified());
        let (change, _) = g.undo().unwrap();
        assert_eq!(change.ins_count(), 3);
        assert!(!g.is_modified());
        let (redone, _) = g.redo(0).unwrap();
        assert_eq!(redone.ins_count(), 3);
        assert!(g.is_modified());
    }

    #[test]
    fn redo_is_ambiguous_after_fork() {
        let mut g = ChangeGraph::new();
        g.record_insert(0, 3, true);
        g.undo();
        g.record_insert(0, 4, true); // different branch
        g.undo();
        assert_eq!(g.redo_branch_count(), 2);
    }
}

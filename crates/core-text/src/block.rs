//! Block store: an arena of byte blocks threaded into a doubly linked list.
//!
//! Ported from `dte`'s `block.c`/`block.h`. The original keeps blocks as
//! nodes in an intrusive linked list reached through raw pointers; Rust
//! expresses the same topology as an arena (`Vec<Block>`) addressed by
//! [`BlockId`] indices, with explicit `prev`/`next` links and a free list for
//! reuse after a block is freed (Design Note: arena-based block list).
//!
//! Invariants (checked by [`BlockList::check_invariants`] in debug builds):
//! - Every block in a non-empty list has `size > 0` and `data` ends with `\n`.
//! - `nl` equals the number of `b'\n'` bytes in `data`.
//! - A buffer with no text has exactly one block, of size 0.

/// Capacity granularity: allocations always round up to a multiple of this.
pub const BLOCK_ALLOC_MULTIPLE: usize = 64;

/// Preferred maximum block size after a split. A single over-long line may
/// still produce a larger block.
pub const BLOCK_EDIT_SIZE: usize = 512;

#[inline]
pub fn round_up(size: usize, multiple: usize) -> usize {
    size.div_ceil(multiple) * multiple
}

pub fn count_newlines(data: &[u8]) -> usize {
    data.iter().filter(|&&b| b == b'\n').count()
}

/// Index of a [`Block`] inside a [`BlockList`]'s arena. Never `usize::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    const NONE: BlockId = BlockId(u32::MAX);

    #[inline]
    fn is_none(self) -> bool {
        self.0 == u32::MAX
    }
}

#[derive(Debug, Clone)]
pub struct Block {
    pub data: Vec<u8>,
    pub nl: usize,
    prev: BlockId,
    next: BlockId,
    /// `true` while this slot is live; freed slots are recycled via
    /// `BlockList::free_slots` and must never be traversed.
    alive: bool,
}

impl Block {
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// A doubly linked list of [`Block`]s, with a head/tail anchor and an arena
/// backing store. `BlockId`s are stable across insertions (never reused
/// while live) but a freed slot may be recycled by a later `new_block`.
#[derive(Debug, Clone)]
pub struct BlockList {
    arena: Vec<Block>,
    free_slots: Vec<u32>,
    head: BlockId,
    tail: BlockId,
    len: usize,
}

impl Default for BlockList {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockList {
    /// A fresh list holding the single empty block required for an empty
    /// buffer.
    pub fn new() -> Self {
        let mut list = BlockList {
            arena: Vec::new(),
            free_slots: Vec::new(),
            head: BlockId::NONE,
            tail: BlockId::NONE,
            len: 0,
        };
        let id = list.alloc_block(0);
        list.head = id;
        list.tail = id;
        list.len = 1;
        list
    }

    fn alloc_block(&mut self, hint_capacity: usize) -> BlockId {
        let block = Block {
            data: Vec::with_capacity(round_up(hint_capacity, BLOCK_ALLOC_MULTIPLE)),
            nl: 0,
            prev: BlockId::NONE,
            next: BlockId::NONE,
            alive: true,
        };
        if let Some(slot) = self.free_slots.pop() {
            self.arena[slot as usize] = block;
            BlockId(slot)
        } else {
            self.arena.push(block);
            BlockId((self.arena.len() - 1) as u32)
        }
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> &Block {
        debug_assert!(self.arena[id.0 as usize].alive);
        &self.arena[id.0 as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, id: BlockId) -> &mut Block {
        debug_assert!(self.arena[id.0 as usize].alive);
        &mut self.arena[id.0 as usize]
    }

    #[inline]
    pub fn head(&self) -> BlockId {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> BlockId {
        self.tail
    }

    #[inline]
    pub fn next(&self, id: BlockId) -> Option<BlockId> {
        let n = self.arena[id.0 as usize].next;
        (!n.is_none()).then_some(n)
    }

    #[inline]
    pub fn prev(&self, id: BlockId) -> Option<BlockId> {
        let p = self.arena[id.0 as usize].prev;
        (!p.is_none()).then_some(p)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_single_empty_block(&self) -> bool {
        self.len == 1 && self.get(self.head).size() == 0
    }

    /// Insert a fresh block with data `data` immediately before `before`.
    /// Returns the new block's id.
    pub fn insert_before(&mut self, before: BlockId, data: Vec<u8>) -> BlockId {
        let nl = count_newlines(&data);
        let id = self.alloc_block(data.len());
        self.get_mut(id).data = data;
        self.get_mut(id).nl = nl;

        let prev = self.prev(before);
        self.arena[id.0 as usize].prev = prev.unwrap_or(BlockId::NONE);
        self.arena[id.0 as usize].next = before;
        match prev {
            Some(p) => self.arena[p.0 as usize].next = id,
            None => self.head = id,
        }
        self.arena[before.0 as usize].prev = id;
        self.len += 1;
        id
    }

    /// Detach and free `id`. Caller must ensure `id` is not the sole block of
    /// an otherwise-empty buffer and is not currently referenced by a live
    /// iterator that will be used afterwards without repositioning.
    pub fn free(&mut self, id: BlockId) {
        debug_assert!(self.len > 1, "must never free the last remaining block");
        let prev = self.prev(id);
        let next = self.next(id);
        match prev {
            Some(p) => self.arena[p.0 as usize].next = next.unwrap_or(BlockId::NONE),
            None => self.head = next.unwrap_or(BlockId::NONE),
        }
        match next {
            Some(n) => self.arena[n.0 as usize].prev = prev.unwrap_or(BlockId::NONE),
            None => self.tail = prev.unwrap_or(BlockId::NONE),
        }
        self.arena[id.0 as usize].alive = false;
        self.arena[id.0 as usize].data = Vec::new();
        self.free_slots.push(id.0);
        self.len -= 1;
    }

    pub fn iter_ids(&self) -> BlockIdIter<'_> {
        BlockIdIter {
            list: self,
            cur: (!self.head.is_none()).then_some(self.head),
        }
    }

    /// Concatenate the whole buffer into one owned byte vector. Used by
    /// tests and by whole-buffer write-out.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for id in self.iter_ids() {
            out.extend_from_slice(&self.get(id).data);
        }
        out
    }

    pub fn total_newlines(&self) -> usize {
        self.iter_ids().map(|id| self.get(id).nl).sum()
    }

    #[cfg(debug_assertions)]
    pub fn check_invariants(&self) {
        if self.is_single_empty_block() {
            return;
        }
        let mut seen_tail = None;
        for id in self.iter_ids() {
            let b = self.get(id);
            assert!(b.size() > 0, "non-singleton block must be non-empty");
            assert_eq!(
                b.data.last().copied(),
                Some(b'\n'),
                "every block must end with a newline"
            );
            assert_eq!(
                b.nl,
                count_newlines(&b.data),
                "cached nl must match actual newline count"
            );
            seen_tail = Some(id);
        }
        assert_eq!(seen_tail, Some(self.tail));
    }

    #[cfg(not(debug_assertions))]
    #[inline]
    pub fn check_invariants(&self) {}
}

pub struct BlockIdIter<'a> {
    list: &'a BlockList,
    cur: Option<BlockId>,
}

impl Iterator for BlockIdIter<'_> {
    type Item = BlockId;
    fn next(&mut self) -> Option<BlockId> {
        let id = self.cur?;
        self.cur = self.list.next(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_list_is_single_empty_block() {
        let list = BlockList::new();
        assert_eq!(list.len(), 1);
        assert!(list.is_single_empty_block());
        list.check_invariants();
    }

    #[test]
    fn insert_and_free_preserve_links() {
        let mut list = BlockList::new();
        let head = list.head();
        let a = list.insert_before(head, b"a\n".to_vec());
        let b = list.insert_before(head, b"b\n".to_vec());
        // order: a, b, head(empty)
        assert_eq!(list.head(), a);
        assert_eq!(list.next(a), Some(b));
        assert_eq!(list.next(b), Some(head));
        assert_eq!(list.prev(head), Some(b));
        assert_eq!(list.tail(), head);

        list.free(head);
        assert_eq!(list.tail(), b);
        assert_eq!(list.next(b), None);
    }

    #[test]
    fn round_up_multiples_of_64() {
        assert_eq!(round_up(0, 64), 0);
        assert_eq!(round_up(1, 64), 64);
        assert_eq!(round_up(64, 64), 64);
        assert_eq!(round_up(65, 64), 128);
    }
}

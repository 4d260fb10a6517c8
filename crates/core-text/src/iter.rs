//! Block iterator: a cursor addressed as `(block, byte-offset within block)`,
//! ported from `dte`'s `BlockIter` (`block-iter.h`/`.c`). All buffer-relative
//! motions (character, line, offset conversion) are built on top of the two
//! primitive step operations [`BlockIter::next_byte`] / [`BlockIter::prev_byte`].

use crate::block::{BlockId, BlockList};
use crate::unicode::{self, Codepoint};

/// A position inside a [`BlockList`]: the block holding the byte, plus a
/// byte offset within that block's data. `offset == block.size()` is a valid
/// "at end of block" position, equal to `(next_block, 0)` when a next block
/// exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockIter {
    pub blk: BlockId,
    pub offset: usize,
}

impl BlockIter {
    pub fn at_head(list: &BlockList) -> Self {
        BlockIter {
            blk: list.head(),
            offset: 0,
        }
    }

    pub fn at_tail(list: &BlockList) -> Self {
        BlockIter {
            blk: list.tail(),
            offset: list.get(list.tail()).size(),
        }
    }

    /// Normalize `offset == block.size()` to `(next_block, 0)` when possible,
    /// mirroring `block_iter_normalize` so two logically equal positions
    /// always compare equal.
    pub fn normalize(&mut self, list: &BlockList) {
        while self.offset == list.get(self.blk).size() {
            match list.next(self.blk) {
                Some(next) => {
                    self.blk = next;
                    self.offset = 0;
                }
                None => break,
            }
        }
    }

    pub fn is_eof(&self, list: &BlockList) -> bool {
        list.next(self.blk).is_none() && self.offset == list.get(self.blk).size()
    }

    pub fn is_bof(&self, list: &BlockList) -> bool {
        list.prev(self.blk).is_none() && self.offset == 0
    }

    /// Absolute byte offset from the start of the buffer.
    pub fn to_offset(&self, list: &BlockList) -> usize {
        let mut total = 0;
        let mut cur = list.head();
        loop {
            if cur == self.blk {
                return total + self.offset;
            }
            total += list.get(cur).size();
            cur = list.next(cur).expect("blk must be reachable from head");
        }
    }

    /// Build an iterator from an absolute byte offset. `O(blocks)`.
    pub fn from_offset(list: &BlockList, mut offset: usize) -> Self {
        let mut cur = list.head();
        loop {
            let size = list.get(cur).size();
            if offset <= size {
                if offset == size {
                    if let Some(next) = list.next(cur) {
                        return BlockIter { blk: next, offset: 0 };
                    }
                }
                return BlockIter { blk: cur, offset };
            }
            offset -= size;
            cur = match list.next(cur) {
                Some(n) => n,
                None => return BlockIter { blk: cur, offset: size },
            };
        }
    }

    fn current_byte(&self, list: &BlockList) -> Option<u8> {
        list.get(self.blk).data.get(self.offset).copied()
    }

    /// Step forward one byte. Returns `false` at EOF.
    pub fn next_byte(&mut self, list: &BlockList) -> bool {
        if self.offset < list.get(self.blk).size() {
            self.offset += 1;
            self.normalize(list);
            true
        } else if let Some(next) = list.next(self.blk) {
            self.blk = next;
            self.offset = 0;
            self.normalize(list);
            true
        } else {
            false
        }
    }

    /// Step backward one byte. Returns `false` at BOF.
    pub fn prev_byte(&mut self, list: &BlockList) -> bool {
        if self.offset > 0 {
            self.offset -= 1;
            true
        } else if let Some(prev) = list.prev(self.blk) {
            self.blk = prev;
            self.offset = list.get(prev).size().saturating_sub(1);
            true
        } else {
            false
        }
    }

    /// Decode the codepoint starting at the current position, without
    /// advancing. Reads across a block boundary if needed since a multibyte
    /// sequence may straddle two blocks (blocks only guarantee a newline
    /// boundary, not a UTF-8 boundary).
    pub fn peek_codepoint(&self, list: &BlockList) -> Option<(Codepoint, usize)> {
        let bytes = self.peek_bytes(list, 4);
        if bytes.is_empty() {
            return None;
        }
        Some(unicode::decode_utf8(&bytes))
    }

    /// Collect up to `n` bytes starting at the current position, walking
    /// across block boundaries.
    pub fn peek_bytes(&self, list: &BlockList, n: usize) -> Vec<u8> {
        let mut out = Vec::with_capacity(n);
        let mut blk = self.blk;
        let mut off = self.offset;
        loop {
            if out.len() >= n {
                break;
            }
            let data = &list.get(blk).data;
            if off < data.len() {
                out.push(data[off]);
                off += 1;
            } else {
                match list.next(blk) {
                    Some(next) => {
                        blk = next;
                        off = 0;
                    }
                    None => break,
                }
            }
        }
        out
    }

    /// Advance one full codepoint. Returns the codepoint consumed, or `None`
    /// at EOF.
    pub fn next_char(&mut self, list: &BlockList) -> Option<Codepoint> {
        let (cp, len) = self.peek_codepoint(list)?;
        for _ in 0..len.max(1) {
            if !self.next_byte(list) {
                break;
            }
        }
        Some(cp)
    }

    /// Step back one full codepoint.
    pub fn prev_char(&mut self, list: &BlockList) -> Option<Codepoint> {
        if self.is_bof(list) {
            return None;
        }
        // Walk back up to 4 bytes, find the lead byte, decode forward from there.
        let mut probe = *self;
        let mut back_bytes = Vec::new();
        for _ in 0..4 {
            if !probe.prev_byte(list) {
                break;
            }
            back_bytes.push(probe);
            if let Some(b) = probe.current_byte(list) {
                let is_lead = b < 0x80 || b & 0xC0 != 0x80;
                if is_lead {
                    let (cp, len) = probe.peek_codepoint(list).unwrap_or((0, 1));
                    let consumed = back_bytes.len().min(len.max(1));
                    *self = back_bytes[consumed - 1];
                    return Some(cp);
                }
            }
        }
        // Fell off without finding a lead byte: treat as a single invalid byte.
        if let Some(last) = back_bytes.last() {
            *self = *last;
            let b = last.current_byte(list).unwrap_or(0);
            return Some(unicode::invalid_byte_codepoint(b));
        }
        None
    }

    /// Move to the first byte of the current line (scanning backward past
    /// the previous `\n`, or to BOF).
    pub fn bol(&mut self, list: &BlockList) {
        loop {
            if self.is_bof(list) {
                return;
            }
            let mut probe = *self;
            probe.prev_byte(list);
            if probe.current_byte(list) == Some(b'\n') {
                return;
            }
            *self = probe;
        }
    }

    /// Move to one past the line's trailing `\n` (or EOF if the last line is
    /// unterminated — never true for a well-formed buffer, but tolerated).
    pub fn eol(&mut self, list: &BlockList) {
        loop {
            match self.current_byte(list) {
                Some(b'\n') => {
                    self.next_byte(list);
                    return;
                }
                Some(_) => {
                    if !self.next_byte(list) {
                        return;
                    }
                }
                None => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_list(lines: &[&str]) -> BlockList {
        let mut list = BlockList::new();
        let head = list.head();
        for (i, line) in lines.iter().enumerate() {
            let mut data = line.as_bytes().to_vec();
            data.push(b'\n');
            if i == 0 {
                // replace the implicit empty head block in place by inserting
                // before it and then freeing the original if more follow.
            }
            list.insert_before(head, data);
        }
        if !lines.is_empty() && list.get(head).size() == 0 && list.len() > 1 {
            list.free(head);
        }
        list
    }

    #[test]
    fn offset_round_trip() {
        let list = make_list(&["hello", "world"]);
        for off in 0..=list.to_bytes().len() {
            let it = BlockIter::from_offset(&list, off);
            assert_eq!(it.to_offset(&list), off, "offset {off}");
        }
    }

    #[test]
    fn next_char_walks_multibyte() {
        let list = make_list(&["a界b"]);
        let mut it = BlockIter::at_head(&list);
        assert_eq!(it.next_char(&list), Some('a' as Codepoint));
        assert_eq!(it.next_char(&list), Some('界' as Codepoint));
        assert_eq!(it.next_char(&list), Some('b' as Codepoint));
        assert_eq!(it.next_char(&list), Some('\n' as Codepoint));
        assert_eq!(it.next_char(&list), None);
    }

    #[test]
    fn prev_char_mirrors_next_char() {
        let list = make_list(&["a界b"]);
        let mut it = BlockIter::at_tail(&list);
        let mut collected = Vec::new();
        while let Some(cp) = it.prev_char(&list) {
            collected.push(cp);
        }
        collected.reverse();
        let mut fwd = BlockIter::at_head(&list);
        let mut expected = Vec::new();
        while let Some(cp) = fwd.next_char(&list) {
            expected.push(cp);
        }
        assert_eq!(collected, expected);
    }

    #[test]
    fn bol_eol_find_line_boundaries() {
        let list = make_list(&["one", "two", "three"]);
        let mut it = BlockIter::from_offset(&list, 5); // inside "two"
        it.bol(&list);
        assert_eq!(it.to_offset(&list), 4); // start of "two\n"
        it.eol(&list);
        assert_eq!(it.to_offset(&list), 8); // past "two\n"
    }
}

//! Block-list text storage: the lowest layer of the editor core.
//!
//! A buffer's bytes live in a [`block::BlockList`], an arena of [`block::Block`]s
//! threaded into a doubly linked list. Positions are addressed either as an
//! absolute byte offset or as a [`iter::BlockIter`] `(block, offset)` pair;
//! the two are freely interconvertible. Nothing in this crate understands
//! undo, views, or syntax highlighting — see `core-state`, `core-model` and
//! `core-syntax` respectively.

pub mod block;
pub mod iter;
pub mod segment;
pub mod unicode;

pub use block::{Block, BlockId, BlockList, BLOCK_ALLOC_MULTIPLE, BLOCK_EDIT_SIZE};
pub use iter::BlockIter;
pub use segment::{normalize_and_segment, Segment};
pub use unicode::Codepoint;

/// Split `data` into pieces, each of which (except possibly the last, if
/// `data` doesn't end in `\n`) ends with a newline and is no larger than
/// [`block::BLOCK_EDIT_SIZE`] unless a single line exceeds that size, in which
/// case the whole line is kept as one piece. Mirrors `dte`'s
/// `split_and_insert` splitting rule used by [`split_for_insert`].
pub fn split_into_blocks(data: &[u8]) -> Vec<&[u8]> {
    let mut out = Vec::new();
    let mut chunk_start = 0;
    let mut line_start = 0;
    let mut pos = 0;
    while pos < data.len() {
        if data[pos] != b'\n' {
            pos += 1;
            continue;
        }
        let line_end = pos + 1;
        if line_end - chunk_start >= BLOCK_EDIT_SIZE {
            if line_start > chunk_start {
                // Flush everything accumulated so far, excluding the line
                // that just grew past the budget.
                out.push(&data[chunk_start..line_start]);
                chunk_start = line_start;
            }
            // Flush this one line on its own, whether or not it alone
            // exceeds the budget (an oversized single line is kept whole).
            out.push(&data[chunk_start..line_end]);
            chunk_start = line_end;
        }
        line_start = line_end;
        pos = line_end;
    }
    if chunk_start < data.len() {
        out.push(&data[chunk_start..]);
    }
    out
}

/// Count newlines in `data`. Re-exported at crate root for convenience;
/// canonical definition lives in [`block`].
pub use block::count_newlines;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_keeps_pieces_newline_terminated() {
        let mut data = Vec::new();
        for i in 0..50 {
            data.extend_from_slice(format!("line {i}\n").as_bytes());
        }
        let pieces = split_into_blocks(&data);
        let rejoined: Vec<u8> = pieces.iter().flat_map(|p| p.iter().copied()).collect();
        assert_eq!(rejoined, data);
        for p in &pieces[..pieces.len() - 1] {
            assert_eq!(p.last(), Some(&b'\n'));
        }
    }

    #[test]
    fn split_handles_oversized_single_line() {
        let mut data = vec![b'x'; BLOCK_EDIT_SIZE * 3];
        data.push(b'\n');
        let pieces = split_into_blocks(&data);
        assert_eq!(pieces.len(), 1);
        assert_eq!(pieces[0], data.as_slice());
    }

    #[test]
    fn block_list_round_trip_via_split() {
        let data = b"a\nbb\nccc\n";
        let mut list = BlockList::new();
        let head = list.head();
        for piece in split_into_blocks(data) {
            list.insert_before(head, piece.to_vec());
        }
        list.free(head);
        assert_eq!(list.to_bytes(), data);
        assert_eq!(list.total_newlines(), 3);
        list.check_invariants();
    }
}

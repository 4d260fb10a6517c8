//! Integration tests checking the block-list/iterator round-trip laws.

use core_text::{split_into_blocks, BlockIter, BlockList};

fn build(lines: &[&str]) -> BlockList {
    let mut list = BlockList::new();
    let head = list.head();
    let mut data = Vec::new();
    for line in lines {
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
    }
    for piece in split_into_blocks(&data) {
        list.insert_before(head, piece.to_vec());
    }
    if list.len() > 1 {
        list.free(head);
    }
    list
}

#[test]
fn offset_to_iter_to_offset_is_identity() {
    let list = build(&["alpha", "beta", "gamma delta", ""]);
    let total = list.to_bytes().len();
    for off in 0..=total {
        let it = BlockIter::from_offset(&list, off);
        assert_eq!(it.to_offset(&list), off);
    }
}

#[test]
fn iterating_forward_visits_every_byte_once() {
    let list = build(&["one", "two", "three"]);
    let expected = list.to_bytes();
    let mut it = BlockIter::at_head(&list);
    let mut collected = Vec::new();
    loop {
        if it.is_eof(&list) {
            break;
        }
        let before = it;
        it.next_byte(&list);
        let byte = {
            let blk = &list.get(before.blk).data;
            blk[before.offset]
        };
        collected.push(byte);
    }
    assert_eq!(collected, expected);
}

#[test]
fn newline_count_matches_line_count() {
    let lines = ["a", "b", "c", "d"];
    let list = build(&lines);
    assert_eq!(list.total_newlines(), lines.len());
}

#[test]
fn oversized_line_survives_split_as_single_block() {
    let huge = "x".repeat(core_text::BLOCK_EDIT_SIZE * 4);
    let list = build(&[&huge, "tail"]);
    list.check_invariants();
    let bytes = list.to_bytes();
    assert!(bytes.starts_with(huge.as_bytes()));
    assert!(bytes.ends_with(b"tail\n"));
}

//! Grapheme-cluster segmentation used by the render pipeline to decide how
//! many terminal cells a run of combining characters occupies. Ported from
//! the teacher's `segment.rs`, retargeted at this crate's own
//! [`crate::unicode::codepoint_width`] instead of a build-time width-override
//! table.

use crate::unicode::codepoint_width;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub cluster: String,
    /// Byte offset in the normalized string (inclusive).
    pub start: usize,
    /// Byte offset in the normalized string (exclusive).
    pub end: usize,
    /// Terminal cell width of the whole cluster.
    pub width: u8,
}

/// Width of one grapheme cluster: the width of its first (base) scalar
/// value. Combining marks that follow contribute zero width individually,
/// which `codepoint_width` already reflects, so summing would double count
/// nothing — but we take the max to stay robust against unexpected
/// multi-wide clusters (e.g. flag sequences rendered as a single cell pair).
fn cluster_width(cluster: &str) -> u8 {
    cluster.chars().map(|c| codepoint_width(c as u32)).max().unwrap_or(0)
}

/// Normalize to NFC and segment into grapheme clusters with widths and byte
/// ranges. Clusters are returned in order, non-overlapping, and concatenate
/// back to the normalized string.
pub fn normalize_and_segment(input: &str) -> (String, Vec<Segment>) {
    let normalized: String = input.nfc().collect();
    let mut out = Vec::new();
    let mut byte = 0usize;
    for g in normalized.graphemes(true) {
        let len = g.len();
        out.push(Segment {
            cluster: g.to_string(),
            start: byte,
            end: byte + len,
            width: cluster_width(g),
        });
        byte += len;
    }
    (normalized, out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nfc_equivalence_and_segmentation_single_cluster() {
        let decomposed = "e\u{0301}";
        let composed = "\u{00E9}";
        let (n1, s1) = normalize_and_segment(decomposed);
        let (n2, s2) = normalize_and_segment(composed);
        assert_eq!(n1, n2);
        assert_eq!(s1.len(), 1);
        assert_eq!(s2.len(), 1);
        assert_eq!(s1[0].cluster, "\u{00E9}");
        assert_eq!(s1[0].width, s2[0].width);
    }

    #[test]
    fn segmentation_covers_whole_string() {
        let s = "a\u{6F22}b";
        let (n, segs) = normalize_and_segment(s);
        let mut prev_end = 0;
        let mut join = String::new();
        for seg in &segs {
            assert_eq!(seg.start, prev_end);
            assert!(seg.end >= seg.start);
            prev_end = seg.end;
            join.push_str(&seg.cluster);
        }
        assert_eq!(join, n);
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[1].width, 2);
    }
}

//! View and window-tree model: the layer between raw buffer storage
//! (`core-state`) and the render driver. A [`View`] is one window onto one
//! open buffer — its cursor position (in both character and display
//! columns), scroll offsets, and selection state. [`ViewManager`] owns the
//! (currently flat, single-split) collection of views and which one is
//! active; [`EditorModel`] pairs that with the [`core_state::EditorState`]
//! buffer collection the views point into.

mod layout;

pub use layout::{Layout, LayoutRegion};

use core_state::{Buffer, BufferId, EditorState};
use core_text::unicode::{codepoint_width, next_tab_stop};
use core_text::BlockIter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub usize);

/// Which rows/columns of a selection are included, per §4.5: *none*,
/// *characters* (anchor..cursor inclusive of the cursor's own character), or
/// *lines* (every whole line spanned by anchor and cursor, regardless of
/// column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    None,
    Characters,
    Lines,
}

/// A selection's anchor, recorded in the same `(cy, cx_char)` coordinates as
/// the cursor so it tracks independently of display-column tab expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub mode: SelectionMode,
    pub anchor_cy: usize,
    pub anchor_cx_char: usize,
}

impl Default for Selection {
    fn default() -> Self {
        Selection {
            mode: SelectionMode::None,
            anchor_cy: 0,
            anchor_cx_char: 0,
        }
    }
}

/// One window onto one buffer.
///
/// `cx_char` and `cx_display` both describe the cursor's horizontal
/// position on row `cy`, in characters and display columns respectively —
/// they diverge whenever the line contains a tab or a wide (double-width)
/// character before the cursor. `preferred_x` is the display column vertical
/// motion tries to land on; it is captured on every horizontal move and left
/// alone by vertical ones, matching the "sticky column" behavior described
/// in §4.5. `vx`/`vy` are the viewport's top-left scroll offset, in display
/// columns and rows.
#[derive(Debug, Clone)]
pub struct View {
    pub id: ViewId,
    pub buffer: BufferId,
    pub cx_char: usize,
    pub cx_display: usize,
    pub cy: usize,
    pub preferred_x: usize,
    pub vx: usize,
    pub vy: usize,
    pub selection: Selection,
}

impl View {
    pub fn new(id: ViewId, buffer: BufferId) -> Self {
        View {
            id,
            buffer,
            cx_char: 0,
            cx_display: 0,
            cy: 0,
            preferred_x: 0,
            vx: 0,
            vy: 0,
            selection: Selection::default(),
        }
    }

    /// Absolute buffer offset of the cursor: scan to the start of row `cy`,
    /// then step `cx_char` codepoints forward.
    pub fn cursor_offset(&self, buf: &Buffer) -> usize {
        let mut it = BlockIter::at_head(&buf.blocks);
        for _ in 0..self.cy {
            it.eol(&buf.blocks);
        }
        for _ in 0..self.cx_char {
            if it.next_char(&buf.blocks).is_none() {
                break;
            }
        }
        it.to_offset(&buf.blocks)
    }

    /// Recompute `cx_display` from `cx_char` by replaying the row's
    /// characters through the tab/width rule in §4.5. Call after any edit or
    /// motion that may have changed `cx_char` or the line's content.
    pub fn recompute_display_column(&mut self, buf: &Buffer, tab_width: usize) {
        let mut it = BlockIter::at_head(&buf.blocks);
        for _ in 0..self.cy {
            it.eol(&buf.blocks);
        }
        let mut display = 0usize;
        for _ in 0..self.cx_char {
            let Some(cp) = it.next_char(&buf.blocks) else {
                break;
            };
            display = if cp == '\t' as core_text::Codepoint {
                next_tab_stop(display, tab_width)
            } else {
                display + codepoint_width(cp) as usize
            };
        }
        self.cx_display = display;
    }

    /// Capture the current display column as the vertical-motion target.
    /// Any horizontal motion or character edit should call this; vertical
    /// motion should not.
    pub fn set_preferred_x(&mut self) {
        self.preferred_x = self.cx_display;
    }

    pub fn start_selection(&mut self, mode: SelectionMode) {
        self.selection = Selection {
            mode,
            anchor_cy: self.cy,
            anchor_cx_char: self.cx_char,
        };
    }

    pub fn clear_selection(&mut self) {
        self.selection.mode = SelectionMode::None;
    }

    /// The selection's buffer offset range, normalized so `start <= end`, or
    /// `None` if no selection is active. `Characters` mode includes the
    /// cursor's own character; `Lines` mode snaps both ends to line
    /// boundaries regardless of column.
    pub fn selection_range(&self, buf: &Buffer) -> Option<(usize, usize)> {
        match self.selection.mode {
            SelectionMode::None => None,
            SelectionMode::Characters => {
                let anchor = offset_of(buf, self.selection.anchor_cy, self.selection.anchor_cx_char);
                let cursor = self.cursor_offset(buf);
                let (lo, hi) = if anchor <= cursor { (anchor, cursor) } else { (cursor, anchor) };
                let mut end = BlockIter::from_offset(&buf.blocks, hi);
                end.normalize(&buf.blocks);
                end.next_byte(&buf.blocks);
                Some((lo, end.to_offset(&buf.blocks).max(hi)))
            }
            SelectionMode::Lines => {
                let (lo_row, hi_row) = if self.selection.anchor_cy <= self.cy {
                    (self.selection.anchor_cy, self.cy)
                } else {
                    (self.cy, self.selection.anchor_cy)
                };
                let mut start = BlockIter::at_head(&buf.blocks);
                for _ in 0..lo_row {
                    start.eol(&buf.blocks);
                }
                let mut end = BlockIter::at_head(&buf.blocks);
                for _ in 0..=hi_row {
                    end.eol(&buf.blocks);
                }
                Some((start.to_offset(&buf.blocks), end.to_offset(&buf.blocks)))
            }
        }
    }
}

/// Buffer offset of `(row, col_char)`, used by [`View::selection_range`].
fn offset_of(buf: &Buffer, row: usize, col_char: usize) -> usize {
    let mut it = BlockIter::at_head(&buf.blocks);
    for _ in 0..row {
        it.eol(&buf.blocks);
    }
    for _ in 0..col_char {
        if it.next_char(&buf.blocks).is_none() {
            break;
        }
    }
    it.to_offset(&buf.blocks)
}

/// The width, in cells, a tab-bar entry for tab number `tab_number` (1-based)
/// and the given display name occupies, per §4.9: `3 + digits(tab_number) +
/// display_width(name)`, truncated to 20 cells.
pub fn tab_title_width(tab_number: usize, name: &str) -> usize {
    let digits = if tab_number == 0 { 1 } else { (tab_number as f64).log10() as usize + 1 };
    let name_width: usize = name.chars().map(|c| codepoint_width(c as core_text::Codepoint) as usize).sum();
    (3 + digits + name_width).min(20)
}

/// Owns the flat collection of [`View`]s and which one is active. Splits
/// beyond a single view are out of scope; the manager still holds a `Vec` so
/// that scope can grow without an API change.
#[derive(Debug, Default)]
pub struct ViewManager {
    views: Vec<View>,
    active: usize,
}

impl ViewManager {
    pub fn new_single(buffer: BufferId) -> Self {
        ViewManager {
            views: vec![View::new(ViewId(0), buffer)],
            active: 0,
        }
    }

    pub fn active_view(&self) -> &View {
        &self.views[self.active]
    }

    pub fn active_view_mut(&mut self) -> &mut View {
        &mut self.views[self.active]
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn views(&self) -> &[View] {
        &self.views
    }

    pub fn push_view(&mut self, view: View) -> ViewId {
        let id = view.id;
        self.views.push(view);
        id
    }

    pub fn set_active(&mut self, index: usize) {
        debug_assert!(index < self.views.len());
        self.active = index;
    }
}

/// Pairs the open-buffer collection with the view tree pointing into it.
#[derive(Debug, Default)]
pub struct EditorModel {
    state: EditorState,
    view_mgr: ViewManager,
}

impl EditorModel {
    pub fn new(state: EditorState, view_mgr: ViewManager) -> Self {
        EditorModel { state, view_mgr }
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut EditorState {
        &mut self.state
    }

    pub fn active_view(&self) -> &View {
        self.view_mgr.active_view()
    }

    pub fn active_view_mut(&mut self) -> &mut View {
        self.view_mgr.active_view_mut()
    }

    pub fn views(&self) -> &[View] {
        self.view_mgr.views()
    }

    /// Split the mutable borrow of `state` from the active view so edit
    /// commands can read the view's cursor while mutating the buffer it
    /// points at. Safe because `view_mgr` and `state` are disjoint fields
    /// and each resulting reference only ever touches its own field.
    pub fn split_state_and_active_view(&mut self) -> (&mut EditorState, &mut View) {
        let state: *mut EditorState = &mut self.state;
        let view: *mut View = self.view_mgr.active_view_mut();
        // SAFETY: `state` and `view` point into disjoint fields of `self`
        // (`EditorState` and `ViewManager` share no memory), so the two
        // mutable references below never alias.
        unsafe { (&mut *state, &mut *view) }
    }
}

/// How far the viewport's scroll offset on one axis should move to keep the
/// cursor within `[margin, extent - margin)` of the visible window, or
/// `None` if it's already within bounds. `margin` is clamped to at most half
/// of `extent` so an oversized margin can't make every position "out of
/// bounds".
pub fn compute_scroll_intent(scroll: usize, cursor: usize, extent: usize, margin: usize) -> Option<usize> {
    if extent == 0 {
        return None;
    }
    let margin = margin.min(extent / 2);
    let lo = scroll + margin;
    let hi = scroll + extent - margin;
    if cursor < lo {
        Some(cursor.saturating_sub(margin))
    } else if cursor >= hi {
        Some(cursor + margin + 1 - extent)
    } else {
        None
    }
}

impl View {
    /// Apply `compute_scroll_intent` on the vertical axis against the
    /// buffer's line count, updating `vy` in place. Returns whether `vy`
    /// changed.
    pub fn auto_scroll(&mut self, buf: &Buffer, viewport_height: usize, margin: usize) -> bool {
        let extent = viewport_height.min(buf.line_count()).max(1);
        match compute_scroll_intent(self.vy, self.cy, viewport_height.max(1), margin) {
            Some(new_vy) => {
                self.vy = new_vy.min(buf.line_count().saturating_sub(extent));
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(state: &mut EditorState, text: &[u8]) -> BufferId {
        state.open(None, text)
    }

    #[test]
    fn cursor_offset_walks_rows_and_chars() {
        let mut state = EditorState::new();
        let id = open(&mut state, b"abc\ndef\n");
        let buf = &state.get(id).unwrap().buffer;
        let mut view = View::new(ViewId(0), id);
        view.cy = 1;
        view.cx_char = 2;
        assert_eq!(view.cursor_offset(buf), 6); // "abc\nde"
    }

    #[test]
    fn display_column_expands_tabs() {
        let mut state = EditorState::new();
        let id = open(&mut state, b"a\tb\n");
        let buf = &state.get(id).unwrap().buffer;
        let mut view = View::new(ViewId(0), id);
        view.cx_char = 2; // past "a\t"
        view.recompute_display_column(buf, 8);
        assert_eq!(view.cx_display, 8);
    }

    #[test]
    fn character_selection_is_normalized_and_inclusive() {
        let mut state = EditorState::new();
        let id = open(&mut state, b"abcdef\n");
        let buf = &state.get(id).unwrap().buffer;
        let mut view = View::new(ViewId(0), id);
        view.cx_char = 4;
        view.start_selection(SelectionMode::Characters);
        view.cx_char = 1; // moved left of the anchor
        let (start, end) = view.selection_range(buf).unwrap();
        assert_eq!((start, end), (1, 5)); // "bcde", inclusive of the cursor
    }

    #[test]
    fn line_selection_spans_whole_rows() {
        let mut state = EditorState::new();
        let id = open(&mut state, b"one\ntwo\nthree\n");
        let buf = &state.get(id).unwrap().buffer;
        let mut view = View::new(ViewId(0), id);
        view.cy = 0;
        view.start_selection(SelectionMode::Lines);
        view.cy = 1;
        let (start, end) = view.selection_range(buf).unwrap();
        assert_eq!((start, end), (0, 8)); // "one\ntwo\n"
    }

    #[test]
    fn tab_title_width_matches_formula() {
        assert_eq!(tab_title_width(1, "a.txt"), 3 + 1 + 5);
        assert_eq!(tab_title_width(12, "x"), 3 + 2 + 1);
        assert_eq!(tab_title_width(1, &"y".repeat(40)), 20);
    }

    #[test]
    fn compute_scroll_intent_scrolls_down_past_margin() {
        assert_eq!(compute_scroll_intent(0, 20, 10, 2), Some(13));
        assert_eq!(compute_scroll_intent(0, 5, 10, 2), None);
    }

    #[test]
    fn compute_scroll_intent_clamps_oversized_margin() {
        // margin larger than half the extent is clamped rather than making
        // every cursor position look out of bounds.
        assert_eq!(compute_scroll_intent(0, 5, 10, 9), None);
    }

    #[test]
    fn auto_scroll_follows_cursor_down() {
        let mut state = EditorState::new();
        let mut text = Vec::new();
        for _ in 0..50 {
            text.extend_from_slice(b"line\n");
        }
        let id = open(&mut state, &text);
        let buf = &state.get(id).unwrap().buffer;
        let mut view = View::new(ViewId(0), id);
        view.cy = 30;
        let changed = view.auto_scroll(buf, 10, 2);
        assert!(changed);
        assert!(view.vy > 0);
    }

    #[test]
    fn split_state_and_active_view_gives_disjoint_mutable_access() {
        let mut state = EditorState::new();
        let id = open(&mut state, b"hi\n");
        let mgr = ViewManager::new_single(id);
        let mut model = EditorModel::new(state, mgr);
        let (state, view) = model.split_state_and_active_view();
        view.cx_char = 1;
        state.get_mut(id).unwrap().buffer.insert(0, b"!", true);
        assert_eq!(model.active_view().cx_char, 1);
    }
}

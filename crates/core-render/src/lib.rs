//! Render driver (§4.9): per event cycle, recompute geometry on resize,
//! size the tab bar, clamp scroll to keep the cursor in view, rehighlight
//! and redraw the dirty row range, draw status/command lines, and flush one
//! write. Grounded in the teacher's dirty-range repaint framing, rebuilt
//! against this crate's own [`core_model::View`]/[`core_syntax::Highlighter`]
//! rather than a cell-grid diffing engine.

pub mod dirty;
pub mod status;

use core_model::{tab_title_width, EditorModel};
use core_state::Buffer;
use core_syntax::Highlighter;
use core_terminal::output::{OutputBuffer, Style};
use core_text::BlockIter;
use dirty::DirtyLinesTracker;

/// Terminal geometry the driver composes against: one tab row, a text area,
/// and one status/command row, matching `Layout::single`'s single-region
/// model (the tab bar and status line are carved out of that region here
/// rather than being separate layout regions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub width: usize,
    pub height: usize,
}

impl Geometry {
    /// Rows available to the text area: total height minus the tab bar and
    /// the status/command line.
    pub fn text_rows(&self) -> usize {
        self.height.saturating_sub(2)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScrollMargins {
    pub vertical: usize,
    pub horizontal: usize,
}

impl Default for ScrollMargins {
    fn default() -> Self {
        ScrollMargins { vertical: 2, horizontal: 4 }
    }
}

/// Drives one open tab's tab-bar title; `name` is the buffer's display name
/// (filename or `"[No Name]"`).
pub fn tab_title(tab_number: usize, name: &str) -> (usize, String) {
    (tab_title_width(tab_number, name), name.to_string())
}

/// Bytes of row `row` in `buf`, without its trailing `\n`.
fn row_bytes(buf: &Buffer, row: usize) -> Vec<u8> {
    let mut it = BlockIter::at_head(&buf.blocks);
    for _ in 0..row {
        it.eol(&buf.blocks);
    }
    let start = it.to_offset(&buf.blocks);
    it.eol(&buf.blocks);
    let mut end = it.to_offset(&buf.blocks);
    let bytes = buf.blocks.to_bytes();
    if end > start && bytes[end - 1] == b'\n' {
        end -= 1;
    }
    bytes[start..end].to_vec()
}

/// Maps a syntax highlighter's emit name to a cell style. Unknown names and
/// the absence of a highlighter both fall back to the default style.
pub trait StyleMap {
    fn style_for(&self, emit_name: &str) -> Style;
    fn default_style(&self) -> Style {
        Style::default()
    }
}

/// The minimal per-frame driver: geometry, scroll margins, and the dirty
/// range inherited from edits since the last repaint.
pub struct RenderDriver {
    pub geometry: Geometry,
    pub margins: ScrollMargins,
    pub back_color_erase: bool,
    dirty: DirtyLinesTracker,
}

impl RenderDriver {
    pub fn new(geometry: Geometry, margins: ScrollMargins, back_color_erase: bool) -> Self {
        RenderDriver { geometry, margins, back_color_erase, dirty: DirtyLinesTracker::new() }
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        self.geometry = Geometry { width, height };
    }

    pub fn mark_dirty(&mut self, line: usize) {
        self.dirty.mark(line);
    }

    pub fn mark_dirty_range(&mut self, start: usize, end_inclusive: usize) {
        self.dirty.mark_range(start, end_inclusive);
    }

    /// Run one repaint cycle: clamp scroll to the cursor, rehighlight and
    /// redraw the dirty rows within the viewport, draw the status line, and
    /// return the accumulated output bytes ready for a single write.
    pub fn render(
        &mut self,
        model: &mut EditorModel,
        highlighter: Option<&mut Highlighter>,
        styles: &dyn StyleMap,
        status_line: &str,
    ) -> Vec<u8> {
        let text_rows = self.geometry.text_rows();
        let buf_id = model.active_view().buffer;
        let Some(open_buf) = model.state().get(buf_id) else {
            return Vec::new();
        };
        let line_count = open_buf.buffer.line_count();

        {
            let view = model.active_view_mut();
            let buf = &model.state().get(buf_id).unwrap().buffer;
            view.auto_scroll(buf, text_rows, self.margins.vertical);
        }

        let view = model.active_view();
        let vy = view.vy;
        let vx = view.vx;

        let candidate_rows = self.dirty.take_in_viewport(vy, text_rows);
        let rows_to_paint: Vec<usize> = if candidate_rows.is_empty() {
            (vy..(vy + text_rows).min(line_count)).collect()
        } else {
            candidate_rows
        };

        let mut out = OutputBuffer::new(self.geometry.width, 8, core_terminal::output::TabDisplay::Normal, core_terminal::output::ColorDepth::TrueColor);
        out.sync_supported = true;
        out.begin_sync();

        let buf = &model.state().get(buf_id).unwrap().buffer;
        for row in rows_to_paint {
            if row >= line_count {
                continue;
            }
            let screen_row = row - vy;
            if screen_row >= text_rows {
                continue;
            }
            let text = row_bytes(buf, row);
            let spans = highlighter.as_ref().map(|hl| hl.highlight_line(row, &text).0).unwrap_or_default();

            out.start_row(vx);
            if spans.is_empty() {
                out.set_style(styles.default_style());
                for &b in &text {
                    out.put_char(b as core_text::Codepoint);
                }
            } else {
                let mut pos = 0usize;
                for span in &spans {
                    if span.start > pos {
                        out.set_style(styles.default_style());
                        for &b in &text[pos..span.start] {
                            out.put_char(b as core_text::Codepoint);
                        }
                    }
                    out.set_style(styles.style_for(&span.emit_name));
                    for &b in &text[span.start..span.end] {
                        out.put_char(b as core_text::Codepoint);
                    }
                    pos = span.end;
                }
                if pos < text.len() {
                    out.set_style(styles.default_style());
                    for &b in &text[pos..] {
                        out.put_char(b as core_text::Codepoint);
                    }
                }
            }
            out.clear_to_eol(self.back_color_erase);
            out.buf.push(b'\r');
            out.buf.push(b'\n');
        }

        out.set_style(styles.default_style());
        out.start_row(0);
        for ch in status_line.chars() {
            out.put_char(ch as core_text::Codepoint);
        }
        out.clear_to_eol(self.back_color_erase);

        out.end_sync();
        out.take()
    }
}

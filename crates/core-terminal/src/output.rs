//! Screen-cell output pipeline, grounded in `dte`'s `obuf.c`: one
//! [`OutputBuffer`] per frame tracks the logical display column `x` it has
//! written so far within the row being drawn, expands tabs, downgrades
//! colors to the terminal's depth, minimises SGR/cursor escape emission
//! against the previously written style, and can bracket a frame with
//! synchronized-update escapes.

use core_text::unicode::{caret_escape, codepoint_width, encode_utf8, hex_escape, is_ctrl, is_del, is_unprintable, next_tab_stop, Codepoint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TabDisplay {
    /// Tabs shown as `^I`.
    Control,
    /// Tabs expanded to spaces.
    Normal,
    /// Tabs shown as a `>` leader followed by `-` fill.
    Special,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    /// Don't touch this channel; inherit whatever is already active.
    #[default]
    Keep,
    Default,
    Indexed(u8),
    Rgb(u8, u8, u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorDepth {
    TrueColor,
    Indexed256,
    Basic16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub fg: Color,
    pub bg: Color,
    pub bold: bool,
    pub underline: bool,
    pub reverse: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorShape {
    Block,
    Underline,
    Bar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorStyle {
    pub shape: CursorShape,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorContext {
    Default,
    Insert,
    Overwrite,
    Cmdline,
}

/// Maps each [`CursorContext`] to a [`CursorStyle`]; `Color::Keep` in a
/// non-default entry inherits the default entry's color.
#[derive(Debug, Clone, Copy)]
pub struct CursorStyleMap {
    pub default: CursorStyle,
    pub insert: CursorStyle,
    pub overwrite: CursorStyle,
    pub cmdline: CursorStyle,
}

impl CursorStyleMap {
    pub fn resolve(&self, ctx: CursorContext) -> CursorStyle {
        let raw = match ctx {
            CursorContext::Default => self.default,
            CursorContext::Insert => self.insert,
            CursorContext::Overwrite => self.overwrite,
            CursorContext::Cmdline => self.cmdline,
        };
        CursorStyle {
            shape: raw.shape,
            color: if raw.color == Color::Keep { self.default.color } else { raw.color },
        }
    }
}

/// The 6 evenly spaced levels xterm's 256-color cube (indices 16..232) uses
/// per channel.
const CUBE_LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];

fn cube_index(v: u8) -> usize {
    CUBE_LEVELS.iter().enumerate().min_by_key(|(_, &l)| (l as i32 - v as i32).abs()).map(|(i, _)| i).unwrap()
}

/// Exact xterm-256 index for `(r, g, b)` if it lands precisely on a cube or
/// grayscale-ramp entry; `None` otherwise.
fn rgb_exact_256(r: u8, g: u8, b: u8) -> Option<u8> {
    if CUBE_LEVELS.contains(&r) && CUBE_LEVELS.contains(&g) && CUBE_LEVELS.contains(&b) {
        let ri = CUBE_LEVELS.iter().position(|&l| l == r).unwrap();
        let gi = CUBE_LEVELS.iter().position(|&l| l == g).unwrap();
        let bi = CUBE_LEVELS.iter().position(|&l| l == b).unwrap();
        return Some(16 + 36 * ri as u8 + 6 * gi as u8 + bi as u8);
    }
    if r == g && g == b && r >= 8 && r <= 238 && (r - 8) % 10 == 0 {
        return Some(232 + (r - 8) / 10);
    }
    None
}

/// Nearest xterm-256 index for an arbitrary `(r, g, b)`, picking the cube
/// entry whose quantized channels are closest.
fn rgb_nearest_256(r: u8, g: u8, b: u8) -> u8 {
    if let Some(exact) = rgb_exact_256(r, g, b) {
        return exact;
    }
    let (ri, gi, bi) = (cube_index(r), cube_index(g), cube_index(b));
    16 + 36 * ri as u8 + 6 * gi as u8 + bi as u8
}

fn index_to_rgb(idx: u8) -> (u8, u8, u8) {
    if idx < 16 {
        // standard + bright ANSI, approximated.
        const BASE: [(u8, u8, u8); 16] = [
            (0, 0, 0),
            (205, 0, 0),
            (0, 205, 0),
            (205, 205, 0),
            (0, 0, 238),
            (205, 0, 205),
            (0, 205, 205),
            (229, 229, 229),
            (127, 127, 127),
            (255, 0, 0),
            (0, 255, 0),
            (255, 255, 0),
            (92, 92, 255),
            (255, 0, 255),
            (0, 255, 255),
            (255, 255, 255),
        ];
        return BASE[idx as usize];
    }
    if idx >= 232 {
        let v = 8 + (idx - 232) * 10;
        return (v, v, v);
    }
    let i = idx - 16;
    (CUBE_LEVELS[(i / 36) as usize], CUBE_LEVELS[((i / 6) % 6) as usize], CUBE_LEVELS[(i % 6) as usize])
}

/// Fixed approximate downgrade of a 256-color index to one of the 16 base
/// ANSI colors, per §4.7's "16-color terminals map higher colors down via a
/// fixed table".
fn downgrade_to_16(idx: u8) -> u8 {
    if idx < 16 {
        return idx;
    }
    if idx >= 232 {
        return if idx < 244 { 8 } else { 15 };
    }
    let i = idx - 16;
    let (r, g, b) = (i / 36, (i / 6) % 6, i % 6);
    let mut code = 0u8;
    if r >= 3 {
        code |= 1;
    }
    if g >= 3 {
        code |= 2;
    }
    if b >= 3 {
        code |= 4;
    }
    if r.max(g).max(b) >= 4 {
        code |= 8;
    }
    code
}

/// One frame's accumulated output bytes plus the row-local write cursor.
pub struct OutputBuffer {
    pub buf: Vec<u8>,
    /// Display column written so far in the current row.
    x: usize,
    /// Left edge of the visible window, in display columns.
    scroll_x: usize,
    width: usize,
    stopped: bool,
    pub tab_width: usize,
    pub tab_display: TabDisplay,
    pub color_depth: ColorDepth,
    /// Bitmask (bit0=bold, bit1=underline, bit2=reverse, bit3=italic) of
    /// attributes the terminal can only render with default colors.
    pub ncv_attributes: u8,
    pub sync_supported: bool,
    current_style: Style,
    current_cursor: Option<CursorStyle>,
}

impl OutputBuffer {
    pub fn new(width: usize, tab_width: usize, tab_display: TabDisplay, color_depth: ColorDepth) -> Self {
        OutputBuffer {
            buf: Vec::new(),
            x: 0,
            scroll_x: 0,
            width,
            stopped: false,
            tab_width,
            tab_display,
            color_depth,
            ncv_attributes: 0,
            sync_supported: true,
            current_style: Style::default(),
            current_cursor: None,
        }
    }

    /// Begin a new row at horizontal scroll offset `scroll_x`.
    pub fn start_row(&mut self, scroll_x: usize) {
        self.x = 0;
        self.scroll_x = scroll_x;
        self.stopped = false;
    }

    fn remaining(&self) -> usize {
        (self.scroll_x + self.width).saturating_sub(self.x)
    }

    /// Write one character, applying the skip/sentinel/emit rule in §4.7.
    pub fn put_char(&mut self, cp: Codepoint) {
        if self.stopped {
            return;
        }
        let is_tab = cp == '\t' as Codepoint;
        let full_width = if is_tab {
            next_tab_stop(self.x, self.tab_width) - self.x
        } else {
            (codepoint_width(cp) as usize).max(1)
        };

        if self.x < self.scroll_x {
            let new_x = self.x + full_width;
            if new_x > self.scroll_x {
                self.emit_overflow(cp, full_width, new_x - self.scroll_x);
            }
            self.x = new_x;
            return;
        }

        if self.remaining() < full_width {
            self.buf.push(b'>');
            self.x = self.scroll_x + self.width;
            self.stopped = true;
            return;
        }

        self.emit_full(cp, full_width);
        self.x += full_width;
    }

    /// Render the visible tail of a character that straddles `scroll_x`:
    /// spaces for a tab, `?` for DEL, the tail of caret/hex escapes for
    /// controls/unprintables, `>` otherwise.
    fn emit_overflow(&mut self, cp: Codepoint, full_width: usize, overflow: usize) {
        let overflow = overflow.min(full_width);
        if overflow == 0 {
            return;
        }
        if cp == '\t' as Codepoint {
            for _ in 0..overflow {
                self.buf.push(b' ');
            }
        } else if is_del(cp) {
            self.buf.push(b'?');
        } else if is_unprintable(cp) {
            let esc = hex_escape(cp);
            self.buf.extend_from_slice(&esc[4 - overflow.min(4)..]);
        } else if is_ctrl(cp) {
            let esc = caret_escape(cp);
            self.buf.extend_from_slice(&esc[2 - overflow.min(2)..]);
        } else {
            self.buf.push(b'>');
        }
    }

    fn emit_full(&mut self, cp: Codepoint, width: usize) {
        if cp == '\t' as Codepoint {
            match self.tab_display {
                TabDisplay::Control => {
                    self.buf.extend_from_slice(&caret_escape(cp));
                    for _ in 2..width {
                        self.buf.push(b' ');
                    }
                }
                TabDisplay::Normal => {
                    for _ in 0..width {
                        self.buf.push(b' ');
                    }
                }
                TabDisplay::Special => {
                    self.buf.push(b'>');
                    for _ in 1..width {
                        self.buf.push(b'-');
                    }
                }
            }
            return;
        }
        if is_unprintable(cp) {
            self.buf.extend_from_slice(&hex_escape(cp));
            return;
        }
        if is_ctrl(cp) || is_del(cp) {
            self.buf.extend_from_slice(&caret_escape(cp));
            return;
        }
        let mut out = [0u8; 4];
        let n = encode_utf8(cp, &mut out);
        self.buf.extend_from_slice(&out[..n]);
    }

    fn downgrade(&self, color: Color) -> Color {
        match color {
            Color::Keep | Color::Default => Color::Default,
            Color::Indexed(i) => match self.color_depth {
                ColorDepth::TrueColor | ColorDepth::Indexed256 => Color::Indexed(i),
                ColorDepth::Basic16 => Color::Indexed(downgrade_to_16(i)),
            },
            Color::Rgb(r, g, b) => match self.color_depth {
                ColorDepth::TrueColor => Color::Rgb(r, g, b),
                ColorDepth::Indexed256 => Color::Indexed(rgb_nearest_256(r, g, b)),
                ColorDepth::Basic16 => Color::Indexed(downgrade_to_16(rgb_nearest_256(r, g, b))),
            },
        }
    }

    fn push_color_sgr(&mut self, base: u8, color: Color) {
        match self.downgrade(color) {
            Color::Default | Color::Keep => {}
            Color::Indexed(i) => {
                self.buf.extend_from_slice(format!(";{base};5;{i}").as_bytes());
            }
            Color::Rgb(r, g, b) => {
                self.buf.extend_from_slice(format!(";{base};2;{r};{g};{b}").as_bytes());
            }
        }
    }

    fn resolve_attrs(&self, style: Style) -> Style {
        let non_default = !matches!(style.fg, Color::Default | Color::Keep) || !matches!(style.bg, Color::Default | Color::Keep);
        let mut s = style;
        if non_default {
            if self.ncv_attributes & 1 != 0 {
                s.bold = false;
            }
            if self.ncv_attributes & 2 != 0 {
                s.underline = false;
            }
            if self.ncv_attributes & 4 != 0 {
                s.reverse = false;
            }
            if self.ncv_attributes & 8 != 0 {
                s.italic = false;
            }
        }
        s
    }

    /// Emit an SGR sequence only if `style` differs from the one last set.
    pub fn set_style(&mut self, style: Style) {
        if style == self.current_style {
            return;
        }
        let resolved = self.resolve_attrs(style);
        self.buf.extend_from_slice(b"\x1b[0");
        if resolved.bold {
            self.buf.extend_from_slice(b";1");
        }
        if resolved.underline {
            self.buf.extend_from_slice(b";4");
        }
        if resolved.reverse {
            self.buf.extend_from_slice(b";7");
        }
        if resolved.italic {
            self.buf.extend_from_slice(b";3");
        }
        self.push_color_sgr(38, style.fg);
        self.push_color_sgr(48, style.bg);
        self.buf.push(b'm');
        self.current_style = style;
    }

    /// Clear from the current column to the end of the row, using `CSI K`
    /// when back-color-erase is safe, otherwise spaces.
    pub fn clear_to_eol(&mut self, back_color_erase: bool) {
        if back_color_erase {
            self.buf.extend_from_slice(b"\x1b[K");
        } else {
            for _ in self.x..(self.scroll_x + self.width) {
                self.buf.push(b' ');
            }
        }
        self.x = self.scroll_x + self.width;
    }

    /// Emit DECSCUSR (shape) and OSC 12 / OSC 112 (color) only if `style`
    /// differs from the cursor style last set.
    pub fn set_cursor_style(&mut self, style: CursorStyle) {
        if self.current_cursor == Some(style) {
            return;
        }
        let shape_code = match style.shape {
            CursorShape::Block => 2,
            CursorShape::Underline => 4,
            CursorShape::Bar => 6,
        };
        self.buf.extend_from_slice(format!("\x1b[{shape_code} q").as_bytes());
        match self.downgrade(style.color) {
            Color::Default | Color::Keep => self.buf.extend_from_slice(b"\x1b]112\x07"),
            Color::Indexed(i) => {
                let (r, g, b) = index_to_rgb(i);
                self.buf.extend_from_slice(format!("\x1b]12;rgb:{r:02x}/{g:02x}/{b:02x}\x07").as_bytes());
            }
            Color::Rgb(r, g, b) => {
                self.buf.extend_from_slice(format!("\x1b]12;rgb:{r:02x}/{g:02x}/{b:02x}\x07").as_bytes());
            }
        }
        self.current_cursor = Some(style);
    }

    pub fn begin_sync(&mut self) {
        if self.sync_supported {
            self.buf.extend_from_slice(b"\x1b[?2026h");
        }
    }

    pub fn end_sync(&mut self) {
        if self.sync_supported {
            self.buf.extend_from_slice(b"\x1b[?2026l");
        }
    }

    /// Drain the accumulated bytes, ready for a single `write`.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_char_emits_sentinel_when_out_of_room() {
        let mut ob = OutputBuffer::new(3, 8, TabDisplay::Normal, ColorDepth::TrueColor);
        ob.start_row(0);
        for c in "ab界".chars() {
            ob.put_char(c as Codepoint);
        }
        // "a" (1), "b" (1) fit; "界" (width 2) doesn't fit in the last cell.
        assert_eq!(ob.buf, b"ab>");
    }

    #[test]
    fn put_char_skips_before_scroll_x() {
        let mut ob = OutputBuffer::new(4, 8, TabDisplay::Normal, ColorDepth::TrueColor);
        ob.start_row(2);
        for c in "abcdef".chars() {
            ob.put_char(c as Codepoint);
        }
        assert_eq!(ob.buf, b"cdef");
    }

    #[test]
    fn tab_overflow_renders_partial_spaces() {
        let mut ob = OutputBuffer::new(10, 4, TabDisplay::Normal, ColorDepth::TrueColor);
        ob.start_row(2);
        ob.put_char('\t' as Codepoint); // tab from col 0 to col 4, scrolled at 2: 2 visible spaces
        assert_eq!(ob.buf, b"  ");
    }

    #[test]
    fn style_minimisation_skips_identical_style() {
        let mut ob = OutputBuffer::new(10, 8, TabDisplay::Normal, ColorDepth::TrueColor);
        let style = Style { fg: Color::Indexed(1), ..Style::default() };
        ob.set_style(style);
        let first_len = ob.buf.len();
        ob.set_style(style);
        assert_eq!(ob.buf.len(), first_len);
    }

    #[test]
    fn rgb_downgrades_to_exact_256_entry() {
        let mut ob = OutputBuffer::new(10, 8, TabDisplay::Normal, ColorDepth::Indexed256);
        ob.set_style(Style { fg: Color::Rgb(255, 0, 0), ..Style::default() });
        let s = String::from_utf8(ob.buf.clone()).unwrap();
        assert!(s.contains(";38;5;"));
    }

    #[test]
    fn cursor_style_emits_only_on_change() {
        let mut ob = OutputBuffer::new(10, 8, TabDisplay::Normal, ColorDepth::TrueColor);
        let style = CursorStyle { shape: CursorShape::Bar, color: Color::Default };
        ob.set_cursor_style(style);
        let first_len = ob.buf.len();
        ob.set_cursor_style(style);
        assert_eq!(ob.buf.len(), first_len);
    }

    #[test]
    fn sync_framing_brackets_output() {
        let mut ob = OutputBuffer::new(10, 8, TabDisplay::Normal, ColorDepth::TrueColor);
        ob.begin_sync();
        ob.put_char('x' as Codepoint);
        ob.end_sync();
        assert!(ob.buf.starts_with(b"\x1b[?2026h"));
        assert!(ob.buf.ends_with(b"\x1b[?2026l"));
    }
}

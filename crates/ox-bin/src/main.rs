//! Oxidized entrypoint: wires the block-list buffer, view model, syntax
//! highlighter, terminal output pipeline, and input decoder into one event
//! loop.

use anyhow::Result;
use clap::Parser;
use core_config::load_from;
use core_events::{
    Event, EventSourceRegistry, InputEvent, KeyToken, ModMask, NamedKey, TickEventSource,
    EVENT_CHANNEL_CAP,
};
use core_model::{EditorModel, ViewManager};
use core_render::status::status_line;
use core_render::{Geometry, RenderDriver, ScrollMargins, StyleMap};
use core_state::{Buffer, EditorState};
use core_syntax::{registry::registry, Highlighter};
use core_terminal::output::{Color, Style};
use core_terminal::{CrosstermBackend, TerminalBackend, TerminalCapabilities};
use core_text::BlockIter;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Once;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "oxidized", version, about = "Oxidized editor")]
struct Args {
    /// File to open at startup. A scratch buffer is used if omitted.
    pub path: Option<PathBuf>,
    /// Configuration file path, overriding discovery of `oxidized.toml`.
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = std::path::Path::new(".");
    let log_path = log_dir.join("oxidized.log");
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }
    let file_appender = tracing_appender::rolling::never(log_dir, "oxidized.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    match tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(writer)
        .try_init()
    {
        Ok(_) => Some(guard),
        Err(_) => None,
    }
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

/// Picks a built-in syntax by filename extension; unrecognized or absent
/// names fall back to the registry's plain-text syntax.
fn highlighter_for(path: Option<&PathBuf>) -> Option<Highlighter> {
    let reg = registry();
    let name = match path.and_then(|p| p.extension()).and_then(|e| e.to_str()) {
        Some("sh") | Some("toml") | Some("py") | Some("rb") => "hash-comment",
        _ => "plain",
    };
    reg.get(name).map(Highlighter::new)
}

/// Number of codepoints on row `row`, excluding its trailing `\n`.
fn line_char_len(buf: &Buffer, row: usize) -> usize {
    let mut it = BlockIter::at_head(&buf.blocks);
    for _ in 0..row {
        it.eol(&buf.blocks);
    }
    let mut n = 0;
    loop {
        match it.next_char(&buf.blocks) {
            Some(cp) if cp == '\n' as core_text::Codepoint => break,
            Some(_) => n += 1,
            None => break,
        }
    }
    n
}

/// The `cx_char` on row `row` whose display column is closest to (but not
/// past) `target_display`, used to land vertical motion on the "sticky"
/// column recorded in `View::preferred_x`.
fn cx_for_display(buf: &Buffer, row: usize, target_display: usize, tab_width: usize) -> usize {
    let mut it = BlockIter::at_head(&buf.blocks);
    for _ in 0..row {
        it.eol(&buf.blocks);
    }
    let mut display = 0usize;
    let mut chars = 0usize;
    loop {
        if display >= target_display {
            break;
        }
        let Some(cp) = it.next_char(&buf.blocks) else { break };
        if cp == '\n' as core_text::Codepoint {
            break;
        }
        display = if cp == '\t' as core_text::Codepoint {
            core_text::unicode::next_tab_stop(display, tab_width)
        } else {
            display + core_text::unicode::codepoint_width(cp) as usize
        };
        chars += 1;
    }
    chars
}

enum Flow {
    Continue,
    Quit,
}

fn handle_key(model: &mut EditorModel, tab_width: usize, token: &KeyToken, mods: ModMask) -> Flow {
    if mods.contains(ModMask::CTRL) {
        return match token {
            KeyToken::Char('q') | KeyToken::Char('c') => Flow::Quit,
            KeyToken::Char('s') => {
                save_active_buffer(model);
                Flow::Continue
            }
            // Other Ctrl-chords have no binding yet; ignore rather than
            // inserting the bare letter.
            KeyToken::Char(_) => Flow::Continue,
            _ => Flow::Continue,
        };
    }

    let buf_id = model.active_view().buffer;
    match token {
        KeyToken::Char(ch) => {
            let (state, view) = model.split_state_and_active_view();
            let Some(open_buf) = state.get_mut(buf_id) else { return Flow::Continue };
            let offset = view.cursor_offset(&open_buf.buffer);
            let mut encoded = [0u8; 4];
            let len = core_text::unicode::encode_utf8(*ch as core_text::Codepoint, &mut encoded);
            open_buf.buffer.insert(offset, &encoded[..len], true);
            view.cx_char += 1;
            view.recompute_display_column(&open_buf.buffer, tab_width);
            view.set_preferred_x();
        }
        KeyToken::Named(NamedKey::Enter) => {
            let (state, view) = model.split_state_and_active_view();
            let Some(open_buf) = state.get_mut(buf_id) else { return Flow::Continue };
            let offset = view.cursor_offset(&open_buf.buffer);
            open_buf.buffer.insert(offset, b"\n", true);
            view.cy += 1;
            view.cx_char = 0;
            view.cx_display = 0;
            view.set_preferred_x();
        }
        KeyToken::Named(NamedKey::Tab) => {
            let (state, view) = model.split_state_and_active_view();
            let Some(open_buf) = state.get_mut(buf_id) else { return Flow::Continue };
            let offset = view.cursor_offset(&open_buf.buffer);
            open_buf.buffer.insert(offset, b"\t", true);
            view.cx_char += 1;
            view.recompute_display_column(&open_buf.buffer, tab_width);
            view.set_preferred_x();
        }
        KeyToken::Named(NamedKey::Backspace) => {
            let (state, view) = model.split_state_and_active_view();
            let Some(open_buf) = state.get_mut(buf_id) else { return Flow::Continue };
            if view.cx_char > 0 {
                let offset = view.cursor_offset(&open_buf.buffer);
                let mut probe = BlockIter::from_offset(&open_buf.buffer.blocks, offset);
                probe.prev_char(&open_buf.buffer.blocks);
                let start = probe.to_offset(&open_buf.buffer.blocks);
                open_buf.buffer.delete(start, offset - start);
                view.cx_char -= 1;
                view.recompute_display_column(&open_buf.buffer, tab_width);
                view.set_preferred_x();
            } else if view.cy > 0 {
                let offset = view.cursor_offset(&open_buf.buffer);
                if offset > 0 {
                    open_buf.buffer.delete(offset - 1, 1);
                    view.cy -= 1;
                    view.cx_char = line_char_len(&open_buf.buffer, view.cy);
                    view.recompute_display_column(&open_buf.buffer, tab_width);
                    view.set_preferred_x();
                }
            }
        }
        KeyToken::Named(NamedKey::Delete) => {
            let (state, view) = model.split_state_and_active_view();
            let Some(open_buf) = state.get_mut(buf_id) else { return Flow::Continue };
            let offset = view.cursor_offset(&open_buf.buffer);
            let len = open_buf.buffer.len();
            if offset < len {
                open_buf.buffer.delete(offset, 1);
            }
        }
        KeyToken::Named(NamedKey::Left) => {
            let (state, view) = model.split_state_and_active_view();
            let Some(open_buf) = state.get_mut(buf_id) else { return Flow::Continue };
            if view.cx_char > 0 {
                view.cx_char -= 1;
            } else if view.cy > 0 {
                view.cy -= 1;
                view.cx_char = line_char_len(&open_buf.buffer, view.cy);
            }
            view.recompute_display_column(&open_buf.buffer, tab_width);
            view.set_preferred_x();
        }
        KeyToken::Named(NamedKey::Right) => {
            let (state, view) = model.split_state_and_active_view();
            let Some(open_buf) = state.get_mut(buf_id) else { return Flow::Continue };
            let len = line_char_len(&open_buf.buffer, view.cy);
            if view.cx_char < len {
                view.cx_char += 1;
            } else if view.cy + 1 < open_buf.buffer.line_count() {
                view.cy += 1;
                view.cx_char = 0;
            }
            view.recompute_display_column(&open_buf.buffer, tab_width);
            view.set_preferred_x();
        }
        KeyToken::Named(NamedKey::Up) => {
            let (state, view) = model.split_state_and_active_view();
            let Some(open_buf) = state.get_mut(buf_id) else { return Flow::Continue };
            if view.cy > 0 {
                view.cy -= 1;
                view.cx_char = cx_for_display(&open_buf.buffer, view.cy, view.preferred_x, tab_width);
                view.recompute_display_column(&open_buf.buffer, tab_width);
            }
        }
        KeyToken::Named(NamedKey::Down) => {
            let (state, view) = model.split_state_and_active_view();
            let Some(open_buf) = state.get_mut(buf_id) else { return Flow::Continue };
            if view.cy + 1 < open_buf.buffer.line_count() {
                view.cy += 1;
                view.cx_char = cx_for_display(&open_buf.buffer, view.cy, view.preferred_x, tab_width);
                view.recompute_display_column(&open_buf.buffer, tab_width);
            }
        }
        KeyToken::Named(NamedKey::Home) => {
            let view = model.active_view_mut();
            view.cx_char = 0;
            view.cx_display = 0;
            view.set_preferred_x();
        }
        KeyToken::Named(NamedKey::End) => {
            let (state, view) = model.split_state_and_active_view();
            let Some(open_buf) = state.get_mut(buf_id) else { return Flow::Continue };
            view.cx_char = line_char_len(&open_buf.buffer, view.cy);
            view.recompute_display_column(&open_buf.buffer, tab_width);
            view.set_preferred_x();
        }
        KeyToken::Named(NamedKey::Esc) => {}
        KeyToken::Chord { base, mods: inner_mods } => {
            return handle_key(model, tab_width, base, *inner_mods | mods);
        }
        _ => {}
    }
    Flow::Continue
}

fn save_active_buffer(model: &EditorModel) {
    let open_buf = match model.state().get(model.active_view().buffer) {
        Some(b) => b,
        None => return,
    };
    let Some(name) = open_buf.buffer.filename.as_ref() else {
        return;
    };
    let bytes = open_buf.buffer.blocks.to_bytes();
    match std::fs::write(name, &bytes) {
        Ok(()) => info!(target: "io", file = name.as_str(), "file_write_ok"),
        Err(e) => error!(target: "io", file = name.as_str(), ?e, "file_write_error"),
    }
}

struct EmitStyles;

impl StyleMap for EmitStyles {
    fn style_for(&self, emit_name: &str) -> Style {
        match emit_name {
            "comment" => Style { fg: Color::Indexed(244), ..Style::default() },
            "keyword" => Style { fg: Color::Indexed(33), bold: true, ..Style::default() },
            _ => Style::default(),
        }
    }
}

fn insert_text(model: &mut EditorModel, tab_width: usize, text: &str) {
    let buf_id = model.active_view().buffer;
    let (state, view) = model.split_state_and_active_view();
    let Some(open_buf) = state.get_mut(buf_id) else { return };
    let offset = view.cursor_offset(&open_buf.buffer);
    open_buf.buffer.insert(offset, text.as_bytes(), true);
    for ch in text.chars() {
        if ch == '\n' {
            view.cy += 1;
            view.cx_char = 0;
        } else {
            view.cx_char += 1;
        }
    }
    view.recompute_display_column(&open_buf.buffer, tab_width);
    view.set_preferred_x();
}

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = configure_logging();
    install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let config = load_from(args.config.clone())?;

    let (state, view_mgr, highlighter) = open_model(&args);
    let mut model = EditorModel::new(state, view_mgr);
    let mut highlighter = highlighter;

    let mut backend = CrosstermBackend::new();
    backend.set_title("Oxidized")?;
    let _guard = backend.enter_guard()?;

    let caps = TerminalCapabilities::detect();
    let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
    let margins = ScrollMargins {
        vertical: config.file.scroll.margin.vertical as usize,
        horizontal: 4,
    };
    let mut driver = RenderDriver::new(
        Geometry { width: cols as usize, height: rows as usize },
        margins,
        caps.back_color_erase,
    );

    let (tx, mut rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let (_input_handle, _input_shutdown) = core_input::spawn_async_input(tx.clone());
    let mut registry = EventSourceRegistry::new();
    registry.register(TickEventSource::new(Duration::from_millis(200)));
    let _tick_handles = registry.spawn_all(&tx);

    let tab_width = config.file.text.tab_width as usize;
    let mut stdout = std::io::stdout();

    render_frame(&mut model, highlighter.as_mut(), &mut driver, &mut stdout)?;

    while let Some(event) = rx.recv().await {
        let mut needs_render = false;
        match event {
            Event::Input(InputEvent::KeyPress(ev)) => {
                match handle_key(&mut model, tab_width, &ev.token, ModMask::empty()) {
                    Flow::Quit => break,
                    Flow::Continue => {}
                }
                needs_render = true;
            }
            Event::Input(InputEvent::TextCommit(text)) | Event::Input(InputEvent::PasteChunk(text)) => {
                insert_text(&mut model, tab_width, &text);
                needs_render = true;
            }
            Event::Input(InputEvent::PasteStart) | Event::Input(InputEvent::PasteEnd) => {}
            Event::Input(InputEvent::CtrlC) => break,
            Event::Input(InputEvent::Resize(w, h)) => {
                driver.resize(w as usize, h as usize);
                needs_render = true;
            }
            Event::Tick => {
                if let Ok((w, h)) = crossterm::terminal::size() {
                    if (w as usize, h as usize) != (driver.geometry.width, driver.geometry.height) {
                        driver.resize(w as usize, h as usize);
                        needs_render = true;
                    }
                }
            }
            Event::RenderRequested => needs_render = true,
            Event::Command(_) | Event::Shutdown => break,
        }

        if needs_render {
            render_frame(&mut model, highlighter.as_mut(), &mut driver, &mut stdout)?;
        }
    }

    info!(target: "runtime", "shutdown");
    Ok(())
}

fn render_frame(
    model: &mut EditorModel,
    highlighter: Option<&mut Highlighter>,
    driver: &mut RenderDriver,
    stdout: &mut std::io::Stdout,
) -> Result<()> {
    let buf_id = model.active_view().buffer;
    let status = match model.state().get(buf_id) {
        Some(open_buf) => status_line(open_buf, model.active_view()),
        None => String::new(),
    };
    let bytes = driver.render(model, highlighter, &EmitStyles, &status);
    stdout.write_all(&bytes)?;
    stdout.flush()?;
    Ok(())
}

fn open_model(args: &Args) -> (EditorState, ViewManager, Option<Highlighter>) {
    let mut state = EditorState::new();
    let (data, name) = match args.path.as_ref() {
        Some(path) => match std::fs::read(path) {
            Ok(bytes) => (bytes, path.file_name().and_then(|s| s.to_str()).map(String::from)),
            Err(e) => {
                error!(target: "io", ?e, "file_open_error");
                (Vec::new(), None)
            }
        },
        None => (Vec::new(), None),
    };
    let highlighter = highlighter_for(args.path.as_ref());
    let id = state.open(name, &data);
    let mgr = ViewManager::new_single(id);
    (state, mgr, highlighter)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with(text: &[u8]) -> EditorModel {
        let mut state = EditorState::new();
        let id = state.open(None, text);
        let mgr = ViewManager::new_single(id);
        EditorModel::new(state, mgr)
    }

    #[test]
    fn typing_inserts_and_advances_cursor() {
        let mut model = model_with(b"\n");
        handle_key(&mut model, 8, &KeyToken::Char('h'), ModMask::empty());
        handle_key(&mut model, 8, &KeyToken::Char('i'), ModMask::empty());
        let buf = &model.state().get(model.active_view().buffer).unwrap().buffer;
        assert_eq!(buf.blocks.to_bytes(), b"hi\n");
        assert_eq!(model.active_view().cx_char, 2);
    }

    #[test]
    fn backspace_merges_with_previous_line_at_col_zero() {
        let mut model = model_with(b"one\ntwo\n");
        model.active_view_mut().cy = 1;
        handle_key(&mut model, 8, &KeyToken::Named(NamedKey::Backspace), ModMask::empty());
        let buf = &model.state().get(model.active_view().buffer).unwrap().buffer;
        assert_eq!(buf.blocks.to_bytes(), b"onetwo\n");
        assert_eq!(model.active_view().cy, 0);
        assert_eq!(model.active_view().cx_char, 3);
    }

    #[test]
    fn ctrl_q_chord_requests_quit() {
        let mut model = model_with(b"x\n");
        let chord = KeyToken::Chord { base: Box::new(KeyToken::Char('q')), mods: ModMask::CTRL };
        assert!(matches!(handle_key(&mut model, 8, &chord, ModMask::empty()), Flow::Quit));
    }

    #[test]
    fn down_then_up_restores_preferred_column() {
        let mut model = model_with(b"abcdef\nxy\nabcdef\n");
        model.active_view_mut().cx_char = 5;
        model.active_view_mut().set_preferred_x();
        handle_key(&mut model, 8, &KeyToken::Named(NamedKey::Down), ModMask::empty());
        assert_eq!(model.active_view().cy, 1);
        assert_eq!(model.active_view().cx_char, 2); // "xy" is shorter, clamped
        handle_key(&mut model, 8, &KeyToken::Named(NamedKey::Down), ModMask::empty());
        assert_eq!(model.active_view().cy, 2);
        assert_eq!(model.active_view().cx_char, 5); // back to full width, restores preferred_x
    }
}

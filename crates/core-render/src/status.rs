//! Status line text composition: filename, modified marker, and cursor
//! position, in the teacher's "name [+] row,col" shape.

use core_model::View;
use core_state::{Buffer, OpenBuffer};

/// Build the status-line string for the active view, per §4.9 step 5.
pub fn status_line(open_buf: &OpenBuffer, view: &View) -> String {
    let name = open_buf.buffer.filename.as_deref().unwrap_or("[No Name]");
    let modified = if open_buf.buffer.changes.is_modified() { " [+]" } else { "" };
    format!("{name}{modified} -- {},{}", view.cy + 1, view.cx_char + 1)
}

/// Build the command-line prompt text (empty outside command mode).
pub fn command_line(prompt: Option<&str>) -> String {
    match prompt {
        Some(text) => format!(":{text}"),
        None => String::new(),
    }
}

fn _assert_buffer_usage(_buf: &Buffer) {}

#[cfg(test)]
mod tests {
    use super::*;
    use core_model::{ViewId, ViewManager};
    use core_state::EditorState;

    #[test]
    fn status_line_shows_modified_marker_and_cursor() {
        let mut state = EditorState::new();
        let id = state.open(Some("a.txt".into()), b"hi\n");
        state.get_mut(id).unwrap().buffer.insert(0, b"!", true);
        let mgr = ViewManager::new_single(id);
        let mut view = core_model::View::new(ViewId(0), id);
        view.cy = 0;
        view.cx_char = 1;
        let _ = mgr;
        let open_buf = state.get(id).unwrap();
        let line = status_line(open_buf, &view);
        assert!(line.contains("a.txt"));
        assert!(line.contains("[+]"));
        assert!(line.ends_with("1,2"));
    }

    #[test]
    fn command_line_prefixes_colon() {
        assert_eq!(command_line(Some("wq")), ":wq");
        assert_eq!(command_line(None), "");
    }
}

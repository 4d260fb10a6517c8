//! Terminal mode control and the output byte pipeline.
//!
//! [`CrosstermBackend`] owns raw-mode/alternate-screen/title control via
//! `crossterm`. [`output`] is this crate's own screen-cell model (§4.7):
//! tab expansion, SGR style minimisation, cursor styling and synchronized
//! update framing, none of which `crossterm` provides a column-aware,
//! state-minimising API for.

use anyhow::Result;
use crossterm::{
    cursor::Hide,
    cursor::Show,
    execute,
    terminal::{
        EnterAlternateScreen, LeaveAlternateScreen, SetTitle, disable_raw_mode, enable_raw_mode,
    },
};
use std::io::stdout;

pub mod capabilities;
pub mod output;
pub use capabilities::TerminalCapabilities;
pub use output::{Color, CursorShape, CursorStyle, OutputBuffer, Style, TabDisplay};

pub trait TerminalBackend {
    fn enter(&mut self) -> Result<()>;
    fn leave(&mut self) -> Result<()>;
    fn set_title(&mut self, title: &str) -> Result<()>;
}

pub struct CrosstermBackend {
    entered: bool,
}

/// RAII guard ensuring terminal state restoration even if caller early-returns or panics.
pub struct TerminalGuard<'a> {
    backend: &'a mut CrosstermBackend,
    active: bool,
}

impl Default for CrosstermBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CrosstermBackend {
    pub fn new() -> Self {
        Self { entered: false }
    }

    /// Enter and return a guard that will leave on drop.
    pub fn enter_guard(&mut self) -> Result<TerminalGuard<'_>> {
        self.enter()?;
        Ok(TerminalGuard {
            backend: self,
            active: true,
        })
    }
}

impl TerminalBackend for CrosstermBackend {
    fn enter(&mut self) -> Result<()> {
        if !self.entered {
            enable_raw_mode()?;
            execute!(stdout(), EnterAlternateScreen, Hide)?;
            self.entered = true;
        }
        Ok(())
    }

    fn leave(&mut self) -> Result<()> {
        if self.entered {
            execute!(stdout(), LeaveAlternateScreen, Show)?;
            disable_raw_mode()?;
            self.entered = false;
        }
        Ok(())
    }

    fn set_title(&mut self, title: &str) -> Result<()> {
        execute!(stdout(), SetTitle(title))?;
        Ok(())
    }
}

impl Drop for CrosstermBackend {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl<'a> Drop for TerminalGuard<'a> {
    fn drop(&mut self) {
        if self.active {
            let _ = self.backend.leave();
        }
    }
}

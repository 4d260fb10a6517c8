//! Terminal capability probing: a small set of booleans the render driver
//! consults before emitting back-color-erase clears or synchronized-update
//! framing.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct TerminalCapabilities {
    pub supports_scroll_region: bool,
    /// Back-color-erase: whether `CSI K` clears to the *current* background
    /// color rather than the terminal default, letting the render driver
    /// use it instead of emitting spaces per §4.9.
    pub back_color_erase: bool,
    /// Whether the terminal understands `CSI ? 2026 h/l` synchronized
    /// update framing (§4.7).
    pub supports_sync_updates: bool,
}

impl TerminalCapabilities {
    /// Optimistic defaults for a modern xterm-compatible terminal; a real
    /// probe (DA1/DA2 query, `$TERM` heuristics) would refine these.
    pub fn detect() -> Self {
        Self {
            supports_scroll_region: true,
            back_color_erase: true,
            supports_sync_updates: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_sets_scroll_region_true() {
        let caps = TerminalCapabilities::detect();
        assert!(caps.supports_scroll_region);
    }
}

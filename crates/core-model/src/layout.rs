//! Terminal surface geometry for the single-window layout the render driver
//! composes against: one full-screen region, with the tab bar, text area and
//! status/command lines carved out of it by the renderer rather than by this
//! crate. Coordinates are in terminal cell units (`u16`).
//!
//! Invariants:
//! * `regions.len() == 1`.
//! * Region 0 has origin `(0, 0)`.
//! * Width/height are the terminal's reported dimensions; either may be 0.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutRegion {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl LayoutRegion {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    regions: Vec<LayoutRegion>,
}

impl Layout {
    /// Create a layout representing a single full-screen region.
    pub fn single(width: u16, height: u16) -> Self {
        Self {
            regions: vec![LayoutRegion::new(0, 0, width, height)],
        }
    }

    /// Return the primary (currently only) region.
    pub fn primary(&self) -> &LayoutRegion {
        // Debug assert current single-region invariant.
        debug_assert!(self.regions.len() == 1, "multi-region not yet enabled");
        &self.regions[0]
    }

    pub fn regions(&self) -> &[LayoutRegion] {
        &self.regions
    }

    /// Internal (future) helper to push a region. Unused now; retained as a
    /// placeholder illustrating likely extension point.
    #[allow(dead_code)]
    fn push_region(&mut self, region: LayoutRegion) {
        self.regions.push(region);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_layout_invariants() {
        let l = Layout::single(80, 24);
        assert_eq!(l.regions().len(), 1);
        let r = l.primary();
        assert_eq!(r.x, 0);
        assert_eq!(r.y, 0);
        assert_eq!(r.width, 80);
        assert_eq!(r.height, 24);
    }
}

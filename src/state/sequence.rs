//! Ordered panel list of one folder and the index arithmetic over it.

use crate::model::Panel;

/// Single-page or double-page (spread) reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PageMode {
    #[default]
    Single,
    Double,
}

impl PageMode {
    pub fn from_flag(is_double: bool) -> Self {
        if is_double {
            PageMode::Double
        } else {
            PageMode::Single
        }
    }

    pub fn is_double(self) -> bool {
        self == PageMode::Double
    }

    /// Number of panels one advance or retreat moves by.
    pub fn step(self) -> usize {
        match self {
            PageMode::Single => 1,
            PageMode::Double => 2,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            PageMode::Single => PageMode::Double,
            PageMode::Double => PageMode::Single,
        }
    }
}

/// The panel(s) on screen. `second` is `None` in single mode and on the
/// final spread of an odd-length folder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PanelPair<'a> {
    pub first: Option<&'a Panel>,
    pub second: Option<&'a Panel>,
}

impl PanelPair<'_> {
    pub fn is_empty(&self) -> bool {
        self.first.is_none() && self.second.is_none()
    }

    pub fn paths(&self) -> (Option<&str>, Option<&str>) {
        (
            self.first.map(|p| p.path.as_str()),
            self.second.map(|p| p.path.as_str()),
        )
    }
}

/// Panels of one folder in the order the store returned them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PanelSequence {
    panels: Vec<Panel>,
}

impl PanelSequence {
    pub fn new(panels: Vec<Panel>) -> Self {
        Self { panels }
    }

    pub fn len(&self) -> usize {
        self.panels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.panels.is_empty()
    }

    /// `None` for an empty sequence.
    pub fn last_index(&self) -> Option<usize> {
        self.panels.len().checked_sub(1)
    }

    /// Out-of-range lookups yield `None`.
    pub fn panel_at(&self, index: usize) -> Option<&Panel> {
        self.panels.get(index)
    }

    pub fn position_of(&self, path: &str) -> Option<usize> {
        self.panels.iter().position(|p| p.path == path)
    }

    pub fn current(&self, index: usize, mode: PageMode) -> PanelPair<'_> {
        PanelPair {
            first: self.panel_at(index),
            second: if mode.is_double() {
                index.checked_add(1).and_then(|i| self.panel_at(i))
            } else {
                None
            },
        }
    }

    /// Pair one step ahead of `index`, empty past the end.
    pub fn next_pair(&self, index: usize, mode: PageMode) -> PanelPair<'_> {
        match index.checked_add(mode.step()) {
            Some(next) => self.current(next, mode),
            None => PanelPair::default(),
        }
    }

    /// Pair one step behind `index`, empty before the start.
    pub fn prev_pair(&self, index: usize, mode: PageMode) -> PanelPair<'_> {
        match index.checked_sub(mode.step()) {
            Some(prev) => self.current(prev, mode),
            None => PanelPair::default(),
        }
    }

    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn panels(count: usize) -> Vec<Panel> {
        (0..count)
            .map(|i| {
                let stamp = ("d".to_string(), "t".to_string());
                Panel::new("1", "/lib/vol1", format!("/lib/vol1/p{i}.png"), stamp).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_single_mode_has_no_companion() {
        let seq = PanelSequence::new(panels(3));
        let pair = seq.current(1, PageMode::Single);
        assert_eq!(pair.paths(), (Some("/lib/vol1/p1.png"), None));
    }

    #[test]
    fn test_double_mode_pairs_adjacent_panels() {
        let seq = PanelSequence::new(panels(3));
        let pair = seq.current(0, PageMode::Double);
        assert_eq!(pair.paths(), (Some("/lib/vol1/p0.png"), Some("/lib/vol1/p1.png")));
    }

    #[test]
    fn test_final_spread_of_odd_folder_has_one_panel() {
        let seq = PanelSequence::new(panels(3));
        let pair = seq.current(2, PageMode::Double);
        assert_eq!(pair.paths(), (Some("/lib/vol1/p2.png"), None));
    }

    #[test]
    fn test_out_of_range_yields_no_panel() {
        let seq = PanelSequence::new(panels(2));
        assert!(seq.current(5, PageMode::Double).is_empty());
        assert!(seq.prev_pair(1, PageMode::Double).is_empty());
        assert!(seq.next_pair(usize::MAX, PageMode::Single).is_empty());
    }

    #[test]
    fn test_empty_sequence() {
        let seq = PanelSequence::default();
        assert!(seq.is_empty());
        assert_eq!(seq.last_index(), None);
        assert!(seq.current(0, PageMode::Single).is_empty());
    }

    #[test]
    fn test_preview_pairs() {
        let seq = PanelSequence::new(panels(5));
        assert_eq!(
            seq.next_pair(0, PageMode::Double).paths(),
            (Some("/lib/vol1/p2.png"), Some("/lib/vol1/p3.png"))
        );
        assert_eq!(
            seq.prev_pair(3, PageMode::Single).paths(),
            (Some("/lib/vol1/p2.png"), None)
        );
    }

    #[test]
    fn test_position_of() {
        let seq = PanelSequence::new(panels(3));
        assert_eq!(seq.position_of("/lib/vol1/p2.png"), Some(2));
        assert_eq!(seq.position_of("/lib/vol1/gone.png"), None);
    }
}

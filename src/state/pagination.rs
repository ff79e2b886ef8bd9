//! Pagination state machine for one reading session.
//!
//! The controller owns the [`PanelSequence`], the current index and the page
//! mode. Index moves are clamped to the sequence; reaching the first or last
//! panel with a jump turns into a boundary request for the sibling folder.

use crate::error::{EngineError, Result};
use crate::model::{Direction, Panel};
use crate::state::sequence::{PageMode, PanelPair, PanelSequence};
use log::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PaginationState {
    #[default]
    Uninitialized,
    Ready { index: usize, mode: PageMode },
}

/// Result of a navigation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// The index settled at `index`. `from == index` when a move was clamped
    /// at a boundary; the read state is still written in that case.
    Settled { from: usize, index: usize },
    /// Jump at the first/last panel: the caller may open the sibling folder.
    Boundary(Direction),
    /// Not ready, or nothing to navigate.
    Idle,
}

impl NavOutcome {
    pub fn is_settled(&self) -> bool {
        matches!(self, NavOutcome::Settled { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaginationController {
    sequence: PanelSequence,
    state: PaginationState,
}

impl PaginationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the panels and restores the last read position.
    ///
    /// The index is the position of `last_read_path`, or 0 when that panel
    /// is no longer in the list. Only allowed once.
    pub fn initialize(
        &mut self,
        panels: Vec<Panel>,
        last_read_path: Option<&str>,
        is_double: bool,
    ) -> Result<usize> {
        if self.is_ready() {
            return Err(EngineError::Session(
                "pagination is already initialized".to_string(),
            ));
        }

        let sequence = PanelSequence::new(panels);
        let index = last_read_path
            .and_then(|path| sequence.position_of(path))
            .unwrap_or(0);
        let mode = PageMode::from_flag(is_double);

        debug!(
            "Pagination ready: {} panels, index {}, {:?}",
            sequence.len(),
            index,
            mode
        );

        self.sequence = sequence;
        self.state = PaginationState::Ready { index, mode };
        Ok(index)
    }

    pub fn state(&self) -> PaginationState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, PaginationState::Ready { .. })
    }

    pub fn sequence(&self) -> &PanelSequence {
        &self.sequence
    }

    pub fn index(&self) -> Option<usize> {
        match self.state {
            PaginationState::Ready { index, .. } => Some(index),
            PaginationState::Uninitialized => None,
        }
    }

    pub fn mode(&self) -> Option<PageMode> {
        match self.state {
            PaginationState::Ready { mode, .. } => Some(mode),
            PaginationState::Uninitialized => None,
        }
    }

    pub fn current_panel(&self) -> Option<&Panel> {
        self.index().and_then(|i| self.sequence.panel_at(i))
    }

    pub fn current_pair(&self) -> PanelPair<'_> {
        match self.state {
            PaginationState::Ready { index, mode } => self.sequence.current(index, mode),
            PaginationState::Uninitialized => PanelPair::default(),
        }
    }

    pub fn advance(&mut self) -> NavOutcome {
        self.step(Direction::Next, None)
    }

    pub fn retreat(&mut self) -> NavOutcome {
        self.step(Direction::Previous, None)
    }

    /// Moves by exactly one panel regardless of mode.
    pub fn advance_single(&mut self) -> NavOutcome {
        self.step(Direction::Next, Some(1))
    }

    pub fn retreat_single(&mut self) -> NavOutcome {
        self.step(Direction::Previous, Some(1))
    }

    pub fn jump_to_first(&mut self) -> NavOutcome {
        let Some((index, _)) = self.ready_position() else {
            return NavOutcome::Idle;
        };

        if index == 0 {
            return NavOutcome::Boundary(Direction::Previous);
        }
        self.settle(index, 0)
    }

    pub fn jump_to_last(&mut self) -> NavOutcome {
        let Some((index, last)) = self.ready_position() else {
            return NavOutcome::Idle;
        };

        if index == last {
            return NavOutcome::Boundary(Direction::Next);
        }
        self.settle(index, last)
    }

    /// Flips the page mode. Refused on the last panel, where a double
    /// spread would have no companion. Returns whether the mode changed.
    pub fn toggle_double_mode(&mut self) -> bool {
        let Some((index, last)) = self.ready_position() else {
            return false;
        };
        let PaginationState::Ready { mode, .. } = self.state else {
            return false;
        };

        if index == last {
            debug!("Page mode toggle refused on the last panel");
            return false;
        }

        self.state = PaginationState::Ready {
            index,
            mode: mode.toggled(),
        };
        true
    }

    /// `(index, last_index)` when ready with at least one panel.
    fn ready_position(&self) -> Option<(usize, usize)> {
        let index = self.index()?;
        let last = self.sequence.last_index()?;
        Some((index, last))
    }

    fn step(&mut self, direction: Direction, amount: Option<usize>) -> NavOutcome {
        let (Some((index, last)), Some(mode)) = (self.ready_position(), self.mode()) else {
            return NavOutcome::Idle;
        };
        let amount = amount.unwrap_or_else(|| mode.step());

        let target = match direction {
            Direction::Next => index.saturating_add(amount).min(last),
            Direction::Previous => index.saturating_sub(amount),
        };
        self.settle(index, target)
    }

    fn settle(&mut self, from: usize, index: usize) -> NavOutcome {
        if let PaginationState::Ready { mode, .. } = self.state {
            self.state = PaginationState::Ready { index, mode };
        }
        NavOutcome::Settled { from, index }
    }
}

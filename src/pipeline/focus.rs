//! Focus cursor and extend-range selection over the stage list.

use crate::pipeline::list::StageList;
use crate::stage::StageId;
use serde::Serialize;
use std::ops::RangeInclusive;

/// Which slot receives keyboard events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "slot", content = "id", rename_all = "snake_case")]
pub enum Cursor {
    #[default]
    None,
    Stage(StageId),
    Tail,
}

impl Cursor {
    pub fn stage(&self) -> Option<StageId> {
        match self {
            Cursor::Stage(id) => Some(*id),
            Cursor::None | Cursor::Tail => None,
        }
    }

    /// Slot index in the visual sequence (the tail is `list.len()`).
    pub fn slot_index(&self, list: &StageList) -> Option<usize> {
        match self {
            Cursor::None => None,
            Cursor::Stage(id) => list.index_of(*id),
            Cursor::Tail => Some(list.len()),
        }
    }

    /// Cursor for the slot at `index`, clamping past-the-end to the tail.
    pub fn at_slot(list: &StageList, index: usize) -> Cursor {
        match list.get(index) {
            Some(stage) => Cursor::Stage(stage.id()),
            None => Cursor::Tail,
        }
    }
}

/// Horizontal direction of a navigation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

/// Bar focus, cursor and optional range anchor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Focus {
    bar_focused: bool,
    cursor: Cursor,
    /// Stage where an extend run started
    anchor: Option<StageId>,
}

impl Focus {
    pub fn new(bar_focused: bool) -> Self {
        Self {
            bar_focused,
            ..Self::default()
        }
    }

    pub fn bar_focused(&self) -> bool {
        self.bar_focused
    }

    pub fn toggle_bar(&mut self) -> bool {
        self.bar_focused = !self.bar_focused;
        self.bar_focused
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn anchor(&self) -> Option<StageId> {
        self.anchor
    }

    /// Move the cursor, dropping any range.
    pub fn set(&mut self, cursor: Cursor) {
        self.cursor = cursor;
        self.anchor = None;
    }

    pub fn clear_range(&mut self) {
        self.anchor = None;
    }

    /// Neighbouring slot in `direction`, or `None` at the bounds.
    ///
    /// With nothing focused, right enters at the first slot and left at the
    /// tail.
    pub fn neighbour(&self, list: &StageList, direction: Direction) -> Option<Cursor> {
        let Some(index) = self.cursor.slot_index(list) else {
            return Some(match direction {
                Direction::Right => Cursor::at_slot(list, 0),
                Direction::Left => Cursor::Tail,
            });
        };
        match direction {
            Direction::Left if index == 0 => None,
            Direction::Left => Some(Cursor::at_slot(list, index - 1)),
            Direction::Right if index >= list.len() => None,
            Direction::Right => Some(Cursor::at_slot(list, index + 1)),
        }
    }

    /// Move as for navigation but keep (or start) the range anchor.
    pub fn extend_to(&mut self, target: Cursor) {
        if self.anchor.is_none() {
            self.anchor = self.cursor.stage().or(target.stage());
        }
        self.cursor = target;
    }

    /// Stage indices covered by the current range.
    ///
    /// A cursor on the tail extends the range to the last stage.
    pub fn selection(&self, list: &StageList) -> Option<RangeInclusive<usize>> {
        let anchor = list.index_of(self.anchor?)?;
        let end = match self.cursor {
            Cursor::Stage(id) => list.index_of(id)?,
            Cursor::Tail => list.len().checked_sub(1)?,
            Cursor::None => return None,
        };
        Some(anchor.min(end)..=anchor.max(end))
    }

    /// Whether `id` falls inside the current range
    pub fn is_selected(&self, list: &StageList, id: StageId) -> bool {
        match (self.selection(list), list.index_of(id)) {
            (Some(range), Some(index)) => range.contains(&index),
            _ => false,
        }
    }
}

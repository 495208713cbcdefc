//! Read-only view of the pipeline for rendering.
//!
//! A snapshot is a plain value: the renderer can keep it, diff it or ship
//! it across threads without touching the machine.

use crate::pipeline::focus::{Cursor, Focus};
use crate::pipeline::list::{Slot, StageList};
use crate::stage::{StageId, StageKind, SyncToken, Validity};
use crate::types::{DatasetId, PipelineSummary, SessionStatus};
use serde::Serialize;
use std::fmt;

/// One rendered slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotSnapshot {
    /// `None` for the tail placeholder
    pub id: Option<StageId>,
    pub kind: Option<StageKind>,
    pub text: String,
    pub validity: Option<Validity>,
    /// Keystroke-time syntax error while editing
    pub hint: Option<String>,
    /// Has the focus cursor
    pub active: bool,
    /// Inside the extend range
    pub selected: bool,
}

impl SlotSnapshot {
    pub fn is_tail(&self) -> bool {
        self.id.is_none()
    }
}

/// Everything the rendering side may read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSnapshot {
    pub status: SessionStatus,
    pub dataset: Option<DatasetId>,
    pub bar_focused: bool,
    pub cursor: Cursor,
    /// Stages in order, then the tail
    pub slots: Vec<SlotSnapshot>,
    pub summary: Option<PipelineSummary>,
    /// Global error banner, if shown
    pub error: Option<String>,
    pub live_token: Option<SyncToken>,
    pub revision: u64,
}

impl PipelineSnapshot {
    pub(crate) fn slots_of(list: &StageList, focus: &Focus) -> Vec<SlotSnapshot> {
        let cursor = focus.cursor();
        list.slots()
            .map(|slot| match slot {
                Slot::Stage(stage) => SlotSnapshot {
                    id: Some(stage.id()),
                    kind: Some(stage.kind()),
                    text: stage.raw_text().to_string(),
                    validity: Some(stage.validity()),
                    hint: stage.syntax_hint().map(String::from),
                    active: cursor == Cursor::Stage(stage.id()),
                    selected: focus.is_selected(list, stage.id()),
                },
                Slot::Tail => SlotSnapshot {
                    id: None,
                    kind: None,
                    text: String::new(),
                    validity: None,
                    hint: None,
                    active: cursor == Cursor::Tail,
                    selected: false,
                },
            })
            .collect()
    }

    /// Stage slots only
    pub fn stages(&self) -> impl Iterator<Item = &SlotSnapshot> {
        self.slots.iter().filter(|s| !s.is_tail())
    }

    pub fn active_slot(&self) -> Option<&SlotSnapshot> {
        self.slots.iter().find(|s| s.active)
    }
}

impl fmt::Display for PipelineSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.status)?;
        if let Some(dataset) = &self.dataset {
            write!(f, " {}", dataset)?;
        }
        if let Some(summary) = &self.summary {
            write!(f, " | {}", summary)?;
        }
        if !self.bar_focused {
            write!(f, " (bar unfocused)")?;
        }
        writeln!(f)?;

        for (index, slot) in self.slots.iter().enumerate() {
            let marker = match (slot.active, slot.selected) {
                (true, _) => '>',
                (false, true) => '*',
                (false, false) => ' ',
            };
            match &slot.validity {
                None => writeln!(f, "{} {:>2}  + add stage", marker, index)?,
                Some(validity) => {
                    write!(f, "{} {:>2}  {:<8} {}", marker, index, validity.display_name(), slot.text)?;
                    if let Validity::Invalid(reason) = validity {
                        write!(f, "  ! {}", reason)?;
                    }
                    if let Some(hint) = &slot.hint {
                        write!(f, "  ? {}", hint)?;
                    }
                    writeln!(f)?;
                }
            }
        }

        if let Some(error) = &self.error {
            writeln!(f, "error: {}", error)?;
        }
        Ok(())
    }
}

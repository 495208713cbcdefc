//! Input events accepted by the pipeline machine, the key chords that
//! produce them, and the notices it reports back.

use crate::stage::{StageId, StageKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Everything the rendering side may ask of the pipeline machine.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Remove the focused stage (only when it is not being edited)
    DeleteActive,
    /// Remove every stage in the extend range
    DeleteSelection,
    /// Enable/disable shortcut dispatch
    ToggleBarFocus,
    /// Commit the focused stage's edit
    CommitFocused,
    /// Drop the focused stage's edit
    Discard,
    NavigateLeft,
    NavigateRight,
    ExtendLeft,
    ExtendRight,
    /// Pointer focus on a specific stage
    FocusStage(StageId),
    /// Pointer focus on the "add stage" slot
    FocusTail,
    /// Focus leaves the bar entirely
    Blur,
    /// Start editing the focused stage without changing its text
    BeginEdit,
    /// Replace the focused field's text
    Input(String),
    /// Insert an empty stage at `index`
    InsertStage { index: usize, kind: StageKind },
    /// Reorder two committed stages
    MoveStage { from: usize, to: usize },
}

impl PipelineEvent {
    /// Shortcuts are swallowed while the bar does not have keyboard focus.
    pub fn is_shortcut(&self) -> bool {
        matches!(
            self,
            PipelineEvent::DeleteActive
                | PipelineEvent::DeleteSelection
                | PipelineEvent::CommitFocused
                | PipelineEvent::Discard
                | PipelineEvent::NavigateLeft
                | PipelineEvent::NavigateRight
                | PipelineEvent::ExtendLeft
                | PipelineEvent::ExtendRight
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::DeleteActive => "delete_active",
            PipelineEvent::DeleteSelection => "delete_selection",
            PipelineEvent::ToggleBarFocus => "toggle_bar_focus",
            PipelineEvent::CommitFocused => "commit",
            PipelineEvent::Discard => "discard",
            PipelineEvent::NavigateLeft => "navigate_left",
            PipelineEvent::NavigateRight => "navigate_right",
            PipelineEvent::ExtendLeft => "extend_left",
            PipelineEvent::ExtendRight => "extend_right",
            PipelineEvent::FocusStage(_) => "focus_stage",
            PipelineEvent::FocusTail => "focus_tail",
            PipelineEvent::Blur => "blur",
            PipelineEvent::BeginEdit => "begin_edit",
            PipelineEvent::Input(_) => "input",
            PipelineEvent::InsertStage { .. } => "insert_stage",
            PipelineEvent::MoveStage { .. } => "move_stage",
        }
    }
}

/// Actions a key chord can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Commit,
    Discard,
    DeleteActive,
    DeleteSelection,
    NavigateLeft,
    NavigateRight,
    ExtendLeft,
    ExtendRight,
    ToggleBarFocus,
}

impl KeyAction {
    pub fn to_event(self) -> PipelineEvent {
        match self {
            KeyAction::Commit => PipelineEvent::CommitFocused,
            KeyAction::Discard => PipelineEvent::Discard,
            KeyAction::DeleteActive => PipelineEvent::DeleteActive,
            KeyAction::DeleteSelection => PipelineEvent::DeleteSelection,
            KeyAction::NavigateLeft => PipelineEvent::NavigateLeft,
            KeyAction::NavigateRight => PipelineEvent::NavigateRight,
            KeyAction::ExtendLeft => PipelineEvent::ExtendLeft,
            KeyAction::ExtendRight => PipelineEvent::ExtendRight,
            KeyAction::ToggleBarFocus => PipelineEvent::ToggleBarFocus,
        }
    }
}

/// A key plus modifiers, written `Ctrl+Shift+Key`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyChord {
    pub ctrl: bool,
    pub shift: bool,
    pub key: String,
}

impl KeyChord {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            ctrl: false,
            shift: false,
            key: key.into(),
        }
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn ctrl(mut self) -> Self {
        self.ctrl = true;
        self
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.ctrl {
            f.write_str("Ctrl+")?;
        }
        if self.shift {
            f.write_str("Shift+")?;
        }
        f.write_str(&self.key)
    }
}

impl FromStr for KeyChord {
    type Err = String;

    /// Modifiers are case-insensitive; the key name is kept as written.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts: Vec<&str> = s.split('+').map(str::trim).collect();
        let key = match parts.pop() {
            Some(key) if !key.is_empty() => key,
            _ => return Err(format!("empty key in chord '{}'", s)),
        };
        let mut chord = KeyChord::new(key);
        for modifier in parts {
            match modifier.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => chord.ctrl = true,
                "shift" => chord.shift = true,
                other => return Err(format!("unknown modifier '{}' in chord '{}'", other, s)),
            }
        }
        Ok(chord)
    }
}

/// User-visible outcome of an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    /// Local parse failure on commit
    StageInvalid { stage: StageId, reason: String },
    /// Focus could not leave a stage with unsaved text
    FocusBlocked { stage: StageId },
    /// The backend refused a stage that parsed locally
    SyncRejected { stage: StageId, reason: String },
    /// Channel fault; the pipeline is now in error
    Fault { message: String },
}

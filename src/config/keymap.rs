//! Key chord → action bindings.
//!
//! Stored in the `[keymap]` section as `"Shift+Delete" = "delete_selection"`.
//! A `[keymap]` section in the config file replaces the default table as a
//! whole.

use crate::error::{Result, ViewBarError};
use crate::pipeline::event::{KeyAction, KeyChord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keymap {
    bindings: BTreeMap<String, KeyAction>,
}

impl Default for Keymap {
    fn default() -> Self {
        let mut keymap = Self::empty();
        keymap.bind(KeyChord::new("Enter"), KeyAction::Commit);
        keymap.bind(KeyChord::new("Escape"), KeyAction::Discard);
        keymap.bind(KeyChord::new("Backspace"), KeyAction::DeleteActive);
        keymap.bind(KeyChord::new("Delete"), KeyAction::DeleteActive);
        keymap.bind(KeyChord::new("ArrowLeft"), KeyAction::NavigateLeft);
        keymap.bind(KeyChord::new("ArrowRight"), KeyAction::NavigateRight);
        keymap.bind(KeyChord::new("ArrowLeft").shift(), KeyAction::ExtendLeft);
        keymap.bind(KeyChord::new("ArrowRight").shift(), KeyAction::ExtendRight);
        keymap.bind(KeyChord::new("Delete").shift(), KeyAction::DeleteSelection);
        keymap.bind(KeyChord::new("Space").ctrl(), KeyAction::ToggleBarFocus);
        keymap
    }
}

impl Keymap {
    pub fn empty() -> Self {
        Self {
            bindings: BTreeMap::new(),
        }
    }

    /// Bind `chord`, replacing any previous binding
    pub fn bind(&mut self, chord: KeyChord, action: KeyAction) {
        self.bindings.insert(chord.to_string(), action);
    }

    /// Action bound to `chord`, if any. Key names compare case-insensitively.
    pub fn resolve(&self, chord: &KeyChord) -> Option<KeyAction> {
        self.bindings.iter().find_map(|(text, action)| {
            let bound: KeyChord = text.parse().ok()?;
            let same = bound.ctrl == chord.ctrl
                && bound.shift == chord.shift
                && bound.key.eq_ignore_ascii_case(&chord.key);
            same.then_some(*action)
        })
    }

    /// Every chord bound to `action`
    pub fn chords_for(&self, action: KeyAction) -> Vec<&str> {
        self.bindings
            .iter()
            .filter(|(_, a)| **a == action)
            .map(|(c, _)| c.as_str())
            .collect()
    }

    /// Reject chords that do not parse
    pub fn validate(&self) -> Result<()> {
        for text in self.bindings.keys() {
            text.parse::<KeyChord>()
                .map_err(|e| ViewBarError::Config(format!("Invalid keymap entry: {}", e)))?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

//! Input model: keys, the pressed-key set, and the keymap.
//!
//! Keys are named the way the host reports them (`"Escape"`, `"Control"`,
//! `"l"`). `Keymap` binds single keys to session actions and names the keys
//! that act as modifiers for clicks (multi-select, fast-create) and for
//! chords (Control/Meta + link-track key).

#[cfg(test)]
#[path = "input_test.rs"]
mod input_test;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A keyboard key by host name. Single-character names are lowercased,
/// including names read from event logs and keymap JSON.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Key(String);

impl Key {
    #[must_use]
    pub fn new(name: &str) -> Self {
        if name.chars().count() == 1 {
            Self(name.to_lowercase())
        } else {
            Self(name.to_string())
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Control or Meta (Command on macOS).
    #[must_use]
    pub fn is_command(&self) -> bool {
        matches!(self.0.as_str(), "Control" | "Meta")
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Self::new(&name)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.0
    }
}

/// Keys currently held down.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PressedKeys {
    keys: BTreeSet<Key>,
}

impl PressedKeys {
    /// Record a key press. Returns `false` for auto-repeat of a held key.
    pub fn press(&mut self, key: Key) -> bool {
        self.keys.insert(key)
    }

    /// Record a key release. Returns `false` if the key was not held.
    pub fn release(&mut self, key: &Key) -> bool {
        self.keys.remove(key)
    }

    #[must_use]
    pub fn contains(&self, key: &Key) -> bool {
        self.keys.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether any of `keys` is held.
    #[must_use]
    pub fn any(&self, keys: &[Key]) -> bool {
        keys.iter().any(|k| self.keys.contains(k))
    }

    /// Whether Control or Meta is held.
    #[must_use]
    pub fn has_command(&self) -> bool {
        self.keys.iter().any(Key::is_command)
    }

    /// Release every key.
    pub fn clear(&mut self) {
        self.keys.clear();
    }
}

/// Session actions bound to single keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    LinkSelected,
    UnlinkSelected,
    MergeTracks,
    SplitTrack,
    ReorderForward,
    ReorderBackward,
    ReorderFront,
    ReorderBack,
    ToggleChecked,
    Commit,
    CancelLinkSession,
    Delete,
}

/// Key bindings for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Keymap {
    /// Single-key actions.
    pub actions: BTreeMap<Key, KeyAction>,
    /// Held while clicking to toggle labels in and out of the selection.
    pub multi_select: Vec<Key>,
    /// Held while creating to make a single label that never joins a track.
    pub fast_create: Vec<Key>,
    /// Pressed with Control/Meta to enter link-track mode.
    pub link_track: Key,
}

impl Default for Keymap {
    fn default() -> Self {
        let actions = [
            ("l", KeyAction::LinkSelected),
            ("u", KeyAction::UnlinkSelected),
            ("m", KeyAction::MergeTracks),
            ("x", KeyAction::SplitTrack),
            ("ArrowUp", KeyAction::ReorderForward),
            ("ArrowDown", KeyAction::ReorderBackward),
            ("f", KeyAction::ReorderFront),
            ("b", KeyAction::ReorderBack),
            ("c", KeyAction::ToggleChecked),
            ("Enter", KeyAction::Commit),
            ("Escape", KeyAction::CancelLinkSession),
            ("Delete", KeyAction::Delete),
            ("Backspace", KeyAction::Delete),
        ]
        .into_iter()
        .map(|(k, a)| (Key::new(k), a))
        .collect();

        Self {
            actions,
            multi_select: vec![Key::new("Control"), Key::new("Meta")],
            fast_create: vec![Key::new("Alt")],
            link_track: Key::new("l"),
        }
    }
}

impl Keymap {
    /// Action bound to `key`, if any.
    #[must_use]
    pub fn action(&self, key: &Key) -> Option<KeyAction> {
        self.actions.get(key).copied()
    }

    #[must_use]
    pub fn is_multi_select(&self, pressed: &PressedKeys) -> bool {
        pressed.any(&self.multi_select)
    }

    #[must_use]
    pub fn is_fast_create(&self, pressed: &PressedKeys) -> bool {
        pressed.any(&self.fast_create)
    }
}

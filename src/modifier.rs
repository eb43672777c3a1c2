//! Modifier sub-sessions.
//!
//! While a modifier is active it receives every key-down and every click, and
//! the session does nothing else with them. A modifier answers each event
//! with a `Reaction`: commands to dispatch, notices to show, and whether it
//! is done. The session tears it down when `finished` is set.

#[cfg(test)]
#[path = "modifier_test.rs"]
mod modifier_test;

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::command::Command;
use crate::doc::{ItemIndex, Label, LabelId, State};
use crate::input::Key;
use crate::notice::Notice;
use crate::track;

/// Outcome of one event handled by a modifier.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reaction {
    pub commands: Vec<Command>,
    pub notices: Vec<Notice>,
    /// The modifier is done and should be removed.
    pub finished: bool,
}

impl Reaction {
    fn finished() -> Self {
        Self { finished: true, ..Default::default() }
    }
}

/// Link-track mode: collect at most one label per item, then link them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTrack {
    picks: BTreeMap<ItemIndex, LabelId>,
}

impl LinkTrack {
    /// Start with `seed` already picked.
    #[must_use]
    pub fn new(seed: Option<&Label>) -> Self {
        let mut picks = BTreeMap::new();
        if let Some(label) = seed {
            picks.insert(label.item, label.id);
        }
        Self { picks }
    }

    #[must_use]
    pub fn picks(&self) -> &BTreeMap<ItemIndex, LabelId> {
        &self.picks
    }

    fn on_key_down(&self, key: &Key, state: &State) -> Reaction {
        match key.name() {
            "Enter" => {
                let ids: Vec<LabelId> = self.picks.values().copied().collect();
                let item = self.picks.keys().next().copied().unwrap_or(state.user.current_item);
                match track::link(state, item, &ids) {
                    Ok(patch) => {
                        info!(labels = ids.len(), "modifier: link track");
                        Reaction { commands: vec![Command::LinkLabels { patch }], notices: Vec::new(), finished: true }
                    }
                    Err(e) => {
                        warn!(error = %e, "modifier: link rejected");
                        Reaction { commands: Vec::new(), notices: vec![Notice::warning(&e)], finished: true }
                    }
                }
            }
            "Escape" => Reaction::finished(),
            _ => Reaction::default(),
        }
    }

    /// Clicking a picked label un-picks it; clicking another label on the
    /// same item replaces the pick.
    fn on_click_handler(&mut self, label: &Label) -> Reaction {
        if self.picks.get(&label.item) == Some(&label.id) {
            self.picks.remove(&label.item);
        } else {
            self.picks.insert(label.item, label.id);
        }
        Reaction::default()
    }
}

/// A modifier sub-session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modifier {
    LinkTrack(LinkTrack),
}

impl Modifier {
    /// Handle a key-down. Only called while the modifier is active.
    #[must_use]
    pub fn on_key_down(&mut self, key: &Key, state: &State) -> Reaction {
        match self {
            Self::LinkTrack(m) => m.on_key_down(key, state),
        }
    }

    /// Handle a click on `label` at `handle`.
    pub fn on_click_handler(&mut self, label: &Label, _handle: usize) -> Reaction {
        match self {
            Self::LinkTrack(m) => m.on_click_handler(label),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::LinkTrack(_) => "link_track",
        }
    }
}

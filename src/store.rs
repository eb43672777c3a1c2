//! In-memory command bus.
//!
//! DESIGN
//! ======
//! `Store` applies each command to a clone of the current snapshot and swaps
//! in the result, so readers holding an older `Arc<State>` never observe a
//! partial update. Every dispatched command is kept in `history` for replay
//! output and tests.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::sync::Arc;

use tracing::debug;

use crate::command::{Command, CommandBus, Patch};
use crate::doc::State;

/// Reference `CommandBus` holding the project in memory.
#[derive(Debug, Default)]
pub struct Store {
    state: Arc<State>,
    history: Vec<Command>,
}

impl Store {
    #[must_use]
    pub fn new(state: State) -> Self {
        Self { state: Arc::new(state), history: Vec::new() }
    }

    /// Commands dispatched so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[Command] {
        &self.history
    }

    /// Drain the recorded commands.
    pub fn take_history(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.history)
    }
}

impl CommandBus for Store {
    fn dispatch(&mut self, command: Command) {
        debug!(command = command.name(), "store: dispatch");
        self.state = Arc::new(reduce(&self.state, &command));
        self.history.push(command);
    }

    fn state(&self) -> Arc<State> {
        Arc::clone(&self.state)
    }
}

/// Apply one command to a snapshot, producing the next snapshot.
#[must_use]
pub fn reduce(state: &State, command: &Command) -> State {
    let mut next = state.clone();
    match command {
        Command::AddLabel { patch }
        | Command::CommitLabels { patch }
        | Command::LinkLabels { patch }
        | Command::UnlinkLabels { patch }
        | Command::MergeTracks { patch }
        | Command::SplitTrack { patch } => apply_patch(&mut next, patch),
        Command::ChangeLabelProps { item, changes } => {
            if let Some(item) = next.items.get_mut(*item) {
                for (id, props) in changes {
                    if let Some(label) = item.labels.get_mut(id) {
                        label.apply_props(props);
                        label.changed = true;
                    }
                }
            }
        }
        Command::DeleteLabels { item, label_ids } => {
            for id in label_ids {
                next.remove_label(*item, id);
                if let Some(selected) = next.user.selection.get_mut(item) {
                    selected.remove(id);
                }
            }
            next.user.selection.retain(|_, ids| !ids.is_empty());
        }
        Command::SelectLabels { selection } => {
            next.user.selection.clone_from(selection);
        }
        Command::UnselectLabels => next.user.selection.clear(),
        Command::StartLinkSession => next.session.track_linking = true,
        Command::StopLinkSession => next.session.track_linking = false,
        Command::GoToItem { index } => {
            if *index < next.items.len() {
                next.user.current_item = *index;
            }
        }
    }
    next
}

fn apply_patch(state: &mut State, patch: &Patch) {
    for shape in &patch.shapes {
        state.upsert_shape(shape.clone());
    }
    for label in &patch.labels {
        state.upsert_label(label.clone());
    }
    for track in &patch.tracks {
        state.tracks.insert(track.id, track.clone());
    }
    for id in &patch.removed_tracks {
        state.tracks.remove(id);
    }
}

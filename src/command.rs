//! Commands sent to the external state store, and the bus that carries them.
//!
//! The engines never write the snapshot. They produce `Command`s (most of
//! which carry a `Patch`: the full records to upsert or remove) and hand them
//! to a `CommandBus`. The bus is passed into the session explicitly so tests
//! can run independent instances side by side.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::doc::{ItemIndex, Label, LabelId, LabelProps, Shape, State, Track, TrackId};

/// A committable set of label, shape and track changes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    /// Labels to insert or replace (full records).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<Label>,
    /// Shapes to insert or replace (full records).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shapes: Vec<Shape>,
    /// Tracks to insert or replace (full records).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tracks: Vec<Track>,
    /// Tracks to delete.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_tracks: Vec<TrackId>,
}

impl Patch {
    /// `true` when the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.shapes.is_empty() && self.tracks.is_empty() && self.removed_tracks.is_empty()
    }

    /// Fold another patch into this one. Later records for the same id win.
    pub fn extend(&mut self, other: Patch) {
        for label in other.labels {
            self.labels.retain(|l| l.id != label.id);
            self.labels.push(label);
        }
        for shape in other.shapes {
            self.shapes.retain(|s| s.id != shape.id);
            self.shapes.push(shape);
        }
        for track in other.tracks {
            self.tracks.retain(|t| t.id != track.id);
            self.tracks.push(track);
        }
        for id in other.removed_tracks {
            if !self.removed_tracks.contains(&id) {
                self.removed_tracks.push(id);
            }
        }
    }
}

/// A discrete, serializable command for the state store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// A newly created label, its shapes and (when tracking) its new track
    /// and propagated copies.
    AddLabel { patch: Patch },
    /// Finalized edits to existing labels, including interpolated frames.
    CommitLabels { patch: Patch },
    /// Sparse property changes to labels on one item.
    ChangeLabelProps { item: ItemIndex, changes: Vec<(LabelId, LabelProps)> },
    /// Remove labels from one item.
    DeleteLabels { item: ItemIndex, label_ids: Vec<LabelId> },
    LinkLabels { patch: Patch },
    UnlinkLabels { patch: Patch },
    MergeTracks { patch: Patch },
    SplitTrack { patch: Patch },
    /// Replace the selection.
    SelectLabels { selection: BTreeMap<ItemIndex, BTreeSet<LabelId>> },
    /// Clear the selection.
    UnselectLabels,
    StartLinkSession,
    StopLinkSession,
    /// Show a different item.
    GoToItem { index: ItemIndex },
}

impl Command {
    /// Short name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::AddLabel { .. } => "add_label",
            Self::CommitLabels { .. } => "commit_labels",
            Self::ChangeLabelProps { .. } => "change_label_props",
            Self::DeleteLabels { .. } => "delete_labels",
            Self::LinkLabels { .. } => "link_labels",
            Self::UnlinkLabels { .. } => "unlink_labels",
            Self::MergeTracks { .. } => "merge_tracks",
            Self::SplitTrack { .. } => "split_track",
            Self::SelectLabels { .. } => "select_labels",
            Self::UnselectLabels => "unselect_labels",
            Self::StartLinkSession => "start_link_session",
            Self::StopLinkSession => "stop_link_session",
            Self::GoToItem { .. } => "go_to_item",
        }
    }
}

/// The sole writer of durable state.
pub trait CommandBus {
    /// Submit one command. The bus may apply it later.
    fn dispatch(&mut self, command: Command);

    /// Latest snapshot known to the bus.
    fn state(&self) -> Arc<State>;
}

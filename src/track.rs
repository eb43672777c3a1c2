//! Track linking: link, unlink, merge and split.
//!
//! DESIGN
//! ======
//! Every operation reads the snapshot and returns a `Patch` for the command
//! bus, or a `TrackError` when the result would break the one-label-per-item
//! rule. Conflicts are detected before any record is built, so a rejected
//! operation produces nothing at all.
//!
//! Labels named by id are looked up on the given item first and then across
//! the sequence, because a selection made in link mode can span items.

#[cfg(test)]
#[path = "track_test.rs"]
mod track_test;

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::command::Patch;
use crate::doc::{ItemIndex, Label, LabelId, State, Track, TrackId};
use crate::notice::ErrorCode;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackError {
    #[error("tracks overlap on item {item}")]
    Conflict { item: ItemIndex },
    #[error("linking needs at least two labels")]
    NotEnoughLabels,
    #[error("merging needs at least two tracks")]
    NotEnoughTracks,
    #[error("label {0} was created as a single label and cannot join a track")]
    SingleLabel(LabelId),
    #[error("label not found: {0}")]
    LabelNotFound(LabelId),
    #[error("track not found: {0}")]
    TrackNotFound(TrackId),
    #[error("track already exists: {0}")]
    TrackExists(TrackId),
}

impl ErrorCode for TrackError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Conflict { .. } => "E_TRACK_CONFLICT",
            Self::NotEnoughLabels => "E_NOT_ENOUGH_LABELS",
            Self::NotEnoughTracks => "E_NOT_ENOUGH_TRACKS",
            Self::SingleLabel(_) => "E_SINGLE_LABEL",
            Self::LabelNotFound(_) => "E_LABEL_NOT_FOUND",
            Self::TrackNotFound(_) => "E_TRACK_NOT_FOUND",
            Self::TrackExists(_) => "E_TRACK_EXISTS",
        }
    }
}

// =============================================================================
// LINK / UNLINK
// =============================================================================

/// Link labels into one track.
///
/// Each label contributes its whole track when it has one, or just itself.
/// The track is reused when exactly one label is tracked; otherwise a new
/// track is allocated and every absorbed track is removed.
///
/// # Errors
///
/// `NotEnoughLabels`, `LabelNotFound`, `SingleLabel`, or `Conflict` when two
/// contributions claim the same item.
pub fn link(state: &State, item: ItemIndex, label_ids: &[LabelId]) -> Result<Patch, TrackError> {
    let ids = dedup(label_ids);
    if ids.len() < 2 {
        return Err(TrackError::NotEnoughLabels);
    }

    let mut labels = Vec::with_capacity(ids.len());
    for id in &ids {
        let label = resolve(state, item, id).ok_or(TrackError::LabelNotFound(*id))?;
        if label.single {
            return Err(TrackError::SingleLabel(*id));
        }
        labels.push(label);
    }

    let mut existing: Vec<TrackId> = Vec::new();
    let mut union: BTreeMap<ItemIndex, LabelId> = BTreeMap::new();
    for label in &labels {
        let contribution = match label.track.and_then(|t| state.tracks.get(&t)) {
            Some(track) => {
                if existing.contains(&track.id) {
                    continue;
                }
                existing.push(track.id);
                track.labels.clone()
            }
            None => BTreeMap::from([(label.item, label.id)]),
        };
        insert_disjoint(&mut union, contribution)?;
    }

    let target = match existing.as_slice() {
        [only] => *only,
        _ => Uuid::new_v4(),
    };
    let track = Track { id: target, label_type: labels[0].label_type, labels: union };
    let mut patch = retarget(state, &track)?;
    patch.removed_tracks = existing.into_iter().filter(|t| *t != target).collect();
    patch.tracks.push(track);
    Ok(patch)
}

/// Remove labels from their tracks. Tracks left empty are deleted.
///
/// Untracked or unknown labels are skipped; the patch may be empty.
///
/// # Errors
///
/// Never fails today; kept fallible for parity with the other operations.
pub fn unlink(state: &State, item: ItemIndex, label_ids: &[LabelId]) -> Result<Patch, TrackError> {
    let mut patch = Patch::default();
    let mut touched: BTreeMap<TrackId, Track> = BTreeMap::new();

    for id in dedup(label_ids) {
        let Some(label) = resolve(state, item, &id) else {
            continue;
        };
        let Some(track_id) = label.track else {
            continue;
        };
        if let Some(track) = state.tracks.get(&track_id) {
            let track = touched.entry(track_id).or_insert_with(|| track.clone());
            track.labels.retain(|_, l| *l != id);
        }
        let mut label = label.clone();
        label.track = None;
        patch.labels.push(label);
    }

    for (id, track) in touched {
        if track.labels.is_empty() {
            patch.removed_tracks.push(id);
        } else {
            patch.tracks.push(track);
        }
    }
    Ok(patch)
}

// =============================================================================
// MERGE / SPLIT
// =============================================================================

/// Merge tracks into the first one. All-or-nothing.
///
/// # Errors
///
/// `NotEnoughTracks`, `TrackNotFound`, or `Conflict` when any item index
/// appears in more than one source track.
pub fn merge(state: &State, track_ids: &[TrackId]) -> Result<Patch, TrackError> {
    let ids = dedup(track_ids);
    if ids.len() < 2 {
        return Err(TrackError::NotEnoughTracks);
    }

    let mut union = BTreeMap::new();
    let mut sources = Vec::with_capacity(ids.len());
    for id in &ids {
        let track = state.tracks.get(id).ok_or(TrackError::TrackNotFound(*id))?;
        if let Some(item) = track.labels.keys().find(|item| union.contains_key(*item)) {
            return Err(TrackError::Conflict { item: *item });
        }
        union.extend(track.labels.iter().map(|(k, v)| (*k, *v)));
        sources.push(track);
    }

    let merged = Track { id: ids[0], label_type: sources[0].label_type, labels: union };
    let mut patch = retarget(state, &merged)?;
    patch.tracks.push(merged);
    patch.removed_tracks = ids[1..].to_vec();
    Ok(patch)
}

/// Move every entry at or after `at` into `new_track_id`.
///
/// A side left empty is not kept: splitting at or before the first member
/// moves everything and deletes the original; splitting past the last member
/// changes nothing.
///
/// # Errors
///
/// `TrackNotFound`, or `TrackExists` when `new_track_id` is already taken
/// (including by `track_id` itself).
pub fn split(state: &State, track_id: TrackId, new_track_id: TrackId, at: ItemIndex) -> Result<Patch, TrackError> {
    let track = state.tracks.get(&track_id).ok_or(TrackError::TrackNotFound(track_id))?;
    if state.tracks.contains_key(&new_track_id) {
        return Err(TrackError::TrackExists(new_track_id));
    }
    let mut early = track.labels.clone();
    let late = early.split_off(&at);

    let mut patch = Patch::default();
    if late.is_empty() {
        return Ok(patch);
    }
    if early.is_empty() {
        patch.removed_tracks.push(track_id);
    } else {
        patch.tracks.push(Track { id: track_id, label_type: track.label_type, labels: early });
    }

    let moved = Track { id: new_track_id, label_type: track.label_type, labels: late };
    patch.extend(retarget(state, &moved)?);
    patch.tracks.push(moved);
    Ok(patch)
}

// =============================================================================
// HELPERS
// =============================================================================

fn resolve<'a>(state: &'a State, item: ItemIndex, id: &LabelId) -> Option<&'a Label> {
    state
        .items
        .get(item)
        .and_then(|i| i.labels.get(id))
        .or_else(|| state.find_label(id))
}

fn dedup<T: Copy + Ord>(ids: &[T]) -> Vec<T> {
    let mut seen = BTreeSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

/// Add entries to `union`, rejecting any item already claimed by another label.
fn insert_disjoint(union: &mut BTreeMap<ItemIndex, LabelId>, entries: BTreeMap<ItemIndex, LabelId>) -> Result<(), TrackError> {
    for (item, label) in entries {
        match union.get(&item) {
            Some(existing) if *existing != label => return Err(TrackError::Conflict { item }),
            _ => {
                union.insert(item, label);
            }
        }
    }
    Ok(())
}

/// Label records rewritten to point at `track`, for members not already there.
fn retarget(state: &State, track: &Track) -> Result<Patch, TrackError> {
    let mut patch = Patch::default();
    for (item, id) in &track.labels {
        let label = state
            .items
            .get(*item)
            .and_then(|i| i.labels.get(id))
            .ok_or(TrackError::LabelNotFound(*id))?;
        if label.track != Some(track.id) {
            let mut label = label.clone();
            label.track = Some(track.id);
            patch.labels.push(label);
        }
    }
    Ok(patch)
}

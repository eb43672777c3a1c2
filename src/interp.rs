//! Keyframe interpolation along a track.
//!
//! DESIGN
//! ======
//! A track is a sparse set of manual keyframes with propagated frames in
//! between. When the user edits one frame, only the frames between the two
//! nearest manual keyframes are recomputed:
//!
//! - Editing a propagated (non-manual) frame turns it into a keyframe and
//!   copies its geometry across the open interval bounded by the nearest
//!   manual frames (or the track ends).
//! - Re-editing a manual keyframe interpolates each field linearly between
//!   the edited geometry and each neighbouring keyframe, by item position.
//!   A side with no neighbouring keyframe keeps its frames, unless the
//!   edited frame is the first or last member: then the edited geometry is
//!   copied across the open side to the other end of the track.
//!
//! Anchors are never rewritten. Incompatible geometries (different kinds or
//! point counts) fall back to the edited geometry.
//!
//! This is a pure function of its inputs so callers can run it for previews.

#[cfg(test)]
#[path = "interp_test.rs"]
mod interp_test;

use crate::doc::ItemIndex;
use crate::geom::Geometry;
use crate::notice::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterpError {
    #[error("item {0} is not part of the track")]
    NotInTrack(ItemIndex),
    #[error("item {0} appears twice in the track")]
    DuplicateItem(ItemIndex),
}

impl ErrorCode for InterpError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotInTrack(_) => "E_NOT_IN_TRACK",
            Self::DuplicateItem(_) => "E_DUPLICATE_ITEM",
        }
    }
}

/// One member frame of a track as seen before the edit.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFrame {
    pub item: ItemIndex,
    pub manual: bool,
    pub geometry: Geometry,
}

/// New geometry for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameUpdate {
    pub item: ItemIndex,
    pub geometry: Geometry,
}

/// Recompute the frames affected by editing `edited_item` to `edited`.
///
/// The result is ordered by item and always starts with, or contains, the
/// edited frame itself. Frames whose geometry is not recomputed are omitted.
///
/// # Errors
///
/// `NotInTrack` when `edited_item` has no frame, `DuplicateItem` when two
/// frames share an item.
pub fn interpolate(frames: &[TrackFrame], edited_item: ItemIndex, edited: &Geometry) -> Result<Vec<FrameUpdate>, InterpError> {
    let mut ordered: Vec<&TrackFrame> = frames.iter().collect();
    ordered.sort_by_key(|f| f.item);
    if let Some(pair) = ordered.windows(2).find(|w| w[0].item == w[1].item) {
        return Err(InterpError::DuplicateItem(pair[0].item));
    }

    let e = ordered
        .iter()
        .position(|f| f.item == edited_item)
        .ok_or(InterpError::NotInTrack(edited_item))?;
    let prev = ordered[..e].iter().rposition(|f| f.manual);
    let next = ordered[e + 1..].iter().position(|f| f.manual).map(|k| k + e + 1);

    let last = ordered.len() - 1;
    let mut updates = Vec::new();
    if ordered[e].manual {
        let before = match prev {
            Some(p) => blend(&ordered, p, e, &ordered[p].geometry, edited, true),
            None if e == last => fill(&ordered[..e], edited),
            None => Vec::new(),
        };
        let after = match next {
            Some(q) => blend(&ordered, e, q, edited, &ordered[q].geometry, false),
            None if e == 0 => fill(&ordered[e + 1..], edited),
            None => Vec::new(),
        };
        updates.extend(before);
        updates.push(FrameUpdate { item: edited_item, geometry: edited.clone() });
        updates.extend(after);
    } else {
        let lo = prev.map_or(0, |p| p + 1);
        let hi = next.unwrap_or(ordered.len());
        updates.extend(fill(&ordered[lo..hi], edited));
    }
    Ok(updates)
}

fn fill(frames: &[&TrackFrame], geometry: &Geometry) -> Vec<FrameUpdate> {
    frames
        .iter()
        .map(|f| FrameUpdate { item: f.item, geometry: geometry.clone() })
        .collect()
}

/// Interpolate the frames strictly between positions `lo` and `hi`.
/// Incompatible frames copy `end` when `fallback_end` is set, else `start`.
#[allow(clippy::cast_precision_loss)]
fn blend(
    ordered: &[&TrackFrame],
    lo: usize,
    hi: usize,
    start: &Geometry,
    end: &Geometry,
    fallback_end: bool,
) -> Vec<FrameUpdate> {
    let span = (ordered[hi].item - ordered[lo].item) as f64;
    let fallback = if fallback_end { end } else { start };
    ordered[lo + 1..hi]
        .iter()
        .map(|f| {
            let t = (f.item - ordered[lo].item) as f64 / span;
            let geometry = start.lerp(end, t).unwrap_or_else(|| fallback.clone());
            FrameUpdate { item: f.item, geometry }
        })
        .collect()
}

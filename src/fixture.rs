//! Builders for test snapshots.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::doc::{ItemIndex, Label, LabelId, LabelType, Shape, State, Track, TrackId};
use crate::geom::{Geometry, Rect2D};

/// Square rectangle with its top-left corner at `(v, v)`.
pub fn rect(v: f64) -> Geometry {
    Geometry::Rect(Rect2D::new(v, v, v + 10.0, v + 10.0))
}

/// Insert a manual box label with one shape on `item`, stacked on top.
pub fn add_label(state: &mut State, item: ItemIndex, geometry: Geometry) -> LabelId {
    let id = Uuid::new_v4();
    let shape_id = Uuid::new_v4();
    let order = state.items[item].max_order() + 1;
    let mut label = Label::new(id, item, LabelType::Box2d);
    label.shapes = vec![shape_id];
    label.order = order;
    state.upsert_shape(Shape { id: shape_id, item, label_ids: vec![id], geometry });
    state.upsert_label(label);
    id
}

/// Build a track with one label on each of `items`. Labels on `manual` are
/// flagged manual, the rest propagated. Geometry on item `i` is `rect(i)`.
#[allow(clippy::cast_precision_loss)]
pub fn add_track(state: &mut State, items: &[ItemIndex], manual: &[ItemIndex]) -> (TrackId, Vec<LabelId>) {
    let track_id = Uuid::new_v4();
    let mut labels = BTreeMap::new();
    let mut ids = Vec::new();
    for &item in items {
        let id = add_label(state, item, rect(item as f64));
        let label = state.items[item].labels.get_mut(&id);
        if let Some(label) = label {
            label.track = Some(track_id);
            label.manual = manual.contains(&item);
        }
        labels.insert(item, id);
        ids.push(id);
    }
    state.tracks.insert(track_id, Track { id: track_id, label_type: LabelType::Box2d, labels });
    (track_id, ids)
}

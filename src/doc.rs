//! Document model: items, labels, shapes, tracks and the state snapshot.
//!
//! This module defines what an annotation project holds (`Item`, `Label`,
//! `Shape`, `Track`), a sparse-update type for label properties
//! (`LabelProps`), and the immutable snapshot (`State`) that every engine
//! reads from. Snapshots are shared as `Arc<State>`; the only writer is the
//! command bus, which builds a fresh snapshot per command.
//!
//! Labels hold shape ids rather than geometry so a shape can be shared by
//! several labels without duplicating data when tracks are linked.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geom::Geometry;
use crate::notice::ErrorCode;

/// Position of an item in the sequence.
pub type ItemIndex = usize;
/// Unique identifier for a label.
pub type LabelId = Uuid;
/// Unique identifier for a shape.
pub type ShapeId = Uuid;
/// Unique identifier for a track.
pub type TrackId = Uuid;
/// Identifier of a sensor (camera) feeding the items.
pub type SensorId = i32;

// =============================================================================
// ERRORS
// =============================================================================

/// Lookup failure against the snapshot. Always a caller precondition violation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("item not found: {0}")]
    ItemNotFound(ItemIndex),
    #[error("label {label} not found on item {item}")]
    LabelNotFound { item: ItemIndex, label: LabelId },
    #[error("track not found: {0}")]
    TrackNotFound(TrackId),
    #[error("sensor not found: {0}")]
    SensorNotFound(SensorId),
}

impl ErrorCode for StateError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ItemNotFound(_) => "E_ITEM_NOT_FOUND",
            Self::LabelNotFound { .. } => "E_LABEL_NOT_FOUND",
            Self::TrackNotFound(_) => "E_TRACK_NOT_FOUND",
            Self::SensorNotFound(_) => "E_SENSOR_NOT_FOUND",
        }
    }
}

// =============================================================================
// TYPES
// =============================================================================

/// The kind of geometry a label carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelType {
    /// Axis-aligned bounding box.
    #[default]
    Box2d,
    /// Closed polygon.
    Polygon2d,
    /// Open polyline.
    Polyline2d,
}

/// One annotated object on one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    /// Index of the owning item.
    pub item: ItemIndex,
    /// Sensors the label is visible on.
    #[serde(default)]
    pub sensors: Vec<SensorId>,
    pub label_type: LabelType,
    /// Path through the category tree.
    #[serde(default)]
    pub category: Vec<u32>,
    /// Attribute index to selected value indices.
    #[serde(default)]
    pub attributes: BTreeMap<u32, Vec<u32>>,
    #[serde(default)]
    pub parent: Option<LabelId>,
    #[serde(default)]
    pub children: Vec<LabelId>,
    /// Shapes owned by this label, by id.
    #[serde(default)]
    pub shapes: Vec<ShapeId>,
    /// Track this label belongs to, if any.
    #[serde(default)]
    pub track: Option<TrackId>,
    /// Stacking order within the item; lower values are drawn beneath.
    #[serde(default)]
    pub order: i64,
    /// Edited by the user rather than propagated.
    #[serde(default)]
    pub manual: bool,
    #[serde(default)]
    pub changed: bool,
    #[serde(default)]
    pub checked: bool,
    /// Created with the fast-create key; never placed in a track.
    #[serde(default)]
    pub single: bool,
}

impl Label {
    /// A fresh manual label with no shapes.
    #[must_use]
    pub fn new(id: LabelId, item: ItemIndex, label_type: LabelType) -> Self {
        Self {
            id,
            item,
            sensors: Vec::new(),
            label_type,
            category: Vec::new(),
            attributes: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
            shapes: Vec::new(),
            track: None,
            order: 0,
            manual: true,
            changed: false,
            checked: false,
            single: false,
        }
    }

    /// Apply a sparse property update.
    pub fn apply_props(&mut self, props: &LabelProps) {
        if let Some(ref category) = props.category {
            self.category.clone_from(category);
        }
        if let Some(ref attributes) = props.attributes {
            for (k, v) in attributes {
                if v.is_empty() {
                    self.attributes.remove(k);
                } else {
                    self.attributes.insert(*k, v.clone());
                }
            }
        }
        if let Some(order) = props.order {
            self.order = order;
        }
        if let Some(manual) = props.manual {
            self.manual = manual;
        }
        if let Some(checked) = props.checked {
            self.checked = checked;
        }
        if let Some(track) = props.track {
            self.track = track;
        }
    }
}

/// Sparse update for a label. Only present fields are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelProps {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<Vec<u32>>,
    /// Attribute values to set; an empty list removes the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<u32, Vec<u32>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    /// `Some(None)` detaches the label from its track.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track: Option<Option<TrackId>>,
}

/// Concrete geometry owned by an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub item: ItemIndex,
    /// Labels referencing this shape. More than one only for shared polygons.
    pub label_ids: Vec<LabelId>,
    pub geometry: Geometry,
}

/// One frame or image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub index: ItemIndex,
    /// Source URL per sensor.
    #[serde(default)]
    pub urls: BTreeMap<SensorId, String>,
    #[serde(default)]
    pub labels: HashMap<LabelId, Label>,
    #[serde(default)]
    pub shapes: HashMap<ShapeId, Shape>,
}

impl Item {
    #[must_use]
    pub fn new(index: ItemIndex) -> Self {
        Self { index, ..Default::default() }
    }

    /// Labels sorted by `(order, id)` for draw order.
    #[must_use]
    pub fn sorted_labels(&self) -> Vec<&Label> {
        let mut labels: Vec<&Label> = self.labels.values().collect();
        labels.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        labels
    }

    /// Geometry of the label's first shape.
    #[must_use]
    pub fn geometry(&self, label: &LabelId) -> Option<&Geometry> {
        let label = self.labels.get(label)?;
        let shape_id = label.shapes.first()?;
        self.shapes.get(shape_id).map(|s| &s.geometry)
    }

    /// Shapes owned by the label, in label order. Missing ids are skipped.
    #[must_use]
    pub fn shapes_of(&self, label: &Label) -> Vec<Shape> {
        label.shapes.iter().filter_map(|id| self.shapes.get(id)).cloned().collect()
    }

    /// Highest `order` on the item, or `-1` when empty.
    #[must_use]
    pub fn max_order(&self) -> i64 {
        self.labels.values().map(|l| l.order).max().unwrap_or(-1)
    }
}

/// Cross-item identity for one physical object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub label_type: LabelType,
    /// At most one label per item.
    pub labels: BTreeMap<ItemIndex, LabelId>,
}

/// A sensor (camera) feeding the item sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    pub name: String,
}

/// Per-user view state carried in the snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserState {
    /// Item currently shown.
    pub current_item: ItemIndex,
    /// Selected label ids per item.
    #[serde(default)]
    pub selection: BTreeMap<ItemIndex, BTreeSet<LabelId>>,
}

/// Project-wide session flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    /// Link-track mode is active in some view.
    pub track_linking: bool,
}

/// Immutable snapshot of the whole project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub items: Vec<Item>,
    #[serde(default)]
    pub tracks: BTreeMap<TrackId, Track>,
    #[serde(default)]
    pub sensors: BTreeMap<SensorId, Sensor>,
    #[serde(default)]
    pub user: UserState,
    #[serde(default)]
    pub session: SessionStatus,
}

impl State {
    /// A project with `count` empty items.
    #[must_use]
    pub fn with_items(count: usize) -> Self {
        Self { items: (0..count).map(Item::new).collect(), ..Default::default() }
    }

    /// Look up an item by index.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` when the index is out of range.
    pub fn item(&self, index: ItemIndex) -> Result<&Item, StateError> {
        self.items.get(index).ok_or(StateError::ItemNotFound(index))
    }

    /// The item currently shown.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` when the snapshot points past the sequence.
    pub fn current_item(&self) -> Result<&Item, StateError> {
        self.item(self.user.current_item)
    }

    /// Look up a label on a given item.
    ///
    /// # Errors
    ///
    /// Returns `ItemNotFound` or `LabelNotFound`.
    pub fn label(&self, item: ItemIndex, id: &LabelId) -> Result<&Label, StateError> {
        self.item(item)?
            .labels
            .get(id)
            .ok_or(StateError::LabelNotFound { item, label: *id })
    }

    /// Find a label anywhere in the sequence.
    #[must_use]
    pub fn find_label(&self, id: &LabelId) -> Option<&Label> {
        self.items.iter().find_map(|item| item.labels.get(id))
    }

    /// Look up a track.
    ///
    /// # Errors
    ///
    /// Returns `TrackNotFound`.
    pub fn track(&self, id: &TrackId) -> Result<&Track, StateError> {
        self.tracks.get(id).ok_or(StateError::TrackNotFound(*id))
    }

    /// Look up a sensor.
    ///
    /// # Errors
    ///
    /// Returns `SensorNotFound`.
    pub fn sensor(&self, id: SensorId) -> Result<&Sensor, StateError> {
        self.sensors.get(&id).ok_or(StateError::SensorNotFound(id))
    }

    /// Labels grouped with `id` through parent/children links on its item:
    /// the root ancestor and all of its descendants. A label with no links
    /// forms a group of one. Returns an empty list for unknown ids.
    #[must_use]
    pub fn linked_group(&self, item: ItemIndex, id: &LabelId) -> Vec<LabelId> {
        let Ok(item) = self.item(item) else {
            return Vec::new();
        };
        let Some(mut root) = item.labels.get(id) else {
            return Vec::new();
        };
        let mut seen = BTreeSet::new();
        while let Some(parent) = root.parent.and_then(|p| item.labels.get(&p)) {
            if !seen.insert(parent.id) {
                break;
            }
            root = parent;
        }

        let mut group = Vec::new();
        let mut stack = vec![root.id];
        let mut visited = BTreeSet::new();
        while let Some(next) = stack.pop() {
            if !visited.insert(next) {
                continue;
            }
            if let Some(label) = item.labels.get(&next) {
                group.push(label.id);
                stack.extend(label.children.iter().rev().copied());
            }
        }
        group
    }

    /// Whether every entry of the track points at a label on that item which
    /// in turn points back at the track.
    #[must_use]
    pub fn track_is_consistent(&self, id: &TrackId) -> bool {
        let Some(track) = self.tracks.get(id) else {
            return false;
        };
        !track.labels.is_empty()
            && track.labels.iter().all(|(item, label)| {
                self.label(*item, label).is_ok_and(|l| l.item == *item && l.track == Some(*id))
            })
    }

    // --- Mutation helpers used by the command bus ---

    /// Insert or replace a label on its item. Unknown items are ignored.
    pub fn upsert_label(&mut self, label: Label) {
        if let Some(item) = self.items.get_mut(label.item) {
            item.labels.insert(label.id, label);
        }
    }

    /// Insert or replace a shape on its item. Unknown items are ignored.
    pub fn upsert_shape(&mut self, shape: Shape) {
        if let Some(item) = self.items.get_mut(shape.item) {
            item.shapes.insert(shape.id, shape);
        }
    }

    /// Remove a label, the shapes only it referenced, and its track entry.
    /// Tracks left empty are deleted.
    pub fn remove_label(&mut self, item_index: ItemIndex, id: &LabelId) -> Option<Label> {
        let item = self.items.get_mut(item_index)?;
        let label = item.labels.remove(id)?;
        for shape_id in &label.shapes {
            let orphaned = item.shapes.get_mut(shape_id).is_some_and(|shape| {
                shape.label_ids.retain(|l| l != id);
                shape.label_ids.is_empty()
            });
            if orphaned {
                item.shapes.remove(shape_id);
            }
        }
        if let Some(track_id) = label.track {
            let emptied = self.tracks.get_mut(&track_id).is_some_and(|track| {
                if track.labels.get(&item_index) == Some(id) {
                    track.labels.remove(&item_index);
                }
                track.labels.is_empty()
            });
            if emptied {
                self.tracks.remove(&track_id);
            }
        }
        Some(label)
    }
}

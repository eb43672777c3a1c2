//! Scratch labels the session edits before committing.
//!
//! A `Drawable` is a working copy of one label and its geometry, plus the
//! gesture it is in. The arena (`Drawables`) is keyed by label id so that
//! removing several labels in one pass never invalidates another lookup.
//! The renderer reads this arena; only the session writes it.
//!
//! Handles: `0` is the body. Boxes number their corners 1–4 clockwise from
//! the top-left; paths number their points from 1.

#[cfg(test)]
#[path = "drawable_test.rs"]
mod drawable_test;

use std::collections::HashMap;

use uuid::Uuid;

use crate::consts::{BODY_HANDLE, MIN_POLYGON_POINTS, MIN_POLYLINE_POINTS};
use crate::doc::{Item, Label, LabelId, LabelType, Shape, ShapeId};
use crate::geom::{Geometry, PathPoint, PathShape, Point, Rect2D};
use crate::input::Key;

/// What a drawable did with a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyResponse {
    /// Not interested; the session may run its own action.
    Ignored,
    /// Consumed by the label.
    Handled,
    /// The label asks to be thrown away.
    Discard,
}

/// Gesture a drawable is in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Phase {
    /// At rest.
    Idle,
    /// A path being clicked out point by point.
    Creating,
    /// A handle held down.
    Dragging {
        handle: usize,
        /// Pointer position at the previous event.
        last: Point,
    },
}

/// Working copy of one label.
#[derive(Debug, Clone)]
pub struct Drawable {
    label: Label,
    shape_id: ShapeId,
    geometry: Option<Geometry>,
    phase: Phase,
    /// Rubber-band point while creating a path.
    cursor: Option<Point>,
    /// Present in the committed snapshot.
    committed: bool,
    dirty: bool,
    highlighted: bool,
    min_box_size: f64,
}

impl Drawable {
    /// Working copy of a committed label.
    #[must_use]
    pub fn from_item(label: &Label, item: &Item, min_box_size: f64) -> Self {
        let shape_id = label.shapes.first().copied().unwrap_or_else(Uuid::new_v4);
        Self {
            label: label.clone(),
            shape_id,
            geometry: item.geometry(&label.id).cloned(),
            phase: Phase::Idle,
            cursor: None,
            committed: true,
            dirty: false,
            highlighted: false,
            min_box_size,
        }
    }

    /// Start creating `label` at `at`. Boxes are dragged out from their
    /// top-left corner; paths collect points on each click.
    #[must_use]
    pub fn create(label: Label, at: Point, min_box_size: f64) -> Self {
        let (geometry, phase) = match label.label_type {
            LabelType::Box2d => (Geometry::Rect(Rect2D::at(at)), Phase::Dragging { handle: 3, last: at }),
            LabelType::Polygon2d | LabelType::Polyline2d => {
                (Geometry::Path(PathShape { points: Vec::new(), closed: false }), Phase::Creating)
            }
        };
        Self {
            label,
            shape_id: Uuid::new_v4(),
            geometry: Some(geometry),
            phase,
            cursor: Some(at),
            committed: false,
            dirty: true,
            highlighted: false,
            min_box_size,
        }
    }

    // --- Queries ---

    #[must_use]
    pub fn id(&self) -> LabelId {
        self.label.id
    }

    #[must_use]
    pub fn label(&self) -> &Label {
        &self.label
    }

    #[must_use]
    pub fn geometry(&self) -> Option<&Geometry> {
        self.geometry.as_ref()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn cursor(&self) -> Option<Point> {
        self.cursor
    }

    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn is_highlighted(&self) -> bool {
        self.highlighted
    }

    /// Mid-gesture: a handle is held or a path is still being clicked out.
    #[must_use]
    pub fn is_editing(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    /// Has the minimum geometry to be committed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        match (&self.geometry, self.label.label_type) {
            (Some(Geometry::Rect(r)), _) => r.width() >= self.min_box_size && r.height() >= self.min_box_size,
            (Some(Geometry::Path(p)), LabelType::Polygon2d) => p.closed && p.points.len() >= MIN_POLYGON_POINTS,
            (Some(Geometry::Path(p)), _) => p.points.len() >= MIN_POLYLINE_POINTS,
            (None, _) => false,
        }
    }

    /// Label record as it should be committed.
    #[must_use]
    pub fn to_label(&self) -> Label {
        let mut label = self.label.clone();
        label.shapes = vec![self.shape_id];
        label
    }

    /// Shape records as they should be committed.
    #[must_use]
    pub fn shapes(&self) -> Vec<Shape> {
        self.geometry
            .iter()
            .map(|geometry| Shape {
                id: self.shape_id,
                item: self.label.item,
                label_ids: vec![self.label.id],
                geometry: geometry.clone(),
            })
            .collect()
    }

    // --- Mutations ---

    pub fn set_highlighted(&mut self, highlighted: bool) {
        self.highlighted = highlighted;
    }

    /// Record that the label reached the store.
    pub fn mark_committed(&mut self) {
        self.committed = true;
        self.dirty = false;
    }

    /// Stop a path being created: polygons close if they have enough points.
    pub fn finish(&mut self) {
        if self.phase != Phase::Creating {
            return;
        }
        if let Some(Geometry::Path(path)) = self.geometry.as_mut() {
            if self.label.label_type == LabelType::Polygon2d && path.points.len() >= MIN_POLYGON_POINTS {
                path.closed = true;
            }
        }
        self.phase = Phase::Idle;
        self.cursor = None;
    }

    // --- Pointer / key handlers ---

    /// Pointer pressed. `handle` is set only when this label is the target.
    pub fn on_pointer_down(&mut self, at: Point, handle: Option<usize>) -> bool {
        match self.phase {
            Phase::Creating | Phase::Dragging { .. } => true,
            Phase::Idle => match handle {
                Some(handle) if self.geometry.is_some() => {
                    self.phase = Phase::Dragging { handle, last: at };
                    true
                }
                _ => false,
            },
        }
    }

    /// Pointer moved while this label is selected.
    pub fn on_pointer_move(&mut self, at: Point) -> bool {
        match self.phase {
            Phase::Idle => false,
            Phase::Creating => {
                self.cursor = Some(at);
                true
            }
            Phase::Dragging { handle, last } => {
                if let Some(geometry) = self.geometry.as_mut() {
                    drag(geometry, handle, last, at);
                }
                self.phase = Phase::Dragging { handle, last: at };
                self.touch();
                true
            }
        }
    }

    /// Pointer released. `handle` is set only when this label is the target.
    pub fn on_pointer_up(&mut self, at: Point, handle: Option<usize>) -> bool {
        match self.phase {
            Phase::Idle => false,
            Phase::Dragging { .. } => {
                if let Some(Geometry::Rect(r)) = self.geometry.as_mut() {
                    *r = r.normalized();
                }
                self.phase = Phase::Idle;
                true
            }
            Phase::Creating => {
                let polygon = self.label.label_type == LabelType::Polygon2d;
                let Some(Geometry::Path(path)) = self.geometry.as_mut() else {
                    return false;
                };
                let count = path.points.len();
                if polygon && handle == Some(1) && count >= MIN_POLYGON_POINTS {
                    path.closed = true;
                    self.phase = Phase::Idle;
                    self.cursor = None;
                } else if !polygon && count >= MIN_POLYLINE_POINTS && handle == Some(count) {
                    self.phase = Phase::Idle;
                    self.cursor = None;
                } else {
                    path.points.push(PathPoint::vertex(at));
                }
                self.touch();
                true
            }
        }
    }

    /// Key pressed while this label is selected and it is the only key down.
    pub fn on_key_down(&mut self, key: &Key) -> KeyResponse {
        if self.phase != Phase::Creating {
            return KeyResponse::Ignored;
        }
        match key.name() {
            "Escape" => KeyResponse::Discard,
            "Backspace" => {
                let Some(Geometry::Path(path)) = self.geometry.as_mut() else {
                    return KeyResponse::Ignored;
                };
                path.points.pop();
                if path.points.is_empty() { KeyResponse::Discard } else { KeyResponse::Handled }
            }
            _ => KeyResponse::Ignored,
        }
    }

    fn touch(&mut self) {
        self.dirty = true;
        self.label.manual = true;
        self.label.changed = true;
    }
}

fn drag(geometry: &mut Geometry, handle: usize, last: Point, at: Point) {
    let (dx, dy) = (at.x - last.x, at.y - last.y);
    match geometry {
        Geometry::Rect(r) if handle == BODY_HANDLE => r.translate(dx, dy),
        Geometry::Rect(r) => r.set_corner(handle, at),
        Geometry::Path(p) if handle == BODY_HANDLE => {
            for point in &mut p.points {
                point.x += dx;
                point.y += dy;
            }
        }
        Geometry::Path(p) => {
            if let Some(point) = p.points.get_mut(handle - 1) {
                point.x = at.x;
                point.y = at.y;
            }
        }
    }
}

/// Arena of drawables keyed by label id.
#[derive(Debug, Clone, Default)]
pub struct Drawables {
    labels: HashMap<LabelId, Drawable>,
}

impl Drawables {
    pub fn insert(&mut self, drawable: Drawable) {
        self.labels.insert(drawable.id(), drawable);
    }

    pub fn remove(&mut self, id: &LabelId) -> Option<Drawable> {
        self.labels.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &LabelId) -> Option<&Drawable> {
        self.labels.get(id)
    }

    pub fn get_mut(&mut self, id: &LabelId) -> Option<&mut Drawable> {
        self.labels.get_mut(id)
    }

    #[must_use]
    pub fn contains(&self, id: &LabelId) -> bool {
        self.labels.contains_key(id)
    }

    /// Drawables sorted by `(order, id)` for draw order.
    #[must_use]
    pub fn sorted(&self) -> Vec<&Drawable> {
        let mut all: Vec<&Drawable> = self.labels.values().collect();
        all.sort_by(|a, b| a.label.order.cmp(&b.label.order).then_with(|| a.id().cmp(&b.id())));
        all
    }

    /// Highest `order` in the arena, or `-1` when empty.
    #[must_use]
    pub fn max_order(&self) -> i64 {
        self.labels.values().map(|d| d.label.order).max().unwrap_or(-1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Replace the arena with the labels on `item`. Drawables that are
    /// mid-gesture on the same item are kept as they are.
    pub fn rebuild(&mut self, item: &Item, min_box_size: f64) {
        let mut next: HashMap<LabelId, Drawable> = item
            .labels
            .values()
            .map(|label| (label.id, Drawable::from_item(label, item, min_box_size)))
            .collect();
        for (id, drawable) in self.labels.drain() {
            if drawable.is_editing() && drawable.label.item == item.index {
                next.insert(id, drawable);
            } else if drawable.highlighted {
                if let Some(fresh) = next.get_mut(&id) {
                    fresh.highlighted = true;
                }
            }
        }
        self.labels = next;
    }
}

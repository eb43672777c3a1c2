//! Interaction state machine for one annotation view.
//!
//! DESIGN
//! ======
//! The session turns raw pointer and keyboard events into label lifecycle
//! transitions. It owns the drawable arena, the pressed-key set, the
//! highlight and the selection; durable changes leave only as `Command`s on
//! the bus. Every event starts with `refresh`, which pulls the latest
//! snapshot and reconciles local state against it, so ids held across
//! events are always re-resolved before use.
//!
//! A modifier (link-track mode) captures every key-down and click while it
//! is active. It is entered with a Control/Meta chord and leaves on its own
//! by returning a finished `Reaction`.
//!
//! Handlers never fail. Stale ids are skipped, invalid geometry is dropped,
//! and engine rejections become warning `Notice`s for the host to show.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::command::{Command, CommandBus, Patch};
use crate::config::SessionConfig;
use crate::doc::{ItemIndex, Label, LabelId, LabelProps, Shape, State, StateError, Track, TrackId};
use crate::drawable::{Drawable, Drawables, KeyResponse};
use crate::geom::{Geometry, Point, Rect2D};
use crate::input::{Key, KeyAction, PressedKeys};
use crate::interp::{self, InterpError, TrackFrame};
use crate::modifier::{LinkTrack, Modifier, Reaction};
use crate::notice::{ErrorCode, Notice};
use crate::order::{self, Direction};
use crate::track;

/// Selected labels per item.
pub type Selection = BTreeMap<ItemIndex, BTreeSet<LabelId>>;

/// The label under the pointer and which of its handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    pub label: LabelId,
    pub handle: usize,
}

#[derive(Debug)]
struct ActiveModifier {
    modifier: Modifier,
    /// Highlight to put back when the modifier finishes.
    restore: Option<Highlight>,
}

/// Event-driven interaction state for one view.
pub struct Session<B: CommandBus> {
    bus: B,
    config: SessionConfig,
    state: Arc<State>,
    selected_item: ItemIndex,
    highlighted: Option<Highlight>,
    pressed: PressedKeys,
    modifier: Option<ActiveModifier>,
    selection: Selection,
    drawables: Drawables,
    notices: Vec<Notice>,
}

impl<B: CommandBus> Session<B> {
    #[must_use]
    pub fn new(bus: B, config: SessionConfig) -> Self {
        let state = bus.state();
        let mut drawables = Drawables::default();
        if let Ok(item) = state.current_item() {
            drawables.rebuild(item, config.min_box_size);
        }
        Self {
            selected_item: state.user.current_item,
            selection: state.user.selection.clone(),
            bus,
            config,
            state,
            highlighted: None,
            pressed: PressedKeys::default(),
            modifier: None,
            drawables,
            notices: Vec::new(),
        }
    }

    // --- Accessors ---

    #[must_use]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Snapshot as of the last event.
    #[must_use]
    pub fn state(&self) -> &Arc<State> {
        &self.state
    }

    #[must_use]
    pub fn selected_item(&self) -> ItemIndex {
        self.selected_item
    }

    #[must_use]
    pub fn highlighted(&self) -> Option<Highlight> {
        self.highlighted
    }

    #[must_use]
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn pressed(&self) -> &PressedKeys {
        &self.pressed
    }

    #[must_use]
    pub fn modifier(&self) -> Option<&Modifier> {
        self.modifier.as_ref().map(|m| &m.modifier)
    }

    /// Drawables on the current item in draw order.
    #[must_use]
    pub fn drawables(&self) -> Vec<&Drawable> {
        self.drawables.sorted()
    }

    /// Selected drawables on the current item in draw order.
    #[must_use]
    pub fn selected_drawables(&self) -> Vec<&Drawable> {
        let selected = self.selection.get(&self.selected_item);
        self.drawables
            .sorted()
            .into_iter()
            .filter(|d| selected.is_some_and(|s| s.contains(&d.id())))
            .collect()
    }

    /// A selected drawable is mid-gesture.
    #[must_use]
    pub fn is_editing(&self) -> bool {
        self.selected_ids()
            .iter()
            .any(|id| self.drawables.get(id).is_some_and(Drawable::is_editing))
    }

    /// Drain notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // --- Snapshot sync ---

    /// Pull the latest snapshot and reconcile local state with it.
    pub fn refresh(&mut self) {
        self.state = self.bus.state();
        let current = self.state.user.current_item;
        if current != self.selected_item {
            debug!(from = self.selected_item, to = current, "session: item changed");
            self.selected_item = current;
            self.set_highlight(None);
            if self.modifier.is_none() {
                self.selection.clear();
            }
        }

        match self.state.item(current) {
            Ok(item) => self.drawables.rebuild(item, self.config.min_box_size),
            Err(_) => self.drawables = Drawables::default(),
        }

        let state = &self.state;
        let drawables = &self.drawables;
        self.selection.retain(|item, ids| {
            ids.retain(|id| drawables.contains(id) || state.label(*item, id).is_ok());
            !ids.is_empty()
        });
        if self.highlighted.is_some_and(|h| !self.drawables.contains(&h.label)) {
            self.highlighted = None;
        }
    }

    /// Show another item.
    ///
    /// # Errors
    ///
    /// `ItemNotFound` when `index` is past the sequence.
    pub fn go_to_item(&mut self, index: ItemIndex) -> Result<(), StateError> {
        self.refresh();
        self.state.item(index)?;
        self.bus.dispatch(Command::GoToItem { index });
        self.refresh();
        Ok(())
    }

    // --- Pointer events ---

    /// Pointer pressed over `target` (the label under the pointer, if any)
    /// at `handle`. Returns whether a drawable consumed the event.
    pub fn on_pointer_down(&mut self, at: Point, target: Option<LabelId>, handle: usize) -> bool {
        self.refresh();
        if self.modifier.is_some() {
            return true;
        }
        if !self.is_editing() {
            if let Some(label) = target.filter(|id| self.drawables.contains(id)) {
                self.set_highlight(Some(Highlight { label, handle }));
            }
            if self.highlighted.is_some() {
                self.select_highlighted();
            } else if !self.config.keymap.is_multi_select(&self.pressed) {
                self.set_selection(Selection::new());
                self.begin_create(at);
            }
        }

        let mut consumed = false;
        for id in self.selected_ids() {
            if let Some(d) = self.drawables.get_mut(&id) {
                consumed |= d.on_pointer_down(at, (target == Some(id)).then_some(handle));
            }
        }
        consumed
    }

    /// Pointer released over `target` at `handle`. Finalizes and commits
    /// selected drawables, or forwards the click to the active modifier.
    pub fn on_pointer_up(&mut self, at: Point, target: Option<LabelId>, handle: usize) -> bool {
        self.refresh();
        if let Some(active) = self.modifier.as_mut() {
            let Some(label) = target.and_then(|id| self.state.find_label(&id)) else {
                return true;
            };
            let reaction = active.modifier.on_click_handler(label, handle);
            self.react(reaction);
            return true;
        }

        let ids = self.selected_ids();
        let mut consumed = false;
        for id in &ids {
            if let Some(d) = self.drawables.get_mut(id) {
                consumed |= d.on_pointer_up(at, (target == Some(*id)).then_some(handle));
            }
        }
        self.clear_highlight_flag();
        self.commit(&ids);
        consumed
    }

    /// Pointer moved. While a selected drawable is mid-gesture the clamped
    /// point goes to every selected drawable and `true` is returned;
    /// otherwise only the highlight follows `hovered`.
    pub fn on_pointer_move(&mut self, at: Point, bounds: &Rect2D, hovered: Option<LabelId>, hovered_handle: usize) -> bool {
        self.refresh();
        if self.modifier.is_none() && self.is_editing() {
            let at = at.clamp_to(bounds);
            for id in self.selected_ids() {
                if let Some(d) = self.drawables.get_mut(&id) {
                    d.on_pointer_move(at);
                }
            }
            return true;
        }
        let next = hovered
            .filter(|id| self.drawables.contains(id))
            .map(|label| Highlight { label, handle: hovered_handle });
        self.set_highlight(next);
        false
    }

    // --- Key events ---

    /// Key pressed. Returns whether the key was acted on.
    pub fn on_key_down(&mut self, key: &Key) -> bool {
        self.refresh();
        let fresh = self.pressed.press(key.clone());

        if let Some(active) = self.modifier.as_mut() {
            let reaction = active.modifier.on_key_down(key, &self.state);
            self.react(reaction);
            return true;
        }

        if self.pressed.len() > 1 {
            if fresh && self.pressed.has_command() && *key == self.config.keymap.link_track {
                self.start_link_track();
                return true;
            }
            debug!(key = key.name(), held = self.pressed.len(), "session: chord suppressed");
            return false;
        }

        let mut handled = false;
        let mut discarded = Vec::new();
        for id in self.selected_ids() {
            let Some(d) = self.drawables.get_mut(&id) else {
                continue;
            };
            match d.on_key_down(key) {
                KeyResponse::Ignored => {}
                KeyResponse::Handled => handled = true,
                KeyResponse::Discard => {
                    handled = true;
                    discarded.push(id);
                }
            }
        }
        if handled {
            self.discard(&discarded);
            return true;
        }

        match self.config.keymap.action(key) {
            Some(action) => {
                self.run_action(action);
                true
            }
            None => false,
        }
    }

    /// Key released. Returns `false` if the key was not held.
    pub fn on_key_up(&mut self, key: &Key) -> bool {
        self.refresh();
        self.pressed.release(key)
    }

    /// The host lost keyboard focus; no key-up will arrive for held keys.
    pub fn on_focus_lost(&mut self) {
        self.refresh();
        if !self.pressed.is_empty() {
            debug!(held = self.pressed.len(), "session: focus lost, releasing keys");
            self.pressed.clear();
        }
    }

    // --- Selection ---

    /// Promote the highlighted label's linked group to the selection.
    ///
    /// With the multi-select key held the group is toggled in or out;
    /// otherwise it replaces the selection unless it is already selected.
    pub fn select_highlighted(&mut self) {
        let Some(highlight) = self.highlighted else {
            return;
        };
        let item = self.selected_item;
        let mut group = self.state.linked_group(item, &highlight.label);
        if group.is_empty() {
            group.push(highlight.label);
        }

        let next = if self.config.keymap.is_multi_select(&self.pressed) {
            let mut next = self.selection.clone();
            let ids = next.entry(item).or_default();
            if group.iter().all(|id| ids.contains(id)) {
                for id in &group {
                    ids.remove(id);
                }
            } else {
                ids.extend(group);
            }
            next.retain(|_, ids| !ids.is_empty());
            next
        } else {
            Selection::from([(item, group.into_iter().collect())])
        };
        self.set_selection(next);
    }

    // --- Internals ---

    fn selected_ids(&self) -> Vec<LabelId> {
        self.selection
            .get(&self.selected_item)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    fn set_selection(&mut self, selection: Selection) {
        if selection == self.selection {
            return;
        }
        self.selection = selection;
        let command = if self.selection.is_empty() {
            Command::UnselectLabels
        } else {
            Command::SelectLabels { selection: self.selection.clone() }
        };
        self.bus.dispatch(command);
    }

    fn set_highlight(&mut self, next: Option<Highlight>) {
        if let Some(prev) = self.highlighted.take() {
            if let Some(d) = self.drawables.get_mut(&prev.label) {
                d.set_highlighted(false);
            }
        }
        if let Some(h) = next {
            if let Some(d) = self.drawables.get_mut(&h.label) {
                d.set_highlighted(true);
            }
        }
        self.highlighted = next;
    }

    /// Drop the hover styling but keep tracking the highlighted id, so a
    /// second click without a move still lands on the same label.
    fn clear_highlight_flag(&mut self) {
        if let Some(h) = self.highlighted {
            if let Some(d) = self.drawables.get_mut(&h.label) {
                d.set_highlighted(false);
            }
        }
    }

    fn begin_create(&mut self, at: Point) {
        let Ok(item) = self.state.current_item() else {
            return;
        };
        let mut label = Label::new(Uuid::new_v4(), item.index, self.config.label_type);
        label.category.clone_from(&self.config.category);
        label.order = item.max_order().max(self.drawables.max_order()) + 1;
        label.single = self.config.keymap.is_fast_create(&self.pressed);

        let item = item.index;
        let id = label.id;
        debug!(%id, item, label_type = ?label.label_type, single = label.single, "session: begin create");
        self.drawables.insert(Drawable::create(label, at, self.config.min_box_size));
        self.set_selection(Selection::from([(item, BTreeSet::from([id]))]));
    }

    /// Commit finished drawables among `ids`: new labels one `AddLabel` each,
    /// edits together in one `CommitLabels`. Invalid ones are dropped.
    fn commit(&mut self, ids: &[LabelId]) {
        let mut added = Vec::new();
        let mut edited = Patch::default();
        let mut invalid = Vec::new();
        let mut errors = Vec::new();

        for id in ids {
            let Some(d) = self.drawables.get(id) else {
                continue;
            };
            if d.is_editing() {
                continue;
            }
            if !d.is_valid() {
                invalid.push(*id);
            } else if !d.is_committed() {
                added.push(new_label_patch(&self.state, &self.config, d));
            } else if d.is_dirty() {
                let (patch, error) = edit_patch(&self.state, d);
                edited.extend(patch);
                errors.extend(error);
            }
        }

        for error in &errors {
            self.warn("interpolate", error);
        }
        if !invalid.is_empty() {
            debug!(count = invalid.len(), "session: dropped invalid labels");
            self.drop_local(&invalid);
        }
        if added.is_empty() && edited.is_empty() {
            return;
        }

        for patch in added {
            info!(labels = patch.labels.len(), tracks = patch.tracks.len(), "session: add label");
            self.bus.dispatch(Command::AddLabel { patch });
        }
        if !edited.is_empty() {
            info!(labels = edited.labels.len(), shapes = edited.shapes.len(), "session: commit labels");
            self.bus.dispatch(Command::CommitLabels { patch: edited });
        }
        for id in ids {
            if let Some(d) = self.drawables.get_mut(id) {
                if !d.is_editing() {
                    d.mark_committed();
                }
            }
        }
        self.refresh();
    }

    /// Remove drawables locally and from the selection. Never dispatches a delete.
    fn drop_local(&mut self, ids: &[LabelId]) {
        let mut next = self.selection.clone();
        for id in ids {
            self.drawables.remove(id);
            for selected in next.values_mut() {
                selected.remove(id);
            }
        }
        next.retain(|_, ids| !ids.is_empty());
        self.set_selection(next);
    }

    /// Labels a drawable asked to throw away. Committed ones are deleted.
    fn discard(&mut self, ids: &[LabelId]) {
        if ids.is_empty() {
            return;
        }
        let item = self.selected_item;
        let committed: Vec<LabelId> = ids.iter().copied().filter(|id| self.state.label(item, id).is_ok()).collect();
        self.drop_local(ids);
        if !committed.is_empty() {
            self.bus.dispatch(Command::DeleteLabels { item, label_ids: committed });
        }
    }

    fn start_link_track(&mut self) {
        let seed = self
            .highlighted
            .map(|h| h.label)
            .or_else(|| self.selected_ids().first().copied())
            .and_then(|id| self.state.find_label(&id));
        let modifier = Modifier::LinkTrack(LinkTrack::new(seed));
        info!(modifier = modifier.name(), "session: modifier started");

        let restore = self.highlighted;
        self.set_highlight(None);
        self.modifier = Some(ActiveModifier { modifier, restore });
        self.bus.dispatch(Command::StartLinkSession);
    }

    fn react(&mut self, reaction: Reaction) {
        for command in reaction.commands {
            self.bus.dispatch(command);
        }
        for notice in &reaction.notices {
            warn!(code = %notice.code, message = %notice.message, "session: modifier notice");
        }
        self.notices.extend(reaction.notices);
        if !reaction.finished {
            return;
        }
        if let Some(active) = self.modifier.take() {
            info!(modifier = active.modifier.name(), "session: modifier finished");
            self.bus.dispatch(Command::StopLinkSession);
            self.refresh();
            let restore = active.restore.filter(|h| self.drawables.contains(&h.label));
            self.set_highlight(restore);
        }
    }

    fn warn<E: ErrorCode + Display>(&mut self, action: &str, err: &E) {
        warn!(action, code = err.error_code(), error = %err, "session: action rejected");
        self.notices.push(Notice::warning(err));
    }

    fn run_action(&mut self, action: KeyAction) {
        let state = Arc::clone(&self.state);
        let item = self.selected_item;
        let ids = self.selected_ids();
        debug!(?action, selected = ids.len(), "session: key action");

        match action {
            KeyAction::LinkSelected => {
                let all: Vec<LabelId> = self.selection.values().flatten().copied().collect();
                match track::link(&state, item, &all) {
                    Ok(patch) => self.bus.dispatch(Command::LinkLabels { patch }),
                    Err(e) => self.warn("link", &e),
                }
            }
            KeyAction::UnlinkSelected => {
                let all: Vec<LabelId> = self.selection.values().flatten().copied().collect();
                match track::unlink(&state, item, &all) {
                    Ok(patch) if !patch.is_empty() => self.bus.dispatch(Command::UnlinkLabels { patch }),
                    Ok(_) => {}
                    Err(e) => self.warn("unlink", &e),
                }
            }
            KeyAction::MergeTracks => {
                let mut tracks: Vec<TrackId> = Vec::new();
                for id in self.selection.values().flatten() {
                    if let Some(t) = state.find_label(id).and_then(|l| l.track) {
                        if !tracks.contains(&t) {
                            tracks.push(t);
                        }
                    }
                }
                match track::merge(&state, &tracks) {
                    Ok(patch) => self.bus.dispatch(Command::MergeTracks { patch }),
                    Err(e) => self.warn("merge", &e),
                }
            }
            KeyAction::SplitTrack => {
                let tracked = ids.iter().find_map(|id| label_on(&state, item, id).and_then(|l| l.track));
                if let Some(track_id) = tracked {
                    match track::split(&state, track_id, Uuid::new_v4(), item) {
                        Ok(patch) if !patch.is_empty() => self.bus.dispatch(Command::SplitTrack { patch }),
                        Ok(_) => {}
                        Err(e) => self.warn("split", &e),
                    }
                }
            }
            KeyAction::ReorderForward => self.reorder(&state, &ids, Direction::Forward),
            KeyAction::ReorderBackward => self.reorder(&state, &ids, Direction::Backward),
            KeyAction::ReorderFront => self.reorder(&state, &ids, Direction::Front),
            KeyAction::ReorderBack => self.reorder(&state, &ids, Direction::Back),
            KeyAction::ToggleChecked => {
                let changes: Vec<(LabelId, LabelProps)> = ids
                    .iter()
                    .filter_map(|id| label_on(&state, item, id))
                    .map(|l| (l.id, LabelProps { checked: Some(!l.checked), ..Default::default() }))
                    .collect();
                if !changes.is_empty() {
                    self.bus.dispatch(Command::ChangeLabelProps { item, changes });
                }
            }
            KeyAction::Commit => {
                for id in &ids {
                    if let Some(d) = self.drawables.get_mut(id) {
                        d.finish();
                    }
                }
                self.commit(&ids);
            }
            KeyAction::CancelLinkSession => {
                if state.session.track_linking {
                    self.bus.dispatch(Command::StopLinkSession);
                }
            }
            KeyAction::Delete => {
                let committed: Vec<LabelId> = ids.iter().copied().filter(|id| state.label(item, id).is_ok()).collect();
                self.drop_local(&ids);
                if !committed.is_empty() {
                    info!(item, count = committed.len(), "session: delete labels");
                    self.bus.dispatch(Command::DeleteLabels { item, label_ids: committed });
                }
            }
        }
        self.refresh();
    }

    /// Reordering moves one label; with several selected there is no single
    /// target position, so the key does nothing.
    fn reorder(&mut self, state: &State, ids: &[LabelId], direction: Direction) {
        let [label] = ids else {
            debug!(selected = ids.len(), "session: reorder needs exactly one label");
            return;
        };
        match order::move_label(state, self.selected_item, label, direction) {
            Ok(changes) if !changes.is_empty() => {
                self.bus.dispatch(Command::ChangeLabelProps { item: self.selected_item, changes });
            }
            Ok(_) => {}
            Err(e) => debug!(error = %e, "session: reorder skipped"),
        }
    }
}

// =============================================================================
// PATCH BUILDERS
// =============================================================================

fn label_on<'a>(state: &'a State, item: ItemIndex, id: &LabelId) -> Option<&'a Label> {
    state.items.get(item).and_then(|i| i.labels.get(id))
}

/// Records for a newly created label. With tracking on (and the label not
/// `single`) it starts a track, and with propagation every later item gets
/// a non-manual copy in that track.
fn new_label_patch(state: &State, config: &SessionConfig, drawable: &Drawable) -> Patch {
    let mut label = drawable.to_label();
    let mut patch = Patch { shapes: drawable.shapes(), ..Default::default() };

    if config.tracking && !label.single {
        let track_id = Uuid::new_v4();
        let mut track = Track { id: track_id, label_type: label.label_type, labels: BTreeMap::from([(label.item, label.id)]) };
        label.track = Some(track_id);

        if config.propagate_new_tracks {
            if let Some(geometry) = drawable.geometry() {
                for item in state.items.iter().skip(label.item + 1) {
                    let (copy, shape) = propagated_copy(&label, item.index, item.max_order() + 1, geometry);
                    track.labels.insert(item.index, copy.id);
                    patch.labels.push(copy);
                    patch.shapes.push(shape);
                }
            }
        }
        patch.tracks.push(track);
    }
    patch.labels.insert(0, label);
    patch
}

fn propagated_copy(label: &Label, item: ItemIndex, order: i64, geometry: &Geometry) -> (Label, Shape) {
    let id = Uuid::new_v4();
    let shape_id = Uuid::new_v4();
    let mut copy = label.clone();
    copy.id = id;
    copy.item = item;
    copy.shapes = vec![shape_id];
    copy.order = order;
    copy.manual = false;
    copy.changed = false;
    copy.parent = None;
    copy.children = Vec::new();
    (copy, Shape { id: shape_id, item, label_ids: vec![id], geometry: geometry.clone() })
}

/// Records for an edited label, plus the shapes of track frames whose
/// geometry is recomputed by interpolation.
fn edit_patch(state: &State, drawable: &Drawable) -> (Patch, Option<InterpError>) {
    let label = drawable.to_label();
    let mut patch = Patch { labels: vec![label.clone()], shapes: drawable.shapes(), ..Default::default() };
    let (Some(track), Some(edited)) = (label.track.and_then(|t| state.tracks.get(&t)), drawable.geometry()) else {
        return (patch, None);
    };

    let frames: Vec<TrackFrame> = track
        .labels
        .iter()
        .filter_map(|(item, id)| {
            let owner = state.items.get(*item)?;
            Some(TrackFrame { item: *item, manual: owner.labels.get(id)?.manual, geometry: owner.geometry(id)?.clone() })
        })
        .collect();

    let updates = match interp::interpolate(&frames, label.item, edited) {
        Ok(updates) => updates,
        Err(e) => return (patch, Some(e)),
    };
    for update in updates.into_iter().filter(|u| u.item != label.item) {
        let shape = track
            .labels
            .get(&update.item)
            .and_then(|id| state.items.get(update.item).map(|owner| (owner, id)))
            .and_then(|(owner, id)| owner.labels.get(id).and_then(|l| l.shapes.first()).and_then(|s| owner.shapes.get(s)));
        if let Some(shape) = shape {
            let mut shape = shape.clone();
            shape.geometry = update.geometry;
            patch.shapes.push(shape);
        }
    }
    (patch, None)
}

use super::*;
use crate::doc::LabelType;
use crate::fixture::{add_label, add_track, rect};
use crate::notice::Level;
use crate::store::Store;

const BOUNDS: Rect2D = Rect2D { x1: 0.0, y1: 0.0, x2: 1000.0, y2: 1000.0 };

fn session(state: State) -> Session<Store> {
    Session::new(Store::new(state), SessionConfig::default())
}

fn session_with(state: State, config: SessionConfig) -> Session<Store> {
    Session::new(Store::new(state), config)
}

fn p(x: f64, y: f64) -> Point {
    Point::new(x, y)
}

fn hover(s: &mut Session<Store>, at: Point, target: LabelId) {
    s.on_pointer_move(at, &BOUNDS, Some(target), 0);
}

/// Hover, press and release on `target`'s body.
fn click(s: &mut Session<Store>, at: Point, target: LabelId) {
    hover(s, at, target);
    s.on_pointer_down(at, Some(target), 0);
    s.on_pointer_up(at, Some(target), 0);
}

fn key(s: &mut Session<Store>, name: &str) -> bool {
    s.on_key_down(&Key::new(name))
}

fn release(s: &mut Session<Store>, name: &str) {
    s.on_key_up(&Key::new(name));
}

fn dispatched(s: &Session<Store>, name: &str) -> usize {
    s.bus().history().iter().filter(|c| c.name() == name).count()
}

fn selected(s: &Session<Store>, item: ItemIndex) -> Vec<LabelId> {
    s.selection().get(&item).map(|ids| ids.iter().copied().collect()).unwrap_or_default()
}

// =============================================================
// Creation
// =============================================================

#[test]
fn box_creation_commits_with_propagated_track() {
    let mut s = session(State::with_items(3));
    assert!(s.on_pointer_down(p(10.0, 10.0), None, 0));
    assert!(s.on_pointer_move(p(40.0, 40.0), &BOUNDS, None, 0));
    assert!(s.on_pointer_up(p(40.0, 40.0), None, 0));

    assert_eq!(dispatched(&s, "add_label"), 1);
    let state = s.bus().state();
    let label = state.items[0].labels.values().next().unwrap();
    assert!(label.manual);
    assert_eq!(state.items[0].geometry(&label.id), Some(&Geometry::Rect(Rect2D::new(10.0, 10.0, 40.0, 40.0))));

    let track_id = label.track.unwrap();
    for item in 1..3 {
        let copy = state.items[item].labels.values().next().unwrap();
        assert!(!copy.manual);
        assert_eq!(copy.track, Some(track_id));
    }
    assert_eq!(state.tracks[&track_id].labels.len(), 3);
    assert!(state.track_is_consistent(&track_id));

    let selected = s.selected_drawables();
    assert_eq!(selected.len(), 1);
    assert!(selected[0].is_committed());
}

#[test]
fn box_drawn_backwards_is_normalized() {
    let mut s = session_with(State::with_items(1), SessionConfig { tracking: false, ..Default::default() });
    s.on_pointer_down(p(40.0, 40.0), None, 0);
    s.on_pointer_move(p(10.0, 20.0), &BOUNDS, None, 0);
    s.on_pointer_up(p(10.0, 20.0), None, 0);

    let state = s.bus().state();
    let label = state.items[0].labels.values().next().unwrap();
    assert_eq!(label.track, None);
    assert_eq!(state.items[0].geometry(&label.id), Some(&Geometry::Rect(Rect2D::new(10.0, 20.0, 40.0, 40.0))));
}

#[test]
fn pointer_move_is_clamped_to_bounds() {
    let mut s = session_with(State::with_items(1), SessionConfig { tracking: false, ..Default::default() });
    let small = Rect2D::new(0.0, 0.0, 100.0, 100.0);
    s.on_pointer_down(p(50.0, 50.0), None, 0);
    s.on_pointer_move(p(500.0, 120.0), &small, None, 0);
    s.on_pointer_up(p(500.0, 120.0), None, 0);

    let state = s.bus().state();
    let label = state.items[0].labels.values().next().unwrap();
    assert_eq!(state.items[0].geometry(&label.id), Some(&Geometry::Rect(Rect2D::new(50.0, 50.0, 100.0, 100.0))));
}

#[test]
fn tiny_box_is_discarded() {
    let mut s = session(State::with_items(2));
    s.on_pointer_down(p(10.0, 10.0), None, 0);
    s.on_pointer_move(p(12.0, 12.0), &BOUNDS, None, 0);
    s.on_pointer_up(p(12.0, 12.0), None, 0);

    assert_eq!(dispatched(&s, "add_label"), 0);
    assert!(s.drawables().is_empty());
    assert!(s.selection().is_empty());
    assert!(s.bus().state().items[0].labels.is_empty());
}

#[test]
fn fast_create_makes_single_label_without_track() {
    let mut s = session(State::with_items(3));
    key(&mut s, "Alt");
    s.on_pointer_down(p(0.0, 0.0), None, 0);
    s.on_pointer_move(p(30.0, 30.0), &BOUNDS, None, 0);
    s.on_pointer_up(p(30.0, 30.0), None, 0);

    let state = s.bus().state();
    let label = state.items[0].labels.values().next().unwrap();
    assert!(label.single);
    assert_eq!(label.track, None);
    assert!(state.tracks.is_empty());
    assert!(state.items[1].labels.is_empty());
}

#[test]
fn polygon_is_clicked_out_and_committed_on_enter() {
    let config = SessionConfig { label_type: LabelType::Polygon2d, tracking: false, ..Default::default() };
    let mut s = session_with(State::with_items(1), config);
    for (x, y) in [(0.0, 0.0), (50.0, 0.0), (50.0, 50.0)] {
        s.on_pointer_down(p(x, y), None, 0);
        s.on_pointer_up(p(x, y), None, 0);
    }
    assert!(s.is_editing());
    assert_eq!(dispatched(&s, "add_label"), 0);

    assert!(key(&mut s, "Enter"));
    let state = s.bus().state();
    let label = state.items[0].labels.values().next().unwrap();
    match state.items[0].geometry(&label.id) {
        Some(Geometry::Path(path)) => {
            assert!(path.closed);
            assert_eq!(path.points.len(), 3);
        }
        other => panic!("expected closed path, got {other:?}"),
    }
}

#[test]
fn escape_discards_polygon_in_progress() {
    let config = SessionConfig { label_type: LabelType::Polygon2d, ..Default::default() };
    let mut s = session_with(State::with_items(1), config);
    s.on_pointer_down(p(0.0, 0.0), None, 0);
    s.on_pointer_up(p(0.0, 0.0), None, 0);
    assert_eq!(s.drawables().len(), 1);

    assert!(key(&mut s, "Escape"));
    assert!(s.drawables().is_empty());
    assert!(s.selection().is_empty());
    assert_eq!(dispatched(&s, "add_label"), 0);
}

// =============================================================
// Selection
// =============================================================

#[test]
fn click_keeps_selection_and_control_toggles() {
    let mut state = State::with_items(1);
    let a = add_label(&mut state, 0, rect(0.0));
    let b = add_label(&mut state, 0, rect(50.0));
    let mut s = session(state);

    click(&mut s, p(5.0, 5.0), a);
    assert_eq!(selected(&s, 0), vec![a]);
    click(&mut s, p(5.0, 5.0), a);
    assert_eq!(selected(&s, 0), vec![a]);
    assert_eq!(dispatched(&s, "select_labels"), 1);

    key(&mut s, "Control");
    click(&mut s, p(55.0, 55.0), b);
    let mut both = vec![a, b];
    both.sort();
    assert_eq!(selected(&s, 0), both);

    click(&mut s, p(5.0, 5.0), a);
    assert_eq!(selected(&s, 0), vec![b]);
}

#[test]
fn second_click_without_move_keeps_selection() {
    let mut state = State::with_items(1);
    let a = add_label(&mut state, 0, rect(0.0));
    let mut s = session(state);

    click(&mut s, p(5.0, 5.0), a);
    assert!(!s.drawables().into_iter().find(|d| d.id() == a).unwrap().is_highlighted());
    s.on_pointer_down(p(5.0, 5.0), Some(a), 0);
    s.on_pointer_up(p(5.0, 5.0), Some(a), 0);

    assert_eq!(selected(&s, 0), vec![a]);
    assert_eq!(s.drawables().len(), 1);
    assert_eq!(dispatched(&s, "unselect_labels"), 0);
    assert_eq!(dispatched(&s, "add_label"), 0);
}

#[test]
fn press_on_target_selects_without_prior_hover() {
    let mut state = State::with_items(1);
    let a = add_label(&mut state, 0, rect(0.0));
    let mut s = session(state);

    s.on_pointer_down(p(5.0, 5.0), Some(a), 0);
    s.on_pointer_up(p(5.0, 5.0), Some(a), 0);
    assert_eq!(selected(&s, 0), vec![a]);
    assert_eq!(s.drawables().len(), 1);
}

#[test]
fn clicking_a_child_selects_its_linked_group() {
    let mut state = State::with_items(1);
    let parent = add_label(&mut state, 0, rect(0.0));
    let child = add_label(&mut state, 0, rect(50.0));
    state.items[0].labels.get_mut(&parent).unwrap().children = vec![child];
    state.items[0].labels.get_mut(&child).unwrap().parent = Some(parent);
    let mut s = session(state);

    click(&mut s, p(55.0, 55.0), child);
    let mut group = vec![parent, child];
    group.sort();
    assert_eq!(selected(&s, 0), group);
}

#[test]
fn dragging_a_committed_label_commits_the_edit() {
    let mut state = State::with_items(1);
    let a = add_label(&mut state, 0, rect(0.0));
    let mut s = session(state);

    hover(&mut s, p(5.0, 5.0), a);
    s.on_pointer_down(p(5.0, 5.0), Some(a), 0);
    s.on_pointer_move(p(25.0, 15.0), &BOUNDS, Some(a), 0);
    s.on_pointer_up(p(25.0, 15.0), Some(a), 0);

    assert_eq!(dispatched(&s, "commit_labels"), 1);
    let state = s.bus().state();
    assert_eq!(state.items[0].geometry(&a), Some(&Geometry::Rect(Rect2D::new(20.0, 10.0, 30.0, 20.0))));
    assert!(state.label(0, &a).unwrap().changed);
    assert_eq!(s.highlighted().map(|h| h.label), Some(a));
    assert!(!s.drawables().into_iter().find(|d| d.id() == a).unwrap().is_highlighted());
}

// =============================================================
// Keys
// =============================================================

#[test]
fn multi_key_suppresses_single_key_actions() {
    let mut state = State::with_items(1);
    let a = add_label(&mut state, 0, rect(0.0));
    let mut s = session(state);
    click(&mut s, p(5.0, 5.0), a);

    assert!(!key(&mut s, "Shift"));
    assert!(!key(&mut s, "c"));
    assert!(!s.bus().state().label(0, &a).unwrap().checked);

    release(&mut s, "Shift");
    release(&mut s, "c");
    assert!(key(&mut s, "c"));
    assert!(s.bus().state().label(0, &a).unwrap().checked);
    assert_eq!(dispatched(&s, "change_label_props"), 1);
}

#[test]
fn chord_does_not_reach_polygon_in_progress() {
    let config = SessionConfig { label_type: LabelType::Polygon2d, tracking: false, ..Default::default() };
    let mut s = session_with(State::with_items(1), config);
    for (x, y) in [(0.0, 0.0), (50.0, 0.0)] {
        s.on_pointer_down(p(x, y), None, 0);
        s.on_pointer_up(p(x, y), None, 0);
    }
    let id = s.selected_drawables()[0].id();
    let before = s.drawables().into_iter().find(|d| d.id() == id).unwrap().geometry().cloned();

    assert!(!key(&mut s, "Shift"));
    assert!(!key(&mut s, "Escape"));
    assert!(!key(&mut s, "Backspace"));
    assert_eq!(s.drawables().len(), 1);
    assert_eq!(selected(&s, 0), vec![id]);
    assert_eq!(s.drawables().into_iter().find(|d| d.id() == id).unwrap().geometry().cloned(), before);
    assert!(s.is_editing());

    release(&mut s, "Shift");
    release(&mut s, "Escape");
    release(&mut s, "Backspace");
    assert!(key(&mut s, "Escape"));
    assert!(s.drawables().is_empty());
}

#[test]
fn focus_lost_releases_held_keys() {
    let mut state = State::with_items(1);
    let a = add_label(&mut state, 0, rect(0.0));
    let mut s = session(state);
    click(&mut s, p(5.0, 5.0), a);

    key(&mut s, "Shift");
    s.on_focus_lost();
    assert!(s.pressed().is_empty());
    assert!(key(&mut s, "c"));
    assert!(s.bus().state().label(0, &a).unwrap().checked);
}

#[test]
fn delete_key_removes_selected_labels() {
    let mut state = State::with_items(2);
    let (track_id, ids) = add_track(&mut state, &[0, 1], &[0, 1]);
    let mut s = session(state);
    click(&mut s, p(5.0, 5.0), ids[0]);

    assert!(key(&mut s, "Delete"));
    let state = s.bus().state();
    assert!(state.items[0].labels.is_empty());
    assert_eq!(state.tracks[&track_id].labels.len(), 1);
    assert!(s.selection().is_empty());
}

#[test]
fn arrow_up_moves_label_forward() {
    let mut state = State::with_items(1);
    let a = add_label(&mut state, 0, rect(0.0));
    let b = add_label(&mut state, 0, rect(50.0));
    let mut s = session(state);
    click(&mut s, p(5.0, 5.0), a);

    assert!(key(&mut s, "ArrowUp"));
    let state = s.bus().state();
    assert_eq!(state.label(0, &a).unwrap().order, 1);
    assert_eq!(state.label(0, &b).unwrap().order, 0);
}

#[test]
fn reorder_ignores_multi_label_selection() {
    let mut state = State::with_items(1);
    let a = add_label(&mut state, 0, rect(0.0));
    let b = add_label(&mut state, 0, rect(50.0));
    let mut s = session(state);
    click(&mut s, p(5.0, 5.0), a);
    key(&mut s, "Control");
    click(&mut s, p(55.0, 55.0), b);
    release(&mut s, "Control");
    assert_eq!(selected(&s, 0).len(), 2);

    key(&mut s, "ArrowUp");
    assert_eq!(dispatched(&s, "change_label_props"), 0);
    let state = s.bus().state();
    assert_eq!(state.label(0, &a).unwrap().order, 0);
    assert_eq!(state.label(0, &b).unwrap().order, 1);
}

#[test]
fn split_key_splits_track_at_current_item() {
    let mut state = State::with_items(4);
    let (track_id, ids) = add_track(&mut state, &[0, 1, 2, 3], &[0]);
    let mut s = session(state);
    s.go_to_item(2).unwrap();
    click(&mut s, p(5.0, 5.0), ids[2]);

    assert!(key(&mut s, "x"));
    let state = s.bus().state();
    assert_eq!(state.tracks[&track_id].labels.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
    let late = state.label(2, &ids[2]).unwrap().track.unwrap();
    assert_ne!(late, track_id);
    assert_eq!(state.label(3, &ids[3]).unwrap().track, Some(late));
}

#[test]
fn link_key_with_single_label_raises_notice() {
    let mut state = State::with_items(1);
    let a = add_label(&mut state, 0, rect(0.0));
    let mut s = session(state);
    click(&mut s, p(5.0, 5.0), a);

    assert!(key(&mut s, "l"));
    let notices = s.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].code, "E_NOT_ENOUGH_LABELS");
    assert!(s.take_notices().is_empty());
}

// =============================================================
// Link-track modifier
// =============================================================

#[test]
fn link_modifier_captures_keys_and_restores_highlight() {
    let mut state = State::with_items(1);
    let a = add_label(&mut state, 0, rect(0.0));
    let mut s = session(state);
    hover(&mut s, p(5.0, 5.0), a);

    assert!(!key(&mut s, "Control"));
    assert!(key(&mut s, "l"));
    assert!(s.modifier().is_some());
    assert!(s.bus().state().session.track_linking);
    assert!(s.highlighted().is_none());

    assert!(key(&mut s, "c"));
    assert_eq!(dispatched(&s, "change_label_props"), 0);
    assert!(s.on_pointer_down(p(500.0, 500.0), None, 0));
    assert_eq!(s.drawables().len(), 1);

    assert!(key(&mut s, "Escape"));
    assert!(s.modifier().is_none());
    assert!(!s.bus().state().session.track_linking);
    assert_eq!(s.highlighted(), Some(Highlight { label: a, handle: 0 }));
}

#[test]
fn link_modifier_links_labels_across_items() {
    let mut state = State::with_items(3);
    let a = add_label(&mut state, 0, rect(0.0));
    let b = add_label(&mut state, 2, rect(2.0));
    let mut s = session(state);
    hover(&mut s, p(5.0, 5.0), a);
    key(&mut s, "Control");
    key(&mut s, "l");
    release(&mut s, "l");
    release(&mut s, "Control");

    s.go_to_item(2).unwrap();
    assert!(s.modifier().is_some());
    assert!(s.on_pointer_up(p(5.0, 5.0), Some(b), 0));
    assert!(key(&mut s, "Enter"));

    let state = s.bus().state();
    let track = state.label(0, &a).unwrap().track.unwrap();
    assert_eq!(state.label(2, &b).unwrap().track, Some(track));
    assert!(state.track_is_consistent(&track));
    assert!(s.modifier().is_none());
    assert!(s.take_notices().is_empty());
}

#[test]
fn link_conflict_raises_notice_and_changes_nothing() {
    let mut state = State::with_items(2);
    let (track_id, ids) = add_track(&mut state, &[0, 1], &[0]);
    let other = add_label(&mut state, 1, rect(50.0));
    let mut s = session(state);
    hover(&mut s, p(5.0, 5.0), ids[0]);
    key(&mut s, "Meta");
    key(&mut s, "l");
    release(&mut s, "l");
    release(&mut s, "Meta");

    s.go_to_item(1).unwrap();
    s.on_pointer_up(p(55.0, 55.0), Some(other), 0);
    assert!(key(&mut s, "Enter"));

    let notices = s.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].level, Level::Warning);
    assert_eq!(notices[0].code, "E_TRACK_CONFLICT");
    assert_eq!(dispatched(&s, "link_labels"), 0);
    let state = s.bus().state();
    assert_eq!(state.tracks[&track_id].labels.len(), 2);
    assert_eq!(state.label(1, &other).unwrap().track, None);
    assert!(s.modifier().is_none());
}

// =============================================================
// Items and tracks
// =============================================================

#[test]
fn item_change_clears_highlight_and_selection() {
    let mut state = State::with_items(2);
    let a = add_label(&mut state, 0, rect(0.0));
    let mut s = session(state);
    click(&mut s, p(5.0, 5.0), a);
    hover(&mut s, p(5.0, 5.0), a);
    assert!(s.highlighted().is_some());
    assert_eq!(selected(&s, 0), vec![a]);

    s.go_to_item(1).unwrap();
    assert_eq!(s.selected_item(), 1);
    assert!(s.highlighted().is_none());
    assert!(s.selection().is_empty());
    assert!(s.drawables().is_empty());

    assert_eq!(s.go_to_item(9), Err(StateError::ItemNotFound(9)));
    assert_eq!(s.selected_item(), 1);
}

#[test]
fn editing_a_propagated_frame_fills_between_keyframes() {
    let mut state = State::with_items(8);
    let (track_id, ids) = add_track(&mut state, &[0, 1, 2, 3, 4, 5, 6, 7], &[1, 6]);
    let mut s = session(state);
    s.go_to_item(4).unwrap();

    hover(&mut s, p(8.0, 8.0), ids[4]);
    s.on_pointer_down(p(8.0, 8.0), Some(ids[4]), 0);
    s.on_pointer_move(p(18.0, 8.0), &BOUNDS, Some(ids[4]), 0);
    s.on_pointer_up(p(18.0, 8.0), Some(ids[4]), 0);
    assert_eq!(dispatched(&s, "commit_labels"), 1);

    let state = s.bus().state();
    let edited = Geometry::Rect(Rect2D::new(14.0, 4.0, 24.0, 14.0));
    for item in [2, 3, 4, 5] {
        assert_eq!(state.items[item].geometry(&ids[item]), Some(&edited), "item {item}");
    }
    for (item, v) in [(0, 0.0), (1, 1.0), (6, 6.0), (7, 7.0)] {
        assert_eq!(state.items[item].geometry(&ids[item]), Some(&rect(v)), "item {item}");
    }
    assert!(state.label(4, &ids[4]).unwrap().manual);
    assert!(!state.label(3, &ids[3]).unwrap().manual);
    assert!(state.track_is_consistent(&track_id));
}

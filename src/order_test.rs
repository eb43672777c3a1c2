use super::*;
use crate::command::Command;
use crate::fixture::{add_label, rect};
use crate::store::reduce;

fn five_labels() -> (State, Vec<LabelId>) {
    let mut state = State::with_items(1);
    let ids = (0..5).map(|_| add_label(&mut state, 0, rect(0.0))).collect();
    (state, ids)
}

fn stack(state: &State) -> Vec<LabelId> {
    state.items[0].sorted_labels().iter().map(|l| l.id).collect()
}

fn apply(state: &State, changes: Vec<(LabelId, LabelProps)>) -> State {
    reduce(state, &Command::ChangeLabelProps { item: 0, changes })
}

#[test]
fn move_up_rotates_only_the_range() {
    let (state, ids) = five_labels();
    let changes = reorder(&state, 0, &ids[1], 3).unwrap();

    let touched: Vec<LabelId> = changes.iter().map(|(id, _)| *id).collect();
    assert_eq!(touched.len(), 3);
    for id in [ids[1], ids[2], ids[3]] {
        assert!(touched.contains(&id));
    }

    let next = apply(&state, changes);
    assert_eq!(stack(&next), vec![ids[0], ids[2], ids[3], ids[1], ids[4]]);
    assert_eq!(next.items[0].labels[&ids[0]].order, 0);
    assert_eq!(next.items[0].labels[&ids[4]].order, 4);
}

#[test]
fn move_down_rotates_only_the_range() {
    let (state, ids) = five_labels();
    let next = apply(&state, reorder(&state, 0, &ids[3], 1).unwrap());
    assert_eq!(stack(&next), vec![ids[0], ids[3], ids[1], ids[2], ids[4]]);
}

#[test]
fn move_to_same_position_is_noop() {
    let (state, ids) = five_labels();
    assert!(reorder(&state, 0, &ids[2], 2).unwrap().is_empty());
}

#[test]
fn target_past_end_clamps_to_top() {
    let (state, ids) = five_labels();
    let next = apply(&state, reorder(&state, 0, &ids[0], 99).unwrap());
    assert_eq!(stack(&next).last(), Some(&ids[0]));
}

#[test]
fn directions_resolve_targets() {
    assert_eq!(Direction::Forward.target(1, 5), 2);
    assert_eq!(Direction::Forward.target(4, 5), 4);
    assert_eq!(Direction::Backward.target(0, 5), 0);
    assert_eq!(Direction::Backward.target(3, 5), 2);
    assert_eq!(Direction::Front.target(1, 5), 4);
    assert_eq!(Direction::Back.target(3, 5), 0);
}

#[test]
fn move_label_front_and_back() {
    let (state, ids) = five_labels();
    let front = apply(&state, move_label(&state, 0, &ids[1], Direction::Front).unwrap());
    assert_eq!(stack(&front).last(), Some(&ids[1]));

    let back = apply(&state, move_label(&state, 0, &ids[3], Direction::Back).unwrap());
    assert_eq!(stack(&back).first(), Some(&ids[3]));
}

#[test]
fn unknown_label_is_lookup_error() {
    let (state, _) = five_labels();
    let ghost = uuid::Uuid::new_v4();
    assert_eq!(reorder(&state, 0, &ghost, 0), Err(StateError::LabelNotFound { item: 0, label: ghost }));
}

#[test]
fn unknown_item_is_lookup_error() {
    let (state, ids) = five_labels();
    assert_eq!(move_label(&state, 3, &ids[0], Direction::Front), Err(StateError::ItemNotFound(3)));
}

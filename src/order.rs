//! Label stacking order within an item.
//!
//! Moving a label rotates the `order` values of the labels between its old
//! and new position by one slot. Labels outside that range keep their values,
//! so a move never renumbers the whole item.

#[cfg(test)]
#[path = "order_test.rs"]
mod order_test;

use serde::{Deserialize, Serialize};

use crate::doc::{ItemIndex, LabelId, LabelProps, State, StateError};

/// Where to move a label in the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// One step towards the top.
    Forward,
    /// One step towards the bottom.
    Backward,
    /// To the top.
    Front,
    /// To the bottom.
    Back,
}

impl Direction {
    /// Target position for a label at `index` in a stack of `len`.
    #[must_use]
    pub fn target(self, index: usize, len: usize) -> usize {
        let last = len.saturating_sub(1);
        match self {
            Self::Forward => (index + 1).min(last),
            Self::Backward => index.saturating_sub(1),
            Self::Front => last,
            Self::Back => 0,
        }
    }
}

/// Move `label` to stack position `target` on `item`.
///
/// Returns the `order` changes for the rotated range only; empty when the
/// label is already there.
///
/// # Errors
///
/// `ItemNotFound` or `LabelNotFound`.
pub fn reorder(state: &State, item: ItemIndex, label: &LabelId, target: usize) -> Result<Vec<(LabelId, LabelProps)>, StateError> {
    let sorted = state.item(item)?.sorted_labels();
    let from = sorted
        .iter()
        .position(|l| l.id == *label)
        .ok_or(StateError::LabelNotFound { item, label: *label })?;
    let to = target.min(sorted.len().saturating_sub(1));
    if from == to {
        return Ok(Vec::new());
    }

    let orders: Vec<i64> = sorted.iter().map(|l| l.order).collect();
    let mut changes = vec![(sorted[from].id, order_props(orders[to]))];
    if from < to {
        for k in from + 1..=to {
            changes.push((sorted[k].id, order_props(orders[k - 1])));
        }
    } else {
        for k in to..from {
            changes.push((sorted[k].id, order_props(orders[k + 1])));
        }
    }
    Ok(changes)
}

/// Move `label` one step or to an end of the stack.
///
/// # Errors
///
/// `ItemNotFound` or `LabelNotFound`.
pub fn move_label(state: &State, item: ItemIndex, label: &LabelId, direction: Direction) -> Result<Vec<(LabelId, LabelProps)>, StateError> {
    let sorted = state.item(item)?.sorted_labels();
    let from = sorted
        .iter()
        .position(|l| l.id == *label)
        .ok_or(StateError::LabelNotFound { item, label: *label })?;
    reorder(state, item, label, direction.target(from, sorted.len()))
}

fn order_props(order: i64) -> LabelProps {
    LabelProps { order: Some(order), ..Default::default() }
}

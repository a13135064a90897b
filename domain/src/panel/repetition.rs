//! Repetition detection over the turn history
//!
//! The panel is considered to be looping when the latest action has already
//! been taken earlier in the flow, and the most recent non-empty order list
//! was already proposed, as the same set of tests, by an earlier turn with
//! the same action. Order within a list and surrounding whitespace are
//! ignored; matching is case-sensitive.

use crate::flow::entities::Turn;
use std::collections::BTreeSet;

/// Whether the history shows the panel repeating itself.
///
/// `turns` must be ordered by step index.
pub fn is_repeating(turns: &[Turn]) -> bool {
    let Some(latest) = turns.last() else {
        return false;
    };

    let same_action = turns
        .iter()
        .filter(|t| t.action() == latest.action())
        .count();
    if same_action < 2 {
        return false;
    }

    let Some((pos, recent)) = turns
        .iter()
        .enumerate()
        .rev()
        .find(|(_, t)| !t.final_orders().is_empty())
    else {
        return false;
    };

    let recent_set = order_set(recent.final_orders());
    turns[..pos]
        .iter()
        .any(|t| t.action() == recent.action() && order_set(t.final_orders()) == recent_set)
}

fn order_set(orders: &[String]) -> BTreeSet<&str> {
    orders
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .collect()
}

//! Move-only reordering of matched items into target order.
//!
//! # Algorithm
//!
//! Matched items are processed in ascending target-index order. By the time
//! an item with target index `t` is reached, every position below `t`
//! already holds its final item (unmatched items were inserted at their
//! final positions; matched items with smaller targets have been placed), so
//! a misplaced item always sits *past* its target. It is relocated directly
//! to `t`, and the item displaced to `t + 1` is relocated back to the
//! vacated index — a two-relocation transposition whose net effect is a
//! swap, leaving every other absolute position untouched. That is what
//! keeps the live position map accurate at the cost of two entry updates
//! per fixed item. The item with the largest target index is skipped; it is
//! in place once all others are.
//!
//! Total relocations are bounded by twice the number of misplaced matched
//! items, independent of store size.

use std::collections::HashMap;
use std::hash::Hash;

/// A single relocation: remove at `from`, insert at `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Relocation {
    pub from: usize,
    pub to: usize,
}

/// Plan the relocations that bring every key named in `targets` to its
/// target index.
///
/// Preconditions: `order` already has final length, every key in `targets`
/// occurs in `order`, and every position not claimed by a target already
/// holds its final item.
pub(crate) fn plan_moves<K: Eq + Hash + Clone>(
    order: &[K],
    targets: &HashMap<K, usize>,
) -> Vec<Relocation> {
    let mut moves = Vec::new();
    if targets.len() < 2 {
        return moves;
    }

    let mut scratch: Vec<K> = order.to_vec();
    let mut position: HashMap<K, usize> = order
        .iter()
        .enumerate()
        .map(|(index, key)| (key.clone(), index))
        .collect();

    let mut by_target: Vec<(&K, usize)> = targets.iter().map(|(key, &target)| (key, target)).collect();
    by_target.sort_by_key(|&(_, target)| target);

    // The largest target falls into place once all others are fixed.
    for &(key, target) in &by_target[..by_target.len() - 1] {
        let current = position[key];
        if current == target {
            continue;
        }

        moves.push(Relocation {
            from: current,
            to: target,
        });
        let displaced = scratch[target].clone();
        if target + 1 != current {
            // The old occupant of the target slot was pushed to `target + 1`;
            // send it back to the vacated index.
            moves.push(Relocation {
                from: target + 1,
                to: current,
            });
        }

        scratch.swap(target, current);
        position.insert(key.clone(), target);
        position.insert(displaced, current);
    }

    moves
}

//! Diff planning for `KeyedList::refresh`.
//!
//! # Algorithm
//!
//! 1. Classify: every incoming key that is already present in the store is
//!    *matched*; its target index is its position within the incoming
//!    sequence.
//! 2. Removal runs: scan the current sequence from its last index to its
//!    first, grouping consecutive unmatched positions into contiguous runs.
//!    Executing runs in descending start order keeps the remaining starts
//!    valid, and each run costs a single range-remove notification.
//! 3. Insertion runs: scan the incoming sequence from first to last,
//!    grouping consecutive unmatched positions into contiguous runs. A run's
//!    starting index within the incoming sequence is used directly as its
//!    insertion point: at any prefix boundary the number of items that
//!    belong before it is already exact — matched items preserve count and
//!    earlier unmatched items have been inserted where counted — even though
//!    matched items may not yet be in final relative order.
//!
//! The update and reorder steps consume the matched map; see `KeyedList`
//! and the reorder module.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// A contiguous run of positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Run {
    pub start: usize,
    pub len: usize,
}

/// The structural plan produced by diffing current keys against incoming
/// keys. Incoming keys must be unique (the caller deduplicates).
#[derive(Debug)]
pub(crate) struct RefreshPlan<K> {
    /// Matched key to target index within the incoming sequence.
    pub matched: HashMap<K, usize>,
    /// Runs to remove from the current sequence, in descending start order.
    pub removals: Vec<Run>,
    /// Runs of incoming positions to insert, in ascending start order.
    pub insertions: Vec<Run>,
}

impl<K: Eq + Hash + Clone> RefreshPlan<K> {
    pub fn build(current: &[K], incoming: &[K]) -> Self {
        let present: HashSet<&K> = current.iter().collect();

        let mut matched = HashMap::new();
        for (index, key) in incoming.iter().enumerate() {
            if present.contains(key) {
                matched.insert(key.clone(), index);
            }
        }

        let mut removals = Vec::new();
        let mut run: Option<Run> = None;
        for index in (0..current.len()).rev() {
            if matched.contains_key(&current[index]) {
                if let Some(run) = run.take() {
                    removals.push(run);
                }
            } else {
                run = Some(match run {
                    Some(run) => Run {
                        start: index,
                        len: run.len + 1,
                    },
                    None => Run {
                        start: index,
                        len: 1,
                    },
                });
            }
        }
        if let Some(run) = run {
            removals.push(run);
        }

        let mut insertions = Vec::new();
        let mut run: Option<Run> = None;
        for (index, key) in incoming.iter().enumerate() {
            if matched.contains_key(key) {
                if let Some(run) = run.take() {
                    insertions.push(run);
                }
            } else {
                run = Some(match run {
                    Some(run) => Run {
                        start: run.start,
                        len: run.len + 1,
                    },
                    None => Run {
                        start: index,
                        len: 1,
                    },
                });
            }
        }
        if let Some(run) = run {
            insertions.push(run);
        }

        Self {
            matched,
            removals,
            insertions,
        }
    }
}

//! Change notifications and the per-list subscriber registry.
//!
//! Every structural mutation of a list is described by exactly one [`Change`]
//! batch covering that mutation's extent — never one event per item. Each
//! batch is followed by a [`ListEvent::CountChanged`] event carrying the
//! current item count.
//!
//! Listeners run synchronously and inline as each batch is produced, so a
//! listener can observe the list between the batches of a single `refresh`.
//! Only per-batch atomicity is guaranteed. Forwarding events from an inner
//! list to an outer one is explicit composition: the owning component
//! subscribes to the inner list and re-emits.

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::mem;

/// A single structural change batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Change<T> {
    /// Items were inserted as one contiguous range.
    Added { index: usize, items: Vec<T> },
    /// Items were removed as one contiguous range.
    Removed { index: usize, items: Vec<T> },
    /// Items were swapped in place as one contiguous range.
    Replaced {
        index: usize,
        old: Vec<T>,
        new: Vec<T>,
    },
    /// A single item was relocated.
    Moved { item: T, from: usize, to: usize },
}

impl<T> Change<T> {
    /// Starting index of the affected contiguous range (destination index
    /// for a relocation).
    pub fn index(&self) -> usize {
        match self {
            Change::Added { index, .. }
            | Change::Removed { index, .. }
            | Change::Replaced { index, .. } => *index,
            Change::Moved { to, .. } => *to,
        }
    }

    /// Number of items in the affected range.
    pub fn span(&self) -> usize {
        match self {
            Change::Added { items, .. } | Change::Removed { items, .. } => items.len(),
            Change::Replaced { new, .. } => new.len(),
            Change::Moved { .. } => 1,
        }
    }
}

/// An event delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ListEvent<T> {
    /// A structural change batch.
    Changed(Change<T>),
    /// Accompanies every structural batch.
    CountChanged { count: usize },
}

/// Identifies a subscription for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

type Callback<T> = Box<dyn FnMut(&ListEvent<T>)>;

struct Entry<T> {
    id: SubscriptionId,
    callback: Callback<T>,
}

/// Per-list subscriber registry with inline dispatch.
///
/// The `dispatching` flag doubles as the list's reentrancy guard: every
/// mutating operation checks it and fails fast with `Error::Reentrancy`.
pub(crate) struct Registry<T> {
    entries: RefCell<Vec<Entry<T>>>,
    /// Unsubscriptions requested from within a handler, applied post-dispatch.
    detached: RefCell<Vec<SubscriptionId>>,
    next_id: Cell<u64>,
    dispatching: Cell<bool>,
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            entries: RefCell::new(Vec::new()),
            detached: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
            dispatching: Cell::new(false),
        }
    }

    pub fn subscribe(&self, callback: impl FnMut(&ListEvent<T>) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().push(Entry {
            id,
            callback: Box::new(callback),
        });
        id
    }

    /// Remove a subscription. When called from within a handler, removal is
    /// deferred to the end of the current dispatch and reported successful.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        if self.dispatching.get() {
            self.detached.borrow_mut().push(id);
            return true;
        }
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        before != entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn dispatching(&self) -> bool {
        self.dispatching.get()
    }

    /// Invoke every subscriber inline. Subscriptions registered during
    /// dispatch take effect for subsequent events.
    pub fn emit(&self, event: &ListEvent<T>) {
        let mut active = mem::take(&mut *self.entries.borrow_mut());
        self.dispatching.set(true);
        for entry in active.iter_mut() {
            (entry.callback)(event);
        }
        self.dispatching.set(false);

        // Merge subscriptions registered during dispatch, then apply
        // deferred unsubscriptions.
        let mut entries = self.entries.borrow_mut();
        let added = mem::take(&mut *entries);
        *entries = active;
        entries.extend(added);
        let detached = mem::take(&mut *self.detached.borrow_mut());
        if !detached.is_empty() {
            entries.retain(|entry| !detached.contains(&entry.id));
        }
    }
}

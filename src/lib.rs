//! # Relist
//!
//! A reconciling observable keyed list for data-bound views.
//!
//! The list reconciles its contents against a freshly computed snapshot of
//! the same logical data, producing the minimal set of structural change
//! notifications — additions, removals, in-place updates, reorders — instead
//! of a clear-and-rebuild. Consumers are view layers that react to every
//! notification, so keeping the notification count low and the batches
//! contiguous is the whole point.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of files, network, or platform
//! - **Batched**: every structural mutation is exactly one notification
//!   covering its extent, never one event per item
//! - **Single-threaded**: listeners run inline on the caller's thread;
//!   callers serialize access externally if they need to share
//! - **Testable**: pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Selection key and content equality
//!
//! Two independent equality notions are fixed at construction time. The
//! *selection key* decides whether two items are the same conceptual item
//! across refresh cycles (and must be unique within the list). *Content
//! equality* decides whether a matched item needs updating; it is composed
//! from primitives — natural `PartialEq`, projections, conjunctions — via
//! the builder.
//!
//! ### Refresh
//!
//! [`KeyedList::refresh`] diffs an incoming ordered sequence against the
//! current contents: unmatched store items are range-removed, unmatched
//! incoming items are range-inserted, changed matched items go through the
//! update strategy, and survivors are reordered with single-element
//! relocations only. An unchanged input emits zero notifications.
//!
//! ### Update strategies
//!
//! [`UpdateStrategy::Replace`] swaps a changed item for its replacement.
//! [`UpdateStrategy::deep_merge`] copies the replacement's fields into the
//! existing item in place through a per-type [`Mergeable`] implementation
//! (or ad-hoc closure), preserving identity and recursively refreshing
//! nested reconciling lists.
//!
//! ## Quick Start
//!
//! ```rust
//! use relist::{Change, KeyedList, ListEvent};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct Row {
//!     id: u32,
//!     label: String,
//! }
//!
//! let mut rows = KeyedList::keyed_by(|row: &Row| row.id)
//!     .and_compare(|row: &Row| row.label.clone())
//!     .build();
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! rows.subscribe(move |event| {
//!     if let ListEvent::Changed(change) = event {
//!         sink.borrow_mut().push(change.clone());
//!     }
//! });
//!
//! rows.add(Row { id: 1, label: "one".into() }).unwrap();
//! rows.add(Row { id: 2, label: "two".into() }).unwrap();
//!
//! // Reconcile against a fresh snapshot: 1 is gone, 3 is new, 2 survives.
//! rows.refresh(vec![
//!     Row { id: 3, label: "three".into() },
//!     Row { id: 2, label: "two".into() },
//! ])
//! .unwrap();
//!
//! let ids: Vec<u32> = rows.iter().map(|row| row.id).collect();
//! assert_eq!(ids, vec![3, 2]);
//!
//! // One batch per mutation: two adds, one remove, one insert.
//! assert_eq!(seen.borrow().len(), 4);
//! assert!(matches!(seen.borrow()[2], Change::Removed { index: 0, .. }));
//! ```

pub mod adapter;
mod cache;
pub mod compare;
pub mod error;
pub mod list;
pub mod merge;
pub mod notify;
mod refresh;
mod reorder;

// Re-export main types at crate root
pub use adapter::AnyOrderedList;
pub use compare::{ContentEq, KeyFn};
pub use error::{Error, Result};
pub use list::{Builder, KeyedList};
pub use merge::{MergeFn, Mergeable, UpdateStrategy};
pub use notify::{Change, ListEvent, SubscriptionId};

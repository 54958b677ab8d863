//! The keyed ordered store.
//!
//! `KeyedList` holds the authoritative item sequence together with a
//! presence map over selection keys and a lazily-revalidated position cache.
//! Every structural mutation emits exactly one [`Change`] batch describing
//! its extent; `refresh` reconciles the list against a fresh snapshot using
//! the fewest batches it can (see the refresh and reorder modules for the
//! planning halves of the pipeline).

use crate::cache::PositionCache;
use crate::compare::{ContentEq, KeyFn};
use crate::error::{Error, Result};
use crate::merge::UpdateStrategy;
use crate::notify::{Change, ListEvent, Registry, SubscriptionId};
use crate::refresh::RefreshPlan;
use crate::reorder;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::ops::Index;
use std::rc::Rc;

/// An observable ordered collection whose items are identified by a
/// selection key.
///
/// Constructed through [`KeyedList::keyed_by`]; the key projection, the
/// content-equality notion, and the update strategy are fixed for the
/// list's lifetime. Single-threaded by design: listeners run inline and
/// the position cache uses interior mutability, so the type is `!Sync`.
pub struct KeyedList<T, K> {
    items: Vec<T>,
    present: HashSet<K>,
    cache: RefCell<PositionCache<K>>,
    key_of: KeyFn<T, K>,
    content_eq: ContentEq<T>,
    strategy: UpdateStrategy<T>,
    subscribers: Registry<T>,
}

/// Builder fixing the two equality notions and the update strategy before
/// the list exists.
pub struct Builder<T, K> {
    key_of: KeyFn<T, K>,
    content_eq: ContentEq<T>,
    strategy: UpdateStrategy<T>,
}

impl<T, K> Builder<T, K>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    /// Compare matched items by natural `PartialEq`.
    pub fn compare_contents(mut self) -> Self
    where
        T: PartialEq,
    {
        self.content_eq = ContentEq::natural();
        self
    }

    /// Compare matched items by a projected value.
    pub fn compare_contents_by<P, F>(mut self, projection: F) -> Self
    where
        F: Fn(&T) -> P + 'static,
        P: PartialEq,
    {
        self.content_eq = ContentEq::by(projection);
        self
    }

    /// Compare matched items with a free-form predicate.
    pub fn compare_contents_with<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T, &T) -> bool + 'static,
    {
        self.content_eq = ContentEq::with(predicate);
        self
    }

    /// Additionally require a projected value to match; chainable.
    pub fn and_compare<P, F>(mut self, projection: F) -> Self
    where
        F: Fn(&T) -> P + 'static,
        P: PartialEq,
    {
        self.content_eq = self.content_eq.and(projection);
        self
    }

    /// Choose the update strategy (the default is [`UpdateStrategy::Replace`]).
    pub fn update_with(mut self, strategy: UpdateStrategy<T>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Shorthand for a deep-merge strategy with an ad-hoc merge function.
    pub fn merge_with<F>(mut self, merge: F) -> Self
    where
        F: Fn(&mut T, T) -> Result<()> + 'static,
    {
        self.strategy = UpdateStrategy::deep_merge_with(merge);
        self
    }

    pub fn build(self) -> KeyedList<T, K> {
        KeyedList {
            items: Vec::new(),
            present: HashSet::new(),
            cache: RefCell::new(PositionCache::new()),
            key_of: self.key_of,
            content_eq: self.content_eq,
            strategy: self.strategy,
            subscribers: Registry::new(),
        }
    }
}

impl<T, K> KeyedList<T, K>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    /// Start building a list whose items are identified by `key`.
    ///
    /// The default content notion considers matched items unchanged; the
    /// default update strategy is `Replace`.
    pub fn keyed_by(key: impl Fn(&T) -> K + 'static) -> Builder<T, K> {
        Builder {
            key_of: Rc::new(key),
            content_eq: ContentEq::key_only(),
            strategy: UpdateStrategy::Replace,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// O(1) presence check via the selection key, independent of order.
    pub fn contains(&self, item: &T) -> bool {
        self.present.contains(&self.key(item))
    }

    /// Index of the item with the same selection key, if present.
    ///
    /// Trusted cache hits are verified by re-keying the element at the
    /// cached position; otherwise a forward scan from the stale marker
    /// repopulates the cache for every visited key, so repeated lookups
    /// after a single invalidating mutation amortize to near-O(1).
    pub fn index_of(&self, item: &T) -> Option<usize> {
        self.index_of_key(&self.key(item))
    }

    /// Register a listener; it is invoked inline for every batch.
    pub fn subscribe(&self, callback: impl FnMut(&ListEvent<T>) + 'static) -> SubscriptionId {
        self.subscribers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.unsubscribe(id)
    }

    /// Append an item. Fails with `DuplicateKey` if its selection key is
    /// already present; the list is left unchanged on error.
    pub fn add(&mut self, item: T) -> Result<()> {
        self.guard()?;
        let key = self.key(&item);
        if self.present.contains(&key) {
            return Err(Error::DuplicateKey { index: 0 });
        }
        let index = self.items.len();
        self.items.push(item);
        self.present.insert(key.clone());
        self.cache.borrow_mut().record(key, index);
        self.notify_added(index, 1);
        Ok(())
    }

    /// Append a batch of items as a single `Added` notification.
    ///
    /// The whole batch is validated (against the list and within itself)
    /// before anything is mutated.
    pub fn add_range(&mut self, items: Vec<T>) -> Result<()> {
        self.guard()?;
        self.validate_new_keys(&items)?;
        if items.is_empty() {
            return Ok(());
        }
        let index = self.items.len();
        self.splice_insert(index, items);
        Ok(())
    }

    pub fn insert(&mut self, index: usize, item: T) -> Result<()> {
        self.insert_range(index, vec![item])
    }

    /// Insert a batch at `index` as a single `Added` notification.
    pub fn insert_range(&mut self, index: usize, items: Vec<T>) -> Result<()> {
        self.guard()?;
        let len = self.items.len();
        if index > len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        self.validate_new_keys(&items)?;
        if items.is_empty() {
            return Ok(());
        }
        self.splice_insert(index, items);
        Ok(())
    }

    /// Remove the item matching `item`'s selection key. Returns `Ok(false)`
    /// when no such key is present.
    pub fn remove(&mut self, item: &T) -> Result<bool> {
        self.guard()?;
        let key = self.key(item);
        match self.index_of_key(&key) {
            Some(index) => {
                self.splice_remove(index, 1);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove and return the item at `index`.
    pub fn remove_at(&mut self, index: usize) -> Result<T> {
        self.guard()?;
        let len = self.items.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        let item = self.items.remove(index);
        self.present.remove(&self.key(&item));
        self.cache.borrow_mut().invalidate_from(index);
        self.notify_removed(index, vec![item.clone()]);
        Ok(item)
    }

    /// Remove `count` items starting at `index` as a single `Removed`
    /// notification.
    pub fn remove_range(&mut self, index: usize, count: usize) -> Result<()> {
        self.guard()?;
        let len = self.items.len();
        if index > len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        if count > len - index {
            return Err(Error::IndexOutOfRange {
                index: index + count,
                len,
            });
        }
        if count == 0 {
            return Ok(());
        }
        self.splice_remove(index, count);
        Ok(())
    }

    /// Relocate exactly one element. A no-op (zero notifications) when the
    /// indices coincide.
    pub fn move_item(&mut self, old_index: usize, new_index: usize) -> Result<()> {
        self.guard()?;
        let len = self.items.len();
        if old_index >= len {
            return Err(Error::IndexOutOfRange {
                index: old_index,
                len,
            });
        }
        if new_index >= len {
            return Err(Error::IndexOutOfRange {
                index: new_index,
                len,
            });
        }
        if old_index != new_index {
            self.splice_move(old_index, new_index);
        }
        Ok(())
    }

    /// Reset the sequence, the presence map, and the cache in one step,
    /// emitting a single `Removed` batch covering everything.
    pub fn clear(&mut self) -> Result<()> {
        self.guard()?;
        if self.items.is_empty() {
            return Ok(());
        }
        let removed: Vec<T> = self.items.drain(..).collect();
        self.present.clear();
        self.cache.borrow_mut().clear();
        self.notify_removed(0, removed);
        Ok(())
    }

    /// Content-replace whatever currently sits at `index`, routed through
    /// the update strategy. Fails with `DuplicateKey` if the incoming key
    /// collides with a different position.
    pub fn set(&mut self, index: usize, item: T) -> Result<()> {
        self.guard()?;
        let len = self.items.len();
        if index >= len {
            return Err(Error::IndexOutOfRange { index, len });
        }
        let new_key = self.key(&item);
        let old_key = self.key(&self.items[index]);
        if new_key != old_key && self.present.contains(&new_key) {
            return Err(Error::DuplicateKey { index: 0 });
        }
        self.apply_strategy_at(index, item)
    }

    /// Bring the existing item with the same selection key up to date.
    /// Fails with `KeyNotFound` when nothing matches; emits nothing when
    /// the content notion reports no change.
    pub fn update(&mut self, item: T) -> Result<()> {
        self.guard()?;
        let key = self.key(&item);
        let Some(index) = self.index_of_key(&key) else {
            return Err(Error::KeyNotFound);
        };
        if self.content_eq.eval(&self.items[index], &item) {
            return Ok(());
        }
        self.apply_strategy_at(index, item)
    }

    /// Update a batch. All keys are validated first; changed items are then
    /// applied grouped into contiguous runs by current index.
    pub fn update_range(&mut self, items: Vec<T>) -> Result<()> {
        self.guard()?;
        for item in &items {
            if !self.present.contains(&self.key(item)) {
                return Err(Error::KeyNotFound);
            }
        }
        let mut changed: Vec<(usize, T)> = Vec::new();
        for item in items {
            let key = self.key(&item);
            if let Some(index) = self.index_of_key(&key) {
                if !self.content_eq.eval(&self.items[index], &item) {
                    changed.push((index, item));
                }
            }
        }
        self.apply_update_runs(changed)
    }

    /// Add the item, or update the existing one with the same key.
    pub fn add_or_update(&mut self, item: T) -> Result<()> {
        self.guard()?;
        if self.present.contains(&self.key(&item)) {
            self.update(item)
        } else {
            self.add(item)
        }
    }

    /// Reconcile the list against a freshly computed snapshot.
    ///
    /// Afterwards the sequence equals `items` in content and order. Runs the
    /// pipeline: classify by selection key, range-remove unmatched store
    /// items, range-insert unmatched incoming items, update changed matched
    /// items through the strategy, then reorder survivors with single-element
    /// relocations. Never fails for legitimate input; strategy errors
    /// propagate. An unchanged input emits zero notifications.
    pub fn refresh(&mut self, items: Vec<T>) -> Result<()> {
        self.guard()?;

        // First occurrence wins if the incoming sequence repeats a key.
        let mut incoming: Vec<(K, T)> = Vec::with_capacity(items.len());
        {
            let mut seen: HashSet<K> = HashSet::with_capacity(items.len());
            for item in items {
                let key = self.key(&item);
                if seen.insert(key.clone()) {
                    incoming.push((key, item));
                }
            }
        }

        // An empty store degenerates to a single bulk insert.
        if self.items.is_empty() {
            if !incoming.is_empty() {
                let items: Vec<T> = incoming.into_iter().map(|(_, item)| item).collect();
                self.splice_insert(0, items);
            }
            return Ok(());
        }

        let current_keys: Vec<K> = self.items.iter().map(|item| self.key(item)).collect();
        let incoming_keys: Vec<K> = incoming.iter().map(|(key, _)| key.clone()).collect();
        let plan = RefreshPlan::build(&current_keys, &incoming_keys);

        // Remove unmatched items, one range per contiguous run, back to front.
        for run in &plan.removals {
            self.splice_remove(run.start, run.len);
        }

        // Insert unmatched items at their incoming positions, stashing
        // matched replacements for the update step. A run's starting index
        // within the incoming sequence is its insertion point.
        let mut replacements: HashMap<K, T> = HashMap::new();
        let mut runs = plan.insertions.iter();
        let mut current_run = runs.next();
        let mut buffer: Vec<T> = Vec::new();
        for (index, (key, item)) in incoming.into_iter().enumerate() {
            match current_run {
                Some(run) if index >= run.start && index < run.start + run.len => {
                    buffer.push(item);
                    if buffer.len() == run.len {
                        self.splice_insert(run.start, mem::take(&mut buffer));
                        current_run = runs.next();
                    }
                }
                _ => {
                    replacements.insert(key, item);
                }
            }
        }

        // Update changed matched items, grouped into runs by current index.
        let order: Vec<K> = self.items.iter().map(|item| self.key(item)).collect();
        let mut changed: Vec<(usize, T)> = Vec::new();
        for (index, key) in order.iter().enumerate() {
            if let Some(replacement) = replacements.remove(key) {
                if !self.content_eq.eval(&self.items[index], &replacement) {
                    changed.push((index, replacement));
                }
            }
        }
        self.apply_update_runs(changed)?;

        // Reorder matched items into target order; unmatched items already
        // sit at their final positions.
        for relocation in reorder::plan_moves(&order, &plan.matched) {
            self.splice_move(relocation.from, relocation.to);
        }
        Ok(())
    }

    fn key(&self, item: &T) -> K {
        (self.key_of)(item)
    }

    fn guard(&self) -> Result<()> {
        if self.subscribers.dispatching() {
            return Err(Error::Reentrancy);
        }
        Ok(())
    }

    fn index_of_key(&self, key: &K) -> Option<usize> {
        if !self.present.contains(key) {
            return None;
        }
        let mut cache = self.cache.borrow_mut();
        if let Some(index) = cache.trusted(key) {
            if index < self.items.len() && self.key(&self.items[index]) == *key {
                return Some(index);
            }
        }
        let start = cache.stale_from().unwrap_or(0);
        for index in start..self.items.len() {
            let visited = self.key(&self.items[index]);
            let hit = visited == *key;
            cache.record(visited, index);
            if hit {
                cache.advance_to(index + 1);
                return Some(index);
            }
        }
        cache.mark_all_valid();
        None
    }

    fn validate_new_keys(&self, items: &[T]) -> Result<()> {
        let mut seen: HashSet<K> = HashSet::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            let key = self.key(item);
            if self.present.contains(&key) || !seen.insert(key) {
                return Err(Error::DuplicateKey { index });
            }
        }
        Ok(())
    }

    // Internal splice helpers assume pre-validated arguments and handle the
    // presence map, the cache, and notification for one batch each.

    fn splice_insert(&mut self, index: usize, items: Vec<T>) {
        let count = items.len();
        let keys: Vec<K> = items.iter().map(|item| self.key(item)).collect();
        {
            let mut cache = self.cache.borrow_mut();
            if index < self.items.len() {
                cache.invalidate_from(index);
            }
            for (offset, key) in keys.iter().enumerate() {
                cache.record(key.clone(), index + offset);
            }
        }
        self.present.extend(keys);
        self.items.splice(index..index, items);
        self.notify_added(index, count);
    }

    fn splice_remove(&mut self, start: usize, count: usize) {
        let removed: Vec<T> = self.items.drain(start..start + count).collect();
        for item in &removed {
            let key = self.key(item);
            self.present.remove(&key);
        }
        self.cache.borrow_mut().invalidate_from(start);
        self.notify_removed(start, removed);
    }

    fn splice_move(&mut self, from: usize, to: usize) {
        let item = self.items.remove(from);
        self.items.insert(to, item);
        self.cache.borrow_mut().invalidate_from(from.min(to));
        if !self.subscribers.is_empty() {
            let item = self.items[to].clone();
            self.emit(Change::Moved { item, from, to });
        }
    }

    fn apply_strategy_at(&mut self, index: usize, replacement: T) -> Result<()> {
        let before = self.key(&self.items[index]);
        match self.strategy.clone() {
            UpdateStrategy::Replace => {
                let old = mem::replace(&mut self.items[index], replacement);
                self.rekey(index, &before);
                if !self.subscribers.is_empty() {
                    let new = self.items[index].clone();
                    self.emit(Change::Replaced {
                        index,
                        old: vec![old],
                        new: vec![new],
                    });
                }
            }
            UpdateStrategy::DeepMerge(merge) => {
                merge(&mut self.items[index], replacement)?;
                self.rekey(index, &before);
            }
        }
        Ok(())
    }

    /// Apply content updates grouped into contiguous runs by current index.
    /// Replacements share the existing keys, so neither the presence map nor
    /// the cache needs touching for the replace path.
    fn apply_update_runs(&mut self, mut changed: Vec<(usize, T)>) -> Result<()> {
        if changed.is_empty() {
            return Ok(());
        }
        changed.sort_by_key(|&(index, _)| index);
        match self.strategy.clone() {
            UpdateStrategy::DeepMerge(merge) => {
                for (index, replacement) in changed {
                    let before = self.key(&self.items[index]);
                    merge(&mut self.items[index], replacement)?;
                    self.rekey(index, &before);
                }
            }
            UpdateStrategy::Replace => {
                let mut run: Vec<(usize, T)> = Vec::new();
                for entry in changed {
                    let contiguous = run
                        .last()
                        .map_or(true, |&(last, _)| entry.0 == last + 1);
                    if !contiguous {
                        self.replace_run(mem::take(&mut run));
                    }
                    run.push(entry);
                }
                self.replace_run(run);
            }
        }
        Ok(())
    }

    fn replace_run(&mut self, run: Vec<(usize, T)>) {
        let Some(&(start, _)) = run.first() else {
            return;
        };
        let count = run.len();
        let new_items: Vec<T> = run.into_iter().map(|(_, item)| item).collect();
        let old: Vec<T> = self
            .items
            .splice(start..start + count, new_items)
            .collect();
        if !self.subscribers.is_empty() {
            let new = self.items[start..start + count].to_vec();
            self.emit(Change::Replaced {
                index: start,
                old,
                new,
            });
        }
    }

    /// Fix the presence map and cache when a strategy application changed
    /// the key at `index` (only possible through `set`).
    fn rekey(&mut self, index: usize, before: &K) {
        let after = self.key(&self.items[index]);
        if after != *before {
            self.present.remove(before);
            self.present.insert(after.clone());
            self.cache.borrow_mut().record(after, index);
        }
    }

    fn notify_added(&self, index: usize, count: usize) {
        if self.subscribers.is_empty() {
            return;
        }
        let items = self.items[index..index + count].to_vec();
        self.emit(Change::Added { index, items });
    }

    fn notify_removed(&self, index: usize, items: Vec<T>) {
        if self.subscribers.is_empty() {
            return;
        }
        self.emit(Change::Removed { index, items });
    }

    fn emit(&self, change: Change<T>) {
        self.subscribers.emit(&ListEvent::Changed(change));
        self.subscribers.emit(&ListEvent::CountChanged {
            count: self.items.len(),
        });
    }
}

impl<T, K> Index<usize> for KeyedList<T, K> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T, K> IntoIterator for &'a KeyedList<T, K> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<T: fmt::Debug, K> fmt::Debug for KeyedList<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

/// Sequence equality over items only; observers and cache state are
/// deliberately ignored so a nested list never poisons content comparison.
impl<T: PartialEq, K> PartialEq for KeyedList<T, K> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: PartialEq, K> PartialEq<Vec<T>> for KeyedList<T, K> {
    fn eq(&self, other: &Vec<T>) -> bool {
        &self.items == other
    }
}

impl<T: PartialEq, K> PartialEq<[T]> for KeyedList<T, K> {
    fn eq(&self, other: &[T]) -> bool {
        self.items == other
    }
}

/// Clones items and configuration; the subscriber registry starts empty.
impl<T: Clone, K: Eq + Hash + Clone> Clone for KeyedList<T, K> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            present: self.present.clone(),
            cache: RefCell::new(self.cache.borrow().clone()),
            key_of: self.key_of.clone(),
            content_eq: self.content_eq.clone(),
            strategy: self.strategy.clone(),
            subscribers: Registry::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Person {
        id: u32,
        name: String,
    }

    fn person(id: u32, name: &str) -> Person {
        Person {
            id,
            name: name.into(),
        }
    }

    /// Keyed by id; content compared by name (the "selection key plus extra
    /// projection" composition).
    fn people() -> KeyedList<Person, u32> {
        KeyedList::keyed_by(|p: &Person| p.id)
            .and_compare(|p: &Person| p.name.clone())
            .build()
    }

    fn seeded(names: &[(u32, &str)]) -> KeyedList<Person, u32> {
        let mut list = people();
        list.add_range(names.iter().map(|&(id, name)| person(id, name)).collect())
            .unwrap();
        list
    }

    fn record_events(list: &KeyedList<Person, u32>) -> Rc<RefCell<Vec<ListEvent<Person>>>> {
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        list.subscribe(move |event| sink.borrow_mut().push(event.clone()));
        events
    }

    fn structural(events: &[ListEvent<Person>]) -> Vec<Change<Person>> {
        events
            .iter()
            .filter_map(|event| match event {
                ListEvent::Changed(change) => Some(change.clone()),
                ListEvent::CountChanged { .. } => None,
            })
            .collect()
    }

    fn ids(list: &KeyedList<Person, u32>) -> Vec<u32> {
        list.iter().map(|p| p.id).collect()
    }

    #[test]
    fn add_and_duplicate() {
        let mut list = people();
        list.add(person(1, "a")).unwrap();
        let result = list.add(person(1, "other"));
        assert_eq!(result, Err(Error::DuplicateKey { index: 0 }));
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "a");
    }

    #[test]
    fn add_range_is_one_batch() {
        let mut list = people();
        let events = record_events(&list);
        list.add_range(vec![person(1, "a"), person(2, "b"), person(3, "c")])
            .unwrap();

        let changes = structural(&events.borrow());
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], Change::Added { index: 0, items } if items.len() == 3));
    }

    #[test]
    fn add_range_validates_before_mutating() {
        let mut list = seeded(&[(1, "a")]);
        let events = record_events(&list);
        let result = list.add_range(vec![person(2, "b"), person(1, "dup")]);
        assert_eq!(result, Err(Error::DuplicateKey { index: 1 }));
        assert_eq!(list.len(), 1);
        assert!(events.borrow().is_empty());

        // Intra-batch duplicates are rejected too.
        let result = list.add_range(vec![person(3, "c"), person(3, "c2")]);
        assert_eq!(result, Err(Error::DuplicateKey { index: 1 }));
    }

    #[test]
    fn insert_bounds() {
        let mut list = seeded(&[(1, "a"), (2, "b")]);
        assert_eq!(
            list.insert(3, person(9, "x")),
            Err(Error::IndexOutOfRange { index: 3, len: 2 })
        );
        list.insert(1, person(9, "x")).unwrap();
        assert_eq!(ids(&list), vec![1, 9, 2]);
    }

    #[test]
    fn insert_at_len_appends() {
        let mut list = seeded(&[(1, "a")]);
        list.insert(1, person(2, "b")).unwrap();
        assert_eq!(ids(&list), vec![1, 2]);
    }

    #[test]
    fn remove_at_returns_the_item() {
        let mut list = seeded(&[(1, "a"), (2, "b")]);
        let events = record_events(&list);
        let removed = list.remove_at(0).unwrap();
        assert_eq!(removed, person(1, "a"));
        assert_eq!(ids(&list), vec![2]);
        assert!(!list.contains(&person(1, "a")));

        let changes = structural(&events.borrow());
        assert_eq!(
            changes,
            vec![Change::Removed {
                index: 0,
                items: vec![person(1, "a")],
            }]
        );

        assert_eq!(
            list.remove_at(5),
            Err(Error::IndexOutOfRange { index: 5, len: 1 })
        );
    }

    #[test]
    fn remove_by_item_uses_the_key_only() {
        let mut list = seeded(&[(1, "a"), (2, "b")]);
        // Name differs; only the key participates.
        assert_eq!(list.remove(&person(2, "whatever")), Ok(true));
        assert_eq!(list.remove(&person(2, "b")), Ok(false));
        assert_eq!(ids(&list), vec![1]);
    }

    #[test]
    fn remove_range_bounds_and_batch() {
        let mut list = seeded(&[(1, "a"), (2, "b"), (3, "c"), (4, "d")]);
        assert_eq!(
            list.remove_range(2, 5),
            Err(Error::IndexOutOfRange { index: 7, len: 4 })
        );

        let events = record_events(&list);
        list.remove_range(1, 2).unwrap();
        assert_eq!(ids(&list), vec![1, 4]);
        let changes = structural(&events.borrow());
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], Change::Removed { index: 1, items } if items.len() == 2));
    }

    #[test]
    fn move_item_relocates_one_element() {
        let mut list = seeded(&[(1, "a"), (2, "b"), (3, "c")]);
        let events = record_events(&list);
        list.move_item(0, 2).unwrap();
        assert_eq!(ids(&list), vec![2, 3, 1]);

        let changes = structural(&events.borrow());
        assert_eq!(
            changes,
            vec![Change::Moved {
                item: person(1, "a"),
                from: 0,
                to: 2,
            }]
        );

        // Same index: no notification.
        list.move_item(1, 1).unwrap();
        assert_eq!(structural(&events.borrow()).len(), 1);

        assert_eq!(
            list.move_item(0, 3),
            Err(Error::IndexOutOfRange { index: 3, len: 3 })
        );
    }

    #[test]
    fn clear_is_one_batch() {
        let mut list = seeded(&[(1, "a"), (2, "b")]);
        let events = record_events(&list);
        list.clear().unwrap();
        assert!(list.is_empty());
        assert!(!list.contains(&person(1, "a")));

        let changes = structural(&events.borrow());
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], Change::Removed { index: 0, items } if items.len() == 2));

        // Clearing an empty list emits nothing.
        list.clear().unwrap();
        assert_eq!(events.borrow().len(), 2);
    }

    #[test]
    fn count_changed_accompanies_every_batch() {
        let mut list = people();
        let events = record_events(&list);
        list.add(person(1, "a")).unwrap();
        list.remove_at(0).unwrap();

        let counts: Vec<usize> = events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                ListEvent::CountChanged { count } => Some(*count),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![1, 0]);
    }

    #[test]
    fn index_of_stays_correct_through_mutations() {
        let mut list = seeded(&[(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e")]);
        assert_eq!(list.index_of(&person(4, "_")), Some(3));

        list.move_item(0, 3).unwrap(); // invalidates from 0
        for (index, id) in ids(&list).into_iter().enumerate() {
            assert_eq!(list.index_of(&person(id, "_")), Some(index));
        }

        list.remove_at(2).unwrap();
        list.insert(1, person(9, "i")).unwrap();
        for (index, id) in ids(&list).into_iter().enumerate() {
            assert_eq!(list.index_of(&person(id, "_")), Some(index));
        }
        assert_eq!(list.index_of(&person(77, "_")), None);
    }

    #[test]
    fn repeated_lookups_heal_the_cache() {
        let mut list = seeded(&[(1, "a"), (2, "b"), (3, "c"), (4, "d")]);
        list.move_item(0, 1).unwrap();
        // First lookup scans and repopulates; the second must still agree.
        assert_eq!(list.index_of(&person(4, "_")), Some(3));
        assert_eq!(list.index_of(&person(4, "_")), Some(3));
        assert_eq!(list.index_of(&person(1, "_")), Some(1));
    }

    #[test]
    fn set_routes_through_the_strategy() {
        let mut list = seeded(&[(1, "a"), (2, "b")]);
        let events = record_events(&list);
        list.set(0, person(1, "a2")).unwrap();
        assert_eq!(list[0], person(1, "a2"));

        let changes = structural(&events.borrow());
        assert_eq!(
            changes,
            vec![Change::Replaced {
                index: 0,
                old: vec![person(1, "a")],
                new: vec![person(1, "a2")],
            }]
        );
    }

    #[test]
    fn set_with_a_colliding_key_is_rejected() {
        let mut list = seeded(&[(1, "a"), (2, "b")]);
        assert_eq!(
            list.set(0, person(2, "clash")),
            Err(Error::DuplicateKey { index: 0 })
        );
        assert_eq!(list[0], person(1, "a"));
    }

    #[test]
    fn set_with_a_fresh_key_rekeys() {
        let mut list = seeded(&[(1, "a"), (2, "b")]);
        list.set(0, person(7, "x")).unwrap();
        assert!(list.contains(&person(7, "_")));
        assert!(!list.contains(&person(1, "_")));
        assert_eq!(list.index_of(&person(7, "_")), Some(0));
    }

    #[test]
    fn update_semantics() {
        let mut list = seeded(&[(1, "a"), (2, "b")]);
        assert_eq!(list.update(person(9, "x")), Err(Error::KeyNotFound));

        let events = record_events(&list);
        // Content-equal: nothing happens.
        list.update(person(1, "a")).unwrap();
        assert!(events.borrow().is_empty());

        list.update(person(1, "a2")).unwrap();
        assert_eq!(list[0].name, "a2");
        assert_eq!(structural(&events.borrow()).len(), 1);
    }

    #[test]
    fn update_range_groups_contiguous_runs() {
        let mut list = seeded(&[(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e")]);
        let events = record_events(&list);

        // Indices 0,1,2 are contiguous: one batch. Index 4 is separate.
        list.update_range(vec![
            person(1, "a2"),
            person(2, "b2"),
            person(3, "c2"),
            person(5, "e2"),
        ])
        .unwrap();

        let changes = structural(&events.borrow());
        assert_eq!(changes.len(), 2);
        assert!(matches!(&changes[0], Change::Replaced { index: 0, new, .. } if new.len() == 3));
        assert!(matches!(&changes[1], Change::Replaced { index: 4, new, .. } if new.len() == 1));
        assert_eq!(list[4].name, "e2");
    }

    #[test]
    fn update_range_validates_all_keys_first() {
        let mut list = seeded(&[(1, "a")]);
        let result = list.update_range(vec![person(1, "a2"), person(9, "x")]);
        assert_eq!(result, Err(Error::KeyNotFound));
        assert_eq!(list[0].name, "a"); // untouched
    }

    #[test]
    fn add_or_update_never_duplicates() {
        let mut list = seeded(&[(1, "a")]);
        list.add_or_update(person(1, "a2")).unwrap();
        list.add_or_update(person(2, "b")).unwrap();
        assert_eq!(ids(&list), vec![1, 2]);
        assert_eq!(list[0].name, "a2");
    }

    #[test]
    fn deep_merge_preserves_identity() {
        #[derive(Debug, Clone, PartialEq)]
        struct Counter {
            id: u32,
            label: String,
            revision: u64,
        }

        let mut list = KeyedList::keyed_by(|c: &Counter| c.id)
            .and_compare(|c: &Counter| c.label.clone())
            .merge_with(|existing, replacement| {
                existing.label = replacement.label;
                // `revision` is deliberately not copied.
                Ok(())
            })
            .build();
        list.add(Counter {
            id: 1,
            label: "old".into(),
            revision: 42,
        })
        .unwrap();

        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        list.subscribe(move |event: &ListEvent<Counter>| sink.borrow_mut().push(event.clone()));

        list.update(Counter {
            id: 1,
            label: "new".into(),
            revision: 0,
        })
        .unwrap();

        // Merged in place: no structural notification, untouched field kept.
        assert!(events.borrow().is_empty());
        assert_eq!(list[0].label, "new");
        assert_eq!(list[0].revision, 42);
    }

    #[test]
    fn refresh_on_empty_is_one_bulk_insert() {
        let mut list = people();
        let events = record_events(&list);
        list.refresh(vec![person(1, "a"), person(2, "b"), person(3, "c")])
            .unwrap();
        assert_eq!(ids(&list), vec![1, 2, 3]);

        let changes = structural(&events.borrow());
        assert_eq!(changes.len(), 1);
        assert!(matches!(&changes[0], Change::Added { index: 0, items } if items.len() == 3));
    }

    #[test]
    fn refresh_is_idempotent() {
        let mut list = seeded(&[(1, "a"), (2, "b"), (3, "c")]);
        let snapshot = vec![person(3, "c"), person(1, "a2"), person(9, "x")];
        list.refresh(snapshot.clone()).unwrap();

        let events = record_events(&list);
        list.refresh(snapshot.clone()).unwrap();
        assert!(events.borrow().is_empty());
        assert_eq!(list, snapshot);
    }

    #[test]
    fn refresh_matches_order_and_content() {
        let mut list = seeded(&[(1, "a"), (2, "b"), (3, "c"), (4, "d")]);
        let snapshot = vec![
            person(4, "d"),
            person(9, "new"),
            person(2, "b2"),
            person(1, "a"),
        ];
        list.refresh(snapshot.clone()).unwrap();
        assert_eq!(list, snapshot);
    }

    #[test]
    fn refresh_permutation_emits_only_moves() {
        let mut list = seeded(&[(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e")]);
        let events = record_events(&list);
        list.refresh(vec![
            person(4, "d"),
            person(2, "b"),
            person(5, "e"),
            person(1, "a"),
            person(3, "c"),
        ])
        .unwrap();
        assert_eq!(ids(&list), vec![4, 2, 5, 1, 3]);

        let changes = structural(&events.borrow());
        assert!(!changes.is_empty());
        assert!(changes
            .iter()
            .all(|change| matches!(change, Change::Moved { .. })));
    }

    #[test]
    fn refresh_chunks_removals_and_insertions() {
        let mut list = seeded(&[(1, "a"), (2, "b"), (3, "c"), (4, "d"), (5, "e"), (6, "f")]);
        let events = record_events(&list);
        // Drop the contiguous block 2..=4, insert the contiguous block 7..=9.
        list.refresh(vec![
            person(1, "a"),
            person(7, "g"),
            person(8, "h"),
            person(9, "i"),
            person(5, "e"),
            person(6, "f"),
        ])
        .unwrap();

        let changes = structural(&events.borrow());
        let removed: Vec<_> = changes
            .iter()
            .filter(|c| matches!(c, Change::Removed { .. }))
            .collect();
        let added: Vec<_> = changes
            .iter()
            .filter(|c| matches!(c, Change::Added { .. }))
            .collect();
        assert_eq!(removed.len(), 1);
        assert_eq!(added.len(), 1);
        assert_eq!(removed[0].span(), 3);
        assert_eq!(added[0].span(), 3);
        assert_eq!(ids(&list), vec![1, 7, 8, 9, 5, 6]);
    }

    #[test]
    fn refresh_updates_changed_matched_items() {
        let mut list = seeded(&[(1, "a"), (2, "b")]);
        let events = record_events(&list);
        // Same keys, same order, one changed name: exactly one update.
        list.refresh(vec![person(1, "a"), person(2, "b2")]).unwrap();

        let changes = structural(&events.borrow());
        assert_eq!(
            changes,
            vec![Change::Replaced {
                index: 1,
                old: vec![person(2, "b")],
                new: vec![person(2, "b2")],
            }]
        );
    }

    #[test]
    fn refresh_to_empty_removes_everything_as_one_batch() {
        let mut list = seeded(&[(1, "a"), (2, "b")]);
        let events = record_events(&list);
        list.refresh(Vec::new()).unwrap();
        assert!(list.is_empty());
        assert_eq!(structural(&events.borrow()).len(), 1);
    }

    #[test]
    fn refresh_tolerates_duplicate_incoming_keys() {
        let mut list = seeded(&[(1, "a")]);
        list.refresh(vec![person(2, "first"), person(2, "second"), person(1, "a")])
            .unwrap();
        assert_eq!(ids(&list), vec![2, 1]);
        assert_eq!(list[0].name, "first");
        // Uniqueness invariant intact.
        assert_eq!(list.index_of(&person(2, "_")), Some(0));
    }

    #[test]
    fn refresh_propagates_merge_errors() {
        let mut list = KeyedList::keyed_by(|p: &Person| p.id)
            .and_compare(|p: &Person| p.name.clone())
            .merge_with(|_, _| Err(Error::InvalidMerge("shape differs".into())))
            .build();
        list.add(person(1, "a")).unwrap();

        let result = list.refresh(vec![person(1, "changed")]);
        assert_eq!(result, Err(Error::InvalidMerge("shape differs".into())));
    }

    #[test]
    fn sequence_equality_ignores_observers() {
        let a = seeded(&[(1, "a"), (2, "b")]);
        let b = seeded(&[(1, "a"), (2, "b")]);
        record_events(&a);
        assert_eq!(a, b);
        assert_eq!(a, vec![person(1, "a"), person(2, "b")]);
    }

    #[test]
    fn clone_starts_with_a_fresh_registry() {
        let original = seeded(&[(1, "a")]);
        let events = record_events(&original);

        let mut copy = original.clone();
        copy.add(person(2, "b")).unwrap();

        assert!(events.borrow().is_empty());
        assert_eq!(ids(&copy), vec![1, 2]);
        assert_eq!(ids(&original), vec![1]);
    }

    #[test]
    fn iteration_and_indexing() {
        let list = seeded(&[(1, "a"), (2, "b")]);
        let collected: Vec<u32> = (&list).into_iter().map(|p| p.id).collect();
        assert_eq!(collected, vec![1, 2]);
        assert_eq!(list[1], person(2, "b"));
        assert_eq!(list.get(2), None);
        assert_eq!(list.as_slice().len(), 2);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn dedup_first(keys: Vec<u8>) -> Vec<u8> {
            let mut seen = HashSet::new();
            keys.into_iter().filter(|k| seen.insert(*k)).collect()
        }

        fn snapshot(keys: &[u8]) -> Vec<Person> {
            keys.iter()
                .map(|&k| person(k as u32, &format!("n{k}")))
                .collect()
        }

        proptest! {
            #[test]
            fn prop_refresh_yields_the_incoming_order(
                first in proptest::collection::vec(0u8..40, 0..30),
                second in proptest::collection::vec(0u8..40, 0..30),
            ) {
                let first = dedup_first(first);
                let second = dedup_first(second);

                let mut list = people();
                list.refresh(snapshot(&first)).unwrap();
                list.refresh(snapshot(&second)).unwrap();

                let got: Vec<u8> = list.iter().map(|p| p.id as u8).collect();
                prop_assert_eq!(got, second);
            }

            #[test]
            fn prop_second_refresh_is_silent(
                first in proptest::collection::vec(0u8..40, 0..30),
                second in proptest::collection::vec(0u8..40, 0..30),
            ) {
                let first = dedup_first(first);
                let second = dedup_first(second);

                let mut list = people();
                list.refresh(snapshot(&first)).unwrap();
                list.refresh(snapshot(&second)).unwrap();

                let events = record_events(&list);
                list.refresh(snapshot(&second)).unwrap();
                prop_assert!(events.borrow().is_empty());
            }

            #[test]
            fn prop_lookups_agree_with_positions_after_churn(
                first in proptest::collection::vec(0u8..40, 0..30),
                second in proptest::collection::vec(0u8..40, 0..30),
            ) {
                let first = dedup_first(first);
                let second = dedup_first(second);

                let mut list = people();
                list.refresh(snapshot(&first)).unwrap();
                list.refresh(snapshot(&second)).unwrap();

                for (index, key) in second.iter().enumerate() {
                    prop_assert_eq!(list.index_of(&person(*key as u32, "_")), Some(index));
                }
            }
        }
    }
}

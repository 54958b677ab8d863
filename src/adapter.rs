//! Untyped list facade for hosts that only understand a generic list
//! protocol.
//!
//! The facade is a thin delegating trait implementation over the typed
//! store, not a parallel surface: values cross the boundary as `dyn Any`
//! and every operation on a value whose runtime type is not the list's item
//! type fails with [`Error::TypeMismatch`] naming the expected type.

use crate::error::{Error, Result};
use crate::list::KeyedList;
use std::any::Any;
use std::hash::Hash;

/// Object-safe, untyped view of an ordered keyed list.
pub trait AnyOrderedList {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_any(&self, index: usize) -> Option<&dyn Any>;

    /// Append; `DuplicateKey` and `TypeMismatch` apply as in the typed API.
    fn push_any(&mut self, item: Box<dyn Any>) -> Result<()>;

    fn insert_any(&mut self, index: usize, item: Box<dyn Any>) -> Result<()>;

    /// Content replacement routed through the update strategy.
    fn set_any(&mut self, index: usize, item: Box<dyn Any>) -> Result<()>;

    fn remove_at_any(&mut self, index: usize) -> Result<()>;

    fn move_any(&mut self, old_index: usize, new_index: usize) -> Result<()>;

    fn clear_any(&mut self) -> Result<()>;

    fn contains_any(&self, item: &dyn Any) -> bool;

    fn index_of_any(&self, item: &dyn Any) -> Option<usize>;
}

fn downcast<T: 'static>(item: Box<dyn Any>) -> Result<T> {
    item.downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| Error::TypeMismatch {
            expected: std::any::type_name::<T>(),
        })
}

impl<T, K> AnyOrderedList for KeyedList<T, K>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    fn len(&self) -> usize {
        KeyedList::len(self)
    }

    fn get_any(&self, index: usize) -> Option<&dyn Any> {
        self.get(index).map(|item| item as &dyn Any)
    }

    fn push_any(&mut self, item: Box<dyn Any>) -> Result<()> {
        self.add(downcast::<T>(item)?)
    }

    fn insert_any(&mut self, index: usize, item: Box<dyn Any>) -> Result<()> {
        self.insert(index, downcast::<T>(item)?)
    }

    fn set_any(&mut self, index: usize, item: Box<dyn Any>) -> Result<()> {
        self.set(index, downcast::<T>(item)?)
    }

    fn remove_at_any(&mut self, index: usize) -> Result<()> {
        self.remove_at(index).map(|_| ())
    }

    fn move_any(&mut self, old_index: usize, new_index: usize) -> Result<()> {
        self.move_item(old_index, new_index)
    }

    fn clear_any(&mut self) -> Result<()> {
        self.clear()
    }

    fn contains_any(&self, item: &dyn Any) -> bool {
        item.downcast_ref::<T>()
            .map_or(false, |item| self.contains(item))
    }

    fn index_of_any(&self, item: &dyn Any) -> Option<usize> {
        self.index_of(item.downcast_ref::<T>()?)
    }
}

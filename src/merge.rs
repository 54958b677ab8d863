//! Update strategies applied when a matched item's content has changed.
//!
//! The strategy is fixed at construction time. `Replace` swaps the old item
//! for the new one; `DeepMerge` copies the replacement's fields into the
//! existing item in place, preserving its identity. Both preserve element
//! count and never disturb the positions of unaffected elements.

use crate::error::Result;
use std::fmt;
use std::rc::Rc;

/// Per-type merge function: copy every differing field of the replacement
/// into the existing item in place. See [`Mergeable::merge_from`] for the
/// contract.
pub type MergeFn<T> = Rc<dyn Fn(&mut T, T) -> Result<()>>;

/// How a changed matched item is brought up to date.
#[derive(Clone)]
pub enum UpdateStrategy<T> {
    /// Swap the old item for the new one. Identity changes; the old item is
    /// discarded and surfaces in the `Replaced` notification.
    Replace,
    /// Merge the replacement into the existing item in place. Identity is
    /// preserved and no structural notification is raised; field-level
    /// notification is the merge function's responsibility.
    DeepMerge(MergeFn<T>),
}

impl<T> UpdateStrategy<T> {
    /// Deep merge through the type's [`Mergeable`] implementation.
    pub fn deep_merge() -> Self
    where
        T: Mergeable + 'static,
    {
        UpdateStrategy::DeepMerge(Rc::new(|existing, replacement| {
            existing.merge_from(replacement)
        }))
    }

    /// Deep merge through an ad-hoc merge function.
    pub fn deep_merge_with(merge: impl Fn(&mut T, T) -> Result<()> + 'static) -> Self {
        UpdateStrategy::DeepMerge(Rc::new(merge))
    }
}

impl<T> Default for UpdateStrategy<T> {
    fn default() -> Self {
        UpdateStrategy::Replace
    }
}

impl<T> fmt::Debug for UpdateStrategy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateStrategy::Replace => f.write_str("Replace"),
            UpdateStrategy::DeepMerge(_) => f.write_str("DeepMerge"),
        }
    }
}

/// Field-by-field merge contract for [`UpdateStrategy::deep_merge`].
///
/// Implementations copy each field of `replacement` into `self`, raising the
/// item's own field-level change notification for every field actually
/// changed, if the type supports such notifications. A field holding a
/// nested reconciling list is `refresh`ed with the replacement's contents
/// rather than being replaced wholesale; if the replacement's counterpart is
/// absent, the nested list is cleared instead. Structurally incompatible
/// input fails with [`crate::Error::InvalidMerge`].
pub trait Mergeable {
    fn merge_from(&mut self, replacement: Self) -> Result<()>;
}

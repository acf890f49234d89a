//! Item handles
//!
//! [`ItemRef`] names an item without pinning it. [`ItemGuard`] is a pinned
//! reader: while it exists the item's payload will not be rewritten or
//! reclaimed by a table update or delete.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::table::Quiescence;

use super::Item;

/// Unpinned handle to an item
#[derive(Clone)]
pub struct ItemRef(pub(crate) Arc<Item>);

impl ItemRef {
    pub fn new(item: Item) -> Self {
        Self(Arc::new(item))
    }

    /// True if both handles name the same item
    pub fn ptr_eq(&self, other: &ItemRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn arc(&self) -> &Arc<Item> {
        &self.0
    }
}

impl From<Arc<Item>> for ItemRef {
    fn from(item: Arc<Item>) -> Self {
        Self(item)
    }
}

impl Deref for ItemRef {
    type Target = Item;

    fn deref(&self) -> &Item {
        &self.0
    }
}

impl fmt::Debug for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Pinned reader of an item.
///
/// Dropping the guard is the matching StopAccess. Cloning it pins the item
/// again without a lookup.
pub struct ItemGuard<'t> {
    item: Arc<Item>,
    quiescence: &'t Quiescence,
}

impl<'t> ItemGuard<'t> {
    /// Wrap an item whose reference count has already been incremented
    pub(crate) fn from_pinned(item: Arc<Item>, quiescence: &'t Quiescence) -> Self {
        Self { item, quiescence }
    }

    /// Pin `item` unconditionally
    pub(crate) fn pin(item: Arc<Item>, quiescence: &'t Quiescence) -> Self {
        item.pin();
        item.record_request();
        Self::from_pinned(item, quiescence)
    }

    /// Unpinned handle to the same item
    pub fn item_ref(&self) -> ItemRef {
        ItemRef(Arc::clone(&self.item))
    }

    /// True if the guard pins the item named by `other`
    pub fn is(&self, other: &ItemRef) -> bool {
        Arc::ptr_eq(&self.item, &other.0)
    }
}

impl Deref for ItemGuard<'_> {
    type Target = Item;

    fn deref(&self) -> &Item {
        &self.item
    }
}

impl Clone for ItemGuard<'_> {
    fn clone(&self) -> Self {
        Self::pin(Arc::clone(&self.item), self.quiescence)
    }
}

impl Drop for ItemGuard<'_> {
    fn drop(&mut self) {
        self.quiescence.release(&self.item);
    }
}

impl fmt::Debug for ItemGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ItemGuard").field(&*self.item).finish()
    }
}

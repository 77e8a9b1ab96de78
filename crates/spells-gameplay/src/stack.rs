//! Item stacks.

use serde::{Deserialize, Serialize};

use spells_common::ItemTypeId;

/// A quantity of one item type occupying a slot.
///
/// A stack in a container always has `1 <= count <= stack_limit`; an empty
/// slot is `None`, never a zero-count stack. Use
/// [`ItemCatalog::stack`](crate::item::ItemCatalog::stack) to build a
/// validated one from untrusted input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item type
    pub item: ItemTypeId,
    /// Number of units
    pub count: u32,
}

impl ItemStack {
    /// Creates a stack.
    #[must_use]
    pub const fn new(item: ItemTypeId, count: u32) -> Self {
        Self { item, count }
    }

    /// Returns the same item with a different count.
    #[must_use]
    pub const fn with_count(self, count: u32) -> Self {
        Self {
            item: self.item,
            count,
        }
    }

    /// Splits `n` units off this stack, returning them.
    ///
    /// Returns `None` if `n` is zero or not strictly less than the count;
    /// use a full move for that case.
    pub fn split_off(&mut self, n: u32) -> Option<Self> {
        if n == 0 || n >= self.count {
            return None;
        }
        self.count -= n;
        Some(self.with_count(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_off() {
        let mut stack = ItemStack::new(ItemTypeId::new(3), 5);
        let taken = stack.split_off(3).expect("should split");
        assert_eq!(taken.count, 3);
        assert_eq!(stack.count, 2);
        assert_eq!(taken.item, stack.item);
    }

    #[test]
    fn test_split_off_rejects_degenerate() {
        let mut stack = ItemStack::new(ItemTypeId::new(3), 2);
        assert!(stack.split_off(0).is_none());
        assert!(stack.split_off(2).is_none());
        assert_eq!(stack.count, 2);
    }
}

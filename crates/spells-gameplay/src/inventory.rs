//! Slot containers: the hotbar, the crafting grid and the cursor.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use spells_common::{ContentResult, ItemTypeId, RecipeKey};

use crate::item::ItemCatalog;
use crate::stack::ItemStack;

/// Number of hotbar slots.
pub const HOTBAR_SIZE: usize = 9;

/// Side length of the square crafting grid.
pub const GRID_SIZE: usize = 3;

/// Number of crafting grid cells.
pub const GRID_CELLS: usize = GRID_SIZE * GRID_SIZE;

/// A cell of the crafting grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GridPos {
    /// Row, top to bottom
    pub row: usize,
    /// Column, left to right
    pub col: usize,
}

impl GridPos {
    /// Creates a grid position. May be out of range; see [`Self::is_valid`].
    #[must_use]
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Returns true if the position lies inside the grid.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.row < GRID_SIZE && self.col < GRID_SIZE
    }

    /// Row-major index, if in range.
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        if self.is_valid() {
            Some(self.row * GRID_SIZE + self.col)
        } else {
            None
        }
    }

    /// Position of a row-major index.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        Self::new(index / GRID_SIZE, index % GRID_SIZE)
    }

    /// All cells in row-major order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..GRID_CELLS).map(Self::from_index)
    }
}

/// Address of a slot a stack can be picked from or placed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotAddress {
    /// Hotbar slot by index
    Hotbar(usize),
    /// Crafting grid cell
    Grid(GridPos),
}

/// Fixed-size row of optional stacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotContainer<const N: usize> {
    slots: [Option<ItemStack>; N],
}

impl<const N: usize> Default for SlotContainer<N> {
    fn default() -> Self {
        Self { slots: [None; N] }
    }
}

impl<const N: usize> SlotContainer<N> {
    /// Creates an empty container.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of slots.
    #[must_use]
    pub const fn len(&self) -> usize {
        N
    }

    /// Returns true if the container has no slots.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// Returns the stack in a slot. Out-of-range indices read as empty.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<ItemStack> {
        self.slots.get(index).copied().flatten()
    }

    /// Overwrites a slot. Returns false if the index is out of range.
    pub fn set(&mut self, index: usize, value: Option<ItemStack>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Empties a slot, returning what it held.
    pub fn take(&mut self, index: usize) -> Option<ItemStack> {
        self.slots.get_mut(index).and_then(Option::take)
    }

    /// Iterates slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<&ItemStack>)> {
        self.slots.iter().enumerate().map(|(i, s)| (i, s.as_ref()))
    }

    /// Occupied slots in index order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &ItemStack)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (i, s)))
    }

    /// Number of empty slots.
    #[must_use]
    pub fn empty_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_none()).count()
    }

    /// Returns true if every slot is empty.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Empties every slot.
    pub fn clear(&mut self) {
        self.slots = [None; N];
    }

    /// Total units of an item across all slots.
    #[must_use]
    pub fn count_of(&self, item: ItemTypeId) -> u32 {
        self.occupied()
            .filter(|(_, s)| s.item == item)
            .map(|(_, s)| s.count)
            .sum()
    }

    /// Returns true if `count` units of `item` would fit.
    ///
    /// Counts free space in partial stacks of the same item plus one full
    /// stack per empty slot. For unique items that reduces to one empty
    /// slot per unit.
    pub fn can_fit(&self, catalog: &ItemCatalog, item: ItemTypeId, count: u32) -> ContentResult<bool> {
        let limit = catalog.stack_limit(item)?;
        let mut space: u64 = 0;
        for (_, slot) in self.occupied() {
            if slot.item == item {
                space += u64::from(limit.saturating_sub(slot.count));
            }
        }
        space += self.empty_slots() as u64 * u64::from(limit);
        Ok(space >= u64::from(count))
    }

    /// Adds a stack: tops up existing stacks of the same item in index
    /// order, then fills empty slots.
    ///
    /// All-or-nothing: returns false without touching any slot if the
    /// whole count does not fit.
    pub fn add(&mut self, catalog: &ItemCatalog, stack: ItemStack) -> ContentResult<bool> {
        if stack.count == 0 {
            return Ok(true);
        }
        if !self.can_fit(catalog, stack.item, stack.count)? {
            return Ok(false);
        }

        let limit = catalog.stack_limit(stack.item)?;
        let mut remaining = stack.count;

        if limit > 1 {
            for slot in self.slots.iter_mut().flatten() {
                if remaining == 0 {
                    break;
                }
                if slot.item != stack.item || slot.count >= limit {
                    continue;
                }
                let moved = remaining.min(limit - slot.count);
                slot.count += moved;
                remaining -= moved;
            }
        }

        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            if slot.is_none() {
                let placed = remaining.min(limit);
                *slot = Some(stack.with_count(placed));
                remaining -= placed;
            }
        }

        Ok(true)
    }

    /// Removes `count` units of an item, draining slots in index order.
    ///
    /// All-or-nothing: returns false and leaves the container untouched if
    /// fewer than `count` units are present.
    pub fn consume(&mut self, item: ItemTypeId, count: u32) -> bool {
        if self.count_of(item) < count {
            return false;
        }

        let mut remaining = count;
        for slot in &mut self.slots {
            if remaining == 0 {
                break;
            }
            let Some(stack) = slot else { continue };
            if stack.item != item {
                continue;
            }
            let taken = stack.count.min(remaining);
            stack.count -= taken;
            remaining -= taken;
            if stack.count == 0 {
                *slot = None;
            }
        }
        true
    }
}

/// The player's hotbar.
pub type Hotbar = SlotContainer<HOTBAR_SIZE>;

/// The 3×3 crafting grid.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CraftingGrid {
    cells: SlotContainer<GRID_CELLS>,
}

impl CraftingGrid {
    /// Creates an empty grid.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stack in a cell. Out-of-range positions read as empty.
    #[must_use]
    pub fn get(&self, pos: GridPos) -> Option<ItemStack> {
        pos.index().and_then(|i| self.cells.get(i))
    }

    /// Overwrites a cell. Returns false if the position is out of range.
    pub fn set(&mut self, pos: GridPos, value: Option<ItemStack>) -> bool {
        match pos.index() {
            Some(i) => self.cells.set(i, value),
            None => false,
        }
    }

    /// Empties a cell, returning what it held.
    pub fn take(&mut self, pos: GridPos) -> Option<ItemStack> {
        pos.index().and_then(|i| self.cells.take(i))
    }

    /// Occupied cells in row-major order.
    pub fn occupied(&self) -> impl Iterator<Item = (GridPos, &ItemStack)> {
        self.cells.occupied().map(|(i, s)| (GridPos::from_index(i), s))
    }

    /// Total units of an item in the grid.
    #[must_use]
    pub fn count_of(&self, item: ItemTypeId) -> u32 {
        self.cells.count_of(item)
    }

    /// Returns true if every cell is empty.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.cells.is_clear()
    }

    /// Empties every cell.
    pub fn clear(&mut self) {
        self.cells.clear();
    }
}

/// The stack held by the cursor, with where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeldStack {
    /// Held units
    pub stack: ItemStack,
    /// Slot it was picked up from; cleared once any of it is placed
    pub origin: Option<SlotAddress>,
    /// Primary placement into the grid drops one unit at a time
    pub split_place: bool,
}

/// The single cursor holding slot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    held: Option<HeldStack>,
}

impl Cursor {
    /// Returns the held stack with its metadata.
    #[must_use]
    pub const fn held(&self) -> Option<&HeldStack> {
        self.held.as_ref()
    }

    /// Returns the held stack.
    #[must_use]
    pub fn stack(&self) -> Option<ItemStack> {
        self.held.map(|h| h.stack)
    }

    /// Returns true if nothing is held.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.held.is_none()
    }

    /// Holds a stack, replacing anything held.
    pub fn hold(&mut self, stack: ItemStack, origin: Option<SlotAddress>) {
        self.held = Some(HeldStack {
            stack,
            origin,
            split_place: false,
        });
    }

    /// Releases the held stack.
    pub fn take(&mut self) -> Option<HeldStack> {
        self.held.take()
    }

    pub(crate) fn held_mut(&mut self) -> Option<&mut HeldStack> {
        self.held.as_mut()
    }
}

/// Everything the inventory engine owns for one player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryState {
    /// Hotbar slots
    pub hotbar: Hotbar,
    /// Crafting grid cells
    pub grid: CraftingGrid,
    /// Cursor slot
    pub cursor: Cursor,
    /// Identities of recipes crafted at least once
    pub discovered: BTreeSet<RecipeKey>,
    /// Selected hotbar index
    pub selected_slot: usize,
    /// Whether the crafting interface is open
    pub crafting_open: bool,
}

impl InventoryState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the address can be read or written right now.
    #[must_use]
    pub fn is_valid(&self, addr: SlotAddress) -> bool {
        match addr {
            SlotAddress::Hotbar(i) => i < HOTBAR_SIZE,
            SlotAddress::Grid(pos) => self.crafting_open && pos.is_valid(),
        }
    }

    /// Reads a slot. Invalid addresses read as empty.
    #[must_use]
    pub fn get(&self, addr: SlotAddress) -> Option<ItemStack> {
        if !self.is_valid(addr) {
            return None;
        }
        match addr {
            SlotAddress::Hotbar(i) => self.hotbar.get(i),
            SlotAddress::Grid(pos) => self.grid.get(pos),
        }
    }

    /// Overwrites a slot. Returns false for invalid addresses.
    pub fn set(&mut self, addr: SlotAddress, value: Option<ItemStack>) -> bool {
        if !self.is_valid(addr) {
            return false;
        }
        match addr {
            SlotAddress::Hotbar(i) => self.hotbar.set(i, value),
            SlotAddress::Grid(pos) => self.grid.set(pos, value),
        }
    }

    /// Stack in the selected hotbar slot.
    #[must_use]
    pub fn selected_stack(&self) -> Option<ItemStack> {
        self.hotbar.get(self.selected_slot)
    }

    /// Units of an item across hotbar, grid and cursor.
    #[must_use]
    pub fn total_count(&self, item: ItemTypeId) -> u32 {
        let held = self
            .cursor
            .stack()
            .filter(|s| s.item == item)
            .map_or(0, |s| s.count);
        self.hotbar.count_of(item) + self.grid.count_of(item) + held
    }

    /// Marks a recipe discovered. Returns true the first time.
    pub fn discover(&mut self, key: RecipeKey) -> bool {
        self.discovered.insert(key)
    }

    /// Returns true if the recipe has been discovered.
    #[must_use]
    pub fn is_discovered(&self, key: &RecipeKey) -> bool {
        self.discovered.contains(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ItemCatalog {
        ItemCatalog::builtin().expect("builtin catalog")
    }

    fn id(catalog: &ItemCatalog, key: &str) -> ItemTypeId {
        catalog.id_of(key).expect("known item")
    }

    #[test]
    fn test_grid_pos_row_major() {
        let order: Vec<_> = GridPos::all().collect();
        assert_eq!(order[0], GridPos::new(0, 0));
        assert_eq!(order[1], GridPos::new(0, 1));
        assert_eq!(order[3], GridPos::new(1, 0));
        assert_eq!(order[8], GridPos::new(2, 2));
        assert_eq!(GridPos::new(3, 0).index(), None);
    }

    #[test]
    fn test_add_merges_then_fills_empty() {
        let catalog = catalog();
        let ore = id(&catalog, "iron_ore");
        let mut hotbar = Hotbar::new();
        hotbar.set(2, Some(ItemStack::new(ore, 60)));

        assert!(hotbar.add(&catalog, ItemStack::new(ore, 10)).expect("add"));
        assert_eq!(hotbar.get(2), Some(ItemStack::new(ore, 64)));
        assert_eq!(hotbar.get(0), Some(ItemStack::new(ore, 6)));
        assert_eq!(hotbar.count_of(ore), 70);
    }

    #[test]
    fn test_add_unique_items_use_separate_slots() {
        let catalog = catalog();
        let sword = id(&catalog, "iron_sword");
        let mut hotbar = Hotbar::new();

        assert!(hotbar.add(&catalog, ItemStack::new(sword, 2)).expect("add"));
        assert_eq!(hotbar.get(0), Some(ItemStack::new(sword, 1)));
        assert_eq!(hotbar.get(1), Some(ItemStack::new(sword, 1)));
    }

    #[test]
    fn test_add_is_atomic_when_full() {
        let catalog = catalog();
        let wood = id(&catalog, "wood");
        let coal = id(&catalog, "coal");
        let mut hotbar = Hotbar::new();
        for i in 0..HOTBAR_SIZE {
            hotbar.set(i, Some(ItemStack::new(coal, 64)));
        }
        hotbar.set(0, Some(ItemStack::new(wood, 60)));
        let before = hotbar.clone();

        // 4 units of space, asking for 5
        assert!(!hotbar.add(&catalog, ItemStack::new(wood, 5)).expect("add"));
        assert_eq!(hotbar, before);

        assert!(hotbar.add(&catalog, ItemStack::new(wood, 4)).expect("add"));
        assert_eq!(hotbar.get(0), Some(ItemStack::new(wood, 64)));
    }

    #[test]
    fn test_add_unknown_item_is_error() {
        let catalog = catalog();
        let mut hotbar = Hotbar::new();
        assert!(hotbar
            .add(&catalog, ItemStack::new(ItemTypeId::new(500), 1))
            .is_err());
    }

    #[test]
    fn test_consume_is_atomic() {
        let catalog = catalog();
        let berry = id(&catalog, "berry");
        let mut hotbar = Hotbar::new();
        hotbar.set(1, Some(ItemStack::new(berry, 3)));
        hotbar.set(4, Some(ItemStack::new(berry, 2)));

        assert!(!hotbar.consume(berry, 6));
        assert_eq!(hotbar.count_of(berry), 5);

        assert!(hotbar.consume(berry, 4));
        assert_eq!(hotbar.get(1), None);
        assert_eq!(hotbar.get(4), Some(ItemStack::new(berry, 1)));
    }

    #[test]
    fn test_grid_address_invalid_while_closed() {
        let catalog = catalog();
        let wood = id(&catalog, "wood");
        let mut state = InventoryState::new();
        let addr = SlotAddress::Grid(GridPos::new(1, 1));

        assert!(!state.set(addr, Some(ItemStack::new(wood, 1))));
        state.crafting_open = true;
        assert!(state.set(addr, Some(ItemStack::new(wood, 1))));
        assert_eq!(state.get(addr), Some(ItemStack::new(wood, 1)));
        assert!(!state.set(SlotAddress::Hotbar(HOTBAR_SIZE), None));
    }

    #[test]
    fn test_total_count_includes_cursor_and_grid() {
        let catalog = catalog();
        let wood = id(&catalog, "wood");
        let mut state = InventoryState::new();
        state.hotbar.set(0, Some(ItemStack::new(wood, 5)));
        state.grid.set(GridPos::new(0, 0), Some(ItemStack::new(wood, 2)));
        state.cursor.hold(ItemStack::new(wood, 3), None);

        assert_eq!(state.total_count(wood), 10);
    }

    #[test]
    fn test_discover_is_idempotent() {
        let mut state = InventoryState::new();
        let key = RecipeKey::derive("stick", "Sticks");
        assert!(state.discover(key.clone()));
        assert!(!state.discover(key.clone()));
        assert!(state.is_discovered(&key));
    }
}

//! Transfer protocol.
//!
//! Moves stacks between the hotbar, the crafting grid and the cursor in
//! response to discrete player actions. Every operation leaves the
//! containers valid when it returns, and no operation ever destroys
//! units: stacks that have nowhere to go stay where they are.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use spells_common::ContentResult;

use crate::inventory::{GridPos, InventoryState, SlotAddress};
use crate::item::ItemCatalog;

/// Which button the action was made with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickKind {
    /// Whole-stack pick up, place, merge or swap
    #[default]
    Primary,
    /// Split on pick up, one unit on place
    Secondary,
}

/// Result of a pick-up or place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Nothing moved (empty source, incompatible target, invalid address)
    NoChange,
    /// Slots changed
    Changed {
        /// Whether a crafting grid cell was modified
        grid_touched: bool,
    },
}

impl TransferOutcome {
    fn changed(addr: SlotAddress) -> Self {
        Self::Changed {
            grid_touched: matches!(addr, SlotAddress::Grid(_)),
        }
    }

    /// Returns true if any slot changed.
    #[must_use]
    pub const fn is_changed(self) -> bool {
        matches!(self, Self::Changed { .. })
    }

    /// Returns true if the crafting grid changed.
    #[must_use]
    pub const fn grid_touched(self) -> bool {
        matches!(self, Self::Changed { grid_touched: true })
    }
}

/// Where a released cursor stack ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnOutcome {
    /// The cursor was already empty
    Empty,
    /// Put back into the slot it was picked up from
    Origin(SlotAddress),
    /// Added to the hotbar
    Hotbar,
    /// Nowhere to go; still held
    Held,
}

/// Result of closing the crafting interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseReport {
    /// Units moved back to the hotbar
    pub returned: u32,
    /// Grid cells that did not fit and were left in place
    pub stranded: Vec<GridPos>,
    /// The cursor stack did not fit and is still held
    pub cursor_kept: bool,
}

impl CloseReport {
    /// Returns true if anything could not be returned.
    #[must_use]
    pub fn inventory_full(&self) -> bool {
        !self.stranded.is_empty() || self.cursor_kept
    }
}

/// Takes a stack from a slot into the empty cursor.
///
/// A secondary pick-up of more than one unit takes `ceil(count / 2)` and
/// leaves the rest.
pub fn pick_up(state: &mut InventoryState, addr: SlotAddress, kind: ClickKind) -> TransferOutcome {
    if !state.cursor.is_empty() {
        return TransferOutcome::NoChange;
    }
    let Some(stack) = state.get(addr) else {
        return TransferOutcome::NoChange;
    };

    if kind == ClickKind::Secondary && stack.count > 1 {
        let taken = stack.count.div_ceil(2);
        state.set(addr, Some(stack.with_count(stack.count - taken)));
        state.cursor.hold(stack.with_count(taken), Some(addr));
    } else {
        state.set(addr, None);
        state.cursor.hold(stack, Some(addr));
    }

    debug!("Picked up {:?} from {:?}", state.cursor.stack(), addr);
    TransferOutcome::changed(addr)
}

/// Drops the cursor stack, or part of it, onto a slot.
///
/// Primary: fill an empty slot, merge into a compatible stack with room,
/// otherwise swap. Secondary: one unit into an empty or compatible slot,
/// otherwise no change. While split-place mode is armed a primary place
/// into the grid acts as secondary.
pub fn place(
    state: &mut InventoryState,
    catalog: &ItemCatalog,
    addr: SlotAddress,
    kind: ClickKind,
) -> ContentResult<TransferOutcome> {
    let Some(held) = state.cursor.held().copied() else {
        return Ok(TransferOutcome::NoChange);
    };
    if !state.is_valid(addr) {
        return Ok(TransferOutcome::NoChange);
    }

    let kind = if held.split_place && matches!(addr, SlotAddress::Grid(_)) {
        ClickKind::Secondary
    } else {
        kind
    };

    let cursor = held.stack;
    let existing = state.get(addr);
    let room = match existing {
        Some(slot) if catalog.can_stack(&slot, &cursor)? => catalog.remaining_space(&slot)?,
        _ => 0,
    };

    match (kind, existing) {
        (ClickKind::Secondary, None) => {
            state.set(addr, Some(cursor.with_count(1)));
            shrink_cursor(state, 1);
        }
        (ClickKind::Secondary, Some(slot)) if room > 0 => {
            state.set(addr, Some(slot.with_count(slot.count + 1)));
            shrink_cursor(state, 1);
        }
        (ClickKind::Secondary, Some(_)) => return Ok(TransferOutcome::NoChange),
        (ClickKind::Primary, None) => {
            state.set(addr, Some(cursor));
            state.cursor.take();
        }
        (ClickKind::Primary, Some(slot)) if room > 0 => {
            let moved = room.min(cursor.count);
            state.set(addr, Some(slot.with_count(slot.count + moved)));
            shrink_cursor(state, moved);
        }
        (ClickKind::Primary, Some(slot)) => {
            state.set(addr, Some(cursor));
            state.cursor.hold(slot, None);
        }
    }

    if matches!(addr, SlotAddress::Hotbar(_)) {
        if let Some(h) = state.cursor.held_mut() {
            h.split_place = false;
        }
    }

    Ok(TransferOutcome::changed(addr))
}

/// Picks up when the cursor is empty, places otherwise.
pub fn click(
    state: &mut InventoryState,
    catalog: &ItemCatalog,
    addr: SlotAddress,
    kind: ClickKind,
) -> ContentResult<TransferOutcome> {
    if state.cursor.is_empty() {
        Ok(pick_up(state, addr, kind))
    } else {
        place(state, catalog, addr, kind)
    }
}

/// Splits a stack into the cursor and arms split-place mode.
///
/// Only available while crafting is open and nothing is held. On the
/// hotbar it needs a stack of more than one unit.
pub fn double_click(state: &mut InventoryState, addr: SlotAddress) -> TransferOutcome {
    if !state.crafting_open || !state.cursor.is_empty() {
        return TransferOutcome::NoChange;
    }
    let Some(stack) = state.get(addr) else {
        return TransferOutcome::NoChange;
    };
    if matches!(addr, SlotAddress::Hotbar(_)) && stack.count <= 1 {
        return TransferOutcome::NoChange;
    }

    let outcome = pick_up(state, addr, ClickKind::Secondary);
    if let Some(h) = state.cursor.held_mut() {
        h.split_place = true;
    }
    outcome
}

/// Releases the cursor stack over no slot.
///
/// Tries the origin slot if it is still empty, then the hotbar. If
/// neither works the stack stays in the cursor. Never swaps.
pub fn return_cursor(state: &mut InventoryState, catalog: &ItemCatalog) -> ContentResult<ReturnOutcome> {
    let Some(held) = state.cursor.held().copied() else {
        return Ok(ReturnOutcome::Empty);
    };

    if let Some(origin) = held.origin {
        if state.is_valid(origin) && state.get(origin).is_none() {
            state.set(origin, Some(held.stack));
            state.cursor.take();
            return Ok(ReturnOutcome::Origin(origin));
        }
    }

    if state.hotbar.add(catalog, held.stack)? {
        state.cursor.take();
        return Ok(ReturnOutcome::Hotbar);
    }

    debug!("Cursor stack {:?} has nowhere to go, still held", held.stack);
    Ok(ReturnOutcome::Held)
}

/// Opens the crafting interface. Returns false if it was already open.
pub fn open_crafting(state: &mut InventoryState) -> bool {
    if state.crafting_open {
        return false;
    }
    state.crafting_open = true;
    true
}

/// Closes the crafting interface, returning grid contents and the cursor
/// stack to the hotbar.
///
/// Stacks that do not fit stay where they are and are listed in the
/// report.
pub fn close_crafting(state: &mut InventoryState, catalog: &ItemCatalog) -> ContentResult<CloseReport> {
    let mut report = CloseReport::default();
    if !state.crafting_open {
        return Ok(report);
    }

    for pos in GridPos::all() {
        let Some(stack) = state.grid.get(pos) else {
            continue;
        };
        if state.hotbar.add(catalog, stack)? {
            state.grid.set(pos, None);
            report.returned += stack.count;
        } else {
            report.stranded.push(pos);
        }
    }

    if let Some(held) = state.cursor.held().copied() {
        if state.hotbar.add(catalog, held.stack)? {
            state.cursor.take();
            report.returned += held.stack.count;
        } else {
            report.cursor_kept = true;
            if let Some(h) = state.cursor.held_mut() {
                h.split_place = false;
            }
        }
    }

    state.crafting_open = false;
    if report.inventory_full() {
        warn!(
            "Inventory full while closing crafting: {} cells left in grid, cursor kept: {}",
            report.stranded.len(),
            report.cursor_kept
        );
    }
    Ok(report)
}

fn shrink_cursor(state: &mut InventoryState, n: u32) {
    let Some(h) = state.cursor.held_mut() else {
        return;
    };
    if h.stack.count <= n {
        state.cursor.take();
    } else {
        h.stack.count -= n;
        h.origin = None;
    }
}

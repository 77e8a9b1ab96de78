//! Event bus for inventory notifications.
//!
//! The UI drains these to show notices such as "inventory full".

use crossbeam_channel::{bounded, Receiver, Sender};
use serde::Serialize;

use spells_common::{ItemTypeId, RecipeKey};

use crate::autosave::SaveTrigger;
use crate::inventory::GridPos;
use crate::storage::StoreRole;

/// Inventory events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryEvent {
    /// Items entered the hotbar
    ItemAdded {
        /// Item type
        item: ItemTypeId,
        /// Units added
        count: u32,
    },
    /// Items could not be added for lack of space
    InventoryFull {
        /// Item type
        item: ItemTypeId,
        /// Units refused
        count: u32,
    },
    /// Items were taken out of the hotbar
    ItemConsumed {
        /// Item type
        item: ItemTypeId,
        /// Units removed
        count: u32,
    },
    /// A craft completed
    Crafted {
        /// Recipe used
        recipe: RecipeKey,
        /// Batches crafted
        batches: u32,
    },
    /// A recipe was crafted for the first time
    RecipeDiscovered {
        /// Recipe identity
        recipe: RecipeKey,
    },
    /// Closing crafting left stacks behind
    ItemsStranded {
        /// Grid cells still occupied
        cells: Vec<GridPos>,
        /// Cursor still holds a stack
        cursor_kept: bool,
    },
    /// State was saved
    Saved {
        /// Why
        trigger: SaveTrigger,
    },
    /// Saving failed in every store
    SaveFailed {
        /// Error message
        reason: String,
    },
    /// State was loaded
    Loaded {
        /// Store the data came from
        source: StoreRole,
        /// Hotbar slots dropped while restoring
        dropped_slots: usize,
    },
}

impl InventoryEvent {
    /// Returns true for events the player should see as "inventory full".
    #[must_use]
    pub fn is_inventory_full(&self) -> bool {
        matches!(self, Self::InventoryFull { .. } | Self::ItemsStranded { .. })
    }
}

/// Event bus for broadcasting events to subscribers.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<InventoryEvent>,
    /// Receiver for collecting events
    receiver: Receiver<InventoryEvent>,
    /// Channel capacity
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
        }
    }

    /// Publishes an event to the bus.
    pub fn publish(&self, event: InventoryEvent) {
        // Non-blocking send - if full, event is dropped
        let _ = self.sender.try_send(event);
    }

    /// Drains all pending events.
    pub fn drain(&self) -> Vec<InventoryEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Creates a new sender handle for publishing events.
    #[must_use]
    pub fn sender(&self) -> Sender<InventoryEvent> {
        self.sender.clone()
    }
}

/// Compact form of an event for logs and automation output.
#[derive(Debug, Clone, Serialize)]
pub struct EventSummary {
    /// Event name
    pub kind: &'static str,
    /// Human-readable detail
    pub detail: String,
}

impl From<&InventoryEvent> for EventSummary {
    fn from(event: &InventoryEvent) -> Self {
        let (kind, detail) = match event {
            InventoryEvent::ItemAdded { item, count } => ("item_added", format!("{item} x{count}")),
            InventoryEvent::InventoryFull { item, count } => ("inventory_full", format!("{item} x{count}")),
            InventoryEvent::ItemConsumed { item, count } => ("item_consumed", format!("{item} x{count}")),
            InventoryEvent::Crafted { recipe, batches } => ("crafted", format!("{recipe} x{batches}")),
            InventoryEvent::RecipeDiscovered { recipe } => ("recipe_discovered", recipe.to_string()),
            InventoryEvent::ItemsStranded { cells, cursor_kept } => (
                "items_stranded",
                format!("{} cells, cursor kept: {cursor_kept}", cells.len()),
            ),
            InventoryEvent::Saved { trigger } => ("saved", trigger.display_name().to_string()),
            InventoryEvent::SaveFailed { reason } => ("save_failed", reason.clone()),
            InventoryEvent::Loaded { source, dropped_slots } => {
                ("loaded", format!("{source:?}, {dropped_slots} slots dropped"))
            }
        };
        Self { kind, detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_drain() {
        let bus = EventBus::new(4);
        bus.publish(InventoryEvent::ItemAdded {
            item: ItemTypeId::new(0),
            count: 3,
        });
        bus.publish(InventoryEvent::Saved {
            trigger: SaveTrigger::Manual,
        });
        assert_eq!(bus.pending_count(), 2);

        let events = bus.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_full_bus_drops_events() {
        let bus = EventBus::new(1);
        for _ in 0..3 {
            bus.publish(InventoryEvent::SaveFailed {
                reason: "disk".to_string(),
            });
        }
        assert_eq!(bus.drain().len(), 1);
    }

    #[test]
    fn test_inventory_full_classification() {
        let full = InventoryEvent::InventoryFull {
            item: ItemTypeId::new(1),
            count: 1,
        };
        assert!(full.is_inventory_full());
        let summary = EventSummary::from(&full);
        assert_eq!(summary.kind, "inventory_full");
    }
}

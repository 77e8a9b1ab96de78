//! Inventory service: the single owner of inventory state.
//!
//! Gameplay systems (dialogue, gathering, loot, UI) hold a reference to
//! the service and go through it for every inventory change. The service
//! keeps the consumption plan in step with the crafting grid, throttles
//! saves and reports noteworthy changes on its event bus.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use spells_common::{ContentResult, ItemTypeId, RecipeKey};

use crate::autosave::{SaveThrottle, SaveTrigger};
use crate::crafting::{self, ConsumptionPlan, CraftAllReport, CraftOutcome};
use crate::events::{EventBus, InventoryEvent};
use crate::inventory::{GridPos, InventoryState, SlotAddress, HOTBAR_SIZE};
use crate::item::{ItemCatalog, ItemKind};
use crate::progress::GameProgress;
use crate::recipes::{GuideEntry, RecipeBook};
use crate::save::{SaveError, SaveResult, Snapshot};
use crate::stack::ItemStack;
use crate::storage::{DualStore, StoreRole};
use crate::transfer::{self, ClickKind, CloseReport, ReturnOutcome, TransferOutcome};

/// Default key saves are stored under.
pub const DEFAULT_SAVE_KEY: &str = "spells_save";

/// Effect of using the selected item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemUse {
    /// One unit of a consumable was used up
    Consumed {
        /// Item used
        item: ItemTypeId,
        /// Health actually restored
        healed: u32,
        /// Mana actually restored
        mana_restored: u32,
    },
    /// A spell was cast; the caller spawns the projectile
    Cast {
        /// Spell item
        spell: ItemTypeId,
        /// Projectile damage
        damage: u32,
        /// Mana spent
        mana_cost: u32,
        /// Cooldown before the next cast
        cooldown_ms: u32,
    },
}

/// Owns the inventory, progress, crafting plan and persistence.
#[derive(Debug)]
pub struct InventoryService {
    catalog: Arc<ItemCatalog>,
    recipes: Arc<RecipeBook>,
    state: InventoryState,
    progress: GameProgress,
    plan: Option<ConsumptionPlan>,
    events: EventBus,
    throttle: SaveThrottle,
    store: Option<DualStore>,
    save_key: String,
}

impl InventoryService {
    /// Creates a service with empty containers and no persistence.
    #[must_use]
    pub fn new(catalog: Arc<ItemCatalog>, recipes: Arc<RecipeBook>) -> Self {
        Self {
            catalog,
            recipes,
            state: InventoryState::new(),
            progress: GameProgress::default(),
            plan: None,
            events: EventBus::default(),
            throttle: SaveThrottle::default(),
            store: None,
            save_key: DEFAULT_SAVE_KEY.to_string(),
        }
    }

    /// Persists to the given stores under `key`.
    #[must_use]
    pub fn with_store(mut self, store: DualStore, key: impl Into<String>) -> Self {
        self.store = Some(store);
        self.save_key = key.into();
        self
    }

    /// Replaces the save throttle.
    #[must_use]
    pub fn with_throttle(mut self, throttle: SaveThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    /// Item catalog.
    #[must_use]
    pub fn catalog(&self) -> &ItemCatalog {
        &self.catalog
    }

    /// Recipe book.
    #[must_use]
    pub fn recipes(&self) -> &RecipeBook {
        &self.recipes
    }

    /// Inventory state, for rendering.
    #[must_use]
    pub const fn state(&self) -> &InventoryState {
        &self.state
    }

    /// Player and world progress.
    #[must_use]
    pub const fn progress(&self) -> &GameProgress {
        &self.progress
    }

    /// Mutable progress. Marks the state as needing a save.
    pub fn progress_mut(&mut self) -> &mut GameProgress {
        self.throttle.mark_dirty();
        &mut self.progress
    }

    /// What crafting the current grid would do.
    #[must_use]
    pub const fn plan(&self) -> Option<&ConsumptionPlan> {
        self.plan.as_ref()
    }

    /// Event bus.
    #[must_use]
    pub const fn events(&self) -> &EventBus {
        &self.events
    }

    /// Save throttle.
    #[must_use]
    pub const fn throttle(&self) -> &SaveThrottle {
        &self.throttle
    }

    /// Drains pending events.
    pub fn drain_events(&self) -> Vec<InventoryEvent> {
        self.events.drain()
    }

    /// Stack in a hotbar slot.
    #[must_use]
    pub fn hotbar_slot(&self, index: usize) -> Option<ItemStack> {
        self.state.hotbar.get(index)
    }

    /// Stack in a crafting grid cell.
    #[must_use]
    pub fn grid_slot(&self, pos: GridPos) -> Option<ItemStack> {
        self.state.grid.get(pos)
    }

    /// Stack held by the cursor.
    #[must_use]
    pub fn cursor_stack(&self) -> Option<ItemStack> {
        self.state.cursor.stack()
    }

    // --- Item grants and quest turn-ins ---

    /// Gives the player items. Returns false, changing nothing, if they do
    /// not all fit. Granting zero units is a no-op that reports success.
    pub fn add_item(&mut self, key: &str, count: u32) -> ContentResult<bool> {
        let item = self.catalog.id_of(key)?;
        self.add_stack(ItemStack::new(item, count))
    }

    /// Gives the player items and saves right away if they fit.
    pub fn grant(&mut self, key: &str, count: u32, trigger: SaveTrigger) -> ContentResult<bool> {
        let added = self.add_item(key, count)?;
        if added && count > 0 {
            self.autosave(trigger);
        }
        Ok(added)
    }

    fn add_stack(&mut self, stack: ItemStack) -> ContentResult<bool> {
        if stack.count == 0 {
            return Ok(true);
        }
        if self.state.hotbar.add(&self.catalog, stack)? {
            self.events.publish(InventoryEvent::ItemAdded {
                item: stack.item,
                count: stack.count,
            });
            self.throttle.mark_dirty();
            Ok(true)
        } else {
            debug!("No room for {} x{}", stack.item, stack.count);
            self.events.publish(InventoryEvent::InventoryFull {
                item: stack.item,
                count: stack.count,
            });
            Ok(false)
        }
    }

    /// Units of an item in the hotbar.
    pub fn count_of(&self, key: &str) -> ContentResult<u32> {
        Ok(self.state.hotbar.count_of(self.catalog.id_of(key)?))
    }

    /// Removes items from the hotbar, all or nothing.
    pub fn consume(&mut self, key: &str, count: u32) -> ContentResult<bool> {
        let item = self.catalog.id_of(key)?;
        if !self.state.hotbar.consume(item, count) {
            return Ok(false);
        }
        self.events.publish(InventoryEvent::ItemConsumed { item, count });
        self.throttle.mark_dirty();
        Ok(true)
    }

    /// Returns true if the recipe has been crafted before.
    #[must_use]
    pub fn is_discovered(&self, key: &RecipeKey) -> bool {
        self.state.is_discovered(key)
    }

    /// Every discovered recipe identity.
    #[must_use]
    pub const fn discovered(&self) -> &BTreeSet<RecipeKey> {
        &self.state.discovered
    }

    /// The recipe guide with known and rumored recipes.
    pub fn guide(&self) -> ContentResult<Vec<GuideEntry>> {
        self.recipes.guide(&self.catalog, &self.state.discovered)
    }

    // --- Transfers ---

    /// Picks up or places at a slot.
    pub fn click(&mut self, addr: SlotAddress, kind: ClickKind) -> ContentResult<TransferOutcome> {
        let outcome = transfer::click(&mut self.state, &self.catalog, addr, kind)?;
        self.after_transfer(outcome);
        Ok(outcome)
    }

    /// Splits a stack into the cursor in split-place mode.
    pub fn double_click(&mut self, addr: SlotAddress) -> TransferOutcome {
        let outcome = transfer::double_click(&mut self.state, addr);
        self.after_transfer(outcome);
        outcome
    }

    /// Releases the cursor over no slot.
    pub fn release_cursor(&mut self) -> ContentResult<ReturnOutcome> {
        let outcome = transfer::return_cursor(&mut self.state, &self.catalog)?;
        match outcome {
            ReturnOutcome::Origin(SlotAddress::Grid(_)) => {
                self.refresh_plan();
                self.throttle.mark_dirty();
            }
            ReturnOutcome::Origin(_) | ReturnOutcome::Hotbar => self.throttle.mark_dirty(),
            ReturnOutcome::Empty | ReturnOutcome::Held => {}
        }
        Ok(outcome)
    }

    fn after_transfer(&mut self, outcome: TransferOutcome) {
        if outcome.is_changed() {
            self.throttle.mark_dirty();
        }
        if outcome.grid_touched() {
            self.refresh_plan();
        }
    }

    /// Opens the crafting interface.
    pub fn open_crafting(&mut self) -> bool {
        let opened = transfer::open_crafting(&mut self.state);
        if opened {
            self.refresh_plan();
        }
        opened
    }

    /// Closes the crafting interface, returning its contents to the hotbar.
    pub fn close_crafting(&mut self) -> ContentResult<CloseReport> {
        let report = transfer::close_crafting(&mut self.state, &self.catalog)?;
        if report.inventory_full() {
            self.events.publish(InventoryEvent::ItemsStranded {
                cells: report.stranded.clone(),
                cursor_kept: report.cursor_kept,
            });
        }
        if report.returned > 0 {
            self.throttle.mark_dirty();
        }
        self.refresh_plan();
        Ok(report)
    }

    /// Result the grid would craft right now, resolved before any grid
    /// change so failures can still name it.
    fn pending_result(&self) -> Option<(ItemTypeId, u32)> {
        if !self.state.crafting_open {
            return None;
        }
        crafting::resolve(&self.state.grid, &self.recipes).map(|p| (p.result, p.result_count))
    }

    fn refresh_plan(&mut self) {
        self.plan = if self.state.crafting_open {
            crafting::resolve(&self.state.grid, &self.recipes)
        } else {
            None
        };
    }

    // --- Crafting ---

    /// Crafts one batch.
    pub fn craft_one(&mut self) -> ContentResult<CraftOutcome> {
        let pending = self.pending_result();
        let outcome = crafting::craft_one(&mut self.state, &self.catalog, &self.recipes)?;
        self.refresh_plan();
        match &outcome {
            CraftOutcome::Crafted {
                recipe,
                result,
                count,
                newly_discovered,
            } => {
                self.events.publish(InventoryEvent::Crafted {
                    recipe: recipe.clone(),
                    batches: 1,
                });
                if *newly_discovered {
                    self.events.publish(InventoryEvent::RecipeDiscovered { recipe: recipe.clone() });
                }
                debug!("Crafted {} x{}", result, count);
                self.autosave(SaveTrigger::CraftCompleted);
            }
            CraftOutcome::InventoryFull => {
                if let Some((item, count)) = pending {
                    self.events.publish(InventoryEvent::InventoryFull { item, count });
                }
            }
            CraftOutcome::NoRecipe => {}
        }
        Ok(outcome)
    }

    /// Crafts as many batches as the grid and hotbar allow.
    pub fn craft_all(&mut self) -> ContentResult<CraftAllReport> {
        let result = self.pending_result();
        let report = crafting::craft_all(&mut self.state, &self.catalog, &self.recipes)?;
        self.refresh_plan();

        if let Some(recipe) = &report.recipe {
            self.events.publish(InventoryEvent::Crafted {
                recipe: recipe.clone(),
                batches: report.completed,
            });
            if report.newly_discovered {
                self.events.publish(InventoryEvent::RecipeDiscovered { recipe: recipe.clone() });
            }
        }
        if report.stop == crafting::CraftStop::InventoryFull {
            if let Some((item, count)) = result {
                self.events.publish(InventoryEvent::InventoryFull { item, count });
            }
        }
        if report.completed > 0 {
            self.autosave(SaveTrigger::CraftCompleted);
        }
        Ok(report)
    }

    // --- Selected slot ---

    /// Selects a hotbar slot, clamped into range.
    pub fn select_slot(&mut self, index: usize) {
        self.state.selected_slot = index.min(HOTBAR_SIZE - 1);
        self.throttle.mark_dirty();
    }

    /// Uses the item in the selected slot.
    ///
    /// Consumables restore health and mana and lose a unit. Spells spend
    /// mana and stay in the slot. Everything else does nothing, as does a
    /// spell without enough mana.
    pub fn use_selected(&mut self) -> ContentResult<Option<ItemUse>> {
        let slot = self.state.selected_slot;
        let Some(stack) = self.state.hotbar.get(slot) else {
            return Ok(None);
        };
        let kind = self.catalog.definition_of(stack.item)?.kind;

        let used = match kind {
            ItemKind::Consumable { heal, mana } => {
                let vitals = &mut self.progress.vitals;
                let healed = vitals.heal(heal);
                let mana_restored = vitals.restore_mana(mana);
                let left = stack.count - 1;
                self.state.hotbar.set(slot, (left > 0).then(|| stack.with_count(left)));
                self.events.publish(InventoryEvent::ItemConsumed {
                    item: stack.item,
                    count: 1,
                });
                ItemUse::Consumed {
                    item: stack.item,
                    healed,
                    mana_restored,
                }
            }
            ItemKind::Spell {
                mana_cost,
                cooldown_ms,
                damage,
            } => {
                if !self.progress.vitals.spend_mana(mana_cost) {
                    debug!("Not enough mana to cast {}", stack.item);
                    return Ok(None);
                }
                ItemUse::Cast {
                    spell: stack.item,
                    damage,
                    mana_cost,
                    cooldown_ms,
                }
            }
            ItemKind::Material | ItemKind::Weapon { .. } | ItemKind::Tool | ItemKind::Misc => {
                return Ok(None);
            }
        };

        self.throttle.mark_dirty();
        Ok(Some(used))
    }

    /// Damage of the weapon in the selected slot, if it holds one.
    pub fn equipped_weapon(&self) -> ContentResult<Option<u32>> {
        let Some(stack) = self.state.selected_stack() else {
            return Ok(None);
        };
        Ok(match self.catalog.definition_of(stack.item)?.kind {
            ItemKind::Weapon { damage } => Some(damage),
            _ => None,
        })
    }

    /// Removes the selected stack so the caller can drop it in the world.
    pub fn drop_selected(&mut self) -> Option<ItemStack> {
        let dropped = self.state.hotbar.take(self.state.selected_slot)?;
        self.events.publish(InventoryEvent::ItemConsumed {
            item: dropped.item,
            count: dropped.count,
        });
        self.throttle.mark_dirty();
        Some(dropped)
    }

    // --- Persistence ---

    /// Advances time: node cooldowns and the save throttle. Returns the
    /// trigger if a save was made.
    pub fn tick(&mut self, delta_time: f64) -> Option<SaveTrigger> {
        let dt_ms = (delta_time.max(0.0) * 1000.0) as u32;
        self.progress.world.tick_nodes(dt_ms);

        let trigger = self.throttle.update(delta_time)?;
        self.autosave(trigger).then_some(trigger)
    }

    /// Captures the current snapshot.
    pub fn snapshot(&self) -> SaveResult<Snapshot> {
        Snapshot::capture(&self.state, &self.catalog, &self.progress)
    }

    /// Saves to both stores. Returns false if no store is configured.
    pub fn save(&mut self, trigger: SaveTrigger) -> SaveResult<bool> {
        let Some(store) = &self.store else {
            return Ok(false);
        };
        let json = Snapshot::capture(&self.state, &self.catalog, &self.progress)?.to_json()?;

        match store.write(&self.save_key, json.as_bytes()) {
            Ok(_) => {
                self.throttle.record_save();
                self.events.publish(InventoryEvent::Saved { trigger });
                debug!("Saved ({})", trigger.display_name());
                Ok(true)
            }
            Err(e) => {
                self.events.publish(InventoryEvent::SaveFailed {
                    reason: e.to_string(),
                });
                Err(SaveError::Storage(e))
            }
        }
    }

    /// Saves without failing the caller; failures are logged and reported
    /// on the event bus.
    fn autosave(&mut self, trigger: SaveTrigger) -> bool {
        match self.save(trigger) {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Save failed ({}): {}", trigger.display_name(), e);
                false
            }
        }
    }

    /// Loads from the primary store, falling back to the secondary.
    ///
    /// Returns the store the data came from, or `None` if neither holds a
    /// usable save (a fresh game).
    pub fn load(&mut self) -> SaveResult<Option<StoreRole>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        let catalog = &self.catalog;
        let base_state = &self.state;
        let base_progress = &self.progress;

        let loaded = store.read_with(&self.save_key, |bytes| {
            let text = std::str::from_utf8(bytes).map_err(|e| SaveError::Corrupted(e.to_string()))?;
            let mut state = base_state.clone();
            let mut progress = base_progress.clone();
            let report = Snapshot::restore(text, catalog, &mut state, &mut progress)?;
            Ok::<_, SaveError>((state, progress, report))
        })?;

        let Some((role, (state, progress, report))) = loaded else {
            info!("No save found under {:?}", self.save_key);
            return Ok(None);
        };

        self.state = state;
        self.progress = progress;
        self.refresh_plan();
        self.throttle.record_save();
        self.events.publish(InventoryEvent::Loaded {
            source: role,
            dropped_slots: report.dropped_slots,
        });
        info!("Loaded save from {:?} store", role);
        Ok(Some(role))
    }
}

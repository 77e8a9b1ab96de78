//! Snapshot persistence.
//!
//! A snapshot is a versioned JSON document holding the hotbar, the
//! discovered-recipe set and the progress flags other systems keep with
//! it. Stacks left in the crafting grid or on the cursor ride along under
//! an optional `stranded` field so a full hotbar never loses them.
//! Restoring is defensive: every field is read on its own, a field
//! with the wrong shape is treated as missing, unknown items empty their
//! slot and numbers are clamped into range. Only a document that is not
//! a JSON object at all is rejected.

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use spells_common::{ContentError, RecipeKey};

use crate::inventory::{GridPos, InventoryState, HOTBAR_SIZE};
use crate::item::ItemCatalog;
use crate::progress::{
    is_known_biome, GameProgress, NodeProgress, NpcProgress, PlayerVitals, WorldProgress,
};
use crate::stack::ItemStack;
use crate::storage::StorageError;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors that can occur during save/load operations.
#[derive(Debug, Error)]
pub enum SaveError {
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Snapshot is not a usable document
    #[error("Save data corrupted: {0}")]
    Corrupted(String),

    /// In-memory state references content that does not exist
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for save operations.
pub type SaveResult<T> = Result<T, SaveError>;

/// A hotbar slot as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotRecord {
    /// Item key
    pub item_id: String,
    /// Units in the slot
    pub count: u32,
}

/// A crafting grid cell as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSlotRecord {
    /// Grid row
    pub row: usize,
    /// Grid column
    pub col: usize,
    /// Item key
    pub item_id: String,
    /// Units in the cell
    pub count: u32,
}

/// Stacks held outside the hotbar when the snapshot was taken.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrandedStacks {
    /// Occupied grid cells
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub grid: Vec<GridSlotRecord>,
    /// Stack on the cursor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<SlotRecord>,
}

impl StrandedStacks {
    /// Returns true if nothing was stranded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grid.is_empty() && self.cursor.is_none()
    }
}

/// Versioned save document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Format version
    pub version: u32,
    /// Hotbar slots in index order
    pub hotbar: Vec<Option<SlotRecord>>,
    /// Discovered recipe identities, sorted
    pub discovered_recipes: Vec<RecipeKey>,
    /// Selected hotbar slot
    pub selected_slot: usize,
    /// Player vitals
    pub player: PlayerVitals,
    /// Biome, flags, NPC and node state
    #[serde(flatten)]
    pub world: WorldProgress,
    /// Grid and cursor stacks; omitted when both are empty
    #[serde(skip_serializing_if = "StrandedStacks::is_empty")]
    pub stranded: StrandedStacks,
}

/// What restoring a snapshot had to repair.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Hotbar slots emptied because their item or shape was unusable
    pub dropped_slots: usize,
    /// Fields whose stored value was out of range
    pub clamped_fields: Vec<String>,
    /// Version the snapshot declared, if any
    pub stored_version: Option<u32>,
}

impl RestoreReport {
    /// Returns true if nothing had to be repaired.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.dropped_slots == 0 && self.clamped_fields.is_empty()
    }
}

impl Snapshot {
    /// Captures the persisted parts of the inventory and progress.
    pub fn capture(
        state: &InventoryState,
        catalog: &ItemCatalog,
        progress: &GameProgress,
    ) -> SaveResult<Self> {
        let hotbar = state
            .hotbar
            .iter()
            .map(|(_, slot)| match slot {
                Some(stack) => Ok(Some(SlotRecord {
                    item_id: catalog.key_of(stack.item)?.to_string(),
                    count: stack.count,
                })),
                None => Ok(None),
            })
            .collect::<SaveResult<Vec<_>>>()?;

        let grid = state
            .grid
            .occupied()
            .map(|(pos, stack)| {
                Ok(GridSlotRecord {
                    row: pos.row,
                    col: pos.col,
                    item_id: catalog.key_of(stack.item)?.to_string(),
                    count: stack.count,
                })
            })
            .collect::<SaveResult<Vec<_>>>()?;
        let cursor = match state.cursor.stack() {
            Some(stack) => Some(SlotRecord {
                item_id: catalog.key_of(stack.item)?.to_string(),
                count: stack.count,
            }),
            None => None,
        };

        Ok(Self {
            version: SNAPSHOT_VERSION,
            hotbar,
            discovered_recipes: state.discovered.iter().cloned().collect(),
            selected_slot: state.selected_slot,
            player: progress.vitals.clone(),
            world: progress.world.clone(),
            stranded: StrandedStacks { grid, cursor },
        })
    }

    /// Serializes to JSON.
    pub fn to_json(&self) -> SaveResult<String> {
        serde_json::to_string(self).map_err(|e| SaveError::Serialization(e.to_string()))
    }

    /// Restores a JSON snapshot into the inventory and progress.
    ///
    /// Missing or malformed fields keep their in-memory values. When a
    /// field appears under both its current and legacy key, the current
    /// key wins. The crafting grid and cursor are replaced by the stored
    /// stranded stacks and crafting is closed.
    pub fn restore(
        text: &str,
        catalog: &ItemCatalog,
        state: &mut InventoryState,
        progress: &mut GameProgress,
    ) -> SaveResult<RestoreReport> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| SaveError::Corrupted(e.to_string()))?;
        let Value::Object(doc) = value else {
            return Err(SaveError::Corrupted("snapshot is not an object".to_string()));
        };
        let mut report = RestoreReport {
            stored_version: field::<u64>(&doc, &["version", "v"]).and_then(|v| u32::try_from(v).ok()),
            ..RestoreReport::default()
        };
        if let Some(v) = report.stored_version {
            if v > SNAPSHOT_VERSION {
                warn!("Snapshot version {} is newer than {}, reading what we can", v, SNAPSHOT_VERSION);
            }
        }

        if let Some(entries) = field::<Vec<Value>>(&doc, &["hotbar", "inventory"]) {
            state.hotbar.clear();
            for (index, entry) in entries.iter().take(HOTBAR_SIZE).enumerate() {
                let slot = restore_slot(entry, catalog, &format!("hotbar[{index}]"), &mut report);
                state.hotbar.set(index, slot);
            }
        }

        if let Some(ids) = field::<Vec<Value>>(&doc, &["discoveredRecipes"]) {
            state.discovered = ids
                .iter()
                .filter_map(|v| v.as_str().map(RecipeKey::from_raw))
                .collect::<BTreeSet<_>>();
        }

        let player = field::<PlayerDoc>(&doc, &["player"]);
        let selected = field::<f64>(&doc, &["selectedSlot"])
            .or_else(|| player.as_ref().and_then(|p| p.selected_slot));
        if let Some(raw) = selected {
            let max = (HOTBAR_SIZE - 1) as f64;
            let clamped = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, max) };
            if (clamped - raw).abs() > f64::EPSILON {
                report.clamped_fields.push("selectedSlot".to_string());
            }
            state.selected_slot = clamped as usize;
        }

        if let Some(player) = player {
            player.apply(&mut progress.vitals, &mut report);
        }
        for name in progress.vitals.clamp() {
            report.clamped_fields.push(name.to_string());
        }

        let world = &mut progress.world;
        if let Some(biome) = field::<String>(&doc, &["biome"]) {
            if is_known_biome(&biome) {
                world.biome = biome;
            } else {
                warn!("Ignoring unknown biome {:?}, staying in {:?}", biome, world.biome);
            }
        }
        if let Some(flags) = field::<BTreeMap<String, bool>>(&doc, &["flags"]) {
            world.flags = flags;
        }
        if let Some(npcs) = field::<Map<String, Value>>(&doc, &["npcs"]) {
            world.npcs = npcs
                .into_iter()
                .map(|(name, v)| (name, NpcDoc::from_value(&v).into()))
                .collect();
        }
        if let Some(nodes) = field::<Map<String, Value>>(&doc, &["nodes"]) {
            world.nodes = nodes
                .into_iter()
                .map(|(id, v)| (id, NodeDoc::from_value(&v).into()))
                .collect();
        }

        state.grid.clear();
        state.cursor.take();
        state.crafting_open = false;
        if let Some(stranded) = doc.get("stranded").and_then(Value::as_object) {
            restore_stranded(stranded, catalog, state, &mut report);
        }

        if !report.is_clean() {
            warn!(
                "Snapshot repaired on load: {} slots dropped, clamped {:?}",
                report.dropped_slots, report.clamped_fields
            );
        }
        debug!("Restored snapshot (version {:?})", report.stored_version);
        Ok(report)
    }
}

fn restore_slot(
    entry: &Value,
    catalog: &ItemCatalog,
    label: &str,
    report: &mut RestoreReport,
) -> Option<ItemStack> {
    if entry.is_null() {
        return None;
    }
    let Some(doc) = entry.as_object().and_then(SlotDoc::from_object) else {
        warn!("Dropping malformed {}", label);
        report.dropped_slots += 1;
        return None;
    };
    let Some(item) = catalog.lookup(&doc.item_id) else {
        warn!("Dropping {}: unknown item {:?}", label, doc.item_id);
        report.dropped_slots += 1;
        return None;
    };
    let limit = catalog.stack_limit(item).ok()?;

    let raw = doc.count.unwrap_or(1.0);
    if raw.is_nan() || raw < 1.0 {
        report.dropped_slots += 1;
        return None;
    }
    let count = if raw > f64::from(limit) {
        report.clamped_fields.push(format!("{label}.count"));
        limit
    } else {
        raw as u32
    };
    Some(ItemStack::new(item, count))
}

/// Puts stored grid and cursor stacks back. Cells outside the grid or
/// listed twice are dropped.
fn restore_stranded(
    stranded: &Map<String, Value>,
    catalog: &ItemCatalog,
    state: &mut InventoryState,
    report: &mut RestoreReport,
) {
    let cells = field::<Vec<Value>>(stranded, &["grid"]).unwrap_or_default();
    for (index, cell) in cells.iter().enumerate() {
        let label = format!("stranded.grid[{index}]");
        let pos = cell.as_object().and_then(|obj| {
            let row = field::<usize>(obj, &["row"])?;
            let col = field::<usize>(obj, &["col"])?;
            Some(GridPos::new(row, col)).filter(|pos| pos.is_valid())
        });
        let Some(pos) = pos.filter(|pos| state.grid.get(*pos).is_none()) else {
            warn!("Dropping {}: no free cell at its position", label);
            report.dropped_slots += 1;
            continue;
        };
        if let Some(stack) = restore_slot(cell, catalog, &label, report) {
            state.grid.set(pos, Some(stack));
        }
    }

    if let Some(entry) = stranded.get("cursor") {
        if let Some(stack) = restore_slot(entry, catalog, "stranded.cursor", report) {
            state.cursor.hold(stack, None);
        }
    }
    if !state.grid.is_clear() || !state.cursor.is_empty() {
        debug!("Restored stranded stacks outside the hotbar");
    }
}

/// Reads the first of `keys` whose value has the expected shape.
fn field<T: DeserializeOwned>(obj: &Map<String, Value>, keys: &[&str]) -> Option<T> {
    keys.iter()
        .filter_map(|key| obj.get(*key))
        .find_map(|value| serde_json::from_value(value.clone()).ok())
}

/// Reads a field leniently: any shape that does not fit counts as missing.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

#[derive(Debug)]
struct SlotDoc {
    item_id: String,
    count: Option<f64>,
}

impl SlotDoc {
    fn from_object(obj: &Map<String, Value>) -> Option<Self> {
        Some(Self {
            item_id: field(obj, &["itemId", "id"])?,
            count: field(obj, &["count"]),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerDoc {
    #[serde(default, deserialize_with = "lenient")]
    x: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    y: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    health: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    max_health: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    mana: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    max_mana: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    level: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    experience: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    experience_to_next_level: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    damage: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    defense: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    gold: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    selected_slot: Option<f64>,
}

impl PlayerDoc {
    fn apply(&self, vitals: &mut PlayerVitals, report: &mut RestoreReport) {
        let mut set = |value: Option<f64>, name: &str, field: &mut u32| {
            let Some(raw) = value else { return };
            let clamped = if raw.is_nan() { 0.0 } else { raw.clamp(0.0, f64::from(u32::MAX)) };
            if (clamped - raw).abs() > f64::EPSILON {
                report.clamped_fields.push(name.to_string());
            }
            *field = clamped as u32;
        };
        set(self.max_health, "maxHealth", &mut vitals.max_health);
        set(self.health, "health", &mut vitals.health);
        set(self.max_mana, "maxMana", &mut vitals.max_mana);
        set(self.mana, "mana", &mut vitals.mana);
        set(self.level, "level", &mut vitals.level);
        set(self.experience, "experience", &mut vitals.experience);
        set(
            self.experience_to_next_level,
            "experienceToNextLevel",
            &mut vitals.experience_to_next_level,
        );
        set(self.damage, "damage", &mut vitals.damage);
        set(self.defense, "defense", &mut vitals.defense);
        set(self.gold, "gold", &mut vitals.gold);

        if let Some(x) = self.x {
            vitals.x = x as f32;
        }
        if let Some(y) = self.y {
            vitals.y = y as f32;
        }
    }
}

/// NPC entries use truthiness, so `1` and `"yes"` both count as set.
#[derive(Debug, Default)]
struct NpcDoc {
    has_given_item: bool,
    quest_complete: bool,
}

impl NpcDoc {
    fn from_value(value: &Value) -> Self {
        Self {
            has_given_item: truthy(value.get("hasGivenItem")),
            quest_complete: truthy(value.get("questComplete")),
        }
    }
}

impl From<NpcDoc> for NpcProgress {
    fn from(doc: NpcDoc) -> Self {
        Self {
            has_given_item: doc.has_given_item,
            quest_complete: doc.quest_complete,
        }
    }
}

#[derive(Debug)]
struct NodeDoc {
    active: bool,
    cooldown_ms: u32,
}

impl NodeDoc {
    fn from_value(value: &Value) -> Self {
        let cooldown_ms = value
            .get("cooldownMs")
            .and_then(Value::as_f64)
            .map_or(0, |ms| ms.clamp(0.0, f64::from(u32::MAX)) as u32);
        Self {
            active: truthy(value.get("active")),
            cooldown_ms,
        }
    }
}

impl From<NodeDoc> for NodeProgress {
    fn from(doc: NodeDoc) -> Self {
        Self {
            active: doc.active,
            cooldown_ms: doc.cooldown_ms,
        }
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::GridPos;
    use proptest::prelude::*;
    use spells_common::ItemTypeId;

    fn catalog() -> ItemCatalog {
        ItemCatalog::builtin().expect("catalog")
    }

    fn id(catalog: &ItemCatalog, key: &str) -> ItemTypeId {
        catalog.id_of(key).expect("known item")
    }

    #[test]
    fn test_capture_shape() {
        let catalog = catalog();
        let mut state = InventoryState::new();
        state.hotbar.set(0, Some(ItemStack::new(id(&catalog, "wood"), 12)));
        state.discover(RecipeKey::derive("stick", "Sticks"));
        let progress = GameProgress::default();

        let snapshot = Snapshot::capture(&state, &catalog, &progress).expect("capture");
        let json: serde_json::Value =
            serde_json::from_str(&snapshot.to_json().expect("json")).expect("parse");

        assert_eq!(json["version"], 1);
        assert_eq!(json["hotbar"].as_array().map(Vec::len), Some(HOTBAR_SIZE));
        assert_eq!(json["hotbar"][0]["itemId"], "wood");
        assert_eq!(json["hotbar"][0]["count"], 12);
        assert!(json["hotbar"][1].is_null());
        assert_eq!(json["discoveredRecipes"][0], "stick:Sticks");
        assert_eq!(json["player"]["maxHealth"], 100);
        assert_eq!(json["biome"], "home");
        assert!(json.get("stranded").is_none());
    }

    #[test]
    fn test_stranded_stacks_survive_restore() {
        let catalog = catalog();
        let mut state = InventoryState::new();
        for slot in 0..HOTBAR_SIZE {
            state.hotbar.set(slot, Some(ItemStack::new(id(&catalog, "iron_sword"), 1)));
        }
        state.grid.set(GridPos::new(1, 1), Some(ItemStack::new(id(&catalog, "mana_crystal"), 1)));
        state.cursor.hold(ItemStack::new(id(&catalog, "coal"), 3), Some(crate::inventory::SlotAddress::Hotbar(4)));
        let progress = GameProgress::default();

        let text = Snapshot::capture(&state, &catalog, &progress)
            .expect("capture")
            .to_json()
            .expect("json");
        let json: serde_json::Value = serde_json::from_str(&text).expect("parse");
        assert_eq!(json["stranded"]["grid"][0]["itemId"], "mana_crystal");
        assert_eq!(json["stranded"]["grid"][0]["row"], 1);
        assert_eq!(json["stranded"]["cursor"]["count"], 3);

        let mut restored = InventoryState::new();
        let mut restored_progress = GameProgress::default();
        let report = Snapshot::restore(&text, &catalog, &mut restored, &mut restored_progress).expect("restore");

        assert!(report.is_clean());
        assert_eq!(
            restored.grid.get(GridPos::new(1, 1)),
            Some(ItemStack::new(id(&catalog, "mana_crystal"), 1))
        );
        assert_eq!(restored.cursor.stack(), Some(ItemStack::new(id(&catalog, "coal"), 3)));
        assert_eq!(restored.cursor.held().and_then(|h| h.origin), None);
        assert_eq!(restored.total_count(id(&catalog, "mana_crystal")), 1);
        assert!(!restored.crafting_open);
    }

    #[test]
    fn test_bad_stranded_entries_dropped() {
        let catalog = catalog();
        let text = r#"{
            "stranded": {
                "grid": [
                    {"row": 5, "col": 0, "itemId": "wood", "count": 1},
                    {"row": 0, "col": 0, "itemId": "moonstone", "count": 1},
                    {"row": 1, "col": 1, "itemId": "wood", "count": 2},
                    {"row": 1, "col": 1, "itemId": "coal", "count": 1},
                    {"col": 2, "itemId": "coal", "count": 1}
                ],
                "cursor": {"itemId": "pearl", "count": 2}
            }
        }"#;

        let mut state = InventoryState::new();
        let mut progress = GameProgress::default();
        let report = Snapshot::restore(text, &catalog, &mut state, &mut progress).expect("restore");

        assert_eq!(report.dropped_slots, 4);
        assert_eq!(state.grid.occupied().count(), 1);
        assert_eq!(state.grid.get(GridPos::new(1, 1)), Some(ItemStack::new(id(&catalog, "wood"), 2)));
        assert_eq!(state.cursor.stack(), Some(ItemStack::new(id(&catalog, "pearl"), 2)));
    }

    #[test]
    fn test_current_keys_win_over_legacy_duplicates() {
        let catalog = catalog();
        let text = r#"{
            "version": 1,
            "v": 1,
            "hotbar": [{"itemId": "wood", "id": "coal", "count": 2}],
            "inventory": [{"id": "coal", "count": 1}]
        }"#;

        let mut state = InventoryState::new();
        let mut progress = GameProgress::default();
        let report = Snapshot::restore(text, &catalog, &mut state, &mut progress).expect("restore");

        assert!(report.is_clean());
        assert_eq!(report.stored_version, Some(1));
        assert_eq!(state.hotbar.get(0), Some(ItemStack::new(id(&catalog, "wood"), 2)));
    }

    #[test]
    fn test_mistyped_current_key_falls_back_to_legacy() {
        let catalog = catalog();
        let text = r#"{"version": "one", "v": 1, "hotbar": 5, "inventory": [{"id": "coal"}]}"#;

        let mut state = InventoryState::new();
        let mut progress = GameProgress::default();
        let report = Snapshot::restore(text, &catalog, &mut state, &mut progress).expect("restore");

        assert_eq!(report.stored_version, Some(1));
        assert_eq!(state.hotbar.get(0), Some(ItemStack::new(id(&catalog, "coal"), 1)));
    }

    #[test]
    fn test_unknown_biome_keeps_memory() {
        let catalog = catalog();
        let mut state = InventoryState::new();
        let mut progress = GameProgress::default();
        progress.world.biome = "magmaKingdom".to_string();

        Snapshot::restore(r#"{"biome": "atlantis"}"#, &catalog, &mut state, &mut progress).expect("restore");
        assert_eq!(progress.world.biome, "magmaKingdom");

        Snapshot::restore(r#"{"biome": ""}"#, &catalog, &mut state, &mut progress).expect("restore");
        assert_eq!(progress.world.biome, "magmaKingdom");

        Snapshot::restore(r#"{"biome": "glitchedVoid"}"#, &catalog, &mut state, &mut progress).expect("restore");
        assert_eq!(progress.world.biome, "glitchedVoid");
    }

    #[test]
    fn test_restore_round_trip() {
        let catalog = catalog();
        let mut state = InventoryState::new();
        state.hotbar.set(3, Some(ItemStack::new(id(&catalog, "potion_mana"), 16)));
        state.hotbar.set(8, Some(ItemStack::new(id(&catalog, "fire_spell"), 1)));
        state.selected_slot = 3;
        state.discover(RecipeKey::derive("potion_mana", "Pearl Mana Potion"));
        let mut progress = GameProgress::default();
        progress.vitals.gold = 42;
        progress.world.npcs.insert("Elder Mage".into(), NpcProgress { has_given_item: true, quest_complete: false });

        let text = Snapshot::capture(&state, &catalog, &progress)
            .expect("capture")
            .to_json()
            .expect("json");

        let mut restored = InventoryState::new();
        let mut restored_progress = GameProgress::default();
        let report = Snapshot::restore(&text, &catalog, &mut restored, &mut restored_progress).expect("restore");

        assert!(report.is_clean());
        assert_eq!(report.stored_version, Some(SNAPSHOT_VERSION));
        assert_eq!(restored.hotbar, state.hotbar);
        assert_eq!(restored.discovered, state.discovered);
        assert_eq!(restored.selected_slot, 3);
        assert_eq!(restored_progress, progress);
    }

    #[test]
    fn test_restore_legacy_document() {
        let catalog = catalog();
        let text = r#"{
            "v": 1,
            "biome": "magmaKingdom",
            "player": {"x": 10, "y": 20, "health": 80, "maxHealth": 100, "mana": 50,
                       "maxMana": 100, "level": 2, "gold": 7, "selectedSlot": 4},
            "inventory": [{"id": "wood", "count": 5}, null, {"id": "iron_sword"}],
            "discoveredRecipes": ["plank:Planks", "plank:Planks"],
            "npcs": {"Blacksmith": {"hasGivenItem": 1, "questComplete": false}},
            "nodes": {"tree_1": {"active": false, "cooldownMs": 4000}},
            "somethingNew": {"ignored": true}
        }"#;

        let mut state = InventoryState::new();
        let mut progress = GameProgress::default();
        let report = Snapshot::restore(text, &catalog, &mut state, &mut progress).expect("restore");

        assert_eq!(report.stored_version, Some(1));
        assert_eq!(state.hotbar.get(0), Some(ItemStack::new(id(&catalog, "wood"), 5)));
        assert_eq!(state.hotbar.get(2), Some(ItemStack::new(id(&catalog, "iron_sword"), 1)));
        assert_eq!(state.selected_slot, 4);
        assert_eq!(state.discovered.len(), 1);
        assert_eq!(progress.vitals.health, 80);
        assert_eq!(progress.vitals.level, 2);
        assert_eq!(progress.world.biome, "magmaKingdom");
        assert!(progress.world.npcs["Blacksmith"].has_given_item);
        assert_eq!(progress.world.nodes["tree_1"], NodeProgress { active: false, cooldown_ms: 4000 });
    }

    #[test]
    fn test_unknown_items_and_bad_counts_degrade() {
        let catalog = catalog();
        let text = r#"{
            "version": 1,
            "hotbar": [
                {"itemId": "moonstone", "count": 3},
                {"itemId": "potion_health", "count": 99},
                {"itemId": "wood", "count": 0},
                "garbage",
                {"itemId": "coal", "count": 2}
            ]
        }"#;

        let mut state = InventoryState::new();
        let mut progress = GameProgress::default();
        let report = Snapshot::restore(text, &catalog, &mut state, &mut progress).expect("restore");

        assert_eq!(report.dropped_slots, 3);
        assert_eq!(state.hotbar.get(0), None);
        assert_eq!(state.hotbar.get(1), Some(ItemStack::new(id(&catalog, "potion_health"), 16)));
        assert_eq!(state.hotbar.get(2), None);
        assert_eq!(state.hotbar.get(4), Some(ItemStack::new(id(&catalog, "coal"), 2)));
        assert!(report.clamped_fields.iter().any(|f| f == "hotbar[1].count"));
    }

    #[test]
    fn test_numeric_fields_clamped() {
        let catalog = catalog();
        let text = r#"{"player": {"health": 900, "maxHealth": 120, "mana": -5, "selectedSlot": 42}}"#;

        let mut state = InventoryState::new();
        let mut progress = GameProgress::default();
        let report = Snapshot::restore(text, &catalog, &mut state, &mut progress).expect("restore");

        assert_eq!(progress.vitals.max_health, 120);
        assert_eq!(progress.vitals.health, 120);
        assert_eq!(progress.vitals.mana, 0);
        assert_eq!(state.selected_slot, HOTBAR_SIZE - 1);
        assert!(report.clamped_fields.contains(&"health".to_string()));
        assert!(report.clamped_fields.contains(&"selectedSlot".to_string()));
    }

    #[test]
    fn test_missing_and_mistyped_fields_keep_memory() {
        let catalog = catalog();
        let mut state = InventoryState::new();
        state.hotbar.set(0, Some(ItemStack::new(id(&catalog, "berry"), 9)));
        state.discover(RecipeKey::derive("rope", "Rope"));
        let mut progress = GameProgress::default();
        progress.vitals.gold = 5;

        let text = r#"{"hotbar": "not a list", "player": {"gold": "lots"}, "biome": 7}"#;
        Snapshot::restore(text, &catalog, &mut state, &mut progress).expect("restore");

        assert_eq!(state.hotbar.get(0), Some(ItemStack::new(id(&catalog, "berry"), 9)));
        assert!(state.is_discovered(&RecipeKey::derive("rope", "Rope")));
        assert_eq!(progress.vitals.gold, 5);
        assert_eq!(progress.world.biome, "home");
    }

    #[test]
    fn test_unknown_recipe_ids_survive() {
        let catalog = catalog();
        let text = r#"{"discoveredRecipes": ["future_item:Future", 17, "stick:Sticks"]}"#;
        let mut state = InventoryState::new();
        let mut progress = GameProgress::default();
        Snapshot::restore(text, &catalog, &mut state, &mut progress).expect("restore");

        assert_eq!(state.discovered.len(), 2);
        assert!(state.is_discovered(&RecipeKey::from_raw("future_item:Future")));
    }

    #[test]
    fn test_restore_clears_transient_state() {
        let catalog = catalog();
        let mut state = InventoryState::new();
        state.crafting_open = true;
        state.grid.set(GridPos::new(0, 0), Some(ItemStack::new(id(&catalog, "wood"), 1)));
        state.cursor.hold(ItemStack::new(id(&catalog, "coal"), 1), None);
        let mut progress = GameProgress::default();

        Snapshot::restore("{}", &catalog, &mut state, &mut progress).expect("restore");
        assert!(state.grid.is_clear());
        assert!(state.cursor.is_empty());
        assert!(!state.crafting_open);
    }

    #[test]
    fn test_corrupted_document() {
        let catalog = catalog();
        let mut state = InventoryState::new();
        let mut progress = GameProgress::default();
        assert!(matches!(
            Snapshot::restore("{\"hotbar\": [", &catalog, &mut state, &mut progress),
            Err(SaveError::Corrupted(_))
        ));
        assert!(matches!(
            Snapshot::restore("[1, 2, 3]", &catalog, &mut state, &mut progress),
            Err(SaveError::Corrupted(_))
        ));
    }

    #[test]
    fn test_capture_unknown_item_is_content_error() {
        let catalog = catalog();
        let mut state = InventoryState::new();
        state.hotbar.set(0, Some(ItemStack::new(ItemTypeId::new(777), 1)));
        assert!(matches!(
            Snapshot::capture(&state, &catalog, &GameProgress::default()),
            Err(SaveError::Content(ContentError::UnknownItem(_)))
        ));
    }

    proptest! {
        #[test]
        fn prop_snapshot_round_trip(
            slots in proptest::collection::vec(proptest::option::of((0..28u32, 1..=64u32)), HOTBAR_SIZE),
            recipes in proptest::collection::btree_set("[a-z_]{1,12}:[A-Za-z ]{1,12}", 0..6),
        ) {
            let catalog = catalog();
            let mut state = InventoryState::new();
            for (i, slot) in slots.iter().enumerate() {
                if let Some((raw, count)) = slot {
                    let item = ItemTypeId::new(*raw);
                    let limit = catalog.stack_limit(item).expect("limit");
                    state.hotbar.set(i, Some(ItemStack::new(item, (*count).min(limit))));
                }
            }
            state.discovered = recipes.into_iter().map(RecipeKey::from_raw).collect();
            let progress = GameProgress::default();

            let text = Snapshot::capture(&state, &catalog, &progress)
                .expect("capture")
                .to_json()
                .expect("json");
            let mut restored = InventoryState::new();
            let mut restored_progress = GameProgress::default();
            let report = Snapshot::restore(&text, &catalog, &mut restored, &mut restored_progress)
                .expect("restore");

            prop_assert!(report.is_clean());
            prop_assert_eq!(restored.hotbar, state.hotbar);
            prop_assert_eq!(restored.discovered, state.discovered);
        }
    }
}

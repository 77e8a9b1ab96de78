//! Item catalog.
//!
//! The catalog is the static registry of item definitions. Every runtime
//! stack refers to an [`ItemTypeId`] handed out by the catalog, and every
//! count is validated against the definition's stack limit.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use spells_common::{ContentError, ContentResult, ItemTypeId};

use crate::stack::ItemStack;

const BUILTIN_ITEMS: &str = include_str!("../assets/items.ron");

/// Coarse item category, as shown in the UI and the recipe guide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    /// Crafting material
    Material,
    /// Eaten or drunk for an effect
    Consumable,
    /// Melee or magic weapon
    Weapon,
    /// Tool
    Tool,
    /// Castable spell
    Spell,
    /// Everything else
    Misc,
}

/// Category-specific behavior of an item.
///
/// Each variant carries only the attributes meaningful for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ItemKind {
    /// Crafting material with no use effect
    #[default]
    Material,
    /// Consumable that restores health and/or mana
    Consumable {
        /// Health restored per use
        #[serde(default)]
        heal: u32,
        /// Mana restored per use
        #[serde(default)]
        mana: u32,
    },
    /// Weapon
    Weapon {
        /// Damage dealt per hit
        damage: u32,
    },
    /// Tool
    Tool,
    /// Spell, cast from the hotbar
    Spell {
        /// Mana spent per cast
        mana_cost: u32,
        /// Minimum time between casts
        cooldown_ms: u32,
        /// Damage of the spell's projectile
        damage: u32,
    },
    /// No gameplay effect
    Misc,
}

impl ItemKind {
    /// Returns the category this kind belongs to.
    #[must_use]
    pub const fn category(&self) -> ItemCategory {
        match self {
            Self::Material => ItemCategory::Material,
            Self::Consumable { .. } => ItemCategory::Consumable,
            Self::Weapon { .. } => ItemCategory::Weapon,
            Self::Tool => ItemCategory::Tool,
            Self::Spell { .. } => ItemCategory::Spell,
            Self::Misc => ItemCategory::Misc,
        }
    }
}

/// Immutable definition of an item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDefinition {
    /// Stable string key, used in saves and content files
    pub key: String,
    /// Display name
    pub name: String,
    /// Maximum units per slot (1 means unique)
    pub stack_limit: u32,
    /// Category-specific behavior
    #[serde(default)]
    pub kind: ItemKind,
    /// Flavor text
    #[serde(default)]
    pub description: String,
}

impl ItemDefinition {
    /// Creates a definition with no description.
    #[must_use]
    pub fn new(key: impl Into<String>, name: impl Into<String>, stack_limit: u32, kind: ItemKind) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            stack_limit,
            kind,
            description: String::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the item's category.
    #[must_use]
    pub const fn category(&self) -> ItemCategory {
        self.kind.category()
    }

    /// Returns true if more than one unit fits in a slot.
    #[must_use]
    pub const fn is_stackable(&self) -> bool {
        self.stack_limit > 1
    }
}

/// Registry of item definitions.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    /// Definitions in registration order, indexed by `ItemTypeId`
    defs: Vec<ItemDefinition>,
    /// Key index
    by_key: AHashMap<String, ItemTypeId>,
}

impl ItemCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a catalog from a RON list of definitions.
    pub fn from_ron(src: &str) -> ContentResult<Self> {
        let defs: Vec<ItemDefinition> =
            ron::from_str(src).map_err(|e| ContentError::Parse(e.to_string()))?;
        let mut catalog = Self::new();
        for def in defs {
            catalog.register(def)?;
        }
        debug!("Loaded {} item definitions", catalog.len());
        Ok(catalog)
    }

    /// Returns the catalog shipped with the game.
    pub fn builtin() -> ContentResult<Self> {
        Self::from_ron(BUILTIN_ITEMS)
    }

    /// Registers a definition and returns its handle.
    pub fn register(&mut self, def: ItemDefinition) -> ContentResult<ItemTypeId> {
        if def.key.is_empty() {
            return Err(ContentError::InvalidItem {
                key: def.key,
                reason: "empty key".to_string(),
            });
        }
        if def.stack_limit == 0 {
            return Err(ContentError::InvalidItem {
                key: def.key,
                reason: "stack limit must be at least 1".to_string(),
            });
        }
        if self.by_key.contains_key(&def.key) {
            return Err(ContentError::DuplicateItem(def.key));
        }

        let id = ItemTypeId::new(self.defs.len() as u32);
        self.by_key.insert(def.key.clone(), id);
        self.defs.push(def);
        Ok(id)
    }

    /// Returns the definition for a handle.
    pub fn definition_of(&self, id: ItemTypeId) -> ContentResult<&ItemDefinition> {
        self.defs.get(id.index()).ok_or(ContentError::UnknownItem(id))
    }

    /// Returns the handle for a key.
    pub fn id_of(&self, key: &str) -> ContentResult<ItemTypeId> {
        self.lookup(key)
            .ok_or_else(|| ContentError::UnknownItemKey(key.to_string()))
    }

    /// Returns the handle for a key, if registered.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<ItemTypeId> {
        self.by_key.get(key).copied()
    }

    /// Returns the key of a handle.
    pub fn key_of(&self, id: ItemTypeId) -> ContentResult<&str> {
        self.definition_of(id).map(|def| def.key.as_str())
    }

    /// Returns the stack limit of a handle.
    pub fn stack_limit(&self, id: ItemTypeId) -> ContentResult<u32> {
        self.definition_of(id).map(|def| def.stack_limit)
    }

    /// Builds a stack, checking `1 <= count <= stack_limit`.
    pub fn stack(&self, id: ItemTypeId, count: u32) -> ContentResult<ItemStack> {
        let def = self.definition_of(id)?;
        if count == 0 || count > def.stack_limit {
            return Err(ContentError::InvalidStack {
                key: def.key.clone(),
                count,
                limit: def.stack_limit,
            });
        }
        Ok(ItemStack::new(id, count))
    }

    /// Returns true if the two stacks may merge: same item, stack limit above 1.
    pub fn can_stack(&self, a: &ItemStack, b: &ItemStack) -> ContentResult<bool> {
        if a.item != b.item {
            return Ok(false);
        }
        Ok(self.stack_limit(a.item)? > 1)
    }

    /// Units that can still be added to the stack.
    pub fn remaining_space(&self, stack: &ItemStack) -> ContentResult<u32> {
        Ok(self.stack_limit(stack.item)?.saturating_sub(stack.count))
    }

    /// Iterates definitions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemTypeId, &ItemDefinition)> {
        self.defs
            .iter()
            .enumerate()
            .map(|(i, def)| (ItemTypeId::new(i as u32), def))
    }

    /// Number of registered items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

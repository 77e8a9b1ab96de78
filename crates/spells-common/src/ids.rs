//! ID types for items and recipes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle for an item type registered in the item catalog.
///
/// Handles are assigned in registration order and are only meaningful
/// against the catalog that issued them. Persisted data never stores the
/// raw handle; it stores the item's string key instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(u32);

impl ItemTypeId {
    /// Creates an item type ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Returns the raw value as a catalog index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ItemTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Stable identity of a recipe.
///
/// Several recipes may produce the same item, so the identity combines the
/// result item key with a disambiguating label: `"potion_health:Berry Tonic"`.
/// This is the value recorded in the player's discovered-recipe set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeKey(String);

impl RecipeKey {
    /// Derives the key for a recipe from its result item key and label.
    #[must_use]
    pub fn derive(result_key: &str, label: &str) -> Self {
        Self(format!("{result_key}:{label}"))
    }

    /// Wraps an already-derived key (e.g. one read back from a save).
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the result item key portion of the identity.
    #[must_use]
    pub fn result_key(&self) -> &str {
        self.0.split_once(':').map_or(self.0.as_str(), |(result, _)| result)
    }
}

impl fmt::Display for RecipeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecipeKey {
    fn from(raw: &str) -> Self {
        Self::from_raw(raw)
    }
}

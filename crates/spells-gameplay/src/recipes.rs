//! Recipe book.
//!
//! Recipes are static: loaded once, never mutated. Registration order is
//! significant because it breaks ties during resolution.

use std::collections::BTreeSet;
use std::fmt;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use spells_common::{ContentError, ContentResult, ItemTypeId, RecipeKey};

use crate::item::ItemCatalog;

const BUILTIN_RECIPES: &str = include_str!("../assets/recipes.ron");

/// Score weight per required unit.
pub const SCORE_PER_UNIT: u64 = 10_000;

/// Score weight per distinct ingredient type.
pub const SCORE_PER_TYPE: u64 = 100;

/// One ingredient requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecipeIngredient {
    /// Item consumed
    pub item: ItemTypeId,
    /// Units consumed per batch
    pub count: u32,
}

impl RecipeIngredient {
    /// Creates an ingredient requirement.
    #[must_use]
    pub const fn new(item: ItemTypeId, count: u32) -> Self {
        Self { item, count }
    }
}

/// A crafting recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    /// Stable identity, `"{result_key}:{label}"`
    pub key: RecipeKey,
    /// Disambiguating label
    pub label: String,
    /// Item produced
    pub result: ItemTypeId,
    /// Units produced per batch
    pub result_count: u32,
    /// Ingredients in declaration order
    pub ingredients: Vec<RecipeIngredient>,
}

impl Recipe {
    /// Sum of required units over all ingredients.
    #[must_use]
    pub fn total_required(&self) -> u32 {
        self.ingredients.iter().map(|i| i.count).sum()
    }

    /// Number of distinct ingredient types.
    #[must_use]
    pub fn distinct_types(&self) -> usize {
        self.ingredients.len()
    }

    /// Match score: bigger recipes beat smaller ones.
    #[must_use]
    pub fn score(&self) -> u64 {
        u64::from(self.total_required()) * SCORE_PER_UNIT + self.distinct_types() as u64 * SCORE_PER_TYPE
    }

    /// Units of `item` required per batch, if it is an ingredient.
    #[must_use]
    pub fn requires(&self, item: ItemTypeId) -> Option<u32> {
        self.ingredients.iter().find(|i| i.item == item).map(|i| i.count)
    }
}

/// Recipe as written in content files.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecipeSource {
    label: String,
    result: String,
    #[serde(default = "default_count")]
    count: u32,
    ingredients: Vec<(String, u32)>,
}

fn default_count() -> u32 {
    1
}

/// All known recipes.
#[derive(Debug, Clone, Default)]
pub struct RecipeBook {
    recipes: Vec<Recipe>,
    by_key: AHashMap<RecipeKey, usize>,
}

impl RecipeBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses recipes from RON, resolving item keys against the catalog.
    pub fn from_ron(src: &str, catalog: &ItemCatalog) -> ContentResult<Self> {
        let sources: Vec<RecipeSource> =
            ron::from_str(src).map_err(|e| ContentError::Parse(e.to_string()))?;
        let mut book = Self::new();
        for source in sources {
            let ingredients: Vec<(&str, u32)> = source
                .ingredients
                .iter()
                .map(|(key, count)| (key.as_str(), *count))
                .collect();
            book.add(catalog, &source.label, &source.result, source.count, &ingredients)?;
        }
        debug!("Loaded {} recipes", book.len());
        Ok(book)
    }

    /// Returns the recipes shipped with the game.
    pub fn builtin(catalog: &ItemCatalog) -> ContentResult<Self> {
        Self::from_ron(BUILTIN_RECIPES, catalog)
    }

    /// Builds and registers a recipe from item keys.
    pub fn add(
        &mut self,
        catalog: &ItemCatalog,
        label: &str,
        result_key: &str,
        result_count: u32,
        ingredients: &[(&str, u32)],
    ) -> ContentResult<&Recipe> {
        let result = catalog.id_of(result_key)?;
        let ingredients = ingredients
            .iter()
            .map(|&(key, count)| Ok(RecipeIngredient::new(catalog.id_of(key)?, count)))
            .collect::<ContentResult<Vec<_>>>()?;

        let index = self.register(Recipe {
            key: RecipeKey::derive(result_key, label),
            label: label.to_string(),
            result,
            result_count,
            ingredients,
        })?;
        Ok(&self.recipes[index])
    }

    /// Registers a recipe and returns its position.
    pub fn register(&mut self, recipe: Recipe) -> ContentResult<usize> {
        let invalid = |reason: &str| ContentError::InvalidRecipe {
            key: recipe.key.clone(),
            reason: reason.to_string(),
        };

        if recipe.ingredients.is_empty() {
            return Err(invalid("no ingredients"));
        }
        if recipe.result_count == 0 {
            return Err(invalid("result count is zero"));
        }
        if recipe.ingredients.iter().any(|i| i.count == 0) {
            return Err(invalid("ingredient count is zero"));
        }
        let distinct: BTreeSet<_> = recipe.ingredients.iter().map(|i| i.item).collect();
        if distinct.len() != recipe.ingredients.len() {
            return Err(invalid("ingredient listed twice"));
        }
        if self.by_key.contains_key(&recipe.key) {
            return Err(ContentError::DuplicateRecipe(recipe.key));
        }

        let index = self.recipes.len();
        self.by_key.insert(recipe.key.clone(), index);
        self.recipes.push(recipe);
        Ok(index)
    }

    /// Looks a recipe up by identity.
    #[must_use]
    pub fn get(&self, key: &RecipeKey) -> Option<&Recipe> {
        self.by_key.get(key).map(|&i| &self.recipes[i])
    }

    /// Recipe at a registration position.
    #[must_use]
    pub fn at(&self, index: usize) -> Option<&Recipe> {
        self.recipes.get(index)
    }

    /// Iterates recipes in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.iter()
    }

    /// Recipes producing an item, in registration order.
    pub fn by_result(&self, item: ItemTypeId) -> impl Iterator<Item = &Recipe> {
        self.recipes.iter().filter(move |r| r.result == item)
    }

    /// Number of recipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    /// Returns true if the book is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    /// Recipe guide: every recipe sorted by result key, flagged as known
    /// or rumored.
    pub fn guide(
        &self,
        catalog: &ItemCatalog,
        discovered: &BTreeSet<RecipeKey>,
    ) -> ContentResult<Vec<GuideEntry>> {
        let mut entries = Vec::with_capacity(self.recipes.len());
        for recipe in &self.recipes {
            let result = catalog.definition_of(recipe.result)?;
            let ingredients = recipe
                .ingredients
                .iter()
                .map(|i| Ok((catalog.definition_of(i.item)?.name.clone(), i.count)))
                .collect::<ContentResult<Vec<_>>>()?;
            entries.push(GuideEntry {
                key: recipe.key.clone(),
                result_key: result.key.clone(),
                result_name: result.name.clone(),
                result_count: recipe.result_count,
                ingredients,
                known: discovered.contains(&recipe.key),
            });
        }
        entries.sort_by(|a, b| a.result_key.cmp(&b.result_key));
        Ok(entries)
    }
}

/// A line of the recipe guide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuideEntry {
    /// Recipe identity
    pub key: RecipeKey,
    /// Result item key
    pub result_key: String,
    /// Result display name
    pub result_name: String,
    /// Units produced
    pub result_count: u32,
    /// Ingredient display names and counts
    pub ingredients: Vec<(String, u32)>,
    /// Crafted at least once
    pub known: bool,
}

impl fmt::Display for GuideEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.known { ' ' } else { '?' };
        write!(f, "{marker} {} x{}  <=  ", self.result_name, self.result_count)?;
        for (i, (name, count)) in self.ingredients.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{count}x {name}")?;
        }
        Ok(())
    }
}

//! Recipe resolution and crafting.
//!
//! [`resolve`] turns the crafting grid into a [`ConsumptionPlan`] for the
//! best matching recipe. [`craft_one`] and [`craft_all`] execute plans
//! atomically: space for the result is checked before any ingredient is
//! removed.

use ahash::AHashMap;
use tracing::{debug, info};

use spells_common::{ContentResult, ItemTypeId, RecipeKey};

use crate::inventory::{CraftingGrid, GridPos, InventoryState};
use crate::item::ItemCatalog;
use crate::recipes::RecipeBook;
use crate::stack::ItemStack;

/// What one craft of the current grid would do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionPlan {
    /// Winning recipe
    pub recipe: RecipeKey,
    /// Position of the recipe in the book
    pub recipe_index: usize,
    /// Item produced
    pub result: ItemTypeId,
    /// Units produced per batch
    pub result_count: u32,
    /// One entry per unit removed by a single batch, in grid order
    pub consumption: Vec<GridPos>,
    /// Batches the grid can pay for
    pub max_batches: u32,
}

/// Finds the best recipe for the grid.
///
/// A recipe matches when the grid holds at least the required count of
/// every ingredient and holds no item type the recipe does not list.
/// Extra quantity of a listed type is fine. The highest score wins and
/// the earliest registered recipe wins ties.
#[must_use]
pub fn resolve(grid: &CraftingGrid, book: &RecipeBook) -> Option<ConsumptionPlan> {
    let mut present: AHashMap<ItemTypeId, u32> = AHashMap::new();
    let mut sources: AHashMap<ItemTypeId, Vec<(GridPos, u32)>> = AHashMap::new();
    for (pos, stack) in grid.occupied() {
        *present.entry(stack.item).or_default() += stack.count;
        sources.entry(stack.item).or_default().push((pos, stack.count));
    }
    if present.is_empty() {
        return None;
    }

    let mut best: Option<(usize, u64)> = None;
    for (index, recipe) in book.iter().enumerate() {
        let has_all = recipe
            .ingredients
            .iter()
            .all(|i| present.get(&i.item).copied().unwrap_or(0) >= i.count);
        let no_extras = present.keys().all(|&item| recipe.requires(item).is_some());
        if !has_all || !no_extras {
            continue;
        }

        let score = recipe.score();
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((index, score));
        }
    }

    let (index, _) = best?;
    let recipe = book.at(index)?;

    let max_batches = recipe
        .ingredients
        .iter()
        .map(|i| present.get(&i.item).copied().unwrap_or(0) / i.count)
        .min()
        .unwrap_or(0);

    let mut consumption = Vec::with_capacity(recipe.total_required() as usize);
    for ingredient in &recipe.ingredients {
        let mut remaining = ingredient.count;
        for &(pos, count) in sources.get(&ingredient.item).map_or(&[][..], Vec::as_slice) {
            if remaining == 0 {
                break;
            }
            let taken = count.min(remaining);
            consumption.extend(std::iter::repeat(pos).take(taken as usize));
            remaining -= taken;
        }
    }

    debug!("Grid resolves to {} (x{} batches)", recipe.key, max_batches);
    Some(ConsumptionPlan {
        recipe: recipe.key.clone(),
        recipe_index: index,
        result: recipe.result,
        result_count: recipe.result_count,
        consumption,
        max_batches,
    })
}

/// Result of a single craft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CraftOutcome {
    /// One batch crafted
    Crafted {
        /// Recipe used
        recipe: RecipeKey,
        /// Item produced
        result: ItemTypeId,
        /// Units produced
        count: u32,
        /// First time this recipe was crafted
        newly_discovered: bool,
    },
    /// The grid matches no recipe
    NoRecipe,
    /// The result does not fit in the hotbar; nothing changed
    InventoryFull,
}

/// Why a craft-all run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CraftStop {
    /// Every batch the grid could pay for was crafted
    Exhausted,
    /// The grid no longer matches a recipe
    NoRecipe,
    /// The hotbar ran out of space
    InventoryFull,
}

/// Result of a craft-all run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CraftAllReport {
    /// Batches crafted
    pub completed: u32,
    /// Recipe crafted, if any batch completed
    pub recipe: Option<RecipeKey>,
    /// The first batch discovered the recipe
    pub newly_discovered: bool,
    /// Why the run ended
    pub stop: CraftStop,
}

/// Crafts one batch of the recipe the grid currently resolves to.
///
/// Either every ingredient unit is consumed and the result is added to the
/// hotbar, or nothing changes. A closed grid resolves to no recipe.
pub fn craft_one(
    state: &mut InventoryState,
    catalog: &ItemCatalog,
    book: &RecipeBook,
) -> ContentResult<CraftOutcome> {
    if !state.crafting_open {
        return Ok(CraftOutcome::NoRecipe);
    }
    let Some(plan) = resolve(&state.grid, book) else {
        return Ok(CraftOutcome::NoRecipe);
    };
    if !state.hotbar.can_fit(catalog, plan.result, plan.result_count)? {
        debug!("No room for {} x{}", plan.recipe, plan.result_count);
        return Ok(CraftOutcome::InventoryFull);
    }

    let before = state.grid.clone();
    for &pos in &plan.consumption {
        if let Some(stack) = state.grid.get(pos) {
            let left = stack.count - 1;
            state.grid.set(pos, (left > 0).then(|| stack.with_count(left)));
        }
    }

    let output = ItemStack::new(plan.result, plan.result_count);
    match state.hotbar.add(catalog, output) {
        Ok(true) => {}
        Ok(false) => {
            state.grid = before;
            return Ok(CraftOutcome::InventoryFull);
        }
        Err(e) => {
            state.grid = before;
            return Err(e);
        }
    }

    let newly_discovered = state.discover(plan.recipe.clone());
    if newly_discovered {
        info!("Discovered recipe {}", plan.recipe);
    }
    Ok(CraftOutcome::Crafted {
        recipe: plan.recipe,
        result: plan.result,
        count: plan.result_count,
        newly_discovered,
    })
}

/// Crafts up to the plan's batch count, stopping early when space runs
/// out or the grid stops matching.
pub fn craft_all(
    state: &mut InventoryState,
    catalog: &ItemCatalog,
    book: &RecipeBook,
) -> ContentResult<CraftAllReport> {
    let mut report = CraftAllReport {
        completed: 0,
        recipe: None,
        newly_discovered: false,
        stop: CraftStop::Exhausted,
    };
    let plan = if state.crafting_open { resolve(&state.grid, book) } else { None };
    let Some(plan) = plan else {
        report.stop = CraftStop::NoRecipe;
        return Ok(report);
    };

    for _ in 0..plan.max_batches {
        match craft_one(state, catalog, book)? {
            CraftOutcome::Crafted {
                recipe,
                newly_discovered,
                ..
            } => {
                report.completed += 1;
                report.newly_discovered |= newly_discovered;
                report.recipe = Some(recipe);
            }
            CraftOutcome::NoRecipe => {
                report.stop = CraftStop::NoRecipe;
                break;
            }
            CraftOutcome::InventoryFull => {
                report.stop = CraftStop::InventoryFull;
                break;
            }
        }
    }

    debug!("Craft-all finished {} batches ({:?})", report.completed, report.stop);
    Ok(report)
}

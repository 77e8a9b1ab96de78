//! Error types for Spells content and data integrity.

use thiserror::Error;

use crate::ids::{ItemTypeId, RecipeKey};

/// Content and data-integrity errors.
///
/// These indicate a bug in the item or recipe content, or in code that
/// fabricated an item handle without going through the catalog. They are
/// never used for ordinary gameplay outcomes such as a full inventory.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Item handle not registered in the catalog
    #[error("Unknown item: {0}")]
    UnknownItem(ItemTypeId),

    /// Item key not registered in the catalog
    #[error("Unknown item key: {0:?}")]
    UnknownItemKey(String),

    /// Item key registered twice
    #[error("Duplicate item key: {0:?}")]
    DuplicateItem(String),

    /// Recipe identity registered twice
    #[error("Duplicate recipe: {0}")]
    DuplicateRecipe(RecipeKey),

    /// Malformed item definition
    #[error("Invalid item {key:?}: {reason}")]
    InvalidItem {
        /// Item key
        key: String,
        /// What is wrong with it
        reason: String,
    },

    /// Malformed recipe definition
    #[error("Invalid recipe {key}: {reason}")]
    InvalidRecipe {
        /// Recipe identity
        key: RecipeKey,
        /// What is wrong with it
        reason: String,
    },

    /// Stack count outside `1..=stack_limit`
    #[error("Invalid stack of {key:?}: count {count}, limit {limit}")]
    InvalidStack {
        /// Item key
        key: String,
        /// Offending count
        count: u32,
        /// Stack limit of the item
        limit: u32,
    },

    /// Content file could not be parsed
    #[error("Content parse error: {0}")]
    Parse(String),
}

/// Result type alias for content lookups.
pub type ContentResult<T> = Result<T, ContentError>;

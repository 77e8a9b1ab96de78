//! # Spells Gameplay
//!
//! Inventory and crafting engine for Spells.
//!
//! This crate provides:
//! - Item catalog and stacks
//! - Hotbar, 3x3 crafting grid and cursor
//! - Click, split and return transfers between slots
//! - Recipe book, recipe resolution and atomic crafting
//! - Player and world progress
//! - Versioned save snapshots with defensive restore
//! - Dual-store persistence and save throttling
//! - Event bus for inventory notifications
//! - [`InventoryService`], the facade other systems go through

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod autosave;
pub mod crafting;
pub mod events;
pub mod inventory;
pub mod item;
pub mod progress;
pub mod recipes;
pub mod save;
pub mod service;
pub mod stack;
pub mod storage;
pub mod transfer;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::autosave::*;
    pub use crate::crafting::*;
    pub use crate::events::*;
    pub use crate::inventory::*;
    pub use crate::item::*;
    pub use crate::progress::*;
    pub use crate::recipes::*;
    pub use crate::save::*;
    pub use crate::service::*;
    pub use crate::stack::*;
    pub use crate::storage::*;
    pub use crate::transfer::*;
}

pub use prelude::*;

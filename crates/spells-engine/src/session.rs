//! Session lifecycle.
//!
//! A session owns the inventory service for one play-through: it builds
//! content and stores on start, loads the last save, drives throttled
//! saves while running and writes a final save on shutdown.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use spells_common::ContentError;
use spells_gameplay::{
    DualStore, InventoryService, ItemCatalog, RecipeBook, SaveError, SaveThrottle, SaveTrigger,
    StoreRole,
};

use crate::config::EngineConfig;
use crate::storage::{CookieJarStorage, FileStorage};

/// Errors that can occur while running a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Built-in content failed to load
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// Loading or saving failed
    #[error("Save error: {0}")]
    Save(#[from] SaveError),
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// What happened when a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Stacks left in the crafting grid because the hotbar was full
    pub stranded: usize,
    /// The final save reached at least one store
    pub saved: bool,
}

/// A running play session.
#[derive(Debug)]
pub struct Session {
    config: EngineConfig,
    service: InventoryService,
    loaded_from: Option<StoreRole>,
}

impl Session {
    /// Starts a session with the built-in content, loading the last save.
    pub fn start(config: EngineConfig) -> SessionResult<Self> {
        let catalog = Arc::new(ItemCatalog::builtin()?);
        let recipes = Arc::new(RecipeBook::builtin(&catalog)?);
        info!("Loaded {} items and {} recipes", catalog.len(), recipes.len());
        Self::start_with(config, catalog, recipes)
    }

    /// Starts a session with the given content.
    pub fn start_with(
        mut config: EngineConfig,
        catalog: Arc<ItemCatalog>,
        recipes: Arc<RecipeBook>,
    ) -> SessionResult<Self> {
        config.validate();

        let save_dir = config.resolved_save_dir();
        let primary = Arc::new(FileStorage::new(&save_dir));
        let secondary = Arc::new(CookieJarStorage::new(
            config.cookie_jar_path(),
            Duration::from_secs(config.cookie_max_age_secs),
        ));
        let store = DualStore::new(primary, secondary);
        info!("Saving to {}", save_dir.display());

        let mut service = InventoryService::new(catalog, recipes)
            .with_store(store, config.save_key.clone())
            .with_throttle(SaveThrottle::new(config.autosave_interval_secs));

        let loaded_from = service.load()?;
        match loaded_from {
            Some(role) => info!("Resumed from {:?} store", role),
            None => info!("Starting a new game"),
        }

        Ok(Self {
            config,
            service,
            loaded_from,
        })
    }

    /// Configuration the session runs with.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Store the session was resumed from, if any.
    #[must_use]
    pub const fn loaded_from(&self) -> Option<StoreRole> {
        self.loaded_from
    }

    /// The inventory service.
    #[must_use]
    pub const fn service(&self) -> &InventoryService {
        &self.service
    }

    /// Mutable inventory service.
    pub fn service_mut(&mut self) -> &mut InventoryService {
        &mut self.service
    }

    /// Advances the session clock. Returns the trigger if a save was made.
    pub fn update(&mut self, delta_time: f64) -> Option<SaveTrigger> {
        self.service.tick(delta_time)
    }

    /// Ends the session.
    ///
    /// An open crafting grid is closed first so its contents go back to
    /// the hotbar before the final save.
    pub fn shutdown(mut self) -> SessionResult<ShutdownReport> {
        let mut stranded = 0;
        if self.service.state().crafting_open {
            let report = self.service.close_crafting()?;
            stranded = report.stranded.len();
            if report.inventory_full() {
                warn!("{} stacks could not be returned before shutdown", stranded);
            }
        }

        let saved = self.service.save(SaveTrigger::SessionEnd)?;
        info!("Session ended (saved: {})", saved);
        Ok(ShutdownReport { stranded, saved })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spells_gameplay::{ClickKind, GridPos, SlotAddress, StorageBackend};
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> EngineConfig {
        EngineConfig {
            save_dir: Some(dir.path().to_path_buf()),
            ..EngineConfig::default()
        }
    }

    #[test]
    fn test_fresh_session_has_no_save() {
        let temp_dir = TempDir::new().expect("temp dir");
        let session = Session::start(config(&temp_dir)).expect("start");
        assert_eq!(session.loaded_from(), None);
        assert!(session.service().state().hotbar.is_clear());
    }

    #[test]
    fn test_shutdown_save_resumes_next_session() {
        let temp_dir = TempDir::new().expect("temp dir");

        let mut session = Session::start(config(&temp_dir)).expect("start");
        session.service_mut().add_item("mana_crystal", 5).expect("add");
        let report = session.shutdown().expect("shutdown");
        assert!(report.saved);

        let session = Session::start(config(&temp_dir)).expect("restart");
        assert_eq!(session.loaded_from(), Some(StoreRole::Primary));
        assert_eq!(session.service().count_of("mana_crystal").expect("count"), 5);
    }

    #[test]
    fn test_falls_back_to_cookie_jar() {
        let temp_dir = TempDir::new().expect("temp dir");
        let cfg = config(&temp_dir);

        let mut session = Session::start(cfg.clone()).expect("start");
        session.service_mut().add_item("pearl", 2).expect("add");
        session.shutdown().expect("shutdown");

        FileStorage::new(temp_dir.path())
            .delete(&cfg.save_key)
            .expect("clear primary");

        let session = Session::start(cfg).expect("restart");
        assert_eq!(session.loaded_from(), Some(StoreRole::Secondary));
        assert_eq!(session.service().count_of("pearl").expect("count"), 2);
    }

    #[test]
    fn test_shutdown_returns_grid_items() {
        let temp_dir = TempDir::new().expect("temp dir");

        let mut session = Session::start(config(&temp_dir)).expect("start");
        let service = session.service_mut();
        service.add_item("wood", 3).expect("add");
        service.open_crafting();
        service
            .click(SlotAddress::Hotbar(0), ClickKind::Primary)
            .expect("pick");
        service
            .click(SlotAddress::Grid(GridPos::new(2, 2)), ClickKind::Primary)
            .expect("place");
        assert_eq!(service.count_of("wood").expect("count"), 0);

        let report = session.shutdown().expect("shutdown");
        assert_eq!(report.stranded, 0);

        let session = Session::start(config(&temp_dir)).expect("restart");
        assert_eq!(session.service().count_of("wood").expect("count"), 3);
    }

    #[test]
    fn test_stranded_grid_items_survive_restart() {
        let temp_dir = TempDir::new().expect("temp dir");

        let mut session = Session::start(config(&temp_dir)).expect("start");
        let service = session.service_mut();
        service.add_item("mana_crystal", 1).expect("add");
        service.open_crafting();
        service
            .click(SlotAddress::Hotbar(0), ClickKind::Primary)
            .expect("pick");
        service
            .click(SlotAddress::Grid(GridPos::new(1, 1)), ClickKind::Primary)
            .expect("place");
        for _ in 0..9 {
            assert!(service.add_item("iron_sword", 1).expect("add"));
        }

        let report = session.shutdown().expect("shutdown");
        assert_eq!(report.stranded, 1);
        assert!(report.saved);

        let mut session = Session::start(config(&temp_dir)).expect("restart");
        let service = session.service_mut();
        let crystal = service.catalog().id_of("mana_crystal").expect("crystal");
        assert_eq!(service.state().total_count(crystal), 1);
        assert_eq!(service.grid_slot(GridPos::new(1, 1)).map(|s| s.count), Some(1));
        assert!(!service.state().crafting_open);

        service.select_slot(0);
        assert!(service.drop_selected().is_some());
        service.open_crafting();
        let report = service.close_crafting().expect("close");
        assert!(!report.inventory_full());
        assert_eq!(service.count_of("mana_crystal").expect("count"), 1);
    }

    #[test]
    fn test_update_drives_throttled_saves() {
        let temp_dir = TempDir::new().expect("temp dir");
        let mut session = Session::start(config(&temp_dir)).expect("start");
        session.service_mut().add_item("coal", 1).expect("add");

        assert_eq!(session.update(0.25), None);
        assert_eq!(session.update(1.0), Some(SaveTrigger::Interval));
        assert!(temp_dir.path().join("spells_save.json").exists());
        assert!(temp_dir.path().join("cookies.json").exists());
    }
}

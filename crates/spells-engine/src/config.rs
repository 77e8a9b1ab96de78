//! Engine configuration.
//!
//! Controls where saves live, how often they are written and how the
//! binary logs. Configuration can be loaded from and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "spells.toml";

/// Seconds in a (non-leap) year.
const YEAR_SECS: u64 = 365 * 24 * 60 * 60;

/// Engine configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === Persistence ===
    /// Directory for save files (None = platform data directory)
    pub save_dir: Option<PathBuf>,
    /// Key the save is stored under in both stores
    pub save_key: String,
    /// File name of the cookie jar inside the save directory
    pub cookie_jar_file: String,
    /// Lifetime of cookie-jar entries in seconds
    pub cookie_max_age_secs: u64,
    /// Minimum seconds between throttled saves
    pub autosave_interval_secs: f64,

    // === Diagnostics ===
    /// Default tracing directive, extended by `RUST_LOG`
    pub log_directive: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            save_dir: None,
            save_key: spells_gameplay::DEFAULT_SAVE_KEY.to_string(),
            cookie_jar_file: "cookies.json".to_string(),
            cookie_max_age_secs: YEAR_SECS,
            autosave_interval_secs: spells_gameplay::DEFAULT_SAVE_INTERVAL,
            log_directive: "spells=info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default file location.
    /// Returns default config if file doesn't exist.
    pub fn load() -> Self {
        Self::load_from(Self::config_path())
    }

    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Failed to read config file: {e}");
                return Self::default();
            },
        };

        match toml::from_str::<Self>(&contents) {
            Ok(mut config) => {
                config.validate();
                info!("Loaded config from {}", path.display());
                config
            },
            Err(e) => {
                warn!("Failed to parse config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn config_path() -> PathBuf {
        dirs::config_dir().map_or_else(
            || PathBuf::from(CONFIG_FILE),
            |dir| dir.join("spells").join(CONFIG_FILE),
        )
    }

    /// Directory saves are written to.
    #[must_use]
    pub fn resolved_save_dir(&self) -> PathBuf {
        if let Some(dir) = &self.save_dir {
            return dir.clone();
        }
        dirs::data_dir().map_or_else(|| PathBuf::from("saves"), |dir| dir.join("spells").join("saves"))
    }

    /// Path of the cookie jar file.
    #[must_use]
    pub fn cookie_jar_path(&self) -> PathBuf {
        self.resolved_save_dir().join(&self.cookie_jar_file)
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        if !self.autosave_interval_secs.is_finite() {
            self.autosave_interval_secs = spells_gameplay::DEFAULT_SAVE_INTERVAL;
        }
        self.autosave_interval_secs = self.autosave_interval_secs.clamp(0.1, 60.0);
        self.cookie_max_age_secs = self.cookie_max_age_secs.clamp(60, 10 * YEAR_SECS);

        if self.save_key.trim().is_empty() {
            self.save_key = spells_gameplay::DEFAULT_SAVE_KEY.to_string();
        }
        if self.cookie_jar_file.trim().is_empty() {
            self.cookie_jar_file = "cookies.json".to_string();
        }
    }
}

//! Player and world progress carried alongside the inventory in saves.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Biome the player starts in.
pub const DEFAULT_BIOME: &str = "home";

/// Biome keys the world knows about.
pub const KNOWN_BIOMES: [&str; 5] = [
    DEFAULT_BIOME,
    "waterQueenRealm",
    "magmaKingdom",
    "mysticalLibrary",
    "glitchedVoid",
];

/// Returns true if `key` names a known biome.
#[must_use]
pub fn is_known_biome(key: &str) -> bool {
    KNOWN_BIOMES.contains(&key)
}

/// Player vitals and economy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerVitals {
    /// Position X
    pub x: f32,
    /// Position Y
    pub y: f32,
    /// Current health
    pub health: u32,
    /// Maximum health
    pub max_health: u32,
    /// Current mana
    pub mana: u32,
    /// Maximum mana
    pub max_mana: u32,
    /// Character level
    pub level: u32,
    /// Experience toward the next level
    pub experience: u32,
    /// Experience needed for the next level
    pub experience_to_next_level: u32,
    /// Base damage
    pub damage: u32,
    /// Defense
    pub defense: u32,
    /// Gold carried
    pub gold: u32,
}

impl Default for PlayerVitals {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            health: 100,
            max_health: 100,
            mana: 100,
            max_mana: 100,
            level: 1,
            experience: 0,
            experience_to_next_level: 100,
            damage: 10,
            defense: 5,
            gold: 0,
        }
    }
}

impl PlayerVitals {
    /// Restores health up to the maximum. Returns the amount gained.
    pub fn heal(&mut self, amount: u32) -> u32 {
        let before = self.health;
        self.health = self.health.saturating_add(amount).min(self.max_health);
        self.health - before
    }

    /// Restores mana up to the maximum. Returns the amount gained.
    pub fn restore_mana(&mut self, amount: u32) -> u32 {
        let before = self.mana;
        self.mana = self.mana.saturating_add(amount).min(self.max_mana);
        self.mana - before
    }

    /// Spends mana if enough is available.
    pub fn spend_mana(&mut self, cost: u32) -> bool {
        if self.mana < cost {
            return false;
        }
        self.mana -= cost;
        true
    }

    /// Brings every field into range. Returns the names of fields changed.
    pub fn clamp(&mut self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.max_health == 0 {
            self.max_health = 1;
            changed.push("maxHealth");
        }
        if self.max_mana == 0 {
            self.max_mana = 1;
            changed.push("maxMana");
        }
        if self.health > self.max_health {
            self.health = self.max_health;
            changed.push("health");
        }
        if self.mana > self.max_mana {
            self.mana = self.max_mana;
            changed.push("mana");
        }
        if self.level == 0 {
            self.level = 1;
            changed.push("level");
        }
        if !self.x.is_finite() || self.x < 0.0 {
            self.x = 0.0;
            changed.push("x");
        }
        if !self.y.is_finite() || self.y < 0.0 {
            self.y = 0.0;
            changed.push("y");
        }
        changed
    }
}

/// Per-NPC quest state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NpcProgress {
    /// The NPC has handed over their gift
    #[serde(default)]
    pub has_given_item: bool,
    /// The NPC's quest is done
    #[serde(default)]
    pub quest_complete: bool,
}

/// Per-node gathering state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProgress {
    /// Node can be gathered
    #[serde(default)]
    pub active: bool,
    /// Time until the node respawns
    #[serde(default)]
    pub cooldown_ms: u32,
}

impl Default for NodeProgress {
    fn default() -> Self {
        Self {
            active: true,
            cooldown_ms: 0,
        }
    }
}

impl NodeProgress {
    /// Marks the node gathered with a respawn cooldown.
    pub fn deplete(&mut self, respawn_ms: u32) {
        self.active = false;
        self.cooldown_ms = respawn_ms;
    }

    /// Advances the cooldown; reactivates the node when it runs out.
    pub fn tick(&mut self, dt_ms: u32) {
        if self.active {
            return;
        }
        self.cooldown_ms = self.cooldown_ms.saturating_sub(dt_ms);
        if self.cooldown_ms == 0 {
            self.active = true;
        }
    }
}

/// World flags the inventory engine persists for other systems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldProgress {
    /// Current biome key
    pub biome: String,
    /// Free-form progress flags
    pub flags: BTreeMap<String, bool>,
    /// NPC state by NPC name
    pub npcs: BTreeMap<String, NpcProgress>,
    /// Resource node state by node id
    pub nodes: BTreeMap<String, NodeProgress>,
}

impl Default for WorldProgress {
    fn default() -> Self {
        Self {
            biome: DEFAULT_BIOME.to_string(),
            flags: BTreeMap::new(),
            npcs: BTreeMap::new(),
            nodes: BTreeMap::new(),
        }
    }
}

impl WorldProgress {
    /// Advances every node cooldown.
    pub fn tick_nodes(&mut self, dt_ms: u32) {
        for node in self.nodes.values_mut() {
            node.tick(dt_ms);
        }
    }
}

/// Everything besides the inventory that goes into a save.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameProgress {
    /// Player vitals
    pub vitals: PlayerVitals,
    /// World flags
    pub world: WorldProgress,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_biomes() {
        assert!(is_known_biome(DEFAULT_BIOME));
        assert!(is_known_biome("glitchedVoid"));
        assert!(!is_known_biome("atlantis"));
        assert!(!is_known_biome(""));
        assert!(!is_known_biome("MagmaKingdom"));
    }

    #[test]
    fn test_heal_caps_at_max() {
        let mut vitals = PlayerVitals {
            health: 90,
            ..PlayerVitals::default()
        };
        assert_eq!(vitals.heal(25), 10);
        assert_eq!(vitals.health, 100);
    }

    #[test]
    fn test_spend_mana() {
        let mut vitals = PlayerVitals {
            mana: 10,
            ..PlayerVitals::default()
        };
        assert!(!vitals.spend_mana(14));
        assert_eq!(vitals.mana, 10);
        assert!(vitals.spend_mana(10));
        assert_eq!(vitals.mana, 0);
    }

    #[test]
    fn test_clamp_reports_fields() {
        let mut vitals = PlayerVitals {
            health: 500,
            max_mana: 0,
            mana: 3,
            ..PlayerVitals::default()
        };
        let changed = vitals.clamp();
        assert_eq!(vitals.health, 100);
        assert_eq!(vitals.max_mana, 1);
        assert_eq!(vitals.mana, 1);
        assert!(changed.contains(&"health"));
        assert!(changed.contains(&"maxMana"));
    }

    #[test]
    fn test_node_cooldown() {
        let mut node = NodeProgress::default();
        node.deplete(8000);
        assert!(!node.active);
        node.tick(5000);
        assert!(!node.active);
        node.tick(3000);
        assert!(node.active);
    }
}

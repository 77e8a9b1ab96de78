//! Scripted automation for headless runs and end-to-end tests.
//!
//! Scripts are JSON documents holding a list of tagged actions:
//!
//! ```json
//! {
//!   "name": "sticks",
//!   "actions": [
//!     { "type": "give", "item": "wood", "count": 2 },
//!     { "type": "open_crafting" },
//!     { "type": "click", "slot": { "hotbar": 0 } },
//!     { "type": "click", "slot": { "grid": { "row": 0, "col": 0 } } },
//!     { "type": "craft" }
//!   ]
//! }
//! ```
//!
//! Each action runs against a [`Session`]; failures are recorded and the
//! script carries on.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use spells_common::ContentResult;
use spells_gameplay::{
    ClickKind, CraftOutcome, EventSummary, ItemUse, ReturnOutcome, SaveTrigger, SlotAddress,
};

use crate::session::Session;

/// Why a grant is being made; decides the save trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantReason {
    /// NPC gift
    #[default]
    Gift,
    /// Resource node gathered
    Gather,
    /// Quest reward
    QuestReward,
}

impl From<GrantReason> for SaveTrigger {
    fn from(reason: GrantReason) -> Self {
        match reason {
            GrantReason::Gift => Self::ItemGift,
            GrantReason::Gather => Self::NodeGathered,
            GrantReason::QuestReward => Self::QuestReward,
        }
    }
}

/// A single automation action to perform.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AutomationAction {
    /// Add items to the hotbar
    Give {
        /// Item key
        item: String,
        /// Units to add
        count: u32,
    },

    /// Add items and save immediately
    Grant {
        /// Item key
        item: String,
        /// Units to add
        count: u32,
        /// Source of the items
        #[serde(default)]
        reason: GrantReason,
    },

    /// Click a slot
    Click {
        /// Slot clicked
        slot: SlotAddress,
        /// Mouse button
        #[serde(default)]
        kind: ClickKind,
    },

    /// Double-click a slot (split-place mode)
    DoubleClick {
        /// Slot clicked
        slot: SlotAddress,
    },

    /// Release the cursor over no slot
    Release,

    /// Open the crafting interface
    OpenCrafting,

    /// Close the crafting interface
    CloseCrafting,

    /// Craft one batch
    Craft,

    /// Craft every batch possible
    CraftAll,

    /// Select a hotbar slot
    Select {
        /// Slot index
        slot: usize,
    },

    /// Use the selected item
    UseSelected,

    /// Drop the selected stack
    DropSelected,

    /// Advance the session clock
    Advance {
        /// Seconds to advance
        seconds: f64,
    },

    /// Save now
    Save,

    /// Record the current save snapshot
    Dump,

    /// Log a message
    Log {
        /// Message to log
        message: String,
    },

    /// Repeat a set of actions
    Repeat {
        /// Number of times to repeat
        count: u32,
        /// Actions to repeat
        actions: Vec<AutomationAction>,
    },
}

impl AutomationAction {
    /// Short name used in reports.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Give { .. } => "give",
            Self::Grant { .. } => "grant",
            Self::Click { .. } => "click",
            Self::DoubleClick { .. } => "double_click",
            Self::Release => "release",
            Self::OpenCrafting => "open_crafting",
            Self::CloseCrafting => "close_crafting",
            Self::Craft => "craft",
            Self::CraftAll => "craft_all",
            Self::Select { .. } => "select",
            Self::UseSelected => "use_selected",
            Self::DropSelected => "drop_selected",
            Self::Advance { .. } => "advance",
            Self::Save => "save",
            Self::Dump => "dump",
            Self::Log { .. } => "log",
            Self::Repeat { .. } => "repeat",
        }
    }
}

/// A named script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationScript {
    /// Script name
    pub name: String,
    /// Description of what this script does
    #[serde(default)]
    pub description: Option<String>,
    /// Sequence of actions
    pub actions: Vec<AutomationAction>,
}

/// Errors loading a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Could not read the file
    #[error("Failed to read script: {0}")]
    Io(#[from] std::io::Error),

    /// Not a valid script document
    #[error("Failed to parse script JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

impl AutomationScript {
    /// Parses a script from JSON.
    pub fn from_json(text: &str) -> Result<Self, ScriptError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Loads a script from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        let script = Self::from_json(&std::fs::read_to_string(path)?)?;
        info!("Loaded script '{}' with {} actions", script.name, script.actions.len());
        Ok(script)
    }
}

/// Result of executing an action.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ActionResult {
    /// Action completed
    Completed(String),
    /// Action failed with error
    Failed(String),
}

impl ActionResult {
    /// Returns true if the action failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Record of one executed action.
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Position in execution order
    pub step: usize,
    /// Action name
    pub action: &'static str,
    /// What happened
    pub result: ActionResult,
    /// Events the action published
    pub events: Vec<EventSummary>,
}

/// Record of a whole script run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Script name
    pub script: String,
    /// Executed steps
    pub steps: Vec<StepReport>,
}

impl RunReport {
    /// Number of failed steps.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.steps.iter().filter(|s| s.result.is_failed()).count()
    }
}

/// Executes scripts against a session.
#[derive(Debug, Default)]
pub struct AutomationRunner {
    steps: Vec<StepReport>,
}

impl AutomationRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs every action of a script.
    pub fn run(mut self, script: &AutomationScript, session: &mut Session) -> RunReport {
        info!("Running script '{}': {:?}", script.name, script.description);
        for action in &script.actions {
            self.run_action(action, session);
        }
        RunReport {
            script: script.name.clone(),
            steps: self.steps,
        }
    }

    fn run_action(&mut self, action: &AutomationAction, session: &mut Session) {
        if let AutomationAction::Repeat { count, actions } = action {
            for _ in 0..*count {
                for inner in actions {
                    self.run_action(inner, session);
                }
            }
            return;
        }

        debug!("Starting action: {:?}", action);
        let result = match execute(action, session) {
            Ok(detail) => ActionResult::Completed(detail),
            Err(reason) => {
                warn!("Action {} failed: {}", action.name(), reason);
                ActionResult::Failed(reason)
            },
        };
        let events = session
            .service()
            .drain_events()
            .iter()
            .map(EventSummary::from)
            .collect();
        self.steps.push(StepReport {
            step: self.steps.len(),
            action: action.name(),
            result,
            events,
        });
    }
}

fn content<T>(result: ContentResult<T>) -> Result<T, String> {
    result.map_err(|e| e.to_string())
}

/// Runs one action, returning a human-readable detail.
fn execute(action: &AutomationAction, session: &mut Session) -> Result<String, String> {
    let service = session.service_mut();
    let detail = match action {
        AutomationAction::Give { item, count } => {
            let added = content(service.add_item(item, *count))?;
            if added {
                format!("added {item} x{count}")
            } else {
                format!("no room for {item} x{count}")
            }
        },
        AutomationAction::Grant { item, count, reason } => {
            let added = content(service.grant(item, *count, SaveTrigger::from(*reason)))?;
            format!("granted {item} x{count}: {added}")
        },
        AutomationAction::Click { slot, kind } => {
            let outcome = content(service.click(*slot, *kind))?;
            format!("{outcome:?}")
        },
        AutomationAction::DoubleClick { slot } => format!("{:?}", service.double_click(*slot)),
        AutomationAction::Release => match content(service.release_cursor())? {
            ReturnOutcome::Held => "cursor kept its stack".to_string(),
            other => format!("{other:?}"),
        },
        AutomationAction::OpenCrafting => format!("opened: {}", service.open_crafting()),
        AutomationAction::CloseCrafting => {
            let report = content(service.close_crafting())?;
            format!(
                "returned {} units, stranded {} cells",
                report.returned,
                report.stranded.len()
            )
        },
        AutomationAction::Craft => match content(service.craft_one())? {
            CraftOutcome::Crafted { recipe, count, .. } => format!("crafted {recipe} x{count}"),
            other => format!("{other:?}"),
        },
        AutomationAction::CraftAll => {
            let report = content(service.craft_all())?;
            format!("{} batches ({:?})", report.completed, report.stop)
        },
        AutomationAction::Select { slot } => {
            service.select_slot(*slot);
            format!("selected {}", service.state().selected_slot)
        },
        AutomationAction::UseSelected => match content(service.use_selected())? {
            Some(ItemUse::Consumed {
                healed,
                mana_restored,
                ..
            }) => format!("healed {healed}, restored {mana_restored} mana"),
            Some(ItemUse::Cast { damage, mana_cost, .. }) => {
                format!("cast for {damage} damage ({mana_cost} mana)")
            },
            None => "no effect".to_string(),
        },
        AutomationAction::DropSelected => match service.drop_selected() {
            Some(stack) => format!("dropped {} x{}", stack.item, stack.count),
            None => "nothing selected".to_string(),
        },
        AutomationAction::Advance { seconds } => match service.tick(*seconds) {
            Some(trigger) => format!("saved ({})", trigger.display_name()),
            None => "no save".to_string(),
        },
        AutomationAction::Save => {
            let saved = service.save(SaveTrigger::Manual).map_err(|e| e.to_string())?;
            format!("saved: {saved}")
        },
        AutomationAction::Dump => {
            let snapshot = service.snapshot().map_err(|e| e.to_string())?;
            snapshot.to_json().map_err(|e| e.to_string())?
        },
        AutomationAction::Log { message } => {
            info!("[AUTOMATION] {}", message);
            message.clone()
        },
        AutomationAction::Repeat { .. } => String::new(),
    };
    Ok(detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use tempfile::TempDir;

    fn session(dir: &TempDir) -> Session {
        let config = EngineConfig {
            save_dir: Some(dir.path().to_path_buf()),
            ..EngineConfig::default()
        };
        Session::start(config).expect("start")
    }

    #[test]
    fn test_parse_script() {
        let script = AutomationScript::from_json(
            r#"{
                "name": "parse",
                "actions": [
                    { "type": "give", "item": "wood", "count": 2 },
                    { "type": "click", "slot": { "grid": { "row": 1, "col": 2 } }, "kind": "secondary" },
                    { "type": "grant", "item": "pearl", "count": 1, "reason": "quest_reward" },
                    { "type": "repeat", "count": 2, "actions": [{ "type": "craft" }] }
                ]
            }"#,
        )
        .expect("parse");
        assert_eq!(script.actions.len(), 4);
        assert!(matches!(
            script.actions[1],
            AutomationAction::Click {
                kind: ClickKind::Secondary,
                ..
            }
        ));
        assert!(AutomationScript::from_json(r#"{ "name": "x", "actions": [{ "type": "fly" }] }"#).is_err());
    }

    #[test]
    fn test_run_crafting_script() {
        let temp_dir = TempDir::new().expect("temp dir");
        let mut session = session(&temp_dir);
        let script = AutomationScript::from_json(
            r#"{
                "name": "sticks",
                "actions": [
                    { "type": "give", "item": "wood", "count": 2 },
                    { "type": "open_crafting" },
                    { "type": "click", "slot": { "hotbar": 0 } },
                    { "type": "click", "slot": { "grid": { "row": 0, "col": 0 } } },
                    { "type": "craft" },
                    { "type": "close_crafting" }
                ]
            }"#,
        )
        .expect("parse");

        let report = AutomationRunner::new().run(&script, &mut session);
        assert_eq!(report.failures(), 0);
        assert_eq!(report.steps.len(), 6);
        assert!(report.steps[4].events.iter().any(|e| e.kind == "recipe_discovered"));
        assert_eq!(session.service().count_of("stick").expect("count"), 4);
    }

    #[test]
    fn test_failures_are_recorded_and_run_continues() {
        let temp_dir = TempDir::new().expect("temp dir");
        let mut session = session(&temp_dir);
        let script = AutomationScript {
            name: "bad".to_string(),
            description: None,
            actions: vec![
                AutomationAction::Give {
                    item: "unobtainium".to_string(),
                    count: 1,
                },
                AutomationAction::Repeat {
                    count: 3,
                    actions: vec![AutomationAction::Give {
                        item: "berry".to_string(),
                        count: 1,
                    }],
                },
                AutomationAction::Dump,
            ],
        };

        let report = AutomationRunner::new().run(&script, &mut session);
        assert_eq!(report.failures(), 1);
        assert_eq!(report.steps.len(), 5);
        assert_eq!(session.service().count_of("berry").expect("count"), 3);
        match &report.steps[4].result {
            ActionResult::Completed(json) => assert!(json.contains("\"berry\"")),
            ActionResult::Failed(reason) => panic!("dump failed: {reason}"),
        }
    }
}

//! Save throttling.
//!
//! Saving on every mutation would mean a write per unit dragged across the
//! grid. Instead mutations mark the state dirty and the throttle fires an
//! interval save once enough time has passed. Milestones (gifts, crafts,
//! gathers, quest rewards, session end) save immediately.

use tracing::debug;

/// Default interval between throttled saves, in seconds.
pub const DEFAULT_SAVE_INTERVAL: f64 = 1.0;

/// Reason a save happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaveTrigger {
    /// Throttle interval elapsed with unsaved changes.
    Interval,
    /// An NPC gift was received.
    ItemGift,
    /// A craft completed.
    CraftCompleted,
    /// A resource node was gathered.
    NodeGathered,
    /// A quest reward was paid out.
    QuestReward,
    /// The session is ending.
    SessionEnd,
    /// Explicit request.
    Manual,
}

impl SaveTrigger {
    /// Returns display name for the trigger.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Interval => "Auto-save",
            Self::ItemGift => "Gift Received",
            Self::CraftCompleted => "Craft Completed",
            Self::NodeGathered => "Resource Gathered",
            Self::QuestReward => "Quest Reward",
            Self::SessionEnd => "Session End",
            Self::Manual => "Manual",
        }
    }

    /// Returns true for triggers that bypass the throttle.
    #[must_use]
    pub fn is_milestone(self) -> bool {
        !matches!(self, Self::Interval)
    }
}

/// Accumulates elapsed time and decides when to save.
#[derive(Debug, Clone)]
pub struct SaveThrottle {
    interval: f64,
    elapsed: f64,
    dirty: bool,
}

impl Default for SaveThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_SAVE_INTERVAL)
    }
}

impl SaveThrottle {
    /// Creates a throttle with the given interval in seconds.
    #[must_use]
    pub fn new(interval: f64) -> Self {
        Self {
            interval: interval.max(0.0),
            elapsed: 0.0,
            dirty: false,
        }
    }

    /// Interval in seconds.
    #[must_use]
    pub const fn interval(&self) -> f64 {
        self.interval
    }

    /// Seconds since the last save.
    #[must_use]
    pub const fn time_since_save(&self) -> f64 {
        self.elapsed
    }

    /// Returns true if there are unsaved changes.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Records that persisted state changed.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Advances time. Returns `Some(Interval)` when a save is due.
    pub fn update(&mut self, delta_time: f64) -> Option<SaveTrigger> {
        self.elapsed += delta_time.max(0.0);
        if self.dirty && self.elapsed >= self.interval {
            debug!("Save due after {:.2}s", self.elapsed);
            return Some(SaveTrigger::Interval);
        }
        None
    }

    /// Records a completed save.
    pub fn record_save(&mut self) {
        self.elapsed = 0.0;
        self.dirty = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_state_never_saves() {
        let mut throttle = SaveThrottle::default();
        assert_eq!(throttle.update(5.0), None);
    }

    #[test]
    fn test_dirty_state_saves_after_interval() {
        let mut throttle = SaveThrottle::new(1.0);
        throttle.mark_dirty();
        assert_eq!(throttle.update(0.4), None);
        assert_eq!(throttle.update(0.4), None);
        assert_eq!(throttle.update(0.4), Some(SaveTrigger::Interval));

        throttle.record_save();
        assert!(!throttle.is_dirty());
        assert_eq!(throttle.time_since_save(), 0.0);
        assert_eq!(throttle.update(2.0), None);
    }

    #[test]
    fn test_milestones() {
        assert!(!SaveTrigger::Interval.is_milestone());
        assert!(SaveTrigger::CraftCompleted.is_milestone());
        assert_eq!(SaveTrigger::SessionEnd.display_name(), "Session End");
    }
}

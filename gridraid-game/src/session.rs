//! The single in-flight raid session and the definition it runs against.
use serde::{Deserialize, Serialize};

use crate::catalog::{Difficulty, RaidDefinition, RewardTable};
use crate::clock::SessionClock;
use crate::resources::ResourceBag;

static NO_REWARDS: RewardTable = RewardTable {
    guaranteed: Vec::new(),
    chance: Vec::new(),
};

/// Fields every runnable definition exposes, full or degraded.
pub trait RaidProfile {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn duration_ms(&self) -> u64;
    fn risk_percentage(&self) -> u8;
    fn rewards(&self) -> &RewardTable;
}

impl RaidProfile for RaidDefinition {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn risk_percentage(&self) -> u8 {
        self.risk_percentage
    }

    fn rewards(&self) -> &RewardTable {
        &self.rewards
    }
}

/// Stand-in rebuilt from persisted metadata when the catalog no longer knows
/// the raid. It carries no rewards and no requirements; it only exists so the
/// session can time out and close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedDefinition {
    pub id: String,
    pub name: String,
    pub difficulty: Difficulty,
    pub duration_ms: u64,
    pub risk_percentage: u8,
}

impl RaidProfile for DegradedDefinition {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    fn risk_percentage(&self) -> u8 {
        self.risk_percentage
    }

    fn rewards(&self) -> &RewardTable {
        &NO_REWARDS
    }
}

/// Definition in force for a session.
#[derive(Debug, Clone, PartialEq)]
pub enum ActiveDefinition {
    Full(RaidDefinition),
    Degraded(DegradedDefinition),
}

impl ActiveDefinition {
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        match self {
            Self::Full(def) => def.difficulty,
            Self::Degraded(def) => def.difficulty,
        }
    }

    /// Original cost, unknown for degraded definitions.
    #[must_use]
    pub const fn requirements(&self) -> Option<&ResourceBag> {
        match self {
            Self::Full(def) => Some(&def.requirements),
            Self::Degraded(_) => None,
        }
    }

    fn profile(&self) -> &dyn RaidProfile {
        match self {
            Self::Full(def) => def,
            Self::Degraded(def) => def,
        }
    }
}

impl RaidProfile for ActiveDefinition {
    fn id(&self) -> &str {
        self.profile().id()
    }

    fn name(&self) -> &str {
        self.profile().name()
    }

    fn duration_ms(&self) -> u64 {
        self.profile().duration_ms()
    }

    fn risk_percentage(&self) -> u8 {
        self.profile().risk_percentage()
    }

    fn rewards(&self) -> &RewardTable {
        self.profile().rewards()
    }
}

/// The one active raid. Owned exclusively by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct RaidSession {
    pub definition: ActiveDefinition,
    pub start_time_ms: u64,
    /// Cached for display continuity; the timestamp stays authoritative.
    pub progress_percent: f64,
    pub automation_was_active: bool,
}

impl RaidSession {
    #[must_use]
    pub const fn new(
        definition: ActiveDefinition,
        start_time_ms: u64,
        automation_was_active: bool,
    ) -> Self {
        Self {
            definition,
            start_time_ms,
            progress_percent: 0.0,
            automation_was_active,
        }
    }

    #[must_use]
    pub const fn elapsed(&self, now_ms: u64) -> u64 {
        SessionClock::elapsed(self.start_time_ms, now_ms)
    }

    #[must_use]
    pub fn remaining(&self, now_ms: u64) -> u64 {
        SessionClock::remaining(self.start_time_ms, self.definition.duration_ms(), now_ms)
    }

    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        SessionClock::is_expired(self.start_time_ms, self.definition.duration_ms(), now_ms)
    }

    /// Recompute the cached progress from the timestamp.
    pub fn refresh_progress(&mut self, now_ms: u64) -> f64 {
        self.progress_percent = SessionClock::progress_percent(
            self.start_time_ms,
            self.definition.duration_ms(),
            now_ms,
        );
        self.progress_percent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RaidCatalog;

    fn degraded() -> DegradedDefinition {
        DegradedDefinition {
            id: "lost_raid".into(),
            name: "Lost Raid".into(),
            difficulty: Difficulty::Unknown,
            duration_ms: 120_000,
            risk_percentage: 20,
        }
    }

    #[test]
    fn degraded_definition_exposes_common_subset() {
        let active = ActiveDefinition::Degraded(degraded());
        assert!(active.is_degraded());
        assert_eq!(active.id(), "lost_raid");
        assert_eq!(active.duration_ms(), 120_000);
        assert!(active.rewards().guaranteed.is_empty());
        assert!(active.requirements().is_none());
    }

    #[test]
    fn session_progress_follows_timestamp() {
        let def = RaidCatalog::fallback().raids.remove(0);
        let mut session = RaidSession::new(ActiveDefinition::Full(def), 10_000, true);
        assert!((session.refresh_progress(70_000) - 50.0).abs() < f64::EPSILON);
        assert_eq!(session.remaining(70_000), 60_000);
        assert!(!session.is_expired(129_999));
        assert!(session.is_expired(130_000));
        assert!((session.refresh_progress(500_000) - 100.0).abs() < f64::EPSILON);
    }
}

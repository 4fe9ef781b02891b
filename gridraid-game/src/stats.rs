//! Lifetime raid statistics, the recent-completions ring, and the special
//! reward inventory.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::numbers::{round_f64_to_u32, u64_to_f64};
use crate::outcome::RaidOutcome;
use crate::resources::ResourceBag;

/// Monotonic counters. Only an explicit game reset clears them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidStatistics {
    #[serde(default)]
    pub total_raids: u64,
    #[serde(default)]
    pub successful_raids: u64,
    #[serde(default)]
    pub resources_gained: ResourceBag,
    #[serde(default)]
    pub units_lost: u64,
}

impl RaidStatistics {
    pub fn record_completion(&mut self, outcome: &RaidOutcome) {
        self.total_raids = self.total_raids.saturating_add(1);
        if outcome.success {
            self.successful_raids = self.successful_raids.saturating_add(1);
        }
        self.units_lost = self.units_lost.saturating_add(outcome.units_lost);
        for (resource, amount) in &outcome.resources_gained {
            let entry = self.resources_gained.entry(resource.clone()).or_insert(0);
            *entry = entry.saturating_add(*amount);
        }
    }

    /// Cancelled raids count toward the total but never as successes.
    pub fn record_cancellation(&mut self) {
        self.total_raids = self.total_raids.saturating_add(1);
    }

    /// Whole-percent success rate.
    #[must_use]
    pub fn success_rate(&self) -> u32 {
        if self.total_raids == 0 {
            return 0;
        }
        round_f64_to_u32(u64_to_f64(self.successful_raids) / u64_to_f64(self.total_raids) * 100.0)
    }

    #[must_use]
    pub fn success_rate_label(&self) -> String {
        format!("{}%", self.success_rate())
    }
}

/// Summary of one completed session kept for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentCompletion {
    pub raid_id: String,
    pub timestamp_ms: u64,
    pub outcome: RaidOutcome,
}

/// Bounded history of completed sessions, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecentCompletions {
    entries: Vec<RecentCompletion>,
}

impl RecentCompletions {
    /// Append an entry; once the ring exceeds `cap` it is cut back to the
    /// newest `keep` entries.
    pub fn push(&mut self, entry: RecentCompletion, cap: usize, keep: usize) {
        self.entries.push(entry);
        self.enforce(cap, keep);
    }

    pub fn enforce(&mut self, cap: usize, keep: usize) {
        if self.entries.len() > cap {
            let excess = self.entries.len() - keep.min(cap);
            self.entries.drain(..excess);
        }
    }

    #[must_use]
    pub fn count_for(&self, raid_id: &str) -> usize {
        self.entries.iter().filter(|e| e.raid_id == raid_id).count()
    }

    #[must_use]
    pub fn entries(&self) -> &[RecentCompletion] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Owned special rewards by id. Ids whose count reaches zero are removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecialRewardInventory {
    counts: BTreeMap<String, u32>,
}

impl SpecialRewardInventory {
    pub fn add(&mut self, id: &str) {
        let entry = self.counts.entry(id.to_string()).or_insert(0);
        *entry = entry.saturating_add(1);
    }

    /// Take one reward; returns false when none is owned.
    pub fn take(&mut self, id: &str) -> bool {
        let Some(count) = self.counts.get_mut(id) else {
            return false;
        };
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.counts.remove(id);
        }
        true
    }

    #[must_use]
    pub fn count(&self, id: &str) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(id, count)| (id.as_str(), *count))
    }

    /// Drop zero-count entries left by older saves.
    pub fn sanitize(&mut self) {
        self.counts.retain(|_, count| *count > 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(units_lost: u64, wood: u64) -> RaidOutcome {
        RaidOutcome {
            success: true,
            units_lost,
            resources_gained: std::iter::once(("wood".to_string(), wood)).collect(),
            special_reward_ids: Default::default(),
            total_value: wood,
        }
    }

    fn completion(index: u64) -> RecentCompletion {
        RecentCompletion {
            raid_id: format!("raid-{}", index % 3),
            timestamp_ms: index,
            outcome: outcome(0, 1),
        }
    }

    #[test]
    fn statistics_accumulate_and_rate() {
        let mut stats = RaidStatistics::default();
        assert_eq!(stats.success_rate_label(), "0%");
        stats.record_completion(&outcome(2, 3));
        stats.record_completion(&outcome(0, 4));
        stats.record_cancellation();
        assert_eq!(stats.total_raids, 3);
        assert_eq!(stats.successful_raids, 2);
        assert_eq!(stats.units_lost, 2);
        assert_eq!(stats.resources_gained["wood"], 7);
        assert_eq!(stats.success_rate_label(), "67%");
    }

    #[test]
    fn ring_truncates_from_oldest_end() {
        let mut ring = RecentCompletions::default();
        for i in 0..50 {
            ring.push(completion(i), 50, 25);
        }
        assert_eq!(ring.len(), 50);
        ring.push(completion(50), 50, 25);
        assert_eq!(ring.len(), 25);
        assert_eq!(ring.entries()[0].timestamp_ms, 26);
        assert_eq!(ring.entries()[24].timestamp_ms, 50);
    }

    #[test]
    fn inventory_removes_exhausted_ids() {
        let mut inventory = SpecialRewardInventory::default();
        inventory.add("ancient_blueprint");
        inventory.add("ancient_blueprint");
        assert_eq!(inventory.count("ancient_blueprint"), 2);
        assert!(inventory.take("ancient_blueprint"));
        assert!(inventory.take("ancient_blueprint"));
        assert!(!inventory.take("ancient_blueprint"));
        assert_eq!(inventory.iter().count(), 0);
    }
}

//! Static raid definitions and the read-only catalog that serves them.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::hash::Hasher;
use thiserror::Error;
use twox_hash::XxHash64;

use crate::resources::{ResourceBag, StructureLevels};

pub const DEFAULT_RAID_DATA: &str = include_str!("../data/raids.json");

/// Structure whose first level opens the raid system as a whole.
pub const SYSTEM_UNLOCK_STRUCTURE: &str = "watchTower";

/// Difficulty tier of a raid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
    Impossible,
    #[serde(other)]
    Unknown,
}

impl Difficulty {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Impossible => "impossible",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structure level gate for a raid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockCondition {
    pub structure: String,
    #[serde(default = "UnlockCondition::default_level")]
    pub level: u32,
}

impl UnlockCondition {
    #[must_use]
    pub const fn default_level() -> u32 {
        1
    }

    /// Whether the structure has reached the required level.
    #[must_use]
    pub fn is_met<L: StructureLevels + ?Sized>(&self, levels: &L) -> bool {
        levels.level(&self.structure) >= self.level
    }
}

/// Reward that always fires, with an inclusive uniform amount range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuaranteedReward {
    pub resource: String,
    pub min: u64,
    pub max: u64,
}

/// What a chance reward grants when its trial hits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardPayload {
    Resource { resource: String, amount: u64 },
    Special { id: String },
}

/// Independent Bernoulli reward entry. Entries are not mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChanceReward {
    pub probability: f64,
    pub payload: RewardPayload,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewardTable {
    #[serde(default)]
    pub guaranteed: Vec<GuaranteedReward>,
    #[serde(default)]
    pub chance: Vec<ChanceReward>,
}

/// Immutable raid definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub difficulty: Difficulty,
    /// `None` means the raid is always available.
    #[serde(default)]
    pub unlock_condition: Option<UnlockCondition>,
    #[serde(default)]
    pub requirements: ResourceBag,
    pub duration_ms: u64,
    /// Chance (0-100) that the crew suffers losses.
    pub risk_percentage: u8,
    #[serde(default)]
    pub rewards: RewardTable,
    #[serde(default)]
    pub category: String,
}

impl RaidDefinition {
    /// Whether the unlock condition holds for the given structure levels.
    #[must_use]
    pub fn is_unlocked<L: StructureLevels + ?Sized>(&self, levels: &L) -> bool {
        self.unlock_condition
            .as_ref()
            .is_none_or(|condition| condition.is_met(levels))
    }
}

/// Effect carried by a special reward. Applying it is up to the wider game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpecialEffect {
    BuildingDiscount {
        value: f64,
        uses: u32,
    },
    ProductionBoost {
        target: String,
        value: f64,
        duration_ms: u64,
    },
    PermanentBonus {
        target: String,
        value: f64,
    },
    TemporaryBonus {
        target: String,
        value: f64,
        uses: u32,
    },
    RaidProtection {
        value: f64,
        uses: u32,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialRewardDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon: String,
    pub effect: SpecialEffect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifficultyInfo {
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub description: String,
}

/// Errors raised when catalog data violates its invariants.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("raid catalog is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate raid id `{0}`")]
    DuplicateId(String),
    #[error("raid `{id}` has risk {risk}% (must be 0-100)")]
    RiskOutOfRange { id: String, risk: u8 },
    #[error("raid `{id}` has zero duration")]
    ZeroDuration { id: String },
    #[error("raid `{id}` reward `{resource}` has min {min} > max {max}")]
    RewardRange {
        id: String,
        resource: String,
        min: u64,
        max: u64,
    },
    #[error("raid `{id}` chance reward probability {probability} outside [0, 1]")]
    Probability { id: String, probability: f64 },
}

/// Read-only collection of raid definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RaidCatalog {
    pub raids: Vec<RaidDefinition>,
    #[serde(default)]
    pub special_rewards: BTreeMap<String, SpecialRewardDef>,
    #[serde(default)]
    pub difficulties: BTreeMap<String, DifficultyInfo>,
}

impl RaidCatalog {
    /// Parse and validate catalog JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON cannot be parsed or a definition is invalid.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: Self = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Build a catalog from already-constructed definitions.
    ///
    /// # Errors
    ///
    /// Returns an error if a definition is invalid.
    pub fn from_definitions(raids: Vec<RaidDefinition>) -> Result<Self, CatalogError> {
        let catalog = Self {
            raids,
            ..Self::default()
        };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load the bundled catalog, falling back to a single starter raid if the
    /// bundled data is unusable.
    #[must_use]
    pub fn load_from_static() -> Self {
        Self::from_json(DEFAULT_RAID_DATA).unwrap_or_else(|err| {
            log::warn!("bundled raid catalog rejected ({err}); using fallback catalog");
            Self::fallback()
        })
    }

    /// Minimal catalog containing only the starter raid.
    #[must_use]
    pub fn fallback() -> Self {
        let requirements = [("people", 4), ("food", 12), ("water", 8)]
            .into_iter()
            .map(|(resource, amount)| (resource.to_string(), amount))
            .collect();
        Self {
            raids: vec![RaidDefinition {
                id: "city_ruins".to_string(),
                name: "City Ruins".to_string(),
                description: "Basic exploration raid".to_string(),
                difficulty: Difficulty::Beginner,
                unlock_condition: Some(UnlockCondition {
                    structure: SYSTEM_UNLOCK_STRUCTURE.to_string(),
                    level: 1,
                }),
                requirements,
                duration_ms: 120_000,
                risk_percentage: 20,
                rewards: RewardTable {
                    guaranteed: vec![GuaranteedReward {
                        resource: "wood".to_string(),
                        min: 2,
                        max: 5,
                    }],
                    chance: Vec::new(),
                },
                category: "exploration".to_string(),
            }],
            special_rewards: BTreeMap::new(),
            difficulties: BTreeMap::new(),
        }
    }

    /// Check catalog invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for raid in &self.raids {
            if !seen.insert(raid.id.as_str()) {
                return Err(CatalogError::DuplicateId(raid.id.clone()));
            }
            if raid.risk_percentage > 100 {
                return Err(CatalogError::RiskOutOfRange {
                    id: raid.id.clone(),
                    risk: raid.risk_percentage,
                });
            }
            if raid.duration_ms == 0 {
                return Err(CatalogError::ZeroDuration {
                    id: raid.id.clone(),
                });
            }
            if let Some(bad) = raid.rewards.guaranteed.iter().find(|r| r.min > r.max) {
                return Err(CatalogError::RewardRange {
                    id: raid.id.clone(),
                    resource: bad.resource.clone(),
                    min: bad.min,
                    max: bad.max,
                });
            }
            if let Some(bad) = raid
                .rewards
                .chance
                .iter()
                .find(|c| !(0.0..=1.0).contains(&c.probability))
            {
                return Err(CatalogError::Probability {
                    id: raid.id.clone(),
                    probability: bad.probability,
                });
            }
        }
        Ok(())
    }

    /// Look up a definition by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RaidDefinition> {
        self.raids.iter().find(|raid| raid.id == id)
    }

    /// Definitions whose unlock condition holds, in catalog order.
    #[must_use]
    pub fn list_unlocked<L: StructureLevels + ?Sized>(&self, levels: &L) -> Vec<&RaidDefinition> {
        self.raids
            .iter()
            .filter(|raid| raid.is_unlocked(levels))
            .collect()
    }

    /// Whether the raid system itself is available.
    #[must_use]
    pub fn is_system_unlocked<L: StructureLevels + ?Sized>(levels: &L) -> bool {
        levels.level(SYSTEM_UNLOCK_STRUCTURE) >= 1
    }

    #[must_use]
    pub fn special_reward(&self, id: &str) -> Option<&SpecialRewardDef> {
        self.special_rewards.get(id)
    }

    #[must_use]
    pub fn difficulty_info(&self, difficulty: Difficulty) -> Option<&DifficultyInfo> {
        self.difficulties.get(difficulty.as_str())
    }

    /// Stable hash of the catalog contents, used to spot data drift across saves.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        match serde_json::to_vec(self) {
            Ok(bytes) => hasher.write(&bytes),
            Err(_) => {
                for raid in &self.raids {
                    hasher.write(raid.id.as_bytes());
                }
            }
        }
        hasher.finish()
    }
}

//! Gridraid Game Engine
//!
//! Platform-agnostic raid session engine for the idle colony game: the raid
//! catalog, elapsed-time progress, outcome resolution, crash-safe persistence,
//! and the state machine tying them together. No UI or platform dependencies.

pub mod catalog;
pub mod clock;
pub mod config;
#[cfg(feature = "async")]
pub mod driver;
pub mod engine;
pub mod numbers;
pub mod outcome;
pub mod persist;
pub mod ports;
pub mod resources;
pub mod scheduler;
pub mod session;
pub mod stats;

// Re-export commonly used types
pub use catalog::{
    CatalogError, ChanceReward, Difficulty, DifficultyInfo, GuaranteedReward, RaidCatalog,
    RaidDefinition, RewardPayload, RewardTable, SYSTEM_UNLOCK_STRUCTURE, SpecialEffect,
    SpecialRewardDef, UnlockCondition,
};
pub use clock::{Clock, ManualClock, SessionClock, SystemClock, format_countdown, format_duration};
pub use config::{ConfigError, RaidEngineConfig};
#[cfg(feature = "async")]
pub use driver::drive_until_idle;
pub use engine::{
    ActiveRaidStatus, EngineError, EnginePhase, OwnedSpecialReward, RaidEngine, RaidInfo,
    RaidStatus, ResolutionError, RestoreOutcome, RestoreReport, StartCheck, StartRejection,
    UseRewardError,
};
pub use outcome::{CREW_RESOURCE, RaidOutcome, resolve_outcome, session_rng};
pub use persist::{
    DefinitionSnapshot, EmergencyBackup, JsonFileStore, MemorySnapshotStore, PersistenceBridge,
    PrimarySlot, RaidSaveBlock, SnapshotStore, StoreError,
};
pub use ports::{
    AutoClicker, AutomationCoordinator, AutomationIntent, EventLog, PresentationPort, RaidEvent,
    announce_system_unlock,
};
pub use resources::{
    LedgerError, ResourceBag, ResourceLedger, Shortfall, Stockpile, StructureLevels,
};
pub use scheduler::{TickHandle, TickScheduler};
pub use session::{ActiveDefinition, DegradedDefinition, RaidProfile, RaidSession};
pub use stats::{RaidStatistics, RecentCompletion, RecentCompletions, SpecialRewardInventory};

/// Trait for abstracting where raid definitions come from.
/// Platform-specific implementations should provide this
pub trait CatalogSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Raw catalog JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    fn load_catalog_json(&self) -> Result<String, Self::Error>;
}

/// The catalog compiled into the crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundledCatalog;

impl CatalogSource for BundledCatalog {
    type Error = std::convert::Infallible;

    fn load_catalog_json(&self) -> Result<String, Self::Error> {
        Ok(catalog::DEFAULT_RAID_DATA.to_string())
    }
}

/// Load and validate a catalog from `source`.
///
/// # Errors
///
/// Returns an error if the source fails or its data is invalid.
pub fn load_catalog<L>(source: &L) -> Result<RaidCatalog, anyhow::Error>
where
    L: CatalogSource,
    L::Error: Into<anyhow::Error>,
{
    let json = source.load_catalog_json().map_err(Into::into)?;
    let catalog = RaidCatalog::from_json(&json)?;
    log::debug!("loaded raid catalog with {} raids", catalog.raids.len());
    Ok(catalog)
}

use anyhow::Result;
use std::collections::BTreeMap;

use gridraid_game::{
    AutoClicker, Clock, EventLog, ManualClock, MemorySnapshotStore, RaidCatalog, RaidEngine,
    RaidEngineConfig, RaidOutcome, RestoreReport, SYSTEM_UNLOCK_STRUCTURE, StartRejection,
    Stockpile,
};

pub type SandboxEngine = RaidEngine<MemorySnapshotStore, ManualClock, AutoClicker, EventLog>;

/// Wall-clock origin for virtual runs.
pub const EPOCH_MS: u64 = 1_700_000_000_000;

/// One simulated player: an engine on a virtual clock over an in-memory store.
///
/// Rebooting keeps the store, clock and clicker, which is what a page reload
/// preserves on the real client.
pub struct Sandbox {
    pub store: MemorySnapshotStore,
    pub clock: ManualClock,
    pub clicker: AutoClicker,
    pub events: EventLog,
    pub engine: SandboxEngine,
    pub ledger: Stockpile,
    pub levels: BTreeMap<String, u32>,
    catalog: RaidCatalog,
    config: RaidEngineConfig,
}

impl Sandbox {
    /// Fresh profile with the bundled catalog, a level 1 watch tower and a
    /// stockpile large enough for any starter raid.
    pub fn new(config: RaidEngineConfig) -> Result<Self> {
        Self::with_catalog(RaidCatalog::load_from_static(), config)
    }

    pub fn with_catalog(catalog: RaidCatalog, config: RaidEngineConfig) -> Result<Self> {
        let store = MemorySnapshotStore::new();
        let clock = ManualClock::starting_at(EPOCH_MS);
        let clicker = AutoClicker::new(false);
        let events = EventLog::new();
        let engine = RaidEngine::new(
            catalog.clone(),
            config.clone(),
            store.clone(),
            clock.clone(),
            clicker.clone(),
            events.clone(),
        )?;
        let mut sandbox = Self {
            store,
            clock,
            clicker,
            events,
            engine,
            ledger: starter_stockpile(),
            levels: std::iter::once((SYSTEM_UNLOCK_STRUCTURE.to_string(), 1)).collect(),
            catalog,
            config,
        };
        sandbox.engine.restore(&mut sandbox.ledger);
        Ok(sandbox)
    }

    /// Drop the engine and boot a new one over the same storage.
    pub fn reboot(&mut self) -> Result<RestoreReport> {
        self.events = EventLog::new();
        self.engine = RaidEngine::new(
            self.catalog.clone(),
            self.config.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.clicker.clone(),
            self.events.clone(),
        )?;
        Ok(self.engine.restore(&mut self.ledger))
    }

    pub fn start(&mut self, raid_id: &str) -> Result<(), StartRejection> {
        self.engine.start_raid(raid_id, &self.levels, &mut self.ledger)
    }

    /// Advance the clock by `duration_ms` in tick-sized steps, pumping after
    /// each one. Returns the outcome of a session completed along the way.
    pub fn run_for(&mut self, duration_ms: u64) -> Option<RaidOutcome> {
        let step = self.config.tick_interval_ms.max(1);
        let deadline = self.clock.now_ms().saturating_add(duration_ms);
        let mut completed = None;
        while self.clock.now_ms() < deadline {
            let next = self.clock.now_ms().saturating_add(step).min(deadline);
            self.clock.set(next);
            if let Some(outcome) = self.engine.pump(&mut self.ledger) {
                completed = Some(outcome);
            }
        }
        completed
    }

    /// Run until nothing is scheduled, giving up after `limit_ms` of virtual time.
    pub fn run_until_idle(&mut self, limit_ms: u64) -> Option<RaidOutcome> {
        let limit = self.clock.now_ms().saturating_add(limit_ms);
        let mut completed = None;
        while let Some(deadline) = self.engine.next_deadline() {
            if deadline > limit {
                break;
            }
            self.clock.set(deadline.max(self.clock.now_ms()));
            if let Some(outcome) = self.engine.pump(&mut self.ledger) {
                completed = Some(outcome);
            }
        }
        completed
    }
}

pub fn starter_stockpile() -> Stockpile {
    Stockpile::with_balances([
        ("people", 40),
        ("food", 200),
        ("water", 200),
        ("wood", 50),
        ("stone", 50),
        ("iron", 20),
    ])
}

//! The raid session state machine.
//!
//! `Idle -> Validating -> Committing -> InProgress -> Resolving -> Idle`. The
//! engine owns the single session slot; the ledger and structure levels belong
//! to the wider game and are lent in per call.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::{
    CatalogError, Difficulty, DifficultyInfo, RaidCatalog, RaidDefinition, SpecialEffect,
    SpecialRewardDef,
};
use crate::clock::{Clock, SessionClock, format_countdown, format_duration};
use crate::config::{ConfigError, RaidEngineConfig};
use crate::numbers::{floor_f64_to_u64, u64_to_f64};
use crate::outcome::{CREW_RESOURCE, RaidOutcome, resolve_outcome, session_rng};
use crate::persist::{EmergencyBackup, PersistenceBridge, PrimarySlot, RaidSaveBlock, SnapshotStore};
use crate::ports::{AutomationCoordinator, PresentationPort, RaidEvent};
use crate::resources::{LedgerError, ResourceBag, ResourceLedger, Shortfall, StructureLevels};
use crate::scheduler::{TickHandle, TickScheduler};
use crate::session::{ActiveDefinition, DegradedDefinition, RaidProfile, RaidSession};
use crate::stats::{RaidStatistics, RecentCompletion, RecentCompletions, SpecialRewardInventory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    Idle,
    Validating,
    Committing,
    InProgress,
    Resolving,
}

impl std::fmt::Display for EnginePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Committing => "committing",
            Self::InProgress => "in_progress",
            Self::Resolving => "resolving",
        };
        f.write_str(label)
    }
}

/// Why a raid cannot start. Display text is the user-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartRejection {
    #[error("Raid not found")]
    UnknownRaid(String),
    #[error("Another raid in progress")]
    AlreadyInProgress,
    #[error("Requires {structure} level {level}")]
    Locked { structure: String, level: u32 },
    #[error("Insufficient resources: {}", list_shortfalls(.0))]
    MissingResources(Vec<Shortfall>),
    #[error("Failed to start raid")]
    CommitFailed,
}

fn list_shortfalls(shortfalls: &[Shortfall]) -> String {
    shortfalls
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `{allowed, reason}` view of a start check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartCheck {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl From<&Result<(), StartRejection>> for StartCheck {
    fn from(result: &Result<(), StartRejection>) -> Self {
        match result {
            Ok(()) => Self {
                allowed: true,
                reason: None,
            },
            Err(rejection) => Self {
                allowed: false,
                reason: Some(rejection.to_string()),
            },
        }
    }
}

/// Failure while applying a resolved outcome.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("could not credit {resource}: {source}")]
    Credit {
        resource: String,
        #[source]
        source: LedgerError,
    },
}

/// Why an engine could not be built.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UseRewardError {
    #[error("unknown special reward `{0}`")]
    Unknown(String),
    #[error("no `{0}` left to use")]
    NotOwned(String),
}

/// What restore found and did.
#[derive(Debug, Clone, PartialEq)]
pub enum RestoreOutcome {
    /// No session in either slot.
    Idle,
    /// Restore already ran on this engine.
    AlreadyRestored,
    /// Session still running; ticking resumed.
    Resumed { raid_id: String, degraded: bool },
    /// Session expired while unloaded and was resolved on the spot.
    CaughtUp {
        raid_id: String,
        outcome: Option<RaidOutcome>,
    },
    /// Session could not be salvaged and was cleared.
    Discarded { raid_id: Option<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestoreReport {
    pub outcome: RestoreOutcome,
    /// The session came from the emergency slot.
    pub from_emergency: bool,
    /// The primary save had been written against a different catalog.
    pub catalog_drift: bool,
}

/// Snapshot of the active raid for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveRaidStatus {
    pub raid_id: String,
    pub name: String,
    pub progress_percent: f64,
    pub remaining_ms: u64,
    pub remaining_label: String,
    pub start_time_ms: u64,
    pub automation_was_active: bool,
    pub degraded: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaidStatus {
    pub phase: EnginePhase,
    pub active: Option<ActiveRaidStatus>,
}

impl RaidStatus {
    #[must_use]
    pub const fn in_progress(&self) -> bool {
        self.active.is_some()
    }
}

/// Catalog entry joined with the player's situation.
#[derive(Debug, Clone)]
pub struct RaidInfo<'a> {
    pub definition: &'a RaidDefinition,
    pub difficulty: Option<&'a DifficultyInfo>,
    pub check: StartCheck,
    pub duration_label: String,
    pub completed_count: usize,
}

#[derive(Debug, Clone)]
pub struct OwnedSpecialReward<'a> {
    pub id: String,
    pub count: u32,
    pub definition: Option<&'a SpecialRewardDef>,
}

/// Raid session engine.
pub struct RaidEngine<S, C, A, P> {
    catalog: RaidCatalog,
    catalog_fingerprint: u64,
    config: RaidEngineConfig,
    persistence: PersistenceBridge<S>,
    clock: C,
    automation: A,
    presentation: P,
    phase: EnginePhase,
    session: Option<RaidSession>,
    scheduler: TickScheduler,
    statistics: RaidStatistics,
    completed: RecentCompletions,
    special_rewards: SpecialRewardInventory,
    restored: bool,
}

impl<S, C, A, P> RaidEngine<S, C, A, P>
where
    S: SnapshotStore,
    C: Clock,
    A: AutomationCoordinator,
    P: PresentationPort,
{
    /// Build an idle engine. Call [`RaidEngine::restore`] before the first tick;
    /// a start on an unrestored engine restores first.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is out of bounds or `catalog` is invalid.
    pub fn new(
        catalog: RaidCatalog,
        config: RaidEngineConfig,
        store: S,
        clock: C,
        automation: A,
        presentation: P,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        catalog.validate()?;
        let catalog_fingerprint = catalog.fingerprint();
        Ok(Self {
            catalog,
            catalog_fingerprint,
            config,
            persistence: PersistenceBridge::new(store),
            clock,
            automation,
            presentation,
            phase: EnginePhase::Idle,
            session: None,
            scheduler: TickScheduler::new(),
            statistics: RaidStatistics::default(),
            completed: RecentCompletions::default(),
            special_rewards: SpecialRewardInventory::default(),
            restored: false,
        })
    }

    #[must_use]
    pub const fn catalog(&self) -> &RaidCatalog {
        &self.catalog
    }

    #[must_use]
    pub const fn config(&self) -> &RaidEngineConfig {
        &self.config
    }

    #[must_use]
    pub const fn phase(&self) -> EnginePhase {
        self.phase
    }

    #[must_use]
    pub const fn session(&self) -> Option<&RaidSession> {
        self.session.as_ref()
    }

    #[must_use]
    pub const fn statistics(&self) -> &RaidStatistics {
        &self.statistics
    }

    #[must_use]
    pub const fn recent_completions(&self) -> &RecentCompletions {
        &self.completed
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        self.persistence.store()
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    #[must_use]
    pub const fn automation(&self) -> &A {
        &self.automation
    }

    #[must_use]
    pub const fn presentation(&self) -> &P {
        &self.presentation
    }

    #[must_use]
    pub const fn pending_tick(&self) -> Option<TickHandle> {
        self.scheduler.pending_tick()
    }

    /// Earliest instant [`RaidEngine::pump`] has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    fn set_phase(&mut self, phase: EnginePhase) {
        if self.phase != phase {
            log::debug!("raid engine {} -> {}", self.phase, phase);
            self.phase = phase;
        }
    }

    /// Side-effect-free start check: existence, exclusivity, unlock, then every
    /// missing resource.
    ///
    /// # Errors
    ///
    /// Returns the first failed check as a [`StartRejection`].
    pub fn can_start<L, R>(
        &self,
        raid_id: &str,
        structures: &L,
        ledger: &R,
    ) -> Result<(), StartRejection>
    where
        L: StructureLevels + ?Sized,
        R: ResourceLedger + ?Sized,
    {
        self.checked_definition(raid_id, structures, ledger).map(|_| ())
    }

    fn checked_definition<L, R>(
        &self,
        raid_id: &str,
        structures: &L,
        ledger: &R,
    ) -> Result<&RaidDefinition, StartRejection>
    where
        L: StructureLevels + ?Sized,
        R: ResourceLedger + ?Sized,
    {
        let definition = self
            .catalog
            .get(raid_id)
            .ok_or_else(|| StartRejection::UnknownRaid(raid_id.to_string()))?;
        if self.session.is_some() {
            return Err(StartRejection::AlreadyInProgress);
        }
        if let Some(condition) = &definition.unlock_condition
            && !condition.is_met(structures)
        {
            return Err(StartRejection::Locked {
                structure: condition.structure.clone(),
                level: condition.level,
            });
        }
        let shortfalls = ledger.shortfalls(&definition.requirements);
        if !shortfalls.is_empty() {
            return Err(StartRejection::MissingResources(shortfalls));
        }
        Ok(definition)
    }

    /// Validate, spend the requirements, and begin a session.
    ///
    /// # Errors
    ///
    /// Returns a [`StartRejection`]; on any rejection no resource was spent.
    pub fn start_raid<L, R>(
        &mut self,
        raid_id: &str,
        structures: &L,
        ledger: &mut R,
    ) -> Result<(), StartRejection>
    where
        L: StructureLevels + ?Sized,
        R: ResourceLedger + ?Sized,
    {
        if !self.restored {
            log::debug!("start requested before restore, restoring first");
            self.restore(ledger);
        }
        if self.session.is_some() {
            return Err(StartRejection::AlreadyInProgress);
        }
        self.set_phase(EnginePhase::Validating);
        let definition = match self.checked_definition(raid_id, structures, ledger) {
            Ok(definition) => definition.clone(),
            Err(rejection) => {
                log::debug!("raid `{raid_id}` rejected: {rejection}");
                self.set_phase(EnginePhase::Idle);
                return Err(rejection);
            }
        };

        self.set_phase(EnginePhase::Committing);
        if let Err(err) = ledger.spend_all(&definition.requirements) {
            log::warn!("raid `{raid_id}` commit failed after validation: {err}");
            self.set_phase(EnginePhase::Idle);
            return Err(StartRejection::CommitFailed);
        }

        // A resume still waiting to fire means the clicker is logically on.
        let resume_was_pending = self.scheduler.cancel_resume();
        let clicker_running = self.automation.is_active();
        let now = self.clock.now_ms();
        let duration_ms = definition.duration_ms;
        let name = definition.name.clone();
        let definition_for_event = definition.clone();
        let session = RaidSession::new(
            ActiveDefinition::Full(definition),
            now,
            resume_was_pending || clicker_running,
        );
        self.session = Some(session);
        self.checkpoint();
        if clicker_running {
            self.automation.request_pause();
        }
        self.presentation.set_blocked(true);
        self.scheduler.cancel_tick();
        self.scheduler
            .schedule_tick(now.saturating_add(self.config.tick_interval_ms));
        self.set_phase(EnginePhase::InProgress);

        log::info!("raid `{raid_id}` started, {duration_ms} ms");
        self.presentation.emit(&RaidEvent::Started {
            raid_id: raid_id.to_string(),
            definition: Box::new(definition_for_event),
            duration_ms,
        });
        self.presentation.notify(&format!(
            "Raid started: {name} ({})",
            format_duration(duration_ms)
        ));
        Ok(())
    }

    /// Fire whatever is due: the deferred automation resume, then the tick.
    /// Returns the outcome when a tick completed the session.
    pub fn pump<R: ResourceLedger + ?Sized>(&mut self, ledger: &mut R) -> Option<RaidOutcome> {
        let now = self.clock.now_ms();
        if self.scheduler.take_due_resume(now) {
            log::debug!("resuming automation");
            self.automation.request_resume();
        }
        let handle = self.scheduler.take_due_tick(now)?;
        self.tick(handle, ledger)
    }

    /// Run one tick. Stale handles from a cleared session are ignored.
    pub fn tick<R: ResourceLedger + ?Sized>(
        &mut self,
        handle: TickHandle,
        ledger: &mut R,
    ) -> Option<RaidOutcome> {
        if !self.scheduler.is_current(handle) {
            log::debug!("ignoring stale tick due at {}", handle.due_ms());
            return None;
        }
        let now = self.clock.now_ms();
        let session = self.session.as_mut()?;
        let progress = session.refresh_progress(now);
        let remaining_ms = session.remaining(now);
        let raid_id = session.definition.id().to_string();
        self.checkpoint();
        log::debug!("raid `{raid_id}` tick: {progress:.1}%, {remaining_ms} ms left");
        self.presentation.emit(&RaidEvent::Progress {
            raid_id,
            progress,
            remaining_ms,
        });

        if remaining_ms == 0 {
            self.set_phase(EnginePhase::Resolving);
            return self.complete_raid(ledger);
        }
        self.scheduler
            .schedule_tick(now.saturating_add(self.config.tick_interval_ms));
        None
    }

    /// Resolve and close the active session. A no-op when idle.
    ///
    /// Returns `None` when idle or when the outcome could not be applied; in
    /// both cases the engine ends up idle.
    pub fn complete_raid<R: ResourceLedger + ?Sized>(
        &mut self,
        ledger: &mut R,
    ) -> Option<RaidOutcome> {
        let session = self.session.take()?;
        self.scheduler.cancel_tick();
        self.set_phase(EnginePhase::Resolving);

        let raid_id = session.definition.id().to_string();
        let mut rng = session_rng(self.config.seed, &raid_id, session.start_time_ms);
        let outcome =
            resolve_outcome(&session.definition, self.config.units_lost_range(), &mut rng);

        let applied = match self.apply_outcome(&raid_id, &outcome, ledger) {
            Ok(()) => {
                log::info!(
                    "raid `{raid_id}` complete: {} gained, {} lost",
                    outcome.total_value,
                    outcome.units_lost
                );
                self.presentation.emit(&RaidEvent::Completed {
                    raid_id: raid_id.clone(),
                    outcome: outcome.clone(),
                });
                self.presentation
                    .notify(&completion_summary(session.definition.name(), &outcome));
                Some(outcome)
            }
            Err(err) => {
                log::error!("raid `{raid_id}` completion failed: {err}");
                self.presentation.emit(&RaidEvent::CompletionFailed {
                    raid_id: raid_id.clone(),
                    reason: err.to_string(),
                });
                self.presentation.notify("Raid completion failed");
                None
            }
        };
        self.close_session(&session);
        applied
    }

    fn apply_outcome<R: ResourceLedger + ?Sized>(
        &mut self,
        raid_id: &str,
        outcome: &RaidOutcome,
        ledger: &mut R,
    ) -> Result<(), ResolutionError> {
        for (resource, amount) in &outcome.resources_gained {
            ledger
                .credit(resource, *amount)
                .map_err(|source| ResolutionError::Credit {
                    resource: resource.clone(),
                    source,
                })?;
        }
        if outcome.units_lost > 0 {
            ledger.debit_saturating(CREW_RESOURCE, outcome.units_lost);
        }
        for id in &outcome.special_reward_ids {
            if self.catalog.special_reward(id).is_none() {
                log::warn!("raid `{raid_id}` granted undefined special reward `{id}`");
            }
            self.special_rewards.add(id);
        }
        self.statistics.record_completion(outcome);
        self.completed.push(
            RecentCompletion {
                raid_id: raid_id.to_string(),
                timestamp_ms: self.clock.now_ms(),
                outcome: outcome.clone(),
            },
            self.config.recent_history_cap,
            self.config.recent_history_keep,
        );
        Ok(())
    }

    /// Abandon the active session for a partial refund. A no-op when idle.
    pub fn cancel_raid<R: ResourceLedger + ?Sized>(
        &mut self,
        ledger: &mut R,
    ) -> Option<ResourceBag> {
        let session = self.session.take()?;
        self.scheduler.cancel_tick();
        self.set_phase(EnginePhase::Resolving);

        let mut refunded = ResourceBag::new();
        for (resource, spent) in session.definition.requirements().into_iter().flatten() {
            let amount = floor_f64_to_u64(u64_to_f64(*spent) * self.config.refund_rate);
            if amount == 0 {
                continue;
            }
            match ledger.credit(resource, amount) {
                Ok(()) => {
                    refunded.insert(resource.clone(), amount);
                }
                Err(err) => log::error!("refund of {amount} {resource} failed: {err}"),
            }
        }
        self.statistics.record_cancellation();

        let raid_id = session.definition.id().to_string();
        log::info!("raid `{raid_id}` cancelled");
        self.presentation.emit(&RaidEvent::Cancelled {
            raid_id,
            refunded: refunded.clone(),
        });
        self.presentation.notify("Raid cancelled");
        self.close_session(&session);
        Some(refunded)
    }

    fn close_session(&mut self, session: &RaidSession) {
        self.presentation.set_blocked(false);
        if session.automation_was_active {
            let at = self.clock.now_ms().saturating_add(self.config.resume_delay_ms);
            self.scheduler.schedule_resume(at);
        }
        self.set_phase(EnginePhase::Idle);
        self.checkpoint();
    }

    /// Reload state from the store and settle any session found there.
    ///
    /// Runs once per engine; later calls report [`RestoreOutcome::AlreadyRestored`].
    pub fn restore<R: ResourceLedger + ?Sized>(&mut self, ledger: &mut R) -> RestoreReport {
        if self.restored || self.session.is_some() {
            return RestoreReport {
                outcome: RestoreOutcome::AlreadyRestored,
                from_emergency: false,
                catalog_drift: false,
            };
        }
        self.restored = true;

        let mut block = self.persistence.load().unwrap_or_default();
        block.sanitize(self.config.recent_history_cap, self.config.recent_history_keep);
        let catalog_drift = block.active.is_active()
            && block
                .catalog_fingerprint
                .is_some_and(|saved| saved != self.catalog_fingerprint);
        if catalog_drift {
            log::warn!("raid catalog changed since the active session was saved");
        }
        self.statistics = block.statistics;
        self.completed = block.completed;
        self.special_rewards = block.special_rewards;

        // Single use: the emergency slot is gone after this whatever happens next.
        let emergency = self.persistence.take_emergency();
        let (slot, from_emergency) = if block.active.is_active() {
            (block.active, false)
        } else if let Some(backup) = emergency.filter(|backup| backup.emergency_flag) {
            log::warn!(
                "recovering raid `{}` from emergency backup saved at {}",
                backup.raid_id.as_deref().unwrap_or("?"),
                backup.saved_at_ms
            );
            (backup.to_primary(), true)
        } else {
            return RestoreReport {
                outcome: RestoreOutcome::Idle,
                from_emergency: false,
                catalog_drift,
            };
        };

        let outcome = self.restore_slot(slot, ledger);
        RestoreReport {
            outcome,
            from_emergency,
            catalog_drift,
        }
    }

    fn restore_slot<R: ResourceLedger + ?Sized>(
        &mut self,
        slot: PrimarySlot,
        ledger: &mut R,
    ) -> RestoreOutcome {
        let (Some(definition), Some(start_time_ms)) =
            (self.rebuild_definition(&slot), slot.start_time_ms)
        else {
            log::warn!(
                "discarding unrecoverable raid session `{}`",
                slot.active_session_id.as_deref().unwrap_or("?")
            );
            self.set_phase(EnginePhase::Idle);
            self.checkpoint();
            return RestoreOutcome::Discarded {
                raid_id: slot.active_session_id,
            };
        };

        let raid_id = definition.id().to_string();
        let degraded = definition.is_degraded();
        let mut session = RaidSession::new(definition, start_time_ms, slot.automation_was_active);
        session.progress_percent = slot.progress_percent;
        let now = self.clock.now_ms();

        if session.is_expired(now) {
            log::info!("raid `{raid_id}` finished while unloaded, resolving");
            self.session = Some(session);
            self.set_phase(EnginePhase::Resolving);
            let outcome = self.complete_raid(ledger);
            return RestoreOutcome::CaughtUp { raid_id, outcome };
        }

        session.refresh_progress(now);
        if self.automation.is_active() {
            session.automation_was_active = true;
            self.automation.request_pause();
        }
        let progress = session.progress_percent;
        let remaining_ms = session.remaining(now);
        self.session = Some(session);
        self.set_phase(EnginePhase::InProgress);
        self.checkpoint();
        self.presentation.set_blocked(true);
        self.presentation.emit(&RaidEvent::Progress {
            raid_id: raid_id.clone(),
            progress,
            remaining_ms,
        });
        self.scheduler.cancel_tick();
        self.scheduler
            .schedule_tick(now.saturating_add(self.config.tick_interval_ms));
        log::info!("raid `{raid_id}` resumed at {progress:.1}%");
        RestoreOutcome::Resumed { raid_id, degraded }
    }

    fn rebuild_definition(&self, slot: &PrimarySlot) -> Option<ActiveDefinition> {
        let id = slot.active_session_id.as_deref()?;
        if let Some(definition) = self.catalog.get(id) {
            return Some(ActiveDefinition::Full(definition.clone()));
        }
        let snapshot = slot.definition_snapshot.as_ref()?;
        let name = snapshot.name.clone()?;
        log::warn!("raid `{id}` no longer in catalog, running degraded");
        Some(ActiveDefinition::Degraded(DegradedDefinition {
            id: id.to_string(),
            name,
            difficulty: snapshot.difficulty.unwrap_or(Difficulty::Unknown),
            duration_ms: snapshot
                .duration_ms
                .filter(|duration| *duration > 0)
                .unwrap_or(self.config.degraded_duration_ms),
            risk_percentage: snapshot
                .risk_percentage
                .filter(|risk| *risk <= 100)
                .unwrap_or(self.config.degraded_risk_percentage),
        }))
    }

    /// Synchronously write the emergency slot. Returns whether anything was written.
    pub fn write_emergency_backup(&mut self) -> bool {
        let now = self.clock.now_ms();
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        session.refresh_progress(now);
        let backup = EmergencyBackup::from_session(session, now);
        self.persistence.write_emergency(&backup)
    }

    fn save_block(&self) -> RaidSaveBlock {
        RaidSaveBlock {
            active: self
                .session
                .as_ref()
                .map(PrimarySlot::from_session)
                .unwrap_or_default(),
            statistics: self.statistics.clone(),
            completed: self.completed.clone(),
            special_rewards: self.special_rewards.clone(),
            catalog_fingerprint: Some(self.catalog_fingerprint),
        }
    }

    fn checkpoint(&self) -> bool {
        self.persistence.checkpoint(&self.save_block())
    }

    #[must_use]
    pub fn status(&self) -> RaidStatus {
        let now = self.clock.now_ms();
        let active = self.session.as_ref().map(|session| {
            let remaining_ms = session.remaining(now);
            ActiveRaidStatus {
                raid_id: session.definition.id().to_string(),
                name: session.definition.name().to_string(),
                progress_percent: SessionClock::progress_percent(
                    session.start_time_ms,
                    session.definition.duration_ms(),
                    now,
                ),
                remaining_ms,
                remaining_label: format_countdown(remaining_ms),
                start_time_ms: session.start_time_ms,
                automation_was_active: session.automation_was_active,
                degraded: session.definition.is_degraded(),
            }
        });
        RaidStatus {
            phase: self.phase,
            active,
        }
    }

    pub fn raid_info<L, R>(&self, raid_id: &str, structures: &L, ledger: &R) -> Option<RaidInfo<'_>>
    where
        L: StructureLevels + ?Sized,
        R: ResourceLedger + ?Sized,
    {
        let definition = self.catalog.get(raid_id)?;
        Some(RaidInfo {
            definition,
            difficulty: self.catalog.difficulty_info(definition.difficulty),
            check: StartCheck::from(&self.can_start(raid_id, structures, ledger)),
            duration_label: format_duration(definition.duration_ms),
            completed_count: self.completed.count_for(raid_id),
        })
    }

    /// Owned special rewards joined with their definitions.
    #[must_use]
    pub fn special_rewards(&self) -> Vec<OwnedSpecialReward<'_>> {
        self.special_rewards
            .iter()
            .map(|(id, count)| OwnedSpecialReward {
                id: id.to_string(),
                count,
                definition: self.catalog.special_reward(id),
            })
            .collect()
    }

    /// Consume one special reward and hand back its effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is undefined or none is owned.
    pub fn use_special_reward(&mut self, id: &str) -> Result<SpecialEffect, UseRewardError> {
        let effect = self
            .catalog
            .special_reward(id)
            .map(|reward| reward.effect.clone())
            .ok_or_else(|| UseRewardError::Unknown(id.to_string()))?;
        if !self.special_rewards.take(id) {
            return Err(UseRewardError::NotOwned(id.to_string()));
        }
        log::info!("special reward `{id}` used");
        self.checkpoint();
        Ok(effect)
    }

    /// Explicit game reset: drop the session without refund and clear every counter.
    pub fn reset(&mut self) {
        if self.session.take().is_some() {
            self.presentation.set_blocked(false);
        }
        self.scheduler.cancel_tick();
        self.scheduler.cancel_resume();
        self.statistics = RaidStatistics::default();
        self.completed = RecentCompletions::default();
        self.special_rewards = SpecialRewardInventory::default();
        self.set_phase(EnginePhase::Idle);
        self.checkpoint();
        log::info!("raid progress reset");
    }
}

fn completion_summary(name: &str, outcome: &RaidOutcome) -> String {
    let mut summary = format!("{name} complete");
    if !outcome.resources_gained.is_empty() {
        let gains = outcome
            .resources_gained
            .iter()
            .map(|(resource, amount)| format!("+{amount} {resource}"))
            .collect::<Vec<_>>()
            .join(", ");
        summary.push_str(": ");
        summary.push_str(&gains);
    }
    if outcome.units_lost > 0 {
        summary.push_str(&format!(" ({} lost)", outcome.units_lost));
    }
    summary
}

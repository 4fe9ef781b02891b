use gridraid_game::{
    AutoClicker, AutomationCoordinator, AutomationIntent, Clock, EnginePhase, EventLog, ManualClock, MemorySnapshotStore,
    RaidCatalog, RaidEngine, RaidEngineConfig, RaidEvent, ResourceLedger, SYSTEM_UNLOCK_STRUCTURE,
    SnapshotStore, StartRejection, Stockpile, UnlockCondition,
};
use std::collections::BTreeMap;

type Engine = RaidEngine<MemorySnapshotStore, ManualClock, AutoClicker, EventLog>;

struct Rig {
    engine: Engine,
    clock: ManualClock,
    clicker: AutoClicker,
    log: EventLog,
    store: MemorySnapshotStore,
}

fn rig_with(catalog: RaidCatalog, clicker_active: bool) -> Rig {
    let clock = ManualClock::starting_at(1_700_000_000_000);
    let clicker = AutoClicker::new(clicker_active);
    let log = EventLog::new();
    let store = MemorySnapshotStore::new();
    let engine = RaidEngine::new(
        catalog,
        RaidEngineConfig::default(),
        store.clone(),
        clock.clone(),
        clicker.clone(),
        log.clone(),
    )
    .unwrap();
    Rig {
        engine,
        clock,
        clicker,
        log,
        store,
    }
}

fn rig() -> Rig {
    rig_with(RaidCatalog::fallback(), false)
}

fn tower(level: u32) -> BTreeMap<String, u32> {
    std::iter::once((SYSTEM_UNLOCK_STRUCTURE.to_string(), level)).collect()
}

fn starter_balances() -> Stockpile {
    Stockpile::with_balances([("people", 10), ("food", 20), ("water", 20), ("wood", 0)])
}

#[test]
fn start_spends_requirements_exactly() {
    let mut rig = rig();
    let mut ledger = starter_balances();
    rig.engine
        .start_raid("city_ruins", &tower(1), &mut ledger)
        .unwrap();
    assert_eq!(ledger.balance("people"), 6);
    assert_eq!(ledger.balance("food"), 8);
    assert_eq!(ledger.balance("water"), 12);
    assert_eq!(rig.engine.phase(), EnginePhase::InProgress);

    let started = rig.log.named("raid.started");
    let expected = RaidCatalog::fallback().get("city_ruins").cloned().unwrap();
    assert_eq!(
        started,
        vec![RaidEvent::Started {
            raid_id: "city_ruins".into(),
            definition: Box::new(expected),
            duration_ms: 120_000,
        }]
    );
    assert!(rig.log.is_blocked());
}

#[test]
fn only_one_session_at_a_time() {
    let mut rig = rig();
    let mut ledger = Stockpile::with_balances([("people", 100), ("food", 100), ("water", 100)]);
    rig.engine
        .start_raid("city_ruins", &tower(1), &mut ledger)
        .unwrap();
    let before = ledger.clone();
    for _ in 0..5 {
        assert_eq!(
            rig.engine.start_raid("city_ruins", &tower(1), &mut ledger),
            Err(StartRejection::AlreadyInProgress)
        );
    }
    assert_eq!(ledger, before);
    let check = rig.engine.raid_info("city_ruins", &tower(1), &ledger).unwrap().check;
    assert!(!check.allowed);
    assert_eq!(check.reason.as_deref(), Some("Another raid in progress"));
}

#[test]
fn insufficient_food_names_the_missing_amount() {
    let mut definition = RaidCatalog::fallback().raids.remove(0);
    definition.requirements = std::iter::once(("food".to_string(), 12)).collect();
    definition.unlock_condition = None;
    let mut rig = rig_with(RaidCatalog::from_definitions(vec![definition]).unwrap(), false);
    let mut ledger = Stockpile::with_balances([("food", 5)]);

    let rejection = rig
        .engine
        .can_start("city_ruins", &BTreeMap::<String, u32>::new(), &ledger)
        .unwrap_err();
    assert!(rejection.to_string().contains("7 food"), "{rejection}");
    assert!(
        rig.engine
            .start_raid("city_ruins", &BTreeMap::<String, u32>::new(), &mut ledger)
            .is_err()
    );
    assert_eq!(ledger.balance("food"), 5);
    assert_eq!(rig.engine.phase(), EnginePhase::Idle);
}

#[test]
fn partial_shortfall_spends_nothing() {
    let mut rig = rig();
    let mut ledger = Stockpile::with_balances([("people", 10), ("food", 20), ("water", 3)]);
    let err = rig
        .engine
        .start_raid("city_ruins", &tower(1), &mut ledger)
        .unwrap_err();
    assert_eq!(err.to_string(), "Insufficient resources: 5 water");
    assert_eq!(ledger.balance("people"), 10);
    assert_eq!(ledger.balance("food"), 20);
    assert_eq!(ledger.balance("water"), 3);
    assert!(rig.engine.session().is_none());
}

#[test]
fn locked_raids_are_rejected() {
    let mut catalog = RaidCatalog::fallback();
    catalog.raids[0].unlock_condition = Some(UnlockCondition {
        structure: "workshop".into(),
        level: 2,
    });
    let mut rig = rig_with(catalog, false);
    let mut ledger = starter_balances();
    let err = rig
        .engine
        .start_raid("city_ruins", &tower(3), &mut ledger)
        .unwrap_err();
    assert_eq!(err.to_string(), "Requires workshop level 2");
    assert_eq!(
        rig.engine.start_raid("ghost_town", &tower(3), &mut ledger),
        Err(StartRejection::UnknownRaid("ghost_town".into()))
    );
}

#[test]
fn ticks_checkpoint_and_complete_on_expiry() {
    let mut rig = rig();
    let mut ledger = starter_balances();
    rig.engine
        .start_raid("city_ruins", &tower(1), &mut ledger)
        .unwrap();

    for _ in 0..60 {
        rig.clock.advance(1_000);
        assert!(rig.engine.pump(&mut ledger).is_none());
    }
    let saved = rig.store.load_primary().unwrap().unwrap();
    assert_eq!(saved.active.active_session_id.as_deref(), Some("city_ruins"));
    assert!((saved.active.progress_percent - 50.0).abs() < f64::EPSILON);
    assert_eq!(rig.log.named("raid.progress").len(), 60);

    let mut outcome = None;
    for _ in 0..60 {
        rig.clock.advance(1_000);
        if let Some(done) = rig.engine.pump(&mut ledger) {
            outcome = Some(done);
        }
    }
    let outcome = outcome.expect("raid completed on the final tick");
    assert!(outcome.success);
    let wood = ledger.balance("wood");
    assert!((2..=5).contains(&wood));
    assert_eq!(outcome.resources_gained["wood"], wood);
    assert_eq!(ledger.balance("people"), 6 - outcome.units_lost);
    assert_eq!(rig.engine.phase(), EnginePhase::Idle);
    assert!(!rig.log.is_blocked());
    assert_eq!(rig.engine.statistics().total_raids, 1);
    assert_eq!(rig.engine.statistics().successful_raids, 1);
    assert_eq!(rig.engine.recent_completions().len(), 1);

    let saved = rig.store.load_primary().unwrap().unwrap();
    assert!(!saved.active.is_active());
    assert_eq!(saved.statistics.total_raids, 1);
    assert!(rig.engine.next_deadline().is_none());
}

#[test]
fn completion_and_cancel_are_noops_when_idle() {
    let mut rig = rig();
    let mut ledger = starter_balances();
    assert!(rig.engine.complete_raid(&mut ledger).is_none());
    assert!(rig.engine.cancel_raid(&mut ledger).is_none());
    assert_eq!(ledger, starter_balances());
    assert!(rig.log.events().is_empty());
    assert_eq!(rig.engine.statistics().total_raids, 0);
}

#[test]
fn cancel_returns_half_floored_and_no_reward() {
    let mut catalog = RaidCatalog::fallback();
    catalog.raids[0].requirements = [("people", 3), ("food", 13), ("water", 8)]
        .into_iter()
        .map(|(resource, amount)| (resource.to_string(), amount))
        .collect();
    let mut rig = rig_with(catalog, false);
    let mut ledger = starter_balances();
    rig.engine
        .start_raid("city_ruins", &tower(1), &mut ledger)
        .unwrap();
    rig.clock.advance(30_000);
    let refunded = rig.engine.cancel_raid(&mut ledger).unwrap();
    assert_eq!(refunded["people"], 1);
    assert_eq!(refunded["food"], 6);
    assert_eq!(refunded["water"], 4);
    assert_eq!(ledger.balance("people"), 8);
    assert_eq!(ledger.balance("food"), 13);
    assert_eq!(ledger.balance("wood"), 0);
    assert!(rig.log.named("raid.completed").is_empty());
    assert_eq!(rig.log.named("raid.cancelled").len(), 1);
    assert_eq!(rig.engine.statistics().success_rate_label(), "0%");
}

#[test]
fn automation_paused_for_the_raid_and_resumed_after_delay() {
    let mut rig = rig_with(RaidCatalog::fallback(), true);
    let mut ledger = starter_balances();
    rig.engine
        .start_raid("city_ruins", &tower(1), &mut ledger)
        .unwrap();
    assert_eq!(rig.clicker.intents(), vec![AutomationIntent::Pause]);
    assert!(rig.engine.session().unwrap().automation_was_active);

    rig.clock.advance(120_000);
    rig.engine.pump(&mut ledger).unwrap();
    assert!(!rig.clicker.is_active());
    assert_eq!(rig.engine.next_deadline(), Some(rig.clock.now_ms() + 500));

    rig.clock.advance(500);
    rig.engine.pump(&mut ledger);
    assert!(rig.clicker.is_active());
    assert_eq!(rig.clicker.count(AutomationIntent::Resume), 1);
}

#[test]
fn inactive_automation_is_left_alone() {
    let mut rig = rig();
    let mut ledger = starter_balances();
    rig.engine
        .start_raid("city_ruins", &tower(1), &mut ledger)
        .unwrap();
    rig.engine.cancel_raid(&mut ledger);
    rig.clock.advance(10_000);
    rig.engine.pump(&mut ledger);
    assert!(rig.clicker.intents().is_empty());
}

#[test]
fn failed_credit_still_returns_to_idle() {
    let mut rig = rig();
    let mut ledger = Stockpile::with_balances([("people", 100), ("food", 100), ("water", 100)]);
    ledger.set("wood", u64::MAX);
    rig.engine
        .start_raid("city_ruins", &tower(1), &mut ledger)
        .unwrap();
    rig.clock.advance(120_000);
    assert!(rig.engine.pump(&mut ledger).is_none());
    assert_eq!(rig.engine.phase(), EnginePhase::Idle);
    assert!(rig.engine.session().is_none());
    assert_eq!(rig.log.named("raid.completion_failed").len(), 1);
    assert!(rig.log.notices().iter().any(|n| n == "Raid completion failed"));
    assert!(!rig.log.is_blocked());

    rig.engine
        .start_raid("city_ruins", &tower(1), &mut ledger)
        .unwrap();
}

#[test]
fn raid_info_counts_completions() {
    let mut rig = rig();
    let mut ledger = Stockpile::with_balances([("people", 100), ("food", 100), ("water", 100)]);
    for _ in 0..3 {
        rig.engine
            .start_raid("city_ruins", &tower(1), &mut ledger)
            .unwrap();
        rig.clock.advance(120_000);
        rig.engine.pump(&mut ledger).unwrap();
    }
    let info = rig.engine.raid_info("city_ruins", &tower(1), &ledger).unwrap();
    assert_eq!(info.completed_count, 3);
    assert_eq!(info.duration_label, "2m 0s");
    assert!(info.check.allowed);
    assert!(rig.engine.raid_info("unknown", &tower(1), &ledger).is_none());
}

#[test]
fn reset_clears_everything() {
    let mut rig = rig();
    let mut ledger = starter_balances();
    rig.engine
        .start_raid("city_ruins", &tower(1), &mut ledger)
        .unwrap();
    rig.engine.reset();
    assert!(rig.engine.session().is_none());
    assert_eq!(rig.engine.statistics().total_raids, 0);
    let saved = rig.store.load_primary().unwrap().unwrap();
    assert!(!saved.active.is_active());
}

//! Logic scenarios: each one drives a sandboxed engine on a virtual clock and
//! fails with the first broken expectation.
use anyhow::{Context, Result, bail, ensure};
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use gridraid_game::{
    AutomationCoordinator, AutomationIntent, Clock, EnginePhase, RaidCatalog, RaidEngineConfig, RaidSaveBlock, ResourceLedger,
    RestoreOutcome, RewardPayload, SnapshotStore, StartRejection, Stockpile, resolve_outcome,
    session_rng,
};

use super::harness::{EPOCH_MS, Sandbox};

/// Everything a scenario run needs from the command line.
#[derive(Debug, Clone)]
pub struct ScenarioCtx {
    pub seed: u64,
    pub config: RaidEngineConfig,
    pub verbose: bool,
}

impl ScenarioCtx {
    fn sandbox(&self) -> Result<Sandbox> {
        Sandbox::new(self.config.clone().with_seed(self.seed))
    }
}

pub type ScenarioFn = fn(&ScenarioCtx) -> Result<()>;

pub struct LogicScenario {
    pub name: &'static str,
    pub description: &'static str,
    pub run: ScenarioFn,
}

const SCENARIOS: &[LogicScenario] = &[
    LogicScenario {
        name: "smoke",
        description: "Start the starter raid and tick it to completion",
        run: smoke,
    },
    LogicScenario {
        name: "mutual-exclusion",
        description: "A second raid is refused while one is active",
        run: mutual_exclusion,
    },
    LogicScenario {
        name: "atomic-spend",
        description: "A partial shortfall rejects the start without spending",
        run: atomic_spend,
    },
    LogicScenario {
        name: "offline-catch-up",
        description: "A raid finished while unloaded resolves exactly once",
        run: offline_catch_up,
    },
    LogicScenario {
        name: "tick-equivalence",
        description: "Live ticking and offline catch-up reach the same outcome",
        run: tick_equivalence,
    },
    LogicScenario {
        name: "emergency-recovery",
        description: "The emergency slot revives a raid the primary save lost",
        run: emergency_recovery,
    },
    LogicScenario {
        name: "degraded-restore",
        description: "A raid missing from the catalog runs from its snapshot",
        run: degraded_restore,
    },
    LogicScenario {
        name: "cancel-refund",
        description: "Cancelling refunds half the requirements, rounded down",
        run: cancel_refund,
    },
    LogicScenario {
        name: "reward-rates",
        description: "Risk and chance rolls land near their configured rates",
        run: reward_rates,
    },
];

pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    SCENARIOS.iter().map(|s| (s.name, s.description)).collect()
}

pub fn get_scenario(name: &str) -> Option<&'static LogicScenario> {
    SCENARIOS.iter().find(|s| s.name == name)
}

pub fn scenario_names() -> impl Iterator<Item = &'static str> {
    SCENARIOS.iter().map(|s| s.name)
}

/// Raid a sandbox picks when a scenario does not care which one runs.
fn pick_raid(ctx: &ScenarioCtx, sandbox: &Sandbox) -> Result<String> {
    let unlocked = sandbox.engine.catalog().list_unlocked(&sandbox.levels);
    let affordable: Vec<_> = unlocked
        .into_iter()
        .filter(|raid| sandbox.ledger.shortfalls(&raid.requirements).is_empty())
        .collect();
    ensure!(!affordable.is_empty(), "no affordable starter raid");
    let index = usize::try_from(ctx.seed % u64::try_from(affordable.len())?)?;
    Ok(affordable[index].id.clone())
}

fn smoke(ctx: &ScenarioCtx) -> Result<()> {
    let mut sandbox = ctx.sandbox()?;
    let raid_id = pick_raid(ctx, &sandbox)?;
    let duration_ms = sandbox
        .engine
        .catalog()
        .get(&raid_id)
        .context("picked raid vanished")?
        .duration_ms;

    sandbox.start(&raid_id)?;
    ensure!(sandbox.engine.phase() == EnginePhase::InProgress);
    ensure!(sandbox.events.is_blocked(), "raid UI not blocked");

    let outcome = sandbox
        .run_for(duration_ms.saturating_add(sandbox.engine.config().tick_interval_ms))
        .context("raid never completed")?;
    ensure!(outcome.success);
    ensure!(sandbox.engine.session().is_none(), "session survived completion");
    ensure!(!sandbox.events.is_blocked(), "raid UI still blocked");
    ensure!(sandbox.engine.statistics().total_raids == 1);
    ensure!(sandbox.engine.recent_completions().count_for(&raid_id) == 1);
    ensure!(
        !sandbox.events.named("raid.progress").is_empty(),
        "no progress events emitted"
    );
    Ok(())
}

fn mutual_exclusion(ctx: &ScenarioCtx) -> Result<()> {
    let mut sandbox = ctx.sandbox()?;
    sandbox.start("city_ruins")?;
    let after_first = sandbox.ledger.clone();
    match sandbox.start("supply_depot") {
        Err(StartRejection::AlreadyInProgress) => {}
        other => bail!("second start returned {other:?}"),
    }
    ensure!(sandbox.ledger == after_first, "rejected start touched the ledger");
    let check = sandbox
        .engine
        .raid_info("supply_depot", &sandbox.levels, &sandbox.ledger)
        .context("supply_depot missing")?
        .check;
    ensure!(!check.allowed);
    ensure!(check.reason.as_deref() == Some("Another raid in progress"));
    Ok(())
}

fn atomic_spend(ctx: &ScenarioCtx) -> Result<()> {
    let mut sandbox = ctx.sandbox()?;
    sandbox.ledger = Stockpile::with_balances([("people", 10), ("food", 20), ("water", 3)]);
    let before = sandbox.ledger.clone();
    match sandbox.start("city_ruins") {
        Err(rejection @ StartRejection::MissingResources(_)) => {
            ensure!(
                rejection.to_string() == "Insufficient resources: 5 water",
                "unexpected reason: {rejection}"
            );
        }
        other => bail!("start with 3 water returned {other:?}"),
    }
    ensure!(sandbox.ledger == before, "rejected start spent resources");
    ensure!(sandbox.engine.phase() == EnginePhase::Idle);
    ensure!(sandbox.store.raw_primary().is_none(), "rejected start was persisted");
    Ok(())
}

fn offline_catch_up(ctx: &ScenarioCtx) -> Result<()> {
    let mut sandbox = ctx.sandbox()?;
    sandbox.start("city_ruins")?;
    let wood_before = sandbox.ledger.balance("wood");
    sandbox.clock.advance(10 * 60 * 1_000);

    let report = sandbox.reboot()?;
    let RestoreOutcome::CaughtUp { raid_id, outcome } = report.outcome.clone() else {
        bail!("restore returned {:?}", report.outcome);
    };
    ensure!(raid_id == "city_ruins");
    let outcome = outcome.context("catch-up did not resolve")?;
    let wood_gained = outcome.resources_gained.get("wood").copied().unwrap_or(0);
    ensure!(sandbox.ledger.balance("wood") == wood_before + wood_gained);

    let second = sandbox.reboot()?;
    ensure!(
        second.outcome == RestoreOutcome::Idle,
        "second reload returned {:?}",
        second.outcome
    );
    ensure!(sandbox.engine.statistics().total_raids == 1, "raid counted twice");
    Ok(())
}

fn tick_equivalence(ctx: &ScenarioCtx) -> Result<()> {
    let mut live = ctx.sandbox()?;
    let mut offline = ctx.sandbox()?;
    live.start("city_ruins")?;
    offline.start("city_ruins")?;

    let ticked = live.run_for(125_000).context("live raid never completed")?;
    offline.clock.advance(125_000);
    let report = offline.reboot()?;
    let RestoreOutcome::CaughtUp {
        outcome: Some(caught_up),
        ..
    } = report.outcome.clone()
    else {
        bail!("offline restore returned {:?}", report.outcome);
    };
    ensure!(
        ticked == caught_up,
        "outcomes diverged: {ticked:?} vs {caught_up:?}"
    );
    ensure!(live.ledger == offline.ledger, "ledgers diverged");
    Ok(())
}

fn emergency_recovery(ctx: &ScenarioCtx) -> Result<()> {
    let mut sandbox = ctx.sandbox()?;
    sandbox.clicker.set_active(true);
    sandbox.start("city_ruins")?;
    sandbox.run_for(30_000);
    ensure!(sandbox.engine.write_emergency_backup(), "backup not written");

    // The host died before the primary checkpoint landed.
    sandbox.store.save_primary(&RaidSaveBlock::default())?;
    sandbox.clock.advance(5_000);

    let report = sandbox.reboot()?;
    ensure!(report.from_emergency, "primary slot was used");
    ensure!(
        report.outcome
            == RestoreOutcome::Resumed {
                raid_id: "city_ruins".into(),
                degraded: false,
            },
        "restore returned {:?}",
        report.outcome
    );
    ensure!(sandbox.store.raw_emergency().is_none(), "emergency slot left behind");
    ensure!(
        sandbox.engine.session().is_some_and(|s| s.automation_was_active),
        "automation flag lost"
    );

    sandbox
        .run_until_idle(10 * 60 * 1_000)
        .context("recovered raid never completed")?;
    ensure!(sandbox.clicker.is_active(), "clicker not resumed");
    ensure!(sandbox.clicker.count(AutomationIntent::Resume) >= 1);
    Ok(())
}

fn degraded_restore(ctx: &ScenarioCtx) -> Result<()> {
    let mut sandbox = ctx.sandbox()?;
    sandbox.start("city_ruins")?;
    sandbox.run_for(10_000);

    // Boot against a catalog that no longer carries the raid.
    let mut catalog = RaidCatalog::load_from_static();
    catalog.raids.retain(|raid| raid.id != "city_ruins");
    let mut reloaded = Sandbox::with_catalog(catalog, ctx.config.clone().with_seed(ctx.seed))?;
    reloaded.store = sandbox.store.clone();
    reloaded.clock.set(sandbox.clock.now_ms());
    let report = reloaded.reboot()?;
    ensure!(
        report.outcome
            == RestoreOutcome::Resumed {
                raid_id: "city_ruins".into(),
                degraded: true,
            },
        "restore returned {:?}",
        report.outcome
    );
    ensure!(report.catalog_drift, "catalog change went unnoticed");

    let outcome = reloaded
        .run_until_idle(10 * 60 * 1_000)
        .context("degraded raid never completed")?;
    ensure!(outcome.special_reward_ids.is_empty());
    ensure!(
        outcome.resources_gained.is_empty(),
        "degraded raid paid {:?}",
        outcome.resources_gained
    );
    Ok(())
}

fn cancel_refund(ctx: &ScenarioCtx) -> Result<()> {
    let mut sandbox = ctx.sandbox()?;
    let before = sandbox.ledger.clone();
    sandbox.start("old_quarry")?;
    sandbox.run_for(5_000);
    let refunded = sandbox
        .engine
        .cancel_raid(&mut sandbox.ledger)
        .context("nothing to cancel")?;

    // old_quarry costs 5 people, 10 food and 2 iron.
    for (resource, cost, refund) in [("people", 5, 2), ("food", 10, 5), ("iron", 2, 1)] {
        ensure!(
            refunded.get(resource).copied().unwrap_or(0) == refund,
            "{resource} refund was {:?}",
            refunded.get(resource)
        );
        ensure!(sandbox.ledger.balance(resource) == before.balance(resource) - cost + refund);
    }
    ensure!(sandbox.engine.statistics().total_raids == 0);
    ensure!(sandbox.engine.phase() == EnginePhase::Idle);
    Ok(())
}

fn reward_rates(ctx: &ScenarioCtx) -> Result<()> {
    const SAMPLES: u64 = 4_000;
    const TOLERANCE: f64 = 0.03;

    let catalog = RaidCatalog::load_from_static();
    let definition = catalog.get("city_ruins").context("city_ruins missing")?;
    let units_lost = ctx.config.units_lost_range();
    // Jitter the start times so different seeds sample different streams.
    let mut jitter = ChaCha8Rng::seed_from_u64(ctx.seed);
    // A chance resource that is also guaranteed cannot be told apart in the outcome.
    let observable: Vec<_> = definition
        .rewards
        .chance
        .iter()
        .filter(|chance| match &chance.payload {
            RewardPayload::Special { .. } => true,
            RewardPayload::Resource { resource, .. } => definition
                .rewards
                .guaranteed
                .iter()
                .all(|g| &g.resource != resource),
        })
        .collect();
    let mut losses = 0u32;
    let mut chance_hits = vec![0u32; observable.len()];
    for _ in 0..SAMPLES {
        let start = EPOCH_MS + jitter.random_range(0..1_000_000_000);
        let mut rng = session_rng(ctx.seed, &definition.id, start);
        let outcome = resolve_outcome(definition, units_lost.clone(), &mut rng);
        if outcome.units_lost > 0 {
            losses += 1;
            ensure!(units_lost.contains(&outcome.units_lost));
        }
        for (hit, chance) in chance_hits.iter_mut().zip(&observable) {
            let fired = match &chance.payload {
                RewardPayload::Special { id } => outcome.special_reward_ids.iter().any(|s| s == id),
                RewardPayload::Resource { resource, .. } => {
                    outcome.resources_gained.contains_key(resource)
                }
            };
            *hit += u32::from(fired);
        }
    }

    let samples = f64::from(u32::try_from(SAMPLES)?);
    let rate = |count: u32| f64::from(count) / samples;
    let observed = rate(losses);
    let expected = f64::from(definition.risk_percentage) / 100.0;
    ensure!(
        (observed - expected).abs() <= TOLERANCE,
        "loss rate {observed:.3}, expected {expected:.3}"
    );
    for (count, chance) in chance_hits.iter().zip(&observable) {
        let observed = rate(*count);
        ensure!(
            (observed - chance.probability).abs() <= TOLERANCE,
            "chance '{}' fired at {observed:.3}, expected {:.3}",
            chance.description,
            chance.probability
        );
    }
    if ctx.verbose {
        println!("     loss rate {observed:.3} over {SAMPLES} sessions");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(seed: u64) -> ScenarioCtx {
        ScenarioCtx {
            seed,
            config: RaidEngineConfig::default(),
            verbose: false,
        }
    }

    #[test]
    fn registry_names_are_unique() {
        let mut names: Vec<_> = scenario_names().collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
        assert!(get_scenario("smoke").is_some());
        assert!(get_scenario("nope").is_none());
    }

    #[test]
    fn every_scenario_passes_on_a_few_seeds() {
        for scenario in SCENARIOS {
            for seed in [1, 1337, 0xDEAD_BEEF] {
                (scenario.run)(&ctx(seed))
                    .unwrap_or_else(|err| panic!("{} seed {seed}: {err:#}", scenario.name));
            }
        }
    }
}

//! Real-time run: one shortened raid on the system clock, persisted to disk,
//! driven by the tokio driver and then reloaded from the files it wrote.
use anyhow::{Context, Result, bail, ensure};
use chrono::Utc;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use gridraid_game::{
    AutoClicker, AutomationCoordinator, EventLog, JsonFileStore, RaidCatalog, RaidEngine, RaidEngineConfig,
    RestoreOutcome, SYSTEM_UNLOCK_STRUCTURE, SystemClock, drive_until_idle,
};

use crate::logic::ScenarioResult;
use crate::logic::harness::starter_stockpile;

pub const LIVE_SCENARIO: &str = "live-raid";

pub struct LiveOptions {
    pub raid_id: String,
    pub duration_ms: u64,
    pub config: RaidEngineConfig,
    pub verbose: bool,
}

pub async fn run_live(options: &LiveOptions) -> ScenarioResult {
    let dir = scratch_dir();
    let started = Instant::now();
    let result = live_raid(options, &dir).await;
    let elapsed = started.elapsed();
    if let Err(err) = std::fs::remove_dir_all(&dir) {
        log::debug!("could not remove {}: {err}", dir.display());
    }

    match result {
        Ok(()) => {
            println!("✅ {} - {elapsed:?}", LIVE_SCENARIO.green());
            ScenarioResult::from_runs(
                LIVE_SCENARIO,
                options.config.seed,
                1,
                Vec::new(),
                vec![elapsed],
            )
        }
        Err(err) => {
            eprintln!("❌ {} - {elapsed:?}: {err:#}", LIVE_SCENARIO.red());
            ScenarioResult::from_runs(
                LIVE_SCENARIO,
                options.config.seed,
                1,
                vec![format!("{err:#}")],
                Vec::new(),
            )
        }
    }
}

fn scratch_dir() -> PathBuf {
    std::env::temp_dir().join(format!(
        "gridraid-live-{}",
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ))
}

async fn live_raid(options: &LiveOptions, dir: &Path) -> Result<()> {
    let mut catalog = RaidCatalog::load_from_static();
    let raid = catalog
        .raids
        .iter_mut()
        .find(|raid| raid.id == options.raid_id)
        .with_context(|| format!("unknown raid `{}`", options.raid_id))?;
    raid.duration_ms = options.duration_ms;

    let config = RaidEngineConfig {
        tick_interval_ms: (options.duration_ms / 8).max(10),
        resume_delay_ms: (options.duration_ms / 10).max(10),
        ..options.config.clone()
    };
    let store = JsonFileStore::open(dir)?;
    let clicker = AutoClicker::new(true);
    let events = EventLog::new();
    let mut engine = RaidEngine::new(
        catalog.clone(),
        config.clone(),
        store.clone(),
        SystemClock,
        clicker.clone(),
        events.clone(),
    )?;
    let mut ledger = starter_stockpile();
    let levels: BTreeMap<String, u32> =
        std::iter::once((SYSTEM_UNLOCK_STRUCTURE.to_string(), 1)).collect();

    engine.restore(&mut ledger);
    engine.start_raid(&options.raid_id, &levels, &mut ledger)?;
    ensure!(!clicker.is_active(), "auto-clicker kept running during the raid");
    ensure!(
        dir.join("raids.save.json").exists(),
        "start was not checkpointed to disk"
    );

    let budget = Duration::from_millis(options.duration_ms.saturating_mul(4).max(1_000));
    let Ok(outcome) = tokio::time::timeout(budget, drive_until_idle(&mut engine, &mut ledger)).await
    else {
        bail!("raid still running after {budget:?}");
    };
    let outcome = outcome.context("driver went idle without completing the raid")?;
    if options.verbose {
        println!(
            "     gained {:?}, lost {} crew, {} progress events",
            outcome.resources_gained,
            outcome.units_lost,
            events.named("raid.progress").len()
        );
    }
    ensure!(clicker.is_active(), "auto-clicker was not resumed");
    ensure!(!events.is_blocked(), "raid UI left blocked");

    // Reload from disk: the completion must not be replayed.
    let mut reloaded = RaidEngine::new(
        catalog,
        config,
        store,
        SystemClock,
        AutoClicker::new(false),
        EventLog::new(),
    )?;
    let report = reloaded.restore(&mut ledger);
    ensure!(
        report.outcome == RestoreOutcome::Idle,
        "reload found {:?}",
        report.outcome
    );
    ensure!(reloaded.statistics().total_raids == 1);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn short_live_raid_passes() {
        let options = LiveOptions {
            raid_id: "supply_depot".into(),
            duration_ms: 80,
            config: RaidEngineConfig::default(),
            verbose: false,
        };
        let result = run_live(&options).await;
        assert!(result.passed, "{:?}", result.failures);
    }

    #[tokio::test]
    async fn unknown_raid_is_reported_as_a_failure() {
        let options = LiveOptions {
            raid_id: "atlantis".into(),
            duration_ms: 80,
            config: RaidEngineConfig::default(),
            verbose: false,
        };
        let result = run_live(&options).await;
        assert!(!result.passed);
        assert!(result.failures[0].contains("atlantis"));
    }
}

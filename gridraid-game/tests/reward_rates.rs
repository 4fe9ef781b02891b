use gridraid_game::{
    ChanceReward, RaidCatalog, RaidDefinition, RewardPayload, resolve_outcome, session_rng,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::convert::TryFrom;

const SAMPLE_SIZE: usize = 5000;
const TOLERANCE: f64 = 0.025;

fn rate(hits: usize) -> f64 {
    let hits = f64::from(u32::try_from(hits).expect("count fits"));
    hits / f64::from(u32::try_from(SAMPLE_SIZE).expect("sample size fits u32"))
}

fn chance(probability: f64, payload: RewardPayload) -> ChanceReward {
    ChanceReward {
        probability,
        payload,
        description: String::new(),
    }
}

fn two_entry_raid() -> RaidDefinition {
    let mut definition = RaidCatalog::fallback().raids.remove(0);
    definition.rewards.chance = vec![
        chance(
            0.3,
            RewardPayload::Special {
                id: "ancient_blueprint".into(),
            },
        ),
        chance(
            0.6,
            RewardPayload::Resource {
                resource: "metal".into(),
                amount: 2,
            },
        ),
    ];
    definition
}

#[test]
fn chance_entries_fire_at_their_own_rates() {
    let definition = two_entry_raid();
    let mut rng = SmallRng::seed_from_u64(0x5EED);
    let (mut special, mut metal, mut both) = (0usize, 0usize, 0usize);
    for _ in 0..SAMPLE_SIZE {
        let outcome = resolve_outcome(&definition, 1..=2, &mut rng);
        let got_special = !outcome.special_reward_ids.is_empty();
        let got_metal = outcome.resources_gained.contains_key("metal");
        special += usize::from(got_special);
        metal += usize::from(got_metal);
        both += usize::from(got_special && got_metal);
    }
    assert!(
        (rate(special) - 0.3).abs() <= TOLERANCE,
        "special rate drifted: {:.4}",
        rate(special)
    );
    assert!(
        (rate(metal) - 0.6).abs() <= TOLERANCE,
        "metal rate drifted: {:.4}",
        rate(metal)
    );
    // Independent trials: the joint rate is the product, not zero.
    assert!(
        (rate(both) - 0.18).abs() <= TOLERANCE,
        "joint rate drifted: {:.4}",
        rate(both)
    );
}

#[test]
fn risk_roll_tracks_risk_percentage() {
    let definition = RaidCatalog::fallback().raids.remove(0);
    let mut rng = SmallRng::seed_from_u64(77);
    let mut losses = 0usize;
    for _ in 0..SAMPLE_SIZE {
        let outcome = resolve_outcome(&definition, 1..=2, &mut rng);
        if outcome.units_lost > 0 {
            losses += 1;
            assert!(outcome.units_lost <= 2);
        }
        assert!(outcome.resources_gained.contains_key("wood"));
    }
    assert!(
        (rate(losses) - 0.2).abs() <= TOLERANCE,
        "loss rate drifted: {:.4}",
        rate(losses)
    );
}

#[test]
fn guaranteed_amounts_cover_the_whole_range() {
    let definition = RaidCatalog::fallback().raids.remove(0);
    let mut seen = [0usize; 4];
    for start in 0..SAMPLE_SIZE {
        let start = u64::try_from(start).expect("index fits");
        let outcome = resolve_outcome(&definition, 1..=2, &mut session_rng(1, "city_ruins", start));
        let wood = outcome.resources_gained["wood"];
        seen[usize::try_from(wood - 2).expect("small")] += 1;
    }
    for count in seen {
        assert!((rate(count) - 0.25).abs() <= TOLERANCE, "uneven wood draw: {seen:?}");
    }
}

#[test]
fn bundled_catalog_rates_stay_in_bounds() {
    let catalog = RaidCatalog::load_from_static();
    let mut rng = SmallRng::seed_from_u64(2024);
    for definition in &catalog.raids {
        for _ in 0..200 {
            let outcome = resolve_outcome(definition, 1..=2, &mut rng);
            for reward in &definition.rewards.guaranteed {
                let gained = outcome.resources_gained[&reward.resource];
                assert!(gained >= reward.min, "{} short on {}", definition.id, reward.resource);
            }
            assert_eq!(
                outcome.total_value,
                outcome.resources_gained.values().sum::<u64>()
            );
        }
    }
}

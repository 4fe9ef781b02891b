//! Outcome resolution: one risk trial, every guaranteed reward, and an
//! independent trial per chance reward.
use hmac::{Hmac, Mac};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use smallvec::SmallVec;
use std::ops::RangeInclusive;

use crate::catalog::RewardPayload;
use crate::resources::ResourceBag;
use crate::session::RaidProfile;

/// Resource that absorbs crew losses.
pub const CREW_RESOURCE: &str = "people";

/// Special reward ids fired in a single resolution; rarely more than two.
pub type SpecialRewardIds = SmallVec<[String; 2]>;

/// Result of one completed session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidOutcome {
    /// Always true; losses are expressed through `units_lost` only.
    pub success: bool,
    pub units_lost: u64,
    pub resources_gained: ResourceBag,
    #[serde(default)]
    pub special_reward_ids: SpecialRewardIds,
    pub total_value: u64,
}

/// Resolve an outcome for `profile`.
///
/// The risk trial and the reward trials are orthogonal: a crew can suffer
/// losses and still bring rewards home.
pub fn resolve_outcome<P, R>(
    profile: &P,
    units_lost: RangeInclusive<u64>,
    rng: &mut R,
) -> RaidOutcome
where
    P: RaidProfile + ?Sized,
    R: Rng + ?Sized,
{
    let mut outcome = RaidOutcome {
        success: true,
        ..RaidOutcome::default()
    };

    let risk = f64::from(profile.risk_percentage().min(100)) / 100.0;
    if rng.random_bool(risk) {
        outcome.units_lost = draw_inclusive(rng, *units_lost.start(), *units_lost.end());
    }

    let rewards = profile.rewards();
    for reward in &rewards.guaranteed {
        let amount = draw_inclusive(rng, reward.min, reward.max);
        add_gain(&mut outcome.resources_gained, &reward.resource, amount);
    }

    for entry in &rewards.chance {
        // A malformed probability never fires.
        let probability = if entry.probability.is_finite() {
            entry.probability.clamp(0.0, 1.0)
        } else {
            0.0
        };
        if !rng.random_bool(probability) {
            continue;
        }
        match &entry.payload {
            RewardPayload::Special { id } => outcome.special_reward_ids.push(id.clone()),
            RewardPayload::Resource { resource, amount } => {
                add_gain(&mut outcome.resources_gained, resource, *amount);
            }
        }
    }

    outcome.total_value = outcome
        .resources_gained
        .values()
        .fold(0u64, |acc, amount| acc.saturating_add(*amount));
    outcome
}

fn draw_inclusive<R: Rng + ?Sized>(rng: &mut R, min: u64, max: u64) -> u64 {
    if max <= min {
        min
    } else {
        rng.random_range(min..=max)
    }
}

fn add_gain(gains: &mut ResourceBag, resource: &str, amount: u64) {
    let entry = gains.entry(resource.to_string()).or_insert(0);
    *entry = entry.saturating_add(amount);
}

/// Outcome RNG for one session.
///
/// Seeded from `(master_seed, raid_id, start_time)` so the same session
/// resolves identically whether it ends on a live tick or during catch-up.
#[must_use]
pub fn session_rng(master_seed: u64, raid_id: &str, start_time_ms: u64) -> ChaCha20Rng {
    ChaCha20Rng::seed_from_u64(derive_session_seed(master_seed, raid_id, start_time_ms))
}

fn derive_session_seed(master_seed: u64, raid_id: &str, start_time_ms: u64) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&master_seed.to_le_bytes()) else {
        return master_seed ^ start_time_ms;
    };
    mac.update(b"raid-outcome");
    mac.update(raid_id.as_bytes());
    mac.update(&start_time_ms.to_le_bytes());
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

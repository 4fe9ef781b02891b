//! Real-time driver: sleeps until the engine's next deadline and pumps it.
use std::time::Duration;

use crate::clock::Clock;
use crate::engine::RaidEngine;
use crate::outcome::RaidOutcome;
use crate::persist::SnapshotStore;
use crate::ports::{AutomationCoordinator, PresentationPort};
use crate::resources::ResourceLedger;

/// Pump `engine` on a tokio timer until nothing is scheduled.
///
/// Returns the outcome of the session that completed along the way, if any.
pub async fn drive_until_idle<S, C, A, P, R>(
    engine: &mut RaidEngine<S, C, A, P>,
    ledger: &mut R,
) -> Option<RaidOutcome>
where
    S: SnapshotStore,
    C: Clock,
    A: AutomationCoordinator,
    P: PresentationPort,
    R: ResourceLedger + ?Sized,
{
    let mut completed = None;
    while let Some(deadline) = engine.next_deadline() {
        let wait = deadline.saturating_sub(engine.clock().now_ms());
        if wait > 0 {
            tokio::time::sleep(Duration::from_millis(wait)).await;
        }
        if let Some(outcome) = engine.pump(ledger) {
            completed = Some(outcome);
        }
    }
    completed
}

use std::time::Duration;

use crate::state::{now_unix, RoundAdvanced, RoundTx, SharedCoordinator};

/// Periodic deadline sweep: advances any running game whose round deadline
/// has lapsed, synthesizing agent decisions for missing submissions.
pub async fn run_deadline_sweep(
    coordinator: SharedCoordinator,
    round_tx: RoundTx,
    interval_secs: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let now = now_unix();
        for id in coordinator.game_ids() {
            match coordinator.advance_if_due(&id, now) {
                Ok(true) => {
                    let round = coordinator.game(&id).map_or(0, |g| g.current_round);
                    tracing::info!(game = %id, round, "deadline sweep advanced game");
                    let _ = round_tx.send(RoundAdvanced { game_id: id, round });
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(game = %id, "deadline sweep failed: {err}");
                }
            }
        }
    }
}

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use farm_coord::{MemoryStore, RoundCoordinator};
use farm_core::GameId;
use tokio::sync::broadcast;

pub type SharedCoordinator = Arc<RoundCoordinator<MemoryStore>>;

/// Frame broadcast whenever a game's round advances, by submission or sweep.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RoundAdvanced {
    pub game_id: GameId,
    pub round: u32,
}

pub type RoundTx = broadcast::Sender<RoundAdvanced>;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: SharedCoordinator,
    pub round_tx: RoundTx,
}

pub fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}

//! Round coordination over a transactional store, plus the offline
//! single-player variant.

mod coordinator;
mod error;
mod local;
mod store;

pub use coordinator::{RoundCoordinator, SubmitOutcome};
pub use error::CoordError;
pub use local::LocalGame;
pub use store::{GameStore, MemoryStore};

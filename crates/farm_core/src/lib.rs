//! Deterministic round advancement for the farming simulation.
//!
//! No IO, no network. All randomness via the passed-in Rng.

mod engine;
mod events;
mod types;

pub use engine::{advance_round, AdvanceInput, EngineError};
pub use events::{draw_events, draw_market_prices};
pub use types::*;

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

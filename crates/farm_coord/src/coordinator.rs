use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use farm_core::{
    draw_events, draw_market_prices, AdvanceInput, Game, GameConfig, GameContent, GameId,
    GameSettings, GameStatus, PlayerId, PlayerState, Round, RoundDecision, PARCEL_COUNT,
};

use crate::error::CoordError;
use crate::store::GameStore;

/// Outcome of one decision submission.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Recorded; other human participants are still pending.
    Submitted,
    /// This submission was the last one; the round advanced and this is the
    /// submitting participant's freshly computed round.
    Calculated(Round),
}

/// Drives games over a transactional store. Every state transition runs
/// inside a single `GameStore::transact`, so the "all humans submitted?"
/// check and the advancement it triggers commit atomically.
pub struct RoundCoordinator<S: GameStore> {
    store: S,
    content: GameContent,
}

/// Per-round event seed, derived so that retried transactions and replays
/// draw identical events for the same round.
pub(crate) fn round_seed(game_seed: u64, round: u32) -> u64 {
    game_seed ^ u64::from(round).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn deadline_after(now_unix: u64, deadline_secs: u64) -> Option<u64> {
    (deadline_secs > 0).then(|| now_unix + deadline_secs)
}

impl<S: GameStore> RoundCoordinator<S> {
    pub fn new(store: S, content: GameContent) -> Self {
        Self { store, content }
    }

    pub fn content(&self) -> &GameContent {
        &self.content
    }

    /// Creates a game with all participant slots synthesized at round 0:
    /// fallow parcels at start soil/nutrients, start capital, empty history
    /// apart from the synthetic initial round.
    pub fn create_game(
        &self,
        id: GameId,
        settings: GameSettings,
        config: GameConfig,
        seed: u64,
        now_unix: u64,
    ) -> Result<Game, CoordError> {
        if settings.total_rounds == 0 {
            return Err(CoordError::InvalidArgument(
                "total_rounds must be at least 1".to_string(),
            ));
        }
        if config.num_players == 0 {
            return Err(CoordError::InvalidArgument(
                "a game needs at least one human participant".to_string(),
            ));
        }

        let initial = Round::initial(&self.content);
        let mut players = std::collections::BTreeMap::new();
        for n in 1..=config.num_players {
            let pid = PlayerId(format!("player_{n:02}"));
            players.insert(pid.clone(), new_player(pid, false, None, &initial));
        }
        for n in 1..=config.num_ai {
            let pid = PlayerId(format!("ai_{n:02}"));
            players.insert(
                pid.clone(),
                new_player(pid, true, Some(config.ai_skill), &initial),
            );
        }

        let game = Game {
            id,
            status: GameStatus::Waiting,
            seed,
            current_round: 0,
            round_deadline_unix: deadline_after(now_unix, settings.round_deadline_secs),
            settings,
            config,
            players,
        };
        self.store.insert(game.clone())?;
        Ok(game)
    }

    pub fn game(&self, id: &GameId) -> Result<Game, CoordError> {
        self.store.snapshot(id).map(|(_, game)| game)
    }

    pub fn game_ids(&self) -> Vec<GameId> {
        self.store.list_ids()
    }

    /// Records one participant's decision; when it is the last missing human
    /// submission, advances the round within the same transaction.
    ///
    /// Resubmission before advancement overwrites the pending decision.
    pub fn submit_decision(
        &self,
        game_id: &GameId,
        player_id: &PlayerId,
        decision: &RoundDecision,
        now_unix: u64,
    ) -> Result<SubmitOutcome, CoordError> {
        validate_decision(decision)?;
        self.store.transact(game_id, |game| {
            // Submitting to a finished game is a policy violation, same
            // class as a non-participant submitting.
            if game.status == GameStatus::Finished {
                return Err(CoordError::PermissionDenied(format!(
                    "game {game_id} is finished"
                )));
            }
            let current = game.current_round;
            let player = game.players.get_mut(player_id).ok_or_else(|| {
                CoordError::PermissionDenied(format!(
                    "{player_id} is not a participant of game {game_id}"
                ))
            })?;
            if player.is_ai {
                return Err(CoordError::PermissionDenied(format!(
                    "{player_id} is a computer participant"
                )));
            }
            player.pending_decision = Some(decision.clone());
            player.submitted_round = Some(current);
            if game.status == GameStatus::Waiting {
                game.status = GameStatus::InProgress;
            }

            if !game.all_humans_submitted() {
                return Ok(SubmitOutcome::Submitted);
            }
            advance_all(game, &self.content, now_unix)?;
            let round = game
                .players
                .get(player_id)
                .and_then(|p| p.history.last())
                .cloned()
                .ok_or_else(|| {
                    CoordError::Internal(format!("{player_id} has no round after advancement"))
                })?;
            Ok(SubmitOutcome::Calculated(round))
        })
    }

    /// Deadline-triggered advancement: synthesizes agent decisions for every
    /// participant who has not submitted, then advances. Returns the new
    /// round number.
    pub fn advance_round(&self, game_id: &GameId, now_unix: u64) -> Result<u32, CoordError> {
        self.store.transact(game_id, |game| {
            if game.status == GameStatus::Finished {
                return Err(CoordError::InvalidArgument(format!(
                    "game {game_id} is finished"
                )));
            }
            if game.status == GameStatus::Waiting {
                game.status = GameStatus::InProgress;
            }
            advance_all(game, &self.content, now_unix)?;
            Ok(game.current_round)
        })
    }

    /// Sweep primitive: advances only if the game is running and its round
    /// deadline has lapsed. The check and the advancement share one
    /// transaction. Returns whether the game advanced.
    pub fn advance_if_due(&self, game_id: &GameId, now_unix: u64) -> Result<bool, CoordError> {
        self.store.transact(game_id, |game| {
            let due = matches!(game.status, GameStatus::Waiting | GameStatus::InProgress)
                && game.round_deadline_unix.is_some_and(|d| d <= now_unix);
            if !due {
                return Ok(false);
            }
            if game.status == GameStatus::Waiting {
                game.status = GameStatus::InProgress;
            }
            advance_all(game, &self.content, now_unix)?;
            Ok(true)
        })
    }
}

fn new_player(
    id: PlayerId,
    is_ai: bool,
    skill: Option<farm_core::SkillTier>,
    initial: &Round,
) -> PlayerState {
    PlayerState {
        id,
        is_ai,
        skill,
        capital: initial.result.capital,
        current_round: 0,
        submitted_round: None,
        pending_decision: None,
        history: vec![initial.clone()],
    }
}

fn validate_decision(decision: &RoundDecision) -> Result<(), CoordError> {
    if decision.crops.len() != PARCEL_COUNT {
        return Err(CoordError::InvalidArgument(format!(
            "expected {} parcel assignments, got {}",
            PARCEL_COUNT,
            decision.crops.len()
        )));
    }
    if decision.machine_investment > 4 {
        return Err(CoordError::InvalidArgument(format!(
            "machine investment {} exceeds level 4",
            decision.machine_investment
        )));
    }
    Ok(())
}

/// Advances every participant by one round and bumps the round pointer by
/// exactly one. Any engine error aborts the caller's transaction whole; no
/// partial advancement is ever committed.
pub(crate) fn advance_all(
    game: &mut Game,
    content: &GameContent,
    now_unix: u64,
) -> Result<(), CoordError> {
    let current = game.current_round;
    let next = current + 1;
    let total = game.settings.total_rounds;
    let fallback_tier = game.config.ai_skill;

    // One event draw and one market table per game-round, shared by all
    // participants. Agent decisions draw from the same stream afterwards, in
    // map (sorted id) order.
    let mut rng = ChaCha8Rng::seed_from_u64(round_seed(game.seed, next));
    let events = draw_events(&mut rng, content);
    let market = draw_market_prices(&mut rng, content);

    for player in game.players.values_mut() {
        let decision = if player.submitted_round == Some(current) {
            player.pending_decision.clone().ok_or_else(|| {
                CoordError::Internal(format!(
                    "{} marked submitted without a pending decision",
                    player.id
                ))
            })?
        } else {
            let tier = player.skill.unwrap_or(fallback_tier);
            farm_agent::decide(tier, player.history.last(), content, &mut rng)
        };

        let round = farm_core::advance_round(
            &AdvanceInput {
                round_number: next,
                previous: player.history.last(),
                decision: &decision,
                events: &events,
                capital: player.capital,
                total_rounds: total,
                market_prices: Some(&market),
            },
            content,
        )?;
        player.capital = round.result.capital;
        player.current_round = next;
        player.pending_decision = None;
        player.history.push(round);
    }

    game.current_round = next;
    if next >= total {
        game.status = GameStatus::Finished;
        game.round_deadline_unix = None;
    } else {
        game.round_deadline_unix = deadline_after(now_unix, game.settings.round_deadline_secs);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use farm_core::test_fixtures::base_content;
    use farm_core::{Crop, SkillTier};

    use super::*;
    use crate::store::MemoryStore;

    const NOW: u64 = 1_700_000_000;

    fn settings(total_rounds: u32) -> GameSettings {
        GameSettings {
            total_rounds,
            round_deadline_secs: 300,
            player_label: "Farm".to_string(),
        }
    }

    fn config(num_players: u32, num_ai: u32) -> GameConfig {
        GameConfig {
            num_players,
            num_ai,
            ai_skill: SkillTier::Middle,
        }
    }

    fn coordinator() -> RoundCoordinator<MemoryStore> {
        RoundCoordinator::new(MemoryStore::new(), base_content())
    }

    fn wheat_everywhere() -> RoundDecision {
        RoundDecision {
            machine_investment: 0,
            fertilizer: true,
            pesticide: false,
            organisms: false,
            organic: false,
            crops: vec![Crop::Wheat; PARCEL_COUNT],
            fixed_prices: Vec::new(),
        }
    }

    #[test]
    fn test_create_game_synthesizes_round_zero() {
        let coord = coordinator();
        let game = coord
            .create_game(GameId("g1".into()), settings(12), config(2, 3), 7, NOW)
            .unwrap();

        assert_eq!(game.status, GameStatus::Waiting);
        assert_eq!(game.current_round, 0);
        assert_eq!(game.players.len(), 5);
        for player in game.players.values() {
            assert_eq!(player.history.len(), 1);
            assert_eq!(player.history[0].number, 0);
            assert!((player.capital - base_content().constants.start_capital).abs() < 1e-9);
        }
        assert_eq!(game.round_deadline_unix, Some(NOW + 300));
    }

    #[test]
    fn test_single_player_submission_advances_immediately() {
        let coord = coordinator();
        let game = coord
            .create_game(GameId("g1".into()), settings(12), config(1, 2), 7, NOW)
            .unwrap();
        let human = PlayerId("player_01".into());

        let outcome = coord
            .submit_decision(&game.id, &human, &wheat_everywhere(), NOW)
            .unwrap();
        let SubmitOutcome::Calculated(round) = outcome else {
            panic!("single-human game should advance on the only submission");
        };
        assert_eq!(round.number, 1);

        let stored = coord.game(&game.id).unwrap();
        assert_eq!(stored.current_round, 1);
        assert_eq!(stored.status, GameStatus::InProgress);
        // Computer participants advanced in lock-step.
        for player in stored.players.values() {
            assert_eq!(player.history.len(), 2);
            assert_eq!(player.current_round, 1);
        }
    }

    #[test]
    fn test_waiting_path_commits_only_the_submitter() {
        let coord = coordinator();
        let game = coord
            .create_game(GameId("g1".into()), settings(12), config(2, 0), 7, NOW)
            .unwrap();
        let p1 = PlayerId("player_01".into());

        let outcome = coord
            .submit_decision(&game.id, &p1, &wheat_everywhere(), NOW)
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Submitted);

        let stored = coord.game(&game.id).unwrap();
        assert_eq!(stored.current_round, 0);
        assert_eq!(stored.players[&p1].submitted_round, Some(0));
        assert!(stored.players[&p1].pending_decision.is_some());
        assert_eq!(stored.players[&PlayerId("player_02".into())].submitted_round, None);
    }

    #[test]
    fn test_two_humans_second_submission_triggers_advancement() {
        let coord = coordinator();
        let game = coord
            .create_game(GameId("g1".into()), settings(12), config(2, 0), 7, NOW)
            .unwrap();
        let p1 = PlayerId("player_01".into());
        let p2 = PlayerId("player_02".into());

        coord
            .submit_decision(&game.id, &p1, &wheat_everywhere(), NOW)
            .unwrap();
        let outcome = coord
            .submit_decision(&game.id, &p2, &wheat_everywhere(), NOW)
            .unwrap();
        assert!(matches!(outcome, SubmitOutcome::Calculated(_)));

        let stored = coord.game(&game.id).unwrap();
        assert_eq!(stored.current_round, 1);
        // Both participants saw identical environmental events.
        let e1 = &stored.players[&p1].history[1].result.events;
        let e2 = &stored.players[&p2].history[1].result.events;
        assert_eq!(e1, e2);
    }

    #[test]
    fn test_resubmission_overwrites_pending_decision() {
        let coord = coordinator();
        let game = coord
            .create_game(GameId("g1".into()), settings(12), config(2, 0), 7, NOW)
            .unwrap();
        let p1 = PlayerId("player_01".into());
        let p2 = PlayerId("player_02".into());

        coord
            .submit_decision(&game.id, &p1, &wheat_everywhere(), NOW)
            .unwrap();
        let mut revised = wheat_everywhere();
        revised.crops = vec![Crop::Oat; PARCEL_COUNT];
        let outcome = coord
            .submit_decision(&game.id, &p1, &revised, NOW)
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Submitted);

        coord
            .submit_decision(&game.id, &p2, &wheat_everywhere(), NOW)
            .unwrap();
        let stored = coord.game(&game.id).unwrap();
        assert_eq!(stored.players[&p1].history[1].decision.crops[0], Crop::Oat);
    }

    #[test]
    fn test_exactly_once_advancement_under_concurrent_submissions() {
        let coord = Arc::new(coordinator());
        let game = coord
            .create_game(GameId("g1".into()), settings(12), config(4, 2), 7, NOW)
            .unwrap();

        let handles: Vec<_> = (1..=4)
            .map(|n| {
                let coord = Arc::clone(&coord);
                let game_id = game.id.clone();
                std::thread::spawn(move || {
                    let pid = PlayerId(format!("player_{n:02}"));
                    coord
                        .submit_decision(&game_id, &pid, &wheat_everywhere(), NOW)
                        .unwrap()
                })
            })
            .collect();
        let outcomes: Vec<SubmitOutcome> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let calculated = outcomes
            .iter()
            .filter(|o| matches!(o, SubmitOutcome::Calculated(_)))
            .count();
        assert_eq!(calculated, 1, "exactly one submission triggers advancement");

        let stored = coord.game(&game.id).unwrap();
        assert_eq!(stored.current_round, 1, "round advanced exactly once");
        for player in stored.players.values() {
            assert_eq!(player.history.len(), 2);
        }
    }

    #[test]
    fn test_rounds_are_strictly_monotonic_and_history_lock_step() {
        let coord = coordinator();
        let game = coord
            .create_game(GameId("g1".into()), settings(3), config(1, 1), 7, NOW)
            .unwrap();
        let human = PlayerId("player_01".into());

        for expected in 1..=3u32 {
            let outcome = coord
                .submit_decision(&game.id, &human, &wheat_everywhere(), NOW)
                .unwrap();
            let SubmitOutcome::Calculated(round) = outcome else {
                panic!("sole human submission should advance");
            };
            assert_eq!(round.number, expected);
            let stored = coord.game(&game.id).unwrap();
            assert_eq!(stored.current_round, expected);
            for player in stored.players.values() {
                assert_eq!(player.history.len() as u32, expected + 1);
            }
        }

        let stored = coord.game(&game.id).unwrap();
        assert_eq!(stored.status, GameStatus::Finished);
        assert_eq!(stored.round_deadline_unix, None);
        let err = coord
            .submit_decision(&game.id, &human, &wheat_everywhere(), NOW)
            .unwrap_err();
        assert!(matches!(err, CoordError::PermissionDenied(_)));
    }

    #[test]
    fn test_deadline_sweep_synthesizes_missing_decisions() {
        let coord = coordinator();
        let game = coord
            .create_game(GameId("g1".into()), settings(12), config(2, 1), 7, NOW)
            .unwrap();
        let p1 = PlayerId("player_01".into());
        coord
            .submit_decision(&game.id, &p1, &wheat_everywhere(), NOW)
            .unwrap();

        // Before the deadline nothing happens.
        assert!(!coord.advance_if_due(&game.id, NOW + 10).unwrap());

        // After it, the lapsed human and the computer participant are filled
        // in by the agent and the round advances.
        assert!(coord.advance_if_due(&game.id, NOW + 301).unwrap());
        let stored = coord.game(&game.id).unwrap();
        assert_eq!(stored.current_round, 1);
        assert_eq!(stored.players[&p1].history[1].decision, wheat_everywhere());
        let p2 = PlayerId("player_02".into());
        assert_eq!(stored.players[&p2].history.len(), 2);
        assert_eq!(stored.round_deadline_unix, Some(NOW + 301 + 300));
    }

    #[test]
    fn test_rejects_unknown_participant_and_ai_submission() {
        let coord = coordinator();
        let game = coord
            .create_game(GameId("g1".into()), settings(12), config(1, 1), 7, NOW)
            .unwrap();

        let err = coord
            .submit_decision(
                &game.id,
                &PlayerId("stranger".into()),
                &wheat_everywhere(),
                NOW,
            )
            .unwrap_err();
        assert!(matches!(err, CoordError::PermissionDenied(_)));

        let err = coord
            .submit_decision(&game.id, &PlayerId("ai_01".into()), &wheat_everywhere(), NOW)
            .unwrap_err();
        assert!(matches!(err, CoordError::PermissionDenied(_)));
    }

    #[test]
    fn test_invalid_decision_rejected_without_state_change() {
        let coord = coordinator();
        let game = coord
            .create_game(GameId("g1".into()), settings(12), config(1, 0), 7, NOW)
            .unwrap();
        let human = PlayerId("player_01".into());

        let mut short = wheat_everywhere();
        short.crops.truncate(3);
        let err = coord
            .submit_decision(&game.id, &human, &short, NOW)
            .unwrap_err();
        assert!(matches!(err, CoordError::InvalidArgument(_)));

        let stored = coord.game(&game.id).unwrap();
        assert_eq!(stored.current_round, 0);
        assert_eq!(stored.players[&human].submitted_round, None);
    }

    #[test]
    fn test_replayed_round_draws_identical_events() {
        // Two games with the same seed and identical submissions produce
        // byte-identical histories.
        let run = || {
            let coord = coordinator();
            let game = coord
                .create_game(GameId("g".into()), settings(12), config(1, 2), 99, NOW)
                .unwrap();
            let human = PlayerId("player_01".into());
            for _ in 0..4 {
                coord
                    .submit_decision(&game.id, &human, &wheat_everywhere(), NOW)
                    .unwrap();
            }
            coord.game(&game.id).unwrap()
        };
        let a = run();
        let b = run();
        assert_eq!(a, b);
    }
}

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use farm_core::{
    draw_events, draw_market_prices, AdvanceInput, GameContent, Round, RoundDecision, SkillTier,
};

use crate::coordinator::round_seed;
use crate::error::CoordError;

/// Single-player variant: the same engine and agent, no store, no
/// concurrency. One human field plus any number of computer rivals, all
/// advanced in lock-step under shared environmental events.
pub struct LocalGame {
    content: GameContent,
    total_rounds: u32,
    seed: u64,
    current_round: u32,
    human: Vec<Round>,
    rivals: Vec<(SkillTier, Vec<Round>)>,
}

impl LocalGame {
    pub fn new(content: GameContent, total_rounds: u32, seed: u64, rival_tiers: &[SkillTier]) -> Self {
        let initial = Round::initial(&content);
        let rivals = rival_tiers
            .iter()
            .map(|&tier| (tier, vec![initial.clone()]))
            .collect();
        Self {
            content,
            total_rounds,
            seed,
            current_round: 0,
            human: vec![initial],
            rivals,
        }
    }

    pub fn content(&self) -> &GameContent {
        &self.content
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn is_finished(&self) -> bool {
        self.current_round >= self.total_rounds
    }

    /// The human participant's history, round 0 included.
    pub fn history(&self) -> &[Round] {
        &self.human
    }

    pub fn rivals(&self) -> &[(SkillTier, Vec<Round>)] {
        &self.rivals
    }

    /// Plays one round with the given human decision. Rival decisions come
    /// from the agent; all fields share the round's event draw.
    pub fn play_round(&mut self, decision: &RoundDecision) -> Result<Round, CoordError> {
        if self.is_finished() {
            return Err(CoordError::InvalidArgument("game is finished".to_string()));
        }
        let next = self.current_round + 1;
        let mut rng = ChaCha8Rng::seed_from_u64(round_seed(self.seed, next));
        let events = draw_events(&mut rng, &self.content);
        let market = draw_market_prices(&mut rng, &self.content);

        let round = farm_core::advance_round(
            &AdvanceInput {
                round_number: next,
                previous: self.human.last(),
                decision,
                events: &events,
                capital: self.human.last().map_or(0.0, |r| r.result.capital),
                total_rounds: self.total_rounds,
                market_prices: Some(&market),
            },
            &self.content,
        )?;

        for (tier, history) in &mut self.rivals {
            let rival_decision = farm_agent::decide(*tier, history.last(), &self.content, &mut rng);
            let rival_round = farm_core::advance_round(
                &AdvanceInput {
                    round_number: next,
                    previous: history.last(),
                    decision: &rival_decision,
                    events: &events,
                    capital: history.last().map_or(0.0, |r| r.result.capital),
                    total_rounds: self.total_rounds,
                    market_prices: Some(&market),
                },
                &self.content,
            )?;
            history.push(rival_round);
        }

        self.human.push(round.clone());
        self.current_round = next;
        Ok(round)
    }

    /// Plays one round with the human decision synthesized at the given
    /// skill tier.
    pub fn play_auto(&mut self, tier: SkillTier) -> Result<Round, CoordError> {
        if self.is_finished() {
            return Err(CoordError::InvalidArgument("game is finished".to_string()));
        }
        // Separate rng stream for the human's synthesized decision so rival
        // draws stay aligned with `play_round`.
        let mut rng =
            ChaCha8Rng::seed_from_u64(round_seed(self.seed, self.current_round + 1) ^ 1);
        let decision = farm_agent::decide(tier, self.human.last(), &self.content, &mut rng);
        self.play_round(&decision)
    }
}

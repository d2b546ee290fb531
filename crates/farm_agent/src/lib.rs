use rand::Rng;

use farm_core::{Crop, GameContent, Round, RoundDecision, SkillTier, PARCEL_COUNT};

/// Anything that can produce the next round's decision for one participant.
pub trait DecisionSource {
    fn next_decision(
        &mut self,
        previous: Option<&Round>,
        content: &GameContent,
        rng: &mut dyn rand::RngCore,
    ) -> RoundDecision;
}

/// Policy-driven computer participant at a fixed skill tier:
/// - `Elementary` plants random main crops and flips coins on inputs.
/// - `Middle` follows the rotation matrix and keeps a level-1 machine park.
/// - `High` reads the soil trend and switches to organic farming on good land.
pub struct PolicyAgent {
    pub tier: SkillTier,
}

impl PolicyAgent {
    pub fn new(tier: SkillTier) -> Self {
        Self { tier }
    }
}

impl DecisionSource for PolicyAgent {
    fn next_decision(
        &mut self,
        previous: Option<&Round>,
        content: &GameContent,
        rng: &mut dyn rand::RngCore,
    ) -> RoundDecision {
        decide(self.tier, previous, content, rng)
    }
}

/// Computes one tier's decision from the previous round snapshot. Same
/// previous round, same rng stream, same decision.
pub fn decide(
    tier: SkillTier,
    previous: Option<&Round>,
    content: &GameContent,
    rng: &mut (impl Rng + ?Sized),
) -> RoundDecision {
    match tier {
        SkillTier::Elementary => elementary(previous, content, rng),
        SkillTier::Middle => middle(previous, content),
        SkillTier::High => high(previous, content, rng),
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Crop standing on parcel `index` at the end of the previous round.
fn prev_crop_at(previous: Option<&Round>, index: usize) -> Crop {
    previous
        .and_then(|round| round.parcels.get(index))
        .map_or(Crop::Fallow, |parcel| parcel.crop)
}

/// Mean soil quality over all parcels of the previous round, or the start
/// value before round 1.
fn average_soil(previous: Option<&Round>, content: &GameContent) -> f64 {
    match previous {
        Some(round) if !round.parcels.is_empty() => {
            round.parcels.iter().map(|p| p.soil).sum::<f64>() / round.parcels.len() as f64
        }
        _ => content.constants.start_soil,
    }
}

fn random_main_crop(content: &GameContent, rng: &mut (impl Rng + ?Sized)) -> Crop {
    if content.main_crops.is_empty() {
        return Crop::Fallow;
    }
    content.main_crops[rng.gen_range(0..content.main_crops.len())]
}

fn elementary(
    _previous: Option<&Round>,
    content: &GameContent,
    rng: &mut (impl Rng + ?Sized),
) -> RoundDecision {
    let c = &content.constants;
    RoundDecision {
        machine_investment: 0,
        fertilizer: rng.gen_bool(c.agent_fertilizer_probability),
        pesticide: rng.gen_bool(c.agent_pesticide_probability),
        organisms: false,
        organic: false,
        crops: (0..PARCEL_COUNT)
            .map(|_| random_main_crop(content, rng))
            .collect(),
        fixed_prices: Vec::new(),
    }
}

fn middle(previous: Option<&Round>, content: &GameContent) -> RoundDecision {
    let crops = (0..PARCEL_COUNT)
        .map(|index| {
            if previous.is_none() {
                // First planting: spread the main crops evenly across parcels.
                return content
                    .main_crops
                    .get(index % content.main_crops.len().max(1))
                    .copied()
                    .unwrap_or(Crop::Wheat);
            }
            let prev = prev_crop_at(previous, index);
            content
                .good_successors(prev)
                .first()
                .copied()
                .unwrap_or(Crop::Wheat)
        })
        .collect();
    RoundDecision {
        machine_investment: 1,
        fertilizer: true,
        pesticide: true,
        organisms: false,
        organic: false,
        crops,
        fixed_prices: Vec::new(),
    }
}

fn high(
    previous: Option<&Round>,
    content: &GameContent,
    rng: &mut (impl Rng + ?Sized),
) -> RoundDecision {
    let c = &content.constants;
    let avg_soil = average_soil(previous, content);
    let organic = avg_soil > c.agent_organic_soil_threshold;
    let machine_investment = if !organic && avg_soil > c.agent_good_soil_threshold {
        2
    } else {
        1
    };

    let crops = (0..PARCEL_COUNT)
        .map(|index| {
            let (soil, nutrients) = previous
                .and_then(|round| round.parcels.get(index))
                .map_or((c.start_soil, c.start_nutrients), |p| (p.soil, p.nutrients));
            if soil < c.agent_critical_soil || nutrients < c.agent_critical_nutrients {
                return Crop::Fieldbean;
            }
            if organic && index < c.agent_grass_parcels {
                return Crop::Grass;
            }
            // Only main crops qualify for the uniform draw; a good successor
            // like Fieldbean stays reserved for depleted parcels.
            let options: Vec<Crop> = content
                .good_successors(prev_crop_at(previous, index))
                .into_iter()
                .filter(|crop| content.main_crops.contains(crop))
                .collect();
            if options.is_empty() {
                Crop::Oat
            } else {
                options[rng.gen_range(0..options.len())]
            }
        })
        .collect();

    RoundDecision {
        machine_investment,
        fertilizer: !organic,
        pesticide: !organic,
        organisms: organic,
        organic,
        crops,
        fixed_prices: Vec::new(),
    }
}

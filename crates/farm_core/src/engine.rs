//! The round advancement engine.
//!
//! `advance_round` is pure, total, and deterministic: identical inputs yield
//! byte-identical `Round` output regardless of execution context or call
//! order. All randomness (environmental events, live market prices) is drawn
//! by the caller and passed in.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::{
    fresh_parcels, Constants, Crop, CropDef, EnvEvents, Expenses, GameContent, Parcel, Pest,
    RotationQuality, Round, RoundDecision, RoundResult, Weather, PARCEL_COUNT,
};

// Machine smoothing coefficients. Higher existing mechanization decays
// faster absent reinvestment; one investment step adds a quarter level.
const MACHINE_BASE_DECAY: f64 = 0.10;
const MACHINE_DECAY_SLOPE: f64 = 0.15;
const MACHINE_INVEST_STEP: f64 = 0.25;
const MACHINE_MAX: f64 = 4.0;
const MACHINE_INVEST_MAX: u8 = 4;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid decision: {0}")]
    InvalidDecision(String),
    #[error("total rounds must be at least 1")]
    InvalidLength,
}

/// Inputs to one engine invocation for one participant.
pub struct AdvanceInput<'a> {
    pub round_number: u32,
    /// `None` means round 0 defaults: fresh fallow parcels, machine level 0.
    pub previous: Option<&'a Round>,
    pub decision: &'a RoundDecision,
    pub events: &'a EnvEvents,
    pub capital: f64,
    pub total_rounds: u32,
    /// Live market table; crops absent from it (or price-fixed) settle at
    /// their declared value.
    pub market_prices: Option<&'a BTreeMap<Crop, f64>>,
}

/// Smoothed mechanization for this round plus its table-driven effects.
struct MachineEffects {
    real: f64,
    level: u8,
    yield_bonus: f64,
    soil_impact: f64,
}

/// Advance one participant's field state by one round.
pub fn advance_round(
    input: &AdvanceInput<'_>,
    content: &GameContent,
) -> Result<Round, EngineError> {
    validate(input)?;
    let c = &content.constants;
    let time_scale = f64::from(c.default_rounds) / f64::from(input.total_rounds);

    let fallback;
    let (prev_parcels, prev_real): (&[Parcel], f64) = match input.previous {
        Some(round) => (&round.parcels, round.result.machine_real_level),
        None => {
            fallback = fresh_parcels(content);
            (&fallback, 0.0)
        }
    };

    let machine = machine_effects(prev_real, input.decision.machine_investment, content);
    let grass_count = input
        .decision
        .crops
        .iter()
        .filter(|&&crop| crop == Crop::Grass)
        .count();

    let parcels: Vec<Parcel> = prev_parcels
        .iter()
        .map(|prev| {
            advance_parcel(
                prev,
                input.decision,
                input.events,
                &machine,
                grass_count,
                time_scale,
                content,
            )
        })
        .collect();

    let result = financials(input, &parcels, &machine, time_scale, content);
    Ok(Round {
        number: input.round_number,
        decision: input.decision.clone(),
        result,
        parcels,
    })
}

fn validate(input: &AdvanceInput<'_>) -> Result<(), EngineError> {
    if input.total_rounds == 0 {
        return Err(EngineError::InvalidLength);
    }
    if input.decision.crops.len() != PARCEL_COUNT {
        return Err(EngineError::InvalidDecision(format!(
            "expected {} parcel assignments, got {}",
            PARCEL_COUNT,
            input.decision.crops.len()
        )));
    }
    if input.decision.machine_investment > MACHINE_INVEST_MAX {
        return Err(EngineError::InvalidDecision(format!(
            "machine investment {} exceeds level {}",
            input.decision.machine_investment, MACHINE_INVEST_MAX
        )));
    }
    Ok(())
}

fn machine_effects(prev_real: f64, investment: u8, content: &GameContent) -> MachineEffects {
    let decay_rate = MACHINE_BASE_DECAY + (prev_real / MACHINE_MAX) * MACHINE_DECAY_SLOPE;
    let real = (prev_real - prev_real * decay_rate + f64::from(investment) * MACHINE_INVEST_STEP)
        .clamp(0.0, MACHINE_MAX);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to [0, 4]
    let level = real.round() as u8;
    let def = content.machine(level);
    MachineEffects {
        real,
        level,
        yield_bonus: def.map_or(0.0, |d| d.yield_bonus),
        soil_impact: def.map_or(0.0, |d| d.soil_impact),
    }
}

// ---------------------------------------------------------------------------
// Per-parcel pipeline
// ---------------------------------------------------------------------------

fn advance_parcel(
    prev: &Parcel,
    decision: &RoundDecision,
    events: &EnvEvents,
    machine: &MachineEffects,
    grass_count: usize,
    time_scale: f64,
    content: &GameContent,
) -> Parcel {
    let c = &content.constants;
    let crop = decision.crops[prev.index];

    let factor = soil_factor(prev, crop, decision, events, machine.soil_impact, time_scale, content);
    let new_soil = prev.soil * (1.0 + factor);

    let mut nutrients = nutrient_update(prev, crop, new_soil, decision, grass_count, content);

    // Yield effects read the incoming state (the conditions the crop grew
    // in); new_soil/nutrients become next round's state.
    let raw_yield = parcel_yield(prev, crop, decision, events, machine.yield_bonus, content);
    if let Some(def) = content.crop(crop) {
        if def.base_yield > 0.0 {
            // Higher realized yield extracts proportionally more nutrient.
            nutrients -= (raw_yield / def.base_yield) * c.base_decline * c.start_nutrients;
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // ≥ 0 after max
    let harvest = raw_yield.round().max(0.0) as u32;
    Parcel {
        index: prev.index,
        crop,
        soil: new_soil.round().clamp(0.0, c.soil_max),
        nutrients: nutrients.round().clamp(0.0, c.nutrient_max),
        harvest,
    }
}

fn soil_factor(
    prev: &Parcel,
    crop: Crop,
    decision: &RoundDecision,
    events: &EnvEvents,
    machine_soil: f64,
    time_scale: f64,
    content: &GameContent,
) -> f64 {
    let c = &content.constants;

    // Terms that represent gradual ecological change scale linearly with the
    // per-round time factor.
    let mut linear = content.crop(crop).map_or(0.0, |def| def.soil_impact);
    if crop == Crop::Fallow {
        linear += c.fallow_recovery_rate * ((c.start_soil - prev.soil).max(0.0) / c.start_soil);
    }
    linear += match content.rotation_quality(prev.crop, crop) {
        RotationQuality::Good => c.rotation_good_bonus,
        RotationQuality::Ok => 0.0,
        RotationQuality::Bad => -c.rotation_bad_penalty,
    };
    if prev.crop == crop && !crop.is_cover() {
        linear -= c.monoculture_penalty;
    }
    let mut factor = linear * time_scale;

    let chem_scale = time_scale.powf(0.7);
    if decision.fertilizer {
        factor -= c.fertilizer_soil_cost * chem_scale;
    }
    if decision.pesticide {
        factor -= c.pesticide_soil_cost * chem_scale;
    }
    factor -= machine_soil * time_scale.powf(0.5);

    if let Some(weather) = c.weather_def(events.weather) {
        factor -= weather.soil_impact;
    }
    // Both penalties deliberately read the previous round's nutrient level,
    // not the one computed later this round.
    if prev.nutrients > c.overfert_threshold {
        factor -= c.overfert_penalty;
    }
    if decision.fertilizer && prev.nutrients > c.burn_threshold {
        factor -= c.burn_penalty;
    }
    if decision.organisms {
        factor += c.organism_soil_bonus;
    }
    factor
}

fn nutrient_update(
    prev: &Parcel,
    crop: Crop,
    new_soil: f64,
    decision: &RoundDecision,
    grass_count: usize,
    content: &GameContent,
) -> f64 {
    let c = &content.constants;
    if crop.is_cover() {
        // Stabilizing drift toward the start level, not a zero dynamic.
        return if prev.nutrients < c.start_nutrients {
            prev.nutrients + c.cover_drift_flat
        } else {
            prev.nutrients * 0.9 + c.start_nutrients * 0.1
        };
    }
    let mut gain = 0.0;
    if decision.fertilizer {
        gain += c.fertilizer_nutrient_gain;
    }
    if decision.organic {
        let grass_fraction = grass_count as f64 / PARCEL_COUNT as f64;
        let ratio = (grass_fraction / c.required_grass_ratio).min(1.0);
        gain += ratio * c.animal_nutrient_gain;
    }
    if crop == Crop::Fieldbean {
        gain += c.fieldbean_nutrient_bonus;
    }
    // Uptake is soil-quality-gated, on the soil value just computed.
    let efficiency = (new_soil / c.start_soil).clamp(0.2, 1.2);
    prev.nutrients + gain * efficiency
}

fn parcel_yield(
    prev: &Parcel,
    crop: Crop,
    decision: &RoundDecision,
    events: &EnvEvents,
    machine_bonus: f64,
    content: &GameContent,
) -> f64 {
    if crop.is_cover() {
        return 0.0;
    }
    let Some(def) = content.crop(crop) else {
        // A crop with no configuration entry yields nothing.
        return 0.0;
    };
    let c = &content.constants;
    let soil_effect = (prev.soil.max(0.0) / c.start_soil).powf(def.soil_sensitivity);
    let nutrition_effect =
        (prev.nutrients.max(0.0) / c.start_nutrients).powf(def.nutrient_sensitivity);
    let organic_factor = if decision.organic {
        c.organic_yield_factor
    } else {
        1.0
    };
    def.base_yield
        * soil_effect
        * nutrition_effect
        * weather_effect(def, events.weather, c)
        * pest_effect(def, decision, events, c)
        * (1.0 + machine_bonus)
        * organic_factor
}

fn weather_effect(def: &CropDef, weather: Weather, c: &Constants) -> f64 {
    let Some(w) = c.weather_def(weather) else {
        return 1.0;
    };
    if w.yield_factor >= 1.0 {
        return 1.0;
    }
    let penalty = (1.0 - w.yield_factor) * def.weather.for_weather(weather).multiplier();
    (1.0 - penalty).max(0.0)
}

fn pest_effect(
    def: &CropDef,
    decision: &RoundDecision,
    events: &EnvEvents,
    c: &Constants,
) -> f64 {
    let Some(pest) = def.pest else {
        return 1.0;
    };
    if !events.pests.contains(&pest) {
        return 1.0;
    }
    let mut penalty = c.pest_penalty;
    if decision.organic {
        penalty *= c.organic_pest_amplifier;
    }
    if decision.pesticide {
        penalty = penalty.min(c.pest_cap_pesticide);
    } else if decision.organisms {
        penalty = penalty.min(c.pest_cap_organisms);
    }
    1.0 - penalty
}

// ---------------------------------------------------------------------------
// Financial aggregation (whole game, not per parcel)
// ---------------------------------------------------------------------------

fn financials(
    input: &AdvanceInput<'_>,
    parcels: &[Parcel],
    machine: &MachineEffects,
    time_scale: f64,
    content: &GameContent,
) -> RoundResult {
    let c = &content.constants;
    let decision = input.decision;
    let organic_certified = decision.organic && !decision.fertilizer && !decision.pesticide;

    let seed: f64 = parcels
        .iter()
        .filter(|p| p.crop != Crop::Fallow)
        .filter_map(|p| content.crop(p.crop))
        .map(|def| {
            if decision.organic {
                def.seed_cost_organic
            } else {
                def.seed_cost
            }
        })
        .sum();
    let investment = content
        .machine(decision.machine_investment)
        .map_or(0.0, |d| d.investment)
        * time_scale;
    let maintenance = content.machine(machine.level).map_or(0.0, |d| d.maintenance);
    let running = running_costs(decision, parcels, input.events, c);
    let expenses = Expenses {
        seed,
        labor: c.personnel_cost,
        running,
        maintenance,
        investment,
    };

    let subsidies = c.subsidy_per_parcel * PARCEL_COUNT as f64
        + if organic_certified {
            c.organic_subsidy_bonus
        } else {
            0.0
        };

    let mut harvest: BTreeMap<Crop, u32> = BTreeMap::new();
    for parcel in parcels {
        if parcel.harvest > 0 {
            *harvest.entry(parcel.crop).or_insert(0) += parcel.harvest;
        }
    }
    let (income, prices) = income_for(&harvest, input, organic_certified, content);

    let profit = income + subsidies - expenses.total();
    RoundResult {
        profit,
        capital: input.capital + profit,
        harvest,
        prices,
        income,
        subsidies,
        expenses,
        events: input.events.clone(),
        organic_certified,
        machine_real_level: machine.real,
        machine_level: machine.level,
    }
}

fn running_costs(
    decision: &RoundDecision,
    parcels: &[Parcel],
    events: &EnvEvents,
    c: &Constants,
) -> f64 {
    let n = PARCEL_COUNT as f64;
    let mut running = 0.0;
    if decision.organic {
        running += c.organic_control_fee;
    }
    if decision.fertilizer {
        running += c.fertilizer_cost_per_parcel * n;
    }
    if decision.pesticide {
        running += c.pesticide_cost_per_parcel * n;
    }
    if decision.organisms {
        running += c.organism_cost_per_parcel * n;
    }
    let grass_count = parcels.iter().filter(|p| p.crop == Crop::Grass).count();
    let disease_factor = if events.pests.contains(&Pest::LivestockDisease) {
        2.0
    } else {
        1.0
    };
    running + c.animal_cost_per_grass_parcel * grass_count as f64 * disease_factor
}

fn income_for(
    harvest: &BTreeMap<Crop, u32>,
    input: &AdvanceInput<'_>,
    organic_certified: bool,
    content: &GameContent,
) -> (f64, BTreeMap<Crop, f64>) {
    let c = &content.constants;
    let mut income = 0.0;
    let mut prices = BTreeMap::new();
    for (&crop, &amount) in harvest {
        let Some(def) = content.crop(crop) else {
            continue;
        };
        let declared = if organic_certified {
            def.value_organic
        } else {
            def.value
        };
        // Price-fixing locks in the declared value at a fee; otherwise the
        // live market table wins when one is supplied.
        let price = if input.decision.fixed_prices.contains(&crop) {
            declared * (1.0 - c.price_fixing_fee)
        } else {
            input
                .market_prices
                .and_then(|m| m.get(&crop))
                .copied()
                .unwrap_or(declared)
        };
        prices.insert(crop, price);
        income += f64::from(amount) * price;
    }
    (income, prices)
}

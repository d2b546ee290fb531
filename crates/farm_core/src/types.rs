//! Type definitions for `farm_core`.
//!
//! Persisted state (Game, PlayerState, Round, Parcel), decision/result
//! shapes, and the content-definition types the engine reads its rules from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fixed number of land units per participant.
pub const PARCEL_COUNT: usize = 40;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub String);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(GameId);
string_id!(PlayerId);

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Crop {
    Fallow,
    Grass,
    Wheat,
    Barley,
    Oat,
    Potato,
    Beet,
    Corn,
    Fieldbean,
}

impl Crop {
    /// Fallow and grass carry no harvest and follow the cover-dynamics path.
    pub fn is_cover(self) -> bool {
        matches!(self, Crop::Fallow | Crop::Grass)
    }
}

impl std::fmt::Display for Crop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Crop::Fallow => "Fallow",
            Crop::Grass => "Grass",
            Crop::Wheat => "Wheat",
            Crop::Barley => "Barley",
            Crop::Oat => "Oat",
            Crop::Potato => "Potato",
            Crop::Beet => "Beet",
            Crop::Corn => "Corn",
            Crop::Fieldbean => "Fieldbean",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Weather {
    Normal,
    Drought,
    Cold,
    Flood,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Pest {
    FritFly,
    PotatoBeetle,
    CornBorer,
    Aphid,
    Nematode,
    /// Does not attack any crop; doubles animal maintenance while active.
    LivestockDisease,
}

/// Per-crop response tier to an adverse weather category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeatherSensitivity {
    Strong,
    Moderate,
    Low,
    None,
}

impl WeatherSensitivity {
    /// Scales the weather category's base yield penalty.
    pub fn multiplier(self) -> f64 {
        match self {
            WeatherSensitivity::Strong => 1.5,
            WeatherSensitivity::Moderate => 1.0,
            WeatherSensitivity::Low => 0.5,
            WeatherSensitivity::None => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkillTier {
    Elementary,
    Middle,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    Waiting,
    InProgress,
    Finished,
    Deleted,
    Expired,
}

// ---------------------------------------------------------------------------
// Environmental events
// ---------------------------------------------------------------------------

/// One round's drawn environment: a single weather category and zero or more
/// simultaneous pest events. Drawn by the caller, consumed by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvEvents {
    pub weather: Weather,
    pub pests: Vec<Pest>,
}

impl EnvEvents {
    pub fn calm() -> Self {
        Self {
            weather: Weather::Normal,
            pests: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Round state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub index: usize,
    pub crop: Crop,
    /// Clamped to [0, soil_max] after each round.
    pub soil: f64,
    /// Clamped to [0, nutrient_max] after each round.
    pub nutrients: f64,
    /// Harvest of the round that produced this snapshot, in decitonnes.
    pub harvest: u32,
}

/// One participant's choices for the upcoming round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundDecision {
    /// Machine investment level, 0–4.
    pub machine_investment: u8,
    pub fertilizer: bool,
    pub pesticide: bool,
    pub organisms: bool,
    pub organic: bool,
    /// Crop assignment per parcel index; length must equal `PARCEL_COUNT`.
    pub crops: Vec<Crop>,
    /// Per-crop price-fixing elections.
    pub fixed_prices: Vec<Crop>,
}

impl RoundDecision {
    /// All parcels fallow, no inputs. The round-0 placeholder decision.
    pub fn all_fallow() -> Self {
        Self {
            machine_investment: 0,
            fertilizer: false,
            pesticide: false,
            organisms: false,
            organic: false,
            crops: vec![Crop::Fallow; PARCEL_COUNT],
            fixed_prices: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expenses {
    pub seed: f64,
    pub labor: f64,
    pub running: f64,
    pub maintenance: f64,
    pub investment: f64,
}

impl Expenses {
    pub fn total(&self) -> f64 {
        self.seed + self.labor + self.running + self.maintenance + self.investment
    }

    pub fn zero() -> Self {
        Self {
            seed: 0.0,
            labor: 0.0,
            running: 0.0,
            maintenance: 0.0,
            investment: 0.0,
        }
    }
}

/// Financial and ecological outcome of one applied decision. Never mutated
/// after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResult {
    pub profit: f64,
    pub capital: f64,
    pub harvest: BTreeMap<Crop, u32>,
    /// Prices actually applied per harvested crop.
    pub prices: BTreeMap<Crop, f64>,
    pub income: f64,
    pub subsidies: f64,
    pub expenses: Expenses,
    pub events: EnvEvents,
    /// Retained only when farming organically without synthetic inputs.
    pub organic_certified: bool,
    /// Smoothed fractional mechanization carried into the next round.
    pub machine_real_level: f64,
    /// Integer level used for yield/soil lookups this round.
    pub machine_level: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub number: u32,
    pub decision: RoundDecision,
    pub result: RoundResult,
    pub parcels: Vec<Parcel>,
}

impl Round {
    /// Synthetic round 0: all parcels fallow at start soil/nutrients, start
    /// capital, no events. Created once at game creation, never recomputed.
    pub fn initial(content: &GameContent) -> Self {
        let c = &content.constants;
        Self {
            number: 0,
            decision: RoundDecision::all_fallow(),
            result: RoundResult {
                profit: 0.0,
                capital: c.start_capital,
                harvest: BTreeMap::new(),
                prices: BTreeMap::new(),
                income: 0.0,
                subsidies: 0.0,
                expenses: Expenses::zero(),
                events: EnvEvents::calm(),
                organic_certified: false,
                machine_real_level: 0.0,
                machine_level: 0,
            },
            parcels: fresh_parcels(content),
        }
    }
}

/// 40 fallow parcels at start soil and nutrients.
pub fn fresh_parcels(content: &GameContent) -> Vec<Parcel> {
    let c = &content.constants;
    (0..PARCEL_COUNT)
        .map(|index| Parcel {
            index,
            crop: Crop::Fallow,
            soil: c.start_soil,
            nutrients: c.start_nutrients,
            harvest: 0,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Game state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerState {
    pub id: PlayerId,
    pub is_ai: bool,
    /// AI skill tier; `None` for human participants.
    pub skill: Option<SkillTier>,
    pub capital: f64,
    pub current_round: u32,
    /// Round number this participant last submitted a decision for.
    pub submitted_round: Option<u32>,
    pub pending_decision: Option<RoundDecision>,
    /// Append-only; `history.len() == current_round + 1` at all times.
    pub history: Vec<Round>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSettings {
    /// Number of playable rounds (rounds 1..=total_rounds).
    pub total_rounds: u32,
    /// Submission window per round; lapsed rounds are advanced by the sweep.
    pub round_deadline_secs: u64,
    pub player_label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub num_players: u32,
    pub num_ai: u32,
    pub ai_skill: SkillTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub status: GameStatus,
    /// Seed for per-round environmental draws; round seeds derive from it.
    pub seed: u64,
    /// Authoritative round pointer; increases by exactly 1 per advancement.
    pub current_round: u32,
    /// Unix-seconds deadline for the current round, if one is armed.
    pub round_deadline_unix: Option<u64>,
    pub settings: GameSettings,
    pub config: GameConfig,
    pub players: BTreeMap<PlayerId, PlayerState>,
}

impl Game {
    /// True when every human participant has a submission for `current_round`.
    /// AI participants are excluded from the gate and filled in at advancement.
    pub fn all_humans_submitted(&self) -> bool {
        self.players
            .values()
            .filter(|p| !p.is_ai)
            .all(|p| p.submitted_round == Some(self.current_round))
    }
}

// ---------------------------------------------------------------------------
// Content types
// ---------------------------------------------------------------------------

/// Response tiers for the three adverse weather categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeatherProfile {
    pub drought: WeatherSensitivity,
    pub cold: WeatherSensitivity,
    pub flood: WeatherSensitivity,
}

impl WeatherProfile {
    pub fn for_weather(self, weather: Weather) -> WeatherSensitivity {
        match weather {
            Weather::Normal => WeatherSensitivity::None,
            Weather::Drought => self.drought,
            Weather::Cold => self.cold,
            Weather::Flood => self.flood,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropDef {
    pub crop: Crop,
    pub name: String,
    /// Harvest in decitonnes per parcel at neutral soil/nutrients.
    pub base_yield: f64,
    /// Power-law exponent of the soil response.
    pub soil_sensitivity: f64,
    /// Power-law exponent of the nutrient response.
    pub nutrient_sensitivity: f64,
    pub weather: WeatherProfile,
    pub pest: Option<Pest>,
    pub seed_cost: f64,
    pub seed_cost_organic: f64,
    /// Declared market value per decitonne, conventional.
    pub value: f64,
    pub value_organic: f64,
    /// Fixed additive soil gain/loss coefficient per round.
    pub soil_impact: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationQuality {
    Good,
    Ok,
    Bad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotationRule {
    pub prev: Crop,
    pub next: Crop,
    pub quality: RotationQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineLevelDef {
    pub level: u8,
    pub yield_bonus: f64,
    pub soil_impact: f64,
    /// Flat recurring cost per round; not scaled by game length.
    pub maintenance: f64,
    /// One-off cost, amortized: scaled by `default_rounds / total_rounds`.
    pub investment: f64,
}

/// Yield factor and soil impact of one adverse weather category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeatherDef {
    pub yield_factor: f64,
    pub soil_impact: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constants {
    pub default_rounds: u32,
    pub start_capital: f64,
    pub start_soil: f64,
    pub soil_max: f64,
    pub start_nutrients: f64,
    pub nutrient_max: f64,
    /// Nutrient extraction per unit of relative yield.
    pub base_decline: f64,
    pub fallow_recovery_rate: f64,
    pub rotation_good_bonus: f64,
    pub rotation_bad_penalty: f64,
    pub monoculture_penalty: f64,
    pub fertilizer_soil_cost: f64,
    pub pesticide_soil_cost: f64,
    pub organism_soil_bonus: f64,
    /// Incoming nutrient level above which the over-fertilization penalty fires.
    pub overfert_threshold: f64,
    pub overfert_penalty: f64,
    /// Incoming nutrient level above which synthetic fertilizer burns soil.
    pub burn_threshold: f64,
    pub burn_penalty: f64,
    /// Flat nutrient drift for cover parcels already below start level.
    pub cover_drift_flat: f64,
    pub fertilizer_nutrient_gain: f64,
    pub animal_nutrient_gain: f64,
    /// Grass fraction at which the animal nutrient term reaches full strength.
    pub required_grass_ratio: f64,
    pub fieldbean_nutrient_bonus: f64,
    pub organic_yield_factor: f64,
    pub pest_penalty: f64,
    pub pest_cap_pesticide: f64,
    pub pest_cap_organisms: f64,
    pub organic_pest_amplifier: f64,
    pub weather_drought: WeatherDef,
    pub weather_cold: WeatherDef,
    pub weather_flood: WeatherDef,
    pub personnel_cost: f64,
    pub fertilizer_cost_per_parcel: f64,
    pub pesticide_cost_per_parcel: f64,
    pub organism_cost_per_parcel: f64,
    pub animal_cost_per_grass_parcel: f64,
    pub organic_control_fee: f64,
    pub subsidy_per_parcel: f64,
    pub organic_subsidy_bonus: f64,
    pub price_fixing_fee: f64,
    // Environmental draw bands.
    pub p_drought: f64,
    pub p_cold: f64,
    pub p_flood: f64,
    pub pest_probability: f64,
    pub p_livestock_disease: f64,
    /// Live market price half-band around the declared value.
    pub market_swing: f64,
    // Decision Agent policy knobs.
    pub agent_fertilizer_probability: f64,
    pub agent_pesticide_probability: f64,
    /// Average soil above which the High tier farms organically.
    pub agent_organic_soil_threshold: f64,
    /// Average soil above which (but below the organic threshold) the High
    /// tier intensifies mechanization.
    pub agent_good_soil_threshold: f64,
    pub agent_critical_soil: f64,
    pub agent_critical_nutrients: f64,
    /// Leading parcels reserved for grass when the High tier farms organically.
    pub agent_grass_parcels: usize,
}

impl Constants {
    pub fn weather_def(&self, weather: Weather) -> Option<WeatherDef> {
        match weather {
            Weather::Normal => None,
            Weather::Drought => Some(self.weather_drought),
            Weather::Cold => Some(self.weather_cold),
            Weather::Flood => Some(self.weather_flood),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameContent {
    pub content_version: String,
    pub crops: Vec<CropDef>,
    /// Sequence-quality rules; unlisted pairs default to `Ok` (no effect).
    pub rotation: Vec<RotationRule>,
    pub machine_levels: Vec<MachineLevelDef>,
    /// Crops the Decision Agent draws from when not forced otherwise.
    pub main_crops: Vec<Crop>,
    pub constants: Constants,
}

impl GameContent {
    /// Crop configuration lookup. A missing entry means zero yield and zero
    /// cost downstream.
    pub fn crop(&self, crop: Crop) -> Option<&CropDef> {
        self.crops.iter().find(|def| def.crop == crop)
    }

    pub fn machine(&self, level: u8) -> Option<&MachineLevelDef> {
        self.machine_levels.iter().find(|def| def.level == level)
    }

    pub fn rotation_quality(&self, prev: Crop, next: Crop) -> RotationQuality {
        self.rotation
            .iter()
            .find(|rule| rule.prev == prev && rule.next == next)
            .map_or(RotationQuality::Ok, |rule| rule.quality)
    }

    /// "Good" successors of `prev` in declared matrix order, excluding cover
    /// crops. Declared order is behaviorally observable; do not sort.
    pub fn good_successors(&self, prev: Crop) -> Vec<Crop> {
        self.rotation
            .iter()
            .filter(|rule| {
                rule.prev == prev
                    && rule.quality == RotationQuality::Good
                    && !rule.next.is_cover()
            })
            .map(|rule| rule.next)
            .collect()
    }
}

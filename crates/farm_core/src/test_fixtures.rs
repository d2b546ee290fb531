//! Shared test fixtures for farm_core and downstream crates.
//!
//! `base_content()` provides a full-featured `GameContent` (all nine crops,
//! rotation matrix, machine tables) with deterministic constants suitable for
//! integration-level tests.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    Constants, Crop, CropDef, GameContent, MachineLevelDef, Pest, RotationQuality, RotationRule,
    WeatherDef, WeatherProfile, WeatherSensitivity,
};

fn crop_def(
    crop: Crop,
    base_yield: f64,
    sensitivities: (f64, f64),
    weather: WeatherProfile,
    pest: Option<Pest>,
    seed: (f64, f64),
    value: (f64, f64),
    soil_impact: f64,
) -> CropDef {
    CropDef {
        crop,
        name: crop.to_string(),
        base_yield,
        soil_sensitivity: sensitivities.0,
        nutrient_sensitivity: sensitivities.1,
        weather,
        pest,
        seed_cost: seed.0,
        seed_cost_organic: seed.1,
        value: value.0,
        value_organic: value.1,
        soil_impact,
    }
}

fn profile(
    drought: WeatherSensitivity,
    cold: WeatherSensitivity,
    flood: WeatherSensitivity,
) -> WeatherProfile {
    WeatherProfile {
        drought,
        cold,
        flood,
    }
}

fn rule(prev: Crop, next: Crop, quality: RotationQuality) -> RotationRule {
    RotationRule {
        prev,
        next,
        quality,
    }
}

/// Full-featured content with the standard agronomic tables.
pub fn base_content() -> GameContent {
    use RotationQuality::{Bad, Good, Ok};
    use WeatherSensitivity::{Low, Moderate, None as Insensitive, Strong};

    GameContent {
        content_version: "test".to_string(),
        crops: vec![
            crop_def(
                Crop::Fallow,
                0.0,
                (0.0, 0.0),
                profile(Insensitive, Insensitive, Insensitive),
                None,
                (0.0, 0.0),
                (0.0, 0.0),
                0.0,
            ),
            crop_def(
                Crop::Grass,
                0.0,
                (0.0, 0.0),
                profile(Insensitive, Insensitive, Insensitive),
                None,
                (20.0, 25.0),
                (0.0, 0.0),
                0.02,
            ),
            crop_def(
                Crop::Wheat,
                85.0,
                (0.8, 0.9),
                profile(Moderate, Low, Moderate),
                Some(Pest::Aphid),
                (60.0, 90.0),
                (18.0, 32.0),
                -0.010,
            ),
            crop_def(
                Crop::Barley,
                70.0,
                (0.7, 0.8),
                profile(Low, Moderate, Moderate),
                Some(Pest::FritFly),
                (55.0, 85.0),
                (17.0, 30.0),
                -0.010,
            ),
            crop_def(
                Crop::Oat,
                60.0,
                (0.6, 0.7),
                profile(Low, Low, Moderate),
                Some(Pest::FritFly),
                (50.0, 75.0),
                (16.0, 28.0),
                -0.005,
            ),
            crop_def(
                Crop::Potato,
                320.0,
                (1.0, 1.1),
                profile(Moderate, Strong, Strong),
                Some(Pest::PotatoBeetle),
                (140.0, 210.0),
                (8.0, 14.0),
                -0.020,
            ),
            crop_def(
                Crop::Beet,
                450.0,
                (1.1, 1.2),
                profile(Moderate, Moderate, Strong),
                Some(Pest::Nematode),
                (130.0, 195.0),
                (6.0, 11.0),
                -0.025,
            ),
            crop_def(
                Crop::Corn,
                90.0,
                (0.9, 1.0),
                profile(Strong, Strong, Moderate),
                Some(Pest::CornBorer),
                (65.0, 100.0),
                (17.0, 30.0),
                -0.015,
            ),
            crop_def(
                Crop::Fieldbean,
                40.0,
                (0.5, 0.3),
                profile(Moderate, Moderate, Moderate),
                None,
                (45.0, 70.0),
                (20.0, 34.0),
                0.015,
            ),
        ],
        rotation: vec![
            rule(Crop::Fallow, Crop::Wheat, Good),
            rule(Crop::Fallow, Crop::Potato, Good),
            rule(Crop::Fallow, Crop::Beet, Good),
            rule(Crop::Grass, Crop::Wheat, Good),
            rule(Crop::Grass, Crop::Potato, Good),
            rule(Crop::Fieldbean, Crop::Wheat, Good),
            rule(Crop::Fieldbean, Crop::Corn, Good),
            rule(Crop::Potato, Crop::Wheat, Good),
            rule(Crop::Beet, Crop::Wheat, Good),
            rule(Crop::Wheat, Crop::Potato, Good),
            rule(Crop::Wheat, Crop::Fieldbean, Good),
            rule(Crop::Barley, Crop::Potato, Good),
            rule(Crop::Oat, Crop::Wheat, Good),
            rule(Crop::Corn, Crop::Wheat, Good),
            rule(Crop::Wheat, Crop::Barley, Ok),
            rule(Crop::Beet, Crop::Potato, Bad),
            rule(Crop::Potato, Crop::Beet, Bad),
        ],
        machine_levels: vec![
            MachineLevelDef {
                level: 0,
                yield_bonus: 0.0,
                soil_impact: 0.0,
                maintenance: 0.0,
                investment: 0.0,
            },
            MachineLevelDef {
                level: 1,
                yield_bonus: 0.05,
                soil_impact: 0.005,
                maintenance: 150.0,
                investment: 1200.0,
            },
            MachineLevelDef {
                level: 2,
                yield_bonus: 0.10,
                soil_impact: 0.010,
                maintenance: 300.0,
                investment: 2600.0,
            },
            MachineLevelDef {
                level: 3,
                yield_bonus: 0.15,
                soil_impact: 0.018,
                maintenance: 500.0,
                investment: 4200.0,
            },
            MachineLevelDef {
                level: 4,
                yield_bonus: 0.20,
                soil_impact: 0.028,
                maintenance: 750.0,
                investment: 6000.0,
            },
        ],
        main_crops: vec![
            Crop::Wheat,
            Crop::Barley,
            Crop::Oat,
            Crop::Potato,
            Crop::Beet,
            Crop::Corn,
        ],
        constants: base_constants(),
    }
}

pub fn base_constants() -> Constants {
    Constants {
        default_rounds: 12,
        start_capital: 10_000.0,
        start_soil: 80.0,
        soil_max: 300.0,
        start_nutrients: 80.0,
        nutrient_max: 160.0,
        base_decline: 0.18,
        fallow_recovery_rate: 0.10,
        rotation_good_bonus: 0.03,
        rotation_bad_penalty: 0.04,
        monoculture_penalty: 0.05,
        fertilizer_soil_cost: 0.015,
        pesticide_soil_cost: 0.010,
        organism_soil_bonus: 0.005,
        overfert_threshold: 120.0,
        overfert_penalty: 0.02,
        burn_threshold: 140.0,
        burn_penalty: 0.03,
        cover_drift_flat: 5.0,
        fertilizer_nutrient_gain: 25.0,
        animal_nutrient_gain: 20.0,
        required_grass_ratio: 0.2,
        fieldbean_nutrient_bonus: 10.0,
        organic_yield_factor: 0.4,
        pest_penalty: 0.30,
        pest_cap_pesticide: 0.05,
        pest_cap_organisms: 0.15,
        organic_pest_amplifier: 1.2,
        weather_drought: WeatherDef {
            yield_factor: 0.75,
            soil_impact: 0.020,
        },
        weather_cold: WeatherDef {
            yield_factor: 0.85,
            soil_impact: 0.0,
        },
        weather_flood: WeatherDef {
            yield_factor: 0.80,
            soil_impact: 0.035,
        },
        personnel_cost: 900.0,
        fertilizer_cost_per_parcel: 12.0,
        pesticide_cost_per_parcel: 10.0,
        organism_cost_per_parcel: 14.0,
        animal_cost_per_grass_parcel: 60.0,
        organic_control_fee: 120.0,
        subsidy_per_parcel: 30.0,
        organic_subsidy_bonus: 400.0,
        price_fixing_fee: 0.05,
        p_drought: 0.15,
        p_cold: 0.15,
        p_flood: 0.15,
        pest_probability: 0.08,
        p_livestock_disease: 0.05,
        market_swing: 0.15,
        agent_fertilizer_probability: 0.5,
        agent_pesticide_probability: 0.3,
        agent_organic_soil_threshold: 95.0,
        agent_good_soil_threshold: 85.0,
        agent_critical_soil: 55.0,
        agent_critical_nutrients: 40.0,
        agent_grass_parcels: 8,
    }
}

/// Deterministic RNG seeded with 42.
pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

//! Configuration tables shared between farm_cli and farm_daemon.
//!
//! `standard_content()` is the built-in, versioned table set; `load_content`
//! reads an overriding set from a JSON directory. Both run `validate_content`,
//! which panics on authoring errors.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use farm_core::{
    Constants, Crop, CropDef, GameContent, MachineLevelDef, Pest, RotationQuality, RotationRule,
    WeatherDef, WeatherProfile, WeatherSensitivity,
};

#[derive(Deserialize)]
struct CropsFile {
    content_version: String,
    crops: Vec<CropDef>,
    main_crops: Vec<Crop>,
}

#[derive(Deserialize)]
struct RotationFile {
    rules: Vec<RotationRule>,
}

#[derive(Deserialize)]
struct MachinesFile {
    levels: Vec<MachineLevelDef>,
}

/// Validates cross-references in loaded content, panicking on any authoring
/// error.
///
/// Catches mistakes like: a rotation rule naming a crop with no table entry,
/// a missing machine level, or a cover crop listed as a main crop.
pub fn validate_content(content: &GameContent) {
    let has_crop = |crop: Crop| content.crops.iter().any(|def| def.crop == crop);

    for rule in &content.rotation {
        assert!(
            has_crop(rule.prev),
            "rotation rule references crop '{}' with no table entry",
            rule.prev,
        );
        assert!(
            has_crop(rule.next),
            "rotation rule references crop '{}' with no table entry",
            rule.next,
        );
    }

    for level in 0..=4u8 {
        assert!(
            content.machine_levels.iter().any(|def| def.level == level),
            "machine table is missing level {level}",
        );
    }

    for &crop in &content.main_crops {
        assert!(has_crop(crop), "main crop '{crop}' has no table entry");
        assert!(!crop.is_cover(), "main crop '{crop}' must not be a cover crop");
    }

    let c = &content.constants;
    assert!(c.default_rounds >= 1, "default_rounds must be at least 1");
    assert!(
        c.p_drought + c.p_cold + c.p_flood <= 1.0,
        "adverse weather probabilities exceed 1.0",
    );
    assert!(
        c.required_grass_ratio > 0.0,
        "required_grass_ratio must be positive",
    );
    assert!(
        c.agent_grass_parcels <= farm_core::PARCEL_COUNT,
        "agent_grass_parcels exceeds the parcel count",
    );
}

pub fn load_content(content_dir: &str) -> Result<GameContent> {
    let dir = Path::new(content_dir);
    let constants: Constants = serde_json::from_str(
        &std::fs::read_to_string(dir.join("constants.json")).context("reading constants.json")?,
    )
    .context("parsing constants.json")?;
    let crops_file: CropsFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("crops.json")).context("reading crops.json")?,
    )
    .context("parsing crops.json")?;
    let rotation_file: RotationFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("rotation.json")).context("reading rotation.json")?,
    )
    .context("parsing rotation.json")?;
    let machines_file: MachinesFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("machines.json")).context("reading machines.json")?,
    )
    .context("parsing machines.json")?;
    let content = GameContent {
        content_version: crops_file.content_version,
        crops: crops_file.crops,
        rotation: rotation_file.rules,
        machine_levels: machines_file.levels,
        main_crops: crops_file.main_crops,
        constants,
    };
    validate_content(&content);
    Ok(content)
}

// ---------------------------------------------------------------------------
// Built-in standard tables
// ---------------------------------------------------------------------------

struct CropRow {
    crop: Crop,
    base_yield: f64,
    soil_sensitivity: f64,
    nutrient_sensitivity: f64,
    weather: (WeatherSensitivity, WeatherSensitivity, WeatherSensitivity),
    pest: Option<Pest>,
    seed: (f64, f64),
    value: (f64, f64),
    soil_impact: f64,
}

#[rustfmt::skip]
fn crop_rows() -> Vec<CropRow> {
    use Crop::{Barley, Beet, Corn, Fallow, Fieldbean, Grass, Oat, Potato, Wheat};
    use WeatherSensitivity::{Low, Moderate, None as Insensitive, Strong};
    vec![
        CropRow { crop: Fallow,    base_yield: 0.0,   soil_sensitivity: 0.0, nutrient_sensitivity: 0.0, weather: (Insensitive, Insensitive, Insensitive), pest: None,                     seed: (0.0, 0.0),     value: (0.0, 0.0),   soil_impact: 0.0 },
        CropRow { crop: Grass,     base_yield: 0.0,   soil_sensitivity: 0.0, nutrient_sensitivity: 0.0, weather: (Insensitive, Insensitive, Insensitive), pest: None,                     seed: (20.0, 25.0),   value: (0.0, 0.0),   soil_impact: 0.02 },
        CropRow { crop: Wheat,     base_yield: 85.0,  soil_sensitivity: 0.8, nutrient_sensitivity: 0.9, weather: (Moderate, Low, Moderate),               pest: Some(Pest::Aphid),        seed: (60.0, 90.0),   value: (18.0, 32.0), soil_impact: -0.010 },
        CropRow { crop: Barley,    base_yield: 70.0,  soil_sensitivity: 0.7, nutrient_sensitivity: 0.8, weather: (Low, Moderate, Moderate),               pest: Some(Pest::FritFly),      seed: (55.0, 85.0),   value: (17.0, 30.0), soil_impact: -0.010 },
        CropRow { crop: Oat,       base_yield: 60.0,  soil_sensitivity: 0.6, nutrient_sensitivity: 0.7, weather: (Low, Low, Moderate),                    pest: Some(Pest::FritFly),      seed: (50.0, 75.0),   value: (16.0, 28.0), soil_impact: -0.005 },
        CropRow { crop: Potato,    base_yield: 320.0, soil_sensitivity: 1.0, nutrient_sensitivity: 1.1, weather: (Moderate, Strong, Strong),              pest: Some(Pest::PotatoBeetle), seed: (140.0, 210.0), value: (8.0, 14.0),  soil_impact: -0.020 },
        CropRow { crop: Beet,      base_yield: 450.0, soil_sensitivity: 1.1, nutrient_sensitivity: 1.2, weather: (Moderate, Moderate, Strong),            pest: Some(Pest::Nematode),     seed: (130.0, 195.0), value: (6.0, 11.0),  soil_impact: -0.025 },
        CropRow { crop: Corn,      base_yield: 90.0,  soil_sensitivity: 0.9, nutrient_sensitivity: 1.0, weather: (Strong, Strong, Moderate),              pest: Some(Pest::CornBorer),    seed: (65.0, 100.0),  value: (17.0, 30.0), soil_impact: -0.015 },
        CropRow { crop: Fieldbean, base_yield: 40.0,  soil_sensitivity: 0.5, nutrient_sensitivity: 0.3, weather: (Moderate, Moderate, Moderate),          pest: None,                     seed: (45.0, 70.0),   value: (20.0, 34.0), soil_impact: 0.015 },
    ]
}

#[rustfmt::skip]
fn rotation_rules() -> Vec<RotationRule> {
    use Crop::{Barley, Beet, Corn, Fallow, Fieldbean, Grass, Oat, Potato, Wheat};
    use RotationQuality::{Bad, Good, Ok};
    // Declared order is observable: the Middle agent tier picks the first
    // "good" successor in this order.
    vec![
        RotationRule { prev: Fallow,    next: Wheat,     quality: Good },
        RotationRule { prev: Fallow,    next: Potato,    quality: Good },
        RotationRule { prev: Fallow,    next: Beet,      quality: Good },
        RotationRule { prev: Grass,     next: Wheat,     quality: Good },
        RotationRule { prev: Grass,     next: Potato,    quality: Good },
        RotationRule { prev: Fieldbean, next: Wheat,     quality: Good },
        RotationRule { prev: Fieldbean, next: Corn,      quality: Good },
        RotationRule { prev: Potato,    next: Wheat,     quality: Good },
        RotationRule { prev: Beet,      next: Wheat,     quality: Good },
        RotationRule { prev: Wheat,     next: Potato,    quality: Good },
        RotationRule { prev: Wheat,     next: Fieldbean, quality: Good },
        RotationRule { prev: Barley,    next: Potato,    quality: Good },
        RotationRule { prev: Oat,       next: Wheat,     quality: Good },
        RotationRule { prev: Corn,      next: Wheat,     quality: Good },
        RotationRule { prev: Wheat,     next: Barley,    quality: Ok },
        RotationRule { prev: Beet,      next: Potato,    quality: Bad },
        RotationRule { prev: Potato,    next: Beet,      quality: Bad },
    ]
}

#[rustfmt::skip]
fn machine_table() -> Vec<MachineLevelDef> {
    vec![
        MachineLevelDef { level: 0, yield_bonus: 0.0,  soil_impact: 0.0,   maintenance: 0.0,   investment: 0.0 },
        MachineLevelDef { level: 1, yield_bonus: 0.05, soil_impact: 0.005, maintenance: 150.0, investment: 1200.0 },
        MachineLevelDef { level: 2, yield_bonus: 0.10, soil_impact: 0.010, maintenance: 300.0, investment: 2600.0 },
        MachineLevelDef { level: 3, yield_bonus: 0.15, soil_impact: 0.018, maintenance: 500.0, investment: 4200.0 },
        MachineLevelDef { level: 4, yield_bonus: 0.20, soil_impact: 0.028, maintenance: 750.0, investment: 6000.0 },
    ]
}

fn standard_constants() -> Constants {
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
        weather_drought: WeatherDef { yield_factor: 0.75, soil_impact: 0.020 },
        weather_cold: WeatherDef { yield_factor: 0.85, soil_impact: 0.0 },
        weather_flood: WeatherDef { yield_factor: 0.80, soil_impact: 0.035 },
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

/// The built-in standard table set.
pub fn standard_content() -> GameContent {
    let content = GameContent {
        content_version: "standard-1".to_string(),
        crops: crop_rows()
            .into_iter()
            .map(|row| CropDef {
                crop: row.crop,
                name: row.crop.to_string(),
                base_yield: row.base_yield,
                soil_sensitivity: row.soil_sensitivity,
                nutrient_sensitivity: row.nutrient_sensitivity,
                weather: WeatherProfile {
                    drought: row.weather.0,
                    cold: row.weather.1,
                    flood: row.weather.2,
                },
                pest: row.pest,
                seed_cost: row.seed.0,
                seed_cost_organic: row.seed.1,
                value: row.value.0,
                value_organic: row.value.1,
                soil_impact: row.soil_impact,
            })
            .collect(),
        rotation: rotation_rules(),
        machine_levels: machine_table(),
        main_crops: vec![
            Crop::Wheat,
            Crop::Barley,
            Crop::Oat,
            Crop::Potato,
            Crop::Beet,
            Crop::Corn,
        ],
        constants: standard_constants(),
    };
    validate_content(&content);
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn standard_content_passes_validation() {
        let content = standard_content();
        assert_eq!(content.machine_levels.len(), 5);
        assert!(content.crop(Crop::Wheat).is_some());
    }

    #[test]
    fn every_main_crop_is_harvestable() {
        let content = standard_content();
        for &crop in &content.main_crops {
            let def = content.crop(crop).unwrap();
            assert!(def.base_yield > 0.0, "main crop '{crop}' has no yield");
        }
    }

    #[test]
    fn every_harvestable_crop_has_a_declared_value() {
        let content = standard_content();
        for def in content.crops.iter().filter(|d| d.base_yield > 0.0) {
            assert!(def.value > 0.0, "crop '{}' has no market value", def.crop);
            assert!(
                def.value_organic > def.value,
                "organic value for '{}' should exceed conventional",
                def.crop
            );
        }
    }

    #[test]
    #[should_panic(expected = "missing level")]
    fn missing_machine_level_panics() {
        let mut content = standard_content();
        content.machine_levels.retain(|def| def.level != 3);
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "no table entry")]
    fn rotation_rule_for_unknown_crop_panics() {
        let mut content = standard_content();
        content.crops.retain(|def| def.crop != Crop::Corn);
        validate_content(&content);
    }

    #[test]
    #[should_panic(expected = "must not be a cover crop")]
    fn cover_crop_as_main_crop_panics() {
        let mut content = standard_content();
        content.main_crops.push(Crop::Grass);
        validate_content(&content);
    }

    #[test]
    fn content_round_trips_through_a_json_directory() {
        let content = standard_content();
        let dir = tempfile::tempdir().unwrap();

        std::fs::write(
            dir.path().join("constants.json"),
            serde_json::to_string_pretty(&content.constants).unwrap(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("crops.json"),
            json!({
                "content_version": content.content_version,
                "crops": content.crops,
                "main_crops": content.main_crops,
            })
            .to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("rotation.json"),
            json!({ "rules": content.rotation }).to_string(),
        )
        .unwrap();
        std::fs::write(
            dir.path().join("machines.json"),
            json!({ "levels": content.machine_levels }).to_string(),
        )
        .unwrap();

        let loaded = load_content(dir.path().to_str().unwrap()).unwrap();
        assert_eq!(loaded, content);
    }
}

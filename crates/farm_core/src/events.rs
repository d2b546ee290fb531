//! Environmental event and market price draws.
//!
//! These are the only stochastic pieces of a round, and they run on the
//! caller's side of the engine boundary: the coordinator draws once per game
//! round and feeds identical values to every participant's advancement.

use std::collections::BTreeMap;

use rand::Rng;

use crate::{Crop, EnvEvents, GameContent, Pest, Weather};

/// Draw one round's weather category and simultaneous pest events from the
/// configured probability bands.
pub fn draw_events(rng: &mut impl Rng, content: &GameContent) -> EnvEvents {
    let c = &content.constants;
    let roll: f64 = rng.gen();
    let weather = if roll < c.p_drought {
        Weather::Drought
    } else if roll < c.p_drought + c.p_cold {
        Weather::Cold
    } else if roll < c.p_drought + c.p_cold + c.p_flood {
        Weather::Flood
    } else {
        Weather::Normal
    };

    let mut pests = Vec::new();
    for def in &content.crops {
        if let Some(pest) = def.pest {
            if !pests.contains(&pest) && rng.gen::<f64>() < c.pest_probability {
                pests.push(pest);
            }
        }
    }
    if rng.gen::<f64>() < c.p_livestock_disease {
        pests.push(Pest::LivestockDisease);
    }
    EnvEvents { weather, pests }
}

/// Draw a live market price per harvestable crop, uniform within
/// `±market_swing` of the declared conventional value, rounded to cents.
pub fn draw_market_prices(rng: &mut impl Rng, content: &GameContent) -> BTreeMap<Crop, f64> {
    let swing = content.constants.market_swing;
    content
        .crops
        .iter()
        .filter(|def| def.base_yield > 0.0)
        .map(|def| {
            let factor = 1.0 + rng.gen_range(-swing..=swing);
            (def.crop, (def.value * factor * 100.0).round() / 100.0)
        })
        .collect()
}

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use farm_coord::LocalGame;
use farm_core::{Round, SkillTier, Weather};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "farm_cli", about = "Farming Simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a full local game with the field driven at a skill tier.
    Run {
        #[arg(long, default_value_t = 12)]
        rounds: u32,
        /// Event seed; random when absent.
        #[arg(long)]
        seed: Option<u64>,
        /// Load content tables from a JSON directory instead of the built-ins.
        #[arg(long)]
        content_dir: Option<String>,
        #[arg(long, default_value = "high", value_parser = ["elementary", "middle", "high"])]
        tier: String,
        /// Number of computer rivals farming alongside.
        #[arg(long, default_value_t = 1)]
        rivals: u32,
        #[arg(long, default_value = "middle", value_parser = ["elementary", "middle", "high"])]
        rival_tier: String,
    },
}

fn parse_tier(s: &str) -> SkillTier {
    match s {
        "elementary" => SkillTier::Elementary,
        "middle" => SkillTier::Middle,
        _ => SkillTier::High,
    }
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

fn run(
    rounds: u32,
    seed: Option<u64>,
    content_dir: Option<&str>,
    tier: SkillTier,
    rivals: u32,
    rival_tier: SkillTier,
) -> Result<()> {
    let content = match content_dir {
        Some(dir) => farm_content::load_content(dir)
            .with_context(|| format!("loading content from {dir}"))?,
        None => farm_content::standard_content(),
    };
    let resolved_seed = seed.unwrap_or_else(rand::random);
    let rival_tiers = vec![rival_tier; rivals as usize];
    let mut game = LocalGame::new(content, rounds, resolved_seed, &rival_tiers);

    println!(
        "Starting local game: rounds={rounds} seed={resolved_seed} rivals={rivals} tier={tier:?}",
    );
    println!("{}", "-".repeat(80));

    while !game.is_finished() {
        let round = game.play_auto(tier)?;
        print_round(&round);
    }

    println!("{}", "-".repeat(80));
    let final_capital = game.history().last().map_or(0.0, |r| r.result.capital);
    println!("Done after {} rounds. Final capital: {final_capital:.2}", game.total_rounds());
    for (n, (rt, history)) in game.rivals().iter().enumerate() {
        let capital = history.last().map_or(0.0, |r| r.result.capital);
        println!("  rival {} ({rt:?}): capital {capital:.2}", n + 1);
    }
    Ok(())
}

fn print_round(round: &Round) {
    let r = &round.result;
    let weather = match r.events.weather {
        Weather::Normal => "normal",
        Weather::Drought => "drought",
        Weather::Cold => "cold",
        Weather::Flood => "flood",
    };
    let pests = r.events.pests.len();
    let total_harvest: u32 = r.harvest.values().sum();
    let avg_soil =
        round.parcels.iter().map(|p| p.soil).sum::<f64>() / round.parcels.len().max(1) as f64;
    let avg_nutrients = round.parcels.iter().map(|p| p.nutrients).sum::<f64>()
        / round.parcels.len().max(1) as f64;

    println!(
        "[round={:02}  weather={weather:7}  pests={pests}]  \
         harvest={total_harvest:5}  income={income:9.2}  profit={profit:9.2}  \
         capital={capital:10.2}  soil={avg_soil:5.1}  nutrients={avg_nutrients:5.1}{organic}",
        round.number,
        income = r.income,
        profit = r.profit,
        capital = r.capital,
        organic = if r.organic_certified { "  [organic]" } else { "" },
    );
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            rounds,
            seed,
            content_dir,
            tier,
            rivals,
            rival_tier,
        } => {
            run(
                rounds,
                seed,
                content_dir.as_deref(),
                parse_tier(&tier),
                rivals,
                parse_tier(&rival_tier),
            )?;
        }
    }
    Ok(())
}

//! Wordhunt - demo CLI
//!
//! Generates grids and runs in-process multiplayer races over the session
//! library.

#![warn(missing_docs)]

mod cli;

use std::sync::Arc;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use cli::{Cli, Command};
use rand::seq::SliceRandom;
use rand::{SeedableRng, rngs::StdRng};
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::EnvFilter;
use wordhunt::{
    BroadcastChannel, ClaimOutcome, GameRepository, MemoryProfiles, MemorySessionStore, Profile,
    ProfileDirectory, SessionCoordinator, SessionError, SessionStore, SyncChannel, WordhuntConfig,
};
use wordhunt_grid::{Category, Grid, GridGenerator};

/// Highlight colors handed to simulated players in turn.
const PALETTE: [&str; 6] = [
    "#EF4444", "#3B82F6", "#10B981", "#F59E0B", "#EC4899", "#14B8A6",
];

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => WordhuntConfig::from_file(path)?,
        None => WordhuntConfig::from_env()?,
    };

    match cli.command {
        Command::Categories => {
            list_categories();
            Ok(())
        }
        Command::Generate {
            category,
            width,
            height,
            seed,
        } => generate(&config, category, width, height, seed),
        Command::Simulate {
            players,
            category,
            seed,
        } => simulate(&config, players, category, seed).await,
    }
}

fn list_categories() {
    for category in Category::all() {
        println!("{:<8} {}", category, category.words().join(", "));
    }
}

#[instrument(skip(config))]
fn generate(
    config: &WordhuntConfig,
    category: Option<String>,
    width: Option<usize>,
    height: Option<usize>,
    seed: Option<u64>,
) -> Result<()> {
    let category = category.map_or_else(|| config.category(), |name| Category::resolve(&name));
    let width = width.unwrap_or(*config.grid_width());
    let height = height.unwrap_or(*config.grid_height());
    ensure!(width > 0 && height > 0, "Grid must be at least 1x1");

    let seed = seed.unwrap_or_else(rand::random);
    info!(%category, width, height, seed, "Generating grid");
    let mut rng = StdRng::seed_from_u64(seed);
    let generated =
        GridGenerator::default().generate(width, height, &category.word_list(), &mut rng);

    println!("{} ({}x{}, seed {})\n", category, width, height, seed);
    println!("{}\n", generated.grid().display());
    for placement in generated.placements() {
        let start = placement
            .start()
            .map_or_else(|| "-".to_string(), |cell| cell.to_string());
        println!(
            "{:<8} at {:<8} {}",
            placement.word(),
            start,
            placement.direction()
        );
    }
    for word in generated.skipped() {
        println!("{:<8} did not fit", word);
    }
    Ok(())
}

#[instrument(skip(config))]
async fn simulate(
    config: &WordhuntConfig,
    players: usize,
    category: Option<String>,
    seed: Option<u64>,
) -> Result<()> {
    ensure!(players > 0, "At least one player is required");
    let category = category.unwrap_or_else(|| config.default_category().clone());
    let seed = seed.unwrap_or_else(rand::random);

    let roster: Vec<Profile> = (1..=players)
        .map(|n| {
            Profile::new(
                format!("player-{}", n),
                format!("Player {}", n),
                Some(PALETTE[(n - 1) % PALETTE.len()].to_string()),
            )
        })
        .collect();
    let (store, profiles) = backends(config, &roster)?;
    let channel: Arc<dyn SyncChannel> =
        Arc::new(BroadcastChannel::with_capacity(*config.channel_capacity()));
    let settings = config.coordinator_settings();

    let mut coordinators = Vec::with_capacity(players);
    for profile in &roster {
        coordinators.push(
            SessionCoordinator::new(
                profile.id().clone(),
                Arc::clone(&store),
                Arc::clone(&channel),
                Arc::clone(&profiles),
                settings.clone(),
            )
            .with_seed(seed),
        );
    }

    let Some((host, guests)) = coordinators.split_first_mut() else {
        return Ok(());
    };
    let game = host.create_game(&category, config.grid_size()).await?;
    for guest in guests.iter_mut() {
        guest.join_game(game.id()).await?;
    }
    info!(session_id = %game.id(), players, "All players joined");

    println!("Session {} ({})\n", game.id(), game.category());
    println!("{}\n", game.game_state().grid().display());

    let words: Vec<String> = game.findable_words().map(str::to_string).collect();
    let grid = game.game_state().grid();
    let races = coordinators.iter().enumerate().map(|(n, player)| {
        let mut order = words.clone();
        order.shuffle(&mut StdRng::seed_from_u64(seed.wrapping_add(n as u64 + 1)));
        hunt(player, grid, order)
    });
    let claimed = futures::future::join_all(races).await;

    for (player, count) in coordinators.iter().zip(claimed) {
        println!("{:<10} claimed {}", player.player_id(), count?);
    }

    let host = coordinators
        .first()
        .context("Simulation has no host")?;
    let final_state = host.refresh().await?;
    println!(
        "\nStatus {} at version {}",
        final_state.status(),
        final_state.version()
    );
    for (word, record) in final_state.game_state().found_words() {
        println!(
            "{:<8} {:<10} {}",
            word,
            record.finder_id(),
            record.color()
        );
    }
    Ok(())
}

/// Claims every word in `order` that is still free. Returns the number won.
#[instrument(skip(player, grid, order), fields(player_id = %player.player_id()))]
async fn hunt(player: &SessionCoordinator, grid: &Grid, order: Vec<String>) -> Result<usize> {
    let mut won = 0;
    for word in order {
        let Some(path) = grid.locate(&word) else {
            debug!(word = %word, "Word not visible in grid");
            continue;
        };
        match player.find_word(&word, path).await {
            Ok(ClaimOutcome::Claimed(_)) => won += 1,
            Ok(ClaimOutcome::AlreadyClaimed(record)) => {
                debug!(word = %word, winner = %record.finder_id(), "Beaten to it");
            }
            Err(e @ SessionError::Unpublished { .. }) => {
                warn!(word = %word, error = %e, "Claim kept but other players were not told");
                won += 1;
            }
            Err(SessionError::SessionClosed(_)) => break,
            Err(e) => return Err(e.into()),
        }
        tokio::task::yield_now().await;
    }
    Ok(won)
}

/// Store and profile directory for the configured backend, with `roster`
/// registered.
fn backends(
    config: &WordhuntConfig,
    roster: &[Profile],
) -> Result<(Arc<dyn SessionStore>, Arc<dyn ProfileDirectory>)> {
    match config.database_path() {
        Some(path) => {
            let repo = GameRepository::new(path.clone())?;
            repo.run_migrations()?;
            for profile in roster {
                if repo.get_user(profile.id())?.is_none() {
                    repo.create_user(
                        profile.id().clone(),
                        profile.username().clone(),
                        profile.highlight_color().clone(),
                    )?;
                }
            }
            info!(path = %path, "Using SQLite backend");
            let store: Arc<dyn SessionStore> = Arc::new(repo.clone());
            let profiles: Arc<dyn ProfileDirectory> = Arc::new(repo);
            Ok((store, profiles))
        }
        None => {
            let profiles = MemoryProfiles::new();
            for profile in roster {
                profiles.insert(profile.clone())?;
            }
            info!("Using in-memory backend");
            let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
            let profiles: Arc<dyn ProfileDirectory> = Arc::new(profiles);
            Ok((store, profiles))
        }
    }
}

//! Headless soak run: random map, a crowd of agents with random
//! destinations, and a terrain snapshot round trip halfway through.

use bevy::prelude::*;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tilenav::nav::grid::snapshot::{load_snapshot, save_snapshot};
use tilenav::nav::{
    load_nav_config, CompressionMode, GridConfig, GridSnapshot, NavStatus, NavigationSystem, Position, Tile,
    DEFAULT_CONFIG_PATH,
};

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const MAP_WIDTH: i32 = 256;
const MAP_HEIGHT: i32 = 256;
const WALL_CHANCE: f64 = 0.18;
const AGENT_COUNT: usize = 500;
const TICKS: u32 = 2_000;
const SEED: u64 = 0x7113_5eed;
const SNAPSHOT_PATH: &str = "logs/soak_terrain.bin";

fn setup_file_logging() -> Result<String, Box<dyn Error>> {
    let log_dir = PathBuf::from("logs");
    fs::create_dir_all(&log_dir)?;

    // Keep the last 25 runs
    cleanup_old_logs(&log_dir, 25);

    let now = chrono::Local::now();
    let log_filename = format!("tilenav_{}.log", now.format("%Y%m%d_%H%M%S"));
    let log_path_str = log_dir.join(&log_filename).to_string_lossy().to_string();

    let file_appender = RollingFileAppender::new(Rotation::NEVER, &log_dir, &log_filename);
    let file_layer = fmt::layer().with_writer(file_appender).with_ansi(false);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tilenav=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(log_path_str)
}

fn cleanup_old_logs(log_dir: &PathBuf, keep_count: usize) {
    if let Ok(entries) = fs::read_dir(log_dir) {
        let mut log_files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(|s| s.starts_with("tilenav") && s.ends_with(".log"))
                    .unwrap_or(false)
            })
            .collect();

        // Oldest first
        log_files.sort_by_key(|e| e.metadata().ok().and_then(|m| m.modified().ok()));

        if log_files.len() > keep_count {
            for file in log_files.iter().take(log_files.len() - keep_count) {
                let _ = fs::remove_file(file.path());
            }
        }
    }
}

fn random_open_cell(nav: &NavigationSystem, rng: &mut StdRng) -> Position {
    loop {
        let pos = Position::new(rng.random_range(0..MAP_WIDTH), rng.random_range(0..MAP_HEIGHT), 0);
        if nav.grid().is_walkable(pos) {
            return pos;
        }
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let log_file = setup_file_logging()?;
    println!("tilenav soak run, logging to {}", log_file);

    let config = load_nav_config(DEFAULT_CONFIG_PATH);
    let mut nav = NavigationSystem::new(GridConfig::new(MAP_WIDTH, MAP_HEIGHT, 1, true)?, &config)?;
    info!("[SOAK] {}", nav.selection().justification);

    let mut rng = StdRng::seed_from_u64(SEED);
    for y in 0..MAP_HEIGHT {
        for x in 0..MAP_WIDTH {
            if rng.random_bool(WALL_CHANCE) {
                nav.set_tile(Position::new(x, y, 0), Tile::WALL);
            }
        }
    }

    let mut spawned = 0u64;
    while (spawned as usize) < AGENT_COUNT {
        let pos = random_open_cell(&nav, &mut rng);
        if nav.add_agent(Entity::from_bits(spawned + 1), pos, None).is_ok() {
            spawned += 1;
        }
    }
    let agents: Vec<Entity> = nav.agents().map(|agent| agent.entity).collect();
    for &entity in &agents {
        let goal = random_open_cell(&nav, &mut rng);
        nav.set_destination(entity, goal);
    }
    info!("[SOAK] {} agents on {}x{}", agents.len(), MAP_WIDTH, MAP_HEIGHT);

    let mut failures = 0usize;
    let mut arrivals = 0usize;
    for tick in 0..TICKS {
        if tick == TICKS / 2 {
            let snapshot = GridSnapshot::capture(nav.grid(), CompressionMode::Deflate)?;
            save_snapshot(SNAPSHOT_PATH, &snapshot)?;
            let loaded = load_snapshot(SNAPSHOT_PATH)?;
            nav.load_terrain(&loaded)?;
            info!(
                "[SOAK] Snapshot round trip: {} payload bytes for {} raw",
                loaded.payload.len(),
                loaded.raw_len
            );
        }

        nav.advance(1);

        // Finished agents get a fresh destination.
        let mut idle = Vec::new();
        for event in nav.drain_events() {
            match event.kind {
                tilenav::nav::NavEventKind::Completed => {
                    arrivals += 1;
                    idle.push(event.entity);
                }
                tilenav::nav::NavEventKind::PathFailed { .. } => {
                    failures += 1;
                    idle.push(event.entity);
                }
                _ => {}
            }
        }
        for entity in idle {
            let goal = random_open_cell(&nav, &mut rng);
            nav.set_destination(entity, goal);
        }
    }

    let waiting = nav.agents().filter(|agent| agent.status == NavStatus::Waiting).count();
    let stats = nav.stats();
    info!(
        "[SOAK] {} ticks: {} arrivals, {} failures, {} waiting, {} paths found ({} truncated), {} replans",
        TICKS, arrivals, failures, waiting, stats.paths_found, stats.paths_truncated, stats.replans
    );
    info!(
        "[SOAK] Spatial index: {} entries in {} cells, {} pathfinding contexts created",
        nav.spatial_index().total_entries(),
        nav.spatial_index().non_empty_cells(),
        nav.pathfinder().pool().created()
    );
    Ok(())
}

//! ColorGrid Client
//!
//! Headless client: keeps a synced replica of the grid, logs what happens to
//! it and optionally claims one tile.
//!
//! Usage: `colorgrid-client [X Y [COLOR]]`

use anyhow::{bail, Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use colorgrid::{
    Color, Coord, Engine, EngineConfig, EngineEvent, ParticipantLabel, VERSION,
};

/// Tile to claim on startup.
struct ClaimArgs {
    coord: Coord,
    color: Color,
}

fn parse_args(args: &[String]) -> Result<Option<ClaimArgs>> {
    match args {
        [] => Ok(None),
        [x, y, rest @ ..] if rest.len() <= 1 => {
            let x = x.parse().with_context(|| format!("invalid x coordinate {:?}", x))?;
            let y = y.parse().with_context(|| format!("invalid y coordinate {:?}", y))?;
            let color = match rest.first() {
                Some(color) => Color::new(color.as_str()),
                None => Color::palette()
                    .into_iter()
                    .next()
                    .context("empty palette")?,
            };
            Ok(Some(ClaimArgs { coord: Coord::new(x, y), color }))
        }
        _ => bail!("usage: colorgrid-client [X Y [COLOR]]"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("ColorGrid client v{}", VERSION);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let claim = parse_args(&args)?;

    let config = EngineConfig::from_env().context("failed to read configuration")?;
    let username = std::env::var("COLORGRID_USERNAME")
        .map(ParticipantLabel::new)
        .unwrap_or_else(|_| ParticipantLabel::generate());

    info!("Grid: {}", config.bounds);
    info!("Real-time: {}", config.ws_url);
    info!("REST: {}", config.api_base_url);
    info!("Playing as {}", username);

    let engine = Engine::connect(config).context("failed to create engine")?;
    let (handle, mut events) = engine.start();

    if let Some(ClaimArgs { coord, color }) = claim {
        let outcome = handle.claim(coord, color.clone(), username.clone()).await?;
        info!("Claimed {} as {} (sent: {})", coord, color, outcome.sent);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            event = events.recv() => match event {
                Ok(event) => log_event(&event, &username),
                Err(RecvError::Lagged(missed)) => warn!("Dropped {} events", missed),
                Err(RecvError::Closed) => break,
            },
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn log_event(event: &EngineEvent, username: &ParticipantLabel) {
    match event {
        EngineEvent::StatusChanged(status) => info!("Connection: {:?}", status),
        EngineEvent::TileChanged { coord, color, owner_name } => match owner_name {
            Some(owner) => info!("Tile {} -> {} ({})", coord, color, owner),
            None => info!("Tile {} -> {}", coord, color),
        },
        EngineEvent::GridReplaced { tiles } => info!("Grid resynced, {} tiles claimed", tiles),
        EngineEvent::PresenceChanged(count) => info!("{} players online", count),
        EngineEvent::LeaderboardUpdated(snapshot) => {
            for (rank, entry) in snapshot.entries.iter().enumerate() {
                info!("  #{} {} ({})", rank + 1, entry.owner_name, entry.count);
            }
            if let Some(standing) = snapshot.standing(username.as_str()) {
                info!("You are #{} with {} tiles", standing.rank, standing.count);
            }
        }
        EngineEvent::Notice(message) => warn!("Server: {}", message),
    }
}

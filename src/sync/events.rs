//! Engine events for renderers and other observers.

use crate::grid::{Color, Coord};
use crate::network::connection::ConnectionStatus;
use crate::sync::leaderboard::LeaderboardSnapshot;

/// Something observers may want to redraw for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Connection status changed (drives a "reconnecting" indicator).
    StatusChanged(ConnectionStatus),

    /// One tile changed, from a live update or a local claim.
    TileChanged {
        /// Cell.
        coord: Coord,
        /// New color.
        color: Color,
        /// Painter, when known.
        owner_name: Option<String>,
    },

    /// The grid was replaced by a server snapshot.
    GridReplaced {
        /// Claimed tiles after the replace.
        tiles: usize,
    },

    /// Presence count changed.
    PresenceChanged(u32),

    /// A new leaderboard snapshot arrived.
    LeaderboardUpdated(LeaderboardSnapshot),

    /// User-visible notice (a rejected capture).
    Notice(String),
}

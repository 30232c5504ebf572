//! Grid Module
//!
//! Local model of the shared tile map.
//!
//! ## Module Structure
//!
//! - `coord`: Cell coordinates and grid bounds
//! - `state`: Tile colors, last-writer-wins map

pub mod coord;
pub mod state;

use std::fmt;
use rand::Rng;
use serde::{Serialize, Deserialize};
use thiserror::Error;

pub use coord::{Coord, GridBounds, DEFAULT_GRID_WIDTH, DEFAULT_GRID_HEIGHT};
pub use state::{Color, GridState, PALETTE};

/// Grid errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    /// Coordinate lies outside `[0, W) x [0, H)`.
    #[error("tile ({x}, {y}) is outside the {bounds} grid")]
    OutOfBounds {
        /// Column as received.
        x: i64,
        /// Row as received.
        y: i64,
        /// Grid dimensions.
        bounds: GridBounds,
    },

    /// Malformed `"x,y"` key.
    #[error("invalid tile key: {0:?}")]
    InvalidKey(String),
}

// =============================================================================
// PARTICIPANT
// =============================================================================

/// A self-asserted participant name.
///
/// Never validated for uniqueness; the server trusts whatever the client sends.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantLabel(String);

impl ParticipantLabel {
    /// Wrap a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Fallback name for participants who never picked one: `Player<0..1000>`.
    pub fn generate() -> Self {
        let n: u32 = rand::thread_rng().gen_range(0..1000);
        Self(format!("Player{}", n))
    }

    /// Borrow the raw name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantLabel {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

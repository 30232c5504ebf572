//! Grid State
//!
//! The in-memory tile map the UI renders from.
//! Uses BTreeMap so snapshots and iteration are ordered row-major.

use std::collections::BTreeMap;
use std::fmt;
use serde::{Serialize, Deserialize};

use super::coord::{Coord, GridBounds};
use super::GridError;

/// The six colors the game UI offers.
pub const PALETTE: [&str; 6] = [
    "#3498db", // Blue
    "#9b59b6", // Purple
    "#f1c40f", // Yellow
    "#e91e63", // Pink
    "#2ecc71", // Green
    "#e74c3c", // Red
];

// =============================================================================
// COLOR
// =============================================================================

/// A tile color as the server spells it (usually `#rrggbb`).
///
/// Opaque: the client never interprets or normalizes it, so two claims only
/// count as the same color when the strings match exactly.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    /// Wrap a color string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The default palette as colors.
    pub fn palette() -> Vec<Color> {
        PALETTE.iter().map(|c| Color::new(*c)).collect()
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Color {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Color {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// =============================================================================
// GRID STATE
// =============================================================================

/// Mapping from coordinate to current owning color.
///
/// Absence means unclaimed. Writes are last-writer-wins by call order and
/// coordinates outside the bounds are never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridState {
    bounds: GridBounds,
    tiles: BTreeMap<Coord, Color>,
    /// Bumped on every effective change.
    revision: u64,
}

impl GridState {
    /// Create an empty grid.
    pub fn new(bounds: GridBounds) -> Self {
        Self {
            bounds,
            tiles: BTreeMap::new(),
            revision: 0,
        }
    }

    /// Grid dimensions.
    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    /// Color at `coord`, if claimed.
    pub fn get(&self, coord: Coord) -> Option<&Color> {
        self.tiles.get(&coord)
    }

    /// Lookup by `"x,y"` key.
    pub fn get_by_key(&self, key: &str) -> Option<&Color> {
        key.parse::<Coord>().ok().and_then(|c| self.get(c))
    }

    /// Overwrite the color at `coord`.
    ///
    /// Returns `Ok(true)` if the grid changed.
    pub fn set(&mut self, coord: Coord, color: Color) -> Result<bool, GridError> {
        if !self.bounds.contains(coord) {
            return Err(GridError::OutOfBounds {
                x: coord.x as i64,
                y: coord.y as i64,
                bounds: self.bounds,
            });
        }

        if self.tiles.get(&coord) == Some(&color) {
            return Ok(false);
        }

        self.tiles.insert(coord, color);
        self.revision += 1;
        Ok(true)
    }

    /// Replace the whole grid with `tiles`.
    ///
    /// Every prior entry is discarded, including those missing from `tiles`.
    /// Out-of-bounds entries are skipped. Returns `true` if the contents changed.
    pub fn replace_all<I>(&mut self, tiles: I) -> bool
    where
        I: IntoIterator<Item = (Coord, Color)>,
    {
        let bounds = self.bounds;
        let next: BTreeMap<Coord, Color> = tiles
            .into_iter()
            .filter(|(coord, _)| bounds.contains(*coord))
            .collect();

        if next == self.tiles {
            return false;
        }

        self.tiles = next;
        self.revision += 1;
        true
    }

    /// Number of claimed tiles.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Whether no tile is claimed.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Number of tiles painted exactly `color`.
    pub fn count_color(&self, color: &Color) -> usize {
        self.tiles.values().filter(|c| *c == color).count()
    }

    /// Claimed tiles in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, &Color)> {
        self.tiles.iter().map(|(coord, color)| (*coord, color))
    }

    /// Change counter; differs whenever contents differ from a prior read.
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

impl Default for GridState {
    fn default() -> Self {
        Self::new(GridBounds::default())
    }
}

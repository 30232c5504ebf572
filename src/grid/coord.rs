//! Cell Coordinates
//!
//! Grid dimensions and the `(x, y)` key every tile is addressed by.
//! Bounds are agreed out-of-band with the server and never negotiated.

use std::fmt;
use std::str::FromStr;
use serde::{Serialize, Deserialize};

use super::GridError;

/// Default grid width (columns).
pub const DEFAULT_GRID_WIDTH: u32 = 50;

/// Default grid height (rows).
pub const DEFAULT_GRID_HEIGHT: u32 = 40;

// =============================================================================
// BOUNDS
// =============================================================================

/// Fixed grid dimensions `W x H`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridBounds {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
}

impl Default for GridBounds {
    fn default() -> Self {
        Self {
            width: DEFAULT_GRID_WIDTH,
            height: DEFAULT_GRID_HEIGHT,
        }
    }
}

impl GridBounds {
    /// Create bounds of the given size.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether `coord` lies in `[0, W) x [0, H)`.
    #[inline]
    pub fn contains(&self, coord: Coord) -> bool {
        coord.x < self.width && coord.y < self.height
    }

    /// Validate a coordinate received over the wire.
    ///
    /// The server speaks plain JSON integers, so negative or oversized values
    /// are possible and must never reach the grid.
    pub fn checked(&self, x: i64, y: i64) -> Result<Coord, GridError> {
        let out_of_bounds = GridError::OutOfBounds { x, y, bounds: *self };
        let cx = u32::try_from(x).map_err(|_| out_of_bounds.clone())?;
        let cy = u32::try_from(y).map_err(|_| out_of_bounds.clone())?;
        let coord = Coord::new(cx, cy);
        if self.contains(coord) {
            Ok(coord)
        } else {
            Err(out_of_bounds)
        }
    }

    /// Iterate every coordinate in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.height).flat_map(move |y| (0..self.width).map(move |x| Coord::new(x, y)))
    }
}

impl fmt::Display for GridBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

// =============================================================================
// COORDINATE
// =============================================================================

/// A cell coordinate.
///
/// Ordered row-major (`y` first) so iterating a grid walks it the way a
/// renderer draws it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coord {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
}

impl Coord {
    /// Create a coordinate.
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// The `"x,y"` lookup key.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.y, self.x).cmp(&(other.y, other.x))
    }
}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for Coord {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad_key = || GridError::InvalidKey(s.to_string());
        let (x, y) = s.split_once(',').ok_or_else(bad_key)?;
        let x = x.trim().parse().map_err(|_| bad_key())?;
        let y = y.trim().parse().map_err(|_| bad_key())?;
        Ok(Self::new(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_format() {
        assert_eq!(Coord::new(3, 4).key(), "3,4");
        assert_eq!("3,4".parse::<Coord>().unwrap(), Coord::new(3, 4));
    }

    #[test]
    fn test_invalid_keys() {
        assert!("3".parse::<Coord>().is_err());
        assert!("a,b".parse::<Coord>().is_err());
        assert!("-1,2".parse::<Coord>().is_err());
    }

    #[test]
    fn test_bounds_contains() {
        let bounds = GridBounds::new(50, 40);
        assert!(bounds.contains(Coord::new(0, 0)));
        assert!(bounds.contains(Coord::new(49, 39)));
        assert!(!bounds.contains(Coord::new(50, 0)));
        assert!(!bounds.contains(Coord::new(0, 40)));
    }

    #[test]
    fn test_checked_rejects_negative_and_oversized() {
        let bounds = GridBounds::default();
        assert_eq!(bounds.checked(3, 4).unwrap(), Coord::new(3, 4));
        assert!(matches!(bounds.checked(-1, 4), Err(GridError::OutOfBounds { x: -1, .. })));
        assert!(bounds.checked(3, 40).is_err());
        assert!(bounds.checked(i64::MAX, 0).is_err());
    }

    #[test]
    fn test_row_major_order() {
        let bounds = GridBounds::new(2, 2);
        let cells: Vec<_> = bounds.iter().collect();
        assert_eq!(cells, vec![
            Coord::new(0, 0),
            Coord::new(1, 0),
            Coord::new(0, 1),
            Coord::new(1, 1),
        ]);
        assert!(Coord::new(1, 0) < Coord::new(0, 1));
    }
}

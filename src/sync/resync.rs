//! Full-Grid Resynchronization
//!
//! Replaces the local grid with the server's authoritative snapshot. Every
//! request gets a generation number; a response older than the newest one
//! already applied is dropped so a slow fetch never rolls the grid back.

use tracing::{debug, info, warn};

use crate::grid::GridState;
use crate::network::api::{BlockRecord, FetchError};

/// Why a resync was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncReason {
    /// Engine start.
    ColdStart,
    /// The server rejected a capture.
    ServerError,
    /// The transport reconnected after a gap.
    Reconnected,
}

/// Resync bookkeeping.
#[derive(Debug, Default)]
pub struct Resynchronizer {
    next_generation: u64,
    applied: u64,
    outstanding: usize,
}

impl Resynchronizer {
    /// Nothing requested yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a new fetch generation.
    pub fn request(&mut self, reason: ResyncReason) -> u64 {
        self.next_generation += 1;
        self.outstanding += 1;
        debug!("Resync {} requested ({:?})", self.next_generation, reason);
        self.next_generation
    }

    /// Fetches issued but not yet completed.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Newest generation applied to the grid (0 = none).
    pub fn applied_generation(&self) -> u64 {
        self.applied
    }

    /// Apply a fetch result. Returns `true` if the grid changed.
    pub fn complete(
        &mut self,
        grid: &mut GridState,
        generation: u64,
        result: Result<Vec<BlockRecord>, FetchError>,
    ) -> bool {
        self.outstanding = self.outstanding.saturating_sub(1);

        let records = match result {
            Ok(records) => records,
            Err(e) => {
                warn!("Grid fetch {} failed, keeping last snapshot: {}", generation, e);
                return false;
            }
        };

        if generation <= self.applied {
            debug!("Discarding stale grid fetch {} (applied {})", generation, self.applied);
            return false;
        }
        self.applied = generation;

        let bounds = grid.bounds();
        let tiles = records.into_iter().filter_map(|record| match record.coord(bounds) {
            Ok(coord) => Some((coord, record.color)),
            Err(e) => {
                debug!("Skipping block record: {}", e);
                None
            }
        });

        let changed = grid.replace_all(tiles);
        info!("Grid resynced: {} tiles claimed", grid.len());
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Color, Coord};

    fn record(x: i64, y: i64, color: &str) -> BlockRecord {
        BlockRecord { x, y, color: Color::new(color), owner_name: None }
    }

    #[test]
    fn test_fetch_replaces_grid() {
        let mut grid = GridState::default();
        grid.set(Coord::new(9, 9), Color::new("#9b59b6")).unwrap();

        let mut resync = Resynchronizer::new();
        let generation = resync.request(ResyncReason::ServerError);
        let changed = resync.complete(&mut grid, generation, Ok(vec![record(1, 2, "#3498db")]));

        assert!(changed);
        assert_eq!(grid.get(Coord::new(9, 9)), None);
        assert_eq!(grid.get(Coord::new(1, 2)), Some(&Color::new("#3498db")));
        assert_eq!(resync.outstanding(), 0);
    }

    #[test]
    fn test_out_of_bounds_records_skipped() {
        let mut grid = GridState::default();
        let mut resync = Resynchronizer::new();
        let generation = resync.request(ResyncReason::ColdStart);
        resync.complete(&mut grid, generation, Ok(vec![
            record(-1, 0, "#fff"),
            record(50, 0, "#fff"),
            record(49, 39, "#fff"),
        ]));
        assert_eq!(grid.len(), 1);
    }

    #[test]
    fn test_stale_fetch_discarded() {
        let mut grid = GridState::default();
        let mut resync = Resynchronizer::new();
        let older = resync.request(ResyncReason::ColdStart);
        let newer = resync.request(ResyncReason::ServerError);

        resync.complete(&mut grid, newer, Ok(vec![record(1, 1, "#2ecc71")]));
        let changed = resync.complete(&mut grid, older, Ok(vec![]));

        assert!(!changed);
        assert_eq!(grid.len(), 1);
        assert_eq!(resync.applied_generation(), newer);
    }

    #[test]
    fn test_in_order_completions_both_apply() {
        let mut grid = GridState::default();
        let mut resync = Resynchronizer::new();
        let first = resync.request(ResyncReason::ColdStart);
        let second = resync.request(ResyncReason::ServerError);

        resync.complete(&mut grid, first, Ok(vec![record(1, 1, "#2ecc71")]));
        resync.complete(&mut grid, second, Ok(vec![record(2, 2, "#2ecc71")]));

        assert_eq!(grid.get(Coord::new(1, 1)), None);
        assert!(grid.get(Coord::new(2, 2)).is_some());
    }

    #[test]
    fn test_failure_keeps_last_known_good() {
        let mut grid = GridState::default();
        grid.set(Coord::new(3, 3), Color::new("#e91e63")).unwrap();

        let mut resync = Resynchronizer::new();
        let generation = resync.request(ResyncReason::ColdStart);
        assert!(!resync.complete(&mut grid, generation, Err(FetchError::Other("502".into()))));
        assert_eq!(grid.len(), 1);
        assert_eq!(resync.applied_generation(), 0);
    }
}

//! Leaderboard Polling
//!
//! Server-computed ranking of tiles owned per participant. Polled on a fixed
//! cadence and again whenever the grid changes; at most one poll is in flight
//! and triggers that land meanwhile coalesce into a single follow-up.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::grid::{Color, GridState};
use crate::network::api::{FetchError, LeaderboardEntry};

/// Last successful leaderboard response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaderboardSnapshot {
    /// Rows exactly as the server ordered them.
    pub entries: Vec<LeaderboardEntry>,
    /// When the rows arrived. `None` before the first successful poll.
    pub fetched_at: Option<DateTime<Utc>>,
}

/// A participant's place in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    /// 1-based rank.
    pub rank: usize,
    /// Tiles owned.
    pub count: u32,
}

impl LeaderboardSnapshot {
    /// Rank and count of `owner_name`, if listed.
    pub fn standing(&self, owner_name: &str) -> Option<Standing> {
        self.entries
            .iter()
            .position(|e| e.owner_name == owner_name)
            .map(|i| Standing {
                rank: i + 1,
                count: self.entries[i].count,
            })
    }
}

/// Poll bookkeeping and the current snapshot.
#[derive(Debug, Default)]
pub struct LeaderboardPoller {
    snapshot: LeaderboardSnapshot,
    next_generation: u64,
    in_flight: Option<u64>,
    refresh_pending: bool,
}

impl LeaderboardPoller {
    /// Empty snapshot, nothing in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> &LeaderboardSnapshot {
        &self.snapshot
    }

    /// Whether a poll is outstanding.
    pub fn is_polling(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Ask for a poll.
    ///
    /// Returns the generation to fetch, or `None` if one is already in flight
    /// (a single follow-up is then remembered).
    pub fn request(&mut self) -> Option<u64> {
        if self.in_flight.is_some() {
            self.refresh_pending = true;
            return None;
        }

        self.next_generation += 1;
        self.in_flight = Some(self.next_generation);
        self.refresh_pending = false;
        Some(self.next_generation)
    }

    /// Record a poll result. Returns `true` if the snapshot was replaced.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<Vec<LeaderboardEntry>, FetchError>,
    ) -> bool {
        if self.in_flight != Some(generation) {
            debug!("Ignoring leaderboard poll {} (not in flight)", generation);
            return false;
        }
        self.in_flight = None;

        match result {
            Ok(entries) => {
                self.snapshot = LeaderboardSnapshot {
                    entries,
                    fetched_at: Some(Utc::now()),
                };
                true
            }
            Err(e) => {
                warn!("Leaderboard poll failed: {}", e);
                false
            }
        }
    }

    /// Issue the coalesced follow-up poll, if one was requested meanwhile.
    pub fn follow_up(&mut self) -> Option<u64> {
        if self.refresh_pending {
            self.request()
        } else {
            None
        }
    }
}

/// Local participant's approximate tile count: cells painted `color`.
///
/// Cheap and immediate but only as fresh as the local grid.
pub fn local_count(grid: &GridState, color: &Color) -> usize {
    grid.count_color(color)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Coord;

    fn entry(name: &str, count: u32) -> LeaderboardEntry {
        LeaderboardEntry { owner_name: name.to_string(), count }
    }

    #[test]
    fn test_snapshot_is_exact_response() {
        let mut poller = LeaderboardPoller::new();
        let generation = poller.request().unwrap();

        // Deliberately not sorted: the client must not re-sort.
        let rows = vec![entry("Bob", 3), entry("Alice", 10), entry("Carol", 3)];
        assert!(poller.complete(generation, Ok(rows.clone())));
        assert_eq!(poller.snapshot().entries, rows);
        assert!(poller.snapshot().fetched_at.is_some());
    }

    #[test]
    fn test_snapshot_replaced_wholesale() {
        let mut poller = LeaderboardPoller::new();
        let g1 = poller.request().unwrap();
        poller.complete(g1, Ok(vec![entry("Alice", 5), entry("Bob", 2)]));

        let g2 = poller.request().unwrap();
        poller.complete(g2, Ok(vec![entry("Carol", 1)]));
        assert_eq!(poller.snapshot().entries, vec![entry("Carol", 1)]);
    }

    #[test]
    fn test_failure_keeps_last_snapshot() {
        let mut poller = LeaderboardPoller::new();
        let g1 = poller.request().unwrap();
        poller.complete(g1, Ok(vec![entry("Alice", 5)]));

        let g2 = poller.request().unwrap();
        assert!(!poller.complete(g2, Err(FetchError::Other("boom".into()))));
        assert_eq!(poller.snapshot().entries, vec![entry("Alice", 5)]);
        assert!(!poller.is_polling());
    }

    #[test]
    fn test_triggers_coalesce_while_in_flight() {
        let mut poller = LeaderboardPoller::new();
        let g1 = poller.request().unwrap();
        assert!(poller.request().is_none());
        assert!(poller.request().is_none());

        poller.complete(g1, Ok(vec![]));
        let g2 = poller.follow_up().unwrap();
        assert!(g2 > g1);

        poller.complete(g2, Ok(vec![]));
        assert!(poller.follow_up().is_none());
    }

    #[test]
    fn test_unknown_generation_ignored() {
        let mut poller = LeaderboardPoller::new();
        assert!(!poller.complete(99, Ok(vec![entry("Mallory", 1)])));
        assert!(poller.snapshot().entries.is_empty());
    }

    #[test]
    fn test_standing() {
        let snapshot = LeaderboardSnapshot {
            entries: vec![entry("Alice", 10), entry("Bob", 4)],
            fetched_at: None,
        };
        assert_eq!(snapshot.standing("Bob"), Some(Standing { rank: 2, count: 4 }));
        assert_eq!(snapshot.standing("Zed"), None);
    }

    #[test]
    fn test_local_count() {
        let mut grid = GridState::default();
        let blue = Color::new("#3498db");
        grid.set(Coord::new(0, 0), blue.clone()).unwrap();
        grid.set(Coord::new(5, 5), blue.clone()).unwrap();
        grid.set(Coord::new(6, 6), Color::new("#e74c3c")).unwrap();
        assert_eq!(local_count(&grid, &blue), 2);
    }
}

//! Synchronization State
//!
//! The I/O-free heart of the engine. Every input (a transport event, a fetch
//! result, a timer, a local claim) is applied here in arrival order and
//! answered with a list of [`Effect`]s for the driver to carry out.

use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::grid::{Color, GridError, GridState};
use crate::network::api::{BlockRecord, FetchError, LeaderboardEntry};
use crate::network::connection::{ConnectionManager, ConnectionStatus, SessionId};
use crate::network::protocol::ServerMessage;
use crate::sync::events::EngineEvent;
use crate::sync::leaderboard::{local_count, LeaderboardPoller, LeaderboardSnapshot, Standing};
use crate::sync::mutator::{ClaimIntent, ClaimOutcome, OptimisticMutator};
use crate::sync::presence::PresenceTracker;
use crate::sync::resync::{ResyncReason, Resynchronizer};

/// Work for the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a transport session under this id.
    Connect(SessionId),
    /// Call [`SyncState::reconnect_due`] after this delay.
    ScheduleReconnect(Duration),
    /// Fetch the full grid, then call [`SyncState::on_grid_fetched`].
    FetchGrid(u64),
    /// Fetch the leaderboard, then call [`SyncState::on_leaderboard_fetched`].
    PollLeaderboard(u64),
    /// Publish to observers.
    Emit(EngineEvent),
}

/// All mutable engine state.
#[derive(Debug)]
pub struct SyncState {
    reconnect_delay: Duration,
    resync_on_reconnect: bool,
    grid: GridState,
    presence: PresenceTracker,
    leaderboard: LeaderboardPoller,
    connection: ConnectionManager,
    mutator: OptimisticMutator,
    resync: Resynchronizer,
}

impl SyncState {
    /// Fresh state for `config`.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            reconnect_delay: config.reconnect_delay,
            resync_on_reconnect: config.resync_on_reconnect,
            grid: GridState::new(config.bounds),
            presence: PresenceTracker::new(),
            leaderboard: LeaderboardPoller::new(),
            connection: ConnectionManager::new(),
            mutator: OptimisticMutator::new(config.unsent_claims, config.max_unsent_claims),
            resync: Resynchronizer::new(),
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Local grid.
    pub fn grid(&self) -> &GridState {
        &self.grid
    }

    /// Presence count.
    pub fn presence(&self) -> u32 {
        self.presence.count()
    }

    /// Last leaderboard snapshot.
    pub fn leaderboard(&self) -> &LeaderboardSnapshot {
        self.leaderboard.snapshot()
    }

    /// Connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.connection.status()
    }

    /// Claims waiting for a connection.
    pub fn unsent_claims(&self) -> usize {
        self.mutator.unsent().count()
    }

    /// Approximate tile count for the locally selected color.
    pub fn local_count(&self, color: &Color) -> usize {
        local_count(&self.grid, color)
    }

    /// Rank and count of `owner_name` in the last leaderboard.
    pub fn standing(&self, owner_name: &str) -> Option<Standing> {
        self.leaderboard.snapshot().standing(owner_name)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Cold start: seed the grid, poll the leaderboard, open the first session.
    pub fn start(&mut self) -> Vec<Effect> {
        let mut effects = vec![Effect::FetchGrid(self.resync.request(ResyncReason::ColdStart))];
        self.request_leaderboard(&mut effects);
        self.begin_connect(&mut effects);
        effects
    }

    /// The reconnect delay elapsed.
    pub fn reconnect_due(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.begin_connect(&mut effects);
        effects
    }

    /// Tear down. No reconnect follows.
    pub fn shutdown(&mut self) -> Vec<Effect> {
        self.connection.shutdown();
        vec![Effect::Emit(EngineEvent::StatusChanged(ConnectionStatus::Disconnected))]
    }

    // =========================================================================
    // TRANSPORT EVENTS
    // =========================================================================

    /// `session` finished its handshake.
    pub fn on_session_opened(&mut self, session: SessionId, outbound: mpsc::Sender<String>) -> Vec<Effect> {
        if !self.connection.on_opened(session, outbound) {
            return Vec::new();
        }

        let mut effects = vec![Effect::Emit(EngineEvent::StatusChanged(ConnectionStatus::Connected))];

        // Discarded claims are still painted locally; only a refetch undoes them.
        let reconciled = self.mutator.on_reconnected(&self.connection);
        let reconnected = self.resync_on_reconnect && self.connection.established_count() > 1;
        if reconnected || reconciled.discarded > 0 {
            effects.push(Effect::FetchGrid(self.resync.request(ResyncReason::Reconnected)));
        }

        effects
    }

    /// `session` closed or failed to open.
    pub fn on_session_closed(&mut self, session: SessionId, reason: Option<&str>) -> Vec<Effect> {
        if !self.connection.on_closed(session, reason) {
            return Vec::new();
        }

        vec![
            Effect::Emit(EngineEvent::StatusChanged(ConnectionStatus::Disconnected)),
            Effect::ScheduleReconnect(self.reconnect_delay),
        ]
    }

    /// A text frame arrived on `session`.
    pub fn on_frame(&mut self, session: SessionId, frame: &str) -> Vec<Effect> {
        match self.connection.decode(session, frame) {
            Some(msg) => self.apply(msg),
            None => Vec::new(),
        }
    }

    /// Dispatch one server message.
    pub fn apply(&mut self, msg: ServerMessage) -> Vec<Effect> {
        let mut effects = Vec::new();

        match msg {
            ServerMessage::BlockUpdate(update) => {
                let coord = match update.coord(self.grid.bounds()) {
                    Ok(coord) => coord,
                    Err(e) => {
                        warn!("Ignoring tile update: {}", e);
                        return effects;
                    }
                };
                if let Ok(true) = self.grid.set(coord, update.color.clone()) {
                    effects.push(Effect::Emit(EngineEvent::TileChanged {
                        coord,
                        color: update.color,
                        owner_name: update.owner_name,
                    }));
                    self.request_leaderboard(&mut effects);
                }
            }
            ServerMessage::UserCount { count } => {
                if self.presence.update(count) {
                    effects.push(Effect::Emit(EngineEvent::PresenceChanged(count)));
                }
            }
            ServerMessage::Error(error) => {
                let message = if error.message.is_empty() {
                    "Capture rejected".to_string()
                } else {
                    error.message
                };
                warn!("Server rejected capture: {}", message);
                effects.push(Effect::Emit(EngineEvent::Notice(message)));
                effects.push(Effect::FetchGrid(self.resync.request(ResyncReason::ServerError)));
            }
            ServerMessage::Unknown => {
                debug!("Ignoring unknown server message");
            }
        }

        effects
    }

    // =========================================================================
    // LOCAL CLAIMS
    // =========================================================================

    /// Paint a tile optimistically and send the capture.
    pub fn claim(&mut self, intent: ClaimIntent) -> Result<(ClaimOutcome, Vec<Effect>), GridError> {
        let coord = intent.coord;
        let color = intent.color.clone();
        let owner_name = intent.username.to_string();

        let outcome = self.mutator.claim(&mut self.grid, &self.connection, intent)?;

        let mut effects = Vec::new();
        if outcome.grid_changed {
            effects.push(Effect::Emit(EngineEvent::TileChanged {
                coord,
                color,
                owner_name: Some(owner_name),
            }));
            self.request_leaderboard(&mut effects);
        }
        Ok((outcome, effects))
    }

    // =========================================================================
    // FETCH RESULTS AND TIMERS
    // =========================================================================

    /// A full-grid fetch finished.
    pub fn on_grid_fetched(
        &mut self,
        generation: u64,
        result: Result<Vec<BlockRecord>, FetchError>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.resync.complete(&mut self.grid, generation, result) {
            effects.push(Effect::Emit(EngineEvent::GridReplaced { tiles: self.grid.len() }));
            self.request_leaderboard(&mut effects);
        }
        effects
    }

    /// The leaderboard interval ticked.
    pub fn leaderboard_tick(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.request_leaderboard(&mut effects);
        effects
    }

    /// A leaderboard poll finished.
    pub fn on_leaderboard_fetched(
        &mut self,
        generation: u64,
        result: Result<Vec<LeaderboardEntry>, FetchError>,
    ) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.leaderboard.complete(generation, result) {
            effects.push(Effect::Emit(EngineEvent::LeaderboardUpdated(
                self.leaderboard.snapshot().clone(),
            )));
        }
        if let Some(next) = self.leaderboard.follow_up() {
            effects.push(Effect::PollLeaderboard(next));
        }
        effects
    }

    fn request_leaderboard(&mut self, effects: &mut Vec<Effect>) {
        if let Some(generation) = self.leaderboard.request() {
            effects.push(Effect::PollLeaderboard(generation));
        }
    }

    fn begin_connect(&mut self, effects: &mut Vec<Effect>) {
        if let Some(session) = self.connection.begin_connect() {
            effects.push(Effect::Emit(EngineEvent::StatusChanged(ConnectionStatus::Connecting)));
            effects.push(Effect::Connect(session));
        }
    }
}

//! Sync Engine Driver
//!
//! Runs a [`SyncState`] on a single tokio task. Transport sessions and REST
//! fetches run on their own tasks and report back through one internal
//! channel, so every state change happens on the driver task in arrival
//! order. Callers talk to the driver through an [`EngineHandle`].

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, EngineConfig};
use crate::grid::{Color, Coord, GridError, GridState, ParticipantLabel};
use crate::network::api::{BlockRecord, FetchError, GridApi, HttpApi, LeaderboardEntry};
use crate::network::connection::{ConnectionStatus, SessionId};
use crate::network::transport::{Connector, TransportEvent, WebSocketConnector};
use crate::sync::events::EngineEvent;
use crate::sync::leaderboard::LeaderboardSnapshot;
use crate::sync::mutator::{ClaimIntent, ClaimOutcome};
use crate::sync::state::{Effect, SyncState};

const COMMAND_CAPACITY: usize = 64;
const INTERNAL_CAPACITY: usize = 256;

/// Engine errors.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// REST client could not be built.
    #[error("failed to build REST client: {0}")]
    Api(#[from] FetchError),

    /// Claim was outside the grid.
    #[error("claim rejected: {0}")]
    Grid(#[from] GridError),

    /// The driver task is gone.
    #[error("engine is not running")]
    Stopped,
}

/// Point-in-time copy of everything a renderer needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSnapshot {
    /// Connection status.
    pub status: ConnectionStatus,
    /// Local grid.
    pub grid: GridState,
    /// Presence count.
    pub presence: u32,
    /// Last leaderboard.
    pub leaderboard: LeaderboardSnapshot,
    /// Claims waiting for a connection.
    pub unsent_claims: usize,
}

impl EngineSnapshot {
    fn capture(state: &SyncState) -> Self {
        Self {
            status: state.status(),
            grid: state.grid().clone(),
            presence: state.presence(),
            leaderboard: state.leaderboard().clone(),
            unsent_claims: state.unsent_claims(),
        }
    }
}

enum Command {
    Claim {
        intent: ClaimIntent,
        reply: oneshot::Sender<Result<ClaimOutcome, GridError>>,
    },
    Snapshot {
        reply: oneshot::Sender<EngineSnapshot>,
    },
    Shutdown,
}

enum Internal {
    Opened {
        session: SessionId,
        outbound: mpsc::Sender<String>,
    },
    Frame {
        session: SessionId,
        text: String,
    },
    Closed {
        session: SessionId,
        reason: Option<String>,
    },
    GridFetched {
        generation: u64,
        result: Result<Vec<BlockRecord>, FetchError>,
    },
    LeaderboardFetched {
        generation: u64,
        result: Result<Vec<LeaderboardEntry>, FetchError>,
    },
}

// =============================================================================
// ENGINE
// =============================================================================

/// A configured, not yet running engine.
pub struct Engine<C: Connector, A: GridApi> {
    config: EngineConfig,
    connector: Arc<C>,
    api: Arc<A>,
}

impl Engine<WebSocketConnector, HttpApi> {
    /// Engine over a real WebSocket and the REST endpoints in `config`.
    pub fn connect(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let api = HttpApi::new(config.blocks_url(), config.leaderboard_url(), config.request_timeout)?;
        Self::new(config, WebSocketConnector::default(), api)
    }
}

impl<C: Connector, A: GridApi> Engine<C, A> {
    /// Engine over the given transport and REST client.
    pub fn new(config: EngineConfig, connector: C, api: A) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            connector: Arc::new(connector),
            api: Arc::new(api),
        })
    }

    /// Spawn the driver task.
    ///
    /// The returned receiver is subscribed before the first effect runs, so
    /// it sees the whole event stream.
    pub fn start(self) -> (EngineHandle, broadcast::Receiver<EngineEvent>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (internal_tx, internal_rx) = mpsc::channel(INTERNAL_CAPACITY);
        let (events, first_subscriber) = broadcast::channel(self.config.event_capacity);

        let driver = Driver {
            state: SyncState::new(&self.config),
            config: self.config,
            connector: self.connector,
            api: self.api,
            events: events.clone(),
            internal_tx,
            session_task: None,
            fetches: JoinSet::new(),
            reconnect_at: None,
        };
        let task = tokio::spawn(driver.run(command_rx, internal_rx));

        let handle = EngineHandle {
            commands: command_tx,
            events,
            task: Some(task),
        };
        (handle, first_subscriber)
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Caller-side handle to a running engine.
pub struct EngineHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<EngineEvent>,
    task: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Another event subscriber. Only sees events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Claim a tile.
    ///
    /// Resolves once the local grid has been painted and the capture handed
    /// to the transport (or remembered, if disconnected).
    pub async fn claim(
        &self,
        coord: Coord,
        color: Color,
        username: ParticipantLabel,
    ) -> Result<ClaimOutcome, EngineError> {
        let (reply, rx) = oneshot::channel();
        let intent = ClaimIntent::new(coord, color, username);
        self.commands
            .send(Command::Claim { intent, reply })
            .await
            .map_err(|_| EngineError::Stopped)?;
        Ok(rx.await.map_err(|_| EngineError::Stopped)??)
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> Result<EngineSnapshot, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    /// Stop the engine and wait for the driver to finish.
    pub async fn shutdown(mut self) {
        let _ = self.commands.send(Command::Shutdown).await;
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Engine task ended abnormally: {}", e);
            }
        }
    }
}

// =============================================================================
// DRIVER
// =============================================================================

struct Driver<C: Connector, A: GridApi> {
    config: EngineConfig,
    connector: Arc<C>,
    api: Arc<A>,
    state: SyncState,
    events: broadcast::Sender<EngineEvent>,
    internal_tx: mpsc::Sender<Internal>,
    session_task: Option<JoinHandle<()>>,
    fetches: JoinSet<()>,
    reconnect_at: Option<Instant>,
}

impl<C: Connector, A: GridApi> Driver<C, A> {
    #[instrument(name = "engine", skip_all)]
    async fn run(mut self, mut commands: mpsc::Receiver<Command>, mut internal: mpsc::Receiver<Internal>) {
        info!("Engine starting ({} grid, {})", self.config.bounds, self.config.ws_url);

        let period = self.config.leaderboard_interval;
        let mut leaderboard = time::interval_at(Instant::now() + period, period);
        leaderboard.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let effects = self.state.start();
        self.execute(effects);

        loop {
            let reconnect_at = self.reconnect_at;
            let reconnect = async move {
                match reconnect_at {
                    Some(at) => time::sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };

            let effects = tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Claim { intent, reply }) => match self.state.claim(intent) {
                        Ok((outcome, effects)) => {
                            let _ = reply.send(Ok(outcome));
                            effects
                        }
                        Err(e) => {
                            let _ = reply.send(Err(e));
                            Vec::new()
                        }
                    },
                    Some(Command::Snapshot { reply }) => {
                        let _ = reply.send(EngineSnapshot::capture(&self.state));
                        Vec::new()
                    }
                    Some(Command::Shutdown) | None => break,
                },

                Some(event) = internal.recv() => self.handle_internal(event),

                _ = reconnect => {
                    self.reconnect_at = None;
                    self.state.reconnect_due()
                }

                _ = leaderboard.tick() => self.state.leaderboard_tick(),

                Some(joined) = self.fetches.join_next(), if !self.fetches.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Fetch task failed: {}", e);
                    }
                    Vec::new()
                }
            };

            self.execute(effects);
        }

        let effects = self.state.shutdown();
        self.execute(effects);
        if let Some(task) = self.session_task.take() {
            task.abort();
        }
        self.fetches.abort_all();
        info!("Engine stopped");
    }

    fn handle_internal(&mut self, event: Internal) -> Vec<Effect> {
        match event {
            Internal::Opened { session, outbound } => self.state.on_session_opened(session, outbound),
            Internal::Frame { session, text } => self.state.on_frame(session, &text),
            Internal::Closed { session, reason } => self.state.on_session_closed(session, reason.as_deref()),
            Internal::GridFetched { generation, result } => self.state.on_grid_fetched(generation, result),
            Internal::LeaderboardFetched { generation, result } => {
                self.state.on_leaderboard_fetched(generation, result)
            }
        }
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Connect(session) => self.spawn_session(session),
                Effect::ScheduleReconnect(delay) => self.schedule_reconnect(delay),
                Effect::FetchGrid(generation) => {
                    let api = self.api.clone();
                    let tx = self.internal_tx.clone();
                    self.fetches.spawn(async move {
                        let result = api.fetch_blocks().await;
                        let _ = tx.send(Internal::GridFetched { generation, result }).await;
                    });
                }
                Effect::PollLeaderboard(generation) => {
                    let api = self.api.clone();
                    let tx = self.internal_tx.clone();
                    self.fetches.spawn(async move {
                        let result = api.fetch_leaderboard().await;
                        let _ = tx.send(Internal::LeaderboardFetched { generation, result }).await;
                    });
                }
                Effect::Emit(event) => {
                    // No subscribers is fine.
                    let _ = self.events.send(event);
                }
            }
        }
    }

    fn spawn_session(&mut self, session: SessionId) {
        if let Some(old) = self.session_task.take() {
            old.abort();
        }
        let connector = self.connector.clone();
        let url = self.config.ws_url.clone();
        let connect_timeout = self.config.connect_timeout;
        let tx = self.internal_tx.clone();
        self.session_task = Some(tokio::spawn(run_session(
            connector,
            url,
            connect_timeout,
            session,
            tx,
        )));
    }

    fn schedule_reconnect(&mut self, delay: Duration) {
        debug!("Reconnecting in {:?}", delay);
        self.reconnect_at = Some(Instant::now() + delay);
    }
}

/// One transport session, from open to close. Everything it reports carries
/// `session` so the state can ignore it once superseded.
///
/// A handshake that outlasts `connect_timeout` is reported as a close, so the
/// usual reconnect delay applies.
async fn run_session<C: Connector>(
    connector: Arc<C>,
    url: String,
    connect_timeout: Duration,
    session: SessionId,
    tx: mpsc::Sender<Internal>,
) {
    let channel = match time::timeout(connect_timeout, connector.open(&url)).await {
        Ok(Ok(channel)) => channel,
        Ok(Err(e)) => {
            let _ = tx.send(Internal::Closed { session, reason: Some(e.to_string()) }).await;
            return;
        }
        Err(_) => {
            let reason = "handshake timed out".to_string();
            let _ = tx.send(Internal::Closed { session, reason: Some(reason) }).await;
            return;
        }
    };

    let mut inbound = channel.inbound;
    if tx.send(Internal::Opened { session, outbound: channel.outbound }).await.is_err() {
        return;
    }

    let reason = loop {
        match inbound.recv().await {
            Some(TransportEvent::Frame(text)) => {
                if tx.send(Internal::Frame { session, text }).await.is_err() {
                    return;
                }
            }
            Some(TransportEvent::Closed { reason }) => break reason,
            None => break None,
        }
    };

    let _ = tx.send(Internal::Closed { session, reason }).await;
}

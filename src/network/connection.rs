//! Connection Management
//!
//! Lifecycle state machine for the single live transport session.
//!
//! ```text
//!   Disconnected ──begin_connect──▶ Connecting ──on_opened──▶ Connected
//!        ▲                              │                         │
//!        └──────────── on_closed ───────┴─────────────────────────┘
//! ```
//!
//! There is no terminal state while the engine runs: every close is followed
//! by a reconnect after a constant delay. Session ids are captured when a
//! session is spawned so late callbacks from a superseded session are ignored.

use std::fmt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::network::protocol::{ClientMessage, ServerMessage};

/// Identity of one transport session. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(u64);

impl SessionId {
    /// Raw sequence number.
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No live session; a reconnect is pending unless shut down.
    #[default]
    Disconnected,
    /// Session spawned, handshake in progress.
    Connecting,
    /// Session open; sends go through.
    Connected,
}

/// Owns the current transport session and its status.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    status: ConnectionStatus,
    current: Option<SessionId>,
    next_id: u64,
    outbound: Option<mpsc::Sender<String>>,
    /// Sessions that reached Connected.
    established: u64,
    shut_down: bool,
}

impl ConnectionManager {
    /// Create a manager in the Disconnected state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Whether sends currently go through.
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Current session, if any.
    pub fn current_session(&self) -> Option<SessionId> {
        self.current
    }

    /// Number of sessions that have reached Connected so far.
    pub fn established_count(&self) -> u64 {
        self.established
    }

    /// Whether `shutdown` was called.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    /// Disconnected -> Connecting.
    ///
    /// Mints a fresh session and supersedes any previous one. Returns `None`
    /// after shutdown or when a session is already live.
    pub fn begin_connect(&mut self) -> Option<SessionId> {
        if self.shut_down || self.status != ConnectionStatus::Disconnected {
            return None;
        }

        self.next_id += 1;
        let session = SessionId(self.next_id);
        self.current = Some(session);
        self.outbound = None;
        self.status = ConnectionStatus::Connecting;
        debug!("Session {} connecting", session);
        Some(session)
    }

    /// Connecting -> Connected.
    ///
    /// Returns `false` (and drops `outbound`, closing the channel) if
    /// `session` is not the current one.
    pub fn on_opened(&mut self, session: SessionId, outbound: mpsc::Sender<String>) -> bool {
        if !self.is_current(session) || self.status != ConnectionStatus::Connecting {
            debug!("Ignoring open from stale session {}", session);
            return false;
        }

        self.outbound = Some(outbound);
        self.status = ConnectionStatus::Connected;
        self.established += 1;
        info!("Session {} connected", session);
        true
    }

    /// Connected/Connecting -> Disconnected.
    ///
    /// Returns `true` if the current session closed and a reconnect should be
    /// scheduled.
    pub fn on_closed(&mut self, session: SessionId, reason: Option<&str>) -> bool {
        if !self.is_current(session) || self.status == ConnectionStatus::Disconnected {
            debug!("Ignoring close from stale session {}", session);
            return false;
        }

        self.outbound = None;
        self.status = ConnectionStatus::Disconnected;
        match reason {
            Some(reason) => warn!("Session {} closed: {}", session, reason),
            None => info!("Session {} closed", session),
        }
        !self.shut_down
    }

    /// Parse a frame from `session`.
    ///
    /// Frames from superseded sessions and malformed frames yield `None`.
    pub fn decode(&self, session: SessionId, frame: &str) -> Option<ServerMessage> {
        if !self.is_current(session) {
            debug!("Dropping frame from stale session {}", session);
            return None;
        }

        match ServerMessage::from_json(frame) {
            Ok(msg) => Some(msg),
            Err(e) => {
                warn!("Failed to parse server message: {} - {}", e, frame);
                None
            }
        }
    }

    /// Send a message on the live session.
    ///
    /// Silently dropped (returns `false`) unless Connected. Never queues
    /// beyond the transport's own buffer and never blocks.
    pub fn send(&self, msg: &ClientMessage) -> bool {
        let Some(outbound) = self.outbound.as_ref().filter(|_| self.is_connected()) else {
            debug!("Not connected, dropping {:?}", msg);
            return false;
        };

        let json = match msg.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize message: {}", e);
                return false;
            }
        };

        match outbound.try_send(json) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbound buffer full, dropping {:?}", msg);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Outbound channel closed, dropping {:?}", msg);
                false
            }
        }
    }

    /// Close the live session for good. No reconnect follows.
    pub fn shutdown(&mut self) {
        self.shut_down = true;
        self.outbound = None;
        self.current = None;
        self.status = ConnectionStatus::Disconnected;
        info!("Connection shut down");
    }

    fn is_current(&self, session: SessionId) -> bool {
        self.current == Some(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{Color, Coord, ParticipantLabel};
    use crate::network::protocol::CaptureRequest;

    fn capture() -> ClientMessage {
        ClientMessage::Capture(CaptureRequest::new(
            Coord::new(1, 1),
            Color::new("#2ecc71"),
            ParticipantLabel::new("Alice"),
        ))
    }

    #[test]
    fn test_lifecycle() {
        let mut conn = ConnectionManager::new();
        assert_eq!(conn.status(), ConnectionStatus::Disconnected);

        let session = conn.begin_connect().unwrap();
        assert_eq!(conn.status(), ConnectionStatus::Connecting);

        let (tx, _rx) = mpsc::channel(10);
        assert!(conn.on_opened(session, tx));
        assert!(conn.is_connected());
        assert_eq!(conn.established_count(), 1);

        assert!(conn.on_closed(session, Some("reset")));
        assert_eq!(conn.status(), ConnectionStatus::Disconnected);

        let next = conn.begin_connect().unwrap();
        assert_ne!(next, session);
        assert!(next > session);
    }

    #[test]
    fn test_cannot_begin_twice() {
        let mut conn = ConnectionManager::new();
        conn.begin_connect().unwrap();
        assert!(conn.begin_connect().is_none());
    }

    #[test]
    fn test_failed_handshake_goes_back_to_disconnected() {
        let mut conn = ConnectionManager::new();
        let session = conn.begin_connect().unwrap();
        assert!(conn.on_closed(session, Some("refused")));
        assert_eq!(conn.status(), ConnectionStatus::Disconnected);
        assert_eq!(conn.established_count(), 0);
    }

    #[test]
    fn test_stale_session_is_ignored() {
        let mut conn = ConnectionManager::new();
        let old = conn.begin_connect().unwrap();
        conn.on_closed(old, None);
        let new = conn.begin_connect().unwrap();

        // Late open from the superseded session must not flip status.
        let (tx, _rx) = mpsc::channel(10);
        assert!(!conn.on_opened(old, tx));
        assert_eq!(conn.status(), ConnectionStatus::Connecting);

        let (tx, _rx) = mpsc::channel(10);
        assert!(conn.on_opened(new, tx));

        // Late close from the superseded session must not disconnect.
        assert!(!conn.on_closed(old, None));
        assert!(conn.is_connected());

        assert!(conn.decode(old, r#"{"type":"user_count","count":1}"#).is_none());
        assert!(conn.decode(new, r#"{"type":"user_count","count":1}"#).is_some());
    }

    #[test]
    fn test_send_requires_connected() {
        let mut conn = ConnectionManager::new();
        assert!(!conn.send(&capture()));

        let session = conn.begin_connect().unwrap();
        assert!(!conn.send(&capture()));

        let (tx, mut rx) = mpsc::channel(10);
        conn.on_opened(session, tx);
        assert!(conn.send(&capture()));

        let frame = rx.try_recv().unwrap();
        assert_eq!(ClientMessage::from_json(&frame).unwrap(), capture());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_drops_when_buffer_full() {
        let mut conn = ConnectionManager::new();
        let session = conn.begin_connect().unwrap();
        let (tx, _rx) = mpsc::channel(1);
        conn.on_opened(session, tx);

        assert!(conn.send(&capture()));
        assert!(!conn.send(&capture()));
    }

    #[test]
    fn test_malformed_frame_is_dropped() {
        let mut conn = ConnectionManager::new();
        let session = conn.begin_connect().unwrap();
        assert!(conn.decode(session, "{oops").is_none());
        assert_eq!(
            conn.decode(session, r#"{"type":"something_new"}"#),
            Some(ServerMessage::Unknown)
        );
    }

    #[test]
    fn test_shutdown_stops_reconnects() {
        let mut conn = ConnectionManager::new();
        let session = conn.begin_connect().unwrap();
        let (tx, _rx) = mpsc::channel(10);
        conn.on_opened(session, tx);

        conn.shutdown();
        assert_eq!(conn.status(), ConnectionStatus::Disconnected);
        assert!(!conn.on_closed(session, None));
        assert!(conn.begin_connect().is_none());
        assert!(!conn.send(&capture()));
    }
}

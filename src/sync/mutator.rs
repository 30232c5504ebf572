//! Optimistic Mutation
//!
//! A claim paints the local grid first and tells the server second. Claims
//! are not tracked per cell: if the server disagrees it answers with an
//! `error` and the whole grid is refetched.
//!
//! Claims made while the transport is down still paint locally; their
//! capture messages are remembered in a small FIFO tagged with the session
//! they were attempted under, and the configured [`UnsentClaimPolicy`]
//! decides their fate on the next connection.

use std::collections::VecDeque;
use tracing::{debug, info};

use crate::grid::{Color, Coord, GridError, GridState, ParticipantLabel};
use crate::network::connection::{ConnectionManager, SessionId};
use crate::network::protocol::{CaptureRequest, ClientMessage};

/// Default capacity of the unsent claim queue.
pub const DEFAULT_MAX_UNSENT_CLAIMS: usize = 64;

/// What happens to claims that could not be sent once the transport is back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnsentClaimPolicy {
    /// Forget them; the next resync shows the server's view.
    #[default]
    Discard,
    /// Send them, oldest first, on the new session.
    Replay,
}

/// A request to paint one tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimIntent {
    /// Target cell.
    pub coord: Coord,
    /// Requested color.
    pub color: Color,
    /// Requesting participant.
    pub username: ParticipantLabel,
}

impl ClaimIntent {
    /// Build an intent.
    pub fn new(coord: Coord, color: Color, username: ParticipantLabel) -> Self {
        Self { coord, color, username }
    }

    fn to_message(&self) -> ClientMessage {
        ClientMessage::Capture(CaptureRequest::new(
            self.coord,
            self.color.clone(),
            self.username.clone(),
        ))
    }
}

/// A claim whose capture message never left the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsentClaim {
    /// The claim.
    pub intent: ClaimIntent,
    /// Session current when it was attempted (`None` between sessions).
    pub session: Option<SessionId>,
}

/// Result of one claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimOutcome {
    /// The local grid changed.
    pub grid_changed: bool,
    /// The capture message was handed to the transport.
    pub sent: bool,
}

/// What [`OptimisticMutator::on_reconnected`] did with the remembered claims.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Claims sent on the new session.
    pub replayed: usize,
    /// Claims dropped unsent. The local grid still shows them, so the caller
    /// must refetch.
    pub discarded: usize,
}

/// Applies claims ahead of server confirmation.
#[derive(Debug)]
pub struct OptimisticMutator {
    policy: UnsentClaimPolicy,
    capacity: usize,
    unsent: VecDeque<UnsentClaim>,
}

impl Default for OptimisticMutator {
    fn default() -> Self {
        Self::new(UnsentClaimPolicy::default(), DEFAULT_MAX_UNSENT_CLAIMS)
    }
}

impl OptimisticMutator {
    /// Create a mutator with the given unsent-claim policy and queue capacity.
    pub fn new(policy: UnsentClaimPolicy, capacity: usize) -> Self {
        Self {
            policy,
            capacity,
            unsent: VecDeque::new(),
        }
    }

    /// Configured policy.
    pub fn policy(&self) -> UnsentClaimPolicy {
        self.policy
    }

    /// Claims waiting for a connection, oldest first.
    pub fn unsent(&self) -> impl Iterator<Item = &UnsentClaim> {
        self.unsent.iter()
    }

    /// Paint `intent.coord` locally and send the capture.
    ///
    /// The local write happens synchronously before this returns, whether or
    /// not the message could be sent. Only an out-of-bounds coordinate fails,
    /// and then nothing happens at all.
    pub fn claim(
        &mut self,
        grid: &mut GridState,
        conn: &ConnectionManager,
        intent: ClaimIntent,
    ) -> Result<ClaimOutcome, GridError> {
        let grid_changed = grid.set(intent.coord, intent.color.clone())?;
        let sent = conn.send(&intent.to_message());

        if !sent {
            debug!("Claim on {} not sent, remembering it", intent.coord);
            self.remember(UnsentClaim {
                intent,
                session: conn.current_session(),
            });
        }

        Ok(ClaimOutcome { grid_changed, sent })
    }

    /// Apply the policy to every remembered claim.
    pub fn on_reconnected(&mut self, conn: &ConnectionManager) -> Reconciled {
        if self.unsent.is_empty() {
            return Reconciled::default();
        }

        match self.policy {
            UnsentClaimPolicy::Discard => {
                let discarded = self.unsent.len();
                info!("Discarding {} claims made while disconnected", discarded);
                self.unsent.clear();
                Reconciled { replayed: 0, discarded }
            }
            UnsentClaimPolicy::Replay => {
                let pending = std::mem::take(&mut self.unsent);
                let total = pending.len();
                let mut replayed = 0;
                for claim in pending {
                    if conn.send(&claim.intent.to_message()) {
                        replayed += 1;
                    } else {
                        self.remember(claim);
                    }
                }
                info!("Replayed {}/{} claims made while disconnected", replayed, total);
                Reconciled { replayed, discarded: 0 }
            }
        }
    }

    fn remember(&mut self, claim: UnsentClaim) {
        if self.capacity == 0 {
            return;
        }
        while self.unsent.len() >= self.capacity {
            self.unsent.pop_front();
        }
        self.unsent.push_back(claim);
    }
}

//! Sync Layer
//!
//! Owns every piece of client state and the rules that change it. The
//! [`state`] module is a plain state machine; [`engine`] drives it on a
//! tokio task and turns its effects into I/O.

pub mod engine;
pub mod events;
pub mod leaderboard;
pub mod mutator;
pub mod presence;
pub mod resync;
pub mod state;

pub use engine::{Engine, EngineError, EngineHandle, EngineSnapshot};
pub use events::EngineEvent;
pub use leaderboard::{local_count, LeaderboardPoller, LeaderboardSnapshot, Standing};
pub use mutator::{ClaimIntent, ClaimOutcome, OptimisticMutator, Reconciled, UnsentClaim, UnsentClaimPolicy};
pub use presence::PresenceTracker;
pub use resync::{ResyncReason, Resynchronizer};
pub use state::{Effect, SyncState};

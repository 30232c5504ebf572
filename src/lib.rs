//! # ColorGrid Sync
//!
//! Client-side synchronization engine for a shared, multiplayer grid of
//! colored tiles.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    COLORGRID SYNC                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  grid/           - Local replica                             │
//! │  ├── coord.rs    - Bounds and cell coordinates               │
//! │  └── state.rs    - Colors and the tile map                   │
//! │                                                              │
//! │  network/        - I/O edges                                 │
//! │  ├── protocol.rs - Real-time message types                   │
//! │  ├── transport.rs- WebSocket sessions                        │
//! │  ├── connection.rs- Session lifecycle                        │
//! │  └── api.rs      - REST snapshot fetches                     │
//! │                                                              │
//! │  sync/           - State and the rules that change it        │
//! │  ├── mutator.rs  - Optimistic claims                         │
//! │  ├── resync.rs   - Full-grid refetch                         │
//! │  ├── presence.rs - Connected participant count               │
//! │  ├── leaderboard.rs - Ranking polls                          │
//! │  ├── state.rs    - I/O-free state machine                    │
//! │  └── engine.rs   - Async driver and handle                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Consistency
//!
//! The server is authoritative. Local claims are painted immediately and
//! never rolled back individually; any `error` from the server triggers a
//! full refetch that replaces the local grid wholesale. Between refetches
//! the grid is last-write-wins per cell in message arrival order.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod grid;
pub mod network;
pub mod sync;

// Re-export commonly used types
pub use config::{ConfigError, EngineConfig};
pub use grid::{Color, Coord, GridBounds, GridError, GridState, ParticipantLabel, PALETTE};
pub use network::{ConnectionStatus, HttpApi, WebSocketConnector};
pub use sync::{Engine, EngineError, EngineEvent, EngineHandle, EngineSnapshot};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

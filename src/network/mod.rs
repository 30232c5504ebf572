//! Network Layer
//!
//! Real-time channel to the game server plus REST snapshot fetches.
//! Nothing here touches the grid; the `sync` layer owns all state changes.

pub mod api;
pub mod connection;
pub mod protocol;
pub mod transport;

pub use api::{BlockRecord, FetchError, GridApi, HttpApi, LeaderboardEntry};
pub use connection::{ConnectionManager, ConnectionStatus, SessionId};
pub use protocol::{CaptureRequest, ClientMessage, ServerError, ServerMessage, TileUpdate};
pub use transport::{Connector, TransportChannel, TransportError, TransportEvent, WebSocketConnector};

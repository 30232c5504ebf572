//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are JSON text frames.

use serde::{Deserialize, Deserializer, Serialize};

use crate::grid::{Color, Coord, GridBounds, GridError, ParticipantLabel};

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Paint a tile.
    Capture(CaptureRequest),
}

/// Tile claim request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureRequest {
    /// Column.
    pub x: u32,
    /// Row.
    pub y: u32,
    /// Requested color.
    pub color: Color,
    /// Self-asserted participant name.
    pub username: ParticipantLabel,
}

impl CaptureRequest {
    /// Build a request for `coord`.
    pub fn new(coord: Coord, color: Color, username: ParticipantLabel) -> Self {
        Self {
            x: coord.x,
            y: coord.y,
            color,
            username,
        }
    }

    /// Target coordinate.
    pub fn coord(&self) -> Coord {
        Coord::new(self.x, self.y)
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
///
/// Unrecognized `type` values decode to [`ServerMessage::Unknown`] so newer
/// servers can add message kinds without breaking older clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A tile changed color. Older servers send this as `update`.
    #[serde(alias = "update")]
    BlockUpdate(TileUpdate),

    /// Number of currently connected participants.
    UserCount {
        /// Participants online.
        count: u32,
    },

    /// A capture was rejected.
    Error(ServerError),

    /// Any other message kind.
    #[serde(other)]
    Unknown,
}

/// Tile change broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileUpdate {
    /// Column (signed on the wire; validated against the grid bounds).
    pub x: i64,
    /// Row.
    pub y: i64,
    /// New color.
    pub color: Color,
    /// Who painted it, when the server says.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
}

impl TileUpdate {
    /// Validated coordinate.
    pub fn coord(&self, bounds: GridBounds) -> Result<Coord, GridError> {
        bounds.checked(self.x, self.y)
    }
}

/// Server rejection.
///
/// Any `error` frame decodes, whatever its payload: the resync it forces
/// must not depend on the server filling in `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    /// Human-readable message, shown to the participant as-is. Empty when
    /// the server sent none.
    #[serde(default, deserialize_with = "lenient_message")]
    pub message: String,
}

/// Strings pass through, `null` becomes empty, anything else is rendered as JSON.
fn lenient_message<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(message) => message,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_capture_wire_shape() {
        let msg = ClientMessage::Capture(CaptureRequest::new(
            Coord::new(3, 4),
            Color::new("#3498db"),
            ParticipantLabel::new("Alice"),
        ));

        let value: Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value, json!({
            "action": "capture",
            "x": 3,
            "y": 4,
            "color": "#3498db",
            "username": "Alice",
        }));
    }

    #[test]
    fn test_block_update_and_update_alias() {
        for kind in ["block_update", "update"] {
            let text = format!(r##"{{"type":"{}","x":1,"y":2,"color":"#e74c3c"}}"##, kind);
            let msg = ServerMessage::from_json(&text).unwrap();
            if let ServerMessage::BlockUpdate(update) = msg {
                assert_eq!(update.coord(GridBounds::default()).unwrap(), Coord::new(1, 2));
                assert_eq!(update.color, Color::new("#e74c3c"));
                assert_eq!(update.owner_name, None);
            } else {
                panic!("Wrong message type for {}", kind);
            }
        }
    }

    #[test]
    fn test_update_with_owner_name() {
        let text = r##"{"type":"update","x":0,"y":0,"color":"#fff","owner_name":"Bob"}"##;
        let msg = ServerMessage::from_json(text).unwrap();
        assert!(matches!(
            msg,
            ServerMessage::BlockUpdate(TileUpdate { owner_name: Some(ref n), .. }) if n == "Bob"
        ));
    }

    #[test]
    fn test_user_count() {
        let msg = ServerMessage::from_json(r#"{"type":"user_count","count":7}"#).unwrap();
        assert_eq!(msg, ServerMessage::UserCount { count: 7 });
    }

    #[test]
    fn test_error_message() {
        let msg = ServerMessage::from_json(r#"{"type":"error","message":"Block is locked!"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Error(ServerError {
            message: "Block is locked!".to_string(),
        }));
    }

    #[test]
    fn test_error_without_usable_message_still_decodes() {
        for frame in [
            r#"{"type":"error"}"#,
            r#"{"type":"error","message":null}"#,
        ] {
            let msg = ServerMessage::from_json(frame).unwrap();
            assert_eq!(msg, ServerMessage::Error(ServerError { message: String::new() }));
        }

        let msg = ServerMessage::from_json(r#"{"type":"error","message":{"code":4}}"#).unwrap();
        assert_eq!(msg, ServerMessage::Error(ServerError {
            message: r#"{"code":4}"#.to_string(),
        }));
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let msg = ServerMessage::from_json(r#"{"type":"chat","text":"hi"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown);
    }

    #[test]
    fn test_missing_type_fails() {
        assert!(ServerMessage::from_json(r#"{"count":7}"#).is_err());
        assert!(ServerMessage::from_json("not json").is_err());
    }

    #[test]
    fn test_out_of_bounds_update_decodes_but_fails_validation() {
        let msg = ServerMessage::from_json(r##"{"type":"update","x":-1,"y":2,"color":"#fff"}"##).unwrap();
        if let ServerMessage::BlockUpdate(update) = msg {
            assert!(update.coord(GridBounds::default()).is_err());
        } else {
            panic!("Wrong message type");
        }
    }
}

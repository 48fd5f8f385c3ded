//! WebSocket protocol messages for the Salem room server.
//!
//! Room management travels in these wrappers; game traffic is the shared
//! [`Envelope`] format carried verbatim inside `Game`.

use salem_core::Envelope;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    /// Open a new room; the sender becomes its host display
    CreateRoom,

    /// Attach this connection to an existing room
    JoinRoom { room_code: String },

    /// Leave current room
    LeaveRoom,

    /// Deal and start character selection (host display only)
    StartGame,

    /// Back to the lobby with the same players (host display only)
    PlayAgain,

    /// A game envelope for the room's host session
    Game(Envelope),

    /// Ping for keepalive
    Ping,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    /// Welcome message with assigned connection ID
    Welcome { connection_id: Uuid },

    /// Room created successfully
    RoomCreated { room_code: String },

    /// Joined room successfully
    JoinedRoom { room_code: String },

    /// Left room successfully
    LeftRoom,

    /// A game envelope from the room's host session
    Game(Envelope),

    /// Error occurred
    Error { message: String },

    /// Pong response
    Pong,
}

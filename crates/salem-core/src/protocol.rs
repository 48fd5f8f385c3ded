//! Wire format shared by the host and its participants.
//!
//! Every message travels in an [`Envelope`]:
//!
//! ```json
//! { "type": "card_played", "data": { "cardId": "...", "targetId": "..." },
//!   "senderId": "p1", "timestamp": 1700000000000 }
//! ```

use crate::actions::GameEvent;
use crate::characters::CharacterId;
use crate::game::{GameError, GameState};
use crate::player::PlayerId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Id used by a host that only displays the table and does not play
pub const HOST_DISPLAY_ID: &str = "host_display";

/// Room codes avoid glyphs that are easy to confuse (I, O, 0, 1)
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const ROOM_CODE_LEN: usize = 4;

/// Generate a random room code
pub fn generate_room_code<R: Rng>(rng: &mut R) -> String {
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Which night role a `night_action` is for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NightActionType {
    WitchKill,
    ConstableProtect,
}

/// Message bodies, tagged by `type` with the payload under `data`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum Message {
    // ==================== Participant -> Host ====================
    PlayerJoin {
        player_id: PlayerId,
        player_name: String,
    },
    PlayerLeave {
        player_id: PlayerId,
    },
    CharacterSelected {
        player_id: PlayerId,
        character_id: CharacterId,
    },
    CardPlayed {
        card_id: String,
        target_id: PlayerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        second_target_id: Option<PlayerId>,
    },
    NightAction {
        action_type: NightActionType,
        target_id: PlayerId,
    },
    DrawCards {},
    EndTurn {},
    /// Answer to a pending ability choice: an own card index or another player
    ChoiceMade {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        index: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_id: Option<PlayerId>,
    },
    RequestState {},

    // ==================== Host -> Participant ====================
    /// Full authoritative snapshot
    StateSync {
        state: Box<GameState>,
    },
    /// Outcome of the sender's last intent
    ActionResult {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(default)]
        events: Vec<GameEvent>,
    },
}

impl Message {
    /// Snake-case wire name of this message
    pub fn kind(&self) -> &'static str {
        match self {
            Message::PlayerJoin { .. } => "player_join",
            Message::PlayerLeave { .. } => "player_leave",
            Message::CharacterSelected { .. } => "character_selected",
            Message::CardPlayed { .. } => "card_played",
            Message::NightAction { .. } => "night_action",
            Message::DrawCards {} => "draw_cards",
            Message::EndTurn {} => "end_turn",
            Message::ChoiceMade { .. } => "choice_made",
            Message::RequestState {} => "request_state",
            Message::StateSync { .. } => "state_sync",
            Message::ActionResult { .. } => "action_result",
        }
    }

    pub fn action_ok(events: Vec<GameEvent>) -> Self {
        Message::ActionResult {
            success: true,
            reason: None,
            events,
        }
    }

    pub fn action_failed(error: &GameError) -> Self {
        Message::ActionResult {
            success: false,
            reason: Some(error.to_string()),
            events: Vec::new(),
        }
    }
}

/// A message plus who sent it and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(flatten)]
    pub message: Message,
    pub sender_id: PlayerId,
    pub timestamp: u64,
}

impl Envelope {
    pub fn new(sender_id: PlayerId, message: Message) -> Self {
        Self {
            message,
            sender_id,
            timestamp: now_millis(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

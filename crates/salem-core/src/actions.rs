//! Intents players submit and the events that result from them.
//!
//! `GameAction` covers everything a participant (or a bot driver) can do once
//! the round is under way. Lobby operations such as joining or choosing a
//! character have dedicated methods on `GameState`.

use crate::cards::TryalKind;
use crate::characters::CharacterId;
use crate::player::PlayerId;
use serde::{Deserialize, Serialize};

/// All in-round intents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameAction {
    // ==================== Turn Actions ====================
    /// Draw cards (two, or more with an ability)
    Draw,
    /// Play a card from hand on a target
    PlayCard {
        card_id: String,
        target_id: PlayerId,
        second_target_id: Option<PlayerId>,
    },
    /// End your turn
    EndTurn,

    // ==================== Night Actions ====================
    /// Witches nominate the player to kill
    WitchKill { target_id: PlayerId },
    /// The constable nominates the player to protect
    ConstableProtect { target_id: PlayerId },

    // ==================== Ability Choices ====================
    /// Pick which of your own hidden Tryal cards is revealed
    ChooseOwnTryal { index: usize },
    /// Reveal a Tryal card of another player
    RevealOther { target_id: PlayerId },
}

/// Night roles that may submit a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NightRole {
    Witch,
    Constable,
}

/// How a game ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Villagers,
    Witches,
    /// Nobody was left to take a turn
    Draw,
}

/// Why a night target survived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Survival {
    Constable,
    Shelter,
    Ability(CharacterId),
}

/// A player leaving one Tryal card with their neighbour during Malice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryalTransfer {
    pub from: PlayerId,
    pub to: PlayerId,
    pub card_id: String,
}

/// Events that occur as a result of actions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEvent {
    // ==================== Lobby ====================
    PlayerJoined { player: PlayerId },
    PlayerRejoined { player: PlayerId },
    PlayerLeft { player: PlayerId },

    /// Tryal cards dealt and the Black Cat handed out
    GameSetUp {
        first_player: PlayerId,
        total_witches: u32,
    },
    CharacterSelected {
        player: PlayerId,
        character: CharacterId,
    },
    /// A character looked at one of their own Tryal cards
    TryalPeeked {
        player: PlayerId,
        index: usize,
        kind: TryalKind,
    },
    /// A character started with a blue card
    BlueCardGranted { player: PlayerId, card_id: String },
    /// All characters chosen, first turn begins
    PlayStarted { first_player: PlayerId },

    // ==================== Turns ====================
    CardsDrawn {
        player: PlayerId,
        card_ids: Vec<String>,
    },
    /// A character looked at the top of the deck before drawing
    DeckPeeked {
        player: PlayerId,
        card_ids: Vec<String>,
    },
    CardPlayed {
        player: PlayerId,
        card_id: String,
        target: PlayerId,
    },
    TurnSkipped { player: PlayerId },
    TurnEnded {
        player: PlayerId,
        next_player: PlayerId,
    },

    // ==================== Card Effects ====================
    Accused {
        target: PlayerId,
        amount: u32,
        total: u32,
    },
    AccusationsCleared { target: PlayerId, cleared: u32 },
    PlacedInStocks { target: PlayerId },
    AccusationsMoved {
        from: PlayerId,
        to: PlayerId,
        amount: u32,
    },
    BlueCardsMoved {
        from: PlayerId,
        to: PlayerId,
        count: usize,
    },
    HandBurned { target: PlayerId, count: usize },
    HandStolen {
        from: PlayerId,
        to: PlayerId,
        count: usize,
    },
    BlueCardAttached { target: PlayerId, card_id: String },
    PlayersLinked { first: PlayerId, second: PlayerId },
    /// A character's immunity swallowed a green card
    GreenCardBlocked { target: PlayerId, card_id: String },

    // ==================== Reveals ====================
    /// Accusations reached the threshold; a Tryal card must be revealed
    RevealRequired {
        player: PlayerId,
        triggered_by: PlayerId,
    },
    /// A player must make an ability choice before play continues
    ChoicePending { chooser: PlayerId },
    TryalRevealed {
        player: PlayerId,
        card_id: String,
        kind: TryalKind,
        revealed_by: Option<PlayerId>,
    },
    /// All Tryal cards of a player are revealed and none is a witch
    InnocentExecuted { player: PlayerId },

    // ==================== Night & Malice ====================
    NightFell { drawn_by: PlayerId },
    NightActionRecorded { player: PlayerId, role: NightRole },
    PlayerSurvived { player: PlayerId, reason: Survival },
    PlayerKilled { player: PlayerId },
    /// A matchmaker partner died alongside the night victim
    LinkedDeath { player: PlayerId, partner: PlayerId },
    NightEnded,
    MaliceDrawn { drawn_by: PlayerId },
    TryalsPassed { transfers: Vec<TryalTransfer> },

    // ==================== Game Over ====================
    GameWon { outcome: Outcome },
}

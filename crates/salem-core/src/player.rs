//! Player records.
//!
//! This module contains:
//! - `PlayerId`, the durable identity a participant keeps across reconnects
//! - `Player`, holding the hidden Tryal pool, hand, blue cards and accusations

use crate::cards::{BlueEffect, Card, TryalCard};
use crate::characters::{CharacterId, DEFAULT_REVEAL_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Avatars handed out by join order
const AVATARS: [&str; 12] = [
    "👤", "👩", "👨", "👵", "👴", "🧔", "👱", "👩‍🦰", "👨‍🦳", "👩‍🦱", "🧑", "👧",
];

/// Stable player identity, assigned at join and never reused
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Avatar for the n-th player to join
pub fn avatar_for(index: usize) -> String {
    AVATARS[index % AVATARS.len()].to_string()
}

/// A single player's state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub avatar: String,
    pub is_alive: bool,
    /// Current effective role
    pub is_witch: bool,
    /// Once set, stays set for the rest of the round
    pub was_witch: bool,
    pub is_constable: bool,
    /// Hidden role cards, in reveal order
    pub tryal_cards: Vec<TryalCard>,
    pub hand_cards: Vec<Card>,
    /// Persistent face-up cards
    pub blue_cards: Vec<Card>,
    pub accusations: u32,
    pub character_id: Option<CharacterId>,
    pub is_skipped: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: String, avatar: String) -> Self {
        Self {
            id,
            name,
            avatar,
            is_alive: true,
            is_witch: false,
            was_witch: false,
            is_constable: false,
            tryal_cards: Vec::new(),
            hand_cards: Vec::new(),
            blue_cards: Vec::new(),
            accusations: 0,
            character_id: None,
            is_skipped: false,
        }
    }

    /// Clear everything dealt during a round, keeping identity
    pub fn reset_for_new_round(&mut self) {
        *self = Self::new(self.id.clone(), self.name.clone(), self.avatar.clone());
    }

    /// Recompute roles from the Tryal pool. Witch status is sticky.
    pub fn refresh_roles(&mut self) {
        if self.tryal_cards.iter().any(|c| c.is_witch()) {
            self.was_witch = true;
        }
        self.is_witch = self.was_witch;
        self.is_constable = self.tryal_cards.iter().any(|c| c.is_constable());
    }

    /// Index of the next card a forced reveal exposes
    pub fn first_hidden_tryal(&self) -> Option<usize> {
        self.tryal_cards.iter().position(|c| !c.revealed)
    }

    pub fn hidden_tryal_count(&self) -> usize {
        self.tryal_cards.iter().filter(|c| !c.revealed).count()
    }

    pub fn all_tryals_revealed(&self) -> bool {
        self.tryal_cards.iter().all(|c| c.revealed)
    }

    pub fn has_blue(&self, effect: BlueEffect) -> bool {
        self.blue_cards
            .iter()
            .any(|c| c.blue_effect() == Some(effect))
    }

    /// Whether red cards played on this player are blocked
    pub fn is_protected_from_accusations(&self) -> bool {
        self.blue_cards
            .iter()
            .filter_map(|c| c.blue_effect())
            .any(|e| e.blocks_accusations())
    }

    pub fn has_card_in_hand(&self, card_id: &str) -> bool {
        self.hand_cards.iter().any(|c| c.id == card_id)
    }

    pub fn reveal_threshold(&self) -> u32 {
        self.character_id
            .map(|c| c.reveal_threshold())
            .unwrap_or(DEFAULT_REVEAL_THRESHOLD)
    }
}

//! Card definitions and deck construction.
//!
//! This module contains:
//! - Tryal cards (the hidden role pool)
//! - Playing cards: red accusations, green one-shot effects, blue persistent cards
//! - Black event cards (Black Cat, Malice, Night)
//! - Setup configuration by player count
//!
//! Effect kinds are resolved here, once, when the catalog is built. The engine
//! never inspects card ids to decide what a card does.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Fewest players that can start a game
pub const MIN_PLAYERS: usize = 4;

/// Most players a room can hold
pub const MAX_PLAYERS: usize = 12;

/// Witch cards printed in the Tryal pool
const WITCH_CARDS: usize = 7;

/// Constable cards printed in the Tryal pool
const CONSTABLE_CARDS: usize = 2;

/// Not-a-witch cards printed in the Tryal pool
const NOT_WITCH_CARDS: usize = 30;

/// Role printed on a Tryal card
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TryalKind {
    Witch,
    NotWitch,
    Constable,
}

/// A face-down role card held by a player
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TryalCard {
    pub id: String,
    pub kind: TryalKind,
    pub revealed: bool,
}

impl TryalCard {
    pub fn new(id: impl Into<String>, kind: TryalKind) -> Self {
        Self {
            id: id.into(),
            kind,
            revealed: false,
        }
    }

    pub fn is_witch(&self) -> bool {
        self.kind == TryalKind::Witch
    }

    pub fn is_constable(&self) -> bool {
        self.kind == TryalKind::Constable
    }
}

/// One-shot effects of green cards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GreenEffect {
    /// Clear all accusations on the target
    Alibi,
    /// Target skips their next turn
    Stocks,
    /// Move the target's accusations and blue cards to a second player
    Scapegoat,
    /// Target discards their whole hand
    Arson,
    /// Move the target's blue cards to a second player
    Curse,
    /// Move the target's whole hand to a second player
    Robbery,
}

impl GreenEffect {
    /// Whether resolving this effect needs a second target
    pub fn needs_second_target(&self) -> bool {
        matches!(
            self,
            GreenEffect::Scapegoat | GreenEffect::Curse | GreenEffect::Robbery
        )
    }
}

/// Persistent blue cards that stay in front of a player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlueEffect {
    /// Links two players: if one dies at night, so does the other
    Matchmaker,
    /// Protects from the night kill and from accusations
    Shelter,
    /// Protects from accusations
    Faith,
}

impl BlueEffect {
    /// Whether this card blocks red cards played on its holder
    pub fn blocks_accusations(&self) -> bool {
        matches!(self, BlueEffect::Shelter | BlueEffect::Faith)
    }
}

/// Black event cards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlackEvent {
    /// Given to the first player; its holder reveals a Tryal card on Malice
    BlackCat,
    /// Two forced reveals, then every living player passes a hidden Tryal card
    Malice,
    /// Starts the night phase
    Night,
}

/// What a playing card is and does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CardKind {
    Red { value: u32 },
    Green { effect: GreenEffect },
    Blue { effect: BlueEffect },
    Black { event: BlackEvent },
}

/// A card from the playing deck
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: String,
    #[serde(flatten)]
    pub kind: CardKind,
}

impl Card {
    pub fn new(id: impl Into<String>, kind: CardKind) -> Self {
        Self {
            id: id.into(),
            kind,
        }
    }

    /// Display name of the card
    pub fn name(&self) -> &'static str {
        match self.kind {
            CardKind::Red { value: 7 } => "Witness",
            CardKind::Red { value: 3 } => "Evidence",
            CardKind::Red { .. } => "Accusation",
            CardKind::Green { effect } => match effect {
                GreenEffect::Alibi => "Alibi",
                GreenEffect::Stocks => "Stocks",
                GreenEffect::Scapegoat => "Scapegoat",
                GreenEffect::Arson => "Arson",
                GreenEffect::Curse => "Curse",
                GreenEffect::Robbery => "Robbery",
            },
            CardKind::Blue { effect } => match effect {
                BlueEffect::Matchmaker => "Matchmaker",
                BlueEffect::Shelter => "Shelter",
                BlueEffect::Faith => "Faith",
            },
            CardKind::Black { event } => match event {
                BlackEvent::BlackCat => "Black Cat",
                BlackEvent::Malice => "Malice",
                BlackEvent::Night => "Night",
            },
        }
    }

    pub fn blue_effect(&self) -> Option<BlueEffect> {
        match self.kind {
            CardKind::Blue { effect } => Some(effect),
            _ => None,
        }
    }

    pub fn black_event(&self) -> Option<BlackEvent> {
        match self.kind {
            CardKind::Black { event } => Some(event),
            _ => None,
        }
    }

    pub fn is_blue(&self) -> bool {
        matches!(self.kind, CardKind::Blue { .. })
    }

    /// Whether playing this card needs a second target
    pub fn needs_second_target(&self) -> bool {
        match self.kind {
            CardKind::Green { effect } => effect.needs_second_target(),
            CardKind::Blue { effect } => effect == BlueEffect::Matchmaker,
            _ => false,
        }
    }
}

/// Card counts and roles dealt for a given table size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupConfig {
    pub tryal_per_player: usize,
    pub witch_count: usize,
    pub constable_count: usize,
}

impl SetupConfig {
    pub fn for_player_count(player_count: usize) -> Self {
        if player_count <= 5 {
            Self {
                tryal_per_player: 5,
                witch_count: 3,
                constable_count: 1,
            }
        } else if player_count <= 8 {
            Self {
                tryal_per_player: 4,
                witch_count: 4,
                constable_count: 1,
            }
        } else {
            Self {
                tryal_per_player: 3,
                witch_count: 5,
                constable_count: 1,
            }
        }
    }

    /// Size of the Tryal pool for this many players
    pub fn total_tryal_cards(&self, player_count: usize) -> usize {
        player_count * self.tryal_per_player
    }
}

/// Every Tryal card printed in the box
pub fn tryal_pool() -> Vec<TryalCard> {
    let witches = (1..=WITCH_CARDS).map(|i| TryalCard::new(format!("witch_{i}"), TryalKind::Witch));
    let constables = (1..=CONSTABLE_CARDS)
        .map(|i| TryalCard::new(format!("constable_{i}"), TryalKind::Constable));
    let innocents = (1..=NOT_WITCH_CARDS)
        .map(|i| TryalCard::new(format!("not_witch_{i}"), TryalKind::NotWitch));

    witches.chain(constables).chain(innocents).collect()
}

/// Build the shuffled Tryal deck for a game
///
/// The deck holds exactly `witch_count` witch cards and `constable_count`
/// constable cards; the rest is filled with not-a-witch cards.
pub fn build_tryal_deck<R: Rng>(player_count: usize, rng: &mut R) -> Vec<TryalCard> {
    let config = SetupConfig::for_player_count(player_count);
    let needed = config.total_tryal_cards(player_count);
    let pool = tryal_pool();

    let mut deck: Vec<TryalCard> = pool
        .iter()
        .filter(|c| c.kind == TryalKind::Witch)
        .take(config.witch_count)
        .cloned()
        .collect();
    deck.extend(
        pool.iter()
            .filter(|c| c.kind == TryalKind::Constable)
            .take(config.constable_count)
            .cloned(),
    );
    let fill = needed.saturating_sub(deck.len());
    deck.extend(
        pool.iter()
            .filter(|c| c.kind == TryalKind::NotWitch)
            .take(fill)
            .cloned(),
    );

    deck.shuffle(rng);
    deck
}

fn numbered(prefix: &str, count: usize, kind: CardKind) -> impl Iterator<Item = Card> + '_ {
    (1..=count).map(move |i| Card::new(format!("{prefix}_{i}"), kind))
}

/// All red, green and blue cards
pub fn playing_cards() -> Vec<Card> {
    let red = |value| CardKind::Red { value };
    let green = |effect| CardKind::Green { effect };
    let blue = |effect| CardKind::Blue { effect };

    let mut cards = vec![Card::new("witness", red(7))];
    cards.extend(numbered("evidence", 5, red(3)));
    cards.extend(numbered("accusation", 35, red(1)));

    cards.extend(numbered("alibi", 3, green(GreenEffect::Alibi)));
    cards.extend(numbered("stocks", 3, green(GreenEffect::Stocks)));
    cards.extend(numbered("scapegoat", 2, green(GreenEffect::Scapegoat)));
    cards.push(Card::new("arson", green(GreenEffect::Arson)));
    cards.push(Card::new("curse", green(GreenEffect::Curse)));
    cards.push(Card::new("robbery", green(GreenEffect::Robbery)));

    cards.extend(numbered("matchmaker", 2, blue(BlueEffect::Matchmaker)));
    cards.extend(numbered("shelter", 2, blue(BlueEffect::Shelter)));
    cards.extend(numbered("faith", 3, blue(BlueEffect::Faith)));

    cards
}

/// A black event card
pub fn black_card(event: BlackEvent) -> Card {
    let id = match event {
        BlackEvent::BlackCat => "black_cat",
        BlackEvent::Malice => "malice",
        BlackEvent::Night => "night",
    };
    Card::new(id, CardKind::Black { event })
}

/// Build the playing deck: every playing card plus Malice, shuffled, with
/// Night placed at the bottom. The front of the deque is the next draw.
pub fn build_playing_deck<R: Rng>(rng: &mut R) -> VecDeque<Card> {
    let mut cards = playing_cards();
    cards.push(black_card(BlackEvent::Malice));
    cards.shuffle(rng);

    let mut deck: VecDeque<Card> = cards.into();
    deck.push_back(black_card(BlackEvent::Night));
    deck
}

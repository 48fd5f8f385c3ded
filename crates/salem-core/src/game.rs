//! Core game state machine.
//!
//! This module contains the `GameState` aggregate, the lobby lifecycle (join,
//! leave, setup, character selection) and the turn machine. Card resolution,
//! Tryal reveals and the night phase live in sibling modules as further
//! `impl GameState` blocks.

use crate::actions::{GameAction, GameEvent, Outcome};
use crate::cards::{self, BlackEvent, Card, SetupConfig, MAX_PLAYERS, MIN_PLAYERS};
use crate::characters::{self, Ability, AbilityHook, Character, CharacterId};
use crate::player::{avatar_for, Player, PlayerId};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use thiserror::Error;

/// Game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Players gathering in a room
    Lobby,
    /// Tryal cards dealt, players choosing characters
    CharacterSelect,
    /// Regular turns
    Playing,
    /// Witches and constable choose targets
    Night,
    /// Game is over
    GameOver { outcome: Outcome },
}

/// Where the active player is within their turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    /// May draw or play
    Choose,
    /// Drew cards; may only end the turn
    Drawn,
    /// Played at least one card; may play more or end the turn
    Played,
    /// An event card closed the turn; may only end it
    End,
}

/// Errors that can occur when applying actions
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("{0}")]
    InvalidAction(String),

    #[error("A target is required")]
    MissingTarget,

    #[error("This card needs a second target")]
    MissingSecondTarget,

    #[error("Target is protected")]
    Protected,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Game is over")]
    GameOver,
}

impl GameError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        GameError::InvalidAction(reason.into())
    }

    pub(crate) fn unknown_player(id: &PlayerId) -> Self {
        GameError::NotFound(format!("player {id}"))
    }
}

/// A witch card exposed during the game
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealedWitch {
    pub player_id: PlayerId,
    /// `None` when the game itself forced the reveal
    pub revealed_by: Option<PlayerId>,
}

/// Two players whose fates are tied by a Matchmaker card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedPair(PlayerId, PlayerId);

impl LinkedPair {
    /// Pairs are unordered; the ids are stored sorted
    pub fn new(a: PlayerId, b: PlayerId) -> Self {
        if a <= b {
            Self(a, b)
        } else {
            Self(b, a)
        }
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        &self.0 == id || &self.1 == id
    }

    pub fn partner_of(&self, id: &PlayerId) -> Option<&PlayerId> {
        if &self.0 == id {
            Some(&self.1)
        } else if &self.1 == id {
            Some(&self.0)
        } else {
            None
        }
    }
}

/// Decision a character ability is waiting on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChoiceKind {
    /// Chooser picks which of their own hidden Tryal cards is revealed
    OwnTryal { revealed_by: PlayerId },
    /// Chooser picks another player, whose first hidden Tryal card is revealed
    RevealOther,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChoice {
    pub chooser: PlayerId,
    pub kind: ChoiceKind,
}

/// The complete game state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub room_code: String,
    pub host_id: PlayerId,
    /// Bumped by the host after every mutation; orders snapshots
    pub revision: u64,
    pub phase: GamePhase,
    /// Seat order is turn order
    pub players: Vec<Player>,
    pub current_player_index: usize,
    pub turn_phase: TurnPhase,
    pub turn_number: u32,
    pub has_drawn: bool,
    pub has_played: bool,
    /// Front is the next draw
    pub playing_deck: VecDeque<Card>,
    pub discard_pile: Vec<Card>,
    pub revealed_witches: Vec<RevealedWitch>,
    pub total_witches: u32,
    pub tryal_per_player: usize,
    pub night_target: Option<PlayerId>,
    pub protected_player: Option<PlayerId>,
    pub skip_next_turn: BTreeSet<PlayerId>,
    pub linked_players: Vec<LinkedPair>,
    /// Players whose one-time night survival is spent
    pub survivals_used: BTreeSet<PlayerId>,
    /// Characters on offer this round
    pub character_pool: Vec<CharacterId>,
    pub pending_choice: Option<PendingChoice>,
    /// Choices waiting for the current one to resolve, oldest first
    pub queued_choices: VecDeque<PendingChoice>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(String::new(), PlayerId::new(""))
    }
}

impl GameState {
    /// Create an empty room in the lobby
    pub fn new(room_code: impl Into<String>, host_id: PlayerId) -> Self {
        Self {
            room_code: room_code.into(),
            host_id,
            revision: 0,
            phase: GamePhase::Lobby,
            players: Vec::new(),
            current_player_index: 0,
            turn_phase: TurnPhase::Choose,
            turn_number: 0,
            has_drawn: false,
            has_played: false,
            playing_deck: VecDeque::new(),
            discard_pile: Vec::new(),
            revealed_witches: Vec::new(),
            total_witches: 0,
            tryal_per_player: 0,
            night_target: None,
            protected_player: None,
            skip_next_turn: BTreeSet::new(),
            linked_players: Vec::new(),
            survivals_used: BTreeSet::new(),
            character_pool: Vec::new(),
            pending_choice: None,
            queued_choices: VecDeque::new(),
        }
    }

    // ==================== Queries ====================

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn get_player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.id == id)
    }

    pub(crate) fn get_player_mut(&mut self, id: &PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.id == id)
    }

    pub(crate) fn player_index(&self, id: &PlayerId) -> Option<usize> {
        self.players.iter().position(|p| &p.id == id)
    }

    /// The player whose turn it is
    pub fn current_player(&self) -> Option<&Player> {
        self.players.get(self.current_player_index)
    }

    pub fn current_player_id(&self) -> Option<PlayerId> {
        self.current_player().map(|p| p.id.clone())
    }

    pub fn alive_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_alive)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, GamePhase::GameOver { .. })
    }

    pub fn outcome(&self) -> Option<Outcome> {
        match self.phase {
            GamePhase::GameOver { outcome } => Some(outcome),
            _ => None,
        }
    }

    /// Total Tryal cards held across all players
    pub fn tryal_card_total(&self) -> usize {
        self.players.iter().map(|p| p.tryal_cards.len()).sum()
    }

    pub(crate) fn require_phase(&self, phase: GamePhase) -> Result<(), GameError> {
        if self.is_finished() {
            return Err(GameError::GameOver);
        }
        if self.phase != phase {
            return Err(GameError::invalid("Invalid action for current phase"));
        }
        Ok(())
    }

    pub(crate) fn require_current(&self, player: &PlayerId) -> Result<(), GameError> {
        match self.current_player() {
            Some(p) if &p.id == player => Ok(()),
            _ => Err(GameError::invalid("Not your turn")),
        }
    }

    pub(crate) fn require_alive(&self, player: &PlayerId) -> Result<(), GameError> {
        match self.get_player(player) {
            Some(p) if p.is_alive => Ok(()),
            Some(_) => Err(GameError::invalid("Dead players cannot act")),
            None => Err(GameError::unknown_player(player)),
        }
    }

    pub(crate) fn require_no_pending_choice(&self) -> Result<(), GameError> {
        match &self.pending_choice {
            Some(choice) => Err(GameError::invalid(format!(
                "Waiting for {} to choose",
                choice.chooser
            ))),
            None => Ok(()),
        }
    }

    // ==================== Lobby ====================

    /// Add a player, or reattach a returning one by id
    pub fn add_player(&mut self, id: PlayerId, name: String) -> Result<Vec<GameEvent>, GameError> {
        if self.get_player(&id).is_some() {
            return Ok(vec![GameEvent::PlayerRejoined { player: id }]);
        }
        if self.phase != GamePhase::Lobby {
            return Err(GameError::invalid("Game already started"));
        }
        if self.players.len() >= MAX_PLAYERS {
            return Err(GameError::invalid("Room is full"));
        }

        let avatar = avatar_for(self.players.len());
        self.players.push(Player::new(id.clone(), name, avatar));
        Ok(vec![GameEvent::PlayerJoined { player: id }])
    }

    /// Remove a player. Unknown ids are a no-op.
    pub fn remove_player(&mut self, id: &PlayerId) -> Vec<GameEvent> {
        let Some(index) = self.player_index(id) else {
            return Vec::new();
        };

        self.players.remove(index);
        self.skip_next_turn.remove(id);
        self.linked_players.retain(|pair| !pair.contains(id));
        if self.night_target.as_ref() == Some(id) {
            self.night_target = None;
        }
        if self.protected_player.as_ref() == Some(id) {
            self.protected_player = None;
        }
        self.queued_choices.retain(|c| &c.chooser != id);

        let mut events = vec![GameEvent::PlayerLeft { player: id.clone() }];
        if self.pending_choice.as_ref().map(|c| &c.chooser) == Some(id) {
            self.pending_choice = None;
            events.extend(self.promote_queued_choice());
        }

        match self.phase {
            GamePhase::CharacterSelect => {
                if index < self.current_player_index {
                    self.current_player_index -= 1;
                }
                if self.players.is_empty() {
                    self.current_player_index = 0;
                } else {
                    self.current_player_index %= self.players.len();
                    events.extend(self.start_play_if_ready());
                }
            }
            GamePhase::Playing | GamePhase::Night => {
                if self.players.is_empty() {
                    self.current_player_index = 0;
                } else if index < self.current_player_index {
                    self.current_player_index -= 1;
                } else if index == self.current_player_index {
                    // Seat the turn just before the gap so the next eligible player moves up
                    let count = self.players.len();
                    self.current_player_index = (index + count - 1) % count;
                    if self.phase == GamePhase::Playing {
                        events.extend(self.advance_turn_from(id.clone()));
                    }
                }
                if let Some(outcome) = self.check_game_over() {
                    events.push(GameEvent::GameWon { outcome });
                }
            }
            GamePhase::Lobby | GamePhase::GameOver { .. } => {}
        }

        events
    }

    /// Deal Tryal cards, build the deck and hand the Black Cat to a random first player
    pub fn setup_game<R: Rng>(&mut self, rng: &mut R) -> Result<Vec<GameEvent>, GameError> {
        self.require_phase(GamePhase::Lobby)?;

        let count = self.players.len();
        if count < MIN_PLAYERS {
            return Err(GameError::invalid(format!(
                "Need at least {MIN_PLAYERS} players"
            )));
        }
        if count > MAX_PLAYERS {
            return Err(GameError::invalid(format!(
                "At most {MAX_PLAYERS} players can play"
            )));
        }

        let config = SetupConfig::for_player_count(count);
        let tryal_deck = cards::build_tryal_deck(count, rng);

        for (player, dealt) in self
            .players
            .iter_mut()
            .zip(tryal_deck.chunks(config.tryal_per_player))
        {
            player.reset_for_new_round();
            player.tryal_cards = dealt.to_vec();
            player.refresh_roles();
        }

        self.total_witches = config.witch_count as u32;
        self.tryal_per_player = config.tryal_per_player;
        self.playing_deck = cards::build_playing_deck(rng);
        self.discard_pile.clear();
        self.revealed_witches.clear();
        self.skip_next_turn.clear();
        self.linked_players.clear();
        self.survivals_used.clear();
        self.night_target = None;
        self.protected_player = None;
        self.pending_choice = None;
        self.queued_choices.clear();
        self.character_pool = characters::selection_pool(count, rng);
        self.turn_number = 0;

        self.current_player_index = rng.gen_range(0..count);
        let black_cat = cards::black_card(BlackEvent::BlackCat);
        self.players[self.current_player_index]
            .hand_cards
            .push(black_cat);

        self.phase = GamePhase::CharacterSelect;

        Ok(vec![GameEvent::GameSetUp {
            first_player: self.players[self.current_player_index].id.clone(),
            total_witches: self.total_witches,
        }])
    }

    /// Assign a character and apply its on-selection ability
    pub fn select_character(
        &mut self,
        player_id: &PlayerId,
        character: CharacterId,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_phase(GamePhase::CharacterSelect)?;

        let player = self
            .get_player(player_id)
            .ok_or_else(|| GameError::unknown_player(player_id))?;
        if player.character_id.is_some() {
            return Err(GameError::invalid("Character already chosen"));
        }
        if !self.character_pool.contains(&character) {
            return Err(GameError::invalid(format!(
                "{} is not on offer this round",
                character.name()
            )));
        }
        if self
            .players
            .iter()
            .any(|p| p.character_id == Some(character))
        {
            return Err(GameError::invalid(format!(
                "{} is already taken",
                character.name()
            )));
        }

        let mut events = vec![GameEvent::CharacterSelected {
            player: player_id.clone(),
            character,
        }];

        match character.ability(AbilityHook::Selected) {
            Some(Ability::PeekOwnTryal) => {
                if let Some(card) = player.tryal_cards.first() {
                    events.push(GameEvent::TryalPeeked {
                        player: player_id.clone(),
                        index: 0,
                        kind: card.kind,
                    });
                }
            }
            Some(Ability::StartWithBlueCard(effect)) => {
                let granted = self
                    .playing_deck
                    .iter()
                    .position(|c| c.blue_effect() == Some(effect))
                    .and_then(|pos| self.playing_deck.remove(pos));
                if let Some(card) = granted {
                    events.push(GameEvent::BlueCardGranted {
                        player: player_id.clone(),
                        card_id: card.id.clone(),
                    });
                    if let Some(p) = self.get_player_mut(player_id) {
                        p.blue_cards.push(card);
                    }
                }
            }
            _ => {}
        }

        if let Some(p) = self.get_player_mut(player_id) {
            p.character_id = Some(character);
        }

        events.extend(self.start_play_if_ready());
        Ok(events)
    }

    /// Pick a random free character for a player (timer expiry, bots)
    pub fn auto_select_character<R: Rng>(
        &mut self,
        player_id: &PlayerId,
        rng: &mut R,
    ) -> Result<Vec<GameEvent>, GameError> {
        let free: Vec<CharacterId> = self
            .selectable_characters()
            .into_iter()
            .map(|c| c.id)
            .collect();
        let character = *free
            .choose(rng)
            .ok_or_else(|| GameError::invalid("No characters left"))?;
        self.select_character(player_id, character)
    }

    /// Characters still free to pick this round
    pub fn selectable_characters(&self) -> Vec<Character> {
        self.character_pool
            .iter()
            .filter(|c| !self.players.iter().any(|p| p.character_id == Some(**c)))
            .map(|c| c.character())
            .collect()
    }

    fn start_play_if_ready(&mut self) -> Vec<GameEvent> {
        let ready = !self.players.is_empty()
            && self.players.iter().all(|p| p.character_id.is_some());
        if !ready || self.phase != GamePhase::CharacterSelect {
            return Vec::new();
        }

        self.phase = GamePhase::Playing;
        self.turn_phase = TurnPhase::Choose;
        self.has_drawn = false;
        self.has_played = false;
        self.turn_number = 1;

        match self.current_player_id() {
            Some(first_player) => vec![GameEvent::PlayStarted { first_player }],
            None => Vec::new(),
        }
    }

    /// Back to the lobby with the same room and players, round state cleared
    pub fn play_again(&mut self) {
        let mut players = std::mem::take(&mut self.players);
        for player in &mut players {
            player.reset_for_new_round();
        }
        let revision = self.revision;
        *self = Self::new(std::mem::take(&mut self.room_code), self.host_id.clone());
        self.players = players;
        self.revision = revision;
    }

    /// Drop everything and start over in an empty lobby
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // ==================== Turns ====================

    /// Draw `count` cards from the front of the deck.
    ///
    /// Drawing Night stops the draw and starts the night phase; drawing Malice
    /// stops the draw and resolves Malice. Cards drawn before either are kept.
    pub fn draw_cards<R: Rng>(
        &mut self,
        player_id: &PlayerId,
        count: usize,
        rng: &mut R,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_phase(GamePhase::Playing)?;
        self.require_current(player_id)?;
        self.require_alive(player_id)?;
        self.require_no_pending_choice()?;
        if self.has_played {
            return Err(GameError::invalid("Cannot draw after playing a card"));
        }
        if self.turn_phase != TurnPhase::Choose {
            return Err(GameError::invalid("Already drew this turn"));
        }

        let mut events = Vec::new();
        let character = self.get_player(player_id).and_then(|p| p.character_id);
        if let Some(Ability::PeekDeck(n)) = character.and_then(|c| c.ability(AbilityHook::Draw)) {
            events.push(GameEvent::DeckPeeked {
                player: player_id.clone(),
                card_ids: self.playing_deck.iter().take(n).map(|c| c.id.clone()).collect(),
            });
        }

        let mut drawn = Vec::new();
        let mut event_card = None;
        for _ in 0..count {
            let Some(card) = self.playing_deck.pop_front() else {
                break;
            };
            match card.black_event() {
                Some(BlackEvent::Night) | Some(BlackEvent::Malice) => {
                    event_card = card.black_event();
                    self.discard_pile.push(card);
                    break;
                }
                _ => drawn.push(card),
            }
        }

        if let Some(p) = self.get_player_mut(player_id) {
            if !drawn.is_empty() || event_card.is_none() {
                events.push(GameEvent::CardsDrawn {
                    player: player_id.clone(),
                    card_ids: drawn.iter().map(|c| c.id.clone()).collect(),
                });
            }
            p.hand_cards.extend(drawn);
        }

        self.has_drawn = true;
        match event_card {
            Some(BlackEvent::Night) => {
                self.turn_phase = TurnPhase::End;
                events.extend(self.start_night(player_id));
            }
            Some(BlackEvent::Malice) => {
                self.turn_phase = TurnPhase::End;
                events.push(GameEvent::MaliceDrawn {
                    drawn_by: player_id.clone(),
                });
                events.extend(self.handle_malice(rng));
            }
            _ => self.turn_phase = TurnPhase::Drawn,
        }

        Ok(events)
    }

    /// End the active player's turn
    pub fn end_turn(&mut self, player_id: &PlayerId) -> Result<Vec<GameEvent>, GameError> {
        self.require_phase(GamePhase::Playing)?;
        self.require_current(player_id)?;
        self.require_no_pending_choice()?;

        if let Some(outcome) = self.check_game_over() {
            return Ok(vec![GameEvent::GameWon { outcome }]);
        }

        Ok(self.advance_turn())
    }

    /// Move to the next living player, passing over one stocked player per encounter
    pub(crate) fn advance_turn(&mut self) -> Vec<GameEvent> {
        match self.current_player_id() {
            Some(previous) => self.advance_turn_from(previous),
            None => Vec::new(),
        }
    }

    /// Pass the turn on if the active player has just died
    pub(crate) fn pass_turn_if_current_dead(&mut self) -> Vec<GameEvent> {
        let dead = self.current_player().is_some_and(|p| !p.is_alive);
        if self.phase != GamePhase::Playing || !dead {
            return Vec::new();
        }
        self.advance_turn()
    }

    /// `previous` is reported as the player whose turn ended
    fn advance_turn_from(&mut self, previous: PlayerId) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let count = self.players.len();
        if count == 0 {
            return events;
        }

        let mut index = self.current_player_index % count;
        let mut next = None;

        // A stocked player is passed once, so two laps always settle
        for _ in 0..count * 2 {
            index = (index + 1) % count;
            let player = &mut self.players[index];
            if !player.is_alive {
                continue;
            }
            if self.skip_next_turn.remove(&player.id) {
                player.is_skipped = false;
                events.push(GameEvent::TurnSkipped {
                    player: player.id.clone(),
                });
                continue;
            }
            next = Some(index);
            break;
        }

        let Some(next) = next else {
            self.phase = GamePhase::GameOver {
                outcome: Outcome::Draw,
            };
            events.push(GameEvent::GameWon {
                outcome: Outcome::Draw,
            });
            return events;
        };

        self.current_player_index = next;
        self.turn_phase = TurnPhase::Choose;
        self.has_drawn = false;
        self.has_played = false;
        self.turn_number += 1;

        events.push(GameEvent::TurnEnded {
            player: previous,
            next_player: self.players[next].id.clone(),
        });
        events
    }

    // ==================== Dispatch ====================

    /// Apply an in-round intent from a player
    pub fn apply_action<R: Rng>(
        &mut self,
        player: &PlayerId,
        action: GameAction,
        rng: &mut R,
    ) -> Result<Vec<GameEvent>, GameError> {
        if self.is_finished() {
            return Err(GameError::GameOver);
        }

        match action {
            GameAction::Draw => {
                let count = self
                    .get_player(player)
                    .ok_or_else(|| GameError::unknown_player(player))?
                    .character_id
                    .map(|c| c.draw_count())
                    .unwrap_or(crate::characters::DEFAULT_DRAW_COUNT);
                self.draw_cards(player, count, rng)
            }
            GameAction::PlayCard {
                card_id,
                target_id,
                second_target_id,
            } => self.play_card(player, &card_id, &target_id, second_target_id.as_ref()),
            GameAction::EndTurn => self.end_turn(player),
            GameAction::WitchKill { target_id } => self.witch_select_target(player, &target_id),
            GameAction::ConstableProtect { target_id } => {
                self.constable_protect(player, &target_id)
            }
            GameAction::ChooseOwnTryal { index } => self.choose_own_tryal(player, index),
            GameAction::RevealOther { target_id } => self.reveal_other(player, &target_id),
        }
    }

    /// Get all currently valid actions for a player
    pub fn valid_actions(&self, player: &PlayerId) -> Vec<GameAction> {
        let mut actions = Vec::new();
        let Some(me) = self.get_player(player) else {
            return actions;
        };

        if let Some(choice) = &self.pending_choice {
            if &choice.chooser != player {
                return actions;
            }
            match choice.kind {
                ChoiceKind::OwnTryal { .. } => {
                    for (index, card) in me.tryal_cards.iter().enumerate() {
                        if !card.revealed {
                            actions.push(GameAction::ChooseOwnTryal { index });
                        }
                    }
                }
                ChoiceKind::RevealOther => {
                    for other in self.alive_players() {
                        if &other.id != player && other.hidden_tryal_count() > 0 {
                            actions.push(GameAction::RevealOther {
                                target_id: other.id.clone(),
                            });
                        }
                    }
                }
            }
            return actions;
        }

        match self.phase {
            GamePhase::Playing => {
                if self.require_current(player).is_err() {
                    return actions;
                }
                if me.is_alive && self.turn_phase == TurnPhase::Choose {
                    actions.push(GameAction::Draw);
                }
                if me.is_alive && !self.has_drawn {
                    for card in &me.hand_cards {
                        let seconds: Vec<Option<&PlayerId>> = if card.needs_second_target() {
                            self.alive_players().map(|p| Some(&p.id)).collect()
                        } else {
                            vec![None]
                        };
                        for target in self.alive_players() {
                            for &second in &seconds {
                                if self
                                    .resolve_card(player, &card.id, &target.id, second)
                                    .is_ok()
                                {
                                    actions.push(GameAction::PlayCard {
                                        card_id: card.id.clone(),
                                        target_id: target.id.clone(),
                                        second_target_id: second.cloned(),
                                    });
                                }
                            }
                        }
                    }
                }
                actions.push(GameAction::EndTurn);
            }
            GamePhase::Night if me.is_alive => {
                for target in self.alive_players() {
                    if me.is_witch {
                        actions.push(GameAction::WitchKill {
                            target_id: target.id.clone(),
                        });
                    }
                    if me.is_constable {
                        actions.push(GameAction::ConstableProtect {
                            target_id: target.id.clone(),
                        });
                    }
                }
            }
            _ => {}
        }

        actions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lobby(count: usize) -> GameState {
        let mut game = GameState::new("ABCD", PlayerId::from("host_display"));
        for i in 0..count {
            game.add_player(PlayerId::new(format!("p{i}")), format!("Player {i}"))
                .unwrap();
        }
        game
    }

    #[test]
    fn test_new_game_starts_in_lobby() {
        let game = lobby(0);
        assert_eq!(game.phase, GamePhase::Lobby);
        assert_eq!(game.player_count(), 0);
    }

    #[test]
    fn test_rejoin_is_idempotent() {
        let mut game = lobby(4);
        let events = game
            .add_player(PlayerId::from("p1"), "Player 1".into())
            .unwrap();
        assert_eq!(
            events,
            vec![GameEvent::PlayerRejoined {
                player: PlayerId::from("p1")
            }]
        );
        assert_eq!(game.player_count(), 4);
    }

    #[test]
    fn test_room_capacity() {
        let mut game = lobby(MAX_PLAYERS);
        assert!(game.add_player(PlayerId::from("late"), "Late".into()).is_err());
    }

    #[test]
    fn test_setup_needs_four_players() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = lobby(3);
        assert!(matches!(
            game.setup_game(&mut rng),
            Err(GameError::InvalidAction(_))
        ));
    }

    #[test]
    fn test_setup_deals_tryal_cards_and_black_cat() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = lobby(6);
        game.setup_game(&mut rng).unwrap();

        assert_eq!(game.phase, GamePhase::CharacterSelect);
        assert_eq!(game.total_witches, 4);
        assert_eq!(game.tryal_card_total(), 6 * 4);
        assert!(game.players.iter().all(|p| p.tryal_cards.len() == 4));

        let holder = game.current_player().unwrap();
        assert!(holder.has_card_in_hand("black_cat"));
    }

    #[test]
    fn test_join_after_start_rejected() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = lobby(4);
        game.setup_game(&mut rng).unwrap();
        assert!(game.add_player(PlayerId::from("late"), "Late".into()).is_err());
    }

    #[test]
    fn test_characters_are_unique_and_gate_play() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = lobby(4);
        game.setup_game(&mut rng).unwrap();
        game.character_pool = CharacterId::ALL.to_vec();

        game.select_character(&PlayerId::from("p0"), CharacterId::Tituba)
            .unwrap();
        assert!(game
            .select_character(&PlayerId::from("p1"), CharacterId::Tituba)
            .is_err());
        assert!(game
            .select_character(&PlayerId::from("p0"), CharacterId::SarahGood)
            .is_err());

        game.select_character(&PlayerId::from("p1"), CharacterId::SarahGood)
            .unwrap();
        game.select_character(&PlayerId::from("p2"), CharacterId::AnnPutnam)
            .unwrap();
        assert_eq!(game.phase, GamePhase::CharacterSelect);

        let events = game
            .auto_select_character(&PlayerId::from("p3"), &mut rng)
            .unwrap();
        assert_eq!(game.phase, GamePhase::Playing);
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::PlayStarted { .. })));
    }

    #[test]
    fn test_samuel_parris_takes_faith_from_deck() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = lobby(4);
        game.setup_game(&mut rng).unwrap();
        game.character_pool = vec![CharacterId::SamuelParris];
        let deck_size = game.playing_deck.len();

        game.select_character(&PlayerId::from("p2"), CharacterId::SamuelParris)
            .unwrap();

        let p2 = game.get_player(&PlayerId::from("p2")).unwrap();
        assert!(p2.has_blue(crate::cards::BlueEffect::Faith));
        assert_eq!(game.playing_deck.len(), deck_size - 1);
    }

    #[test]
    fn test_selection_is_limited_to_the_pool() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut game = lobby(4);
        game.setup_game(&mut rng).unwrap();
        assert_eq!(game.character_pool.len(), 8);

        let outside = CharacterId::ALL
            .into_iter()
            .find(|c| !game.character_pool.contains(c))
            .unwrap();
        assert!(matches!(
            game.select_character(&PlayerId::from("p0"), outside),
            Err(GameError::InvalidAction(_))
        ));

        let offered = game.character_pool[0];
        game.select_character(&PlayerId::from("p0"), offered)
            .unwrap();
        let free = game.selectable_characters();
        assert_eq!(free.len(), 7);
        assert!(free.iter().all(|c| c.id != offered));
        assert_eq!(free[0].name, free[0].id.name());

        for i in 1..4 {
            game.auto_select_character(&PlayerId::new(format!("p{i}")), &mut rng)
                .unwrap();
        }
        assert!(game
            .players
            .iter()
            .all(|p| p.character_id.is_some_and(|c| game.character_pool.contains(&c))));
        assert_eq!(game.phase, GamePhase::Playing);
    }

    #[test]
    fn test_leaving_on_your_turn_ends_it() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut game = lobby(6);
        game.setup_game(&mut rng).unwrap();
        for i in 0..6 {
            game.auto_select_character(&PlayerId::new(format!("p{i}")), &mut rng)
                .unwrap();
        }
        let leaver = game.current_player_id().unwrap();

        let events = game.remove_player(&leaver);
        let ended = events.iter().find_map(|e| match e {
            GameEvent::TurnEnded { player, .. } => Some(player.clone()),
            _ => None,
        });
        if !game.is_finished() {
            assert_eq!(ended, Some(leaver));
        }
    }

    #[test]
    fn test_linked_pair_is_unordered() {
        let a = PlayerId::from("a");
        let b = PlayerId::from("b");
        assert_eq!(
            LinkedPair::new(a.clone(), b.clone()),
            LinkedPair::new(b.clone(), a.clone())
        );
        assert_eq!(LinkedPair::new(a.clone(), b.clone()).partner_of(&b), Some(&a));
    }

    #[test]
    fn test_play_again_keeps_room_and_players() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut game = lobby(5);
        game.setup_game(&mut rng).unwrap();
        game.play_again();

        assert_eq!(game.phase, GamePhase::Lobby);
        assert_eq!(game.room_code, "ABCD");
        assert_eq!(game.player_count(), 5);
        assert!(game.players.iter().all(|p| p.tryal_cards.is_empty()));
    }

    #[test]
    fn test_remove_unknown_player_is_noop() {
        let mut game = lobby(4);
        assert!(game.remove_player(&PlayerId::from("ghost")).is_empty());
        assert_eq!(game.player_count(), 4);
    }
}

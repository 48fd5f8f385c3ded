//! Host-authoritative replication.
//!
//! The [`HostSession`] is the only writer of the canonical [`GameState`]. It
//! applies every intent it receives and answers with a full `state_sync`
//! broadcast. A [`Participant`] never mutates game state itself: it replaces
//! its copy wholesale with each snapshot it receives, discarding stale ones.

use crate::actions::{GameAction, GameEvent};
use crate::characters::CharacterId;
use crate::game::{GameError, GamePhase, GameState};
use crate::player::{Player, PlayerId};
use crate::protocol::{Envelope, Message, NightActionType};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

/// Where an outgoing envelope should go
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Every participant in the room
    Broadcast(Envelope),
    /// A single participant
    To(PlayerId, Envelope),
}

/// The host side of a room
#[derive(Debug)]
pub struct HostSession {
    state: GameState,
    host_id: PlayerId,
    rng: StdRng,
}

impl HostSession {
    pub fn new(room_code: impl Into<String>, host_id: PlayerId) -> Self {
        Self::with_rng(room_code, host_id, StdRng::from_entropy())
    }

    /// Deterministic session for replays and tests
    pub fn with_seed(room_code: impl Into<String>, host_id: PlayerId, seed: u64) -> Self {
        Self::with_rng(room_code, host_id, StdRng::seed_from_u64(seed))
    }

    fn with_rng(room_code: impl Into<String>, host_id: PlayerId, rng: StdRng) -> Self {
        Self {
            state: GameState::new(room_code, host_id.clone()),
            host_id,
            rng,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn host_id(&self) -> &PlayerId {
        &self.host_id
    }

    pub fn room_code(&self) -> &str {
        &self.state.room_code
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    /// A `state_sync` envelope carrying the current state
    pub fn snapshot(&self) -> Envelope {
        Envelope::new(
            self.host_id.clone(),
            Message::StateSync {
                state: Box::new(self.state.clone()),
            },
        )
    }

    fn broadcast_snapshot(&mut self) -> Outbound {
        self.state.revision += 1;
        Outbound::Broadcast(self.snapshot())
    }

    fn reply(&self, to: &PlayerId, message: Message) -> Outbound {
        Outbound::To(to.clone(), Envelope::new(self.host_id.clone(), message))
    }

    /// Turn an engine result into a reply to the sender plus, on success, a broadcast
    fn settle(
        &mut self,
        sender: &PlayerId,
        intent: &'static str,
        result: Result<Vec<GameEvent>, GameError>,
    ) -> Vec<Outbound> {
        match result {
            Ok(events) => {
                debug!(
                    room = %self.state.room_code,
                    player = %sender,
                    intent,
                    events = events.len(),
                    "Intent applied"
                );
                if let Some(outcome) = self.state.outcome() {
                    if events.iter().any(|e| matches!(e, GameEvent::GameWon { .. })) {
                        info!(room = %self.state.room_code, ?outcome, "Game over");
                    }
                }
                let ack = self.reply(sender, Message::action_ok(events));
                vec![ack, self.broadcast_snapshot()]
            }
            Err(e) => {
                warn!(
                    room = %self.state.room_code,
                    player = %sender,
                    intent,
                    error = %e,
                    "Intent rejected"
                );
                vec![self.reply(sender, Message::action_failed(&e))]
            }
        }
    }

    /// Apply one incoming envelope
    pub fn handle(&mut self, envelope: Envelope) -> Vec<Outbound> {
        let sender = envelope.sender_id;
        let intent = envelope.message.kind();

        match envelope.message {
            Message::PlayerJoin {
                player_id,
                player_name,
            } => match self.state.add_player(player_id.clone(), player_name) {
                Ok(_) => {
                    info!(room = %self.state.room_code, player = %player_id, "Player joined");
                    let broadcast = self.broadcast_snapshot();
                    vec![Outbound::To(player_id, self.snapshot()), broadcast]
                }
                Err(e) => {
                    warn!(
                        room = %self.state.room_code,
                        player = %player_id,
                        error = %e,
                        "Join rejected"
                    );
                    vec![self.reply(&player_id, Message::action_failed(&e))]
                }
            },
            Message::PlayerLeave { player_id } => {
                let events = self.state.remove_player(&player_id);
                if events.is_empty() {
                    return Vec::new();
                }
                info!(room = %self.state.room_code, player = %player_id, "Player left");
                vec![self.broadcast_snapshot()]
            }
            Message::CharacterSelected {
                player_id,
                character_id,
            } => {
                let result = self.state.select_character(&player_id, character_id);
                self.settle(&sender, intent, result)
            }
            Message::CardPlayed {
                card_id,
                target_id,
                second_target_id,
            } => self.submit(
                &sender,
                GameAction::PlayCard {
                    card_id,
                    target_id,
                    second_target_id,
                },
            ),
            Message::NightAction {
                action_type,
                target_id,
            } => {
                let action = match action_type {
                    NightActionType::WitchKill => GameAction::WitchKill { target_id },
                    NightActionType::ConstableProtect => GameAction::ConstableProtect { target_id },
                };
                self.submit(&sender, action)
            }
            Message::DrawCards {} => self.submit(&sender, GameAction::Draw),
            Message::EndTurn {} => self.submit(&sender, GameAction::EndTurn),
            Message::ChoiceMade { index, target_id } => match (index, target_id) {
                (Some(index), _) => self.submit(&sender, GameAction::ChooseOwnTryal { index }),
                (None, Some(target_id)) => {
                    self.submit(&sender, GameAction::RevealOther { target_id })
                }
                (None, None) => self.settle(&sender, intent, Err(GameError::MissingTarget)),
            },
            Message::RequestState {} => vec![Outbound::To(sender, self.snapshot())],
            Message::StateSync { .. } | Message::ActionResult { .. } => {
                debug!(
                    room = %self.state.room_code,
                    player = %sender,
                    intent,
                    "Ignoring host-bound copy of a host message"
                );
                Vec::new()
            }
        }
    }

    /// Apply an in-round intent on behalf of a player
    pub fn submit(&mut self, player: &PlayerId, action: GameAction) -> Vec<Outbound> {
        let intent = match &action {
            GameAction::Draw => "draw_cards",
            GameAction::PlayCard { .. } => "card_played",
            GameAction::EndTurn => "end_turn",
            GameAction::WitchKill { .. } | GameAction::ConstableProtect { .. } => "night_action",
            GameAction::ChooseOwnTryal { .. } | GameAction::RevealOther { .. } => "choice_made",
        };
        let result = self.state.apply_action(player, action, &mut self.rng);
        self.settle(player, intent, result)
    }

    /// Deal and move to character selection
    pub fn start_game(&mut self) -> Result<Vec<Outbound>, GameError> {
        self.state.setup_game(&mut self.rng)?;
        info!(
            room = %self.state.room_code,
            players = self.state.player_count(),
            witches = self.state.total_witches,
            "Game started"
        );
        Ok(vec![self.broadcast_snapshot()])
    }

    /// Give a random free character to a player who has not chosen
    pub fn auto_select_character(&mut self, player: &PlayerId) -> Result<Vec<Outbound>, GameError> {
        self.state.auto_select_character(player, &mut self.rng)?;
        Ok(vec![self.broadcast_snapshot()])
    }

    /// Players still choosing a character
    pub fn unselected_players(&self) -> Vec<PlayerId> {
        self.state
            .players
            .iter()
            .filter(|p| p.character_id.is_none())
            .map(|p| p.id.clone())
            .collect()
    }

    /// Resolve the night with whatever was submitted
    pub fn resolve_night(&mut self) -> Result<Vec<Outbound>, GameError> {
        let events = self.state.resolve_night()?;
        info!(room = %self.state.room_code, events = events.len(), "Night resolved");
        Ok(vec![self.broadcast_snapshot()])
    }

    /// Start over with the same room and players
    pub fn play_again(&mut self) -> Vec<Outbound> {
        self.state.play_again();
        info!(room = %self.state.room_code, "Back to lobby");
        vec![self.broadcast_snapshot()]
    }
}

/// Result of an intent as reported back by the host
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub success: bool,
    pub reason: Option<String>,
    pub events: Vec<GameEvent>,
}

/// A non-host view of a room
#[derive(Debug, Clone)]
pub struct Participant {
    pub local_player_id: PlayerId,
    pub is_host: bool,
    state: GameState,
    synced: bool,
}

impl Participant {
    pub fn new(local_player_id: PlayerId, is_host: bool) -> Self {
        Self {
            local_player_id,
            is_host,
            state: GameState::default(),
            synced: false,
        }
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// This participant's own player record
    pub fn me(&self) -> Option<&Player> {
        self.state.get_player(&self.local_player_id)
    }

    pub fn is_my_turn(&self) -> bool {
        let Some(me) = self.me() else {
            return false;
        };
        self.state.phase == GamePhase::Playing
            && me.is_alive
            && self.state.current_player().map(|p| &p.id) == Some(&me.id)
    }

    /// Replace the local state with a snapshot. Older snapshots of the same
    /// room are dropped; returns whether the snapshot was applied.
    pub fn apply_snapshot(&mut self, state: GameState) -> bool {
        let stale = self.synced
            && state.room_code == self.state.room_code
            && state.revision < self.state.revision;
        if stale {
            debug!(
                received = state.revision,
                current = self.state.revision,
                "Dropping stale snapshot"
            );
            return false;
        }
        self.state = state;
        self.synced = true;
        true
    }

    /// Handle an envelope from the host
    pub fn receive(&mut self, envelope: Envelope) -> Option<ActionOutcome> {
        match envelope.message {
            Message::StateSync { state } => {
                self.apply_snapshot(*state);
                None
            }
            Message::ActionResult {
                success,
                reason,
                events,
            } => Some(ActionOutcome {
                success,
                reason,
                events,
            }),
            other => {
                debug!(kind = other.kind(), "Participant ignores message");
                None
            }
        }
    }

    /// Lost the host: fall back to an empty lobby
    pub fn connection_lost(&mut self) {
        warn!(player = %self.local_player_id, "Connection to host lost");
        self.state.reset();
        self.synced = false;
    }

    // ==================== Intents ====================

    fn envelope(&self, message: Message) -> Envelope {
        Envelope::new(self.local_player_id.clone(), message)
    }

    pub fn join(&self, name: impl Into<String>) -> Envelope {
        self.envelope(Message::PlayerJoin {
            player_id: self.local_player_id.clone(),
            player_name: name.into(),
        })
    }

    pub fn leave(&self) -> Envelope {
        self.envelope(Message::PlayerLeave {
            player_id: self.local_player_id.clone(),
        })
    }

    pub fn select_character(&self, character: CharacterId) -> Envelope {
        self.envelope(Message::CharacterSelected {
            player_id: self.local_player_id.clone(),
            character_id: character,
        })
    }

    pub fn draw(&self) -> Envelope {
        self.envelope(Message::DrawCards {})
    }

    pub fn play_card(
        &self,
        card_id: impl Into<String>,
        target: PlayerId,
        second_target: Option<PlayerId>,
    ) -> Envelope {
        self.envelope(Message::CardPlayed {
            card_id: card_id.into(),
            target_id: target,
            second_target_id: second_target,
        })
    }

    pub fn end_turn(&self) -> Envelope {
        self.envelope(Message::EndTurn {})
    }

    pub fn night_action(&self, action_type: NightActionType, target: PlayerId) -> Envelope {
        self.envelope(Message::NightAction {
            action_type,
            target_id: target,
        })
    }

    pub fn choose_own_tryal(&self, index: usize) -> Envelope {
        self.envelope(Message::ChoiceMade {
            index: Some(index),
            target_id: None,
        })
    }

    pub fn reveal_other(&self, target: PlayerId) -> Envelope {
        self.envelope(Message::ChoiceMade {
            index: None,
            target_id: Some(target),
        })
    }

    pub fn request_state(&self) -> Envelope {
        self.envelope(Message::RequestState {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HOST_DISPLAY_ID;

    fn host() -> HostSession {
        HostSession::with_seed("WXYZ", PlayerId::from(HOST_DISPLAY_ID), 9)
    }

    fn snapshot_of(outbound: &[Outbound]) -> Option<GameState> {
        outbound.iter().find_map(|o| match o {
            Outbound::Broadcast(Envelope {
                message: Message::StateSync { state },
                ..
            }) => Some((**state).clone()),
            _ => None,
        })
    }

    #[test]
    fn test_join_replies_to_joiner_and_broadcasts() {
        let mut host = host();
        let alice = Participant::new(PlayerId::from("alice"), false);

        let out = host.handle(alice.join("Alice"));

        assert_eq!(out.len(), 2);
        assert!(matches!(&out[0], Outbound::To(id, _) if id.as_str() == "alice"));
        let state = snapshot_of(&out).unwrap();
        assert_eq!(state.players.len(), 1);
        assert_eq!(state.revision, 1);
    }

    #[test]
    fn test_rejected_intent_is_a_value() {
        let mut host = host();
        let alice = Participant::new(PlayerId::from("alice"), false);
        host.handle(alice.join("Alice"));

        let out = host.handle(alice.draw());
        assert_eq!(out.len(), 1);
        match &out[0] {
            Outbound::To(
                to,
                Envelope {
                    message: Message::ActionResult { success, reason, .. },
                    ..
                },
            ) => {
                assert_eq!(to.as_str(), "alice");
                assert!(!success);
                assert!(reason.is_some());
            }
            other => panic!("unexpected outbound: {other:?}"),
        }
        assert_eq!(host.state().revision, 1);
    }

    #[test]
    fn test_request_state_is_targeted() {
        let mut host = host();
        let bob = Participant::new(PlayerId::from("bob"), false);
        let out = host.handle(bob.request_state());
        assert!(matches!(&out[..], [Outbound::To(id, _)] if id.as_str() == "bob"));
    }

    #[test]
    fn test_snapshot_apply_is_idempotent() {
        let mut host = host();
        let mut alice = Participant::new(PlayerId::from("alice"), false);
        let out = host.handle(alice.join("Alice"));
        let state = snapshot_of(&out).unwrap();

        assert!(alice.apply_snapshot(state.clone()));
        let once = alice.state().clone();
        assert!(alice.apply_snapshot(state));
        assert_eq!(alice.state(), &once);
        assert_eq!(alice.local_player_id.as_str(), "alice");
    }

    #[test]
    fn test_stale_snapshot_dropped() {
        let mut host = host();
        let mut alice = Participant::new(PlayerId::from("alice"), false);
        let first = snapshot_of(&host.handle(alice.join("Alice"))).unwrap();
        let bob = Participant::new(PlayerId::from("bob"), false);
        let second = snapshot_of(&host.handle(bob.join("Bob"))).unwrap();

        assert!(alice.apply_snapshot(second));
        assert!(!alice.apply_snapshot(first));
        assert_eq!(alice.state().players.len(), 2);
    }

    #[test]
    fn test_connection_lost_resets_to_lobby() {
        let mut host = host();
        let mut alice = Participant::new(PlayerId::from("alice"), false);
        let state = snapshot_of(&host.handle(alice.join("Alice"))).unwrap();
        alice.apply_snapshot(state);

        alice.connection_lost();
        assert_eq!(alice.state().phase, GamePhase::Lobby);
        assert!(alice.state().players.is_empty());
    }
}

//! Game room management.
//!
//! A room is one host session plus the connections attached to it. The
//! connection that created the room is the host display; every other
//! connection speaks for the player id it announced in `player_join`.

use salem_core::protocol::HOST_DISPLAY_ID;
use salem_core::{Envelope, GameError, GamePhase, HostSession, Message, Outbound, PlayerId};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// Display plus the largest table
const MAX_CONNECTIONS: usize = salem_core::cards::MAX_PLAYERS + 1;

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Room is full")]
    RoomFull,

    #[error("Not in a room")]
    NotInRoom,

    #[error("Join the game before sending game messages")]
    NotJoined,

    #[error("Only the host display can do that")]
    NotDisplay,

    #[error(transparent)]
    Game(#[from] GameError),
}

/// A game room hosted by the server.
pub struct GameRoom {
    pub code: String,
    /// Connection of the host display
    pub display: Uuid,
    session: HostSession,
    connections: HashSet<Uuid>,
    /// Which connection currently speaks for each player
    players: HashMap<PlayerId, Uuid>,
    night_timer_armed: bool,
    character_timer_armed: bool,
    /// Bumped each time character selection opens, so a late timer can tell it is stale
    select_round: u64,
}

impl GameRoom {
    pub fn new(code: String, display: Uuid) -> Self {
        Self::with_session(HostSession::new(code.clone(), PlayerId::from(HOST_DISPLAY_ID)), display)
    }

    pub fn with_session(session: HostSession, display: Uuid) -> Self {
        let mut connections = HashSet::new();
        connections.insert(display);
        Self {
            code: session.room_code().to_string(),
            display,
            session,
            connections,
            players: HashMap::new(),
            night_timer_armed: false,
            character_timer_armed: false,
            select_round: 0,
        }
    }

    pub fn session(&self) -> &HostSession {
        &self.session
    }

    pub fn phase(&self) -> GamePhase {
        self.session.phase()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Attach a connection; it becomes a player once it sends `player_join`
    pub fn add_connection(&mut self, connection: Uuid) -> Result<(), RoomError> {
        if self.connections.contains(&connection) {
            return Ok(());
        }
        if self.connections.len() >= MAX_CONNECTIONS {
            return Err(RoomError::RoomFull);
        }
        self.connections.insert(connection);
        Ok(())
    }

    fn player_for(&self, connection: Uuid) -> Option<PlayerId> {
        self.players
            .iter()
            .find(|(_, c)| **c == connection)
            .map(|(id, _)| id.clone())
    }

    fn require_display(&self, connection: Uuid) -> Result<(), RoomError> {
        if connection != self.display {
            return Err(RoomError::NotDisplay);
        }
        Ok(())
    }

    /// Feed a game envelope from a connection into the host session.
    ///
    /// The sender id is taken from the connection, not from the envelope.
    pub fn handle_envelope(
        &mut self,
        connection: Uuid,
        mut envelope: Envelope,
    ) -> Result<Vec<Outbound>, RoomError> {
        if !self.connections.contains(&connection) {
            return Err(RoomError::NotInRoom);
        }

        let sender = match &envelope.message {
            Message::PlayerJoin { player_id, .. } => {
                // A returning player takes over their id from the old connection
                self.players.insert(player_id.clone(), connection);
                player_id.clone()
            }
            _ if connection == self.display => PlayerId::from(HOST_DISPLAY_ID),
            _ => self.player_for(connection).ok_or(RoomError::NotJoined)?,
        };

        // Nobody leaves or picks a character on someone else's behalf
        match &mut envelope.message {
            Message::PlayerLeave { player_id } | Message::CharacterSelected { player_id, .. } => {
                *player_id = sender.clone();
            }
            _ => {}
        }
        envelope.sender_id = sender;

        Ok(self.session.handle(envelope))
    }

    pub fn start_game(&mut self, connection: Uuid) -> Result<Vec<Outbound>, RoomError> {
        self.require_display(connection)?;
        Ok(self.session.start_game()?)
    }

    pub fn play_again(&mut self, connection: Uuid) -> Result<Vec<Outbound>, RoomError> {
        self.require_display(connection)?;
        self.night_timer_armed = false;
        self.character_timer_armed = false;
        Ok(self.session.play_again())
    }

    /// Whether night just fell and nobody has scheduled its resolution yet.
    /// Arms the timer when it returns true.
    pub fn arm_night_timer(&mut self) -> bool {
        if self.phase() != GamePhase::Night || self.night_timer_armed {
            return false;
        }
        self.night_timer_armed = true;
        true
    }

    /// Arms the character-select timer if selection just opened, returning
    /// the selection round the timer belongs to.
    pub fn arm_character_timer(&mut self) -> Option<u64> {
        if self.phase() != GamePhase::CharacterSelect || self.character_timer_armed {
            return None;
        }
        self.character_timer_armed = true;
        self.select_round += 1;
        Some(self.select_round)
    }

    /// Give every player still choosing a random character.
    /// A timer from an earlier round does nothing.
    pub fn auto_select_remaining(&mut self, round: u64) -> Result<Vec<Outbound>, RoomError> {
        if round != self.select_round {
            return Ok(Vec::new());
        }
        self.character_timer_armed = false;
        if self.phase() != GamePhase::CharacterSelect {
            return Ok(Vec::new());
        }

        let mut outbound = Vec::new();
        for player in self.session.unselected_players() {
            outbound.extend(self.session.auto_select_character(&player)?);
        }
        Ok(outbound)
    }

    pub fn resolve_night(&mut self) -> Result<Vec<Outbound>, RoomError> {
        self.night_timer_armed = false;
        Ok(self.session.resolve_night()?)
    }

    /// Detach a connection. Players leave for good only while in the lobby;
    /// during a round their seat stays so they can reconnect.
    pub fn remove_connection(&mut self, connection: Uuid) -> Vec<Outbound> {
        self.connections.remove(&connection);

        let Some(player) = self.player_for(connection) else {
            return Vec::new();
        };
        self.players.remove(&player);

        if self.phase() != GamePhase::Lobby {
            return Vec::new();
        }
        let leave = Envelope::new(
            player.clone(),
            Message::PlayerLeave { player_id: player },
        );
        self.session.handle(leave)
    }

    /// Resolve outbound envelopes to the connections that should receive them
    pub fn route(&self, outbound: Vec<Outbound>) -> Vec<(Uuid, Envelope)> {
        let mut deliveries = Vec::new();
        for out in outbound {
            match out {
                Outbound::Broadcast(envelope) => {
                    for connection in &self.connections {
                        deliveries.push((*connection, envelope.clone()));
                    }
                }
                Outbound::To(player, envelope) => {
                    let connection = if &player == self.session.host_id() {
                        Some(self.display)
                    } else {
                        self.players.get(&player).copied()
                    };
                    if let Some(connection) = connection.filter(|c| self.connections.contains(c)) {
                        deliveries.push((connection, envelope));
                    }
                }
            }
        }
        deliveries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salem_core::Participant;

    fn room() -> GameRoom {
        let session = HostSession::with_seed("ABCD", PlayerId::from(HOST_DISPLAY_ID), 1);
        GameRoom::with_session(session, Uuid::new_v4())
    }

    /// Attach a connection and join it as a player
    fn join(room: &mut GameRoom, name: &str) -> (Uuid, Participant) {
        let connection = Uuid::new_v4();
        room.add_connection(connection).unwrap();
        let participant = Participant::new(PlayerId::from(name), false);
        room.handle_envelope(connection, participant.join(name)).unwrap();
        (connection, participant)
    }

    #[test]
    fn test_create_room() {
        let room = room();
        assert_eq!(room.connection_count(), 1);
        assert_eq!(room.code, "ABCD");
        assert_eq!(room.phase(), GamePhase::Lobby);
    }

    #[test]
    fn test_join_routes_snapshot_to_joiner_and_room() {
        let mut room = room();
        let (alice_conn, _) = join(&mut room, "alice");

        let connection = Uuid::new_v4();
        room.add_connection(connection).unwrap();
        let bob = Participant::new(PlayerId::from("bob"), false);
        let outbound = room.handle_envelope(connection, bob.join("Bob")).unwrap();
        let deliveries = room.route(outbound);

        // Targeted sync to bob, then a broadcast to display, alice and bob
        assert_eq!(deliveries.len(), 4);
        assert_eq!(deliveries.iter().filter(|(c, _)| *c == connection).count(), 2);
        assert!(deliveries.iter().any(|(c, _)| *c == alice_conn));
        assert!(deliveries.iter().any(|(c, _)| *c == room.display));
    }

    #[test]
    fn test_game_messages_need_a_player() {
        let mut room = room();
        let stranger = Uuid::new_v4();
        room.add_connection(stranger).unwrap();

        let participant = Participant::new(PlayerId::from("x"), false);
        assert!(matches!(
            room.handle_envelope(stranger, participant.draw()),
            Err(RoomError::NotJoined)
        ));
        assert!(matches!(
            room.handle_envelope(Uuid::new_v4(), participant.draw()),
            Err(RoomError::NotInRoom)
        ));
    }

    #[test]
    fn test_sender_id_comes_from_connection() {
        let mut room = room();
        let (alice_conn, _) = join(&mut room, "alice");
        join(&mut room, "bob");

        let spoofed = Participant::new(PlayerId::from("bob"), false).leave();
        room.handle_envelope(alice_conn, spoofed).unwrap();

        let players: Vec<&str> = room
            .session()
            .state()
            .players
            .iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(players, vec!["bob"]);
    }

    #[test]
    fn test_only_display_starts() {
        let mut room = room();
        let mut connections = Vec::new();
        for name in ["a", "b", "c", "d"] {
            connections.push(join(&mut room, name).0);
        }

        assert!(matches!(
            room.start_game(connections[0]),
            Err(RoomError::NotDisplay)
        ));
        let display = room.display;
        room.start_game(display).unwrap();
        assert_eq!(room.phase(), GamePhase::CharacterSelect);
    }

    #[test]
    fn test_start_needs_four_players() {
        let mut room = room();
        join(&mut room, "a");
        let display = room.display;
        assert!(matches!(
            room.start_game(display),
            Err(RoomError::Game(GameError::InvalidAction(_)))
        ));
    }

    #[test]
    fn test_disconnect_in_lobby_removes_player() {
        let mut room = room();
        let (alice_conn, _) = join(&mut room, "alice");
        join(&mut room, "bob");

        let outbound = room.remove_connection(alice_conn);
        assert!(!outbound.is_empty());
        assert_eq!(room.session().state().player_count(), 1);
    }

    #[test]
    fn test_disconnect_mid_game_keeps_seat_for_reconnect() {
        let mut room = room();
        let mut joined = Vec::new();
        for name in ["a", "b", "c", "d"] {
            joined.push(join(&mut room, name));
        }
        let display = room.display;
        room.start_game(display).unwrap();

        let (conn, participant) = &joined[0];
        assert!(room.remove_connection(*conn).is_empty());
        assert_eq!(room.session().state().player_count(), 4);

        let new_conn = Uuid::new_v4();
        room.add_connection(new_conn).unwrap();
        let outbound = room
            .handle_envelope(new_conn, participant.join("a"))
            .unwrap();
        let deliveries = room.route(outbound);
        assert!(deliveries.iter().any(|(c, _)| *c == new_conn));
        assert_eq!(room.session().state().player_count(), 4);
    }

    #[test]
    fn test_night_timer_arms_once() {
        let mut room = room();
        assert!(!room.arm_night_timer());
    }

    #[test]
    fn test_character_timer_picks_for_disconnected_player() {
        let mut room = room();
        let mut joined = Vec::new();
        for name in ["a", "b", "c", "d"] {
            joined.push(join(&mut room, name));
        }
        assert_eq!(room.arm_character_timer(), None);
        let display = room.display;
        room.start_game(display).unwrap();
        let round = room.arm_character_timer().unwrap();
        assert_eq!(room.arm_character_timer(), None);

        let pool = room.session().state().character_pool.clone();
        for ((conn, participant), character) in joined.iter().zip(&pool).take(2) {
            room.handle_envelope(*conn, participant.select_character(*character))
                .unwrap();
        }
        // This one walks away without choosing
        room.remove_connection(joined[3].0);
        assert_eq!(room.session().unselected_players().len(), 2);

        let outbound = room.auto_select_remaining(round).unwrap();
        assert_eq!(outbound.len(), 2);
        assert_eq!(room.phase(), GamePhase::Playing);
        assert!(room.session().unselected_players().is_empty());
    }

    #[test]
    fn test_stale_character_timer_is_ignored() {
        let mut room = room();
        for name in ["a", "b", "c", "d"] {
            join(&mut room, name);
        }
        let display = room.display;
        room.start_game(display).unwrap();
        let stale = room.arm_character_timer().unwrap();

        room.play_again(display).unwrap();
        room.start_game(display).unwrap();
        let current = room.arm_character_timer().unwrap();
        assert_ne!(stale, current);

        assert!(room.auto_select_remaining(stale).unwrap().is_empty());
        assert_eq!(room.phase(), GamePhase::CharacterSelect);
        room.auto_select_remaining(current).unwrap();
        assert_eq!(room.phase(), GamePhase::Playing);
    }

    #[test]
    fn test_host_messages_route_to_display() {
        let room = room();
        let host = room.session().host_id().clone();
        let deliveries = room.route(vec![Outbound::To(host, room.session().snapshot())]);
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].0, room.display);
    }
}

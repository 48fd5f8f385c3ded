//! WebSocket server and connection handling.

use crate::config::ServerConfig;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::room::{GameRoom, RoomError};
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use salem_core::protocol::generate_room_code;
use salem_core::{Envelope, Outbound};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Server state shared across all connections.
pub struct ServerState {
    pub config: ServerConfig,
    /// All active rooms by room code
    pub rooms: DashMap<String, GameRoom>,
    /// Mapping from connection ID to its room code
    pub connection_rooms: DashMap<Uuid, String>,
    /// Mapping from connection ID to its message sender
    pub senders: DashMap<Uuid, mpsc::UnboundedSender<ServerMessage>>,
}

impl ServerState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            rooms: DashMap::new(),
            connection_rooms: DashMap::new(),
            senders: DashMap::new(),
        }
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, connection: Uuid, msg: ServerMessage) {
        if let Some(sender) = self.senders.get(&connection) {
            let _ = sender.send(msg);
        }
    }

    fn send_error(&self, connection: Uuid, error: RoomError) {
        self.send_to(
            connection,
            ServerMessage::Error {
                message: error.to_string(),
            },
        );
    }

    /// Deliver routed envelopes; call with no room lock held.
    fn deliver(&self, deliveries: Vec<(Uuid, Envelope)>) {
        for (connection, envelope) in deliveries {
            self.send_to(connection, ServerMessage::Game(envelope));
        }
    }

    /// A room code not currently in use
    fn fresh_room_code(&self) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let code = generate_room_code(&mut rng);
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

/// Run the WebSocket server.
pub async fn run_server(state: Arc<ServerState>) -> anyhow::Result<()> {
    let addr = state.config.addr;
    let listener = TcpListener::bind(addr).await?;
    info!("Salem server listening on {}", addr);

    while let Ok((stream, peer_addr)) = listener.accept().await {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }

    Ok(())
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: Arc<ServerState>,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(stream).await?;
    info!("New WebSocket connection from {}", addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let connection_id = Uuid::new_v4();

    // Create channel for outgoing messages
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    state.senders.insert(connection_id, tx);

    let welcome = ServerMessage::Welcome { connection_id };
    let msg_text = serde_json::to_string(&welcome)?;
    ws_sender.send(Message::Text(msg_text)).await?;

    // Forward messages from channel to WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(text) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => handle_message(connection_id, client_msg, &state),
                Err(e) => warn!("Invalid message from {}: {}", connection_id, e),
            },
            Ok(Message::Close(_)) => {
                info!("Client {} closing connection", connection_id);
                break;
            }
            Ok(Message::Ping(_)) => {
                state.send_to(connection_id, ServerMessage::Pong);
            }
            Err(e) => {
                error!("WebSocket error from {}: {}", connection_id, e);
                break;
            }
            _ => {}
        }
    }

    leave_room(connection_id, &state);
    state.senders.remove(&connection_id);
    send_task.abort();

    info!("Connection closed for {}", connection_id);
    Ok(())
}

/// Handle a client message.
fn handle_message(connection_id: Uuid, msg: ClientMessage, state: &Arc<ServerState>) {
    match msg {
        ClientMessage::CreateRoom => {
            leave_room(connection_id, state);

            let room_code = state.fresh_room_code();
            let room = GameRoom::new(room_code.clone(), connection_id);
            state.rooms.insert(room_code.clone(), room);
            state.connection_rooms.insert(connection_id, room_code.clone());
            info!(room = %room_code, display = %connection_id, "Room created");

            state.send_to(connection_id, ServerMessage::RoomCreated { room_code });
        }

        ClientMessage::JoinRoom { room_code } => {
            let room_code = room_code.to_uppercase();
            let current = state.connection_rooms.get(&connection_id).map(|r| r.value().clone());
            if current.is_some_and(|code| code != room_code) {
                leave_room(connection_id, state);
            }
            let joined = match state.rooms.get_mut(&room_code) {
                Some(mut room) => room.add_connection(connection_id),
                None => Err(RoomError::RoomNotFound),
            };
            match joined {
                Ok(()) => {
                    state.connection_rooms.insert(connection_id, room_code.clone());
                    info!(room = %room_code, connection = %connection_id, "Connection joined room");
                    state.send_to(connection_id, ServerMessage::JoinedRoom { room_code });
                }
                Err(e) => state.send_error(connection_id, e),
            }
        }

        ClientMessage::LeaveRoom => {
            if leave_room(connection_id, state) {
                state.send_to(connection_id, ServerMessage::LeftRoom);
            }
        }

        ClientMessage::StartGame => {
            with_room(connection_id, state, |room| room.start_game(connection_id));
        }

        ClientMessage::PlayAgain => {
            with_room(connection_id, state, |room| room.play_again(connection_id));
        }

        ClientMessage::Game(envelope) => {
            debug!(connection = %connection_id, kind = envelope.message.kind(), "Game message");
            with_room(connection_id, state, |room| {
                room.handle_envelope(connection_id, envelope)
            });
        }

        ClientMessage::Ping => {
            state.send_to(connection_id, ServerMessage::Pong);
        }
    }
}

/// Run a room operation for the connection's room, deliver what it produced,
/// and start the character-select or night timer if that phase just began.
fn with_room<F>(connection_id: Uuid, state: &Arc<ServerState>, op: F)
where
    F: FnOnce(&mut GameRoom) -> Result<Vec<Outbound>, RoomError>,
{
    let Some(room_code) = state
        .connection_rooms
        .get(&connection_id)
        .map(|r| r.value().clone())
    else {
        state.send_error(connection_id, RoomError::NotInRoom);
        return;
    };

    let (result, arm_character, arm_night) = match state.rooms.get_mut(&room_code) {
        Some(mut room) => match op(room.value_mut()) {
            Ok(outbound) => (
                Ok(room.route(outbound)),
                room.arm_character_timer(),
                room.arm_night_timer(),
            ),
            Err(e) => (Err(e), None, false),
        },
        None => (Err(RoomError::RoomNotFound), None, false),
    };

    match result {
        Ok(deliveries) => state.deliver(deliveries),
        Err(e) => state.send_error(connection_id, e),
    }

    if let Some(round) = arm_character {
        schedule_character_select(room_code.clone(), round, Arc::clone(state));
    }
    if arm_night {
        schedule_night(room_code, Arc::clone(state));
    }
}

/// Pick characters for everyone still choosing once the selection window closes
fn schedule_character_select(room_code: String, round: u64, state: Arc<ServerState>) {
    let delay = state.config.character_select;
    debug!(room = %room_code, round, ?delay, "Character timer armed");

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let deliveries = match state.rooms.get_mut(&room_code) {
            Some(mut room) => match room.auto_select_remaining(round) {
                Ok(outbound) => {
                    if !outbound.is_empty() {
                        info!(room = %room_code, "Character selection timed out");
                    }
                    room.route(outbound)
                }
                Err(e) => {
                    warn!(room = %room_code, error = %e, "Automatic character selection failed");
                    return;
                }
            },
            None => return,
        };
        state.deliver(deliveries);
    });
}

/// Resolve the room's night once the submission window has passed
fn schedule_night(room_code: String, state: Arc<ServerState>) {
    let delay = state.config.night_delay;
    debug!(room = %room_code, ?delay, "Night timer armed");

    tokio::spawn(async move {
        tokio::time::sleep(delay).await;

        let deliveries = match state.rooms.get_mut(&room_code) {
            Some(mut room) => match room.resolve_night() {
                Ok(outbound) => room.route(outbound),
                Err(e) => {
                    warn!(room = %room_code, error = %e, "Night resolution skipped");
                    return;
                }
            },
            None => return,
        };
        state.deliver(deliveries);
    });
}

/// Detach a connection from its room. Returns whether it was in one.
fn leave_room(connection_id: Uuid, state: &Arc<ServerState>) -> bool {
    let Some((_, room_code)) = state.connection_rooms.remove(&connection_id) else {
        return false;
    };

    let (deliveries, is_empty) = match state.rooms.get_mut(&room_code) {
        Some(mut room) => {
            let outbound = room.remove_connection(connection_id);
            (room.route(outbound), room.is_empty())
        }
        None => return true,
    };

    if is_empty {
        state.rooms.remove(&room_code);
        info!(room = %room_code, "Room closed");
    } else {
        state.deliver(deliveries);
    }
    true
}

//! WebAssembly bindings for the Salem engine.
//!
//! This module exposes a host session to JavaScript through wasm-bindgen, so
//! a browser tab can act as the host of a room.

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

#[cfg(feature = "wasm")]
use crate::actions::GameAction;
#[cfg(feature = "wasm")]
use crate::player::PlayerId;
#[cfg(feature = "wasm")]
use crate::protocol::{self, Envelope};
#[cfg(feature = "wasm")]
use crate::sync::{HostSession, Outbound};

/// Initialize panic hook for better error messages in browser console
#[cfg(feature = "wasm")]
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Outgoing envelope in a JS-friendly shape; `to` is null for broadcasts
#[cfg(feature = "wasm")]
#[derive(serde::Serialize)]
struct JsOutbound {
    to: Option<PlayerId>,
    envelope: Envelope,
}

#[cfg(feature = "wasm")]
fn outbound_json(outbound: Vec<Outbound>) -> String {
    let out: Vec<JsOutbound> = outbound
        .into_iter()
        .map(|o| match o {
            Outbound::Broadcast(envelope) => JsOutbound { to: None, envelope },
            Outbound::To(to, envelope) => JsOutbound {
                to: Some(to),
                envelope,
            },
        })
        .collect();
    serde_json::to_string(&out).unwrap_or_else(|_| "[]".to_string())
}

/// Generate a fresh room code
#[cfg(feature = "wasm")]
#[wasm_bindgen(js_name = generateRoomCode)]
pub fn generate_room_code() -> String {
    protocol::generate_room_code(&mut rand::thread_rng())
}

/// WASM-exposed host wrapper
#[cfg(feature = "wasm")]
#[wasm_bindgen]
pub struct WasmHost {
    session: HostSession,
}

#[cfg(feature = "wasm")]
#[wasm_bindgen]
impl WasmHost {
    /// Host a room; `host_id` is the local player's id or `host_display`
    #[wasm_bindgen(constructor)]
    pub fn new(room_code: &str, host_id: &str) -> WasmHost {
        WasmHost {
            session: HostSession::new(room_code, PlayerId::from(host_id)),
        }
    }

    /// Get the current game state as JSON
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> String {
        serde_json::to_string(self.session.state()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Get the current phase as a string
    #[wasm_bindgen(js_name = getPhase)]
    pub fn get_phase(&self) -> String {
        serde_json::to_string(&self.session.phase()).unwrap_or_else(|_| "\"Unknown\"".to_string())
    }

    /// Apply an envelope received from a participant; returns outbound envelopes as JSON
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&mut self, envelope_json: &str) -> Result<String, JsValue> {
        let envelope = Envelope::from_json(envelope_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid envelope JSON: {}", e)))?;
        Ok(outbound_json(self.session.handle(envelope)))
    }

    /// Apply an in-round action for a player from JSON
    #[wasm_bindgen(js_name = applyAction)]
    pub fn apply_action(&mut self, player: &str, action_json: &str) -> Result<String, JsValue> {
        let action: GameAction = serde_json::from_str(action_json)
            .map_err(|e| JsValue::from_str(&format!("Invalid action JSON: {}", e)))?;
        Ok(outbound_json(self.session.submit(&PlayerId::from(player), action)))
    }

    /// Get valid actions for a player as JSON array
    #[wasm_bindgen(js_name = getValidActions)]
    pub fn get_valid_actions(&self, player: &str) -> String {
        let actions = self.session.state().valid_actions(&PlayerId::from(player));
        serde_json::to_string(&actions).unwrap_or_else(|_| "[]".to_string())
    }

    #[wasm_bindgen(js_name = startGame)]
    pub fn start_game(&mut self) -> Result<String, JsValue> {
        self.session
            .start_game()
            .map(outbound_json)
            .map_err(|e| JsValue::from_str(&format!("Cannot start: {}", e)))
    }

    /// Characters still free to pick, as JSON
    #[wasm_bindgen(js_name = getCharacters)]
    pub fn get_characters(&self) -> String {
        serde_json::to_string(&self.session.state().selectable_characters())
            .unwrap_or_else(|_| "[]".to_string())
    }

    #[wasm_bindgen(js_name = autoSelectCharacter)]
    pub fn auto_select_character(&mut self, player: &str) -> Result<String, JsValue> {
        self.session
            .auto_select_character(&PlayerId::from(player))
            .map(outbound_json)
            .map_err(|e| JsValue::from_str(&format!("Cannot select: {}", e)))
    }

    #[wasm_bindgen(js_name = resolveNight)]
    pub fn resolve_night(&mut self) -> Result<String, JsValue> {
        self.session
            .resolve_night()
            .map(outbound_json)
            .map_err(|e| JsValue::from_str(&format!("Cannot resolve night: {}", e)))
    }

    #[wasm_bindgen(js_name = playAgain)]
    pub fn play_again(&mut self) -> String {
        outbound_json(self.session.play_again())
    }

    /// Check if the game is finished
    #[wasm_bindgen(js_name = isFinished)]
    pub fn is_finished(&self) -> bool {
        self.session.state().is_finished()
    }

    /// Get the outcome as a string (if game is finished)
    #[wasm_bindgen(js_name = getOutcome)]
    pub fn get_outcome(&self) -> Option<String> {
        self.session
            .state()
            .outcome()
            .and_then(|o| serde_json::to_string(&o).ok())
    }
}

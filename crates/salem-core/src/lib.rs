//! Salem - a witches vs. villagers card game engine
//!
//! This crate provides the core game logic for Salem, including:
//! - Card, Tryal and character catalogs
//! - Player state: hidden roles, hands, blue cards and accusations
//! - Game state machine with full rule enforcement
//! - Host-authoritative replication over full-state snapshots
//!
//! # Architecture
//!
//! The game engine is designed to be platform-agnostic. It can be compiled to:
//! - Native Rust for server-side room hosting
//! - WebAssembly for a browser tab acting as the host
//!
//! # Modules
//!
//! - [`cards`]: Playing cards, Tryal cards and deck construction
//! - [`characters`]: The twelve characters and their ability table
//! - [`player`]: Player state
//! - [`game`]: Game state, lobby lifecycle and turn machine
//! - [`effects`]: Card resolution
//! - [`tryal`]: Reveals, ability choices and win evaluation
//! - [`night`]: The night phase and Malice
//! - [`protocol`]: Wire envelope and messages
//! - [`sync`]: Host and participant sessions

pub mod actions;
pub mod cards;
pub mod characters;
pub mod effects;
pub mod game;
pub mod night;
pub mod player;
pub mod protocol;
pub mod sync;
pub mod tryal;
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use actions::{GameAction, GameEvent, NightRole, Outcome, Survival, TryalTransfer};
pub use cards::{
    BlackEvent, BlueEffect, Card, CardKind, GreenEffect, SetupConfig, TryalCard, TryalKind,
};
pub use characters::{Ability, AbilityHook, Character, CharacterId};
pub use effects::CardEffect;
pub use game::{ChoiceKind, GameError, GamePhase, GameState, LinkedPair, PendingChoice, TurnPhase};
pub use player::{Player, PlayerId};
pub use protocol::{Envelope, Message, NightActionType, HOST_DISPLAY_ID};
pub use sync::{ActionOutcome, HostSession, Outbound, Participant};

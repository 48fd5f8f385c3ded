//! Card resolution.
//!
//! Playing a card is split in two: [`GameState::resolve_card`] validates the
//! play against the current state and produces a [`CardEffect`] without
//! touching anything, then [`GameState::play_card`] commits it. A rejected
//! play leaves the card in the player's hand.

use crate::actions::GameEvent;
use crate::cards::{BlueEffect, CardKind, GreenEffect};
use crate::characters::{Ability, AbilityHook};
use crate::game::{GameError, GamePhase, GameState, LinkedPair, TurnPhase};
use crate::player::PlayerId;
use tracing::debug;

/// A validated card play, ready to be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardEffect {
    Accuse { target: PlayerId, amount: u32 },
    /// Green card swallowed by the target's immunity
    Blocked { target: PlayerId },
    Alibi { target: PlayerId },
    Stocks { target: PlayerId },
    Scapegoat { from: PlayerId, to: PlayerId },
    Arson { target: PlayerId },
    Curse { from: PlayerId, to: PlayerId },
    Robbery { from: PlayerId, to: PlayerId },
    Attach { target: PlayerId },
    Link { first: PlayerId, second: PlayerId },
}

impl GameState {
    /// Validate a card play and work out its effect
    pub fn resolve_card(
        &self,
        player_id: &PlayerId,
        card_id: &str,
        target_id: &PlayerId,
        second_target_id: Option<&PlayerId>,
    ) -> Result<CardEffect, GameError> {
        let player = self
            .get_player(player_id)
            .ok_or_else(|| GameError::unknown_player(player_id))?;
        let card = player
            .hand_cards
            .iter()
            .find(|c| c.id == card_id)
            .ok_or_else(|| GameError::NotFound(format!("card {card_id}")))?;

        if target_id.as_str().is_empty() {
            return Err(GameError::MissingTarget);
        }
        let target = self
            .get_player(target_id)
            .ok_or_else(|| GameError::unknown_player(target_id))?;
        if !target.is_alive {
            return Err(GameError::invalid("Target is dead"));
        }

        let can_target_self = player
            .character_id
            .and_then(|c| c.ability(AbilityHook::TargetSelf))
            .is_some();
        if target_id == player_id && !can_target_self {
            return Err(GameError::invalid("Cannot target yourself"));
        }

        let second = if card.needs_second_target() {
            let second_id = second_target_id
                .filter(|id| !id.as_str().is_empty())
                .ok_or(GameError::MissingSecondTarget)?;
            let second = self
                .get_player(second_id)
                .ok_or_else(|| GameError::unknown_player(second_id))?;
            if !second.is_alive {
                return Err(GameError::invalid("Second target is dead"));
            }
            if second_id == target_id {
                return Err(GameError::invalid("Targets must be different players"));
            }
            Some(second_id.clone())
        } else {
            None
        };

        let target = target_id.clone();
        let effect = match card.kind {
            CardKind::Red { value } => {
                if self
                    .get_player(&target)
                    .is_some_and(|t| t.is_protected_from_accusations())
                {
                    return Err(GameError::Protected);
                }
                let bonus = player.character_id.map(|c| c.accusation_bonus()).unwrap_or(0);
                CardEffect::Accuse {
                    target,
                    amount: value + bonus,
                }
            }
            CardKind::Green { effect } => {
                let immune = self
                    .get_player(&target)
                    .and_then(|t| t.character_id)
                    .and_then(|c| c.ability(AbilityHook::GreenCard))
                    == Some(Ability::GreenImmunity);
                if immune {
                    CardEffect::Blocked { target }
                } else {
                    match (effect, second) {
                        (GreenEffect::Alibi, _) => CardEffect::Alibi { target },
                        (GreenEffect::Stocks, _) => CardEffect::Stocks { target },
                        (GreenEffect::Arson, _) => CardEffect::Arson { target },
                        (GreenEffect::Scapegoat, Some(to)) => {
                            CardEffect::Scapegoat { from: target, to }
                        }
                        (GreenEffect::Curse, Some(to)) => CardEffect::Curse { from: target, to },
                        (GreenEffect::Robbery, Some(to)) => {
                            CardEffect::Robbery { from: target, to }
                        }
                        _ => return Err(GameError::MissingSecondTarget),
                    }
                }
            }
            CardKind::Blue {
                effect: BlueEffect::Matchmaker,
            } => match second {
                Some(second) => CardEffect::Link {
                    first: target,
                    second,
                },
                None => return Err(GameError::MissingSecondTarget),
            },
            CardKind::Blue { .. } => CardEffect::Attach { target },
            CardKind::Black { .. } => {
                return Err(GameError::invalid("Black cards cannot be played"));
            }
        };

        Ok(effect)
    }

    /// Play a card from the active player's hand
    pub fn play_card(
        &mut self,
        player_id: &PlayerId,
        card_id: &str,
        target_id: &PlayerId,
        second_target_id: Option<&PlayerId>,
    ) -> Result<Vec<GameEvent>, GameError> {
        self.require_phase(GamePhase::Playing)?;
        self.require_current(player_id)?;
        self.require_alive(player_id)?;
        self.require_no_pending_choice()?;
        if self.has_drawn {
            return Err(GameError::invalid("Cannot play after drawing"));
        }

        let effect = self.resolve_card(player_id, card_id, target_id, second_target_id)?;

        let player = self
            .get_player_mut(player_id)
            .ok_or_else(|| GameError::unknown_player(player_id))?;
        let index = player
            .hand_cards
            .iter()
            .position(|c| c.id == card_id)
            .ok_or_else(|| GameError::NotFound(format!("card {card_id}")))?;
        let card = player.hand_cards.remove(index);
        debug!(player = %player_id, card = card.name(), target = %target_id, "Card played");

        self.has_played = true;
        self.turn_phase = TurnPhase::Played;

        let mut events = vec![GameEvent::CardPlayed {
            player: player_id.clone(),
            card_id: card.id.clone(),
            target: target_id.clone(),
        }];

        match effect {
            CardEffect::Attach { target } => {
                if let Some(t) = self.get_player_mut(&target) {
                    t.blue_cards.push(card.clone());
                }
                events.push(GameEvent::BlueCardAttached {
                    target,
                    card_id: card.id,
                });
                return Ok(events);
            }
            CardEffect::Link { first, second } => {
                self.linked_players
                    .push(LinkedPair::new(first.clone(), second.clone()));
                if let Some(t) = self.get_player_mut(&first) {
                    t.blue_cards.push(card.clone());
                }
                events.push(GameEvent::BlueCardAttached {
                    target: first.clone(),
                    card_id: card.id,
                });
                events.push(GameEvent::PlayersLinked { first, second });
                return Ok(events);
            }
            other => {
                self.discard_pile.push(card.clone());
                events.extend(self.apply_effect(player_id, &card.id, other));
            }
        }

        Ok(events)
    }

    fn apply_effect(
        &mut self,
        player_id: &PlayerId,
        card_id: &str,
        effect: CardEffect,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();

        match effect {
            CardEffect::Accuse { target, amount } => {
                let Some(t) = self.get_player_mut(&target) else {
                    return events;
                };
                t.accusations += amount;
                let total = t.accusations;
                let threshold = t.reveal_threshold();

                events.push(GameEvent::Accused {
                    target: target.clone(),
                    amount,
                    total,
                });
                if total >= threshold {
                    events.push(GameEvent::RevealRequired {
                        player: target.clone(),
                        triggered_by: player_id.clone(),
                    });
                    events.extend(self.accusation_reveal(&target, player_id));
                }
            }
            CardEffect::Blocked { target } => {
                events.push(GameEvent::GreenCardBlocked {
                    target,
                    card_id: card_id.to_string(),
                });
            }
            CardEffect::Alibi { target } => {
                if let Some(t) = self.get_player_mut(&target) {
                    let cleared = std::mem::take(&mut t.accusations);
                    events.push(GameEvent::AccusationsCleared { target, cleared });
                }
            }
            CardEffect::Stocks { target } => {
                if let Some(t) = self.get_player_mut(&target) {
                    t.is_skipped = true;
                    self.skip_next_turn.insert(target.clone());
                    events.push(GameEvent::PlacedInStocks { target });
                }
            }
            CardEffect::Scapegoat { from, to } => {
                let (amount, blue) = match self.get_player_mut(&from) {
                    Some(f) => (
                        std::mem::take(&mut f.accusations),
                        std::mem::take(&mut f.blue_cards),
                    ),
                    None => return events,
                };
                let count = blue.len();
                if let Some(t) = self.get_player_mut(&to) {
                    t.accusations += amount;
                    t.blue_cards.extend(blue);
                }
                events.push(GameEvent::AccusationsMoved {
                    from: from.clone(),
                    to: to.clone(),
                    amount,
                });
                events.push(GameEvent::BlueCardsMoved { from, to, count });
            }
            CardEffect::Arson { target } => {
                let burned = self
                    .get_player_mut(&target)
                    .map(|t| std::mem::take(&mut t.hand_cards))
                    .unwrap_or_default();
                let count = burned.len();
                self.discard_pile.extend(burned);
                events.push(GameEvent::HandBurned { target, count });
            }
            CardEffect::Curse { from, to } => {
                let blue = self
                    .get_player_mut(&from)
                    .map(|f| std::mem::take(&mut f.blue_cards))
                    .unwrap_or_default();
                let count = blue.len();
                if let Some(t) = self.get_player_mut(&to) {
                    t.blue_cards.extend(blue);
                }
                events.push(GameEvent::BlueCardsMoved { from, to, count });
            }
            CardEffect::Robbery { from, to } => {
                let hand = self
                    .get_player_mut(&from)
                    .map(|f| std::mem::take(&mut f.hand_cards))
                    .unwrap_or_default();
                let count = hand.len();
                if let Some(t) = self.get_player_mut(&to) {
                    t.hand_cards.extend(hand);
                }
                events.push(GameEvent::HandStolen { from, to, count });
            }
            CardEffect::Attach { .. } | CardEffect::Link { .. } => {}
        }

        events
    }
}

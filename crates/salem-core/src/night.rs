//! The night phase and the Malice event.

use crate::actions::{GameEvent, NightRole, Survival, TryalTransfer};
use crate::cards::{BlackEvent, BlueEffect};
use crate::characters::{Ability, AbilityHook};
use crate::game::{GameError, GamePhase, GameState};
use crate::player::PlayerId;
use rand::Rng;

impl GameState {
    pub(crate) fn start_night(&mut self, drawn_by: &PlayerId) -> Vec<GameEvent> {
        self.phase = GamePhase::Night;
        self.night_target = None;
        self.protected_player = None;
        vec![GameEvent::NightFell {
            drawn_by: drawn_by.clone(),
        }]
    }

    fn night_target_for(
        &self,
        submitter: &PlayerId,
        target: &PlayerId,
        role: NightRole,
    ) -> Result<PlayerId, GameError> {
        self.require_phase(GamePhase::Night)?;

        let player = self
            .get_player(submitter)
            .ok_or_else(|| GameError::unknown_player(submitter))?;
        let allowed = player.is_alive
            && match role {
                NightRole::Witch => player.is_witch,
                NightRole::Constable => player.is_constable,
            };
        if !allowed {
            return Err(GameError::invalid("You have no night action"));
        }

        if target.as_str().is_empty() {
            return Err(GameError::MissingTarget);
        }
        let victim = self
            .get_player(target)
            .ok_or_else(|| GameError::unknown_player(target))?;
        if !victim.is_alive {
            return Err(GameError::invalid("Target is dead"));
        }

        Ok(target.clone())
    }

    /// Record the witches' victim. The latest submission wins.
    pub fn witch_select_target(
        &mut self,
        player_id: &PlayerId,
        target_id: &PlayerId,
    ) -> Result<Vec<GameEvent>, GameError> {
        let target = self.night_target_for(player_id, target_id, NightRole::Witch)?;
        self.night_target = Some(target);
        Ok(vec![GameEvent::NightActionRecorded {
            player: player_id.clone(),
            role: NightRole::Witch,
        }])
    }

    /// Record the constable's protected player. The latest submission wins.
    pub fn constable_protect(
        &mut self,
        player_id: &PlayerId,
        target_id: &PlayerId,
    ) -> Result<Vec<GameEvent>, GameError> {
        let target = self.night_target_for(player_id, target_id, NightRole::Constable)?;
        self.protected_player = Some(target);
        Ok(vec![GameEvent::NightActionRecorded {
            player: player_id.clone(),
            role: NightRole::Constable,
        }])
    }

    /// Resolve whatever was submitted during the night and return to play.
    ///
    /// Missing submissions are fine: no witch target means nobody dies.
    pub fn resolve_night(&mut self) -> Result<Vec<GameEvent>, GameError> {
        self.require_phase(GamePhase::Night)?;

        let mut events = Vec::new();
        let target = self.night_target.take();
        let protected = self.protected_player.take();

        if let Some(victim) = target.and_then(|id| self.get_player(&id)).filter(|p| p.is_alive) {
            let victim_id = victim.id.clone();
            let character = victim.character_id;
            let survive_once = character.and_then(|c| c.ability(AbilityHook::NightKill))
                == Some(Ability::SurviveOnce)
                && !self.survivals_used.contains(&victim_id);

            let survival = if protected.as_ref() == Some(&victim_id) {
                Some(Survival::Constable)
            } else if victim.has_blue(BlueEffect::Shelter) {
                Some(Survival::Shelter)
            } else if let Some(c) = character.filter(|_| survive_once) {
                Some(Survival::Ability(c))
            } else {
                None
            };

            match survival {
                Some(reason) => {
                    if let Survival::Ability(_) = reason {
                        self.survivals_used.insert(victim_id.clone());
                    }
                    events.push(GameEvent::PlayerSurvived {
                        player: victim_id,
                        reason,
                    });
                }
                None => events.extend(self.kill_at_night(&victim_id)),
            }
        }

        self.phase = GamePhase::Playing;
        events.push(GameEvent::NightEnded);

        // The drawer may have been the victim or linked to them
        match self.check_game_over() {
            Some(outcome) => events.push(GameEvent::GameWon { outcome }),
            None => events.extend(self.pass_turn_if_current_dead()),
        }

        Ok(events)
    }

    fn kill_at_night(&mut self, victim: &PlayerId) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let Some(player) = self.get_player_mut(victim) else {
            return events;
        };
        player.is_alive = false;
        events.push(GameEvent::PlayerKilled {
            player: victim.clone(),
        });

        let partners: Vec<PlayerId> = self
            .linked_players
            .iter()
            .filter_map(|pair| pair.partner_of(victim).cloned())
            .collect();

        let mut dead = vec![victim.clone()];
        for partner in partners {
            if let Some(p) = self.get_player_mut(&partner).filter(|p| p.is_alive) {
                p.is_alive = false;
                events.push(GameEvent::LinkedDeath {
                    player: partner.clone(),
                    partner: victim.clone(),
                });
                dead.push(partner);
            }
        }

        for id in dead {
            let reveals_other = self
                .get_player(&id)
                .and_then(|p| p.character_id)
                .and_then(|c| c.ability(AbilityHook::NightDeath))
                == Some(Ability::RevealOther);
            if reveals_other {
                events.extend(self.offer_reveal_other(&id));
            }
        }

        events
    }

    /// Malice: the Black Cat holder and the drawing player each reveal a card,
    /// then every living player takes a random hidden Tryal card from the
    /// player to their right.
    pub fn handle_malice<R: Rng>(&mut self, rng: &mut R) -> Vec<GameEvent> {
        let mut events = Vec::new();
        // Fixed up front: an execution below passes the turn on
        let drawer = self.current_player_id();

        let cat_holder = self
            .alive_players()
            .find(|p| {
                p.hand_cards
                    .iter()
                    .any(|c| c.black_event() == Some(BlackEvent::BlackCat))
            })
            .map(|p| p.id.clone());
        if let Some(holder) = cat_holder {
            events.extend(self.reveal_tryal_card(&holder, None, None));
        }

        if let Some(drawer) = drawer {
            events.extend(self.reveal_tryal_card(&drawer, None, None));
        }

        if self.is_finished() {
            return events;
        }

        let seats: Vec<usize> = (0..self.players.len())
            .filter(|&i| self.players[i].is_alive)
            .collect();

        // Every pick is made against the pool as it was before anything moved
        let mut moves = Vec::new();
        for (n, &receiver) in seats.iter().enumerate() {
            let giver = seats[(n + 1) % seats.len()];
            if giver == receiver {
                continue;
            }
            let hidden: Vec<usize> = self.players[giver]
                .tryal_cards
                .iter()
                .enumerate()
                .filter(|(_, c)| !c.revealed)
                .map(|(i, _)| i)
                .collect();
            if hidden.is_empty() {
                continue;
            }
            let pick = hidden[rng.gen_range(0..hidden.len())];
            let card_id = self.players[giver].tryal_cards[pick].id.clone();
            moves.push((giver, receiver, card_id));
        }

        let mut transfers = Vec::new();
        for (giver, receiver, card_id) in moves {
            let Some(pos) = self.players[giver]
                .tryal_cards
                .iter()
                .position(|c| c.id == card_id)
            else {
                continue;
            };
            let card = self.players[giver].tryal_cards.remove(pos);
            if card.is_witch() {
                self.players[receiver].was_witch = true;
            }
            self.players[receiver].tryal_cards.push(card);
            transfers.push(TryalTransfer {
                from: self.players[giver].id.clone(),
                to: self.players[receiver].id.clone(),
                card_id,
            });
        }

        for player in &mut self.players {
            player.refresh_roles();
        }

        if !transfers.is_empty() {
            events.push(GameEvent::TryalsPassed { transfers });
        }
        if let Some(outcome) = self.check_game_over() {
            events.push(GameEvent::GameWon { outcome });
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Outcome;
    use crate::cards::{Card, CardKind, TryalCard, TryalKind};
    use crate::characters::CharacterId;
    use crate::game::{ChoiceKind, LinkedPair, PendingChoice};
    use crate::player::{avatar_for, Player};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn id(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    /// Five players; p0 and p1 are witches, p2 is the constable
    fn night_table() -> GameState {
        let mut game = GameState::new("TEST", id("host_display"));
        for i in 0..5 {
            let mut p = Player::new(PlayerId::new(format!("p{i}")), format!("P{i}"), avatar_for(i));
            let role = match i {
                0 | 1 => TryalKind::Witch,
                2 => TryalKind::Constable,
                _ => TryalKind::NotWitch,
            };
            p.tryal_cards = vec![
                TryalCard::new(format!("role_{i}"), role),
                TryalCard::new(format!("not_witch_{i}a"), TryalKind::NotWitch),
                TryalCard::new(format!("not_witch_{i}b"), TryalKind::NotWitch),
            ];
            p.refresh_roles();
            game.players.push(p);
        }
        game.total_witches = 3;
        game.phase = GamePhase::Night;
        game
    }

    #[test]
    fn test_only_witches_choose_victims() {
        let mut game = night_table();
        assert!(game.witch_select_target(&id("p3"), &id("p4")).is_err());
        assert!(game.constable_protect(&id("p0"), &id("p4")).is_err());
        assert!(game.witch_select_target(&id("p0"), &id("p4")).is_ok());
        assert!(game.constable_protect(&id("p2"), &id("p4")).is_ok());
    }

    #[test]
    fn test_last_submission_wins() {
        let mut game = night_table();
        game.witch_select_target(&id("p0"), &id("p3")).unwrap();
        game.witch_select_target(&id("p1"), &id("p4")).unwrap();
        assert_eq!(game.night_target, Some(id("p4")));
    }

    #[test]
    fn test_kill_and_return_to_play() {
        let mut game = night_table();
        game.witch_select_target(&id("p0"), &id("p3")).unwrap();
        let events = game.resolve_night().unwrap();

        assert!(!game.players[3].is_alive);
        assert_eq!(game.phase, GamePhase::Playing);
        assert!(events.contains(&GameEvent::PlayerKilled { player: id("p3") }));
        assert!(game.night_target.is_none());
    }

    #[test]
    fn test_constable_saves_target() {
        let mut game = night_table();
        game.witch_select_target(&id("p0"), &id("p3")).unwrap();
        game.constable_protect(&id("p2"), &id("p3")).unwrap();
        game.resolve_night().unwrap();
        assert!(game.players[3].is_alive);
    }

    #[test]
    fn test_shelter_saves_target() {
        let mut game = night_table();
        game.players[4].blue_cards.push(Card::new(
            "shelter_1",
            CardKind::Blue {
                effect: BlueEffect::Shelter,
            },
        ));
        game.witch_select_target(&id("p0"), &id("p4")).unwrap();
        let events = game.resolve_night().unwrap();
        assert!(game.players[4].is_alive);
        assert!(events.contains(&GameEvent::PlayerSurvived {
            player: id("p4"),
            reason: Survival::Shelter
        }));
    }

    #[test]
    fn test_cotton_mather_survives_once() {
        let mut game = night_table();
        game.players[4].character_id = Some(CharacterId::CottonMather);

        game.witch_select_target(&id("p0"), &id("p4")).unwrap();
        game.resolve_night().unwrap();
        assert!(game.players[4].is_alive);

        game.phase = GamePhase::Night;
        game.witch_select_target(&id("p0"), &id("p4")).unwrap();
        game.resolve_night().unwrap();
        assert!(!game.players[4].is_alive);
    }

    #[test]
    fn test_empty_night_kills_nobody() {
        let mut game = night_table();
        game.resolve_night().unwrap();
        assert!(game.players.iter().all(|p| p.is_alive));
    }

    #[test]
    fn test_linked_partner_dies_one_level() {
        let mut game = night_table();
        game.linked_players.push(LinkedPair::new(id("p3"), id("p4")));
        game.linked_players.push(LinkedPair::new(id("p4"), id("p2")));

        game.witch_select_target(&id("p0"), &id("p3")).unwrap();
        game.resolve_night().unwrap();

        assert!(!game.players[3].is_alive);
        assert!(!game.players[4].is_alive);
        assert!(game.players[2].is_alive, "links do not chain");
    }

    #[test]
    fn test_martha_corey_gets_reveal_choice() {
        let mut game = night_table();
        game.players[3].character_id = Some(CharacterId::MarthaCorey);
        game.witch_select_target(&id("p0"), &id("p3")).unwrap();
        game.resolve_night().unwrap();

        assert_eq!(
            game.pending_choice.as_ref().map(|c| &c.chooser),
            Some(&id("p3"))
        );
        game.reveal_other(&id("p3"), &id("p1")).unwrap();
        assert_eq!(game.revealed_witches.len(), 1);
    }

    #[test]
    fn test_witches_win_at_night() {
        let mut game = night_table();
        for i in 3..5 {
            game.players[i].is_alive = false;
        }
        game.witch_select_target(&id("p0"), &id("p2")).unwrap();
        let events = game.resolve_night().unwrap();
        assert_eq!(game.outcome(), Some(Outcome::Witches));
        assert!(events.contains(&GameEvent::GameWon {
            outcome: Outcome::Witches
        }));
    }

    #[test]
    fn test_malice_conserves_tryal_cards() {
        let mut game = night_table();
        game.phase = GamePhase::Playing;
        game.current_player_index = 3;
        let total = game.tryal_card_total();

        let mut rng = StdRng::seed_from_u64(11);
        let events = game.handle_malice(&mut rng);

        assert_eq!(game.tryal_card_total(), total);
        assert!(game.players[3].tryal_cards.iter().any(|c| c.revealed));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::TryalsPassed { .. })));
    }

    #[test]
    fn test_night_kill_of_drawer_passes_turn() {
        let mut game = night_table();
        game.current_player_index = 3;
        game.witch_select_target(&id("p0"), &id("p3")).unwrap();

        let events = game.resolve_night().unwrap();

        assert!(!game.players[3].is_alive);
        assert!(events.contains(&GameEvent::TurnEnded {
            player: id("p3"),
            next_player: id("p4"),
        }));
        assert_eq!(game.current_player_id(), Some(id("p4")));
        assert_eq!(game.turn_phase, crate::game::TurnPhase::Choose);
    }

    #[test]
    fn test_second_reveal_choice_waits_its_turn() {
        let mut game = night_table();
        game.players[3].character_id = Some(CharacterId::MarthaCorey);
        game.pending_choice = Some(PendingChoice {
            chooser: id("p2"),
            kind: ChoiceKind::RevealOther,
        });
        game.witch_select_target(&id("p0"), &id("p3")).unwrap();
        game.resolve_night().unwrap();

        assert_eq!(
            game.pending_choice.as_ref().map(|c| &c.chooser),
            Some(&id("p2"))
        );
        assert_eq!(game.queued_choices.len(), 1);
        assert_eq!(game.queued_choices[0].chooser, id("p3"));

        let events = game.reveal_other(&id("p2"), &id("p4")).unwrap();
        assert!(events.contains(&GameEvent::ChoicePending { chooser: id("p3") }));
        assert!(game.queued_choices.is_empty());

        game.reveal_other(&id("p3"), &id("p1")).unwrap();
        assert!(game.pending_choice.is_none());
        assert_eq!(game.revealed_witches.len(), 1);
    }

    #[test]
    fn test_black_cat_drawer_reveals_twice() {
        let mut game = night_table();
        game.phase = GamePhase::Playing;
        game.current_player_index = 3;
        game.players[3]
            .hand_cards
            .push(crate::cards::black_card(BlackEvent::BlackCat));

        let mut rng = StdRng::seed_from_u64(3);
        let events = game.handle_malice(&mut rng);

        let revealed: Vec<&String> = events
            .iter()
            .filter_map(|e| match e {
                GameEvent::TryalRevealed {
                    player, card_id, ..
                } if player == &id("p3") => Some(card_id),
                _ => None,
            })
            .collect();
        assert_eq!(revealed.len(), 2);
        assert_ne!(revealed[0], revealed[1]);
        assert!(game.players[3].is_alive);
    }

    #[test]
    fn test_malice_transfers_come_from_right_neighbour() {
        let mut game = night_table();
        game.phase = GamePhase::Playing;
        game.current_player_index = 3;
        let before: Vec<(PlayerId, Vec<String>)> = game
            .players
            .iter()
            .map(|p| (p.id.clone(), p.tryal_cards.iter().map(|c| c.id.clone()).collect()))
            .collect();

        let mut rng = StdRng::seed_from_u64(29);
        let events = game.handle_malice(&mut rng);
        let transfers = events
            .iter()
            .find_map(|e| match e {
                GameEvent::TryalsPassed { transfers } => Some(transfers.clone()),
                _ => None,
            })
            .unwrap();

        assert_eq!(transfers.len(), 5);
        let mut moved: Vec<&String> = transfers.iter().map(|t| &t.card_id).collect();
        moved.sort();
        moved.dedup();
        assert_eq!(moved.len(), transfers.len(), "no card is passed twice");

        for transfer in &transfers {
            let to = before.iter().position(|(p, _)| p == &transfer.to).unwrap();
            let (right, pool) = &before[(to + 1) % before.len()];
            assert_eq!(&transfer.from, right);
            assert!(pool.contains(&transfer.card_id));
        }
        for (i, player) in game.players.iter().enumerate() {
            assert_eq!(player.tryal_cards.len(), before[i].1.len());
        }
    }

    #[test]
    fn test_malice_executing_drawer_passes_turn() {
        let mut game = night_table();
        game.phase = GamePhase::Playing;
        game.current_player_index = 3;
        game.players[3].tryal_cards[0].revealed = true;
        game.players[3].tryal_cards[1].revealed = true;

        let mut rng = StdRng::seed_from_u64(5);
        let events = game.handle_malice(&mut rng);

        assert!(events.contains(&GameEvent::InnocentExecuted { player: id("p3") }));
        assert!(events.contains(&GameEvent::TurnEnded {
            player: id("p3"),
            next_player: id("p4"),
        }));
        assert!(!game.players[3].is_alive);
        assert_eq!(game.current_player_id(), Some(id("p4")));
    }
}

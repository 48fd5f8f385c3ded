//! Tryal reveals, ability choices and win evaluation.

use crate::actions::{GameEvent, Outcome};
use crate::cards::TryalKind;
use crate::characters::{Ability, AbilityHook};
use crate::game::{ChoiceKind, GameError, GamePhase, GameState, PendingChoice, RevealedWitch};
use crate::player::PlayerId;
use tracing::debug;

impl GameState {
    /// Reveal one of a player's hidden Tryal cards.
    ///
    /// With `index` unset the first hidden card is revealed. Unknown players,
    /// already revealed cards and finished games are a no-op.
    pub fn reveal_tryal_card(
        &mut self,
        player_id: &PlayerId,
        revealed_by: Option<&PlayerId>,
        index: Option<usize>,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if self.is_finished() {
            return events;
        }
        let Some(player) = self.get_player_mut(player_id) else {
            return events;
        };

        let index = match index {
            Some(i) if player.tryal_cards.get(i).is_some_and(|c| !c.revealed) => i,
            Some(_) => return events,
            None => match player.first_hidden_tryal() {
                Some(i) => i,
                None => return events,
            },
        };

        let card = &mut player.tryal_cards[index];
        card.revealed = true;
        let kind = card.kind;
        events.push(GameEvent::TryalRevealed {
            player: player_id.clone(),
            card_id: card.id.clone(),
            kind,
            revealed_by: revealed_by.cloned(),
        });

        if kind == TryalKind::Witch {
            self.revealed_witches.push(RevealedWitch {
                player_id: player_id.clone(),
                revealed_by: revealed_by.cloned(),
            });
            if self.revealed_witches.len() as u32 >= self.total_witches {
                events.push(self.finish(Outcome::Villagers));
            }
            return events;
        }

        if player.all_tryals_revealed() && !player.is_witch {
            player.is_alive = false;
            events.push(GameEvent::InnocentExecuted {
                player: player_id.clone(),
            });
            match self.check_game_over() {
                Some(outcome) => events.push(GameEvent::GameWon { outcome }),
                None => events.extend(self.pass_turn_if_current_dead()),
            }
            return events;
        }

        let reveals_other = player.is_alive
            && player
                .character_id
                .and_then(|c| c.ability(AbilityHook::InnocentRevealed))
                == Some(Ability::RevealOther);
        if reveals_other {
            events.extend(self.offer_reveal_other(player_id));
        }

        events
    }

    /// Reveal triggered by accusations reaching the threshold
    pub(crate) fn accusation_reveal(
        &mut self,
        target: &PlayerId,
        accuser: &PlayerId,
    ) -> Vec<GameEvent> {
        let Some(player) = self.get_player(target) else {
            return Vec::new();
        };

        let chooses = player
            .character_id
            .and_then(|c| c.ability(AbilityHook::AccusationReveal))
            == Some(Ability::ChooseOwnTryal);
        if chooses && player.hidden_tryal_count() > 1 {
            return self.park_choice(PendingChoice {
                chooser: target.clone(),
                kind: ChoiceKind::OwnTryal {
                    revealed_by: accuser.clone(),
                },
            });
        }

        self.reveal_tryal_card(target, Some(accuser), None)
    }

    /// Park a choice for `chooser` to reveal someone else's card, if anyone is left to pick
    pub(crate) fn offer_reveal_other(&mut self, chooser: &PlayerId) -> Vec<GameEvent> {
        let has_candidate = self
            .alive_players()
            .any(|p| &p.id != chooser && p.hidden_tryal_count() > 0);
        if !has_candidate {
            return Vec::new();
        }

        self.park_choice(PendingChoice {
            chooser: chooser.clone(),
            kind: ChoiceKind::RevealOther,
        })
    }

    /// Make a choice the pending one, or queue it behind the one already open
    fn park_choice(&mut self, choice: PendingChoice) -> Vec<GameEvent> {
        if let Some(open) = &self.pending_choice {
            debug!(chooser = %choice.chooser, waiting_on = %open.chooser, "Choice queued");
            self.queued_choices.push_back(choice);
            return Vec::new();
        }

        let chooser = choice.chooser.clone();
        self.pending_choice = Some(choice);
        vec![GameEvent::ChoicePending { chooser }]
    }

    /// Open the oldest queued choice that can still be made
    pub(crate) fn promote_queued_choice(&mut self) -> Vec<GameEvent> {
        if self.pending_choice.is_some() || self.is_finished() {
            return Vec::new();
        }

        while let Some(choice) = self.queued_choices.pop_front() {
            let still_possible = match &choice.kind {
                ChoiceKind::OwnTryal { .. } => self
                    .get_player(&choice.chooser)
                    .is_some_and(|p| p.is_alive && p.hidden_tryal_count() > 0),
                ChoiceKind::RevealOther => self
                    .alive_players()
                    .any(|p| p.id != choice.chooser && p.hidden_tryal_count() > 0),
            };
            if still_possible {
                return self.park_choice(choice);
            }
            debug!(chooser = %choice.chooser, "Queued choice no longer possible");
        }
        Vec::new()
    }

    /// Resolve a pending own-card choice
    pub fn choose_own_tryal(
        &mut self,
        player_id: &PlayerId,
        index: usize,
    ) -> Result<Vec<GameEvent>, GameError> {
        if self.is_finished() {
            return Err(GameError::GameOver);
        }
        let revealed_by = match &self.pending_choice {
            Some(PendingChoice {
                chooser,
                kind: ChoiceKind::OwnTryal { revealed_by },
            }) if chooser == player_id => revealed_by.clone(),
            _ => return Err(GameError::invalid("No choice pending for you")),
        };

        let hidden = self
            .get_player(player_id)
            .and_then(|p| p.tryal_cards.get(index))
            .is_some_and(|c| !c.revealed);
        if !hidden {
            return Err(GameError::invalid("Pick one of your hidden Tryal cards"));
        }

        self.pending_choice = None;
        let mut events = self.reveal_tryal_card(player_id, Some(&revealed_by), Some(index));
        events.extend(self.promote_queued_choice());
        Ok(events)
    }

    /// Resolve a pending reveal of another player's card
    pub fn reveal_other(
        &mut self,
        player_id: &PlayerId,
        target_id: &PlayerId,
    ) -> Result<Vec<GameEvent>, GameError> {
        if self.is_finished() {
            return Err(GameError::GameOver);
        }
        match &self.pending_choice {
            Some(PendingChoice {
                chooser,
                kind: ChoiceKind::RevealOther,
            }) if chooser == player_id => {}
            _ => return Err(GameError::invalid("No choice pending for you")),
        }

        if target_id.as_str().is_empty() {
            return Err(GameError::MissingTarget);
        }
        if target_id == player_id {
            return Err(GameError::invalid("Choose another player"));
        }
        let target = self
            .get_player(target_id)
            .ok_or_else(|| GameError::unknown_player(target_id))?;
        if !target.is_alive || target.hidden_tryal_count() == 0 {
            return Err(GameError::invalid("That player has nothing left to reveal"));
        }

        self.pending_choice = None;
        let mut events = self.reveal_tryal_card(target_id, Some(player_id), None);
        events.extend(self.promote_queued_choice());
        Ok(events)
    }

    /// Decide the winner from the current state, if there is one
    pub fn evaluate_outcome(&self) -> Option<Outcome> {
        let witch_alive = self.alive_players().any(|p| p.is_witch);
        let quota_revealed =
            self.total_witches > 0 && self.revealed_witches.len() as u32 >= self.total_witches;
        if !witch_alive || quota_revealed {
            return Some(Outcome::Villagers);
        }

        if !self.alive_players().any(|p| !p.is_witch) {
            return Some(Outcome::Witches);
        }

        None
    }

    /// End the game if someone has won. Only rounds in progress are evaluated.
    pub fn check_game_over(&mut self) -> Option<Outcome> {
        match self.phase {
            GamePhase::GameOver { outcome } => Some(outcome),
            GamePhase::Playing | GamePhase::Night => {
                let outcome = self.evaluate_outcome()?;
                self.finish(outcome);
                Some(outcome)
            }
            GamePhase::Lobby | GamePhase::CharacterSelect => None,
        }
    }

    pub(crate) fn finish(&mut self, outcome: Outcome) -> GameEvent {
        self.phase = GamePhase::GameOver { outcome };
        self.pending_choice = None;
        self.queued_choices.clear();
        self.night_target = None;
        self.protected_player = None;
        GameEvent::GameWon { outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::TryalCard;
    use crate::characters::CharacterId;
    use crate::player::{avatar_for, Player};

    fn id(s: &str) -> PlayerId {
        PlayerId::from(s)
    }

    /// Four players; p0 holds a witch card, everyone else is innocent
    fn table() -> GameState {
        let mut game = GameState::new("TEST", id("host_display"));
        for i in 0..4 {
            let mut p = Player::new(PlayerId::new(format!("p{i}")), format!("P{i}"), avatar_for(i));
            let first = if i == 0 {
                TryalCard::new("witch_1", TryalKind::Witch)
            } else {
                TryalCard::new(format!("not_witch_{i}0"), TryalKind::NotWitch)
            };
            let second = TryalCard::new(format!("not_witch_{i}1"), TryalKind::NotWitch);
            p.tryal_cards = vec![first, second];
            p.refresh_roles();
            game.players.push(p);
        }
        game.total_witches = 1;
        game.phase = GamePhase::Playing;
        game
    }

    #[test]
    fn test_reveal_is_first_hidden_card() {
        let mut game = table();
        game.reveal_tryal_card(&id("p1"), None, None);
        assert!(game.players[1].tryal_cards[0].revealed);
        assert!(!game.players[1].tryal_cards[1].revealed);
    }

    #[test]
    fn test_witch_quota_ends_game() {
        let mut game = table();
        let events = game.reveal_tryal_card(&id("p0"), Some(&id("p1")), None);

        assert_eq!(game.outcome(), Some(Outcome::Villagers));
        assert_eq!(game.revealed_witches.len(), 1);
        assert!(events.contains(&GameEvent::GameWon {
            outcome: Outcome::Villagers
        }));
    }

    #[test]
    fn test_innocent_executed_when_fully_revealed() {
        let mut game = table();
        game.reveal_tryal_card(&id("p2"), None, None);
        assert!(game.players[2].is_alive);

        let events = game.reveal_tryal_card(&id("p2"), None, None);
        assert!(!game.players[2].is_alive);
        assert!(events.contains(&GameEvent::InnocentExecuted { player: id("p2") }));
        assert!(!game.is_finished());
    }

    #[test]
    fn test_reveal_unknown_player_is_noop() {
        let mut game = table();
        let before = game.clone();
        assert!(game.reveal_tryal_card(&id("ghost"), None, None).is_empty());
        assert_eq!(game, before);
    }

    #[test]
    fn test_witches_win_without_villagers() {
        let mut game = table();
        game.total_witches = 3;
        for p in game.players.iter_mut().skip(1) {
            p.is_alive = false;
        }
        assert_eq!(game.check_game_over(), Some(Outcome::Witches));
    }

    #[test]
    fn test_no_outcome_outside_round() {
        let mut game = table();
        game.phase = GamePhase::Lobby;
        game.players[0].is_alive = false;
        assert_eq!(game.check_game_over(), None);
    }

    #[test]
    fn test_bridget_bishop_chooses_card() {
        let mut game = table();
        game.players[2].character_id = Some(CharacterId::BridgetBishop);

        let events = game.accusation_reveal(&id("p2"), &id("p1"));
        assert_eq!(events, vec![GameEvent::ChoicePending { chooser: id("p2") }]);

        assert!(game.choose_own_tryal(&id("p1"), 1).is_err());
        game.choose_own_tryal(&id("p2"), 1).unwrap();
        assert!(!game.players[2].tryal_cards[0].revealed);
        assert!(game.players[2].tryal_cards[1].revealed);
        assert!(game.pending_choice.is_none());
    }

    #[test]
    fn test_rebecca_nurse_reveals_another() {
        let mut game = table();
        game.players[3].character_id = Some(CharacterId::RebeccaNurse);

        game.reveal_tryal_card(&id("p3"), None, None);
        assert_eq!(
            game.pending_choice,
            Some(PendingChoice {
                chooser: id("p3"),
                kind: ChoiceKind::RevealOther
            })
        );
        assert!(game.reveal_other(&id("p3"), &id("p3")).is_err());

        game.reveal_other(&id("p3"), &id("p0")).unwrap();
        assert_eq!(game.outcome(), Some(Outcome::Villagers));
    }
}

//! Characters and their abilities.
//!
//! Each character is a row in an ability table: the engine asks a character
//! about a specific [`AbilityHook`] at a well-defined point in the rules and
//! gets back an optional, strongly typed [`Ability`].

use crate::cards::BlueEffect;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Default accusation total at which a Tryal card is revealed
pub const DEFAULT_REVEAL_THRESHOLD: u32 = 7;

/// Cards drawn per turn without an ability
pub const DEFAULT_DRAW_COUNT: usize = 2;

/// Identifies one of the twelve historical characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterId {
    MaryWarren,
    SamuelParris,
    JohnProctor,
    Tituba,
    SarahGood,
    GilesCorey,
    RebeccaNurse,
    AnnPutnam,
    CottonMather,
    BridgetBishop,
    SarahOsborne,
    MarthaCorey,
}

/// Points in the rules where a character may intervene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityHook {
    /// Character was just chosen
    Selected,
    /// Player is about to draw
    Draw,
    /// Number of cards drawn per turn
    DrawCount,
    /// Player picks themselves as a card target
    TargetSelf,
    /// Player plays a red card
    AccusationBonus,
    /// Player receives accusations
    RevealThreshold,
    /// Player is the target of a green card
    GreenCard,
    /// Player is about to be revealed through accusations
    AccusationReveal,
    /// One of the player's own cards was revealed as not a witch
    InnocentRevealed,
    /// Player is about to die from the night kill
    NightKill,
    /// Player died from the night kill
    NightDeath,
}

/// What a character does at a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ability {
    /// Look at one of your own Tryal cards
    PeekOwnTryal,
    /// Start with a blue card in front of you
    StartWithBlueCard(BlueEffect),
    /// Look at the top cards of the deck
    PeekDeck(usize),
    /// Draw this many cards instead of the default
    DrawCount(usize),
    /// May target yourself with cards
    TargetSelf,
    /// Extra accusations on every red card you play
    AccusationBonus(u32),
    /// Accusations needed before a reveal
    RevealThreshold(u32),
    /// Green cards played on you have no effect
    GreenImmunity,
    /// Choose which of your own Tryal cards is revealed
    ChooseOwnTryal,
    /// Reveal one Tryal card of another player
    RevealOther,
    /// Survive one night kill per game
    SurviveOnce,
}

/// A selectable character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Character {
    pub id: CharacterId,
    pub name: &'static str,
    pub ability_text: &'static str,
}

impl CharacterId {
    pub const ALL: [CharacterId; 12] = [
        CharacterId::MaryWarren,
        CharacterId::SamuelParris,
        CharacterId::JohnProctor,
        CharacterId::Tituba,
        CharacterId::SarahGood,
        CharacterId::GilesCorey,
        CharacterId::RebeccaNurse,
        CharacterId::AnnPutnam,
        CharacterId::CottonMather,
        CharacterId::BridgetBishop,
        CharacterId::SarahOsborne,
        CharacterId::MarthaCorey,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CharacterId::MaryWarren => "Mary Warren",
            CharacterId::SamuelParris => "Samuel Parris",
            CharacterId::JohnProctor => "John Proctor",
            CharacterId::Tituba => "Tituba",
            CharacterId::SarahGood => "Sarah Good",
            CharacterId::GilesCorey => "Giles Corey",
            CharacterId::RebeccaNurse => "Rebecca Nurse",
            CharacterId::AnnPutnam => "Ann Putnam",
            CharacterId::CottonMather => "Cotton Mather",
            CharacterId::BridgetBishop => "Bridget Bishop",
            CharacterId::SarahOsborne => "Sarah Osborne",
            CharacterId::MarthaCorey => "Martha Corey",
        }
    }

    pub fn ability_text(&self) -> &'static str {
        match self {
            CharacterId::MaryWarren => "Looks at her first Tryal card when chosen",
            CharacterId::SamuelParris => "Starts the game with a Faith card",
            CharacterId::JohnProctor => "May play cards on himself",
            CharacterId::Tituba => "Sees the top 3 cards of the deck when drawing",
            CharacterId::SarahGood => "Draws 3 cards instead of 2",
            CharacterId::GilesCorey => "Needs 9 accusations to be revealed instead of 7",
            CharacterId::RebeccaNurse => {
                "When her Tryal card is revealed innocent, reveals another player's card"
            }
            CharacterId::AnnPutnam => "Adds 1 to every accusation she plays",
            CharacterId::CottonMather => "Survives the night kill once",
            CharacterId::BridgetBishop => "Chooses which of her Tryal cards is revealed",
            CharacterId::SarahOsborne => "Green cards have no effect on her",
            CharacterId::MarthaCorey => "When killed at night, reveals another player's card",
        }
    }

    /// Look up this character's ability for a hook
    pub fn ability(&self, hook: AbilityHook) -> Option<Ability> {
        use AbilityHook as H;
        use CharacterId as C;

        match (self, hook) {
            (C::MaryWarren, H::Selected) => Some(Ability::PeekOwnTryal),
            (C::SamuelParris, H::Selected) => Some(Ability::StartWithBlueCard(BlueEffect::Faith)),
            (C::JohnProctor, H::TargetSelf) => Some(Ability::TargetSelf),
            (C::Tituba, H::Draw) => Some(Ability::PeekDeck(3)),
            (C::SarahGood, H::DrawCount) => Some(Ability::DrawCount(3)),
            (C::GilesCorey, H::RevealThreshold) => Some(Ability::RevealThreshold(9)),
            (C::RebeccaNurse, H::InnocentRevealed) => Some(Ability::RevealOther),
            (C::AnnPutnam, H::AccusationBonus) => Some(Ability::AccusationBonus(1)),
            (C::CottonMather, H::NightKill) => Some(Ability::SurviveOnce),
            (C::BridgetBishop, H::AccusationReveal) => Some(Ability::ChooseOwnTryal),
            (C::SarahOsborne, H::GreenCard) => Some(Ability::GreenImmunity),
            (C::MarthaCorey, H::NightDeath) => Some(Ability::RevealOther),
            _ => None,
        }
    }

    pub fn character(&self) -> Character {
        Character {
            id: *self,
            name: self.name(),
            ability_text: self.ability_text(),
        }
    }

    pub fn draw_count(&self) -> usize {
        match self.ability(AbilityHook::DrawCount) {
            Some(Ability::DrawCount(n)) => n,
            _ => DEFAULT_DRAW_COUNT,
        }
    }

    pub fn reveal_threshold(&self) -> u32 {
        match self.ability(AbilityHook::RevealThreshold) {
            Some(Ability::RevealThreshold(n)) => n,
            _ => DEFAULT_REVEAL_THRESHOLD,
        }
    }

    pub fn accusation_bonus(&self) -> u32 {
        match self.ability(AbilityHook::AccusationBonus) {
            Some(Ability::AccusationBonus(n)) => n,
            _ => 0,
        }
    }
}

/// Characters offered during selection: `min(players + 4, 12)` at random
pub fn selection_pool<R: Rng>(player_count: usize, rng: &mut R) -> Vec<CharacterId> {
    let mut pool = CharacterId::ALL.to_vec();
    pool.shuffle(rng);
    pool.truncate((player_count + 4).min(CharacterId::ALL.len()));
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_defaults_and_exception() {
        assert_eq!(CharacterId::GilesCorey.reveal_threshold(), 9);
        assert_eq!(CharacterId::MaryWarren.reveal_threshold(), 7);
    }

    #[test]
    fn test_draw_count() {
        assert_eq!(CharacterId::SarahGood.draw_count(), 3);
        assert_eq!(CharacterId::Tituba.draw_count(), 2);
    }

    #[test]
    fn test_ability_table_has_one_entry_per_character() {
        let hooks = [
            AbilityHook::Selected,
            AbilityHook::Draw,
            AbilityHook::DrawCount,
            AbilityHook::TargetSelf,
            AbilityHook::AccusationBonus,
            AbilityHook::RevealThreshold,
            AbilityHook::GreenCard,
            AbilityHook::AccusationReveal,
            AbilityHook::InnocentRevealed,
            AbilityHook::NightKill,
            AbilityHook::NightDeath,
        ];
        for character in CharacterId::ALL {
            let count = hooks.iter().filter(|h| character.ability(**h).is_some()).count();
            assert_eq!(count, 1, "{:?}", character);
        }
    }

    #[test]
    fn test_selection_pool_size() {
        let mut rng = rand::thread_rng();
        assert_eq!(selection_pool(4, &mut rng).len(), 8);
        assert_eq!(selection_pool(10, &mut rng).len(), 12);
    }
}

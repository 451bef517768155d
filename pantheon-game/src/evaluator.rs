//! Base verdict of a wager from a single uniform draw.
use serde::{Deserialize, Serialize};

use crate::dice::Dice;
use crate::error::PantheonError;
use crate::game::{Choice, GameDescriptor};
use crate::numbers::{probability, unit_to_index};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub win: bool,
    pub near_miss: bool,
    pub roll: f64,
    /// Token the draw declared winning, for choice-based games.
    pub winning_token: Option<Choice>,
}

/// Reject a choice that does not belong to the game's domain.
///
/// # Errors
///
/// Returns [`PantheonError::InvalidChoice`] when the rule does not accept it.
pub fn validate_choice(game: &GameDescriptor, choice: Option<Choice>) -> Result<(), PantheonError> {
    if game.choice_rule.accepts(choice) {
        Ok(())
    } else {
        Err(PantheonError::InvalidChoice {
            game: game.tag.clone(),
            choice,
        })
    }
}

/// Decide the base verdict with exactly one draw.
///
/// For choice games the draw also decides the winning token: under the win
/// chance the player's own token wins, otherwise the remainder of the draw
/// selects one of the other tokens.
///
/// # Errors
///
/// Returns [`PantheonError::InvalidChoice`] before drawing if the choice is
/// outside the game's token set.
pub fn evaluate(
    game: &GameDescriptor,
    choice: Option<Choice>,
    win_chance: f64,
    near_miss_band: f64,
    dice: &mut dyn Dice,
) -> Result<Evaluation, PantheonError> {
    validate_choice(game, choice)?;
    let chance = probability(win_chance);
    let roll = dice.roll();

    let (win, winning_token) = match choice {
        None => (roll < chance, None),
        Some(picked) => {
            let winning = winning_token(game, picked, roll, chance);
            (winning == picked, Some(winning))
        }
    };
    let near_miss = !win && roll < chance + near_miss_band;

    Ok(Evaluation {
        win,
        near_miss,
        roll,
        winning_token,
    })
}

fn winning_token(game: &GameDescriptor, picked: Choice, roll: f64, chance: f64) -> Choice {
    if roll < chance {
        return picked;
    }
    let others: Vec<Choice> = game
        .choice_rule
        .tokens()
        .into_iter()
        .filter(|token| *token != picked)
        .collect();
    if others.is_empty() {
        return picked;
    }
    let span = 1.0 - chance;
    let remainder = if span > 0.0 {
        (roll - chance) / span
    } else {
        0.0
    };
    others[unit_to_index(remainder, others.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dice::ScriptedDice;
    use crate::game::ChoiceRule;

    #[test]
    fn chance_game_wins_under_threshold() {
        let game = GameDescriptor::new("wheel", 0.4, 2.0);
        let mut dice = ScriptedDice::new([0.39, 0.42, 0.9]);
        let win = evaluate(&game, None, 0.4, 0.05, &mut dice).unwrap();
        assert!(win.win && !win.near_miss);
        let near = evaluate(&game, None, 0.4, 0.05, &mut dice).unwrap();
        assert!(!near.win && near.near_miss);
        let far = evaluate(&game, None, 0.4, 0.05, &mut dice).unwrap();
        assert!(!far.win && !far.near_miss);
        assert_eq!(dice.draws(), 3);
    }

    #[test]
    fn choice_game_declares_player_token_under_chance() {
        let game =
            GameDescriptor::new("cups", 1.0 / 3.0, 2.8).with_choice_rule(ChoiceRule::Cups {
                count: 3,
            });
        let mut dice = ScriptedDice::new([0.1]);
        let eval = evaluate(&game, Some(Choice::Cup(2)), 1.0 / 3.0, 0.05, &mut dice).unwrap();
        assert!(eval.win);
        assert_eq!(eval.winning_token, Some(Choice::Cup(2)));
    }

    #[test]
    fn choice_game_maps_remainder_to_other_tokens() {
        let game = GameDescriptor::new("coin", 0.5, 1.9).with_choice_rule(ChoiceRule::Sides);
        let mut dice = ScriptedDice::new([0.8]);
        let eval = evaluate(&game, Some(Choice::Heads), 0.5, 0.05, &mut dice).unwrap();
        assert!(!eval.win);
        assert_eq!(eval.winning_token, Some(Choice::Tails));

        let cards =
            GameDescriptor::new("cards", 0.25, 3.8).with_choice_rule(ChoiceRule::Cards {
                count: 4,
            });
        let mut dice = ScriptedDice::new([0.99]);
        let eval = evaluate(&cards, Some(Choice::Card(0)), 0.25, 0.05, &mut dice).unwrap();
        assert_eq!(eval.winning_token, Some(Choice::Card(3)));
        assert!(!eval.near_miss);
    }

    #[test]
    fn invalid_choice_is_rejected_before_drawing() {
        let game = GameDescriptor::new("coin", 0.5, 1.9).with_choice_rule(ChoiceRule::Sides);
        let mut dice = ScriptedDice::new([0.1]);
        let err = evaluate(&game, Some(Choice::Cup(0)), 0.5, 0.05, &mut dice).unwrap_err();
        assert!(matches!(err, PantheonError::InvalidChoice { .. }));
        assert!(evaluate(&game, None, 0.5, 0.05, &mut dice).is_err());
        assert_eq!(dice.draws(), 0);
    }

    #[test]
    fn single_cup_game_never_resolves() {
        let game =
            GameDescriptor::new("one_cup", 0.1, 5.0).with_choice_rule(ChoiceRule::Cups {
                count: 1,
            });
        let mut dice = ScriptedDice::new([0.95]);
        let err = evaluate(&game, Some(Choice::Cup(0)), 0.1, 0.05, &mut dice).unwrap_err();
        assert!(matches!(err, PantheonError::InvalidChoice { .. }));
        assert_eq!(dice.draws(), 0);
    }
}

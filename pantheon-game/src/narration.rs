//! Flavor text for finished rounds.
//!
//! The engine asks a [`Narrator`] for one line per round. Narration is
//! cosmetic: when the narrator fails the round still completes and a static
//! line for the verdict is used instead.
use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{NARRATION_FALLBACK_LOSS, NARRATION_FALLBACK_WIN};
use crate::numbers::probability;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrationRequest {
    pub game: String,
    pub win: bool,
    pub stake: f64,
    pub payout_multiplier: f64,
    /// Patron's share of all loyalty, in `[0, 1]`.
    pub focus_score: f64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NarrationError {
    #[error("narrator unavailable: {0}")]
    Unavailable(String),
    #[error("narration rejected: {0}")]
    Rejected(String),
}

pub trait Narrator {
    /// Produce a line for a finished round.
    ///
    /// # Errors
    ///
    /// Implementations return a [`NarrationError`] when no line can be made.
    fn narrate(&self, request: &NarrationRequest) -> Result<String, NarrationError>;
}

/// Static line used when narration fails.
#[must_use]
pub const fn fallback_line(win: bool) -> &'static str {
    if win {
        NARRATION_FALLBACK_WIN
    } else {
        NARRATION_FALLBACK_LOSS
    }
}

/// Ask `narrator` for a line, degrading to [`fallback_line`] on error.
#[must_use]
pub fn narrate_or_fallback(narrator: &dyn Narrator, request: &NarrationRequest) -> String {
    match narrator.narrate(request) {
        Ok(line) if !line.trim().is_empty() => line,
        Ok(_) => fallback_line(request.win).to_string(),
        Err(err) => {
            warn!("narration for {} fell back: {err}", request.game);
            fallback_line(request.win).to_string()
        }
    }
}

/// Offline narrator built from fixed phrases, tuned by how devoted the
/// player is.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateNarrator;

impl Narrator for TemplateNarrator {
    fn narrate(&self, request: &NarrationRequest) -> Result<String, NarrationError> {
        let devotion = match probability(request.focus_score) {
            focus if focus >= 0.75 => "your devoted patron",
            focus if focus >= 0.4 => "a watchful patron",
            _ => "distant gods",
        };
        let line = if request.win {
            format!(
                "At {}, {devotion} turn your {:.0} into glory at {:.2}x.",
                request.game, request.stake, request.payout_multiplier
            )
        } else {
            format!(
                "At {}, {devotion} look away as your {:.0} slips into the dark.",
                request.game, request.stake
            )
        };
        Ok(line)
    }
}

/// Narrator that always fails, leaving every round to the fallback lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNarrator;

impl Narrator for SilentNarrator {
    fn narrate(&self, _request: &NarrationRequest) -> Result<String, NarrationError> {
        Err(NarrationError::Unavailable(String::from("silent")))
    }
}

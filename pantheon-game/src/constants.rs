//! Centralized balance and tuning constants for the Pantheon engine.
//!
//! These values define the deterministic math of round resolution. They feed
//! the defaults of [`crate::config::EngineConfig`]; overriding them at runtime
//! goes through that config rather than through these constants.

// Economy ---------------------------------------------------------------------
pub(crate) const STARTING_BALANCE: f64 = 1_000.0;
pub(crate) const INFLUENCE_FLOOR: f64 = 1.0;
pub(crate) const REDISTRIBUTION_FRACTION: f64 = 0.5;
pub(crate) const LOYALTY_RATE: f64 = 0.25;
pub(crate) const CHARGE_RATE: f64 = 0.1;
pub(crate) const HALF_REAPING_FACTOR: f64 = 0.5;

// Evaluation ------------------------------------------------------------------
pub(crate) const NEAR_MISS_BAND: f64 = 0.05;

// Scorn and echo --------------------------------------------------------------
pub(crate) const RESENTMENT_PER_ABANDONMENT: f64 = 50.0;
pub(crate) const ECHO_RESENTMENT_SCALE: f64 = 200.0;
pub(crate) const ECHO_CHANCE_PER_SCALE: f64 = 0.05;
pub(crate) const ECHO_CHANCE_CAP: f64 = 0.5;
pub(crate) const ECHO_PAYOUT_MULTIPLIER: f64 = 2.0;

// Ultimates -------------------------------------------------------------------
pub(crate) const SELF_SACRIFICE_FRACTION: f64 = 0.2;

// Intervention monitor --------------------------------------------------------
pub(crate) const INTERVENTION_STREAK_THRESHOLD: u32 = 5;
pub(crate) const INTERVENTION_COLLAPSE_RATIO: f64 = 0.10;
pub(crate) const INTERVENTION_BALANCE_GRANT: f64 = 250.0;
pub(crate) const INTERVENTION_EFFECT_ROUNDS: u32 = 3;
pub(crate) const INTERVENTION_FORGIVENESS_POTENCY: f64 = 1.0;
pub(crate) const INTERVENTION_BOOST_POTENCY: f64 = 2.0;

// Champion clash --------------------------------------------------------------
pub(crate) const CLASH_HEALTH: u32 = 30;
pub(crate) const CLASH_HIT_DAMAGE: u32 = 10;
pub(crate) const CLASH_TRANSFER_FRACTION: f64 = 0.25;
pub(crate) const CLASH_VICTORY_BONUS: f64 = 250.0;
pub(crate) const CLASH_STAKE_RETURN_MULTIPLIER: f64 = 2.0;

// Ascension -------------------------------------------------------------------
pub(crate) const ASCENSION_COST: f64 = 10_000.0;

// Narration keys ----------------------------------------------------------------
pub(crate) const NARRATION_FALLBACK_WIN: &str = "The heavens smile upon your wager.";
pub(crate) const NARRATION_FALLBACK_LOSS: &str = "The gods are silent. Fortune turns away.";

//! Engine tuning. Every field defaults from [`crate::constants`] so partial
//! JSON overrides are accepted.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{
    ASCENSION_COST, CHARGE_RATE, CLASH_HEALTH, CLASH_HIT_DAMAGE, CLASH_STAKE_RETURN_MULTIPLIER,
    CLASH_TRANSFER_FRACTION, CLASH_VICTORY_BONUS, ECHO_CHANCE_CAP, ECHO_CHANCE_PER_SCALE,
    ECHO_PAYOUT_MULTIPLIER, ECHO_RESENTMENT_SCALE, HALF_REAPING_FACTOR, INTERVENTION_BALANCE_GRANT,
    INTERVENTION_BOOST_POTENCY, INTERVENTION_COLLAPSE_RATIO, INTERVENTION_EFFECT_ROUNDS,
    INTERVENTION_FORGIVENESS_POTENCY, INTERVENTION_STREAK_THRESHOLD, LOYALTY_RATE,
    NEAR_MISS_BAND, REDISTRIBUTION_FRACTION, RESENTMENT_PER_ABANDONMENT, SELF_SACRIFICE_FRACTION,
    STARTING_BALANCE,
};

/// Errors raised when engine configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least {min:.2} (got {value:.2})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("clash damage {damage} cannot exceed health {health} or be zero")]
    ClashDamage { damage: u32, health: u32 },
    #[error("intervention streak threshold must be positive")]
    StreakThreshold,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub starting_balance: f64,
    pub redistribution_fraction: f64,
    pub loyalty_rate: f64,
    pub charge_rate: f64,
    pub half_reaping_factor: f64,
    pub near_miss_band: f64,
    pub self_sacrifice_fraction: f64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            starting_balance: STARTING_BALANCE,
            redistribution_fraction: REDISTRIBUTION_FRACTION,
            loyalty_rate: LOYALTY_RATE,
            charge_rate: CHARGE_RATE,
            half_reaping_factor: HALF_REAPING_FACTOR,
            near_miss_band: NEAR_MISS_BAND,
            self_sacrifice_fraction: SELF_SACRIFICE_FRACTION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    pub resentment_per_abandonment: f64,
    pub resentment_scale: f64,
    pub chance_per_scale: f64,
    pub chance_cap: f64,
    pub payout_multiplier: f64,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            resentment_per_abandonment: RESENTMENT_PER_ABANDONMENT,
            resentment_scale: ECHO_RESENTMENT_SCALE,
            chance_per_scale: ECHO_CHANCE_PER_SCALE,
            chance_cap: ECHO_CHANCE_CAP,
            payout_multiplier: ECHO_PAYOUT_MULTIPLIER,
        }
    }
}

impl EchoConfig {
    /// Chance that a win echoes back at a scorned god.
    #[must_use]
    pub fn chance(&self, resentment: f64) -> f64 {
        if self.resentment_scale <= 0.0 {
            return 0.0;
        }
        (resentment / self.resentment_scale * self.chance_per_scale).min(self.chance_cap)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterventionConfig {
    pub streak_threshold: u32,
    pub collapse_ratio: f64,
    pub balance_grant: f64,
    pub effect_rounds: u32,
    pub forgiveness_potency: f64,
    pub boost_potency: f64,
}

impl Default for InterventionConfig {
    fn default() -> Self {
        Self {
            streak_threshold: INTERVENTION_STREAK_THRESHOLD,
            collapse_ratio: INTERVENTION_COLLAPSE_RATIO,
            balance_grant: INTERVENTION_BALANCE_GRANT,
            effect_rounds: INTERVENTION_EFFECT_ROUNDS,
            forgiveness_potency: INTERVENTION_FORGIVENESS_POTENCY,
            boost_potency: INTERVENTION_BOOST_POTENCY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClashConfig {
    pub health: u32,
    pub hit_damage: u32,
    pub transfer_fraction: f64,
    pub victory_bonus: f64,
    pub stake_return_multiplier: f64,
}

impl Default for ClashConfig {
    fn default() -> Self {
        Self {
            health: CLASH_HEALTH,
            hit_damage: CLASH_HIT_DAMAGE,
            transfer_fraction: CLASH_TRANSFER_FRACTION,
            victory_bonus: CLASH_VICTORY_BONUS,
            stake_return_multiplier: CLASH_STAKE_RETURN_MULTIPLIER,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub economy: EconomyConfig,
    pub echo: EchoConfig,
    pub intervention: InterventionConfig,
    pub clash: ClashConfig,
    pub ascension_cost: AscensionCost,
}

/// Balance spent by the one-time ascension ritual.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AscensionCost(pub f64);

impl Default for AscensionCost {
    fn default() -> Self {
        Self(ASCENSION_COST)
    }
}

impl EngineConfig {
    /// Parse overrides from JSON; omitted fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Validate ranges, returning the first violation found.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let economy = &self.economy;
        ensure_min("economy.starting_balance", economy.starting_balance, 0.0)?;
        ensure_range(
            "economy.redistribution_fraction",
            economy.redistribution_fraction,
            0.0,
            1.0,
        )?;
        ensure_min("economy.loyalty_rate", economy.loyalty_rate, 0.0)?;
        ensure_min("economy.charge_rate", economy.charge_rate, 0.0)?;
        ensure_range(
            "economy.half_reaping_factor",
            economy.half_reaping_factor,
            0.0,
            1.0,
        )?;
        ensure_range("economy.near_miss_band", economy.near_miss_band, 0.0, 1.0)?;
        ensure_range(
            "economy.self_sacrifice_fraction",
            economy.self_sacrifice_fraction,
            0.0,
            1.0,
        )?;

        ensure_min(
            "echo.resentment_per_abandonment",
            self.echo.resentment_per_abandonment,
            0.0,
        )?;
        ensure_range("echo.chance_cap", self.echo.chance_cap, 0.0, 1.0)?;
        ensure_min("echo.payout_multiplier", self.echo.payout_multiplier, 1.0)?;

        let intervention = &self.intervention;
        if intervention.streak_threshold == 0 {
            return Err(ConfigError::StreakThreshold);
        }
        ensure_range(
            "intervention.collapse_ratio",
            intervention.collapse_ratio,
            0.0,
            1.0,
        )?;
        ensure_min("intervention.balance_grant", intervention.balance_grant, 0.0)?;
        ensure_min("intervention.boost_potency", intervention.boost_potency, 1.0)?;

        let clash = &self.clash;
        if clash.hit_damage == 0 || clash.hit_damage > clash.health {
            return Err(ConfigError::ClashDamage {
                damage: clash.hit_damage,
                health: clash.health,
            });
        }
        ensure_range("clash.transfer_fraction", clash.transfer_fraction, 0.0, 1.0)?;
        ensure_min("clash.victory_bonus", clash.victory_bonus, 0.0)?;
        ensure_min("ascension_cost", self.ascension_cost.0, 0.0)?;
        Ok(())
    }
}

fn ensure_min(field: &'static str, value: f64, min: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min {
        Ok(())
    } else {
        Err(ConfigError::MinViolation { field, min, value })
    }
}

fn ensure_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert_eq!(EngineConfig::default().validate(), Ok(()));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = EngineConfig::from_json(
            r#"{ "economy": { "starting_balance": 50.0 }, "ascension_cost": 5.0 }"#,
        )
        .unwrap();
        assert!((cfg.economy.starting_balance - 50.0).abs() < f64::EPSILON);
        assert!((cfg.economy.loyalty_rate - LOYALTY_RATE).abs() < f64::EPSILON);
        assert!((cfg.ascension_cost.0 - 5.0).abs() < f64::EPSILON);
        assert_eq!(cfg.clash, ClashConfig::default());
    }

    #[test]
    fn validate_reports_out_of_range_fields() {
        let mut cfg = EngineConfig::default();
        cfg.economy.redistribution_fraction = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::RangeViolation {
                field: "economy.redistribution_fraction",
                ..
            })
        ));

        let mut cfg = EngineConfig::default();
        cfg.clash.hit_damage = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::ClashDamage { .. })
        ));

        let mut cfg = EngineConfig::default();
        cfg.intervention.streak_threshold = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::StreakThreshold));

        let mut cfg = EngineConfig::default();
        cfg.economy.starting_balance = f64::NAN;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn echo_chance_scales_and_caps() {
        let echo = EchoConfig::default();
        assert!((echo.chance(200.0) - 0.05).abs() < 1e-12);
        assert!((echo.chance(100_000.0) - 0.5).abs() < 1e-12);
        assert!(echo.chance(0.0).abs() < f64::EPSILON);
    }
}

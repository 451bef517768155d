//! Influence ledger: how popular each god is across the world.
//!
//! Every value is floored at [`INFLUENCE_FLOOR`]. Transfers and
//! redistributions move mass between entries; when a source would dip below
//! the floor the shortfall is not recovered elsewhere, so clamping can inject
//! a small amount of influence. [`Redistribution::floor_injection`] reports
//! exactly how much.
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::constants::INFLUENCE_FLOOR;
use crate::error::LedgerError;
use crate::numbers::{count_to_f64, finite_or_zero, floored, non_negative};
use crate::pantheon::{EntityId, Pantheon};

/// Bookkeeping for a single `redistribute` call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Redistribution {
    /// Influence credited to the receiving side.
    pub moved_in: f64,
    /// Influence actually debited from the paying side after clamping.
    pub moved_out: f64,
    /// Influence created because a payer hit the floor.
    pub floor_injection: f64,
}

/// Bookkeeping for a single `transfer` call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transfer {
    pub credited: f64,
    pub debited: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfluenceLedger {
    scores: BTreeMap<EntityId, f64>,
}

impl InfluenceLedger {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            scores: BTreeMap::new(),
        }
    }

    /// Seed the ledger with each god's starting influence.
    #[must_use]
    pub fn from_pantheon(pantheon: &Pantheon) -> Self {
        let scores = pantheon
            .iter()
            .map(|entity| {
                (
                    entity.id.clone(),
                    floored(entity.starting_influence, INFLUENCE_FLOOR),
                )
            })
            .collect();
        Self { scores }
    }

    /// Build a ledger from raw entries, clamping each to the floor.
    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = (EntityId, f64)>) -> Self {
        let scores = entries
            .into_iter()
            .map(|(id, value)| (id, floored(value, INFLUENCE_FLOOR)))
            .collect();
        Self { scores }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<f64> {
        self.scores.get(id).copied()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.scores.contains_key(id)
    }

    #[must_use]
    pub fn total(&self) -> f64 {
        self.scores.values().sum()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, f64)> {
        self.scores.iter().map(|(id, value)| (id, *value))
    }

    /// Entity holding the plurality of influence.
    ///
    /// Computed from the current entries on every call. Ties go to the
    /// lexicographically smallest id.
    #[must_use]
    pub fn dominant(&self) -> Option<&EntityId> {
        self.scores
            .iter()
            .fold(None, |best: Option<(&EntityId, f64)>, (id, value)| match best {
                Some((_, top)) if *value <= top => best,
                _ => Some((id, *value)),
            })
            .map(|(id, _)| id)
    }

    /// Strongest entity other than `excluded`, same tie rule as [`Self::dominant`].
    #[must_use]
    pub fn strongest_except(&self, excluded: &str) -> Option<&EntityId> {
        self.scores
            .iter()
            .filter(|(id, _)| id.as_str() != excluded)
            .fold(None, |best: Option<(&EntityId, f64)>, (id, value)| match best {
                Some((_, top)) if *value <= top => best,
                _ => Some((id, *value)),
            })
            .map(|(id, _)| id)
    }

    /// Shift `stake * fraction` toward (`won`) or away from (`!won`) `target`,
    /// split evenly across every other entity.
    ///
    /// # Errors
    ///
    /// Returns an error if `target` has no entry or the stake is not a
    /// finite, non-negative amount.
    pub fn redistribute(
        &mut self,
        target: &str,
        stake: f64,
        fraction: f64,
        won: bool,
    ) -> Result<Redistribution, LedgerError> {
        if !self.scores.contains_key(target) {
            return Err(LedgerError::UnknownEntity(EntityId::new(target)));
        }
        if !stake.is_finite() || stake < 0.0 {
            return Err(LedgerError::InvalidAmount(stake));
        }
        let others = self.scores.len() - 1;
        if others == 0 {
            return Ok(Redistribution::default());
        }
        let delta = non_negative(stake * fraction);
        let share = delta / count_to_f64(others);

        let mut report = Redistribution::default();
        for (id, value) in &mut self.scores {
            if id.as_str() == target {
                if won {
                    *value += delta;
                    report.moved_in += delta;
                } else {
                    let (debited, injected) = debit(value, delta);
                    report.moved_out += debited;
                    report.floor_injection += injected;
                }
            } else if won {
                let (debited, injected) = debit(value, share);
                report.moved_out += debited;
                report.floor_injection += injected;
            } else {
                *value += share;
                report.moved_in += share;
            }
        }
        debug!(
            "influence redistribute target={target} won={won} delta={delta:.2} injected={:.2}",
            report.floor_injection
        );
        Ok(report)
    }

    /// Move `amount` from `from` to `to`. The source is clamped at the floor;
    /// the destination always receives the full amount.
    ///
    /// # Errors
    ///
    /// Returns an error if either entity is unknown or the amount is invalid.
    pub fn transfer(&mut self, from: &str, to: &str, amount: f64) -> Result<Transfer, LedgerError> {
        if !amount.is_finite() || amount < 0.0 {
            return Err(LedgerError::InvalidAmount(amount));
        }
        if !self.scores.contains_key(to) {
            return Err(LedgerError::UnknownEntity(EntityId::new(to)));
        }
        let Some(source) = self.scores.get_mut(from) else {
            return Err(LedgerError::UnknownEntity(EntityId::new(from)));
        };
        let (debited, _) = debit(source, amount);
        if let Some(destination) = self.scores.get_mut(to) {
            *destination += amount;
        }
        debug!("influence transfer {from} -> {to} amount={amount:.2} debited={debited:.2}");
        Ok(Transfer {
            credited: amount,
            debited,
        })
    }

    /// Move an entry's value under a new key without changing the number.
    ///
    /// # Errors
    ///
    /// Returns an error if `old` is unknown or `new` already exists.
    pub fn rename(&mut self, old: &str, new: EntityId) -> Result<f64, LedgerError> {
        if self.scores.contains_key(new.as_str()) {
            return Err(LedgerError::DuplicateEntity(new));
        }
        let value = self
            .scores
            .remove(old)
            .ok_or_else(|| LedgerError::UnknownEntity(EntityId::new(old)))?;
        self.scores.insert(new, value);
        Ok(value)
    }
}

/// Subtract `amount` from `value`, clamping at the floor.
///
/// Returns the amount actually removed and the shortfall the floor absorbed.
fn debit(value: &mut f64, amount: f64) -> (f64, f64) {
    let before = finite_or_zero(*value).max(INFLUENCE_FLOOR);
    let after = floored(before - amount, INFLUENCE_FLOOR);
    *value = after;
    let debited = before - after;
    (debited, non_negative(amount - debited))
}

//! Randomness sources for round resolution.
//!
//! Every stage that consults chance draws from a single [`Dice`] owned by the
//! session, so a seeded stream replays a session exactly and a scripted
//! source can pin each draw in tests.
use hmac::{Hmac, Mac};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::Sha256;
use std::collections::VecDeque;

use crate::numbers::{probability, unit_to_index};

const FATE_DOMAIN: &[u8] = b"pantheon.fate";

/// A source of uniform draws in `[0, 1)`.
pub trait Dice {
    /// Draw the next uniform value in `[0, 1)`.
    fn roll(&mut self) -> f64;

    /// Number of draws consumed so far.
    fn draws(&self) -> u64;

    /// Draw and report whether it landed under `chance`.
    fn chance(&mut self, chance: f64) -> bool {
        self.roll() < probability(chance)
    }

    /// Draw an index uniformly from `0..len`.
    fn pick(&mut self, len: usize) -> usize {
        let unit = self.roll();
        unit_to_index(unit, len)
    }
}

/// Counting wrapper for RNG streams providing instrumentation.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl<R: RngCore> CountingRng<R> {
    pub const fn wrap(rng: R) -> Self {
        Self { rng, draws: 0 }
    }
}

impl<R: RngCore> Dice for CountingRng<R> {
    fn roll(&mut self) -> f64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.r#gen::<f64>()
    }

    fn draws(&self) -> u64 {
        self.draws
    }
}

/// Seeded fate stream used by live sessions.
pub type FateStream = CountingRng<ChaCha20Rng>;

impl FateStream {
    /// Construct the stream from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self::wrap(ChaCha20Rng::seed_from_u64(derive_stream_seed(seed, FATE_DOMAIN)))
    }
}

/// Replays a fixed list of draws, then repeats `exhausted` forever.
///
/// The default exhausted value sits just under 1.0 so that no chance-based
/// effect fires once the script runs out.
#[derive(Debug, Clone)]
pub struct ScriptedDice {
    queue: VecDeque<f64>,
    exhausted: f64,
    draws: u64,
}

impl ScriptedDice {
    #[must_use]
    pub fn new(rolls: impl IntoIterator<Item = f64>) -> Self {
        Self {
            queue: rolls.into_iter().collect(),
            exhausted: 0.999_999,
            draws: 0,
        }
    }

    #[must_use]
    pub const fn with_exhausted(mut self, value: f64) -> Self {
        self.exhausted = value;
        self
    }

    /// Append more draws to the end of the script.
    pub fn push(&mut self, rolls: impl IntoIterator<Item = f64>) {
        self.queue.extend(rolls);
    }

    /// Draws still queued in the script.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl Dice for ScriptedDice {
    fn roll(&mut self) -> f64 {
        self.draws = self.draws.saturating_add(1);
        self.queue.pop_front().unwrap_or(self.exhausted)
    }

    fn draws(&self) -> u64 {
        self.draws
    }
}

impl<D: Dice + ?Sized> Dice for Box<D> {
    fn roll(&mut self) -> f64 {
        (**self).roll()
    }

    fn draws(&self) -> u64 {
        (**self).draws()
    }
}

fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()) else {
        return user_seed;
    };
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let mut seed_bytes = [0_u8; 8];
    seed_bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(seed_bytes)
}

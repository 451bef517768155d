//! Pantheon Game Engine
//!
//! Platform-agnostic outcome resolution and influence engine for the Pantheon
//! wagering game. This crate holds every game mechanic without UI, storage or
//! narration backends.

pub mod ascension;
pub mod clash;
pub mod config;
pub mod constants;
pub mod dice;
pub mod economy;
pub mod effects;
pub mod error;
pub mod evaluator;
pub mod game;
pub mod intervention;
pub mod ledger;
pub mod narration;
pub mod numbers;
pub mod pantheon;
pub mod pipeline;
pub mod seed;
pub mod session;
pub mod snapshot;

// Re-export commonly used types
pub use ascension::{AscensionOutcome, AscensionRequest};
pub use clash::{ClashProgress, ClashSettlement, ClashSide, ClashState, Exchange, Stance};
pub use config::{
    AscensionCost, ClashConfig, ConfigError, EchoConfig, EconomyConfig, EngineConfig,
    InterventionConfig,
};
pub use dice::{CountingRng, Dice, FateStream, ScriptedDice};
pub use economy::{Accrual, Echo, PlayerEconomyState, PledgeReport, UltimateActivation};
pub use effects::{ActiveEffects, EffectKind, TemporaryEffect};
pub use error::{LedgerError, PantheonError};
pub use evaluator::{Evaluation, evaluate, validate_choice};
pub use game::{Choice, ChoiceRule, GameDescriptor, RoundRequest};
pub use intervention::{InterventionEvent, InterventionGrant, InterventionTrigger};
pub use ledger::{InfluenceLedger, Redistribution, Transfer};
pub use narration::{
    NarrationError, NarrationRequest, Narrator, SilentNarrator, TemplateNarrator, fallback_line,
};
pub use pantheon::{
    BoonEffect, Calamity, CalamityEffect, Dominion, Entity, EntityId, LoyaltyBoon, Pantheon,
    UltimatePower,
};
pub use pipeline::{EffectLog, Resolution, Stage};
pub use seed::{Omen, decode_omen, encode_omen, omen_from_entropy, parse_seed};
pub use session::{PantheonSession, RoundOutcome};
pub use snapshot::{Snapshot, SnapshotError};

/// Trait for abstracting save/load operations
/// Platform-specific implementations should provide this
pub trait SessionStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Save a session snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be saved.
    fn save_snapshot(&self, save_name: &str, snapshot: &Snapshot) -> Result<(), Self::Error>;

    /// Load a session snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded.
    fn load_snapshot(&self, save_name: &str) -> Result<Option<Snapshot>, Self::Error>;

    /// Delete a saved snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    fn delete_save(&self, save_name: &str) -> Result<(), Self::Error>;
}

/// Main game engine for creating, saving and restoring sessions
pub struct GameEngine<S>
where
    S: SessionStorage,
{
    storage: S,
    config: EngineConfig,
}

impl<S> GameEngine<S>
where
    S: SessionStorage,
{
    /// Create a new engine over the provided storage and configuration
    pub const fn new(storage: S, config: EngineConfig) -> Self {
        Self { storage, config }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create a new seeded session over the standard roster
    ///
    /// # Errors
    ///
    /// Returns an error if the engine configuration is invalid.
    pub fn create_session(&self, seed: u64) -> Result<PantheonSession, ConfigError> {
        PantheonSession::new(seed, self.config.clone())
    }

    /// Create a session from a shared omen code or a decimal seed
    ///
    /// # Errors
    ///
    /// Returns an error if the code cannot be parsed or the configuration is
    /// invalid.
    pub fn create_session_from_code(&self, code: &str) -> Result<PantheonSession, anyhow::Error> {
        let seed =
            parse_seed(code).ok_or_else(|| anyhow::anyhow!("unrecognized seed code {code}"))?;
        Ok(self.create_session(seed)?)
    }

    /// Snapshot and save a session
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be built or stored.
    pub fn save_session(
        &self,
        save_name: &str,
        session: &PantheonSession,
    ) -> Result<(), anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
    {
        let snapshot = session.snapshot()?;
        self.storage
            .save_snapshot(save_name, &snapshot)
            .map_err(Into::into)
    }

    /// Load and rebuild a saved session
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded or fails verification.
    pub fn load_session(&self, save_name: &str) -> Result<Option<PantheonSession>, anyhow::Error>
    where
        S::Error: Into<anyhow::Error>,
    {
        if let Some(snapshot) = self.storage.load_snapshot(save_name).map_err(Into::into)? {
            let session = PantheonSession::restore(snapshot, self.config.clone())?;
            Ok(Some(session))
        } else {
            Ok(None)
        }
    }

    /// Delete a saved session
    ///
    /// # Errors
    ///
    /// Returns an error if the save cannot be deleted.
    pub fn delete_session(&self, save_name: &str) -> Result<(), S::Error> {
        self.storage.delete_save(save_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::convert::Infallible;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct MemoryStorage {
        saves: Rc<RefCell<HashMap<String, Snapshot>>>,
    }

    impl SessionStorage for MemoryStorage {
        type Error = Infallible;

        fn save_snapshot(&self, save_name: &str, snapshot: &Snapshot) -> Result<(), Self::Error> {
            self.saves
                .borrow_mut()
                .insert(save_name.to_string(), snapshot.clone());
            Ok(())
        }

        fn load_snapshot(&self, save_name: &str) -> Result<Option<Snapshot>, Self::Error> {
            Ok(self.saves.borrow().get(save_name).cloned())
        }

        fn delete_save(&self, save_name: &str) -> Result<(), Self::Error> {
            self.saves.borrow_mut().remove(save_name);
            Ok(())
        }
    }

    #[test]
    fn save_load_delete_roundtrip() {
        let storage = MemoryStorage::default();
        let engine = GameEngine::new(storage.clone(), EngineConfig::default());
        let mut session = engine.create_session(99).unwrap();
        session.pledge("verdana").unwrap();
        let game = GameDescriptor::standard_floor().remove(4);
        session.play_round(&RoundRequest::new(game, 25.0)).unwrap();

        engine.save_session("slot", &session).unwrap();
        let loaded = engine.load_session("slot").unwrap().unwrap();
        assert_eq!(loaded.snapshot().unwrap(), session.snapshot().unwrap());
        assert_eq!(loaded.draws(), session.draws());

        engine.delete_session("slot").unwrap();
        assert!(engine.load_session("slot").unwrap().is_none());
        assert!(storage.saves.borrow().is_empty());
    }

    #[test]
    fn tampered_save_is_rejected() {
        let storage = MemoryStorage::default();
        let engine = GameEngine::new(storage.clone(), EngineConfig::default());
        let session = engine.create_session(5).unwrap();
        engine.save_session("slot", &session).unwrap();
        if let Some(snapshot) = storage.saves.borrow_mut().get_mut("slot") {
            snapshot.economy.balance = 1_000_000.0;
        }
        assert!(engine.load_session("slot").is_err());
    }

    #[test]
    fn sessions_start_from_omen_codes() {
        let engine = GameEngine::new(MemoryStorage::default(), EngineConfig::default());
        let session = engine.create_session_from_code("OMEN-COMET42").unwrap();
        assert_eq!(session.seed(), decode_omen("OMEN-COMET42").unwrap());
        assert!(engine.create_session_from_code("not a code").is_err());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut config = EngineConfig::default();
        config.economy.loyalty_rate = -1.0;
        let engine = GameEngine::new(MemoryStorage::default(), config);
        assert!(engine.create_session(1).is_err());
    }
}

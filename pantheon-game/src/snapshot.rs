//! Serializable session state handed to a persistence collaborator.
//!
//! A snapshot records the seed and the number of draws consumed, so a seeded
//! session can be rebuilt at exactly the same point of its fate stream. The
//! checksum is an xxhash64 of the JSON body and makes replay comparisons cheap.
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use thiserror::Error;
use twox_hash::XxHash64;

use crate::clash::ClashState;
use crate::config::ConfigError;
use crate::economy::PlayerEconomyState;
use crate::ledger::InfluenceLedger;
use crate::pantheon::Pantheon;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("snapshot checksum mismatch (stored {stored:016x}, computed {computed:016x})")]
    ChecksumMismatch { stored: u64, computed: u64 },
    #[error("unsupported snapshot version {0}")]
    Version(u32),
    #[error("snapshot restored under an invalid config: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub seed: u64,
    pub draws: u64,
    pub rounds_played: u64,
    pub pantheon: Pantheon,
    pub influence: InfluenceLedger,
    pub economy: PlayerEconomyState,
    #[serde(default)]
    pub clash: Option<ClashState>,
    #[serde(default)]
    pub checksum: u64,
}

impl Snapshot {
    /// Hash of every field except the checksum itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized.
    pub fn compute_checksum(&self) -> Result<u64, SnapshotError> {
        let mut body = self.clone();
        body.checksum = 0;
        let bytes = serde_json::to_vec(&body)?;
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(&bytes);
        Ok(hasher.finish())
    }

    /// Stamp the checksum.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be serialized.
    pub fn seal(mut self) -> Result<Self, SnapshotError> {
        self.checksum = self.compute_checksum()?;
        Ok(self)
    }

    /// Check the version and the stored checksum.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Version`] or [`SnapshotError::ChecksumMismatch`].
    pub fn verify(&self) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Version(self.version));
        }
        let computed = self.compute_checksum()?;
        if computed == self.checksum {
            Ok(())
        } else {
            Err(SnapshotError::ChecksumMismatch {
                stored: self.checksum,
                computed,
            })
        }
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse and verify a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or fails verification.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.verify()?;
        Ok(snapshot)
    }
}

//! Rejections surfaced to callers of the engine.
use thiserror::Error;

use crate::game::Choice;
use crate::pantheon::EntityId;

/// Errors raised by influence ledger operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("entity {0} has no influence entry")]
    UnknownEntity(EntityId),
    #[error("entity {0} already holds an influence entry")]
    DuplicateEntity(EntityId),
    #[error("transfer amount must be finite and non-negative (got {0})")]
    InvalidAmount(f64),
}

/// Invalid requests against a session. A rejected request mutates nothing.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PantheonError {
    #[error("unknown entity {0}")]
    UnknownEntity(EntityId),
    #[error("stake must be finite and positive (got {0})")]
    InvalidStake(f64),
    #[error("stake {stake:.2} exceeds balance {balance:.2}")]
    StakeExceedsBalance { stake: f64, balance: f64 },
    #[error("choice {choice:?} is not valid for game {game}")]
    InvalidChoice { game: String, choice: Option<Choice> },
    #[error("{entity} ultimate needs {cost:.2} charge (have {charge:.2})")]
    InsufficientCharge {
        entity: EntityId,
        charge: f64,
        cost: f64,
    },
    #[error("no patron pledged")]
    NoPatron,
    #[error("no intervention is waiting to be claimed")]
    NoIntervention,
    #[error("a champion clash is already underway")]
    ClashInProgress,
    #[error("no champion clash is underway")]
    NoActiveClash,
    #[error("no rival is available to answer the challenge")]
    NoRival,
    #[error("ascension has already been performed this session")]
    AlreadyAscended,
    #[error("ascension costs {cost:.2} (balance {balance:.2})")]
    InsufficientBalance { cost: f64, balance: f64 },
    #[error("entity id {0} is already taken")]
    EntityIdTaken(EntityId),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

//! Command errors

use ledger_numscript::{CompileErrors, MachineError, MachineErrorKind};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::locker::LockError;
use crate::referencer::ReferenceError;
use crate::state::StateError;
use crate::store::StoreError;

/// Result type for commands
pub type Result<T> = std::result::Result<T, CommandError>;

#[derive(Debug, Error)]
pub enum CommandError {
    // ========================================================================
    // Input Errors
    // ========================================================================

    #[error("No script to run")]
    NoScript,

    #[error("Compilation failed: {0}")]
    Compilation(#[from] CompileErrors),

    #[error("Metadata key {key} is set by both the script and the request")]
    MetadataOverride { key: String },

    // ========================================================================
    // Execution Errors
    // ========================================================================

    #[error("Execution failed: {0}")]
    Machine(#[from] MachineError),

    #[error("Script produced no postings")]
    NoPostings,

    // ========================================================================
    // Sequencing Errors
    // ========================================================================

    #[error(transparent)]
    State(#[from] StateError),

    #[error("Transaction {id} not found")]
    TransactionNotFound { id: u64 },

    #[error("Transaction {id} is already reverted")]
    AlreadyReverted { id: u64 },

    #[error("Transaction {id} is already being reverted")]
    RevertOccurring { id: u64 },

    #[error("Idempotency key {key} is used by a command in progress")]
    IdempotencyKeyInUse { key: String },

    #[error("Idempotency key {key} was used for a different command")]
    IdempotencyKeyReused { key: String },

    // ========================================================================
    // Infrastructure Errors
    // ========================================================================

    #[error("Timed out while {operation}")]
    Timeout { operation: &'static str },

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ReferenceError> for CommandError {
    fn from(err: ReferenceError) -> Self {
        match err.namespace {
            crate::referencer::Namespace::IdempotencyKey => {
                CommandError::IdempotencyKeyInUse { key: err.key }
            }
            crate::referencer::Namespace::Revert => CommandError::RevertOccurring {
                id: err.key.parse().unwrap_or_default(),
            },
        }
    }
}

/// Coarse classification of a failure, stable across wrapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NoScript,
    CompilationFailed,
    MetadataOverride,
    InsufficientFunds,
    NegativeAmount,
    MissingVariable,
    InvalidVariable,
    MissingMetadata,
    ScriptFailed,
    NoPostings,
    Machine,
    PastTransaction,
    Conflict,
    TransactionNotFound,
    AlreadyReverted,
    RevertOccurring,
    Timeout,
    Internal,
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::NoScript => ErrorKind::NoScript,
            CommandError::Compilation(_) => ErrorKind::CompilationFailed,
            CommandError::MetadataOverride { .. } => ErrorKind::MetadataOverride,
            CommandError::Machine(err) => machine_kind(err),
            CommandError::NoPostings => ErrorKind::NoPostings,
            CommandError::State(StateError::PastTransaction { .. }) => ErrorKind::PastTransaction,
            CommandError::State(StateError::Conflict { .. }) => ErrorKind::Conflict,
            CommandError::State(StateError::Store(_)) => ErrorKind::Internal,
            CommandError::TransactionNotFound { .. } => ErrorKind::TransactionNotFound,
            CommandError::AlreadyReverted { .. } => ErrorKind::AlreadyReverted,
            CommandError::RevertOccurring { .. } => ErrorKind::RevertOccurring,
            CommandError::IdempotencyKeyInUse { .. } | CommandError::IdempotencyKeyReused { .. } => {
                ErrorKind::Conflict
            }
            CommandError::Timeout { .. } => ErrorKind::Timeout,
            CommandError::Lock(_) => ErrorKind::Internal,
            CommandError::Store(StoreError::Constraint { .. }) => ErrorKind::Conflict,
            CommandError::Store(_) => ErrorKind::Internal,
        }
    }
}

fn machine_kind(err: &MachineError) -> ErrorKind {
    match err.kind() {
        MachineErrorKind::InsufficientFunds => ErrorKind::InsufficientFunds,
        MachineErrorKind::NegativeAmount => ErrorKind::NegativeAmount,
        MachineErrorKind::MissingVariable => ErrorKind::MissingVariable,
        MachineErrorKind::ExtraneousVariable | MachineErrorKind::TypeMismatch => {
            ErrorKind::InvalidVariable
        }
        MachineErrorKind::MissingMetadata => ErrorKind::MissingMetadata,
        MachineErrorKind::ScriptFailed => ErrorKind::ScriptFailed,
        MachineErrorKind::Store => ErrorKind::Internal,
        _ => ErrorKind::Machine,
    }
}

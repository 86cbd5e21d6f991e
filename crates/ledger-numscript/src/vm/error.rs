//! Execution errors

use thiserror::Error;

use crate::value::{Type, ValueError};

/// Error returned by the account reader backing a machine
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for machine operations
pub type Result<T> = std::result::Result<T, MachineError>;

#[derive(Debug, Error)]
pub enum MachineError {
    // ========================================================================
    // Funding Errors
    // ========================================================================

    /// Sources could not cover the requested amount
    #[error("Insufficient funds: requested {requested} {asset}, available {available}")]
    InsufficientFunds {
        asset: String,
        requested: String,
        available: String,
    },

    #[error("Negative amount for {what}: {amount}")]
    NegativeAmount { what: String, amount: String },

    #[error("Asset mismatch: expected {expected}, got {found}")]
    AssetMismatch { expected: String, found: String },

    #[error("Invalid allotment: {message}")]
    InvalidAllotment { message: String },

    #[error("Cannot send all from @{account}: its overdraft is unbounded")]
    UnboundedTakeAll { account: String },

    #[error("Unbounded source @{account} is not in last position")]
    FallbackNotLast { account: String },

    // ========================================================================
    // Resource Errors
    // ========================================================================

    #[error("Missing variable: ${name}")]
    MissingVariable { name: String },

    #[error("Extraneous variable: ${name}")]
    ExtraneousVariable { name: String },

    #[error("Type mismatch for {name}: expected {expected}, got {found}")]
    TypeMismatch {
        name: String,
        expected: Type,
        found: String,
    },

    #[error("Invalid value for ${name}: {source}")]
    InvalidVariable {
        name: String,
        #[source]
        source: ValueError,
    },

    #[error("Missing metadata {key} on account @{account}")]
    MissingMetadata { account: String, key: String },

    #[error("Balance of @{account} in {asset} was not resolved")]
    MissingBalance { account: String, asset: String },

    #[error("Store error: {0}")]
    Store(#[source] BoxError),

    // ========================================================================
    // Script Errors
    // ========================================================================

    /// The script reached a `fail` statement
    #[error("Script failed")]
    ScriptFailed,

    // ========================================================================
    // Contract Errors
    // ========================================================================

    /// Phases were called out of order or more than once
    #[error("Invalid state: cannot {operation} while {phase}")]
    InvalidState {
        operation: &'static str,
        phase: &'static str,
    },
}

/// Coarse classification of a [`MachineError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineErrorKind {
    InsufficientFunds,
    NegativeAmount,
    AssetMismatch,
    InvalidAllotment,
    Funding,
    MissingVariable,
    ExtraneousVariable,
    TypeMismatch,
    MissingMetadata,
    MissingBalance,
    Store,
    ScriptFailed,
    InvalidState,
}

impl MachineError {
    pub fn kind(&self) -> MachineErrorKind {
        match self {
            MachineError::InsufficientFunds { .. } => MachineErrorKind::InsufficientFunds,
            MachineError::NegativeAmount { .. } => MachineErrorKind::NegativeAmount,
            MachineError::AssetMismatch { .. } => MachineErrorKind::AssetMismatch,
            MachineError::InvalidAllotment { .. } => MachineErrorKind::InvalidAllotment,
            MachineError::UnboundedTakeAll { .. } | MachineError::FallbackNotLast { .. } => {
                MachineErrorKind::Funding
            }
            MachineError::MissingVariable { .. } => MachineErrorKind::MissingVariable,
            MachineError::ExtraneousVariable { .. } => MachineErrorKind::ExtraneousVariable,
            MachineError::TypeMismatch { .. } | MachineError::InvalidVariable { .. } => {
                MachineErrorKind::TypeMismatch
            }
            MachineError::MissingMetadata { .. } => MachineErrorKind::MissingMetadata,
            MachineError::MissingBalance { .. } => MachineErrorKind::MissingBalance,
            MachineError::Store(_) => MachineErrorKind::Store,
            MachineError::ScriptFailed => MachineErrorKind::ScriptFailed,
            MachineError::InvalidState { .. } => MachineErrorKind::InvalidState,
        }
    }

    pub fn is_insufficient_funds(&self) -> bool {
        self.kind() == MachineErrorKind::InsufficientFunds
    }
}

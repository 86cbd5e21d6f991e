//! Error types for the ledger data model

use thiserror::Error;

/// Result type for data model operations
pub type Result<T> = std::result::Result<T, TypesError>;

/// Data model error types
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypesError {
    // ========================================================================
    // Identifier Errors
    // ========================================================================

    /// Account address does not match `segment(:segment)*`
    #[error("Invalid account address: {address}")]
    InvalidAddress { address: String },

    /// Asset code does not match `CODE[/precision]`
    #[error("Invalid asset: {asset}")]
    InvalidAsset { asset: String },

    // ========================================================================
    // Amount Errors
    // ========================================================================

    /// A posting or volume amount was negative
    #[error("Negative amount: {amount}")]
    NegativeAmount { amount: String },

    /// Amount string could not be parsed as an integer
    #[error("Invalid amount: {value}")]
    InvalidAmount { value: String },
}

//! Ledger Types - Canonical data model of the ledger core
//!
//! This crate contains the foundational types shared by the script layer and
//! the execution layer, with zero dependencies on other ledger crates:
//!
//! - Account addresses and assets
//! - Volumes (cumulative input/output per asset) and account snapshots
//! - Postings and transactions
//! - Metadata maps
//!
//! # Invariants
//!
//! 1. Amounts carried by postings and volumes are never negative
//! 2. An account balance is always `input - output`
//! 3. `world` is the only account allowed to go unboundedly negative

pub mod account;
pub mod asset;
pub mod error;
pub mod transaction;

pub use account::*;
pub use asset::*;
pub use error::*;
pub use transaction::*;

pub use num_bigint::BigInt;

/// Metadata attached to accounts and transactions.
///
/// Values are stored in their string encoding; the script layer decodes them
/// against a declared type when they are read back.
pub type Metadata = std::collections::BTreeMap<String, String>;

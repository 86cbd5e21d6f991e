//! Accounts, volumes and account snapshots

use std::collections::BTreeMap;

use num_bigint::BigInt;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TypesError};
use crate::Metadata;

/// The implicit account every ledger can mint from.
///
/// `world` has an unbounded overdraft, is never locked and never tracked in
/// the volume cache.
pub const WORLD: &str = "world";

/// Check an account address (`[A-Za-z0-9_]+(:[A-Za-z0-9_]+)*`)
pub fn is_valid_address(address: &str) -> bool {
    !address.is_empty()
        && address.split(':').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Validate an account address, returning it on success
pub fn validate_address(address: &str) -> Result<&str> {
    if is_valid_address(address) {
        Ok(address)
    } else {
        Err(TypesError::InvalidAddress {
            address: address.to_string(),
        })
    }
}

/// Cumulative movements of one asset on one account
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volumes {
    pub input: BigInt,
    pub output: BigInt,
}

impl Volumes {
    pub fn new(input: impl Into<BigInt>, output: impl Into<BigInt>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    /// Balance is always derived, never stored
    pub fn balance(&self) -> BigInt {
        &self.input - &self.output
    }

    /// Add another set of volumes (used to apply commit deltas)
    pub fn add(&mut self, other: &Volumes) {
        self.input += &other.input;
        self.output += &other.output;
    }
}

/// Volumes keyed by asset
pub type VolumesByAssets = BTreeMap<String, Volumes>;

/// Volume deltas keyed by account then asset
pub type AccountsVolumes = BTreeMap<String, VolumesByAssets>;

/// Snapshot of an account as served by the volume cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountWithVolumes {
    pub address: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub volumes: VolumesByAssets,
}

impl AccountWithVolumes {
    /// An account with no history
    pub fn empty(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            metadata: Metadata::new(),
            volumes: VolumesByAssets::new(),
        }
    }

    /// Balance of `asset`; zero when the asset was never moved
    pub fn balance(&self, asset: &str) -> BigInt {
        self.volumes
            .get(asset)
            .map(Volumes::balance)
            .unwrap_or_else(BigInt::zero)
    }

    /// Balances of every asset with volumes
    pub fn balances(&self) -> BTreeMap<String, BigInt> {
        self.volumes
            .iter()
            .map(|(asset, v)| (asset.clone(), v.balance()))
            .collect()
    }

    /// Apply per-asset volume deltas
    pub fn add_volumes(&mut self, deltas: &VolumesByAssets) {
        for (asset, delta) in deltas {
            self.volumes.entry(asset.clone()).or_default().add(delta);
        }
    }

    /// Merge metadata, later keys overwriting earlier ones
    pub fn merge_metadata(&mut self, delta: &Metadata) {
        for (key, value) in delta {
            self.metadata.insert(key.clone(), value.clone());
        }
    }

    pub fn is_world(&self) -> bool {
        self.address == WORLD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address("world"));
        assert!(is_valid_address("users:001"));
        assert!(is_valid_address("orders:1234:payment_a"));
        assert!(!is_valid_address(""));
        assert!(!is_valid_address("users:"));
        assert!(!is_valid_address("users::001"));
        assert!(!is_valid_address("users-001"));
        assert!(validate_address("bank account").is_err());
    }

    #[test]
    fn test_balance_is_input_minus_output() {
        let mut account = AccountWithVolumes::empty("alice");
        assert_eq!(account.balance("COIN"), BigInt::zero());

        let mut deltas = VolumesByAssets::new();
        deltas.insert("COIN".to_string(), Volumes::new(100, 30));
        account.add_volumes(&deltas);
        account.add_volumes(&deltas);

        assert_eq!(account.volumes["COIN"], Volumes::new(200, 60));
        assert_eq!(account.balance("COIN"), BigInt::from(140));
    }

    #[test]
    fn test_merge_metadata_overwrites() {
        let mut account = AccountWithVolumes::empty("alice");
        account
            .metadata
            .insert("tier".to_string(), "silver".to_string());

        let mut delta = Metadata::new();
        delta.insert("tier".to_string(), "gold".to_string());
        delta.insert("region".to_string(), "eu".to_string());
        account.merge_metadata(&delta);

        assert_eq!(account.metadata["tier"], "gold");
        assert_eq!(account.metadata["region"], "eu");
    }
}

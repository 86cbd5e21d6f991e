//! Postings and transactions

use chrono::{DateTime, Utc};
use num_bigint::BigInt;
use num_traits::Signed;
use serde::{Deserialize, Serialize};

use crate::account::{AccountsVolumes, Volumes};
use crate::error::{Result, TypesError};
use crate::Metadata;

/// Metadata key set on a transaction that reverts another one.
/// The value is the reverted transaction id.
pub const REVERTS_METADATA_KEY: &str = "ledger/state/reverts";

/// A single movement of `amount` units of `asset`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Posting {
    pub source: String,
    pub destination: String,
    pub amount: BigInt,
    pub asset: String,
}

impl Posting {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        asset: impl Into<String>,
        amount: impl Into<BigInt>,
    ) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            amount: amount.into(),
            asset: asset.into(),
        }
    }

    /// Reject negative amounts
    pub fn validate(&self) -> Result<()> {
        if self.amount.is_negative() {
            return Err(TypesError::NegativeAmount {
                amount: self.amount.to_string(),
            });
        }
        Ok(())
    }

    /// The same movement in the opposite direction
    pub fn reversed(&self) -> Self {
        Self {
            source: self.destination.clone(),
            destination: self.source.clone(),
            amount: self.amount.clone(),
            asset: self.asset.clone(),
        }
    }
}

/// Inverse of a posting list: reversed order, swapped sides
pub fn reverse_postings(postings: &[Posting]) -> Vec<Posting> {
    postings.iter().rev().map(Posting::reversed).collect()
}

/// Per-account volume deltas produced by a posting list.
///
/// The source's `output` and the destination's `input` grow by the amount.
pub fn volume_deltas(postings: &[Posting]) -> AccountsVolumes {
    let mut deltas = AccountsVolumes::new();
    for posting in postings {
        deltas
            .entry(posting.source.clone())
            .or_default()
            .entry(posting.asset.clone())
            .or_insert_with(Volumes::default)
            .output += &posting.amount;
        deltas
            .entry(posting.destination.clone())
            .or_default()
            .entry(posting.asset.clone())
            .or_insert_with(Volumes::default)
            .input += &posting.amount;
    }
    deltas
}

/// A committed (or about to be committed) transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    pub postings: Vec<Posting>,
    #[serde(default)]
    pub metadata: Metadata,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl Transaction {
    pub fn new(postings: Vec<Posting>) -> Self {
        Self {
            id: 0,
            postings,
            metadata: Metadata::new(),
            timestamp: Utc::now(),
            reference: None,
        }
    }

    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    /// Every account touched, in first-seen order
    pub fn involved_accounts(&self) -> Vec<String> {
        let mut accounts: Vec<String> = Vec::new();
        for posting in &self.postings {
            for account in [&posting.source, &posting.destination] {
                if !accounts.contains(account) {
                    accounts.push(account.clone());
                }
            }
        }
        accounts
    }

    /// Id of the transaction this one reverts, if any
    pub fn reverts(&self) -> Option<u64> {
        self.metadata
            .get(REVERTS_METADATA_KEY)
            .and_then(|v| v.parse().ok())
    }
}

/// Metadata marking a transaction as the revert of `id`
pub fn mark_reverts(id: u64) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(REVERTS_METADATA_KEY.to_string(), id.to_string());
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_postings() {
        let postings = vec![
            Posting::new("world", "alice", "COIN", 100),
            Posting::new("alice", "bob", "COIN", 40),
        ];

        let reversed = reverse_postings(&postings);
        assert_eq!(
            reversed,
            vec![
                Posting::new("bob", "alice", "COIN", 40),
                Posting::new("alice", "world", "COIN", 100),
            ]
        );
    }

    #[test]
    fn test_volume_deltas() {
        let postings = vec![
            Posting::new("world", "alice", "COIN", 100),
            Posting::new("alice", "bob", "COIN", 40),
        ];

        let deltas = volume_deltas(&postings);
        assert_eq!(deltas["world"]["COIN"], Volumes::new(0, 100));
        assert_eq!(deltas["alice"]["COIN"], Volumes::new(100, 40));
        assert_eq!(deltas["bob"]["COIN"], Volumes::new(40, 0));
    }

    #[test]
    fn test_negative_posting_rejected() {
        let posting = Posting::new("a", "b", "COIN", -1);
        assert!(matches!(
            posting.validate(),
            Err(TypesError::NegativeAmount { .. })
        ));
    }

    #[test]
    fn test_reverts_marker() {
        let tx = Transaction::new(vec![]).with_metadata(mark_reverts(7));
        assert_eq!(tx.reverts(), Some(7));
        assert_eq!(Transaction::new(vec![]).reverts(), None);
    }

    #[test]
    fn test_involved_accounts_dedup() {
        let tx = Transaction::new(vec![
            Posting::new("world", "alice", "COIN", 1),
            Posting::new("alice", "bob", "COIN", 1),
        ]);
        assert_eq!(tx.involved_accounts(), vec!["world", "alice", "bob"]);
    }
}

//! Append-only log
//!
//! Every state change of a ledger is a [`Log`]. Logs are chained: each
//! one's hash covers the previous hash, so rewriting history breaks the
//! chain from that point on.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ledger_types::{Metadata, Transaction};
use serde::{Deserialize, Serialize};

use crate::hash::hash_all_hex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogType {
    NewTransaction,
    RevertedTransaction,
    SetMetadata,
    DeleteMetadata,
}

/// What a metadata log applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum MetadataTarget {
    Transaction(u64),
    Account(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogPayload {
    NewTransaction {
        transaction: Transaction,
        /// Account metadata written by the script
        #[serde(default)]
        account_metadata: BTreeMap<String, Metadata>,
    },
    RevertedTransaction {
        reverted_id: u64,
        revert_transaction: Transaction,
    },
    SetMetadata {
        target: MetadataTarget,
        metadata: Metadata,
    },
    DeleteMetadata {
        target: MetadataTarget,
        key: String,
    },
}

impl LogPayload {
    pub fn log_type(&self) -> LogType {
        match self {
            LogPayload::NewTransaction { .. } => LogType::NewTransaction,
            LogPayload::RevertedTransaction { .. } => LogType::RevertedTransaction,
            LogPayload::SetMetadata { .. } => LogType::SetMetadata,
            LogPayload::DeleteMetadata { .. } => LogType::DeleteMetadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    /// Position in the log, assigned on append
    pub id: u64,
    pub payload: LogPayload,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    /// Chained hash, assigned on append
    #[serde(default)]
    pub hash: String,
}

impl Log {
    pub fn new(payload: LogPayload) -> Self {
        Self {
            id: 0,
            payload,
            date: Utc::now(),
            idempotency_key: None,
            hash: String::new(),
        }
    }

    pub fn with_idempotency_key(mut self, key: Option<String>) -> Self {
        self.idempotency_key = key;
        self
    }

    pub fn log_type(&self) -> LogType {
        self.payload.log_type()
    }

    /// Transaction carried by the log, for both creations and reverts
    pub fn transaction(&self) -> Option<&Transaction> {
        match &self.payload {
            LogPayload::NewTransaction { transaction, .. } => Some(transaction),
            LogPayload::RevertedTransaction {
                revert_transaction, ..
            } => Some(revert_transaction),
            _ => None,
        }
    }

    /// Link this log after `previous`: assigns id and hash
    pub fn chain(mut self, previous: Option<&Log>) -> Self {
        self.id = previous.map(|log| log.id + 1).unwrap_or(0);
        let previous_hash = previous.map(|log| log.hash.as_str()).unwrap_or("");
        self.hash = self.compute_hash(previous_hash);
        self
    }

    pub fn compute_hash(&self, previous_hash: &str) -> String {
        let body = serde_json::to_vec(&(
            self.id,
            &self.payload,
            self.date,
            &self.idempotency_key,
        ))
        .unwrap_or_default();
        hash_all_hex(&[previous_hash.as_bytes(), &body])
    }

    /// Check that this log follows `previous`
    pub fn verify(&self, previous: Option<&Log>) -> bool {
        let expected_id = previous.map(|log| log.id + 1).unwrap_or(0);
        let previous_hash = previous.map(|log| log.hash.as_str()).unwrap_or("");
        self.id == expected_id && self.hash == self.compute_hash(previous_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_types::Posting;

    fn new_transaction(id: u64) -> Log {
        let tx = Transaction::new(vec![Posting::new("world", "bank", "USD/2", 100)]).with_id(id);
        Log::new(LogPayload::NewTransaction {
            transaction: tx,
            account_metadata: BTreeMap::new(),
        })
    }

    #[test]
    fn test_chain_assigns_ids_and_links_hashes() {
        let first = new_transaction(0).chain(None);
        let second = new_transaction(1).chain(Some(&first));

        assert_eq!(first.id, 0);
        assert_eq!(second.id, 1);
        assert_eq!(first.hash.len(), 64);
        assert_ne!(first.hash, second.hash);
        assert!(first.verify(None));
        assert!(second.verify(Some(&first)));
    }

    #[test]
    fn test_tampering_breaks_the_chain() {
        let first = new_transaction(0).chain(None);
        let mut second = new_transaction(1).chain(Some(&first));
        second.idempotency_key = Some("forged".into());
        assert!(!second.verify(Some(&first)));
    }

    #[test]
    fn test_transaction_accessor() {
        let log = new_transaction(7);
        assert_eq!(log.transaction().map(|tx| tx.id), Some(7));
        assert_eq!(log.log_type(), LogType::NewTransaction);

        let meta = Log::new(LogPayload::DeleteMetadata {
            target: MetadataTarget::Account("bank".into()),
            key: "k".into(),
        });
        assert!(meta.transaction().is_none());
        assert_eq!(meta.log_type(), LogType::DeleteMetadata);
    }

    #[test]
    fn test_payload_serialization_is_tagged() {
        let log = Log::new(LogPayload::SetMetadata {
            target: MetadataTarget::Transaction(3),
            metadata: Metadata::new(),
        });
        let json = serde_json::to_value(&log.payload).unwrap();
        assert_eq!(json["type"], "SET_METADATA");
        assert_eq!(json["data"]["target"]["type"], "transaction");
    }
}

//! In-memory store

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use ledger_types::{volume_deltas, AccountWithVolumes, Metadata, Transaction};
use tokio::sync::RwLock;

use super::{PersistenceHandle, Result, Store, StoreError};
use crate::log::{Log, LogPayload, LogType, MetadataTarget};

/// How quickly appended logs are reported as ingested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestionMode {
    #[default]
    Immediate,
    /// Ingestion completes after the given delay
    Delayed(Duration),
}

#[derive(Default)]
struct Inner {
    logs: Vec<Log>,
    accounts: HashMap<String, AccountWithVolumes>,
    /// Transaction id to creating log position
    created: HashMap<u64, usize>,
    /// Reverted transaction id to revert log position
    reverted: HashMap<u64, usize>,
    references: HashMap<String, usize>,
    idempotency_keys: HashMap<String, usize>,
    transaction_metadata: HashMap<u64, Metadata>,
}

impl Inner {
    fn check_constraints(&self, log: &Log) -> Result<()> {
        if let Some(key) = &log.idempotency_key {
            if self.idempotency_keys.contains_key(key) {
                return Err(StoreError::Constraint {
                    message: format!("idempotency key {key} already used"),
                });
            }
        }
        if let LogPayload::NewTransaction { transaction, .. } = &log.payload {
            if let Some(reference) = &transaction.reference {
                if self.references.contains_key(reference) {
                    return Err(StoreError::Constraint {
                        message: format!("reference {reference} already used"),
                    });
                }
            }
        }
        Ok(())
    }

    fn account_mut(&mut self, address: &str) -> &mut AccountWithVolumes {
        self.accounts
            .entry(address.to_string())
            .or_insert_with(|| AccountWithVolumes::empty(address))
    }

    fn apply_transaction(&mut self, tx: &Transaction, position: usize) {
        for (address, deltas) in volume_deltas(&tx.postings) {
            self.account_mut(&address).add_volumes(&deltas);
        }
        self.created.insert(tx.id, position);
        self.transaction_metadata.insert(tx.id, tx.metadata.clone());
        if let Some(reference) = &tx.reference {
            self.references.insert(reference.clone(), position);
        }
    }

    fn project(&mut self, position: usize) {
        let log = self.logs[position].clone();
        if let Some(key) = &log.idempotency_key {
            self.idempotency_keys.insert(key.clone(), position);
        }
        match &log.payload {
            LogPayload::NewTransaction {
                transaction,
                account_metadata,
            } => {
                self.apply_transaction(transaction, position);
                for (address, metadata) in account_metadata {
                    self.account_mut(address).merge_metadata(metadata);
                }
            }
            LogPayload::RevertedTransaction {
                reverted_id,
                revert_transaction,
            } => {
                self.apply_transaction(revert_transaction, position);
                self.reverted.insert(*reverted_id, position);
            }
            LogPayload::SetMetadata { target, metadata } => match target {
                MetadataTarget::Account(address) => {
                    self.account_mut(address).merge_metadata(metadata);
                }
                MetadataTarget::Transaction(id) => {
                    let current = self.transaction_metadata.entry(*id).or_default();
                    current.extend(metadata.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
            },
            LogPayload::DeleteMetadata { target, key } => match target {
                MetadataTarget::Account(address) => {
                    self.account_mut(address).metadata.remove(key);
                }
                MetadataTarget::Transaction(id) => {
                    if let Some(current) = self.transaction_metadata.get_mut(id) {
                        current.remove(key);
                    }
                }
            },
        }
    }
}

/// Store keeping the log and its projections in process memory
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    ingestion: IngestionMode,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ingestion(mut self, mode: IngestionMode) -> Self {
        self.ingestion = mode;
        self
    }

    /// Full log, oldest first
    pub async fn logs(&self) -> Vec<Log> {
        self.inner.read().await.logs.clone()
    }

    /// A transaction with its current metadata
    pub async fn transaction(&self, id: u64) -> Option<Transaction> {
        let inner = self.inner.read().await;
        let position = *inner.created.get(&id)?;
        let tx = inner.logs[position].transaction()?.clone();
        let metadata = inner
            .transaction_metadata
            .get(&id)
            .cloned()
            .unwrap_or_default();
        Some(tx.with_metadata(metadata))
    }

    /// Check the hash chain end to end
    pub async fn verify_chain(&self) -> bool {
        let inner = self.inner.read().await;
        let mut previous: Option<&Log> = None;
        for log in &inner.logs {
            if !log.verify(previous) {
                return false;
            }
            previous = Some(log);
        }
        true
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn compute_account(&self, address: &str) -> Result<AccountWithVolumes> {
        self.inner
            .read()
            .await
            .accounts
            .get(address)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn append_log(&self, log: Log) -> Result<PersistenceHandle> {
        let log = {
            let mut inner = self.inner.write().await;
            inner.check_constraints(&log)?;
            let log = log.chain(inner.logs.last());
            inner.logs.push(log.clone());
            let position = inner.logs.len() - 1;
            inner.project(position);
            log
        };

        match self.ingestion {
            IngestionMode::Immediate => Ok(PersistenceHandle::ingested(log)),
            IngestionMode::Delayed(delay) => {
                let (handle, done) = PersistenceHandle::pending(log);
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = done.send(());
                });
                Ok(handle)
            }
        }
    }

    async fn read_last_log_with_type(&self, types: &[LogType]) -> Result<Log> {
        self.inner
            .read()
            .await
            .logs
            .iter()
            .rev()
            .find(|log| types.contains(&log.log_type()))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn read_log_with_idempotency_key(&self, key: &str) -> Result<Log> {
        let inner = self.inner.read().await;
        inner
            .idempotency_keys
            .get(key)
            .map(|&position| inner.logs[position].clone())
            .ok_or(StoreError::NotFound)
    }

    async fn read_log_for_created_transaction(&self, id: u64) -> Result<Log> {
        let inner = self.inner.read().await;
        inner
            .created
            .get(&id)
            .map(|&position| inner.logs[position].clone())
            .ok_or(StoreError::NotFound)
    }

    async fn read_log_for_created_transaction_with_reference(
        &self,
        reference: &str,
    ) -> Result<Log> {
        let inner = self.inner.read().await;
        inner
            .references
            .get(reference)
            .map(|&position| inner.logs[position].clone())
            .ok_or(StoreError::NotFound)
    }

    async fn read_log_for_reverted_transaction(&self, id: u64) -> Result<Log> {
        let inner = self.inner.read().await;
        inner
            .reverted
            .get(&id)
            .map(|&position| inner.logs[position].clone())
            .ok_or(StoreError::NotFound)
    }
}

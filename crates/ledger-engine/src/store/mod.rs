//! Durable storage seam
//!
//! The engine only needs two things from storage: computing an account's
//! volumes from history, and appending to / reading from the log.
//! Missing data is reported with [`StoreError::NotFound`], which callers
//! match on explicitly.

mod memory;

pub use memory::{IngestionMode, MemoryStore};

use async_trait::async_trait;
use ledger_types::AccountWithVolumes;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::log::{Log, LogType};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found")]
    NotFound,

    /// A uniqueness constraint (reference, idempotency key) was violated
    #[error("Constraint violation: {message}")]
    Constraint { message: String },

    /// The store dropped a pending ingestion
    #[error("Ingestion aborted")]
    IngestionAborted,

    #[error("Backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Returned by [`Store::append_log`]. Resolves once the log is projected.
#[derive(Debug)]
pub struct PersistenceHandle {
    log: Log,
    ingested: Option<oneshot::Receiver<()>>,
}

impl PersistenceHandle {
    /// Handle for a log that is already ingested
    pub fn ingested(log: Log) -> Self {
        Self {
            log,
            ingested: None,
        }
    }

    /// Handle completed by sending on the returned channel
    pub fn pending(log: Log) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                log,
                ingested: Some(rx),
            },
            tx,
        )
    }

    /// The appended log, with id and hash assigned
    pub fn log(&self) -> &Log {
        &self.log
    }

    pub async fn wait(self) -> Result<Log> {
        if let Some(ingested) = self.ingested {
            ingested.await.map_err(|_| StoreError::IngestionAborted)?;
        }
        Ok(self.log)
    }
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Current volumes and metadata of an account; `NotFound` if it never
    /// appeared in the log
    async fn compute_account(&self, address: &str) -> Result<AccountWithVolumes>;

    /// Durably append a log, assigning its id and hash
    async fn append_log(&self, log: Log) -> Result<PersistenceHandle>;

    async fn read_last_log_with_type(&self, types: &[LogType]) -> Result<Log>;

    async fn read_log_with_idempotency_key(&self, key: &str) -> Result<Log>;

    async fn read_log_for_created_transaction(&self, id: u64) -> Result<Log>;

    async fn read_log_for_created_transaction_with_reference(&self, reference: &str)
        -> Result<Log>;

    async fn read_log_for_reverted_transaction(&self, id: u64) -> Result<Log>;
}

//! Command pipeline
//!
//! ```text
//! create_transaction
//!   reserve ─▶ compile ─▶ resolve resources ─▶ lock ─▶ resolve balances
//!     ─▶ execute ─▶ append log ─▶ update cache ─▶ wait ingestion ─▶ unlock
//! ```
//!
//! Each stage may fail; anything acquired up to that point (reservation,
//! locks) is released on the way out. Nothing is written before the log
//! append, so a failed command leaves no trace.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ledger_numscript::syntax::{self, Destination, Expr, SendAmount, Source};
use ledger_numscript::{compile, Machine, Program};
use ledger_types::{mark_reverts, reverse_postings, Metadata, Transaction, WORLD};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::VolumeCache;
use crate::compiler::{ProgramCache, ScriptParser};
use crate::config::{EngineConfig, Parameters};
use crate::error::{CommandError, Result};
use crate::locker::{LockGuard, LockRequest, Locker};
use crate::log::{Log, LogPayload, LogType, MetadataTarget};
use crate::referencer::{Namespace, Referencer};
use crate::state::{Reservation, TransactionState};
use crate::store::{PersistenceHandle, Store, StoreError};

/// A script submission
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunScript {
    pub plain: String,
    #[serde(default)]
    pub vars: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reference: Option<String>,
    /// Transaction metadata; may not collide with keys the script sets
    #[serde(default)]
    pub metadata: Metadata,
}

impl RunScript {
    pub fn new(plain: impl Into<String>) -> Self {
        Self {
            plain: plain.into(),
            ..Self::default()
        }
    }

    pub fn with_var(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.vars.insert(name.into(), value);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

struct Execution {
    program: Arc<Program>,
    vars: BTreeMap<String, serde_json::Value>,
    metadata: Metadata,
    reference: Option<String>,
}

pub struct Commander {
    store: Arc<dyn Store>,
    cache: Arc<VolumeCache>,
    programs: ProgramCache,
    locker: Locker,
    state: Arc<TransactionState>,
    referencer: Referencer,
    /// Serializes id allocation with log append so ids follow log order
    commit: Mutex<()>,
    config: EngineConfig,
}

impl Commander {
    pub async fn new(
        store: Arc<dyn Store>,
        parser: Arc<dyn ScriptParser>,
        config: EngineConfig,
    ) -> Result<Self> {
        let state = TransactionState::load(Arc::clone(&store), config.allow_past_timestamps).await?;
        let cache = Arc::new(VolumeCache::new(
            Arc::clone(&store),
            config.volume_cache_capacity,
        ));
        info!(next_tx_id = state.predict_tx_id(), "commander ready");

        Ok(Self {
            programs: ProgramCache::new(parser, config.compiler_cache_capacity),
            locker: Locker::spawn(config.lock_queue_capacity),
            store,
            cache,
            state,
            referencer: Referencer::new(),
            commit: Mutex::new(()),
            config,
        })
    }

    pub fn cache(&self) -> &VolumeCache {
        &self.cache
    }

    pub fn state(&self) -> &TransactionState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    pub async fn create_transaction(
        &self,
        params: Parameters,
        script: RunScript,
    ) -> Result<Transaction> {
        let log = self
            .idempotent(&params, LogType::NewTransaction, || {
                self.run_script(&params, script)
            })
            .await
            .inspect_err(|err| warn!(error = %err, kind = ?err.kind(), "transaction rejected"))?;
        into_transaction(log)
    }

    /// Post the inverse of transaction `id`.
    ///
    /// With `force`, the accounts that received funds may go negative.
    /// With `at_effective_date`, the revert is dated like the original.
    pub async fn revert_transaction(
        &self,
        params: Parameters,
        id: u64,
        force: bool,
        at_effective_date: bool,
    ) -> Result<Transaction> {
        let log = self
            .idempotent(&params, LogType::RevertedTransaction, || {
                self.run_revert(&params, id, force, at_effective_date)
            })
            .await
            .inspect_err(|err| warn!(tx_id = id, error = %err, "revert rejected"))?;
        into_transaction(log)
    }

    async fn run_script(&self, params: &Parameters, script: RunScript) -> Result<Log> {
        if script.plain.trim().is_empty() {
            return Err(CommandError::NoScript);
        }
        let (reservation, timestamp) = self
            .state
            .reserve(script.timestamp, script.reference.clone())
            .await?;
        let program = self.programs.compile(&script.plain)?;

        let execution = Execution {
            program,
            vars: script.vars,
            metadata: script.metadata,
            reference: script.reference,
        };
        self.execute(params, reservation, timestamp, execution, |transaction, account_metadata| {
            LogPayload::NewTransaction {
                transaction,
                account_metadata,
            }
        })
        .await
    }

    async fn run_revert(
        &self,
        params: &Parameters,
        id: u64,
        force: bool,
        at_effective_date: bool,
    ) -> Result<Log> {
        let _claim = self
            .referencer
            .take(Namespace::Revert, id.to_string())
            .map_err(|_| CommandError::RevertOccurring { id })?;

        match self.store.read_log_for_reverted_transaction(id).await {
            Ok(_) => return Err(CommandError::AlreadyReverted { id }),
            Err(StoreError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }
        let original = match self.store.read_log_for_created_transaction(id).await {
            Ok(log) => log
                .transaction()
                .cloned()
                .ok_or(CommandError::TransactionNotFound { id })?,
            Err(StoreError::NotFound) => return Err(CommandError::TransactionNotFound { id }),
            Err(err) => return Err(err.into()),
        };

        let program = Arc::new(compile(&revert_script(&original, force))?);
        let timestamp = at_effective_date.then_some(original.timestamp);
        let (reservation, timestamp) = self.state.reserve(timestamp, None).await?;

        let execution = Execution {
            program,
            vars: BTreeMap::new(),
            metadata: mark_reverts(id),
            reference: None,
        };
        self.execute(params, reservation, timestamp, execution, move |revert_transaction, _| {
            LogPayload::RevertedTransaction {
                reverted_id: id,
                revert_transaction,
            }
        })
        .await
    }

    async fn execute(
        &self,
        params: &Parameters,
        reservation: Reservation,
        timestamp: DateTime<Utc>,
        execution: Execution,
        payload: impl FnOnce(Transaction, BTreeMap<String, Metadata>) -> LogPayload,
    ) -> Result<Log> {
        let mut machine = Machine::new(execution.program);
        machine.set_vars_from_json(&execution.vars)?;
        let involved = machine.resolve_resources(self.cache.as_ref()).await?;

        let lock = self.lock(LockRequest::from(&involved)).await?;
        machine.resolve_balances(self.cache.as_ref()).await?;
        machine.execute()?;
        if machine.postings().is_empty() {
            return Err(CommandError::NoPostings);
        }

        let mut metadata = machine.tx_metadata();
        for (key, value) in execution.metadata {
            if metadata.contains_key(&key) {
                return Err(CommandError::MetadataOverride { key });
            }
            metadata.insert(key, value);
        }
        let account_metadata = machine.account_metadata();
        let transaction = Transaction::new(machine.postings().to_vec())
            .with_timestamp(timestamp)
            .with_reference(execution.reference)
            .with_metadata(metadata);

        if params.dry_run {
            let transaction = transaction.with_id(self.state.predict_tx_id());
            debug!(tx_id = transaction.id, "dry run complete");
            return Ok(Log::new(payload(transaction, account_metadata)));
        }

        let (handle, transaction, ticket) = {
            let _commit = self.commit.lock().await;
            let transaction = transaction.with_id(self.state.allocate_tx_id());
            let log = Log::new(payload(transaction.clone(), account_metadata.clone()))
                .with_idempotency_key(params.idempotency_key.clone());
            let ticket = self.cache.begin_commit();
            (self.store.append_log(log).await?, transaction, ticket)
        };

        self.cache.update_with_postings(ticket, &transaction.postings);
        for (address, metadata) in &account_metadata {
            self.cache.update_metadata(ticket, address, metadata);
        }
        info!(
            tx_id = transaction.id,
            log_id = handle.log().id,
            postings = transaction.postings.len(),
            "transaction committed"
        );

        self.finish(params, handle, move || {
            reservation.clear(Some(&transaction));
            drop(lock);
        })
        .await
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    pub async fn save_transaction_metadata(
        &self,
        params: Parameters,
        id: u64,
        metadata: Metadata,
    ) -> Result<()> {
        self.save_metadata(params, MetadataTarget::Transaction(id), metadata)
            .await
    }

    pub async fn save_account_metadata(
        &self,
        params: Parameters,
        address: &str,
        metadata: Metadata,
    ) -> Result<()> {
        self.save_metadata(params, MetadataTarget::Account(address.to_string()), metadata)
            .await
    }

    pub async fn delete_transaction_metadata(
        &self,
        params: Parameters,
        id: u64,
        key: &str,
    ) -> Result<()> {
        self.delete_metadata(params, MetadataTarget::Transaction(id), key)
            .await
    }

    pub async fn delete_account_metadata(
        &self,
        params: Parameters,
        address: &str,
        key: &str,
    ) -> Result<()> {
        self.delete_metadata(params, MetadataTarget::Account(address.to_string()), key)
            .await
    }

    async fn save_metadata(
        &self,
        params: Parameters,
        target: MetadataTarget,
        metadata: Metadata,
    ) -> Result<()> {
        let params = &params;
        self.idempotent(params, LogType::SetMetadata, || async move {
            self.check_target(&target).await?;
            self.append_metadata(params, LogPayload::SetMetadata { target, metadata })
                .await
        })
        .await
        .inspect_err(|err| warn!(error = %err, "metadata update rejected"))?;
        Ok(())
    }

    async fn delete_metadata(
        &self,
        params: Parameters,
        target: MetadataTarget,
        key: &str,
    ) -> Result<()> {
        let params = &params;
        self.idempotent(params, LogType::DeleteMetadata, || async move {
            self.check_target(&target).await?;
            let key = key.to_string();
            self.append_metadata(params, LogPayload::DeleteMetadata { target, key })
                .await
        })
        .await
        .inspect_err(|err| warn!(error = %err, "metadata deletion rejected"))?;
        Ok(())
    }

    async fn check_target(&self, target: &MetadataTarget) -> Result<()> {
        if let MetadataTarget::Transaction(id) = target {
            match self.store.read_log_for_created_transaction(*id).await {
                Ok(_) => {}
                Err(StoreError::NotFound) => {
                    return Err(CommandError::TransactionNotFound { id: *id })
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    async fn append_metadata(&self, params: &Parameters, payload: LogPayload) -> Result<Log> {
        let log = Log::new(payload).with_idempotency_key(params.idempotency_key.clone());
        if params.dry_run {
            return Ok(log);
        }
        let (handle, ticket) = {
            let _commit = self.commit.lock().await;
            let ticket = self.cache.begin_commit();
            (self.store.append_log(log).await?, ticket)
        };

        match &handle.log().payload {
            LogPayload::SetMetadata {
                target: MetadataTarget::Account(address),
                metadata,
            } => self.cache.update_metadata(ticket, address, metadata),
            LogPayload::DeleteMetadata {
                target: MetadataTarget::Account(address),
                key,
            } => self.cache.delete_metadata(ticket, address, key),
            _ => {}
        }
        info!(log_id = handle.log().id, "metadata log appended");

        self.finish(params, handle, || {}).await
    }

    // ========================================================================
    // Shared Stages
    // ========================================================================

    /// Replay the logged outcome of a command already run with the same
    /// idempotency key, or run it while holding the key
    async fn idempotent<F, Fut>(&self, params: &Parameters, expected: LogType, command: F) -> Result<Log>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Log>>,
    {
        let Some(key) = &params.idempotency_key else {
            return command().await;
        };
        let _claim = self.referencer.take(Namespace::IdempotencyKey, key.as_str())?;

        match self.store.read_log_with_idempotency_key(key).await {
            Ok(log) if log.log_type() == expected => {
                debug!(idempotency_key = %key, log_id = log.id, "replaying logged result");
                return Ok(log);
            }
            Ok(_) => return Err(CommandError::IdempotencyKeyReused { key: key.clone() }),
            Err(StoreError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }
        command().await
    }

    async fn lock(&self, request: LockRequest) -> Result<LockGuard> {
        match self.config.lock_timeout {
            Some(limit) => tokio::time::timeout(limit, self.locker.lock(request))
                .await
                .map_err(|_| CommandError::Timeout {
                    operation: "acquiring account locks",
                })?
                .map_err(Into::into),
            None => Ok(self.locker.lock(request).await?),
        }
    }

    /// Wait for ingestion, then run `release`. In async mode, or when the
    /// wait times out, the waiting continues in the background.
    async fn finish(
        &self,
        params: &Parameters,
        handle: PersistenceHandle,
        release: impl FnOnce() + Send + 'static,
    ) -> Result<Log> {
        let log = handle.log().clone();
        let mut ingestion = Box::pin(handle.wait());

        if params.async_mode {
            tokio::spawn(release_after(ingestion, release));
            return Ok(log);
        }

        let ingested = match self.config.ingestion_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut ingestion).await {
                Ok(ingested) => ingested,
                Err(_) => {
                    tokio::spawn(release_after(ingestion, release));
                    return Err(CommandError::Timeout {
                        operation: "waiting for log ingestion",
                    });
                }
            },
            None => ingestion.await,
        };
        release();
        Ok(ingested?)
    }
}

async fn release_after(
    ingestion: impl Future<Output = std::result::Result<Log, StoreError>>,
    release: impl FnOnce(),
) {
    if let Err(err) = ingestion.await {
        warn!(error = %err, "log ingestion failed");
    }
    release();
}

fn into_transaction(log: Log) -> Result<Transaction> {
    match log.payload {
        LogPayload::NewTransaction { transaction, .. } => Ok(transaction),
        LogPayload::RevertedTransaction {
            revert_transaction, ..
        } => Ok(revert_transaction),
        _ => Err(CommandError::IdempotencyKeyReused {
            key: log.idempotency_key.unwrap_or_default(),
        }),
    }
}

/// One send per reversed posting. Forced reverts let the accounts that
/// were credited go negative.
fn revert_script(original: &Transaction, force: bool) -> syntax::Script {
    reverse_postings(&original.postings)
        .into_iter()
        .fold(syntax::Script::new(), |script, posting| {
            let source = if force && posting.source != WORLD {
                Source::unbounded(&posting.source)
            } else {
                Source::account(&posting.source)
            };
            script.send(
                SendAmount::Monetary(Expr::monetary(&posting.asset, posting.amount)),
                source,
                Destination::account(&posting.destination),
            )
        })
}

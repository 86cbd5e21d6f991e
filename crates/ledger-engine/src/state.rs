//! In-flight transaction bookkeeping
//!
//! Hands out transaction ids and tracks every transaction between
//! admission and commit, so that references stay unique and timestamps
//! never go backwards.
//!
//! # Invariants
//!
//! 1. Ids are assigned from an atomic counter seeded from the log
//! 2. Two in-flight transactions never share a reference
//! 3. Unless past timestamps are allowed, a new transaction is never older
//!    than any in-flight or committed one
//! 4. Clearing a reservation is idempotent

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use ledger_types::Transaction;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::log::LogType;
use crate::store::{Store, StoreError};

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Transaction timestamp {timestamp} is older than {newest}")]
    PastTransaction {
        timestamp: DateTime<Utc>,
        newest: DateTime<Utc>,
    },

    #[error("Conflict: reference {reference} is already used")]
    Conflict { reference: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

struct InFlight {
    timestamp: DateTime<Utc>,
    reference: Option<String>,
}

#[derive(Default)]
struct Reservations {
    next_seq: u64,
    /// Admission order
    in_flight: BTreeMap<u64, InFlight>,
    references: HashMap<String, u64>,
    last_committed: Option<DateTime<Utc>>,
}

impl Reservations {
    fn newest(&self) -> Option<DateTime<Utc>> {
        self.in_flight
            .values()
            .map(|node| node.timestamp)
            .chain(self.last_committed)
            .max()
    }
}

pub struct TransactionState {
    store: Arc<dyn Store>,
    next_tx_id: AtomicU64,
    allow_past_timestamps: bool,
    reservations: Mutex<Reservations>,
}

impl TransactionState {
    /// Seed from the last transaction in the log
    pub async fn load(
        store: Arc<dyn Store>,
        allow_past_timestamps: bool,
    ) -> Result<Arc<Self>, StoreError> {
        let last = match store
            .read_last_log_with_type(&[LogType::NewTransaction, LogType::RevertedTransaction])
            .await
        {
            Ok(log) => log.transaction().cloned(),
            Err(StoreError::NotFound) => None,
            Err(err) => return Err(err),
        };
        let next_tx_id = last.as_ref().map(|tx| tx.id + 1).unwrap_or(0);
        debug!(next_tx_id, "transaction state loaded");

        Ok(Arc::new(Self {
            store,
            next_tx_id: AtomicU64::new(next_tx_id),
            allow_past_timestamps,
            reservations: Mutex::new(Reservations {
                last_committed: last.map(|tx| tx.timestamp),
                ..Reservations::default()
            }),
        }))
    }

    /// Admit a transaction. The timestamp defaults to now.
    pub async fn reserve(
        self: &Arc<Self>,
        timestamp: Option<DateTime<Utc>>,
        reference: Option<String>,
    ) -> Result<(Reservation, DateTime<Utc>), StateError> {
        let (seq, timestamp) = {
            let mut reservations = self.reservations.lock();
            // taken under the lock so concurrent defaults stay ordered
            let timestamp = timestamp.unwrap_or_else(Utc::now);
            if !self.allow_past_timestamps {
                if let Some(newest) = reservations.newest() {
                    if timestamp < newest {
                        return Err(StateError::PastTransaction { timestamp, newest });
                    }
                }
            }
            if let Some(reference) = &reference {
                if reservations.references.contains_key(reference) {
                    return Err(StateError::Conflict {
                        reference: reference.clone(),
                    });
                }
            }

            let seq = reservations.next_seq;
            reservations.next_seq += 1;
            if let Some(reference) = &reference {
                reservations.references.insert(reference.clone(), seq);
            }
            reservations.in_flight.insert(
                seq,
                InFlight {
                    timestamp,
                    reference: reference.clone(),
                },
            );
            (seq, timestamp)
        };
        let reservation = Reservation {
            seq,
            state: Arc::clone(self),
        };

        // the durable check runs outside the mutex; the in-flight entry
        // already keeps concurrent duplicates out
        if let Some(reference) = reference {
            match self
                .store
                .read_log_for_created_transaction_with_reference(&reference)
                .await
            {
                Ok(_) => return Err(StateError::Conflict { reference }),
                Err(StoreError::NotFound) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok((reservation, timestamp))
    }

    /// Take the next transaction id
    pub fn allocate_tx_id(&self) -> u64 {
        self.next_tx_id.fetch_add(1, Ordering::SeqCst)
    }

    /// The id the next commit would get, without taking it
    pub fn predict_tx_id(&self) -> u64 {
        self.next_tx_id.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.reservations.lock().in_flight.len()
    }

    pub fn last_committed(&self) -> Option<DateTime<Utc>> {
        self.reservations.lock().last_committed
    }

    fn clear(&self, seq: u64, committed: Option<&Transaction>) {
        let mut reservations = self.reservations.lock();
        if let Some(node) = reservations.in_flight.remove(&seq) {
            if let Some(reference) = node.reference {
                if reservations.references.get(&reference) == Some(&seq) {
                    reservations.references.remove(&reference);
                }
            }
        }
        if let Some(tx) = committed {
            if reservations
                .last_committed
                .map_or(true, |last| last < tx.timestamp)
            {
                reservations.last_committed = Some(tx.timestamp);
            }
        }
    }
}

/// An admitted transaction; cleared on drop
pub struct Reservation {
    seq: u64,
    state: Arc<TransactionState>,
}

impl Reservation {
    /// Leave the in-flight set, recording the commit if there was one
    pub fn clear(&self, committed: Option<&Transaction>) {
        self.state.clear(self.seq, committed);
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.state.clear(self.seq, None);
    }
}

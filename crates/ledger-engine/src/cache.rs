//! Account volume cache
//!
//! Sits between the machine and the store. Accounts are loaded once and
//! then kept coherent by applying committed postings in memory.
//!
//! # Invariants
//!
//! 1. At most one store computation is in flight per address
//! 2. Readers always receive a deep copy
//! 3. Updates never load an account: an evicted account is simply
//!    recomputed from the store on its next read
//! 4. A commit's deltas only reach accounts loaded before its
//!    [`CommitTicket`] was issued. Any other slot for the address may
//!    already include the commit and is dropped instead

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ledger_numscript::vm::BoxError;
use ledger_numscript::AccountReader;
use ledger_types::{volume_deltas, AccountWithVolumes, Metadata, Posting, VolumesByAssets};
use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::lfu::LfuCache;
use crate::store::{Store, StoreError};

#[derive(Default)]
struct Slot {
    account: OnceCell<Mutex<AccountWithVolumes>>,
    /// Commit epoch observed once the store returned
    loaded_at: AtomicU64,
}

/// Issued before a log is appended; orders the append against loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CommitTicket(u64);

pub struct VolumeCache {
    store: Arc<dyn Store>,
    slots: LfuCache<String, Arc<Slot>>,
    epoch: AtomicU64,
}

impl VolumeCache {
    pub fn new(store: Arc<dyn Store>, capacity: usize) -> Self {
        Self {
            store,
            // a slot still loading must stay reachable for its waiters
            slots: LfuCache::new(capacity).with_pinned(|slot: &Arc<Slot>| {
                !slot.account.initialized()
            }),
            epoch: AtomicU64::new(0),
        }
    }

    /// Current state of an account. Unknown accounts are empty.
    pub async fn get(&self, address: &str) -> Result<AccountWithVolumes, StoreError> {
        let slot = self
            .slots
            .get_or_insert_with(address.to_string(), || Arc::new(Slot::default()));
        let account = slot
            .account
            .get_or_try_init(|| async {
                debug!(account = %address, "loading account from store");
                let account = match self.store.compute_account(address).await {
                    Ok(account) => account,
                    Err(StoreError::NotFound) => AccountWithVolumes::empty(address),
                    Err(err) => return Err(err),
                };
                slot.loaded_at
                    .store(self.epoch.load(Ordering::SeqCst), Ordering::SeqCst);
                Ok(Mutex::new(account))
            })
            .await;
        let account = match account {
            Ok(account) => account,
            Err(err) => {
                self.forget_if_unloaded(address, &slot);
                return Err(err);
            }
        };
        let copy = account.lock().clone();
        Ok(copy)
    }

    fn forget_if_unloaded(&self, address: &str, slot: &Arc<Slot>) {
        if let Some(current) = self.slots.peek(address) {
            if Arc::ptr_eq(&current, slot) && !current.account.initialized() {
                self.slots.remove(address);
            }
        }
    }

    /// Open a commit. Must be called before the log reaches the store.
    pub fn begin_commit(&self) -> CommitTicket {
        CommitTicket(self.epoch.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn apply(
        &self,
        ticket: CommitTicket,
        address: &str,
        f: impl FnOnce(&mut AccountWithVolumes),
    ) {
        let Some(slot) = self.slots.peek(address) else {
            return;
        };
        match slot.account.get() {
            Some(account) if slot.loaded_at.load(Ordering::SeqCst) < ticket.0 => {
                f(&mut account.lock())
            }
            _ => {
                debug!(account = %address, "dropping account loaded during commit");
                self.slots.remove(address);
            }
        }
    }

    /// Apply volume deltas to a cached account
    pub fn update(&self, ticket: CommitTicket, address: &str, deltas: &VolumesByAssets) {
        self.apply(ticket, address, |account| account.add_volumes(deltas));
    }

    /// Apply every posting of a committed transaction
    pub fn update_with_postings(&self, ticket: CommitTicket, postings: &[Posting]) {
        for (address, deltas) in volume_deltas(postings) {
            self.update(ticket, &address, &deltas);
        }
    }

    pub fn update_metadata(&self, ticket: CommitTicket, address: &str, delta: &Metadata) {
        self.apply(ticket, address, |account| account.merge_metadata(delta));
    }

    pub fn delete_metadata(&self, ticket: CommitTicket, address: &str, key: &str) {
        self.apply(ticket, address, |account| {
            account.metadata.remove(key);
        });
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[async_trait]
impl AccountReader for VolumeCache {
    async fn get_account(&self, address: &str) -> Result<AccountWithVolumes, BoxError> {
        self.get(address).await.map_err(|err| Box::new(err) as BoxError)
    }
}

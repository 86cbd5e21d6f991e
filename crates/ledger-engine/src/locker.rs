//! Account lock scheduler
//!
//! A single task owns the lock tables and serves requests from a mailbox,
//! so no lock table is ever shared between threads.
//!
//! ```text
//! Locker::lock ──request──▶ scheduler ──grant (LockGuard)──▶ caller
//! LockGuard::drop ──release──▶ scheduler ──▶ retry pending, FIFO
//! ```
//!
//! # Invariants
//!
//! 1. An account is either write-locked by one holder or read-locked by
//!    any number of holders
//! 2. `world` is never locked
//! 3. A request is granted whole or not at all
//! 4. A granted request leaves the pending queue
//! 5. A grant nobody receives is released immediately

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ledger_numscript::InvolvedAccounts;
use ledger_types::WORLD;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, trace};

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Lock scheduler stopped")]
    Stopped,
}

/// Accounts to lock, by mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockRequest {
    pub read: BTreeSet<String>,
    pub write: BTreeSet<String>,
}

impl LockRequest {
    /// Drops `world`; an account in both sets is only write-locked
    pub fn new(
        read: impl IntoIterator<Item = String>,
        write: impl IntoIterator<Item = String>,
    ) -> Self {
        let write: BTreeSet<String> = write.into_iter().filter(|a| a != WORLD).collect();
        let read = read
            .into_iter()
            .filter(|a| a != WORLD && !write.contains(a))
            .collect();
        Self { read, write }
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.write.is_empty()
    }
}

impl From<&InvolvedAccounts> for LockRequest {
    fn from(involved: &InvolvedAccounts) -> Self {
        Self::new(involved.read.iter().cloned(), involved.write.iter().cloned())
    }
}

/// Held locks; released on drop
#[derive(Debug)]
pub struct LockGuard {
    id: u64,
    releases: mpsc::UnboundedSender<u64>,
}

impl LockGuard {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // scheduler gone means nothing is held anymore
        let _ = self.releases.send(self.id);
    }
}

struct Pending {
    id: u64,
    request: LockRequest,
    reply: oneshot::Sender<LockGuard>,
}

/// Handle to the scheduler task
#[derive(Clone)]
pub struct Locker {
    requests: mpsc::Sender<Pending>,
    next_id: Arc<AtomicU64>,
}

impl Locker {
    /// Start the scheduler on the current runtime
    pub fn spawn(queue_capacity: usize) -> Self {
        let (requests, request_rx) = mpsc::channel(queue_capacity.max(1));
        let (releases, release_rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler {
            reads: HashMap::new(),
            writes: HashSet::new(),
            held: HashMap::new(),
            pending: VecDeque::new(),
            releases,
        };
        tokio::spawn(scheduler.run(request_rx, release_rx));
        Self {
            requests,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Wait until every account of `request` is locked.
    ///
    /// Dropping the returned future before it completes withdraws the
    /// request without holding anything.
    pub async fn lock(&self, request: LockRequest) -> Result<LockGuard, LockError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, granted) = oneshot::channel();
        self.requests
            .send(Pending { id, request, reply })
            .await
            .map_err(|_| LockError::Stopped)?;
        granted.await.map_err(|_| LockError::Stopped)
    }
}

struct Scheduler {
    reads: HashMap<String, usize>,
    writes: HashSet<String>,
    held: HashMap<u64, LockRequest>,
    pending: VecDeque<Pending>,
    releases: mpsc::UnboundedSender<u64>,
}

impl Scheduler {
    async fn run(
        mut self,
        mut requests: mpsc::Receiver<Pending>,
        mut releases: mpsc::UnboundedReceiver<u64>,
    ) {
        loop {
            tokio::select! {
                biased;
                Some(id) = releases.recv() => {
                    self.release(id);
                    self.retry_pending();
                }
                request = requests.recv() => match request {
                    Some(pending) => {
                        if let Some(waiting) = self.try_grant(pending) {
                            trace!(lock_id = waiting.id, "lock queued");
                            self.pending.push_back(waiting);
                        }
                    }
                    None => break,
                },
            }
        }
        debug!("lock scheduler stopped");
    }

    fn can_grant(&self, request: &LockRequest) -> bool {
        request
            .write
            .iter()
            .all(|a| !self.writes.contains(a) && !self.reads.contains_key(a))
            && request.read.iter().all(|a| !self.writes.contains(a))
    }

    /// Grant if possible, otherwise hand the request back
    fn try_grant(&mut self, pending: Pending) -> Option<Pending> {
        if pending.reply.is_closed() {
            trace!(lock_id = pending.id, "lock request withdrawn");
            return None;
        }
        if !self.can_grant(&pending.request) {
            return Some(pending);
        }

        for account in &pending.request.read {
            *self.reads.entry(account.clone()).or_insert(0) += 1;
        }
        for account in &pending.request.write {
            self.writes.insert(account.clone());
        }
        debug!(
            lock_id = pending.id,
            reads = pending.request.read.len(),
            writes = pending.request.write.len(),
            "lock granted"
        );
        self.held.insert(pending.id, pending.request);

        let guard = LockGuard {
            id: pending.id,
            releases: self.releases.clone(),
        };
        // a refused guard is dropped here and comes back as a release
        let _ = pending.reply.send(guard);
        None
    }

    fn release(&mut self, id: u64) {
        let Some(request) = self.held.remove(&id) else {
            return;
        };
        for account in &request.read {
            if let Some(count) = self.reads.get_mut(account) {
                *count -= 1;
                if *count == 0 {
                    self.reads.remove(account);
                }
            }
        }
        for account in &request.write {
            self.writes.remove(account);
        }
        debug!(lock_id = id, "lock released");
    }

    fn retry_pending(&mut self) {
        let queue = std::mem::take(&mut self.pending);
        for pending in queue {
            if let Some(waiting) = self.try_grant(pending) {
                self.pending.push_back(waiting);
            }
        }
    }
}

//! Ledger Engine - transaction orchestration
//!
//! Runs numscript programs against live balances and commits the result
//! to an append-only log, with many transactions in flight at once.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                        Commander                         │
//! │  reserve ─ compile ─ resolve ─ lock ─ execute ─ append   │
//! └────┬───────────┬───────────┬─────────┬──────────┬────────┘
//!      │           │           │         │          │
//!  ┌───▼────┐ ┌────▼─────┐ ┌───▼────┐ ┌──▼─────┐ ┌──▼────┐
//!  │ State  │ │ Program  │ │ Volume │ │ Locker │ │ Store │
//!  │        │ │ Cache    │ │ Cache  │ │ (task) │ │ (log) │
//!  └────────┘ └──────────┘ └────────┘ └────────┘ └───────┘
//! ```
//!
//! # Invariants
//!
//! 1. Transactions touching a common non-world account are serialized
//! 2. Locks are held until the transaction's log is ingested
//! 3. Transaction ids are unique and follow log order
//! 4. A failed command appends nothing and releases everything it held

pub mod cache;
pub mod commander;
pub mod compiler;
pub mod config;
pub mod error;
pub mod hash;
pub mod lfu;
pub mod locker;
pub mod log;
pub mod referencer;
pub mod state;
pub mod store;

pub use cache::{CommitTicket, VolumeCache};
pub use commander::{Commander, RunScript};
pub use compiler::{ProgramCache, ScriptParser};
pub use config::{EngineConfig, Parameters};
pub use error::{CommandError, ErrorKind, Result};
pub use locker::{LockError, LockGuard, LockRequest, Locker};
pub use log::{Log, LogPayload, LogType, MetadataTarget};
pub use referencer::{Namespace, ReferenceError, Referencer};
pub use state::{Reservation, StateError, TransactionState};
pub use store::{IngestionMode, MemoryStore, PersistenceHandle, Store, StoreError};

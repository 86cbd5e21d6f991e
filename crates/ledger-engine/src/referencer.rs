//! Process-wide exclusive claims on keys
//!
//! Used to keep two commands from working on the same revert or the same
//! idempotency key at once. A claim lasts as long as its guard.

use std::fmt;
use std::sync::Arc;

use dashmap::DashSet;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Revert,
    IdempotencyKey,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Revert => write!(f, "revert"),
            Namespace::IdempotencyKey => write!(f, "idempotency key"),
        }
    }
}

#[derive(Debug, Error)]
#[error("{namespace} {key} is already taken")]
pub struct ReferenceError {
    pub namespace: Namespace,
    pub key: String,
}

#[derive(Clone, Default)]
pub struct Referencer {
    taken: Arc<DashSet<(Namespace, String)>>,
}

impl Referencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(
        &self,
        namespace: Namespace,
        key: impl Into<String>,
    ) -> Result<ReferenceGuard, ReferenceError> {
        let entry = (namespace, key.into());
        if !self.taken.insert(entry.clone()) {
            return Err(ReferenceError {
                namespace,
                key: entry.1,
            });
        }
        Ok(ReferenceGuard {
            taken: Arc::clone(&self.taken),
            entry,
        })
    }

    pub fn is_taken(&self, namespace: Namespace, key: &str) -> bool {
        self.taken.contains(&(namespace, key.to_string()))
    }
}

/// Releases its claim on drop
pub struct ReferenceGuard {
    taken: Arc<DashSet<(Namespace, String)>>,
    entry: (Namespace, String),
}

impl Drop for ReferenceGuard {
    fn drop(&mut self) {
        self.taken.remove(&self.entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_is_exclusive_until_dropped() {
        let referencer = Referencer::new();
        let guard = referencer.take(Namespace::Revert, "1").unwrap();
        assert!(referencer.is_taken(Namespace::Revert, "1"));

        let err = referencer.take(Namespace::Revert, "1").err().unwrap();
        assert_eq!(err.to_string(), "revert 1 is already taken");

        drop(guard);
        assert!(!referencer.is_taken(Namespace::Revert, "1"));
        assert!(referencer.take(Namespace::Revert, "1").is_ok());
    }

    #[test]
    fn test_namespaces_are_independent() {
        let referencer = Referencer::new();
        let _revert = referencer.take(Namespace::Revert, "k").unwrap();
        assert!(referencer.take(Namespace::IdempotencyKey, "k").is_ok());
    }
}
